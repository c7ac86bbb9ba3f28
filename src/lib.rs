//! Contract test kit for collections, queues and concurrency primitives.
//!
//! A contract is written once against an abstract interface ("mapping from
//! key to value", "blocking queue") and bound to any number of concrete
//! implementations through implementation descriptors. Each descriptor
//! declares static [`Capabilities`](descriptor::Capabilities) (null policy,
//! thread safety, iteration order, ...) and the contract branches on those,
//! never on the concrete type.
//!
//! # Overview
//!
//! - [`element`]: integer-indexed test elements with value identity
//! - [`descriptor`]: capability records and container-under-test traits
//! - [`contracts`]: the contract test bodies
//! - [`registry`]: explicit suite composition, one test per (test x descriptor)
//! - [`runner`] and [`report`]: sequential execution and reporting
//! - [`sync`]: latches, interrupts and tracked auxiliary threads
//!
//! # Example
//!
//! ```ignore
//! use contract_tck::{Registry, Runner, TckConfig, contracts};
//!
//! let mut registry = Registry::new();
//! registry.bind(contracts::queue::contract(), MyQueueDescriptor);
//! let report = Runner::new(TckConfig::from_env()?).run(&registry);
//! std::process::exit(report.exit_code());
//! ```

#![forbid(unsafe_code)]

#[macro_use]
mod assert;
#[macro_use]
pub mod registry;

pub mod config;
pub mod context;
pub mod contracts;
pub mod descriptor;
pub mod element;
pub mod error;
pub mod exit;
pub mod logging;
pub mod report;
pub mod runner;
pub mod sync;

pub use config::{Delays, TckConfig};
pub use context::TestCx;
pub use descriptor::{
    BlockingQueueImplementation, BlockingQueueUnderTest, Capabilities, CollectionImplementation,
    CollectionUnderTest, Descriptor, ExchangerImplementation, ExchangerUnderTest, IterationOrder,
    LatchImplementation, LatchUnderTest, MapImplementation, MapUnderTest, Platform,
    QueueImplementation, QueueUnderTest,
};
pub use element::{Element, Item, SIZE, SharedItem};
pub use error::{ConfigError, ContainerError, Failure, FailureKind, TestOutcome};
pub use exit::ExitCode;
pub use logging::{LogCollector, LogLevel, init_logging};
pub use registry::{BoundTest, Contract, ContractTest, Registry, TestCategory, TestMeta};
pub use report::{RunReport, TestRecord, TestStatus};
pub use runner::Runner;
pub use sync::{AuxThread, CountDownLatch, Interrupt};
