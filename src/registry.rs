//! Test registration and suite composition.
//!
//! A contract is written once as a list of [`ContractTest`]s generic over a
//! descriptor type. [`Registry::bind`] instantiates it for one descriptor,
//! producing one [`BoundTest`] per test method; binding the same contract to
//! several descriptors yields the identical set of tests for each, reported
//! separately. Registration is explicit: nothing is discovered at run time.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::context::TestCx;
use crate::descriptor::{Capabilities, Descriptor};
use crate::error::TestOutcome;

/// Categories of contract tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestCategory {
    /// Collection contracts (lists, sets).
    Collection,
    /// Map contracts.
    Map,
    /// Non-blocking queue contracts.
    Queue,
    /// Blocking queue contracts.
    BlockingQueue,
    /// Atomic variables.
    Atomics,
    /// Park/unpark.
    LockSupport,
    /// Thread-local storage.
    ThreadLocal,
    /// Barriers.
    Barrier,
    /// One-time initialization.
    Once,
    /// Count-down latches.
    Latch,
    /// Two-party exchangers.
    Exchanger,
    /// Spawned tasks: result delivery, completion and fork/join.
    Tasks,
}

impl fmt::Display for TestCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Collection => write!(f, "collection"),
            Self::Map => write!(f, "map"),
            Self::Queue => write!(f, "queue"),
            Self::BlockingQueue => write!(f, "blocking_queue"),
            Self::Atomics => write!(f, "atomics"),
            Self::LockSupport => write!(f, "lock_support"),
            Self::ThreadLocal => write!(f, "thread_local"),
            Self::Barrier => write!(f, "barrier"),
            Self::Once => write!(f, "once"),
            Self::Latch => write!(f, "latch"),
            Self::Exchanger => write!(f, "exchanger"),
            Self::Tasks => write!(f, "tasks"),
        }
    }
}

/// Metadata for a contract test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestMeta {
    /// Unique identifier within its contract, e.g. `bq-005`.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// What the test validates.
    pub description: String,
    /// Category of the test.
    pub category: TestCategory,
    /// Tags for filtering.
    pub tags: Vec<String>,
    /// Expected behavior.
    pub expected: String,
}

/// Signature of a contract test body.
pub type TestFn<D> = fn(&D, &TestCx) -> TestOutcome;

/// One test of a contract, not yet bound to an implementation.
pub struct ContractTest<D> {
    /// Test metadata.
    pub meta: TestMeta,
    /// The test function.
    pub test_fn: TestFn<D>,
}

impl<D> ContractTest<D> {
    /// Creates a contract test.
    pub const fn new(meta: TestMeta, test_fn: TestFn<D>) -> Self {
        Self { meta, test_fn }
    }

    /// Runs the test against `descriptor`.
    pub fn run(&self, descriptor: &D, cx: &TestCx) -> TestOutcome {
        (self.test_fn)(descriptor, cx)
    }
}

impl<D> fmt::Debug for ContractTest<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContractTest")
            .field("id", &self.meta.id)
            .finish_non_exhaustive()
    }
}

/// A named contract: the full list of tests for one abstract interface.
#[derive(Debug)]
pub struct Contract<D> {
    name: &'static str,
    tests: Vec<ContractTest<D>>,
}

impl<D> Contract<D> {
    /// Creates a contract.
    #[must_use]
    pub fn new(name: &'static str, tests: Vec<ContractTest<D>>) -> Self {
        Self { name, tests }
    }

    /// The contract's suite name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// The contract's tests.
    #[must_use]
    pub fn tests(&self) -> &[ContractTest<D>] {
        &self.tests
    }
}

type BoundFn = Arc<dyn Fn(&TestCx) -> TestOutcome + Send + Sync>;

/// A test bound to one implementation; runnable on its own.
#[derive(Clone)]
pub struct BoundTest {
    suite: String,
    implementation: String,
    capabilities: Capabilities,
    meta: TestMeta,
    run: BoundFn,
}

impl BoundTest {
    /// Suite (contract) name.
    #[must_use]
    pub fn suite(&self) -> &str {
        &self.suite
    }

    /// Implementation name.
    #[must_use]
    pub fn implementation(&self) -> &str {
        &self.implementation
    }

    /// Capabilities declared by the implementation.
    #[must_use]
    pub const fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Test metadata.
    #[must_use]
    pub const fn meta(&self) -> &TestMeta {
        &self.meta
    }

    /// `suite/implementation/id`.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        format!("{}/{}/{}", self.suite, self.implementation, self.meta.id)
    }

    /// Runs the test body.
    pub fn run(&self, cx: &TestCx) -> TestOutcome {
        (self.run)(cx)
    }
}

impl fmt::Debug for BoundTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundTest")
            .field("name", &self.qualified_name())
            .finish_non_exhaustive()
    }
}

/// Tests of one contract bound to every registered implementation.
#[derive(Debug, Clone)]
pub struct Suite {
    name: String,
    tests: Vec<BoundTest>,
}

impl Suite {
    /// Suite name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bound tests in registration order.
    #[must_use]
    pub fn tests(&self) -> &[BoundTest] {
        &self.tests
    }

    /// Names of the implementations bound to this suite, in order.
    #[must_use]
    pub fn implementations(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for test in &self.tests {
            if !names.contains(&test.implementation()) {
                names.push(test.implementation());
            }
        }
        names
    }
}

/// Ordered mapping from suite name to bound tests.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    suites: Vec<Suite>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds every test of `contract` to `descriptor`.
    pub fn bind<D: Descriptor>(&mut self, contract: Contract<D>, descriptor: D) -> &mut Self {
        let implementation = descriptor.name().to_string();
        let capabilities = descriptor.capabilities();
        let descriptor = Arc::new(descriptor);

        let suite = self.suite_mut(contract.name);
        for test in contract.tests {
            let bound_descriptor = Arc::clone(&descriptor);
            let test_fn = test.test_fn;
            suite.tests.push(BoundTest {
                suite: contract.name.to_string(),
                implementation: implementation.clone(),
                capabilities,
                meta: test.meta,
                run: Arc::new(move |cx| test_fn(&bound_descriptor, cx)),
            });
        }
        tracing::debug!(suite = contract.name, %implementation, "bound contract");
        self
    }

    fn suite_mut(&mut self, name: &str) -> &mut Suite {
        let index = match self.suites.iter().position(|s| s.name == name) {
            Some(index) => index,
            None => {
                self.suites.push(Suite {
                    name: name.to_string(),
                    tests: Vec::new(),
                });
                self.suites.len() - 1
            }
        };
        &mut self.suites[index]
    }

    /// Suites in registration order.
    #[must_use]
    pub fn suites(&self) -> &[Suite] {
        &self.suites
    }

    /// Looks up a suite by name.
    #[must_use]
    pub fn suite(&self, name: &str) -> Option<&Suite> {
        self.suites.iter().find(|s| s.name == name)
    }

    /// Every bound test, suite by suite.
    pub fn tests(&self) -> impl Iterator<Item = &BoundTest> {
        self.suites.iter().flat_map(|s| s.tests.iter())
    }

    /// Total number of bound tests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.suites.iter().map(|s| s.tests.len()).sum()
    }

    /// Whether nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Qualified names of every bound test.
    #[must_use]
    pub fn test_names(&self) -> Vec<String> {
        self.tests().map(BoundTest::qualified_name).collect()
    }

    /// A registry holding only the named suite.
    #[must_use]
    pub fn only_suite(&self, name: &str) -> Self {
        Self {
            suites: self.suites.iter().filter(|s| s.name == name).cloned().collect(),
        }
    }
}

/// Defines a contract test from a closure-like body.
///
/// # Example
///
/// ```ignore
/// contract_test! {
///     id: "queue-001",
///     name: "Empty queue",
///     description: "A fresh queue holds nothing",
///     category: TestCategory::Queue,
///     tags: ["basic"],
///     expected: "poll returns None",
///     bound: QueueImplementation,
///     test: |imp, cx| {
///         ensure!(imp.empty_queue().poll().is_none());
///         Ok(())
///     }
/// }
/// ```
#[macro_export]
macro_rules! contract_test {
    (
        id: $id:literal,
        name: $name:literal,
        description: $desc:literal,
        category: $cat:expr,
        tags: [$($tag:literal),* $(,)?],
        expected: $expected:literal,
        bound: $bound:ident,
        test: |$imp:ident, $cx:ident| $body:expr $(,)?
    ) => {
        {
            #[allow(unused_variables)]
            fn test_fn<D: $crate::descriptor::$bound>(
                $imp: &D,
                $cx: &$crate::context::TestCx,
            ) -> $crate::error::TestOutcome {
                $body
            }

            $crate::registry::ContractTest::new(
                $crate::registry::TestMeta {
                    id: $id.to_string(),
                    name: $name.to_string(),
                    description: $desc.to_string(),
                    category: $cat,
                    tags: vec![$($tag.to_string()),*],
                    expected: $expected.to_string(),
                },
                test_fn,
            )
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Platform;
    use crate::error::Failure;

    #[derive(Debug)]
    struct Named(&'static str);

    impl Descriptor for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn capabilities(&self) -> Capabilities {
            Capabilities::NONE
        }
    }

    fn meta(id: &str) -> TestMeta {
        TestMeta {
            id: id.to_string(),
            name: id.to_string(),
            description: String::new(),
            category: TestCategory::Collection,
            tags: Vec::new(),
            expected: String::new(),
        }
    }

    fn passes<D: Descriptor>(_: &D, _: &TestCx) -> TestOutcome {
        Ok(())
    }

    fn fails_for_beta<D: Descriptor>(d: &D, _: &TestCx) -> TestOutcome {
        if d.name() == "beta" {
            return Err(Failure::contract("beta is broken", file!(), line!()));
        }
        Ok(())
    }

    fn contract<D: Descriptor>() -> Contract<D> {
        Contract::new(
            "demo",
            vec![
                ContractTest::new(meta("demo-001"), passes::<D>),
                ContractTest::new(meta("demo-002"), fails_for_beta::<D>),
            ],
        )
    }

    #[test]
    fn binding_produces_one_test_per_descriptor() {
        let mut registry = Registry::new();
        registry
            .bind(contract(), Named("alpha"))
            .bind(contract(), Named("beta"));

        assert_eq!(registry.suites().len(), 1);
        assert_eq!(registry.len(), 4);
        assert_eq!(
            registry.test_names(),
            vec![
                "demo/alpha/demo-001",
                "demo/alpha/demo-002",
                "demo/beta/demo-001",
                "demo/beta/demo-002",
            ]
        );
        let suite = registry.suite("demo").expect("suite registered");
        assert_eq!(suite.implementations(), vec!["alpha", "beta"]);
    }

    #[test]
    fn bound_tests_run_against_their_descriptor() {
        let mut registry = Registry::new();
        registry
            .bind(contract(), Named("alpha"))
            .bind(contract(), Named("beta"));

        let cx = TestCx::for_testing();
        let failing: Vec<String> = registry
            .tests()
            .filter(|t| t.run(&cx).is_err())
            .map(BoundTest::qualified_name)
            .collect();
        assert_eq!(failing, vec!["demo/beta/demo-002"]);
    }

    #[test]
    fn only_suite_filters() {
        let mut registry = Registry::new();
        registry.bind(contract(), Platform);
        registry.bind(Contract::new("other", vec![ContractTest::new(meta("o-1"), passes::<Platform>)]), Platform);
        assert_eq!(registry.suites().len(), 2);
        let only = registry.only_suite("other");
        assert_eq!(only.len(), 1);
        assert!(only.suite("demo").is_none());
    }

    #[test]
    fn macro_builds_contract_test() {
        let test: ContractTest<Platform> = contract_test! {
            id: "m-001",
            name: "Macro",
            description: "Built by the macro",
            category: TestCategory::Atomics,
            tags: ["macro"],
            expected: "Runs",
            bound: Descriptor,
            test: |imp, cx| {
                ensure_eq!(imp.name(), "std");
                Ok(())
            }
        };
        assert_eq!(test.meta.tags, vec!["macro"]);
        assert!(test.run(&Platform, &TestCx::for_testing()).is_ok());
    }
}
