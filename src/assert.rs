//! Assertion macros for contract test bodies.
//!
//! Contract tests return [`TestOutcome`](crate::error::TestOutcome); these
//! macros turn a failed check into an early `Err(Failure::Contract)` carrying
//! the call site, so a failure aborts only the current test method.
//!
//! ```ignore
//! ensure!(c.is_empty(), "fresh container must be empty");
//! ensure_eq!(c.len(), 3);
//! ensure_matches!(c.add(None), Err(ContainerError::NullElement));
//! ```

/// Fails the current test if `cond` is false.
#[macro_export]
macro_rules! ensure {
    ($cond:expr $(,)?) => {
        if !$cond {
            return Err($crate::error::Failure::contract(
                concat!("condition failed: ", stringify!($cond)),
                file!(),
                line!(),
            ));
        }
    };
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            return Err($crate::error::Failure::contract(
                format!($($arg)+),
                file!(),
                line!(),
            ));
        }
    };
}

/// Fails the current test if the two expressions are not equal.
#[macro_export]
macro_rules! ensure_eq {
    ($left:expr, $right:expr $(,)?) => {
        match (&$left, &$right) {
            (left, right) => {
                if left != right {
                    return Err($crate::error::Failure::contract(
                        format!(
                            "`{}` != `{}`\n  left: {:?}\n right: {:?}",
                            stringify!($left),
                            stringify!($right),
                            left,
                            right
                        ),
                        file!(),
                        line!(),
                    ));
                }
            }
        }
    };
    ($left:expr, $right:expr, $($arg:tt)+) => {
        match (&$left, &$right) {
            (left, right) => {
                if left != right {
                    return Err($crate::error::Failure::contract(
                        format!(
                            "{}\n  left: {:?}\n right: {:?}",
                            format!($($arg)+),
                            left,
                            right
                        ),
                        file!(),
                        line!(),
                    ));
                }
            }
        }
    };
}

/// Fails the current test if the expression does not match the pattern.
#[macro_export]
macro_rules! ensure_matches {
    ($value:expr, $pattern:pat $(if $guard:expr)? $(,)?) => {
        match $value {
            $pattern $(if $guard)? => {}
            ref other => {
                return Err($crate::error::Failure::contract(
                    format!(
                        "`{}` did not match `{}`: got {:?}",
                        stringify!($value),
                        stringify!($pattern),
                        other
                    ),
                    file!(),
                    line!(),
                ));
            }
        }
    };
}

/// Fails the current test unconditionally.
#[macro_export]
macro_rules! fail {
    ($($arg:tt)+) => {
        return Err($crate::error::Failure::contract(
            format!($($arg)+),
            file!(),
            line!(),
        ))
    };
}
