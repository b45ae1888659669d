//! Logging macros that prefix the event target with the calling module path,
//! e.g. `canary_runner::orchestrator [BATCH]`.
//!
//! A `Targets` filter keyed on the crate name still matches these, since the
//! module path always starts with it.

#[macro_export]
macro_rules! info {
    (target: $target:expr, $($arg:tt)*) => {
		$crate::__private::tracing::info!(
			target: $crate::__private::const_str::concat!(module_path!(), " ", $target),
			$($arg)*
		)
    };
    ($($arg:tt)*) => {
        $crate::__private::tracing::info!($($arg)*)
    };
}

#[macro_export]
macro_rules! warn {
    (target: $target:expr, $($arg:tt)*) => {
		$crate::__private::tracing::warn!(
			target: $crate::__private::const_str::concat!(module_path!(), " ", $target),
			$($arg)*
		)
    };
    ($($arg:tt)*) => {
        $crate::__private::tracing::warn!($($arg)*)
    };
}

#[macro_export]
macro_rules! error {
    (target: $target:expr, $($arg:tt)*) => {
		$crate::__private::tracing::error!(
			target: $crate::__private::const_str::concat!(module_path!(), " ", $target),
			$($arg)*
		)
    };
    ($($arg:tt)*) => {
        $crate::__private::tracing::error!($($arg)*)
    };
}

#[macro_export]
macro_rules! debug {
    (target: $target:expr, $($arg:tt)*) => {
		$crate::__private::tracing::debug!(
			target: $crate::__private::const_str::concat!(module_path!(), " ", $target),
			$($arg)*
		)
    };
    ($($arg:tt)*) => {
        $crate::__private::tracing::debug!($($arg)*)
    };
}
