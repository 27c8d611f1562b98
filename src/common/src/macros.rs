// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

/// Logs a `tracing::warn!` exactly once per call site, no matter how many
/// times the surrounding code path runs.
///
/// Used for conditions that are real but would otherwise spam the log once
/// per job, e.g. "compression disabled because a message bus is attached".
#[macro_export]
macro_rules! warn_once {
    ($($arg:tt)*) => {{
        static ONCE: std::sync::Once = std::sync::Once::new();
        ONCE.call_once(|| {
            tracing::warn!($($arg)*);
        });
    }};
}
