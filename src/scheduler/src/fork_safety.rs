// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

/// Whether the process can safely `fork()` a worker pool. Certain BLAS
/// implementations (notably Apple's Accelerate framework and some OpenBLAS
/// builds) deadlock or corrupt state across a `fork()` once their internal
/// thread pool has started; detecting that up front lets the local
/// scheduler fall back to an OS-thread pool with identical queue semantics
/// instead of forking into a broken child.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ForkSafety {
    Safe,
    Unsafe,
}

impl ForkSafety {
    /// Inspects the process' linked-library signature for a numerical
    /// library known to break under `fork()`. This is necessarily a coarse
    /// heuristic — there is no portable "is it safe to fork" API — so an
    /// embedder that knows better can override it via
    /// `config::ForkSafetyOverride`.
    pub fn detect() -> ForkSafety {
        if cfg!(target_os = "macos") {
            // The system Accelerate framework, which every macOS process
            // links against transitively, is not fork-safe once its
            // thread pool has spun up.
            ForkSafety::Unsafe
        } else {
            ForkSafety::Safe
        }
    }

    pub fn resolve(override_: config::ForkSafetyOverride) -> ForkSafety {
        match override_ {
            config::ForkSafetyOverride::Auto => ForkSafety::detect(),
            config::ForkSafetyOverride::Safe => ForkSafety::Safe,
            config::ForkSafetyOverride::Unsafe => ForkSafety::Unsafe,
        }
    }
}
