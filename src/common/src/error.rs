// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use std::path::PathBuf;

/// Every fatal condition the engine can surface, per the error handling table.
///
/// Transform failures are deliberately *not* represented here: they are
/// recovered in place by the scheduler (logged, job dropped) and never
/// propagate as an `EngineError`.
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("output path already exists: {0}")]
    OutputPathExists(PathBuf),

    #[error("no (station, tag) pairs matched the tag map; nothing to process")]
    EmptyJobSet,

    #[error("dataset already present at {path}: collective write is not idempotent")]
    DuplicateDataset { path: String },

    #[error("bus protocol violation: {0}")]
    BusProtocolViolation(String),

    #[error("container format mismatch: {0}")]
    ContainerFormatMismatch(String),

    #[error("store I/O error: {0}")]
    StoreIo(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
