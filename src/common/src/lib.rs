// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Shared types, error kinds, and helper macros used across the processing
//! engine's crates: ids (`StationId`, `Tag`, `JobArgs`, `WorkerId`), the
//! `EngineError` enum, and small time-value wrappers that mirror the
//! container's on-disk attribute encoding.

pub mod error;
pub mod ids;
pub mod macros;
pub mod tag_map;
pub mod time;

pub use error::{EngineError, Result};
pub use ids::{JobArgs, StationId, Tag, WorkerId};
pub use tag_map::TagMap;
pub use time::{Nanoseconds, SamplingRate};
