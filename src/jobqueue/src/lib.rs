// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! The job ledger and per-worker result buffer shared by both scheduler
//! backends: `JobQueue` tracks which (station, tag) pairs are pending,
//! active, or finished; `StreamBuffer` accumulates a worker's produced
//! `Stream`s until it is large enough to flush.

mod queue;
mod stream_buffer;

pub use queue::{JobQueue, JobResult};
pub use stream_buffer::StreamBuffer;
