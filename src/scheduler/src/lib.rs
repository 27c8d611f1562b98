// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! The two scheduler backends that drive a (station, tag) job set to
//! completion: `distributed`, a master/worker loop over a `MessageBus`
//! implementing the collective-metadata protocol (§4.5), and `local`, a
//! thread pool serializing store access under per-file locks (§4.6).
//!
//! Both share `jobqueue::JobQueue` for bookkeeping and `safe_transform` for
//! recovering a panicking user transform.

pub mod collective;
pub mod distributed;
pub mod fork_safety;
pub mod local;
pub mod metrics;
mod safe_transform;

pub use distributed::DistributedSummary;
pub use fork_safety::ForkSafety;
pub use local::LocalSummary;
