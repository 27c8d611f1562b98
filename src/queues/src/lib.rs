// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Symmetric, tagged point-to-point messaging between ranked peers, plus
//! the collective primitives (`barrier`, `all_gather`) the distributed
//! scheduler needs to run its collective-metadata protocol.
//!
//! `MessageBus` is the contract the scheduler is written against (§4.4 of
//! the processing engine's design); `inprocess` is a reference transport
//! backed by `crossbeam-channel`, used in tests and by any embedder that
//! wants the distributed scheduler's code path without a real MPI-style
//! fabric underneath it.

mod bus;
mod inprocess;

pub use bus::{MessageBus, MessageTag, Payload, SendHandle};
pub use inprocess::InProcessBus;
