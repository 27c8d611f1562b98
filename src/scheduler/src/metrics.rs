// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Operational counters and gauges for both scheduler backends, exposed
//! the way the rest of this codebase family exposes `metriken` statics:
//! one file, one namespace, consulted only for visibility — never by
//! scheduling logic itself.

use metriken::*;

#[metric(name = "jobs_dispatched", description = "number of jobs handed to a worker by either scheduler backend")]
pub static JOBS_DISPATCHED: Counter = Counter::new();

#[metric(name = "jobs_written", description = "number of jobs whose transform produced a non-empty stream")]
pub static JOBS_WRITTEN: Counter = Counter::new();

#[metric(name = "jobs_dropped", description = "number of jobs whose transform returned nothing or panicked")]
pub static JOBS_DROPPED: Counter = Counter::new();

#[metric(name = "collective_phases", description = "number of times the distributed scheduler entered the collective-write phase")]
pub static COLLECTIVE_PHASES: Counter = Counter::new();

#[metric(name = "poison_pills_received", description = "number of end-of-queue acknowledgements the master has recorded")]
pub static POISON_PILLS_RECEIVED: Counter = Counter::new();

#[metric(name = "stream_buffer_bytes", description = "current approximate byte size of the calling worker's StreamBuffer")]
pub static STREAM_BUFFER_BYTES: Gauge = Gauge::new();

#[metric(name = "writers_waiting", description = "current number of workers blocked on a collective write, as seen by the master")]
pub static WRITERS_WAITING: Gauge = Gauge::new();
