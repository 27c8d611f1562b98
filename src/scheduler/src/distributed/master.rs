// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use common::{EngineError, JobArgs, Result, WorkerId};
use config::{EngineConfig, GeneralConfig};
use jobqueue::{JobQueue, JobResult};
use queues::{MessageBus, MessageTag, Payload};
use std::thread;
use std::time::Duration;
use store::Store;

/// Completion summary for a finished run, handed back to the Processing
/// API for logging; not part of the wire protocol.
pub struct MasterSummary {
    pub total: usize,
    pub written: usize,
    pub dropped: usize,
    pub elapsed: Duration,
}

/// The master's main loop (§4.5.1). Runs on rank 0, driving the full
/// `JobQueue` and deciding when to force the fleet into the collective
/// phase.
pub fn run(
    bus: &dyn MessageBus,
    output_store: &dyn Store,
    jobs: Vec<JobArgs>,
    worker_count: usize,
    config: &EngineConfig,
) -> Result<MasterSummary> {
    let mut queue = JobQueue::new(jobs);
    let mut writers_waiting: Vec<usize> = Vec::new();

    let threshold = ((worker_count as f64) * config.general().collective_write_threshold())
        .ceil()
        .max(1.0) as usize;
    let tick = Duration::from_millis(config.general().tick_interval_ms());

    loop {
        let half_fleet_idle = writers_waiting.len() >= threshold;
        let final_flush_due =
            !writers_waiting.is_empty() && queue.all_poison_pills_received(worker_count);

        if half_fleet_idle || final_flush_due {
            enter_collective_phase(bus, output_store, worker_count)?;
            crate::metrics::COLLECTIVE_PHASES.increment();
            writers_waiting.clear();
            crate::metrics::WRITERS_WAITING.set(0);
            continue;
        }

        if queue.all_done() {
            break;
        }

        if bus.probe(None, None) {
            let (payload, source, tag) = bus.recv_any()?;
            let worker = WorkerId(source);
            match tag {
                MessageTag::WorkerRequestsItem => {
                    let reply = match queue.get_job_for(worker) {
                        Some(args) => {
                            crate::metrics::JOBS_DISPATCHED.increment();
                            Payload::Item(args)
                        }
                        None => Payload::EndOfQueue,
                    };
                    bus.send(reply, source, MessageTag::MasterSendsItem, true)?;
                }
                MessageTag::WorkerDoneWithItem => match payload {
                    Payload::Completion { args, result } => {
                        match result {
                            JobResult::Written { .. } => crate::metrics::JOBS_WRITTEN.increment(),
                            JobResult::Dropped => crate::metrics::JOBS_DROPPED.increment(),
                        };
                        queue.complete(args, result, worker)?;
                    }
                    other => {
                        return Err(EngineError::BusProtocolViolation(format!(
                            "{worker} sent WorkerDoneWithItem with unexpected payload {other:?}"
                        )));
                    }
                },
                MessageTag::WorkerRequestsWrite => {
                    if !writers_waiting.contains(&source) {
                        writers_waiting.push(source);
                        crate::metrics::WRITERS_WAITING.set(writers_waiting.len() as i64);
                    }
                }
                MessageTag::PoisonPillReceived => {
                    queue.poison_pill_received(worker)?;
                    crate::metrics::POISON_PILLS_RECEIVED.increment();
                }
                other => {
                    return Err(EngineError::BusProtocolViolation(format!(
                        "master received unexpected tag {other:?} from {worker}"
                    )));
                }
            }
        } else {
            thread::sleep(tick);
        }
    }

    for dest in 1..=worker_count {
        bus.send(Payload::Empty, dest, MessageTag::AllDone, true)?;
    }
    bus.barrier();

    let mut written = 0;
    let mut dropped = 0;
    for (_, result) in queue.results() {
        match result {
            JobResult::Written { .. } => written += 1,
            JobResult::Dropped => dropped += 1,
        }
    }

    Ok(MasterSummary {
        total: queue.total(),
        written,
        dropped,
        elapsed: queue.elapsed(),
    })
}

/// Forces every worker into the collective phase, replays the gathered
/// write intents, drains the now-irrelevant write requests that arrived
/// mid-protocol, then releases the fleet via `barrier()`.
fn enter_collective_phase(
    bus: &dyn MessageBus,
    output_store: &dyn Store,
    worker_count: usize,
) -> Result<()> {
    for dest in 1..=worker_count {
        bus.send(Payload::Empty, dest, MessageTag::MasterForcesWrite, true)?;
    }

    crate::collective::gather_and_apply(bus, output_store, Vec::new(), true)?;

    while bus.probe(None, Some(MessageTag::WorkerRequestsWrite)) {
        bus.recv_any()?;
    }

    bus.barrier();
    Ok(())
}
