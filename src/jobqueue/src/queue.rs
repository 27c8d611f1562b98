// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use common::{EngineError, JobArgs, Result, WorkerId};
use std::collections::{HashMap, VecDeque};
use std::time::Instant;

/// The small completion summary attached to a finished job. Bulk sample
/// data never passes through here — it lives in the worker's
/// `StreamBuffer` until flushed to the output store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobResult {
    /// The transform produced a non-empty `Stream`; `trace_count` traces
    /// were (or will be, once flushed) written to the output store.
    Written { trace_count: usize },
    /// The transform returned nothing, or panicked/errored and was
    /// skipped; no data was written for this job.
    Dropped,
}

/// Tracks every job's place in the pending/active/finished partition and
/// counts poison-pill acknowledgements from workers. Not `Sync` by itself;
/// the distributed scheduler drives it from the single master thread, the
/// local scheduler wraps it in a lock (see `scheduler::local`).
pub struct JobQueue {
    pending: VecDeque<JobArgs>,
    active: HashMap<WorkerId, Vec<JobArgs>>,
    finished: HashMap<JobArgs, JobResult>,
    total: usize,
    poison_pills_received: HashMap<WorkerId, ()>,
    started_at: Instant,
}

impl JobQueue {
    /// Builds a queue over the full job list. Jobs are dispatched in the
    /// order given (FIFO).
    pub fn new(jobs: Vec<JobArgs>) -> Self {
        Self {
            total: jobs.len(),
            pending: jobs.into(),
            active: HashMap::new(),
            finished: HashMap::new(),
            poison_pills_received: HashMap::new(),
            started_at: Instant::now(),
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn finished_count(&self) -> usize {
        self.finished.len()
    }

    pub fn active_count_for(&self, worker: WorkerId) -> usize {
        self.active.get(&worker).map(Vec::len).unwrap_or(0)
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }

    /// Removes the head of the pending queue and records it as active for
    /// `worker`. `None` means the queue is drained; the caller (the
    /// distributed master, or the local pool's dispatch loop) is
    /// responsible for turning that into an end-of-queue signal — an empty
    /// queue is an ordinary condition, not a protocol error.
    pub fn get_job_for(&mut self, worker: WorkerId) -> Option<JobArgs> {
        let args = self.pending.pop_front()?;
        self.active.entry(worker).or_default().push(args.clone());
        Some(args)
    }

    /// Moves the unique active job matching `args` on `worker` to
    /// finished. Zero or more than one match indicates a protocol bug:
    /// the worker reported a job it was never assigned, or reported the
    /// same job twice.
    pub fn complete(&mut self, args: JobArgs, result: JobResult, worker: WorkerId) -> Result<()> {
        let slots = self
            .active
            .get_mut(&worker)
            .ok_or_else(|| protocol_violation(worker, &args, "no jobs active for worker"))?;
        let position = slots
            .iter()
            .position(|a| a == &args)
            .ok_or_else(|| protocol_violation(worker, &args, "job not active for worker"))?;
        slots.remove(position);
        if self.finished.insert(args.clone(), result).is_some() {
            return Err(protocol_violation(worker, &args, "job already finished"));
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn all_done(&self) -> bool {
        self.finished.len() == self.total
    }

    /// Records that `worker` has acknowledged end-of-queue. A second pill
    /// from the same worker is a protocol violation rather than a no-op:
    /// it can only happen if a worker requested and processed
    /// `EndOfQueue` twice, which should never occur in a correctly
    /// functioning worker loop.
    pub fn poison_pill_received(&mut self, worker: WorkerId) -> Result<()> {
        if self.poison_pills_received.insert(worker, ()).is_some() {
            return Err(EngineError::BusProtocolViolation(format!(
                "{worker} acknowledged end-of-queue more than once"
            )));
        }
        Ok(())
    }

    pub fn all_poison_pills_received(&self, worker_count: usize) -> bool {
        self.poison_pills_received.len() == worker_count
    }

    pub fn results(&self) -> impl Iterator<Item = (&JobArgs, &JobResult)> {
        self.finished.iter()
    }
}

fn protocol_violation(worker: WorkerId, args: &JobArgs, reason: &str) -> EngineError {
    EngineError::BusProtocolViolation(format!("{worker} / {args}: {reason}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{StationId, Tag};

    fn args(station: &str, tag: &str) -> JobArgs {
        JobArgs::new(StationId::from(station), Tag::from(tag))
    }

    #[test]
    fn dispatches_fifo_and_tracks_completion() {
        let mut queue = JobQueue::new(vec![args("A", "raw"), args("B", "raw")]);
        let w = WorkerId(0);
        let first = queue.get_job_for(w).unwrap();
        assert_eq!(first, args("A", "raw"));
        assert!(!queue.all_done());
        queue
            .complete(first, JobResult::Written { trace_count: 1 }, w)
            .unwrap();
        assert_eq!(queue.finished_count(), 1);

        let second = queue.get_job_for(w).unwrap();
        assert_eq!(second, args("B", "raw"));
        assert!(queue.get_job_for(w).is_none());
        queue.complete(second, JobResult::Dropped, w).unwrap();
        assert!(queue.all_done());
    }

    #[test]
    fn completing_an_unassigned_job_is_a_protocol_violation() {
        let mut queue = JobQueue::new(vec![args("A", "raw")]);
        let err = queue
            .complete(args("A", "raw"), JobResult::Dropped, WorkerId(0))
            .unwrap_err();
        assert!(matches!(err, EngineError::BusProtocolViolation(_)));
    }

    #[test]
    fn completing_twice_is_a_protocol_violation() {
        let mut queue = JobQueue::new(vec![args("A", "raw")]);
        let w = WorkerId(0);
        let job = queue.get_job_for(w).unwrap();
        queue.complete(job.clone(), JobResult::Dropped, w).unwrap();

        // Re-dispatch the same args to the same worker to simulate a buggy
        // worker reporting completion for a job it is no longer holding.
        let err = queue.complete(job, JobResult::Dropped, w).unwrap_err();
        assert!(matches!(err, EngineError::BusProtocolViolation(_)));
    }

    #[test]
    fn second_poison_pill_from_same_worker_is_a_protocol_violation() {
        let mut queue = JobQueue::new(vec![args("A", "raw")]);
        let w = WorkerId(0);
        queue.poison_pill_received(w).unwrap();
        let err = queue.poison_pill_received(w).unwrap_err();
        assert!(matches!(err, EngineError::BusProtocolViolation(_)));
        assert!(queue.all_poison_pills_received(1));
    }
}
