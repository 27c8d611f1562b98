// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use common::{JobArgs, Result};
use jobqueue::JobResult;
use store::WriteIntent;

/// The fixed tag enumeration every message on the bus carries. The
/// scheduler dispatches on this rather than on payload shape, mirroring an
/// MPI program's tagged-message discipline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageTag {
    MasterForcesWrite,
    MasterSendsItem,
    AllDone,
    WorkerRequestsItem,
    WorkerRequestsWrite,
    WorkerDoneWithItem,
    PoisonPillReceived,
}

/// Every payload shape exchanged over the bus. `EndOfQueue` is the
/// `POISON_PILL` sentinel, modeled as a tagged variant rather than a
/// distinguished out-of-band value on the `MasterSendsItem` channel.
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    Empty,
    Item(JobArgs),
    EndOfQueue,
    Completion { args: JobArgs, result: JobResult },
}

/// Handle returned by a non-blocking `send`, passed to `wait_all` once the
/// caller is ready to block until delivery. Opaque to callers; transports
/// that deliver synchronously (e.g. `InProcessBus`) can make this a
/// zero-cost marker.
pub trait SendHandle: Send {
    fn wait(self: Box<Self>);
}

/// Symmetric, tagged point-to-point messaging between ranks 0..N-1, plus
/// the two collective operations the distributed scheduler needs.
///
/// Implementations are expected to be cheap to clone or already
/// reference-counted internally; the scheduler holds one bus handle per
/// rank for the lifetime of a `process()` call.
pub trait MessageBus: Send + Sync {
    fn rank(&self) -> usize;

    fn size(&self) -> usize;

    /// Sends `payload` to `dest` tagged `tag`. When `blocking` is `true`
    /// the call does not return until the transport has accepted the
    /// message; when `false` it returns immediately with a handle that
    /// `wait_all` can later block on.
    fn send(
        &self,
        payload: Payload,
        dest: usize,
        tag: MessageTag,
        blocking: bool,
    ) -> Result<Option<Box<dyn SendHandle>>>;

    /// Blocks until every handle has drained.
    fn wait_all(&self, handles: Vec<Box<dyn SendHandle>>) {
        for handle in handles {
            handle.wait();
        }
    }

    /// Non-destructively reports whether a message matching `source`
    /// (`None` for any source) and `tag` (`None` for any tag) is queued.
    fn probe(&self, source: Option<usize>, tag: Option<MessageTag>) -> bool;

    /// Blocking receive from any source, any tag.
    fn recv_any(&self) -> Result<(Payload, usize, MessageTag)>;

    /// Blocking receive targeted at a specific source and tag.
    fn recv(&self, source: usize, tag: MessageTag) -> Result<Payload>;

    /// Collective: gathers every rank's contribution, in rank order.
    fn all_gather(&self, contribution: Vec<WriteIntent>) -> Result<Vec<Vec<WriteIntent>>>;

    /// Collective synchronization point.
    fn barrier(&self);
}
