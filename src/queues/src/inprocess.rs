// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use crate::bus::{MessageBus, MessageTag, Payload, SendHandle};
use common::{EngineError, Result};
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::{Arc, Barrier};

struct Envelope {
    source: usize,
    tag: MessageTag,
    payload: Payload,
}

/// A delivered-on-send handle: `InProcessBus::send` always hands the
/// payload to the destination's channel before returning, so there is
/// nothing left for `wait` to do even in the non-blocking case.
struct DeliveredHandle;

impl SendHandle for DeliveredHandle {
    fn wait(self: Box<Self>) {}
}

struct GatherState {
    slots: Vec<Option<Vec<store::WriteIntent>>>,
}

/// Shared state every rank's `InProcessBus` handle holds a reference into:
/// one inbox `Sender` per rank, the collective rendezvous points, and the
/// barrier used by `barrier()`.
struct Fleet {
    senders: Vec<Sender<Envelope>>,
    gather: Mutex<GatherState>,
    gather_entry: Barrier,
    gather_exit: Barrier,
    barrier: Barrier,
}

/// Reference `MessageBus` transport for tests and non-MPI embedders:
/// ranks 0..N-1 each get an unbounded `crossbeam-channel` inbox, and the
/// two collective operations rendezvous on `std::sync::Barrier`s sized to
/// the fleet.
pub struct InProcessBus {
    rank: usize,
    fleet: Arc<Fleet>,
    inbox: Receiver<Envelope>,
    pending: Mutex<VecDeque<Envelope>>,
}

impl InProcessBus {
    /// Builds a fully-connected fleet of `n` ranks. Rank 0 is conventionally
    /// the master in the distributed scheduler; this constructor makes no
    /// distinction between ranks.
    pub fn fleet(n: usize) -> Vec<InProcessBus> {
        assert!(n >= 2, "a message bus fleet needs at least 2 ranks");
        let mut senders = Vec::with_capacity(n);
        let mut inboxes = Vec::with_capacity(n);
        for _ in 0..n {
            let (tx, rx) = crossbeam_channel::unbounded();
            senders.push(tx);
            inboxes.push(rx);
        }

        let fleet = Arc::new(Fleet {
            senders,
            gather: Mutex::new(GatherState {
                slots: vec![None; n],
            }),
            gather_entry: Barrier::new(n),
            gather_exit: Barrier::new(n),
            barrier: Barrier::new(n),
        });

        inboxes
            .into_iter()
            .enumerate()
            .map(|(rank, inbox)| InProcessBus {
                rank,
                fleet: fleet.clone(),
                inbox,
                pending: Mutex::new(VecDeque::new()),
            })
            .collect()
    }

    fn matches(envelope: &Envelope, source: Option<usize>, tag: Option<MessageTag>) -> bool {
        source.map(|s| s == envelope.source).unwrap_or(true)
            && tag.map(|t| t == envelope.tag).unwrap_or(true)
    }

    /// Drains every message currently sitting in the channel (non-blocking)
    /// into `pending`, so `probe` can answer without consuming anything.
    fn drain_available(&self) {
        let mut pending = self.pending.lock();
        while let Ok(envelope) = self.inbox.try_recv() {
            pending.push_back(envelope);
        }
    }
}

impl MessageBus for InProcessBus {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.fleet.senders.len()
    }

    fn send(
        &self,
        payload: Payload,
        dest: usize,
        tag: MessageTag,
        _blocking: bool,
    ) -> Result<Option<Box<dyn SendHandle>>> {
        let envelope = Envelope {
            source: self.rank,
            tag,
            payload,
        };
        self.fleet.senders[dest].send(envelope).map_err(|_| {
            EngineError::BusProtocolViolation(format!("rank {dest} is no longer listening"))
        })?;
        Ok(Some(Box::new(DeliveredHandle)))
    }

    fn probe(&self, source: Option<usize>, tag: Option<MessageTag>) -> bool {
        self.drain_available();
        self.pending
            .lock()
            .iter()
            .any(|e| Self::matches(e, source, tag))
    }

    fn recv_any(&self) -> Result<(Payload, usize, MessageTag)> {
        if let Some(envelope) = self.pending.lock().pop_front() {
            return Ok((envelope.payload, envelope.source, envelope.tag));
        }
        let envelope = self.inbox.recv().map_err(|_| {
            EngineError::BusProtocolViolation(format!("rank {} inbox disconnected", self.rank))
        })?;
        Ok((envelope.payload, envelope.source, envelope.tag))
    }

    fn recv(&self, source: usize, tag: MessageTag) -> Result<Payload> {
        {
            let mut pending = self.pending.lock();
            if let Some(pos) = pending
                .iter()
                .position(|e| Self::matches(e, Some(source), Some(tag)))
            {
                return Ok(pending.remove(pos).unwrap().payload);
            }
        }
        loop {
            let envelope = self.inbox.recv().map_err(|_| {
                EngineError::BusProtocolViolation(format!(
                    "rank {} inbox disconnected waiting for rank {source}",
                    self.rank
                ))
            })?;
            if Self::matches(&envelope, Some(source), Some(tag)) {
                return Ok(envelope.payload);
            }
            self.pending.lock().push_back(envelope);
        }
    }

    fn all_gather(&self, contribution: Vec<store::WriteIntent>) -> Result<Vec<Vec<store::WriteIntent>>> {
        {
            let mut state = self.fleet.gather.lock();
            state.slots[self.rank] = Some(contribution);
        }
        self.fleet.gather_entry.wait();
        let collected: Vec<Vec<store::WriteIntent>> = {
            let state = self.fleet.gather.lock();
            state
                .slots
                .iter()
                .map(|slot| slot.clone().unwrap_or_default())
                .collect()
        };
        self.fleet.gather_exit.wait();
        Ok(collected)
    }

    fn barrier(&self) {
        self.fleet.barrier.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{MessageTag, Payload};
    use common::{JobArgs, StationId, Tag};
    use std::thread;

    #[test]
    fn targeted_recv_skips_mismatched_messages() {
        let mut ranks = InProcessBus::fleet(2);
        let worker = ranks.remove(1);
        let master = ranks.remove(0);

        master
            .send(Payload::Empty, 1, MessageTag::MasterForcesWrite, true)
            .unwrap();
        master
            .send(
                Payload::Item(JobArgs::new(StationId::from("A"), Tag::from("raw"))),
                1,
                MessageTag::MasterSendsItem,
                true,
            )
            .unwrap();

        // Ask for MasterSendsItem first even though MasterForcesWrite
        // arrived earlier; recv must skip past it without losing it.
        let item = worker.recv(0, MessageTag::MasterSendsItem).unwrap();
        assert_eq!(
            item,
            Payload::Item(JobArgs::new(StationId::from("A"), Tag::from("raw")))
        );
        assert!(worker.probe(Some(0), Some(MessageTag::MasterForcesWrite)));
    }

    #[test]
    fn all_gather_returns_contributions_in_rank_order() {
        let ranks = InProcessBus::fleet(3);
        let handles: Vec<_> = ranks
            .into_iter()
            .map(|bus| {
                thread::spawn(move || {
                    let contribution = vec![]; // empty WriteIntent lists suffice for ordering
                    let _ = bus.rank();
                    bus.all_gather(contribution).unwrap().len()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), 3);
        }
    }

    #[test]
    fn barrier_releases_all_participants() {
        let ranks = InProcessBus::fleet(4);
        let handles: Vec<_> = ranks
            .into_iter()
            .map(|bus| thread::spawn(move || bus.barrier()))
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
    }
}
