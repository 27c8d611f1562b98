// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use common::Result;
use queues::MessageBus;
use store::{Store, WriteIntent};

/// Runs the `all_gather` half of the collective-metadata protocol (§4.5.3)
/// and, on the designated writer, replays every gathered `WriteIntent`
/// through `Store::write_collective`.
///
/// In a real distributed deployment every rank holds its own library
/// handle onto the same container file, and each must issue the identical
/// `write_collective` call for the binary format's collective requirement
/// to be satisfied. This implementation models ranks as threads sharing one
/// `Store` handle, so having every rank replay the call would trip the
/// store's own "re-applying an intent is an error" rule. Only the
/// designated writer (rank 0, the master) performs the call; every other
/// rank still participates in `all_gather` and the barrier that follows, so
/// the protocol's synchronization shape — and the option to swap in a
/// Store backed by genuinely independent per-rank handles later — is
/// preserved.
pub fn gather_and_apply(
    bus: &dyn MessageBus,
    store: &dyn Store,
    contribution: Vec<WriteIntent>,
    is_writer: bool,
) -> Result<()> {
    let gathered = bus.all_gather(contribution)?;
    if is_writer {
        for per_rank in gathered {
            for intent in per_rank {
                store.write_collective(&intent)?;
            }
        }
    }
    Ok(())
}
