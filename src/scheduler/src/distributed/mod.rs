// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

pub mod master;
pub mod worker;

use common::{JobArgs, Result, TagMap};
use config::EngineConfig;
use queues::MessageBus;
use std::sync::Arc;
use store::{Store, Transform};

pub use master::MasterSummary;
pub use worker::WorkerSummary;

pub struct DistributedSummary {
    pub total: usize,
    pub written: usize,
    pub dropped: usize,
}

/// Runs the distributed scheduler end to end: rank 0 plays master on the
/// calling thread, ranks 1..N-1 each get their own OS thread playing
/// worker. `buses.len()` fixes the fleet size; `buses[0]` must be rank 0.
///
/// All ranks share one `input_store`/`output_store` handle — see
/// `collective::gather_and_apply` for why that is sound despite the
/// protocol being designed for independent per-process handles.
pub fn run(
    buses: Vec<Arc<dyn MessageBus>>,
    input_store: Arc<dyn Store>,
    output_store: Arc<dyn Store>,
    transform: Arc<dyn Transform>,
    tag_map: Arc<TagMap>,
    jobs: Vec<JobArgs>,
    config: Arc<EngineConfig>,
) -> Result<DistributedSummary> {
    assert!(
        buses.len() >= 2,
        "distributed scheduler needs rank 0 plus at least one worker"
    );
    let worker_count = buses.len() - 1;

    let mut handles = Vec::with_capacity(worker_count);
    for bus in buses.iter().skip(1).cloned() {
        let input_store = input_store.clone();
        let output_store = output_store.clone();
        let transform = transform.clone();
        let tag_map = tag_map.clone();
        let config = config.clone();
        let rank = bus.rank();
        handles.push(
            std::thread::Builder::new()
                .name(format!("seismic-worker-{rank}"))
                .spawn(move || {
                    worker::run(
                        bus.as_ref(),
                        input_store.as_ref(),
                        output_store.as_ref(),
                        transform.as_ref(),
                        tag_map.as_ref(),
                        config.as_ref(),
                    )
                })
                .expect("failed to spawn distributed worker thread"),
        );
    }

    let master_summary = master::run(
        buses[0].as_ref(),
        output_store.as_ref(),
        jobs,
        worker_count,
        config.as_ref(),
    )?;

    for handle in handles {
        handle
            .join()
            .expect("distributed worker thread panicked")?;
    }

    Ok(DistributedSummary {
        total: master_summary.total,
        written: master_summary.written,
        dropped: master_summary.dropped,
    })
}
