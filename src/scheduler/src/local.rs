// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use crate::fork_safety::ForkSafety;
use crate::safe_transform;
use common::{EngineError, JobArgs, Result, TagMap, WorkerId};
use config::{EngineConfig, LocalConfig};
use jobqueue::{JobQueue, JobResult};
use parking_lot::Mutex;
use std::sync::Arc;
use store::{Store, Transform};

pub struct LocalSummary {
    pub total: usize,
    pub written: usize,
    pub dropped: usize,
}

/// The one place this crate touches real process environment state.
/// Isolated behind a single function, rather than calling `std::env::set_var`
/// inline at the call site, so the local scheduler's default test
/// configuration (`NumericalLibrary::Auto`, never routed here) never
/// mutates it.
fn force_openblas_single_threaded() {
    std::env::set_var("OPENBLAS_NUM_THREADS", "1");
}

/// Drives the same (station, tag) job set as the distributed scheduler
/// over a local thread pool, sidestepping the collective-metadata protocol
/// entirely by serializing input and output store access behind one mutex
/// per file (§4.6). Dispatch reuses the same `JobQueue` the distributed
/// master uses, just protected by a lock instead of message passing.
///
/// `fork_safety` is consulted only to decide how loudly to log: this
/// implementation always runs an OS-thread pool rather than forking, since
/// there is no portable, safe way to `fork()` a multi-threaded Rust
/// process. See `ForkSafety` for the platform detection this still
/// performs, documented in DESIGN.md as a resolved open question.
pub fn run(
    input_store: Arc<dyn Store>,
    output_store: Arc<dyn Store>,
    transform: Arc<dyn Transform>,
    tag_map: Arc<TagMap>,
    jobs: Vec<JobArgs>,
    config: &EngineConfig,
) -> Result<LocalSummary> {
    if jobs.is_empty() {
        return Err(EngineError::EmptyJobSet);
    }

    let fork_safety = ForkSafety::resolve(config.local().fork_safety);
    if fork_safety == ForkSafety::Unsafe {
        tracing::warn!("numerical library is not fork-safe; using a thread pool");
    }
    if config.local().numerical_library == config::NumericalLibrary::OpenBlas {
        force_openblas_single_threaded();
    }

    let worker_count = config.local().worker_threads().min(jobs.len()).max(1);
    let queue = Arc::new(Mutex::new(JobQueue::new(jobs)));
    let input_lock = Arc::new(Mutex::new(()));
    let output_lock = Arc::new(Mutex::new(()));

    let mut handles = Vec::with_capacity(worker_count);
    for idx in 0..worker_count {
        let queue = queue.clone();
        let input_store = input_store.clone();
        let output_store = output_store.clone();
        let input_lock = input_lock.clone();
        let output_lock = output_lock.clone();
        let transform = transform.clone();
        let tag_map = tag_map.clone();

        handles.push(
            std::thread::Builder::new()
                .name(format!("seismic-local-worker-{idx}"))
                .spawn(move || {
                    worker_loop(
                        WorkerId(idx),
                        queue.as_ref(),
                        input_store.as_ref(),
                        output_store.as_ref(),
                        input_lock.as_ref(),
                        output_lock.as_ref(),
                        transform.as_ref(),
                        tag_map.as_ref(),
                    )
                })
                .expect("failed to spawn local worker thread"),
        );
    }

    for handle in handles {
        handle.join().expect("local worker thread panicked")?;
    }

    let queue = queue.lock();
    let mut written = 0;
    let mut dropped = 0;
    for (_, result) in queue.results() {
        match result {
            JobResult::Written { .. } => written += 1,
            JobResult::Dropped => dropped += 1,
        }
    }

    Ok(LocalSummary {
        total: queue.total(),
        written,
        dropped,
    })
}

#[allow(clippy::too_many_arguments)]
fn worker_loop(
    id: WorkerId,
    queue: &Mutex<JobQueue>,
    input_store: &dyn Store,
    output_store: &dyn Store,
    input_lock: &Mutex<()>,
    output_lock: &Mutex<()>,
    transform: &dyn Transform,
    tag_map: &TagMap,
) -> Result<()> {
    loop {
        let args = queue.lock().get_job_for(id);
        let args = match args {
            Some(args) => args,
            None => break,
        };
        crate::metrics::JOBS_DISPATCHED.increment();

        let (stream, station_xml) = {
            let _guard = input_lock.lock();
            input_store.read_waveform_and_station(&args.station, &args.tag)?
        };

        let transformed = safe_transform::apply(transform, stream, station_xml.as_ref(), &args);

        let result = match transformed {
            Some(stream) if !stream.is_empty() => {
                let output_tag = tag_map.get(&args.tag).ok_or_else(|| {
                    EngineError::BusProtocolViolation(format!(
                        "{args}: dispatched job has no tag-map entry"
                    ))
                })?;
                let _guard = output_lock.lock();
                for trace in &stream.traces {
                    let intent = output_store.describe_collective_write(output_tag, trace);
                    output_store.write_collective(&intent)?;
                    output_store.write_independent(&intent, trace)?;
                }
                JobResult::Written {
                    trace_count: stream.traces.len(),
                }
            }
            _ => JobResult::Dropped,
        };

        match result {
            JobResult::Written { .. } => crate::metrics::JOBS_WRITTEN.increment(),
            JobResult::Dropped => crate::metrics::JOBS_DROPPED.increment(),
        };

        queue.lock().complete(args, result, id)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{SamplingRate, StationId, Tag};
    use store::{MemoryStore, Stream, Trace};

    fn trace(station: &str, n: usize) -> Trace {
        Trace {
            network: "IU".into(),
            station: station.into(),
            location: "00".into(),
            channel: "BHZ".into(),
            starttime: 0.into(),
            sampling_rate: SamplingRate(100.0),
            samples: vec![1.0; n],
            event_id: None,
            origin_id: None,
            magnitude_id: None,
            focal_mechanism_id: None,
        }
    }

    fn identity_transform(stream: Stream, _: Option<&store::StationXml>) -> Option<Stream> {
        Some(stream)
    }

    #[test]
    fn processes_every_job_exactly_once() {
        let input = Arc::new(MemoryStore::open(config::CompressionPolicy::default(), false));
        let output = Arc::new(MemoryStore::open(config::CompressionPolicy::default(), false));

        let mut jobs = Vec::new();
        let mut tag_map = TagMap::new();
        tag_map.insert(Tag::from("raw"), Tag::from("processed"));

        for station in ["A", "B", "C"] {
            input.seed_waveform(
                Tag::from("raw"),
                Stream {
                    station: StationId::from(station),
                    traces: vec![trace(station, 10)],
                },
            );
            jobs.push(JobArgs::new(StationId::from(station), Tag::from("raw")));
        }

        let config = EngineConfig::default();
        let summary = run(
            input,
            output.clone(),
            Arc::new(identity_transform as fn(Stream, Option<&store::StationXml>) -> Option<Stream>),
            Arc::new(tag_map),
            jobs,
            &config,
        )
        .unwrap();

        assert_eq!(summary.total, 3);
        assert_eq!(summary.written, 3);
        assert_eq!(summary.dropped, 0);
        assert_eq!(output.dataset_count(), 3);
    }

    #[test]
    fn empty_job_set_is_fatal() {
        let input = Arc::new(MemoryStore::open(config::CompressionPolicy::default(), false));
        let output = Arc::new(MemoryStore::open(config::CompressionPolicy::default(), false));
        let config = EngineConfig::default();
        let err = run(
            input,
            output,
            Arc::new(identity_transform as fn(Stream, Option<&store::StationXml>) -> Option<Stream>),
            Arc::new(TagMap::new()),
            Vec::new(),
            &config,
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::EmptyJobSet));
    }

    #[test]
    fn default_config_never_touches_openblas_env() {
        std::env::remove_var("OPENBLAS_NUM_THREADS");
        let input = Arc::new(MemoryStore::open(config::CompressionPolicy::default(), false));
        let output = Arc::new(MemoryStore::open(config::CompressionPolicy::default(), false));
        let mut tag_map = TagMap::new();
        tag_map.insert(Tag::from("raw"), Tag::from("processed"));
        input.seed_waveform(
            Tag::from("raw"),
            Stream {
                station: StationId::from("A"),
                traces: vec![trace("A", 10)],
            },
        );

        run(
            input,
            output,
            Arc::new(identity_transform as fn(Stream, Option<&store::StationXml>) -> Option<Stream>),
            Arc::new(tag_map),
            vec![JobArgs::new(StationId::from("A"), Tag::from("raw"))],
            &EngineConfig::default(),
        )
        .unwrap();

        assert!(std::env::var("OPENBLAS_NUM_THREADS").is_err());
    }

    #[test]
    fn openblas_numerical_library_forces_single_thread_env() {
        std::env::remove_var("OPENBLAS_NUM_THREADS");
        let input = Arc::new(MemoryStore::open(config::CompressionPolicy::default(), false));
        let output = Arc::new(MemoryStore::open(config::CompressionPolicy::default(), false));
        let mut tag_map = TagMap::new();
        tag_map.insert(Tag::from("raw"), Tag::from("processed"));
        input.seed_waveform(
            Tag::from("raw"),
            Stream {
                station: StationId::from("A"),
                traces: vec![trace("A", 10)],
            },
        );

        let mut config = EngineConfig::default();
        config.local.numerical_library = config::NumericalLibrary::OpenBlas;

        run(
            input,
            output,
            Arc::new(identity_transform as fn(Stream, Option<&store::StationXml>) -> Option<Stream>),
            Arc::new(tag_map),
            vec![JobArgs::new(StationId::from("A"), Tag::from("raw"))],
            &config,
        )
        .unwrap();

        assert_eq!(std::env::var("OPENBLAS_NUM_THREADS").as_deref(), Ok("1"));
        std::env::remove_var("OPENBLAS_NUM_THREADS");
    }
}
