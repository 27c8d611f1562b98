// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! The Processing API: the single entry point that ties the store,
//! job-queue, message bus, and scheduler crates together (§4.7).
//!
//! `process()` enumerates every (station, tag) pair the input store and
//! tag map agree on, pre-populates a freshly created output store with
//! station metadata and the event catalog on a single writer, then hands
//! the job list to whichever scheduler backend the caller configured.

use common::{EngineError, JobArgs, Result, StationId, TagMap};
use config::{EngineConfig, StoreConfig};
use queues::MessageBus;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use store::{EventCatalog, Store, StoreFactory, Transform};

/// Everything `process()` needs to run a single conversion.
pub struct ProcessRequest {
    pub input_store: Arc<dyn Store>,
    pub output_path: PathBuf,
    pub transform: Arc<dyn Transform>,
    pub tag_map: TagMap,
    pub events: EventCatalog,
    /// `Some(fleet)` with `fleet.len() >= 2` dispatches to the distributed
    /// scheduler; `None` (or a fleet of fewer than 2 ranks) dispatches to
    /// the local scheduler.
    pub bus_fleet: Option<Vec<Arc<dyn MessageBus>>>,
    pub config: EngineConfig,
}

/// Summary handed back once every job has been dispatched to completion.
pub struct ProcessSummary {
    pub output_store: Arc<dyn Store>,
    pub total_jobs: usize,
    pub written: usize,
    pub dropped: usize,
    /// Stations present in the input store but missing station metadata;
    /// skipped entirely, per §4.7 step 2 / the boundary behavior in §8.
    pub stations_without_metadata: Vec<StationId>,
}

pub fn process(request: ProcessRequest, factory: &dyn StoreFactory) -> Result<ProcessSummary> {
    let ProcessRequest {
        input_store,
        output_path,
        transform,
        tag_map,
        events,
        bus_fleet,
        config,
    } = request;

    if factory.exists(&output_path) {
        return Err(EngineError::OutputPathExists(output_path));
    }

    let (jobs, stations_without_metadata) = enumerate_jobs(input_store.as_ref(), &tag_map);
    if jobs.is_empty() {
        return Err(EngineError::EmptyJobSet);
    }

    let bus_attached = bus_fleet.as_ref().is_some_and(|fleet| fleet.len() >= 2);
    let output_store = factory.create(&output_path, config.store().compression, bus_attached)?;

    // A single writer populates station metadata and the event catalog
    // before any worker thread is spawned; program order alone gives us
    // the happens-before the spec asks for here; see DESIGN.md for why no
    // additional barrier is needed in a single-process, shared-Store
    // deployment.
    let stations_with_jobs: BTreeSet<StationId> =
        jobs.iter().map(|j| j.station.clone()).collect();
    for station in &stations_with_jobs {
        output_store.copy_station_xml(input_store.as_ref(), station)?;
    }
    output_store.write_events(&events)?;

    let tag_map = Arc::new(tag_map);

    let (total, written, dropped) = match bus_fleet {
        Some(fleet) if fleet.len() >= 2 => {
            let summary = scheduler::distributed::run(
                fleet,
                input_store,
                output_store.clone(),
                transform,
                tag_map,
                jobs,
                Arc::new(config),
            )?;
            (summary.total, summary.written, summary.dropped)
        }
        _ => {
            let summary = scheduler::local::run(
                input_store,
                output_store.clone(),
                transform,
                tag_map,
                jobs,
                &config,
            )?;
            (summary.total, summary.written, summary.dropped)
        }
    };

    Ok(ProcessSummary {
        output_store,
        total_jobs: total,
        written,
        dropped,
        stations_without_metadata,
    })
}

/// Enumerates every (station, tag) pair the schedulers should process:
/// stations with metadata, tags present as keys in `tag_map`. Stations
/// lacking metadata are skipped but reported for the caller's validation
/// summary, not silently dropped.
fn enumerate_jobs(
    input_store: &dyn Store,
    tag_map: &TagMap,
) -> (Vec<JobArgs>, Vec<StationId>) {
    let mut jobs = Vec::new();
    let mut stations_without_metadata = Vec::new();

    for station in input_store.stations() {
        if !input_store.has_station_metadata(&station) {
            stations_without_metadata.push(station);
            continue;
        }
        for tag in input_store.tags_for(&station) {
            if tag_map.contains_key(&tag) {
                jobs.push(JobArgs::new(station.clone(), tag));
            }
        }
    }

    (jobs, stations_without_metadata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{SamplingRate, Tag};
    use store::{MemoryStoreFactory, Stream, StationXml, Trace};

    fn trace(station: &str, value: f32) -> Trace {
        Trace {
            network: "IU".into(),
            station: station.into(),
            location: "00".into(),
            channel: "BHZ".into(),
            starttime: 0.into(),
            sampling_rate: SamplingRate(100.0),
            samples: vec![value; 100],
            event_id: None,
            origin_id: None,
            magnitude_id: None,
            focal_mechanism_id: None,
        }
    }

    fn doubling_transform(mut stream: Stream, _: Option<&StationXml>) -> Option<Stream> {
        for trace in &mut stream.traces {
            for sample in &mut trace.samples {
                *sample *= 2.0;
            }
        }
        Some(stream)
    }

    fn seeded_input(stations: &[&str]) -> Arc<dyn Store> {
        let input = store::MemoryStore::open(config::CompressionPolicy::default(), false);
        for station in stations {
            input.seed_station_xml(StationId::from(*station), StationXml(vec![1, 2, 3]));
            input.seed_waveform(
                Tag::from("raw"),
                Stream {
                    station: StationId::from(*station),
                    traces: vec![trace(station, 1.0)],
                },
            );
        }
        Arc::new(input)
    }

    #[test]
    fn local_backend_processes_every_station() {
        let input = seeded_input(&["A", "B"]);
        let mut tag_map = TagMap::new();
        tag_map.insert(Tag::from("raw"), Tag::from("processed"));

        let request = ProcessRequest {
            input_store: input,
            output_path: PathBuf::from("out.h5"),
            transform: Arc::new(doubling_transform as fn(Stream, Option<&StationXml>) -> Option<Stream>),
            tag_map,
            events: EventCatalog(vec![9, 9]),
            bus_fleet: None,
            config: EngineConfig::default(),
        };

        let factory = MemoryStoreFactory::new();
        let summary = process(request, &factory).unwrap();

        assert_eq!(summary.total_jobs, 2);
        assert_eq!(summary.written, 2);
        assert_eq!(summary.dropped, 0);
        assert!(summary.stations_without_metadata.is_empty());

        let samples = summary
            .output_store
            .as_any()
            .downcast_ref::<store::MemoryStore>()
            .unwrap()
            .dataset_samples(&StationId::from("A"), &Tag::from("processed"));
        assert_eq!(samples, vec![vec![2.0; 100]]);
    }

    #[test]
    fn station_missing_metadata_is_skipped_not_fatal() {
        let input = store::MemoryStore::open(config::CompressionPolicy::default(), false);
        input.seed_waveform(
            Tag::from("raw"),
            Stream {
                station: StationId::from("NOMETA"),
                traces: vec![trace("NOMETA", 1.0)],
            },
        );
        input.seed_station_xml(StationId::from("A"), StationXml(vec![1]));
        input.seed_waveform(
            Tag::from("raw"),
            Stream {
                station: StationId::from("A"),
                traces: vec![trace("A", 1.0)],
            },
        );

        let mut tag_map = TagMap::new();
        tag_map.insert(Tag::from("raw"), Tag::from("processed"));

        let request = ProcessRequest {
            input_store: Arc::new(input),
            output_path: PathBuf::from("out.h5"),
            transform: Arc::new(doubling_transform as fn(Stream, Option<&StationXml>) -> Option<Stream>),
            tag_map,
            events: EventCatalog::default(),
            bus_fleet: None,
            config: EngineConfig::default(),
        };

        let factory = MemoryStoreFactory::new();
        let summary = process(request, &factory).unwrap();

        assert_eq!(summary.total_jobs, 1);
        assert_eq!(
            summary.stations_without_metadata,
            vec![StationId::from("NOMETA")]
        );
    }

    #[test]
    fn empty_job_set_is_fatal() {
        let input = store::MemoryStore::open(config::CompressionPolicy::default(), false);
        let request = ProcessRequest {
            input_store: Arc::new(input),
            output_path: PathBuf::from("out.h5"),
            transform: Arc::new(doubling_transform as fn(Stream, Option<&StationXml>) -> Option<Stream>),
            tag_map: TagMap::new(),
            events: EventCatalog::default(),
            bus_fleet: None,
            config: EngineConfig::default(),
        };
        let factory = MemoryStoreFactory::new();
        let err = process(request, &factory).unwrap_err();
        assert!(matches!(err, EngineError::EmptyJobSet));
    }

    #[test]
    fn existing_output_path_is_fatal() {
        let factory = MemoryStoreFactory::new();
        factory
            .create(
                std::path::Path::new("out.h5"),
                config::CompressionPolicy::default(),
                false,
            )
            .unwrap();

        let input = seeded_input(&["A"]);
        let mut tag_map = TagMap::new();
        tag_map.insert(Tag::from("raw"), Tag::from("processed"));

        let request = ProcessRequest {
            input_store: input,
            output_path: PathBuf::from("out.h5"),
            transform: Arc::new(doubling_transform as fn(Stream, Option<&StationXml>) -> Option<Stream>),
            tag_map,
            events: EventCatalog::default(),
            bus_fleet: None,
            config: EngineConfig::default(),
        };
        let err = process(request, &factory).unwrap_err();
        assert!(matches!(err, EngineError::OutputPathExists(_)));
    }

    #[test]
    fn distributed_backend_matches_local_backend_output() {
        let input = seeded_input(&["A", "B", "C"]);
        let mut tag_map = TagMap::new();
        tag_map.insert(Tag::from("raw"), Tag::from("processed"));

        let fleet: Vec<Arc<dyn MessageBus>> = queues::InProcessBus::fleet(4)
            .into_iter()
            .map(|bus| Arc::new(bus) as Arc<dyn MessageBus>)
            .collect();

        let request = ProcessRequest {
            input_store: input,
            output_path: PathBuf::from("out.h5"),
            transform: Arc::new(doubling_transform as fn(Stream, Option<&StationXml>) -> Option<Stream>),
            tag_map,
            events: EventCatalog(vec![1]),
            bus_fleet: Some(fleet),
            config: EngineConfig::default(),
        };

        let factory = MemoryStoreFactory::new();
        let summary = process(request, &factory).unwrap();

        assert_eq!(summary.total_jobs, 3);
        assert_eq!(summary.written, 3);
        let output = summary
            .output_store
            .as_any()
            .downcast_ref::<store::MemoryStore>()
            .unwrap();
        for station in ["A", "B", "C"] {
            let samples = output.dataset_samples(&StationId::from(station), &Tag::from("processed"));
            assert_eq!(samples, vec![vec![2.0; 100]]);
        }
    }
}
