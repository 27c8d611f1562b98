// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use crate::factory::StoreFactory;
use crate::naming::{dataset_name, tag_from_dataset_name};
use crate::store_trait::{duplicate_dataset_error, Store};
use crate::types::{AttributeValue, ElementType, EventCatalog, Stream, StationXml, Trace, WriteIntent};
use common::{warn_once, EngineError, Result, StationId, Tag};
use config::{CompressionCodec, CompressionPolicy};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

struct Dataset {
    intent: WriteIntent,
    samples: Option<Vec<f32>>,
}

#[derive(Default)]
struct Inner {
    /// Pre-seeded (or previously processed) waveform data, keyed by
    /// (station, tag) as read from the source dataset names.
    waveforms: BTreeMap<(StationId, Tag), Stream>,
    station_xml: BTreeMap<StationId, StationXml>,
    events: Option<EventCatalog>,
    datasets: BTreeMap<String, Dataset>,
}

/// An in-memory stand-in for the container file. Keeps a group/dataset tree
/// behind a single `RwLock`, which is enough to exercise every operation in
/// the `Store` contract — including the collective/independent split and
/// the "duplicate collective write is an error" rule — without depending on
/// a real container file format.
///
/// Because this implementation is single-process, `write_collective` has no
/// actual cross-process synchronization to perform; it only needs to
/// preserve the externally observable sequencing (no independent write
/// before its matching collective write), which it does by rejecting an
/// independent write against a path that was never collectively created.
pub struct MemoryStore {
    inner: RwLock<Inner>,
    compression: CompressionPolicy,
    bus_attached: bool,
}

impl MemoryStore {
    /// Opens a fresh, empty store. `bus_attached` mirrors whether a message
    /// bus backs the run: when true, compression and per-block checksums
    /// are disabled regardless of the requested policy, with a one-time
    /// warning, because the parallel container format does not support
    /// them.
    pub fn open(requested_compression: CompressionPolicy, bus_attached: bool) -> Self {
        let compression = if bus_attached && requested_compression.codec != CompressionCodec::None {
            warn_once!("compression and fletcher32 checksums are disabled automatically: not supported when a message bus is attached");
            CompressionPolicy {
                codec: CompressionCodec::None,
                level: 0,
            }
        } else {
            requested_compression
        };

        Self {
            inner: RwLock::new(Inner::default()),
            compression,
            bus_attached,
        }
    }

    /// Test/fixture helper: seeds input waveform data for (station, tag).
    pub fn seed_waveform(&self, tag: Tag, stream: Stream) {
        let mut inner = self.inner.write();
        inner.waveforms.insert((stream.station.clone(), tag), stream);
    }

    /// Test/fixture helper: seeds station metadata.
    pub fn seed_station_xml(&self, station: StationId, xml: StationXml) {
        self.inner.write().station_xml.insert(station, xml);
    }

    /// Returns the samples written for (station, tag) on the output side,
    /// for assertions in tests.
    pub fn dataset_samples(&self, station: &StationId, tag: &Tag) -> Vec<Vec<f32>> {
        let inner = self.inner.read();
        let prefix = format!("{}/", station.0);
        inner
            .datasets
            .iter()
            .filter(|(path, _)| {
                path.starts_with(&prefix) && tag_from_dataset_name(path).as_ref() == Some(tag)
            })
            .filter_map(|(_, d)| d.samples.clone())
            .collect()
    }

    pub fn dataset_count(&self) -> usize {
        self.inner.read().datasets.len()
    }

    pub fn events(&self) -> Option<EventCatalog> {
        self.inner.read().events.clone()
    }

    pub fn compression(&self) -> CompressionPolicy {
        self.compression
    }
}

impl Store for MemoryStore {
    fn stations(&self) -> Vec<StationId> {
        let inner = self.inner.read();
        let mut stations: BTreeSet<StationId> =
            inner.waveforms.keys().map(|(s, _)| s.clone()).collect();
        stations.extend(inner.station_xml.keys().cloned());
        stations.into_iter().collect()
    }

    fn tags_for(&self, station: &StationId) -> BTreeSet<Tag> {
        self.inner
            .read()
            .waveforms
            .keys()
            .filter(|(s, _)| s == station)
            .map(|(_, t)| t.clone())
            .collect()
    }

    fn has_station_metadata(&self, station: &StationId) -> bool {
        self.inner.read().station_xml.contains_key(station)
    }

    fn read_waveform_and_station(
        &self,
        station: &StationId,
        tag: &Tag,
    ) -> Result<(Stream, Option<StationXml>)> {
        let inner = self.inner.read();
        let stream = inner
            .waveforms
            .get(&(station.clone(), tag.clone()))
            .cloned()
            .ok_or_else(|| {
                EngineError::StoreIo(format!("no waveform for {station}/{tag}"))
            })?;
        let xml = inner.station_xml.get(station).cloned();
        Ok((stream, xml))
    }

    fn describe_collective_write(&self, output_tag: &Tag, trace: &Trace) -> WriteIntent {
        let name = dataset_name(trace, output_tag);
        let compression = self.compression;

        let mut attributes = BTreeMap::new();
        attributes.insert(
            "starttime".to_string(),
            AttributeValue::Int(trace.starttime.0),
        );
        attributes.insert(
            "sampling_rate".to_string(),
            AttributeValue::Float(trace.sampling_rate.0),
        );
        for (key, value) in [
            ("event_id", &trace.event_id),
            ("origin_id", &trace.origin_id),
            ("magnitude_id", &trace.magnitude_id),
            ("focal_mechanism_id", &trace.focal_mechanism_id),
        ] {
            if let Some(value) = value {
                attributes.insert(key.to_string(), AttributeValue::Text(value.clone()));
            }
        }

        WriteIntent {
            group_path: trace.station.clone(),
            dataset_name: name,
            shape: vec![trace.samples.len()],
            element_type: ElementType::F32,
            compression,
            attributes,
        }
    }

    fn write_collective(&self, intent: &WriteIntent) -> Result<()> {
        let mut inner = self.inner.write();
        let path = intent.path();
        if inner.datasets.contains_key(&path) {
            return Err(duplicate_dataset_error(&path));
        }
        inner.datasets.insert(
            path,
            Dataset {
                intent: intent.clone(),
                samples: None,
            },
        );
        Ok(())
    }

    fn write_independent(&self, intent: &WriteIntent, trace: &Trace) -> Result<()> {
        let mut inner = self.inner.write();
        let path = intent.path();
        let dataset = inner.datasets.get_mut(&path).ok_or_else(|| {
            EngineError::StoreIo(format!(
                "independent write for {path} has no matching collective write"
            ))
        })?;
        dataset.samples = Some(trace.samples.clone());
        Ok(())
    }

    fn station_xml(&self, station: &StationId) -> Option<StationXml> {
        self.inner.read().station_xml.get(station).cloned()
    }

    fn copy_station_xml(&self, from: &dyn Store, station: &StationId) -> Result<()> {
        if let Some(xml) = from.station_xml(station) {
            self.inner.write().station_xml.insert(station.clone(), xml);
        }
        Ok(())
    }

    fn write_events(&self, catalog: &EventCatalog) -> Result<()> {
        self.inner.write().events = Some(catalog.clone());
        Ok(())
    }

    fn bus_attached(&self) -> bool {
        self.bus_attached
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// Stand-in for a real container-file factory: "paths" are just opaque
/// keys in an in-memory registry, which is enough to exercise the
/// Processing API's "output path must not already exist" guard without a
/// filesystem.
#[derive(Default)]
pub struct MemoryStoreFactory {
    created: RwLock<HashSet<PathBuf>>,
}

impl MemoryStoreFactory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StoreFactory for MemoryStoreFactory {
    fn exists(&self, path: &Path) -> bool {
        self.created.read().contains(path)
    }

    fn create(
        &self,
        path: &Path,
        compression: CompressionPolicy,
        bus_attached: bool,
    ) -> Result<Arc<dyn Store>> {
        let mut created = self.created.write();
        if created.contains(path) {
            return Err(EngineError::OutputPathExists(path.to_path_buf()));
        }
        created.insert(path.to_path_buf());
        Ok(Arc::new(MemoryStore::open(compression, bus_attached)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::SamplingRate;

    fn sample_trace() -> Trace {
        Trace {
            network: "IU".into(),
            station: "ANMO".into(),
            location: "00".into(),
            channel: "BHZ".into(),
            starttime: 0.into(),
            sampling_rate: SamplingRate(100.0),
            samples: vec![1.0; 100],
            event_id: None,
            origin_id: None,
            magnitude_id: None,
            focal_mechanism_id: None,
        }
    }

    #[test]
    fn collective_then_independent_round_trips_samples() {
        let store = MemoryStore::open(CompressionPolicy::default(), false);
        let trace = sample_trace();
        let intent = store.describe_collective_write(&Tag::from("processed"), &trace);
        store.write_collective(&intent).unwrap();
        store.write_independent(&intent, &trace).unwrap();

        let samples = store.dataset_samples(&StationId::from("ANMO"), &Tag::from("processed"));
        assert_eq!(samples, vec![trace.samples.clone()]);
    }

    #[test]
    fn duplicate_collective_write_is_an_error() {
        let store = MemoryStore::open(CompressionPolicy::default(), false);
        let trace = sample_trace();
        let intent = store.describe_collective_write(&Tag::from("processed"), &trace);
        store.write_collective(&intent).unwrap();
        let err = store.write_collective(&intent).unwrap_err();
        assert!(matches!(err, EngineError::DuplicateDataset { .. }));
    }

    #[test]
    fn independent_write_without_collective_write_is_an_error() {
        let store = MemoryStore::open(CompressionPolicy::default(), false);
        let trace = sample_trace();
        let intent = store.describe_collective_write(&Tag::from("processed"), &trace);
        let err = store.write_independent(&intent, &trace).unwrap_err();
        assert!(matches!(err, EngineError::StoreIo(_)));
    }

    #[test]
    fn compression_is_disabled_automatically_when_bus_attached() {
        let store = MemoryStore::open(CompressionPolicy::default(), true);
        let trace = sample_trace();
        let intent = store.describe_collective_write(&Tag::from("processed"), &trace);
        assert_eq!(intent.compression.codec, CompressionCodec::None);
    }

    #[test]
    fn tags_for_derives_from_seeded_waveforms() {
        let store = MemoryStore::open(CompressionPolicy::default(), false);
        let station = StationId::from("ANMO");
        store.seed_waveform(
            Tag::from("raw"),
            Stream {
                station: station.clone(),
                traces: vec![sample_trace()],
            },
        );
        let tags = store.tags_for(&station);
        assert_eq!(tags, BTreeSet::from([Tag::from("raw")]));
    }
}
