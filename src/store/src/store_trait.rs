// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use crate::types::{EventCatalog, Stream, StationXml, WriteIntent, Trace};
use common::{EngineError, Result, StationId, Tag};
use std::collections::BTreeSet;

/// The operations the processing engine needs from the underlying
/// container. The bit-exact on-disk layout is out of scope; only the
/// behavior below is contractually required.
///
/// `write_collective` must be invoked with identical arguments on every
/// process bound to the same file under the distributed backend before any
/// of them proceeds past it; `write_independent` carries no such
/// requirement. See the module-level docs on `MemoryStore` for how the
/// reference implementation honors that split despite being single-process.
pub trait Store: Send + Sync {
    /// Sorted station ids with waveform data available to read.
    fn stations(&self) -> Vec<StationId>;

    /// Tags available for a station, derived from dataset names.
    fn tags_for(&self, station: &StationId) -> BTreeSet<Tag>;

    fn has_station_metadata(&self, station: &StationId) -> bool;

    fn read_waveform_and_station(
        &self,
        station: &StationId,
        tag: &Tag,
    ) -> Result<(Stream, Option<StationXml>)>;

    /// Describes, without performing, the collective write that would
    /// create the dataset for `trace` under `output_tag`, decorated with
    /// this store's configured compression policy.
    fn describe_collective_write(&self, output_tag: &Tag, trace: &Trace) -> WriteIntent;

    /// Creates the group/dataset described by `intent`. Re-applying an
    /// intent for an already-present path is an error, not a silent no-op.
    fn write_collective(&self, intent: &WriteIntent) -> Result<()>;

    /// Bulk-copies `trace`'s samples into the dataset identified by
    /// `intent`. The dataset must already exist (a prior `write_collective`
    /// for the same path).
    fn write_independent(&self, intent: &WriteIntent, trace: &Trace) -> Result<()>;

    fn station_xml(&self, station: &StationId) -> Option<StationXml>;

    /// Copies `station`'s StationXML from `from` onto this store.
    fn copy_station_xml(&self, from: &dyn Store, station: &StationId) -> Result<()>;

    fn write_events(&self, catalog: &EventCatalog) -> Result<()>;

    /// Whether this store was opened with a message bus attached. When
    /// true, collective writes must not carry compression or per-block
    /// checksums (see `CompressionPolicy` handling in `MemoryStore::open`).
    fn bus_attached(&self) -> bool;

    /// Escape hatch for tests and embedders that need to downcast a
    /// `dyn Store` back to its concrete type, e.g. to inspect
    /// `MemoryStore`'s fixture helpers after a `process()` call.
    fn as_any(&self) -> &dyn std::any::Any;
}

pub(crate) fn duplicate_dataset_error(path: &str) -> EngineError {
    EngineError::DuplicateDataset {
        path: path.to_string(),
    }
}
