// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use common::{Nanoseconds, SamplingRate, StationId, Tag};
use config::CompressionPolicy;
use std::collections::BTreeMap;

/// One channel's time series over one contiguous interval.
#[derive(Clone, Debug)]
pub struct Trace {
    pub network: String,
    pub station: String,
    pub location: String,
    pub channel: String,
    pub starttime: Nanoseconds,
    pub sampling_rate: SamplingRate,
    pub samples: Vec<f32>,
    pub event_id: Option<String>,
    pub origin_id: Option<String>,
    pub magnitude_id: Option<String>,
    pub focal_mechanism_id: Option<String>,
}

impl Trace {
    /// Approximate in-memory footprint: the raw sample payload plus a fixed
    /// per-trace overhead for the metadata bundle, matching the
    /// `StreamBuffer` sizing contract.
    pub fn approx_byte_size(&self) -> usize {
        const PER_TRACE_OVERHEAD: usize = 256;
        self.samples.len() * std::mem::size_of::<f32>() + PER_TRACE_OVERHEAD
    }
}

/// An ordered collection of `Trace`s belonging to one station, as produced
/// by reading the input store for a (station, tag) and as returned by the
/// caller-supplied transform.
#[derive(Clone, Debug)]
pub struct Stream {
    pub station: StationId,
    pub traces: Vec<Trace>,
}

impl Stream {
    pub fn new(station: StationId) -> Self {
        Self {
            station,
            traces: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }

    pub fn approx_byte_size(&self) -> usize {
        self.traces.iter().map(Trace::approx_byte_size).sum()
    }
}

/// Opaque station-metadata document. Parsing StationXML is out of scope;
/// the engine only ever copies this blob between stores.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StationXml(pub Vec<u8>);

/// Opaque event catalog document, copied wholesale onto the output store.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct EventCatalog(pub Vec<u8>);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElementType {
    F32,
    F64,
    I32,
    I64,
}

#[derive(Clone, Debug, PartialEq)]
pub enum AttributeValue {
    Int(i64),
    Float(f64),
    Text(String),
}

/// A description of a single dataset to be created in the output store,
/// decoupling the metadata-modifying phase from the bulk-data phase.
/// Produced on a worker, gathered across the bus, and replayed identically
/// on every rank during the collective phase.
#[derive(Clone, Debug, PartialEq)]
pub struct WriteIntent {
    pub group_path: String,
    pub dataset_name: String,
    pub shape: Vec<usize>,
    pub element_type: ElementType,
    pub compression: CompressionPolicy,
    pub attributes: BTreeMap<String, AttributeValue>,
}

impl WriteIntent {
    /// The full `group_path/dataset_name` key datasets are indexed by.
    pub fn path(&self) -> String {
        format!("{}/{}", self.group_path, self.dataset_name)
    }
}
