// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use common::JobArgs;
use std::collections::HashMap;

/// A worker's in-memory cache of produced results, keyed by the job that
/// produced them. `size()` is an upper bound: raw sample payload plus
/// per-trace overhead, inflated by the configured safety margin, so a
/// worker that checks `size() >= max_bytes` before pulling another job
/// never undershoots its true footprint.
pub struct StreamBuffer {
    entries: HashMap<JobArgs, store::Stream>,
    size_safety_margin: f64,
}

impl StreamBuffer {
    pub fn new(size_safety_margin: f64) -> Self {
        Self {
            entries: HashMap::new(),
            size_safety_margin,
        }
    }

    /// Inserts the `Stream` produced for `args`. Replacing an existing
    /// entry for the same `args` would indicate the worker re-processed a
    /// job it already buffered, which the single-active-job invariant in
    /// `JobQueue` should prevent; we overwrite rather than error since this
    /// type has no visibility into that invariant itself.
    pub fn insert(&mut self, args: JobArgs, stream: store::Stream) {
        self.entries.insert(args, stream);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Upper-bound byte count across every buffered stream, including the
    /// 1% safety margin over the raw sample-plus-overhead estimate.
    pub fn size(&self) -> usize {
        let raw: usize = self.entries.values().map(store::Stream::approx_byte_size).sum();
        (raw as f64 * (1.0 + self.size_safety_margin)).ceil() as usize
    }

    pub fn iter(&self) -> impl Iterator<Item = (&JobArgs, &store::Stream)> {
        self.entries.iter()
    }

    pub fn drain(&mut self) -> Vec<(JobArgs, store::Stream)> {
        self.entries.drain().collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{StationId, Tag};
    use store::{Stream, Trace};

    fn job(station: &str, tag: &str) -> JobArgs {
        JobArgs::new(StationId::from(station), Tag::from(tag))
    }

    fn stream_with_samples(n: usize) -> Stream {
        Stream {
            station: StationId::from("A"),
            traces: vec![Trace {
                network: "IU".into(),
                station: "A".into(),
                location: "00".into(),
                channel: "BHZ".into(),
                starttime: 0.into(),
                sampling_rate: common::SamplingRate(100.0),
                samples: vec![0.0; n],
                event_id: None,
                origin_id: None,
                magnitude_id: None,
                focal_mechanism_id: None,
            }],
        }
    }

    #[test]
    fn size_includes_safety_margin() {
        let mut buffer = StreamBuffer::new(0.01);
        buffer.insert(job("A", "raw"), stream_with_samples(100));
        let raw = stream_with_samples(100).approx_byte_size();
        assert_eq!(buffer.size(), (raw as f64 * 1.01).ceil() as usize);
    }

    #[test]
    fn clear_empties_buffer() {
        let mut buffer = StreamBuffer::new(0.0);
        buffer.insert(job("A", "raw"), stream_with_samples(10));
        assert!(!buffer.is_empty());
        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.size(), 0);
    }

}
