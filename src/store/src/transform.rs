// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use crate::types::{StationXml, Stream};

/// The user-supplied transform applied to every (station, tag) pair: reads
/// in a `Stream` and the station's metadata (when present), returns the
/// stream to write under the renamed tag, or `None` to drop the job
/// entirely. Must be pure from the engine's point of view — side effects
/// on `stream` are undefined and never relied upon.
///
/// A transform is free to panic; both scheduler backends catch that at the
/// call site, log it, and drop the job, exactly as they do for an ordinary
/// `None` return. The trait itself makes no attempt to be panic-safe.
pub trait Transform: Send + Sync {
    fn apply(&self, stream: Stream, station_xml: Option<&StationXml>) -> Option<Stream>;
}

impl<F> Transform for F
where
    F: Fn(Stream, Option<&StationXml>) -> Option<Stream> + Send + Sync,
{
    fn apply(&self, stream: Stream, station_xml: Option<&StationXml>) -> Option<Stream> {
        self(stream, station_xml)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Trace;
    use common::SamplingRate;

    fn trace(samples: Vec<f32>) -> Trace {
        Trace {
            network: "IU".into(),
            station: "ANMO".into(),
            location: "00".into(),
            channel: "BHZ".into(),
            starttime: 0.into(),
            sampling_rate: SamplingRate(100.0),
            samples,
            event_id: None,
            origin_id: None,
            magnitude_id: None,
            focal_mechanism_id: None,
        }
    }

    #[test]
    fn closure_transform_scales_samples() {
        let double = |mut stream: Stream, _xml: Option<&StationXml>| {
            for trace in &mut stream.traces {
                for sample in &mut trace.samples {
                    *sample *= 2.0;
                }
            }
            Some(stream)
        };

        let stream = Stream {
            station: common::StationId::from("ANMO"),
            traces: vec![trace(vec![1.0, 2.0, 3.0])],
        };
        let out = double.apply(stream, None).unwrap();
        assert_eq!(out.traces[0].samples, vec![2.0, 4.0, 6.0]);
    }

    #[test]
    fn closure_transform_may_drop_the_job() {
        let drop_everything = |_stream: Stream, _xml: Option<&StationXml>| None;
        let stream = Stream {
            station: common::StationId::from("ANMO"),
            traces: vec![trace(vec![1.0])],
        };
        assert!(drop_everything.apply(stream, None).is_none());
    }
}
