// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use common::JobArgs;
use std::panic::{catch_unwind, AssertUnwindSafe};
use store::{StationXml, Stream, Transform};

/// Applies `transform`, catching a panic the same way both scheduler
/// backends must recover from a raised transform: logged, job dropped,
/// scheduler continues. A `None` return is passed straight through.
pub fn apply(
    transform: &dyn Transform,
    stream: Stream,
    station_xml: Option<&StationXml>,
    job: &JobArgs,
) -> Option<Stream> {
    match catch_unwind(AssertUnwindSafe(|| transform.apply(stream, station_xml))) {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(%job, "transform panicked; dropping job");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::StationId;

    fn job() -> JobArgs {
        JobArgs::new(StationId::from("A"), common::Tag::from("raw"))
    }

    fn empty_stream() -> Stream {
        Stream {
            station: StationId::from("A"),
            traces: vec![],
        }
    }

    #[test]
    fn panicking_transform_is_treated_as_dropped() {
        let panics = |_: Stream, _: Option<&StationXml>| -> Option<Stream> {
            panic!("boom")
        };
        let result = apply(&panics, empty_stream(), None, &job());
        assert!(result.is_none());
    }

    #[test]
    fn ordinary_none_passes_through() {
        let drops = |_: Stream, _: Option<&StationXml>| None;
        let result = apply(&drops, empty_stream(), None, &job());
        assert!(result.is_none());
    }
}
