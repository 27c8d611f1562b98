// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use crate::types::Trace;
use common::Tag;

/// Renders the `net.sta.loc.cha__YYYY-MM-DDTHH:MM:SS__YYYY-MM-DDTHH:MM:SS__tag`
/// dataset-naming convention. Start and end timestamps are rendered from
/// integer nanoseconds; the container format itself is out of scope, so
/// this is the one place that convention is encoded/decoded.
pub fn dataset_name(trace: &Trace, tag: &Tag) -> String {
    let start = nanos_to_iso(trace.starttime.0);
    let duration_ns = if trace.sampling_rate.0 > 0.0 && !trace.samples.is_empty() {
        ((trace.samples.len() as f64 - 1.0) / trace.sampling_rate.0 * 1e9) as i64
    } else {
        0
    };
    let end = nanos_to_iso(trace.starttime.0 + duration_ns);
    format!(
        "{}.{}.{}.{}__{}__{}__{}",
        trace.network, trace.station, trace.location, trace.channel, start, end, tag.0
    )
}

/// Splits a dataset name on `__` and returns the last component, which is
/// the tag by convention.
pub fn tag_from_dataset_name(name: &str) -> Option<Tag> {
    name.rsplit("__").next().map(Tag::from)
}

fn nanos_to_iso(nanos: i64) -> String {
    const NANOS_PER_SEC: i64 = 1_000_000_000;
    let secs = nanos.div_euclid(NANOS_PER_SEC);
    let (year, month, day, hour, minute, second) = civil_from_unix(secs);
    format!(
        "{year:04}-{month:02}-{day:02}T{hour:02}:{minute:02}:{second:02}"
    )
}

/// Converts a Unix timestamp (seconds) to a proleptic-Gregorian civil date
/// and time of day, using Howard Hinnant's `civil_from_days` algorithm. Pure
/// integer arithmetic, no calendar crate pulled in just for dataset names.
fn civil_from_unix(total_secs: i64) -> (i64, u32, u32, u32, u32, u32) {
    let days = total_secs.div_euclid(86_400);
    let secs_of_day = total_secs.rem_euclid(86_400);
    let hour = (secs_of_day / 3600) as u32;
    let minute = ((secs_of_day % 3600) / 60) as u32;
    let second = (secs_of_day % 60) as u32;

    let z = days + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = (z - era * 146_097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    let year = if month <= 2 { y + 1 } else { y };

    (year, month, day, hour, minute, second)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::SamplingRate;

    fn trace(starttime_ns: i64, rate: f64, n: usize) -> Trace {
        Trace {
            network: "IU".into(),
            station: "ANMO".into(),
            location: "00".into(),
            channel: "BHZ".into(),
            starttime: starttime_ns.into(),
            sampling_rate: SamplingRate(rate),
            samples: vec![0.0; n],
            event_id: None,
            origin_id: None,
            magnitude_id: None,
            focal_mechanism_id: None,
        }
    }

    #[test]
    fn renders_convention() {
        let t = trace(0, 100.0, 100);
        let name = dataset_name(&t, &Tag::from("raw"));
        assert_eq!(
            name,
            "IU.ANMO.00.BHZ__1970-01-01T00:00:00__1970-01-01T00:00:00__raw"
        );
    }

    #[test]
    fn tag_is_final_component() {
        assert_eq!(
            tag_from_dataset_name("IU.ANMO.00.BHZ__1970-01-01T00:00:00__1970-01-01T00:00:01__processed"),
            Some(Tag::from("processed"))
        );
        assert_eq!(tag_from_dataset_name("no_underscores"), Some(Tag::from("no_underscores")));
    }
}
