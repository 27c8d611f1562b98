// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

/// Integer nanoseconds since the Unix epoch, matching the on-disk attribute
/// encoding of `starttime` in the container format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Nanoseconds(pub i64);

impl Nanoseconds {
    pub const ZERO: Nanoseconds = Nanoseconds(0);
}

impl From<i64> for Nanoseconds {
    fn from(v: i64) -> Self {
        Nanoseconds(v)
    }
}

/// Samples per second. Stored separately from `Nanoseconds` because it is a
/// float in the container's attribute table, not an integer count.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SamplingRate(pub f64);

impl From<f64> for SamplingRate {
    fn from(v: f64) -> Self {
        SamplingRate(v)
    }
}
