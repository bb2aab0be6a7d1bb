//! Conversions between prost well-known types and chrono.

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

/// Converts a UTC timestamp into a protobuf `Timestamp`.
pub fn timestamp_from_datetime(dt: DateTime<Utc>) -> prost_types::Timestamp {
    prost_types::Timestamp {
        seconds: dt.timestamp(),
        nanos: dt.timestamp_subsec_nanos() as i32,
    }
}

/// Converts a protobuf `Timestamp` back into a UTC timestamp. Out-of-range
/// values yield `None`.
pub fn datetime_from_timestamp(ts: &prost_types::Timestamp) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(ts.seconds, ts.nanos.try_into().ok()?).single()
}

/// Converts a non-negative std `Duration` into a protobuf `Duration`.
pub fn duration_to_proto(d: Duration) -> prost_types::Duration {
    prost_types::Duration {
        seconds: d.as_secs() as i64,
        nanos: d.subsec_nanos() as i32,
    }
}

/// Converts a protobuf `Duration` into a std `Duration`. Negative durations
/// yield `None`.
pub fn duration_from_proto(d: &prost_types::Duration) -> Option<Duration> {
    let seconds = u64::try_from(d.seconds).ok()?;
    let nanos = u32::try_from(d.nanos).ok()?;
    Some(Duration::new(seconds, nanos))
}
