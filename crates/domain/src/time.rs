//! Time and timestamp helpers.

use chrono::{DateTime, Utc};

/// UTC timestamp recorded as a manifest's generation time.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Split a timestamp into whole seconds since the epoch and sub-second nanos.
#[must_use]
pub fn to_parts(ts: Timestamp) -> (i64, u32) {
    (ts.timestamp(), ts.timestamp_subsec_nanos())
}

/// Rebuild a timestamp from [`to_parts`] output.
///
/// Returns `None` when the parts are out of range.
#[must_use]
pub fn from_parts(secs: i64, nanos: u32) -> Option<Timestamp> {
    DateTime::from_timestamp(secs, nanos)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_return_current_utc_time() {
        let before = Utc::now();
        let ts = now();
        let after = Utc::now();
        assert!(ts >= before);
        assert!(ts <= after);
    }

    #[test]
    fn should_roundtrip_through_parts_with_nanosecond_precision() {
        let ts = now();
        let (secs, nanos) = to_parts(ts);
        assert_eq!(from_parts(secs, nanos), Some(ts));
    }

    #[test]
    fn should_reject_out_of_range_parts() {
        assert!(from_parts(i64::MAX, 0).is_none());
    }
}
