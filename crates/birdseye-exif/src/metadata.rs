//! The metadata triple and its timestamp encoding.
//!
//! Capture times are stored twice in the metadata block: once normalized
//! to UTC and once in the capture-local offset, both at whole-second
//! resolution. Differencing the pair on decode recovers the original
//! offset without any timezone tables.

use birdseye_serial::Primitive;
use birdseye_types::GeoPosition;
use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};

use crate::error::{ExifError, ExifResult};

/// EXIF datetime rendering: whole seconds, no zone designator.
pub(crate) const TIMESTAMP_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// What the codec embeds in (and recovers from) a container's metadata
/// block. All three parts are independent and optional.
///
/// Timestamps round-trip truncated to whole seconds; positions round-trip
/// at roughly 1e-6 degree (latitude/longitude) and 1 cm (altitude). The
/// payload round-trips exactly.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ImageMetadata {
    pub timestamp: Option<DateTime<FixedOffset>>,
    pub geo: Option<GeoPosition>,
    pub payload: Option<Primitive>,
}

impl ImageMetadata {
    pub fn is_empty(&self) -> bool {
        self.timestamp.is_none() && self.geo.is_none() && self.payload.is_none()
    }
}

/// Render the `(utc, local)` timestamp pair.
pub(crate) fn format_timestamp_pair(timestamp: &DateTime<FixedOffset>) -> (String, String) {
    let utc = timestamp.with_timezone(&Utc);
    (
        utc.format(TIMESTAMP_FORMAT).to_string(),
        timestamp.format(TIMESTAMP_FORMAT).to_string(),
    )
}

fn parse_naive(text: &str) -> ExifResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text.trim(), TIMESTAMP_FORMAT)
        .map_err(|e| ExifError::Malformed(format!("timestamp {text:?}: {e}")))
}

/// Rebuild the zoned capture time from the stored `(utc, local)` pair.
pub(crate) fn recover_timestamp(utc: &str, local: &str) -> ExifResult<DateTime<FixedOffset>> {
    let utc_naive = parse_naive(utc)?;
    let local_naive = parse_naive(local)?;
    let offset_seconds = (local_naive - utc_naive).num_seconds();
    let offset = i32::try_from(offset_seconds)
        .ok()
        .and_then(FixedOffset::east_opt)
        .ok_or_else(|| ExifError::Malformed(format!("implied UTC offset {offset_seconds}s")))?;
    local_naive
        .and_local_timezone(offset)
        .single()
        .ok_or_else(|| ExifError::Malformed(format!("ambiguous local time {local:?}")))
}

/// A block written without the local copy carries UTC only.
pub(crate) fn utc_only_timestamp(utc: &str) -> ExifResult<DateTime<FixedOffset>> {
    let utc_naive = parse_naive(utc)?;
    let offset = FixedOffset::east_opt(0).ok_or_else(|| {
        ExifError::Malformed("zero offset construction failed".to_string())
    })?;
    utc_naive
        .and_local_timezone(offset)
        .single()
        .ok_or_else(|| ExifError::Malformed(format!("ambiguous UTC time {utc:?}")))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn eastern_capture() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(-4 * 3600)
            .unwrap()
            .with_ymd_and_hms(2021, 10, 1, 16, 0, 0)
            .unwrap()
    }

    #[test]
    fn pair_stores_utc_and_local_copies() {
        let (utc, local) = format_timestamp_pair(&eastern_capture());
        assert_eq!(utc, "2021:10:01 20:00:00");
        assert_eq!(local, "2021:10:01 16:00:00");
    }

    #[test]
    fn recovery_reconstructs_the_offset() {
        let original = eastern_capture();
        let (utc, local) = format_timestamp_pair(&original);
        let recovered = recover_timestamp(&utc, &local).unwrap();
        assert_eq!(recovered, original);
        assert_eq!(recovered.offset().local_minus_utc(), -4 * 3600);
    }

    #[test]
    fn subsecond_precision_is_discarded() {
        let precise = eastern_capture()
            .checked_add_signed(chrono::Duration::milliseconds(750))
            .unwrap();
        let (utc, local) = format_timestamp_pair(&precise);
        let recovered = recover_timestamp(&utc, &local).unwrap();
        assert_eq!(recovered, eastern_capture());
    }

    #[test]
    fn garbage_timestamps_are_malformed() {
        assert!(recover_timestamp("not a time", "2021:10:01 16:00:00").is_err());
        assert!(recover_timestamp("2021:10:01 16:00:00", "2021-10-01T16:00").is_err());
    }

    #[test]
    fn utc_only_fallback_gets_zero_offset() {
        let recovered = utc_only_timestamp("2021:10:01 20:00:00").unwrap();
        assert_eq!(recovered.offset().local_minus_utc(), 0);
        assert_eq!(recovered, eastern_capture());
    }
}
