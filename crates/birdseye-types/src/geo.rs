//! Geographic position and timestamped fixes.

use birdseye_serial::{MapBuilder, MapReader, Portable, Primitive, SerialError, SerialResult};
use chrono::{DateTime, FixedOffset};

/// Mean Earth radius in meters, for great-circle distances.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A geographic position. Every component is optional; degrees when present.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GeoPosition {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude_m: Option<f64>,
}

impl GeoPosition {
    pub fn new(latitude: f64, longitude: f64, altitude_m: Option<f64>) -> Self {
        Self {
            latitude: Some(latitude),
            longitude: Some(longitude),
            altitude_m,
        }
    }

    /// Both horizontal components, when both are known.
    pub fn lat_long(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.latitude.is_none() && self.longitude.is_none() && self.altitude_m.is_none()
    }
}

impl Portable for GeoPosition {
    fn to_primitive(&self) -> Primitive {
        MapBuilder::new()
            .field("latitude", &self.latitude)
            .field("longitude", &self.longitude)
            .field("altitude_m", &self.altitude_m)
            .finish()
    }

    fn from_primitive(value: &Primitive) -> SerialResult<Self> {
        let reader = MapReader::new(value)?;
        Ok(Self {
            latitude: reader.or_default("latitude")?,
            longitude: reader.or_default("longitude")?,
            altitude_m: reader.or_default("altitude_m")?,
        })
    }
}

/// A position observed at a particular moment, carrying the capture-local
/// UTC offset.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeoFix {
    pub timestamp: DateTime<FixedOffset>,
    pub position: GeoPosition,
}

impl GeoFix {
    pub fn new(timestamp: DateTime<FixedOffset>, position: GeoPosition) -> Self {
        Self {
            timestamp,
            position,
        }
    }
}

impl Portable for GeoFix {
    fn to_primitive(&self) -> Primitive {
        MapBuilder::new()
            .field("epoch_us", &self.timestamp.timestamp_micros())
            .field(
                "utc_offset_s",
                &i64::from(self.timestamp.offset().local_minus_utc()),
            )
            .field("position", &self.position)
            .finish()
    }

    fn from_primitive(value: &Primitive) -> SerialResult<Self> {
        let reader = MapReader::new(value)?;
        let epoch_us: i64 = reader.required("epoch_us")?;
        let offset_s: i64 = reader.or_default("utc_offset_s")?;
        let offset = i32::try_from(offset_s)
            .ok()
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| SerialError::Unsupported(format!("UTC offset {offset_s}s")))?;
        let utc = DateTime::from_timestamp_micros(epoch_us)
            .ok_or_else(|| SerialError::Unsupported(format!("epoch timestamp {epoch_us}us")))?;
        Ok(Self {
            timestamp: utc.with_timezone(&offset),
            position: reader.or_default("position")?,
        })
    }
}

/// Great-circle distance in meters between two `(latitude, longitude)`
/// pairs, by the haversine formula.
pub fn haversine_distance_m(a: (f64, f64), b: (f64, f64)) -> f64 {
    let (lat1, lon1) = (a.0.to_radians(), a.1.to_radians());
    let (lat2, lon2) = (b.0.to_radians(), b.1.to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * h.sqrt().atan2((1.0 - h).sqrt()) * EARTH_RADIUS_M
}
