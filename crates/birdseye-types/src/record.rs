//! Source records: where a frame came from and what was found in it.

use std::path::Path;

use birdseye_serial::{MapBuilder, MapReader, Portable, Primitive, SerialResult};

use crate::annotation::AnnotationBox;
use crate::error::TypeError;
use crate::geo::GeoFix;
use crate::media::is_image_path;

/// Channel names used by capture devices with multiple sensors.
pub mod channels {
    pub const VISUAL: &str = "Visual";
    pub const THERMAL: &str = "Thermal";
}

/// Separator joining sub-paths of a virtual multi-frame source.
pub const MULTIPATH_SEPARATOR: char = ';';

/// By-value reference to an external grouping record.
///
/// Deliberately a plain value: it is copied around, never shared, so record
/// groupings can come and go without dangling pointers into the store.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecordReference {
    pub case: Option<String>,
    pub record_id: Option<String>,
    pub nickname: Option<String>,
}

impl Portable for RecordReference {
    fn to_primitive(&self) -> Primitive {
        MapBuilder::new()
            .field("case", &self.case)
            .field("record_id", &self.record_id)
            .field("nickname", &self.nickname)
            .finish()
    }

    fn from_primitive(value: &Primitive) -> SerialResult<Self> {
        let reader = MapReader::new(value)?;
        Ok(Self {
            case: reader.or_default("case")?,
            record_id: reader.or_default("record_id")?,
            nickname: reader.or_default("nickname")?,
        })
    }
}

/// Everything known about one annotated frame.
///
/// `source_path` plus `source_index` form the logical key: a still image is
/// `(path, 0)`, a video frame is `(path, frame_number)`. Entries are
/// replaced whole on re-save, never field-mutated in place.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceRecord {
    /// Path of the original media file (or `;`-joined multi-path).
    pub source_path: String,
    /// Frame index within the source; 0 for still images.
    pub source_index: u32,
    /// Seconds from the start of the source file, when known.
    pub source_time_s: Option<f64>,
    /// Sensor channel (see [`channels`]); empty when unspecified.
    pub channel: String,
    /// Content-derived identifier of the source file, useful after moves.
    pub source_file_id: Option<String>,
    pub description: String,
    pub annotations: Option<Vec<AnnotationBox>>,
    pub geo: Option<GeoFix>,
    pub record_ref: Option<RecordReference>,
}

impl SourceRecord {
    pub fn new(source_path: impl Into<String>) -> Self {
        Self {
            source_path: source_path.into(),
            source_index: 0,
            source_time_s: None,
            channel: String::new(),
            source_file_id: None,
            description: String::new(),
            annotations: None,
            geo: None,
            record_ref: None,
        }
    }

    /// The logical key, rendered as `path:index`.
    pub fn source_identifier(&self) -> String {
        format!("{}:{}", self.source_path, self.source_index)
    }

    /// Parse a `path:index` identifier. The index is split off the basename
    /// (directory components may legitimately contain colons); an
    /// identifier without an index must name a still image and gets
    /// index 0.
    pub fn from_source_identifier(identifier: &str) -> Result<Self, TypeError> {
        let path = Path::new(identifier);
        let basename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| TypeError::InvalidSourceIdentifier(identifier.to_string()))?;

        if let Some((stem, index_str)) = basename.rsplit_once(':') {
            let index: u32 = index_str
                .parse()
                .map_err(|_| TypeError::InvalidSourceIdentifier(identifier.to_string()))?;
            let source_path = match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => {
                    parent.join(stem).to_string_lossy().into_owned()
                }
                _ => stem.to_string(),
            };
            Ok(Self {
                source_index: index,
                ..Self::new(source_path)
            })
        } else if is_image_path(identifier) {
            Ok(Self::new(identifier))
        } else {
            Err(TypeError::InvalidSourceIdentifier(identifier.to_string()))
        }
    }

    /// Resolve a possibly `;`-joined multi-path source: a multi-path plus
    /// frame index names one of its sub-images (at index 0 within that
    /// image); a plain path keeps the frame index as-is.
    pub fn from_multipath(possible_multipath: &str, frame_index: usize) -> Result<Self, TypeError> {
        if possible_multipath.contains(MULTIPATH_SEPARATOR) {
            let paths: Vec<&str> = possible_multipath.split(MULTIPATH_SEPARATOR).collect();
            let path = paths
                .get(frame_index)
                .ok_or(TypeError::FrameIndexOutOfRange {
                    index: frame_index,
                    count: paths.len(),
                })?;
            Ok(Self::new(*path))
        } else {
            Ok(Self {
                source_index: frame_index as u32,
                ..Self::new(possible_multipath)
            })
        }
    }
}

impl Portable for SourceRecord {
    fn to_primitive(&self) -> Primitive {
        MapBuilder::new()
            .field("source_path", &self.source_path)
            .field("source_index", &self.source_index)
            .field("source_time_s", &self.source_time_s)
            .field("channel", &self.channel)
            .field("source_file_id", &self.source_file_id)
            .field("description", &self.description)
            .field("annotations", &self.annotations)
            .field("geo", &self.geo)
            .field("record_ref", &self.record_ref)
            .finish()
    }

    fn from_primitive(value: &Primitive) -> SerialResult<Self> {
        let reader = MapReader::new(value)?;
        Ok(Self {
            source_path: reader.required("source_path")?,
            source_index: reader.or_default("source_index")?,
            source_time_s: reader.or_default("source_time_s")?,
            channel: reader.or_default("channel")?,
            source_file_id: reader.or_default("source_file_id")?,
            description: reader.or_default("description")?,
            annotations: reader.or_default("annotations")?,
            geo: reader.or_default("geo")?,
            record_ref: reader.or_default("record_ref")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, TimeZone};

    use super::*;
    use crate::annotation::Verdict;
    use crate::geo::GeoPosition;

    fn sample_record() -> SourceRecord {
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        let mut ann = AnnotationBox::new((498, 1555, 42, 44), "cliff_tree");
        ann.value = Verdict::Positive;
        ann.tags = vec!["autumn".to_string()];
        SourceRecord {
            source_time_s: Some(12.5),
            channel: channels::VISUAL.to_string(),
            description: "ridge line sweep".to_string(),
            annotations: Some(vec![ann]),
            geo: Some(GeoFix::new(
                offset.with_ymd_and_hms(2023, 5, 26, 11, 52, 57).unwrap(),
                GeoPosition::new(50.1, 8.6, Some(120.0)),
            )),
            record_ref: Some(RecordReference {
                nickname: Some("test_collection".to_string()),
                ..RecordReference::default()
            }),
            ..SourceRecord::new("/footage/flight_03.mp4")
        }
    }

    #[test]
    fn record_roundtrips_exactly() {
        let record = {
            let mut r = sample_record();
            r.source_index = 21;
            r
        };
        let back = SourceRecord::from_primitive(&record.to_primitive()).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn identifier_roundtrips() {
        let mut record = SourceRecord::new("/footage/flight_03.mp4");
        record.source_index = 21;
        assert_eq!(record.source_identifier(), "/footage/flight_03.mp4:21");

        let parsed = SourceRecord::from_source_identifier("/footage/flight_03.mp4:21").unwrap();
        assert_eq!(parsed.source_path, "/footage/flight_03.mp4");
        assert_eq!(parsed.source_index, 21);
    }

    #[test]
    fn image_identifier_needs_no_index() {
        let parsed = SourceRecord::from_source_identifier("/photos/basalt_canyon.jpg").unwrap();
        assert_eq!(parsed.source_index, 0);
        assert!(SourceRecord::from_source_identifier("/footage/flight.mp4").is_err());
    }

    #[test]
    fn multipath_resolves_sub_images() {
        let joined = "/a/one.jpg;/a/two.jpg;/a/three.jpg";
        let record = SourceRecord::from_multipath(joined, 1).unwrap();
        assert_eq!(record.source_path, "/a/two.jpg");
        assert_eq!(record.source_index, 0);

        assert!(matches!(
            SourceRecord::from_multipath(joined, 5),
            Err(TypeError::FrameIndexOutOfRange { index: 5, count: 3 })
        ));
    }

    #[test]
    fn plain_path_keeps_frame_index() {
        let record = SourceRecord::from_multipath("/footage/flight.mp4", 7).unwrap();
        assert_eq!(record.source_path, "/footage/flight.mp4");
        assert_eq!(record.source_index, 7);
    }

    #[test]
    fn sparse_record_takes_defaults() {
        let sparse = Primitive::from_json("{\"source_path\": \"/p/x.jpg\"}").unwrap();
        let record = SourceRecord::from_primitive(&sparse).unwrap();
        assert_eq!(record.source_path, "/p/x.jpg");
        assert_eq!(record.source_index, 0);
        assert!(record.annotations.is_none());
        assert!(record.geo.is_none());
    }
}
