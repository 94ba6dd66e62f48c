//! The EXIF-structured metadata block.
//!
//! A block is a self-contained TIFF byte stream: header, 0th IFD, and two
//! sub-IFDs reached through pointer tags -- the Exif IFD (original
//! timestamp, user comment) and the GPS IFD (DMS rationals, altitude).
//! The same machinery writes full TIFF containers: the 0th IFD simply
//! gains image-structure tags and a pixel strip (see `tiff.rs`).
//!
//! Blocks are written little-endian; the parser accepts either byte order.

use std::collections::BTreeMap;

use birdseye_serial::Primitive;
use birdseye_types::GeoPosition;
use tracing::warn;

use crate::dms::{
    altitude_to_rational, degrees_to_dms, dms_to_degrees, rational_to_altitude, Rational,
};
use crate::error::{ExifError, ExifResult};
use crate::metadata::{
    format_timestamp_pair, recover_timestamp, utc_only_timestamp, ImageMetadata,
};

/// TIFF field types.
pub(crate) mod ftype {
    pub const BYTE: u16 = 1;
    pub const ASCII: u16 = 2;
    pub const SHORT: u16 = 3;
    pub const LONG: u16 = 4;
    pub const RATIONAL: u16 = 5;
    pub const UNDEFINED: u16 = 7;
}

/// Tag numbers this codec reads and writes.
pub(crate) mod tag {
    // 0th IFD: image structure
    pub const IMAGE_WIDTH: u16 = 0x0100;
    pub const IMAGE_LENGTH: u16 = 0x0101;
    pub const BITS_PER_SAMPLE: u16 = 0x0102;
    pub const COMPRESSION: u16 = 0x0103;
    pub const PHOTOMETRIC: u16 = 0x0106;
    pub const STRIP_OFFSETS: u16 = 0x0111;
    pub const SAMPLES_PER_PIXEL: u16 = 0x0115;
    pub const ROWS_PER_STRIP: u16 = 0x0116;
    pub const STRIP_BYTE_COUNTS: u16 = 0x0117;
    // 0th IFD: metadata
    pub const DATE_TIME: u16 = 0x0132;
    pub const EXIF_IFD: u16 = 0x8769;
    pub const GPS_IFD: u16 = 0x8825;
    // Exif IFD
    pub const DATE_TIME_ORIGINAL: u16 = 0x9003;
    pub const USER_COMMENT: u16 = 0x9286;
    // GPS IFD
    pub const GPS_LATITUDE_REF: u16 = 0x0001;
    pub const GPS_LATITUDE: u16 = 0x0002;
    pub const GPS_LONGITUDE_REF: u16 = 0x0003;
    pub const GPS_LONGITUDE: u16 = 0x0004;
    pub const GPS_ALTITUDE_REF: u16 = 0x0005;
    pub const GPS_ALTITUDE: u16 = 0x0006;
}

/// Charset markers for the user-comment field.
const CHARSET_ASCII: &[u8; 8] = b"ASCII\0\0\0";
const CHARSET_UNICODE: &[u8; 8] = b"UNICODE\0";

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// One directory entry, with its value already encoded little-endian.
#[derive(Clone, Debug)]
pub(crate) struct IfdEntry {
    pub tag: u16,
    pub ftype: u16,
    pub count: u32,
    pub data: Vec<u8>,
}

impl IfdEntry {
    pub fn ascii(tag: u16, text: &str) -> Self {
        let mut data = text.as_bytes().to_vec();
        data.push(0);
        Self {
            tag,
            ftype: ftype::ASCII,
            count: data.len() as u32,
            data,
        }
    }

    pub fn byte(tag: u16, values: &[u8]) -> Self {
        Self {
            tag,
            ftype: ftype::BYTE,
            count: values.len() as u32,
            data: values.to_vec(),
        }
    }

    pub fn short(tag: u16, values: &[u16]) -> Self {
        let mut data = Vec::with_capacity(values.len() * 2);
        for v in values {
            data.extend_from_slice(&v.to_le_bytes());
        }
        Self {
            tag,
            ftype: ftype::SHORT,
            count: values.len() as u32,
            data,
        }
    }

    pub fn long(tag: u16, values: &[u32]) -> Self {
        let mut data = Vec::with_capacity(values.len() * 4);
        for v in values {
            data.extend_from_slice(&v.to_le_bytes());
        }
        Self {
            tag,
            ftype: ftype::LONG,
            count: values.len() as u32,
            data,
        }
    }

    pub fn rational(tag: u16, values: &[Rational]) -> Self {
        let mut data = Vec::with_capacity(values.len() * 8);
        for v in values {
            data.extend_from_slice(&v.num.to_le_bytes());
            data.extend_from_slice(&v.den.to_le_bytes());
        }
        Self {
            tag,
            ftype: ftype::RATIONAL,
            count: values.len() as u32,
            data,
        }
    }

    pub fn undefined(tag: u16, bytes: &[u8]) -> Self {
        Self {
            tag,
            ftype: ftype::UNDEFINED,
            count: bytes.len() as u32,
            data: bytes.to_vec(),
        }
    }
}

/// Rendered size of an IFD: count word, entries, next-IFD word, and the
/// out-of-line value area (values over 4 bytes, padded to even offsets).
fn ifd_size(entries: &[IfdEntry]) -> usize {
    let mut size = 2 + 12 * entries.len() + 4;
    for entry in entries {
        if entry.data.len() > 4 {
            size += entry.data.len() + (entry.data.len() & 1);
        }
    }
    size
}

fn render_ifd(out: &mut Vec<u8>, entries: &[IfdEntry], ifd_offset: usize) {
    out.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    let data_start = ifd_offset + 2 + 12 * entries.len() + 4;
    let mut data_area: Vec<u8> = Vec::new();
    for entry in entries {
        out.extend_from_slice(&entry.tag.to_le_bytes());
        out.extend_from_slice(&entry.ftype.to_le_bytes());
        out.extend_from_slice(&entry.count.to_le_bytes());
        if entry.data.len() <= 4 {
            let mut inline = [0u8; 4];
            inline[..entry.data.len()].copy_from_slice(&entry.data);
            out.extend_from_slice(&inline);
        } else {
            let offset = (data_start + data_area.len()) as u32;
            out.extend_from_slice(&offset.to_le_bytes());
            data_area.extend_from_slice(&entry.data);
            if data_area.len() & 1 == 1 {
                data_area.push(0);
            }
        }
    }
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&data_area);
}

fn set_long(entries: &mut [IfdEntry], tag: u16, value: u32) {
    for entry in entries.iter_mut() {
        if entry.tag == tag {
            entry.data = value.to_le_bytes().to_vec();
        }
    }
}

/// Lay out and render a complete TIFF stream: 0th IFD, optional Exif and
/// GPS sub-IFDs, and an optional single pixel strip at the tail.
pub(crate) fn assemble(
    mut zeroth: Vec<IfdEntry>,
    mut exif: Vec<IfdEntry>,
    mut gps: Vec<IfdEntry>,
    strip: Option<&[u8]>,
) -> Vec<u8> {
    let has_exif = !exif.is_empty();
    let has_gps = !gps.is_empty();
    if has_exif {
        zeroth.push(IfdEntry::long(tag::EXIF_IFD, &[0]));
    }
    if has_gps {
        zeroth.push(IfdEntry::long(tag::GPS_IFD, &[0]));
    }
    if let Some(pixels) = strip {
        zeroth.push(IfdEntry::long(tag::STRIP_OFFSETS, &[0]));
        zeroth.push(IfdEntry::long(tag::STRIP_BYTE_COUNTS, &[pixels.len() as u32]));
    }
    zeroth.sort_by_key(|e| e.tag);
    exif.sort_by_key(|e| e.tag);
    gps.sort_by_key(|e| e.tag);

    let exif_offset = 8 + ifd_size(&zeroth);
    let gps_offset = exif_offset + if has_exif { ifd_size(&exif) } else { 0 };
    let strip_offset = gps_offset + if has_gps { ifd_size(&gps) } else { 0 };
    if has_exif {
        set_long(&mut zeroth, tag::EXIF_IFD, exif_offset as u32);
    }
    if has_gps {
        set_long(&mut zeroth, tag::GPS_IFD, gps_offset as u32);
    }
    if strip.is_some() {
        set_long(&mut zeroth, tag::STRIP_OFFSETS, strip_offset as u32);
    }

    let mut out = Vec::new();
    out.extend_from_slice(b"II");
    out.extend_from_slice(&42u16.to_le_bytes());
    out.extend_from_slice(&8u32.to_le_bytes());
    render_ifd(&mut out, &zeroth, 8);
    if has_exif {
        render_ifd(&mut out, &exif, exif_offset);
    }
    if has_gps {
        render_ifd(&mut out, &gps, gps_offset);
    }
    if let Some(pixels) = strip {
        out.extend_from_slice(pixels);
    }
    out
}

fn user_comment_bytes(json: &str) -> Vec<u8> {
    let marker = if json.is_ascii() {
        CHARSET_ASCII
    } else {
        CHARSET_UNICODE
    };
    let mut out = Vec::with_capacity(8 + json.len());
    out.extend_from_slice(marker);
    out.extend_from_slice(json.as_bytes());
    out
}

/// Build the metadata entry sets for the three IFDs.
pub(crate) fn metadata_ifd_entries(
    metadata: &ImageMetadata,
) -> ExifResult<(Vec<IfdEntry>, Vec<IfdEntry>, Vec<IfdEntry>)> {
    let mut zeroth = Vec::new();
    let mut exif = Vec::new();
    let mut gps = Vec::new();

    if let Some(timestamp) = &metadata.timestamp {
        let (utc, local) = format_timestamp_pair(timestamp);
        zeroth.push(IfdEntry::ascii(tag::DATE_TIME, &utc));
        exif.push(IfdEntry::ascii(tag::DATE_TIME_ORIGINAL, &local));
    }

    if let Some(payload) = &metadata.payload {
        let json = payload.to_json()?;
        exif.push(IfdEntry::undefined(
            tag::USER_COMMENT,
            &user_comment_bytes(&json),
        ));
    }

    if let Some(geo) = &metadata.geo {
        if let Some((latitude, longitude)) = geo.lat_long() {
            let (lat_dms, lat_ref) = degrees_to_dms(latitude, ('N', 'S'));
            gps.push(IfdEntry::ascii(tag::GPS_LATITUDE_REF, &lat_ref.to_string()));
            gps.push(IfdEntry::rational(tag::GPS_LATITUDE, &lat_dms));
            let (lon_dms, lon_ref) = degrees_to_dms(longitude, ('E', 'W'));
            gps.push(IfdEntry::ascii(tag::GPS_LONGITUDE_REF, &lon_ref.to_string()));
            gps.push(IfdEntry::rational(tag::GPS_LONGITUDE, &lon_dms));
        }
        if let Some(altitude) = geo.altitude_m {
            let (sign, value) = altitude_to_rational(altitude);
            gps.push(IfdEntry::byte(tag::GPS_ALTITUDE_REF, &[sign]));
            gps.push(IfdEntry::rational(tag::GPS_ALTITUDE, &[value]));
        }
    }

    Ok((zeroth, exif, gps))
}

/// Encode a standalone metadata block (no image tags, no pixel data).
pub fn encode_block(metadata: &ImageMetadata) -> ExifResult<Vec<u8>> {
    let (zeroth, exif, gps) = metadata_ifd_entries(metadata)?;
    Ok(assemble(zeroth, exif, gps, None))
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// A parsed directory entry: raw value bytes plus enough typing to decode
/// them under the block's byte order.
#[derive(Clone, Debug)]
pub(crate) struct EntryData {
    pub ftype: u16,
    pub data: Vec<u8>,
}

impl EntryData {
    /// NUL-terminated ASCII value.
    pub fn text(&self) -> ExifResult<String> {
        let trimmed: &[u8] = match self.data.iter().position(|&b| b == 0) {
            Some(pos) => &self.data[..pos],
            None => &self.data,
        };
        String::from_utf8(trimmed.to_vec())
            .map_err(|e| ExifError::Malformed(format!("non-UTF8 text value: {e}")))
    }

    /// Integer values, widening SHORTs to u32.
    pub fn integers(&self, le: bool) -> ExifResult<Vec<u32>> {
        match self.ftype {
            ftype::SHORT => Ok(self
                .data
                .chunks_exact(2)
                .map(|c| {
                    let pair = [c[0], c[1]];
                    u32::from(if le {
                        u16::from_le_bytes(pair)
                    } else {
                        u16::from_be_bytes(pair)
                    })
                })
                .collect()),
            ftype::LONG => Ok(self
                .data
                .chunks_exact(4)
                .map(|c| {
                    let quad = [c[0], c[1], c[2], c[3]];
                    if le {
                        u32::from_le_bytes(quad)
                    } else {
                        u32::from_be_bytes(quad)
                    }
                })
                .collect()),
            other => Err(ExifError::Malformed(format!(
                "expected an integer field, found type {other}"
            ))),
        }
    }

    pub fn rationals(&self, le: bool) -> ExifResult<Vec<Rational>> {
        if self.ftype != ftype::RATIONAL {
            return Err(ExifError::Malformed(format!(
                "expected a rational field, found type {}",
                self.ftype
            )));
        }
        Ok(self
            .data
            .chunks_exact(8)
            .map(|c| {
                let num = [c[0], c[1], c[2], c[3]];
                let den = [c[4], c[5], c[6], c[7]];
                if le {
                    Rational::new(u32::from_le_bytes(num), u32::from_le_bytes(den))
                } else {
                    Rational::new(u32::from_be_bytes(num), u32::from_be_bytes(den))
                }
            })
            .collect())
    }
}

/// The three directories of a parsed block, keyed by tag.
#[derive(Debug, Default)]
pub(crate) struct ParsedBlock {
    pub le: bool,
    pub zeroth: BTreeMap<u16, EntryData>,
    pub exif: BTreeMap<u16, EntryData>,
    pub gps: BTreeMap<u16, EntryData>,
}

struct Raw<'a> {
    data: &'a [u8],
    le: bool,
}

impl<'a> Raw<'a> {
    fn slice(&self, offset: usize, len: usize) -> ExifResult<&'a [u8]> {
        self.data
            .get(offset..offset + len)
            .ok_or(ExifError::Truncated(offset))
    }

    fn u16_at(&self, offset: usize) -> ExifResult<u16> {
        let b = self.slice(offset, 2)?;
        let pair = [b[0], b[1]];
        Ok(if self.le {
            u16::from_le_bytes(pair)
        } else {
            u16::from_be_bytes(pair)
        })
    }

    fn u32_at(&self, offset: usize) -> ExifResult<u32> {
        let b = self.slice(offset, 4)?;
        let quad = [b[0], b[1], b[2], b[3]];
        Ok(if self.le {
            u32::from_le_bytes(quad)
        } else {
            u32::from_be_bytes(quad)
        })
    }
}

fn value_size(ftype: u16) -> Option<usize> {
    match ftype {
        ftype::BYTE | ftype::ASCII | ftype::UNDEFINED => Some(1),
        ftype::SHORT => Some(2),
        ftype::LONG => Some(4),
        ftype::RATIONAL => Some(8),
        6 => Some(1),  // SBYTE
        8 => Some(2),  // SSHORT
        9 => Some(4),  // SLONG
        10 => Some(8), // SRATIONAL
        11 => Some(4), // FLOAT
        12 => Some(8), // DOUBLE
        _ => None,
    }
}

fn parse_ifd(raw: &Raw<'_>, offset: usize) -> ExifResult<BTreeMap<u16, EntryData>> {
    let count = raw.u16_at(offset)? as usize;
    let mut entries = BTreeMap::new();
    for i in 0..count {
        let base = offset + 2 + 12 * i;
        let tag = raw.u16_at(base)?;
        let ftype = raw.u16_at(base + 2)?;
        let value_count = raw.u32_at(base + 4)? as usize;
        let Some(unit) = value_size(ftype) else {
            // Unknown field type: the size rules are unknowable, skip it.
            continue;
        };
        let total = unit
            .checked_mul(value_count)
            .ok_or_else(|| ExifError::Malformed(format!("oversized entry for tag {tag:#06x}")))?;
        let data = if total <= 4 {
            raw.slice(base + 8, total)?.to_vec()
        } else {
            let value_offset = raw.u32_at(base + 8)? as usize;
            raw.slice(value_offset, total)?.to_vec()
        };
        entries.insert(tag, EntryData { ftype, data });
    }
    Ok(entries)
}

/// Parse the structural skeleton of a metadata block or TIFF container.
pub(crate) fn parse_block(data: &[u8]) -> ExifResult<ParsedBlock> {
    if data.len() < 8 {
        return Err(ExifError::Truncated(data.len()));
    }
    let le = match &data[..2] {
        b"II" => true,
        b"MM" => false,
        _ => return Err(ExifError::NotTiff),
    };
    let raw = Raw { data, le };
    if raw.u16_at(2)? != 42 {
        return Err(ExifError::NotTiff);
    }
    let zeroth_offset = raw.u32_at(4)? as usize;
    let zeroth = parse_ifd(&raw, zeroth_offset)?;

    let sub_ifd = |pointer_tag: u16, parsed: &BTreeMap<u16, EntryData>| -> ExifResult<BTreeMap<u16, EntryData>> {
        match parsed.get(&pointer_tag) {
            Some(entry) => {
                let offsets = entry.integers(le)?;
                match offsets.first() {
                    Some(&offset) => parse_ifd(&raw, offset as usize),
                    None => Ok(BTreeMap::new()),
                }
            }
            None => Ok(BTreeMap::new()),
        }
    };
    let exif = sub_ifd(tag::EXIF_IFD, &zeroth)?;
    let gps = sub_ifd(tag::GPS_IFD, &zeroth)?;

    Ok(ParsedBlock {
        le,
        zeroth,
        exif,
        gps,
    })
}

fn parse_user_comment(data: &[u8]) -> ExifResult<Option<String>> {
    if data.is_empty() {
        return Ok(None);
    }
    if data.len() < 8 {
        return Err(ExifError::Malformed(
            "user comment shorter than its charset marker".to_string(),
        ));
    }
    let marker: &[u8] = &data[..8];
    if marker != CHARSET_ASCII && marker != CHARSET_UNICODE && marker != [0u8; 8] {
        return Err(ExifError::Malformed(format!(
            "unknown user comment charset {marker:?}"
        )));
    }
    let body = std::str::from_utf8(&data[8..])
        .map_err(|e| ExifError::Malformed(format!("non-UTF8 user comment: {e}")))?;
    let body = body.trim_end_matches('\0');
    if body.trim().is_empty() {
        Ok(None)
    } else {
        Ok(Some(body.to_string()))
    }
}

fn interpret_gps(
    gps: &BTreeMap<u16, EntryData>,
    le: bool,
) -> ExifResult<Option<GeoPosition>> {
    let component = |value_tag: u16, ref_tag: u16, refs: (char, char)| -> ExifResult<Option<f64>> {
        match (gps.get(&value_tag), gps.get(&ref_tag)) {
            (None, None) => Ok(None),
            (Some(value), Some(reference)) => {
                let rationals = value.rationals(le)?;
                let dms: [Rational; 3] = rationals.as_slice().try_into().map_err(|_| {
                    ExifError::Malformed(format!(
                        "expected 3 rationals for tag {value_tag:#06x}, got {}",
                        rationals.len()
                    ))
                })?;
                let text = reference.text()?;
                let hemisphere = text.chars().next().ok_or_else(|| {
                    ExifError::Malformed("empty hemisphere reference".to_string())
                })?;
                // Check the letter belongs to this axis before interpreting.
                if hemisphere != refs.0 && hemisphere != refs.1 {
                    return Err(ExifError::Malformed(format!(
                        "hemisphere {hemisphere:?} is invalid for this axis"
                    )));
                }
                dms_to_degrees(dms, hemisphere).map(Some)
            }
            _ => Err(ExifError::Malformed(format!(
                "GPS tag {value_tag:#06x} present without its reference (or vice versa)"
            ))),
        }
    };

    let latitude = component(tag::GPS_LATITUDE, tag::GPS_LATITUDE_REF, ('N', 'S'))?;
    let longitude = component(tag::GPS_LONGITUDE, tag::GPS_LONGITUDE_REF, ('E', 'W'))?;

    let altitude_m = match (gps.get(&tag::GPS_ALTITUDE), gps.get(&tag::GPS_ALTITUDE_REF)) {
        (None, _) => None,
        (Some(value), reference) => {
            let rationals = value.rationals(le)?;
            let magnitude = *rationals.first().ok_or_else(|| {
                ExifError::Malformed("empty altitude value".to_string())
            })?;
            let sign = match reference {
                Some(entry) => *entry.data.first().unwrap_or(&0),
                None => 0,
            };
            Some(rational_to_altitude(sign, magnitude)?)
        }
    };

    let position = GeoPosition {
        latitude,
        longitude,
        altitude_m,
    };
    Ok(if position.is_empty() {
        None
    } else {
        Some(position)
    })
}

/// Interpret a parsed block as the metadata triple.
///
/// Field-level damage is recovered locally: a malformed GPS sub-block or
/// timestamp is logged and dropped, because the rest of the block (and the
/// image) remain valid. An unreadable payload is fatal -- that is the
/// record itself.
pub(crate) fn interpret_metadata(parsed: &ParsedBlock) -> ExifResult<ImageMetadata> {
    let timestamp = {
        let utc = parsed
            .zeroth
            .get(&tag::DATE_TIME)
            .map(EntryData::text)
            .transpose();
        let local = parsed
            .exif
            .get(&tag::DATE_TIME_ORIGINAL)
            .map(EntryData::text)
            .transpose();
        let recovered = match (utc, local) {
            (Ok(Some(utc)), Ok(Some(local))) => recover_timestamp(&utc, &local).map(Some),
            (Ok(Some(utc)), Ok(None)) => utc_only_timestamp(&utc).map(Some),
            (Ok(None), _) => Ok(None),
            (Err(e), _) | (_, Err(e)) => Err(e),
        };
        match recovered {
            Ok(value) => value,
            Err(e) => {
                warn!("dropping unreadable timestamp: {e}");
                None
            }
        }
    };

    let geo = match interpret_gps(&parsed.gps, parsed.le) {
        Ok(value) => value,
        Err(e) => {
            warn!("dropping unreadable GPS sub-block: {e}");
            None
        }
    };

    let payload = match parsed.exif.get(&tag::USER_COMMENT) {
        Some(entry) => match parse_user_comment(&entry.data)? {
            Some(json) => Some(Primitive::from_json(&json)?),
            None => None,
        },
        None => None,
    };

    Ok(ImageMetadata {
        timestamp,
        geo,
        payload,
    })
}

/// Decode a standalone metadata block.
pub fn decode_block(data: &[u8]) -> ExifResult<ImageMetadata> {
    let parsed = parse_block(data)?;
    interpret_metadata(&parsed)
}

#[cfg(test)]
mod tests {
    use birdseye_serial::Primitive;
    use chrono::{FixedOffset, TimeZone};

    use super::*;

    fn sample_metadata() -> ImageMetadata {
        let timestamp = FixedOffset::east_opt(-4 * 3600)
            .unwrap()
            .with_ymd_and_hms(2021, 10, 1, 16, 0, 0)
            .unwrap();
        let payload = Primitive::from_json("{\"a\": 1}").unwrap();
        ImageMetadata {
            timestamp: Some(timestamp),
            geo: Some(GeoPosition::new(37.7749, -122.4194, Some(476.43))),
            payload: Some(payload),
        }
    }

    #[test]
    fn block_roundtrips_the_example_scenario() {
        let metadata = sample_metadata();
        let block = encode_block(&metadata).unwrap();
        let decoded = decode_block(&block).unwrap();

        assert_eq!(decoded.timestamp, metadata.timestamp);
        assert_eq!(decoded.payload, metadata.payload);

        let geo = decoded.geo.unwrap();
        assert!((geo.latitude.unwrap() - 37.7749).abs() < 1e-4);
        assert!((geo.longitude.unwrap() - -122.4194).abs() < 1e-4);
        assert!((geo.altitude_m.unwrap() - 476.43).abs() < 1e-2);
    }

    #[test]
    fn empty_metadata_roundtrips_as_empty() {
        let block = encode_block(&ImageMetadata::default()).unwrap();
        let decoded = decode_block(&block).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn missing_gps_and_comment_decode_as_none() {
        let timestamp = FixedOffset::east_opt(3600)
            .unwrap()
            .with_ymd_and_hms(2022, 1, 2, 3, 4, 5)
            .unwrap();
        let metadata = ImageMetadata {
            timestamp: Some(timestamp),
            geo: None,
            payload: None,
        };
        let decoded = decode_block(&encode_block(&metadata).unwrap()).unwrap();
        assert_eq!(decoded.timestamp, Some(timestamp));
        assert!(decoded.geo.is_none());
        assert!(decoded.payload.is_none());
    }

    #[test]
    fn altitude_only_position_survives() {
        let metadata = ImageMetadata {
            timestamp: None,
            geo: Some(GeoPosition {
                latitude: None,
                longitude: None,
                altitude_m: Some(-3.25),
            }),
            payload: None,
        };
        let decoded = decode_block(&encode_block(&metadata).unwrap()).unwrap();
        assert_eq!(decoded.geo.unwrap().altitude_m, Some(-3.25));
    }

    #[test]
    fn non_ascii_payload_gets_the_unicode_marker() {
        let payload = Primitive::from_json("{\"note\": \"søkø 北\"}").unwrap();
        let metadata = ImageMetadata {
            timestamp: None,
            geo: None,
            payload: Some(payload.clone()),
        };
        let block = encode_block(&metadata).unwrap();
        assert!(block
            .windows(CHARSET_UNICODE.len())
            .any(|w| w == CHARSET_UNICODE));
        let decoded = decode_block(&block).unwrap();
        assert_eq!(decoded.payload, Some(payload));
    }

    #[test]
    fn malformed_gps_is_dropped_but_the_rest_survives() {
        let mut gps = BTreeMap::new();
        gps.insert(
            tag::GPS_LATITUDE_REF,
            EntryData {
                ftype: ftype::ASCII,
                data: b"Q\0".to_vec(),
            },
        );
        gps.insert(
            tag::GPS_LATITUDE,
            EntryData {
                ftype: ftype::RATIONAL,
                data: IfdEntry::rational(
                    tag::GPS_LATITUDE,
                    &[
                        Rational::new(37, 1),
                        Rational::new(46, 1),
                        Rational::new(2964, 100),
                    ],
                )
                .data,
            },
        );
        let parsed = ParsedBlock {
            le: true,
            zeroth: BTreeMap::new(),
            exif: BTreeMap::new(),
            gps,
        };
        let decoded = interpret_metadata(&parsed).unwrap();
        assert!(decoded.geo.is_none());
    }

    #[test]
    fn malformed_timestamp_is_dropped_but_the_rest_survives() {
        let metadata = sample_metadata();
        let (zeroth, exif, gps) = metadata_ifd_entries(&metadata).unwrap();
        let zeroth = zeroth
            .into_iter()
            .map(|mut e| {
                if e.tag == tag::DATE_TIME {
                    e = IfdEntry::ascii(tag::DATE_TIME, "not a timestamp");
                }
                e
            })
            .collect();
        let block = assemble(zeroth, exif, gps, None);
        let decoded = decode_block(&block).unwrap();
        assert!(decoded.timestamp.is_none());
        assert_eq!(decoded.payload, metadata.payload);
        assert!(decoded.geo.is_some());
    }

    #[test]
    fn big_endian_blocks_parse_too() {
        // Hand-build a tiny MM block: one ASCII DateTime entry.
        let text = b"2021:10:01 20:00:00\0";
        let mut block: Vec<u8> = Vec::new();
        block.extend_from_slice(b"MM");
        block.extend_from_slice(&42u16.to_be_bytes());
        block.extend_from_slice(&8u32.to_be_bytes());
        block.extend_from_slice(&1u16.to_be_bytes()); // one entry
        block.extend_from_slice(&tag::DATE_TIME.to_be_bytes());
        block.extend_from_slice(&ftype::ASCII.to_be_bytes());
        block.extend_from_slice(&(text.len() as u32).to_be_bytes());
        block.extend_from_slice(&26u32.to_be_bytes()); // value offset
        block.extend_from_slice(&0u32.to_be_bytes()); // no next IFD
        block.extend_from_slice(text);

        let decoded = decode_block(&block).unwrap();
        let ts = decoded.timestamp.unwrap();
        assert_eq!(ts.offset().local_minus_utc(), 0);
        assert_eq!(
            ts.format("%Y:%m:%d %H:%M:%S").to_string(),
            "2021:10:01 20:00:00"
        );
    }

    #[test]
    fn truncated_blocks_error_instead_of_panicking() {
        let block = encode_block(&sample_metadata()).unwrap();
        for cut in [0, 4, 9, block.len() / 2] {
            assert!(decode_block(&block[..cut]).is_err());
        }
    }

    #[test]
    fn garbage_is_not_tiff() {
        assert!(matches!(
            decode_block(b"PNG\x0d\x0a\x1a\x0a garbage"),
            Err(ExifError::NotTiff)
        ));
    }
}
