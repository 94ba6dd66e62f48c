//! JPEG APP1 splicing: the copy-without-recompression path.
//!
//! JPEG metadata lives in its own APP1 marker segment, so a record can be
//! attached to an existing file by rewriting the segment list and copying
//! every other byte through untouched. Pixel data is never re-encoded.

use crate::block::{decode_block, encode_block};
use crate::error::{ExifError, ExifResult};
use crate::metadata::ImageMetadata;

const MARKER: u8 = 0xFF;
const SOI: u8 = 0xD8;
const EOI: u8 = 0xD9;
const SOS: u8 = 0xDA;
const APP1: u8 = 0xE1;
const TEM: u8 = 0x01;

/// APP1 payloads carrying EXIF metadata start with this header.
const EXIF_HEADER: &[u8; 6] = b"Exif\0\0";

pub fn is_jpeg(data: &[u8]) -> bool {
    data.len() >= 2 && data[0] == MARKER && data[1] == SOI
}

/// One marker segment found while walking the stream.
struct Segment {
    /// Start of the segment including any fill bytes before the marker.
    start: usize,
    /// One past the last payload byte.
    end: usize,
    marker: u8,
    /// Start of the payload (after the two length bytes), when present.
    payload: Option<usize>,
}

/// Walk marker segments from after SOI up to (not including) the scan
/// data. Returns the segments and the offset where the remainder begins.
fn walk_segments(data: &[u8]) -> ExifResult<(Vec<Segment>, usize)> {
    if !is_jpeg(data) {
        return Err(ExifError::NotJpeg);
    }
    let mut segments = Vec::new();
    let mut i = 2;
    loop {
        if i >= data.len() {
            return Ok((segments, data.len()));
        }
        if data[i] != MARKER {
            return Err(ExifError::Malformed(format!(
                "expected a marker at byte {i}"
            )));
        }
        // Skip fill bytes before the marker code.
        let mut j = i + 1;
        while j < data.len() && data[j] == MARKER {
            j += 1;
        }
        if j >= data.len() {
            return Err(ExifError::Truncated(j));
        }
        let marker = data[j];
        if marker == SOS || marker == EOI {
            return Ok((segments, i));
        }
        if marker == TEM || (0xD0..=0xD7).contains(&marker) {
            // Standalone markers carry no length word.
            segments.push(Segment {
                start: i,
                end: j + 1,
                marker,
                payload: None,
            });
            i = j + 1;
            continue;
        }
        if j + 3 > data.len() {
            return Err(ExifError::Truncated(j));
        }
        let length = u16::from_be_bytes([data[j + 1], data[j + 2]]) as usize;
        if length < 2 {
            return Err(ExifError::Malformed(format!(
                "segment at byte {j} declares impossible length {length}"
            )));
        }
        let end = j + 1 + length;
        if end > data.len() {
            return Err(ExifError::Truncated(j));
        }
        segments.push(Segment {
            start: i,
            end,
            marker,
            payload: Some(j + 3),
        });
        i = end;
    }
}

fn is_exif_app1(data: &[u8], segment: &Segment) -> bool {
    segment.marker == APP1
        && segment
            .payload
            .is_some_and(|p| data[p..segment.end].starts_with(EXIF_HEADER))
}

/// Return a byte copy of `source` with the metadata block spliced in as an
/// APP1 segment directly after SOI. An existing EXIF APP1 segment is
/// replaced; every other segment is copied through byte-for-byte.
pub fn patch_jpeg(source: &[u8], metadata: &ImageMetadata) -> ExifResult<Vec<u8>> {
    let block = encode_block(metadata)?;
    let payload_length = 2 + EXIF_HEADER.len() + block.len();
    if payload_length > u16::MAX as usize {
        return Err(ExifError::Malformed(format!(
            "metadata block of {} bytes exceeds an APP1 segment",
            block.len()
        )));
    }
    let (segments, tail_start) = walk_segments(source)?;

    let mut out = Vec::with_capacity(source.len() + payload_length + 2);
    out.extend_from_slice(&source[..2]);
    out.push(MARKER);
    out.push(APP1);
    out.extend_from_slice(&(payload_length as u16).to_be_bytes());
    out.extend_from_slice(EXIF_HEADER);
    out.extend_from_slice(&block);
    for segment in &segments {
        if is_exif_app1(source, segment) {
            continue;
        }
        out.extend_from_slice(&source[segment.start..segment.end]);
    }
    out.extend_from_slice(&source[tail_start..]);
    Ok(out)
}

/// Extract the raw metadata block from a JPEG stream, if it carries one.
pub fn extract_jpeg_block(source: &[u8]) -> ExifResult<Option<Vec<u8>>> {
    let (segments, _) = walk_segments(source)?;
    for segment in &segments {
        if let Some(payload) = segment.payload {
            if is_exif_app1(source, segment) {
                return Ok(Some(
                    source[payload + EXIF_HEADER.len()..segment.end].to_vec(),
                ));
            }
        }
    }
    Ok(None)
}

/// Decode a JPEG stream's metadata. A stream with no EXIF segment yields
/// the empty triple.
pub fn read_jpeg_metadata(source: &[u8]) -> ExifResult<ImageMetadata> {
    match extract_jpeg_block(source)? {
        Some(block) => decode_block(&block),
        None => Ok(ImageMetadata::default()),
    }
}
