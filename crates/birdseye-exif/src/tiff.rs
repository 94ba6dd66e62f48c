//! The lossless fallback container.
//!
//! When the source bytes cannot be reused (video frames, missing files),
//! the frame is written as a minimal baseline TIFF: uncompressed packed
//! RGB8 in a single strip, with the metadata tags in the same 0th IFD.
//! Compression was tried and rejected for this path -- LZW grew the files
//! and deflate broke metadata interop -- so strips are stored raw.

use birdseye_types::ImageFrame;

use crate::block::{
    assemble, interpret_metadata, metadata_ifd_entries, parse_block, tag, EntryData, IfdEntry,
    ParsedBlock,
};
use crate::error::{ExifError, ExifResult};
use crate::metadata::ImageMetadata;

pub fn is_tiff(data: &[u8]) -> bool {
    data.starts_with(b"II\x2A\x00") || data.starts_with(b"MM\x00\x2A")
}

/// Encode a frame and its metadata as a self-contained TIFF stream.
pub fn write_tiff(frame: &ImageFrame, metadata: &ImageMetadata) -> ExifResult<Vec<u8>> {
    let (mut zeroth, exif, gps) = metadata_ifd_entries(metadata)?;
    zeroth.push(IfdEntry::long(tag::IMAGE_WIDTH, &[frame.width()]));
    zeroth.push(IfdEntry::long(tag::IMAGE_LENGTH, &[frame.height()]));
    zeroth.push(IfdEntry::short(tag::BITS_PER_SAMPLE, &[8, 8, 8]));
    zeroth.push(IfdEntry::short(tag::COMPRESSION, &[1]));
    zeroth.push(IfdEntry::short(tag::PHOTOMETRIC, &[2]));
    zeroth.push(IfdEntry::short(tag::SAMPLES_PER_PIXEL, &[3]));
    zeroth.push(IfdEntry::long(tag::ROWS_PER_STRIP, &[frame.height()]));
    Ok(assemble(zeroth, exif, gps, Some(frame.pixels())))
}

fn single_integer(
    parsed: &ParsedBlock,
    entry_tag: u16,
) -> ExifResult<Option<u32>> {
    match parsed.zeroth.get(&entry_tag) {
        Some(entry) => Ok(entry.integers(parsed.le)?.first().copied()),
        None => Ok(None),
    }
}

fn required_integer(parsed: &ParsedBlock, entry_tag: u16, name: &str) -> ExifResult<u32> {
    single_integer(parsed, entry_tag)?.ok_or_else(|| {
        ExifError::Malformed(format!("image stream is missing its {name} tag"))
    })
}

fn integer_list(parsed: &ParsedBlock, entry: &EntryData) -> ExifResult<Vec<u32>> {
    entry.integers(parsed.le)
}

/// Decode a TIFF stream back into its frame and metadata.
pub fn read_tiff(data: &[u8]) -> ExifResult<(ImageFrame, ImageMetadata)> {
    let parsed = parse_block(data)?;
    let metadata = interpret_metadata(&parsed)?;

    let width = required_integer(&parsed, tag::IMAGE_WIDTH, "width")?;
    let height = required_integer(&parsed, tag::IMAGE_LENGTH, "height")?;

    let compression = single_integer(&parsed, tag::COMPRESSION)?.unwrap_or(1);
    if compression != 1 {
        return Err(ExifError::UnsupportedLayout(format!(
            "compression scheme {compression}"
        )));
    }
    let samples = single_integer(&parsed, tag::SAMPLES_PER_PIXEL)?.unwrap_or(3);
    if samples != 3 {
        return Err(ExifError::UnsupportedLayout(format!(
            "{samples} samples per pixel"
        )));
    }
    if let Some(bits) = parsed.zeroth.get(&tag::BITS_PER_SAMPLE) {
        let bits = integer_list(&parsed, bits)?;
        if bits.iter().any(|&b| b != 8) {
            return Err(ExifError::UnsupportedLayout(format!(
                "bit depths {bits:?}"
            )));
        }
    }

    let offsets = parsed
        .zeroth
        .get(&tag::STRIP_OFFSETS)
        .ok_or_else(|| ExifError::Malformed("image stream has no strip offsets".to_string()))
        .and_then(|e| integer_list(&parsed, e))?;
    let counts = parsed
        .zeroth
        .get(&tag::STRIP_BYTE_COUNTS)
        .ok_or_else(|| ExifError::Malformed("image stream has no strip byte counts".to_string()))
        .and_then(|e| integer_list(&parsed, e))?;
    if offsets.len() != counts.len() {
        return Err(ExifError::Malformed(format!(
            "{} strip offsets but {} byte counts",
            offsets.len(),
            counts.len()
        )));
    }

    let mut pixels = Vec::with_capacity(width as usize * height as usize * 3);
    for (&offset, &count) in offsets.iter().zip(&counts) {
        let start = offset as usize;
        let end = start + count as usize;
        let strip = data
            .get(start..end)
            .ok_or(ExifError::Truncated(start))?;
        pixels.extend_from_slice(strip);
    }

    let frame = ImageFrame::rgb8(width, height, pixels)
        .map_err(|e| ExifError::Malformed(e.to_string()))?;
    Ok((frame, metadata))
}

/// Decode only the metadata of a TIFF stream.
pub fn read_tiff_metadata(data: &[u8]) -> ExifResult<ImageMetadata> {
    let parsed = parse_block(data)?;
    interpret_metadata(&parsed)
}

#[cfg(test)]
mod tests {
    use birdseye_serial::Primitive;
    use birdseye_types::GeoPosition;
    use chrono::{FixedOffset, TimeZone};

    use super::*;

    fn gradient_frame() -> ImageFrame {
        let (width, height) = (20u32, 10u32);
        let mut pixels = Vec::with_capacity((width * height * 3) as usize);
        for row in 0..height {
            for col in 0..width {
                pixels.push((row * 12) as u8);
                pixels.push((col * 12) as u8);
                pixels.push(255 - (col * 12) as u8);
            }
        }
        ImageFrame::rgb8(width, height, pixels).unwrap()
    }

    fn sample_metadata() -> ImageMetadata {
        ImageMetadata {
            timestamp: Some(
                FixedOffset::east_opt(-4 * 3600)
                    .unwrap()
                    .with_ymd_and_hms(2021, 10, 1, 16, 0, 0)
                    .unwrap(),
            ),
            geo: Some(GeoPosition::new(37.7749, -122.4194, Some(476.43))),
            payload: Some(Primitive::from_json("{\"a\": 1}").unwrap()),
        }
    }

    #[test]
    fn pixels_roundtrip_byte_for_byte() {
        let frame = gradient_frame();
        let encoded = write_tiff(&frame, &sample_metadata()).unwrap();
        assert!(is_tiff(&encoded));
        let (decoded, _) = read_tiff(&encoded).unwrap();
        assert_eq!(decoded.width(), frame.width());
        assert_eq!(decoded.height(), frame.height());
        assert_eq!(decoded.pixels(), frame.pixels());
    }

    #[test]
    fn metadata_rides_along() {
        let metadata = sample_metadata();
        let encoded = write_tiff(&gradient_frame(), &metadata).unwrap();
        let (_, decoded) = read_tiff(&encoded).unwrap();
        assert_eq!(decoded.timestamp, metadata.timestamp);
        assert_eq!(decoded.payload, metadata.payload);
        let geo = decoded.geo.unwrap();
        assert!((geo.latitude.unwrap() - 37.7749).abs() < 1e-4);
        assert!((geo.altitude_m.unwrap() - 476.43).abs() < 1e-2);

        let metadata_only = read_tiff_metadata(&encoded).unwrap();
        assert_eq!(metadata_only, decoded);
    }

    #[test]
    fn empty_metadata_is_fine() {
        let encoded = write_tiff(&gradient_frame(), &ImageMetadata::default()).unwrap();
        let (frame, metadata) = read_tiff(&encoded).unwrap();
        assert_eq!(frame.pixels(), gradient_frame().pixels());
        assert!(metadata.is_empty());
    }

    #[test]
    fn compressed_streams_are_refused() {
        let mut encoded = write_tiff(&gradient_frame(), &ImageMetadata::default()).unwrap();
        // Flip the compression SHORT (written little-endian) to LZW (5).
        let pos = encoded
            .windows(2)
            .position(|w| w == tag::COMPRESSION.to_le_bytes())
            .unwrap();
        // tag(2) + type(2) + count(4) = 8 bytes to the inline value.
        encoded[pos + 8] = 5;
        assert!(matches!(
            read_tiff(&encoded),
            Err(ExifError::UnsupportedLayout(_))
        ));
    }

    #[test]
    fn metadata_block_without_image_tags_is_not_a_frame() {
        let block = crate::block::encode_block(&sample_metadata()).unwrap();
        assert!(read_tiff(&block).is_err());
        // ... but its metadata still reads fine.
        assert!(read_tiff_metadata(&block).is_ok());
    }
}
