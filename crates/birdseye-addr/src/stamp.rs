//! Time-ordered content stamps.
//!
//! A stamp is a 128-bit identifier in the ULID mold, rearranged for media
//! files synced between machines:
//!
//! - 40 bits: millisecond Unix timestamp with the low 8 bits dropped.
//!   Different operating systems report modification times at different
//!   precisions (off by ~10 ms between copies); truncating absorbs that.
//! - 15 bits: grouping tag (e.g. which device recorded the file), taken
//!   from the first two bytes of a domain-tagged hash of the grouping
//!   arguments. The bit after the tag is reserved and always zero.
//! - 72 bits: bytes 1–9 of the file's content digest as randomness.
//!
//! Identical bytes + identical modification time + identical grouping give
//! an identical stamp; a content edit moves only the randomness segment, a
//! retimestamp moves only the timestamp segment.

use std::fmt;
use std::path::Path;
use std::time::UNIX_EPOCH;

use crate::digest::{ContentDigest, SampledHasher};
use crate::error::{AddressError, AddressResult};

/// Domain tag for grouping hashes.
const GROUPING_DOMAIN: &str = "birdseye-grouping-v1";

/// Crockford base-32 alphabet used for the string form.
const ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

/// Stamp strings are always 26 characters, like standard ULIDs.
pub const STAMP_STR_LEN: usize = 26;

/// Hash grouping arguments (device name, channel, ...) down to tag bytes.
pub fn grouping_hash(args: &str) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(GROUPING_DOMAIN.as_bytes());
    hasher.update(b":");
    hasher.update(args.as_bytes());
    *hasher.finalize().as_bytes()
}

/// A 128-bit time-ordered, content-derived identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentStamp([u8; 16]);

impl ContentStamp {
    /// Compose a stamp from its three ingredients.
    pub fn compose(mtime_ms: u64, digest: &ContentDigest, grouping: Option<&str>) -> Self {
        let mut bytes = [0u8; 16];

        // Top 40 of the 48 timestamp bits, big-endian.
        let ts = (mtime_ms & 0xFFFF_FFFF_FFFF).to_be_bytes();
        bytes[..5].copy_from_slice(&ts[2..7]);

        if let Some(args) = grouping {
            let tag = grouping_hash(args);
            bytes[5] = tag[0];
            bytes[6] = tag[1] & 0b1111_1110; // low bit reserved
        }

        bytes[7..16].copy_from_slice(&digest.as_bytes()[1..10]);
        Self(bytes)
    }

    /// Stamp a file on disk from its modification time and content.
    pub fn for_file(
        path: &Path,
        grouping: Option<&str>,
        hasher: &SampledHasher,
    ) -> AddressResult<Self> {
        let metadata = std::fs::metadata(path)?;
        let mtime_ms = metadata
            .modified()?
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        let digest = hasher.hash_file(path)?;
        Ok(Self::compose(mtime_ms, &digest, grouping))
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// The embedded millisecond timestamp. The dropped low 8 bits read
    /// back as zero.
    pub fn timestamp_ms(&self) -> u64 {
        let mut ts = [0u8; 8];
        ts[2..7].copy_from_slice(&self.0[..5]);
        u64::from_be_bytes(ts)
    }

    /// The randomness segment (content-derived bytes).
    pub fn randomness(&self) -> &[u8] {
        &self.0[7..16]
    }

    /// Parse the 26-character Crockford base-32 form.
    pub fn parse(s: &str) -> AddressResult<Self> {
        let chars = s.as_bytes();
        if chars.len() != STAMP_STR_LEN {
            return Err(AddressError::InvalidStamp(s.to_string()));
        }
        let mut value: u128 = 0;
        for (i, &c) in chars.iter().enumerate() {
            let digit = ALPHABET
                .iter()
                .position(|&a| a == c.to_ascii_uppercase())
                .ok_or_else(|| AddressError::InvalidStamp(s.to_string()))?;
            // 26 chars carry 130 bits; the first must fit in the spare 3.
            if i == 0 && digit > 7 {
                return Err(AddressError::InvalidStamp(s.to_string()));
            }
            value = (value << 5) | digit as u128;
        }
        Ok(Self(value.to_be_bytes()))
    }
}

impl fmt::Display for ContentStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = u128::from_be_bytes(self.0);
        let mut out = [0u8; STAMP_STR_LEN];
        for (i, slot) in out.iter_mut().enumerate() {
            let shift = 5 * (STAMP_STR_LEN - 1 - i);
            *slot = ALPHABET[((value >> shift) & 0x1F) as usize];
        }
        // The alphabet is ASCII by construction.
        f.write_str(std::str::from_utf8(&out).map_err(|_| fmt::Error)?)
    }
}

impl fmt::Debug for ContentStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentStamp({self})")
    }
}

fn split_basename(path: &str) -> (&str, &str) {
    match path.rfind(['/', '\\']) {
        Some(pos) => (&path[..pos + 1], &path[pos + 1..]),
        None => ("", path),
    }
}

/// The stamp prefix of a `<stamp>_<name>` filename, if it has one.
pub fn stamp_prefix_of(path: &str) -> Option<ContentStamp> {
    let (_, basename) = split_basename(path);
    let prefix = basename.split('_').next()?;
    if prefix.len() != STAMP_STR_LEN {
        return None;
    }
    ContentStamp::parse(prefix).ok()
}

/// Drop a `<stamp>_` filename prefix, leaving the rest of the path alone.
pub fn strip_stamp_prefix(path: &str) -> String {
    if stamp_prefix_of(path).is_none() {
        return path.to_string();
    }
    let (dir, basename) = split_basename(path);
    match basename.split_once('_') {
        Some((_, rest)) => format!("{dir}{rest}"),
        None => path.to_string(),
    }
}

/// The embedded timestamp of a stamp-prefixed path, if any.
pub fn timestamp_from_stamped_path(path: &str) -> Option<u64> {
    stamp_prefix_of(path).map(|stamp| stamp.timestamp_ms())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digest_of(byte: u8) -> ContentDigest {
        ContentDigest::of_bytes(&[byte; 64])
    }

    #[test]
    fn compose_is_deterministic() {
        let a = ContentStamp::compose(1_698_000_000_123, &digest_of(1), Some("cam-A"));
        let b = ContentStamp::compose(1_698_000_000_123, &digest_of(1), Some("cam-A"));
        assert_eq!(a, b);
    }

    #[test]
    fn content_edit_moves_only_the_randomness_segment() {
        let mtime = 1_698_000_000_123;
        let a = ContentStamp::compose(mtime, &digest_of(1), Some("cam-A"));
        let b = ContentStamp::compose(mtime, &digest_of(2), Some("cam-A"));
        assert_ne!(a, b);
        assert_eq!(a.as_bytes()[..7], b.as_bytes()[..7]);
        assert_ne!(a.randomness(), b.randomness());
    }

    #[test]
    fn retimestamp_moves_only_the_timestamp_segment() {
        let a = ContentStamp::compose(1_698_000_000_000, &digest_of(1), Some("cam-A"));
        let b = ContentStamp::compose(1_698_000_400_000, &digest_of(1), Some("cam-A"));
        assert_ne!(a, b);
        assert_ne!(a.as_bytes()[..5], b.as_bytes()[..5]);
        assert_eq!(a.as_bytes()[5..], b.as_bytes()[5..]);
    }

    #[test]
    fn timestamp_truncates_low_eight_bits() {
        let stamp = ContentStamp::compose(0x0123_4567_89AB, &digest_of(1), None);
        assert_eq!(stamp.timestamp_ms(), 0x0123_4567_8900);
    }

    #[test]
    fn grouping_changes_only_the_tag_bytes() {
        let mtime = 1_698_000_000_123;
        let a = ContentStamp::compose(mtime, &digest_of(1), Some("cam-A"));
        let b = ContentStamp::compose(mtime, &digest_of(1), Some("cam-B"));
        assert_eq!(a.as_bytes()[..5], b.as_bytes()[..5]);
        assert_eq!(a.as_bytes()[7..], b.as_bytes()[7..]);
        assert_ne!(a.as_bytes()[5..7], b.as_bytes()[5..7]);
    }

    #[test]
    fn reserved_bit_is_always_zero() {
        let stamp = ContentStamp::compose(1, &digest_of(3), Some("anything"));
        assert_eq!(stamp.as_bytes()[6] & 1, 0);
    }

    #[test]
    fn string_form_roundtrips() {
        let stamp = ContentStamp::compose(1_698_000_000_123, &digest_of(9), Some("cam-A"));
        let text = stamp.to_string();
        assert_eq!(text.len(), STAMP_STR_LEN);
        assert_eq!(ContentStamp::parse(&text).unwrap(), stamp);
    }

    #[test]
    fn parse_rejects_bad_strings() {
        assert!(ContentStamp::parse("short").is_err());
        assert!(ContentStamp::parse(&"U".repeat(26)).is_err()); // 'U' not in alphabet
        assert!(ContentStamp::parse(&"Z".repeat(26)).is_err()); // overflows 128 bits
    }

    #[test]
    fn filename_prefix_helpers() {
        let stamp = ContentStamp::compose(1_698_000_000_123, &digest_of(4), None);
        let path = format!("/sync/{stamp}_DJI_0516.jpg");
        assert_eq!(stamp_prefix_of(&path), Some(stamp));
        assert_eq!(strip_stamp_prefix(&path), "/sync/DJI_0516.jpg");
        assert_eq!(timestamp_from_stamped_path(&path), Some(stamp.timestamp_ms()));

        assert_eq!(stamp_prefix_of("/sync/DJI_0516.jpg"), None);
        assert_eq!(strip_stamp_prefix("/sync/DJI_0516.jpg"), "/sync/DJI_0516.jpg");
    }
}
