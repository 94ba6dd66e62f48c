//! Sampled content digests.
//!
//! Media files are large and mostly read once; the digest trades exactness
//! for speed by seeding with the byte length and, above a threshold,
//! hashing a few evenly spaced windows instead of the whole file. The
//! result stays deterministic and sensitive to edits wherever a window
//! lands.

use std::fmt;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::{AddressError, AddressResult};

/// 256-bit content digest of a file.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentDigest([u8; 32]);

impl ContentDigest {
    /// Digest of an in-memory byte run (unsampled).
    pub fn of_bytes(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Wrap a pre-computed hash.
    pub fn from_hash(hash: [u8; 32]) -> Self {
        Self(hash)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First 8 hex characters, for filename prefixes.
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    pub fn from_hex(s: &str) -> AddressResult<Self> {
        let bytes = hex::decode(s).map_err(|e| AddressError::InvalidHex(e.to_string()))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| AddressError::InvalidHex(format!("wrong length: {s}")))?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentDigest({})", self.short_hex())
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Length-seeded sampling hasher.
///
/// Files shorter than `threshold` are hashed whole. Longer files contribute
/// `samples` windows of `threshold / samples` bytes each, spaced so the
/// first window starts at byte 0 and the last ends at the final byte.
#[derive(Clone, Copy, Debug)]
pub struct SampledHasher {
    threshold: u64,
    samples: u32,
}

impl Default for SampledHasher {
    fn default() -> Self {
        Self {
            threshold: 100_000,
            samples: 3,
        }
    }
}

impl SampledHasher {
    pub fn new(threshold: u64, samples: u32) -> AddressResult<Self> {
        if samples < 2 {
            return Err(AddressError::InvalidSampleCount(samples));
        }
        Ok(Self { threshold, samples })
    }

    /// Digest a file on disk.
    pub fn hash_file(&self, path: &Path) -> AddressResult<ContentDigest> {
        let mut file = File::open(path)?;
        let len = file.metadata()?.len();
        self.hash_reader(&mut file, len)
    }

    /// Digest a seekable stream of known length.
    pub fn hash_reader<R: Read + Seek>(
        &self,
        reader: &mut R,
        len: u64,
    ) -> AddressResult<ContentDigest> {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&len.to_be_bytes());
        if len < self.threshold {
            let mut buf = Vec::with_capacity(len as usize);
            reader.read_to_end(&mut buf)?;
            hasher.update(&buf);
        } else {
            let window = self.threshold / u64::from(self.samples);
            let mut buf = vec![0u8; window as usize];
            for i in 0..u64::from(self.samples) {
                let position = i * (len - window) / (u64::from(self.samples) - 1);
                reader.seek(SeekFrom::Start(position))?;
                reader.read_exact(&mut buf)?;
                hasher.update(&buf);
            }
        }
        Ok(ContentDigest(*hasher.finalize().as_bytes()))
    }

    /// Digest an in-memory byte run with the same sampling rules.
    pub fn hash_slice(&self, data: &[u8]) -> ContentDigest {
        let len = data.len() as u64;
        let mut hasher = blake3::Hasher::new();
        hasher.update(&len.to_be_bytes());
        if len < self.threshold {
            hasher.update(data);
        } else {
            let window = (self.threshold / u64::from(self.samples)) as usize;
            for i in 0..u64::from(self.samples) {
                let position = (i * (len - window as u64) / (u64::from(self.samples) - 1)) as usize;
                hasher.update(&data[position..position + window]);
            }
        }
        ContentDigest(*hasher.finalize().as_bytes())
    }
}
