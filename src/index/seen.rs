//! Approximate URL seen set
//!
//! A bloom filter over normalized URL strings, sized from configuration for
//! the expected corpus. False positives silently drop a URL from the
//! frontier (acceptable); false negatives cannot occur. The raw bitmap is
//! checkpointed to disk so `--resume` does not re-enqueue already-seen URLs.

use bloomfilter::Bloom;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Magic prefix for the checkpoint file format
const SNAPSHOT_MAGIC: &[u8; 4] = b"DNS1";

/// Approximate membership set over normalized URL strings
pub struct SeenSet {
    bloom: Bloom<str>,
}

impl SeenSet {
    /// Creates an empty seen set sized for `capacity` insertions at the
    /// given false-positive rate
    pub fn new(capacity: usize, false_positive_rate: f64) -> Self {
        Self {
            bloom: Bloom::new_for_fp_rate(capacity, false_positive_rate),
        }
    }

    /// Records a URL and reports whether it was new
    ///
    /// Two concurrent calls for the same URL (serialized by the caller's
    /// lock) produce exactly one `true`.
    pub fn check_and_set(&mut self, url: &str) -> bool {
        !self.bloom.check_and_set(url)
    }

    /// Checks whether a URL has (probably) been recorded
    pub fn contains(&self, url: &str) -> bool {
        self.bloom.check(url)
    }

    /// Records a URL without reporting novelty
    pub fn insert(&mut self, url: &str) {
        self.bloom.set(url);
    }

    /// Writes the filter state to `path`
    ///
    /// Layout: magic, number_of_bits (u64 LE), number_of_hash_functions
    /// (u32 LE), the four sip keys (u64 LE each), then the raw bitmap.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);

        writer.write_all(SNAPSHOT_MAGIC)?;
        writer.write_all(&self.bloom.number_of_bits().to_le_bytes())?;
        writer.write_all(&self.bloom.number_of_hash_functions().to_le_bytes())?;
        for (k0, k1) in self.bloom.sip_keys() {
            writer.write_all(&k0.to_le_bytes())?;
            writer.write_all(&k1.to_le_bytes())?;
        }
        writer.write_all(&self.bloom.bitmap())?;
        writer.flush()
    }

    /// Restores a filter from a checkpoint written by [`SeenSet::save`]
    pub fn load(path: &Path) -> io::Result<Self> {
        let mut reader = BufReader::new(File::open(path)?);

        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != SNAPSHOT_MAGIC {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "not a seen-set checkpoint",
            ));
        }

        let mut u64_buf = [0u8; 8];
        let mut u32_buf = [0u8; 4];

        reader.read_exact(&mut u64_buf)?;
        let bits = u64::from_le_bytes(u64_buf);

        reader.read_exact(&mut u32_buf)?;
        let hash_fns = u32::from_le_bytes(u32_buf);

        let mut sip_keys = [(0u64, 0u64); 2];
        for key in sip_keys.iter_mut() {
            reader.read_exact(&mut u64_buf)?;
            key.0 = u64::from_le_bytes(u64_buf);
            reader.read_exact(&mut u64_buf)?;
            key.1 = u64::from_le_bytes(u64_buf);
        }

        let mut bitmap = Vec::new();
        reader.read_to_end(&mut bitmap)?;

        Ok(Self {
            bloom: Bloom::from_existing(&bitmap, bits, hash_fns, sip_keys),
        })
    }
}
