//! Durable per-domain frontier files
//!
//! Each domain owns one append-only file at
//! `{data_dir}/frontiers/{hh}/{domain}.frontier`, where `hh` is a two-hex-
//! char shard of the domain hash (256 shards) to keep directories small.
//! Appends are serialized by a per-domain mutex; reads are performed only by
//! the worker holding the domain's claim, so they are de-facto serialized.

use crate::frontier::record::{FrontierRecord, MAX_RECORD_BYTES};
use crate::Result;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;

/// Outcome of reading one record at an offset
#[derive(Debug)]
pub enum ReadNext {
    /// A full record, with the offset immediately after it
    Record(FrontierRecord, u64),

    /// A corrupt or unterminated line; the offset is advanced past it
    Corrupt(u64),

    /// No bytes at or after the offset
    End,
}

/// Append-only frontier file store for one process
pub struct FrontierStore {
    root: PathBuf,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl FrontierStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            root: data_dir.join("frontiers"),
            locks: DashMap::new(),
        }
    }

    /// The sharded file path for a domain's frontier
    pub fn frontier_path(&self, domain: &str) -> PathBuf {
        let digest = hex::encode(Sha256::digest(domain.as_bytes()));
        self.root
            .join(&digest[..2])
            .join(format!("{}.frontier", domain))
    }

    fn lock_for(&self, domain: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(domain.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Appends records to a domain's frontier file
    ///
    /// The whole batch is buffered and written in one call, then fsynced,
    /// so a crash cannot leave a partially-written batch mid-record (at
    /// worst the final record loses its newline and is skipped as corrupt
    /// on read). Returns the file path and the exact bytes written so the
    /// caller can update `frontier_size` in the index.
    pub async fn append(
        &self,
        domain: &str,
        records: &[FrontierRecord],
    ) -> Result<(PathBuf, u64)> {
        let path = self.frontier_path(domain);
        let lock = self.lock_for(domain);
        let _guard = lock.lock().await;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut buf = String::new();
        for record in records {
            buf.push_str(&record.to_line());
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(buf.as_bytes()).await?;
        file.sync_data().await?;

        Ok((path, buf.len() as u64))
    }

    /// Reads the next record starting at `offset`
    ///
    /// Corrupt lines (malformed, over-length, unterminated, or invalid
    /// UTF-8) are logged at warn and reported as [`ReadNext::Corrupt`] with
    /// the offset already advanced past them, so the caller simply persists
    /// the new offset and moves on.
    pub async fn read_next(&self, domain: &str, offset: u64) -> Result<ReadNext> {
        let path = self.frontier_path(domain);

        let mut file = match tokio::fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(ReadNext::End);
            }
            Err(e) => return Err(e.into()),
        };

        file.seek(SeekFrom::Start(offset)).await?;
        let mut reader = BufReader::new(file);

        let mut buf = Vec::new();
        let n = reader.read_until(b'\n', &mut buf).await?;
        if n == 0 {
            return Ok(ReadNext::End);
        }

        let new_offset = offset + n as u64;

        if n > MAX_RECORD_BYTES {
            tracing::warn!(
                "Skipping over-length frontier record ({} bytes) in {} at offset {}",
                n,
                domain,
                offset
            );
            return Ok(ReadNext::Corrupt(new_offset));
        }

        if !buf.ends_with(b"\n") {
            tracing::warn!(
                "Skipping unterminated frontier record in {} at offset {}",
                domain,
                offset
            );
            return Ok(ReadNext::Corrupt(new_offset));
        }

        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line,
            Err(_) => {
                tracing::warn!(
                    "Skipping non-UTF-8 frontier record in {} at offset {}",
                    domain,
                    offset
                );
                return Ok(ReadNext::Corrupt(new_offset));
            }
        };

        match FrontierRecord::parse_line(line) {
            Ok(record) => Ok(ReadNext::Record(record, new_offset)),
            Err(e) => {
                tracing::warn!(
                    "Skipping corrupt frontier record in {} at offset {}: {}",
                    domain,
                    offset,
                    e
                );
                Ok(ReadNext::Corrupt(new_offset))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use url::Url;

    fn record(path: &str, depth: u32) -> FrontierRecord {
        FrontierRecord::new(
            Url::parse(&format!("http://a.example{}", path)).unwrap(),
            depth,
            1.0,
            1_700_000_000,
        )
    }

    #[test]
    fn test_frontier_path_is_sharded() {
        let store = FrontierStore::new(Path::new("/data"));
        let path = store.frontier_path("a.example");

        let s = path.to_string_lossy();
        assert!(s.starts_with("/data/frontiers/"));
        assert!(s.ends_with("/a.example.frontier"));

        // Shard component is two hex chars
        let shard = path.parent().unwrap().file_name().unwrap().to_string_lossy();
        assert_eq!(shard.len(), 2);
        assert!(shard.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_frontier_path_is_stable() {
        let store = FrontierStore::new(Path::new("/data"));
        assert_eq!(
            store.frontier_path("a.example"),
            store.frontier_path("a.example")
        );
    }

    #[tokio::test]
    async fn test_append_then_read_in_order() {
        let dir = tempdir().unwrap();
        let store = FrontierStore::new(dir.path());

        let records = vec![record("/1", 0), record("/2", 0), record("/3", 1)];
        let (_, bytes) = store.append("a.example", &records).await.unwrap();
        assert!(bytes > 0);

        let mut offset = 0;
        for expected in &records {
            match store.read_next("a.example", offset).await.unwrap() {
                ReadNext::Record(rec, next) => {
                    assert_eq!(&rec, expected);
                    offset = next;
                }
                other => panic!("expected record, got {:?}", other),
            }
        }

        assert!(matches!(
            store.read_next("a.example", offset).await.unwrap(),
            ReadNext::End
        ));
    }

    #[tokio::test]
    async fn test_offsets_sum_to_appended_bytes() {
        let dir = tempdir().unwrap();
        let store = FrontierStore::new(dir.path());

        let records = vec![record("/alpha", 0), record("/beta-longer-path", 2)];
        let (_, bytes) = store.append("a.example", &records).await.unwrap();

        let mut offset = 0;
        while let ReadNext::Record(_, next) = store.read_next("a.example", offset).await.unwrap() {
            offset = next;
        }
        assert_eq!(offset, bytes);
    }

    #[tokio::test]
    async fn test_append_accumulates_across_batches() {
        let dir = tempdir().unwrap();
        let store = FrontierStore::new(dir.path());

        let (_, first) = store.append("a.example", &[record("/1", 0)]).await.unwrap();
        let (_, second) = store.append("a.example", &[record("/2", 0)]).await.unwrap();

        match store.read_next("a.example", first).await.unwrap() {
            ReadNext::Record(rec, next) => {
                assert_eq!(rec.url.path(), "/2");
                assert_eq!(next, first + second);
            }
            other => panic!("expected record, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_read_missing_file_is_end() {
        let dir = tempdir().unwrap();
        let store = FrontierStore::new(dir.path());

        assert!(matches!(
            store.read_next("nowhere.example", 0).await.unwrap(),
            ReadNext::End
        ));
    }

    #[tokio::test]
    async fn test_corrupt_line_is_skipped_with_offset_advanced() {
        let dir = tempdir().unwrap();
        let store = FrontierStore::new(dir.path());

        let (path, _) = store.append("a.example", &[record("/1", 0)]).await.unwrap();

        // Splice a garbage line between two good records
        let garbage = "this is not | a record\n";
        {
            use std::io::Write;
            let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
            file.write_all(garbage.as_bytes()).unwrap();
        }
        store.append("a.example", &[record("/2", 0)]).await.unwrap();

        let mut offset = 0;
        let mut urls = Vec::new();
        loop {
            match store.read_next("a.example", offset).await.unwrap() {
                ReadNext::Record(rec, next) => {
                    urls.push(rec.url.path().to_string());
                    offset = next;
                }
                ReadNext::Corrupt(next) => {
                    assert!(next > offset);
                    offset = next;
                }
                ReadNext::End => break,
            }
        }
        assert_eq!(urls, vec!["/1", "/2"]);
    }

    #[tokio::test]
    async fn test_unterminated_tail_is_corrupt() {
        let dir = tempdir().unwrap();
        let store = FrontierStore::new(dir.path());

        let (path, bytes) = store.append("a.example", &[record("/1", 0)]).await.unwrap();
        {
            use std::io::Write;
            let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
            file.write_all(b"http://a.example/partial|0|1").unwrap();
        }

        match store.read_next("a.example", bytes).await.unwrap() {
            ReadNext::Corrupt(next) => assert!(next > bytes),
            other => panic!("expected corrupt, got {:?}", other),
        }
    }
}
