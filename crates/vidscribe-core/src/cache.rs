//! Two-tier transcript cache: in-process map plus durable on-disk store.
//!
//! Retention is proportional to acquisition cost: the TTL always keys
//! off how an entry was *originally* obtained, even when the entry is
//! later served under the generic cache tag. Disk writes are whole-file
//! replace-on-write; anything that fails to parse on read is treated as
//! expired and removed rather than crashing a pipeline run.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{PipelineError, PipelineResult};
use crate::segment::{AcquisitionMethod, TranscriptSegment};

const CACHE_FILE_EXT: &str = "json";

/// One cached transcript. Immutable once created; callers get clones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub video_id: String,
    pub segments: Vec<TranscriptSegment>,
    /// The method that originally produced the segments. TTL policy keys
    /// off this even when the entry is re-served as a generic cache hit.
    pub original_method: AcquisitionMethod,
    pub cached_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(
        video_id: impl Into<String>,
        segments: Vec<TranscriptSegment>,
        original_method: AcquisitionMethod,
    ) -> Self {
        Self {
            video_id: video_id.into(),
            segments,
            original_method,
            cached_at: Utc::now(),
        }
    }

    fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.cached_at) > self.original_method.cache_ttl()
    }
}

pub struct TranscriptCache {
    memory: DashMap<String, CacheEntry>,
    dir: PathBuf,
}

impl TranscriptCache {
    /// Default on-disk location: a subfolder of the process temp dir.
    pub fn default_dir() -> PathBuf {
        std::env::temp_dir().join("vidscribe-cache")
    }

    pub fn open(dir: PathBuf) -> PipelineResult<Self> {
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            memory: DashMap::new(),
            dir,
        })
    }

    /// Look up a usable entry: memory first, then disk (promoting the hit
    /// back into memory). Expired or corrupt entries are deleted on the way.
    pub fn get(&self, video_id: &str) -> Option<CacheEntry> {
        self.get_at(video_id, Utc::now())
    }

    fn get_at(&self, video_id: &str, now: DateTime<Utc>) -> Option<CacheEntry> {
        let key = sanitize_video_id(video_id);

        if let Some(entry) = self.memory.get(&key).map(|e| e.clone()) {
            if entry.is_expired_at(now) {
                self.memory.remove(&key);
                let _ = std::fs::remove_file(self.path_for(&key));
                return None;
            }
            return Some(entry);
        }

        let path = self.path_for(&key);
        let entry = match read_entry(&path) {
            Some(entry) => entry,
            None => return None,
        };
        if entry.is_expired_at(now) {
            let _ = std::fs::remove_file(&path);
            return None;
        }

        self.memory.insert(key, entry.clone());
        Some(entry)
    }

    /// Store a successful, non-empty acquisition. Failed or empty results
    /// are never cached.
    pub fn put(&self, entry: CacheEntry) -> PipelineResult<()> {
        if entry.segments.is_empty() {
            return Err(PipelineError::EmptyTranscript);
        }

        let key = sanitize_video_id(&entry.video_id);
        let path = self.path_for(&key);

        // Whole-file replace-on-write: a reader never sees a partial file.
        let tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        serde_json::to_writer(tmp.as_file(), &entry)?;
        tmp.persist(&path)
            .map_err(|e| PipelineError::Io(e.error))?;

        self.memory.insert(key, entry);
        Ok(())
    }

    /// Fast check for a usable speech-to-text-derived entry, so callers
    /// can skip the cascade's expensive steps entirely.
    pub fn has_cached_stt(&self, video_id: &str) -> bool {
        self.get(video_id)
            .is_some_and(|entry| entry.original_method.is_stt())
    }

    /// Sweep the disk tier, deleting expired and corrupt files. Run at
    /// process start and optionally on a schedule. Returns the number of
    /// files removed.
    pub fn evict_expired(&self) -> PipelineResult<usize> {
        self.evict_expired_at(Utc::now())
    }

    fn evict_expired_at(&self, now: DateTime<Utc>) -> PipelineResult<usize> {
        let mut removed = 0;

        for dir_entry in std::fs::read_dir(&self.dir)? {
            let path = dir_entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(CACHE_FILE_EXT) {
                continue;
            }

            let stale = match read_entry(&path) {
                Some(entry) => entry.is_expired_at(now),
                // Corrupt == expired.
                None => true,
            };

            if stale {
                if let Err(error) = std::fs::remove_file(&path) {
                    warn!(path = %path.display(), %error, "failed to evict cache file");
                } else {
                    removed += 1;
                }
            }
        }

        if removed > 0 {
            debug!(removed, "evicted stale cache files");
        }
        Ok(removed)
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.{CACHE_FILE_EXT}"))
    }
}

fn read_entry(path: &Path) -> Option<CacheEntry> {
    let raw = std::fs::read(path).ok()?;
    match serde_json::from_slice(&raw) {
        Ok(entry) => Some(entry),
        Err(error) => {
            warn!(path = %path.display(), %error, "corrupt cache file, treating as miss");
            let _ = std::fs::remove_file(path);
            None
        }
    }
}

/// Strip everything but identifier-safe characters before deriving a file
/// path, so a hostile id cannot traverse out of the cache directory.
pub fn sanitize_video_id(video_id: &str) -> String {
    video_id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn segments() -> Vec<TranscriptSegment> {
        vec![TranscriptSegment::new("hello world", 0.0, 2.0)]
    }

    fn cache() -> (tempfile::TempDir, TranscriptCache) {
        let dir = tempfile::tempdir().unwrap();
        let cache = TranscriptCache::open(dir.path().to_path_buf()).unwrap();
        (dir, cache)
    }

    #[test]
    fn caption_entries_expire_after_a_day() {
        let (_dir, cache) = cache();
        let entry = CacheEntry::new("dQw4w9WgXcQ", segments(), AcquisitionMethod::CaptionScrape);
        let t0 = entry.cached_at;
        cache.put(entry).unwrap();

        assert!(cache.get_at("dQw4w9WgXcQ", t0 + Duration::hours(23)).is_some());
        assert!(cache.get_at("dQw4w9WgXcQ", t0 + Duration::hours(25)).is_none());
    }

    #[test]
    fn stt_entries_survive_a_month() {
        let (_dir, cache) = cache();
        let entry = CacheEntry::new("dQw4w9WgXcQ", segments(), AcquisitionMethod::Deepgram);
        let t0 = entry.cached_at;
        cache.put(entry).unwrap();

        assert!(cache.get_at("dQw4w9WgXcQ", t0 + Duration::days(29)).is_some());
        assert!(cache.get_at("dQw4w9WgXcQ", t0 + Duration::days(31)).is_none());
    }

    #[test]
    fn disk_hits_are_promoted_to_memory() {
        let dir = tempfile::tempdir().unwrap();
        let writer = TranscriptCache::open(dir.path().to_path_buf()).unwrap();
        writer
            .put(CacheEntry::new("abcdefghijk", segments(), AcquisitionMethod::Groq))
            .unwrap();

        // A fresh cache over the same directory simulates a restart: the
        // memory tier is empty but the disk tier survives.
        let reader = TranscriptCache::open(dir.path().to_path_buf()).unwrap();
        assert!(reader.memory.is_empty());
        assert!(reader.get("abcdefghijk").is_some());
        assert!(!reader.memory.is_empty());
    }

    #[test]
    fn corrupt_files_are_a_miss_and_get_removed() {
        let (_dir, cache) = cache();
        let path = cache.path_for("abcdefghijk");
        std::fs::write(&path, b"{ not json").unwrap();

        assert!(cache.get("abcdefghijk").is_none());
        assert!(!path.exists());
    }

    #[test]
    fn eviction_sweep_removes_expired_and_corrupt_files() {
        let (_dir, cache) = cache();
        cache
            .put(CacheEntry::new("aaaaaaaaaaa", segments(), AcquisitionMethod::CaptionScrape))
            .unwrap();
        cache
            .put(CacheEntry::new("bbbbbbbbbbb", segments(), AcquisitionMethod::Groq))
            .unwrap();
        std::fs::write(cache.path_for("ccccccccccc"), b"garbage").unwrap();

        // Two days out: the caption entry and the corrupt file go, the
        // STT entry stays.
        let now = Utc::now() + Duration::days(2);
        assert_eq!(cache.evict_expired_at(now).unwrap(), 2);
        assert!(cache.path_for("bbbbbbbbbbb").exists());
    }

    #[test]
    fn empty_results_are_never_cached() {
        let (_dir, cache) = cache();
        let entry = CacheEntry::new("dQw4w9WgXcQ", Vec::new(), AcquisitionMethod::Groq);
        assert!(cache.put(entry).is_err());
    }

    #[test]
    fn has_cached_stt_distinguishes_methods() {
        let (_dir, cache) = cache();
        cache
            .put(CacheEntry::new("aaaaaaaaaaa", segments(), AcquisitionMethod::CaptionScrape))
            .unwrap();
        cache
            .put(CacheEntry::new("bbbbbbbbbbb", segments(), AcquisitionMethod::LocalWhisper))
            .unwrap();

        assert!(!cache.has_cached_stt("aaaaaaaaaaa"));
        assert!(cache.has_cached_stt("bbbbbbbbbbb"));
    }

    #[test]
    fn hostile_ids_cannot_escape_the_cache_dir() {
        assert_eq!(sanitize_video_id("../../etc/passwd"), "etcpasswd");
        assert_eq!(sanitize_video_id("dQw4w9WgXcQ"), "dQw4w9WgXcQ");
        assert_eq!(sanitize_video_id("a/b\\c:d"), "abcd");
    }
}
