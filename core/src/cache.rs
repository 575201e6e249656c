use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::fs::{create_dir_all, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

pub const CACHE_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: usize,
    pub dimension: usize,
    pub model: String,
    pub fingerprint: String,
    pub created_at: String,
    pub version: u32,
}

#[derive(Serialize, Deserialize)]
struct StoredEmbeddings {
    version: u32,
    model: String,
    fingerprint: String,
    embeddings: Vec<Vec<f32>>,
}

/// What a cached embedding set must agree with to be reused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    pub model: String,
    pub fingerprint: String,
    pub num_docs: usize,
}

impl CacheKey {
    /// Key for a corpus whose per-document embedding texts are `texts`.
    pub fn new(model: impl Into<String>, texts: &[String]) -> Self {
        Self { model: model.into(), fingerprint: fingerprint(texts), num_docs: texts.len() }
    }
}

/// SHA-1 over every embedding text in corpus order.
pub fn fingerprint(texts: &[String]) -> String {
    let mut hasher = Sha1::new();
    for text in texts {
        hasher.update((text.len() as u64).to_le_bytes());
        hasher.update(text.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    fn embeddings(&self) -> PathBuf { self.root.join("embeddings.bin") }
    fn meta(&self) -> PathBuf { self.root.join("meta.json") }
}

/// On-disk embedding set aligned to corpus order.
pub struct EmbeddingCache {
    paths: IndexPaths,
}

impl EmbeddingCache {
    pub fn new<P: AsRef<Path>>(root: P) -> Self { Self { paths: IndexPaths::new(root) } }

    pub fn exists(&self) -> bool { self.paths.embeddings().is_file() }

    /// Delete the stored vectors so the next build embeds from scratch.
    pub fn clear(&self) -> Result<()> {
        if self.exists() {
            std::fs::remove_file(self.paths.embeddings())?;
        }
        Ok(())
    }

    /// Load the stored vectors, refusing any set that was built for another
    /// model, another corpus, or that has ragged dimensions.
    pub fn load(&self, expected: &CacheKey) -> Result<Vec<Vec<f32>>> {
        let mut f = File::open(self.paths.embeddings())?;
        let mut buf = Vec::new();
        f.read_to_end(&mut buf)?;
        let stored: StoredEmbeddings =
            bincode::deserialize(&buf).map_err(|e| Error::CacheMismatch(format!("unreadable cache: {e}")))?;

        if stored.version != CACHE_VERSION {
            return Err(Error::CacheMismatch(format!("format version {} (expected {CACHE_VERSION})", stored.version)));
        }
        if stored.model != expected.model {
            return Err(Error::CacheMismatch(format!("built with model {:?}, index uses {:?}", stored.model, expected.model)));
        }
        if stored.embeddings.len() != expected.num_docs {
            return Err(Error::CacheMismatch(format!("{} vectors for {} documents", stored.embeddings.len(), expected.num_docs)));
        }
        if stored.fingerprint != expected.fingerprint {
            return Err(Error::CacheMismatch("corpus contents changed since the cache was written".into()));
        }
        if let Some(first) = stored.embeddings.first() {
            if let Some(pos) = stored.embeddings.iter().position(|v| v.len() != first.len()) {
                return Err(Error::CacheMismatch(format!(
                    "vector {pos} has dimension {} (expected {})",
                    stored.embeddings[pos].len(),
                    first.len()
                )));
            }
        }
        tracing::info!(path = %self.paths.embeddings().display(), count = stored.embeddings.len(), "loaded cached embeddings");
        Ok(stored.embeddings)
    }

    pub fn store(&self, key: &CacheKey, embeddings: &[Vec<f32>]) -> Result<()> {
        create_dir_all(&self.paths.root)?;
        let stored = StoredEmbeddings {
            version: CACHE_VERSION,
            model: key.model.clone(),
            fingerprint: key.fingerprint.clone(),
            embeddings: embeddings.to_vec(),
        };
        write_atomic(&self.paths.embeddings(), &bincode::serialize(&stored)?)?;

        let meta = MetaFile {
            num_docs: embeddings.len(),
            dimension: embeddings.first().map_or(0, Vec::len),
            model: key.model.clone(),
            fingerprint: key.fingerprint.clone(),
            created_at: time::OffsetDateTime::now_utc()
                .format(&time::format_description::well_known::Rfc3339)
                .unwrap_or_default(),
            version: CACHE_VERSION,
        };
        write_atomic(&self.paths.meta(), serde_json::to_string_pretty(&meta)?.as_bytes())?;
        tracing::info!(path = %self.paths.root.display(), count = embeddings.len(), "wrote embedding cache");
        Ok(())
    }

    pub fn load_meta(&self) -> Result<MetaFile> {
        let mut f = File::open(self.paths.meta())?;
        let mut buf = String::new();
        f.read_to_string(&mut buf)?;
        Ok(serde_json::from_str(&buf)?)
    }
}

/// Write to a sibling temp file and rename it over `path`, so readers never
/// see a partially written file.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    let mut f = File::create(&tmp)?;
    f.write_all(bytes)?;
    f.sync_all()?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn texts() -> Vec<String> { vec!["Title: A".into(), "Title: B".into()] }

    #[test]
    fn round_trips_with_matching_key() {
        let dir = tempdir().unwrap();
        let cache = EmbeddingCache::new(dir.path());
        assert!(!cache.exists());
        let key = CacheKey::new("m1", &texts());
        cache.store(&key, &[vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
        assert!(cache.exists());
        assert_eq!(cache.load(&key).unwrap()[1], vec![0.0, 1.0]);
        let meta = cache.load_meta().unwrap();
        assert_eq!((meta.num_docs, meta.dimension, meta.model.as_str()), (2, 2, "m1"));
        cache.clear().unwrap();
        assert!(!cache.exists());
    }

    #[test]
    fn rejects_other_model_or_corpus() {
        let dir = tempdir().unwrap();
        let cache = EmbeddingCache::new(dir.path());
        cache.store(&CacheKey::new("m1", &texts()), &[vec![1.0], vec![2.0]]).unwrap();

        let other_model = CacheKey::new("m2", &texts());
        assert!(matches!(cache.load(&other_model), Err(Error::CacheMismatch(_))));

        let mut grown = texts();
        grown.push("Title: C".into());
        assert!(matches!(cache.load(&CacheKey::new("m1", &grown)), Err(Error::CacheMismatch(_))));

        let edited = vec!["Title: A".to_string(), "Title: B2".to_string()];
        assert!(matches!(cache.load(&CacheKey::new("m1", &edited)), Err(Error::CacheMismatch(_))));
    }

    #[test]
    fn rejects_ragged_vectors() {
        let dir = tempdir().unwrap();
        let cache = EmbeddingCache::new(dir.path());
        let key = CacheKey::new("m1", &texts());
        cache.store(&key, &[vec![1.0, 2.0], vec![3.0]]).unwrap();
        assert!(matches!(cache.load(&key), Err(Error::CacheMismatch(_))));
    }

    #[test]
    fn truncated_file_is_a_mismatch() {
        let dir = tempdir().unwrap();
        let cache = EmbeddingCache::new(dir.path());
        std::fs::write(dir.path().join("embeddings.bin"), b"\x01\x00\x00\x00truncated").unwrap();
        assert!(cache.exists());
        let err = cache.load(&CacheKey::new("m1", &texts())).unwrap_err();
        assert!(matches!(err, Error::CacheMismatch(ref reason) if reason.starts_with("unreadable cache")));
    }

    #[test]
    fn store_leaves_no_temp_files() {
        let dir = tempdir().unwrap();
        let cache = EmbeddingCache::new(dir.path());
        let key = CacheKey::new("m1", &texts());
        cache.store(&key, &[vec![1.0], vec![2.0]]).unwrap();
        cache.store(&key, &[vec![3.0], vec![4.0]]).unwrap();
        let mut names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        assert_eq!(names, vec!["embeddings.bin", "meta.json"]);
        assert_eq!(cache.load(&key).unwrap(), vec![vec![3.0], vec![4.0]]);
    }

    #[test]
    fn fingerprint_depends_on_boundaries() {
        let a = fingerprint(&["ab".into(), "c".into()]);
        let b = fingerprint(&["a".into(), "bc".into()]);
        assert_ne!(a, b);
    }
}
