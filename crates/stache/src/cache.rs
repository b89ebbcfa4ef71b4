// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Compiled artifact caching.
//!
//! The engine keeps every compiled template in its own in-memory registry.
//! A [`Cache`] sits behind that registry and stores [`CompiledArtifact`]s,
//! the parse tree of a template together with its exact source, so a fresh
//! engine (or a fresh process, with [`FileSystemCache`]) can skip parsing.
//!
//! # Cache Implementations
//!
//! - [`NoOpCache`]: stores nothing (the default)
//! - [`MemoryCache`]: in-memory LRU
//! - [`FileSystemCache`]: one JSON file per key, fronted by a [`MemoryCache`]
//!
//! # Custom Caches
//!
//! Implement the [`Cache`] trait to back artifacts with anything else.

use crate::error::{Result, StacheError};
use crate::parser::Node;
use lru::LruCache;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

/// A parsed template, as stored by a [`Cache`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledArtifact {
    /// Name the template was first compiled under.
    pub name: String,
    /// Cache key the artifact was stored under.
    pub key: String,
    /// The exact template source. Section lambdas slice their bodies from it.
    pub source: String,
    /// The parse tree, recompiled into render steps on load.
    pub tree: Vec<Node>,
}

impl CompiledArtifact {
    /// Creates an artifact.
    pub fn new(name: &str, key: &str, source: &str, tree: Vec<Node>) -> Self {
        Self {
            name: name.to_string(),
            key: key.to_string(),
            source: source.to_string(),
            tree,
        }
    }
}

/// Storage for compiled artifacts.
///
/// Implementations must be thread-safe; one engine may be shared across
/// threads.
pub trait Cache: Send + Sync + std::fmt::Debug {
    /// Retrieves an artifact.
    fn get(&self, key: &str) -> Result<Option<Arc<CompiledArtifact>>>;
    /// Stores an artifact.
    fn set(&self, key: &str, artifact: Arc<CompiledArtifact>) -> Result<()>;
    /// Removes an artifact.
    fn remove(&self, key: &str) -> Result<()>;
    /// Removes every artifact.
    fn clear(&self) -> Result<()>;
    /// Checks if a key is stored.
    fn contains_key(&self, key: &str) -> bool;
    /// Creates a boxed handle to the same storage.
    fn clone_box(&self) -> Box<dyn Cache>;
}

impl Clone for Box<dyn Cache> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

fn lock_error() -> StacheError {
    StacheError::Cache("Failed to acquire cache lock".to_string())
}

/// In-memory LRU cache.
///
/// Clones share the same storage.
#[derive(Debug, Clone)]
pub struct MemoryCache {
    cache: Arc<Mutex<LruCache<String, Arc<CompiledArtifact>>>>,
}

impl MemoryCache {
    /// Creates a cache holding at most `capacity` artifacts (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Arc::new(Mutex::new(LruCache::new(capacity))),
        }
    }

    /// Number of stored artifacts.
    pub fn len(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// True when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<Arc<CompiledArtifact>>> {
        let mut cache = self.cache.lock().map_err(|_| lock_error())?;
        Ok(cache.get(key).cloned())
    }

    fn set(&self, key: &str, artifact: Arc<CompiledArtifact>) -> Result<()> {
        let mut cache = self.cache.lock().map_err(|_| lock_error())?;
        cache.put(key.to_string(), artifact);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut cache = self.cache.lock().map_err(|_| lock_error())?;
        cache.pop(key);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut cache = self.cache.lock().map_err(|_| lock_error())?;
        cache.clear();
        Ok(())
    }

    fn contains_key(&self, key: &str) -> bool {
        self.cache.lock().map(|c| c.contains(key)).unwrap_or(false)
    }

    fn clone_box(&self) -> Box<dyn Cache> {
        Box::new(self.clone())
    }
}

/// A cache that never stores anything.
///
/// Used for one-shot lambda templates unless `cache_lambda_templates` is set.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpCache;

impl NoOpCache {
    /// Creates a no-op cache.
    pub fn new() -> Self {
        Self
    }
}

impl Cache for NoOpCache {
    fn get(&self, _key: &str) -> Result<Option<Arc<CompiledArtifact>>> {
        Ok(None)
    }

    fn set(&self, _key: &str, _artifact: Arc<CompiledArtifact>) -> Result<()> {
        Ok(())
    }

    fn remove(&self, _key: &str) -> Result<()> {
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        Ok(())
    }

    fn contains_key(&self, _key: &str) -> bool {
        false
    }

    fn clone_box(&self) -> Box<dyn Cache> {
        Box::new(NoOpCache)
    }
}

/// Persistent cache writing one JSON artifact per key.
///
/// Reads go through an in-memory LRU first.
#[cfg(feature = "filesystem")]
#[derive(Debug, Clone)]
pub struct FileSystemCache {
    cache_dir: std::path::PathBuf,
    memory_cache: MemoryCache,
}

#[cfg(feature = "filesystem")]
impl FileSystemCache {
    /// Creates a cache in `cache_dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache directory cannot be created.
    pub fn new<P: AsRef<std::path::Path>>(cache_dir: P, memory_capacity: usize) -> Result<Self> {
        let cache_dir = cache_dir.as_ref().to_path_buf();

        std::fs::create_dir_all(&cache_dir).map_err(|e| {
            StacheError::Cache(format!("Failed to create cache directory: {}", e))
        })?;

        Ok(Self {
            cache_dir,
            memory_cache: MemoryCache::new(memory_capacity),
        })
    }

    fn cache_file_path(&self, key: &str) -> std::path::PathBuf {
        let safe_key = key.replace(['/', '\\', ':', '*', '?', '"', '<', '>', '|', '.'], "_");
        self.cache_dir.join(format!("{}.json", safe_key))
    }
}

#[cfg(feature = "filesystem")]
impl Cache for FileSystemCache {
    fn get(&self, key: &str) -> Result<Option<Arc<CompiledArtifact>>> {
        if let Some(artifact) = self.memory_cache.get(key)? {
            return Ok(Some(artifact));
        }

        let cache_file = self.cache_file_path(key);
        if !cache_file.exists() {
            return Ok(None);
        }

        let json = std::fs::read_to_string(&cache_file)
            .map_err(|e| StacheError::Cache(format!("Failed to read cache file: {}", e)))?;
        let artifact: CompiledArtifact = serde_json::from_str(&json)
            .map_err(|e| StacheError::Cache(format!("Failed to parse cache file: {}", e)))?;

        if artifact.key != key {
            return Ok(None);
        }

        let artifact = Arc::new(artifact);
        self.memory_cache.set(key, artifact.clone())?;
        Ok(Some(artifact))
    }

    fn set(&self, key: &str, artifact: Arc<CompiledArtifact>) -> Result<()> {
        self.memory_cache.set(key, artifact.clone())?;

        let json = serde_json::to_string(artifact.as_ref())?;
        std::fs::write(self.cache_file_path(key), json)
            .map_err(|e| StacheError::Cache(format!("Failed to write cache file: {}", e)))?;

        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.memory_cache.remove(key)?;

        let cache_file = self.cache_file_path(key);
        if cache_file.exists() {
            std::fs::remove_file(&cache_file)
                .map_err(|e| StacheError::Cache(format!("Failed to remove cache file: {}", e)))?;
        }

        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.memory_cache.clear()?;

        let entries = std::fs::read_dir(&self.cache_dir)
            .map_err(|e| StacheError::Cache(format!("Failed to read cache directory: {}", e)))?;
        for entry in entries {
            let path = entry
                .map_err(|e| StacheError::Cache(format!("Failed to read directory entry: {}", e)))?
                .path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
                std::fs::remove_file(&path)
                    .map_err(|e| StacheError::Cache(format!("Failed to remove file: {}", e)))?;
            }
        }

        Ok(())
    }

    fn contains_key(&self, key: &str) -> bool {
        self.memory_cache.contains_key(key) || self.cache_file_path(key).exists()
    }

    fn clone_box(&self) -> Box<dyn Cache> {
        Box::new(self.clone())
    }
}

/// Hashes a configuration fingerprint and template source into a cache key.
pub fn generate_cache_key(fingerprint: &str, source: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(fingerprint.as_bytes());
    hasher.update([0u8]);
    hasher.update(source.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(key: &str) -> Arc<CompiledArtifact> {
        Arc::new(CompiledArtifact::new(
            "test",
            key,
            "Hello {{name}}",
            vec![Node::Text {
                text: "Hello ".to_string(),
            }],
        ))
    }

    #[test]
    fn test_memory_cache() {
        let cache = MemoryCache::new(10);

        cache.set("k", artifact("k")).unwrap();
        let retrieved = cache.get("k").unwrap().unwrap();
        assert_eq!(retrieved.name, "test");
        assert_eq!(retrieved.source, "Hello {{name}}");

        assert!(cache.contains_key("k"));
        assert!(!cache.contains_key("nonexistent"));

        cache.remove("k").unwrap();
        assert!(!cache.contains_key("k"));
        assert!(cache.get("k").unwrap().is_none());
    }

    #[test]
    fn test_memory_cache_evicts_least_recent() {
        let cache = MemoryCache::new(2);
        cache.set("a", artifact("a")).unwrap();
        cache.set("b", artifact("b")).unwrap();
        cache.get("a").unwrap();
        cache.set("c", artifact("c")).unwrap();

        assert!(cache.contains_key("a"));
        assert!(!cache.contains_key("b"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_clone_box_shares_storage() {
        let cache = MemoryCache::new(4);
        let boxed = cache.clone_box();
        boxed.set("k", artifact("k")).unwrap();
        assert!(cache.contains_key("k"));
    }

    #[test]
    fn test_noop_cache() {
        let cache = NoOpCache::new();
        cache.set("k", artifact("k")).unwrap();
        assert!(cache.get("k").unwrap().is_none());
        assert!(!cache.contains_key("k"));
    }

    #[cfg(feature = "filesystem")]
    #[test]
    fn test_filesystem_cache() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let cache = FileSystemCache::new(temp_dir.path(), 10).unwrap();

        cache.set("abc", artifact("abc")).unwrap();
        assert!(cache.contains_key("abc"));

        // A second instance reads the artifact from disk
        let cache2 = FileSystemCache::new(temp_dir.path(), 10).unwrap();
        let retrieved = cache2.get("abc").unwrap().unwrap();
        assert_eq!(retrieved.as_ref(), artifact("abc").as_ref());

        cache2.clear().unwrap();
        let cache3 = FileSystemCache::new(temp_dir.path(), 10).unwrap();
        assert!(!cache3.contains_key("abc"));
    }

    #[test]
    fn test_cache_key_generation() {
        let key1 = generate_cache_key("cfg", "hello");
        let key2 = generate_cache_key("cfg", "hello");
        let key3 = generate_cache_key("cfg", "world");
        let key4 = generate_cache_key("other", "hello");

        assert_eq!(key1, key2);
        assert_ne!(key1, key3);
        assert_ne!(key1, key4);
        assert_eq!(key1.len(), 64);
    }
}
