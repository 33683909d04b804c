use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::fetcher::Response;
use super::CacheError;

/// Extension of namespace files in a disk cache directory.
const NAMESPACE_FILE_EXT: &str = "json";

/// Cache identity of a request.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RequestKey {
    pub method: String,
    pub url: String,
}

impl RequestKey {
    pub fn new(method: &str, url: &str) -> Self {
        Self {
            method: method.to_ascii_uppercase(),
            url: url.to_string(),
        }
    }
}

impl std::fmt::Display for RequestKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }

    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.cached_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            // Also covers clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            format!("{}h ago", minutes / 60)
        } else {
            format!("{}d ago", minutes / 1440)
        }
    }
}

/// Backend holding cache namespaces.
///
/// Writing into a namespace that does not exist yet creates it.
pub trait CacheStorage: Send + Sync {
    /// Create the namespace if it does not exist.
    fn open(&self, namespace: &str) -> Result<(), CacheError>;

    /// Names of all existing namespaces.
    fn namespaces(&self) -> Result<Vec<String>, CacheError>;

    /// Delete a namespace and every entry in it. Returns false if it did not exist.
    fn delete_namespace(&self, namespace: &str) -> Result<bool, CacheError>;

    fn lookup(
        &self,
        namespace: &str,
        key: &RequestKey,
    ) -> Result<Option<CachedData<Response>>, CacheError>;

    /// Store one entry, replacing any previous entry for the key.
    fn put(&self, namespace: &str, key: &RequestKey, response: &Response) -> Result<(), CacheError>;

    /// Store a batch of entries in one write.
    fn put_all(&self, namespace: &str, entries: &[(RequestKey, Response)]) -> Result<(), CacheError>;

    fn entries(&self, namespace: &str) -> Result<Vec<(RequestKey, CachedData<Response>)>, CacheError>;
}

type Namespace = BTreeMap<RequestKey, CachedData<Response>>;

// ============================================================================
// In-memory storage
// ============================================================================

#[derive(Default)]
pub struct MemoryCacheStorage {
    namespaces: Mutex<BTreeMap<String, Namespace>>,
}

impl MemoryCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_namespaces<R>(
        &self,
        f: impl FnOnce(&mut BTreeMap<String, Namespace>) -> R,
    ) -> Result<R, CacheError> {
        let mut guard = self.namespaces.lock().map_err(|_| CacheError::LockPoisoned)?;
        Ok(f(&mut guard))
    }
}

impl CacheStorage for MemoryCacheStorage {
    fn open(&self, namespace: &str) -> Result<(), CacheError> {
        self.with_namespaces(|all| {
            all.entry(namespace.to_string()).or_default();
        })
    }

    fn namespaces(&self) -> Result<Vec<String>, CacheError> {
        self.with_namespaces(|all| all.keys().cloned().collect())
    }

    fn delete_namespace(&self, namespace: &str) -> Result<bool, CacheError> {
        self.with_namespaces(|all| all.remove(namespace).is_some())
    }

    fn lookup(
        &self,
        namespace: &str,
        key: &RequestKey,
    ) -> Result<Option<CachedData<Response>>, CacheError> {
        self.with_namespaces(|all| all.get(namespace).and_then(|ns| ns.get(key)).cloned())
    }

    fn put(&self, namespace: &str, key: &RequestKey, response: &Response) -> Result<(), CacheError> {
        self.with_namespaces(|all| {
            all.entry(namespace.to_string())
                .or_default()
                .insert(key.clone(), CachedData::new(response.clone()));
        })
    }

    fn put_all(&self, namespace: &str, entries: &[(RequestKey, Response)]) -> Result<(), CacheError> {
        self.with_namespaces(|all| {
            let ns = all.entry(namespace.to_string()).or_default();
            for (key, response) in entries {
                ns.insert(key.clone(), CachedData::new(response.clone()));
            }
        })
    }

    fn entries(&self, namespace: &str) -> Result<Vec<(RequestKey, CachedData<Response>)>, CacheError> {
        self.with_namespaces(|all| {
            all.get(namespace)
                .map(|ns| ns.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
                .unwrap_or_default()
        })
    }
}

// ============================================================================
// Disk storage
// ============================================================================

/// On-disk layout of one namespace.
#[derive(Debug, Default, Serialize, Deserialize)]
struct NamespaceFile {
    name: String,
    entries: Vec<NamespaceEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct NamespaceEntry {
    key: RequestKey,
    cached: CachedData<Response>,
}

/// Stores each namespace as one JSON file in a directory.
///
/// File names are the hex-encoded namespace name, so any name is allowed.
/// Writes are serialized by an internal lock.
pub struct DiskCacheStorage {
    cache_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl DiskCacheStorage {
    pub fn new(cache_dir: PathBuf) -> Result<Self, CacheError> {
        std::fs::create_dir_all(&cache_dir)?;
        Ok(Self {
            cache_dir,
            write_lock: Mutex::new(()),
        })
    }

    fn namespace_path(&self, namespace: &str) -> PathBuf {
        let encoded: String = namespace.bytes().map(|b| format!("{:02x}", b)).collect();
        self.cache_dir
            .join(format!("{}.{}", encoded, NAMESPACE_FILE_EXT))
    }

    fn load(&self, namespace: &str) -> Result<Option<NamespaceFile>, CacheError> {
        let path = self.namespace_path(namespace);
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)?;
        let file = serde_json::from_str(&contents).map_err(|source| CacheError::Serialization {
            namespace: namespace.to_string(),
            source,
        })?;
        Ok(Some(file))
    }

    fn save(&self, file: &NamespaceFile) -> Result<(), CacheError> {
        let contents = serde_json::to_string(file).map_err(|source| CacheError::Serialization {
            namespace: file.name.clone(),
            source,
        })?;
        // Write then rename so readers never see a partial file
        let path = self.namespace_path(&file.name);
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, contents)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn update(
        &self,
        namespace: &str,
        f: impl FnOnce(&mut NamespaceFile),
    ) -> Result<(), CacheError> {
        let _guard = self.write_lock.lock().map_err(|_| CacheError::LockPoisoned)?;
        let mut file = self.load(namespace)?.unwrap_or_else(|| NamespaceFile {
            name: namespace.to_string(),
            entries: Vec::new(),
        });
        f(&mut file);
        self.save(&file)
    }

    fn upsert(file: &mut NamespaceFile, key: &RequestKey, response: &Response) {
        let cached = CachedData::new(response.clone());
        match file.entries.iter_mut().find(|e| &e.key == key) {
            Some(entry) => entry.cached = cached,
            None => file.entries.push(NamespaceEntry {
                key: key.clone(),
                cached,
            }),
        }
    }
}

impl CacheStorage for DiskCacheStorage {
    fn open(&self, namespace: &str) -> Result<(), CacheError> {
        if self.namespace_path(namespace).exists() {
            return Ok(());
        }
        self.update(namespace, |_| {})
    }

    fn namespaces(&self) -> Result<Vec<String>, CacheError> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.cache_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(NAMESPACE_FILE_EXT) {
                continue;
            }
            let contents = std::fs::read_to_string(&path)?;
            match serde_json::from_str::<NamespaceFile>(&contents) {
                Ok(file) => names.push(file.name),
                Err(e) => debug!(path = %path.display(), error = %e, "Skipping unreadable namespace file"),
            }
        }
        names.sort();
        Ok(names)
    }

    fn delete_namespace(&self, namespace: &str) -> Result<bool, CacheError> {
        let _guard = self.write_lock.lock().map_err(|_| CacheError::LockPoisoned)?;
        let path = self.namespace_path(namespace);
        if !path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(path)?;
        Ok(true)
    }

    fn lookup(
        &self,
        namespace: &str,
        key: &RequestKey,
    ) -> Result<Option<CachedData<Response>>, CacheError> {
        Ok(self.load(namespace)?.and_then(|file| {
            file.entries
                .into_iter()
                .find(|e| &e.key == key)
                .map(|e| e.cached)
        }))
    }

    fn put(&self, namespace: &str, key: &RequestKey, response: &Response) -> Result<(), CacheError> {
        self.update(namespace, |file| Self::upsert(file, key, response))
    }

    fn put_all(&self, namespace: &str, entries: &[(RequestKey, Response)]) -> Result<(), CacheError> {
        self.update(namespace, |file| {
            for (key, response) in entries {
                Self::upsert(file, key, response);
            }
        })
    }

    fn entries(&self, namespace: &str) -> Result<Vec<(RequestKey, CachedData<Response>)>, CacheError> {
        Ok(self
            .load(namespace)?
            .map(|file| file.entries.into_iter().map(|e| (e.key, e.cached)).collect())
            .unwrap_or_default())
    }
}

// ============================================================================
// Tests
// ============================================================================
