use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{Error, Storage};

/// Filesystem-backed storage for local runs and tests. Buckets are
/// directories under the root; keys map to relative paths.
#[derive(Clone, Debug)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Creates a bucket directory; mostly useful for test setup.
    pub fn create_bucket(&self, bucket: &str) -> Result<(), Error> {
        let path = self.root.join(bucket);
        std::fs::create_dir_all(&path).map_err(|e| Error::FileSystem(bucket.to_string(), e))
    }

    fn collect_keys(base: &Path, dir: &Path, keys: &mut Vec<String>) -> Result<(), Error> {
        let entries = std::fs::read_dir(dir)
            .map_err(|e| Error::FileSystem(dir.display().to_string(), e))?;
        for entry in entries {
            let entry = entry.map_err(|e| Error::FileSystem(dir.display().to_string(), e))?;
            let path = entry.path();
            if path.is_dir() {
                Self::collect_keys(base, &path, keys)?;
            } else {
                let relative = path.strip_prefix(base).map_err(|e| {
                    Error::FileSystem(
                        path.display().to_string(),
                        std::io::Error::new(std::io::ErrorKind::InvalidData, e),
                    )
                })?;
                let key = relative
                    .to_str()
                    .ok_or_else(|| Error::NonUtf8Path(relative.to_path_buf()))?;
                // Keys always use '/' regardless of platform separator.
                keys.push(key.replace(std::path::MAIN_SEPARATOR, "/"));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn put_object(&self, bucket: &str, key: &str, data: Vec<u8>) -> Result<(), Error> {
        let path = self.root.join(bucket).join(key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::FileSystem(key.to_string(), e))?;
        }
        std::fs::write(&path, data).map_err(|e| Error::FileSystem(key.to_string(), e))
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, Error> {
        let path = self.root.join(bucket).join(key);
        std::fs::read(&path).map_err(|e| Error::FileSystem(key.to_string(), e))
    }

    async fn list_objects(&self, bucket: &str, prefix: Option<&str>) -> Result<Vec<String>, Error> {
        let base = self.root.join(bucket);
        if !base.is_dir() {
            return Ok(vec![]);
        }
        let mut keys = Vec::new();
        Self::collect_keys(&base, &base, &mut keys)?;
        if let Some(prefix) = prefix {
            keys.retain(|k| k.starts_with(prefix));
        }
        keys.sort();
        Ok(keys)
    }

    async fn list_buckets(&self) -> Result<Vec<String>, Error> {
        if !self.root.is_dir() {
            return Ok(vec![]);
        }
        let entries = std::fs::read_dir(&self.root)
            .map_err(|e| Error::FileSystem(self.root.display().to_string(), e))?;
        let mut buckets = Vec::new();
        for entry in entries {
            let entry =
                entry.map_err(|e| Error::FileSystem(self.root.display().to_string(), e))?;
            if entry.path().is_dir() {
                let name = entry.file_name();
                let name = name
                    .to_str()
                    .ok_or_else(|| Error::NonUtf8Path(entry.path()))?;
                buckets.push(name.to_string());
            }
        }
        buckets.sort();
        Ok(buckets)
    }
}
