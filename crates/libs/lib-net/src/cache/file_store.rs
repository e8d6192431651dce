//! Durable cache backend: one JSON file per record.
//!
//! Short keys are stored under the base64url encoding of the key plus
//! `.json`, so a directory listing recovers them. Keys whose encoding would
//! not fit in a file name are stored under the base64url SHA-256 digest of
//! the key with a `.hashed.json` suffix; those files wrap the record together
//! with the original key.
//!
//! Writes go to a uniquely named temp file first and are renamed into place;
//! readers observe either the old record or the new one, never a partial file.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use lib_core::StorageError;
use lib_utils::{b64u_decode_to_string, b64u_encode};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

use super::store::CacheStore;

const RECORD_EXTENSION: &str = ".json";
const HASHED_EXTENSION: &str = ".hashed.json";

/// Longest encoded key stored under its own name. Keeps every file name well
/// under the usual 255-byte limit.
const MAX_PLAIN_NAME_LEN: usize = 200;

/// Where a key lives on disk.
enum RecordPath {
    Plain(PathBuf),
    Hashed(PathBuf),
}

/// On-disk wrapper for records stored under a digest name.
#[derive(Serialize, Deserialize)]
struct HashedRecord {
    key: String,
    record: String,
}

/// Directory-backed [`CacheStore`].
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (and create if needed) a store rooted at `dir`.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        debug!(dir = %dir.display(), "Opened file-backed cache store");
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> RecordPath {
        let encoded = b64u_encode(key);
        if encoded.len() <= MAX_PLAIN_NAME_LEN {
            return RecordPath::Plain(self.dir.join(format!("{encoded}{RECORD_EXTENSION}")));
        }
        let digest = b64u_encode(Sha256::digest(key.as_bytes()));
        RecordPath::Hashed(self.dir.join(format!("{digest}{HASHED_EXTENSION}")))
    }

    async fn replace_file(&self, target: &Path, contents: &[u8]) -> Result<(), StorageError> {
        let tmp = self.dir.join(format!(".tmp-{}", Uuid::new_v4()));

        fs::write(&tmp, contents).await?;
        if let Err(e) = fs::rename(&tmp, target).await {
            // Best effort; the temp name never collides with a record name.
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }
}

async fn read_optional(path: &Path) -> Result<Option<String>, StorageError> {
    match fs::read_to_string(path).await {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl CacheStore for FileStore {
    async fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        match self.path_for(key) {
            RecordPath::Plain(path) => read_optional(&path).await,
            RecordPath::Hashed(path) => {
                let Some(contents) = read_optional(&path).await? else {
                    return Ok(None);
                };
                let wrapped: HashedRecord = serde_json::from_str(&contents)?;
                // A digest collision reads as a miss rather than another key's record.
                Ok((wrapped.key == key).then_some(wrapped.record))
            }
        }
    }

    async fn write(&self, key: &str, record: String) -> Result<(), StorageError> {
        match self.path_for(key) {
            RecordPath::Plain(path) => self.replace_file(&path, record.as_bytes()).await,
            RecordPath::Hashed(path) => {
                let wrapped = HashedRecord {
                    key: key.to_string(),
                    record,
                };
                let contents = serde_json::to_vec(&wrapped)?;
                self.replace_file(&path, &contents).await
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = match self.path_for(key) {
            RecordPath::Plain(path) | RecordPath::Hashed(path) => path,
        };
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn keys(&self) -> Result<Vec<String>, StorageError> {
        let mut entries = fs::read_dir(&self.dir).await?;
        let mut keys = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if name.ends_with(HASHED_EXTENSION) {
                match read_hashed_key(&entry.path()).await {
                    Some(key) => keys.push(key),
                    None => warn!(file = %name, "Skipping unreadable hashed cache record"),
                }
                continue;
            }
            let Some(encoded) = name.strip_suffix(RECORD_EXTENSION) else {
                continue;
            };
            match b64u_decode_to_string(encoded) {
                Ok(key) => keys.push(key),
                Err(e) => {
                    warn!(file = %name, error = %e, "Skipping foreign file in cache directory")
                }
            }
        }

        Ok(keys)
    }
}

async fn read_hashed_key(path: &Path) -> Option<String> {
    let contents = fs::read_to_string(path).await.ok()?;
    serde_json::from_str::<HashedRecord>(&contents)
        .ok()
        .map(|wrapped| wrapped.key)
}
