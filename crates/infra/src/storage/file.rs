//! Directory-backed store
//!
//! Every key maps to `<dir>/<encoded key>.store`. Bytes outside
//! `[A-Za-z0-9._-]` are written as `%XX`, so distinct keys never share a
//! file. Writes go to a temporary sibling first and are renamed into place;
//! a crash mid-write leaves the previous value intact.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tether_core::DurableStore;
use tether_domain::{Result, TetherError};
use tokio::fs;
use tracing::{debug, error};

use crate::errors::InfraError;

const EXTENSION: &str = "store";

/// One file per key under a directory.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    write_seq: AtomicU64,
}

impl FileStore {
    /// Store rooted at `dir`; the directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), write_seq: AtomicU64::new(0) }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File backing `key`.
    pub fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() {
            return Err(TetherError::Storage("storage key must not be empty".into()));
        }
        Ok(self.dir.join(format!("{}.{EXTENSION}", encode_key(key))))
    }
}

fn encode_key(key: &str) -> String {
    let mut encoded = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'.' | b'_' | b'-') {
            encoded.push(char::from(byte));
        } else {
            encoded.push_str(&format!("%{byte:02X}"));
        }
    }
    encoded
}

#[async_trait]
impl DurableStore for FileStore {
    async fn get_item(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path).await {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(InfraError::from(err).into()),
        }
    }

    async fn set_item(&self, key: &str, value: String) -> Result<()> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir).await.map_err(InfraError::from)?;

        let seq = self.write_seq.fetch_add(1, Ordering::Relaxed);
        let tmp = path.with_extension(format!("{EXTENSION}.tmp-{}-{seq}", std::process::id()));

        if let Err(err) = fs::write(&tmp, value.as_bytes()).await {
            error!(path = %tmp.display(), error = %err, "failed to write temporary store file");
            return Err(InfraError::from(err).into());
        }
        if let Err(err) = fs::rename(&tmp, &path).await {
            error!(path = %path.display(), error = %err, "failed to replace store file");
            let _ = fs::remove_file(&tmp).await;
            return Err(InfraError::from(err).into());
        }

        debug!(path = %path.display(), bytes = value.len(), "store file written");
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(InfraError::from(err).into()),
        }
    }
}
