//! Session token storage.
//!
//! The dashboard keeps exactly one bearer token. Which backing store holds it
//! is decided once, when the [`TokenProvider`] is constructed, and every hook
//! shares that same provider.

use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    sync::Mutex,
};

use thiserror::Error;

const TOKEN_FILE_NAME: &str = "access_token";

#[derive(Debug, Error)]
pub enum TokenStoreError {
    #[error("token store io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("token store lock poisoned")]
    Poisoned,
}

pub trait TokenProvider: Send + Sync {
    /// Returns the stored token; blank values count as absent.
    fn get(&self) -> Result<Option<String>, TokenStoreError>;
    fn set(&self, token: &str) -> Result<(), TokenStoreError>;
    fn clear(&self) -> Result<(), TokenStoreError>;
}

fn non_blank(token: String) -> Option<String> {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Process-local store, lost on exit.
#[derive(Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenProvider for MemoryTokenStore {
    fn get(&self) -> Result<Option<String>, TokenStoreError> {
        let token = self.token.lock().map_err(|_| TokenStoreError::Poisoned)?;
        Ok(token.clone().and_then(non_blank))
    }

    fn set(&self, token: &str) -> Result<(), TokenStoreError> {
        let mut slot = self.token.lock().map_err(|_| TokenStoreError::Poisoned)?;
        *slot = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), TokenStoreError> {
        let mut slot = self.token.lock().map_err(|_| TokenStoreError::Poisoned)?;
        *slot = None;
        Ok(())
    }
}

/// Durable store: one file holding the raw token, readable only by the owner.
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<data dir>/powerwatch/access_token`, or the working directory when the
    /// platform has no data dir.
    pub fn default_path() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("powerwatch")
            .join(TOKEN_FILE_NAME)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> TokenStoreError {
        TokenStoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl TokenProvider for FileTokenStore {
    fn get(&self) -> Result<Option<String>, TokenStoreError> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(non_blank(content)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(self.io_error(err)),
        }
    }

    fn set(&self, token: &str) -> Result<(), TokenStoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|err| self.io_error(err))?;
        }

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&self.path).map_err(|err| self.io_error(err))?;
        file.write_all(token.as_bytes())
            .map_err(|err| self.io_error(err))?;
        tracing::debug!(path = %self.path.display(), "session token stored");
        Ok(())
    }

    fn clear(&self) -> Result<(), TokenStoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::debug!(path = %self.path.display(), "session token cleared");
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(self.io_error(err)),
        }
    }
}
