//! Cookies set by the backend itself, its session cookie in particular.
//!
//! The store is handed to `reqwest` as its cookie provider. When backed by a
//! file it is written after every response that sets a cookie, so the server
//! session outlives the process the way a browser keeps it across reloads.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError};

use cookie_store::CookieStore;
use reqwest_cookie_store::CookieStoreMutex;
use sparkpoint_api::SparkpointError;

#[derive(Clone)]
pub struct ServerCookies {
    store: Arc<CookieStoreMutex>,
    path: Option<PathBuf>,
}

impl ServerCookies {
    /// Process-lifetime store; nothing is written to disk.
    pub fn in_memory() -> Self {
        Self {
            store: Arc::new(CookieStoreMutex::new(CookieStore::default())),
            path: None,
        }
    }

    /// Load from `path`. A missing file starts empty; an unreadable or
    /// corrupt one starts empty with a warning.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let store = match File::open(&path) {
            Ok(file) => cookie_store::serde::json::load_all(BufReader::new(file)).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "server cookie file is corrupt; starting empty");
                CookieStore::default()
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => CookieStore::default(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "server cookie file unreadable; starting empty");
                CookieStore::default()
            }
        };
        Self {
            store: Arc::new(CookieStoreMutex::new(store)),
            path: Some(path),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub(crate) fn provider(&self) -> Arc<CookieStoreMutex> {
        Arc::clone(&self.store)
    }

    /// Write the store to its file, session cookies included. No-op in memory.
    pub fn save(&self) -> Result<(), SparkpointError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| write_error(path, &e))?;
        }

        let tmp = path.with_extension("json.tmp");
        {
            let store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
            let mut writer = BufWriter::new(File::create(&tmp).map_err(|e| write_error(&tmp, &e))?);
            cookie_store::serde::json::save_incl_expired_and_nonpersistent(&store, &mut writer)
                .map_err(|e| write_error(&tmp, &e))?;
            writer.flush().map_err(|e| write_error(&tmp, &e))?;
        }
        fs::rename(&tmp, path).map_err(|e| write_error(path, &e))
    }
}

impl std::fmt::Debug for ServerCookies {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerCookies")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

fn write_error(path: &Path, e: &dyn std::fmt::Display) -> SparkpointError {
    SparkpointError::Internal(format!("failed to write {}: {e}", path.display()))
}
