//! Cookie jar backends.
//!
//! A jar only stores and returns raw records. Serialization of the cookie
//! value and the "never crash on a bad cookie" policy live in
//! [`CookieStore`](crate::CookieStore).

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::cookie::SameSite;

/// One cookie as held by a jar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCookie {
    /// Cookie name.
    pub name: String,
    /// Raw (already JSON-encoded) value.
    pub value: String,
    /// Cookie path.
    pub path: String,
    /// SameSite attribute.
    pub same_site: SameSite,
    /// Whether the cookie is restricted to encrypted transport.
    pub secure: bool,
    /// Unix seconds after which the cookie reads as absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
}

impl StoredCookie {
    /// True once `expires_at` has passed.
    pub fn is_expired(&self, now: SystemTime) -> bool {
        let now = now.duration_since(UNIX_EPOCH).map_or(0, |d| d.as_secs());
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Storage for client-side cookies.
pub trait CookieJar: Send + Sync {
    /// Fetch a cookie by name.
    fn load(&self, name: &str) -> Result<Option<StoredCookie>>;
    /// Insert or replace a cookie.
    fn save(&self, cookie: StoredCookie) -> Result<()>;
    /// Remove a cookie. Removing an absent cookie is not an error.
    fn remove(&self, name: &str) -> Result<()>;
}

/// Process-lifetime jar.
#[derive(Debug, Default)]
pub struct MemoryJar {
    cookies: RwLock<BTreeMap<String, StoredCookie>>,
}

impl MemoryJar {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CookieJar for MemoryJar {
    fn load(&self, name: &str) -> Result<Option<StoredCookie>> {
        let guard = self.cookies.read().unwrap_or_else(PoisonError::into_inner);
        Ok(guard.get(name).cloned())
    }

    fn save(&self, cookie: StoredCookie) -> Result<()> {
        let mut guard = self.cookies.write().unwrap_or_else(PoisonError::into_inner);
        guard.insert(cookie.name.clone(), cookie);
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<()> {
        let mut guard = self.cookies.write().unwrap_or_else(PoisonError::into_inner);
        guard.remove(name);
        Ok(())
    }
}

/// Jar persisted as a JSON file, so cookies survive a process restart the
/// way browser cookies survive a page reload.
#[derive(Debug)]
pub struct FileJar {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl FileJar {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, StoredCookie>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        match serde_json::from_str(&content) {
            Ok(cookies) => Ok(cookies),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "cookie jar file is corrupt; starting empty");
                Ok(BTreeMap::new())
            }
        }
    }

    fn write_all(&self, cookies: &BTreeMap<String, StoredCookie>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(cookies)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl CookieJar for FileJar {
    fn load(&self, name: &str) -> Result<Option<StoredCookie>> {
        Ok(self.read_all()?.remove(name))
    }

    fn save(&self, cookie: StoredCookie) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut cookies = self.read_all()?;
        cookies.insert(cookie.name.clone(), cookie);
        self.write_all(&cookies)
    }

    fn remove(&self, name: &str) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut cookies = self.read_all()?;
        if cookies.remove(name).is_some() {
            self.write_all(&cookies)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cookie(name: &str, value: &str) -> StoredCookie {
        StoredCookie {
            name: name.to_string(),
            value: value.to_string(),
            path: "/".to_string(),
            same_site: SameSite::Lax,
            secure: false,
            expires_at: None,
        }
    }

    #[test]
    fn file_jar_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.json");

        FileJar::new(&path).save(cookie("accessToken", "\"tok\"")).unwrap();

        let reopened = FileJar::new(&path);
        assert_eq!(reopened.load("accessToken").unwrap().unwrap().value, "\"tok\"");

        reopened.remove("accessToken").unwrap();
        assert!(FileJar::new(&path).load("accessToken").unwrap().is_none());
    }

    #[test]
    fn corrupt_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.json");
        fs::write(&path, "{not json").unwrap();

        let jar = FileJar::new(&path);
        assert!(jar.load("userData").unwrap().is_none());
        jar.save(cookie("userData", "{}")).unwrap();
        assert!(jar.load("userData").unwrap().is_some());
    }

    #[test]
    fn expiry_is_inclusive() {
        let mut c = cookie("x", "1");
        c.expires_at = Some(100);
        assert!(c.is_expired(UNIX_EPOCH + std::time::Duration::from_secs(100)));
        assert!(!c.is_expired(UNIX_EPOCH + std::time::Duration::from_secs(99)));
    }
}
