//! JSON-valued cookie store.

use std::time::SystemTime;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::Result;
use crate::cookie::{CookieAttributes, build_clear_cookie, build_set_cookie};
use crate::jar::{CookieJar, MemoryJar, StoredCookie};

/// Persisted authentication flag.
pub const IS_AUTHENTICATED_COOKIE: &str = "isAuthenticated";
/// Persisted user summary.
pub const USER_DATA_COOKIE: &str = "userData";
/// Persisted bearer token, restored into the default header after a restart.
pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";

/// Stores small JSON-serializable values as cookies.
///
/// Reads never fail: an absent, expired, unreadable, or malformed cookie is
/// reported as `None`.
pub struct CookieStore {
    jar: Box<dyn CookieJar>,
    attrs: CookieAttributes,
}

impl CookieStore {
    /// `secure` should be true iff the dashboard talks to its backend over
    /// an encrypted transport.
    pub fn new(jar: impl CookieJar + 'static, secure: bool) -> Self {
        Self {
            jar: Box::new(jar),
            attrs: CookieAttributes::for_transport(secure),
        }
    }

    pub fn in_memory(secure: bool) -> Self {
        Self::new(MemoryJar::new(), secure)
    }

    /// Override the default attributes (e.g. to add a Max-Age).
    #[must_use]
    pub fn with_attributes(mut self, attrs: CookieAttributes) -> Self {
        self.attrs = attrs;
        self
    }

    /// Serialize `value` to JSON and store it under `name`.
    ///
    /// Returns the `Set-Cookie` header describing the write.
    pub fn set<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<String> {
        let json = serde_json::to_string(value)?;
        let header = build_set_cookie(name, &json, &self.attrs)?;
        self.jar.save(StoredCookie {
            name: name.to_string(),
            value: json,
            path: self.attrs.path.clone(),
            same_site: self.attrs.same_site,
            secure: self.attrs.secure,
            expires_at: self.attrs.expires_at(SystemTime::now()),
        })?;
        tracing::debug!(cookie = name, "cookie set");
        Ok(header)
    }

    /// Fetch and deserialize a cookie.
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        let stored = match self.jar.load(name) {
            Ok(Some(stored)) => stored,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(cookie = name, error = %e, "cookie jar read failed");
                return None;
            }
        };

        if stored.is_expired(SystemTime::now()) {
            return None;
        }

        match serde_json::from_str(&stored.value) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(cookie = name, error = %e, "ignoring malformed cookie");
                None
            }
        }
    }

    /// Expire a cookie immediately.
    ///
    /// Returns the `Set-Cookie` header that clears it.
    pub fn delete(&self, name: &str) -> Result<String> {
        let header = build_clear_cookie(name, &self.attrs)?;
        self.jar.remove(name)?;
        tracing::debug!(cookie = name, "cookie deleted");
        Ok(header)
    }
}

impl std::fmt::Debug for CookieStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CookieStore")
            .field("attrs", &self.attrs)
            .finish_non_exhaustive()
    }
}
