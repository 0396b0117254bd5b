//! Cookie attributes and `Set-Cookie` header builders.

use crate::{Error, Result};
use httpdate::fmt_http_date;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// SameSite attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SameSite {
    /// SameSite=Strict
    Strict,
    /// SameSite=Lax
    Lax,
    /// SameSite=None
    None,
}

impl SameSite {
    fn as_str(self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

/// Attributes written alongside every client-side cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieAttributes {
    /// Cookie path.
    pub path: String,

    /// Send on HTTPS only.
    pub secure: bool,

    /// SameSite attribute.
    pub same_site: SameSite,

    /// Max-Age in seconds. `None` makes a session cookie.
    pub max_age_seconds: Option<u64>,
}

impl CookieAttributes {
    /// Attributes for a dashboard served over plain or encrypted transport:
    /// `Path=/`, `SameSite=Lax`, and `Secure` only when `secure` is set.
    pub fn for_transport(secure: bool) -> Self {
        Self {
            secure,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_max_age(mut self, seconds: Option<u64>) -> Self {
        self.max_age_seconds = seconds;
        self
    }

    /// Absolute expiry implied by `max_age_seconds`, in Unix seconds.
    pub fn expires_at(&self, now: SystemTime) -> Option<u64> {
        let max_age = self.max_age_seconds?;
        let at = now + Duration::from_secs(max_age);
        Some(at.duration_since(UNIX_EPOCH).map_or(0, |d| d.as_secs()))
    }
}

impl Default for CookieAttributes {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            secure: false,
            same_site: SameSite::Lax,
            max_age_seconds: None,
        }
    }
}

fn check_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.bytes().all(|b| {
            b.is_ascii_graphic() && !b"()<>@,;:\\\"/[]?={}".contains(&b)
        });
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidCookie(format!("illegal cookie name {name:?}")))
    }
}

/// Percent-encode everything outside RFC 6265 `cookie-octet`, plus `%`.
fn encode_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for b in value.bytes() {
        let plain = matches!(b, 0x21 | 0x23..=0x24 | 0x26..=0x2B | 0x2D..=0x3A | 0x3C..=0x5B | 0x5D..=0x7E);
        if plain {
            out.push(char::from(b));
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

fn push_common(parts: &mut Vec<String>, attrs: &CookieAttributes) {
    parts.push(format!("Path={}", attrs.path));

    parts.push(format!("SameSite={}", attrs.same_site.as_str()));

    if attrs.secure {
        parts.push("Secure".to_string());
    }
}

/// Build a `Set-Cookie` header value.
pub fn build_set_cookie(name: &str, value: &str, attrs: &CookieAttributes) -> Result<String> {
    check_name(name)?;

    let mut parts: Vec<String> = Vec::new();
    parts.push(format!("{name}={}", encode_value(value)));
    push_common(&mut parts, attrs);

    if let Some(max_age) = attrs.max_age_seconds {
        parts.push(format!("Max-Age={max_age}"));
        // Expires for older clients.
        let expires = SystemTime::now() + Duration::from_secs(max_age);
        parts.push(format!("Expires={}", fmt_http_date(expires)));
    }

    Ok(parts.join("; "))
}

/// Build a `Set-Cookie` header value that expires the cookie immediately.
pub fn build_clear_cookie(name: &str, attrs: &CookieAttributes) -> Result<String> {
    check_name(name)?;

    let mut parts: Vec<String> = Vec::new();
    parts.push(format!("{name}="));
    push_common(&mut parts, attrs);
    parts.push("Max-Age=0".to_string());
    parts.push(format!("Expires={}", fmt_http_date(UNIX_EPOCH)));

    Ok(parts.join("; "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secure_only_over_encrypted_transport() {
        let plain = build_set_cookie("isAuthenticated", "true", &CookieAttributes::for_transport(false)).unwrap();
        assert_eq!(plain, "isAuthenticated=true; Path=/; SameSite=Lax");

        let tls = build_set_cookie("isAuthenticated", "true", &CookieAttributes::for_transport(true)).unwrap();
        assert!(tls.ends_with("; Secure"));
    }

    #[test]
    fn json_value_is_encoded() {
        let sc = build_set_cookie("userData", r#"{"id":"1","name":"a b;c"}"#, &CookieAttributes::default()).unwrap();
        assert!(sc.starts_with("userData={%22id%22:%221%22%2C%22name%22:%22a%20b%3Bc%22};"));
    }

    #[test]
    fn clear_cookie_has_max_age_zero() {
        let sc = build_clear_cookie("accessToken", &CookieAttributes::default()).unwrap();
        assert!(sc.contains("Max-Age=0"));
        assert!(sc.contains("Expires=Thu, 01 Jan 1970 00:00:00 GMT"));
    }

    #[test]
    fn max_age_adds_expiry() {
        let attrs = CookieAttributes::for_transport(false).with_max_age(Some(3600));
        let sc = build_set_cookie("accessToken", "\"t\"", &attrs).unwrap();
        assert!(sc.starts_with("accessToken=%22t%22; Path=/; SameSite=Lax; Max-Age=3600; Expires="));

        let now = UNIX_EPOCH + Duration::from_secs(1_000);
        assert_eq!(attrs.expires_at(now), Some(4_600));
        assert_eq!(CookieAttributes::default().expires_at(now), None);
    }

    #[test]
    fn rejects_separator_in_name() {
        assert!(build_set_cookie("bad;name", "1", &CookieAttributes::default()).is_err());
        assert!(build_clear_cookie("", &CookieAttributes::default()).is_err());
    }
}
