//! sparkpoint-auth
//!
//! Client-side authentication state for the SparkPoint admin console.
//! It covers two concerns:
//!
//! - **Cookie persistence**: small JSON values stored as cookies (`Path=/`,
//!   `SameSite=Lax`, `Secure` over TLS) in a pluggable [`CookieJar`]. Malformed
//!   cookies read as absent and never surface as errors.
//! - **Session state**: a [`SessionStore`] state machine
//!   (unauthenticated / authenticating / authenticated / failed) rehydrated
//!   from those cookies at startup.
//!
//! ## Quick start
//! ```no_run
//! use std::sync::Arc;
//! use sparkpoint_api::User;
//! use sparkpoint_auth::{CookieStore, FileJar, SessionStore};
//!
//! # fn demo() -> Result<(), sparkpoint_auth::Error> {
//! let cookies = Arc::new(CookieStore::new(FileJar::new("/tmp/cookies.json"), true));
//! let session = SessionStore::rehydrate(cookies);
//!
//! session.login_start()?;
//! session.login_success(User::new("42", Some(1)))?;
//! assert!(session.snapshot().is_authenticated());
//! # Ok(()) }
//! ```

#![forbid(unsafe_code)]

mod cookie;
mod error;
mod jar;
mod session;
mod store;

pub use cookie::{CookieAttributes, SameSite, build_clear_cookie, build_set_cookie};
pub use error::{Error, Result};
pub use jar::{CookieJar, FileJar, MemoryJar, StoredCookie};
pub use session::{Session, SessionPhase, SessionStore};
pub use store::{ACCESS_TOKEN_COOKIE, CookieStore, IS_AUTHENTICATED_COOKIE, USER_DATA_COOKIE};
