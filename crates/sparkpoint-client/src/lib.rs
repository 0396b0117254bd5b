//! sparkpoint-client
//!
//! Authenticated REST client for the SparkPoint backend.
//!
//! - [`ApiClient`] is the single gateway: it restores a persisted bearer
//!   token, sends session cookies, and on a 401 refreshes the server session
//!   once (`POST /auth/refresh`) before retrying. A failed refresh logs the
//!   session out and the caller sees the original 401.
//! - [`ApiClient::login`] / [`ApiClient::logout`] drive the
//!   [`SessionStore`](sparkpoint_auth::SessionStore) transitions.
//! - [`ServerCookies`] holds the backend's own session cookie, optionally
//!   persisted so it outlives the process.
//! - [`Users`], [`Stations`] and [`Owners`] wrap the resource endpoints.

#![forbid(unsafe_code)]

mod auth;
mod client;
mod error;
mod resources;
mod server_cookies;
mod transport;
mod users;

#[cfg(test)]
mod testing;

pub use auth::{LOGIN_FAILED, LogoutReport};
pub use client::{ApiClient, RequestContext};
pub use error::{ClientError, NETWORK_ERROR, Result};
pub use resources::{Owners, Stations};
pub use server_cookies::ServerCookies;
pub use transport::ReqwestTransport;
pub use users::Users;

impl ApiClient {
    pub fn users(&self) -> Users<'_> {
        Users::new(self)
    }

    pub fn stations(&self) -> Stations<'_> {
        Stations::new(self)
    }

    pub fn owners(&self) -> Owners<'_> {
        Owners::new(self)
    }
}
