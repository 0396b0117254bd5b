//! The single outbound request gateway.
//!
//! Every call goes through [`ApiClient::execute`], which attaches the bearer
//! token and performs at most one transparent session refresh when the
//! server answers 401. If the refresh cannot happen or fails, the session is
//! logged out and the caller receives the original 401.

use std::sync::{Arc, PoisonError, RwLock};

use serde_json::{Value, json};
use sparkpoint_api::{ApiRequest, ApiResponse, Transport, UserRef};
use sparkpoint_auth::{ACCESS_TOKEN_COOKIE, CookieStore, SessionStore};
use sparkpoint_core::ClientConfig;

use crate::error::{ClientError, Result};
use crate::ServerCookies;
use crate::transport::ReqwestTransport;

pub(crate) const REFRESH_PATH: &str = "/auth/refresh";

/// Per-call attempt counter carried through the retry path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestContext {
    attempt: u8,
}

impl RequestContext {
    /// One original attempt plus one retry after a refresh.
    pub const MAX_ATTEMPTS: u8 = 2;

    pub fn first() -> Self {
        Self { attempt: 1 }
    }

    pub fn attempt(self) -> u8 {
        self.attempt
    }

    pub fn can_retry(self) -> bool {
        self.attempt < Self::MAX_ATTEMPTS
    }

    #[must_use]
    pub fn retry(self) -> Self {
        Self {
            attempt: self.attempt + 1,
        }
    }
}

pub struct ApiClient {
    transport: Arc<dyn Transport>,
    session: Arc<SessionStore>,
    bearer: RwLock<Option<String>>,
}

impl ApiClient {
    /// Build a client around `transport`. A token persisted by an earlier
    /// login is restored as the default `Authorization: Bearer` header.
    pub fn new(transport: Arc<dyn Transport>, session: Arc<SessionStore>) -> Self {
        let bearer = session.cookies().get::<String>(ACCESS_TOKEN_COOKIE);
        if bearer.is_some() {
            tracing::debug!("restored persisted access token");
        }
        Self {
            transport,
            session,
            bearer: RwLock::new(bearer),
        }
    }

    /// Production client: `reqwest` transport sharing `server_cookies`.
    pub fn from_config(
        cfg: &ClientConfig,
        session: Arc<SessionStore>,
        server_cookies: ServerCookies,
    ) -> Result<Self> {
        let transport = ReqwestTransport::new(cfg, server_cookies)?;
        Ok(Self::new(Arc::new(transport), session))
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub(crate) fn cookies(&self) -> &Arc<CookieStore> {
        self.session.cookies()
    }

    /// Current default bearer token, if any.
    pub fn bearer(&self) -> Option<String> {
        self.bearer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn install_token(&self, token: &str) {
        *self.bearer.write().unwrap_or_else(PoisonError::into_inner) = Some(token.to_string());
        if let Err(e) = self.cookies().set(ACCESS_TOKEN_COOKIE, token) {
            tracing::error!(error = %e, "failed to persist access token");
        }
    }

    pub(crate) fn clear_token(&self) {
        *self.bearer.write().unwrap_or_else(PoisonError::into_inner) = None;
        if let Err(e) = self.cookies().delete(ACCESS_TOKEN_COOKIE) {
            tracing::error!(error = %e, "failed to clear access token");
        }
    }

    /// One round trip, no refresh handling. Non-2xx becomes
    /// [`ClientError::Status`].
    pub(crate) async fn send_once(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let bearer = self.bearer();
        let response = self.transport.send(request, bearer.as_deref()).await?;
        if response.is_success() {
            Ok(response)
        } else {
            Err(ClientError::Status {
                status: response.status,
                body: response.body,
            })
        }
    }

    /// Send `request`, refreshing the session once on 401.
    pub async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let mut ctx = RequestContext::first();
        loop {
            tracing::debug!(method = %request.method, path = %request.path, attempt = ctx.attempt(), "sending request");
            match self.send_once(request).await {
                Err(err) if err.is_unauthorized() && ctx.can_retry() => {
                    if !self.refresh_session().await {
                        return Err(err);
                    }
                    ctx = ctx.retry();
                }
                other => return other,
            }
        }
    }

    /// Ask the server to renew the session cookie for the current user.
    /// On any failure the local session is logged out.
    async fn refresh_session(&self) -> bool {
        let Some(user_id) = self.session.user_id() else {
            tracing::error!("token refresh skipped: no user id in session");
            self.force_logout();
            return false;
        };

        let request = ApiRequest::post(REFRESH_PATH, json!(UserRef { user_id }));
        match self.send_once(&request).await {
            Ok(_) => {
                tracing::debug!("session refreshed");
                true
            }
            Err(e) => {
                tracing::warn!(status = ?e.status(), error = %e, "token refresh failed");
                self.force_logout();
                false
            }
        }
    }

    fn force_logout(&self) {
        self.session.logout();
        self.clear_token();
    }

    pub async fn get(&self, path: &str) -> Result<Value> {
        Ok(self.execute(&ApiRequest::get(path)).await?.body)
    }

    pub async fn post(&self, path: &str, body: Value) -> Result<Value> {
        Ok(self.execute(&ApiRequest::post(path, body)).await?.body)
    }

    pub async fn put(&self, path: &str, body: Option<Value>) -> Result<Value> {
        Ok(self.execute(&ApiRequest::put(path, body)).await?.body)
    }

    pub async fn delete(&self, path: &str) -> Result<Value> {
        Ok(self.execute(&ApiRequest::delete(path)).await?.body)
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("session", &self.session)
            .field("has_bearer", &self.bearer().is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Harness;
    use sparkpoint_api::User;
    use sparkpoint_auth::SessionPhase;

    #[tokio::test]
    async fn success_passes_through() {
        let h = Harness::signed_in(User::new("u1", None));
        h.transport.reply(200, json!([{"id": "s1"}]));

        let body = h.client.get("/stations").await.unwrap();
        assert_eq!(body, json!([{"id": "s1"}]));
        assert_eq!(h.transport.paths(), ["/stations"]);
    }

    #[tokio::test]
    async fn refreshes_once_and_retries() {
        let h = Harness::signed_in(User::new("u1", None));
        h.transport
            .reply(401, json!({"message": "expired"}))
            .reply(200, json!({"ok": true}))
            .reply(200, json!([{"id": "s1"}]));

        let body = h.client.get("/stations").await.unwrap();
        assert_eq!(body, json!([{"id": "s1"}]));

        let sent = h.transport.sent();
        assert_eq!(h.transport.paths(), ["/stations", REFRESH_PATH, "/stations"]);
        assert_eq!(sent[1].request.body, Some(json!({"userId": "u1"})));
        assert!(h.client.session().snapshot().is_authenticated());
    }

    #[tokio::test]
    async fn second_401_is_final() {
        let h = Harness::signed_in(User::new("u1", None));
        h.transport
            .reply(401, Value::Null)
            .reply(200, Value::Null)
            .reply(401, json!({"message": "still no"}));

        let err = h.client.get("/stations").await.unwrap_err();
        assert_eq!(err.status(), Some(401));
        assert_eq!(err.best_message(), "still no");
        assert_eq!(h.transport.sent().len(), 3);
    }

    #[tokio::test]
    async fn failed_refresh_logs_out_and_returns_original_error() {
        let h = Harness::signed_in(User::new("u1", None));
        h.client.install_token("tok");
        h.transport
            .reply(401, json!({"message": "original"}))
            .reply(500, json!({"message": "refresh broke"}));

        let err = h.client.get("/evowners/all").await.unwrap_err();
        assert_eq!(err.best_message(), "original");
        assert_eq!(h.client.session().snapshot().phase(), SessionPhase::Unauthenticated);
        assert_eq!(h.client.bearer(), None);
        assert_eq!(h.transport.sent().len(), 2);
    }

    #[tokio::test]
    async fn no_user_means_no_refresh() {
        let h = Harness::new();
        h.transport.reply(401, Value::Null);

        let err = h.client.get("/users/profile").await.unwrap_err();
        assert!(err.is_unauthorized());
        assert_eq!(h.transport.paths(), ["/users/profile"]);
        assert!(!h.client.session().snapshot().is_authenticated());
    }

    #[tokio::test]
    async fn other_failures_are_not_retried() {
        let h = Harness::signed_in(User::new("u1", None));
        h.transport.reply(403, Value::Null).fail("connection reset");

        assert_eq!(h.client.get("/stations").await.unwrap_err().status(), Some(403));
        assert!(matches!(
            h.client.get("/stations").await.unwrap_err(),
            ClientError::Transport(_)
        ));
        assert_eq!(h.transport.sent().len(), 2);
        assert!(h.client.session().snapshot().is_authenticated());
    }

    #[tokio::test]
    async fn persisted_token_becomes_default_header() {
        let cookies = Arc::new(CookieStore::in_memory(false));
        cookies.set(ACCESS_TOKEN_COOKIE, "restored").unwrap();
        let h = Harness::with_cookies(cookies);
        h.transport.reply(200, Value::Null);

        h.client.get("/stations").await.unwrap();
        assert_eq!(h.transport.sent()[0].bearer.as_deref(), Some("restored"));
    }

    #[test]
    fn context_allows_a_single_retry() {
        let ctx = RequestContext::first();
        assert!(ctx.can_retry());
        assert!(!ctx.retry().can_retry());
        assert_eq!(ctx.retry().attempt(), 2);
    }
}
