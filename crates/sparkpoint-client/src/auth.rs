//! Login and logout.
//!
//! Both talk to the server with [`ApiClient::send_once`]: auth endpoints are
//! never routed through the 401 refresh path.

use serde::Serialize;
use serde_json::Value;
use sparkpoint_api::{ApiRequest, LoginRequest, LoginResponse, UserRef};

use crate::ApiClient;
use crate::error::{ClientError, Result};

pub(crate) const LOGIN_PATH: &str = "/auth/login";
pub(crate) const LOGOUT_PATH: &str = "/auth/logout";

/// Message recorded when the server rejects a login without saying why.
pub const LOGIN_FAILED: &str = "Login failed";

/// Outcome of [`ApiClient::logout`]. Local state is always cleared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogoutReport {
    pub success: bool,
    /// Why the server-side logout could not be confirmed, if it was tried.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_error: Option<String>,
}

impl ApiClient {
    /// Post credentials to `/auth/login`.
    ///
    /// A response carrying a `user` authenticates the session (and installs
    /// `accessToken`, when present, as the default bearer). A response
    /// without one marks the login failed but is still returned as `Ok` so
    /// the caller can inspect it. Transport and HTTP errors mark the login
    /// failed with the best available message and are returned unchanged.
    pub async fn login(&self, identifier: &str, password: &str) -> Result<LoginResponse> {
        let credentials = LoginRequest {
            identifier: identifier.to_string(),
            password: password.to_string(),
        };
        let request = ApiRequest::post(LOGIN_PATH, serde_json::to_value(&credentials)?);

        self.session().login_start()?;

        let payload = match self.send_once(&request).await.and_then(decode_login) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::error!(status = ?err.status(), error = %err, "login request failed");
                self.session().login_failure(err.best_message())?;
                return Err(err);
            }
        };

        match &payload.user {
            Some(user) => {
                if let Some(token) = payload.access_token.as_deref() {
                    self.install_token(token);
                }
                self.session().login_success(user.clone())?;
            }
            None => {
                let message = payload
                    .message
                    .clone()
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| LOGIN_FAILED.to_string());
                self.session().login_failure(message)?;
            }
        }
        Ok(payload)
    }

    /// End the session.
    ///
    /// The server is told (best effort) only when a user is known. Local
    /// session state, the persisted token, and the default header are cleared
    /// regardless of what the server says.
    pub async fn logout(&self) -> LogoutReport {
        let mut remote_error = None;

        if let Some(user_id) = self.session().user_id() {
            let request = match serde_json::to_value(UserRef { user_id }) {
                Ok(body) => Some(ApiRequest::post(LOGOUT_PATH, body)),
                Err(e) => {
                    remote_error = Some(e.to_string());
                    None
                }
            };
            if let Some(request) = request {
                if let Err(e) = self.send_once(&request).await {
                    tracing::warn!(error = %e, "server logout failed; clearing local session anyway");
                    remote_error = Some(e.best_message());
                }
            }
        }

        self.session().logout();
        self.clear_token();

        LogoutReport {
            success: true,
            remote_error,
        }
    }
}

fn decode_login(response: sparkpoint_api::ApiResponse) -> Result<LoginResponse> {
    match response.body {
        Value::Null => Ok(LoginResponse::default()),
        body => serde_json::from_value(body).map_err(ClientError::from),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Harness;
    use serde_json::json;
    use sparkpoint_api::User;
    use sparkpoint_auth::{ACCESS_TOKEN_COOKIE, IS_AUTHENTICATED_COOKIE, SessionPhase, USER_DATA_COOKIE};

    #[tokio::test]
    async fn successful_login_persists_session_and_token() {
        let h = Harness::new();
        h.transport.reply(200, json!({"user": {"id": "u1", "roleId": 1}, "accessToken": "tok"}));

        let payload = h.client.login("admin@example.com", "pw").await.unwrap();
        assert_eq!(payload.user.unwrap().id, "u1");

        let session = h.client.session().snapshot();
        assert!(session.is_authenticated());
        assert!(session.is_admin());
        assert_eq!(h.client.bearer().as_deref(), Some("tok"));
        assert_eq!(h.cookies.get::<String>(ACCESS_TOKEN_COOKIE).as_deref(), Some("tok"));
        assert_eq!(h.cookies.get::<bool>(IS_AUTHENTICATED_COOKIE), Some(true));

        let sent = &h.transport.sent()[0];
        assert_eq!(sent.request.path, LOGIN_PATH);
        assert_eq!(
            sent.request.body,
            Some(json!({"identifier": "admin@example.com", "password": "pw"}))
        );
    }

    #[tokio::test]
    async fn login_without_token_keeps_header_unset() {
        let h = Harness::new();
        h.transport.reply(200, json!({"user": {"id": 9}}));

        h.client.login("a", "b").await.unwrap();
        assert!(h.client.session().snapshot().is_authenticated());
        assert_eq!(h.client.bearer(), None);
    }

    #[tokio::test]
    async fn login_accepts_extra_identity_keys() {
        for user in [
            json!({"_id": "abc", "id": "abc", "roleId": 1}),
            json!({"id": "abc", "roleId": 1, "role": "Admin"}),
        ] {
            let h = Harness::new();
            h.transport.reply(200, json!({"user": user}));

            h.client.login("a", "b").await.unwrap();
            let session = h.client.session().snapshot();
            assert_eq!(session.phase(), SessionPhase::Authenticated, "{user}");
            assert!(session.is_admin());
            assert_eq!(h.cookies.get::<User>(USER_DATA_COOKIE).unwrap().id, "abc");
        }
    }

    #[tokio::test]
    async fn response_without_user_fails_without_raising() {
        let h = Harness::new();
        h.transport.reply(200, json!({"message": "Account disabled"}));

        let payload = h.client.login("a", "b").await.unwrap();
        assert!(payload.user.is_none());

        let session = h.client.session().snapshot();
        assert_eq!(session.phase(), SessionPhase::Failed);
        assert_eq!(session.error(), Some("Account disabled"));
        assert!(h.cookies.get::<User>(USER_DATA_COOKIE).is_none());
    }

    #[tokio::test]
    async fn empty_body_uses_generic_message() {
        let h = Harness::new();
        h.transport.reply(200, serde_json::Value::Null);

        h.client.login("a", "b").await.unwrap();
        assert_eq!(h.client.session().snapshot().error(), Some(LOGIN_FAILED));
    }

    #[tokio::test]
    async fn network_failure_raises_and_records_message() {
        let h = Harness::new();
        h.transport.fail("connection refused");

        let err = h.client.login("a", "b").await.unwrap_err();
        assert!(matches!(err, ClientError::Transport(_)));
        assert_eq!(h.client.session().snapshot().error(), Some("connection refused"));
    }

    #[tokio::test]
    async fn http_failure_prefers_server_fields() {
        let h = Harness::new();
        h.transport.reply(401, json!({"error": "Invalid credentials"}));

        let err = h.client.login("a", "b").await.unwrap_err();
        assert_eq!(err.status(), Some(401));
        // auth endpoints never trigger a refresh
        assert_eq!(h.transport.paths(), [LOGIN_PATH]);
        assert_eq!(h.client.session().snapshot().error(), Some("Invalid credentials"));
        assert_eq!(h.client.session().snapshot().phase(), SessionPhase::Failed);
    }

    #[tokio::test]
    async fn logout_clears_everything_even_if_server_fails() {
        let h = Harness::signed_in(User::new("u1", None));
        h.client.install_token("tok");
        h.transport.fail("offline");

        let report = h.client.logout().await;
        assert!(report.success);
        assert_eq!(report.remote_error.as_deref(), Some("offline"));

        assert_eq!(h.client.session().snapshot().phase(), SessionPhase::Unauthenticated);
        assert_eq!(h.client.bearer(), None);
        for name in [ACCESS_TOKEN_COOKIE, IS_AUTHENTICATED_COOKIE, USER_DATA_COOKIE] {
            assert!(h.cookies.get::<serde_json::Value>(name).is_none(), "{name} survived");
        }
        assert_eq!(h.transport.sent()[0].request.body, Some(json!({"userId": "u1"})));
    }

    #[tokio::test]
    async fn logout_without_user_skips_server() {
        let h = Harness::new();
        let report = h.client.logout().await;
        assert!(report.success);
        assert!(report.remote_error.is_none());
        assert!(h.transport.sent().is_empty());
    }
}
