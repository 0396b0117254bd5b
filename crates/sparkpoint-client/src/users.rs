use serde_json::Value;
use sparkpoint_api::{AdminRegistration, body_detail};

use crate::ApiClient;
use crate::error::{ClientError, Result};

/// `/users` endpoints. Failures are mapped to user-facing messages.
#[derive(Debug, Clone, Copy)]
pub struct Users<'a> {
    client: &'a ApiClient,
}

impl<'a> Users<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// `GET /users/profile`.
    pub async fn profile(&self) -> Result<Value> {
        self.client
            .get("/users/profile")
            .await
            .map_err(|e| user_facing(e, "Access denied.", "Failed to fetch profile"))
    }

    /// `POST /users/admin/register`. Refused locally unless the signed-in
    /// user is an administrator.
    pub async fn register_admin(&self, registration: &AdminRegistration) -> Result<Value> {
        if !self.client.session().is_admin() {
            tracing::warn!("admin registration refused: current user is not an administrator");
            return Err(ClientError::NotAdministrator);
        }

        let body = serde_json::to_value(registration)?;
        self.client
            .post("/users/admin/register", body)
            .await
            .map_err(|e| {
                user_facing(
                    e,
                    "Access denied. Only administrators can register new admins.",
                    "Registration failed",
                )
            })
    }
}

fn user_facing(err: ClientError, denied: &str, fallback: &str) -> ClientError {
    tracing::error!(status = ?err.status(), error = %err, "user service call failed");
    match err.status() {
        Some(401) => ClientError::AuthenticationFailed,
        Some(403) => ClientError::AccessDenied(denied.to_string()),
        Some(_) => ClientError::Rejected(match &err {
            ClientError::Status { body, .. } => {
                body_detail(body).unwrap_or(fallback).to_string()
            }
            other => other.best_message(),
        }),
        None => ClientError::Rejected(err.best_message()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Harness;
    use serde_json::json;
    use sparkpoint_api::User;

    fn registration() -> AdminRegistration {
        AdminRegistration {
            username: "ops".into(),
            email: "ops@example.com".into(),
            first_name: "Op".into(),
            last_name: "S".into(),
            password: "pw".into(),
        }
    }

    #[tokio::test]
    async fn profile_errors_are_mapped() {
        let h = Harness::new();
        h.transport
            .reply(403, json!({}))
            .reply(500, json!({"message": "db down"}))
            .reply(502, Value::Null)
            .reply(401, json!({}));

        let denied = h.client.users().profile().await.unwrap_err();
        assert_eq!(denied.to_string(), "Access denied.");

        let other = h.client.users().profile().await.unwrap_err();
        assert_eq!(other.to_string(), "db down");

        let bare = h.client.users().profile().await.unwrap_err();
        assert_eq!(bare.to_string(), "Failed to fetch profile");

        // no user, so no refresh: the 401 is final
        let unauth = h.client.users().profile().await.unwrap_err();
        assert_eq!(unauth.to_string(), "Authentication failed. Please log in again.");
    }

    #[tokio::test]
    async fn non_admin_is_refused_before_the_network() {
        let h = Harness::signed_in(User::new("u2", Some(2)));
        let err = h.client.users().register_admin(&registration()).await.unwrap_err();
        assert!(matches!(err, ClientError::NotAdministrator));
        assert!(h.transport.sent().is_empty());
    }

    #[tokio::test]
    async fn admin_registers_with_pascal_case_body() {
        let h = Harness::signed_in(User::new("u1", Some(1)));
        h.transport.reply(201, json!({"id": "new"}));

        let created = h.client.users().register_admin(&registration()).await.unwrap();
        assert_eq!(created["id"], "new");

        let body = h.transport.sent()[0].request.body.clone().unwrap();
        assert_eq!(body["Username"], "ops");
        assert_eq!(body["LastName"], "S");
    }

    #[tokio::test]
    async fn registration_403_message() {
        let h = Harness::signed_in(User::new("u1", Some(1)));
        h.transport.reply(403, json!({}));
        let err = h.client.users().register_admin(&registration()).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Access denied. Only administrators can register new admins."
        );
    }
}
