use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type UserId = String;

/// Role id the backend assigns to administrators.
pub const ADMIN_ROLE_ID: i64 = 1;

/// The signed-in user as the backend returns it. Only `id` and `roleId` are
/// interpreted; every other key is carried along in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawUser")]
pub struct User {
    pub id: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role_id: Option<i64>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl User {
    pub fn new(id: impl Into<UserId>, role_id: Option<i64>) -> Self {
        Self {
            id: id.into(),
            role_id,
            extra: BTreeMap::new(),
        }
    }

    /// `roleId == 1`, falling back to a numeric `role` or `Role` key when
    /// `roleId` is absent. Role names (strings) never grant admin.
    pub fn is_admin(&self) -> bool {
        let role = self.role_id.or_else(|| {
            ["role", "Role"]
                .iter()
                .find_map(|key| self.extra.get(*key).and_then(Value::as_i64))
        });
        role == Some(ADMIN_ROLE_ID)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawUser {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    role_id: Option<Value>,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

impl TryFrom<RawUser> for User {
    type Error = String;

    fn try_from(raw: RawUser) -> Result<Self, Self::Error> {
        // `id` wins; `_id` and `Id` stay in `extra` either way.
        let id = raw
            .id
            .filter(|v| !v.is_null())
            .or_else(|| ["_id", "Id"].iter().find_map(|key| raw.extra.get(*key).cloned()))
            .ok_or_else(|| "user record has no id".to_string())?;
        let id = match id {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            other => return Err(format!("user id must be a string or number, got {other}")),
        };

        let mut extra = raw.extra;
        let role_id = match raw.role_id {
            None | Some(Value::Null) => None,
            Some(v) => match v.as_i64() {
                Some(n) => Some(n),
                None => {
                    extra.insert("roleId".to_string(), v);
                    None
                }
            },
        };

        Ok(Self { id, role_id, extra })
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub identifier: String,
    pub password: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("identifier", &self.identifier)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Body returned by `POST /auth/login`. Every field is optional because a
/// 2xx response without `user` still counts as a rejected login.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// `{ "userId": ... }` body shared by refresh and logout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRef {
    pub user_id: UserId,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AdminRegistration {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

impl fmt::Debug for AdminRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminRegistration")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One logical request, relative to the client's API prefix.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>, body: Option<Value>) -> Self {
        Self {
            method,
            path: path.into(),
            body,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path, None)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Post, path, Some(body))
    }

    pub fn put(path: impl Into<String>, body: Option<Value>) -> Self {
        Self::new(Method::Put, path, body)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path, None)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Pulls `message`, then `error`, out of a JSON error body.
pub fn body_detail(body: &Value) -> Option<&str> {
    ["message", "error"]
        .iter()
        .find_map(|key| body.get(key).and_then(Value::as_str))
        .filter(|s| !s.is_empty())
}

#[derive(Debug, thiserror::Error)]
pub enum SparkpointError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("internal error: {0}")]
    Internal(String),
}

/// The wire. Implementations must return `Ok` for every HTTP status and only
/// fail when no response was received.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        request: &ApiRequest,
        bearer: Option<&str>,
    ) -> Result<ApiResponse, SparkpointError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn user_accepts_numeric_id_and_numeric_role_key() {
        let user: User = serde_json::from_value(json!({"id": 7, "Role": 1, "name": "ada"})).unwrap();
        assert_eq!(user.id, "7");
        assert_eq!(user.role_id, None);
        assert!(user.is_admin());
        assert_eq!(user.extra.get("name"), Some(&json!("ada")));
    }

    #[test]
    fn user_with_both_id_keys_decodes() {
        let user: User =
            serde_json::from_value(json!({"_id": "abc", "id": "abc", "roleId": 1})).unwrap();
        assert_eq!(user.id, "abc");
        assert!(user.is_admin());

        let mongo_only: User = serde_json::from_value(json!({"_id": "m1"})).unwrap();
        assert_eq!(mongo_only.id, "m1");
        assert!(!mongo_only.is_admin());
    }

    #[test]
    fn role_name_is_kept_but_not_trusted() {
        let user: User =
            serde_json::from_value(json!({"id": "u1", "roleId": 1, "role": "Admin"})).unwrap();
        assert!(user.is_admin());
        assert_eq!(user.extra.get("role"), Some(&json!("Admin")));

        let named: User = serde_json::from_value(json!({"id": "u2", "role": "Admin"})).unwrap();
        assert!(!named.is_admin());
    }

    #[test]
    fn user_survives_a_serialize_round_trip() {
        let user: User =
            serde_json::from_value(json!({"_id": "abc", "id": "abc", "roleId": 2, "email": "a@b.c"}))
                .unwrap();
        let again: User = serde_json::from_value(serde_json::to_value(&user).unwrap()).unwrap();
        assert_eq!(again, user);
    }

    #[test]
    fn user_without_id_is_rejected() {
        assert!(serde_json::from_value::<User>(json!({"roleId": 1})).is_err());
        assert!(serde_json::from_value::<User>(json!({"id": true})).is_err());
    }

    #[test]
    fn login_response_without_user() {
        let resp: LoginResponse =
            serde_json::from_value(json!({"message": "Invalid credentials"})).unwrap();
        assert!(resp.user.is_none());
        assert_eq!(resp.message.as_deref(), Some("Invalid credentials"));
    }

    #[test]
    fn registration_is_pascal_case_and_redacted() {
        let reg = AdminRegistration {
            username: "root".into(),
            email: "root@example.com".into(),
            first_name: "Ro".into(),
            last_name: "Ot".into(),
            password: "hunter2".into(),
        };
        let body = serde_json::to_value(&reg).unwrap();
        assert_eq!(body["FirstName"], "Ro");
        assert!(!format!("{reg:?}").contains("hunter2"));
    }

    #[test]
    fn detail_prefers_message_over_error() {
        let body = json!({"message": "nope", "error": "other"});
        assert_eq!(body_detail(&body), Some("nope"));
        assert_eq!(body_detail(&json!({"error": "bad"})), Some("bad"));
        assert_eq!(body_detail(&json!("plain")), None);
    }
}
