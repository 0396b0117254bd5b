//! Scripted in-process transport for tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use sparkpoint_api::{ApiRequest, ApiResponse, SparkpointError, Transport, User};
use sparkpoint_auth::{CookieStore, SessionStore};

use crate::ApiClient;

#[derive(Debug, Clone, PartialEq)]
pub struct Sent {
    pub request: ApiRequest,
    pub bearer: Option<String>,
}

/// Answers requests from a queue, in order, and records what was sent.
#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Result<ApiResponse, SparkpointError>>>,
    sent: Mutex<Vec<Sent>>,
}

impl ScriptedTransport {
    pub fn reply(&self, status: u16, body: Value) -> &Self {
        self.replies
            .lock()
            .unwrap()
            .push_back(Ok(ApiResponse::new(status, body)));
        self
    }

    pub fn fail(&self, message: &str) -> &Self {
        self.replies
            .lock()
            .unwrap()
            .push_back(Err(SparkpointError::Connection(message.to_string())));
        self
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn paths(&self) -> Vec<String> {
        self.sent().into_iter().map(|s| s.request.path).collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(
        &self,
        request: &ApiRequest,
        bearer: Option<&str>,
    ) -> Result<ApiResponse, SparkpointError> {
        self.sent.lock().unwrap().push(Sent {
            request: request.clone(),
            bearer: bearer.map(str::to_string),
        });
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("no scripted reply for {} {}", request.method, request.path))
    }
}

pub struct Harness {
    pub transport: Arc<ScriptedTransport>,
    pub cookies: Arc<CookieStore>,
    pub client: ApiClient,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_cookies(Arc::new(CookieStore::in_memory(false)))
    }

    pub fn with_cookies(cookies: Arc<CookieStore>) -> Self {
        let transport = Arc::new(ScriptedTransport::default());
        let session = Arc::new(SessionStore::rehydrate(Arc::clone(&cookies)));
        let client = ApiClient::new(transport.clone(), session);
        Self {
            transport,
            cookies,
            client,
        }
    }

    /// A harness whose session is already authenticated as `user`.
    pub fn signed_in(user: User) -> Self {
        let harness = Self::new();
        let session = harness.client.session();
        session.login_start().unwrap();
        session.login_success(user).unwrap();
        harness
    }
}
