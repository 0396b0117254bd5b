use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, SET_COOKIE};
use serde_json::Value;
use sparkpoint_api::{ApiRequest, ApiResponse, Method, SparkpointError, Transport};
use sparkpoint_core::ClientConfig;

use crate::ServerCookies;

/// `reqwest`-backed transport. The server's session cookie rides along on
/// every request, refresh included, and is saved whenever the server sets one.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: reqwest::Client,
    api_root: String,
    cookies: ServerCookies,
}

impl ReqwestTransport {
    pub fn new(cfg: &ClientConfig, cookies: ServerCookies) -> Result<Self, SparkpointError> {
        let mut builder = reqwest::Client::builder().cookie_provider(cookies.provider());
        if let Some(ms) = cfg.request_timeout_ms {
            builder = builder.timeout(Duration::from_millis(ms));
        }
        let http = builder
            .build()
            .map_err(|e| SparkpointError::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_root: cfg.api_root(),
            cookies,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_root, path.trim_start_matches('/'))
    }
}

fn method(m: Method) -> reqwest::Method {
    match m {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Delete => reqwest::Method::DELETE,
    }
}

/// Empty bodies become `Null`; non-JSON bodies are kept as a string.
fn decode_body(text: String) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(&text).unwrap_or(Value::String(text))
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(
        &self,
        request: &ApiRequest,
        bearer: Option<&str>,
    ) -> Result<ApiResponse, SparkpointError> {
        let url = self.url(&request.path);
        let mut req = self
            .http
            .request(method(request.method), &url)
            .header(ACCEPT, "application/json");

        if let Some(token) = bearer {
            req = req.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            req = req.json(body);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| SparkpointError::Connection(e.to_string()))?;
        let status = resp.status().as_u16();
        if resp.headers().contains_key(SET_COOKIE) {
            if let Err(e) = self.cookies.save() {
                tracing::warn!(error = %e, "failed to persist server cookies");
            }
        }
        let text = resp
            .text()
            .await
            .map_err(|e| SparkpointError::Connection(format!("failed to read body: {e}")))?;

        tracing::debug!(method = %request.method, %url, status, "response received");
        Ok(ApiResponse::new(status, decode_body(text)))
    }
}
