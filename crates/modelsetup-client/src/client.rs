//! REST API client (reqwest-based).
//!
//! Provides an `ApiClient` that sends JSON requests to the entity API,
//! resolving relative paths against a base URI and attaching the session
//! token to every request.

use crate::api::EntityApi;
use crate::auth::ApiAuth;
use crate::config::ClientConfig;
use crate::error::{ApiError, ApiResult};
use crate::ids::ClientSessionId;
use async_trait::async_trait;
use reqwest::header::LOCATION;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// HTTP verb used for an API call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    /// Get the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }

    /// Whether entities can be written with this verb.
    #[must_use]
    pub fn is_write(&self) -> bool {
        matches!(self, HttpMethod::Put | HttpMethod::Post)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            other => Err(format!("unknown HTTP method: {other}")),
        }
    }
}

impl TryFrom<String> for HttpMethod {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<HttpMethod> for String {
    fn from(method: HttpMethod) -> Self {
        method.as_str().to_string()
    }
}

/// A raw API response: status, body text and `Location` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestResponse {
    pub status: u16,
    pub body: Option<String>,
    pub location: Option<String>,
}

impl RestResponse {
    #[must_use]
    pub fn new(status: u16, body: Option<String>, location: Option<String>) -> Self {
        Self {
            status,
            body,
            location,
        }
    }

    /// Whether the status is 2xx.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body text, or the empty string.
    #[must_use]
    pub fn body_or_empty(&self) -> &str {
        self.body.as_deref().unwrap_or("")
    }

    /// Decode the body as JSON. An empty body decodes as `null`.
    pub fn json_value(&self) -> Result<Value, serde_json::Error> {
        let body = self.body_or_empty().trim();
        if body.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(body)
    }

    /// Decode the body into `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.json_value()?)
    }
}

/// HTTP client for the entity API.
///
/// Cloning (or [`EntityApi::fork`]) yields an independent handle: its token
/// state can change without affecting the original, while the session id and
/// the underlying connection pool are shared.
#[derive(Debug, Clone)]
pub struct ApiClient {
    /// Base URI all relative paths are resolved against.
    base_url: String,
    /// Session token state.
    auth: ApiAuth,
    /// Underlying HTTP client.
    http_client: Client,
    session_id: ClientSessionId,
}

impl ApiClient {
    /// Create a new API client.
    pub fn new(base_url: impl Into<String>, auth: ApiAuth, timeout: Duration) -> ApiResult<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("modelsetup-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::InvalidConfig(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self::with_http_client(base_url, auth, http_client))
    }

    /// Create a client with a pre-built `reqwest::Client` (for testing).
    #[must_use]
    pub fn with_http_client(base_url: impl Into<String>, auth: ApiAuth, http_client: Client) -> Self {
        Self {
            base_url: base_url.into(),
            auth,
            http_client,
            session_id: ClientSessionId::new(),
        }
    }

    /// Build a client from loaded configuration.
    pub fn from_config(config: &ClientConfig) -> ApiResult<Self> {
        let auth = ApiAuth::new(config.token.clone(), config.token_header.clone());
        Self::new(
            config.base_url.clone(),
            auth,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    /// Get the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Token state of this handle.
    #[must_use]
    pub fn auth(&self) -> &ApiAuth {
        &self.auth
    }

    /// Replace the session token.
    pub fn set_token(&mut self, token: Option<String>) {
        self.auth.set_token(token);
    }

    /// Temporarily act with another token; undo with [`ApiClient::pop_token`].
    pub fn push_token(&mut self, token: impl Into<String>) {
        self.auth.push_token(token);
    }

    /// Restore the previous token, returning the one now active.
    pub fn pop_token(&mut self) -> Option<&str> {
        self.auth.pop_token()
    }

    /// Resolve a request path against the base URL.
    ///
    /// Absolute `http://`/`https://` paths are used as given.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        match (self.base_url.ends_with('/'), path.starts_with('/')) {
            (true, true) => format!("{}{}", self.base_url, &path[1..]),
            (false, false) if !path.is_empty() => format!("{}/{}", self.base_url, path),
            _ => format!("{}{}", self.base_url, path),
        }
    }

    // ── Internal HTTP Methods ─────────────────────────────────────────

    fn request(&self, method: HttpMethod, url: &str) -> RequestBuilder {
        let builder = match method {
            HttpMethod::Get => self.http_client.get(url),
            HttpMethod::Post => self.http_client.post(url),
            HttpMethod::Put => self.http_client.put(url),
            HttpMethod::Patch => self.http_client.patch(url),
            HttpMethod::Delete => self.http_client.delete(url),
        };
        self.auth.apply(builder)
    }

    async fn execute(
        &self,
        method: HttpMethod,
        url: String,
        body: Option<&Value>,
    ) -> ApiResult<RestResponse> {
        debug!(method = %method, url = %url, "API request");
        let mut builder = self.request(method, &url);
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|source| ApiError::Transport {
            method,
            uri: url.clone(),
            source,
        })?;

        let status = response.status().as_u16();
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let text = response.text().await.map_err(|source| ApiError::Transport {
            method,
            uri: url.clone(),
            source,
        })?;

        debug!(method = %method, url = %url, status, "API response");
        Ok(RestResponse::new(
            status,
            (!text.is_empty()).then_some(text),
            location,
        ))
    }

    /// Send a JSON body and decode the JSON answer, failing on non-2xx.
    async fn write(&self, method: HttpMethod, path: &str, body: &Value) -> ApiResult<Value> {
        let url = self.url(path);
        let response = self.execute(method, url.clone(), Some(body)).await?;
        decode_success(method, url, response)
    }
}

fn decode_success(method: HttpMethod, uri: String, response: RestResponse) -> ApiResult<Value> {
    if !response.is_success() {
        return Err(ApiError::Http {
            method,
            uri,
            response,
        });
    }
    response.json_value().map_err(|e| ApiError::Parse {
        uri,
        message: e.to_string(),
    })
}

#[async_trait]
impl EntityApi for ApiClient {
    fn session_id(&self) -> ClientSessionId {
        self.session_id
    }

    fn fork(&self) -> Arc<dyn EntityApi> {
        Arc::new(self.clone())
    }

    async fn get(&self, path: &str) -> ApiResult<RestResponse> {
        self.execute(HttpMethod::Get, self.url(path), None).await
    }

    async fn put(&self, path: &str, body: &Value) -> ApiResult<Value> {
        self.write(HttpMethod::Put, path, body).await
    }

    async fn post(&self, path: &str, body: &Value) -> ApiResult<Value> {
        self.write(HttpMethod::Post, path, body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> ApiClient {
        ApiClient::with_http_client(base, ApiAuth::default(), Client::new())
    }

    #[test]
    fn test_url_joins_relative_paths() {
        assert_eq!(client("http://api/v1/").url("/accounts"), "http://api/v1/accounts");
        assert_eq!(client("http://api/v1").url("/accounts"), "http://api/v1/accounts");
        assert_eq!(client("http://api/v1").url("accounts"), "http://api/v1/accounts");
        assert_eq!(client("http://api/v1/").url("accounts"), "http://api/v1/accounts");
    }

    #[test]
    fn test_url_passes_absolute_paths_through() {
        assert_eq!(
            client("http://api/v1").url("https://other/thing"),
            "https://other/thing"
        );
    }

    #[test]
    fn test_http_method_parse_is_case_insensitive() {
        assert_eq!("put".parse::<HttpMethod>(), Ok(HttpMethod::Put));
        assert_eq!(" Post ".parse::<HttpMethod>(), Ok(HttpMethod::Post));
        assert!("FETCH".parse::<HttpMethod>().is_err());
    }

    #[test]
    fn test_http_method_serde() {
        let method: HttpMethod = serde_json::from_str("\"post\"").unwrap();
        assert_eq!(method, HttpMethod::Post);
        assert_eq!(serde_json::to_string(&HttpMethod::Put).unwrap(), "\"PUT\"");
    }

    #[test]
    fn test_write_methods() {
        assert!(HttpMethod::Put.is_write());
        assert!(HttpMethod::Post.is_write());
        assert!(!HttpMethod::Get.is_write());
        assert!(!HttpMethod::Delete.is_write());
    }

    #[test]
    fn test_rest_response_json_value() {
        let empty = RestResponse::new(201, None, None);
        assert_eq!(empty.json_value().unwrap(), Value::Null);

        let body = RestResponse::new(200, Some("{\"uuid\":\"u1\"}".into()), None);
        assert_eq!(body.json_value().unwrap()["uuid"], "u1");
        assert!(body.is_success());
        assert!(!RestResponse::new(404, None, None).is_success());
    }

    #[test]
    fn test_fork_shares_session_id() {
        let original = client("http://api");
        let forked = original.fork();
        assert_eq!(forked.session_id(), original.session_id());
    }

    #[test]
    fn test_token_stack_is_per_handle() {
        let mut original = client("http://api");
        original.set_token(Some("admin".into()));
        let mut copy = original.clone();
        copy.push_token("other");
        assert_eq!(copy.auth().token(), Some("other"));
        assert_eq!(original.auth().token(), Some("admin"));
    }
}
