//! The API surface the model setup engine drives.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::client::{HttpMethod, RestResponse};
use crate::error::{ApiError, ApiResult};
use crate::ids::ClientSessionId;

/// Operations the reconciliation engine needs from a REST API.
///
/// A handle is not assumed to be safe for concurrent use: each concurrent
/// task works on its own handle obtained from [`EntityApi::fork`].
#[async_trait]
pub trait EntityApi: Send + Sync {
    /// Session this handle belongs to. Forks keep the same id.
    fn session_id(&self) -> ClientSessionId;

    /// An independent handle to the same API and session.
    fn fork(&self) -> Arc<dyn EntityApi>;

    /// GET `path`, returning the response whatever its status.
    async fn get(&self, path: &str) -> ApiResult<RestResponse>;

    /// PUT a JSON body; non-2xx answers are [`ApiError::Http`].
    async fn put(&self, path: &str, body: &Value) -> ApiResult<Value>;

    /// POST a JSON body; non-2xx answers are [`ApiError::Http`].
    async fn post(&self, path: &str, body: &Value) -> ApiResult<Value>;

    /// GET `path` and decode it, failing on non-2xx.
    async fn fetch(&self, path: &str) -> ApiResult<Value> {
        let response = self.get(path).await?;
        if !response.is_success() {
            return Err(ApiError::Http {
                method: HttpMethod::Get,
                uri: path.to_string(),
                response,
            });
        }
        response.json_value().map_err(|e| ApiError::Parse {
            uri: path.to_string(),
            message: e.to_string(),
        })
    }

    /// Write a body with a PUT or POST chosen at runtime.
    async fn send(&self, method: HttpMethod, path: &str, body: &Value) -> ApiResult<Value> {
        match method {
            HttpMethod::Put => self.put(path, body).await,
            HttpMethod::Post => self.post(path, body).await,
            other => Err(ApiError::UnsupportedMethod(other)),
        }
    }
}
