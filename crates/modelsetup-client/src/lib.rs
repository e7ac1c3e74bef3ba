//! REST API client for the model setup engine.
//!
//! [`ApiClient`] talks JSON over HTTP to an entity API; [`EntityApi`] is the
//! seam the engine is written against, so other transports (or in-memory
//! doubles) can stand in for it.

pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod ids;

pub use api::EntityApi;
pub use auth::ApiAuth;
pub use client::{ApiClient, HttpMethod, RestResponse};
pub use config::{ClientConfig, ConfigError};
pub use error::{ApiError, ApiResult};
pub use ids::ClientSessionId;
