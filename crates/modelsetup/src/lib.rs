//! Declarative model setup.
//!
//! Reads JSON models of desired entities and drives an entity API until the
//! server agrees with them: missing entities are created, flagged ones are
//! updated, and children are materialized under their parents with bounded
//! concurrency. With a [`VerifySink`] installed the engine only reports what
//! it would do.
//!
//! ```no_run
//! use std::sync::Arc;
//! use modelsetup::{FsModelLoader, ModelSetup, SetupSettings};
//! use modelsetup_client::{ApiClient, ClientConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let api = ApiClient::from_config(&ClientConfig::from_env()?)?;
//! let engine = ModelSetup::new(SetupSettings::from_env()?);
//! let (loader, manifest) = FsModelLoader::for_manifest("models/manifest.json".as_ref())?;
//! engine.setup_manifest(Arc::new(api), &loader, &manifest).await?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
mod children;
pub mod context;
pub mod engine;
pub mod entity;
pub mod entity_config;
pub mod error;
pub mod listener;
pub mod logging;
pub mod manifest;
pub mod reconciler;
pub mod settings;
pub mod uri;
pub mod verify;

pub use cache::IdentityCache;
pub use context::Context;
pub use engine::ModelSetup;
pub use entity::{scrub_special_properties, ModelEntity};
pub use entity_config::{EntityConfig, FieldReference, ParentFieldConfig};
pub use error::{JobFailure, SetupError, SetupResult};
pub use listener::ModelSetupListener;
pub use manifest::{
    entity_type_from_model_name, load_manifest, FsModelLoader, ModelLoader, StaticModelLoader,
};
pub use settings::SetupSettings;
pub use verify::{FieldDiff, ModelVerifyLog, VerifyReport, VerifySink};
