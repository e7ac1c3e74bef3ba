//! The model setup engine and its run entry points.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use modelsetup_client::EntityApi;
use tracing::{debug, info};

use crate::cache::IdentityCache;
use crate::context::Context;
use crate::entity::{parse_entities, ModelEntity};
use crate::entity_config::fetch_entity_config;
use crate::error::SetupResult;
use crate::listener::ModelSetupListener;
use crate::manifest::{self, entity_type_from_model_name, ModelLoader};
use crate::settings::SetupSettings;
use crate::verify::VerifySink;

/// Reconciles models against an entity API.
///
/// Cheap to clone: clones share the identity cache, hooks and hash memo, which
/// is how concurrent child tasks work against the same run state.
#[derive(Clone)]
pub struct ModelSetup {
    pub(crate) settings: Arc<SetupSettings>,
    pub(crate) cache: Arc<IdentityCache>,
    pub(crate) listener: Option<Arc<dyn ModelSetupListener>>,
    pub(crate) verify_log: Option<Arc<dyn VerifySink>>,
    model_hashes: Arc<Mutex<HashMap<(String, String), String>>>,
}

impl std::fmt::Debug for ModelSetup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelSetup")
            .field("settings", &self.settings)
            .field("cached_entities", &self.cache.len())
            .field("listener", &self.listener.is_some())
            .field("verify", &self.verify_log.is_some())
            .finish()
    }
}

impl Default for ModelSetup {
    fn default() -> Self {
        Self::new(SetupSettings::default())
    }
}

impl ModelSetup {
    pub fn new(settings: SetupSettings) -> Self {
        info!(
            max_concurrency = settings.max_concurrency,
            child_timeout_secs = settings.child_timeout.as_secs(),
            run = %settings.run_label,
            "Model setup engine created"
        );
        Self {
            settings: Arc::new(settings),
            cache: Arc::new(IdentityCache::new()),
            listener: None,
            verify_log: None,
            model_hashes: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    #[must_use]
    pub fn with_listener(mut self, listener: Arc<dyn ModelSetupListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Switch to verify mode: report to `sink` instead of writing.
    #[must_use]
    pub fn with_verify_log(mut self, sink: Arc<dyn VerifySink>) -> Self {
        self.verify_log = Some(sink);
        self
    }

    /// Use a cache shared with other engines.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<IdentityCache>) -> Self {
        self.cache = cache;
        self
    }

    #[must_use]
    pub fn with_run_label(mut self, run_label: impl Into<String>) -> Self {
        let mut settings = (*self.settings).clone();
        settings.run_label = run_label.into();
        self.settings = Arc::new(settings);
        self
    }

    #[must_use]
    pub fn settings(&self) -> &SetupSettings {
        &self.settings
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<IdentityCache> {
        &self.cache
    }

    #[must_use]
    pub fn is_verify(&self) -> bool {
        self.verify_log.is_some()
    }

    pub(crate) fn run_label(&self) -> &str {
        &self.settings.run_label
    }

    /// Load `manifest` through `loader` and set up every model it lists.
    pub async fn setup_manifest(
        &self,
        api: Arc<dyn EntityApi>,
        loader: &dyn ModelLoader,
        manifest: &str,
    ) -> SetupResult<Vec<(String, String)>> {
        let models = manifest::load_manifest(loader, manifest)?;
        self.setup_model(api, models).await
    }

    /// Set up each (model name, JSON) pair in order, returning the pairs.
    ///
    /// The entity type of a model is its name up to the first `_` or `.`.
    pub async fn setup_model(
        &self,
        api: Arc<dyn EntityApi>,
        models: Vec<(String, String)>,
    ) -> SetupResult<Vec<(String, String)>> {
        for (model, json) in &models {
            let entity_type = entity_type_from_model_name(model);
            info!(run = %self.run_label(), model = %model, entity_type = %entity_type, "Setting up model");
            self.setup_json(api.clone(), entity_type, json).await?;
        }
        Ok(models)
    }

    /// Set up every instance in one model document of `entity_type`.
    ///
    /// Root instances are reconciled one after another, each starting from an
    /// empty context. Returns the materialized roots.
    pub async fn setup_json(
        &self,
        api: Arc<dyn EntityApi>,
        entity_type: &str,
        json: &str,
    ) -> SetupResult<Vec<ModelEntity>> {
        if let Some(listener) = &self.listener {
            listener.pre_entity_config(entity_type);
        }
        let config = fetch_entity_config(
            api.as_ref(),
            &self.settings.entity_configs_endpoint,
            entity_type,
            self.run_label(),
        )
        .await?;
        if let Some(listener) = &self.listener {
            listener.post_entity_config(entity_type, &config);
        }

        let class_name = config.root_class_name(entity_type);
        let entities = parse_entities(json, &class_name)?;
        debug!(entity_type = %entity_type, count = entities.len(), "Parsed model entities");

        let config = Arc::new(config);
        let mut materialized = Vec::with_capacity(entities.len());
        for entity in entities {
            if let Some(result) = self
                .materialize(api.clone(), config.clone(), entity, Context::new())
                .await?
            {
                materialized.push(result);
            }
        }
        Ok(materialized)
    }

    /// SHA-256 of the manifest's models, computed once per loader location
    /// and manifest.
    pub fn model_hash(&self, loader: &dyn ModelLoader, manifest: &str) -> SetupResult<String> {
        let key = (loader.location(), manifest.to_string());
        if let Some(hash) = self
            .model_hashes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Ok(hash.clone());
        }

        let hash = manifest::model_hash(loader, manifest)?;
        self.model_hashes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, hash.clone());
        Ok(hash)
    }
}
