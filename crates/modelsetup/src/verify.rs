//! Verify-mode reporting.
//!
//! With a [`VerifySink`] installed the engine never writes. Each entity it
//! reaches yields exactly one report: a "would create" when the lookup finds
//! nothing, or a difference report when it finds the entity.

use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use serde_json::Value;

use crate::entity::ModelEntity;
use crate::entity_config::EntityConfig;

/// Receiver of verify-mode reports.
pub trait VerifySink: Send + Sync {
    /// `entity` does not exist remotely and would be created.
    fn log_creation(&self, config: &EntityConfig, entity: &ModelEntity);

    /// `remote` exists; `desired` is what the model asks for.
    fn log_difference(&self, config: &EntityConfig, remote: &ModelEntity, desired: &ModelEntity);
}

/// One field whose remote value differs from the desired one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDiff {
    pub field: String,
    pub remote: Option<Value>,
    pub desired: Value,
}

/// A single verify-mode finding.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VerifyReport {
    Create {
        entity_type: String,
        entity: String,
        fields: Value,
    },
    Difference {
        entity_type: String,
        entity: String,
        diffs: Vec<FieldDiff>,
    },
}

impl VerifyReport {
    #[must_use]
    pub fn entity(&self) -> &str {
        match self {
            VerifyReport::Create { entity, .. } | VerifyReport::Difference { entity, .. } => entity,
        }
    }

    #[must_use]
    pub fn is_create(&self) -> bool {
        matches!(self, VerifyReport::Create { .. })
    }
}

/// Fields of `desired` whose value differs from `remote`.
#[must_use]
pub fn diff_fields(remote: &ModelEntity, desired: &ModelEntity) -> Vec<FieldDiff> {
    desired
        .fields()
        .iter()
        .filter(|(name, value)| remote.field(name) != Some(*value))
        .map(|(name, value)| FieldDiff {
            field: name.clone(),
            remote: remote.field(name).cloned(),
            desired: value.clone(),
        })
        .collect()
}

/// In-memory [`VerifySink`] collecting reports in arrival order.
#[derive(Debug, Default)]
pub struct ModelVerifyLog {
    reports: Mutex<Vec<VerifyReport>>,
}

impl ModelVerifyLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the reports so far.
    #[must_use]
    pub fn reports(&self) -> Vec<VerifyReport> {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn push(&self, report: VerifyReport) {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(report);
    }
}

impl VerifySink for ModelVerifyLog {
    fn log_creation(&self, config: &EntityConfig, entity: &ModelEntity) {
        tracing::info!(entity_type = %config.name, entity = %entity.id(), "Verify: would create");
        self.push(VerifyReport::Create {
            entity_type: entity.entity_type().to_string(),
            entity: entity.id(),
            fields: entity.to_json(),
        });
    }

    fn log_difference(&self, config: &EntityConfig, remote: &ModelEntity, desired: &ModelEntity) {
        let diffs = diff_fields(remote, desired);
        tracing::info!(
            entity_type = %config.name,
            entity = %desired.id(),
            differences = diffs.len(),
            "Verify: already exists"
        );
        self.push(VerifyReport::Difference {
            entity_type: desired.entity_type().to_string(),
            entity: desired.id(),
            diffs,
        });
    }
}
