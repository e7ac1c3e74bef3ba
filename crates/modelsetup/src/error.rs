//! Model setup error types.
//!
//! Every variant except [`SetupError::RemoteConflict`] aborts the run as soon
//! as it is raised. A conflict on create is recovered once by looking the
//! entity up; `RemoteConflict` is what surfaces when that lookup fails too.

use modelsetup_client::{ApiError, HttpMethod};
use thiserror::Error;

/// Result alias for model setup operations.
pub type SetupResult<T> = Result<T, SetupError>;

/// One failed job of a child batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobFailure {
    /// Display identity of the child entity.
    pub entity: String,
    /// Rendered error.
    pub error: String,
}

impl std::fmt::Display for JobFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.entity, self.error)
    }
}

/// Errors raised while reconciling a model against the API.
#[derive(Debug, Error)]
pub enum SetupError {
    /// The entity config endpoint did not return a config for the type.
    #[error("entity config not found for {entity_type} (HTTP {status})")]
    ConfigNotFound { entity_type: String, status: u16 },

    /// The entity config was returned but could not be understood.
    #[error("invalid entity config for {entity_type}: {message}")]
    InvalidEntityConfig {
        entity_type: String,
        message: String,
    },

    /// A URI template still had placeholders after substitution.
    #[error("could not replace all variables in URI template {template}: {uri}")]
    TemplateResolution { template: String, uri: String },

    /// A create raced with another writer and the recovery lookup failed as well.
    ///
    /// Carries the original create error.
    #[error("[{run_label}] creating {entity_type} at {uri} conflicted and recovery lookup failed: {source}")]
    RemoteConflict {
        entity_type: String,
        run_label: String,
        uri: String,
        #[source]
        source: ApiError,
    },

    /// A create conflicted, no lookup URI exists, and the entity has children
    /// that would reference an identity that will never exist.
    #[error("[{run_label}] error creating {entity_type} and cannot check for existence: {source}")]
    UnrecoverableConflict {
        entity_type: String,
        run_label: String,
        #[source]
        source: ApiError,
    },

    /// Any other failed API call.
    #[error("[{run_label}] {entity_type} request to {uri} failed: {source}")]
    Remote {
        entity_type: String,
        run_label: String,
        uri: String,
        #[source]
        source: ApiError,
    },

    /// A lookup answered with something other than 200 or 404.
    #[error("[{run_label}] unexpected HTTP {status} looking up {entity_type} at {uri}")]
    UnexpectedStatus {
        entity_type: String,
        run_label: String,
        uri: String,
        status: u16,
    },

    /// One or more child jobs failed, or the batch timed out.
    #[error("[{run_label}] child batch of {entity_type} failed ({}", batch_summary(.total, .failures, .timed_out))]
    BatchFailure {
        entity_type: String,
        run_label: String,
        total: usize,
        failures: Vec<JobFailure>,
        timed_out: bool,
    },

    /// No ancestor in context has the type the parent field references.
    #[error("could not find parent (type={parent_type}, field={field}) of {entity_type}: {entity}")]
    MissingParentReference {
        parent_type: String,
        field: String,
        entity_type: String,
        entity: String,
    },

    /// Input data carries children the entity config does not declare.
    #[error("input data has {child_type} children but entity config for {entity_type} does not declare them")]
    UndeclaredChildren {
        entity_type: String,
        child_type: String,
    },

    /// The config names a verb that cannot write entities.
    #[error("invalid {operation} method for {entity_type}: {method}")]
    InvalidMethod {
        entity_type: String,
        operation: &'static str,
        method: HttpMethod,
    },

    /// The manifest or a model file could not be loaded.
    #[error("manifest error ({location}): {message}")]
    Manifest { location: String, message: String },

    /// JSON could not be parsed into entities.
    #[error("failed to parse {context}: {message}")]
    Parse { context: String, message: String },
}

fn batch_summary(total: &usize, failures: &[JobFailure], timed_out: &bool) -> String {
    let mut summary = format!("{} of {total} jobs failed", failures.len());
    if *timed_out {
        summary.push_str(", timed out");
    }
    summary.push(')');
    for failure in failures {
        summary.push_str(&format!("\n  - {failure}"));
    }
    summary
}

impl SetupError {
    /// Build a [`SetupError::Parse`] from any displayable error.
    pub fn parse(context: impl Into<String>, err: impl std::fmt::Display) -> Self {
        SetupError::Parse {
            context: context.into(),
            message: err.to_string(),
        }
    }
}
