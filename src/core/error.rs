//! Crate-wide error type.
//!
//! Every configuration failure is fatal: resolution stops at the first bad
//! value and nothing downstream ever sees a partial configuration.

use super::types::{ConfigKey, Environment};
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("environment '{0}' does not exist (expected one of Deployment, Dev, Test, Prod)")]
    UnknownEnvironment(String),

    #[error("the requested environment: {0} does not exist in local mappings")]
    EnvironmentNotConfigured(Environment),

    #[error("{environment} has no value for required key '{key}'")]
    MissingValue {
        environment: Environment,
        key: ConfigKey,
    },

    #[error(
        "invalid resource name prefix '{0}': resource names may only contain lowercase \
         alphanumeric characters and hyphens, and cannot contain leading or trailing hyphens"
    )]
    InvalidResourceNamePrefix(String),

    #[error("invalid logical id prefix '{0}': must start with a letter and contain only alphanumeric characters")]
    InvalidLogicalIdPrefix(String),

    #[error("invalid vpc_cidr for {environment}: '{value}' ({reason})")]
    InvalidCidr {
        environment: Environment,
        value: String,
        reason: String,
    },

    #[error("unrecognized tag category: '{0}'")]
    UnknownTagCategory(String),

    #[error("unknown configuration key: '{0}'")]
    UnknownConfigKey(String),

    #[error("logical id '{logical_id}' declared twice in stack {stack}")]
    DuplicateLogicalId { stack: String, logical_id: String },

    #[error("{0} is not a deployment target")]
    NotATarget(Environment),

    #[error("{environment} deploys to {region} but pipelines run in {pipeline_region}; cross-region targets are not supported")]
    CrossRegionTarget {
        environment: Environment,
        region: String,
        pipeline_region: String,
    },

    #[error("pipeline.branches has no branch for {0}")]
    MissingBranch(Environment),

    #[error("parameter store error for {path}: {message}")]
    ParameterStore { path: String, message: String },

    #[error("secret store error for {id}: {message}")]
    SecretStore { id: String, message: String },

    #[error("caller identity error: {0}")]
    CallerIdentity(String),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} validation error(s)")]
    Validation(usize),

    #[error("{0}")]
    Aborted(String),
}

impl Error {
    /// Wrap an I/O error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
