//! lakeform.yaml parsing and validation.
//!
//! Parsing is strict (`deny_unknown_fields`). Validation collects every
//! structural problem instead of stopping at the first:
//! - Version must be "1.0"
//! - The parameter namespace must be an absolute path
//! - With local resolution, every environment carries every required key
//! - Local values must pass the same checks as resolved ones
//! - Every target environment has a pipeline branch

use super::error::{Error, Result};
use super::resolver::validate_value;
use super::types::*;
use std::path::Path;

/// Validation error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl ValidationError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Parse a lakeform.yaml file from disk.
pub fn parse_config_file(path: &Path) -> Result<LakeformConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    parse_config(&content)
}

/// Parse a lakeform.yaml from a string.
pub fn parse_config(yaml: &str) -> Result<LakeformConfig> {
    Ok(serde_yaml_ng::from_str(yaml)?)
}

/// Validate a parsed config. Returns a list of errors (empty = valid).
pub fn validate_config(config: &LakeformConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if config.version != "1.0" {
        errors.push(ValidationError::new(format!(
            "version must be \"1.0\", got \"{}\"",
            config.version
        )));
    }

    if !config.parameter_namespace.starts_with('/') {
        errors.push(ValidationError::new(format!(
            "parameter_namespace must start with '/', got \"{}\"",
            config.parameter_namespace
        )));
    }

    if config.resolution == Resolution::Local {
        for env in Environment::ALL {
            match config.environments.get(&env) {
                None => errors.push(ValidationError::new(format!(
                    "environment {} is missing from the local table",
                    env
                ))),
                Some(values) => validate_values(env, values, &mut errors),
            }
        }
    } else {
        // Values that are present still have to be well-formed.
        for (env, values) in &config.environments {
            for &key in ConfigKey::required_for(*env) {
                if let Some(value) = values.get(key) {
                    if let Err(e) = validate_value(*env, key, value) {
                        errors.push(ValidationError::new(e.to_string()));
                    }
                }
            }
        }
    }

    // Keys outside an environment's required set.
    for (env, values) in &config.environments {
        let required = ConfigKey::required_for(*env);
        for key in ConfigKey::ALL {
            if values.get(key).is_some() && !required.contains(&key) {
                errors.push(ValidationError::new(format!(
                    "{} does not use key '{}'",
                    env, key
                )));
            }
        }
    }

    for env in Environment::TARGETS {
        let branch = config.pipeline.branches.get(&env);
        if branch.is_none_or(|b| b.trim().is_empty()) {
            errors.push(ValidationError::new(format!(
                "pipeline.branches has no branch for {}",
                env
            )));
        }
    }
    if config.pipeline.branches.contains_key(&Environment::Deployment) {
        errors.push(ValidationError::new(
            "pipeline.branches must not name the Deployment environment",
        ));
    }

    if config.pipeline.build_image.trim().is_empty() {
        errors.push(ValidationError::new("pipeline.build_image must not be empty"));
    }

    errors
}

fn validate_values(env: Environment, values: &EnvironmentValues, errors: &mut Vec<ValidationError>) {
    for &key in ConfigKey::required_for(env) {
        let value = values.get(key).unwrap_or_default();
        if let Err(e) = validate_value(env, key, value) {
            errors.push(ValidationError::new(e.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixtures::SAMPLE as VALID;

    #[test]
    fn test_parse_valid() {
        let config = parse_config(VALID).unwrap();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.parameter_namespace, "/DataLake");
        assert_eq!(config.resolution, Resolution::Local);
        assert_eq!(config.environments.len(), 4);
        assert_eq!(
            config.pipeline.branches[&Environment::Prod],
            "production"
        );
        assert!(validate_config(&config).is_empty());
    }

    #[test]
    fn test_parse_rejects_unknown_environment() {
        let yaml = r#"
version: "1.0"
environments:
  Staging:
    account_id: "1"
"#;
        assert!(matches!(parse_config(yaml), Err(Error::Yaml(_))));
    }

    #[test]
    fn test_parse_rejects_unknown_field() {
        let yaml = r#"
version: "1.0"
environments:
  Dev:
    acount_id: "1"
"#;
        assert!(parse_config(yaml).is_err());
    }

    #[test]
    fn test_bad_version() {
        let mut config = parse_config(VALID).unwrap();
        config.version = "2.0".to_string();
        let errors = validate_config(&config);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("version"));
    }

    #[test]
    fn test_relative_namespace() {
        let mut config = parse_config(VALID).unwrap();
        config.parameter_namespace = "DataLake".to_string();
        assert!(validate_config(&config)[0].message.contains("parameter_namespace"));
    }

    #[test]
    fn test_local_resolution_needs_every_environment() {
        let mut config = parse_config(VALID).unwrap();
        config.environments.remove(&Environment::Test);
        let errors = validate_config(&config);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("Test"));
    }

    #[test]
    fn test_parameter_store_resolution_allows_empty_table() {
        let yaml = r#"
version: "1.0"
resolution: parameter_store
"#;
        let config = parse_config(yaml).unwrap();
        assert!(validate_config(&config).is_empty());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = parse_config(VALID).unwrap();
        let deployment = config.environments.get_mut(&Environment::Deployment).unwrap();
        deployment.resource_name_prefix = Some("My-Prefix-".to_string());
        deployment.logical_id_prefix = Some("9Lives".to_string());
        config
            .environments
            .get_mut(&Environment::Dev)
            .unwrap()
            .vpc_cidr = Some("10.0.0.0/30".to_string());
        let errors = validate_config(&config);
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_unused_key_flagged() {
        let mut config = parse_config(VALID).unwrap();
        config
            .environments
            .get_mut(&Environment::Dev)
            .unwrap()
            .logical_id_prefix = Some("DataLake".to_string());
        let errors = validate_config(&config);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("does not use key 'logical_id_prefix'"));
    }

    #[test]
    fn test_missing_branch() {
        let mut config = parse_config(VALID).unwrap();
        config.pipeline.branches.remove(&Environment::Test);
        let errors = validate_config(&config);
        assert!(errors[0].message.contains("no branch for Test"));
    }

    #[test]
    fn test_parse_config_file_missing() {
        let err = parse_config_file(Path::new("/nonexistent/lakeform.yaml")).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn test_parse_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lakeform.yaml");
        std::fs::write(&path, VALID).unwrap();
        assert!(parse_config_file(&path).is_ok());
    }
}
