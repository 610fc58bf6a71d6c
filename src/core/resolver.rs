//! Configuration resolution.
//!
//! Turns an environment into a mapping of required keys to non-empty,
//! validated values, either from the local `environments` table or from the
//! parameter store. Both sources go through the same validation, so the
//! resolved result does not depend on where values came from.

use super::error::{Error, Result};
use super::naming::{self, Naming};
use super::types::{ConfigKey, Environment, LakeformConfig, OutputKey, Resolution};
use crate::transport::ParameterStore;
use indexmap::IndexMap;
use std::collections::BTreeMap;
use tracing::debug;

/// `{namespace}/{Environment}/{suffix}`, e.g. `/DataLake/Dev/AccountId`.
pub fn parameter_path(namespace: &str, environment: Environment, suffix: &str) -> String {
    format!(
        "{}/{}/{}",
        namespace.trim_end_matches('/'),
        environment,
        suffix
    )
}

/// Parameter path a configuration key is stored under.
pub fn config_parameter_path(namespace: &str, environment: Environment, key: ConfigKey) -> String {
    parameter_path(namespace, environment, key.parameter_suffix())
}

/// Parameter path a cross-stack output is published under.
pub fn output_parameter_path(namespace: &str, environment: Environment, key: OutputKey) -> String {
    parameter_path(namespace, environment, key.parameter_suffix())
}

/// Secret id of the GitHub OAuth token.
pub fn github_token_secret(namespace: &str) -> String {
    format!("{}/GitHubToken", namespace.trim_end_matches('/'))
}

/// Where configuration values come from.
pub trait ValueSource {
    fn lookup(&self, environment: Environment, key: ConfigKey) -> Result<Option<String>>;
}

/// Values from the static table in lakeform.yaml.
pub struct LocalValues<'a> {
    config: &'a LakeformConfig,
}

impl<'a> LocalValues<'a> {
    pub fn new(config: &'a LakeformConfig) -> Self {
        Self { config }
    }
}

impl ValueSource for LocalValues<'_> {
    fn lookup(&self, environment: Environment, key: ConfigKey) -> Result<Option<String>> {
        let values = self
            .config
            .environments
            .get(&environment)
            .ok_or(Error::EnvironmentNotConfigured(environment))?;
        Ok(values.get(key).map(str::to_string))
    }
}

/// Values looked up one by one under their parameter paths.
pub struct StoreValues<'a> {
    store: &'a dyn ParameterStore,
    namespace: &'a str,
}

impl<'a> StoreValues<'a> {
    pub fn new(store: &'a dyn ParameterStore, namespace: &'a str) -> Self {
        Self { store, namespace }
    }
}

impl ValueSource for StoreValues<'_> {
    fn lookup(&self, environment: Environment, key: ConfigKey) -> Result<Option<String>> {
        let path = config_parameter_path(self.namespace, environment, key);
        self.store.get_parameter(&path)
    }
}

/// Pick the value source for a resolution strategy.
pub fn value_source<'a>(
    resolution: Resolution,
    config: &'a LakeformConfig,
    store: Option<&'a dyn ParameterStore>,
) -> Result<Box<dyn ValueSource + 'a>> {
    match (resolution, store) {
        (Resolution::Local, _) => Ok(Box::new(LocalValues::new(config))),
        (Resolution::ParameterStore, Some(store)) => {
            Ok(Box::new(StoreValues::new(store, &config.parameter_namespace)))
        }
        (Resolution::ParameterStore, None) => Err(Error::ParameterStore {
            path: config.parameter_namespace.clone(),
            message: "no parameter store available".to_string(),
        }),
    }
}

/// Check one value against the rules for its key.
pub fn validate_value(environment: Environment, key: ConfigKey, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::MissingValue { environment, key });
    }
    match key {
        ConfigKey::ResourceNamePrefix => naming::validate_resource_name_prefix(value),
        ConfigKey::LogicalIdPrefix => naming::validate_logical_id_prefix(value),
        ConfigKey::VpcCidr => naming::validate_vpc_cidr(environment, value).map(|_| ()),
        _ => Ok(()),
    }
}

/// The resolved, validated values of one environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEnvironment {
    pub environment: Environment,
    values: BTreeMap<ConfigKey, String>,
}

impl ResolvedEnvironment {
    /// Build directly from literal values, validating them.
    pub fn from_values<'a>(
        environment: Environment,
        values: impl IntoIterator<Item = (ConfigKey, &'a str)>,
    ) -> Result<Self> {
        let required = ConfigKey::required_for(environment);
        let values: BTreeMap<ConfigKey, String> = values
            .into_iter()
            .filter(|(k, _)| required.contains(k))
            .map(|(k, v)| (k, v.to_string()))
            .collect();
        for &key in required {
            let value = values
                .get(&key)
                .ok_or(Error::MissingValue { environment, key })?;
            validate_value(environment, key, value)?;
        }
        Ok(Self {
            environment,
            values,
        })
    }

    /// Required keys only; keys an environment does not use never appear.
    pub fn get(&self, key: ConfigKey) -> Option<&str> {
        self.values.get(&key).map(String::as_str)
    }

    fn required(&self, key: ConfigKey) -> &str {
        // Construction guarantees every required key is present.
        self.values.get(&key).map(String::as_str).unwrap_or_default()
    }

    pub fn account_id(&self) -> &str {
        self.required(ConfigKey::AccountId)
    }

    pub fn region(&self) -> &str {
        self.required(ConfigKey::Region)
    }

    pub fn vpc_cidr(&self) -> &str {
        self.required(ConfigKey::VpcCidr)
    }

    /// Key/value view, keyed by the snake_case key names.
    pub fn to_mapping(&self) -> IndexMap<String, String> {
        self.values
            .iter()
            .map(|(k, v)| (k.as_str().to_string(), v.clone()))
            .collect()
    }
}

/// Resolve every required key of `environment`. The first missing, empty or
/// malformed value aborts the whole resolution.
pub fn resolve_environment(
    source: &dyn ValueSource,
    environment: Environment,
) -> Result<ResolvedEnvironment> {
    let mut values = BTreeMap::new();
    for &key in ConfigKey::required_for(environment) {
        let value = source
            .lookup(environment, key)?
            .ok_or(Error::MissingValue { environment, key })?;
        validate_value(environment, key, &value)?;
        debug!(%environment, %key, "resolved");
        values.insert(key, value);
    }
    Ok(ResolvedEnvironment {
        environment,
        values,
    })
}

/// Resolve by name; names outside the fixed enumeration do not exist.
pub fn resolve_named(source: &dyn ValueSource, name: &str) -> Result<ResolvedEnvironment> {
    let environment: Environment = name.parse()?;
    resolve_environment(source, environment)
}

/// GitHub repository the pipelines watch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    pub owner: String,
    pub name: String,
}

/// Everything a synth run needs, resolved once and passed by reference.
#[derive(Debug, Clone)]
pub struct DeploymentConfig {
    pub deployment: ResolvedEnvironment,
    pub targets: Vec<ResolvedEnvironment>,
    pub naming: Naming,
    pub repository: Repository,
    pub namespace: String,
    pub branches: BTreeMap<Environment, String>,
    pub build_image: String,
}

impl DeploymentConfig {
    pub fn target(&self, environment: Environment) -> Result<&ResolvedEnvironment> {
        self.targets
            .iter()
            .find(|t| t.environment == environment)
            .ok_or(Error::NotATarget(environment))
    }

    /// Branch a target environment's pipeline watches.
    pub fn branch(&self, environment: Environment) -> Result<&str> {
        self.branches
            .get(&environment)
            .map(String::as_str)
            .filter(|b| !b.trim().is_empty())
            .ok_or(Error::MissingBranch(environment))
    }

    pub fn github_token_secret(&self) -> String {
        github_token_secret(&self.namespace)
    }
}

/// Resolve the deployment environment plus the given targets.
pub fn resolve_deployment(
    config: &LakeformConfig,
    source: &dyn ValueSource,
    targets: &[Environment],
) -> Result<DeploymentConfig> {
    let deployment = resolve_environment(source, Environment::Deployment)?;
    let naming = Naming::new(
        deployment.required(ConfigKey::LogicalIdPrefix),
        deployment.required(ConfigKey::ResourceNamePrefix),
    )?;
    let repository = Repository {
        owner: deployment
            .required(ConfigKey::GithubRepositoryOwnerName)
            .to_string(),
        name: deployment.required(ConfigKey::GithubRepositoryName).to_string(),
    };

    let mut resolved_targets = Vec::with_capacity(targets.len());
    for &environment in targets {
        if !environment.is_target() {
            return Err(Error::NotATarget(environment));
        }
        resolved_targets.push(resolve_environment(source, environment)?);
    }

    Ok(DeploymentConfig {
        deployment,
        targets: resolved_targets,
        naming,
        repository,
        namespace: config.parameter_namespace.clone(),
        branches: config.pipeline.branches.clone(),
        build_image: config.pipeline.build_image.clone(),
    })
}
