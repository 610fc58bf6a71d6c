//! Shared test configuration.

use super::parser::parse_config;
use super::resolver::{resolve_deployment, DeploymentConfig, LocalValues};
use super::types::{Environment, LakeformConfig};

pub(crate) const SAMPLE: &str = r#"
version: "1.0"
description: "data lake infrastructure"
environments:
  Deployment:
    account_id: "999"
    region: us-east-2
    github_repository_owner_name: octo
    github_repository_name: lake
    logical_id_prefix: DataLake
    resource_name_prefix: data-lake
  Dev:
    account_id: "111"
    region: us-east-2
    vpc_cidr: 10.20.0.0/24
  Test:
    account_id: "222"
    region: us-east-2
    vpc_cidr: 10.10.0.0/24
  Prod:
    account_id: "333"
    region: us-east-2
    vpc_cidr: 10.0.0.0/24
"#;

pub(crate) fn sample_config() -> LakeformConfig {
    parse_config(SAMPLE).unwrap()
}

pub(crate) fn sample_deployment() -> DeploymentConfig {
    let config = sample_config();
    resolve_deployment(&config, &LocalValues::new(&config), &Environment::TARGETS).unwrap()
}
