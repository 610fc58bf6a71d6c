//! Naming rules: prefix validation, logical ids and physical resource names.

use super::error::{Error, Result};
use super::types::Environment;
use regex::Regex;
use std::net::Ipv4Addr;
use std::sync::LazyLock;

static RESOURCE_NAME_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9](?:[a-z0-9-]*[a-z0-9])?$").expect("valid regex"));

static LOGICAL_ID_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9]*$").expect("valid regex"));

/// Largest VPC prefix length (smallest block) still able to hold four subnets.
const MAX_VPC_PREFIX: u8 = 26;
const MIN_VPC_PREFIX: u8 = 16;

/// Lowercase alphanumerics and internal hyphens only.
pub fn validate_resource_name_prefix(prefix: &str) -> Result<()> {
    if RESOURCE_NAME_PREFIX.is_match(prefix) {
        Ok(())
    } else {
        Err(Error::InvalidResourceNamePrefix(prefix.to_string()))
    }
}

pub fn validate_logical_id_prefix(prefix: &str) -> Result<()> {
    if LOGICAL_ID_PREFIX.is_match(prefix) {
        Ok(())
    } else {
        Err(Error::InvalidLogicalIdPrefix(prefix.to_string()))
    }
}

/// Parse an IPv4 CIDR block sized for a VPC. Returns the prefix length.
pub fn validate_vpc_cidr(environment: Environment, value: &str) -> Result<u8> {
    let invalid = |reason: &str| Error::InvalidCidr {
        environment,
        value: value.to_string(),
        reason: reason.to_string(),
    };
    let (addr, len) = value
        .split_once('/')
        .ok_or_else(|| invalid("expected a.b.c.d/n"))?;
    let addr = addr
        .parse::<Ipv4Addr>()
        .map_err(|_| invalid("not an IPv4 address"))?;
    let len: u8 = len.parse().map_err(|_| invalid("prefix length is not a number"))?;
    if !(MIN_VPC_PREFIX..=MAX_VPC_PREFIX).contains(&len) {
        return Err(invalid(&format!(
            "prefix length must be between /{} and /{}",
            MIN_VPC_PREFIX, MAX_VPC_PREFIX
        )));
    }
    let mask = u32::MAX << (32 - u32::from(len));
    if u32::from(addr) & !mask != 0 {
        return Err(invalid("host bits are set"));
    }
    Ok(len)
}

/// Deployment-wide naming prefixes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Naming {
    pub logical_id_prefix: String,
    pub resource_name_prefix: String,
}

impl Naming {
    pub fn new(logical_id_prefix: &str, resource_name_prefix: &str) -> Result<Self> {
        validate_logical_id_prefix(logical_id_prefix)?;
        validate_resource_name_prefix(resource_name_prefix)?;
        Ok(Self {
            logical_id_prefix: logical_id_prefix.to_string(),
            resource_name_prefix: resource_name_prefix.to_string(),
        })
    }

    /// `{Environment}{LogicalIdPrefix}{suffix}`, e.g. `DevDataLakeRawBucket`.
    pub fn logical_id(&self, environment: Environment, suffix: &str) -> String {
        format!("{}{}{}", environment, self.logical_id_prefix, suffix)
    }

    /// `{environment}-{resource-name-prefix}-{suffix}`.
    pub fn resource_name(&self, environment: Environment, suffix: &str) -> String {
        format!(
            "{}-{}-{}",
            environment.lower(),
            self.resource_name_prefix,
            suffix
        )
    }

    pub fn stack_name(&self, environment: Environment, suffix: &str) -> String {
        self.logical_id(environment, &format!("Infrastructure{}", suffix))
    }
}
