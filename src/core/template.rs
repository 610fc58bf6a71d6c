//! CloudFormation template model and intrinsic function helpers.
//!
//! Resources and outputs are kept in insertion order so the same declaration
//! always serializes to the same bytes.

use super::error::{Error, Result};
use super::types::Environment;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

pub const TEMPLATE_FORMAT_VERSION: &str = "2010-09-09";

/// A CloudFormation template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Template {
    #[serde(rename = "AWSTemplateFormatVersion")]
    pub format_version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub resources: IndexMap<String, CfnResource>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub outputs: IndexMap<String, CfnOutput>,
}

impl Template {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            format_version: TEMPLATE_FORMAT_VERSION.to_string(),
            description: Some(description.into()),
            resources: IndexMap::new(),
            outputs: IndexMap::new(),
        }
    }
}

/// What CloudFormation does with a resource removed from the template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemovalPolicy {
    Retain,
    Delete,
}

/// A single resource declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CfnResource {
    #[serde(rename = "Type")]
    pub resource_type: String,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub properties: Map<String, Value>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_policy: Option<RemovalPolicy>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_replace_policy: Option<RemovalPolicy>,
}

impl CfnResource {
    /// Build a resource from a JSON object of properties.
    ///
    /// Non-object values are treated as "no properties".
    pub fn new(resource_type: &str, properties: Value) -> Self {
        let properties = match properties {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            resource_type: resource_type.to_string(),
            properties,
            depends_on: Vec::new(),
            deletion_policy: None,
            update_replace_policy: None,
        }
    }

    pub fn depends_on(mut self, logical_id: impl Into<String>) -> Self {
        self.depends_on.push(logical_id.into());
        self
    }

    /// Apply the same policy on deletion and on replacement.
    pub fn removal_policy(mut self, policy: RemovalPolicy) -> Self {
        self.deletion_policy = Some(policy);
        self.update_replace_policy = Some(policy);
        self
    }
}

/// A stack output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CfnOutput {
    pub value: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export: Option<Export>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Export {
    pub name: String,
}

/// A named template bound to an account and region.
#[derive(Debug, Clone, PartialEq)]
pub struct Stack {
    pub name: String,
    /// Environment the stack's tags describe
    pub environment: Environment,
    /// `None` for environment-agnostic stacks
    pub account: Option<String>,
    pub region: Option<String>,
    pub template: Template,
    pub tags: IndexMap<String, String>,
}

impl Stack {
    pub fn new(
        name: impl Into<String>,
        environment: Environment,
        account: Option<&str>,
        region: Option<&str>,
        description: &str,
    ) -> Self {
        Self {
            name: name.into(),
            environment,
            account: account.map(str::to_string),
            region: region.map(str::to_string),
            template: Template::new(description),
            tags: IndexMap::new(),
        }
    }

    /// Declare a resource. Logical ids are unique per stack.
    pub fn add_resource(&mut self, logical_id: &str, resource: CfnResource) -> Result<()> {
        if self.template.resources.contains_key(logical_id) {
            return Err(Error::DuplicateLogicalId {
                stack: self.name.clone(),
                logical_id: logical_id.to_string(),
            });
        }
        self.template
            .resources
            .insert(logical_id.to_string(), resource);
        Ok(())
    }

    /// Declare an output, optionally exported under `export_name`.
    pub fn add_output(
        &mut self,
        logical_id: &str,
        value: Value,
        description: Option<&str>,
        export_name: Option<String>,
    ) -> Result<()> {
        if self.template.outputs.contains_key(logical_id) {
            return Err(Error::DuplicateLogicalId {
                stack: self.name.clone(),
                logical_id: logical_id.to_string(),
            });
        }
        self.template.outputs.insert(
            logical_id.to_string(),
            CfnOutput {
                value,
                description: description.map(str::to_string),
                export: export_name.map(|name| Export { name }),
            },
        );
        Ok(())
    }

    /// `aws://{account}/{region}` as CloudFormation tooling prints it.
    pub fn environment_uri(&self) -> String {
        format!(
            "aws://{}/{}",
            self.account.as_deref().unwrap_or("unknown-account"),
            self.region.as_deref().unwrap_or("unknown-region")
        )
    }

    pub fn template_file(&self) -> String {
        format!("{}.template.json", self.name)
    }

    pub fn template_config_file(&self) -> String {
        format!("{}.template-config.json", self.name)
    }
}

// ============================================================================
// Intrinsic functions
// ============================================================================

pub fn ref_(logical_id: &str) -> Value {
    json!({ "Ref": logical_id })
}

pub fn get_att(logical_id: &str, attribute: &str) -> Value {
    json!({ "Fn::GetAtt": [logical_id, attribute] })
}

pub fn sub(template: &str) -> Value {
    json!({ "Fn::Sub": template })
}

pub fn join(delimiter: &str, values: Vec<Value>) -> Value {
    json!({ "Fn::Join": [delimiter, values] })
}

pub fn select(index: usize, list: Value) -> Value {
    json!({ "Fn::Select": [index.to_string(), list] })
}

pub fn get_azs() -> Value {
    json!({ "Fn::GetAZs": "" })
}

/// `Fn::Cidr` splitting `block` into `count` subnets with `host_bits` host bits.
pub fn cidr(block: Value, count: u32, host_bits: u8) -> Value {
    json!({ "Fn::Cidr": [block, count.to_string(), host_bits.to_string()] })
}
