//! Tag applier.
//!
//! Four tags, keyed under the resource name prefix, go on every stack and on
//! every resource whose type carries a `Tags` list.

use super::error::Result;
use super::naming::Naming;
use super::template::Stack;
use super::types::{Environment, TagCategory};
use serde_json::{json, Value};

/// Resource types that accept a `Tags: [{Key, Value}]` property.
const TAGGABLE: &[&str] = &[
    "AWS::EC2::VPC",
    "AWS::EC2::Subnet",
    "AWS::EC2::RouteTable",
    "AWS::EC2::InternetGateway",
    "AWS::EC2::EIP",
    "AWS::EC2::NatGateway",
    "AWS::EC2::SecurityGroup",
    "AWS::KMS::Key",
    "AWS::S3::Bucket",
    "AWS::IAM::Role",
    "AWS::CodeBuild::Project",
    "AWS::CodePipeline::Pipeline",
];

pub fn is_taggable(resource_type: &str) -> bool {
    TAGGABLE.contains(&resource_type)
}

/// Key and value of one tag category.
pub fn tag_for(category: TagCategory, environment: Environment, naming: &Naming) -> (String, String) {
    let key = format!("{}:{}", naming.resource_name_prefix, category.as_str());
    let value = match category {
        TagCategory::CostCenter | TagCategory::Application => {
            format!("{}Infrastructure", naming.logical_id_prefix)
        }
        TagCategory::Environment => environment.to_string(),
        TagCategory::Team => format!("{}Admin", naming.logical_id_prefix),
    };
    (key, value)
}

/// Tag by category name, as read from the command line.
pub fn tag_named(name: &str, environment: Environment, naming: &Naming) -> Result<(String, String)> {
    let category: TagCategory = name.parse()?;
    Ok(tag_for(category, environment, naming))
}

/// All four tags in category order.
pub fn tags(environment: Environment, naming: &Naming) -> Vec<(String, String)> {
    TagCategory::ALL
        .into_iter()
        .map(|c| tag_for(c, environment, naming))
        .collect()
}

/// Attach every tag to the stack and its taggable resources. Existing keys
/// are replaced in place, so tagging twice changes nothing.
pub fn tag(stack: &mut Stack, environment: Environment, naming: &Naming) {
    let tags = tags(environment, naming);
    for (key, value) in &tags {
        stack.tags.insert(key.clone(), value.clone());
    }
    for resource in stack.template.resources.values_mut() {
        if !is_taggable(&resource.resource_type) {
            continue;
        }
        let list = resource
            .properties
            .entry("Tags")
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(items) = list {
            merge(items, &tags);
        }
    }
}

fn merge(items: &mut Vec<Value>, tags: &[(String, String)]) {
    for (key, value) in tags {
        let existing = items
            .iter_mut()
            .find(|item| item.get("Key").and_then(Value::as_str) == Some(key.as_str()));
        match existing {
            Some(item) => item["Value"] = Value::String(value.clone()),
            None => items.push(json!({ "Key": key, "Value": value })),
        }
    }
}
