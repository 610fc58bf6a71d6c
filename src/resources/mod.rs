//! Resource declaration stacks.
//!
//! Each builder is a pure function from resolved configuration to a
//! [`Stack`]. Nothing here talks to AWS or touches the filesystem.

pub mod bootstrap;
pub mod identity;
pub mod network;
pub mod pipeline;
pub mod policy;
pub mod stage;
pub mod storage;

use crate::core::error::Result;
use crate::core::naming::Naming;
use crate::core::template::Stack;
use crate::core::types::{Environment, OutputKey};
use serde_json::Value;

/// Output logical id of a cross-stack output, e.g. `DevDataLakeVpcId`.
pub fn output_id(naming: &Naming, environment: Environment, key: OutputKey) -> String {
    naming.logical_id(environment, key.output_suffix())
}

/// Export name of a cross-stack output, e.g. `DevVpcId`.
pub fn export_name(environment: Environment, key: OutputKey) -> String {
    format!("{}{}", environment, key.parameter_suffix())
}

/// Declare a cross-stack output with its standard id, description and export.
pub(crate) fn add_cross_stack_output(
    stack: &mut Stack,
    naming: &Naming,
    environment: Environment,
    key: OutputKey,
    value: Value,
) -> Result<()> {
    stack.add_output(
        &output_id(naming, environment, key),
        value,
        Some(key.description()),
        Some(export_name(environment, key)),
    )
}
