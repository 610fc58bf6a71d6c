//! Bootstrap placeholder stack.
//!
//! Synthesized without reading any configuration. CloudFormation rejects a
//! template with no resources, so the stack holds one wait condition handle.

use crate::core::error::Result;
use crate::core::template::{CfnResource, Stack};
use crate::core::types::Environment;
use serde_json::Value;

pub const BOOTSTRAP_STACK: &str = "StackStub";

pub fn bootstrap_stack() -> Result<Stack> {
    let mut stack = Stack::new(
        BOOTSTRAP_STACK,
        Environment::Deployment,
        None,
        None,
        "Placeholder stack used while bootstrapping accounts",
    );
    stack.add_resource(
        "Placeholder",
        CfnResource::new("AWS::CloudFormation::WaitConditionHandle", Value::Null),
    )?;
    Ok(stack)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bootstrap_stack_is_environment_agnostic() {
        let stack = bootstrap_stack().unwrap();
        assert_eq!(stack.name, "StackStub");
        assert_eq!(stack.environment_uri(), "aws://unknown-account/unknown-region");
        assert_eq!(stack.template.resources.len(), 1);
        assert!(stack.template.outputs.is_empty());
        assert!(stack.tags.is_empty());
    }
}
