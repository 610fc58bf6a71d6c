//! Identity stack: the cross-account DynamoDB role.

use super::add_cross_stack_output;
use super::policy::{PolicyDocument, Principal, Statement};
use crate::core::error::Result;
use crate::core::resolver::{DeploymentConfig, ResolvedEnvironment};
use crate::core::template::{get_att, CfnResource, Stack};
use crate::core::types::OutputKey;
use serde_json::json;

/// Table and item operations the deployment account may perform.
pub const DYNAMODB_ACTIONS: &[&str] = &[
    "dynamodb:CreateTable",
    "dynamodb:DeleteTable",
    "dynamodb:DescribeTable",
    "dynamodb:UpdateTable",
    "dynamodb:ListTables",
    "dynamodb:TagResource",
    "dynamodb:GetItem",
    "dynamodb:PutItem",
    "dynamodb:UpdateItem",
    "dynamodb:DeleteItem",
    "dynamodb:BatchGetItem",
    "dynamodb:BatchWriteItem",
    "dynamodb:Query",
    "dynamodb:Scan",
];

pub fn identity_stack(target: &ResolvedEnvironment, config: &DeploymentConfig) -> Result<Stack> {
    let env = target.environment;
    let naming = &config.naming;
    let mut stack = Stack::new(
        naming.stack_name(env, "Iam"),
        env,
        Some(target.account_id()),
        Some(target.region()),
        "Data lake identity: cross-account DynamoDB role",
    );

    let role = naming.logical_id(env, "CrossAccountDynamoDbRole");
    let trust = PolicyDocument::new(vec![Statement::allow(&["sts:AssumeRole"])
        .principal(Principal::account_root(config.deployment.account_id()))]);
    let access = PolicyDocument::new(vec![Statement::allow(DYNAMODB_ACTIONS)
        .sid("DynamoDbPolicy")
        .resource(format!(
            "arn:aws:dynamodb:*:{}:table/*",
            target.account_id()
        ))]);

    stack.add_resource(
        &role,
        CfnResource::new(
            "AWS::IAM::Role",
            json!({
                "RoleName": naming.resource_name(env, "cross-account-dynamodb-role"),
                "Description": "Cross Account Role used for managing DynamoDb tables and their records.",
                "AssumeRolePolicyDocument": trust.to_value(),
                "Policies": [{
                    "PolicyName": "DynamoDbAccess",
                    "PolicyDocument": access.to_value(),
                }],
            }),
        ),
    )?;

    add_cross_stack_output(
        &mut stack,
        naming,
        env,
        OutputKey::CrossAccountDynamoDbRole,
        get_att(&role, "Arn"),
    )?;
    Ok(stack)
}
