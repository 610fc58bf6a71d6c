//! Storage stack: one KMS key plus the access-log and zone buckets.
//!
//! Protection-dependent settings come from a single [`StoragePolicy`] lookup
//! so dev and protected environments differ in exactly one place.

use super::add_cross_stack_output;
use super::policy::{PolicyDocument, Principal, Statement};
use crate::core::error::Result;
use crate::core::naming::Naming;
use crate::core::resolver::{DeploymentConfig, ResolvedEnvironment};
use crate::core::template::{get_att, join, ref_, CfnResource, RemovalPolicy, Stack};
use crate::core::types::{OutputKey, Protection};
use serde_json::{json, Value};

/// Retention and deletion rules for one protection class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoragePolicy {
    pub removal: RemovalPolicy,
    pub expiration_days: u32,
    pub noncurrent_expiration_days: u32,
    pub glacier_transition_days: Option<u32>,
    pub deny_bucket_deletion: bool,
}

impl StoragePolicy {
    pub fn for_protection(protection: Protection) -> Self {
        match protection {
            Protection::Unprotected => Self {
                removal: RemovalPolicy::Delete,
                expiration_days: 60,
                noncurrent_expiration_days: 30,
                glacier_transition_days: None,
                deny_bucket_deletion: false,
            },
            Protection::Protected => Self {
                removal: RemovalPolicy::Retain,
                expiration_days: 2555,
                noncurrent_expiration_days: 90,
                glacier_transition_days: Some(365),
                deny_bucket_deletion: true,
            },
        }
    }

    fn lifecycle(&self) -> Value {
        let mut rule = json!({
            "Status": "Enabled",
            "ExpirationInDays": self.expiration_days,
            "NoncurrentVersionExpiration": { "NoncurrentDays": self.noncurrent_expiration_days },
        });
        if let Some(days) = self.glacier_transition_days {
            rule["Transitions"] = json!([{ "StorageClass": "GLACIER", "TransitionInDays": days }]);
        }
        json!({ "Rules": [rule] })
    }
}

/// The data lake zones, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    Raw,
    Conformed,
    PurposeBuilt,
}

impl Zone {
    pub const ALL: [Zone; 3] = [Zone::Raw, Zone::Conformed, Zone::PurposeBuilt];

    fn logical_suffix(self) -> &'static str {
        match self {
            Self::Raw => "RawBucket",
            Self::Conformed => "ConformedBucket",
            Self::PurposeBuilt => "PurposeBuiltBucket",
        }
    }

    fn name_suffix(self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Conformed => "conformed",
            Self::PurposeBuilt => "purpose-built",
        }
    }

    fn output(self) -> OutputKey {
        match self {
            Self::Raw => OutputKey::S3RawBucket,
            Self::Conformed => OutputKey::S3ConformedBucket,
            Self::PurposeBuilt => OutputKey::S3PurposeBuiltBucket,
        }
    }
}

/// `{env}-{prefix}-{account}-{region}-{suffix}`
pub fn bucket_name(naming: &Naming, target: &ResolvedEnvironment, suffix: &str) -> String {
    naming.resource_name(
        target.environment,
        &format!("{}-{}-{}", target.account_id(), target.region(), suffix),
    )
}

const KEY_USAGE_ACTIONS: &[&str] = &[
    "kms:Encrypt",
    "kms:Decrypt",
    "kms:ReEncrypt*",
    "kms:GenerateDataKey*",
    "kms:DescribeKey",
];

pub fn storage_stack(target: &ResolvedEnvironment, config: &DeploymentConfig) -> Result<Stack> {
    let env = target.environment;
    let naming = &config.naming;
    let policy = StoragePolicy::for_protection(env.protection());

    let mut stack = Stack::new(
        naming.stack_name(env, "S3BucketZones"),
        env,
        Some(target.account_id()),
        Some(target.region()),
        "Data lake storage: KMS key, access-log bucket and zone buckets",
    );

    let key = naming.logical_id(env, "KmsKey");
    let key_policy = PolicyDocument::new(vec![
        Statement::allow(&["kms:*"])
            .principal(Principal::account_root(target.account_id()))
            .resource("*"),
        Statement::allow(KEY_USAGE_ACTIONS)
            .principal(Principal::Aws(json!([
                format!("arn:aws:iam::{}:root", target.account_id()),
                format!("arn:aws:iam::{}:root", config.deployment.account_id()),
            ])))
            .resource("*"),
    ]);
    stack.add_resource(
        &key,
        CfnResource::new(
            "AWS::KMS::Key",
            json!({
                "Description": "Key used for encrypting Data Lake S3 Buckets",
                "EnableKeyRotation": true,
                "KeyPolicy": key_policy.to_value(),
            }),
        )
        .removal_policy(policy.removal),
    )?;

    let access_logs = naming.logical_id(env, "AccessLogsBucket");
    let access_logs_name = bucket_name(naming, target, "access-logs");
    stack.add_resource(
        &access_logs,
        CfnResource::new(
            "AWS::S3::Bucket",
            json!({
                "BucketName": access_logs_name,
                "AccessControl": "LogDeliveryWrite",
                "BucketEncryption": encryption(&key),
                "PublicAccessBlockConfiguration": block_public_access(),
                "VersioningConfiguration": { "Status": "Enabled" },
                "OwnershipControls": { "Rules": [{ "ObjectOwnership": "BucketOwnerPreferred" }] },
            }),
        )
        .depends_on(&key)
        .removal_policy(RemovalPolicy::Retain),
    )?;
    add_bucket_policy(&mut stack, &access_logs, None)?;

    for zone in Zone::ALL {
        let id = naming.logical_id(env, zone.logical_suffix());
        let name = bucket_name(naming, target, zone.name_suffix());
        stack.add_resource(
            &id,
            CfnResource::new(
                "AWS::S3::Bucket",
                json!({
                    "BucketName": name,
                    "AccessControl": "Private",
                    "BucketEncryption": encryption(&key),
                    "PublicAccessBlockConfiguration": block_public_access(),
                    "VersioningConfiguration": { "Status": "Enabled" },
                    "OwnershipControls": { "Rules": [{ "ObjectOwnership": "ObjectWriter" }] },
                    "LifecycleConfiguration": policy.lifecycle(),
                    "LoggingConfiguration": {
                        "DestinationBucketName": ref_(&access_logs),
                        "LogFilePrefix": name,
                    },
                }),
            )
            .depends_on(&key)
            .depends_on(&access_logs)
            .removal_policy(policy.removal),
        )?;
        let deny_deletion = policy.deny_bucket_deletion.then_some(target.account_id());
        add_bucket_policy(&mut stack, &id, deny_deletion)?;
    }

    add_cross_stack_output(&mut stack, naming, env, OutputKey::S3KmsKey, get_att(&key, "Arn"))?;
    add_cross_stack_output(
        &mut stack,
        naming,
        env,
        OutputKey::S3AccessLogBucket,
        ref_(&access_logs),
    )?;
    for zone in Zone::ALL {
        let id = naming.logical_id(env, zone.logical_suffix());
        add_cross_stack_output(&mut stack, naming, env, zone.output(), ref_(&id))?;
    }

    Ok(stack)
}

fn encryption(key: &str) -> Value {
    json!({
        "ServerSideEncryptionConfiguration": [{
            "BucketKeyEnabled": true,
            "ServerSideEncryptionByDefault": {
                "SSEAlgorithm": "aws:kms",
                "KMSMasterKeyID": get_att(key, "Arn"),
            },
        }],
    })
}

fn block_public_access() -> Value {
    json!({
        "BlockPublicAcls": true,
        "BlockPublicPolicy": true,
        "IgnorePublicAcls": true,
        "RestrictPublicBuckets": true,
    })
}

/// Secure-transport deny on every bucket; user deletion deny when
/// `deny_deletion_for` names the owning account.
fn add_bucket_policy(stack: &mut Stack, bucket: &str, deny_deletion_for: Option<&str>) -> Result<()> {
    let bucket_arn = get_att(bucket, "Arn");
    let mut statements = vec![Statement::deny(&["s3:GetObject", "s3:PutObject"])
        .sid("OnlyAllowSecureTransport")
        .principal(Principal::any())
        .resource(join("", vec![bucket_arn.clone(), json!("/*")]))
        .condition(json!({ "Bool": { "aws:SecureTransport": "false" } }))];
    if let Some(account) = deny_deletion_for {
        statements.push(
            Statement::deny(&["s3:DeleteBucket"])
                .sid("BlockUserDeletionOfBucket")
                .principal(Principal::any())
                .resource(bucket_arn)
                .condition(json!({
                    "StringLike": { "aws:userId": format!("arn:aws:iam::{}:user/*", account) }
                })),
        );
    }
    stack.add_resource(
        &format!("{}Policy", bucket),
        CfnResource::new(
            "AWS::S3::BucketPolicy",
            json!({
                "Bucket": ref_(bucket),
                "PolicyDocument": PolicyDocument::new(statements).to_value(),
            }),
        ),
    )
}
