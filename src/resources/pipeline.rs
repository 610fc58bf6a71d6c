//! Pipeline stack: one CodePipeline per target environment, living in the
//! deployment account.
//!
//! Stages run in order:
//! 1. Source: GitHub, polling the environment's branch
//! 2. Build: CodeBuild runs `lakeform synth` against the parameter store
//! 3. UpdatePipeline: redeploys this stack from the fresh assembly
//! 4. Deploy: one CloudFormation action per stage stack in the target
//!    account, then the parameter sync action at the next run order

use super::policy::{PolicyDocument, Principal, Statement};
use super::stage::DeployStage;
use crate::core::error::{Error, Result};
use crate::core::resolver::{DeploymentConfig, ResolvedEnvironment};
use crate::core::template::{get_att, join, ref_, CfnResource, RemovalPolicy, Stack};
use crate::core::types::Environment;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{json, Value};

/// Qualifier of the roles created by the account bootstrap toolchain.
pub const BOOTSTRAP_QUALIFIER: &str = "hnb659fds";

const SOURCE_ARTIFACT: &str = "Source";
const ASSEMBLY_ARTIFACT: &str = "CloudAssembly";
const ASSEMBLY_DIR: &str = "lakeform.out";
const CAPABILITIES: &str = "CAPABILITY_NAMED_IAM,CAPABILITY_AUTO_EXPAND";

/// Role CodePipeline assumes in `account` to run CloudFormation actions.
pub fn deploy_role_arn(account: &str, region: &str) -> String {
    format!(
        "arn:aws:iam::{account}:role/cdk-{BOOTSTRAP_QUALIFIER}-deploy-role-{account}-{region}"
    )
}

/// Role CloudFormation itself runs as in `account`.
pub fn exec_role_arn(account: &str, region: &str) -> String {
    format!(
        "arn:aws:iam::{account}:role/cdk-{BOOTSTRAP_QUALIFIER}-cfn-exec-role-{account}-{region}"
    )
}

/// Dynamic reference resolved by CloudFormation at deploy time.
pub fn secret_reference(secret_id: &str) -> String {
    format!("{{{{resolve:secretsmanager:{secret_id}}}}}")
}

// ============================================================================
// Buildspecs
// ============================================================================

#[derive(Debug, Serialize)]
struct BuildSpec {
    version: &'static str,
    phases: IndexMap<&'static str, Phase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    artifacts: Option<BuildArtifacts>,
}

#[derive(Debug, Serialize)]
struct Phase {
    commands: Vec<String>,
}

#[derive(Debug, Serialize)]
struct BuildArtifacts {
    #[serde(rename = "base-directory")]
    base_directory: &'static str,
    files: Vec<&'static str>,
}

/// Buildspec of the synth project: install lakeform from the source and
/// synthesize the assembly with values from the parameter store.
pub fn synth_buildspec() -> Result<String> {
    let spec = BuildSpec {
        version: "0.2",
        phases: IndexMap::from([
            (
                "install",
                Phase {
                    commands: vec![
                        "curl --proto '=https' --tlsv1.2 -sSf https://sh.rustup.rs | sh -s -- -y --profile minimal".to_string(),
                        "export PATH=\"$HOME/.cargo/bin:$PATH\"".to_string(),
                        "cargo install --locked --path .".to_string(),
                    ],
                },
            ),
            (
                "build",
                Phase {
                    commands: vec![format!(
                        "lakeform synth --resolution parameter-store --output {ASSEMBLY_DIR}"
                    )],
                },
            ),
        ]),
        artifacts: Some(BuildArtifacts {
            base_directory: ASSEMBLY_DIR,
            files: vec!["**/*"],
        }),
    };
    Ok(serde_yaml_ng::to_string(&spec)?)
}

/// Buildspec of the sync project: one `put-parameter --overwrite` per output,
/// reading each value from its build variable.
pub fn sync_buildspec(stage: &DeployStage) -> Result<String> {
    let commands = stage
        .outputs
        .iter()
        .map(|o| {
            format!(
                "aws ssm put-parameter --name '{}' --description '{}' --value \"${}\" --type String --overwrite",
                o.parameter_path,
                o.key.description(),
                o.key.variable()
            )
        })
        .collect();
    let spec = BuildSpec {
        version: "0.2",
        phases: IndexMap::from([("build", Phase { commands })]),
        artifacts: None,
    };
    Ok(serde_yaml_ng::to_string(&spec)?)
}

/// `EnvironmentVariables` of the sync action: each output read from the
/// variables namespace of the deploy action that produced it.
pub fn sync_environment_variables(stage: &DeployStage) -> Result<String> {
    let variables: Vec<Value> = stage
        .outputs
        .iter()
        .map(|o| {
            json!({
                "name": o.key.variable(),
                "type": "PLAINTEXT",
                "value": format!("#{{{}.{}}}", o.stack, o.output_id),
            })
        })
        .collect();
    Ok(serde_json::to_string(&variables)?)
}

// ============================================================================
// Stack
// ============================================================================

pub fn pipeline_stack(
    target: &ResolvedEnvironment,
    stage: &DeployStage,
    config: &DeploymentConfig,
) -> Result<Stack> {
    let env = target.environment;
    let naming = &config.naming;
    let deployment = &config.deployment;
    if target.region() != deployment.region() {
        return Err(Error::CrossRegionTarget {
            environment: env,
            region: target.region().to_string(),
            pipeline_region: deployment.region().to_string(),
        });
    }

    let branch = config.branch(env)?;
    let stack_name = naming.stack_name(env, "Pipeline");
    let mut stack = Stack::new(
        stack_name.clone(),
        Environment::Deployment,
        Some(deployment.account_id()),
        Some(deployment.region()),
        &format!("Infrastructure pipeline deploying the {env} environment"),
    );

    let ids = |suffix: &str| naming.logical_id(env, &format!("InfrastructurePipeline{suffix}"));
    let key = ids("ArtifactsKey");
    let bucket = ids("ArtifactsBucket");
    let pipeline_role = ids("Role");
    let synth_role = ids("SynthProjectRole");
    let sync_role = ids("SyncProjectRole");
    let synth_project = ids("SynthProject");
    let sync_project = ids("SyncProject");
    let pipeline = ids("");

    // Artifacts are encrypted with a key the target account may also use.
    stack.add_resource(
        &key,
        CfnResource::new(
            "AWS::KMS::Key",
            json!({
                "Description": format!("Artifact key of the {env} infrastructure pipeline"),
                "EnableKeyRotation": true,
                "KeyPolicy": PolicyDocument::new(vec![
                    Statement::allow(&["kms:*"])
                        .principal(Principal::account_root(deployment.account_id()))
                        .resource("*"),
                    Statement::allow(&["kms:Decrypt", "kms:DescribeKey", "kms:Encrypt", "kms:ReEncrypt*", "kms:GenerateDataKey*"])
                        .principal(Principal::account_root(target.account_id()))
                        .resource("*"),
                ])
                .to_value(),
            }),
        )
        .removal_policy(RemovalPolicy::Delete),
    )?;

    stack.add_resource(
        &bucket,
        CfnResource::new(
            "AWS::S3::Bucket",
            json!({
                "BucketEncryption": {
                    "ServerSideEncryptionConfiguration": [{
                        "ServerSideEncryptionByDefault": {
                            "SSEAlgorithm": "aws:kms",
                            "KMSMasterKeyID": get_att(&key, "Arn"),
                        },
                    }],
                },
                "PublicAccessBlockConfiguration": {
                    "BlockPublicAcls": true,
                    "BlockPublicPolicy": true,
                    "IgnorePublicAcls": true,
                    "RestrictPublicBuckets": true,
                },
            }),
        )
        .removal_policy(RemovalPolicy::Retain),
    )?;
    let bucket_arn = get_att(&bucket, "Arn");
    let bucket_objects = join("", vec![bucket_arn.clone(), json!("/*")]);
    stack.add_resource(
        &format!("{bucket}Policy"),
        CfnResource::new(
            "AWS::S3::BucketPolicy",
            json!({
                "Bucket": ref_(&bucket),
                "PolicyDocument": PolicyDocument::new(vec![
                    Statement::deny(&["s3:*"])
                        .sid("OnlyAllowSecureTransport")
                        .principal(Principal::any())
                        .resource(bucket_arn.clone())
                        .resource(bucket_objects.clone())
                        .condition(json!({ "Bool": { "aws:SecureTransport": "false" } })),
                    Statement::allow(&["s3:GetObject*", "s3:GetBucket*", "s3:List*"])
                        .sid("TargetAccountArtifactRead")
                        .principal(Principal::account_root(target.account_id()))
                        .resource(bucket_arn.clone())
                        .resource(bucket_objects.clone()),
                ])
                .to_value(),
            }),
        ),
    )?;

    let artifact_access = vec![
        Statement::allow(&["s3:GetObject*", "s3:GetBucket*", "s3:List*", "s3:PutObject*", "s3:DeleteObject*", "s3:Abort*"])
            .resource(bucket_arn.clone())
            .resource(bucket_objects.clone()),
        Statement::allow(&["kms:Decrypt", "kms:DescribeKey", "kms:Encrypt", "kms:ReEncrypt*", "kms:GenerateDataKey*"])
            .resource(get_att(&key, "Arn")),
    ];
    let build_logs = Statement::allow(&["logs:CreateLogGroup", "logs:CreateLogStream", "logs:PutLogEvents"])
        .resource(format!(
            "arn:aws:logs:{}:{}:log-group:/aws/codebuild/*",
            deployment.region(),
            deployment.account_id()
        ));
    let parameter_arn = format!(
        "arn:aws:ssm:{}:{}:parameter{}/*",
        deployment.region(),
        deployment.account_id(),
        config.namespace
    );

    let mut synth_statements = artifact_access.clone();
    synth_statements.push(build_logs.clone());
    synth_statements.push(
        Statement::allow(&["ssm:GetParameter", "ssm:GetParameters"])
            .sid("InfrastructurePipelineParameterStorePolicy")
            .resource(parameter_arn.clone()),
    );
    synth_statements.push(
        Statement::allow(&["ec2:DescribeAvailabilityZones", "ec2:DescribeVpcs"])
            .sid("InfrastructurePipelineEc2Policy")
            .resource("*"),
    );
    add_role(
        &mut stack,
        &synth_role,
        "codebuild.amazonaws.com",
        PolicyDocument::new(synth_statements),
    )?;

    let mut sync_statements = artifact_access.clone();
    sync_statements.push(build_logs);
    sync_statements.push(
        Statement::allow(&["ssm:PutParameter"])
            .sid("InfrastructurePipelineParameterStorePolicy")
            .resource(parameter_arn),
    );
    add_role(
        &mut stack,
        &sync_role,
        "codebuild.amazonaws.com",
        PolicyDocument::new(sync_statements),
    )?;

    let build_environment = json!({
        "Type": "LINUX_CONTAINER",
        "ComputeType": "BUILD_GENERAL1_SMALL",
        "Image": config.build_image,
    });
    stack.add_resource(
        &synth_project,
        CfnResource::new(
            "AWS::CodeBuild::Project",
            json!({
                "Name": naming.resource_name(env, "infrastructure-synth"),
                "ServiceRole": get_att(&synth_role, "Arn"),
                "EncryptionKey": get_att(&key, "Arn"),
                "Artifacts": { "Type": "CODEPIPELINE" },
                "Environment": build_environment,
                "Source": { "Type": "CODEPIPELINE", "BuildSpec": synth_buildspec()? },
            }),
        ),
    )?;
    stack.add_resource(
        &sync_project,
        CfnResource::new(
            "AWS::CodeBuild::Project",
            json!({
                "Name": naming.resource_name(env, "infrastructure-sync-parameters"),
                "ServiceRole": get_att(&sync_role, "Arn"),
                "EncryptionKey": get_att(&key, "Arn"),
                "Artifacts": { "Type": "CODEPIPELINE" },
                "Environment": build_environment,
                "Source": { "Type": "CODEPIPELINE", "BuildSpec": sync_buildspec(stage)? },
            }),
        ),
    )?;

    let deployment_deploy_role = deploy_role_arn(deployment.account_id(), deployment.region());
    let target_deploy_role = deploy_role_arn(target.account_id(), target.region());
    let mut pipeline_statements = artifact_access;
    pipeline_statements.push(
        Statement::allow(&["codebuild:StartBuild", "codebuild:BatchGetBuilds", "codebuild:StopBuild"])
            .resource(get_att(&synth_project, "Arn"))
            .resource(get_att(&sync_project, "Arn")),
    );
    pipeline_statements.push(
        Statement::allow(&["sts:AssumeRole"])
            .resource(deployment_deploy_role.clone())
            .resource(target_deploy_role.clone()),
    );
    add_role(
        &mut stack,
        &pipeline_role,
        "codepipeline.amazonaws.com",
        PolicyDocument::new(pipeline_statements),
    )?;

    let source = json!({
        "Name": "Source",
        "Actions": [{
            "Name": "GitHub",
            "ActionTypeId": { "Category": "Source", "Owner": "ThirdParty", "Provider": "GitHub", "Version": "1" },
            "Configuration": {
                "Owner": config.repository.owner,
                "Repo": config.repository.name,
                "Branch": branch,
                "OAuthToken": secret_reference(&config.github_token_secret()),
                "PollForSourceChanges": true,
            },
            "OutputArtifacts": [{ "Name": SOURCE_ARTIFACT }],
            "RunOrder": 1,
        }],
    });
    let build = json!({
        "Name": "Build",
        "Actions": [{
            "Name": "Synth",
            "ActionTypeId": { "Category": "Build", "Owner": "AWS", "Provider": "CodeBuild", "Version": "1" },
            "Configuration": { "ProjectName": ref_(&synth_project) },
            "InputArtifacts": [{ "Name": SOURCE_ARTIFACT }],
            "OutputArtifacts": [{ "Name": ASSEMBLY_ARTIFACT }],
            "RunOrder": 1,
        }],
    });
    let update = json!({
        "Name": "UpdatePipeline",
        "Actions": [cloudformation_action(
            "SelfMutate",
            &stack_name,
            None,
            &deployment_deploy_role,
            &exec_role_arn(deployment.account_id(), deployment.region()),
        )],
    });

    let target_exec_role = exec_role_arn(target.account_id(), target.region());
    let mut deploy_actions: Vec<Value> = stage
        .stacks
        .iter()
        .map(|s| {
            cloudformation_action(
                &format!("{}.Deploy", s.name),
                &s.name,
                Some(&s.name),
                &target_deploy_role,
                &target_exec_role,
            )
        })
        .collect();
    deploy_actions.push(json!({
        "Name": "SyncParametersWithOutputsAction",
        "ActionTypeId": { "Category": "Build", "Owner": "AWS", "Provider": "CodeBuild", "Version": "1" },
        "Configuration": {
            "ProjectName": ref_(&sync_project),
            "EnvironmentVariables": sync_environment_variables(stage)?,
        },
        "InputArtifacts": [{ "Name": SOURCE_ARTIFACT }],
        "RunOrder": 2,
    }));
    let deploy = json!({ "Name": env.to_string(), "Actions": deploy_actions });

    stack.add_resource(
        &pipeline,
        CfnResource::new(
            "AWS::CodePipeline::Pipeline",
            json!({
                "Name": naming.resource_name(env, "infrastructure-pipeline"),
                "RoleArn": get_att(&pipeline_role, "Arn"),
                "RestartExecutionOnUpdate": true,
                "ArtifactStore": {
                    "Type": "S3",
                    "Location": ref_(&bucket),
                    "EncryptionKey": { "Type": "KMS", "Id": get_att(&key, "Arn") },
                },
                "Stages": [source, build, update, deploy],
            }),
        )
        .depends_on(&pipeline_role),
    )?;

    Ok(stack)
}

fn add_role(stack: &mut Stack, id: &str, service: &str, policy: PolicyDocument) -> Result<()> {
    let trust = PolicyDocument::new(vec![
        Statement::allow(&["sts:AssumeRole"]).principal(Principal::service(service))
    ]);
    stack.add_resource(
        id,
        CfnResource::new(
            "AWS::IAM::Role",
            json!({
                "AssumeRolePolicyDocument": trust.to_value(),
                "Policies": [{ "PolicyName": "Default", "PolicyDocument": policy.to_value() }],
            }),
        ),
    )
}

/// CREATE_UPDATE action deploying `stack_name` from the assembly artifact.
/// With `namespace`, the stack outputs become `#{namespace.OutputId}`.
fn cloudformation_action(
    name: &str,
    stack_name: &str,
    namespace: Option<&str>,
    action_role: &str,
    exec_role: &str,
) -> Value {
    let mut action = json!({
        "Name": name,
        "ActionTypeId": { "Category": "Deploy", "Owner": "AWS", "Provider": "CloudFormation", "Version": "1" },
        "Configuration": {
            "ActionMode": "CREATE_UPDATE",
            "StackName": stack_name,
            "TemplatePath": format!("{ASSEMBLY_ARTIFACT}::{stack_name}.template.json"),
            "TemplateConfiguration": format!("{ASSEMBLY_ARTIFACT}::{stack_name}.template-config.json"),
            "Capabilities": CAPABILITIES,
            "RoleArn": exec_role,
        },
        "InputArtifacts": [{ "Name": ASSEMBLY_ARTIFACT }],
        "RoleArn": action_role,
        "RunOrder": 1,
    });
    if let Some(ns) = namespace {
        action["Namespace"] = json!(ns);
    }
    action
}
