//! Core types: environments, configuration keys, the `lakeform.yaml` schema,
//! cross-stack outputs, assembly manifests and provenance events.
//!
//! Every key set here is a closed enum. Nothing downstream looks values up by
//! free-form string, so an unknown key can only appear at a parse boundary.

use super::error::Error;
use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Environments
// ============================================================================

/// A fixed deployment target.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
pub enum Environment {
    Deployment,
    Dev,
    Test,
    Prod,
}

impl Environment {
    pub const ALL: [Environment; 4] = [Self::Deployment, Self::Dev, Self::Test, Self::Prod];

    /// Environments that receive a deploy stage and a pipeline.
    pub const TARGETS: [Environment; 3] = [Self::Dev, Self::Test, Self::Prod];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Deployment => "Deployment",
            Self::Dev => "Dev",
            Self::Test => "Test",
            Self::Prod => "Prod",
        }
    }

    /// Lowercase form used in physical resource names.
    pub fn lower(self) -> &'static str {
        match self {
            Self::Deployment => "deployment",
            Self::Dev => "dev",
            Self::Test => "test",
            Self::Prod => "prod",
        }
    }

    pub fn protection(self) -> Protection {
        match self {
            Self::Test | Self::Prod => Protection::Protected,
            Self::Deployment | Self::Dev => Protection::Unprotected,
        }
    }

    pub fn is_target(self) -> bool {
        self != Self::Deployment
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| Error::UnknownEnvironment(s.to_string()))
    }
}

/// Retention and deletion classification of an environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protection {
    Unprotected,
    Protected,
}

// ============================================================================
// Configuration keys
// ============================================================================

/// A configuration value an environment may need.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum ConfigKey {
    AccountId,
    Region,
    VpcCidr,
    GithubRepositoryOwnerName,
    GithubRepositoryName,
    LogicalIdPrefix,
    ResourceNamePrefix,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 7] = [
        Self::AccountId,
        Self::Region,
        Self::VpcCidr,
        Self::GithubRepositoryOwnerName,
        Self::GithubRepositoryName,
        Self::LogicalIdPrefix,
        Self::ResourceNamePrefix,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::AccountId => "account_id",
            Self::Region => "region",
            Self::VpcCidr => "vpc_cidr",
            Self::GithubRepositoryOwnerName => "github_repository_owner_name",
            Self::GithubRepositoryName => "github_repository_name",
            Self::LogicalIdPrefix => "logical_id_prefix",
            Self::ResourceNamePrefix => "resource_name_prefix",
        }
    }

    /// Last segment of the key's parameter store path.
    pub fn parameter_suffix(self) -> &'static str {
        match self {
            Self::AccountId => "AccountId",
            Self::Region => "Region",
            Self::VpcCidr => "VpcCidr",
            Self::GithubRepositoryOwnerName => "GitHubRepositoryOwnerName",
            Self::GithubRepositoryName => "GitHubRepositoryName",
            Self::LogicalIdPrefix => "LogicalIdPrefix",
            Self::ResourceNamePrefix => "ResourceNamePrefix",
        }
    }

    /// Keys that must resolve to a non-empty value for an environment.
    pub fn required_for(environment: Environment) -> &'static [ConfigKey] {
        const DEPLOYMENT: [ConfigKey; 6] = [
            ConfigKey::AccountId,
            ConfigKey::Region,
            ConfigKey::GithubRepositoryOwnerName,
            ConfigKey::GithubRepositoryName,
            ConfigKey::LogicalIdPrefix,
            ConfigKey::ResourceNamePrefix,
        ];
        const TARGET: [ConfigKey; 3] = [ConfigKey::AccountId, ConfigKey::Region, ConfigKey::VpcCidr];
        match environment {
            Environment::Deployment => &DEPLOYMENT,
            _ => &TARGET,
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfigKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| Error::UnknownConfigKey(s.to_string()))
    }
}

/// How configuration values are obtained. Chosen once per invocation.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Literal values from the `environments` table of lakeform.yaml
    #[default]
    Local,
    /// Every value looked up under its parameter store path
    ParameterStore,
}

// ============================================================================
// lakeform.yaml
// ============================================================================

/// Root configuration file.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct LakeformConfig {
    /// Schema version (must be "1.0")
    pub version: String,

    /// Optional description
    #[serde(default)]
    pub description: Option<String>,

    /// Root of every parameter and secret path
    #[serde(default = "default_namespace")]
    pub parameter_namespace: String,

    /// Value resolution strategy
    #[serde(default)]
    pub resolution: Resolution,

    /// Static per-environment values
    #[serde(default)]
    pub environments: BTreeMap<Environment, EnvironmentValues>,

    /// Pipeline settings
    #[serde(default)]
    pub pipeline: PipelineSettings,
}

fn default_namespace() -> String {
    "/DataLake".to_string()
}

/// Literal configuration values for one environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct EnvironmentValues {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vpc_cidr: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_repository_owner_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_repository_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logical_id_prefix: Option<String>,

    /// Lowercase alphanumerics and internal hyphens only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_name_prefix: Option<String>,
}

impl EnvironmentValues {
    pub fn get(&self, key: ConfigKey) -> Option<&str> {
        let value = match key {
            ConfigKey::AccountId => &self.account_id,
            ConfigKey::Region => &self.region,
            ConfigKey::VpcCidr => &self.vpc_cidr,
            ConfigKey::GithubRepositoryOwnerName => &self.github_repository_owner_name,
            ConfigKey::GithubRepositoryName => &self.github_repository_name,
            ConfigKey::LogicalIdPrefix => &self.logical_id_prefix,
            ConfigKey::ResourceNamePrefix => &self.resource_name_prefix,
        };
        value.as_deref()
    }
}

/// Pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct PipelineSettings {
    /// Source branch watched by each environment's pipeline
    #[serde(default = "default_branches")]
    pub branches: BTreeMap<Environment, String>,

    /// CodeBuild image used by the synth and sync projects
    #[serde(default = "default_build_image")]
    pub build_image: String,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            branches: default_branches(),
            build_image: default_build_image(),
        }
    }
}

fn default_branches() -> BTreeMap<Environment, String> {
    BTreeMap::from([
        (Environment::Dev, "main".to_string()),
        (Environment::Test, "test".to_string()),
        (Environment::Prod, "production".to_string()),
    ])
}

fn default_build_image() -> String {
    "aws/codebuild/standard:7.0".to_string()
}

// ============================================================================
// Cross-stack outputs
// ============================================================================

/// A value one deploy produces and later stages read back from the
/// parameter store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputKey {
    VpcId,
    AvailabilityZones,
    SubnetIds,
    RouteTables,
    SharedSecurityGroupId,
    S3KmsKey,
    S3AccessLogBucket,
    S3RawBucket,
    S3ConformedBucket,
    S3PurposeBuiltBucket,
    CrossAccountDynamoDbRole,
}

impl OutputKey {
    pub const ALL: [OutputKey; 11] = [
        Self::VpcId,
        Self::AvailabilityZones,
        Self::SubnetIds,
        Self::RouteTables,
        Self::SharedSecurityGroupId,
        Self::S3KmsKey,
        Self::S3AccessLogBucket,
        Self::S3RawBucket,
        Self::S3ConformedBucket,
        Self::S3PurposeBuiltBucket,
        Self::CrossAccountDynamoDbRole,
    ];

    /// Suffix of the CloudFormation output logical id.
    pub fn output_suffix(self) -> &'static str {
        match self {
            Self::VpcId => "VpcId",
            Self::AvailabilityZones => "VpcAvailabilityZones",
            Self::SubnetIds => "VpcPrivateSubnets",
            Self::RouteTables => "VpcRouteTables",
            Self::SharedSecurityGroupId => "SharedSecurityGroupId",
            Self::S3KmsKey => "KmsKeyArn",
            Self::S3AccessLogBucket => "AccessLogsBucketName",
            Self::S3RawBucket => "RawBucketName",
            Self::S3ConformedBucket => "ConformedBucketName",
            Self::S3PurposeBuiltBucket => "PurposeBuiltBucketName",
            Self::CrossAccountDynamoDbRole => "CrossAccountDynamoDbRoleArn",
        }
    }

    /// Last segment of the parameter path and of the export name.
    pub fn parameter_suffix(self) -> &'static str {
        match self {
            Self::VpcId => "VpcId",
            Self::AvailabilityZones => "AvailabilityZones",
            Self::SubnetIds => "SubnetIds",
            Self::RouteTables => "RouteTables",
            Self::SharedSecurityGroupId => "SharedSecurityGroupId",
            Self::S3KmsKey => "S3KmsKeyArn",
            Self::S3AccessLogBucket => "S3AccessLogBucket",
            Self::S3RawBucket => "RawBucketName",
            Self::S3ConformedBucket => "ConformedBucketName",
            Self::S3PurposeBuiltBucket => "PurposeBuiltBucketName",
            Self::CrossAccountDynamoDbRole => "CrossAccountDynamoDbRoleArn",
        }
    }

    /// Build variable carrying the value into the sync action.
    pub fn variable(self) -> &'static str {
        match self {
            Self::VpcId => "VPC_ID",
            Self::AvailabilityZones => "AVAILABILITY_ZONES",
            Self::SubnetIds => "PRIVATE_SUBNETS",
            Self::RouteTables => "ROUTE_TABLES",
            Self::SharedSecurityGroupId => "SECURITY_GROUP_ID",
            Self::S3KmsKey => "KMS_KEY",
            Self::S3AccessLogBucket => "ACCESS_LOGS_BUCKET_NAME",
            Self::S3RawBucket => "RAW_BUCKET_NAME",
            Self::S3ConformedBucket => "CONFORMED_BUCKET_NAME",
            Self::S3PurposeBuiltBucket => "PURPOSE_BUILT_BUCKET_NAME",
            Self::CrossAccountDynamoDbRole => "CROSS_ACCOUNT_DYNAMODB_ROLE",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::VpcId => "Id for Data Lake VPC",
            Self::AvailabilityZones => "Names for Data Lake VPC Availability Zones",
            Self::SubnetIds => "Comma-separated Ids for Data Lake VPC Private Subnets",
            Self::RouteTables => "Comma-separated Ids for Data Lake VPC Private Subnets Route Tables",
            Self::SharedSecurityGroupId => "Id for Shared SecurityGroup with self-referencing ingress rule",
            Self::S3KmsKey => "Arn for KMS Key used for securing S3 Buckets",
            Self::S3AccessLogBucket => "Name of S3 Access Logs bucket",
            Self::S3RawBucket => "Name of Raw bucket",
            Self::S3ConformedBucket => "Name of Conformed bucket",
            Self::S3PurposeBuiltBucket => "Name of Purpose Built bucket",
            Self::CrossAccountDynamoDbRole => "ARN of the cross account DynamoDb Role",
        }
    }
}

// ============================================================================
// Tags
// ============================================================================

/// The closed set of label categories attached to every stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagCategory {
    CostCenter,
    Environment,
    Team,
    Application,
}

impl TagCategory {
    pub const ALL: [TagCategory; 4] = [
        Self::CostCenter,
        Self::Environment,
        Self::Team,
        Self::Application,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::CostCenter => "cost-center",
            Self::Environment => "environment",
            Self::Team => "team",
            Self::Application => "application",
        }
    }
}

impl FromStr for TagCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| Error::UnknownTagCategory(s.to_string()))
    }
}

// ============================================================================
// Synthesis
// ============================================================================

/// What a synth run declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "environment", rename_all = "snake_case")]
pub enum SynthMode {
    /// A single empty stack, no configuration read
    Bootstrap,
    /// The deploy stage stacks of one target environment
    Direct(Environment),
    /// One pipeline per target environment plus every stack they deploy
    Pipeline,
}

impl SynthMode {
    pub fn from_flags(bootstrap: bool, environment: Option<Environment>) -> Self {
        match (bootstrap, environment) {
            (true, _) => Self::Bootstrap,
            (false, Some(env)) => Self::Direct(env),
            (false, None) => Self::Pipeline,
        }
    }
}

impl fmt::Display for SynthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bootstrap => write!(f, "bootstrap"),
            Self::Direct(env) => write!(f, "direct ({})", env),
            Self::Pipeline => write!(f, "pipeline"),
        }
    }
}

// ============================================================================
// Assembly manifest
// ============================================================================

/// Written next to the templates after every synth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblyManifest {
    pub schema: String,
    pub mode: SynthMode,
    pub generated_at: String,
    pub generator: String,
    pub stacks: IndexMap<String, StackManifest>,
}

/// Per-stack manifest entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackManifest {
    /// `aws://{account}/{region}`, or `aws://unknown-account/unknown-region`
    pub environment: String,
    pub template_file: String,
    pub template_hash: String,
    #[serde(default)]
    pub tags: IndexMap<String, String>,
    /// Logical id → BLAKE3 of the resource declaration
    #[serde(default)]
    pub resources: IndexMap<String, String>,
}

// ============================================================================
// Diff
// ============================================================================

/// Change to a resource between two syntheses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanAction {
    Create,
    Update,
    Destroy,
    NoOp,
}

impl fmt::Display for PlanAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "CREATE"),
            Self::Update => write!(f, "UPDATE"),
            Self::Destroy => write!(f, "DESTROY"),
            Self::NoOp => write!(f, "NO-OP"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlannedChange {
    pub stack: String,
    pub logical_id: String,
    pub action: PlanAction,
}

#[derive(Debug, Clone, Default)]
pub struct DiffPlan {
    pub changes: Vec<PlannedChange>,
    pub to_create: u32,
    pub to_update: u32,
    pub to_destroy: u32,
    pub unchanged: u32,
}

impl DiffPlan {
    pub fn has_changes(&self) -> bool {
        self.to_create + self.to_update + self.to_destroy > 0
    }
}

// ============================================================================
// Provenance events
// ============================================================================

/// Event appended to `events.jsonl` in the assembly directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProvenanceEvent {
    SynthStarted {
        run_id: String,
        mode: String,
        lakeform_version: String,
    },
    StackSynthesized {
        run_id: String,
        stack: String,
        resources: u32,
        hash: String,
    },
    SynthCompleted {
        run_id: String,
        stacks: u32,
        total_seconds: f64,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimestampedEvent {
    pub ts: String,
    #[serde(flatten)]
    pub event: ProvenanceEvent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_parse() {
        assert_eq!("Dev".parse::<Environment>().unwrap(), Environment::Dev);
        assert_eq!(
            "Deployment".parse::<Environment>().unwrap(),
            Environment::Deployment
        );
    }

    #[test]
    fn test_environment_staging_does_not_exist() {
        let err = "Staging".parse::<Environment>().unwrap_err();
        assert!(matches!(err, Error::UnknownEnvironment(ref s) if s == "Staging"));
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_environment_parse_is_case_sensitive() {
        assert!("dev".parse::<Environment>().is_err());
    }

    #[test]
    fn test_environment_protection() {
        assert_eq!(Environment::Dev.protection(), Protection::Unprotected);
        assert_eq!(Environment::Test.protection(), Protection::Protected);
        assert_eq!(Environment::Prod.protection(), Protection::Protected);
        assert_eq!(Environment::Deployment.protection(), Protection::Unprotected);
    }

    #[test]
    fn test_environment_lower() {
        assert_eq!(Environment::Prod.lower(), "prod");
        assert_eq!(Environment::Deployment.to_string(), "Deployment");
    }

    #[test]
    fn test_config_key_parse() {
        assert_eq!(
            "resource_name_prefix".parse::<ConfigKey>().unwrap(),
            ConfigKey::ResourceNamePrefix
        );
        assert!(matches!(
            "vpc_id".parse::<ConfigKey>(),
            Err(Error::UnknownConfigKey(_))
        ));
    }

    #[test]
    fn test_required_keys() {
        let deployment = ConfigKey::required_for(Environment::Deployment);
        assert!(deployment.contains(&ConfigKey::ResourceNamePrefix));
        assert!(!deployment.contains(&ConfigKey::VpcCidr));
        for env in Environment::TARGETS {
            assert_eq!(
                ConfigKey::required_for(env),
                &[ConfigKey::AccountId, ConfigKey::Region, ConfigKey::VpcCidr]
            );
        }
    }

    #[test]
    fn test_tag_category_closed_set() {
        for c in TagCategory::ALL {
            assert_eq!(c.as_str().parse::<TagCategory>().unwrap(), c);
        }
        assert!(matches!(
            "owner".parse::<TagCategory>(),
            Err(Error::UnknownTagCategory(_))
        ));
    }

    #[test]
    fn test_config_parse_defaults() {
        let yaml = r#"
version: "1.0"
environments:
  Dev:
    account_id: "111"
    region: us-east-2
"#;
        let config: LakeformConfig = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(config.parameter_namespace, "/DataLake");
        assert_eq!(config.resolution, Resolution::Local);
        assert_eq!(config.pipeline.branches[&Environment::Prod], "production");
        let dev = &config.environments[&Environment::Dev];
        assert_eq!(dev.get(ConfigKey::AccountId), Some("111"));
        assert_eq!(dev.get(ConfigKey::VpcCidr), None);
    }

    #[test]
    fn test_config_rejects_unknown_environment() {
        let yaml = r#"
version: "1.0"
environments:
  Staging:
    region: us-east-2
"#;
        assert!(serde_yaml_ng::from_str::<LakeformConfig>(yaml).is_err());
    }

    #[test]
    fn test_config_rejects_unknown_key() {
        let yaml = r#"
version: "1.0"
environments:
  Dev:
    vpc_id: vpc-123
"#;
        assert!(serde_yaml_ng::from_str::<LakeformConfig>(yaml).is_err());
    }

    #[test]
    fn test_output_keys_have_distinct_variables() {
        let mut vars: Vec<_> = OutputKey::ALL.iter().map(|k| k.variable()).collect();
        vars.sort();
        vars.dedup();
        assert_eq!(vars.len(), OutputKey::ALL.len());
    }

    #[test]
    fn test_synth_mode_from_flags() {
        assert_eq!(SynthMode::from_flags(true, Some(Environment::Dev)), SynthMode::Bootstrap);
        assert_eq!(
            SynthMode::from_flags(false, Some(Environment::Test)),
            SynthMode::Direct(Environment::Test)
        );
        assert_eq!(SynthMode::from_flags(false, None), SynthMode::Pipeline);
    }

    #[test]
    fn test_synth_mode_serde() {
        let json = serde_json::to_string(&SynthMode::Direct(Environment::Dev)).unwrap();
        assert_eq!(json, r#"{"kind":"direct","environment":"Dev"}"#);
        let json = serde_json::to_string(&SynthMode::Pipeline).unwrap();
        assert_eq!(json, r#"{"kind":"pipeline"}"#);
    }

    #[test]
    fn test_provenance_event_serde() {
        let event = ProvenanceEvent::SynthStarted {
            run_id: "r-abc".to_string(),
            mode: "pipeline".to_string(),
            lakeform_version: "0.1.0".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"synth_started\""));
        assert!(json.contains("\"run_id\":\"r-abc\""));
    }

    #[test]
    fn test_plan_action_display() {
        assert_eq!(PlanAction::Create.to_string(), "CREATE");
        assert_eq!(PlanAction::NoOp.to_string(), "NO-OP");
    }
}
