//! CLI subcommands: synth, validate, diff, verify, configure,
//! configure-secrets, outputs, init, schema, completion.

use crate::core::error::{Error, Result};
use crate::core::resolver::{self, LocalValues};
use crate::core::synth::{self, CloudAssembly};
use crate::core::types::{
    ConfigKey, DiffPlan, Environment, LakeformConfig, OutputKey, PlanAction, Resolution, SynthMode,
};
use crate::core::{parser, planner, state};
use crate::transport::aws::AwsStores;
use crate::transport::{ParameterStore, SecretStore};
use crate::tripwire::drift;
use clap::{Args, CommandFactory, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "lakeform",
    version,
    about = "Multi-environment data lake infrastructure for AWS, synthesized to CloudFormation"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Selects what a synth run declares.
#[derive(Args, Debug, Clone, Default)]
pub struct ModeArgs {
    /// Declare only the bootstrap stack (reads no configuration).
    /// Any non-empty value selects bootstrap mode
    #[arg(
        long,
        env = "IS_BOOTSTRAP",
        num_args = 0..=1,
        default_missing_value = "true",
        value_name = "ANY"
    )]
    pub bootstrap: Option<String>,

    /// Declare one target environment's stacks directly instead of the pipelines
    #[arg(long, env = "DEPLOY_ENVIRONMENT")]
    pub environment: Option<String>,

    /// Override the resolution strategy set in lakeform.yaml
    #[arg(long, value_enum)]
    pub resolution: Option<Resolution>,

    /// Region of the parameter store (default: the Deployment region)
    #[arg(long)]
    pub region: Option<String>,
}

impl ModeArgs {
    pub fn is_bootstrap(&self) -> bool {
        self.bootstrap.as_deref().is_some_and(|v| !v.is_empty())
    }

    pub fn mode(&self) -> Result<SynthMode> {
        if self.is_bootstrap() {
            return Ok(SynthMode::Bootstrap);
        }
        let environment = match self
            .environment
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
        {
            Some(name) => Some(name.parse::<Environment>()?),
            None => None,
        };
        Ok(SynthMode::from_flags(false, environment))
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a starter lakeform.yaml
    Init {
        /// Directory to initialize (default: current)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Validate lakeform.yaml without contacting AWS
    Validate {
        /// Path to lakeform.yaml
        #[arg(short, long, default_value = "lakeform.yaml")]
        file: PathBuf,
    },

    /// Synthesize CloudFormation templates into the assembly directory
    Synth {
        /// Path to lakeform.yaml
        #[arg(short, long, default_value = "lakeform.yaml")]
        file: PathBuf,

        /// Assembly directory
        #[arg(short, long, default_value = "lakeform.out")]
        output: PathBuf,

        #[command(flatten)]
        mode: ModeArgs,
    },

    /// Compare a fresh synthesis with the last written assembly
    Diff {
        /// Path to lakeform.yaml
        #[arg(short, long, default_value = "lakeform.yaml")]
        file: PathBuf,

        /// Assembly directory
        #[arg(short, long, default_value = "lakeform.out")]
        output: PathBuf,

        #[command(flatten)]
        mode: ModeArgs,
    },

    /// Detect templates edited since they were synthesized
    Verify {
        /// Assembly directory
        #[arg(short, long, default_value = "lakeform.out")]
        output: PathBuf,

        /// Exit non-zero on any finding (for CI)
        #[arg(long)]
        strict: bool,
    },

    /// Push the local environment table to the parameter store
    Configure {
        /// Path to lakeform.yaml
        #[arg(short, long, default_value = "lakeform.yaml")]
        file: PathBuf,

        /// Push only this environment
        #[arg(short, long)]
        environment: Option<String>,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Store the GitHub token the pipelines authenticate with
    ConfigureSecrets {
        /// Path to lakeform.yaml
        #[arg(short, long, default_value = "lakeform.yaml")]
        file: PathBuf,

        /// GitHub OAuth token
        #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
        github_token: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Show the cross-stack outputs an environment has published
    Outputs {
        /// Path to lakeform.yaml
        #[arg(short, long, default_value = "lakeform.yaml")]
        file: PathBuf,

        /// Target environment (Dev, Test or Prod)
        #[arg(short, long)]
        environment: String,
    },

    /// Print the JSON schema of lakeform.yaml
    Schema,

    /// Generate shell completions
    Completion {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Dispatch a CLI command.
pub fn dispatch(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Init { path } => cmd_init(&path),
        Commands::Validate { file } => cmd_validate(&file),
        Commands::Synth { file, output, mode } => {
            let (synth_mode, config) = prepare(&file, &mode)?;
            with_store(config.as_ref(), mode.region.as_deref(), |store| {
                cmd_synth(synth_mode, config.as_ref(), &output, store)
            })
        }
        Commands::Diff { file, output, mode } => {
            let (synth_mode, config) = prepare(&file, &mode)?;
            with_store(config.as_ref(), mode.region.as_deref(), |store| {
                cmd_diff(synth_mode, config.as_ref(), &output, store).map(|_| ())
            })
        }
        Commands::Verify { output, strict } => cmd_verify(&output, strict).map(|_| ()),
        Commands::Configure {
            file,
            environment,
            yes,
        } => {
            let config = parser::parse_config_file(&file)?;
            let stores = AwsStores::connect(deployment_region(&config))?;
            cmd_configure(&config, environment.as_deref(), &stores, |writes| {
                if yes {
                    return Ok(true);
                }
                confirm(&format!(
                    "Write {} parameter(s) to account {}?",
                    writes.len(),
                    stores.caller_account()?
                ))
            })
        }
        Commands::ConfigureSecrets {
            file,
            github_token,
            yes,
        } => {
            let config = parser::parse_config_file(&file)?;
            let stores = AwsStores::connect(deployment_region(&config))?;
            cmd_configure_secrets(&config, &github_token, &stores, |id| {
                if yes {
                    return Ok(true);
                }
                confirm(&format!(
                    "Store secret {} in account {}?",
                    id,
                    stores.caller_account()?
                ))
            })
        }
        Commands::Outputs { file, environment } => {
            let config = parser::parse_config_file(&file)?;
            let stores = AwsStores::connect(deployment_region(&config))?;
            cmd_outputs(&config, &environment, &stores).map(|_| ())
        }
        Commands::Schema => cmd_schema(),
        Commands::Completion { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "lakeform",
                &mut std::io::stdout(),
            );
            Ok(())
        }
    }
}

fn confirm(prompt: &str) -> Result<bool> {
    dialoguer::Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .map_err(|e| Error::Aborted(format!("prompt failed: {}", e)))
}

fn deployment_region(config: &LakeformConfig) -> Option<&str> {
    config
        .environments
        .get(&Environment::Deployment)
        .and_then(|v| v.region.as_deref())
}

/// Parse and validate a config file, printing every error found.
fn parse_and_validate(file: &Path) -> Result<LakeformConfig> {
    let config = parser::parse_config_file(file)?;
    check(&config)?;
    Ok(config)
}

fn check(config: &LakeformConfig) -> Result<()> {
    let errors = parser::validate_config(config);
    if errors.is_empty() {
        return Ok(());
    }
    for e in &errors {
        eprintln!("  ERROR: {}", e);
    }
    Err(Error::Validation(errors.len()))
}

/// Decide the synth mode and load configuration. Bootstrap mode loads none.
fn prepare(file: &Path, args: &ModeArgs) -> Result<(SynthMode, Option<LakeformConfig>)> {
    let mode = args.mode()?;
    if mode == SynthMode::Bootstrap {
        return Ok((mode, None));
    }
    let mut config = parser::parse_config_file(file)?;
    if let Some(resolution) = args.resolution {
        config.resolution = resolution;
    }
    check(&config)?;
    Ok((mode, Some(config)))
}

/// Run `f` with a parameter store connection when the configuration
/// resolves values remotely.
fn with_store<T>(
    config: Option<&LakeformConfig>,
    region: Option<&str>,
    f: impl FnOnce(Option<&dyn ParameterStore>) -> Result<T>,
) -> Result<T> {
    match config {
        Some(c) if c.resolution == Resolution::ParameterStore => {
            let stores = AwsStores::connect(region.or(deployment_region(c)))?;
            let store: &dyn ParameterStore = &stores;
            f(Some(store))
        }
        _ => f(None),
    }
}

fn assemble(
    mode: SynthMode,
    config: Option<&LakeformConfig>,
    store: Option<&dyn ParameterStore>,
) -> Result<CloudAssembly> {
    match config {
        Some(config) if mode != SynthMode::Bootstrap => {
            let source = resolver::value_source(config.resolution, config, store)?;
            synth::synthesize(mode, config, source.as_ref())
        }
        _ => synth::synth_bootstrap(),
    }
}

// ============================================================================
// init / validate / schema
// ============================================================================

const STARTER: &str = r#"version: "1.0"
description: "Data lake infrastructure"

parameter_namespace: /DataLake
resolution: local

environments:
  Deployment:
    account_id: "000000000000"
    region: us-east-2
    github_repository_owner_name: my-org
    github_repository_name: data-lake-infrastructure
    logical_id_prefix: DataLake
    resource_name_prefix: data-lake
  Dev:
    account_id: "111111111111"
    region: us-east-2
    vpc_cidr: 10.20.0.0/24
  Test:
    account_id: "222222222222"
    region: us-east-2
    vpc_cidr: 10.10.0.0/24
  Prod:
    account_id: "333333333333"
    region: us-east-2
    vpc_cidr: 10.0.0.0/24

pipeline:
  branches:
    Dev: main
    Test: test
    Prod: production
  build_image: aws/codebuild/standard:7.0
"#;

fn cmd_init(path: &Path) -> Result<()> {
    let config_path = path.join("lakeform.yaml");
    if config_path.exists() {
        return Err(Error::Aborted(format!(
            "{} already exists",
            config_path.display()
        )));
    }
    std::fs::create_dir_all(path).map_err(|e| Error::io(path, e))?;
    std::fs::write(&config_path, STARTER).map_err(|e| Error::io(&config_path, e))?;

    println!("Initialized lakeform project at {}", path.display());
    println!("  Created: {}", config_path.display());
    println!("  Next: fill in account ids, then `lakeform validate`");
    Ok(())
}

fn cmd_validate(file: &Path) -> Result<()> {
    let config = parse_and_validate(file)?;
    println!(
        "OK: {} environment(s), resolution {:?}, namespace {}",
        config.environments.len(),
        config.resolution,
        config.parameter_namespace
    );
    Ok(())
}

fn cmd_schema() -> Result<()> {
    let schema = schemars::schema_for!(LakeformConfig);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

// ============================================================================
// synth / diff / verify
// ============================================================================

fn cmd_synth(
    mode: SynthMode,
    config: Option<&LakeformConfig>,
    output: &Path,
    store: Option<&dyn ParameterStore>,
) -> Result<()> {
    let assembly = assemble(mode, config, store)?;
    let summary = synth::write(&assembly, output)?;

    println!(
        "Synthesized {}: {} stack(s), {} resource(s) in {:.2}s",
        assembly.mode,
        summary.manifest.stacks.len(),
        summary.resources,
        summary.seconds
    );
    for (name, entry) in &summary.manifest.stacks {
        println!(
            "  {} ({}, {} resources) {}",
            name,
            entry.environment,
            entry.resources.len(),
            entry.template_hash
        );
    }
    println!("Assembly: {} (run {})", output.display(), summary.run_id);
    Ok(())
}

fn cmd_diff(
    mode: SynthMode,
    config: Option<&LakeformConfig>,
    output: &Path,
    store: Option<&dyn ParameterStore>,
) -> Result<DiffPlan> {
    let assembly = assemble(mode, config, store)?;
    let previous = state::load_manifest(output)?;
    let next = assembly.manifest()?;
    let plan = planner::diff(previous.as_ref(), &next);
    print_plan(&plan);
    Ok(plan)
}

fn print_plan(plan: &DiffPlan) {
    let mut current_stack = String::new();
    for change in &plan.changes {
        if change.action == PlanAction::NoOp {
            continue;
        }
        if change.stack != current_stack {
            current_stack.clone_from(&change.stack);
            println!("{}:", current_stack);
        }
        let symbol = match change.action {
            PlanAction::Create => "+",
            PlanAction::Update => "~",
            PlanAction::Destroy => "-",
            PlanAction::NoOp => " ",
        };
        println!("  {} {}", symbol, change.logical_id);
    }
    if plan.has_changes() {
        println!();
    }
    println!(
        "Diff: {} to add, {} to change, {} to destroy, {} unchanged.",
        plan.to_create, plan.to_update, plan.to_destroy, plan.unchanged
    );
}

fn cmd_verify(output: &Path, strict: bool) -> Result<usize> {
    let manifest = state::load_manifest(output)?.ok_or_else(|| {
        Error::Aborted(format!(
            "no assembly manifest in {} (run `lakeform synth` first)",
            output.display()
        ))
    })?;
    println!(
        "Checking {} ({} stacks, generated {})...",
        output.display(),
        manifest.stacks.len(),
        manifest.generated_at
    );

    let findings = drift::detect_drift(output, &manifest);
    if findings.is_empty() {
        println!("No drift detected.");
        return Ok(0);
    }
    for f in &findings {
        println!("  DRIFTED: {} ({})", f.stack, f.detail);
        println!("    Expected: {}", f.expected_hash);
        println!("    Actual:   {}", f.actual_hash);
    }
    println!();
    println!("Drift detected: {} template(s)", findings.len());
    if strict {
        return Err(Error::Aborted(format!(
            "{} drift finding(s)",
            findings.len()
        )));
    }
    Ok(findings.len())
}

// ============================================================================
// configure / configure-secrets / outputs
// ============================================================================

/// One parameter `configure` writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterWrite {
    pub path: String,
    pub value: String,
    pub description: String,
}

/// Parameters holding the local values of `environments`. Each environment
/// is resolved first, so nothing is written unless every value is valid.
pub fn configuration_parameters(
    config: &LakeformConfig,
    environments: &[Environment],
) -> Result<Vec<ParameterWrite>> {
    let source = LocalValues::new(config);
    let mut writes = Vec::new();
    for &environment in environments {
        let resolved = resolver::resolve_environment(&source, environment)?;
        for &key in ConfigKey::required_for(environment) {
            if let Some(value) = resolved.get(key) {
                writes.push(ParameterWrite {
                    path: resolver::config_parameter_path(
                        &config.parameter_namespace,
                        environment,
                        key,
                    ),
                    value: value.to_string(),
                    description: format!("lakeform {} {}", environment, key),
                });
            }
        }
    }
    Ok(writes)
}

fn cmd_configure(
    config: &LakeformConfig,
    environment: Option<&str>,
    store: &dyn ParameterStore,
    approve: impl FnOnce(&[ParameterWrite]) -> Result<bool>,
) -> Result<()> {
    let environments = match environment {
        Some(name) => vec![name.parse::<Environment>()?],
        None => Environment::ALL.to_vec(),
    };
    let writes = configuration_parameters(config, &environments)?;
    for w in &writes {
        println!("  {} = {}", w.path, w.value);
    }
    if !approve(&writes)? {
        return Err(Error::Aborted("configure cancelled".to_string()));
    }
    for w in &writes {
        store.put_parameter(&w.path, &w.value, &w.description)?;
        info!(path = %w.path, "parameter written");
    }
    println!("Wrote {} parameter(s)", writes.len());
    Ok(())
}

fn cmd_configure_secrets(
    config: &LakeformConfig,
    github_token: &str,
    store: &dyn SecretStore,
    approve: impl FnOnce(&str) -> Result<bool>,
) -> Result<()> {
    if github_token.trim().is_empty() {
        return Err(Error::Aborted("GitHub token is empty".to_string()));
    }
    let id = resolver::github_token_secret(&config.parameter_namespace);
    if !approve(&id)? {
        return Err(Error::Aborted("configure-secrets cancelled".to_string()));
    }
    store.put_secret(&id, github_token)?;
    info!(%id, "secret written");
    println!("Stored {}", id);
    Ok(())
}

/// Published value of every output key, `None` where nothing is published.
pub fn published_outputs(
    config: &LakeformConfig,
    environment: Environment,
    store: &dyn ParameterStore,
) -> Result<Vec<(OutputKey, Option<String>)>> {
    if !environment.is_target() {
        return Err(Error::NotATarget(environment));
    }
    OutputKey::ALL
        .into_iter()
        .map(|key| {
            let path =
                resolver::output_parameter_path(&config.parameter_namespace, environment, key);
            Ok((key, store.get_parameter(&path)?))
        })
        .collect()
}

fn cmd_outputs(
    config: &LakeformConfig,
    environment: &str,
    store: &dyn ParameterStore,
) -> Result<usize> {
    let environment: Environment = environment.parse()?;
    let outputs = published_outputs(config, environment, store)?;
    println!("{} outputs:", environment);
    let mut published = 0;
    for (key, value) in &outputs {
        match value {
            Some(v) => {
                published += 1;
                println!("  {:<28} {}", key.parameter_suffix(), v);
            }
            None => println!("  {:<28} (not published)", key.parameter_suffix()),
        }
    }
    Ok(published)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixtures::{sample_config, SAMPLE};
    use crate::transport::memory::MemoryStore;

    fn write_sample(dir: &Path) -> PathBuf {
        let file = dir.join("lakeform.yaml");
        std::fs::write(&file, SAMPLE).unwrap();
        file
    }

    #[test]
    fn test_cli_parses_synth_flags() {
        let cli = Cli::try_parse_from([
            "lakeform",
            "synth",
            "-o",
            "out",
            "--environment",
            "Dev",
            "--resolution",
            "parameter-store",
        ])
        .unwrap();
        match cli.command {
            Commands::Synth { output, mode, .. } => {
                assert_eq!(output, PathBuf::from("out"));
                assert_eq!(mode.mode().unwrap(), SynthMode::Direct(Environment::Dev));
                assert_eq!(mode.resolution, Some(Resolution::ParameterStore));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_mode_flags() {
        let mut args = ModeArgs::default();
        assert_eq!(args.mode().unwrap(), SynthMode::Pipeline);
        args.environment = Some("  ".to_string());
        assert_eq!(args.mode().unwrap(), SynthMode::Pipeline);
        args.environment = Some("Staging".to_string());
        assert!(matches!(args.mode(), Err(Error::UnknownEnvironment(_))));
        args.bootstrap = Some("1".to_string());
        assert_eq!(args.mode().unwrap(), SynthMode::Bootstrap);
    }

    #[test]
    fn test_bootstrap_any_non_empty_value() {
        for value in ["1", "yes", "True", "false"] {
            let args = ModeArgs {
                bootstrap: Some(value.to_string()),
                ..ModeArgs::default()
            };
            assert_eq!(args.mode().unwrap(), SynthMode::Bootstrap, "{value}");
        }
        let empty = ModeArgs {
            bootstrap: Some(String::new()),
            ..ModeArgs::default()
        };
        assert_eq!(empty.mode().unwrap(), SynthMode::Pipeline);
    }

    #[test]
    fn test_bootstrap_flag_values_parse() {
        for argv in [
            vec!["lakeform", "synth", "--bootstrap"],
            vec!["lakeform", "synth", "--bootstrap=1"],
            vec!["lakeform", "synth", "--bootstrap", "yes", "--environment", "Dev"],
        ] {
            let cli = Cli::try_parse_from(argv.iter().copied()).unwrap();
            match cli.command {
                Commands::Synth { mode, .. } => {
                    assert_eq!(mode.mode().unwrap(), SynthMode::Bootstrap, "{argv:?}");
                }
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[test]
    fn test_init() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("project");
        cmd_init(&sub).unwrap();
        let config = parser::parse_config_file(&sub.join("lakeform.yaml")).unwrap();
        assert!(parser::validate_config(&config).is_empty());
    }

    #[test]
    fn test_init_already_exists() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("lakeform.yaml"), "exists").unwrap();
        assert!(cmd_init(dir.path()).is_err());
    }

    #[test]
    fn test_validate_valid() {
        let dir = tempfile::tempdir().unwrap();
        cmd_validate(&write_sample(dir.path())).unwrap();
    }

    #[test]
    fn test_validate_reports_count() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("lakeform.yaml");
        std::fs::write(&file, SAMPLE.replace("version: \"1.0\"", "version: \"2.0\"")).unwrap();
        assert!(matches!(cmd_validate(&file), Err(Error::Validation(_))));
    }

    #[test]
    fn test_bootstrap_needs_no_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let args = ModeArgs {
            bootstrap: Some("1".to_string()),
            ..ModeArgs::default()
        };
        let (mode, config) = prepare(&dir.path().join("absent.yaml"), &args).unwrap();
        assert!(config.is_none());
        let out = dir.path().join("out");
        cmd_synth(mode, None, &out, None).unwrap();
        assert!(out.join("StackStub.template.json").exists());
    }

    #[test]
    fn test_synth_then_verify_then_diff() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_sample(dir.path());
        let out = dir.path().join("out");
        let (mode, config) = prepare(&file, &ModeArgs::default()).unwrap();

        cmd_synth(mode, config.as_ref(), &out, None).unwrap();
        assert_eq!(cmd_verify(&out, true).unwrap(), 0);

        let plan = cmd_diff(mode, config.as_ref(), &out, None).unwrap();
        assert!(!plan.has_changes());
        assert!(plan.unchanged > 0);
    }

    #[test]
    fn test_diff_without_assembly_creates_everything() {
        let dir = tempfile::tempdir().unwrap();
        let config = sample_config();
        let plan = cmd_diff(
            SynthMode::Direct(Environment::Prod),
            Some(&config),
            &dir.path().join("none"),
            None,
        )
        .unwrap();
        assert_eq!(plan.unchanged + plan.to_update + plan.to_destroy, 0);
        assert!(plan.to_create > 0);
    }

    #[test]
    fn test_verify_detects_edit() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        cmd_synth(SynthMode::Bootstrap, None, &out, None).unwrap();
        std::fs::write(out.join("StackStub.template.json"), "{}").unwrap();
        assert_eq!(cmd_verify(&out, false).unwrap(), 1);
        assert!(cmd_verify(&out, true).is_err());
    }

    #[test]
    fn test_verify_without_assembly() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            cmd_verify(dir.path(), false),
            Err(Error::Aborted(_))
        ));
    }

    #[test]
    fn test_parameter_store_resolution_override() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_sample(dir.path());
        let args = ModeArgs {
            environment: Some("Dev".to_string()),
            resolution: Some(Resolution::ParameterStore),
            ..ModeArgs::default()
        };
        let (mode, config) = prepare(&file, &args).unwrap();
        let config = config.unwrap();
        assert_eq!(config.resolution, Resolution::ParameterStore);

        let store = MemoryStore::new();
        let writes = configuration_parameters(&config, &Environment::ALL).unwrap();
        for w in &writes {
            store.put_parameter(&w.path, &w.value, &w.description).unwrap();
        }
        let out = dir.path().join("out");
        let remote: &dyn ParameterStore = &store;
        cmd_synth(mode, Some(&config), &out, Some(remote)).unwrap();
        assert!(store.lookups() > 0);
        assert!(out.join("DevDataLakeInfrastructureVpc.template.json").exists());
    }

    #[test]
    fn test_configuration_parameters_paths() {
        let writes = configuration_parameters(&sample_config(), &[Environment::Dev]).unwrap();
        let paths: Vec<&str> = writes.iter().map(|w| w.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["/DataLake/Dev/AccountId", "/DataLake/Dev/Region", "/DataLake/Dev/VpcCidr"]
        );
        assert_eq!(writes[0].value, "111");
    }

    #[test]
    fn test_configure_writes_all_environments() {
        let store = MemoryStore::new();
        cmd_configure(&sample_config(), None, &store, |_| Ok(true)).unwrap();
        assert_eq!(store.parameter_count(), 6 + 3 * 3);
        assert_eq!(
            store.parameter("/DataLake/Deployment/ResourceNamePrefix").as_deref(),
            Some("data-lake")
        );
    }

    #[test]
    fn test_configure_declined_writes_nothing() {
        let store = MemoryStore::new();
        let err = cmd_configure(&sample_config(), Some("Prod"), &store, |_| Ok(false)).unwrap_err();
        assert!(matches!(err, Error::Aborted(_)));
        assert_eq!(store.parameter_count(), 0);
    }

    #[test]
    fn test_configure_rejects_invalid_values() {
        let mut config = sample_config();
        config
            .environments
            .get_mut(&Environment::Dev)
            .unwrap()
            .vpc_cidr = Some(String::new());
        let store = MemoryStore::new();
        let err = cmd_configure(&config, None, &store, |_| Ok(true)).unwrap_err();
        assert!(matches!(
            err,
            Error::MissingValue {
                environment: Environment::Dev,
                key: ConfigKey::VpcCidr
            }
        ));
        assert_eq!(store.parameter_count(), 0);
    }

    #[test]
    fn test_configure_secrets() {
        let store = MemoryStore::new();
        cmd_configure_secrets(&sample_config(), "ghp_abc", &store, |_| Ok(true)).unwrap();
        assert_eq!(store.secret("/DataLake/GitHubToken").as_deref(), Some("ghp_abc"));
        assert!(cmd_configure_secrets(&sample_config(), " ", &store, |_| Ok(true)).is_err());
    }

    #[test]
    fn test_outputs_reads_published_values() {
        let store = MemoryStore::with_parameters([
            ("/DataLake/Dev/VpcId", "vpc-123"),
            ("/DataLake/Dev/RawBucketName", "dev-data-lake-111-us-east-2-raw"),
        ]);
        let config = sample_config();
        assert_eq!(cmd_outputs(&config, "Dev", &store).unwrap(), 2);
        let outputs = published_outputs(&config, Environment::Dev, &store).unwrap();
        assert_eq!(outputs.len(), OutputKey::ALL.len());
        assert_eq!(outputs[0], (OutputKey::VpcId, Some("vpc-123".to_string())));
    }

    #[test]
    fn test_outputs_rejects_deployment() {
        let store = MemoryStore::new();
        assert!(matches!(
            cmd_outputs(&sample_config(), "Deployment", &store),
            Err(Error::NotATarget(Environment::Deployment))
        ));
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
