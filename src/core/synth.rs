//! Synthesis: mode → resolved configuration → stacks → tags → assembly.
//!
//! Bootstrap mode reads no configuration at all. Direct mode declares the
//! deploy stage of one target environment. Pipeline mode declares one
//! pipeline per target plus every stack those pipelines deploy.

use super::error::{Error, Result};
use super::resolver::{resolve_deployment, ValueSource};
use super::state;
use super::tagging::tag;
use super::template::Stack;
use super::types::*;
use crate::resources::bootstrap::bootstrap_stack;
use crate::resources::pipeline::pipeline_stack;
use crate::resources::stage::deploy_stage;
use crate::tripwire::{eventlog, hasher};
use indexmap::IndexMap;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// The stacks of one synth run, in deploy order.
#[derive(Debug, Clone)]
pub struct CloudAssembly {
    pub mode: SynthMode,
    pub stacks: Vec<Stack>,
}

impl CloudAssembly {
    pub fn stack(&self, name: &str) -> Option<&Stack> {
        self.stacks.iter().find(|s| s.name == name)
    }

    pub fn stack_names(&self) -> Vec<&str> {
        self.stacks.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn resource_count(&self) -> usize {
        self.stacks.iter().map(|s| s.template.resources.len()).sum()
    }

    /// Manifest describing this assembly as it would be written to disk.
    pub fn manifest(&self) -> Result<AssemblyManifest> {
        let mut stacks = IndexMap::new();
        for stack in &self.stacks {
            let mut resources = IndexMap::new();
            for (id, resource) in &stack.template.resources {
                resources.insert(id.clone(), hasher::hash_resource(resource)?);
            }
            stacks.insert(
                stack.name.clone(),
                StackManifest {
                    environment: stack.environment_uri(),
                    template_file: stack.template_file(),
                    template_hash: hasher::hash_string(&state::render_template(stack)?),
                    tags: stack.tags.clone(),
                    resources,
                },
            );
        }
        Ok(AssemblyManifest {
            schema: "1.0".to_string(),
            mode: self.mode,
            generated_at: eventlog::now_iso8601(),
            generator: format!("lakeform {}", env!("CARGO_PKG_VERSION")),
            stacks,
        })
    }
}

/// The bootstrap assembly. Needs no configuration.
pub fn synth_bootstrap() -> Result<CloudAssembly> {
    Ok(CloudAssembly {
        mode: SynthMode::Bootstrap,
        stacks: vec![bootstrap_stack()?],
    })
}

/// Declare every stack of `mode`. Configuration is resolved once, up front;
/// a bad value fails the run before any stack is built.
pub fn synthesize(
    mode: SynthMode,
    config: &LakeformConfig,
    source: &dyn ValueSource,
) -> Result<CloudAssembly> {
    let targets: Vec<Environment> = match mode {
        SynthMode::Bootstrap => return synth_bootstrap(),
        SynthMode::Direct(env) if !env.is_target() => return Err(Error::NotATarget(env)),
        SynthMode::Direct(env) => vec![env],
        SynthMode::Pipeline => Environment::TARGETS.to_vec(),
    };
    let deployment = resolve_deployment(config, source, &targets)?;

    let mut stacks = Vec::new();
    for target in &deployment.targets {
        let stage = deploy_stage(target, &deployment)?;
        if mode == SynthMode::Pipeline {
            let mut pipeline = pipeline_stack(target, &stage, &deployment)?;
            tag(&mut pipeline, Environment::Deployment, &deployment.naming);
            debug!(stack = %pipeline.name, "declared pipeline");
            stacks.push(pipeline);
        }
        debug!(environment = %target.environment, stacks = stage.stacks.len(), "declared deploy stage");
        stacks.extend(stage.stacks);
    }
    Ok(CloudAssembly { mode, stacks })
}

/// Outcome of writing an assembly.
#[derive(Debug, Clone)]
pub struct SynthSummary {
    pub run_id: String,
    pub manifest: AssemblyManifest,
    pub resources: usize,
    pub seconds: f64,
}

/// Write `assembly` to `dir` and record the run in the event log.
pub fn write(assembly: &CloudAssembly, dir: &Path) -> Result<SynthSummary> {
    let start = Instant::now();
    let run_id = eventlog::generate_run_id();
    eventlog::append_event(
        dir,
        ProvenanceEvent::SynthStarted {
            run_id: run_id.clone(),
            mode: assembly.mode.to_string(),
            lakeform_version: env!("CARGO_PKG_VERSION").to_string(),
        },
    )?;

    let manifest = state::write_assembly(dir, assembly)?;
    for stack in &assembly.stacks {
        let hash = manifest
            .stacks
            .get(&stack.name)
            .map(|m| m.template_hash.clone())
            .unwrap_or_default();
        eventlog::append_event(
            dir,
            ProvenanceEvent::StackSynthesized {
                run_id: run_id.clone(),
                stack: stack.name.clone(),
                resources: u32::try_from(stack.template.resources.len()).unwrap_or(u32::MAX),
                hash,
            },
        )?;
    }

    let seconds = start.elapsed().as_secs_f64();
    eventlog::append_event(
        dir,
        ProvenanceEvent::SynthCompleted {
            run_id: run_id.clone(),
            stacks: u32::try_from(assembly.stacks.len()).unwrap_or(u32::MAX),
            total_seconds: seconds,
        },
    )?;
    info!(
        %run_id,
        mode = %assembly.mode,
        stacks = assembly.stacks.len(),
        dir = %dir.display(),
        "assembly written"
    );

    Ok(SynthSummary {
        run_id,
        manifest,
        resources: assembly.resource_count(),
        seconds,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixtures::sample_config;
    use crate::core::resolver::LocalValues;

    fn synth(mode: SynthMode) -> Result<CloudAssembly> {
        let config = sample_config();
        synthesize(mode, &config, &LocalValues::new(&config))
    }

    #[test]
    fn test_bootstrap_reads_no_configuration() {
        let mut config = sample_config();
        config.environments.clear();
        let assembly = synthesize(SynthMode::Bootstrap, &config, &LocalValues::new(&config)).unwrap();
        assert_eq!(assembly.stack_names(), vec!["StackStub"]);
    }

    #[test]
    fn test_direct_mode_declares_one_stage() {
        let assembly = synth(SynthMode::Direct(Environment::Dev)).unwrap();
        assert_eq!(
            assembly.stack_names(),
            vec![
                "DevDataLakeInfrastructureVpc",
                "DevDataLakeInfrastructureS3BucketZones",
                "DevDataLakeInfrastructureIam",
            ]
        );
    }

    #[test]
    fn test_direct_mode_rejects_deployment() {
        let err = synth(SynthMode::Direct(Environment::Deployment)).unwrap_err();
        assert!(matches!(err, Error::NotATarget(Environment::Deployment)));
    }

    #[test]
    fn test_pipeline_mode_declares_everything() {
        let assembly = synth(SynthMode::Pipeline).unwrap();
        assert_eq!(assembly.stacks.len(), 12);
        for env in Environment::TARGETS {
            let pipeline = assembly
                .stack(&format!("{env}DataLakeInfrastructurePipeline"))
                .unwrap();
            assert_eq!(pipeline.tags["data-lake:environment"], "Deployment");
            let vpc = assembly
                .stack(&format!("{env}DataLakeInfrastructureVpc"))
                .unwrap();
            assert_eq!(vpc.tags["data-lake:environment"], env.to_string());
        }
    }

    #[test]
    fn test_every_stack_fully_tagged() {
        let assembly = synth(SynthMode::Pipeline).unwrap();
        for stack in &assembly.stacks {
            assert_eq!(stack.tags.len(), 4, "{}", stack.name);
        }
    }

    #[test]
    fn test_bad_configuration_fails_before_declaring() {
        let mut config = sample_config();
        config
            .environments
            .get_mut(&Environment::Deployment)
            .unwrap()
            .resource_name_prefix = Some("My-Prefix-".to_string());
        let err = synthesize(SynthMode::Pipeline, &config, &LocalValues::new(&config)).unwrap_err();
        assert!(matches!(err, Error::InvalidResourceNamePrefix(_)));
    }

    #[test]
    fn test_synthesis_is_deterministic() {
        let a = synth(SynthMode::Pipeline).unwrap();
        let b = synth(SynthMode::Pipeline).unwrap();
        let ma = a.manifest().unwrap();
        let mb = b.manifest().unwrap();
        for (name, entry) in &ma.stacks {
            assert_eq!(entry.template_hash, mb.stacks[name].template_hash);
            assert_eq!(entry.resources, mb.stacks[name].resources);
        }
    }

    #[test]
    fn test_write_records_events() {
        let dir = tempfile::tempdir().unwrap();
        let assembly = synth(SynthMode::Direct(Environment::Test)).unwrap();
        let summary = write(&assembly, dir.path()).unwrap();
        assert_eq!(summary.manifest.stacks.len(), 3);
        assert_eq!(summary.resources, assembly.resource_count());
        let events = eventlog::read_events(dir.path()).unwrap();
        assert_eq!(events.len(), 5);
        assert!(matches!(events[0].event, ProvenanceEvent::SynthStarted { .. }));
        assert!(matches!(events[4].event, ProvenanceEvent::SynthCompleted { stacks: 3, .. }));
    }
}
