//! Deploy stage: the network, storage and identity stacks of one target
//! environment, tagged, plus where each cross-stack output comes from.

use super::identity::identity_stack;
use super::network::network_stack;
use super::output_id;
use super::storage::storage_stack;
use crate::core::error::Result;
use crate::core::resolver::{output_parameter_path, DeploymentConfig, ResolvedEnvironment};
use crate::core::tagging::tag;
use crate::core::template::Stack;
use crate::core::types::{Environment, OutputKey};

/// Where one cross-stack output is produced and where it is published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageOutput {
    pub key: OutputKey,
    pub stack: String,
    pub output_id: String,
    pub parameter_path: String,
}

#[derive(Debug, Clone)]
pub struct DeployStage {
    pub environment: Environment,
    /// Network, storage, identity; in deploy order
    pub stacks: Vec<Stack>,
    pub outputs: Vec<StageOutput>,
}

impl DeployStage {
    pub fn stack_names(&self) -> Vec<&str> {
        self.stacks.iter().map(|s| s.name.as_str()).collect()
    }
}

pub fn deploy_stage(target: &ResolvedEnvironment, config: &DeploymentConfig) -> Result<DeployStage> {
    let env = target.environment;
    let mut stacks = vec![
        network_stack(target, config)?,
        storage_stack(target, config)?,
        identity_stack(target, config)?,
    ];
    for stack in &mut stacks {
        tag(stack, env, &config.naming);
    }

    let mut outputs = Vec::with_capacity(OutputKey::ALL.len());
    for key in OutputKey::ALL {
        let id = output_id(&config.naming, env, key);
        // Every key is declared by exactly one of the three stacks.
        if let Some(stack) = stacks.iter().find(|s| s.template.outputs.contains_key(&id)) {
            outputs.push(StageOutput {
                key,
                stack: stack.name.clone(),
                output_id: id,
                parameter_path: output_parameter_path(&config.namespace, env, key),
            });
        }
    }

    Ok(DeployStage {
        environment: env,
        stacks,
        outputs,
    })
}
