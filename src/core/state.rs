//! Cloud assembly on disk: templates, template configurations and the
//! manifest.

use super::error::{Error, Result};
use super::synth::CloudAssembly;
use super::template::Stack;
use super::types::AssemblyManifest;
use serde_json::json;
use std::path::{Path, PathBuf};

pub const MANIFEST_FILE: &str = "manifest.yaml";

pub fn manifest_path(assembly_dir: &Path) -> PathBuf {
    assembly_dir.join(MANIFEST_FILE)
}

/// Exact bytes written for a stack's template.
pub fn render_template(stack: &Stack) -> Result<String> {
    let mut out = serde_json::to_string_pretty(&stack.template)?;
    out.push('\n');
    Ok(out)
}

/// Template configuration consumed by the CloudFormation deploy action.
pub fn render_template_config(stack: &Stack) -> Result<String> {
    let mut out = serde_json::to_string_pretty(&json!({ "Tags": stack.tags }))?;
    out.push('\n');
    Ok(out)
}

/// Write `content` to `path` via a temp file and rename.
pub fn write_atomic(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);
    std::fs::write(&tmp_path, content).map_err(|e| Error::io(&tmp_path, e))?;
    std::fs::rename(&tmp_path, path).map_err(|e| Error::io(path, e))?;
    Ok(())
}

/// Write every template and template configuration, then the manifest.
/// The manifest goes last so it never names a template that is not there.
pub fn write_assembly(assembly_dir: &Path, assembly: &CloudAssembly) -> Result<AssemblyManifest> {
    for stack in &assembly.stacks {
        write_atomic(&assembly_dir.join(stack.template_file()), &render_template(stack)?)?;
        write_atomic(
            &assembly_dir.join(stack.template_config_file()),
            &render_template_config(stack)?,
        )?;
    }
    let manifest = assembly.manifest()?;
    save_manifest(assembly_dir, &manifest)?;
    Ok(manifest)
}

pub fn save_manifest(assembly_dir: &Path, manifest: &AssemblyManifest) -> Result<()> {
    let yaml = serde_yaml_ng::to_string(manifest)?;
    write_atomic(&manifest_path(assembly_dir), &yaml)
}

/// Load the manifest. Returns None if no assembly has been written yet.
pub fn load_manifest(assembly_dir: &Path) -> Result<Option<AssemblyManifest>> {
    let path = manifest_path(assembly_dir);
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&path).map_err(|e| Error::io(&path, e))?;
    Ok(Some(serde_yaml_ng::from_str(&content)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixtures::sample_config;
    use crate::core::resolver::LocalValues;
    use crate::core::synth::{synth_bootstrap, synthesize};
    use crate::core::types::{Environment, SynthMode};
    use crate::tripwire::hasher;

    fn dev_assembly() -> CloudAssembly {
        let config = sample_config();
        synthesize(
            SynthMode::Direct(Environment::Dev),
            &config,
            &LocalValues::new(&config),
        )
        .unwrap()
    }

    #[test]
    fn test_write_assembly_files() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = write_assembly(dir.path(), &dev_assembly()).unwrap();
        for name in manifest.stacks.keys() {
            assert!(dir.path().join(format!("{name}.template.json")).exists());
            assert!(dir.path().join(format!("{name}.template-config.json")).exists());
        }
        assert!(manifest_path(dir.path()).exists());
        assert!(!dir.path().join("manifest.yaml.tmp").exists());
    }

    #[test]
    fn test_manifest_hash_matches_file() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = write_assembly(dir.path(), &dev_assembly()).unwrap();
        for entry in manifest.stacks.values() {
            let actual = hasher::hash_file(&dir.path().join(&entry.template_file)).unwrap();
            assert_eq!(actual, entry.template_hash);
        }
    }

    #[test]
    fn test_template_config_carries_tags() {
        let assembly = dev_assembly();
        let rendered = render_template_config(&assembly.stacks[0]).unwrap();
        let v: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(v["Tags"]["data-lake:team"], "DataLakeAdmin");
    }

    #[test]
    fn test_manifest_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        write_assembly(dir.path(), &synth_bootstrap().unwrap()).unwrap();
        let loaded = load_manifest(dir.path()).unwrap().unwrap();
        assert_eq!(loaded.mode, SynthMode::Bootstrap);
        assert_eq!(
            loaded.stacks["StackStub"].environment,
            "aws://unknown-account/unknown-region"
        );
    }

    #[test]
    fn test_load_manifest_missing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_manifest(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_load_manifest_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(manifest_path(dir.path()), "stacks: [not: a map").unwrap();
        assert!(matches!(load_manifest(dir.path()), Err(Error::Yaml(_))));
    }

    #[test]
    fn test_rewrite_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let first = write_assembly(dir.path(), &dev_assembly()).unwrap();
        let second = write_assembly(dir.path(), &dev_assembly()).unwrap();
        for (name, entry) in &first.stacks {
            assert_eq!(entry.template_hash, second.stacks[name].template_hash);
        }
    }
}
