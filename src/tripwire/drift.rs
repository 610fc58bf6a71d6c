//! Drift detection: compare templates on disk to the hashes recorded in the
//! assembly manifest.

use crate::core::types::AssemblyManifest;
use crate::tripwire::hasher;
use std::path::Path;

/// A single drift finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriftFinding {
    pub stack: String,
    pub file: String,
    pub expected_hash: String,
    pub actual_hash: String,
    pub detail: String,
}

/// Check one template file against its recorded hash.
pub fn check_template_drift(
    stack: &str,
    path: &Path,
    expected_hash: &str,
) -> Option<DriftFinding> {
    let file = path.display().to_string();
    if !path.exists() {
        return Some(DriftFinding {
            stack: stack.to_string(),
            file: file.clone(),
            expected_hash: expected_hash.to_string(),
            actual_hash: "MISSING".to_string(),
            detail: format!("{} does not exist", file),
        });
    }

    let actual = hasher::hash_file(path).unwrap_or_else(|e| format!("ERROR:{}", e));
    if actual != expected_hash {
        Some(DriftFinding {
            stack: stack.to_string(),
            detail: format!("{} changed since synthesis", file),
            file,
            expected_hash: expected_hash.to_string(),
            actual_hash: actual,
        })
    } else {
        None
    }
}

/// Check every template listed in the manifest.
pub fn detect_drift(assembly_dir: &Path, manifest: &AssemblyManifest) -> Vec<DriftFinding> {
    manifest
        .stacks
        .iter()
        .filter_map(|(name, entry)| {
            check_template_drift(
                name,
                &assembly_dir.join(&entry.template_file),
                &entry.template_hash,
            )
        })
        .collect()
}
