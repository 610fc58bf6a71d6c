//! Diff: compare a fresh synthesis with the last written manifest,
//! resource by resource.

use super::types::*;

/// Compare `next` against `previous` (None when nothing was written yet).
///
/// Resources are matched by stack name and logical id. A resource whose
/// declaration hash changed is an update; one that disappeared, including
/// every resource of a removed stack, is a destroy.
pub fn diff(previous: Option<&AssemblyManifest>, next: &AssemblyManifest) -> DiffPlan {
    let mut plan = DiffPlan::default();

    for (stack, entry) in &next.stacks {
        let before = previous.and_then(|p| p.stacks.get(stack));
        for (id, hash) in &entry.resources {
            let action = match before.and_then(|b| b.resources.get(id)) {
                None => PlanAction::Create,
                Some(old) if old == hash => PlanAction::NoOp,
                Some(_) => PlanAction::Update,
            };
            record(&mut plan, stack, id, action);
        }
    }

    if let Some(previous) = previous {
        for (stack, entry) in &previous.stacks {
            let after = next.stacks.get(stack);
            for id in entry.resources.keys() {
                if after.is_none_or(|a| !a.resources.contains_key(id)) {
                    record(&mut plan, stack, id, PlanAction::Destroy);
                }
            }
        }
    }

    plan
}

fn record(plan: &mut DiffPlan, stack: &str, logical_id: &str, action: PlanAction) {
    match action {
        PlanAction::Create => plan.to_create += 1,
        PlanAction::Update => plan.to_update += 1,
        PlanAction::Destroy => plan.to_destroy += 1,
        PlanAction::NoOp => plan.unchanged += 1,
    }
    plan.changes.push(PlannedChange {
        stack: stack.to_string(),
        logical_id: logical_id.to_string(),
        action,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn manifest(stacks: &[(&str, &[(&str, &str)])]) -> AssemblyManifest {
        AssemblyManifest {
            schema: "1.0".to_string(),
            mode: SynthMode::Pipeline,
            generated_at: "2026-01-01T00:00:00Z".to_string(),
            generator: "lakeform test".to_string(),
            stacks: stacks
                .iter()
                .map(|(name, resources)| {
                    (
                        name.to_string(),
                        StackManifest {
                            environment: "aws://111/us-east-2".to_string(),
                            template_file: format!("{name}.template.json"),
                            template_hash: "blake3:t".to_string(),
                            tags: IndexMap::new(),
                            resources: resources
                                .iter()
                                .map(|(id, h)| (id.to_string(), h.to_string()))
                                .collect(),
                        },
                    )
                })
                .collect(),
        }
    }

    #[test]
    fn test_first_synth_creates_everything() {
        let next = manifest(&[("Vpc", &[("A", "1"), ("B", "2")])]);
        let plan = diff(None, &next);
        assert_eq!(plan.to_create, 2);
        assert!(plan.has_changes());
    }

    #[test]
    fn test_identical_is_noop() {
        let m = manifest(&[("Vpc", &[("A", "1")])]);
        let plan = diff(Some(&m), &m);
        assert_eq!(plan.unchanged, 1);
        assert!(!plan.has_changes());
    }

    #[test]
    fn test_update_create_destroy() {
        let before = manifest(&[("Vpc", &[("A", "1"), ("B", "2")]), ("Old", &[("X", "9")])]);
        let after = manifest(&[("Vpc", &[("A", "1"), ("B", "3"), ("C", "4")])]);
        let plan = diff(Some(&before), &after);
        assert_eq!(plan.unchanged, 1);
        assert_eq!(plan.to_update, 1);
        assert_eq!(plan.to_create, 1);
        assert_eq!(plan.to_destroy, 1);
        let destroyed = plan
            .changes
            .iter()
            .find(|c| c.action == PlanAction::Destroy)
            .unwrap();
        assert_eq!(destroyed.stack, "Old");
        assert_eq!(destroyed.logical_id, "X");
    }
}
