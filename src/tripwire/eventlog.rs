//! Append-only synthesis provenance log (`events.jsonl`).

use crate::core::error::{Error, Result};
use crate::core::types::{ProvenanceEvent, TimestampedEvent};
use chrono::{SecondsFormat, Utc};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const EVENT_LOG: &str = "events.jsonl";

/// Current UTC time, e.g. `2026-03-01T12:00:00Z`.
pub fn now_iso8601() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Generate a run ID.
pub fn generate_run_id() -> String {
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default() as u64;
    format!("r-{:012x}", nanos & 0xFFFF_FFFF_FFFF)
}

pub fn event_log_path(assembly_dir: &Path) -> PathBuf {
    assembly_dir.join(EVENT_LOG)
}

/// Append an event to the assembly's event log.
pub fn append_event(assembly_dir: &Path, event: ProvenanceEvent) -> Result<()> {
    std::fs::create_dir_all(assembly_dir).map_err(|e| Error::io(assembly_dir, e))?;
    let path = event_log_path(assembly_dir);

    let te = TimestampedEvent {
        ts: now_iso8601(),
        event,
    };
    let json = serde_json::to_string(&te)?;

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| Error::io(&path, e))?;
    writeln!(file, "{}", json).map_err(|e| Error::io(&path, e))?;
    Ok(())
}

/// Read every event back, oldest first.
pub fn read_events(assembly_dir: &Path) -> Result<Vec<TimestampedEvent>> {
    let path = event_log_path(assembly_dir);
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(&path).map_err(|e| Error::io(&path, e))?;
    content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).map_err(Error::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_iso8601() {
        let ts = now_iso8601();
        assert!(ts.starts_with("20"));
        assert!(ts.ends_with('Z'));
        assert!(ts.contains('T'));
        assert_eq!(ts.len(), 20);
    }

    #[test]
    fn test_generate_run_id() {
        let id = generate_run_id();
        assert!(id.starts_with("r-"));
        assert_eq!(id.len(), 14);
    }

    #[test]
    fn test_event_log_path() {
        assert_eq!(
            event_log_path(Path::new("/out")),
            PathBuf::from("/out/events.jsonl")
        );
    }

    #[test]
    fn test_append_and_read() {
        let dir = tempfile::tempdir().unwrap();
        append_event(
            dir.path(),
            ProvenanceEvent::SynthStarted {
                run_id: "r-abc".to_string(),
                mode: "pipeline".to_string(),
                lakeform_version: "0.1.0".to_string(),
            },
        )
        .unwrap();
        append_event(
            dir.path(),
            ProvenanceEvent::SynthCompleted {
                run_id: "r-abc".to_string(),
                stacks: 12,
                total_seconds: 0.25,
            },
        )
        .unwrap();

        let raw = std::fs::read_to_string(event_log_path(dir.path())).unwrap();
        assert!(raw.lines().next().unwrap().contains("\"event\":\"synth_started\""));

        let events = read_events(dir.path()).unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            events[1].event,
            ProvenanceEvent::SynthCompleted { stacks: 12, .. }
        ));
    }

    #[test]
    fn test_read_missing_log_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_events(dir.path()).unwrap().is_empty());
    }
}
