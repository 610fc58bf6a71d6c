//! Tripwire: synthesis provenance, BLAKE3 hashing, template drift detection.

pub mod drift;
pub mod eventlog;
pub mod hasher;
