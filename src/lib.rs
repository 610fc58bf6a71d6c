//! Lakeform: multi-environment data lake infrastructure for AWS.
//!
//! Resolves per-environment configuration, declares network, storage,
//! identity and pipeline stacks, tags them, and writes CloudFormation
//! templates into a cloud assembly directory.

pub mod cli;
pub mod core;
pub mod resources;
pub mod transport;
pub mod tripwire;
