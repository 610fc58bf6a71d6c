//! Core logic: configuration, resolution, naming, tagging and synthesis.

pub mod error;
#[cfg(test)]
pub(crate) mod fixtures;
pub mod naming;
pub mod parser;
pub mod planner;
pub mod resolver;
pub mod state;
pub mod synth;
pub mod tagging;
pub mod template;
pub mod types;
