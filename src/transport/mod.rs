//! Transport to the external parameter and secret stores.
//!
//! Calls are synchronous and independent: one request per value, no
//! batching, caching or retry. A failed call aborts the run.

pub mod aws;
pub mod memory;

use crate::core::error::Result;

/// Hierarchical key/value store holding configuration and published outputs.
pub trait ParameterStore {
    /// Read a parameter. `Ok(None)` when the path does not exist.
    fn get_parameter(&self, path: &str) -> Result<Option<String>>;

    /// Create or overwrite a plain string parameter.
    fn put_parameter(&self, path: &str, value: &str, description: &str) -> Result<()>;
}

/// Store holding credentials. Only ever written by lakeform; reads happen at
/// deploy time through dynamic references.
pub trait SecretStore {
    fn put_secret(&self, id: &str, value: &str) -> Result<()>;
}
