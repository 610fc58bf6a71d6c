//! In-process store used by tests and dry runs.

use super::{ParameterStore, SecretStore};
use crate::core::error::Result;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

#[derive(Debug, Default)]
pub struct MemoryStore {
    parameters: RefCell<BTreeMap<String, String>>,
    secrets: RefCell<BTreeMap<String, String>>,
    lookups: Cell<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parameters<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let store = Self::new();
        store.parameters.borrow_mut().extend(
            entries
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string())),
        );
        store
    }

    /// Number of `get_parameter` calls served so far.
    pub fn lookups(&self) -> usize {
        self.lookups.get()
    }

    pub fn parameter(&self, path: &str) -> Option<String> {
        self.parameters.borrow().get(path).cloned()
    }

    pub fn secret(&self, id: &str) -> Option<String> {
        self.secrets.borrow().get(id).cloned()
    }

    pub fn parameter_count(&self) -> usize {
        self.parameters.borrow().len()
    }
}

impl ParameterStore for MemoryStore {
    fn get_parameter(&self, path: &str) -> Result<Option<String>> {
        self.lookups.set(self.lookups.get() + 1);
        Ok(self.parameters.borrow().get(path).cloned())
    }

    fn put_parameter(&self, path: &str, value: &str, _description: &str) -> Result<()> {
        self.parameters
            .borrow_mut()
            .insert(path.to_string(), value.to_string());
        Ok(())
    }
}

impl SecretStore for MemoryStore {
    fn put_secret(&self, id: &str, value: &str) -> Result<()> {
        self.secrets
            .borrow_mut()
            .insert(id.to_string(), value.to_string());
        Ok(())
    }
}
