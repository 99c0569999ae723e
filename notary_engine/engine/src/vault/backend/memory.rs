use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::{NotaryError, Result};
use crate::vault::backend::VaultBackend;

/// In-process backend; records vanish with the process.
#[derive(Default, Clone)]
pub struct MemoryVaultBackend {
    store: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryVaultBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of every stored record, sorted.
    pub fn record_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .store
            .read()
            .map(|store| store.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }
}

impl VaultBackend for MemoryVaultBackend {
    fn store_record(&self, name: &str, record: &[u8]) -> Result<()> {
        let mut store = self.store.write().map_err(|_| NotaryError::Storage("Vault lock poisoned".into()))?;
        store.insert(name.to_string(), record.to_vec());
        Ok(())
    }

    fn load_record(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let store = self.store.read().map_err(|_| NotaryError::Storage("Vault lock poisoned".into()))?;
        Ok(store.get(name).cloned())
    }

    fn delete_record(&self, name: &str) -> Result<()> {
        let mut store = self.store.write().map_err(|_| NotaryError::Storage("Vault lock poisoned".into()))?;
        store.remove(name);
        Ok(())
    }
}
