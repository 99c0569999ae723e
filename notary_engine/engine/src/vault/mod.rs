//! Vault abstraction: where notary records live and how secrets are sealed.
//! The notary never touches files directly; it is handed a backend.

use std::path::PathBuf;
use std::sync::Arc;

use crate::error::Result;

pub mod backend;
pub mod sealing;

pub use backend::VaultBackend;
pub use backend::file::FileVaultBackend;
pub use backend::memory::MemoryVaultBackend;
pub use sealing::SealingKey;

/// Represents which backend to use at runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VaultMode {
    Memory,
    Directory(PathBuf),
}

/// Open the backend for the chosen mode.
pub fn open(mode: &VaultMode) -> Result<Arc<dyn VaultBackend>> {
    let backend: Arc<dyn VaultBackend> = match mode {
        VaultMode::Memory => Arc::new(MemoryVaultBackend::new()),
        VaultMode::Directory(directory) => Arc::new(FileVaultBackend::open(directory)?),
    };
    Ok(backend)
}
