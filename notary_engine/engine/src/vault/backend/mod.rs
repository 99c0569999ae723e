//! Pluggable persistence for named records.

pub mod file;
pub mod memory;

use crate::error::Result;

/// One opaque byte record per name. Deleting a missing record is not an error.
pub trait VaultBackend: Send + Sync {
    fn store_record(&self, name: &str, record: &[u8]) -> Result<()>;
    fn load_record(&self, name: &str) -> Result<Option<Vec<u8>>>;
    fn delete_record(&self, name: &str) -> Result<()>;
}
