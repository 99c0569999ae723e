use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{NotaryError, Result};
use crate::vault::backend::VaultBackend;

/// One file per record under a directory.
pub struct FileVaultBackend {
    directory: PathBuf,
}

impl FileVaultBackend {
    /// Open (creating if needed) a record directory.
    pub fn open(directory: impl AsRef<Path>) -> Result<Self> {
        let directory = directory.as_ref().to_path_buf();
        fs::create_dir_all(&directory)
            .map_err(|e| NotaryError::Storage(format!("cannot create {}: {e}", directory.display())))?;
        Ok(Self { directory })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn path_for(&self, name: &str) -> Result<PathBuf> {
        // Record names are flat: no separators, no traversal.
        let valid = !name.is_empty()
            && name != "."
            && name != ".."
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'));
        if !valid {
            return Err(NotaryError::Precondition(format!("invalid record name: {name:?}")));
        }
        Ok(self.directory.join(name))
    }
}

impl VaultBackend for FileVaultBackend {
    fn store_record(&self, name: &str, record: &[u8]) -> Result<()> {
        let path = self.path_for(name)?;
        let staging = self.directory.join(format!("{name}.tmp"));
        fs::write(&staging, record)
            .map_err(|e| NotaryError::Storage(format!("write {} failed: {e}", staging.display())))?;
        fs::rename(&staging, &path)
            .map_err(|e| NotaryError::Storage(format!("rename to {} failed: {e}", path.display())))
    }

    fn load_record(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(name)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(NotaryError::Storage(format!("read {} failed: {e}", path.display()))),
        }
    }

    fn delete_record(&self, name: &str) -> Result<()> {
        let path = self.path_for(name)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(NotaryError::Storage(format!("delete {} failed: {e}", path.display()))),
        }
    }
}
