//! Runtime configuration for a notary instance.

use std::path::PathBuf;

use crate::error::{NotaryError, Result};
use crate::protocol::Protocol;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotaryConfig {
    /// Directory holding the sealed key record, citation and account records.
    pub directory: PathBuf,
    /// Prefix for this notary's record names.
    pub name: String,
    /// Protocol version new signatures and citations are produced under.
    pub protocol: Protocol,
    pub log_dir: PathBuf,
    pub json_logs: bool,
}

impl Default for NotaryConfig {
    fn default() -> Self {
        NotaryConfig {
            directory: PathBuf::from(".notary"),
            name: "notary".into(),
            protocol: Protocol::CURRENT,
            log_dir: PathBuf::from("logs"),
            json_logs: false,
        }
    }
}

impl NotaryConfig {
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty()
            || !self
                .name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
        {
            return Err(NotaryError::Precondition(format!(
                "notary name {:?} may only contain letters, digits, '-' and '_'",
                self.name
            )));
        }
        if self.directory.as_os_str().is_empty() {
            return Err(NotaryError::Precondition("notary directory must not be empty".into()));
        }
        Ok(())
    }

    /// Record holding the sealed key material.
    pub fn keys_record(&self) -> String {
        format!("{}.keys", self.name)
    }

    /// Record holding the current certificate citation.
    pub fn citation_record(&self) -> String {
        format!("{}.citation", self.name)
    }
}
