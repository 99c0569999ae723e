//! Versioned documents and their canonical byte form.
//!
//! Every document is a JSON object of content plus a parameter envelope
//! naming its type, lineage tag, version, permissions and (after version 1)
//! a citation to the version it succeeds. Canonical bytes are the compact
//! `serde_json` rendering: object keys sorted, absent optionals omitted.

pub mod certificate;
pub mod citation;
pub mod contract;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{NotaryError, Result};
use crate::types::{Tag, Version};

pub use certificate::Certificate;
pub use citation::{ChainKind, Citation};
pub use contract::{Contract, Credential};

pub const PUBLIC: &str = "public";
pub const PRIVATE: &str = "private";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Parameters {
    #[serde(rename = "type")]
    pub kind: String,
    pub tag: Tag,
    pub version: Version,
    pub permissions: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<Citation>,
}

impl Parameters {
    pub fn new(
        kind: impl Into<String>,
        tag: Tag,
        version: Version,
        permissions: impl Into<String>,
        previous: Option<Citation>,
    ) -> Result<Self> {
        let parameters = Parameters {
            kind: kind.into(),
            tag,
            version,
            permissions: permissions.into(),
            previous,
        };
        parameters.validate()?;
        Ok(parameters)
    }

    /// Version 1 has no previous citation; version n > 1 cites version n-1
    /// of the same tag.
    pub fn validate(&self) -> Result<()> {
        if self.kind.trim().is_empty() {
            return Err(NotaryError::Precondition("document type must not be empty".into()));
        }
        match (self.version.previous(), &self.previous) {
            (None, None) => Ok(()),
            (None, Some(previous)) => Err(NotaryError::Precondition(format!(
                "version 1 of {} must not cite a previous version (cites {}:{})",
                self.tag, previous.tag, previous.version
            ))),
            (Some(expected), None) => Err(NotaryError::Precondition(format!(
                "{}:{} must cite {}:{}",
                self.tag, self.version, self.tag, expected
            ))),
            (Some(expected), Some(previous)) => {
                if previous.tag != self.tag || previous.version != expected {
                    return Err(NotaryError::Precondition(format!(
                        "{}:{} must cite {}:{} but cites {}:{}",
                        self.tag, self.version, self.tag, expected, previous.tag, previous.version
                    )));
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Document {
    pub content: Map<String, Value>,
    pub parameters: Parameters,
}

impl Document {
    pub fn new(content: Map<String, Value>, parameters: Parameters) -> Self {
        Document { content, parameters }
    }

    /// Version 1 of a new lineage with a freshly drawn tag.
    pub fn draft(kind: impl Into<String>, permissions: impl Into<String>, content: Value) -> Result<Self> {
        let Value::Object(content) = content else {
            return Err(NotaryError::Precondition("document content must be a JSON object".into()));
        };
        let parameters = Parameters::new(kind, Tag::generate(), Version::FIRST, permissions, None)?;
        Ok(Document::new(content, parameters))
    }

    /// Next version of this document, chained to `citation` (which must cite this version).
    pub fn successor(&self, citation: &Citation, content: Map<String, Value>) -> Result<Self> {
        if citation.tag != self.parameters.tag || citation.version != self.parameters.version {
            return Err(NotaryError::Precondition(format!(
                "citation {}:{} does not cite {}:{}",
                citation.tag, citation.version, self.parameters.tag, self.parameters.version
            )));
        }
        let parameters = Parameters::new(
            self.parameters.kind.clone(),
            self.parameters.tag.clone(),
            self.parameters.version.next()?,
            self.parameters.permissions.clone(),
            Some(citation.clone()),
        )?;
        Ok(Document::new(content, parameters))
    }

    pub fn tag(&self) -> &Tag {
        &self.parameters.tag
    }

    pub fn version(&self) -> Version {
        self.parameters.version
    }

    pub fn kind(&self) -> &str {
        &self.parameters.kind
    }

    pub fn canonical_bytes(&self) -> Result<Vec<u8>> {
        canonical_bytes(self)
    }

    pub fn parse(text: &str) -> Result<Self> {
        let document: Document = parse(text, "document")?;
        document
            .parameters
            .validate()
            .map_err(|e| NotaryError::malformed(e.to_string(), text))?;
        Ok(document)
    }
}

pub(crate) fn canonical_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| NotaryError::malformed(format!("serialization failed: {e}"), ""))
}

pub(crate) fn parse<T: serde::de::DeserializeOwned>(text: &str, what: &str) -> Result<T> {
    serde_json::from_str(text).map_err(|e| NotaryError::malformed(format!("invalid {what}: {e}"), text))
}
