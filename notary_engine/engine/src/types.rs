//! Shared identifier types: lineage tags, versions, and byte encodings.

use std::fmt;
use std::str::FromStr;

use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{NotaryError, Result};

/// Number of random bytes behind a tag.
pub const TAG_BYTES: usize = 20;

/// Opaque random identifier naming one document lineage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag(String);

impl Tag {
    /// Draw a fresh tag from the OS random source.
    pub fn generate() -> Self {
        let mut bytes = [0u8; TAG_BYTES];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Tag(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Tag {
    type Err = NotaryError;

    fn from_str(s: &str) -> Result<Self> {
        let valid = s.len() == TAG_BYTES * 2
            && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if !valid {
            return Err(NotaryError::malformed(
                format!("tag must be {} lowercase hex characters", TAG_BYTES * 2),
                s,
            ));
        }
        Ok(Tag(s.to_string()))
    }
}

impl Serialize for Tag {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Tag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Monotonic ordinal within one tag's lineage, starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Version(u32);

impl Version {
    pub const FIRST: Version = Version(1);

    pub fn new(ordinal: u32) -> Result<Self> {
        if ordinal == 0 {
            return Err(NotaryError::Precondition("versions start at 1".into()));
        }
        Ok(Version(ordinal))
    }

    pub fn ordinal(&self) -> u32 {
        self.0
    }

    pub fn next(&self) -> Result<Self> {
        self.0
            .checked_add(1)
            .map(Version)
            .ok_or_else(|| NotaryError::Precondition("version space exhausted".into()))
    }

    /// The version this one succeeds, if any.
    pub fn previous(&self) -> Option<Self> {
        (self.0 > 1).then(|| Version(self.0 - 1))
    }
}

impl TryFrom<u32> for Version {
    type Error = NotaryError;

    fn try_from(ordinal: u32) -> Result<Self> {
        Version::new(ordinal)
    }
}

impl From<Version> for u32 {
    fn from(version: Version) -> u32 {
        version.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl FromStr for Version {
    type Err = NotaryError;

    fn from_str(s: &str) -> Result<Self> {
        let ordinal = s
            .strip_prefix('v')
            .and_then(|digits| digits.parse::<u32>().ok())
            .ok_or_else(|| NotaryError::malformed("version must look like v<n>", s))?;
        Version::new(ordinal).map_err(|_| NotaryError::malformed("versions start at 1", s))
    }
}

/// Current time as an RFC 3339 string.
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// base64url (no padding) helpers for binary document fields.
pub mod b64 {
    use base64::Engine as _;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::error::{NotaryError, Result};

    pub fn encode(bytes: &[u8]) -> String {
        URL_SAFE_NO_PAD.encode(bytes)
    }

    pub fn decode(text: &str) -> Result<Vec<u8>> {
        URL_SAFE_NO_PAD
            .decode(text)
            .map_err(|e| NotaryError::malformed(format!("invalid base64url: {e}"), text))
    }

    pub fn serialize<S: Serializer>(bytes: &Vec<u8>, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        decode(&text).map_err(serde::de::Error::custom)
    }

    /// Same encoding for optional fields.
    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            bytes: &Option<Vec<u8>>,
            serializer: S,
        ) -> std::result::Result<S::Ok, S::Error> {
            match bytes {
                Some(bytes) => serializer.serialize_some(&super::encode(bytes)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> std::result::Result<Option<Vec<u8>>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|text| super::decode(&text).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}
