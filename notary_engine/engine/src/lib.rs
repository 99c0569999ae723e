//! Digital Notary Core Library
//!
//! Issues and rotates a signing identity (a key pair bound to a chain of
//! certificates), signs documents on its behalf, and verifies signatures and
//! citations made under the current or an earlier protocol version.

pub mod agent;
pub mod audit;
pub mod config;
pub mod crypto;
pub mod document;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod registry;
pub mod security;
pub mod types;
pub mod vault;

#[cfg(test)]
mod tests;

pub use agent::DigitalNotary;
pub use document::{Certificate, ChainKind, Citation, Contract, Credential, Document, Parameters};
pub use error::{NotaryError, Result};
pub use protocol::Protocol;
pub use security::{HardenedModule, KeyEvent, KeyLifecycle, SoftwareModule, TrustedModule};
pub use types::{Tag, Version};
