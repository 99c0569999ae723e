//! Security module capabilities.
//!
//! A *trusted* module digests and verifies without holding a private key.
//! A *hardened* module additionally has custody of a key pair and mediates
//! every key-lifecycle transition. The protocol above is the same whether
//! the hardened module is [`software::SoftwareModule`] or isolated hardware.

pub mod lifecycle;
pub mod software;
pub mod verifier;

use crate::error::Result;
use crate::types::Tag;

pub use lifecycle::{KeyEvent, KeyLifecycle};
pub use software::SoftwareModule;
pub use verifier::ProtocolVerifier;

/// Digest and verification capability for one protocol version.
pub trait TrustedModule: Send + Sync {
    /// Protocol version identifier, e.g. `v2`.
    fn protocol(&self) -> &str;
    fn digest_algorithm(&self) -> &str;
    fn digest_bytes(&self, bytes: &[u8]) -> Result<Vec<u8>>;
    fn signature_algorithm(&self) -> &str;
    /// `Ok(false)` only for a bytes-level mismatch; unusable keys are errors.
    fn valid_signature(&self, public_key: &[u8], signature: &[u8], bytes: &[u8]) -> Result<bool>;
}

/// Full key custody.
pub trait HardenedModule: TrustedModule {
    fn as_trusted(&self) -> &dyn TrustedModule;
    /// Lineage tag of the identity held by this module.
    fn tag(&self) -> Result<Tag>;
    fn lifecycle(&self) -> Result<KeyLifecycle>;
    /// Active public key; `Uninitialized` when keyless.
    fn public_key(&self) -> Result<Vec<u8>>;
    /// `Keyless -> LoneKey`; returns the new public key.
    fn generate_keys(&self) -> Result<Vec<u8>>;
    /// `LoneKey -> TwoKeys`; returns the new public key.
    fn rotate_keys(&self) -> Result<Vec<u8>>;
    /// Signs with the pending previous key if one exists, else the current key.
    fn sign_bytes(&self, bytes: &[u8]) -> Result<Vec<u8>>;
    /// Discard all key material. Idempotent.
    fn erase_keys(&self) -> Result<()>;
}
