//! Ed25519 key generation, signing and verification, pure and SHA-512 prehashed.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand_core::OsRng;
use sha2::{Digest, Sha512};

use crate::error::{NotaryError, Result};

pub const SECRET_KEY_LENGTH: usize = ed25519_dalek::SECRET_KEY_LENGTH;
pub const PUBLIC_KEY_LENGTH: usize = ed25519_dalek::PUBLIC_KEY_LENGTH;

/// Domain separation context for prehashed signatures.
const PREHASH_CONTEXT: &[u8] = b"notary-ed25519ph";

/// How the message is fed to Ed25519.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureScheme {
    /// Ed25519 over the raw bytes.
    Pure,
    /// Ed25519ph over a SHA-512 prehash of the bytes.
    Prehashed,
}

/// Draw a fresh signing key from the OS random source.
pub fn generate_signing_key() -> SigningKey {
    SigningKey::generate(&mut OsRng)
}

/// Rebuild a signing key from its persisted secret bytes.
pub fn signing_key_from_bytes(bytes: &[u8]) -> Result<SigningKey> {
    let secret: [u8; SECRET_KEY_LENGTH] = bytes
        .try_into()
        .map_err(|_| NotaryError::CryptoError(format!("private key must be {SECRET_KEY_LENGTH} bytes")))?;
    Ok(SigningKey::from_bytes(&secret))
}

/// Sign a message under the given scheme.
pub fn sign(scheme: SignatureScheme, key: &SigningKey, message: &[u8]) -> Result<Vec<u8>> {
    let signature = match scheme {
        SignatureScheme::Pure => key.sign(message),
        SignatureScheme::Prehashed => {
            let mut prehash = Sha512::new();
            prehash.update(message);
            key.sign_prehashed(prehash, Some(PREHASH_CONTEXT))
                .map_err(|e| NotaryError::CryptoError(format!("Prehashed signing failed: {e:?}")))?
        }
    };
    Ok(signature.to_bytes().to_vec())
}

/// Verify a signature against a message and public key.
///
/// A malformed public key is an error; a signature that is the wrong size or
/// does not verify is simply `false`.
pub fn verify_signature(
    scheme: SignatureScheme,
    pubkey_bytes: &[u8],
    message: &[u8],
    signature_bytes: &[u8],
) -> Result<bool> {
    let pubkey_array: [u8; PUBLIC_KEY_LENGTH] = pubkey_bytes
        .try_into()
        .map_err(|_| NotaryError::malformed("public key has the wrong length", hex::encode(pubkey_bytes)))?;
    let pubkey = VerifyingKey::from_bytes(&pubkey_array)
        .map_err(|e| NotaryError::malformed(format!("Invalid public key: {e:?}"), hex::encode(pubkey_bytes)))?;

    let Ok(signature) = Signature::from_slice(signature_bytes) else {
        return Ok(false);
    };

    let verified = match scheme {
        SignatureScheme::Pure => pubkey.verify(message, &signature).is_ok(),
        SignatureScheme::Prehashed => {
            let mut prehash = Sha512::new();
            prehash.update(message);
            pubkey
                .verify_prehashed(prehash, Some(PREHASH_CONTEXT), &signature)
                .is_ok()
        }
    };
    Ok(verified)
}
