//! AES-256-GCM sealing for records that must be encrypted at rest.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::RngCore;
use zeroize::Zeroizing;

use crate::error::{NotaryError, Result};

const NONCE_LENGTH: usize = 12;
const KEY_LENGTH: usize = 32;

/// Symmetric key protecting sealed records. Cleared from memory on drop.
pub struct SealingKey {
    key: Zeroizing<[u8; KEY_LENGTH]>,
}

impl SealingKey {
    /// Fresh random key.
    pub fn generate() -> Self {
        let mut key = Zeroizing::new([0u8; KEY_LENGTH]);
        rand::rngs::OsRng.fill_bytes(&mut key[..]);
        SealingKey { key }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let array: [u8; KEY_LENGTH] = bytes
            .try_into()
            .map_err(|_| NotaryError::CryptoError(format!("sealing key must be {KEY_LENGTH} bytes")))?;
        Ok(SealingKey { key: Zeroizing::new(array) })
    }

    pub fn from_hex(text: &str) -> Result<Self> {
        let bytes = Zeroizing::new(
            hex::decode(text.trim()).map_err(|e| NotaryError::CryptoError(format!("sealing key is not hex: {e}")))?,
        );
        Self::from_bytes(&bytes)
    }

    pub fn to_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(&self.key[..]))
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key[..]))
    }

    /// Encrypt and authenticate; output is nonce || ciphertext.
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let mut nonce_bytes = [0u8; NONCE_LENGTH];
        rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);

        let ciphertext = self
            .cipher()
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
            .map_err(|e| NotaryError::CryptoError(format!("Encryption failed: {e:?}")))?;

        let mut sealed = nonce_bytes.to_vec();
        sealed.extend(ciphertext);
        Ok(sealed)
    }

    /// Reverse of [`SealingKey::seal`]; fails on truncation or tampering.
    pub fn unseal(&self, sealed: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        if sealed.len() < NONCE_LENGTH {
            return Err(NotaryError::CryptoError("Invalid sealed data".into()));
        }
        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LENGTH);
        let plaintext = self
            .cipher()
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|e| NotaryError::CryptoError(format!("Decryption failed: {e:?}")))?;
        Ok(Zeroizing::new(plaintext))
    }
}

impl std::fmt::Debug for SealingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SealingKey").field("key", &"<redacted>").finish()
    }
}
