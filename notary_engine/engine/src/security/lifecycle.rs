//! Key-lifecycle state machine.
//!
//! Three states: `Keyless`, `LoneKey` (one active pair) and `TwoKeys` (an
//! active pair plus the previous private key, pending exactly one more use).
//!
//! | State   | GenerateKeys | SignBytes                     | RotateKeys |
//! |---------|--------------|-------------------------------|------------|
//! | Keyless | -> LoneKey   | illegal                       | illegal    |
//! | LoneKey | illegal      | -> LoneKey (current key)      | -> TwoKeys |
//! | TwoKeys | illegal      | -> LoneKey (previous, erased) | illegal    |
//!
//! [`Custody`] encodes the table in the type system: each method exists only
//! on the states that permit it. [`KeyState`] is the runtime form a module
//! holds and persists; its transitions are checked against
//! [`KeyLifecycle::next`] and never mutate in place.

use ed25519_dalek::SigningKey;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::signing;
use crate::error::{NotaryError, Result};
use crate::protocol::Protocol;
use crate::types::{Tag, b64};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyLifecycle {
    Keyless,
    LoneKey,
    TwoKeys,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyEvent {
    GenerateKeys,
    SignBytes,
    RotateKeys,
}

impl KeyLifecycle {
    /// The transition table. Any pair not listed is illegal.
    pub fn next(self, event: KeyEvent) -> Result<KeyLifecycle> {
        use KeyEvent::*;
        use KeyLifecycle::*;

        match (self, event) {
            (Keyless, GenerateKeys) => Ok(LoneKey),
            (LoneKey, SignBytes) => Ok(LoneKey),
            (LoneKey, RotateKeys) => Ok(TwoKeys),
            (TwoKeys, SignBytes) => Ok(LoneKey),
            (state, event) => Err(NotaryError::illegal(state, event)),
        }
    }
}

// ==============================
// Type-state custody
// ==============================

#[derive(Clone)]
pub struct Keyless;

#[derive(Clone)]
pub struct LoneKey {
    current: SigningKey,
}

#[derive(Clone)]
pub struct TwoKeys {
    current: SigningKey,
    previous: SigningKey,
}

/// Key material in a statically known lifecycle state.
#[derive(Clone)]
pub struct Custody<S> {
    state: S,
}

impl Custody<Keyless> {
    pub fn new() -> Self {
        Custody { state: Keyless }
    }

    /// One-time bootstrap of the first key pair.
    pub fn generate_keys(self) -> Custody<LoneKey> {
        Custody {
            state: LoneKey {
                current: signing::generate_signing_key(),
            },
        }
    }
}

impl Default for Custody<Keyless> {
    fn default() -> Self {
        Self::new()
    }
}

impl Custody<LoneKey> {
    pub fn public_key(&self) -> Vec<u8> {
        self.state.current.verifying_key().to_bytes().to_vec()
    }

    pub fn sign_bytes(&self, protocol: Protocol, bytes: &[u8]) -> Result<Vec<u8>> {
        protocol.sign(&self.state.current, bytes)
    }

    /// Replace the active pair, keeping the old private key for one endorsement.
    pub fn rotate_keys(self) -> Custody<TwoKeys> {
        let LoneKey { current } = self.state;
        Custody {
            state: TwoKeys {
                current: signing::generate_signing_key(),
                previous: current,
            },
        }
    }
}

impl Custody<TwoKeys> {
    /// Public key of the new (active) pair.
    pub fn public_key(&self) -> Vec<u8> {
        self.state.current.verifying_key().to_bytes().to_vec()
    }

    /// Public key of the pair awaiting its final use.
    pub fn previous_public_key(&self) -> Vec<u8> {
        self.state.previous.verifying_key().to_bytes().to_vec()
    }

    /// Sign with the previous key and discard it. On failure the custody is
    /// handed back untouched alongside the error.
    pub fn sign_bytes(
        self,
        protocol: Protocol,
        bytes: &[u8],
    ) -> std::result::Result<(Custody<LoneKey>, Vec<u8>), (Custody<TwoKeys>, NotaryError)> {
        match protocol.sign(&self.state.previous, bytes) {
            Ok(signature) => {
                let TwoKeys { current, .. } = self.state;
                Ok((Custody { state: LoneKey { current } }, signature))
            }
            Err(e) => Err((self, e)),
        }
    }
}

// ==============================
// Runtime form
// ==============================

/// Key material whose state is only known at runtime (loaded from storage).
#[derive(Clone)]
pub enum KeyState {
    Keyless(Custody<Keyless>),
    LoneKey(Custody<LoneKey>),
    TwoKeys(Custody<TwoKeys>),
}

impl KeyState {
    pub fn keyless() -> Self {
        KeyState::Keyless(Custody::new())
    }

    pub fn lifecycle(&self) -> KeyLifecycle {
        match self {
            KeyState::Keyless(_) => KeyLifecycle::Keyless,
            KeyState::LoneKey(_) => KeyLifecycle::LoneKey,
            KeyState::TwoKeys(_) => KeyLifecycle::TwoKeys,
        }
    }

    /// Active public key, if any.
    pub fn public_key(&self) -> Option<Vec<u8>> {
        match self {
            KeyState::Keyless(_) => None,
            KeyState::LoneKey(custody) => Some(custody.public_key()),
            KeyState::TwoKeys(custody) => Some(custody.public_key()),
        }
    }

    pub fn generate_keys(&self) -> Result<KeyState> {
        let target = self.lifecycle().next(KeyEvent::GenerateKeys)?;
        let next = match self {
            KeyState::Keyless(custody) => KeyState::LoneKey(custody.clone().generate_keys()),
            _ => return Err(NotaryError::illegal(self.lifecycle(), KeyEvent::GenerateKeys)),
        };
        debug_assert_eq!(next.lifecycle(), target);
        Ok(next)
    }

    pub fn rotate_keys(&self) -> Result<KeyState> {
        let target = self.lifecycle().next(KeyEvent::RotateKeys)?;
        let next = match self {
            KeyState::LoneKey(custody) => KeyState::TwoKeys(custody.clone().rotate_keys()),
            _ => return Err(NotaryError::illegal(self.lifecycle(), KeyEvent::RotateKeys)),
        };
        debug_assert_eq!(next.lifecycle(), target);
        Ok(next)
    }

    /// Returns the successor state together with the signature.
    pub fn sign_bytes(&self, protocol: Protocol, bytes: &[u8]) -> Result<(KeyState, Vec<u8>)> {
        let target = self.lifecycle().next(KeyEvent::SignBytes)?;
        let (next, signature) = match self {
            KeyState::LoneKey(custody) => (self.clone(), custody.sign_bytes(protocol, bytes)?),
            KeyState::TwoKeys(custody) => {
                let (lone, signature) = custody.clone().sign_bytes(protocol, bytes).map_err(|(_, e)| e)?;
                (KeyState::LoneKey(lone), signature)
            }
            KeyState::Keyless(_) => return Err(NotaryError::illegal(self.lifecycle(), KeyEvent::SignBytes)),
        };
        debug_assert_eq!(next.lifecycle(), target);
        Ok((next, signature))
    }

    /// Persisted form of this state.
    pub fn to_record(&self, tag: &Tag, protocol: Protocol) -> KeyRecord {
        let (public_key, private_key, previous_private_key) = match self {
            KeyState::Keyless(_) => (None, None, None),
            KeyState::LoneKey(custody) => (
                Some(custody.public_key()),
                Some(custody.state.current.to_bytes().to_vec()),
                None,
            ),
            KeyState::TwoKeys(custody) => (
                Some(custody.public_key()),
                Some(custody.state.current.to_bytes().to_vec()),
                Some(custody.state.previous.to_bytes().to_vec()),
            ),
        };
        KeyRecord {
            tag: tag.clone(),
            protocol: protocol.version().to_string(),
            state: self.lifecycle(),
            public_key,
            private_key,
            previous_private_key,
        }
    }

    /// Rebuild a state from its record, rejecting any field set that
    /// disagrees with the recorded state.
    pub fn from_record(record: &KeyRecord) -> Result<KeyState> {
        let shape_error = |reason: &str| {
            NotaryError::malformed(
                format!("key record for {} is inconsistent: {reason}", record.tag),
                format!("{:?}", record.state),
            )
        };

        let state = match (
            record.state,
            &record.public_key,
            &record.private_key,
            &record.previous_private_key,
        ) {
            (KeyLifecycle::Keyless, None, None, None) => KeyState::keyless(),
            (KeyLifecycle::LoneKey, Some(public), Some(private), None) => {
                let current = signing::signing_key_from_bytes(private)?;
                let state = KeyState::LoneKey(Custody {
                    state: LoneKey { current },
                });
                check_public_key(&state, public).map_err(|_| shape_error("public key does not match private key"))?;
                state
            }
            (KeyLifecycle::TwoKeys, Some(public), Some(private), Some(previous)) => {
                let current = signing::signing_key_from_bytes(private)?;
                let previous = signing::signing_key_from_bytes(previous)?;
                let state = KeyState::TwoKeys(Custody {
                    state: TwoKeys { current, previous },
                });
                check_public_key(&state, public).map_err(|_| shape_error("public key does not match private key"))?;
                state
            }
            (KeyLifecycle::Keyless, ..) => return Err(shape_error("keyless state carries key material")),
            (KeyLifecycle::LoneKey, ..) => return Err(shape_error("lone key state needs exactly one key pair")),
            (KeyLifecycle::TwoKeys, ..) => return Err(shape_error("two key state needs a pair and a previous key")),
        };
        Ok(state)
    }
}

fn check_public_key(state: &KeyState, expected: &[u8]) -> Result<()> {
    match state.public_key() {
        Some(actual) if actual == expected => Ok(()),
        _ => Err(NotaryError::CryptoError("public key mismatch".into())),
    }
}

/// What a software module writes (sealed) to its vault record.
#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
pub struct KeyRecord {
    #[zeroize(skip)]
    pub tag: Tag,
    #[zeroize(skip)]
    pub protocol: String,
    #[zeroize(skip)]
    pub state: KeyLifecycle,
    #[serde(with = "b64::option", default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<Vec<u8>>,
    #[serde(with = "b64::option", default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<Vec<u8>>,
    #[serde(with = "b64::option", default, skip_serializing_if = "Option::is_none")]
    pub previous_private_key: Option<Vec<u8>>,
}
