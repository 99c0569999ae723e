use crate::error::Result;
use crate::protocol::Protocol;
use crate::security::TrustedModule;

/// Keyless trusted module for one protocol version.
#[derive(Debug, Clone, Copy)]
pub struct ProtocolVerifier {
    protocol: Protocol,
}

impl ProtocolVerifier {
    pub fn new(protocol: Protocol) -> Self {
        Self { protocol }
    }
}

impl TrustedModule for ProtocolVerifier {
    fn protocol(&self) -> &str {
        self.protocol.version()
    }

    fn digest_algorithm(&self) -> &str {
        self.protocol.digest_algorithm()
    }

    fn digest_bytes(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        Ok(self.protocol.digest(bytes))
    }

    fn signature_algorithm(&self) -> &str {
        self.protocol.signature_algorithm()
    }

    fn valid_signature(&self, public_key: &[u8], signature: &[u8], bytes: &[u8]) -> Result<bool> {
        self.protocol.verify(public_key, signature, bytes)
    }
}
