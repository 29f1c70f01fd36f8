//! Attestation of computed outputs.
//!
//! Only a mock implementation is provided: it signs with HMAC-SHA256 under a
//! per-instance secret. Nothing here is hardware-backed.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Describes the environment outputs are attested from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestationReport {
    /// Identifier sent with every signed output as `X-Attestation-Id`.
    pub attestation_id: String,
    /// Hex digest identifying the measured code.
    pub measurement: String,
    /// Identifier of the signing key.
    pub key_id: String,
    /// When the report was produced.
    pub issued_at: DateTime<Utc>,
    /// Whether the report comes from a mock attestor.
    pub mock: bool,
}

/// Produces attestation reports and output signatures.
pub trait Attestor: Send + Sync {
    /// The current attestation report.
    fn report(&self) -> AttestationReport;

    /// Signs `message`, returning a base64 signature.
    fn sign(&self, message: &[u8]) -> String;

    /// Checks a signature produced by [`sign`](Attestor::sign).
    fn verify(&self, message: &[u8], signature: &str) -> bool {
        self.sign(message) == signature
    }
}

/// HMAC-based stand-in for a hardware attestor.
#[derive(Clone)]
pub struct MockAttestor {
    attestation_id: String,
    key_id: String,
    mac: HmacSha256,
    issued_at: DateTime<Utc>,
}

impl std::fmt::Debug for MockAttestor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockAttestor")
            .field("attestation_id", &self.attestation_id)
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

impl Default for MockAttestor {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAttestor {
    /// Creates an attestor with a fresh id and a random 64-byte key.
    pub fn new() -> Self {
        let mut secret = [0u8; 64];
        for chunk in secret.chunks_mut(16) {
            chunk.copy_from_slice(Uuid::new_v4().as_bytes());
        }
        Self {
            attestation_id: Uuid::new_v4().to_string(),
            key_id: hex::encode(&Sha256::digest(secret)[..8]),
            mac: <HmacSha256 as KeyInit>::new(&secret.into()),
            issued_at: Utc::now(),
        }
    }

    fn keyed(&self, message: &[u8]) -> HmacSha256 {
        let mut mac = self.mac.clone();
        mac.update(message);
        mac
    }
}

impl Attestor for MockAttestor {
    fn report(&self) -> AttestationReport {
        AttestationReport {
            attestation_id: self.attestation_id.clone(),
            measurement: hex::encode(Sha256::digest(concat!(
                env!("CARGO_PKG_NAME"),
                "@",
                env!("CARGO_PKG_VERSION")
            ))),
            key_id: self.key_id.clone(),
            issued_at: self.issued_at,
            mock: true,
        }
    }

    fn sign(&self, message: &[u8]) -> String {
        STANDARD.encode(self.keyed(message).finalize().into_bytes())
    }

    fn verify(&self, message: &[u8], signature: &str) -> bool {
        STANDARD
            .decode(signature)
            .is_ok_and(|tag| self.keyed(message).verify_slice(&tag).is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signatures_verify_only_for_the_signed_message() {
        let attestor = MockAttestor::new();
        let signature = attestor.sign(b"16");
        assert!(attestor.verify(b"16", &signature));
        assert!(!attestor.verify(b"17", &signature));
        assert!(!MockAttestor::new().verify(b"16", &signature));
        assert!(!attestor.verify(b"16", "not base64!"));
        assert!(!attestor.verify(b"16", &STANDARD.encode([0u8; 32])));
    }

    #[test]
    fn signature_is_a_32_byte_hmac_tag() {
        let attestor = MockAttestor::new();
        let tag = STANDARD.decode(attestor.sign(b"16")).unwrap();
        assert_eq!(tag.len(), 32);
        assert_eq!(attestor.sign(b"16"), attestor.sign(b"16"));
    }

    #[test]
    fn report_is_stable_and_marked_mock() {
        let attestor = MockAttestor::new();
        let report = attestor.report();
        assert!(report.mock);
        assert_eq!(report.measurement.len(), 64);
        assert_eq!(report.key_id.len(), 16);
        assert_eq!(report, attestor.report());
    }
}
