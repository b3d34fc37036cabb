// crates/corvusforge-crypto/src/native.rs
// ============================================================================
// Module: Native Ed25519 Provider
// Description: The middle tier of the crypto provider chain, backed directly
// by `ed25519-dalek`.
// Purpose: Provide real signing and verification when no extended provider
// is available.
// Dependencies: ed25519-dalek, rand, corvusforge-core
// ============================================================================

//! ## Overview
//! This is the provider every deployment can rely on: no external module
//! loading, no optional feature, just `ed25519-dalek` over raw key bytes
//! encoded as hex. [`ExtendedCryptoProvider`](crate::ExtendedCryptoProvider)
//! wraps this provider when its extra capabilities are available;
//! [`FailClosedProvider`](crate::FailClosedProvider) is what remains when
//! even this one cannot be constructed.

use corvusforge_core::CryptoError;
use corvusforge_core::CryptoProvider;
use corvusforge_core::VerifiedSignature;
use ed25519_dalek::Signature;
use ed25519_dalek::Signer;
use ed25519_dalek::SigningKey;
use ed25519_dalek::VerifyingKey;
use rand::rngs::OsRng;

/// Signs and verifies using `ed25519-dalek` directly over hex-encoded key
/// material.
///
/// # Invariants
/// - Never panics on malformed input; malformed hex or key bytes are
///   reported as [`CryptoError::InvalidKey`] (for signing) or fold into
///   `Ok(None)` (for verification).
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeEd25519Provider;

impl NativeEd25519Provider {
    /// Creates a new native provider. Construction never fails; this tier
    /// has no external dependency to probe.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl CryptoProvider for NativeEd25519Provider {
    fn name(&self) -> &'static str {
        "native_ed25519"
    }

    fn is_real_provider(&self) -> bool {
        true
    }

    fn generate_keypair(&self) -> Result<(String, String), CryptoError> {
        let signing_key = SigningKey::generate(&mut OsRng);
        let verifying_key = signing_key.verifying_key();
        let private_hex = hex_encode(&signing_key.to_bytes());
        let public_hex = hex_encode(verifying_key.as_bytes());
        Ok((private_hex, public_hex))
    }

    fn sign(&self, bytes: &[u8], private_hex: &str) -> Result<String, CryptoError> {
        let key_bytes = decode_hex_32(private_hex)
            .ok_or_else(|| CryptoError::InvalidKey("private key is not 32 hex-encoded bytes".to_string()))?;
        let signing_key = SigningKey::from_bytes(&key_bytes);
        let signature = signing_key.sign(bytes);
        Ok(hex_encode(&signature.to_bytes()))
    }

    fn verify(
        &self,
        bytes: &[u8],
        signature_hex: &str,
        public_hex: &str,
    ) -> Result<Option<VerifiedSignature>, CryptoError> {
        let Some(key_bytes) = decode_hex_32(public_hex) else {
            return Ok(None);
        };
        let Ok(verifying_key) = VerifyingKey::from_bytes(&key_bytes) else {
            return Ok(None);
        };
        let Some(sig_bytes) = decode_hex_64(signature_hex) else {
            return Ok(None);
        };
        let signature = Signature::from_bytes(&sig_bytes);
        if verifying_key.verify_strict(bytes, &signature).is_ok() {
            Ok(Some(VerifiedSignature::new(public_hex.to_string())))
        } else {
            Ok(None)
        }
    }
}

/// Decodes exactly 32 bytes of lowercase or uppercase hex, returning `None`
/// on any malformed input rather than erroring.
pub(crate) fn decode_hex_32(hex: &str) -> Option<[u8; 32]> {
    let bytes = decode_hex(hex)?;
    bytes.try_into().ok()
}

/// Decodes exactly 64 bytes of hex.
pub(crate) fn decode_hex_64(hex: &str) -> Option<[u8; 64]> {
    let bytes = decode_hex(hex)?;
    bytes.try_into().ok()
}

/// Decodes a hex string to bytes, returning `None` on odd length or any
/// non-hex character instead of panicking.
pub(crate) fn decode_hex(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return None;
    }
    let mut out = Vec::with_capacity(hex.len() / 2);
    let bytes = hex.as_bytes();
    for pair in bytes.chunks_exact(2) {
        let high = (pair[0] as char).to_digit(16)?;
        let low = (pair[1] as char).to_digit(16)?;
        out.push(((high << 4) | low) as u8);
    }
    Some(out)
}

/// Encodes bytes as a lowercase hex string.
pub(crate) fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX[(byte >> 4) as usize] as char);
        out.push(HEX[(byte & 0x0f) as usize] as char);
    }
    out
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "test assertions use unwrap for brevity")]
    use super::*;

    #[test]
    fn signs_and_verifies_round_trip() {
        let provider = NativeEd25519Provider::new();
        let (private_hex, public_hex) = provider.generate_keypair().unwrap();
        let signature = provider.sign(b"payload", &private_hex).unwrap();
        let verified = provider.verify(b"payload", &signature, &public_hex).unwrap();
        assert!(verified.is_some());
    }

    #[test]
    fn rejects_tampered_payload() {
        let provider = NativeEd25519Provider::new();
        let (private_hex, public_hex) = provider.generate_keypair().unwrap();
        let signature = provider.sign(b"payload", &private_hex).unwrap();
        let verified = provider.verify(b"tampered", &signature, &public_hex).unwrap();
        assert!(verified.is_none());
    }

    #[test]
    fn rejects_malformed_hex_without_erroring() {
        let provider = NativeEd25519Provider::new();
        let result = provider.verify(b"payload", "not-hex", "also-not-hex").unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn rejects_malformed_private_key_on_sign() {
        let provider = NativeEd25519Provider::new();
        let result = provider.sign(b"payload", "short");
        assert!(matches!(result, Err(CryptoError::InvalidKey(_))));
    }
}
