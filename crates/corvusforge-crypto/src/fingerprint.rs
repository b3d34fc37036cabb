// crates/corvusforge-crypto/src/fingerprint.rs
// ============================================================================
// Module: Key Fingerprinting and Trust Context
// Description: Deterministic key fingerprints, trust-context computation,
// PIN hashing, and the fail-closed `verify_data` contract.
// Purpose: Give callers a single boolean verification entry point that can
// never report "verified" on malformed input or provider failure.
// Dependencies: corvusforge-core, rand
// ============================================================================

//! ## Overview
//! `verify_data` is the contract the rest of the system actually calls: it
//! returns `true` only when the selected provider is a real backend, the
//! signature is syntactically well-formed, and the cryptographic check
//! succeeds. Every other condition — malformed hex, an empty signature, a
//! missing key, or a fail-closed provider — returns `false`. No code path in
//! this module may return `true` from a caught error.

use corvusforge_core::CryptoProvider;
use corvusforge_core::TrustContext;
use rand::RngCore;
use rand::rngs::OsRng;

use crate::native::hex_encode;

/// Length, in hex characters, of a key fingerprint.
const FINGERPRINT_HEX_LEN: usize = 16;

/// Returns the fingerprint of `public_hex`: the first 16 hex characters of
/// the SHA-256 digest of its decoded bytes (or of the raw string bytes, if
/// `public_hex` is not valid hex).
#[must_use]
pub fn key_fingerprint(public_hex: &str) -> String {
    let bytes = crate::native::decode_hex(public_hex).unwrap_or_else(|| public_hex.as_bytes().to_vec());
    let digest = corvusforge_core::sha256_hex(&bytes);
    digest.chars().take(FINGERPRINT_HEX_LEN).collect()
}

/// Computes the trust context sealed into every ledger entry, fingerprinting
/// whichever of the three keys are present and leaving the rest empty.
#[must_use]
pub fn compute_trust_context(
    plugin_trust_root: Option<&str>,
    waiver_signing_key: Option<&str>,
    anchor_key: Option<&str>,
) -> TrustContext {
    TrustContext {
        plugin_trust_root_fp: plugin_trust_root.map(key_fingerprint).unwrap_or_default(),
        waiver_signing_key_fp: waiver_signing_key.map(key_fingerprint).unwrap_or_default(),
        anchor_key_fp: anchor_key.map(key_fingerprint).unwrap_or_default(),
    }
}

/// Hashes `pin` against `salt` (generating 16 random bytes if `salt` is
/// `None`), returning `"<salt_hex>:<sha256(salt||pin)_hex>"`.
#[must_use]
pub fn hash_pin(pin: &str, salt: Option<&[u8]>) -> String {
    let owned_salt;
    let salt_bytes: &[u8] = match salt {
        Some(bytes) => bytes,
        None => {
            let mut generated = [0u8; 16];
            OsRng.fill_bytes(&mut generated);
            owned_salt = generated;
            &owned_salt
        }
    };
    let mut combined = Vec::with_capacity(salt_bytes.len() + pin.len());
    combined.extend_from_slice(salt_bytes);
    combined.extend_from_slice(pin.as_bytes());
    let digest = corvusforge_core::sha256_hex(&combined);
    format!("{}:{digest}", hex_encode(salt_bytes))
}

/// The fail-closed verification contract.
///
/// Returns `true` only when `provider` is a real crypto provider and the
/// signature verifies; any malformed input, missing key, or provider
/// failure returns `false` rather than propagating an error.
#[must_use]
pub fn verify_data(
    provider: &dyn CryptoProvider,
    bytes: &[u8],
    signature_hex: &str,
    public_hex: &str,
) -> bool {
    if !provider.is_real_provider() {
        return false;
    }
    if signature_hex.is_empty() || public_hex.is_empty() {
        return false;
    }
    matches!(provider.verify(bytes, signature_hex, public_hex), Ok(Some(_)))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "test assertions use unwrap for brevity")]
    use super::*;
    use crate::fail_closed::FailClosedProvider;
    use crate::native::NativeEd25519Provider;

    #[test]
    fn key_fingerprint_is_16_hex_chars() {
        let fp = key_fingerprint("aabbccdd");
        assert_eq!(fp.len(), 16);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn compute_trust_context_leaves_absent_keys_empty() {
        let ctx = compute_trust_context(Some("aabb"), None, None);
        assert!(!ctx.plugin_trust_root_fp.is_empty());
        assert!(ctx.waiver_signing_key_fp.is_empty());
        assert!(ctx.anchor_key_fp.is_empty());
    }

    #[test]
    fn hash_pin_round_trips_with_explicit_salt() {
        let salt = [1u8; 16];
        let first = hash_pin("secret", Some(&salt));
        let second = hash_pin("secret", Some(&salt));
        assert_eq!(first, second);
        assert!(first.contains(':'));
    }

    #[test]
    fn hash_pin_generates_salt_when_absent() {
        let a = hash_pin("secret", None);
        let b = hash_pin("secret", None);
        assert_ne!(a, b);
    }

    #[test]
    fn verify_data_false_for_fail_closed_provider() {
        let provider = FailClosedProvider::new();
        assert!(!verify_data(&provider, b"payload", "aabb", "ccdd"));
    }

    #[test]
    fn verify_data_false_for_empty_signature() {
        let provider = NativeEd25519Provider::new();
        assert!(!verify_data(&provider, b"payload", "", "ccdd"));
    }

    #[test]
    fn verify_data_true_for_valid_native_signature() {
        let provider = NativeEd25519Provider::new();
        let (private_hex, public_hex) = provider.generate_keypair().unwrap();
        let signature = provider.sign(b"payload", &private_hex).unwrap();
        assert!(verify_data(&provider, b"payload", &signature, &public_hex));
    }
}
