//! Kernel-wide constants: sizes, the inclusion-proof cost model, and the
//! default lease bound.

// ── Key material sizes ────────────────────────────────────────────────────────

/// SEC1-compressed secp256k1 public key length, used as a wallet's [`crate::types::WalletId`].
pub const SEC1_COMPRESSED_PUBKEY_LEN: usize = 33;

/// Uncompressed secp256k1 public key length (`0x04 || X || Y`).
pub const SEC1_UNCOMPRESSED_PUBKEY_LEN: usize = 65;

/// X25519 public/secret key length.
pub const X25519_KEY_LEN: usize = 32;

/// ChaCha20-Poly1305 extended (XChaCha20) nonce length used by the key-export envelope.
pub const XCHACHA_NONCE_LEN: usize = 24;

// ── Lease defaults ─────────────────────────────────────────────────────────────

/// Upper bound on a single lease's lifetime, in seconds, regardless of the
/// expiry requested by the installing policy.
pub const MAX_LEASE_LIFETIME_SECS: i64 = 365 * 24 * 3600;

/// Number of random retries `transfer_ownership` attempts before giving up on
/// an `accountIndex` collision against the recipient's existing wallets.
pub const ACCOUNT_INDEX_COLLISION_RETRIES: u32 = 8;

// ── Ethereum-transaction sub-policy cost model (spec §4.6) ───────────────────

/// `estimateInclusionProofCost(L) = ((L / 1024) * 86853 + 289032) * 100 * 1e9` wei.
///
/// Coefficients are calibrated to the proof verifier's gas curve. Monotone
/// non-decreasing in `L`; implementers may recalibrate but must preserve that.
pub fn estimate_inclusion_proof_cost(payload_len: usize) -> u128 {
    let l = payload_len as u128;
    ((l / 1024) * 86_853 + 289_032) * 100 * 1_000_000_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cost_model_is_monotone() {
        let mut prev = 0u128;
        for len in [0usize, 1, 1023, 1024, 1025, 4096, 1_000_000] {
            let cost = estimate_inclusion_proof_cost(len);
            assert!(cost >= prev);
            prev = cost;
        }
    }

    #[test]
    fn cost_model_base_value() {
        assert_eq!(estimate_inclusion_proof_cost(0), 289_032 * 100 * 1_000_000_000);
    }
}
