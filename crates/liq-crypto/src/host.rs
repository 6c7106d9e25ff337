//! The seam between the kernel and its confidential host: randomness and
//! secp256k1/X25519 key generation. Everything else the host supplies
//! (signing, AEAD, Keccak) is stateless and called directly as a free
//! function elsewhere in this crate — only generation needs to vary between
//! the production host and a deterministic test host.

use rand::rngs::OsRng;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret as X25519SecretKey};
use zeroize::Zeroizing;

use crate::keypair::KeyPair;

pub trait HostCrypto: Send + Sync {
    /// `n` fresh random bytes. `personalization` labels the call site so a
    /// deterministic test host can derive distinct streams per purpose
    /// without the caller managing a global counter.
    fn rand_bytes(&self, n: usize, personalization: &[u8]) -> Vec<u8>;

    fn gen_secp256k1_keypair(&self) -> KeyPair;

    /// Returns `(public, secret)` for an X25519 keypair.
    fn gen_x25519_keypair(&self) -> (X25519PublicKey, X25519SecretKey);
}

/// The production host: real OS randomness.
pub struct ProductionHost;

impl HostCrypto for ProductionHost {
    fn rand_bytes(&self, n: usize, _personalization: &[u8]) -> Vec<u8> {
        let mut buf = vec![0u8; n];
        OsRng.fill_bytes(&mut buf);
        buf
    }

    fn gen_secp256k1_keypair(&self) -> KeyPair {
        let mut rng = OsRng;
        KeyPair::generate(&mut rng)
    }

    fn gen_x25519_keypair(&self) -> (X25519PublicKey, X25519SecretKey) {
        let secret = X25519SecretKey::random_from_rng(OsRng);
        let public = X25519PublicKey::from(&secret);
        (public, secret)
    }
}

/// A fixed-seed host for reproducible tests. Every call draws from the same
/// `ChaCha20Rng` stream — tests that need isolation should construct a fresh
/// `DeterministicHost::new(seed)` per test rather than sharing one.
pub struct DeterministicHost {
    rng: std::sync::Mutex<ChaCha20Rng>,
}

impl DeterministicHost {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: std::sync::Mutex::new(ChaCha20Rng::seed_from_u64(seed)),
        }
    }
}

impl HostCrypto for DeterministicHost {
    fn rand_bytes(&self, n: usize, _personalization: &[u8]) -> Vec<u8> {
        let mut buf = vec![0u8; n];
        self.rng
            .lock()
            .expect("deterministic host lock poisoned")
            .fill_bytes(&mut buf);
        buf
    }

    fn gen_secp256k1_keypair(&self) -> KeyPair {
        let mut rng = self.rng.lock().expect("deterministic host lock poisoned");
        KeyPair::generate(&mut *rng)
    }

    fn gen_x25519_keypair(&self) -> (X25519PublicKey, X25519SecretKey) {
        let mut rng = self.rng.lock().expect("deterministic host lock poisoned");
        let secret = X25519SecretKey::random_from_rng(&mut *rng);
        let public = X25519PublicKey::from(&secret);
        (public, secret)
    }
}

/// A zeroizing wrapper for a raw X25519 secret, for the rare case where
/// storage (rather than an in-memory `X25519SecretKey`) needs to hold one.
pub type RawX25519Secret = Zeroizing<[u8; 32]>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_host_is_reproducible() {
        let a = DeterministicHost::new(42).rand_bytes(32, b"test");
        let b = DeterministicHost::new(42).rand_bytes(32, b"test");
        assert_eq!(a, b);
    }

    #[test]
    fn different_seeds_diverge() {
        let a = DeterministicHost::new(1).rand_bytes(32, b"test");
        let b = DeterministicHost::new(2).rand_bytes(32, b"test");
        assert_ne!(a, b);
    }
}
