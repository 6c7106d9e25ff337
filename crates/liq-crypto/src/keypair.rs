use liq_core::error::LiqError;
use liq_core::types::{Address, DerSignature, WalletId};
use secp256k1::{ecdsa, Message, PublicKey, Secp256k1, SecretKey};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::hash::address_from_pubkey;

/// Verify a DER-encoded ECDSA signature over a 32-byte digest against a
/// SEC1-compressed public key. Used where the source would recover the
/// signer from the signature directly — our host's `sign_prehashed`
/// primitive returns a plain (non-recoverable) DER signature, so the
/// equivalent sanity check is verifying against the claimed signer's known
/// public key rather than point-recovering it.
pub fn verify_prehashed(wallet_id: &WalletId, digest: [u8; 32], sig: &DerSignature) -> Result<(), LiqError> {
    let pubkey = PublicKey::from_slice(&wallet_id.0)
        .map_err(|e| LiqError::Other(format!("invalid public key: {e}")))?;
    let parsed = ecdsa::Signature::from_der(&sig.0)
        .map_err(|e| LiqError::Other(format!("invalid DER signature: {e}")))?;
    let secp = Secp256k1::verification_only();
    let msg = Message::from_digest(digest);
    secp.verify_ecdsa(&msg, &parsed, &pubkey)
        .map_err(|_| LiqError::ProofMismatch)
}

/// A secp256k1 keypair: public key + secret key, with the wallet's derived
/// Ethereum-style address cached alongside.
///
/// The secret key is held in a `Zeroizing<Vec<u8>>` so it is wiped from
/// memory on drop; nothing outside this module ever sees it unredacted.
#[derive(Serialize, Deserialize)]
pub struct KeyPair {
    pub wallet_id: WalletId,
    pub address: Address,
    secret_key: Vec<u8>,
}

impl KeyPair {
    /// Generate a fresh secp256k1 keypair using the given RNG.
    pub fn generate<R: rand::Rng + rand::CryptoRng>(rng: &mut R) -> Self {
        let secp = Secp256k1::signing_only();
        let (sk, pk) = secp.generate_keypair(rng);
        Self::from_secret_key(&sk, &pk)
    }

    fn from_secret_key(sk: &SecretKey, pk: &PublicKey) -> Self {
        let wallet_id = WalletId(pk.serialize());
        let address = address_from_pubkey(pk);
        Self {
            wallet_id,
            address,
            secret_key: sk.secret_bytes().to_vec(),
        }
    }

    /// Restore a keypair from a raw 32-byte secret key (e.g. decrypted from
    /// a key-export envelope, or loaded from confidential storage).
    pub fn from_raw_secret(sk_bytes: &[u8]) -> Result<Self, secp256k1::Error> {
        let sk = SecretKey::from_slice(sk_bytes)?;
        let secp = Secp256k1::signing_only();
        let pk = PublicKey::from_secret_key(&secp, &sk);
        Ok(Self::from_secret_key(&sk, &pk))
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey::from_slice(&self.wallet_id.0).expect("stored pubkey is always valid")
    }

    /// Sign a pre-hashed 32-byte digest, returning a DER-encoded signature.
    /// This is the host's `sign_prehashed` primitive in production form.
    pub fn sign_prehashed(&self, digest: [u8; 32]) -> DerSignature {
        let secp = Secp256k1::signing_only();
        let sk = SecretKey::from_slice(&self.secret_key).expect("stored secret key is valid");
        let msg = Message::from_digest(digest);
        let sig: ecdsa::Signature = secp.sign_ecdsa(&msg, &sk);
        DerSignature(sig.serialize_der().to_vec())
    }

    /// Return a zeroizing copy of the raw 32-byte secret key, for export.
    pub fn export_secret(&self) -> Zeroizing<Vec<u8>> {
        Zeroizing::new(self.secret_key.clone())
    }
}

impl Drop for KeyPair {
    fn drop(&mut self) {
        use zeroize::Zeroize;
        self.secret_key.zeroize();
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyPair {{ address: {:?} }}", self.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secp256k1::ecdsa::Signature;

    #[test]
    fn sign_and_verify_roundtrip() {
        let mut rng = rand::thread_rng();
        let kp = KeyPair::generate(&mut rng);
        let digest = [7u8; 32];
        let sig = kp.sign_prehashed(digest);

        let secp = Secp256k1::verification_only();
        let msg = Message::from_digest(digest);
        let parsed = Signature::from_der(&sig.0).unwrap();
        assert!(secp.verify_ecdsa(&msg, &parsed, &kp.public_key()).is_ok());
    }

    #[test]
    fn from_raw_secret_recovers_same_address() {
        let mut rng = rand::thread_rng();
        let kp = KeyPair::generate(&mut rng);
        let secret = kp.export_secret();
        let kp2 = KeyPair::from_raw_secret(&secret).unwrap();
        assert_eq!(kp.address, kp2.address);
    }
}
