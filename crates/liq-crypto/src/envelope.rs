//! The "Curve25519 Envelope": the key-export transport described in spec §4.4.
//!
//! A recipient publishes an ephemeral X25519 public key; the kernel derives
//! a shared secret via Diffie-Hellman, stretches it through HKDF-SHA256, and
//! seals the exported secp256k1 private key under XChaCha20-Poly1305 with the
//! recipient's public key bound in as associated data.

use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use hkdf::Hkdf;
use rand::RngCore;
use sha3::Sha3_256;
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret as X25519SecretKey};

use liq_core::error::LiqError;

/// A sealed key-export envelope: the ephemeral sender public key, the nonce,
/// and the ciphertext (which includes the Poly1305 tag).
#[derive(Clone, Debug)]
pub struct Envelope {
    pub sender_pubkey: [u8; 32],
    pub nonce: [u8; 24],
    pub ciphertext: Vec<u8>,
}

fn derive_key(shared_secret: &[u8; 32], recipient_pubkey: &[u8; 32]) -> [u8; 32] {
    let hk = Hkdf::<Sha3_256>::new(Some(recipient_pubkey), shared_secret);
    let mut okm = [0u8; 32];
    hk.expand(b"liquefaction-key-export-v1", &mut okm)
        .expect("32 is a valid HKDF-SHA3-256 output length");
    okm
}

/// Seal `plaintext` (the exported private key) to `recipient_pubkey`,
/// generating a fresh ephemeral keypair and nonce for this call.
pub fn seal(recipient_pubkey: &[u8; 32], plaintext: &[u8]) -> Envelope {
    let mut rng = rand::thread_rng();
    let ephemeral_secret = X25519SecretKey::random_from_rng(&mut rng);
    let ephemeral_public = X25519PublicKey::from(&ephemeral_secret);
    let recipient = X25519PublicKey::from(*recipient_pubkey);
    let shared = ephemeral_secret.diffie_hellman(&recipient);

    let key = derive_key(shared.as_bytes(), recipient_pubkey);
    let mut nonce_bytes = [0u8; 24];
    rng.fill_bytes(&mut nonce_bytes);

    let cipher = XChaCha20Poly1305::new((&key).into());
    let nonce = XNonce::from_slice(&nonce_bytes);
    let ciphertext = cipher
        .encrypt(
            nonce,
            Payload {
                msg: plaintext,
                aad: recipient_pubkey,
            },
        )
        .expect("encryption under a freshly derived key cannot fail");

    Envelope {
        sender_pubkey: *ephemeral_public.as_bytes(),
        nonce: nonce_bytes,
        ciphertext,
    }
}

/// Seal `plaintext` using an already-held secret (rather than generating a
/// fresh ephemeral one) — the registry's own export key is static across
/// both legs of a key export: proving control of the counterparty's key in
/// `request_key_export`, and sealing the exported secret in `export_key`.
pub fn seal_with(
    secret: &X25519SecretKey,
    secret_public: &X25519PublicKey,
    recipient_pubkey: &[u8; 32],
    plaintext: &[u8],
) -> Envelope {
    let recipient = X25519PublicKey::from(*recipient_pubkey);
    let shared = secret.diffie_hellman(&recipient);

    let key = derive_key(shared.as_bytes(), recipient_pubkey);
    let mut nonce_bytes = [0u8; 24];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);

    let cipher = XChaCha20Poly1305::new((&key).into());
    let nonce = XNonce::from_slice(&nonce_bytes);
    let ciphertext = cipher
        .encrypt(
            nonce,
            Payload {
                msg: plaintext,
                aad: recipient_pubkey,
            },
        )
        .expect("encryption under a freshly derived key cannot fail");

    Envelope {
        sender_pubkey: *secret_public.as_bytes(),
        nonce: nonce_bytes,
        ciphertext,
    }
}

/// Open an [`Envelope`] using the recipient's own X25519 secret key. Fails
/// with [`LiqError::WrongExportTag`] if the AEAD tag doesn't verify — the
/// counterparty either used the wrong key or the envelope was tampered with.
pub fn open(recipient_secret: &X25519SecretKey, envelope: &Envelope) -> Result<Vec<u8>, LiqError> {
    let recipient_public = X25519PublicKey::from(recipient_secret);
    let sender = X25519PublicKey::from(envelope.sender_pubkey);
    let shared = recipient_secret.diffie_hellman(&sender);

    let key = derive_key(shared.as_bytes(), recipient_public.as_bytes());
    let cipher = XChaCha20Poly1305::new((&key).into());
    let nonce = XNonce::from_slice(&envelope.nonce);

    cipher
        .decrypt(
            nonce,
            Payload {
                msg: &envelope.ciphertext,
                aad: recipient_public.as_bytes(),
            },
        )
        .map_err(|_| LiqError::WrongExportTag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_then_open_roundtrips() {
        let mut rng = rand::thread_rng();
        let recipient_secret = X25519SecretKey::random_from_rng(&mut rng);
        let recipient_public = X25519PublicKey::from(&recipient_secret);

        let plaintext = b"a 32-byte secp256k1 private key";
        let envelope = seal(recipient_public.as_bytes(), plaintext);
        let opened = open(&recipient_secret, &envelope).unwrap();
        assert_eq!(opened, plaintext);
    }

    #[test]
    fn wrong_recipient_fails_with_wrong_export_tag() {
        let mut rng = rand::thread_rng();
        let recipient_secret = X25519SecretKey::random_from_rng(&mut rng);
        let recipient_public = X25519PublicKey::from(&recipient_secret);
        let imposter_secret = X25519SecretKey::random_from_rng(&mut rng);

        let envelope = seal(recipient_public.as_bytes(), b"secret key bytes here!!");
        let result = open(&imposter_secret, &envelope);
        assert!(matches!(result, Err(LiqError::WrongExportTag)));
    }

    #[test]
    fn seal_with_static_secret_roundtrips_both_directions() {
        let mut rng = rand::thread_rng();
        let registry_secret = X25519SecretKey::random_from_rng(&mut rng);
        let registry_public = X25519PublicKey::from(&registry_secret);
        let counterparty_secret = X25519SecretKey::random_from_rng(&mut rng);
        let counterparty_public = X25519PublicKey::from(&counterparty_secret);

        // counterparty -> registry, proving control of counterparty_secret
        let proof = seal_with(
            &counterparty_secret,
            &counterparty_public,
            registry_public.as_bytes(),
            b"Key export",
        );
        assert_eq!(open(&registry_secret, &proof).unwrap(), b"Key export");

        // registry -> counterparty, sealing the exported key
        let exported = seal_with(
            &registry_secret,
            &registry_public,
            counterparty_public.as_bytes(),
            b"exported secret key bytes",
        );
        assert_eq!(
            open(&counterparty_secret, &exported).unwrap(),
            b"exported secret key bytes"
        );
    }
}
