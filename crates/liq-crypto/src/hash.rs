use liq_core::types::{Address, Hash32};
use secp256k1::PublicKey;
use sha3::{Digest, Keccak256};

/// Keccak-256 of arbitrary bytes.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    let out = hasher.finalize();
    let mut arr = [0u8; 32];
    arr.copy_from_slice(&out);
    arr
}

/// Derive an Ethereum-style address from an uncompressed secp256k1 public
/// key's X||Y bytes: lower 20 bytes of `Keccak256(pubkey_uncompressed[1..])`.
pub fn address_from_pubkey(pk: &PublicKey) -> Address {
    let uncompressed = pk.serialize_uncompressed(); // 65 bytes: 0x04 || X || Y
    let digest = keccak256(&uncompressed[1..]);
    let mut addr = [0u8; 20];
    addr.copy_from_slice(&digest[12..]);
    Address(addr)
}

/// The `"\x19Ethereum Signed Message:\n" || len(message) || message` prefix
/// used by the `0x1945` asset class, hashed with Keccak-256.
pub fn eth_signed_message_hash(message: &[u8]) -> [u8; 32] {
    let prefix = format!("\x19Ethereum Signed Message:\n{}", message.len());
    let mut buf = Vec::with_capacity(prefix.len() + message.len());
    buf.extend_from_slice(prefix.as_bytes());
    buf.extend_from_slice(message);
    keccak256(&buf)
}

/// EIP-712 domain separator tag: `Keccak256("EIP-712 " || domain.name)`.
///
/// The real EIP-712 domain hash also folds in version/chainId/verifyingContract;
/// this kernel only needs a stable per-domain asset tag, not a wire-compatible
/// typed-data hasher, so it hashes the domain name alone per the classifier's
/// contract (`liq_kernel::asset::classify`).
pub fn eip712_domain_tag(domain_name: &str) -> Hash32 {
    let mut buf = Vec::with_capacity(8 + domain_name.len());
    buf.extend_from_slice(b"EIP-712 ");
    buf.extend_from_slice(domain_name.as_bytes());
    Hash32(keccak256(&buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secp256k1::{Secp256k1, SecretKey};

    #[test]
    fn address_is_20_bytes_of_keccak() {
        let secp = Secp256k1::signing_only();
        let sk = SecretKey::from_slice(&[9u8; 32]).unwrap();
        let pk = PublicKey::from_secret_key(&secp, &sk);
        let addr = address_from_pubkey(&pk);
        assert_eq!(addr.0.len(), 20);
    }

    #[test]
    fn eth_signed_message_hash_is_deterministic() {
        let a = eth_signed_message_hash(b"hello");
        let b = eth_signed_message_hash(b"hello");
        assert_eq!(a, b);
        assert_ne!(a, eth_signed_message_hash(b"hellp"));
    }
}
