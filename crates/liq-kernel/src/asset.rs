//! The asset classifier (component C): a pure function from payload bytes
//! to a 32-byte asset tag. Preserved byte-for-byte per the source, including
//! the documented ambiguity around the `0x02` prefix — see the module-level
//! Open Question this carries forward: a payload starting with `0x02` is
//! always classified as the Ethereum type-2 transaction envelope, even
//! though `0x02` is also a valid first byte of an arbitrary payload. Do not
//! "fix" this.

use liq_crypto::eip712_domain_tag;
use liq_core::types::AssetTag;

/// Classify a payload by its leading bytes. EIP-712 typed data never
/// classifies through this function — the classifier returns zero for a
/// `0x19 0x01` prefix and callers must route typed data through
/// [`classify_eip712`] instead.
pub fn classify(payload: &[u8]) -> AssetTag {
    match payload.first().copied() {
        Some(0x19) if payload.get(1).copied() == Some(0x01) => AssetTag::ZERO,
        Some(0x19) if payload.get(1).copied() == Some(0x45) => AssetTag::ETH_SIGNED_MESSAGE,
        Some(0x02) => AssetTag::ETH_TRANSACTION,
        _ => AssetTag::ZERO,
    }
}

/// The asset tag for EIP-712 typed data, keyed purely on the domain name:
/// `Keccak("EIP-712 " || domain.name)`.
pub fn classify_eip712(domain_name: &str) -> AssetTag {
    AssetTag(eip712_domain_tag(domain_name).0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eth_signed_message_prefix_classifies() {
        let payload = [0x19u8, 0x45, b'h', b'i'];
        assert_eq!(classify(&payload), AssetTag::ETH_SIGNED_MESSAGE);
    }

    #[test]
    fn eip712_prefix_classifies_to_zero_not_eth_signed_message() {
        let payload = [0x19u8, 0x01, 0xaa];
        assert_eq!(classify(&payload), AssetTag::ZERO);
    }

    #[test]
    fn eth_transaction_prefix_classifies_even_though_ambiguous() {
        // 0x02 is ambiguous with an arbitrary payload's first byte — the
        // classifier accepts this ambiguity deliberately.
        let payload = [0x02u8, 0xde, 0xad, 0xbe, 0xef];
        assert_eq!(classify(&payload), AssetTag::ETH_TRANSACTION);
    }

    #[test]
    fn unknown_prefix_classifies_to_zero() {
        let payload = [0x03u8, 0x00];
        assert_eq!(classify(&payload), AssetTag::ZERO);
    }

    #[test]
    fn empty_payload_classifies_to_zero() {
        assert_eq!(classify(&[]), AssetTag::ZERO);
    }

    #[test]
    fn eip712_domain_tag_is_stable_and_distinct_per_name() {
        let a = classify_eip712("MyDapp");
        let b = classify_eip712("MyDapp");
        let c = classify_eip712("OtherDapp");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(!a.is_zero());
    }
}
