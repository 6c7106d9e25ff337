use serde::{Deserialize, Serialize};
use std::fmt;

/// Host-supplied block height. Monotonic across dispatches, never observed
/// to go backwards within a single kernel's lifetime.
pub type BlockHeight = u64;

/// Host-supplied wall-clock timestamp (Unix seconds), used only for lease
/// expiry comparisons — never for block-level ordering.
pub type Timestamp = i64;

/// Transaction sequence number on a foreign chain.
pub type Nonce = u64;

/// A chain identifier (EIP-155 style).
pub type ChainId = u64;

/// 256-bit unsigned integer for ETH/Wei amounts, shared by the kernel and
/// the Ethereum-transaction sub-policy so balances never need converting
/// across a crate boundary.
pub type U256 = alloy_primitives::U256;

// ── Principal ──────────────────────────────────────────────────────────────

/// The opaque identity of the caller dispatching the current operation.
/// Supplied by the confidential host; the kernel has no way to forge one.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Principal(pub [u8; 20]);

impl Principal {
    pub const ZERO: Principal = Principal([0u8; 20]);

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s)?;
        let mut arr = [0u8; 20];
        let n = bytes.len().min(20);
        arr[..n].copy_from_slice(&bytes[..n]);
        Ok(Self(arr))
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Principal({}…)", &self.to_hex()[..10])
    }
}

/// The externally visible Ethereum-style address of a wallet. Identical
/// representation to [`Principal`] (both are 20-byte Keccak-derived
/// identifiers) but kept as a distinct type so a wallet address can never be
/// accidentally compared against a caller principal.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(pub [u8; 20]);

impl Address {
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({}…)", &self.to_hex()[..10])
    }
}

// ── Wallet identity ──────────────────────────────────────────────────────────

/// The owner-chosen random 256-bit index naming a wallet under one manager.
/// `(manager, account_index)` is the idempotency key for `create_wallet`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountIndex(pub [u8; 32]);

impl AccountIndex {
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for AccountIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountIndex({}…)", &self.to_hex()[..10])
    }
}

/// SEC1-compressed secp256k1 public key (33 bytes). Serves as the stable,
/// opaque wallet identifier: storage keyed on a wallet is keyed on this.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WalletId(pub [u8; 33]);

impl WalletId {
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for WalletId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WalletId({}…)", &self.to_hex()[..10])
    }
}

// ── Asset tags ────────────────────────────────────────────────────────────────

/// A 32-byte tag identifying a signable message class. The unit of
/// encumbrance: a lease grants signing authority over exactly one asset tag
/// of one wallet. See `liq_kernel::asset` for how payloads classify into one.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetTag(pub [u8; 32]);

impl AssetTag {
    /// The sentinel tag for "unclassified / rejected" payloads. Never leasable.
    pub const ZERO: AssetTag = AssetTag([0u8; 32]);

    /// The "ethereum signed message" (`0x1945`) asset.
    pub const ETH_SIGNED_MESSAGE: AssetTag = AssetTag(Self::tag_from_u16(0x1945));

    /// The EIP-1559 transaction envelope asset.
    pub const ETH_TRANSACTION: AssetTag = AssetTag(Self::tag_from_u16(0x02));

    const fn tag_from_u16(v: u16) -> [u8; 32] {
        let mut b = [0u8; 32];
        let be = v.to_be_bytes();
        b[30] = be[0];
        b[31] = be[1];
        b
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for AssetTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AssetTag({}…)", &self.to_hex()[..10])
    }
}

// ── Signatures ────────────────────────────────────────────────────────────────

/// A DER-encoded secp256k1 ECDSA signature, as returned by the host's
/// `sign_prehashed` primitive.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerSignature(pub Vec<u8>);

impl fmt::Debug for DerSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DerSignature({}b)", self.0.len())
    }
}

/// A 32-byte foreign-chain transaction or header hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hash32(pub [u8; 32]);

impl Hash32 {
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s)?;
        let mut arr = [0u8; 32];
        let n = bytes.len().min(32);
        arr[..n].copy_from_slice(&bytes[..n]);
        Ok(Self(arr))
    }
}

impl fmt::Debug for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash32({}…)", &self.to_hex()[..10])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_tag_constants_match_spec_prefixes() {
        assert_eq!(AssetTag::ETH_SIGNED_MESSAGE.0[30], 0x19);
        assert_eq!(AssetTag::ETH_SIGNED_MESSAGE.0[31], 0x45);
        assert_eq!(AssetTag::ETH_TRANSACTION.0[31], 0x02);
    }

    #[test]
    fn principal_hex_roundtrip() {
        let p = Principal([7u8; 20]);
        assert_eq!(Principal::from_hex(&p.to_hex()).unwrap(), p);
    }
}
