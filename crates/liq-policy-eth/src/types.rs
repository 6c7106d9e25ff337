//! The wire shape of a managed Ethereum transaction: just enough of an
//! EIP-1559-style envelope for the cost model, nonce discipline, and
//! destination-asset keying this sub-policy needs. Not a wire-compatible
//! client encoder — no access lists, no legacy/EIP-2930 variants, no
//! signature recovery id. A full client-compatible RLP codec is out of
//! scope here; `EthTransaction` only has to round-trip through this crate
//! and hash the same way every time.

use alloy_primitives::{Address as EthAddress, U256};
use alloy_rlp::{RlpDecodable, RlpEncodable};
use liq_core::types::{ChainId, Hash32, Nonce};
use liq_crypto::keccak256;
use serde::{Deserialize, Serialize};

/// Type-2 (EIP-1559-shaped) transaction body a sub-policy commits to and
/// signs on behalf of a managed account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, RlpEncodable, RlpDecodable)]
pub struct EthTransaction {
    pub chain_id: ChainId,
    pub nonce: Nonce,
    pub max_fee_per_gas: U256,
    pub gas_limit: u64,
    pub to: EthAddress,
    pub value: U256,
    pub payload: Vec<u8>,
}

impl EthTransaction {
    /// `0x02 || rlp(self)` — the type-2 envelope this sub-policy signs over
    /// and later matches against an inclusion proof's `included_tx_rlp`.
    pub fn encode(&self) -> Vec<u8> {
        let mut body = Vec::new();
        alloy_rlp::Encodable::encode(self, &mut body);
        let mut out = Vec::with_capacity(body.len() + 1);
        out.push(0x02);
        out.extend_from_slice(&body);
        out
    }

    pub fn hash(&self) -> Hash32 {
        Hash32(keccak256(&self.encode()))
    }

    /// Upper bound on what this transaction could cost the account:
    /// `gasLimit * maxFeePerGas + value`. The inclusion-proof reimbursement
    /// is a separate mechanism, pre-funded via `localBalanceFinalized` and
    /// settled independently — it is not part of this cost.
    pub fn max_cost(&self) -> U256 {
        let gas_cost = U256::from(self.gas_limit).saturating_mul(self.max_fee_per_gas);
        gas_cost.saturating_add(self.value)
    }

    /// The asset tag a sub-lease over `(chainId, to)` is keyed on:
    /// `Keccak(chainId.to_be_bytes() || to)`.
    pub fn dest_asset_tag(&self) -> [u8; 32] {
        dest_asset_tag(self.chain_id, &self.to)
    }
}

pub fn dest_asset_tag(chain_id: ChainId, to: &EthAddress) -> [u8; 32] {
    let mut buf = Vec::with_capacity(8 + 20);
    buf.extend_from_slice(&chain_id.to_be_bytes());
    buf.extend_from_slice(to.as_slice());
    keccak256(&buf)
}

/// A transaction paired with the signature the wallet registry produced for
/// it, plus the address the caller claims signed it. Verified against the
/// claimed signer's known public key rather than recovered from the
/// signature, since the registry's `sign_prehashed` primitive returns a
/// plain (non-recoverable) DER signature.
#[derive(Clone, Debug)]
pub struct SignedEthTransaction {
    pub tx: EthTransaction,
    pub signature: liq_core::types::DerSignature,
    pub signer: liq_core::types::Address,
}

impl SignedEthTransaction {
    pub fn hash(&self) -> Hash32 {
        self.tx.hash()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> EthTransaction {
        EthTransaction {
            chain_id: 1,
            nonce: 0,
            max_fee_per_gas: U256::from(50_000_000_000u64),
            gas_limit: 21_000,
            to: EthAddress::from([0xabu8; 20]),
            value: U256::from(1_000_000_000_000_000_000u128),
            payload: vec![],
        }
    }

    #[test]
    fn encode_is_type_2_prefixed_and_deterministic() {
        let tx = sample();
        let a = tx.encode();
        let b = tx.encode();
        assert_eq!(a[0], 0x02);
        assert_eq!(a, b);
    }

    #[test]
    fn hash_changes_with_nonce() {
        let mut tx = sample();
        let h1 = tx.hash();
        tx.nonce = 1;
        let h2 = tx.hash();
        assert_ne!(h1, h2);
    }

    #[test]
    fn max_cost_includes_value_and_gas() {
        let tx = sample();
        let gas_cost = U256::from(21_000u64) * U256::from(50_000_000_000u64);
        assert!(tx.max_cost() > gas_cost + tx.value);
    }

    #[test]
    fn dest_asset_tag_is_stable_per_chain_and_address() {
        let tx = sample();
        let a = tx.dest_asset_tag();
        let b = dest_asset_tag(1, &EthAddress::from([0xabu8; 20]));
        let c = dest_asset_tag(2, &EthAddress::from([0xabu8; 20]));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
