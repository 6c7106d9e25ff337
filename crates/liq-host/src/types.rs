use liq_core::types::{ChainId, Hash32, U256};
use serde::{Deserialize, Serialize};

/// A foreign-chain block header, reduced to the fields the kernel actually
/// reasons about: its own hash (checked against the oracle), and the two
/// Merkle roots a [`crate::ProofVerifier`] walks paths against.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ForeignHeader {
    pub chain_id: ChainId,
    pub block_number: u64,
    pub timestamp: i64,
    pub hash: Hash32,
    pub transactions_root: Hash32,
    pub state_root: Hash32,
}

/// A Merkle-Patricia-trie path from `header.transactions_root` to the
/// RLP-encoded transaction at `transaction_index`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TxInclusionProof {
    pub transaction_index: u64,
    /// The RLP-encoded signed transaction the proof claims is included.
    pub included_tx_rlp: Vec<u8>,
}

/// A Merkle-Patricia-trie path from `header.state_root` to a specific
/// storage slot of a specific address.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageProof {
    pub address: [u8; 20],
    pub slot: [u8; 32],
    pub value: U256,
}
