//! Deterministic in-memory implementations of the host oracle/verifier
//! traits, used by every kernel and policy test and by the demo node.

use std::collections::HashMap;
use std::sync::RwLock;

use liq_core::error::LiqError;
use liq_core::types::{ChainId, Hash32, U256};

use crate::traits::{BlockHashOracle, ProofVerifier};
use crate::types::{ForeignHeader, StorageProof, TxInclusionProof};

/// A `HashMap`-backed block-hash oracle, seeded with known headers by the
/// test harness.
#[derive(Default)]
pub struct MockBlockHashOracle {
    headers: RwLock<HashMap<(ChainId, u64), Hash32>>,
}

impl MockBlockHashOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, chain_id: ChainId, block_number: u64, hash: Hash32) {
        self.headers
            .write()
            .expect("mock oracle lock poisoned")
            .insert((chain_id, block_number), hash);
    }
}

impl BlockHashOracle for MockBlockHashOracle {
    fn get_block_hash(&self, chain_id: ChainId, block_number: u64) -> Result<Hash32, LiqError> {
        self.headers
            .read()
            .expect("mock oracle lock poisoned")
            .get(&(chain_id, block_number))
            .copied()
            .ok_or(LiqError::ProofMismatch)
    }
}

/// A proof verifier that checks a precomputed `proof.included_tx_rlp` /
/// storage-value table instead of walking a real Merkle-Patricia trie.
/// Every test registers the exact transaction or slot value it expects a
/// given header to attest to; any other header/proof pair fails
/// `ProofMismatch`.
#[derive(Default)]
pub struct MockProofVerifier {
    tx_proofs: RwLock<HashMap<Hash32, Vec<u8>>>,
    storage_proofs: RwLock<HashMap<Hash32, U256>>,
}

impl MockProofVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register that `header.hash` attests to `included_tx_rlp` being included.
    pub fn expect_tx(&self, header_hash: Hash32, included_tx_rlp: Vec<u8>) {
        self.tx_proofs
            .write()
            .expect("mock verifier lock poisoned")
            .insert(header_hash, included_tx_rlp);
    }

    /// Register that `header.hash` attests to a storage slot holding `value`.
    pub fn expect_storage(&self, header_hash: Hash32, value: U256) {
        self.storage_proofs
            .write()
            .expect("mock verifier lock poisoned")
            .insert(header_hash, value);
    }
}

impl ProofVerifier for MockProofVerifier {
    fn validate_tx_proof(
        &self,
        header: &ForeignHeader,
        proof: &TxInclusionProof,
    ) -> Result<Vec<u8>, LiqError> {
        let table = self.tx_proofs.read().expect("mock verifier lock poisoned");
        match table.get(&header.hash) {
            Some(expected) if expected == &proof.included_tx_rlp => Ok(expected.clone()),
            _ => Err(LiqError::ProofMismatch),
        }
    }

    fn validate_storage_proof(
        &self,
        header: &ForeignHeader,
        proof: &StorageProof,
    ) -> Result<U256, LiqError> {
        let table = self
            .storage_proofs
            .read()
            .expect("mock verifier lock poisoned");
        match table.get(&header.hash) {
            Some(expected) if expected == &proof.value => Ok(*expected),
            _ => Err(LiqError::ProofMismatch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oracle_returns_proof_mismatch_for_unknown_header() {
        let oracle = MockBlockHashOracle::new();
        assert!(matches!(
            oracle.get_block_hash(1, 100),
            Err(LiqError::ProofMismatch)
        ));
    }

    #[test]
    fn oracle_returns_seeded_hash() {
        let oracle = MockBlockHashOracle::new();
        let hash = Hash32([1u8; 32]);
        oracle.seed(1, 100, hash);
        assert_eq!(oracle.get_block_hash(1, 100).unwrap(), hash);
    }

    #[test]
    fn verifier_rejects_mismatched_tx() {
        let verifier = MockProofVerifier::new();
        let header_hash = Hash32([2u8; 32]);
        verifier.expect_tx(header_hash, vec![1, 2, 3]);

        let header = ForeignHeader {
            chain_id: 1,
            block_number: 1,
            timestamp: 0,
            hash: header_hash,
            transactions_root: Hash32([0u8; 32]),
            state_root: Hash32([0u8; 32]),
        };
        let proof = TxInclusionProof {
            transaction_index: 0,
            included_tx_rlp: vec![9, 9, 9],
        };
        assert!(matches!(
            verifier.validate_tx_proof(&header, &proof),
            Err(LiqError::ProofMismatch)
        ));
    }
}
