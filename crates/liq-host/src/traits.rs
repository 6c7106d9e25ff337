use liq_core::error::LiqError;
use liq_core::types::{ChainId, Hash32, U256};

use crate::types::{ForeignHeader, StorageProof, TxInclusionProof};

/// Supplies trusted foreign-chain header hashes. The kernel never validates
/// a header on its own authority — every header a caller supplies is checked
/// against this oracle before its Merkle roots are trusted.
pub trait BlockHashOracle: Send + Sync {
    fn get_block_hash(&self, chain_id: ChainId, block_number: u64) -> Result<Hash32, LiqError>;
}

/// Verifies transaction-inclusion and storage proofs against an
/// oracle-trusted header. Implementations enforce the actual
/// Merkle-Patricia-trie walk; the kernel only consumes the result.
pub trait ProofVerifier: Send + Sync {
    /// Returns the RLP-encoded transaction the proof claims is included,
    /// once the Merkle path from `header.transactions_root` checks out.
    fn validate_tx_proof(
        &self,
        header: &ForeignHeader,
        proof: &TxInclusionProof,
    ) -> Result<Vec<u8>, LiqError>;

    /// Returns the value at `proof.slot` of `proof.address`, once the
    /// Merkle path from `header.state_root` checks out.
    fn validate_storage_proof(
        &self,
        header: &ForeignHeader,
        proof: &StorageProof,
    ) -> Result<U256, LiqError>;
}
