pub mod mock;
pub mod traits;
pub mod types;

pub use traits::{BlockHashOracle, ProofVerifier};
pub use types::{ForeignHeader, StorageProof, TxInclusionProof};
