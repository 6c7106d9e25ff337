pub mod envelope;
pub mod hash;
pub mod host;
pub mod keypair;

pub use envelope::Envelope;
pub use hash::{address_from_pubkey, eip712_domain_tag, eth_signed_message_hash, keccak256};
pub use host::{DeterministicHost, HostCrypto, ProductionHost};
pub use keypair::{verify_prehashed, KeyPair};
