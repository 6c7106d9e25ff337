//! The wallet record itself (part of component D). A wallet owns a
//! secp256k1 keypair and carries the three orthogonal delayed-finalization
//! markers the registry advances: ownership, max-expiry, and export-request.

use liq_core::error::LiqError;
use liq_core::types::{AccountIndex, Address, Principal, Timestamp, WalletId};
use liq_crypto::KeyPair;
use serde::{Deserialize, Serialize};

use crate::cell::DelayedCell;

/// `(manager, accountIndex)`: the key under which a wallet is reachable from
/// its current owner.
pub type OwnerKey = (Principal, AccountIndex);

#[derive(Serialize, Deserialize)]
pub struct Wallet {
    pub wallet_id: WalletId,
    pub address: Address,
    /// `None` once the key has been destroyed after export.
    secret: Option<KeyPair>,
    pub owner: DelayedCell<OwnerKey>,
    /// The maximum expiry ever granted across all leases on this wallet.
    /// Monotonically non-decreasing; gates key export.
    pub max_expiry: Timestamp,
    /// The counterparty's X25519 public key, recorded at `request_key_export`.
    pub export_counterparty: Option<[u8; 32]>,
    pub export_requested: DelayedCell<bool>,
    pub destroyed: bool,
}

impl Wallet {
    pub fn new(keypair: KeyPair, owner: OwnerKey, current_block: u64) -> Self {
        Self {
            wallet_id: keypair.wallet_id.clone(),
            address: keypair.address,
            secret: Some(keypair),
            owner: DelayedCell::new(owner, current_block),
            max_expiry: Timestamp::MIN,
            export_counterparty: None,
            export_requested: DelayedCell::new(false, current_block),
            destroyed: false,
        }
    }

    /// `true` once `destroy_exported_key` has run — every write operation on
    /// this wallet must refuse after this point.
    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// `true` once an export has been finalized (requested and the
    /// finalization block has passed) — required before allowing
    /// `export_key`, and used to refuse further writes once export begins.
    pub fn export_finalized(&self, current_block: u64) -> bool {
        self.export_requested
            .finalized(current_block)
            .map(|v| *v)
            .unwrap_or(false)
    }

    pub fn keypair(&self) -> Result<&KeyPair, LiqError> {
        self.secret.as_ref().ok_or(LiqError::Exported)
    }

    /// Consume and return the raw secret-key bytes for export, without
    /// destroying the wallet's record.
    pub fn export_secret(&self) -> Result<zeroize::Zeroizing<Vec<u8>>, LiqError> {
        Ok(self.keypair()?.export_secret())
    }

    /// Irreversibly destroy the private key material, leaving the public
    /// record (address, wallet id) intact for history.
    pub fn destroy_key(&mut self) {
        self.secret = None;
        self.destroyed = true;
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address)
            .field("destroyed", &self.destroyed)
            .finish()
    }
}
