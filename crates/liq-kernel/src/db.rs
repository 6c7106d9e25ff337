use std::path::Path;

use liq_core::error::LiqError;
use liq_core::types::{AccountIndex, Address, AssetTag, BlockHeight, Principal, Timestamp, WalletId};
use serde::{Deserialize, Serialize};

use crate::cell::DelayedCell;
use crate::wallet::Wallet;

/// An encumbrance lease on one `(walletAddress, asset)` pair: the
/// policy principal lives in a delayed-finalization cell (so an
/// installation can't be observed or re-mutated in the same block it
/// happened), the expiry lives in the plain record.
#[derive(Clone, Serialize, Deserialize)]
pub struct Lease {
    pub policy: DelayedCell<Principal>,
    pub expiry: Timestamp,
}

impl Lease {
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expiry <= now
    }
}

fn owner_key_bytes(principal: &Principal, index: &AccountIndex) -> Vec<u8> {
    let mut b = Vec::with_capacity(52);
    b.extend_from_slice(&principal.0);
    b.extend_from_slice(&index.0);
    b
}

fn lease_key_bytes(address: &Address, asset: &AssetTag) -> Vec<u8> {
    let mut b = Vec::with_capacity(52);
    b.extend_from_slice(&address.0);
    b.extend_from_slice(&asset.0);
    b
}

/// Persistent wallet-registry state, backed by `sled`. Named trees:
///
///   wallets      — walletId (pubkey) bytes        → bincode(Wallet)
///   by_address   — address bytes                  → walletId bytes
///   owner_index  — (principal || accountIndex)    → walletId bytes
///   attended_log — principal bytes                → bincode(Vec<(AccountIndex, BlockHeight)>)
///   encumbrance  — (address || assetTag)           → bincode(Lease)
pub struct WalletDb {
    _db: sled::Db,
    wallets: sled::Tree,
    by_address: sled::Tree,
    owner_index: sled::Tree,
    attended_log: sled::Tree,
    encumbrance: sled::Tree,
}

impl WalletDb {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, LiqError> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    pub fn open_temporary() -> Result<Self, LiqError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> Result<Self, LiqError> {
        let wallets = db.open_tree("wallets")?;
        let by_address = db.open_tree("by_address")?;
        let owner_index = db.open_tree("owner_index")?;
        let attended_log = db.open_tree("attended_log")?;
        let encumbrance = db.open_tree("encumbrance")?;
        Ok(Self {
            _db: db,
            wallets,
            by_address,
            owner_index,
            attended_log,
            encumbrance,
        })
    }

    // ── Wallets ────────────────────────────────────────────────────────────

    pub fn get_wallet(&self, id: &WalletId) -> Result<Option<Wallet>, LiqError> {
        match self.wallets.get(id.0)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn put_wallet(&self, wallet: &Wallet) -> Result<(), LiqError> {
        let bytes = bincode::serialize(wallet)?;
        self.wallets.insert(wallet.wallet_id.0, bytes)?;
        self.by_address.insert(wallet.address.0, &wallet.wallet_id.0)?;
        Ok(())
    }

    pub fn find_by_address(&self, address: &Address) -> Result<Option<Wallet>, LiqError> {
        match self.by_address.get(address.0)? {
            Some(bytes) => {
                let mut arr = [0u8; 33];
                arr.copy_from_slice(&bytes);
                self.get_wallet(&WalletId(arr))
            }
            None => Ok(None),
        }
    }

    // ── Owner index ────────────────────────────────────────────────────────

    pub fn lookup_owner(
        &self,
        principal: &Principal,
        index: &AccountIndex,
    ) -> Result<Option<WalletId>, LiqError> {
        match self.owner_index.get(owner_key_bytes(principal, index))? {
            Some(bytes) => {
                let mut arr = [0u8; 33];
                arr.copy_from_slice(&bytes);
                Ok(Some(WalletId(arr)))
            }
            None => Ok(None),
        }
    }

    pub fn set_owner_index(
        &self,
        principal: &Principal,
        index: &AccountIndex,
        wallet_id: &WalletId,
    ) -> Result<(), LiqError> {
        self.owner_index
            .insert(owner_key_bytes(principal, index), &wallet_id.0)?;
        Ok(())
    }

    pub fn clear_owner_index(
        &self,
        principal: &Principal,
        index: &AccountIndex,
    ) -> Result<(), LiqError> {
        self.owner_index.remove(owner_key_bytes(principal, index))?;
        Ok(())
    }

    pub fn owner_index_exists(
        &self,
        principal: &Principal,
        index: &AccountIndex,
    ) -> Result<bool, LiqError> {
        Ok(self
            .owner_index
            .contains_key(owner_key_bytes(principal, index))?)
    }

    // ── Attended-wallet log ───────────────────────────────────────────────

    pub fn attended_wallets(&self, principal: &Principal) -> Result<Vec<(AccountIndex, BlockHeight)>, LiqError> {
        match self.attended_log.get(principal.0)? {
            Some(bytes) => Ok(bincode::deserialize(&bytes)?),
            None => Ok(Vec::new()),
        }
    }

    pub fn append_attended(
        &self,
        principal: &Principal,
        index: AccountIndex,
        creation_block: BlockHeight,
    ) -> Result<(), LiqError> {
        let mut log = self.attended_wallets(principal)?;
        log.push((index, creation_block));
        let bytes = bincode::serialize(&log)?;
        self.attended_log.insert(principal.0, bytes)?;
        Ok(())
    }

    // ── Encumbrance leases ────────────────────────────────────────────────

    pub fn get_lease(&self, address: &Address, asset: &AssetTag) -> Result<Option<Lease>, LiqError> {
        match self.encumbrance.get(lease_key_bytes(address, asset))? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn put_lease(&self, address: &Address, asset: &AssetTag, lease: &Lease) -> Result<(), LiqError> {
        let bytes = bincode::serialize(lease)?;
        self.encumbrance.insert(lease_key_bytes(address, asset), bytes)?;
        Ok(())
    }

    pub fn flush(&self) -> Result<(), LiqError> {
        self._db.flush()?;
        Ok(())
    }
}
