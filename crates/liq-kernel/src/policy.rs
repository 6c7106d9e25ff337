//! The Policy SPI (component H): the one inbound hook every policy or
//! sub-policy implements, plus the table resolving a principal to its
//! callback. The source dispatches to policies through a runtime interface
//! call; here that becomes a table of `principal -> trait object`, resolved
//! synchronously at enrollment — no inheritance hierarchy required.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use liq_core::error::LiqError;
use liq_core::types::{Address, AssetTag, Principal, Timestamp};

/// Implemented by every policy and sub-policy that can be the target of
/// `enter_encumbrance`. Called synchronously during enrollment; returning an
/// error vetoes the enrollment and unwinds the lease that was about to be
/// installed.
pub trait Policy: Send + Sync {
    fn notify_enrollment(
        &self,
        manager: Principal,
        account: Address,
        assets: &[AssetTag],
        expiration: Timestamp,
        data: &[u8],
    ) -> Result<(), LiqError>;
}

/// Resolves a policy principal to its callback. Populated by whatever
/// process wires the kernel together (the RPC host or a test harness);
/// the kernel itself never constructs a `Policy` impl.
#[derive(Default)]
pub struct PolicyRegistry {
    policies: RwLock<HashMap<Principal, Arc<dyn Policy>>>,
}

impl PolicyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, principal: Principal, policy: Arc<dyn Policy>) {
        self.policies
            .write()
            .expect("policy registry lock poisoned")
            .insert(principal, policy);
    }

    /// Notify the policy registered at `principal`, if any. A principal with
    /// no registered callback is treated as silently accepting — the source
    /// models "plain" policies (no SPI implementation) this way; only
    /// policies that actually register a callback can veto.
    pub fn notify(
        &self,
        principal: Principal,
        manager: Principal,
        account: Address,
        assets: &[AssetTag],
        expiration: Timestamp,
        data: &[u8],
    ) -> Result<(), LiqError> {
        let policies = self.policies.read().expect("policy registry lock poisoned");
        match policies.get(&principal) {
            Some(policy) => policy.notify_enrollment(manager, account, assets, expiration, data),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Accepting;
    impl Policy for Accepting {
        fn notify_enrollment(
            &self,
            _manager: Principal,
            _account: Address,
            _assets: &[AssetTag],
            _expiration: Timestamp,
            _data: &[u8],
        ) -> Result<(), LiqError> {
            Ok(())
        }
    }

    struct Vetoing;
    impl Policy for Vetoing {
        fn notify_enrollment(
            &self,
            _manager: Principal,
            _account: Address,
            _assets: &[AssetTag],
            _expiration: Timestamp,
            _data: &[u8],
        ) -> Result<(), LiqError> {
            Err(LiqError::NotAuthorized)
        }
    }

    #[test]
    fn unregistered_principal_silently_accepts() {
        let registry = PolicyRegistry::new();
        let result = registry.notify(
            Principal([1u8; 20]),
            Principal([2u8; 20]),
            Address([3u8; 20]),
            &[AssetTag::ETH_SIGNED_MESSAGE],
            1000,
            b"",
        );
        assert!(result.is_ok());
    }

    #[test]
    fn registered_policy_can_veto() {
        let registry = PolicyRegistry::new();
        let p = Principal([9u8; 20]);
        registry.register(p, Arc::new(Vetoing));
        let result = registry.notify(
            p,
            Principal([2u8; 20]),
            Address([3u8; 20]),
            &[AssetTag::ETH_SIGNED_MESSAGE],
            1000,
            b"",
        );
        assert!(matches!(result, Err(LiqError::NotAuthorized)));
    }

    #[test]
    fn registered_policy_can_accept() {
        let registry = PolicyRegistry::new();
        let p = Principal([9u8; 20]);
        registry.register(p, Arc::new(Accepting));
        let result = registry.notify(
            p,
            Principal([2u8; 20]),
            Address([3u8; 20]),
            &[AssetTag::ETH_SIGNED_MESSAGE],
            1000,
            b"",
        );
        assert!(result.is_ok());
    }
}
