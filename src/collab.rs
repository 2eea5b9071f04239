//! Ports to the collaborators the engine trusts but does not implement:
//! role checks and KYC identity lookup.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use crate::model::{AccountId, Role};

/// Boolean role gates. The engine takes the answer at face value.
pub trait Authorizer: Send + Sync {
    fn can_handle_finance(&self, role: &Role) -> bool;
    fn is_admin(&self, role: &Role) -> bool;
}

/// Fixed role tables.
#[derive(Debug, Clone)]
pub struct StaticRoles {
    admins: HashSet<String>,
    finance: HashSet<String>,
}

impl StaticRoles {
    pub fn new<I, J, S>(admins: I, finance: J) -> Self
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            admins: admins.into_iter().map(Into::into).collect(),
            finance: finance.into_iter().map(Into::into).collect(),
        }
    }
}

impl Default for StaticRoles {
    /// Portal roles: `superadmin` and `admin` can do everything, `finance`
    /// handles cash payouts.
    fn default() -> Self {
        Self::new(["superadmin", "admin"], ["superadmin", "admin", "finance"])
    }
}

impl Authorizer for StaticRoles {
    fn can_handle_finance(&self, role: &Role) -> bool {
        self.finance.contains(role.as_str())
    }

    fn is_admin(&self, role: &Role) -> bool {
        self.admins.contains(role.as_str())
    }
}

/// Identity material shown to finance staff before handing over cash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KycIdentity {
    pub display_name: String,
    pub document_urls: Vec<String>,
}

pub trait KycProvider: Send + Sync {
    fn identity(&self, account: &AccountId) -> Option<KycIdentity>;
}

/// KYC records held in memory.
#[derive(Debug, Default)]
pub struct InMemoryKyc {
    records: RwLock<HashMap<AccountId, KycIdentity>>,
}

impl InMemoryKyc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, account: AccountId, identity: KycIdentity) {
        self.records
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(account, identity);
    }
}

impl KycProvider for InMemoryKyc {
    fn identity(&self, account: &AccountId) -> Option<KycIdentity> {
        self.records
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(account)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_roles() {
        let roles = StaticRoles::default();
        assert!(roles.is_admin(&Role::new("admin")));
        assert!(!roles.is_admin(&Role::new("finance")));
        assert!(roles.can_handle_finance(&Role::new("finance")));
        assert!(roles.can_handle_finance(&Role::new("superadmin")));
        assert!(!roles.can_handle_finance(&Role::new("user")));
    }

    #[test]
    fn kyc_lookup() {
        let kyc = InMemoryKyc::new();
        let alice = AccountId::new("alice");
        kyc.insert(
            alice.clone(),
            KycIdentity {
                display_name: "Alice Doe".into(),
                document_urls: vec!["https://img.example/id-front.jpg".into()],
            },
        );
        assert_eq!(kyc.identity(&alice).unwrap().display_name, "Alice Doe");
        assert!(kyc.identity(&AccountId::new("bob")).is_none());
    }
}
