//! Security predicate consulted for node access roles

use crate::models::EVERYBODY_ROLE;
use std::collections::BTreeSet;

/// Answers whether the current caller holds a role
pub trait SecurityContext: Send + Sync {
    fn has_role(&self, role: &str) -> bool;
}

/// Fixed set of roles; every caller implicitly holds `Everybody`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleSet {
    roles: BTreeSet<String>,
}

impl RoleSet {
    pub fn new<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    pub fn roles(&self) -> &BTreeSet<String> {
        &self.roles
    }
}

impl SecurityContext for RoleSet {
    fn has_role(&self, role: &str) -> bool {
        role == EVERYBODY_ROLE || self.roles.contains(role)
    }
}
