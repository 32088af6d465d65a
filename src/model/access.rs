use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::{ElectionError, Identity};

/// The root authority plus its delegated administrators.
///
/// The root is fixed at construction and always holds every right; only the
/// root may add or remove administrators. Adding an existing administrator
/// or removing an unknown one succeeds without changing anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControl {
    root: Identity,
    admins: BTreeSet<Identity>,
}

impl AccessControl {
    pub fn new(root: Identity) -> Self {
        Self {
            root,
            admins: BTreeSet::new(),
        }
    }

    pub fn root(&self) -> &Identity {
        &self.root
    }

    pub fn is_root(&self, identity: &Identity) -> bool {
        &self.root == identity
    }

    /// The root counts as an administrator.
    pub fn is_admin(&self, identity: &Identity) -> bool {
        self.is_root(identity) || self.admins.contains(identity)
    }

    /// Delegated administrators, excluding the root.
    pub fn admins(&self) -> impl Iterator<Item = &Identity> {
        self.admins.iter()
    }

    pub fn require_root(&self, caller: &Identity) -> Result<(), ElectionError> {
        if self.is_root(caller) {
            Ok(())
        } else {
            Err(ElectionError::Unauthorized)
        }
    }

    pub fn require_admin(&self, caller: &Identity) -> Result<(), ElectionError> {
        if self.is_admin(caller) {
            Ok(())
        } else {
            Err(ElectionError::Unauthorized)
        }
    }

    /// Returns true iff the set of administrators changed.
    pub fn add_admin(&mut self, caller: &Identity, admin: Identity) -> Result<bool, ElectionError> {
        self.require_root(caller)?;
        if self.is_root(&admin) {
            return Ok(false);
        }
        Ok(self.admins.insert(admin))
    }

    /// Returns true iff the set of administrators changed. The root cannot be removed.
    pub fn remove_admin(
        &mut self,
        caller: &Identity,
        admin: &Identity,
    ) -> Result<bool, ElectionError> {
        self.require_root(caller)?;
        Ok(self.admins.remove(admin))
    }
}
