use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{ElectionError, Identity, TokenDigest};

/// A registered voter, as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voter {
    pub identity: Identity,
    pub name: String,
    pub contact: String,
    /// Digest of the external identity token supplied at registration.
    token: TokenDigest,
    pub is_verified: bool,
    pub has_voted: bool,
}

/// What callers may see of a voter: everything except the token digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoterSummary {
    pub identity: Identity,
    pub name: String,
    pub contact: String,
    pub is_verified: bool,
    pub has_voted: bool,
}

impl From<&Voter> for VoterSummary {
    fn from(voter: &Voter) -> Self {
        Self {
            identity: voter.identity.clone(),
            name: voter.name.clone(),
            contact: voter.contact.clone(),
            is_verified: voter.is_verified,
            has_voted: voter.has_voted,
        }
    }
}

/// Voters keyed by identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoterRegistry {
    voters: BTreeMap<Identity, Voter>,
}

impl FromIterator<Voter> for VoterRegistry {
    fn from_iter<I: IntoIterator<Item = Voter>>(voters: I) -> Self {
        Self {
            voters: voters
                .into_iter()
                .map(|voter| (voter.identity.clone(), voter))
                .collect(),
        }
    }
}

impl VoterRegistry {
    pub fn register(
        &mut self,
        identity: Identity,
        name: String,
        contact: String,
        token: TokenDigest,
    ) -> Result<(), ElectionError> {
        if self.voters.contains_key(&identity) {
            return Err(ElectionError::DuplicateVoter);
        }
        let voter = Voter {
            identity: identity.clone(),
            name,
            contact,
            token,
            is_verified: false,
            has_voted: false,
        };
        self.voters.insert(identity, voter);
        Ok(())
    }

    /// Mark a voter verified if the presented token digest matches the stored one.
    /// Verification happens at most once; repeating it is refused.
    pub fn verify(
        &mut self,
        identity: &Identity,
        presented: &TokenDigest,
    ) -> Result<(), ElectionError> {
        let voter = self
            .voters
            .get_mut(identity)
            .ok_or(ElectionError::NotRegistered)?;
        if &voter.token != presented {
            return Err(ElectionError::IdentityMismatch);
        }
        if voter.is_verified {
            return Err(ElectionError::AlreadyVerified);
        }
        voter.is_verified = true;
        Ok(())
    }

    /// Record that a voter has cast their vote.
    pub(super) fn mark_voted(&mut self, identity: &Identity) -> Result<(), ElectionError> {
        let voter = self
            .voters
            .get_mut(identity)
            .ok_or(ElectionError::NotRegistered)?;
        if voter.has_voted {
            return Err(ElectionError::AlreadyVoted);
        }
        voter.has_voted = true;
        Ok(())
    }

    pub fn get(&self, identity: &Identity) -> Result<&Voter, ElectionError> {
        self.voters
            .get(identity)
            .ok_or_else(|| ElectionError::not_found(format!("Voter {identity}")))
    }

    pub fn count(&self) -> usize {
        self.voters.len()
    }

    /// Every voter, in identity order.
    pub fn iter(&self) -> impl Iterator<Item = &Voter> {
        self.voters.values()
    }

    pub fn verified_count(&self) -> usize {
        self.voters.values().filter(|v| v.is_verified).count()
    }

    pub fn voted_count(&self) -> usize {
        self.voters.values().filter(|v| v.has_voted).count()
    }

    /// Forget every voter, including their verification.
    pub(super) fn clear(&mut self) {
        self.voters.clear();
    }
}
