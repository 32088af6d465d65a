use serde::{Deserialize, Serialize};

use super::ElectionError;

/// Candidates are indexed by insertion order, starting at zero.
pub type CandidateIndex = u32;

/// A single candidate and its running tally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub index: CandidateIndex,
    pub name: String,
    pub platform_statement: String,
    pub vote_count: u32,
}

/// Ordered list of candidates with unique names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateRegistry {
    candidates: Vec<Candidate>,
}

impl CandidateRegistry {
    /// Rebuild from stored rows, which carry their own indices.
    pub(super) fn restore(mut candidates: Vec<Candidate>) -> Self {
        candidates.sort_by_key(|c| c.index);
        Self { candidates }
    }

    /// Append a candidate and return its index.
    ///
    /// Names are compared exactly, so "Bob" and "bob" are distinct candidates.
    pub fn add(
        &mut self,
        name: String,
        platform_statement: String,
    ) -> Result<CandidateIndex, ElectionError> {
        if name.trim().is_empty() {
            return Err(ElectionError::validation("candidate name must not be empty"));
        }
        if self.candidates.iter().any(|c| c.name == name) {
            return Err(ElectionError::DuplicateCandidate);
        }
        let index = CandidateIndex::try_from(self.candidates.len())
            .map_err(|_| ElectionError::validation("too many candidates"))?;
        self.candidates.push(Candidate {
            index,
            name,
            platform_statement,
            vote_count: 0,
        });
        Ok(index)
    }

    pub fn get(&self, index: CandidateIndex) -> Result<&Candidate, ElectionError> {
        self.candidates
            .get(index as usize)
            .ok_or_else(|| ElectionError::not_found(format!("Candidate {index}")))
    }

    pub(super) fn get_mut(&mut self, index: CandidateIndex) -> Option<&mut Candidate> {
        self.candidates.get_mut(index as usize)
    }

    pub fn count(&self) -> u32 {
        // `add` refuses to grow past `CandidateIndex::MAX`.
        self.candidates.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Candidate> {
        self.candidates.iter()
    }

    /// Remove every candidate; the next one added gets index zero again.
    pub(super) fn clear(&mut self) {
        self.candidates.clear();
    }
}
