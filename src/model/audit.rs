//! Hash-chained audit trail.
//!
//! Each committed command seals its events into [`AuditRecord`]s. Every record
//! carries the digest of its predecessor, so altering, dropping or reordering
//! any record breaks every digest after it.

use chrono::{DateTime, Utc};
use data_encoding::HEXLOWER;
use rocket::serde::json::serde_json;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::{CandidateIndex, Identity};

/// The `prev` digest of the very first record.
pub const GENESIS_DIGEST: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Something that happened to the election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AuditEvent {
    AdminAdded {
        by: Identity,
        admin: Identity,
    },
    AdminRemoved {
        by: Identity,
        admin: Identity,
    },
    DetailsSet {
        by: Identity,
        election_title: String,
        max_votes_per_candidate: u32,
    },
    CandidateAdded {
        by: Identity,
        index: CandidateIndex,
        name: String,
    },
    VoterRegistered {
        voter: Identity,
    },
    VoterVerified {
        by: Identity,
        voter: Identity,
    },
    ElectionStarted {
        by: Identity,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    ElectionEnded {
        by: Identity,
        scheduled_end: DateTime<Utc>,
        effective_end: DateTime<Utc>,
    },
    PauseChanged {
        by: Identity,
        paused: bool,
    },
    ElectionReset {
        by: Identity,
    },
    VoteCast {
        voter: Identity,
        candidate: CandidateIndex,
        at: DateTime<Utc>,
    },
}

/// A sealed, chained audit event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub seq: u64,
    pub at: DateTime<Utc>,
    pub event: AuditEvent,
    pub prev: String,
    pub digest: String,
}

impl AuditRecord {
    fn compute_digest(seq: u64, at: &DateTime<Utc>, event: &AuditEvent, prev: &str) -> String {
        let body = serde_json::to_vec(&(seq, at, event)).expect("audit events serialize");
        let mut hasher = Sha256::new();
        hasher.update(prev.as_bytes());
        hasher.update(&body);
        HEXLOWER.encode(&hasher.finalize())
    }

    /// Does this record's digest match its contents?
    pub fn is_intact(&self) -> bool {
        self.digest == Self::compute_digest(self.seq, &self.at, &self.event, &self.prev)
    }
}

/// The head of the chain: where the next record goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditChain {
    next_seq: u64,
    head: String,
}

impl Default for AuditChain {
    fn default() -> Self {
        Self {
            next_seq: 0,
            head: GENESIS_DIGEST.to_string(),
        }
    }
}

impl AuditChain {
    /// Resume the chain after the given record.
    pub fn resume_after(last: Option<&AuditRecord>) -> Self {
        match last {
            Some(record) => Self {
                next_seq: record.seq + 1,
                head: record.digest.clone(),
            },
            None => Self::default(),
        }
    }

    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    /// Seal an event onto the chain.
    pub fn seal(&mut self, at: DateTime<Utc>, event: AuditEvent) -> AuditRecord {
        let seq = self.next_seq;
        let prev = std::mem::take(&mut self.head);
        let digest = AuditRecord::compute_digest(seq, &at, &event, &prev);
        self.head = digest.clone();
        self.next_seq += 1;
        AuditRecord {
            seq,
            at,
            event,
            prev,
            digest,
        }
    }
}

/// Ways a dumped audit trail can fail to verify.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("expected record {expected}, found record {found}")]
    Sequence { expected: u64, found: u64 },
    #[error("record {seq} does not follow its predecessor")]
    Link { seq: u64 },
    #[error("record {seq} has been altered")]
    Digest { seq: u64 },
}

/// Verify a complete audit trail, starting from the genesis record.
pub fn verify_chain(records: &[AuditRecord]) -> Result<(), ChainError> {
    let mut expected = AuditChain::default();
    for record in records {
        if record.seq != expected.next_seq {
            return Err(ChainError::Sequence {
                expected: expected.next_seq,
                found: record.seq,
            });
        }
        if record.prev != expected.head {
            return Err(ChainError::Link { seq: record.seq });
        }
        if !record.is_intact() {
            return Err(ChainError::Digest { seq: record.seq });
        }
        expected = AuditChain::resume_after(Some(record));
    }
    Ok(())
}

/// Per-candidate vote counts, rebuilt from the audit trail alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayedTally {
    pub name: String,
    pub votes: u64,
}

/// Replay the current cycle's tallies: candidate additions and votes since
/// the last reset, in candidate index order.
pub fn replay_tallies(records: &[AuditRecord]) -> Vec<ReplayedTally> {
    let mut tallies: Vec<ReplayedTally> = Vec::new();
    for record in records {
        match &record.event {
            AuditEvent::ElectionReset { .. } => tallies.clear(),
            AuditEvent::CandidateAdded { name, .. } => tallies.push(ReplayedTally {
                name: name.clone(),
                votes: 0,
            }),
            AuditEvent::VoteCast { candidate, .. } => {
                if let Some(tally) = tallies.get_mut(*candidate as usize) {
                    tally.votes += 1;
                }
            }
            _ => {}
        }
    }
    tallies
}
