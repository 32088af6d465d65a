//! The election core: plain data and the commands that change it.
//!
//! Everything outside [`mongodb`] is synchronous and free of I/O; the current
//! time is always passed in by the caller.

mod access;
pub mod audit;
mod candidate;
mod clock;
mod details;
mod election;
mod error;
mod identity;
pub mod mongodb;
mod phase;
mod tally;
mod voter;

pub use access::AccessControl;
pub use audit::{AuditChain, AuditEvent, AuditRecord, GENESIS_DIGEST};
pub use candidate::{Candidate, CandidateIndex, CandidateRegistry};
pub use clock::{Clock, ManualClock, SystemClock};
pub use details::{ElectionConfig, ElectionDetails};
pub use election::{Election, ElectionHeader, ElectionStatus, MAX_DURATION_MINUTES};
pub use error::{ElectionError, ErrorClass};
pub use identity::{Identity, TokenDigest, TokenKey};
pub use phase::{ElectionWindow, Phase, VotingWindow};
pub use tally::{CandidateResult, ElectionResults, Winner};
pub use voter::{Voter, VoterRegistry, VoterSummary};

#[cfg(test)]
pub(crate) use election::examples;
