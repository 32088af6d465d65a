use std::ops::Deref;

use mongodb::{
    bson::{doc, Document},
    error::Error as DbError,
    options::IndexOptions,
    Collection, Database, IndexModel,
};
use serde::{Deserialize, Serialize};

use crate::model::{AuditRecord, Candidate, CandidateIndex, ElectionHeader, Identity, Voter};

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// ID of the one document holding the election header.
pub const ELECTION_ID: &str = "election";

/// The election header, as stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub state: ElectionHeader,
}

impl ElectionDocument {
    pub fn new(state: ElectionHeader) -> Self {
        Self {
            id: ELECTION_ID.to_string(),
            state,
        }
    }
}

/// A candidate, as stored, keyed by its index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateDocument {
    #[serde(rename = "_id")]
    pub id: CandidateIndex,
    #[serde(flatten)]
    pub candidate: Candidate,
}

impl CandidateDocument {
    pub fn new(candidate: Candidate) -> Self {
        Self {
            id: candidate.index,
            candidate,
        }
    }

    pub fn filter(index: CandidateIndex) -> Document {
        doc! {"_id": i64::from(index)}
    }
}

impl Deref for CandidateDocument {
    type Target = Candidate;

    fn deref(&self) -> &Self::Target {
        &self.candidate
    }
}

/// A voter, as stored, keyed by identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoterDocument {
    #[serde(rename = "_id")]
    pub id: Identity,
    #[serde(flatten)]
    pub voter: Voter,
}

impl VoterDocument {
    pub fn new(voter: Voter) -> Self {
        Self {
            id: voter.identity.clone(),
            voter,
        }
    }

    pub fn filter(identity: &Identity) -> Document {
        doc! {"_id": identity.as_str()}
    }
}

impl Deref for VoterDocument {
    type Target = Voter;

    fn deref(&self) -> &Self::Target {
        &self.voter
    }
}

impl MongoCollection for ElectionDocument {
    const NAME: &'static str = "election";
}

impl MongoCollection for CandidateDocument {
    const NAME: &'static str = "candidates";
}

impl MongoCollection for VoterDocument {
    const NAME: &'static str = "voters";
}

impl MongoCollection for AuditRecord {
    const NAME: &'static str = "audit";
}

/// Ensure that all the required indexes exist on the given database.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let unique = IndexOptions::builder().unique(true).build();

    // Audit records are unique and ordered by sequence number.
    let audit_index = IndexModel::builder()
        .keys(doc! {"seq": 1})
        .options(unique)
        .build();
    Coll::<AuditRecord>::from_db(db)
        .create_index(audit_index, None)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use mongodb::bson;

    use super::*;
    use crate::model::{examples::*, Election};

    #[test]
    fn documents_stay_small_for_large_electorates() {
        let mut election = Election::configured_example(1, &["Bob"]);
        for n in 0..50_000 {
            election
                .register_voter(
                    Identity::new(format!("0x{n:040x}")),
                    format!("Voter {n}"),
                    format!("voter{n}@example.com"),
                    key().digest(&format!("did:{n}")),
                )
                .unwrap();
        }

        let header = bson::to_vec(&ElectionDocument::new(election.header())).unwrap();
        assert!(header.len() < 4096, "header is {} bytes", header.len());

        let identity = Identity::new(format!("0x{:040x}", 49_999));
        let voter = VoterDocument::new(election.voter_record(&identity).unwrap().clone());
        let row = bson::to_vec(&voter).unwrap();
        assert!(row.len() < 1024, "voter row is {} bytes", row.len());
    }

    #[test]
    fn rows_round_trip_through_bson() {
        let mut election = Election::configured_example(1, &["Bob"]);
        election.with_verified_voter("voter1");
        let voter = election.voter_record(&Identity::new("voter1")).unwrap().clone();
        let candidate = election.candidate(0).unwrap().clone();

        let document = bson::to_document(&VoterDocument::new(voter.clone())).unwrap();
        assert_eq!(document.get_str("_id").unwrap(), "voter1");
        let decoded: VoterDocument = bson::from_document(document).unwrap();
        assert_eq!(decoded.voter, voter);

        let document = bson::to_document(&CandidateDocument::new(candidate.clone())).unwrap();
        let decoded: CandidateDocument = bson::from_document(document).unwrap();
        assert_eq!(decoded.candidate, candidate);
        assert_eq!(decoded.name, "Bob");
    }
}
