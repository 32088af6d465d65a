use std::collections::BTreeSet;
use std::sync::Mutex;

use mongodb::{
    bson::doc,
    error::Error as DbError,
    options::{FindOneOptions, FindOptions, ReplaceOptions},
    Client, Database,
};
use rocket::futures::TryStreamExt;

use super::collection::{
    ensure_indexes_exist, CandidateDocument, Coll, ElectionDocument, VoterDocument, ELECTION_ID,
};
use crate::model::{AuditEvent, AuditRecord, CandidateIndex, Election, Identity};

/// What a store hands back on startup.
#[derive(Debug, Clone)]
pub struct StoredState {
    pub election: Election,
    /// The newest audit record, which the chain resumes from.
    pub last_record: Option<AuditRecord>,
}

/// Durable home of the election state and its audit trail.
///
/// A commit writes the new state and its audit records together or not at all.
#[rocket::async_trait]
pub trait StateStore: Send + Sync {
    async fn load(&self) -> Result<Option<StoredState>, DbError>;

    /// Persist `election`, which differs from the last committed state only
    /// by what `records` describe.
    async fn commit(&self, election: &Election, records: &[AuditRecord]) -> Result<(), DbError>;

    /// A page of audit records in sequence order, and the total number of records.
    async fn audit_page(&self, skip: u64, limit: u64) -> Result<(Vec<AuditRecord>, u64), DbError>;
}

/// Candidate and voter rows touched by a batch of audit records.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RowChanges {
    /// Drop every candidate and voter row before writing the ones below.
    pub wipe: bool,
    pub candidates: BTreeSet<CandidateIndex>,
    pub voters: BTreeSet<Identity>,
}

impl RowChanges {
    pub fn from_records(records: &[AuditRecord]) -> Self {
        let mut changes = Self::default();
        for record in records {
            match &record.event {
                // Rows touched earlier in the batch are gone too.
                AuditEvent::ElectionReset { .. } => {
                    changes = Self {
                        wipe: true,
                        ..Self::default()
                    }
                }
                AuditEvent::CandidateAdded { index, .. } => {
                    changes.candidates.insert(*index);
                }
                AuditEvent::VoterRegistered { voter } | AuditEvent::VoterVerified { voter, .. } => {
                    changes.voters.insert(voter.clone());
                }
                AuditEvent::VoteCast {
                    voter, candidate, ..
                } => {
                    changes.candidates.insert(*candidate);
                    changes.voters.insert(voter.clone());
                }
                AuditEvent::AdminAdded { .. }
                | AuditEvent::AdminRemoved { .. }
                | AuditEvent::DetailsSet { .. }
                | AuditEvent::ElectionStarted { .. }
                | AuditEvent::ElectionEnded { .. }
                | AuditEvent::PauseChanged { .. } => {}
            }
        }
        changes
    }
}

/// MongoDB-backed store. Requires a deployment that supports transactions.
///
/// The election header is one small document; every candidate and voter is a
/// row of its own, so a commit rewrites only the rows its events touched.
pub struct MongoStore {
    client: Client,
    db: Database,
}

impl MongoStore {
    /// Connect and make sure the collections are ready to use.
    pub async fn connect(uri: &str, database: &str) -> Result<Self, DbError> {
        let client = Client::with_uri_str(uri).await?;
        let db = client.database(database);
        ensure_indexes_exist(&db).await?;
        Ok(Self { client, db })
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

#[rocket::async_trait]
impl StateStore for MongoStore {
    async fn load(&self) -> Result<Option<StoredState>, DbError> {
        let elections = Coll::<ElectionDocument>::from_db(&self.db);
        let candidates = Coll::<CandidateDocument>::from_db(&self.db);
        let voters = Coll::<VoterDocument>::from_db(&self.db);
        let audit = Coll::<AuditRecord>::from_db(&self.db);

        let Some(document) = elections.find_one(doc! {"_id": ELECTION_ID}, None).await? else {
            return Ok(None);
        };
        let candidates: Vec<_> = candidates
            .find(None, None)
            .await?
            .map_ok(|row| row.candidate)
            .try_collect()
            .await?;
        let voters: Vec<_> = voters
            .find(None, None)
            .await?
            .map_ok(|row| row.voter)
            .try_collect()
            .await?;
        let newest_first = FindOneOptions::builder().sort(doc! {"seq": -1}).build();
        let last_record = audit.find_one(None, newest_first).await?;

        Ok(Some(StoredState {
            election: Election::from_parts(document.state, candidates, voters),
            last_record,
        }))
    }

    async fn commit(&self, election: &Election, records: &[AuditRecord]) -> Result<(), DbError> {
        let elections = Coll::<ElectionDocument>::from_db(&self.db);
        let candidates = Coll::<CandidateDocument>::from_db(&self.db);
        let voters = Coll::<VoterDocument>::from_db(&self.db);
        let audit = Coll::<AuditRecord>::from_db(&self.db);
        let changes = RowChanges::from_records(records);
        let upsert = ReplaceOptions::builder().upsert(true).build();

        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;

        let header = ElectionDocument::new(election.header());
        elections
            .replace_one_with_session(
                doc! {"_id": ELECTION_ID},
                &header,
                upsert.clone(),
                &mut session,
            )
            .await?;

        if changes.wipe {
            candidates
                .delete_many_with_session(doc! {}, None, &mut session)
                .await?;
            voters
                .delete_many_with_session(doc! {}, None, &mut session)
                .await?;
        }
        for index in changes.candidates {
            let filter = CandidateDocument::filter(index);
            match election.candidate(index) {
                Ok(candidate) => {
                    let row = CandidateDocument::new(candidate.clone());
                    candidates
                        .replace_one_with_session(filter, &row, upsert.clone(), &mut session)
                        .await?;
                }
                Err(_) => {
                    candidates
                        .delete_one_with_session(filter, None, &mut session)
                        .await?;
                }
            }
        }
        for identity in changes.voters {
            let filter = VoterDocument::filter(&identity);
            match election.voter_record(&identity) {
                Some(voter) => {
                    let row = VoterDocument::new(voter.clone());
                    voters
                        .replace_one_with_session(filter, &row, upsert.clone(), &mut session)
                        .await?;
                }
                None => {
                    voters
                        .delete_one_with_session(filter, None, &mut session)
                        .await?;
                }
            }
        }

        if !records.is_empty() {
            audit
                .insert_many_with_session(records, None, &mut session)
                .await?;
        }

        session.commit_transaction().await?;
        Ok(())
    }

    async fn audit_page(&self, skip: u64, limit: u64) -> Result<(Vec<AuditRecord>, u64), DbError> {
        let audit = Coll::<AuditRecord>::from_db(&self.db);
        let options = FindOptions::builder()
            .sort(doc! {"seq": 1})
            .skip(skip.min(i64::MAX as u64))
            .limit(i64::try_from(limit).unwrap_or(i64::MAX))
            .build();
        let page = audit.find(None, options).await?.try_collect().await?;
        let total = audit.count_documents(None, None).await?;
        Ok((page, total))
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    election: Option<Election>,
    audit: Vec<AuditRecord>,
}

/// Keeps everything in process memory. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[rocket::async_trait]
impl StateStore for MemoryStore {
    async fn load(&self) -> Result<Option<StoredState>, DbError> {
        let state = self.lock();
        Ok(state.election.clone().map(|election| StoredState {
            election,
            last_record: state.audit.last().cloned(),
        }))
    }

    async fn commit(&self, election: &Election, records: &[AuditRecord]) -> Result<(), DbError> {
        let mut state = self.lock();
        state.election = Some(election.clone());
        state.audit.extend_from_slice(records);
        Ok(())
    }

    async fn audit_page(&self, skip: u64, limit: u64) -> Result<(Vec<AuditRecord>, u64), DbError> {
        let state = self.lock();
        let page = state
            .audit
            .iter()
            .skip(usize::try_from(skip).unwrap_or(usize::MAX))
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .cloned()
            .collect();
        Ok((page, state.audit.len() as u64))
    }
}
