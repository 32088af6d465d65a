//! The single writer in front of the election.
//!
//! Every command takes the write lock, reads the clock once, runs against a
//! scratch copy of the current state, seals its audit events onto the chain and
//! persists state and records together. Only then is the new state published.
//! Readers never take the write lock; they see the last published snapshot.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use rocket::tokio::sync::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    mongodb::{StateStore, StoredState},
    AuditChain, AuditEvent, AuditRecord, CandidateIndex, Clock, Election, ElectionDetails,
    ElectionError, ElectionStatus, Identity, TokenKey, VotingWindow, Winner,
};
use crate::source::IdentitySource;

/// How one record of a batch import fared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordOutcome {
    /// Candidate name or voter identity.
    pub key: String,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RecordOutcome {
    /// Refusals are reported per record; anything else aborts the batch.
    fn from_result<T>(key: String, result: Result<T>) -> Result<Self> {
        match result {
            Ok(_) => Ok(Self {
                key,
                ok: true,
                error: None,
            }),
            Err(Error::Election(err)) => Ok(Self {
                key,
                ok: false,
                error: Some(err.code().to_string()),
            }),
            Err(err) => Err(err),
        }
    }
}

pub struct Ledger {
    clock: Arc<dyn Clock>,
    key: TokenKey,
    store: Arc<dyn StateStore>,
    /// The write lock. Whoever holds it owns the head of the audit chain.
    chain: Mutex<AuditChain>,
    current: RwLock<Arc<Election>>,
}

impl Ledger {
    /// Resume the stored election, or start a fresh one under `root`.
    pub async fn open(
        root: Identity,
        key: TokenKey,
        clock: Arc<dyn Clock>,
        store: Arc<dyn StateStore>,
    ) -> Result<Self> {
        let (election, chain) = match store.load().await? {
            Some(StoredState {
                election,
                last_record,
            }) => {
                if !election.access().is_root(&root) {
                    return Err(Error::RootMismatch {
                        stored: election.access().root().clone(),
                        configured: root,
                    });
                }
                let chain = AuditChain::resume_after(last_record.as_ref());
                info!(
                    "Resumed {} election with {} audit records",
                    election.phase(),
                    chain.next_seq()
                );
                (election, chain)
            }
            None => {
                info!("No stored election, starting a new one under root authority {root}");
                (Election::new(root), AuditChain::default())
            }
        };

        Ok(Self {
            clock,
            key,
            store,
            chain: Mutex::new(chain),
            current: RwLock::new(Arc::new(election)),
        })
    }

    /// The latest committed state.
    pub fn snapshot(&self) -> Arc<Election> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn status(&self) -> ElectionStatus {
        self.snapshot().status(self.now())
    }

    pub async fn audit_page(&self, skip: u64, limit: u64) -> Result<(Vec<AuditRecord>, u64)> {
        Ok(self.store.audit_page(skip, limit).await?)
    }

    /// Run one command under the write lock.
    async fn execute<T, F>(&self, command: &'static str, apply: F) -> Result<T>
    where
        F: FnOnce(&mut Election, DateTime<Utc>) -> std::result::Result<T, ElectionError> + Send,
        T: Send,
    {
        let mut chain = self.chain.lock().await;
        let now = self.clock.now();
        let mut next = Election::clone(&self.snapshot());

        let output = match apply(&mut next, now) {
            Ok(output) => output,
            Err(err) => {
                warn!("Refused {command}: {err}");
                return Err(err.into());
            }
        };

        let events = next.drain_events();
        if events.is_empty() {
            debug!("{command} changed nothing");
            return Ok(output);
        }
        let mut head = chain.clone();
        let records: Vec<_> = events.into_iter().map(|e| head.seal(now, e)).collect();
        if let Err(err) = self.store.commit(&next, &records).await {
            error!("Failed to persist {command}: {err}");
            return Err(err.into());
        }

        *chain = head;
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(next);
        records.iter().for_each(log_record);
        Ok(output)
    }

    pub async fn add_admin(&self, caller: &Identity, admin: Identity) -> Result<()> {
        self.execute("addAdmin", move |election, _| election.add_admin(caller, admin))
            .await
    }

    pub async fn remove_admin(&self, caller: &Identity, admin: &Identity) -> Result<()> {
        self.execute("removeAdmin", |election, _| {
            election.remove_admin(caller, admin)
        })
        .await
    }

    pub async fn set_details(&self, caller: &Identity, details: ElectionDetails) -> Result<()> {
        self.execute("setElectionDetails", move |election, _| {
            election.set_details(caller, details)
        })
        .await
    }

    pub async fn add_candidate(
        &self,
        caller: &Identity,
        name: String,
        platform_statement: String,
    ) -> Result<CandidateIndex> {
        self.execute("addCandidate", move |election, _| {
            election.add_candidate(caller, name, platform_statement)
        })
        .await
    }

    /// Register `identity`. Only the token's keyed digest is kept.
    pub async fn register_voter(
        &self,
        identity: Identity,
        name: String,
        contact: String,
        token: &str,
    ) -> Result<()> {
        let digest = self.key.digest(token);
        self.execute("registerVoter", move |election, _| {
            election.register_voter(identity, name, contact, digest)
        })
        .await
    }

    pub async fn verify_voter(
        &self,
        caller: &Identity,
        identity: &Identity,
        presented_token: &str,
    ) -> Result<()> {
        let presented = self.key.digest(presented_token);
        self.execute("verifyVoter", move |election, _| {
            election.verify_voter(caller, identity, &presented)
        })
        .await
    }

    pub async fn start(&self, caller: &Identity, duration_minutes: i64) -> Result<VotingWindow> {
        self.execute("startElection", |election, now| {
            election.start(caller, duration_minutes, now)
        })
        .await
    }

    pub async fn end(&self, caller: &Identity) -> Result<VotingWindow> {
        self.execute("endElection", |election, now| election.end(caller, now))
            .await
    }

    pub async fn set_paused(&self, caller: &Identity, paused: bool) -> Result<()> {
        self.execute("pauseContract", |election, _| {
            election.set_paused(caller, paused)
        })
        .await
    }

    pub async fn reset(&self, caller: &Identity) -> Result<()> {
        self.execute("resetElection", |election, now| election.reset(caller, now))
            .await
    }

    pub async fn vote(&self, caller: &Identity, index: CandidateIndex) -> Result<()> {
        self.execute("vote", |election, now| election.vote(caller, index, now))
            .await
    }

    /// Read-only; never takes the write lock.
    pub fn declare_winner(&self, caller: &Identity) -> Result<Winner> {
        Ok(self.snapshot().declare_winner(caller)?)
    }

    /// Add every candidate on the source's list, each as its own command.
    pub async fn import_candidates(
        &self,
        caller: &Identity,
        source: &dyn IdentitySource,
        list: &str,
    ) -> Result<Vec<RecordOutcome>> {
        self.snapshot().access().require_admin(caller)?;
        let records = source.candidates(list).await?;
        info!("Importing {} candidates from list {list}", records.len());

        let mut outcomes = Vec::with_capacity(records.len());
        for record in records {
            let key = record.name.clone();
            let result = self
                .add_candidate(caller, record.name, record.platform_statement)
                .await;
            outcomes.push(RecordOutcome::from_result(key, result)?);
        }
        Ok(outcomes)
    }

    /// Register every voter on the source's list, each as its own command.
    pub async fn import_voters(
        &self,
        caller: &Identity,
        source: &dyn IdentitySource,
        list: &str,
    ) -> Result<Vec<RecordOutcome>> {
        self.snapshot().access().require_admin(caller)?;
        let records = source.voters(list).await?;
        info!("Importing {} voters from list {list}", records.len());

        let mut outcomes = Vec::with_capacity(records.len());
        for record in records {
            let key = record.identity.to_string();
            let result = self
                .register_voter(record.identity, record.name, record.contact, &record.token)
                .await;
            outcomes.push(RecordOutcome::from_result(key, result)?);
        }
        Ok(outcomes)
    }

    /// Verify every listed voter against the token the source holds for them.
    pub async fn verify_voters(
        &self,
        caller: &Identity,
        source: &dyn IdentitySource,
        list: &str,
    ) -> Result<Vec<RecordOutcome>> {
        self.snapshot().access().require_admin(caller)?;
        let records = source.voters(list).await?;
        info!("Verifying {} voters from list {list}", records.len());

        let mut outcomes = Vec::with_capacity(records.len());
        for record in records {
            let result = self
                .verify_voter(caller, &record.identity, &record.token)
                .await;
            outcomes.push(RecordOutcome::from_result(record.identity.to_string(), result)?);
        }
        Ok(outcomes)
    }
}

fn log_record(record: &AuditRecord) {
    let seq = record.seq;
    match &record.event {
        AuditEvent::AdminAdded { by, admin } => info!("#{seq} {by} made {admin} an administrator"),
        AuditEvent::AdminRemoved { by, admin } => {
            info!("#{seq} {by} revoked administrator {admin}")
        }
        AuditEvent::DetailsSet {
            by, election_title, ..
        } => info!("#{seq} {by} set election details for '{election_title}'"),
        AuditEvent::CandidateAdded { index, name, .. } => {
            debug!("#{seq} added candidate {index}: {name}")
        }
        AuditEvent::VoterRegistered { voter } => debug!("#{seq} registered voter {voter}"),
        AuditEvent::VoterVerified { voter, .. } => debug!("#{seq} verified voter {voter}"),
        AuditEvent::ElectionStarted { by, end, .. } => {
            info!("#{seq} {by} started the election, voting closes at {end}")
        }
        AuditEvent::ElectionEnded {
            by, effective_end, ..
        } => info!("#{seq} {by} ended the election at {effective_end}"),
        AuditEvent::PauseChanged { by, paused: true } => info!("#{seq} {by} paused the election"),
        AuditEvent::PauseChanged { by, paused: false } => {
            info!("#{seq} {by} resumed the election")
        }
        AuditEvent::ElectionReset { by } => info!("#{seq} {by} reset the election"),
        AuditEvent::VoteCast { voter, .. } => debug!("#{seq} {voter} voted"),
    }
}
