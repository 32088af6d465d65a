use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{
    AccessControl, AuditEvent, Candidate, CandidateIndex, CandidateRegistry, ElectionConfig,
    ElectionDetails, ElectionError, ElectionWindow, Identity, Phase, TokenDigest, Voter,
    VoterRegistry, VoterSummary, VotingWindow,
};

/// Longest voting window an administrator may open.
pub const MAX_DURATION_MINUTES: i64 = 366 * 24 * 60;

/// The complete state of one election cycle, and the commands that change it.
///
/// Every command either succeeds completely or returns an error having changed
/// nothing. Successful commands queue [`AuditEvent`]s, which the owner collects
/// with [`Election::drain_events`].
#[derive(Debug, Clone, PartialEq)]
pub struct Election {
    pub(super) access: AccessControl,
    pub(super) config: ElectionConfig,
    pub(super) candidates: CandidateRegistry,
    pub(super) voters: VoterRegistry,
    pub(super) window: Option<VotingWindow>,
    pub(super) phase: Phase,
    pub(super) paused: bool,
    pub(super) events: Vec<AuditEvent>,
}

/// Everything about an election except its candidates and voters.
///
/// Its size does not grow with the electorate, so it is stored as one
/// document while candidates and voters get a row each.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionHeader {
    pub access: AccessControl,
    pub config: ElectionConfig,
    pub window: Option<VotingWindow>,
    pub phase: Phase,
    pub paused: bool,
}

impl Election {
    /// Create an unconfigured election governed by the given root authority.
    pub fn new(root: Identity) -> Self {
        Self {
            access: AccessControl::new(root),
            config: ElectionConfig::default(),
            candidates: CandidateRegistry::default(),
            voters: VoterRegistry::default(),
            window: None,
            phase: Phase::Unconfigured,
            paused: false,
            events: Vec::new(),
        }
    }

    /// Reassemble a stored election. Candidates may arrive in any order.
    pub fn from_parts(
        header: ElectionHeader,
        candidates: Vec<Candidate>,
        voters: Vec<Voter>,
    ) -> Self {
        Self {
            access: header.access,
            config: header.config,
            candidates: CandidateRegistry::restore(candidates),
            voters: voters.into_iter().collect(),
            window: header.window,
            phase: header.phase,
            paused: header.paused,
            events: Vec::new(),
        }
    }

    pub fn header(&self) -> ElectionHeader {
        ElectionHeader {
            access: self.access.clone(),
            config: self.config.clone(),
            window: self.window,
            phase: self.phase,
            paused: self.paused,
        }
    }

    /// Take the audit events queued by commands since the last call.
    pub fn drain_events(&mut self) -> Vec<AuditEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn add_admin(&mut self, caller: &Identity, admin: Identity) -> Result<(), ElectionError> {
        if self.access.add_admin(caller, admin.clone())? {
            self.events.push(AuditEvent::AdminAdded {
                by: caller.clone(),
                admin,
            });
        }
        Ok(())
    }

    pub fn remove_admin(&mut self, caller: &Identity, admin: &Identity) -> Result<(), ElectionError> {
        if self.access.remove_admin(caller, admin)? {
            self.events.push(AuditEvent::AdminRemoved {
                by: caller.clone(),
                admin: admin.clone(),
            });
        }
        Ok(())
    }

    /// Set or overwrite the election details. Allowed until the election starts.
    pub fn set_details(
        &mut self,
        caller: &Identity,
        details: ElectionDetails,
    ) -> Result<(), ElectionError> {
        self.access.require_admin(caller)?;
        self.require_setup_phase()?;
        let config = ElectionConfig::try_from(details)?;

        self.events.push(AuditEvent::DetailsSet {
            by: caller.clone(),
            election_title: config.election_title.clone(),
            max_votes_per_candidate: config.max_votes_per_candidate,
        });
        self.config = config;
        if self.phase == Phase::Unconfigured {
            self.phase = Phase::Configured;
        }
        Ok(())
    }

    pub fn add_candidate(
        &mut self,
        caller: &Identity,
        name: String,
        platform_statement: String,
    ) -> Result<CandidateIndex, ElectionError> {
        self.access.require_admin(caller)?;
        self.require_setup_phase()?;
        let index = self.candidates.add(name.clone(), platform_statement)?;
        self.events.push(AuditEvent::CandidateAdded {
            by: caller.clone(),
            index,
            name,
        });
        Ok(index)
    }

    /// Register `identity` as a voter. Open to anyone until the election starts.
    pub fn register_voter(
        &mut self,
        identity: Identity,
        name: String,
        contact: String,
        token: TokenDigest,
    ) -> Result<(), ElectionError> {
        if !self.phase.is_open_for_setup() {
            return Err(ElectionError::RegistrationClosed);
        }
        self.voters
            .register(identity.clone(), name, contact, token)?;
        self.events
            .push(AuditEvent::VoterRegistered { voter: identity });
        Ok(())
    }

    /// Confirm a voter's identity against an externally supplied token.
    pub fn verify_voter(
        &mut self,
        caller: &Identity,
        identity: &Identity,
        presented: &TokenDigest,
    ) -> Result<(), ElectionError> {
        self.access.require_admin(caller)?;
        self.voters.verify(identity, presented)?;
        self.events.push(AuditEvent::VoterVerified {
            by: caller.clone(),
            voter: identity.clone(),
        });
        Ok(())
    }

    /// Open the voting window for `duration_minutes` from `now`.
    pub fn start(
        &mut self,
        caller: &Identity,
        duration_minutes: i64,
        now: DateTime<Utc>,
    ) -> Result<VotingWindow, ElectionError> {
        self.access.require_admin(caller)?;
        if self.paused {
            return Err(ElectionError::Paused);
        }
        match self.phase {
            Phase::Active => return Err(ElectionError::AlreadyActive),
            // A finished election must be reset before it can run again.
            Phase::Ended => return Err(ElectionError::InvalidPhase),
            Phase::Unconfigured | Phase::Configured => {}
        }
        if duration_minutes <= 0 {
            return Err(ElectionError::validation("duration must be > 0"));
        }
        if duration_minutes > MAX_DURATION_MINUTES {
            return Err(ElectionError::validation(format!(
                "duration must not exceed {MAX_DURATION_MINUTES} minutes"
            )));
        }
        if !self.config.configured || self.candidates.is_empty() {
            return Err(ElectionError::NotConfigured);
        }

        let window = VotingWindow::starting_at(now, Duration::minutes(duration_minutes));
        self.window = Some(window);
        self.phase = Phase::Active;
        self.events.push(AuditEvent::ElectionStarted {
            by: caller.clone(),
            start: window.start,
            end: window.end,
        });
        Ok(window)
    }

    /// Formally close the election.
    ///
    /// Ending before the deadline moves the window's end to `now`; the scheduled
    /// deadline is kept in the audit trail.
    pub fn end(&mut self, caller: &Identity, now: DateTime<Utc>) -> Result<VotingWindow, ElectionError> {
        self.access.require_admin(caller)?;
        if self.paused {
            return Err(ElectionError::Paused);
        }
        let window = match (self.phase, self.window) {
            (Phase::Active, Some(window)) => window,
            _ => return Err(ElectionError::NotActive),
        };

        let effective = VotingWindow {
            start: window.start,
            end: window.end.min(now),
        };
        self.window = Some(effective);
        self.phase = Phase::Ended;
        self.events.push(AuditEvent::ElectionEnded {
            by: caller.clone(),
            scheduled_end: window.end,
            effective_end: effective.end,
        });
        Ok(effective)
    }

    /// Pause or resume. Allowed in any phase; setting the current value changes nothing.
    pub fn set_paused(&mut self, caller: &Identity, paused: bool) -> Result<(), ElectionError> {
        self.access.require_admin(caller)?;
        if self.paused != paused {
            self.paused = paused;
            self.events.push(AuditEvent::PauseChanged {
                by: caller.clone(),
                paused,
            });
        }
        Ok(())
    }

    /// Start a new cycle: candidates, voters, details and window are wiped.
    ///
    /// Administrators and the pause flag carry over. Refused while voting is
    /// genuinely in progress, but allowed once an active window has expired.
    pub fn reset(&mut self, caller: &Identity, now: DateTime<Utc>) -> Result<(), ElectionError> {
        self.access.require_admin(caller)?;
        if self.phase == Phase::Active {
            match self.window {
                Some(window) if window.has_expired_at(now) => {}
                _ => return Err(ElectionError::CannotResetActive),
            }
        }

        self.candidates.clear();
        self.voters.clear();
        self.config = ElectionConfig::default();
        self.window = None;
        self.phase = Phase::Unconfigured;
        self.events
            .push(AuditEvent::ElectionReset { by: caller.clone() });
        Ok(())
    }

    fn require_setup_phase(&self) -> Result<(), ElectionError> {
        if self.phase.is_open_for_setup() {
            Ok(())
        } else {
            Err(ElectionError::InvalidPhase)
        }
    }

    pub fn access(&self) -> &AccessControl {
        &self.access
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn config(&self) -> &ElectionConfig {
        &self.config
    }

    pub fn window(&self) -> ElectionWindow {
        self.window.into()
    }

    pub fn voting_window(&self) -> Option<VotingWindow> {
        self.window
    }

    /// Whether a vote cast at `now` would be inside an active window.
    ///
    /// An active election whose deadline has passed is closed for voting even
    /// before an administrator formally ends it.
    pub fn is_voting_open(&self, now: DateTime<Utc>) -> bool {
        self.phase == Phase::Active && self.window.map_or(false, |w| w.is_open_at(now))
    }

    pub fn candidate_count(&self) -> u32 {
        self.candidates.count()
    }

    pub fn candidate(&self, index: CandidateIndex) -> Result<&Candidate, ElectionError> {
        self.candidates.get(index)
    }

    pub fn candidates(&self) -> impl Iterator<Item = &Candidate> {
        self.candidates.iter()
    }

    pub fn voter(&self, identity: &Identity) -> Result<VoterSummary, ElectionError> {
        self.voters.get(identity).map(VoterSummary::from)
    }

    pub fn voter_count(&self) -> usize {
        self.voters.count()
    }

    /// The full stored record of a voter, token digest included.
    pub fn voter_record(&self, identity: &Identity) -> Option<&Voter> {
        self.voters.get(identity).ok()
    }

    /// Registered voters in identity order, optionally only those whose
    /// verification status matches `verified`. Administrators only.
    ///
    /// Returns one page of summaries and the number of matching voters.
    pub fn list_voters(
        &self,
        caller: &Identity,
        verified: Option<bool>,
        skip: u64,
        limit: u64,
    ) -> Result<(Vec<VoterSummary>, u64), ElectionError> {
        self.access.require_admin(caller)?;
        let matching = || {
            self.voters
                .iter()
                .filter(move |voter| verified.map_or(true, |v| voter.is_verified == v))
        };
        let page = matching()
            .skip(usize::try_from(skip).unwrap_or(usize::MAX))
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .map(VoterSummary::from)
            .collect();
        Ok((page, matching().count() as u64))
    }

    /// Dashboard summary of the election as seen at `now`.
    pub fn status(&self, now: DateTime<Utc>) -> ElectionStatus {
        ElectionStatus {
            phase: self.phase,
            configured: self.config.configured,
            paused: self.paused,
            voting_open: self.is_voting_open(now),
            window: self.window(),
            seconds_left: match (self.phase, self.window) {
                (Phase::Active, Some(window)) => window.remaining_at(now).num_seconds(),
                _ => 0,
            },
            candidate_count: self.candidates.count(),
            voter_count: self.voters.count(),
            verified_voter_count: self.voters.verified_count(),
            votes_cast: self.voters.voted_count(),
        }
    }
}

/// Dashboard summary of the election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionStatus {
    pub phase: Phase,
    pub configured: bool,
    pub paused: bool,
    pub voting_open: bool,
    pub window: ElectionWindow,
    pub seconds_left: i64,
    pub candidate_count: u32,
    pub voter_count: usize,
    pub verified_voter_count: usize,
    pub votes_cast: usize,
}

#[cfg(test)]
pub(crate) mod examples {
    use chrono::TimeZone;

    use super::*;
    use crate::model::TokenKey;

    pub const ROOT: &str = "root";
    pub const ADMIN: &str = "admin1";

    pub fn root() -> Identity {
        Identity::new(ROOT)
    }

    pub fn admin() -> Identity {
        Identity::new(ADMIN)
    }

    pub fn key() -> TokenKey {
        TokenKey::new("test-secret")
    }

    pub fn t0() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    impl Election {
        /// Root plus one delegated admin, nothing else.
        pub fn example() -> Self {
            let mut election = Election::new(root());
            election.add_admin(&root(), admin()).unwrap();
            election.drain_events();
            election
        }

        /// Configured with the given ceiling and the given candidates.
        pub fn configured_example(max_votes: u32, candidates: &[&str]) -> Self {
            let mut election = Self::example();
            election
                .set_details(&admin(), ElectionDetails::example(max_votes))
                .unwrap();
            for name in candidates {
                election
                    .add_candidate(&admin(), name.to_string(), format!("{name} for all"))
                    .unwrap();
            }
            election.drain_events();
            election
        }

        /// Register and verify a voter whose token is `did:<identity>`.
        pub fn with_verified_voter(&mut self, identity: &str) -> &mut Self {
            self.register_voter(
                Identity::new(identity),
                identity.to_uppercase(),
                "contact".to_string(),
                key().digest(&format!("did:{identity}")),
            )
            .unwrap();
            self.verify_voter(
                &admin(),
                &Identity::new(identity),
                &key().digest(&format!("did:{identity}")),
            )
            .unwrap();
            self
        }
    }
}
