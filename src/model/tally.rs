use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AuditEvent, Candidate, CandidateIndex, Election, ElectionError, Identity, Phase};

/// The candidate with the most votes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Winner {
    pub winner_index: CandidateIndex,
    pub winner_name: String,
    pub winner_votes: u32,
}

/// One candidate's share of the vote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateResult {
    pub index: CandidateIndex,
    pub name: String,
    pub platform_statement: String,
    pub votes: u32,
    /// Percentage of all votes cast, to one decimal place.
    pub percentage: String,
}

/// Running or final results, in candidate index order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionResults {
    pub total_votes: u64,
    pub candidates: Vec<CandidateResult>,
    /// Current leader by the same rule as the declared winner.
    pub leader: Option<Winner>,
}

/// Plurality with ties going to the lowest index.
fn plurality<'a>(candidates: impl Iterator<Item = &'a Candidate>) -> Option<&'a Candidate> {
    candidates.fold(None, |best: Option<&Candidate>, candidate| match best {
        // Strictly greater only: an equal count never displaces an earlier candidate.
        Some(b) if candidate.vote_count <= b.vote_count => Some(b),
        _ => Some(candidate),
    })
}

impl From<&Candidate> for Winner {
    fn from(candidate: &Candidate) -> Self {
        Self {
            winner_index: candidate.index,
            winner_name: candidate.name.clone(),
            winner_votes: candidate.vote_count,
        }
    }
}

impl Election {
    /// Cast `voter`'s single vote for the candidate at `index`.
    ///
    /// Preconditions are checked in a fixed order so that each refusal has
    /// exactly one cause.
    pub fn vote(
        &mut self,
        voter: &Identity,
        index: CandidateIndex,
        now: DateTime<Utc>,
    ) -> Result<(), ElectionError> {
        if self.paused {
            return Err(ElectionError::Paused);
        }
        if !self.is_voting_open(now) {
            return Err(ElectionError::NotActive);
        }
        let record = self.voters.get(voter).map_err(|_| ElectionError::NotRegistered)?;
        if !record.is_verified {
            return Err(ElectionError::NotVerified);
        }
        if record.has_voted {
            return Err(ElectionError::AlreadyVoted);
        }
        let ceiling = self.config.max_votes_per_candidate;
        let candidate = self
            .candidates
            .get_mut(index)
            .ok_or(ElectionError::InvalidCandidate)?;
        if candidate.vote_count >= ceiling {
            return Err(ElectionError::VoteLimitReached);
        }

        self.voters.mark_voted(voter)?;
        candidate.vote_count += 1;
        self.events.push(AuditEvent::VoteCast {
            voter: voter.clone(),
            candidate: index,
            at: now,
        });
        Ok(())
    }

    /// The winner of an ended election. Read-only, so repeated calls agree.
    pub fn declare_winner(&self, caller: &Identity) -> Result<Winner, ElectionError> {
        self.access.require_admin(caller)?;
        if self.phase != Phase::Ended {
            return Err(ElectionError::NotEnded);
        }
        plurality(self.candidates.iter())
            .map(Winner::from)
            .ok_or_else(|| ElectionError::not_found("Candidates"))
    }

    /// Results so far. Available in every phase.
    pub fn results(&self) -> ElectionResults {
        let total_votes: u64 = self.candidates.iter().map(|c| u64::from(c.vote_count)).sum();
        let candidates = self
            .candidates
            .iter()
            .map(|c| CandidateResult {
                index: c.index,
                name: c.name.clone(),
                platform_statement: c.platform_statement.clone(),
                votes: c.vote_count,
                percentage: if total_votes > 0 {
                    format!("{:.1}", f64::from(c.vote_count) * 100.0 / total_votes as f64)
                } else {
                    "0.0".to_string()
                },
            })
            .collect();
        ElectionResults {
            total_votes,
            candidates,
            leader: plurality(self.candidates.iter()).map(Winner::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::model::election::examples::*;

    fn voter(name: &str) -> Identity {
        Identity::new(name)
    }

    #[test]
    fn one_vote_per_voter() {
        let mut election = Election::configured_example(5, &["Bob", "Alice"]);
        election.with_verified_voter("voter1");
        election.start(&admin(), 5, t0()).unwrap();

        assert_eq!(election.vote(&voter("voter1"), 0, t0()), Ok(()));
        assert_eq!(
            election.vote(&voter("voter1"), 1, t0()),
            Err(ElectionError::AlreadyVoted)
        );
        assert_eq!(election.candidate(0).unwrap().vote_count, 1);
        assert_eq!(election.candidate(1).unwrap().vote_count, 0);
        assert!(election.voter(&voter("voter1")).unwrap().has_voted);
    }

    #[test]
    fn ceiling_is_enforced() {
        let mut election = Election::configured_example(1, &["Bob"]);
        election.with_verified_voter("voter1");
        election.with_verified_voter("voter2");
        election.start(&admin(), 5, t0()).unwrap();

        election.vote(&voter("voter1"), 0, t0()).unwrap();
        assert_eq!(
            election.vote(&voter("voter2"), 0, t0()),
            Err(ElectionError::VoteLimitReached)
        );
        assert_eq!(election.candidate(0).unwrap().vote_count, 1);
        // The refused voter can still vote elsewhere later; their flag is untouched.
        assert!(!election.voter(&voter("voter2")).unwrap().has_voted);
    }

    #[test]
    fn refusal_order() {
        let mut election = Election::configured_example(1, &["Bob"]);
        election.with_verified_voter("voter1");
        election
            .register_voter(
                voter("voter2"),
                "V2".into(),
                "2".into(),
                key().digest("did:2"),
            )
            .unwrap();

        // Not started.
        assert_eq!(
            election.vote(&voter("voter1"), 0, t0()),
            Err(ElectionError::NotActive)
        );

        election.start(&admin(), 5, t0()).unwrap();
        assert_eq!(
            election.vote(&voter("ghost"), 0, t0()),
            Err(ElectionError::NotRegistered)
        );
        assert_eq!(
            election.vote(&voter("voter2"), 0, t0()),
            Err(ElectionError::NotVerified)
        );
        assert_eq!(
            election.vote(&voter("voter1"), 7, t0()),
            Err(ElectionError::InvalidCandidate)
        );

        // Paused trumps everything else.
        election.set_paused(&admin(), true).unwrap();
        assert_eq!(
            election.vote(&voter("ghost"), 7, t0()),
            Err(ElectionError::Paused)
        );
    }

    #[test]
    fn deadline_closes_voting() {
        let mut election = Election::configured_example(3, &["Bob"]);
        election.with_verified_voter("voter1");
        election.with_verified_voter("voter2");
        election.start(&admin(), 5, t0()).unwrap();

        // The deadline itself is still open.
        let deadline = t0() + Duration::minutes(5);
        assert_eq!(election.vote(&voter("voter1"), 0, deadline), Ok(()));
        assert_eq!(
            election.vote(&voter("voter2"), 0, deadline + Duration::seconds(1)),
            Err(ElectionError::NotActive)
        );
        assert_eq!(election.phase(), Phase::Active);
    }

    #[test]
    fn pause_and_resume_voting() {
        let mut election = Election::configured_example(3, &["Bob"]);
        election.with_verified_voter("voter1");
        election.start(&admin(), 5, t0()).unwrap();

        election.set_paused(&admin(), true).unwrap();
        assert_eq!(
            election.vote(&voter("voter1"), 0, t0()),
            Err(ElectionError::Paused)
        );
        election.set_paused(&admin(), false).unwrap();
        assert_eq!(election.vote(&voter("voter1"), 0, t0()), Ok(()));
    }

    #[test]
    fn vote_is_audited() {
        let mut election = Election::configured_example(3, &["Bob"]);
        election.with_verified_voter("voter1");
        election.start(&admin(), 5, t0()).unwrap();
        election.drain_events();

        let at = t0() + Duration::seconds(30);
        election.vote(&voter("voter1"), 0, at).unwrap();
        assert_eq!(
            election.drain_events(),
            vec![AuditEvent::VoteCast {
                voter: voter("voter1"),
                candidate: 0,
                at,
            }]
        );

        // Refused votes leave no trace.
        let _ = election.vote(&voter("voter1"), 0, at);
        assert!(election.drain_events().is_empty());
    }

    #[test]
    fn winner_only_after_end() {
        let mut election = Election::configured_example(2, &["Bob", "Alice"]);
        election.with_verified_voter("voter1");
        election.with_verified_voter("voter2");
        election.start(&admin(), 5, t0()).unwrap();
        election.vote(&voter("voter1"), 0, t0()).unwrap();
        election.vote(&voter("voter2"), 0, t0()).unwrap();

        assert_eq!(election.declare_winner(&admin()), Err(ElectionError::NotEnded));
        election.end(&admin(), t0() + Duration::minutes(5)).unwrap();
        assert_eq!(
            election.declare_winner(&voter("voter1")),
            Err(ElectionError::Unauthorized)
        );

        let expected = Winner {
            winner_index: 0,
            winner_name: "Bob".to_string(),
            winner_votes: 2,
        };
        assert_eq!(election.declare_winner(&admin()), Ok(expected.clone()));
        // Idempotent.
        assert_eq!(election.declare_winner(&root()), Ok(expected));
    }

    #[test]
    fn ties_go_to_lowest_index() {
        let mut election = Election::configured_example(5, &["Bob", "Alice", "Carol"]);
        for v in ["v1", "v2", "v3", "v4"] {
            election.with_verified_voter(v);
        }
        election.start(&admin(), 5, t0()).unwrap();
        election.vote(&voter("v1"), 2, t0()).unwrap();
        election.vote(&voter("v2"), 1, t0()).unwrap();
        election.vote(&voter("v3"), 2, t0()).unwrap();
        election.vote(&voter("v4"), 1, t0()).unwrap();
        election.end(&admin(), t0()).unwrap();

        let winner = election.declare_winner(&admin()).unwrap();
        assert_eq!(winner.winner_index, 1);
        assert_eq!(winner.winner_name, "Alice");
        assert_eq!(winner.winner_votes, 2);
    }

    #[test]
    fn no_votes_goes_to_first_candidate() {
        let mut election = Election::configured_example(5, &["Bob", "Alice"]);
        election.start(&admin(), 5, t0()).unwrap();
        election.end(&admin(), t0()).unwrap();
        assert_eq!(
            election.declare_winner(&admin()),
            Ok(Winner {
                winner_index: 0,
                winner_name: "Bob".to_string(),
                winner_votes: 0,
            })
        );
    }

    #[test]
    fn results_with_percentages() {
        let mut election = Election::configured_example(5, &["Bob", "Alice", "Carol"]);
        assert_eq!(election.results().total_votes, 0);
        assert_eq!(election.results().candidates[0].percentage, "0.0");

        for v in ["v1", "v2", "v3"] {
            election.with_verified_voter(v);
        }
        election.start(&admin(), 5, t0()).unwrap();
        election.vote(&voter("v1"), 1, t0()).unwrap();
        election.vote(&voter("v2"), 1, t0()).unwrap();
        election.vote(&voter("v3"), 2, t0()).unwrap();

        let results = election.results();
        assert_eq!(results.total_votes, 3);
        let shares: Vec<_> = results
            .candidates
            .iter()
            .map(|c| (c.name.as_str(), c.votes, c.percentage.as_str()))
            .collect();
        assert_eq!(
            shares,
            vec![("Bob", 0, "0.0"), ("Alice", 2, "66.7"), ("Carol", 1, "33.3")]
        );
        assert_eq!(results.leader.unwrap().winner_name, "Alice");
        assert!(Election::example().results().leader.is_none());
    }
}
