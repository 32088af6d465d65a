use std::fmt::{Display, Formatter};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// States in the election lifecycle. Pausing is tracked separately and may
/// overlay any of them.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// No details set in this cycle.
    #[default]
    Unconfigured,
    /// Details set; candidates and voters may still be added.
    Configured,
    /// Voting window opened. Voting is only accepted until the window's end.
    Active,
    /// Closed by an administrator; a winner may be declared.
    Ended,
}

impl Phase {
    /// Candidates, voters and details may only change before the election starts.
    pub fn is_open_for_setup(self) -> bool {
        matches!(self, Phase::Unconfigured | Phase::Configured)
    }
}

impl Display for Phase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Unconfigured => "unconfigured",
            Phase::Configured => "configured",
            Phase::Active => "active",
            Phase::Ended => "ended",
        };
        f.write_str(name)
    }
}

/// The period during which votes are accepted.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotingWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl VotingWindow {
    pub fn starting_at(start: DateTime<Utc>, duration: Duration) -> Self {
        Self {
            start,
            end: start + duration,
        }
    }

    /// The end time itself is still inside the window.
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        self.start <= now && now <= self.end
    }

    pub fn has_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.end
    }

    /// Time left to vote, zero once expired.
    pub fn remaining_at(&self, now: DateTime<Utc>) -> Duration {
        if self.has_expired_at(now) {
            Duration::zero()
        } else {
            self.end - now
        }
    }
}

/// Window bounds as unix timestamps in seconds; both zero before the election starts.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionWindow {
    pub start_time: i64,
    pub end_time: i64,
}

impl From<Option<VotingWindow>> for ElectionWindow {
    fn from(window: Option<VotingWindow>) -> Self {
        window
            .map(|w| Self {
                start_time: w.start.timestamp(),
                end_time: w.end.timestamp(),
            })
            .unwrap_or_default()
    }
}
