use serde::{Deserialize, Serialize};

use super::ElectionError;

/// Election metadata, set by an administrator before voting starts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionConfig {
    pub organizer_name: String,
    pub organizer_contact: String,
    pub organizer_title: String,
    pub election_title: String,
    pub organization_title: String,
    /// Ceiling on the votes any single candidate may receive.
    pub max_votes_per_candidate: u32,
    /// False until details have been set in the current cycle.
    pub configured: bool,
}

/// Election details as submitted by an administrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionDetails {
    #[serde(default)]
    pub organizer_name: String,
    #[serde(default)]
    pub organizer_contact: String,
    #[serde(default)]
    pub organizer_title: String,
    pub election_title: String,
    #[serde(default)]
    pub organization_title: String,
    pub max_votes_per_candidate: u32,
}

impl TryFrom<ElectionDetails> for ElectionConfig {
    type Error = ElectionError;

    fn try_from(details: ElectionDetails) -> Result<Self, Self::Error> {
        if details.election_title.trim().is_empty() {
            return Err(ElectionError::validation("election title must not be empty"));
        }
        if details.max_votes_per_candidate < 1 {
            return Err(ElectionError::validation(
                "max votes per candidate must be at least 1",
            ));
        }
        Ok(Self {
            organizer_name: details.organizer_name,
            organizer_contact: details.organizer_contact,
            organizer_title: details.organizer_title,
            election_title: details.election_title,
            organization_title: details.organization_title,
            max_votes_per_candidate: details.max_votes_per_candidate,
            configured: true,
        })
    }
}
