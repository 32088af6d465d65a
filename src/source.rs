//! Off-core intake of candidate and voter lists.
//!
//! The election never depends on where these lists come from; it only sees
//! the records an [`IdentitySource`] yields.

use std::collections::HashMap;

use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::Identity;

/// A candidate as listed by the source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateRecord {
    pub name: String,
    #[serde(default, alias = "agenda", alias = "slogan")]
    pub platform_statement: String,
}

/// A voter as listed by the source, with the token an administrator will
/// verify them against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoterRecord {
    pub identity: Identity,
    pub name: String,
    #[serde(default)]
    pub contact: String,
    #[serde(alias = "did")]
    pub token: String,
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("No identity source is configured")]
    Unconfigured,
    #[error("List '{0}' not found")]
    UnknownList(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Capability that yields validated candidate and voter lists, by list ID.
#[rocket::async_trait]
pub trait IdentitySource: Send + Sync {
    async fn candidates(&self, list: &str) -> Result<Vec<CandidateRecord>, SourceError>;

    async fn voters(&self, list: &str) -> Result<Vec<VoterRecord>, SourceError>;
}

/// Fetches lists as JSON from a content-addressed HTTP gateway, at
/// `<base_url>/<list>`.
pub struct GatewaySource {
    client: HttpClient,
    base_url: String,
}

impl GatewaySource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: HttpClient::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url_for(&self, list: &str) -> String {
        format!("{}/{}", self.base_url, list.trim_start_matches('/'))
    }

    async fn fetch<T>(&self, list: &str) -> Result<Vec<T>, SourceError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let url = self.url_for(list);
        debug!("Fetching list from {url}");
        let response = self.client.get(&url).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(SourceError::UnknownList(list.to_string()));
        }
        Ok(response.error_for_status()?.json().await?)
    }
}

#[rocket::async_trait]
impl IdentitySource for GatewaySource {
    async fn candidates(&self, list: &str) -> Result<Vec<CandidateRecord>, SourceError> {
        self.fetch(list).await
    }

    async fn voters(&self, list: &str) -> Result<Vec<VoterRecord>, SourceError> {
        self.fetch(list).await
    }
}

/// Lists held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    candidates: HashMap<String, Vec<CandidateRecord>>,
    voters: HashMap<String, Vec<VoterRecord>>,
}

impl StaticSource {
    pub fn with_candidates(mut self, list: &str, records: Vec<CandidateRecord>) -> Self {
        self.candidates.insert(list.to_string(), records);
        self
    }

    pub fn with_voters(mut self, list: &str, records: Vec<VoterRecord>) -> Self {
        self.voters.insert(list.to_string(), records);
        self
    }
}

#[rocket::async_trait]
impl IdentitySource for StaticSource {
    async fn candidates(&self, list: &str) -> Result<Vec<CandidateRecord>, SourceError> {
        self.candidates
            .get(list)
            .cloned()
            .ok_or_else(|| SourceError::UnknownList(list.to_string()))
    }

    async fn voters(&self, list: &str) -> Result<Vec<VoterRecord>, SourceError> {
        self.voters
            .get(list)
            .cloned()
            .ok_or_else(|| SourceError::UnknownList(list.to_string()))
    }
}

/// Stands in when no gateway is configured; every fetch fails.
pub struct NoSource;

#[rocket::async_trait]
impl IdentitySource for NoSource {
    async fn candidates(&self, _list: &str) -> Result<Vec<CandidateRecord>, SourceError> {
        Err(SourceError::Unconfigured)
    }

    async fn voters(&self, _list: &str) -> Result<Vec<VoterRecord>, SourceError> {
        Err(SourceError::Unconfigured)
    }
}


#[cfg(test)]
mod tests {
    use rocket::serde::json::serde_json;

    use super::*;

    #[test]
    fn records_accept_list_field_names() {
        let candidate: CandidateRecord =
            serde_json::from_str(r#"{"name": "Bob", "agenda": "Free lunch"}"#).unwrap();
        assert_eq!(candidate.platform_statement, "Free lunch");

        let voter: VoterRecord = serde_json::from_str(
            r#"{"identity": "0xv1", "name": "V1", "did": "did:1"}"#,
        )
        .unwrap();
        assert_eq!(voter.identity, Identity::new("0xv1"));
        assert_eq!(voter.token, "did:1");
        assert_eq!(voter.contact, "");
    }

    #[test]
    fn gateway_urls() {
        let source = GatewaySource::new("https://gateway.example/ipfs/");
        assert_eq!(source.url_for("QmList"), "https://gateway.example/ipfs/QmList");
    }

    #[rocket::async_test]
    async fn static_lists() {
        let source = StaticSource::example();
        assert_eq!(source.candidates(examples::CANDIDATE_LIST).await.unwrap().len(), 2);
        assert!(matches!(
            source.voters("missing").await,
            Err(SourceError::UnknownList(_))
        ));
        assert!(matches!(
            NoSource.voters("any").await,
            Err(SourceError::Unconfigured)
        ));
    }
}
