use rocket::{serde::json::Json, Route, State};
use serde::{Deserialize, Serialize};

use super::{Caller, Paginated, PaginationRequest};
use crate::error::Result;
use crate::ledger::{Ledger, RecordOutcome};
use crate::model::{
    CandidateIndex, ElectionDetails, ElectionWindow, Identity, VoterSummary, Winner,
};
use crate::source::IdentitySource;

pub fn routes() -> Vec<Route> {
    routes![
        get_admins,
        add_admin,
        remove_admin,
        set_details,
        add_candidate,
        list_voters,
        verify_voter,
        start_election,
        end_election,
        pause_election,
        reset_election,
        declare_winner,
        import_candidates,
        import_voters,
        verify_voters,
    ]
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminList {
    pub root: Identity,
    /// Delegated administrators, excluding the root.
    pub admins: Vec<Identity>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminRequest {
    pub identity: Identity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateRequest {
    pub name: String,
    #[serde(default)]
    pub platform_statement: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateCreated {
    pub index: CandidateIndex,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyRequest {
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    pub duration_minutes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PauseRequest {
    pub paused: bool,
}

/// Names a list held by the identity source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportRequest {
    pub list: String,
}

#[get("/admins")]
async fn get_admins(ledger: &State<Ledger>) -> Json<AdminList> {
    let election = ledger.snapshot();
    Json(AdminList {
        root: election.access().root().clone(),
        admins: election.access().admins().cloned().collect(),
    })
}

#[post("/admins", data = "<request>", format = "json")]
async fn add_admin(
    caller: Caller,
    request: Json<AdminRequest>,
    ledger: &State<Ledger>,
) -> Result<()> {
    ledger.add_admin(&caller.0, request.0.identity).await
}

#[delete("/admins/<identity>")]
async fn remove_admin(caller: Caller, identity: Identity, ledger: &State<Ledger>) -> Result<()> {
    ledger.remove_admin(&caller.0, &identity).await
}

#[put("/election/details", data = "<details>", format = "json")]
async fn set_details(
    caller: Caller,
    details: Json<ElectionDetails>,
    ledger: &State<Ledger>,
) -> Result<()> {
    ledger.set_details(&caller.0, details.0).await
}

#[post("/election/candidates", data = "<candidate>", format = "json")]
async fn add_candidate(
    caller: Caller,
    candidate: Json<CandidateRequest>,
    ledger: &State<Ledger>,
) -> Result<Json<CandidateCreated>> {
    let CandidateRequest {
        name,
        platform_statement,
    } = candidate.0;
    let index = ledger.add_candidate(&caller.0, name, platform_statement).await?;
    Ok(Json(CandidateCreated { index }))
}

/// Registered voters, optionally filtered by verification status.
#[get("/election/voters?<verified>")]
async fn list_voters(
    caller: Caller,
    verified: Option<bool>,
    pagination: PaginationRequest,
    ledger: &State<Ledger>,
) -> Result<Json<Paginated<VoterSummary>>> {
    let (voters, total) = ledger.snapshot().list_voters(
        &caller.0,
        verified,
        pagination.skip(),
        pagination.page_size(),
    )?;
    Ok(Json(pagination.to_paginated(total, voters)))
}

#[post("/election/voters/<identity>/verify", data = "<request>", format = "json")]
async fn verify_voter(
    caller: Caller,
    identity: Identity,
    request: Json<VerifyRequest>,
    ledger: &State<Ledger>,
) -> Result<()> {
    ledger.verify_voter(&caller.0, &identity, &request.token).await
}

#[post("/election/start", data = "<request>", format = "json")]
async fn start_election(
    caller: Caller,
    request: Json<StartRequest>,
    ledger: &State<Ledger>,
) -> Result<Json<ElectionWindow>> {
    let window = ledger.start(&caller.0, request.duration_minutes).await?;
    Ok(Json(Some(window).into()))
}

#[post("/election/end")]
async fn end_election(caller: Caller, ledger: &State<Ledger>) -> Result<Json<ElectionWindow>> {
    let window = ledger.end(&caller.0).await?;
    Ok(Json(Some(window).into()))
}

#[post("/election/pause", data = "<request>", format = "json")]
async fn pause_election(
    caller: Caller,
    request: Json<PauseRequest>,
    ledger: &State<Ledger>,
) -> Result<()> {
    ledger.set_paused(&caller.0, request.paused).await
}

#[post("/election/reset")]
async fn reset_election(caller: Caller, ledger: &State<Ledger>) -> Result<()> {
    ledger.reset(&caller.0).await
}

#[get("/election/winner")]
async fn declare_winner(caller: Caller, ledger: &State<Ledger>) -> Result<Json<Winner>> {
    Ok(Json(ledger.declare_winner(&caller.0)?))
}

#[post("/election/import/candidates", data = "<request>", format = "json")]
async fn import_candidates(
    caller: Caller,
    request: Json<ImportRequest>,
    ledger: &State<Ledger>,
    source: &State<Box<dyn IdentitySource>>,
) -> Result<Json<Vec<RecordOutcome>>> {
    let outcomes = ledger
        .import_candidates(&caller.0, source.inner().as_ref(), &request.list)
        .await?;
    Ok(Json(outcomes))
}

#[post("/election/import/voters", data = "<request>", format = "json")]
async fn import_voters(
    caller: Caller,
    request: Json<ImportRequest>,
    ledger: &State<Ledger>,
    source: &State<Box<dyn IdentitySource>>,
) -> Result<Json<Vec<RecordOutcome>>> {
    let outcomes = ledger
        .import_voters(&caller.0, source.inner().as_ref(), &request.list)
        .await?;
    Ok(Json(outcomes))
}

#[post("/election/import/verify", data = "<request>", format = "json")]
async fn verify_voters(
    caller: Caller,
    request: Json<ImportRequest>,
    ledger: &State<Ledger>,
    source: &State<Box<dyn IdentitySource>>,
) -> Result<Json<Vec<RecordOutcome>>> {
    let outcomes = ledger
        .verify_voters(&caller.0, source.inner().as_ref(), &request.list)
        .await?;
    Ok(Json(outcomes))
}
