use rocket::{serde::json::Json, Route, State};
use serde::{Deserialize, Serialize};

use super::Caller;
use crate::error::Result;
use crate::ledger::Ledger;
use crate::model::{CandidateIndex, VoterSummary};

pub fn routes() -> Vec<Route> {
    routes![register, me, vote]
}

/// Self-registration. The token is the caller's external identity token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
    pub name: String,
    #[serde(default)]
    pub contact: String,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ballot {
    pub candidate: CandidateIndex,
}

#[post("/voters", data = "<registration>", format = "json")]
async fn register(
    caller: Caller,
    registration: Json<Registration>,
    ledger: &State<Ledger>,
) -> Result<()> {
    let Registration {
        name,
        contact,
        token,
    } = registration.0;
    ledger.register_voter(caller.0, name, contact, &token).await
}

#[get("/voters/me")]
async fn me(caller: Caller, ledger: &State<Ledger>) -> Result<Json<VoterSummary>> {
    Ok(Json(ledger.snapshot().voter(&caller.0)?))
}

#[post("/vote", data = "<ballot>", format = "json")]
async fn vote(caller: Caller, ballot: Json<Ballot>, ledger: &State<Ledger>) -> Result<()> {
    ledger.vote(&caller.0, ballot.candidate).await
}
