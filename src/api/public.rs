use rocket::{serde::json::Json, Route, State};
use serde::{Deserialize, Serialize};

use super::{Paginated, PaginationRequest};
use crate::error::Result;
use crate::ledger::Ledger;
use crate::model::{
    AuditRecord, Candidate, CandidateIndex, ElectionConfig, ElectionResults, ElectionStatus,
    ElectionWindow, Identity, Phase, VoterSummary,
};

pub fn routes() -> Vec<Route> {
    routes![
        phase,
        status,
        config,
        window,
        paused,
        candidates,
        candidate_count,
        candidate,
        results,
        voter_count,
        voter,
        admin_status,
        audit,
    ]
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStatus {
    pub identity: Identity,
    pub is_admin: bool,
    pub is_root: bool,
}

#[get("/election/phase")]
async fn phase(ledger: &State<Ledger>) -> Json<Phase> {
    Json(ledger.snapshot().phase())
}

#[get("/election/status")]
async fn status(ledger: &State<Ledger>) -> Json<ElectionStatus> {
    Json(ledger.status())
}

#[get("/election/config")]
async fn config(ledger: &State<Ledger>) -> Json<ElectionConfig> {
    Json(ledger.snapshot().config().clone())
}

#[get("/election/window")]
async fn window(ledger: &State<Ledger>) -> Json<ElectionWindow> {
    Json(ledger.snapshot().window())
}

#[get("/election/paused")]
async fn paused(ledger: &State<Ledger>) -> Json<bool> {
    Json(ledger.snapshot().is_paused())
}

#[get("/election/candidates")]
async fn candidates(ledger: &State<Ledger>) -> Json<Vec<Candidate>> {
    Json(ledger.snapshot().candidates().cloned().collect())
}

#[get("/election/candidates/count")]
async fn candidate_count(ledger: &State<Ledger>) -> Json<u32> {
    Json(ledger.snapshot().candidate_count())
}

#[get("/election/candidates/<index>")]
async fn candidate(index: CandidateIndex, ledger: &State<Ledger>) -> Result<Json<Candidate>> {
    Ok(Json(ledger.snapshot().candidate(index)?.clone()))
}

#[get("/election/results")]
async fn results(ledger: &State<Ledger>) -> Json<ElectionResults> {
    Json(ledger.snapshot().results())
}

#[get("/voters/count")]
async fn voter_count(ledger: &State<Ledger>) -> Json<usize> {
    Json(ledger.snapshot().voter_count())
}

#[get("/voters/<identity>")]
async fn voter(identity: Identity, ledger: &State<Ledger>) -> Result<Json<VoterSummary>> {
    Ok(Json(ledger.snapshot().voter(&identity)?))
}

#[get("/admins/<identity>")]
async fn admin_status(identity: Identity, ledger: &State<Ledger>) -> Json<AdminStatus> {
    let election = ledger.snapshot();
    Json(AdminStatus {
        is_admin: election.access().is_admin(&identity),
        is_root: election.access().is_root(&identity),
        identity,
    })
}

#[get("/audit")]
async fn audit(
    pagination: PaginationRequest,
    ledger: &State<Ledger>,
) -> Result<Json<Paginated<AuditRecord>>> {
    let (records, total) = ledger
        .audit_page(pagination.skip(), pagination.page_size())
        .await?;
    Ok(Json(pagination.to_paginated(total, records)))
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use rocket::{http::Status, local::asynchronous::Client};

    use super::*;
    use crate::model::{audit::verify_chain, ElectionDetails, ManualClock, Winner};
    use crate::testing::{ledger, ADMIN, ROOT};

    #[backend_test]
    async fn defaults_before_configuration(client: Client) {
        let response = client.get(uri!(phase)).dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        assert_eq!(response.into_json::<Phase>().await, Some(Phase::Unconfigured));

        let window: ElectionWindow = client.get(uri!(window)).dispatch().await.into_json().await.unwrap();
        assert_eq!(window, ElectionWindow::default());

        let config: ElectionConfig = client.get(uri!(config)).dispatch().await.into_json().await.unwrap();
        assert!(!config.configured);

        let paused: bool = client.get(uri!(paused)).dispatch().await.into_json().await.unwrap();
        assert!(!paused);

        let count: u32 = client.get(uri!(candidate_count)).dispatch().await.into_json().await.unwrap();
        assert_eq!(count, 0);
        let list: Vec<Candidate> = client.get(uri!(candidates)).dispatch().await.into_json().await.unwrap();
        assert!(list.is_empty());

        let response = client.get(uri!(candidate(0u32))).dispatch().await;
        assert_eq!(response.status(), Status::NotFound);
        let response = client.get(uri!(voter(Identity::new("0xnobody")))).dispatch().await;
        assert_eq!(response.status(), Status::NotFound);
    }

    #[backend_test(admin)]
    async fn status_and_results_track_the_election(client: Client, clock: ManualClock) {
        let ledger = ledger(&client);
        let admin = Identity::new(ADMIN);
        ledger
            .set_details(&admin, ElectionDetails::example(5))
            .await
            .unwrap();
        for name in ["Bob", "Alice", "Carol"] {
            ledger
                .add_candidate(&admin, name.to_string(), String::new())
                .await
                .unwrap();
        }
        for voter in ["0xa", "0xb", "0xc"] {
            ledger
                .register_voter(voter.into(), voter.to_uppercase(), String::new(), voter)
                .await
                .unwrap();
            ledger.verify_voter(&admin, &voter.into(), voter).await.unwrap();
        }
        ledger.start(&admin, 10).await.unwrap();
        ledger.vote(&"0xa".into(), 1).await.unwrap();
        ledger.vote(&"0xb".into(), 2).await.unwrap();
        ledger.vote(&"0xc".into(), 1).await.unwrap();
        clock.advance(Duration::minutes(4));

        let status: ElectionStatus = client.get(uri!(status)).dispatch().await.into_json().await.unwrap();
        assert_eq!(status.phase, Phase::Active);
        assert!(status.voting_open);
        assert_eq!(status.seconds_left, 6 * 60);
        assert_eq!(status.candidate_count, 3);
        assert_eq!(status.voter_count, 3);
        assert_eq!(status.verified_voter_count, 3);
        assert_eq!(status.votes_cast, 3);

        let results: ElectionResults = client.get(uri!(results)).dispatch().await.into_json().await.unwrap();
        assert_eq!(results.total_votes, 3);
        let shares: Vec<_> = results.candidates.iter().map(|c| c.percentage.as_str()).collect();
        assert_eq!(shares, ["0.0", "66.7", "33.3"]);
        assert_eq!(
            results.leader,
            Some(Winner {
                winner_index: 1,
                winner_name: "Alice".to_string(),
                winner_votes: 2,
            })
        );

        let alice: Candidate = client.get(uri!(candidate(1u32))).dispatch().await.into_json().await.unwrap();
        assert_eq!(alice.vote_count, 2);
        let summary: VoterSummary = client
            .get(uri!(voter(Identity::new("0xa"))))
            .dispatch()
            .await
            .into_json()
            .await
            .unwrap();
        assert!(summary.has_voted);
        let voters: usize = client.get(uri!(voter_count)).dispatch().await.into_json().await.unwrap();
        assert_eq!(voters, 3);

        // Past the deadline the election is still Active, but closed to votes.
        clock.advance(Duration::minutes(7));
        let status: ElectionStatus = client.get(uri!(status)).dispatch().await.into_json().await.unwrap();
        assert_eq!(status.phase, Phase::Active);
        assert!(!status.voting_open);
        assert_eq!(status.seconds_left, 0);
    }

    #[backend_test(admin)]
    async fn admin_lookups(client: Client) {
        let status: AdminStatus = client
            .get(uri!(admin_status(Identity::new(ADMIN))))
            .dispatch()
            .await
            .into_json()
            .await
            .unwrap();
        assert!(status.is_admin);
        assert!(!status.is_root);

        let status: AdminStatus = client
            .get(uri!(admin_status(Identity::new(ROOT))))
            .dispatch()
            .await
            .into_json()
            .await
            .unwrap();
        assert!(status.is_admin && status.is_root);

        let status: AdminStatus = client
            .get(uri!(admin_status(Identity::new("0xstranger"))))
            .dispatch()
            .await
            .into_json()
            .await
            .unwrap();
        assert!(!status.is_admin && !status.is_root);
    }

    #[backend_test(admin)]
    async fn audit_is_paginated(client: Client) {
        let ledger = ledger(&client);
        let admin = Identity::new(ADMIN);
        for name in ["A", "B", "C", "D"] {
            ledger
                .add_candidate(&admin, name.to_string(), String::new())
                .await
                .unwrap();
        }

        // One record for the admin grant plus one per candidate.
        let page: Paginated<AuditRecord> = client
            .get("/audit?page_num=2&page_size=2")
            .dispatch()
            .await
            .into_json()
            .await
            .unwrap();
        assert_eq!(page.pagination.total, 5);
        assert_eq!(page.items.iter().map(|r| r.seq).collect::<Vec<_>>(), [2, 3]);

        let all: Paginated<AuditRecord> = client.get(uri!(audit)).dispatch().await.into_json().await.unwrap();
        assert_eq!(all.items.len(), 5);
        assert_eq!(verify_chain(&all.items), Ok(()));

        let response = client.get("/audit?page_num=0").dispatch().await;
        assert_eq!(response.status(), Status::BadRequest);
        let response = client.get("/audit?page_size=100000").dispatch().await;
        assert_eq!(response.status(), Status::BadRequest);

        // Far past the end is an empty page; past what an offset can hold is refused.
        let page: Paginated<AuditRecord> = client
            .get("/audit?page_num=1000000&page_size=500")
            .dispatch()
            .await
            .into_json()
            .await
            .unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.pagination.total, 5);
        let response = client
            .get(format!("/audit?page_num={}&page_size=2", u64::MAX))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);
    }
}
