use rocket::{
    fairing::{Fairing, Info, Kind},
    http::StatusClass,
    Data, Orbit, Request, Response, Rocket,
};
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::api::CALLER_HEADER;
use crate::ledger::Ledger;

/// A unique identifier for a particular request.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
pub struct RequestId(pub usize);

impl Display for RequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl RequestId {
    /// Atomically get the next ID, wrapping around at `usize::MAX`.
    pub fn next() -> RequestId {
        static REQUEST_ID_COUNTER: AtomicUsize = AtomicUsize::new(0);
        RequestId(REQUEST_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// The code of the error a request was refused with.
///
/// The error responder records it so that the response log line can say why
/// a command was refused, not only with which status.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct Refusal(Option<&'static str>);

impl Refusal {
    /// Note that `req` was refused with `code`. Only the first refusal sticks.
    pub fn record(req: &Request<'_>, code: &'static str) {
        req.local_cache(|| Refusal(Some(code)));
    }

    /// The code `req` was refused with, if it was.
    pub fn of(req: &Request<'_>) -> Option<&'static str> {
        req.local_cache(Refusal::default).0
    }
}

/// Logs every request with its caller, every response with its refusal code,
/// and the state of the election at launch and shutdown.
#[derive(Debug, Copy, Clone)]
pub struct LoggerFairing;

#[rocket::async_trait]
impl Fairing for LoggerFairing {
    fn info(&self) -> Info {
        Info {
            name: "Logger",
            kind: Kind::Liftoff | Kind::Request | Kind::Response | Kind::Shutdown,
        }
    }

    async fn on_liftoff(&self, rocket: &Rocket<Orbit>) {
        let protocol = if rocket.config().tls_enabled() {
            "https"
        } else {
            "http"
        };
        let ip = &rocket.config().address;
        let port = &rocket.config().port;
        info!("Server launched on {protocol}://{ip}:{port}");
        if let Some(ledger) = rocket.state::<Ledger>() {
            let status = ledger.status();
            info!(
                "Election is {}{}, with {} candidates and {} registered voters",
                status.phase,
                if status.paused { " (paused)" } else { "" },
                status.candidate_count,
                status.voter_count
            );
        }
    }

    async fn on_request(&self, req: &mut Request<'_>, _data: &mut Data<'_>) {
        let id = req.local_cache(RequestId::next);
        let caller = req.headers().get_one(CALLER_HEADER).unwrap_or("anonymous");
        info!("->req{id} {} {} as {caller}", req.method(), req.uri());
    }

    async fn on_response<'r>(&self, req: &'r Request<'_>, res: &mut Response<'r>) {
        let id = req.local_cache(RequestId::next);
        let code = res.status();
        let route = match req.route() {
            Some(r) => match r.name {
                Some(ref name) => format!("{name} ({})", r.uri),
                None => r.uri.to_string(),
            },
            None => "UNKNOWN ROUTE".to_string(),
        };
        let log_msg = match Refusal::of(req) {
            Some(refusal) => format!("<-rsp{id} {code} {route} refused: {refusal}"),
            None => format!("<-rsp{id} {code} {route}"),
        };
        match code.class() {
            StatusClass::ServerError => error!("{log_msg}"),
            StatusClass::ClientError => warn!("{log_msg}"),
            _ => info!("{log_msg}"),
        }
    }

    async fn on_shutdown(&self, rocket: &Rocket<Orbit>) {
        warn!("Shutdown requested, stopping gracefully...");
        if let Some(ledger) = rocket.state::<Ledger>() {
            let status = ledger.status();
            info!(
                "Leaving election {} with {} of {} verified voters having voted",
                status.phase, status.votes_cast, status.verified_voter_count
            );
        }
    }
}
