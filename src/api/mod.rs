use rocket::{
    http::Status,
    request::{self, FromRequest, Request},
    Route,
};

use crate::model::Identity;

mod admin;
mod pagination;
mod public;
mod voter;

pub use pagination::{Paginated, PaginationRequest, PaginationResult};

/// Header in which the upstream gateway asserts who is calling.
pub const CALLER_HEADER: &str = "X-Caller-Identity";

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(admin::routes());
    routes.extend(public::routes());
    routes.extend(voter::routes());
    routes
}

/// The identity a request is made on behalf of.
///
/// Says nothing about what that identity may do; the election decides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller(pub Identity);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Caller {
    type Error = &'static str;

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        match req.headers().get_one(CALLER_HEADER).map(str::trim) {
            Some(identity) if !identity.is_empty() => {
                request::Outcome::Success(Caller(Identity::new(identity)))
            }
            _ => request::Outcome::Failure((Status::Unauthorized, "missing caller identity")),
        }
    }
}
