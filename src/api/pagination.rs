use rocket::{
    http::Status,
    request::{self, FromRequest, Request},
};
use serde::{Deserialize, Serialize};

/// Largest page a client may ask for.
pub const MAX_PAGE_SIZE: u64 = 500;

/// `page_num` (from 1, default 1) and `page_size` (default 50) query parameters.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PaginationRequest {
    page_num: u64,
    page_size: u64,
}

impl PaginationRequest {
    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    /// Items before this page. The guard keeps this within `i64::MAX`.
    pub fn skip(&self) -> u64 {
        (self.page_num - 1).saturating_mul(self.page_size)
    }

    pub fn to_paginated<T>(self, total: u64, items: Vec<T>) -> Paginated<T> {
        Paginated {
            items,
            pagination: PaginationResult {
                page_num: self.page_num,
                page_size: self.page_size,
                total,
            },
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for PaginationRequest {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let page_num = match req.query_value::<u64>("page_num").unwrap_or(Ok(1)) {
            Ok(page_num) if page_num >= 1 => page_num,
            _ => return request::Outcome::Failure((Status::BadRequest, ())),
        };
        let page_size = match req.query_value::<u64>("page_size").unwrap_or(Ok(50)) {
            Ok(page_size) if (1..=MAX_PAGE_SIZE).contains(&page_size) => page_size,
            _ => return request::Outcome::Failure((Status::BadRequest, ())),
        };
        // Offsets past what the database can express are refused.
        match (page_num - 1).checked_mul(page_size) {
            Some(skip) if i64::try_from(skip).is_ok() => {}
            _ => return request::Outcome::Failure((Status::BadRequest, ())),
        }
        request::Outcome::Success(Self {
            page_num,
            page_size,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationResult {
    pub page_num: u64,
    pub page_size: u64,
    pub total: u64,
}

/// One page of a longer list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub pagination: PaginationResult,
}
