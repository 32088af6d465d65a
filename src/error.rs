use mongodb::error::Error as DbError;
use rocket::{
    http::Status,
    response::{self, Responder},
    serde::json::Json,
    Request,
};
use serde::Serialize;
use thiserror::Error;

use crate::logging::{Refusal, RequestId};
use crate::model::{ElectionError, ErrorClass, Identity};
use crate::source::SourceError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Election(#[from] ElectionError),
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("Stored election belongs to root authority {stored}, not the configured {configured}")]
    RootMismatch { stored: Identity, configured: Identity },
}

impl Error {
    /// HTTP status this error is reported with.
    pub fn status(&self) -> Status {
        use ElectionError::*;
        match self {
            Self::Election(err) => match err.class() {
                ErrorClass::Authorization => Status::Forbidden,
                ErrorClass::Phase | ErrorClass::Limits => Status::Conflict,
                ErrorClass::Validation => match err {
                    ValidationError(_) | InvalidCandidate => Status::BadRequest,
                    _ => Status::Conflict,
                },
                ErrorClass::Identity => match err {
                    NotRegistered => Status::NotFound,
                    NotVerified | IdentityMismatch => Status::Forbidden,
                    _ => Status::Conflict,
                },
                ErrorClass::Lookup => Status::NotFound,
            },
            Self::Db(_) | Self::RootMismatch { .. } => Status::InternalServerError,
            Self::Source(SourceError::Unconfigured) => Status::ServiceUnavailable,
            Self::Source(SourceError::UnknownList(_)) => Status::NotFound,
            Self::Source(SourceError::Http(_)) => Status::BadGateway,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Election(err) => err.code(),
            Self::Db(_) => "StorageError",
            Self::Source(SourceError::UnknownList(_)) => "UnknownList",
            Self::Source(_) => "IdentitySourceError",
            Self::RootMismatch { .. } => "RootMismatch",
        }
    }
}

/// JSON body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let status = self.status();
        Refusal::record(req, self.code());
        if status.code >= 500 {
            let id = req.local_cache(RequestId::next);
            error!("req{id} failed: {self}");
        }
        // Storage internals are not the client's business.
        let message = match self {
            Self::Db(_) => "Storage failure".to_string(),
            ref other => other.to_string(),
        };
        let body = ErrorBody {
            error: self.code(),
            message,
        };
        (status, Json(body)).respond_to(req)
    }
}
