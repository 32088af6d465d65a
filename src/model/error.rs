use thiserror::Error;

/// Broad classes of election failure. None of them is fatal to the engine;
/// the caller must change its input or wait for a phase transition.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorClass {
    Authorization,
    Phase,
    Validation,
    Identity,
    Limits,
    Lookup,
}

/// Every way a command against the election can be refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ElectionError {
    #[error("Caller is not authorized for this command")]
    Unauthorized,
    #[error("Command not allowed once the election has started")]
    InvalidPhase,
    #[error("Election details or candidates are missing")]
    NotConfigured,
    #[error("Election is already active")]
    AlreadyActive,
    #[error("Election is not active")]
    NotActive,
    #[error("Election has not ended")]
    NotEnded,
    #[error("Voter registration is closed")]
    RegistrationClosed,
    #[error("Cannot reset while voting is in progress")]
    CannotResetActive,
    #[error("Election is paused")]
    Paused,
    #[error("Invalid input: {0}")]
    ValidationError(String),
    #[error("Candidate already exists")]
    DuplicateCandidate,
    #[error("Voter already registered")]
    DuplicateVoter,
    #[error("No candidate with that index")]
    InvalidCandidate,
    #[error("Voter is not registered")]
    NotRegistered,
    #[error("Voter is not verified")]
    NotVerified,
    #[error("Identity token does not match")]
    IdentityMismatch,
    #[error("Voter is already verified")]
    AlreadyVerified,
    #[error("Voter has already voted")]
    AlreadyVoted,
    #[error("Candidate has reached the vote limit")]
    VoteLimitReached,
    #[error("Not found: {0}")]
    NotFound(String),
}

impl ElectionError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn class(&self) -> ErrorClass {
        use ElectionError::*;
        match self {
            Unauthorized => ErrorClass::Authorization,
            InvalidPhase | NotConfigured | AlreadyActive | NotActive | NotEnded
            | RegistrationClosed | CannotResetActive | Paused => ErrorClass::Phase,
            ValidationError(_) | DuplicateCandidate | DuplicateVoter | InvalidCandidate => {
                ErrorClass::Validation
            }
            NotRegistered | NotVerified | IdentityMismatch | AlreadyVerified | AlreadyVoted => {
                ErrorClass::Identity
            }
            VoteLimitReached => ErrorClass::Limits,
            NotFound(_) => ErrorClass::Lookup,
        }
    }

    /// Stable machine-readable code, as reported to API clients.
    pub fn code(&self) -> &'static str {
        use ElectionError::*;
        match self {
            Unauthorized => "Unauthorized",
            InvalidPhase => "InvalidPhase",
            NotConfigured => "NotConfigured",
            AlreadyActive => "AlreadyActive",
            NotActive => "NotActive",
            NotEnded => "NotEnded",
            RegistrationClosed => "RegistrationClosed",
            CannotResetActive => "CannotResetActive",
            Paused => "Paused",
            ValidationError(_) => "ValidationError",
            DuplicateCandidate => "DuplicateCandidate",
            DuplicateVoter => "DuplicateVoter",
            InvalidCandidate => "InvalidCandidate",
            NotRegistered => "NotRegistered",
            NotVerified => "NotVerified",
            IdentityMismatch => "IdentityMismatch",
            AlreadyVerified => "AlreadyVerified",
            AlreadyVoted => "AlreadyVoted",
            VoteLimitReached => "VoteLimitReached",
            NotFound(_) => "NotFound",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classes() {
        assert_eq!(ElectionError::Unauthorized.class(), ErrorClass::Authorization);
        assert_eq!(ElectionError::Paused.class(), ErrorClass::Phase);
        assert_eq!(ElectionError::validation("x").class(), ErrorClass::Validation);
        assert_eq!(ElectionError::AlreadyVoted.class(), ErrorClass::Identity);
        assert_eq!(ElectionError::VoteLimitReached.class(), ErrorClass::Limits);
        assert_eq!(ElectionError::not_found("x").class(), ErrorClass::Lookup);
        assert_eq!(ElectionError::validation("empty").code(), "ValidationError");
    }
}
