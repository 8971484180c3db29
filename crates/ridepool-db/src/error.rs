use thiserror::Error;

/// Store-level failure taxonomy. The API layer maps these onto HTTP
/// codes: `NotFound` becomes 404 on direct lookups, `Sqlite` and
/// `LockPoisoned` become 500, everything else is a 400 with the
/// message below as the envelope text.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Caller lacks the ownership relation the operation requires.
    /// Carries the full client-facing message.
    #[error("{0}")]
    NotOwner(&'static str),

    /// Caller was not a participant of the trip (rating eligibility).
    #[error("{0}")]
    NotParticipant(&'static str),

    /// Entity is not in a state compatible with the requested action.
    #[error("{message}: {current}")]
    InvalidState {
        message: &'static str,
        current: String,
    },

    #[error("Not enough available seats")]
    CapacityExceeded,

    #[error("You have already requested this trip")]
    DuplicateRequest,

    #[error("You have already rated this user for this trip")]
    DuplicateRating,

    #[error("database lock poisoned")]
    LockPoisoned,

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}
