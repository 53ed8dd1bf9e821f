use thiserror::Error;

/// Errors surfaced to callers of the reminder engine.
///
/// Races (firing or cancelling a reminder that is already gone) are not
/// errors; see [`super::engine::FireOutcome`].
#[derive(Debug, Error)]
pub enum ReminderError {
    #[error("reminder needs either an interval or a scheduled time")]
    MissingSchedule,

    #[error("interval must be a positive number of minutes, got {0}")]
    InvalidInterval(u32),

    #[error("snooze must be a positive number of minutes, got {0}")]
    InvalidSnooze(u32),

    #[error("reminder message is empty")]
    EmptyMessage,

    #[error("reminder {0} not found")]
    NotFound(String),

    #[error("reminder {0} is already recurring")]
    AlreadyRecurring(String),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl From<rusqlite::Error> for ReminderError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Storage(e.into())
    }
}
