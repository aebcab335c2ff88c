use libris_http::error::AppError;
use thiserror::Error;

/// Why a circulation action was refused.
#[derive(Debug, Error)]
pub enum CirculationError {
    #[error("This book is already issued to this reader.")]
    AlreadyIssued,

    #[error("This book is out of stock.")]
    OutOfStock,

    #[error("Reader has reached the limit of {max} issued or requested books.")]
    LimitReached { max: i64 },

    #[error("Due date must be after the issue date and at most {max_days} days later.")]
    InvalidDueDate { max_days: i64 },

    #[error("You already have a pending request for this book.")]
    AlreadyRequested,

    #[error("reader {0} not found")]
    ReaderNotFound(i64),

    #[error("book {0} not found")]
    BookNotFound(i64),

    #[error("issue {0} not found")]
    IssueNotFound(i64),

    #[error("pending request {0} not found")]
    RequestNotFound(i64),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl CirculationError {
    /// Business-rule refusals, as opposed to missing records or storage failures.
    pub fn is_rule_violation(&self) -> bool {
        matches!(
            self,
            Self::AlreadyIssued
                | Self::OutOfStock
                | Self::LimitReached { .. }
                | Self::InvalidDueDate { .. }
                | Self::AlreadyRequested
        )
    }
}

impl From<CirculationError> for AppError {
    fn from(err: CirculationError) -> Self {
        let message = err.to_string();
        match err {
            CirculationError::AlreadyIssued
            | CirculationError::OutOfStock
            | CirculationError::AlreadyRequested => AppError::conflict(vec![], message),
            CirculationError::LimitReached { .. } => AppError::field("reader_id", message),
            CirculationError::InvalidDueDate { .. } => AppError::field("due_date", message),
            CirculationError::ReaderNotFound(_)
            | CirculationError::BookNotFound(_)
            | CirculationError::IssueNotFound(_)
            | CirculationError::RequestNotFound(_) => AppError::not_found(message),
            CirculationError::Database(err) => AppError::from(err),
        }
    }
}
