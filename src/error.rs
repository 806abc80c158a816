use thiserror::Error;

use crate::bank::question::TaskId;
use crate::session::Phase;

/// Errors returned by quiz session transitions.
///
/// None of these are fatal: a failed transition leaves the session exactly as
/// it was, and the caller only needs to show a notice.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuizError {
    #[error("question bank is still loading")]
    BankNotLoaded,

    #[error("question bank failed to load: {0}")]
    BankUnavailable(String),

    #[error("task '{0}' not found")]
    UnknownTask(TaskId),

    #[error("task '{0}' has no questions")]
    EmptyTask(TaskId),

    #[error("choice {choice} is out of range for a question with {options} options")]
    InvalidChoice { choice: usize, options: usize },

    #[error("question {0} is already answered")]
    AlreadyAnswered(usize),

    #[error("cannot {operation} while {phase}")]
    InvalidTransition {
        operation: &'static str,
        phase: Phase,
    },

    #[error("back navigation is disabled")]
    BackNavigationDisabled,
}

/// Errors raised while loading or validating the question bank.
#[derive(Debug, Error)]
pub enum BankError {
    #[error("failed to read question bank: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to fetch question bank: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to parse question bank: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("task '{task}', question '{question}': {reason}")]
    InvalidQuestion {
        task: TaskId,
        question: String,
        reason: String,
    },
}

/// Errors raised by the feedback relay.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Missing fields")]
    MissingFields,

    #[error("invalid request body: {0}")]
    InvalidBody(String),

    #[error("mail delivery failed: {0}")]
    Mail(String),

    #[error("mail gateway unreachable: {0}")]
    Network(#[from] reqwest::Error),

    /// The relay answered, but did not accept the feedback.
    #[error("feedback rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },
}

impl RelayError {
    pub fn status_code(&self) -> u16 {
        match self {
            RelayError::MissingFields | RelayError::InvalidBody(_) => 400,
            RelayError::Mail(_) | RelayError::Network(_) => 500,
            RelayError::Rejected { status, .. } => *status,
        }
    }

    /// Message placed in the `{success:false, message}` body.
    pub fn public_message(&self) -> String {
        match self {
            RelayError::MissingFields => "Missing fields".to_string(),
            RelayError::InvalidBody(reason) => reason.clone(),
            RelayError::Mail(_) | RelayError::Network(_) => "Error sending feedback".to_string(),
            RelayError::Rejected { message, .. } => message.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} has an invalid value '{value}'")]
    Invalid { key: &'static str, value: String },
}
