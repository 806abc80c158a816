use crate::session::Session;

/// Dialogue state of one chat.
#[derive(Debug, Clone, Default)]
pub enum QuizState {
    #[default]
    Start,
    Selection,
    Running {
        session: Session,
    },
    // Waiting for the free-text description of a problem report.
    ReportIssue {
        session: Session,
    },
}
