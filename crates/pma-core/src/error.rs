use thiserror::Error;

#[derive(Debug, Error)]
pub enum PmaError {
    #[error("not initialized: run 'pma init'")]
    NotInitialized,

    #[error("document not found: {0}")]
    DocumentNotFound(String),

    #[error("document '{id}' is locked until '{blocked_by}' is approved")]
    DocumentLocked { id: String, blocked_by: String },

    #[error("invalid transition for '{id}' from {from} to {to}: {reason}")]
    InvalidTransition {
        id: String,
        from: String,
        to: String,
        reason: String,
    },

    #[error("stale response for '{id}': started at version {expected}, document is at {actual}")]
    StaleResponse {
        id: String,
        expected: u32,
        actual: u32,
    },

    #[error("document '{0}' has no content")]
    MissingContent(String),

    #[error("no 'Detailed Plans' document with content found: {0}")]
    DetailedPlansMissing(String),

    #[error("tracking already exists: {tasks} tasks, {milestones} milestones")]
    TrackingExists { tasks: usize, milestones: usize },

    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("milestone not found: {0}")]
    MilestoneNotFound(String),

    #[error("change request not found: {0}")]
    ChangeRequestNotFound(String),

    #[error("invalid slug '{0}': must be lowercase alphanumeric with hyphens")]
    InvalidSlug(String),

    #[error("impact '{0}' moves the schedule or budget out of range")]
    ImpactOutOfRange(String),

    #[error("invalid status: {0}")]
    InvalidStatus(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, PmaError>;
