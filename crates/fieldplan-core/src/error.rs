use thiserror::Error;

/// Top-level error type for fieldplan.
#[derive(Debug, Error)]
pub enum PlanError {
    /// Candidate could not be turned into a schedulable task (bad start date).
    #[error("invalid schedule input: {0}")]
    InvalidScheduleInput(String),

    /// The per-(field, month) scheduling lock could not be taken in time.
    #[error("concurrent schedule conflict on field {field_id}: {detail}")]
    ConcurrentScheduleConflict { field_id: i64, detail: String },

    /// A single (date, status) pair in a progress batch was rejected.
    #[error("invalid progress entry {date}: {reason}")]
    ProgressEntryInvalid { date: String, reason: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("generator error: {0}")]
    Generator(String),

    /// The candidate queue worker has stopped.
    #[error("queue error: {0}")]
    Queue(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl PlanError {
    /// Short machine-readable reason, surfaced to API callers.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidScheduleInput(_) => "invalid_input",
            Self::ConcurrentScheduleConflict { .. } => "schedule_conflict",
            Self::ProgressEntryInvalid { .. } => "invalid_progress_entry",
            Self::NotFound(_) => "not_found",
            Self::Store(_) => "store",
            Self::Config(_) => "config",
            Self::Generator(_) => "generator",
            Self::Queue(_) => "queue",
            Self::Io(_) => "io",
        }
    }
}
