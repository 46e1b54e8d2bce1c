use thiserror::Error;

/// Main error type for the execution orchestrator
#[derive(Error, Debug)]
pub enum TillerError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Submission rejections (synchronous, returned from submit_order)
    #[error(transparent)]
    Submit(#[from] SubmitError),

    // Broker failures (asynchronous, handled by the retry loop)
    #[error(transparent)]
    Broker(#[from] BrokerError),

    // State machine errors
    #[error("Invalid state transition: from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for TillerError
pub type Result<T> = std::result::Result<T, TillerError>;

/// Synchronous rejection kinds returned directly from `submit_order`.
///
/// These never retry; the caller must resubmit explicitly if appropriate.
/// Tagged variants let callers branch without string matching.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SubmitError {
    #[error("Kill switch is active - order submission is blocked")]
    KillSwitchActive,

    #[error("Order queue is full: {pending} pending >= {max} max")]
    QueueFull { pending: usize, max: usize },

    #[error("Risk gate rejected order: {}", reasons.join("; "))]
    RiskRejected { reasons: Vec<String> },

    #[error("Duplicate order within {window_secs}s window")]
    Duplicate { window_secs: u64 },
}

/// Broker call failures seen during queue processing.
///
/// Transient variants are recovered locally via bounded exponential
/// backoff; permanent variants drop the task immediately.
#[derive(Error, Debug, Clone)]
pub enum BrokerError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Broker unavailable: {0}")]
    Unavailable(String),

    #[error("Order rejected by broker: {0}")]
    Rejected(String),

    #[error("Broker error: {0}")]
    Other(String),
}

impl BrokerError {
    /// Whether the failure is worth retrying with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BrokerError::Network(_) | BrokerError::RateLimited(_) | BrokerError::Unavailable(_)
        )
    }
}
