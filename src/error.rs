//! Error types for the Market Edge state layer

use thiserror::Error;

/// Result type alias for state layer operations
pub type Result<T> = std::result::Result<T, MarketEdgeError>;

/// Failures of the external completion endpoint
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InferenceError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

#[derive(Error, Debug)]
pub enum MarketEdgeError {

    // =============================
    // Session & Entitlement
    // =============================

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Not entitled: {0}")]
    Entitlement(String),

    #[error("No active session")]
    NotAuthenticated,

    #[error("Session is still being restored")]
    SessionPending,

    // =============================
    // Orchestration
    // =============================

    #[error("Inference error: {0}")]
    Inference(#[from] InferenceError),

    #[error("Analysis failed: {0}")]
    Analysis(#[source] InferenceError),

    #[error("Recommendations failed: {0}")]
    Recommendation(#[source] InferenceError),

    #[error("{0} already in progress")]
    Busy(&'static str),

    #[error("{0} was cancelled")]
    Cancelled(&'static str),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // =============================
    // Collaborators
    // =============================

    #[error("Payment failed: {0}")]
    Payment(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl MarketEdgeError {
    /// Stable, lowercase label used by notifications and the HTTP surface
    pub fn kind(&self) -> &'static str {
        match self {
            MarketEdgeError::Auth(_) => "auth",
            MarketEdgeError::Entitlement(_) => "entitlement",
            MarketEdgeError::NotAuthenticated => "not_authenticated",
            MarketEdgeError::SessionPending => "session_pending",
            MarketEdgeError::Inference(_) => "inference",
            MarketEdgeError::Analysis(_) => "analysis",
            MarketEdgeError::Recommendation(_) => "recommendation",
            MarketEdgeError::Busy(_) => "busy",
            MarketEdgeError::Cancelled(_) => "cancelled",
            MarketEdgeError::InvalidInput(_) => "invalid_input",
            MarketEdgeError::Payment(_) => "payment",
            MarketEdgeError::Storage(_) => "storage",
            MarketEdgeError::Config(_) => "config",
            MarketEdgeError::SerializationError(_) => "serialization",
            MarketEdgeError::IoError(_) => "io",
        }
    }

    pub fn is_entitlement(&self) -> bool {
        matches!(self, MarketEdgeError::Entitlement(_))
    }
}
