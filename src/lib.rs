//! Market Edge
//!
//! State and orchestration layer for an AI-assisted market research app:
//! - Persists and restores the user session with its plan entitlement
//! - Serves market snapshots (indices, trending instruments, news) and portfolio data
//! - Generates market analysis with a free-plan quota of one per session
//! - Generates personalized recommendations for premium sessions
//! - Keeps the last good result visible when a refresh fails
//!
//! ANALYSIS PIPELINE:
//! GATE → FETCH MARKET → PROMPT → INFER → BUILD RECORD → PUBLISH

pub mod analysis;
pub mod api;
pub mod app;
pub mod config;
pub mod digest;
pub mod error;
pub mod inference;
pub mod market;
pub mod models;
pub mod payment;
pub mod recommendations;
pub mod session;
pub mod slot;
pub mod state;

pub use error::Result;

// Re-export common types
pub use app::MarketEdge;
pub use error::{InferenceError, MarketEdgeError};
pub use models::*;
pub use session::AuthState;
