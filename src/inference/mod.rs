//! Inference adapter
//!
//! The only path to the external completion endpoint. Orchestrators hold an
//! `Arc<dyn InferenceClient>`; presentation code never sees it.

use crate::error::InferenceError;
use crate::models::ModelParams;
use async_trait::async_trait;

pub mod openai;
pub mod structured;

pub use openai::OpenAiCompatibleClient;

/// One prompt in, one completion text out. Implementations must not retry.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    async fn complete(
        &self,
        prompt: &str,
        params: &ModelParams,
    ) -> std::result::Result<String, InferenceError>;
}

/// Offline client for demos without an API key
pub struct CannedInference {
    reply: String,
}

impl CannedInference {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
        }
    }
}

impl Default for CannedInference {
    fn default() -> Self {
        Self::new(
            "Markets are trading with a constructive tone. Breadth is improving, \
             large-cap technology continues to lead, and volatility remains contained. \
             Watch the upcoming rate decision and earnings guidance for confirmation \
             before adding exposure.",
        )
    }
}

#[async_trait]
impl InferenceClient for CannedInference {
    async fn complete(
        &self,
        _prompt: &str,
        _params: &ModelParams,
    ) -> std::result::Result<String, InferenceError> {
        Ok(self.reply.clone())
    }
}
