//! Recommendation orchestrator
//!
//! Premium-only. Produces a fixed-size ordered list that replaces the
//! previous list as a whole; on failure the previous list stays visible.

use crate::config::ResponseMode;
use crate::error::MarketEdgeError;
use crate::inference::structured;
use crate::inference::InferenceClient;
use crate::models::{
    ModelParams, PortfolioSummary, RecommendationRecord, ReturnRange, RiskLevel, RiskTolerance,
    TimeHorizon,
};
use crate::session::SessionStore;
use crate::slot::ResultSlot;
use crate::Result;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Entries per generated list
pub const RECOMMENDATION_COUNT: usize = 3;
/// Characters of model text kept as the first entry's reasoning
pub const REASONING_EXCERPT_CHARS: usize = 200;

const RECOMMENDATION_TEMPERATURE: f32 = 0.4;
const RECOMMENDATION_MAX_TOKENS: u32 = 1200;

pub struct RecommendationOrchestrator {
    sessions: Arc<SessionStore>,
    inference: Arc<dyn InferenceClient>,
    model: String,
    mode: ResponseMode,
    default_tolerance: RiskTolerance,
    slot: ResultSlot<Vec<RecommendationRecord>>,
}

impl RecommendationOrchestrator {
    pub fn new(
        sessions: Arc<SessionStore>,
        inference: Arc<dyn InferenceClient>,
        model: String,
        mode: ResponseMode,
        default_tolerance: RiskTolerance,
    ) -> Self {
        Self {
            sessions,
            inference,
            model,
            mode,
            default_tolerance,
            slot: ResultSlot::new("Recommendations"),
        }
    }

    /// Current list; empty until the first successful generation
    pub async fn current(&self) -> Arc<Vec<RecommendationRecord>> {
        self.slot
            .current()
            .await
            .unwrap_or_else(|| Arc::new(Vec::new()))
    }

    pub fn is_generating(&self) -> bool {
        self.slot.is_busy()
    }

    pub async fn generate_recommendations(
        &self,
        portfolio: &PortfolioSummary,
    ) -> Result<Arc<Vec<RecommendationRecord>>> {
        self.generate_recommendations_with(portfolio, self.default_tolerance)
            .await
    }

    pub async fn generate_recommendations_with(
        &self,
        portfolio: &PortfolioSummary,
        tolerance: RiskTolerance,
    ) -> Result<Arc<Vec<RecommendationRecord>>> {
        let ticket = self.slot.begin()?;

        // Identity first, entitlement second
        let session = self.sessions.state().require_session()?;
        if !session.premium {
            info!(user_id = ?session.id, "Recommendations requested on free plan");
            return Err(MarketEdgeError::Entitlement(
                "personalized recommendations require a premium plan".to_string(),
            ));
        }

        let prompt = build_prompt(portfolio, tolerance, self.mode)?;
        let params = ModelParams {
            model: self.model.clone(),
            temperature: RECOMMENDATION_TEMPERATURE,
            max_tokens: RECOMMENDATION_MAX_TOKENS,
        };

        debug!(user_id = ?session.id, %tolerance, "Requesting recommendations");
        let text = self
            .inference
            .complete(&prompt, &params)
            .await
            .map_err(|e| {
                warn!(user_id = ?session.id, "Recommendation inference failed: {}", e);
                MarketEdgeError::Recommendation(e)
            })?;

        let records = build_records(&text, self.mode);
        let records = self.slot.commit(ticket, records).await?;

        info!(user_id = ?session.id, count = records.len(), "Recommendations published");
        Ok(records)
    }

    pub async fn reset(&self) {
        self.slot.reset().await;
    }

    pub fn cancel(&self) {
        self.slot.cancel();
    }
}

fn build_prompt(
    portfolio: &PortfolioSummary,
    tolerance: RiskTolerance,
    mode: ResponseMode,
) -> Result<String> {
    let portfolio_json = serde_json::to_string(portfolio)?;

    let instructions = match mode {
        ResponseMode::Fixture => "Focus on portfolio diversification and optimization.".to_string(),
        ResponseMode::Structured => format!(
            "Focus on portfolio diversification and optimization.\n\
             Respond ONLY with a JSON object {{\"recommendations\": [...]}} holding {RECOMMENDATION_COUNT} entries, \
             each with keys title, description, confidence (0-100), risk (low|medium|medium-high|high), \
             expected_return (e.g. \"8-12%\"), time_horizon (short-term|medium-term|long-term), reasoning."
        ),
    };

    Ok(format!(
        "As an investment advisor, analyze this portfolio and provide personalized recommendations:\n\n\
         Portfolio: {portfolio_json}\n\
         Risk Tolerance: {tolerance}\n\n\
         Provide {RECOMMENDATION_COUNT} specific investment recommendations with:\n\
         1. Investment suggestion\n\
         2. Rationale\n\
         3. Risk level\n\
         4. Expected return\n\
         5. Time horizon\n\n\
         {instructions}"
    ))
}

fn build_records(text: &str, mode: ResponseMode) -> Vec<RecommendationRecord> {
    if mode == ResponseMode::Structured {
        match structured::parse_recommendations(text, RECOMMENDATION_COUNT) {
            Some(records) => return records,
            None => warn!("Model output was not usable JSON, using fixture recommendations"),
        }
    }
    fixture_recommendations(text)
}

/// Fixed list; the first entry's reasoning is an excerpt of the model text
pub fn fixture_recommendations(model_text: &str) -> Vec<RecommendationRecord> {
    vec![
        RecommendationRecord {
            id: 1,
            title: "Diversify into ESG Funds".to_string(),
            description: "Consider adding ESG-focused ETFs to align with sustainable investing trends"
                .to_string(),
            confidence: 88,
            risk: RiskLevel::Low,
            expected_return: ReturnRange { low_pct: 8.0, high_pct: 12.0 },
            time_horizon: TimeHorizon::LongTerm,
            reasoning: excerpt(model_text, REASONING_EXCERPT_CHARS),
        },
        RecommendationRecord {
            id: 2,
            title: "Technology Sector Allocation".to_string(),
            description: "Increase exposure to cloud computing and AI technology stocks".to_string(),
            confidence: 76,
            risk: RiskLevel::Medium,
            expected_return: ReturnRange { low_pct: 12.0, high_pct: 18.0 },
            time_horizon: TimeHorizon::MediumTerm,
            reasoning: "AI and cloud technologies showing strong growth potential".to_string(),
        },
        RecommendationRecord {
            id: 3,
            title: "International Exposure".to_string(),
            description: "Add emerging markets ETF for geographical diversification".to_string(),
            confidence: 65,
            risk: RiskLevel::MediumHigh,
            expected_return: ReturnRange { low_pct: 10.0, high_pct: 15.0 },
            time_horizon: TimeHorizon::LongTerm,
            reasoning: "Portfolio lacks international diversification".to_string(),
        },
    ]
}

/// First `max_chars` characters followed by "..."
fn excerpt(text: &str, max_chars: usize) -> String {
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excerpt_respects_char_boundaries() {
        let text = "é".repeat(300);
        let cut = excerpt(&text, REASONING_EXCERPT_CHARS);
        assert_eq!(cut.chars().count(), REASONING_EXCERPT_CHARS + 3);
        assert!(cut.ends_with("..."));

        assert_eq!(excerpt("short", REASONING_EXCERPT_CHARS), "short...");
    }

    #[test]
    fn test_fixture_list_shape() {
        let records = fixture_recommendations("Rebalance toward bonds.");
        assert_eq!(records.len(), RECOMMENDATION_COUNT);
        assert_eq!(records[0].reasoning, "Rebalance toward bonds....");
        assert_eq!(records[2].risk, RiskLevel::MediumHigh);
        assert!(records.iter().map(|r| r.id).eq(1..=3));
    }

    #[test]
    fn test_prompt_mentions_tolerance_and_portfolio() {
        let prompt = build_prompt(
            &PortfolioSummary::seed(),
            RiskTolerance::Moderate,
            ResponseMode::Fixture,
        )
        .unwrap();

        assert!(prompt.contains("Risk Tolerance: moderate"));
        assert!(prompt.contains("\"total_value\":50000.0"));
    }

    #[test]
    fn test_structured_mode_falls_back_to_fixtures() {
        let records = build_records("no json at all", ResponseMode::Structured);
        assert_eq!(records[0].title, "Diversify into ESG Funds");
    }
}
