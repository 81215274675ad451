//! Analysis orchestrator
//!
//! GATE → FETCH MARKET → PROMPT → INFER → BUILD RECORD → PUBLISH
//!
//! Free sessions get one analysis per session lifetime; premium sessions are
//! unlimited. A failed request leaves the previous record in place.

use crate::config::ResponseMode;
use crate::error::MarketEdgeError;
use crate::inference::structured::{self, AnalysisInsights};
use crate::inference::InferenceClient;
use crate::market::MarketDataSource;
use crate::models::{AnalysisRecord, MarketOverview, ModelParams, RiskLevel, RiskNote, Trend};
use crate::session::SessionStore;
use crate::slot::ResultSlot;
use crate::Result;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

const ANALYSIS_TEMPERATURE: f32 = 0.3;
const ANALYSIS_MAX_TOKENS: u32 = 1000;

pub struct AnalysisOrchestrator {
    sessions: Arc<SessionStore>,
    market: Arc<dyn MarketDataSource>,
    inference: Arc<dyn InferenceClient>,
    model: String,
    mode: ResponseMode,
    slot: ResultSlot<AnalysisRecord>,
}

impl AnalysisOrchestrator {
    pub fn new(
        sessions: Arc<SessionStore>,
        market: Arc<dyn MarketDataSource>,
        inference: Arc<dyn InferenceClient>,
        model: String,
        mode: ResponseMode,
    ) -> Self {
        Self {
            sessions,
            market,
            inference,
            model,
            mode,
            slot: ResultSlot::new("Analysis"),
        }
    }

    pub async fn current(&self) -> Option<Arc<AnalysisRecord>> {
        self.slot.current().await
    }

    pub fn is_generating(&self) -> bool {
        self.slot.is_busy()
    }

    /// Whether the active session may run another analysis right now
    pub async fn quota_available(&self) -> bool {
        match self.sessions.current() {
            Some(session) => session.premium || self.slot.current().await.is_none(),
            None => false,
        }
    }

    pub async fn generate_analysis(&self, symbol: &str) -> Result<Arc<AnalysisRecord>> {
        let symbol = symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(MarketEdgeError::InvalidInput(
                "symbol must not be empty".to_string(),
            ));
        }

        let ticket = self.slot.begin()?;

        // === GATE ===
        let session = self.sessions.state().require_session()?;
        if !session.premium && self.slot.current().await.is_some() {
            info!(user_id = ?session.id, %symbol, "Free analysis quota exhausted");
            return Err(MarketEdgeError::Entitlement(
                "quota exhausted: free plan includes one analysis per session".to_string(),
            ));
        }

        // === FETCH ===
        let overview = self.market.get_market_overview().await?;

        // === INFER ===
        let prompt = build_prompt(&symbol, &overview, self.mode)?;
        let params = ModelParams {
            model: self.model.clone(),
            temperature: ANALYSIS_TEMPERATURE,
            max_tokens: ANALYSIS_MAX_TOKENS,
        };

        debug!(%symbol, premium = session.premium, "Requesting market analysis");
        let text = self
            .inference
            .complete(&prompt, &params)
            .await
            .map_err(|e| {
                warn!(%symbol, "Analysis inference failed: {}", e);
                MarketEdgeError::Analysis(e)
            })?;

        // === PUBLISH ===
        let record = build_record(symbol, text, self.mode);
        let record = self.slot.commit(ticket, record).await?;

        info!(
            user_id = ?session.id,
            symbol = %record.symbol,
            trends = record.trends.len(),
            "Analysis published"
        );
        Ok(record)
    }

    /// Drop the current record and any in-flight result (new session lifetime)
    pub async fn reset(&self) {
        self.slot.reset().await;
    }

    /// Discard the in-flight result, if any, keeping the current record
    pub fn cancel(&self) {
        self.slot.cancel();
    }
}

fn build_prompt(symbol: &str, overview: &MarketOverview, mode: ResponseMode) -> Result<String> {
    let market_json = serde_json::to_string(&MarketContext::from(overview))?;

    let instructions = match mode {
        ResponseMode::Fixture => "Format the response as a concise narrative summary.",
        ResponseMode::Structured => {
            "Respond ONLY with a JSON object of the form \
             {\"summary\": string, \"trends\": [{\"name\": string, \"confidence\": 0-100, \"description\": string}], \
             \"risks\": [{\"level\": \"low|medium|medium-high|high\", \"description\": string}], \
             \"opportunities\": [string]}. No markdown, no prose outside the JSON."
        }
    };

    Ok(format!(
        "As a financial analyst, provide a comprehensive market analysis based on the following data:\n\n\
         Symbol: {symbol}\n\
         Market Data: {market_json}\n\n\
         Provide analysis on:\n\
         1. Current market trends\n\
         2. Risk assessment\n\
         3. Opportunities\n\
         4. Key patterns identified\n\
         5. Short-term outlook\n\n\
         {instructions}"
    ))
}

/// The part of the overview worth sending upstream
#[derive(serde::Serialize)]
struct MarketContext<'a> {
    indices: &'a [crate::models::Quote],
    trending: &'a [crate::models::Quote],
    headlines: Vec<&'a str>,
}

impl<'a> From<&'a MarketOverview> for MarketContext<'a> {
    fn from(overview: &'a MarketOverview) -> Self {
        Self {
            indices: &overview.indices,
            trending: &overview.trending,
            headlines: overview.news.iter().map(|a| a.title.as_str()).collect(),
        }
    }
}

fn build_record(symbol: String, text: String, mode: ResponseMode) -> AnalysisRecord {
    let insights = match mode {
        ResponseMode::Fixture => None,
        ResponseMode::Structured => {
            let parsed = structured::parse_analysis(&text);
            if parsed.is_none() {
                warn!(%symbol, "Model output was not usable JSON, using fixture insights");
            }
            parsed
        }
    };

    let AnalysisInsights {
        summary,
        trends,
        risks,
        opportunities,
    } = insights.unwrap_or_else(fixture_insights);

    AnalysisRecord {
        symbol,
        timestamp: Utc::now(),
        summary: summary.unwrap_or(text),
        trends,
        risks,
        opportunities,
    }
}

/// Deterministic insights attached to every analysis in fixture mode
pub fn fixture_insights() -> AnalysisInsights {
    let trend = |name: &str, confidence: u8, description: &str| Trend {
        name: name.to_string(),
        confidence,
        description: description.to_string(),
    };

    AnalysisInsights {
        summary: None,
        trends: vec![
            trend("Bullish Momentum", 85, "Strong upward trend detected"),
            trend("Volume Analysis", 72, "Above average trading volume"),
            trend("Support Level", 90, "Strong support at current levels"),
        ],
        risks: vec![
            RiskNote {
                level: RiskLevel::Medium,
                description: "Market volatility concerns".to_string(),
            },
            RiskNote {
                level: RiskLevel::Low,
                description: "Sector rotation risk".to_string(),
            },
        ],
        opportunities: vec![
            "Technology sector outperformance".to_string(),
            "Emerging market recovery".to_string(),
            "Value stock rotation potential".to_string(),
        ],
    }
}
