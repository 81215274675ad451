//! Runtime configuration
//!
//! Read from the process environment (after `.env` is loaded by the binaries).

use crate::error::MarketEdgeError;
use crate::models::RiskTolerance;
use crate::Result;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "google/gemini-2.0-flash-001";
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_LATENCY_MS: u64 = 1000;
const DEFAULT_PORT: u16 = 8080;

/// How the orchestrators interpret model output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseMode {
    /// Model text becomes the summary / first reasoning; structured fields are fixtures
    #[default]
    Fixture,
    /// Ask for JSON and use it, falling back to fixtures when it does not parse
    Structured,
}

impl std::str::FromStr for ResponseMode {
    type Err = MarketEdgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "fixture" | "fixed" => Ok(ResponseMode::Fixture),
            "structured" | "json" => Ok(ResponseMode::Structured),
            other => Err(MarketEdgeError::Config(format!(
                "unknown response mode '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
    pub state_path: Option<PathBuf>,
    pub latency: Duration,
    pub response_mode: ResponseMode,
    pub risk_tolerance: RiskTolerance,
    pub port: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            state_path: None,
            latency: Duration::from_millis(DEFAULT_LATENCY_MS),
            response_mode: ResponseMode::Fixture,
            risk_tolerance: RiskTolerance::Moderate,
            port: DEFAULT_PORT,
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup; empty values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Settings::default();

        let timeout = match get("MARKET_EDGE_TIMEOUT_SECS") {
            Some(v) => Duration::from_secs(parse_number("MARKET_EDGE_TIMEOUT_SECS", &v)?),
            None => defaults.timeout,
        };

        let latency = match get("MARKET_EDGE_LATENCY_MS") {
            Some(v) => Duration::from_millis(parse_number("MARKET_EDGE_LATENCY_MS", &v)?),
            None => defaults.latency,
        };

        let response_mode = match get("MARKET_EDGE_RESPONSE_MODE") {
            Some(v) => v.parse()?,
            None => defaults.response_mode,
        };

        let risk_tolerance = match get("MARKET_EDGE_RISK_TOLERANCE") {
            Some(v) => v.parse().map_err(MarketEdgeError::Config)?,
            None => defaults.risk_tolerance,
        };

        let port = match get("PORT").or_else(|| get("API_PORT")) {
            Some(v) => v
                .trim()
                .parse::<u16>()
                .map_err(|e| MarketEdgeError::Config(format!("PORT '{}': {}", v, e)))?,
            None => defaults.port,
        };

        Ok(Self {
            api_key: get("MARKET_EDGE_API_KEY"),
            base_url: get("MARKET_EDGE_BASE_URL").unwrap_or(defaults.base_url),
            model: get("MARKET_EDGE_MODEL").unwrap_or(defaults.model),
            timeout,
            state_path: get("MARKET_EDGE_STATE_PATH").map(PathBuf::from),
            latency,
            response_mode,
            risk_tolerance,
            port,
        })
    }

    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| MarketEdgeError::Config("MARKET_EDGE_API_KEY is required".to_string()))
    }
}

fn parse_number(key: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|e| MarketEdgeError::Config(format!("{} '{}': {}", key, value, e)))
}
