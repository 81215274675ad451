//! Core data models for the Market Edge state layer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

//
// ================= Enums =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RiskTolerance {
    Conservative,
    #[default]
    Moderate,
    Aggressive,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum RiskLevel {
    Low,
    Medium,
    MediumHigh,
    High,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum TimeHorizon {
    ShortTerm,
    MediumTerm,
    LongTerm,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Free,
    Premium,
}

//
// ================= Session =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PortfolioSummary {
    pub total_value: f64,
    pub today_change: f64,
    pub today_change_percent: f64,
}

impl PortfolioSummary {
    /// Seed portfolio attached to sessions created through login
    pub fn seed() -> Self {
        Self {
            total_value: 50_000.0,
            today_change: 1_250.50,
            today_change_percent: 2.56,
        }
    }

    pub fn zero() -> Self {
        Self {
            total_value: 0.0,
            today_change: 0.0,
            today_change_percent: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub id: Uuid,
    pub display_name: String,
    pub email: String,
    pub portfolio_summary: PortfolioSummary,
    #[serde(default)]
    pub premium: bool,
}

impl Session {
    pub fn plan(&self) -> Plan {
        if self.premium {
            Plan::Premium
        } else {
            Plan::Free
        }
    }
}

//
// ================= Market Data =================
//

/// Quote for an index or a single instrument
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Quote {
    pub symbol: String,
    pub name: String,
    pub price: f64,
    pub change: f64,
    pub change_percent: f64,
}

pub type IndexQuote = Quote;
pub type InstrumentQuote = Quote;

impl Quote {
    pub fn new(symbol: &str, name: &str, price: f64, change: f64, change_percent: f64) -> Self {
        Self {
            symbol: symbol.to_string(),
            name: name.to_string(),
            price,
            change,
            change_percent,
        }
    }

    /// sign(change) == sign(change_percent), zero counting as its own sign
    pub fn is_consistent(&self) -> bool {
        sign(self.change) == sign(self.change_percent)
    }
}

fn sign(value: f64) -> i8 {
    if value > 0.0 {
        1
    } else if value < 0.0 {
        -1
    } else {
        0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Article {
    pub id: u32,
    pub title: String,
    pub content: String,
    pub source: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarketOverview {
    pub indices: Vec<IndexQuote>,
    pub trending: Vec<InstrumentQuote>,
    pub news: Vec<Article>,
    pub is_loading: bool,
    /// Content digest; empty until the first successful load
    #[serde(default)]
    pub version: String,
}

impl MarketOverview {
    /// Placeholder published before the first load completes
    pub fn loading() -> Self {
        Self {
            indices: Vec::new(),
            trending: Vec::new(),
            news: Vec::new(),
            is_loading: true,
            version: String::new(),
        }
    }

    /// Case-insensitive match on title or content; an empty term matches everything
    pub fn search_news(&self, term: &str) -> Vec<&Article> {
        let needle = term.trim().to_lowercase();
        self.news
            .iter()
            .filter(|article| {
                needle.is_empty()
                    || article.title.to_lowercase().contains(&needle)
                    || article.content.to_lowercase().contains(&needle)
            })
            .collect()
    }

    pub fn find_quote(&self, symbol: &str) -> Option<&Quote> {
        self.indices
            .iter()
            .chain(self.trending.iter())
            .find(|q| q.symbol.eq_ignore_ascii_case(symbol))
    }
}

//
// ================= Portfolio =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Holding {
    pub symbol: String,
    pub shares: f64,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Account {
    pub id: u32,
    pub name: String,
    pub kind: String,
    pub balance: f64,
    pub holdings: Vec<Holding>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Performance {
    pub total_value: f64,
    pub today_change: f64,
    pub today_change_percent: f64,
    pub month_change: f64,
    pub month_change_percent: f64,
    pub year_change: f64,
    pub year_change_percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PortfolioDetails {
    pub accounts: Vec<Account>,
    pub performance: Performance,
}

impl PortfolioDetails {
    pub fn holdings(&self) -> impl Iterator<Item = &Holding> {
        self.accounts.iter().flat_map(|a| a.holdings.iter())
    }
}

//
// ================= Analysis =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Trend {
    pub name: String,
    /// 0..=100
    pub confidence: u8,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskNote {
    pub level: RiskLevel,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisRecord {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub summary: String,
    pub trends: Vec<Trend>,
    pub risks: Vec<RiskNote>,
    pub opportunities: Vec<String>,
}

//
// ================= Recommendations =================
//

/// Expected return band in percent
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ReturnRange {
    pub low_pct: f64,
    pub high_pct: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecommendationRecord {
    pub id: u32,
    pub title: String,
    pub description: String,
    /// 0..=100
    pub confidence: u8,
    pub risk: RiskLevel,
    pub expected_return: ReturnRange,
    pub time_horizon: TimeHorizon,
    pub reasoning: String,
}

//
// ================= Inference =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelParams {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

//
// ================= Pricing =================
//

#[derive(Debug, Clone, Serialize)]
pub struct PlanOffer {
    pub plan: Plan,
    pub monthly_price_usd: u32,
    pub features: Vec<&'static str>,
}

pub fn plan_offers() -> Vec<PlanOffer> {
    vec![
        PlanOffer {
            plan: Plan::Free,
            monthly_price_usd: 0,
            features: vec![
                "Basic market overview",
                "Limited news access",
                "Basic portfolio tracking",
                "One AI analysis per session",
            ],
        },
        PlanOffer {
            plan: Plan::Premium,
            monthly_price_usd: 10,
            features: vec![
                "Unlimited AI-powered market analysis",
                "Personalized investment recommendations",
                "Advanced portfolio analytics",
                "Risk assessment tools",
            ],
        },
    ]
}

impl fmt::Display for RiskTolerance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskTolerance::Conservative => "conservative",
            RiskTolerance::Moderate => "moderate",
            RiskTolerance::Aggressive => "aggressive",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for RiskTolerance {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "conservative" | "low" => Ok(RiskTolerance::Conservative),
            "moderate" | "medium" => Ok(RiskTolerance::Moderate),
            "aggressive" | "high" => Ok(RiskTolerance::Aggressive),
            other => Err(format!("unknown risk tolerance '{}'", other)),
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::MediumHigh => "Medium-High",
            RiskLevel::High => "High",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for TimeHorizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TimeHorizon::ShortTerm => "Short-term",
            TimeHorizon::MediumTerm => "Medium-term",
            TimeHorizon::LongTerm => "Long-term",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for ReturnRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}%", self.low_pct, self.high_pct)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_sign_invariant() {
        assert!(Quote::new("SPY", "S&P 500", 425.30, 5.42, 1.29).is_consistent());
        assert!(Quote::new("QQQ", "NASDAQ", 350.15, -2.18, -0.62).is_consistent());
        assert!(Quote::new("FLAT", "Flat", 10.0, 0.0, 0.0).is_consistent());
        assert!(!Quote::new("BAD", "Bad", 10.0, 1.0, -0.5).is_consistent());
        assert!(!Quote::new("BAD", "Bad", 10.0, 0.0, 0.5).is_consistent());
    }

    #[test]
    fn test_risk_level_wire_names() {
        let json = serde_json::to_string(&RiskLevel::MediumHigh).unwrap();
        assert_eq!(json, "\"medium-high\"");
        assert_eq!(RiskLevel::MediumHigh.to_string(), "Medium-High");
    }

    #[test]
    fn test_risk_tolerance_parsing() {
        assert_eq!("Moderate".parse::<RiskTolerance>(), Ok(RiskTolerance::Moderate));
        assert_eq!("high".parse::<RiskTolerance>(), Ok(RiskTolerance::Aggressive));
        assert!("reckless".parse::<RiskTolerance>().is_err());
        assert_eq!(RiskTolerance::default(), RiskTolerance::Moderate);
    }

    #[test]
    fn test_session_without_premium_field_deserializes() {
        let json = r#"{
            "id": "00000000-0000-4000-8000-000000000000",
            "display_name": "trader",
            "email": "trader@x.com",
            "portfolio_summary": {"total_value": 1.0, "today_change": 0.0, "today_change_percent": 0.0}
        }"#;
        let session: Session = serde_json::from_str(json).unwrap();
        assert!(!session.premium);
        assert_eq!(session.plan(), Plan::Free);
    }

    #[test]
    fn test_search_news_is_case_insensitive() {
        let overview = MarketOverview {
            indices: vec![],
            trending: vec![Quote::new("NVDA", "NVIDIA Corp", 850.25, 45.30, 5.62)],
            news: vec![Article {
                id: 1,
                title: "AI Chip Demand".to_string(),
                content: "Semiconductor rally".to_string(),
                source: "Reuters".to_string(),
                timestamp: Utc::now(),
            }],
            is_loading: false,
            version: String::new(),
        };

        assert_eq!(overview.search_news("semiconductor").len(), 1);
        assert_eq!(overview.search_news("  ").len(), 1);
        assert!(overview.search_news("crypto").is_empty());
        assert_eq!(overview.find_quote("nvda").map(|q| q.price), Some(850.25));
    }
}
