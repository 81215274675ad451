//! Best-effort structured reading of model text
//!
//! Used when the response mode asks the model for JSON. Every function returns
//! `None` on anything unusable; callers fall back to fixture data.

use crate::models::{
    RecommendationRecord, ReturnRange, RiskLevel, RiskNote, TimeHorizon, Trend,
};
use serde::Deserialize;

/// Used when the model gives no readable expected return
pub const UNESTIMATED_RETURN: ReturnRange = ReturnRange {
    low_pct: 0.0,
    high_pct: 0.0,
};

/// Strip markdown fences, else take the first `{` to the last `}`
pub fn extract_json(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.starts_with("```") {
        let mut inner = trimmed;
        if let Some(after_first) = inner.splitn(2, '\n').nth(1) {
            inner = after_first;
        }
        if let Some(end) = inner.rfind("```") {
            inner = &inner[..end];
        }
        return Some(inner.trim().to_string());
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(trimmed[start..=end].trim().to_string())
}

/// Parsed analysis body; summary is optional because the raw text can serve
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisInsights {
    pub summary: Option<String>,
    pub trends: Vec<Trend>,
    pub risks: Vec<RiskNote>,
    pub opportunities: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawAnalysis {
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    trends: Vec<RawTrend>,
    #[serde(default)]
    risks: Vec<RawRisk>,
    #[serde(default)]
    opportunities: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawTrend {
    name: String,
    confidence: f64,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct RawRisk {
    level: String,
    description: String,
}

pub fn parse_analysis(text: &str) -> Option<AnalysisInsights> {
    let json = extract_json(text)?;
    let raw: RawAnalysis = serde_json::from_str(&json).ok()?;

    if raw.trends.is_empty() || raw.risks.is_empty() {
        return None;
    }

    let trends = raw
        .trends
        .into_iter()
        .map(|t| Trend {
            name: t.name,
            confidence: clamp_confidence(t.confidence),
            description: t.description,
        })
        .collect();

    let risks = raw
        .risks
        .into_iter()
        .map(|r| RiskNote {
            level: parse_risk_level(&r.level).unwrap_or(RiskLevel::Medium),
            description: r.description,
        })
        .collect();

    Some(AnalysisInsights {
        summary: raw.summary.filter(|s| !s.trim().is_empty()),
        trends,
        risks,
        opportunities: raw.opportunities,
    })
}

#[derive(Debug, Deserialize)]
struct RawRecommendations {
    recommendations: Vec<RawRecommendation>,
}

#[derive(Debug, Deserialize)]
struct RawRecommendation {
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    risk: Option<String>,
    #[serde(default)]
    expected_return: Option<String>,
    #[serde(default)]
    time_horizon: Option<String>,
    #[serde(default)]
    reasoning: String,
}

/// Parse exactly `count` recommendations; fewer is treated as unusable
pub fn parse_recommendations(text: &str, count: usize) -> Option<Vec<RecommendationRecord>> {
    let json = extract_json(text)?;
    let raw: RawRecommendations = serde_json::from_str(&json).ok()?;

    if raw.recommendations.len() < count {
        return None;
    }

    let records = raw
        .recommendations
        .into_iter()
        .take(count)
        .enumerate()
        .map(|(i, r)| RecommendationRecord {
            id: i as u32 + 1,
            title: r.title,
            description: r.description,
            confidence: clamp_confidence(r.confidence.unwrap_or(50.0)),
            risk: r
                .risk
                .as_deref()
                .and_then(parse_risk_level)
                .unwrap_or(RiskLevel::Medium),
            expected_return: r
                .expected_return
                .as_deref()
                .and_then(parse_return_range)
                .unwrap_or(UNESTIMATED_RETURN),
            time_horizon: r
                .time_horizon
                .as_deref()
                .and_then(parse_time_horizon)
                .unwrap_or(TimeHorizon::MediumTerm),
            reasoning: r.reasoning,
        })
        .collect();

    Some(records)
}

pub fn parse_risk_level(s: &str) -> Option<RiskLevel> {
    let normalized: String = s
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .collect();

    match normalized.as_str() {
        "low" => Some(RiskLevel::Low),
        "medium" | "moderate" => Some(RiskLevel::Medium),
        "mediumhigh" => Some(RiskLevel::MediumHigh),
        "high" => Some(RiskLevel::High),
        _ => None,
    }
}

pub fn parse_time_horizon(s: &str) -> Option<TimeHorizon> {
    let lower = s.to_lowercase();
    if lower.starts_with("short") {
        Some(TimeHorizon::ShortTerm)
    } else if lower.starts_with("medium") || lower.starts_with("mid") {
        Some(TimeHorizon::MediumTerm)
    } else if lower.starts_with("long") {
        Some(TimeHorizon::LongTerm)
    } else {
        None
    }
}

/// "8-12%", "8 - 12 %", "-5-3%" or a single "7%"
pub fn parse_return_range(s: &str) -> Option<ReturnRange> {
    let cleaned = s.replace('%', "");
    let cleaned = cleaned.trim();

    // The separator is the first '-' that follows a digit; a leading one is a sign
    let separator = cleaned
        .char_indices()
        .skip(1)
        .find(|&(i, c)| {
            c == '-'
                && cleaned[..i]
                    .trim_end()
                    .ends_with(|p: char| p.is_ascii_digit() || p == '.')
        })
        .map(|(i, _)| i);

    let (low, high) = match separator {
        Some(i) => (&cleaned[..i], &cleaned[i + 1..]),
        None => (cleaned, cleaned),
    };
    let low_pct = low.trim().parse::<f64>().ok()?;
    let high_pct = high.trim().parse::<f64>().ok()?;
    if low_pct > high_pct {
        return None;
    }
    Some(ReturnRange { low_pct, high_pct })
}

fn clamp_confidence(value: f64) -> u8 {
    // Some models answer on a 0..1 scale.
    let scaled = if value > 0.0 && value <= 1.0 { value * 100.0 } else { value };
    scaled.round().clamp(0.0, 100.0) as u8
}
