//! Static market and portfolio data

use crate::models::{
    Account, Article, Holding, MarketOverview, Performance, PortfolioDetails, Quote,
};
use chrono::{DateTime, Duration, Utc};

pub fn indices() -> Vec<Quote> {
    vec![
        Quote::new("SPY", "S&P 500", 425.30, 5.42, 1.29),
        Quote::new("QQQ", "NASDAQ", 350.15, -2.18, -0.62),
        Quote::new("IWM", "Russell 2000", 185.75, 3.25, 1.78),
        Quote::new("VTI", "Total Stock Market", 220.40, 4.12, 1.90),
    ]
}

pub fn trending() -> Vec<Quote> {
    vec![
        Quote::new("NVDA", "NVIDIA Corp", 850.25, 45.30, 5.62),
        Quote::new("TSLA", "Tesla Inc", 245.80, -12.45, -4.82),
        Quote::new("AAPL", "Apple Inc", 185.50, 2.35, 1.28),
        Quote::new("MSFT", "Microsoft Corp", 415.20, 8.75, 2.15),
        Quote::new("AMZN", "Amazon", 155.30, -3.20, -2.02),
    ]
}

/// Articles dated relative to `epoch`, newest first
pub fn news(epoch: DateTime<Utc>) -> Vec<Article> {
    let article = |id: u32, hours_ago: i64, title: &str, content: &str, source: &str| Article {
        id,
        title: title.to_string(),
        content: content.to_string(),
        source: source.to_string(),
        timestamp: epoch - Duration::hours(hours_ago),
    };

    vec![
        article(
            1,
            2,
            "Fed Holds Interest Rates Steady, Signals Potential Future Cuts",
            "The Federal Reserve maintained current interest rates while hinting at possible reductions in the coming quarters...",
            "Financial Times",
        ),
        article(
            2,
            4,
            "AI Chip Demand Drives Semiconductor Rally",
            "Artificial intelligence demand continues to fuel growth in semiconductor stocks, with NVIDIA leading gains...",
            "Reuters",
        ),
        article(
            3,
            6,
            "Clean Energy Stocks Surge on Policy Optimism",
            "Renewable energy companies see significant gains following new government policy announcements...",
            "Bloomberg",
        ),
    ]
}

pub fn market_overview(epoch: DateTime<Utc>) -> MarketOverview {
    MarketOverview {
        indices: indices(),
        trending: trending(),
        news: news(epoch),
        is_loading: false,
        version: String::new(),
    }
}

pub fn portfolio() -> PortfolioDetails {
    let holding = |symbol: &str, shares: f64, value: f64| Holding {
        symbol: symbol.to_string(),
        shares,
        value,
    };

    PortfolioDetails {
        accounts: vec![
            Account {
                id: 1,
                name: "Brokerage Account".to_string(),
                kind: "Investment".to_string(),
                balance: 45_000.0,
                holdings: vec![
                    holding("AAPL", 50.0, 9_275.0),
                    holding("MSFT", 25.0, 10_380.0),
                    holding("NVDA", 15.0, 12_754.0),
                    holding("VOO", 30.0, 12_591.0),
                ],
            },
            Account {
                id: 2,
                name: "401(k) Account".to_string(),
                kind: "Retirement".to_string(),
                balance: 85_000.0,
                holdings: vec![holding("VTSAX", 750.0, 85_000.0)],
            },
        ],
        performance: Performance {
            total_value: 130_000.0,
            today_change: 2_450.50,
            today_change_percent: 1.92,
            month_change: 5_200.25,
            month_change_percent: 4.17,
            year_change: 15_600.75,
            year_change_percent: 13.64,
        },
    }
}
