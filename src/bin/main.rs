//! Command-line walkthrough: sign in, read the market, run the free analysis,
//! hit the quota, upgrade, and fetch recommendations.

use market_edge::{
    app::{MarketEdge, NotificationLevel},
    config::Settings,
    models::plan_offers,
};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut settings = Settings::from_env()?;
    // Keep the walkthrough snappy unless latency was set explicitly
    if std::env::var("MARKET_EDGE_LATENCY_MS").is_err() {
        settings.latency = Duration::from_millis(100);
    }

    info!("Market Edge walkthrough starting");
    let app = MarketEdge::from_settings(&settings)?;
    app.bootstrap().await;

    let session = match app.session() {
        Some(session) => session,
        None => app.login("demo@marketedge.local", "demo-password").await?,
    };
    println!("\n=== SESSION ===");
    println!("User: {} <{}>", session.display_name, session.email);
    println!("Plan: {:?}", session.plan());
    println!(
        "Portfolio: ${:.2} ({:+.2}, {:+.2}%)",
        session.portfolio_summary.total_value,
        session.portfolio_summary.today_change,
        session.portfolio_summary.today_change_percent
    );

    let market = app.market_snapshot().await;
    println!("\n=== MARKET ===");
    for quote in market.indices.iter().chain(market.trending.iter()) {
        println!(
            "  {:<5} {:>9.2} {:+7.2} ({:+.2}%)",
            quote.symbol, quote.price, quote.change, quote.change_percent
        );
    }
    for article in &market.news {
        println!("  [{}] {}", article.source, article.title);
    }

    println!("\n=== ANALYSIS ===");
    match app.generate_analysis("SPY").await {
        Ok(record) => {
            println!("{} @ {}", record.symbol, record.timestamp);
            println!("{}", record.summary);
            for trend in &record.trends {
                println!("  {} ({}%): {}", trend.name, trend.confidence, trend.description);
            }
        }
        Err(e) => eprintln!("Analysis failed: {}", e),
    }

    if let Err(e) = app.generate_analysis("QQQ").await {
        println!("Second analysis on free plan: {}", e);
    }

    println!("\n=== PLANS ===");
    for offer in plan_offers() {
        println!("  {:?}: ${}/month", offer.plan, offer.monthly_price_usd);
    }

    if !app.is_premium() {
        app.purchase_premium().await?;
    }

    println!("\n=== RECOMMENDATIONS ===");
    match app.generate_recommendations().await {
        Ok(records) => {
            for rec in records.iter() {
                println!(
                    "  #{} {} [{:?}, {}%-{}%, {:?}] confidence {}%",
                    rec.id,
                    rec.title,
                    rec.risk,
                    rec.expected_return.low_pct,
                    rec.expected_return.high_pct,
                    rec.time_horizon,
                    rec.confidence
                );
            }
        }
        Err(e) => eprintln!("Recommendations failed: {}", e),
    }

    app.logout().await?;

    println!("\n=== NOTIFICATIONS ===");
    for note in app.drain_notifications().await {
        let marker = match note.level {
            NotificationLevel::Success => "✅",
            NotificationLevel::Info => "ℹ️ ",
            NotificationLevel::Error => "❌",
        };
        println!("  {} {}", marker, note.message);
    }

    Ok(())
}
