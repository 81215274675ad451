mod common;

use common::{app_with, GatedInference, MODEL_TEXT};
use market_edge::app::NotificationLevel;
use market_edge::MarketEdgeError;
use std::sync::Arc;

async fn signed_in_gated(gate: Arc<GatedInference>) -> Arc<market_edge::MarketEdge> {
    let app = app_with(gate);
    app.bootstrap().await;
    app.login("alice@example.com", "secret").await.unwrap();
    Arc::new(app)
}

#[tokio::test]
async fn test_overlapping_analysis_is_rejected() {
    let gate = GatedInference::new(MODEL_TEXT);
    let app = signed_in_gated(gate.clone()).await;

    let running = tokio::spawn({
        let app = Arc::clone(&app);
        async move { app.generate_analysis("SPY").await }
    });
    gate.started.notified().await;

    assert!(app.analysis_in_progress());
    assert!(matches!(
        app.generate_analysis("QQQ").await,
        Err(MarketEdgeError::Busy(_))
    ));

    gate.release(1);
    let record = running.await.unwrap().unwrap();
    assert_eq!(record.symbol, "SPY");
    assert!(!app.analysis_in_progress());
}

#[tokio::test]
async fn test_cancelled_analysis_is_discarded_quietly() {
    let gate = GatedInference::new(MODEL_TEXT);
    let app = signed_in_gated(gate.clone()).await;
    app.drain_notifications().await;

    let running = tokio::spawn({
        let app = Arc::clone(&app);
        async move { app.generate_analysis("SPY").await }
    });
    gate.started.notified().await;

    app.cancel_analysis();
    gate.release(1);

    assert!(matches!(
        running.await.unwrap(),
        Err(MarketEdgeError::Cancelled(_))
    ));
    assert!(app.current_analysis().await.is_none());
    assert!(app
        .drain_notifications()
        .await
        .iter()
        .all(|n| n.level != NotificationLevel::Error));

    // The discarded run did not use up the free analysis
    assert!(app.analysis_quota_available().await);
}

#[tokio::test]
async fn test_logout_discards_in_flight_analysis() {
    let gate = GatedInference::new(MODEL_TEXT);
    let app = signed_in_gated(gate.clone()).await;

    let running = tokio::spawn({
        let app = Arc::clone(&app);
        async move { app.generate_analysis("SPY").await }
    });
    gate.started.notified().await;

    app.logout().await.unwrap();
    gate.release(1);

    assert!(running.await.unwrap().is_err());
    assert!(app.current_analysis().await.is_none());
}

#[tokio::test]
async fn test_overlapping_recommendations_are_rejected() {
    let gate = GatedInference::new(MODEL_TEXT);
    let app = signed_in_gated(gate.clone()).await;
    app.purchase_premium().await.unwrap();

    let running = tokio::spawn({
        let app = Arc::clone(&app);
        async move { app.generate_recommendations().await }
    });
    gate.started.notified().await;

    assert!(app.recommendations_in_progress());
    assert!(matches!(
        app.generate_recommendations().await,
        Err(MarketEdgeError::Busy(_))
    ));

    // Analysis runs on its own slot
    let analysis = tokio::spawn({
        let app = Arc::clone(&app);
        async move { app.generate_analysis("SPY").await }
    });
    gate.started.notified().await;
    gate.release(2);

    assert_eq!(running.await.unwrap().unwrap().len(), 3);
    assert!(analysis.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_session_changes_are_observable() {
    let app = app_with(GatedInference::new(MODEL_TEXT));
    let mut rx = app.subscribe_session();
    assert!(matches!(*rx.borrow_and_update(), market_edge::AuthState::Unknown));

    app.bootstrap().await;
    rx.changed().await.unwrap();
    assert!(matches!(*rx.borrow_and_update(), market_edge::AuthState::Anonymous));

    app.login("alice@example.com", "secret").await.unwrap();
    rx.changed().await.unwrap();
    assert_eq!(
        rx.borrow_and_update().session().map(|s| s.display_name.clone()),
        Some("alice".to_string())
    );
}

#[tokio::test]
async fn test_analysis_admitted_while_logout_waits_is_cleared() {
    let store = common::GatedStore::new(market_edge::session::PREMIUM_KEY);
    let app = Arc::new(common::app_with_options(
        common::ScriptedInference::replying(MODEL_TEXT),
        store.clone(),
        market_edge::app::AppOptions::default(),
    ));
    app.bootstrap().await;
    app.login("alice@example.com", "secret").await.unwrap();

    // Upgrade holds the session write lock while its storage write is parked
    let upgrade = tokio::spawn({
        let app = Arc::clone(&app);
        async move { app.upgrade_to_premium().await }
    });
    store.started.notified().await;

    let logout = tokio::spawn({
        let app = Arc::clone(&app);
        async move { app.logout().await }
    });
    tokio::task::yield_now().await;

    // Still signed in, so this one is admitted and published
    let record = app.generate_analysis("SPY").await.unwrap();
    assert_eq!(record.symbol, "SPY");

    store.release(1);
    upgrade.await.unwrap().unwrap();
    logout.await.unwrap().unwrap();

    assert!(matches!(app.auth_state(), market_edge::AuthState::Anonymous));
    assert!(app.current_analysis().await.is_none());
}
