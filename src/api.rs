//! REST API for Market Edge
//!
//! Exposes the application container over HTTP for a browser front end.
//! The process hosts a single user session, matching the client-held state
//! of a single-page app.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::app::MarketEdge;
use crate::error::MarketEdgeError;
use crate::models::{plan_offers, PortfolioSummary, RiskTolerance};
use crate::session::AuthState;

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct AnalysisRequest {
    pub symbol: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct RecommendationRequest {
    /// Defaults to the session's own portfolio summary
    pub portfolio: Option<PortfolioSummary>,
    pub risk_tolerance: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NewsQuery {
    pub q: Option<String>,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

type ApiResult = (StatusCode, Json<ApiResponse>);

fn ok<T: Serialize>(data: T) -> ApiResult {
    (StatusCode::OK, Json(ApiResponse::success(data)))
}

fn fail(err: MarketEdgeError) -> ApiResult {
    (status_for(&err), Json(ApiResponse::error(err.to_string())))
}

fn respond<T: Serialize>(result: crate::Result<T>) -> ApiResult {
    match result {
        Ok(data) => ok(data),
        Err(e) => fail(e),
    }
}

pub fn status_for(err: &MarketEdgeError) -> StatusCode {
    match err {
        MarketEdgeError::Auth(_) | MarketEdgeError::NotAuthenticated => StatusCode::UNAUTHORIZED,
        MarketEdgeError::Entitlement(_) => StatusCode::PAYMENT_REQUIRED,
        MarketEdgeError::Busy(_) | MarketEdgeError::Cancelled(_) => StatusCode::CONFLICT,
        MarketEdgeError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        MarketEdgeError::SessionPending => StatusCode::SERVICE_UNAVAILABLE,
        MarketEdgeError::Inference(_)
        | MarketEdgeError::Analysis(_)
        | MarketEdgeError::Recommendation(_)
        | MarketEdgeError::Payment(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub app: Arc<MarketEdge>,
}

/// =============================
/// Health & Session
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

fn session_view(state: &AuthState) -> serde_json::Value {
    match state {
        AuthState::Unknown => serde_json::json!({ "status": "restoring", "session": null }),
        AuthState::Anonymous => serde_json::json!({ "status": "anonymous", "session": null }),
        AuthState::Authenticated(session) => serde_json::json!({
            "status": "authenticated",
            "plan": session.plan(),
            "session": session,
        }),
    }
}

async fn get_session(State(state): State<ApiState>) -> ApiResult {
    ok(session_view(&state.app.auth_state()))
}

async fn login(State(state): State<ApiState>, Json(req): Json<LoginRequest>) -> ApiResult {
    respond(state.app.login(&req.email, &req.password).await)
}

async fn register(State(state): State<ApiState>, Json(req): Json<RegisterRequest>) -> ApiResult {
    respond(state.app.register(&req.name, &req.email, &req.password).await)
}

async fn logout(State(state): State<ApiState>) -> ApiResult {
    match state.app.logout().await {
        Ok(()) => ok(session_view(&state.app.auth_state())),
        Err(e) => fail(e),
    }
}

async fn upgrade(State(state): State<ApiState>) -> ApiResult {
    respond(state.app.purchase_premium().await)
}

async fn plans() -> ApiResult {
    ok(plan_offers())
}

/// =============================
/// Market Data
/// =============================

async fn get_market(State(state): State<ApiState>) -> ApiResult {
    ok(state.app.market_snapshot().await)
}

async fn refresh_market(State(state): State<ApiState>) -> ApiResult {
    respond(state.app.refresh_market().await)
}

async fn search_news(State(state): State<ApiState>, Query(query): Query<NewsQuery>) -> ApiResult {
    let term = query.q.unwrap_or_default();
    ok(state.app.search_news(&term).await)
}

async fn get_portfolio(State(state): State<ApiState>) -> ApiResult {
    respond(state.app.portfolio().await)
}

/// =============================
/// Analysis & Recommendations
/// =============================

async fn get_analysis(State(state): State<ApiState>) -> ApiResult {
    ok(serde_json::json!({
        "analysis": state.app.current_analysis().await,
        "generating": state.app.analysis_in_progress(),
        "quota_available": state.app.analysis_quota_available().await,
    }))
}

async fn generate_analysis(
    State(state): State<ApiState>,
    Json(req): Json<AnalysisRequest>,
) -> ApiResult {
    info!(symbol = %req.symbol, "Analysis requested over HTTP");
    respond(state.app.generate_analysis(&req.symbol).await)
}

async fn get_recommendations(State(state): State<ApiState>) -> ApiResult {
    ok(serde_json::json!({
        "recommendations": state.app.current_recommendations().await,
        "generating": state.app.recommendations_in_progress(),
    }))
}

async fn generate_recommendations(
    State(state): State<ApiState>,
    body: Option<Json<RecommendationRequest>>,
) -> ApiResult {
    let req = body.map(|Json(r)| r).unwrap_or_default();

    let tolerance = match req.risk_tolerance.as_deref().map(str::parse::<RiskTolerance>) {
        Some(Ok(t)) => Some(t),
        Some(Err(e)) => return fail(MarketEdgeError::InvalidInput(e)),
        None => None,
    };

    let result = match req.portfolio {
        Some(portfolio) => {
            state
                .app
                .generate_recommendations_for(&portfolio, tolerance)
                .await
        }
        None if tolerance.is_some() => {
            let portfolio = state
                .app
                .session()
                .map(|s| s.portfolio_summary.clone())
                .unwrap_or_else(PortfolioSummary::zero);
            state
                .app
                .generate_recommendations_for(&portfolio, tolerance)
                .await
        }
        None => state.app.generate_recommendations().await,
    };
    respond(result)
}

async fn notifications(State(state): State<ApiState>) -> ApiResult {
    ok(state.app.drain_notifications().await)
}

/// =============================
/// Router
/// =============================

pub fn create_router(app: Arc<MarketEdge>) -> Router {
    let state = ApiState { app };

    Router::new()
        .route("/health", get(health))
        .route("/api/session", get(get_session))
        .route("/api/session/login", post(login))
        .route("/api/session/register", post(register))
        .route("/api/session/logout", post(logout))
        .route("/api/session/upgrade", post(upgrade))
        .route("/api/plans", get(plans))
        .route("/api/market", get(get_market))
        .route("/api/market/refresh", post(refresh_market))
        .route("/api/news", get(search_news))
        .route("/api/portfolio", get(get_portfolio))
        .route("/api/analysis", get(get_analysis).post(generate_analysis))
        .route(
            "/api/recommendations",
            get(get_recommendations).post(generate_recommendations),
        )
        .route("/api/notifications", get(notifications))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    app: Arc<MarketEdge>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(app);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}
