//! Application container
//!
//! Wires the session store, market data, orchestrators and payment gateway
//! together and is the single entry point for presentation code. Every
//! user-triggered failure is logged, queued as a notification, and returned;
//! none of them leaves partially written state behind.

pub mod notifications;

pub use notifications::{Notification, NotificationCenter, NotificationLevel};

use crate::analysis::AnalysisOrchestrator;
use crate::config::{ResponseMode, Settings, DEFAULT_MODEL};
use crate::error::MarketEdgeError;
use crate::inference::{CannedInference, InferenceClient, OpenAiCompatibleClient};
use crate::market::{MarketDataSource, MarketDataStore, StaticMarketData};
use crate::models::{
    AnalysisRecord, Article, MarketOverview, PortfolioDetails, PortfolioSummary,
    RecommendationRecord, RiskTolerance, Session,
};
use crate::payment::{MockPaymentGateway, PaymentGateway};
use crate::recommendations::RecommendationOrchestrator;
use crate::session::{AuthState, SessionStore};
use crate::state::{FileKeyValueStore, InMemoryKeyValueStore, KeyValueStore};
use crate::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

const PREMIUM_PRICE_USD: u32 = 10;

/// Injected collaborators
pub struct Collaborators {
    pub storage: Arc<dyn KeyValueStore>,
    pub market: Arc<dyn MarketDataSource>,
    pub inference: Arc<dyn InferenceClient>,
    pub payments: Arc<dyn PaymentGateway>,
}

#[derive(Debug, Clone)]
pub struct AppOptions {
    pub model: String,
    pub response_mode: ResponseMode,
    pub risk_tolerance: RiskTolerance,
    /// Simulated latency of login and registration
    pub auth_latency: Duration,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            response_mode: ResponseMode::Fixture,
            risk_tolerance: RiskTolerance::Moderate,
            auth_latency: Duration::ZERO,
        }
    }
}

pub struct MarketEdge {
    sessions: Arc<SessionStore>,
    market: MarketDataStore,
    analysis: AnalysisOrchestrator,
    recommendations: RecommendationOrchestrator,
    payments: Arc<dyn PaymentGateway>,
    notifications: NotificationCenter,
}

impl MarketEdge {
    pub fn new(collaborators: Collaborators, options: AppOptions) -> Self {
        let Collaborators {
            storage,
            market,
            inference,
            payments,
        } = collaborators;

        let sessions = Arc::new(SessionStore::new(storage, options.auth_latency));

        let analysis = AnalysisOrchestrator::new(
            Arc::clone(&sessions),
            Arc::clone(&market),
            Arc::clone(&inference),
            options.model.clone(),
            options.response_mode,
        );

        let recommendations = RecommendationOrchestrator::new(
            Arc::clone(&sessions),
            inference,
            options.model,
            options.response_mode,
            options.risk_tolerance,
        );

        Self {
            sessions,
            market: MarketDataStore::new(market),
            analysis,
            recommendations,
            payments,
            notifications: NotificationCenter::new(),
        }
    }

    /// Production wiring: file or in-memory storage, real or canned inference
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let storage: Arc<dyn KeyValueStore> = match &settings.state_path {
            Some(path) => {
                info!(path = %path.display(), "Using file-backed session storage");
                Arc::new(FileKeyValueStore::new(path.clone()))
            }
            None => Arc::new(InMemoryKeyValueStore::new()),
        };

        let inference: Arc<dyn InferenceClient> = match settings.api_key {
            Some(_) => Arc::new(OpenAiCompatibleClient::from_settings(settings)?),
            None => {
                warn!("MARKET_EDGE_API_KEY not set; using canned inference responses");
                Arc::new(CannedInference::default())
            }
        };

        let collaborators = Collaborators {
            storage,
            market: Arc::new(StaticMarketData::new(settings.latency)),
            inference,
            payments: Arc::new(MockPaymentGateway::new(settings.latency, PREMIUM_PRICE_USD)),
        };

        let options = AppOptions {
            model: settings.model.clone(),
            response_mode: settings.response_mode,
            risk_tolerance: settings.risk_tolerance,
            auth_latency: settings.latency,
        };

        Ok(Self::new(collaborators, options))
    }

    /// Restore the session, then load market data.
    ///
    /// A market failure is reported as a notification and does not fail startup.
    pub async fn bootstrap(&self) -> AuthState {
        let state = self.sessions.rehydrate().await;
        if let Err(e) = self.market.load().await {
            self.report("Market data", &e).await;
        }
        state
    }

    // =============================
    // Session
    // =============================

    pub fn auth_state(&self) -> AuthState {
        self.sessions.state()
    }

    pub fn session(&self) -> Option<Arc<Session>> {
        self.sessions.current()
    }

    pub fn is_premium(&self) -> bool {
        self.sessions.is_premium()
    }

    pub fn subscribe_session(&self) -> watch::Receiver<AuthState> {
        self.sessions.subscribe()
    }

    pub async fn login(&self, email: &str, secret: &str) -> Result<Arc<Session>> {
        let previous = self.sessions.current().map(|s| s.id);
        let result = self.sessions.login(email, secret).await;
        self.after_sign_in(previous, result, "Login").await
    }

    pub async fn register(&self, name: &str, email: &str, secret: &str) -> Result<Arc<Session>> {
        let previous = self.sessions.current().map(|s| s.id);
        let result = self.sessions.register(name, email, secret).await;
        self.after_sign_in(previous, result, "Registration").await
    }

    async fn after_sign_in(
        &self,
        previous: Option<uuid::Uuid>,
        result: Result<Arc<Session>>,
        action: &str,
    ) -> Result<Arc<Session>> {
        match result {
            Ok(session) => {
                if previous != Some(session.id) {
                    self.reset_generated().await;
                }
                self.notify_success(format!("Welcome, {}!", session.display_name))
                    .await;
                Ok(session)
            }
            Err(e) => {
                self.report(action, &e).await;
                Err(e)
            }
        }
    }

    /// Sign out and forget everything generated during the session
    pub async fn logout(&self) -> Result<()> {
        // Identity goes first so no new request can pass the gate, then the
        // reset discards whatever was admitted before it
        let result = self.sessions.logout().await;
        self.reset_generated().await;
        match result {
            Ok(()) => {
                self.notify_info("Signed out").await;
                Ok(())
            }
            Err(e) => {
                self.report("Logout", &e).await;
                Err(e)
            }
        }
    }

    /// Flip the premium flag for a caller that already completed payment
    pub async fn upgrade_to_premium(&self) -> Result<Arc<Session>> {
        match self.sessions.upgrade_to_premium().await {
            Ok(session) => {
                self.notify_success("Successfully upgraded to Premium!").await;
                Ok(session)
            }
            Err(e) => {
                self.report("Upgrade", &e).await;
                Err(e)
            }
        }
    }

    /// Run checkout, then upgrade only if the payment went through
    pub async fn purchase_premium(&self) -> Result<Arc<Session>> {
        let session = match self.sessions.state().require_session() {
            Ok(session) => session,
            Err(e) => {
                self.report("Upgrade", &e).await;
                return Err(e);
            }
        };

        if session.premium {
            return Ok(session);
        }

        match self.payments.create_session(&session).await {
            Ok(receipt) => {
                info!(receipt_id = ?receipt.receipt_id, "Payment accepted");
                self.upgrade_to_premium().await
            }
            Err(e) => {
                let e = match e {
                    declined @ MarketEdgeError::Payment(_) => declined,
                    other => MarketEdgeError::Payment(other.to_string()),
                };
                self.report("Payment", &e).await;
                Err(e)
            }
        }
    }

    // =============================
    // Market data
    // =============================

    pub async fn market_snapshot(&self) -> Arc<MarketOverview> {
        self.market.snapshot().await
    }

    pub async fn refresh_market(&self) -> Result<Arc<MarketOverview>> {
        match self.market.load().await {
            Ok(snapshot) => Ok(snapshot),
            Err(e) => {
                self.report("Market data", &e).await;
                Err(e)
            }
        }
    }

    pub async fn search_news(&self, term: &str) -> Vec<Article> {
        self.market
            .snapshot()
            .await
            .search_news(term)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Detailed holdings; requires a session like every personal view
    pub async fn portfolio(&self) -> Result<PortfolioDetails> {
        let result = match self.sessions.state().require_session() {
            Ok(_) => self.market.source().get_portfolio().await,
            Err(e) => Err(e),
        };

        if let Err(e) = &result {
            self.report("Portfolio", e).await;
        }
        result
    }

    // =============================
    // Analysis
    // =============================

    pub async fn current_analysis(&self) -> Option<Arc<AnalysisRecord>> {
        self.analysis.current().await
    }

    pub async fn analysis_quota_available(&self) -> bool {
        self.analysis.quota_available().await
    }

    pub fn analysis_in_progress(&self) -> bool {
        self.analysis.is_generating()
    }

    pub async fn generate_analysis(&self, symbol: &str) -> Result<Arc<AnalysisRecord>> {
        match self.analysis.generate_analysis(symbol).await {
            Ok(record) => {
                self.notify_success("Market analysis generated successfully!")
                    .await;
                Ok(record)
            }
            Err(e) => {
                self.report("Analysis", &e).await;
                Err(e)
            }
        }
    }

    pub fn cancel_analysis(&self) {
        self.analysis.cancel();
    }

    // =============================
    // Recommendations
    // =============================

    pub async fn current_recommendations(&self) -> Arc<Vec<RecommendationRecord>> {
        self.recommendations.current().await
    }

    pub fn recommendations_in_progress(&self) -> bool {
        self.recommendations.is_generating()
    }

    /// Recommendations for the active session's own portfolio summary
    pub async fn generate_recommendations(&self) -> Result<Arc<Vec<RecommendationRecord>>> {
        let portfolio = self
            .sessions
            .current()
            .map(|s| s.portfolio_summary.clone())
            .unwrap_or_else(PortfolioSummary::zero);
        self.generate_recommendations_for(&portfolio, None).await
    }

    pub async fn generate_recommendations_for(
        &self,
        portfolio: &PortfolioSummary,
        tolerance: Option<RiskTolerance>,
    ) -> Result<Arc<Vec<RecommendationRecord>>> {
        let result = match tolerance {
            Some(t) => {
                self.recommendations
                    .generate_recommendations_with(portfolio, t)
                    .await
            }
            None => self.recommendations.generate_recommendations(portfolio).await,
        };

        match result {
            Ok(records) => {
                self.notify_success("Personalized recommendations generated!")
                    .await;
                Ok(records)
            }
            Err(e) => {
                self.report("Recommendations", &e).await;
                Err(e)
            }
        }
    }

    pub fn cancel_recommendations(&self) {
        self.recommendations.cancel();
    }

    // =============================
    // Notifications
    // =============================

    pub async fn drain_notifications(&self) -> Vec<Notification> {
        self.notifications.drain().await
    }

    async fn notify_success(&self, message: impl Into<String>) {
        self.notifications
            .push(NotificationLevel::Success, None, message)
            .await;
    }

    async fn notify_info(&self, message: impl Into<String>) {
        self.notifications
            .push(NotificationLevel::Info, None, message)
            .await;
    }

    async fn report(&self, action: &str, err: &MarketEdgeError) {
        match err {
            MarketEdgeError::Cancelled(_) => {
                // The requester lost interest; nothing to show
                info!(action, "Request cancelled");
                return;
            }
            MarketEdgeError::Entitlement(_)
            | MarketEdgeError::Auth(_)
            | MarketEdgeError::NotAuthenticated
            | MarketEdgeError::Busy(_)
            | MarketEdgeError::InvalidInput(_) => {
                warn!(action, kind = err.kind(), "{}", err);
            }
            _ => {
                error!(action, kind = err.kind(), "{}", err);
            }
        }

        self.notifications
            .push(
                NotificationLevel::Error,
                Some(err.kind()),
                format!("{}: {}", action, err),
            )
            .await;
    }

    async fn reset_generated(&self) {
        self.analysis.reset().await;
        self.recommendations.reset().await;
    }
}
