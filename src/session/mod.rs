//! Session and entitlement store
//!
//! Owns the single active session and the premium flag. Both are persisted
//! under fixed keys and restored by `rehydrate()` before the store reports
//! ready. Until then identity is `Unknown`, which is not the same as signed out.

use crate::digest::stable_uuid_from_string;
use crate::error::MarketEdgeError;
use crate::models::{PortfolioSummary, Session};
use crate::state::KeyValueStore;
use crate::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

pub const SESSION_KEY: &str = "market_edge.session";
pub const PREMIUM_KEY: &str = "market_edge.premium";

/// What dependants may assume about identity
#[derive(Debug, Clone, PartialEq)]
pub enum AuthState {
    /// Persisted state not read yet
    Unknown,
    Anonymous,
    Authenticated(Arc<Session>),
}

impl AuthState {
    pub fn session(&self) -> Option<&Arc<Session>> {
        match self {
            AuthState::Authenticated(session) => Some(session),
            _ => None,
        }
    }

    /// The active session, or the error an operation needing one should return
    pub fn require_session(&self) -> Result<Arc<Session>> {
        match self {
            AuthState::Unknown => Err(MarketEdgeError::SessionPending),
            AuthState::Anonymous => Err(MarketEdgeError::NotAuthenticated),
            AuthState::Authenticated(session) => Ok(Arc::clone(session)),
        }
    }
}

pub struct SessionStore {
    storage: Arc<dyn KeyValueStore>,
    latency: Duration,
    state: watch::Sender<AuthState>,
    /// Serializes mutations so persisted and published state agree
    write_lock: Mutex<()>,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn KeyValueStore>, latency: Duration) -> Self {
        let (state, _) = watch::channel(AuthState::Unknown);
        Self {
            storage,
            latency,
            state,
            write_lock: Mutex::new(()),
        }
    }

    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    pub fn current(&self) -> Option<Arc<Session>> {
        self.state.borrow().session().cloned()
    }

    pub fn is_premium(&self) -> bool {
        self.state
            .borrow()
            .session()
            .map(|s| s.premium)
            .unwrap_or(false)
    }

    pub fn is_ready(&self) -> bool {
        !matches!(*self.state.borrow(), AuthState::Unknown)
    }

    /// Restore session and premium flag from storage.
    ///
    /// Unreadable or corrupt entries are evicted and treated as absent; this
    /// never fails, so the store always becomes ready.
    pub async fn rehydrate(&self) -> AuthState {
        let _guard = self.write_lock.lock().await;
        self.restore().await
    }

    /// Read both persisted keys and publish the result; caller holds `write_lock`
    async fn restore(&self) -> AuthState {
        let session = match self.storage.get(SESSION_KEY).await {
            Ok(Some(raw)) => match serde_json::from_str::<Session>(&raw) {
                Ok(session) => Some(session),
                Err(e) => {
                    warn!("Persisted session is corrupt, discarding: {}", e);
                    self.evict(SESSION_KEY).await;
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!("Failed to read persisted session: {}", e);
                None
            }
        };

        let premium = match self.storage.get(PREMIUM_KEY).await {
            Ok(Some(raw)) => match serde_json::from_str::<bool>(&raw) {
                Ok(flag) => flag,
                Err(e) => {
                    warn!("Persisted premium flag is corrupt, discarding: {}", e);
                    self.evict(PREMIUM_KEY).await;
                    false
                }
            },
            Ok(None) => false,
            Err(e) => {
                warn!("Failed to read persisted premium flag: {}", e);
                false
            }
        };

        let state = match session {
            Some(mut session) => {
                session.premium = premium;
                info!(user_id = ?session.id, premium, "Session restored");
                AuthState::Authenticated(Arc::new(session))
            }
            None => {
                debug!("No persisted session");
                AuthState::Anonymous
            }
        };

        self.state.send_replace(state.clone());
        state
    }

    pub async fn login(&self, email: &str, secret: &str) -> Result<Arc<Session>> {
        let email = require_field("email", email)?;
        require_field("password", secret)?;

        self.simulate_latency().await;

        let display_name = email
            .split('@')
            .next()
            .filter(|local| !local.is_empty())
            .unwrap_or(email)
            .to_string();

        self.establish(Session {
            id: session_id_for(email),
            display_name,
            email: email.to_string(),
            portfolio_summary: PortfolioSummary::seed(),
            premium: false,
        })
        .await
    }

    pub async fn register(&self, name: &str, email: &str, secret: &str) -> Result<Arc<Session>> {
        let name = require_field("name", name)?;
        let email = require_field("email", email)?;
        require_field("password", secret)?;

        self.simulate_latency().await;

        self.establish(Session {
            id: session_id_for(email),
            display_name: name.to_string(),
            email: email.to_string(),
            portfolio_summary: PortfolioSummary::zero(),
            premium: false,
        })
        .await
    }

    /// Clear session and premium flag, in memory and in storage
    pub async fn logout(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let previous = self.state.send_replace(AuthState::Anonymous);
        let remove_session = self.storage.remove(SESSION_KEY).await;
        let remove_premium = self.storage.remove(PREMIUM_KEY).await;

        if let Some(session) = previous.session() {
            info!(user_id = ?session.id, "Logged out");
        }

        remove_session?;
        remove_premium
    }

    /// Grant premium to the active session.
    ///
    /// Payment is verified by the caller before this is invoked.
    pub async fn upgrade_to_premium(&self) -> Result<Arc<Session>> {
        let _guard = self.write_lock.lock().await;

        let current = self.state.borrow().require_session()?;
        if current.premium {
            return Ok(current);
        }

        self.storage.set(PREMIUM_KEY, "true".to_string()).await?;

        let mut upgraded = (*current).clone();
        upgraded.premium = true;
        let upgraded = Arc::new(upgraded);
        self.state
            .send_replace(AuthState::Authenticated(Arc::clone(&upgraded)));

        info!(user_id = ?upgraded.id, "Upgraded to premium");
        Ok(upgraded)
    }

    async fn establish(&self, mut session: Session) -> Result<Arc<Session>> {
        let _guard = self.write_lock.lock().await;

        // Sign-in before startup restore finished: the previous identity is
        // unknown, not absent, so read it before deciding about premium
        let restored = !matches!(*self.state.borrow(), AuthState::Unknown);
        if !restored {
            self.restore().await;
        }

        // Premium follows the identity: the same user keeps it, a new one starts free
        let keeps_premium = self
            .state
            .borrow()
            .session()
            .map(|prev| prev.id == session.id && prev.premium)
            .unwrap_or(false);
        session.premium = keeps_premium;

        self.storage
            .set(SESSION_KEY, serde_json::to_string(&session)?)
            .await?;
        if !keeps_premium {
            self.storage.remove(PREMIUM_KEY).await?;
        }

        let session = Arc::new(session);
        self.state
            .send_replace(AuthState::Authenticated(Arc::clone(&session)));

        info!(user_id = ?session.id, name = %session.display_name, "Session established");
        Ok(session)
    }

    async fn evict(&self, key: &str) {
        if let Err(e) = self.storage.remove(key).await {
            warn!(key, "Failed to evict persisted entry: {}", e);
        }
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

fn require_field<'a>(field: &str, value: &'a str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(MarketEdgeError::Auth(format!("{} must not be empty", field)));
    }
    Ok(trimmed)
}

fn session_id_for(email: &str) -> uuid::Uuid {
    stable_uuid_from_string(&email.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::InMemoryKeyValueStore;

    fn store_with(storage: Arc<InMemoryKeyValueStore>) -> SessionStore {
        SessionStore::new(storage, Duration::ZERO)
    }

    #[tokio::test]
    async fn test_unknown_until_rehydrated() {
        let store = store_with(Arc::new(InMemoryKeyValueStore::new()));
        assert_eq!(store.state(), AuthState::Unknown);
        assert!(!store.is_ready());
        assert!(matches!(
            store.state().require_session(),
            Err(MarketEdgeError::SessionPending)
        ));

        assert_eq!(store.rehydrate().await, AuthState::Anonymous);
        assert!(store.is_ready());
        assert!(matches!(
            store.state().require_session(),
            Err(MarketEdgeError::NotAuthenticated)
        ));
    }

    #[tokio::test]
    async fn test_login_builds_session_from_email() {
        let storage = Arc::new(InMemoryKeyValueStore::new());
        let store = store_with(storage.clone());
        store.rehydrate().await;

        let session = store.login("trader@x.com", "pw").await.unwrap();
        assert_eq!(session.display_name, "trader");
        assert!(!session.premium);
        assert_eq!(session.portfolio_summary, PortfolioSummary::seed());

        let again = store.login("Trader@X.com", "other").await.unwrap();
        assert_eq!(session.id, again.id);

        assert!(storage.get(SESSION_KEY).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_login_before_rehydrate_keeps_persisted_premium() {
        let session = Session {
            id: session_id_for("alice@example.com"),
            display_name: "alice".to_string(),
            email: "alice@example.com".to_string(),
            portfolio_summary: PortfolioSummary::seed(),
            premium: false,
        };
        let storage = Arc::new(InMemoryKeyValueStore::with_entries([
            (SESSION_KEY.to_string(), serde_json::to_string(&session).unwrap()),
            (PREMIUM_KEY.to_string(), "true".to_string()),
        ]));
        let store = store_with(storage.clone());

        let signed_in = store.login("alice@example.com", "pw").await.unwrap();
        assert!(signed_in.premium);
        assert_eq!(storage.get(PREMIUM_KEY).await.unwrap().as_deref(), Some("true"));

        // A late startup restore agrees with the sign-in
        assert!(store.rehydrate().await.session().unwrap().premium);
    }

    #[tokio::test]
    async fn test_empty_credentials_are_rejected() {
        let store = store_with(Arc::new(InMemoryKeyValueStore::new()));
        store.rehydrate().await;

        assert!(matches!(store.login(" ", "pw").await, Err(MarketEdgeError::Auth(_))));
        assert!(matches!(store.login("a@b.c", "").await, Err(MarketEdgeError::Auth(_))));
        assert!(matches!(
            store.register("", "a@b.c", "pw").await,
            Err(MarketEdgeError::Auth(_))
        ));
        assert!(store.current().is_none());
    }

    #[tokio::test]
    async fn test_register_uses_zero_portfolio() {
        let store = store_with(Arc::new(InMemoryKeyValueStore::new()));
        store.rehydrate().await;

        let session = store.register("Ada", "ada@x.com", "pw").await.unwrap();
        assert_eq!(session.display_name, "Ada");
        assert_eq!(session.portfolio_summary, PortfolioSummary::zero());
    }

    #[tokio::test]
    async fn test_upgrade_requires_session_and_persists() {
        let storage = Arc::new(InMemoryKeyValueStore::new());
        let store = store_with(storage.clone());
        store.rehydrate().await;

        assert!(matches!(
            store.upgrade_to_premium().await,
            Err(MarketEdgeError::NotAuthenticated)
        ));

        store.login("trader@x.com", "pw").await.unwrap();
        let upgraded = store.upgrade_to_premium().await.unwrap();
        assert!(upgraded.premium);
        assert!(store.is_premium());
        assert_eq!(storage.get(PREMIUM_KEY).await.unwrap().as_deref(), Some("true"));

        // A fresh process sees the same state
        let restarted = store_with(storage.clone());
        let state = restarted.rehydrate().await;
        assert!(state.session().map(|s| s.premium).unwrap_or(false));
    }

    #[tokio::test]
    async fn test_logout_clears_everything() {
        let storage = Arc::new(InMemoryKeyValueStore::new());
        let store = store_with(storage.clone());
        store.rehydrate().await;

        store.login("trader@x.com", "pw").await.unwrap();
        store.upgrade_to_premium().await.unwrap();
        store.logout().await.unwrap();

        assert_eq!(store.state(), AuthState::Anonymous);
        assert!(!store.is_premium());
        assert_eq!(storage.get(SESSION_KEY).await.unwrap(), None);
        assert_eq!(storage.get(PREMIUM_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_switching_identity_drops_premium() {
        let store = store_with(Arc::new(InMemoryKeyValueStore::new()));
        store.rehydrate().await;

        store.login("trader@x.com", "pw").await.unwrap();
        store.upgrade_to_premium().await.unwrap();

        let same = store.login("trader@x.com", "pw").await.unwrap();
        assert!(same.premium);

        let other = store.login("someone@x.com", "pw").await.unwrap();
        assert!(!other.premium);
    }

    #[tokio::test]
    async fn test_corrupt_persisted_session_defaults_to_anonymous() {
        let storage = Arc::new(InMemoryKeyValueStore::with_entries([
            (SESSION_KEY, "{broken"),
            (PREMIUM_KEY, "true"),
        ]));
        let store = store_with(storage.clone());

        assert_eq!(store.rehydrate().await, AuthState::Anonymous);
        assert_eq!(storage.get(SESSION_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_subscribers_observe_changes() {
        let store = store_with(Arc::new(InMemoryKeyValueStore::new()));
        let mut rx = store.subscribe();
        store.rehydrate().await;

        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), AuthState::Anonymous);

        store.login("trader@x.com", "pw").await.unwrap();
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().session().is_some());
    }
}
