#![allow(dead_code)]

use async_trait::async_trait;
use market_edge::app::{AppOptions, Collaborators, MarketEdge};
use market_edge::config::ResponseMode;
use market_edge::inference::InferenceClient;
use market_edge::market::StaticMarketData;
use market_edge::payment::MockPaymentGateway;
use market_edge::state::{InMemoryKeyValueStore, KeyValueStore};
use market_edge::{InferenceError, ModelParams};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Notify, Semaphore};

pub const MODEL_TEXT: &str = "Breadth is improving and large caps lead.";

/// Replies from a script, then a fixed text; counts every call
pub struct ScriptedInference {
    script: Mutex<VecDeque<Result<String, InferenceError>>>,
    fallback: String,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedInference {
    pub fn replying(text: &str) -> Arc<Self> {
        Self::scripted(text, Vec::new())
    }

    pub fn scripted(fallback: &str, script: Vec<Result<String, InferenceError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fallback: fallback.to_string(),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl InferenceClient for ScriptedInference {
    async fn complete(&self, prompt: &str, _params: &ModelParams) -> Result<String, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(self.fallback.clone()))
    }
}

/// Blocks every call until the test releases it
pub struct GatedInference {
    pub started: Notify,
    release: Semaphore,
    reply: String,
}

impl GatedInference {
    pub fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            started: Notify::new(),
            release: Semaphore::new(0),
            reply: reply.to_string(),
        })
    }

    /// Let `calls` blocked or future calls complete
    pub fn release(&self, calls: usize) {
        self.release.add_permits(calls);
    }
}

#[async_trait]
impl InferenceClient for GatedInference {
    async fn complete(&self, _prompt: &str, _params: &ModelParams) -> Result<String, InferenceError> {
        self.started.notify_one();
        match self.release.acquire().await {
            Ok(permit) => permit.forget(),
            Err(_) => return Err(InferenceError::Transport("gate closed".into())),
        }
        Ok(self.reply.clone())
    }
}

/// In-memory storage whose writes to one key wait until the test releases them
pub struct GatedStore {
    inner: InMemoryKeyValueStore,
    gated_key: &'static str,
    pub started: Notify,
    release: Semaphore,
}

impl GatedStore {
    pub fn new(gated_key: &'static str) -> Arc<Self> {
        Arc::new(Self {
            inner: InMemoryKeyValueStore::new(),
            gated_key,
            started: Notify::new(),
            release: Semaphore::new(0),
        })
    }

    pub fn release(&self, writes: usize) {
        self.release.add_permits(writes);
    }
}

#[async_trait]
impl KeyValueStore for GatedStore {
    async fn get(&self, key: &str) -> market_edge::Result<Option<String>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: String) -> market_edge::Result<()> {
        if key == self.gated_key {
            self.started.notify_one();
            if let Ok(permit) = self.release.acquire().await {
                permit.forget();
            }
        }
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> market_edge::Result<()> {
        self.inner.remove(key).await
    }
}

pub fn app_with(inference: Arc<dyn InferenceClient>) -> MarketEdge {
    app_with_options(inference, Arc::new(InMemoryKeyValueStore::new()), AppOptions::default())
}

pub fn structured_app_with(inference: Arc<dyn InferenceClient>) -> MarketEdge {
    let options = AppOptions {
        response_mode: ResponseMode::Structured,
        ..AppOptions::default()
    };
    app_with_options(inference, Arc::new(InMemoryKeyValueStore::new()), options)
}

pub fn app_with_options(
    inference: Arc<dyn InferenceClient>,
    storage: Arc<dyn KeyValueStore>,
    options: AppOptions,
) -> MarketEdge {
    MarketEdge::new(
        Collaborators {
            storage,
            market: Arc::new(StaticMarketData::new(Duration::ZERO)),
            inference,
            payments: Arc::new(MockPaymentGateway::new(Duration::ZERO, 10)),
        },
        options,
    )
}

/// Bootstrapped app with a signed-in free session
pub async fn signed_in(inference: Arc<dyn InferenceClient>) -> MarketEdge {
    let app = app_with(inference);
    app.bootstrap().await;
    app.login("alice@example.com", "secret").await.unwrap();
    app
}

/// Bootstrapped app with a signed-in premium session
pub async fn premium(inference: Arc<dyn InferenceClient>) -> MarketEdge {
    let app = signed_in(inference).await;
    app.purchase_premium().await.unwrap();
    app
}
