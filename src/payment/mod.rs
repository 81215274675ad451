//! Payment collaborator
//!
//! Checkout is external; a successful receipt is the only thing that
//! authorizes a premium upgrade.

use crate::models::Session;
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentReceipt {
    pub receipt_id: Uuid,
    pub user_id: Uuid,
    pub amount_usd: u32,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_session(&self, session: &Session) -> Result<PaymentReceipt>;
}

/// Approves every checkout after a simulated delay
pub struct MockPaymentGateway {
    latency: Duration,
    amount_usd: u32,
}

impl MockPaymentGateway {
    pub fn new(latency: Duration, amount_usd: u32) -> Self {
        Self { latency, amount_usd }
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn create_session(&self, session: &Session) -> Result<PaymentReceipt> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let receipt = PaymentReceipt {
            receipt_id: Uuid::new_v4(),
            user_id: session.id,
            amount_usd: self.amount_usd,
            created_at: Utc::now(),
        };

        info!(user_id = ?session.id, receipt_id = ?receipt.receipt_id, "Mock checkout approved");
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PortfolioSummary;

    #[test]
    fn test_mock_checkout_issues_receipt_for_session() {
        let session = Session {
            id: Uuid::new_v4(),
            display_name: "alice".to_string(),
            email: "alice@example.com".to_string(),
            portfolio_summary: PortfolioSummary::seed(),
            premium: false,
        };
        let gateway = MockPaymentGateway::new(Duration::ZERO, 10);

        let receipt = tokio_test::block_on(gateway.create_session(&session)).unwrap();
        assert_eq!(receipt.user_id, session.id);
        assert_eq!(receipt.amount_usd, 10);
    }
}
