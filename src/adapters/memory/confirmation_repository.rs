//! In-memory confirmation repository and callback audit.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, OrderId};
use crate::domain::payment::Confirmation;
use crate::ports::{CallbackAudit, ConfirmationRepository, SaveResult};

/// Confirmations and rejected callbacks held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryConfirmationRepository {
    confirmations: Arc<RwLock<Vec<Confirmation>>>,
    rejections: Arc<RwLock<Vec<CallbackAudit>>>,
}

impl InMemoryConfirmationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every audited rejection, oldest first.
    pub async fn rejections(&self) -> Vec<CallbackAudit> {
        self.rejections.read().await.clone()
    }

    pub async fn confirmation_count(&self) -> usize {
        self.confirmations.read().await.len()
    }
}

#[async_trait]
impl ConfirmationRepository for InMemoryConfirmationRepository {
    async fn save(&self, confirmation: &Confirmation) -> Result<SaveResult, DomainError> {
        let mut confirmations = self.confirmations.write().await;
        let key = confirmation.idempotency_key();
        if confirmations.iter().any(|c| c.idempotency_key() == key) {
            return Ok(SaveResult::AlreadyExists);
        }
        confirmations.push(confirmation.clone());
        Ok(SaveResult::Inserted)
    }

    async fn find_by_order(&self, order_id: OrderId) -> Result<Vec<Confirmation>, DomainError> {
        Ok(self
            .confirmations
            .read()
            .await
            .iter()
            .filter(|c| c.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn record_rejection(&self, audit: CallbackAudit) -> Result<(), DomainError> {
        self.rejections.write().await.push(audit);
        Ok(())
    }
}
