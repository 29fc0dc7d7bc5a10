//! In-memory order repository.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, ErrorCode, OrderId, Timestamp};
use crate::domain::order::{Order, OrderStatus};
use crate::ports::{OrderPayment, OrderRepository, SaveResult, StatusUpdate};

/// Orders and payments held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderRepository {
    orders: Arc<RwLock<HashMap<OrderId, Order>>>,
    payments: Arc<RwLock<Vec<OrderPayment>>>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a repository holding the given orders.
    pub fn with_orders(orders: impl IntoIterator<Item = Order>) -> Self {
        let map = orders.into_iter().map(|o| (o.id, o)).collect();
        Self {
            orders: Arc::new(RwLock::new(map)),
            payments: Arc::default(),
        }
    }

    /// Payments recorded for an order, in arrival order.
    pub async fn payments_for(&self, id: OrderId) -> Vec<OrderPayment> {
        self.payments
            .read()
            .await
            .iter()
            .filter(|p| p.order_id == id)
            .cloned()
            .collect()
    }
}

fn not_found(id: OrderId) -> DomainError {
    DomainError::new(ErrorCode::OrderNotFound, format!("Order {} not found", id))
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>, DomainError> {
        Ok(self.orders.read().await.get(&id).cloned())
    }

    async fn save(&self, order: &Order) -> Result<(), DomainError> {
        self.orders.write().await.insert(order.id, order.clone());
        Ok(())
    }

    async fn compare_and_set_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        target: OrderStatus,
    ) -> Result<StatusUpdate, DomainError> {
        let mut orders = self.orders.write().await;
        let order = orders.get_mut(&id).ok_or_else(|| not_found(id))?;
        if order.status != expected {
            return Ok(StatusUpdate::Stale(order.status));
        }
        order.status = target;
        order.updated_at = Timestamp::now();
        Ok(StatusUpdate::Applied)
    }

    async fn record_payment(&self, payment: OrderPayment) -> Result<SaveResult, DomainError> {
        let mut payments = self.payments.write().await;
        let duplicate = payments
            .iter()
            .any(|p| p.order_id == payment.order_id && p.transaction_id == payment.transaction_id);
        if duplicate {
            return Ok(SaveResult::AlreadyExists);
        }
        payments.push(payment);
        Ok(SaveResult::Inserted)
    }

    async fn amount_paid(&self, id: OrderId) -> Result<Decimal, DomainError> {
        Ok(self
            .payments
            .read()
            .await
            .iter()
            .filter(|p| p.order_id == id)
            .map(|p| p.amount)
            .sum())
    }
}
