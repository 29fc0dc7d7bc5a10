//! OrderRepository port - The shop's orders, seen from the payment backend.
//!
//! The backend reads order totals and addresses, records payments against an
//! order and moves its status forward. Status changes are compare-and-set so
//! that concurrent confirmations for one order cannot both win.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::domain::foundation::{DomainError, OrderId, Timestamp};
use crate::domain::order::{Order, OrderStatus};

use super::SaveResult;

/// A payment received against an order.
///
/// Unique per (order, transaction id).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderPayment {
    pub order_id: OrderId,
    pub amount: Decimal,
    pub transaction_id: String,
    /// Name of the payment backend that recorded it.
    pub payment_method: String,
    pub created_at: Timestamp,
}

impl OrderPayment {
    pub fn new(
        order_id: OrderId,
        amount: Decimal,
        transaction_id: impl Into<String>,
        payment_method: impl Into<String>,
    ) -> Self {
        Self {
            order_id,
            amount,
            transaction_id: transaction_id.into(),
            payment_method: payment_method.into(),
            created_at: Timestamp::now(),
        }
    }
}

/// Outcome of a compare-and-set status update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusUpdate {
    /// The order was in the expected status and now has the target status.
    Applied,
    /// The order had moved on; carries the status actually found.
    Stale(OrderStatus),
}

/// Port for order lookup, payment recording and status changes.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>, DomainError>;

    /// Inserts or replaces an order.
    async fn save(&self, order: &Order) -> Result<(), DomainError>;

    /// Sets `target` only if the order is currently `expected`.
    ///
    /// # Errors
    ///
    /// `ErrorCode::OrderNotFound` if the order does not exist.
    async fn compare_and_set_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        target: OrderStatus,
    ) -> Result<StatusUpdate, DomainError>;

    /// Records a payment.
    ///
    /// Returns `SaveResult::AlreadyExists` when the (order, transaction id)
    /// pair was recorded before.
    async fn record_payment(&self, payment: OrderPayment) -> Result<SaveResult, DomainError>;

    /// Sum of all payments recorded for the order.
    async fn amount_paid(&self, id: OrderId) -> Result<Decimal, DomainError>;
}
