//! ConfirmPaymentHandler - The single mutating entry point for order payment state.
//!
//! Records payments idempotently and drives the order status with
//! compare-and-set updates. A confirmation that contradicts a terminal status
//! is logged and left unapplied.

use std::sync::Arc;

use rust_decimal::Decimal;

use crate::domain::foundation::{ErrorCode, OrderId};
use crate::domain::order::{Order, OrderStatus};
use crate::domain::payment::CallbackError;
use crate::ports::{OrderPayment, OrderRepository, SaveResult, StatusUpdate};

/// Number of compare-and-set attempts before giving up.
const MAX_STATUS_ATTEMPTS: usize = 3;

/// Command to record a successful payment.
#[derive(Debug, Clone)]
pub struct ConfirmPaymentCommand {
    pub order_id: OrderId,
    pub amount: Decimal,
    /// Currency the PSP reported, if any.
    pub currency: Option<String>,
    pub transaction_id: String,
    pub backend_name: String,
}

/// What a confirm or cancel call did to the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentTransition {
    /// The order moved to a new status.
    Applied { from: OrderStatus, to: OrderStatus },
    /// The order already had the requested status.
    AlreadyApplied(OrderStatus),
    /// Payment recorded, but the total is not covered yet.
    PartiallyPaid {
        paid: Decimal,
        total: Decimal,
        status: OrderStatus,
    },
    /// The order is terminal in the opposite status; nothing was changed.
    Conflict { current: OrderStatus },
    /// Payment reported in another currency than the order; not recorded.
    CurrencyMismatch { current: OrderStatus },
    /// Nothing was attempted; the callback could only be observed.
    Unchanged(OrderStatus),
}

impl PaymentTransition {
    /// Status the order has after the call.
    pub fn resulting_status(&self) -> OrderStatus {
        match self {
            PaymentTransition::Applied { to, .. } => *to,
            PaymentTransition::AlreadyApplied(status) => *status,
            PaymentTransition::PartiallyPaid { status, .. } => *status,
            PaymentTransition::Conflict { current } => *current,
            PaymentTransition::CurrencyMismatch { current } => *current,
            PaymentTransition::Unchanged(status) => *status,
        }
    }
}

/// Handler for payment confirmation and cancellation.
pub struct ConfirmPaymentHandler {
    orders: Arc<dyn OrderRepository>,
}

impl ConfirmPaymentHandler {
    pub fn new(orders: Arc<dyn OrderRepository>) -> Self {
        Self { orders }
    }

    /// Records the payment and completes the order once it is paid in full.
    ///
    /// Idempotent per transaction id.
    pub async fn confirm_payment(
        &self,
        cmd: ConfirmPaymentCommand,
    ) -> Result<PaymentTransition, CallbackError> {
        let order = self.load(cmd.order_id).await?;

        match order.status {
            OrderStatus::Completed => {
                tracing::info!(order_id = %order.id, transaction_id = %cmd.transaction_id, "Duplicate payment confirmation ignored");
                return Ok(PaymentTransition::AlreadyApplied(OrderStatus::Completed));
            }
            OrderStatus::Cancelled => {
                tracing::warn!(
                    order_id = %order.id,
                    transaction_id = %cmd.transaction_id,
                    amount = %cmd.amount,
                    "Payment confirmation for cancelled order not applied"
                );
                return Ok(PaymentTransition::Conflict {
                    current: OrderStatus::Cancelled,
                });
            }
            OrderStatus::Pending | OrderStatus::Confirmed => {}
        }

        if let Some(currency) = cmd.currency.as_deref() {
            if !currency.eq_ignore_ascii_case(&order.currency) {
                tracing::warn!(
                    order_id = %order.id,
                    transaction_id = %cmd.transaction_id,
                    reported = %currency,
                    expected = %order.currency,
                    "Payment currency does not match order; not recorded"
                );
                return Ok(PaymentTransition::CurrencyMismatch {
                    current: order.status,
                });
            }
        }

        let payment = OrderPayment::new(
            order.id,
            cmd.amount,
            cmd.transaction_id.clone(),
            cmd.backend_name.clone(),
        );
        if self.orders.record_payment(payment).await? == SaveResult::AlreadyExists {
            tracing::debug!(order_id = %order.id, transaction_id = %cmd.transaction_id, "Payment already recorded");
        }

        let paid = self.orders.amount_paid(order.id).await?;
        if !order.is_paid_by(paid) {
            tracing::info!(order_id = %order.id, paid = %paid, total = %order.total, "Order partially paid");
            return Ok(PaymentTransition::PartiallyPaid {
                paid,
                total: order.total,
                status: order.status,
            });
        }

        self.transition(&order, OrderStatus::Completed).await
    }

    /// Cancels the order after a verified decline.
    pub async fn cancel_payment(&self, order_id: OrderId) -> Result<PaymentTransition, CallbackError> {
        let order = self.load(order_id).await?;
        self.transition(&order, OrderStatus::Cancelled).await
    }

    /// Current status of the order, without changing anything.
    pub async fn order_status(&self, order_id: OrderId) -> Result<OrderStatus, CallbackError> {
        Ok(self.load(order_id).await?.status)
    }

    async fn load(&self, order_id: OrderId) -> Result<Order, CallbackError> {
        self.orders
            .find_by_id(order_id)
            .await?
            .ok_or(CallbackError::OrderNotFound(order_id))
    }

    /// Compare-and-set loop from the loaded status to `target`.
    ///
    /// The loser of a race re-reads the status and either sees `target`
    /// (duplicate), the opposite terminal status (conflict) or a
    /// non-terminal status to retry from.
    async fn transition(
        &self,
        order: &Order,
        target: OrderStatus,
    ) -> Result<PaymentTransition, CallbackError> {
        let mut expected = order.status;

        for _ in 0..MAX_STATUS_ATTEMPTS {
            if expected == target {
                return Ok(PaymentTransition::AlreadyApplied(target));
            }
            if !expected.is_awaiting_payment() {
                tracing::warn!(
                    order_id = %order.id,
                    current = %expected,
                    requested = %target,
                    "Confirmation contradicts terminal order status"
                );
                return Ok(PaymentTransition::Conflict { current: expected });
            }

            let update = self
                .orders
                .compare_and_set_status(order.id, expected, target)
                .await
                .map_err(|e| match e.code {
                    ErrorCode::OrderNotFound => CallbackError::OrderNotFound(order.id),
                    _ => CallbackError::from(e),
                })?;

            match update {
                StatusUpdate::Applied => {
                    tracing::info!(order_id = %order.id, from = %expected, to = %target, "Order status changed");
                    return Ok(PaymentTransition::Applied {
                        from: expected,
                        to: target,
                    });
                }
                StatusUpdate::Stale(current) => expected = current,
            }
        }

        Err(CallbackError::Database(format!(
            "order {} kept changing status, gave up after {} attempts",
            order.id, MAX_STATUS_ATTEMPTS
        )))
    }
}
