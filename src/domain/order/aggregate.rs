//! Order aggregate as seen by the payment backend.
//!
//! The shop owns orders. The payment backend only reads the total, currency,
//! billing address and customer email, and moves the status forward when a
//! verified confirmation arrives.
//!
//! # Design Decisions
//!
//! - **Exact money**: totals are `rust_decimal::Decimal`, never floats
//! - **Terminal states are final**: transitions go through `StateMachine`

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{OrderId, StateMachine, Timestamp, ValidationError};

use super::OrderStatus;

/// Billing address attached to an order.
///
/// Missing parts are empty strings; the PSP form never receives nulls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingAddress {
    pub name: String,
    pub address: String,
    pub address2: String,
    pub zip_code: String,
    pub city: String,
    pub country: String,
}

/// Order aggregate.
///
/// # Invariants
///
/// - `total` is not negative
/// - `status` only changes along `OrderStatus` transitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub total: Decimal,
    pub currency: String,
    pub status: OrderStatus,
    pub billing_address: Option<BillingAddress>,
    pub customer_email: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Order {
    /// Creates a new pending order.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if the total is negative or the currency is empty.
    pub fn new(
        id: OrderId,
        total: Decimal,
        currency: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        if total.is_sign_negative() && !total.is_zero() {
            return Err(ValidationError::negative("total", total));
        }
        let currency = currency.into();
        if currency.trim().is_empty() {
            return Err(ValidationError::empty_field("currency"));
        }
        let now = Timestamp::now();
        Ok(Self {
            id,
            total,
            currency,
            status: OrderStatus::Pending,
            billing_address: None,
            customer_email: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn with_billing_address(mut self, address: BillingAddress) -> Self {
        self.billing_address = Some(address);
        self
    }

    pub fn with_customer_email(mut self, email: impl Into<String>) -> Self {
        self.customer_email = Some(email.into());
        self
    }

    /// Returns true once `amount_paid` covers the order total.
    pub fn is_paid_by(&self, amount_paid: Decimal) -> bool {
        amount_paid >= self.total
    }

    /// Moves the order to `target`, enforcing the state machine.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if the transition is not allowed.
    pub fn transition_to(&mut self, target: OrderStatus) -> Result<(), ValidationError> {
        self.status = self.status.transition_to(target)?;
        self.updated_at = Timestamp::now();
        Ok(())
    }
}
