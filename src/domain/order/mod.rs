//! Order domain module.
//!
//! The slice of the shop's order model the payment backend reads and writes.
//!
//! # Module Structure
//!
//! - `aggregate` - Order entity and billing address
//! - `status` - OrderStatus state machine
//! - `money` - Decimal to minor-unit conversion

mod aggregate;
pub mod money;
mod status;

pub use aggregate::{BillingAddress, Order};
pub use status::OrderStatus;
