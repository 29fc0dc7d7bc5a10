//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Order Ports
//!
//! - `OrderRepository` - Order lookup, payment recording, status compare-and-set
//!
//! ## Confirmation Ports
//!
//! - `ConfirmationRepository` - Verified confirmations and the rejected-callback audit

mod confirmation_repository;
mod order_repository;

pub use confirmation_repository::{
    CallbackAudit, ConfirmationRepository, RejectionKind, SaveResult,
};
pub use order_repository::{OrderPayment, OrderRepository, StatusUpdate};
