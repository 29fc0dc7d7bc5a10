//! Payment handlers.
//!
//! ## Commands
//! - Processing PSP confirmations (browser redirect and server notification)
//! - Confirming and cancelling order payments
//!
//! ## Queries
//! - Building the signed checkout form

mod build_checkout;
mod confirm_payment;
mod process_confirmation;

/// Name recorded on payments taken through this backend.
pub const BACKEND_NAME: &str = "viveum";

// Commands
pub use confirm_payment::{ConfirmPaymentCommand, ConfirmPaymentHandler, PaymentTransition};
pub use process_confirmation::{
    ProcessConfirmationCommand, ProcessConfirmationHandler, ProcessConfirmationResult,
};

// Queries
pub use build_checkout::{BuildCheckoutHandler, BuildCheckoutQuery, CheckoutForm};
