//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, timestamps, errors, state machine)
//! - `order` - Order aggregate, status lifecycle and money conversion
//! - `payment` - PSP integration: signatures, request building, confirmation validation

pub mod foundation;
pub mod order;
pub mod payment;
