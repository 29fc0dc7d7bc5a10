//! PostgreSQL adapters - Database implementations for repository ports.
//!
//! - `PostgresOrderRepository` - Orders, status compare-and-set and payments
//! - `PostgresConfirmationRepository` - Verified confirmations and the
//!   rejected-callback audit

mod confirmation_repository;
mod order_repository;

pub use confirmation_repository::PostgresConfirmationRepository;
pub use order_repository::PostgresOrderRepository;
