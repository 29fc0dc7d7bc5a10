//! In-memory adapters.
//!
//! Used when no database is configured, and by tests.

mod confirmation_repository;
mod order_repository;

pub use confirmation_repository::InMemoryConfirmationRepository;
pub use order_repository::InMemoryOrderRepository;
