//! ConfirmationRepository port - Verified confirmations and rejected callbacks.
//!
//! Verified confirmations are the idempotency record for PSP redeliveries:
//! the same delivery (order, origin, transaction id, status) is stored once.
//! Callbacks that fail validation never become confirmations; they are kept
//! in a separate audit trail instead.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, OrderId, Timestamp};
use crate::domain::payment::{Confirmation, ConfirmationOrigin};

/// Result of attempting to save a record with a uniqueness constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveResult {
    /// Record was inserted (first time seeing it).
    Inserted,
    /// Record already exists (duplicate delivery).
    AlreadyExists,
}

/// Why a callback was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectionKind {
    Malformed,
    Suspicious,
    UntrustedOrigin,
}

impl RejectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionKind::Malformed => "malformed",
            RejectionKind::Suspicious => "suspicious",
            RejectionKind::UntrustedOrigin => "untrusted_origin",
        }
    }
}

/// Audit entry for a callback that did not pass validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackAudit {
    pub kind: RejectionKind,
    pub origin: ConfirmationOrigin,
    pub reason: String,
    pub remote_ip: Option<String>,
    /// Order reference as sent, which may not be a valid id.
    pub order_reference: Option<String>,
    pub parameters: BTreeMap<String, String>,
    pub received_at: Timestamp,
}

impl CallbackAudit {
    /// Creates an audit entry for a structurally invalid callback.
    pub fn malformed(
        origin: ConfirmationOrigin,
        reason: impl Into<String>,
        parameters: BTreeMap<String, String>,
    ) -> Self {
        Self::new(RejectionKind::Malformed, origin, reason, parameters)
    }

    /// Creates an audit entry for a callback that failed verification.
    pub fn suspicious(
        origin: ConfirmationOrigin,
        reason: impl Into<String>,
        parameters: BTreeMap<String, String>,
    ) -> Self {
        Self::new(RejectionKind::Suspicious, origin, reason, parameters)
    }

    /// Creates an audit entry for a notification from an unknown sender.
    pub fn untrusted_origin(reason: impl Into<String>, parameters: BTreeMap<String, String>) -> Self {
        Self::new(
            RejectionKind::UntrustedOrigin,
            ConfirmationOrigin::Acquirer,
            reason,
            parameters,
        )
    }

    /// Attaches the sender address.
    pub fn with_remote_ip(mut self, remote_ip: Option<String>) -> Self {
        self.remote_ip = remote_ip;
        self
    }

    fn new(
        kind: RejectionKind,
        origin: ConfirmationOrigin,
        reason: impl Into<String>,
        parameters: BTreeMap<String, String>,
    ) -> Self {
        let order_reference = ["orderid", "shopper_id"]
            .iter()
            .find_map(|name| parameters.get(*name).cloned());
        Self {
            kind,
            origin,
            reason: reason.into(),
            remote_ip: None,
            order_reference,
            parameters,
            received_at: Timestamp::now(),
        }
    }
}

/// Port for verified confirmations and the rejected-callback audit.
///
/// Implementations should enforce uniqueness of
/// `Confirmation::idempotency_key` with a database constraint so concurrent
/// deliveries cannot both insert.
#[async_trait]
pub trait ConfirmationRepository: Send + Sync {
    /// Stores a verified confirmation.
    ///
    /// Returns `SaveResult::AlreadyExists` for a redelivery of a stored one.
    async fn save(&self, confirmation: &Confirmation) -> Result<SaveResult, DomainError>;

    /// All confirmations for an order, oldest first.
    async fn find_by_order(&self, order_id: OrderId) -> Result<Vec<Confirmation>, DomainError>;

    /// Appends a rejected callback to the audit trail.
    async fn record_rejection(&self, audit: CallbackAudit) -> Result<(), DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn audit_picks_up_order_reference() {
        let audit = CallbackAudit::suspicious(
            ConfirmationOrigin::Direct,
            "signature mismatch",
            params(&[("orderid", "1001"), ("status", "5")]),
        );

        assert_eq!(audit.kind, RejectionKind::Suspicious);
        assert_eq!(audit.order_reference.as_deref(), Some("1001"));
    }

    #[test]
    fn audit_uses_notification_order_name() {
        let audit = CallbackAudit::malformed(
            ConfirmationOrigin::Acquirer,
            "amount missing",
            params(&[("shopper_id", "abc")]),
        );

        assert_eq!(audit.order_reference.as_deref(), Some("abc"));
    }

    #[test]
    fn untrusted_origin_is_always_a_notification() {
        let audit = CallbackAudit::untrusted_origin("not allow-listed", BTreeMap::new())
            .with_remote_ip(Some("198.51.100.7".to_string()));

        assert_eq!(audit.origin, ConfirmationOrigin::Acquirer);
        assert_eq!(audit.kind.as_str(), "untrusted_origin");
        assert_eq!(audit.remote_ip.as_deref(), Some("198.51.100.7"));
        assert!(audit.order_reference.is_none());
    }
}
