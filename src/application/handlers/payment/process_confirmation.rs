//! ProcessConfirmationHandler - Handles one PSP callback on either channel.
//!
//! Validation decides the outcome; this handler audits rejections, applies
//! verified outcomes through `ConfirmPaymentHandler` and records the
//! confirmation for idempotency and audit. Mapping to HTTP happens in the
//! adapter.
//!
//! When the inbound credential does not cover the status code (session
//! tokens), browser returns are read-only and only the acquirer
//! notification moves the order.

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::Arc;

use crate::domain::foundation::OrderId;
use crate::domain::order::OrderStatus;
use crate::domain::payment::{
    CallbackError, CallbackSource, Confirmation, ConfirmationOrigin, ConfirmationValidator,
    ValidationOutcome,
};
use crate::ports::{CallbackAudit, ConfirmationRepository, SaveResult};

use super::confirm_payment::{ConfirmPaymentCommand, ConfirmPaymentHandler, PaymentTransition};
use super::BACKEND_NAME;

/// Command carrying one received callback.
#[derive(Debug, Clone)]
pub struct ProcessConfirmationCommand {
    pub origin: ConfirmationOrigin,
    /// Parameters exactly as received, in order.
    pub parameters: Vec<(String, String)>,
    pub remote_ip: Option<IpAddr>,
    pub forwarded_for: Option<String>,
}

/// Result of a verified callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessConfirmationResult {
    pub order_id: OrderId,
    /// The PSP reported a successful payment.
    pub payment_succeeded: bool,
    pub transition: PaymentTransition,
    /// Order status after the callback was applied.
    pub order_status: OrderStatus,
    /// The same delivery had been processed before.
    pub duplicate: bool,
}

/// Handler for inbound PSP confirmations.
pub struct ProcessConfirmationHandler {
    validator: Arc<ConfirmationValidator>,
    confirmations: Arc<dyn ConfirmationRepository>,
    payments: ConfirmPaymentHandler,
}

impl ProcessConfirmationHandler {
    pub fn new(
        validator: Arc<ConfirmationValidator>,
        confirmations: Arc<dyn ConfirmationRepository>,
        payments: ConfirmPaymentHandler,
    ) -> Self {
        Self {
            validator,
            confirmations,
            payments,
        }
    }

    pub async fn handle(
        &self,
        cmd: ProcessConfirmationCommand,
    ) -> Result<ProcessConfirmationResult, CallbackError> {
        let source = CallbackSource {
            origin: cmd.origin,
            remote_ip: cmd.remote_ip,
            forwarded_for: cmd.forwarded_for.as_deref(),
        };

        let observe_only =
            cmd.origin == ConfirmationOrigin::Direct && !self.validator.authenticates_status();

        match self.validator.validate(&cmd.parameters, &source) {
            ValidationOutcome::Accepted(confirmation) | ValidationOutcome::Declined(confirmation)
                if observe_only =>
            {
                self.observe(confirmation).await
            }
            ValidationOutcome::Accepted(confirmation) => self.apply(confirmation, true).await,
            ValidationOutcome::Declined(confirmation) => self.apply(confirmation, false).await,
            ValidationOutcome::Malformed { reason } => {
                tracing::warn!(origin = %cmd.origin, reason = %reason, "Malformed payment confirmation rejected");
                let audit = CallbackAudit::malformed(cmd.origin, reason.clone(), lowercase(&cmd.parameters));
                self.audit(audit, cmd.remote_ip).await;
                Err(CallbackError::Malformed(reason))
            }
            ValidationOutcome::Suspicious { reason, parameters } => {
                tracing::error!(
                    origin = %cmd.origin,
                    reason = %reason,
                    remote_ip = ?cmd.remote_ip,
                    parameters = ?parameters,
                    "Payment confirmation failed verification"
                );
                let audit = CallbackAudit::suspicious(cmd.origin, reason, parameters);
                self.audit(audit, cmd.remote_ip).await;
                Err(CallbackError::SignatureMismatch)
            }
            ValidationOutcome::UntrustedOrigin(untrusted) => {
                tracing::warn!(
                    remote = %untrusted.remote,
                    forwarded_for = %untrusted.forwarded_for,
                    "Payment notification from untrusted origin rejected"
                );
                let audit = CallbackAudit::untrusted_origin(untrusted.to_string(), lowercase(&cmd.parameters));
                self.audit(audit, cmd.remote_ip).await;
                Err(CallbackError::UntrustedOrigin(untrusted))
            }
        }
    }

    async fn apply(
        &self,
        confirmation: Confirmation,
        payment_succeeded: bool,
    ) -> Result<ProcessConfirmationResult, CallbackError> {
        let order_id = confirmation.order_id;

        let transition = if payment_succeeded {
            self.payments
                .confirm_payment(ConfirmPaymentCommand {
                    order_id,
                    amount: confirmation.amount,
                    currency: confirmation.currency.clone(),
                    transaction_id: confirmation.payment_reference(),
                    backend_name: BACKEND_NAME.to_string(),
                })
                .await?
        } else {
            self.payments.cancel_payment(order_id).await?
        };

        // Stored after the transition so a failed write is redelivered and
        // replays as a duplicate.
        let duplicate = self.confirmations.save(&confirmation).await? == SaveResult::AlreadyExists;

        tracing::info!(
            order_id = %order_id,
            origin = %confirmation.origin,
            status = %confirmation.status,
            duplicate,
            "Payment confirmation processed"
        );

        Ok(ProcessConfirmationResult {
            order_id,
            payment_succeeded,
            transition,
            order_status: transition.resulting_status(),
            duplicate,
        })
    }

    /// Reports the order's state without applying the callback.
    ///
    /// Used for browser returns whose status the PSP did not sign. The outcome
    /// comes from what the acquirer notification already established.
    async fn observe(&self, confirmation: Confirmation) -> Result<ProcessConfirmationResult, CallbackError> {
        let order_id = confirmation.order_id;
        let order_status = self.payments.order_status(order_id).await?;
        let notified_success = self
            .confirmations
            .find_by_order(order_id)
            .await?
            .iter()
            .any(|c| c.origin == ConfirmationOrigin::Acquirer && c.is_success());

        tracing::info!(
            order_id = %order_id,
            reported_status = %confirmation.status,
            order_status = %order_status,
            notified_success,
            "Browser return observed; outcome taken from acquirer notification"
        );

        Ok(ProcessConfirmationResult {
            order_id,
            payment_succeeded: notified_success || order_status == OrderStatus::Completed,
            transition: PaymentTransition::Unchanged(order_status),
            order_status,
            duplicate: false,
        })
    }

    /// Audit failures are logged and never mask the rejection itself.
    async fn audit(&self, audit: CallbackAudit, remote_ip: Option<IpAddr>) {
        let audit = audit.with_remote_ip(remote_ip.map(|ip| ip.to_string()));
        if let Err(e) = self.confirmations.record_rejection(audit).await {
            tracing::error!(error = %e, "Failed to record rejected payment callback");
        }
    }
}

fn lowercase(parameters: &[(String, String)]) -> BTreeMap<String, String> {
    parameters
        .iter()
        .map(|(k, v)| (k.trim().to_lowercase(), v.clone()))
        .collect()
}
