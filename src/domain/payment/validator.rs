//! Inbound confirmation validation.
//!
//! Shared by the browser redirect and the server notification. The validator
//! is synchronous and side-effect free; persisting and applying the outcome
//! is the application layer's job.

use std::collections::BTreeMap;
use std::net::IpAddr;

use crate::domain::foundation::ValidationError;
use crate::domain::order::money;

use super::confirmation::{Confirmation, ConfirmationForm, ConfirmationOrigin};
use super::field_mapping::{CanonicalField, NormalizedParams};
use super::origin_filter::{OriginTrustFilter, UntrustedOrigin};
use super::session_token::SessionTokenIssuer;
use super::signature::{ShaSigner, SignableSet, SignaturePayload};

/// How confirmations prove they come from the PSP.
#[derive(Debug)]
pub enum InboundAuth {
    /// `SHASIGN` over the SHA-OUT signable set.
    Signature(ShaSigner),
    /// Echoed session token bound to order, amount and currency.
    SessionToken(SessionTokenIssuer),
}

/// Where a callback came from.
#[derive(Debug, Clone, Copy)]
pub struct CallbackSource<'a> {
    pub origin: ConfirmationOrigin,
    pub remote_ip: Option<IpAddr>,
    pub forwarded_for: Option<&'a str>,
}

/// Result of validating one callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// Verified, and the PSP reports a successful payment.
    Accepted(Confirmation),
    /// Verified, and the PSP reports a decline.
    Declined(Confirmation),
    /// Required fields missing or mistyped.
    Malformed { reason: String },
    /// Well-formed but failed verification.
    Suspicious {
        reason: String,
        parameters: BTreeMap<String, String>,
    },
    /// Notification sender not on the allow-list.
    UntrustedOrigin(UntrustedOrigin),
}

impl ValidationOutcome {
    /// Short label for logs and the audit trail.
    pub fn kind(&self) -> &'static str {
        match self {
            ValidationOutcome::Accepted(_) => "accepted",
            ValidationOutcome::Declined(_) => "declined",
            ValidationOutcome::Malformed { .. } => "malformed",
            ValidationOutcome::Suspicious { .. } => "suspicious",
            ValidationOutcome::UntrustedOrigin(_) => "untrusted_origin",
        }
    }
}

/// Validates inbound confirmations.
#[derive(Debug)]
pub struct ConfirmationValidator {
    auth: InboundAuth,
    origin_filter: Option<OriginTrustFilter>,
}

impl ConfirmationValidator {
    /// `origin_filter` is applied to acquirer notifications when present.
    pub fn new(auth: InboundAuth, origin_filter: Option<OriginTrustFilter>) -> Self {
        Self {
            auth,
            origin_filter,
        }
    }

    /// Validates a callback.
    ///
    /// Steps, each short-circuiting:
    ///
    /// 1. origin filter (notifications only, when configured)
    /// 2. alias resolution and structural checks
    /// 3. signature or session token over the received parameters
    /// 4. status code decides accepted vs declined
    pub fn validate(&self, raw: &[(String, String)], source: &CallbackSource<'_>) -> ValidationOutcome {
        if source.origin == ConfirmationOrigin::Acquirer {
            if let Some(filter) = &self.origin_filter {
                if let Err(untrusted) = filter.check(source.remote_ip, source.forwarded_for) {
                    return ValidationOutcome::UntrustedOrigin(untrusted);
                }
            }
        }

        let malformed = |e: ValidationError| ValidationOutcome::Malformed {
            reason: e.to_string(),
        };
        let params = match NormalizedParams::from_raw(raw) {
            Ok(params) => params,
            Err(e) => return malformed(e),
        };
        let form = match ConfirmationForm::parse(&params) {
            Ok(form) => form,
            Err(e) => return malformed(e),
        };

        let parameters = parameter_dump(raw);

        if let Err(reason) = self.authenticate(raw, &params, &form) {
            return ValidationOutcome::Suspicious {
                reason: reason.to_string(),
                parameters,
            };
        }

        let success = form.status.is_success();
        let confirmation = Confirmation::from_form(form, source.origin, parameters);
        if success {
            ValidationOutcome::Accepted(confirmation)
        } else {
            ValidationOutcome::Declined(confirmation)
        }
    }

    /// True when a verified callback vouches for its own status code.
    ///
    /// Session tokens bind order, amount and currency only, so in that mode a
    /// browser redirect cannot be trusted to report the outcome.
    pub fn authenticates_status(&self) -> bool {
        matches!(self.auth, InboundAuth::Signature(_))
    }

    fn authenticate(
        &self,
        raw: &[(String, String)],
        params: &NormalizedParams,
        form: &ConfirmationForm,
    ) -> Result<(), &'static str> {
        match &self.auth {
            InboundAuth::Signature(signer) => {
                let received = form.signature.as_deref().ok_or("signature missing")?;
                if let Some(field) = unsigned_decisive_field(params, signer.signable()) {
                    tracing::debug!(field = field.as_str(), "Decisive field arrived under an unsigned name");
                    return Err("decisive field not covered by signature");
                }
                let payload: SignaturePayload = raw.iter().map(|(k, v)| (k, v)).collect();
                if signer.verify(&payload, received) {
                    Ok(())
                } else {
                    Err("signature mismatch")
                }
            }
            InboundAuth::SessionToken(issuer) => {
                let token = form.session_token.as_deref().ok_or("session token missing")?;
                let amount = money::to_minor_units(form.amount).map_err(|_| "amount out of range")?;
                let currency = form.currency.as_deref().unwrap_or_default();
                if issuer.verify(form.order_id, amount, currency, token) {
                    Ok(())
                } else {
                    Err("session token mismatch")
                }
            }
        }
    }
}

/// Fields that decide how a confirmation is applied.
const DECISIVE_FIELDS: [CanonicalField; 5] = [
    CanonicalField::Order,
    CanonicalField::Status,
    CanonicalField::Amount,
    CanonicalField::Currency,
    CanonicalField::TransactionId,
];

/// First present decisive field whose value no signed name carried.
fn unsigned_decisive_field(params: &NormalizedParams, signable: &SignableSet) -> Option<CanonicalField> {
    DECISIVE_FIELDS.into_iter().find(|field| {
        params.get(*field).is_some()
            && !params
                .provided_by(*field)
                .iter()
                .any(|name| signable.contains(&name.to_uppercase()))
    })
}

/// All received parameters with lowercased names; later duplicates win.
fn parameter_dump(raw: &[(String, String)]) -> BTreeMap<String, String> {
    raw.iter()
        .map(|(k, v)| (k.trim().to_lowercase(), v.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::OrderId;
    use crate::domain::payment::signature::{ShaAlgorithm, SignableSet};
    use secrecy::SecretString;

    const SHA_OUT: &str = "sha-out-secret";
    const PSP_IP: &str = "212.23.45.96";

    fn signer() -> ShaSigner {
        ShaSigner::new(
            SignableSet::sha_out(),
            SecretString::new(SHA_OUT.to_string()),
            ShaAlgorithm::Sha1,
        )
    }

    fn filter() -> OriginTrustFilter {
        OriginTrustFilter::new(vec![], vec![PSP_IP.parse().unwrap()])
    }

    fn validator() -> ConfirmationValidator {
        ConfirmationValidator::new(InboundAuth::Signature(signer()), Some(filter()))
    }

    fn direct() -> CallbackSource<'static> {
        CallbackSource {
            origin: ConfirmationOrigin::Direct,
            remote_ip: Some("203.0.113.50".parse().unwrap()),
            forwarded_for: None,
        }
    }

    fn acquirer(ip: &str) -> CallbackSource<'static> {
        CallbackSource {
            origin: ConfirmationOrigin::Acquirer,
            remote_ip: Some(ip.parse().unwrap()),
            forwarded_for: None,
        }
    }

    fn signed(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        let mut raw: Vec<(String, String)> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let payload: SignaturePayload = raw.iter().map(|(k, v)| (k, v)).collect();
        raw.push(("SHASIGN".to_string(), signer().sign(&payload)));
        raw
    }

    fn redirect(status: &str) -> Vec<(String, String)> {
        signed(&[
            ("orderID", "1001"),
            ("currency", "EUR"),
            ("amount", "1.23"),
            ("PM", "CreditCard"),
            ("ACCEPTANCE", "test123"),
            ("STATUS", status),
            ("CARDNO", "XXXXXXXXXXXX1111"),
            ("PAYID", "3014"),
            ("NCERROR", "0"),
            ("BRAND", "VISA"),
        ])
    }

    // ══════════════════════════════════════════════════════════════
    // Outcomes
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn signed_success_is_accepted() {
        let outcome = validator().validate(&redirect("5"), &direct());

        let ValidationOutcome::Accepted(confirmation) = outcome else {
            panic!("expected accepted");
        };
        assert_eq!(confirmation.order_id, OrderId::new(1001).unwrap());
        assert_eq!(confirmation.origin, ConfirmationOrigin::Direct);
        assert_eq!(confirmation.transaction_id.as_deref(), Some("3014"));
        assert_eq!(confirmation.parameters.get("cardno").map(String::as_str), Some("XXXXXXXXXXXX1111"));
    }

    #[test]
    fn signed_decline_is_declined() {
        let outcome = validator().validate(&redirect("2"), &direct());
        assert!(matches!(outcome, ValidationOutcome::Declined(_)));
    }

    #[test]
    fn tampered_status_is_suspicious() {
        let mut raw = redirect("2");
        for (name, value) in raw.iter_mut() {
            if name == "STATUS" {
                *value = "5".to_string();
            }
        }

        let outcome = validator().validate(&raw, &direct());

        let ValidationOutcome::Suspicious { reason, parameters } = outcome else {
            panic!("expected suspicious");
        };
        assert_eq!(reason, "signature mismatch");
        assert_eq!(parameters.get("status").map(String::as_str), Some("5"));
    }

    #[test]
    fn unsigned_callback_is_suspicious() {
        let raw: Vec<(String, String)> = redirect("5")
            .into_iter()
            .filter(|(k, _)| k != "SHASIGN")
            .collect();

        let outcome = validator().validate(&raw, &direct());

        assert_eq!(outcome.kind(), "suspicious");
    }

    #[test]
    fn unsigned_extra_parameter_does_not_break_signature() {
        let mut raw = redirect("9");
        raw.push(("COMPLUS".to_string(), "gift wrap".to_string()));

        assert_eq!(validator().validate(&raw, &direct()).kind(), "accepted");
    }

    #[test]
    fn missing_amount_is_malformed() {
        let raw = signed(&[("orderID", "1001"), ("STATUS", "5")]);
        assert_eq!(validator().validate(&raw, &direct()).kind(), "malformed");
    }

    #[test]
    fn conflicting_order_ids_are_malformed() {
        let raw = signed(&[("orderID", "1001"), ("shopper_id", "1002"), ("STATUS", "5"), ("amount", "1")]);
        assert_eq!(validator().validate(&raw, &direct()).kind(), "malformed");
    }

    #[test]
    fn unsigned_aliases_with_empty_string_digest_are_suspicious() {
        // SHA-1 of "": what a sender without the passphrase can compute.
        let raw: Vec<(String, String)> = [
            ("shopper_id", "1001"),
            ("ret_status", "SUCCESS"),
            ("trx_amount", "99999999"),
            ("SHASIGN", "DA39A3EE5E6B4B0D3255BFEF95601890AFD80709"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let outcome = validator().validate(&raw, &direct());

        let ValidationOutcome::Suspicious { reason, .. } = outcome else {
            panic!("expected suspicious, got {}", outcome.kind());
        };
        assert_eq!(reason, "decisive field not covered by signature");
    }

    #[test]
    fn status_under_unsigned_alias_is_suspicious_even_with_valid_signature() {
        let raw = signed(&[("orderID", "1001"), ("amount", "1.23"), ("ret_status", "9")]);
        assert_eq!(validator().validate(&raw, &direct()).kind(), "suspicious");
    }

    #[test]
    fn unsigned_alias_repeating_a_signed_value_is_accepted() {
        let raw = signed(&[("orderID", "1001"), ("shopper_id", "1001"), ("amount", "1.23"), ("STATUS", "9")]);
        assert_eq!(validator().validate(&raw, &direct()).kind(), "accepted");
    }

    #[test]
    fn only_signature_mode_authenticates_status() {
        assert!(validator().authenticates_status());
        assert!(!session_validator().authenticates_status());
    }

    // ══════════════════════════════════════════════════════════════
    // Origin Filter
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn notification_from_unknown_ip_is_rejected_before_signature_work() {
        // Even a well-signed payload is refused.
        let outcome = validator().validate(&redirect("9"), &acquirer("198.51.100.7"));
        assert!(matches!(outcome, ValidationOutcome::UntrustedOrigin(_)));
    }

    #[test]
    fn notification_from_allow_listed_ip_is_accepted() {
        let outcome = validator().validate(&redirect("9"), &acquirer(PSP_IP));
        let ValidationOutcome::Accepted(confirmation) = outcome else {
            panic!("expected accepted");
        };
        assert_eq!(confirmation.origin, ConfirmationOrigin::Acquirer);
    }

    #[test]
    fn redirects_skip_the_origin_filter() {
        assert_eq!(validator().validate(&redirect("5"), &direct()).kind(), "accepted");
    }

    #[test]
    fn origin_check_can_be_disabled() {
        let validator = ConfirmationValidator::new(InboundAuth::Signature(signer()), None);
        let outcome = validator.validate(&redirect("9"), &acquirer("198.51.100.7"));
        assert_eq!(outcome.kind(), "accepted");
    }

    // ══════════════════════════════════════════════════════════════
    // Session Token Mode
    // ══════════════════════════════════════════════════════════════

    fn session_validator() -> ConfirmationValidator {
        let issuer = SessionTokenIssuer::new(SecretString::new("sha-in-secret".to_string()));
        ConfirmationValidator::new(InboundAuth::SessionToken(issuer), None)
    }

    fn notification(token: &str) -> Vec<(String, String)> {
        [
            ("shopper_id", "1001"),
            ("ret_status", "SUCCESS"),
            ("trx_amount", "123"),
            ("trx_currency", "EUR"),
            ("ret_trx_number", "1-99"),
            ("ipayment_session_id", token),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn matching_session_token_is_accepted() {
        let issuer = SessionTokenIssuer::new(SecretString::new("sha-in-secret".to_string()));
        let token = issuer.issue(OrderId::new(1001).unwrap(), 123, "EUR");

        let outcome = session_validator().validate(&notification(&token), &acquirer(PSP_IP));

        assert_eq!(outcome.kind(), "accepted");
    }

    #[test]
    fn token_for_another_amount_is_suspicious() {
        let issuer = SessionTokenIssuer::new(SecretString::new("sha-in-secret".to_string()));
        let token = issuer.issue(OrderId::new(1001).unwrap(), 1, "EUR");

        let outcome = session_validator().validate(&notification(&token), &acquirer(PSP_IP));

        assert_eq!(outcome.kind(), "suspicious");
    }
}
