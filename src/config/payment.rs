//! Payment provider configuration
//!
//! Merchant identity, SHA passphrases and the trust lists for the
//! notification channel. The domain objects the service needs are built
//! from here once at startup.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::net::IpAddr;

use super::error::ValidationError;
use super::server::Environment;
use crate::domain::payment::{
    ConfirmationValidator, InboundAuth, MerchantProfile, OriginTrustFilter, OutboundAuth,
    PaymentRequestBuilder, SessionTokenIssuer, ShaAlgorithm, ShaSigner, SignableSet,
};

/// Payment configuration (Viveum e-Commerce)
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    /// Merchant account id at the PSP
    pub pspid: String,

    /// Shop currency, ISO 4217
    #[serde(default = "default_currency")]
    pub currency: String,

    #[serde(default = "default_language")]
    pub language: String,

    /// Title shown on the hosted payment page
    #[serde(default)]
    pub title: Option<String>,

    /// Secret for outbound requests (and session tokens)
    pub sha_in_passphrase: SecretString,

    /// Secret for inbound confirmations
    pub sha_out_passphrase: SecretString,

    #[serde(default)]
    pub hash_algorithm: ShaAlgorithm,

    /// Order description template, `{order_id}` is substituted
    #[serde(default)]
    pub order_description: Option<String>,

    /// PSP form target
    #[serde(default = "default_order_standard_url")]
    pub order_standard_url: String,

    /// Public base URL of the shop, used for callback URLs
    pub site_base_url: String,

    /// Dynamic template for the hosted page, absolute or site-relative
    #[serde(default)]
    pub template_url: Option<String>,

    /// Comma-separated override of the SHA-IN parameter set
    #[serde(default)]
    pub sha_in_parameters: Option<String>,

    /// Comma-separated override of the SHA-OUT parameter set
    #[serde(default)]
    pub sha_out_parameters: Option<String>,

    /// Comma-separated IPs of our own reverse proxies
    #[serde(default)]
    pub reverse_proxies: String,

    /// Comma-separated IPs allowed to send notifications
    #[serde(default)]
    pub allowed_confirmers: String,

    #[serde(default = "default_check_originating_ip")]
    pub check_originating_ip: bool,

    /// Use SESSIONID tokens instead of SHASIGN
    #[serde(default)]
    pub use_session_id: bool,
}

impl PaymentConfig {
    pub fn reverse_proxies(&self) -> Result<Vec<IpAddr>, ValidationError> {
        parse_ip_list("payment.reverse_proxies", &self.reverse_proxies)
    }

    pub fn allowed_confirmers(&self) -> Result<Vec<IpAddr>, ValidationError> {
        parse_ip_list("payment.allowed_confirmers", &self.allowed_confirmers)
    }

    /// SHA-IN parameter set, the documented one unless overridden
    pub fn sha_in_set(&self) -> SignableSet {
        match &self.sha_in_parameters {
            Some(list) => SignableSet::new(list.split(',')),
            None => SignableSet::sha_in(),
        }
    }

    /// SHA-OUT parameter set, the documented one unless overridden
    pub fn sha_out_set(&self) -> SignableSet {
        match &self.sha_out_parameters {
            Some(list) => SignableSet::new(list.split(',')),
            None => SignableSet::sha_out(),
        }
    }

    pub fn merchant_profile(&self) -> MerchantProfile {
        MerchantProfile {
            pspid: self.pspid.clone(),
            currency: self.currency.to_ascii_uppercase(),
            language: self.language.clone(),
            title: self.title.clone(),
            order_description: self.order_description.clone(),
            template_url: self.template_url.clone(),
        }
    }

    /// Builder for the outbound checkout form
    pub fn request_builder(&self) -> PaymentRequestBuilder {
        let auth = if self.use_session_id {
            OutboundAuth::SessionToken(SessionTokenIssuer::new(self.sha_in_passphrase.clone()))
        } else {
            OutboundAuth::Signature(ShaSigner::new(
                self.sha_in_set(),
                self.sha_in_passphrase.clone(),
                self.hash_algorithm,
            ))
        };
        PaymentRequestBuilder::new(self.merchant_profile(), auth)
    }

    /// Validator for inbound confirmations
    ///
    /// Session tokens are keyed with the SHA-IN secret that issued them.
    pub fn confirmation_validator(&self) -> Result<ConfirmationValidator, ValidationError> {
        let auth = if self.use_session_id {
            InboundAuth::SessionToken(SessionTokenIssuer::new(self.sha_in_passphrase.clone()))
        } else {
            InboundAuth::Signature(ShaSigner::new(
                self.sha_out_set(),
                self.sha_out_passphrase.clone(),
                self.hash_algorithm,
            ))
        };
        let filter = if self.check_originating_ip {
            Some(OriginTrustFilter::new(
                self.reverse_proxies()?,
                self.allowed_confirmers()?,
            ))
        } else {
            None
        };
        Ok(ConfirmationValidator::new(auth, filter))
    }

    /// Validate payment configuration
    pub fn validate(&self, environment: &Environment) -> Result<(), ValidationError> {
        if self.pspid.trim().is_empty() {
            return Err(ValidationError::MissingRequired("PAYMENT__PSPID"));
        }
        if self.sha_in_passphrase.expose_secret().is_empty() {
            return Err(ValidationError::MissingRequired("PAYMENT__SHA_IN_PASSPHRASE"));
        }
        if self.sha_out_passphrase.expose_secret().is_empty() {
            return Err(ValidationError::MissingRequired("PAYMENT__SHA_OUT_PASSPHRASE"));
        }

        if self.currency.len() != 3 || !self.currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ValidationError::InvalidCurrency(self.currency.clone()));
        }

        check_url("payment.order_standard_url", &self.order_standard_url)?;
        check_url("payment.site_base_url", &self.site_base_url)?;
        if *environment == Environment::Production {
            if !self.order_standard_url.starts_with("https://") {
                return Err(ValidationError::MustBeHttps("payment.order_standard_url"));
            }
            if !self.site_base_url.starts_with("https://") {
                return Err(ValidationError::MustBeHttps("payment.site_base_url"));
            }
        }

        if self.sha_in_set().is_empty() {
            return Err(ValidationError::EmptySignableSet("payment.sha_in_parameters"));
        }
        if self.sha_out_set().is_empty() {
            return Err(ValidationError::EmptySignableSet("payment.sha_out_parameters"));
        }
        if !self.use_session_id {
            let sha_out = self.sha_out_set();
            if let Some(name) = ["ORDERID", "STATUS", "AMOUNT"]
                .into_iter()
                .find(|name| !sha_out.contains(name))
            {
                return Err(ValidationError::UnsignedConfirmationField(name));
            }
        }

        self.reverse_proxies()?;
        if self.check_originating_ip && self.allowed_confirmers()?.is_empty() {
            return Err(ValidationError::NoAllowedConfirmers);
        }

        Ok(())
    }
}

fn parse_ip_list(field: &'static str, raw: &str) -> Result<Vec<IpAddr>, ValidationError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse().map_err(|_| ValidationError::InvalidIpAddress {
                field,
                value: s.to_string(),
            })
        })
        .collect()
}

fn check_url(field: &'static str, url: &str) -> Result<(), ValidationError> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(ValidationError::InvalidUrl {
            field,
            value: url.to_string(),
        })
    }
}

fn default_currency() -> String {
    "EUR".to_string()
}

fn default_language() -> String {
    "en_US".to_string()
}

fn default_order_standard_url() -> String {
    "https://viveum.v-psp.com/ncol/test/orderstandard_UTF8.asp".to_string()
}

fn default_check_originating_ip() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payment::{CallbackSource, ConfirmationOrigin, ValidationOutcome};

    fn test_payment_config() -> PaymentConfig {
        PaymentConfig {
            pspid: "viveum-test".to_string(),
            currency: default_currency(),
            language: default_language(),
            title: None,
            sha_in_passphrase: SecretString::new("sha-in-secret".to_string()),
            sha_out_passphrase: SecretString::new("sha-out-secret".to_string()),
            hash_algorithm: ShaAlgorithm::Sha1,
            order_description: None,
            order_standard_url: default_order_standard_url(),
            site_base_url: "https://shop.example".to_string(),
            template_url: None,
            sha_in_parameters: None,
            sha_out_parameters: None,
            reverse_proxies: String::new(),
            allowed_confirmers: "212.23.45.96, 212.23.45.97".to_string(),
            check_originating_ip: true,
            use_session_id: false,
        }
    }

    // ══════════════════════════════════════════════════════════════════
    // Validation
    // ══════════════════════════════════════════════════════════════════

    #[test]
    fn test_valid_config() {
        assert!(test_payment_config().validate(&Environment::Production).is_ok());
    }

    #[test]
    fn test_missing_pspid() {
        let config = PaymentConfig {
            pspid: " ".to_string(),
            ..test_payment_config()
        };
        assert_eq!(
            config.validate(&Environment::Development),
            Err(ValidationError::MissingRequired("PAYMENT__PSPID"))
        );
    }

    #[test]
    fn test_empty_passphrase() {
        let config = PaymentConfig {
            sha_out_passphrase: SecretString::new(String::new()),
            ..test_payment_config()
        };
        assert_eq!(
            config.validate(&Environment::Development),
            Err(ValidationError::MissingRequired("PAYMENT__SHA_OUT_PASSPHRASE"))
        );
    }

    #[test]
    fn test_invalid_currency() {
        let config = PaymentConfig {
            currency: "EURO".to_string(),
            ..test_payment_config()
        };
        assert_eq!(
            config.validate(&Environment::Development),
            Err(ValidationError::InvalidCurrency("EURO".to_string()))
        );
    }

    #[test]
    fn test_production_requires_https() {
        let config = PaymentConfig {
            site_base_url: "http://shop.example".to_string(),
            ..test_payment_config()
        };
        assert!(config.validate(&Environment::Development).is_ok());
        assert_eq!(
            config.validate(&Environment::Production),
            Err(ValidationError::MustBeHttps("payment.site_base_url"))
        );
    }

    #[test]
    fn test_bad_ip_is_reported() {
        let config = PaymentConfig {
            reverse_proxies: "10.0.0.1, not-an-ip".to_string(),
            ..test_payment_config()
        };
        assert_eq!(
            config.validate(&Environment::Development),
            Err(ValidationError::InvalidIpAddress {
                field: "payment.reverse_proxies",
                value: "not-an-ip".to_string(),
            })
        );
    }

    #[test]
    fn test_origin_check_needs_confirmers() {
        let config = PaymentConfig {
            allowed_confirmers: String::new(),
            ..test_payment_config()
        };
        assert_eq!(
            config.validate(&Environment::Development),
            Err(ValidationError::NoAllowedConfirmers)
        );

        let unchecked = PaymentConfig {
            check_originating_ip: false,
            ..config
        };
        assert!(unchecked.validate(&Environment::Development).is_ok());
    }

    #[test]
    fn test_blank_parameter_override() {
        let config = PaymentConfig {
            sha_out_parameters: Some(" , ".to_string()),
            ..test_payment_config()
        };
        assert_eq!(
            config.validate(&Environment::Development),
            Err(ValidationError::EmptySignableSet("payment.sha_out_parameters"))
        );
    }

    #[test]
    fn test_sha_out_override_must_sign_status() {
        let config = PaymentConfig {
            sha_out_parameters: Some("ORDERID,AMOUNT,PAYID".to_string()),
            ..test_payment_config()
        };
        assert_eq!(
            config.validate(&Environment::Development),
            Err(ValidationError::UnsignedConfirmationField("STATUS"))
        );

        let session = PaymentConfig {
            use_session_id: true,
            ..config
        };
        assert!(session.validate(&Environment::Development).is_ok());
    }

    // ══════════════════════════════════════════════════════════════════
    // Factories
    // ══════════════════════════════════════════════════════════════════

    #[test]
    fn test_ip_lists_are_trimmed() {
        let config = test_payment_config();
        let ips = config.allowed_confirmers().unwrap();
        assert_eq!(ips.len(), 2);
        assert_eq!(ips[1].to_string(), "212.23.45.97");
        assert!(config.reverse_proxies().unwrap().is_empty());
    }

    #[test]
    fn test_parameter_override() {
        let config = PaymentConfig {
            sha_out_parameters: Some("orderid, status ,amount".to_string()),
            ..test_payment_config()
        };
        let set = config.sha_out_set();
        assert_eq!(set.len(), 3);
        assert!(set.contains("STATUS"));
        assert_eq!(config.sha_in_set(), SignableSet::sha_in());
    }

    #[test]
    fn test_merchant_profile_uppercases_currency() {
        let config = PaymentConfig {
            currency: "eur".to_string(),
            ..test_payment_config()
        };
        assert_eq!(config.merchant_profile().currency, "EUR");
    }

    #[test]
    fn test_validator_enforces_origin_check() {
        let validator = test_payment_config().confirmation_validator().unwrap();
        let raw = vec![("orderID".to_string(), "1".to_string())];
        let source = CallbackSource {
            origin: ConfirmationOrigin::Acquirer,
            remote_ip: Some("8.8.8.8".parse().unwrap()),
            forwarded_for: None,
        };

        let outcome = validator.validate(&raw, &source);

        assert!(matches!(outcome, ValidationOutcome::UntrustedOrigin(_)));
    }

    #[test]
    fn test_validator_without_origin_check() {
        let config = PaymentConfig {
            check_originating_ip: false,
            ..test_payment_config()
        };
        let validator = config.confirmation_validator().unwrap();
        let raw = vec![("orderID".to_string(), "1".to_string())];
        let source = CallbackSource {
            origin: ConfirmationOrigin::Acquirer,
            remote_ip: Some("8.8.8.8".parse().unwrap()),
            forwarded_for: None,
        };

        let outcome = validator.validate(&raw, &source);

        assert!(matches!(outcome, ValidationOutcome::Malformed { .. }));
    }
}
