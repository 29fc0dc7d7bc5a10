//! Shop integration configuration

use serde::Deserialize;

use super::error::ValidationError;

/// Where the customer lands after the PSP round trip.
#[derive(Debug, Clone, Deserialize)]
pub struct ShopConfig {
    /// Thank-you page after a successful payment
    #[serde(default = "default_finished_url")]
    pub finished_url: String,

    /// Page shown after a declined or aborted payment
    #[serde(default = "default_cancel_url")]
    pub cancel_url: String,
}

impl ShopConfig {
    /// Validate shop configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, url) in [("shop.finished_url", &self.finished_url), ("shop.cancel_url", &self.cancel_url)] {
            let absolute = url.starts_with("http://") || url.starts_with("https://");
            if !absolute && !url.starts_with('/') {
                return Err(ValidationError::InvalidUrl {
                    field,
                    value: url.clone(),
                });
            }
        }
        Ok(())
    }
}

impl Default for ShopConfig {
    fn default() -> Self {
        Self {
            finished_url: default_finished_url(),
            cancel_url: default_cancel_url(),
        }
    }
}

fn default_finished_url() -> String {
    "/shop/checkout/thank-you/".to_string()
}

fn default_cancel_url() -> String {
    "/shop/checkout/cancelled/".to_string()
}
