//! Payment domain module.
//!
//! Signed checkout requests to the PSP and validation of the confirmations it
//! sends back, over the customer redirect and the server notification.
//!
//! # Module Structure
//!
//! - `signature` - SHA-IN / SHA-OUT signing and verification
//! - `session_token` - HMAC session token, the alternative to `SHASIGN`
//! - `request_builder` - Outbound signed form fields
//! - `field_mapping` - Provider alias table for inbound parameters
//! - `confirmation` - Confirmation form schema and record
//! - `origin_filter` - Notification sender allow-list
//! - `validator` - Inbound confirmation validation
//! - `errors` - Payment and callback errors

pub mod confirmation;
pub mod errors;
pub mod field_mapping;
pub mod origin_filter;
pub mod request_builder;
pub mod session_token;
pub mod signature;
pub mod validator;

pub use confirmation::{Confirmation, ConfirmationForm, ConfirmationOrigin, PspStatus};
pub use errors::{CallbackError, PaymentError};
pub use field_mapping::{CanonicalField, NormalizedParams, FIELD_ALIASES};
pub use origin_filter::{OriginTrustFilter, UntrustedOrigin};
pub use request_builder::{
    CallbackUrls, MerchantProfile, OutboundAuth, PaymentRequestBuilder, SignedFormFields,
    CALLBACK_PATH,
};
pub use session_token::SessionTokenIssuer;
pub use signature::{ShaAlgorithm, ShaSigner, SignableSet, SignaturePayload};
pub use validator::{CallbackSource, ConfirmationValidator, InboundAuth, ValidationOutcome};
