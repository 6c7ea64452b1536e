//! HMAC-SHA256 check for identity provider webhooks. The provider signs the
//! raw body with the shared secret and sends `X-Webhook-Signature: sha256=<hex>`.

use crate::shared::types::app::ApiError;

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";

#[derive(Clone)]
pub struct SignatureValidator {
    secret: String
}

impl SignatureValidator {
    pub fn new(secret: impl Into<String>) -> SignatureValidator {
        SignatureValidator { secret: secret.into() }
    }

    /// `verify_slice` compares in constant time
    pub fn verify(&self, payload: &[u8], signature_header: Option<&str>) -> Result<(), ApiError> {
        let invalid = || ApiError::Unauthenticated("Invalid webhook signature".to_string());

        let signature_hex = signature_header
            .and_then(|h| h.trim().strip_prefix("sha256="))
            .ok_or_else(invalid)?;
        let signature = hex::decode(signature_hex).map_err(|_| invalid())?;

        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| ApiError::Store(format!("webhook key: {e}")))?;
        mac.update(payload);
        mac.verify_slice(&signature).map_err(|_| {
            log::warn!("webhook signature verification failed");
            invalid()
        })
    }
}
