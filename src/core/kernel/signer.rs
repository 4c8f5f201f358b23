use crate::core::config::Credentials;
use crate::core::errors::ExchangeError;
use crate::core::kernel::codec;
use std::collections::HashMap;

/// Header carrying the API key on every private call
pub const API_KEY_HEADER: &str = "X-MBX-APIKEY";

/// Result type for signing operations: (headers, signature)
pub type SignatureResult = Result<(HashMap<String, String>, String), ExchangeError>;

/// Signer trait for request authentication
///
/// Implementations receive the fully augmented, encoded query string and return the
/// headers to attach plus the signature to append as the final `signature` parameter.
pub trait Signer: Send + Sync {
    /// Sign an encoded query string (without leading '?')
    fn sign_request(&self, query_string: &str) -> SignatureResult;
}

/// HMAC-SHA256 signer keyed with the account secret
pub struct HmacSigner {
    credentials: Credentials,
}

impl HmacSigner {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }
}

impl std::fmt::Debug for HmacSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacSigner").finish_non_exhaustive()
    }
}

impl Signer for HmacSigner {
    fn sign_request(&self, query_string: &str) -> SignatureResult {
        let signature = codec::sign(query_string, self.credentials.secret_key())?;

        let mut headers = HashMap::new();
        headers.insert(
            API_KEY_HEADER.to_string(),
            self.credentials.api_key().to_string(),
        );
        headers.insert("Content-Type".to_string(), "application/json".to_string());

        Ok((headers, signature))
    }
}
