//! License issuance: canonical encoding, signing, packaging.

use tracing::{debug, info};

use crate::envelope::{DEFAULT_PRODUCT, LicenseEnvelope, check_product};
use crate::error::{LicenseError, LicenseResult};
use crate::keys::PrivateKey;
use crate::record::LicenseRecord;

/// Signs license records for one product under one issuer key.
///
/// The private key is only read while signing, so a single issuer can be
/// shared across threads.
#[derive(Debug, Clone)]
pub struct LicenseIssuer {
    product: String,
    signing_key: PrivateKey,
}

impl LicenseIssuer {
    /// Creates an issuer for the given product name.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::Serialization`] if the product name cannot be
    /// written into the envelope markers (`[A-Z0-9 _-]+`).
    pub fn new(product: impl Into<String>, signing_key: PrivateKey) -> LicenseResult<Self> {
        let product = product.into();
        check_product(&product).map_err(|_| {
            LicenseError::Serialization(format!(
                "product name {product:?} must match [A-Z0-9 _-]+"
            ))
        })?;
        Ok(Self {
            product,
            signing_key,
        })
    }

    /// Creates an issuer using [`DEFAULT_PRODUCT`].
    #[must_use]
    pub fn with_default_product(signing_key: PrivateKey) -> Self {
        Self {
            product: DEFAULT_PRODUCT.to_string(),
            signing_key,
        }
    }

    #[must_use]
    pub fn product(&self) -> &str {
        &self.product
    }

    /// Signs `record` and wraps it in an envelope.
    ///
    /// Ed25519 is deterministic, so the same record and key always produce
    /// the same envelope.
    ///
    /// # Errors
    ///
    /// Returns `Serialization` if the record cannot be canonically encoded and
    /// `Signing` if the signature operation fails.
    pub fn issue(&self, record: &LicenseRecord) -> LicenseResult<LicenseEnvelope> {
        let payload = record.to_canonical_bytes()?;
        debug!(bytes = payload.len(), "encoded license record");

        let signature = self.signing_key.sign(&payload)?;
        let envelope = LicenseEnvelope::new(self.product.clone(), payload, signature)?;

        info!(
            license_id = record.license_id(),
            customer_id = record.customer_id(),
            tier = %record.tier(),
            "issued license"
        );
        Ok(envelope)
    }

    /// Issues a license and renders the envelope text.
    ///
    /// # Errors
    ///
    /// See [`LicenseIssuer::issue`].
    pub fn issue_text(&self, record: &LicenseRecord) -> LicenseResult<String> {
        self.issue(record).map(|envelope| envelope.encode())
    }
}
