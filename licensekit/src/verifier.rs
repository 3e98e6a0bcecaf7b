//! License verification.
//!
//! Each call walks `Unparsed → Parsed → SignatureChecked → PolicyChecked`
//! and stops at the first failure. Nothing is trusted before the signature
//! check passes.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::envelope::{DEFAULT_PRODUCT, LicenseEnvelope};
use crate::error::{LicenseError, LicenseResult};
use crate::keys::PublicKey;
use crate::record::LicenseRecord;

/// Progress of a single verification call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationStage {
    Unparsed,
    Parsed,
    SignatureChecked,
    PolicyChecked,
}

/// Verifies license envelopes against a trusted public key.
#[derive(Debug, Clone)]
pub struct LicenseVerifier {
    product: String,
    public_key: PublicKey,
}

impl LicenseVerifier {
    /// Creates a verifier for the given product name.
    #[must_use]
    pub fn new(product: impl Into<String>, public_key: PublicKey) -> Self {
        Self {
            product: product.into(),
            public_key,
        }
    }

    /// Creates a verifier from a public key PEM compiled into the binary.
    ///
    /// Taking `&'static str` keeps the trusted key out of mutable files.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::KeyParse`] if the PEM is malformed.
    pub fn embedded(product: impl Into<String>, public_key_pem: &'static str) -> LicenseResult<Self> {
        Ok(Self::new(product, PublicKey::from_pem(public_key_pem)?))
    }

    /// Creates a verifier using [`DEFAULT_PRODUCT`].
    #[must_use]
    pub fn with_default_product(public_key: PublicKey) -> Self {
        Self::new(DEFAULT_PRODUCT, public_key)
    }

    #[must_use]
    pub fn product(&self) -> &str {
        &self.product
    }

    #[must_use]
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Verifies an envelope against the current time.
    ///
    /// # Errors
    ///
    /// See [`LicenseVerifier::verify_at`].
    pub fn verify(
        &self,
        envelope: impl AsRef<[u8]>,
        expected_customer: &str,
    ) -> LicenseResult<LicenseRecord> {
        self.verify_at(envelope, expected_customer, Utc::now())
    }

    /// Verifies an envelope as of `now`.
    ///
    /// # Errors
    ///
    /// - `EnvelopeFormat` if the text is not a well-formed envelope for this product
    /// - `SignatureInvalid` if the signature does not match
    /// - `RecordFormat` if the signed payload is not a canonical record
    /// - `CustomerMismatch` if the customer name differs (case-sensitive)
    /// - `Expired` if `expires_at` is set and not after `now`
    pub fn verify_at(
        &self,
        envelope: impl AsRef<[u8]>,
        expected_customer: &str,
        now: DateTime<Utc>,
    ) -> LicenseResult<LicenseRecord> {
        let mut stage = VerificationStage::Unparsed;
        let result = self.run(envelope.as_ref(), expected_customer, now, &mut stage);
        match &result {
            Ok(record) => debug!(license_id = record.license_id(), "license verified"),
            Err(e) => warn!(?stage, kind = ?e.kind(), "license rejected"),
        }
        result
    }

    fn run(
        &self,
        envelope: &[u8],
        expected_customer: &str,
        now: DateTime<Utc>,
        stage: &mut VerificationStage,
    ) -> LicenseResult<LicenseRecord> {
        let text = std::str::from_utf8(envelope)
            .map_err(|_| LicenseError::EnvelopeFormat("license text is not UTF-8".to_string()))?;
        let envelope = LicenseEnvelope::parse(text)?;
        if envelope.product() != self.product {
            return Err(LicenseError::EnvelopeFormat(format!(
                "license is for product {:?}, expected {:?}",
                envelope.product(),
                self.product
            )));
        }
        *stage = VerificationStage::Parsed;

        self.public_key
            .verify(envelope.payload(), envelope.signature())?;
        *stage = VerificationStage::SignatureChecked;

        let record = LicenseRecord::from_canonical_bytes(envelope.payload())?;
        check_policy(&record, expected_customer, now)?;
        *stage = VerificationStage::PolicyChecked;

        Ok(record)
    }
}

fn check_policy(
    record: &LicenseRecord,
    expected_customer: &str,
    now: DateTime<Utc>,
) -> LicenseResult<()> {
    if record.customer_name() != expected_customer {
        return Err(LicenseError::CustomerMismatch {
            expected: expected_customer.to_string(),
        });
    }
    if record.is_expired_at(now.timestamp()) {
        let at = record
            .expires_at()
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| record.expires_at_secs().to_string());
        return Err(LicenseError::Expired(at));
    }
    Ok(())
}
