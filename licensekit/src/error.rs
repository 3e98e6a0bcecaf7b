//! Error types for license issuance and verification.

use thiserror::Error;

/// Licensing errors.
///
/// Messages never carry key material, signature bytes or raw envelope text.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// The entropy source failed while generating a key pair.
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    /// PEM/DER key material could not be parsed.
    #[error("invalid key material: {0}")]
    KeyParse(String),

    /// The record holds values the canonical encoding cannot represent.
    #[error("license record cannot be serialized: {0}")]
    Serialization(String),

    /// The signing operation failed.
    #[error("license signing failed: {0}")]
    Signing(String),

    /// Header, footer, delimiter or base64 segments are malformed.
    #[error("invalid license envelope: {0}")]
    EnvelopeFormat(String),

    /// The signature does not match the license contents and public key.
    #[error("license signature invalid")]
    SignatureInvalid,

    /// The signed payload is not a well-formed license record.
    #[error("invalid license record: {0}")]
    RecordFormat(String),

    /// The license was issued to a different customer.
    #[error("license is not issued to customer {expected:?}")]
    CustomerMismatch {
        /// The customer name the host application asked for.
        expected: String,
    },

    /// The license expiry instant has passed.
    #[error("license expired at {0}")]
    Expired(String),

    /// A license has already been installed in this context.
    #[error("a license is already installed")]
    AlreadyInstalled,
}

/// Copyable discriminant of [`LicenseError`] for programmatic matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    KeyGeneration,
    KeyParse,
    Serialization,
    Signing,
    EnvelopeFormat,
    SignatureInvalid,
    RecordFormat,
    CustomerMismatch,
    Expired,
    AlreadyInstalled,
}

impl LicenseError {
    /// Returns the kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::KeyGeneration(_) => ErrorKind::KeyGeneration,
            Self::KeyParse(_) => ErrorKind::KeyParse,
            Self::Serialization(_) => ErrorKind::Serialization,
            Self::Signing(_) => ErrorKind::Signing,
            Self::EnvelopeFormat(_) => ErrorKind::EnvelopeFormat,
            Self::SignatureInvalid => ErrorKind::SignatureInvalid,
            Self::RecordFormat(_) => ErrorKind::RecordFormat,
            Self::CustomerMismatch { .. } => ErrorKind::CustomerMismatch,
            Self::Expired(_) => ErrorKind::Expired,
            Self::AlreadyInstalled => ErrorKind::AlreadyInstalled,
        }
    }

    /// Returns true for failures raised while checking a presented license.
    #[must_use]
    pub fn is_verification_failure(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::EnvelopeFormat
                | ErrorKind::SignatureInvalid
                | ErrorKind::RecordFormat
                | ErrorKind::CustomerMismatch
                | ErrorKind::Expired
        )
    }
}

/// Result type for license operations.
pub type LicenseResult<T> = Result<T, LicenseError>;
