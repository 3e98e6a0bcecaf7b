//! Offline license keys signed with Ed25519.
//!
//! This crate handles:
//! - Issuer key pair generation and PEM interchange
//! - Canonical encoding of license records
//! - Signing records into a textual license envelope
//! - Verifying envelopes against a compiled-in public key
//! - A write-once context holding the license the host runs under
//!
//! # Design Principles
//!
//! - **Offline**: verification needs nothing but the envelope, the public
//!   key and a clock
//! - **Single issuer**: one key pair signs every license of a product
//! - **Pinned encoding**: the signed bytes follow a documented field order,
//!   see [`record`]
//! - **Distinct failures**: every rejection has its own [`ErrorKind`]
//!
//! # Example
//!
//! ```
//! use licensekit::{KeyPair, LicenseIssuer, LicenseRecord, LicenseVerifier};
//!
//! let keys = KeyPair::generate().unwrap();
//! let issuer = LicenseIssuer::new("ACME", keys.private_key().clone()).unwrap();
//! let record = LicenseRecord::builder("CUST-1", "Acme").tier("business").build();
//! let text = issuer.issue_text(&record).unwrap();
//!
//! let verifier = LicenseVerifier::new("ACME", keys.public_key().clone());
//! let verified = verifier.verify(&text, "Acme").unwrap();
//! assert_eq!(verified, record);
//! ```

mod context;
mod envelope;
mod error;
mod issuer;
mod keys;
pub mod record;
mod verifier;

pub use context::{InstalledLicense, LicenseContext};
pub use envelope::{DEFAULT_PRODUCT, LicenseEnvelope, SEGMENT_DELIMITER};
pub use error::{ErrorKind, LicenseError, LicenseResult};
pub use issuer::LicenseIssuer;
pub use keys::{KeyPair, PUBLIC_KEY_LENGTH, PrivateKey, PublicKey, SIGNATURE_LENGTH};
pub use record::{
    CANONICAL_FIELD_ORDER, ENCODING_VERSION, FeatureFlags, LicenseRecord, LicenseRecordBuilder,
    LicenseStatus, LicenseTier, NEVER_EXPIRES, features,
};
pub use verifier::{LicenseVerifier, VerificationStage};
