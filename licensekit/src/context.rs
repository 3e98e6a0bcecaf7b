//! Write-once holder for the license a host application runs under.
//!
//! Populate it once on the startup path, then share it (`&LicenseContext` or
//! `Arc<LicenseContext>`) with any number of readers; reads take no lock.

use chrono::{DateTime, Utc};
use std::sync::OnceLock;
use tracing::info;

use crate::error::{LicenseError, LicenseResult};
use crate::record::{LicenseRecord, LicenseStatus};
use crate::verifier::LicenseVerifier;

/// A validated license together with when it was validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledLicense {
    record: LicenseRecord,
    verified_at: DateTime<Utc>,
}

impl InstalledLicense {
    #[must_use]
    pub fn record(&self) -> &LicenseRecord {
        &self.record
    }

    #[must_use]
    pub fn verified_at(&self) -> DateTime<Utc> {
        self.verified_at
    }
}

/// Verifier plus the installed license, if any.
#[derive(Debug)]
pub struct LicenseContext {
    verifier: LicenseVerifier,
    installed: OnceLock<InstalledLicense>,
}

impl LicenseContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new(verifier: LicenseVerifier) -> Self {
        Self {
            verifier,
            installed: OnceLock::new(),
        }
    }

    #[must_use]
    pub fn verifier(&self) -> &LicenseVerifier {
        &self.verifier
    }

    /// Verifies `envelope` and installs it.
    ///
    /// # Errors
    ///
    /// Any verification error, or [`LicenseError::AlreadyInstalled`] if a
    /// license was installed earlier.
    pub fn set_license_key(&self, envelope: &str, expected_customer: &str) -> LicenseResult<()> {
        self.set_license_key_at(envelope, expected_customer, Utc::now())
    }

    /// Like [`LicenseContext::set_license_key`], verifying as of `now`.
    ///
    /// # Errors
    ///
    /// See [`LicenseContext::set_license_key`].
    pub fn set_license_key_at(
        &self,
        envelope: &str,
        expected_customer: &str,
        now: DateTime<Utc>,
    ) -> LicenseResult<()> {
        if self.installed.get().is_some() {
            return Err(LicenseError::AlreadyInstalled);
        }
        let record = self.verifier.verify_at(envelope, expected_customer, now)?;
        let license_id = record.license_id().to_string();
        self.installed
            .set(InstalledLicense {
                record,
                verified_at: now,
            })
            .map_err(|_| LicenseError::AlreadyInstalled)?;
        info!(license_id = %license_id, "license installed");
        Ok(())
    }

    /// Returns the installed record, if any.
    #[must_use]
    pub fn get_license_key(&self) -> Option<&LicenseRecord> {
        self.installed.get().map(InstalledLicense::record)
    }

    /// Returns the installed license with its verification time.
    #[must_use]
    pub fn installed(&self) -> Option<&InstalledLicense> {
        self.installed.get()
    }

    /// True if a license is installed and not expired now.
    #[must_use]
    pub fn is_licensed(&self) -> bool {
        self.is_licensed_at(Utc::now())
    }

    /// True if a license is installed and not expired at `now`.
    #[must_use]
    pub fn is_licensed_at(&self, now: DateTime<Utc>) -> bool {
        self.status_at(now).is_some_and(|s| s.is_usable())
    }

    /// Status of the installed license at `now`, or `None` if unlicensed.
    #[must_use]
    pub fn status_at(&self, now: DateTime<Utc>) -> Option<LicenseStatus> {
        self.get_license_key()
            .map(|record| record.status_at(now.timestamp()))
    }

    /// True if licensed now and the named feature is enabled.
    #[must_use]
    pub fn has_feature(&self, name: &str) -> bool {
        self.is_licensed() && self.get_license_key().is_some_and(|r| r.has_feature(name))
    }

    /// Human-readable summary of the installed license.
    #[must_use]
    pub fn summary(&self) -> Option<String> {
        self.get_license_key().map(ToString::to_string)
    }
}
