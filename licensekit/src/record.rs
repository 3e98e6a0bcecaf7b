//! The license record and its canonical encoding.
//!
//! The canonical encoding is the exact byte string that gets signed, so it is
//! a compatibility contract with every deployed verifier:
//!
//! - compact JSON object, no insignificant whitespace
//! - keys in [`CANONICAL_FIELD_ORDER`], with feature flags emitted between
//!   `creator_email` and `trial` in ascending byte order of their names
//! - timestamps as decimal seconds since the Unix epoch, `expires_at == 0`
//!   meaning "never expires"
//!
//! Changing any of this requires bumping [`ENCODING_VERSION`] and shipping
//! updated verifiers in lockstep.

use chrono::{DateTime, Duration, Utc};
use serde::de::{self, Deserializer, Error as _, MapAccess, Visitor};
use serde::ser::{self, SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{LicenseError, LicenseResult};

/// Version of the canonical record encoding.
pub const ENCODING_VERSION: u32 = 1;

/// Fixed key order of the canonical encoding (feature flags go before `trial`).
pub const CANONICAL_FIELD_ORDER: [&str; 10] = [
    "license_id",
    "customer_id",
    "customer_name",
    "tier",
    "created_at",
    "expires_at",
    "created_by",
    "creator_name",
    "creator_email",
    "trial",
];

/// `expires_at` value for licenses that never expire.
pub const NEVER_EXPIRES: i64 = 0;

/// Well-known feature flag names.
pub mod features {
    /// PDF module.
    pub const PDF: &str = "unipdf";
    /// Office documents module.
    pub const OFFICE: &str = "unioffice";
    /// HTML module.
    pub const HTML: &str = "unihtml";
}

/// Entitlement level.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LicenseTier {
    /// Time-limited evaluation.
    Trial,
    /// Standard commercial license.
    Business,
    /// Enterprise license.
    Enterprise,
    /// Any other tier name, stored lowercase.
    Custom(String),
}

impl LicenseTier {
    /// Returns the wire name of the tier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Trial => "trial",
            Self::Business => "business",
            Self::Enterprise => "enterprise",
            Self::Custom(name) => name,
        }
    }

    /// Folds a hand-built `Custom` name into the form it decodes back to.
    #[must_use]
    pub fn normalized(self) -> Self {
        match self {
            Self::Custom(name) => Self::from(name),
            other => other,
        }
    }
}

impl From<String> for LicenseTier {
    fn from(name: String) -> Self {
        let name = name.to_lowercase();
        match name.as_str() {
            "trial" => Self::Trial,
            "business" => Self::Business,
            "enterprise" => Self::Enterprise,
            _ => Self::Custom(name),
        }
    }
}

impl From<&str> for LicenseTier {
    fn from(name: &str) -> Self {
        Self::from(name.to_string())
    }
}

impl From<LicenseTier> for String {
    fn from(tier: LicenseTier) -> Self {
        match tier {
            LicenseTier::Custom(name) => name,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for LicenseTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named boolean entitlements, kept in ascending name order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureFlags(BTreeMap<String, bool>);

impl FeatureFlags {
    /// Creates an empty flag set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a flag, returning the previous value.
    pub fn set(&mut self, name: impl Into<String>, enabled: bool) -> Option<bool> {
        self.0.insert(name.into(), enabled)
    }

    /// Returns true if the named flag is present and enabled.
    #[must_use]
    pub fn is_enabled(&self, name: &str) -> bool {
        self.0.get(name).copied().unwrap_or(false)
    }

    /// Iterates over the names of enabled flags.
    pub fn enabled(&self) -> impl Iterator<Item = &str> {
        self.0
            .iter()
            .filter(|(_, on)| **on)
            .map(|(name, _)| name.as_str())
    }

    /// Iterates over every flag in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.0.iter().map(|(name, on)| (name.as_str(), *on))
    }

    /// Number of flags, enabled or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if no flags are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Checks that a flag name is encodable and does not shadow a record field.
fn check_flag_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("feature flag name is empty".to_string());
    }
    if !name
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
    {
        return Err(format!("feature flag `{name}` must match [a-z0-9_]+"));
    }
    if CANONICAL_FIELD_ORDER.contains(&name) {
        return Err(format!("feature flag `{name}` collides with a record field"));
    }
    Ok(())
}

/// Lifecycle of a license relative to a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LicenseStatus {
    /// Licensed, full functionality.
    Active,
    /// Evaluation license that has not expired yet.
    Trial {
        /// Whole days left, or `None` if the trial never expires.
        days_remaining: Option<u32>,
    },
    /// Expiry instant has passed.
    Expired,
}

impl LicenseStatus {
    /// Returns true if the license allows use (Active or Trial).
    #[must_use]
    pub fn is_usable(&self) -> bool {
        matches!(self, Self::Active | Self::Trial { .. })
    }
}

/// A single license entitlement. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicenseRecord {
    license_id: String,
    customer_id: String,
    customer_name: String,
    tier: LicenseTier,
    created_at: i64,
    expires_at: i64,
    created_by: String,
    creator_name: String,
    creator_email: String,
    features: FeatureFlags,
    trial: bool,
}

impl LicenseRecord {
    /// Starts building a record for the given customer.
    #[must_use]
    pub fn builder(
        customer_id: impl Into<String>,
        customer_name: impl Into<String>,
    ) -> LicenseRecordBuilder {
        LicenseRecordBuilder::new(customer_id.into(), customer_name.into())
    }

    /// Encodes the record into the exact bytes that get signed.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::Serialization`] if a feature flag name is not
    /// encodable.
    pub fn to_canonical_bytes(&self) -> LicenseResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| LicenseError::Serialization(e.to_string()))
    }

    /// Decodes canonical bytes, rejecting anything that would not re-encode
    /// to the same bytes.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::RecordFormat`] on malformed or non-canonical input.
    pub fn from_canonical_bytes(bytes: &[u8]) -> LicenseResult<Self> {
        let record: Self = serde_json::from_slice(bytes)
            .map_err(|e| LicenseError::RecordFormat(e.to_string()))?;
        let reencoded = record
            .to_canonical_bytes()
            .map_err(|e| LicenseError::RecordFormat(e.to_string()))?;
        if reencoded != bytes {
            return Err(LicenseError::RecordFormat(
                "payload is not in canonical encoding".to_string(),
            ));
        }
        Ok(record)
    }

    #[must_use]
    pub fn license_id(&self) -> &str {
        &self.license_id
    }

    #[must_use]
    pub fn customer_id(&self) -> &str {
        &self.customer_id
    }

    #[must_use]
    pub fn customer_name(&self) -> &str {
        &self.customer_name
    }

    #[must_use]
    pub fn tier(&self) -> &LicenseTier {
        &self.tier
    }

    /// Issue instant in seconds since the epoch.
    #[must_use]
    pub fn created_at_secs(&self) -> i64 {
        self.created_at
    }

    /// Expiry instant in seconds since the epoch, [`NEVER_EXPIRES`] for perpetual.
    #[must_use]
    pub fn expires_at_secs(&self) -> i64 {
        self.expires_at
    }

    /// Issue instant, if representable.
    #[must_use]
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.created_at, 0)
    }

    /// Expiry instant, or `None` if the license never expires.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        if self.never_expires() {
            None
        } else {
            DateTime::from_timestamp(self.expires_at, 0)
        }
    }

    #[must_use]
    pub fn never_expires(&self) -> bool {
        self.expires_at == NEVER_EXPIRES
    }

    /// Returns true if the license is expired at `now` (seconds since epoch).
    #[must_use]
    pub fn is_expired_at(&self, now: i64) -> bool {
        !self.never_expires() && self.expires_at <= now
    }

    #[must_use]
    pub fn created_by(&self) -> &str {
        &self.created_by
    }

    #[must_use]
    pub fn creator_name(&self) -> &str {
        &self.creator_name
    }

    #[must_use]
    pub fn creator_email(&self) -> &str {
        &self.creator_email
    }

    #[must_use]
    pub fn features(&self) -> &FeatureFlags {
        &self.features
    }

    /// Returns true if the named feature is enabled.
    #[must_use]
    pub fn has_feature(&self, name: &str) -> bool {
        self.features.is_enabled(name)
    }

    #[must_use]
    pub fn is_trial(&self) -> bool {
        self.trial
    }

    /// Computes the status at `now` (seconds since epoch).
    #[must_use]
    pub fn status_at(&self, now: i64) -> LicenseStatus {
        if self.is_expired_at(now) {
            return LicenseStatus::Expired;
        }
        if !self.trial {
            return LicenseStatus::Active;
        }
        let days_remaining = (!self.never_expires()).then(|| {
            let days = self.expires_at.saturating_sub(now) / (24 * 60 * 60);
            u32::try_from(days).unwrap_or(u32::MAX)
        });
        LicenseStatus::Trial { days_remaining }
    }
}

impl fmt::Display for LicenseRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn instant(secs: i64) -> String {
            DateTime::from_timestamp(secs, 0)
                .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_else(|| secs.to_string())
        }

        writeln!(f, "License {} ({})", self.license_id, self.tier)?;
        writeln!(f, "  Customer: {} [{}]", self.customer_name, self.customer_id)?;
        writeln!(f, "  Issued:   {} by {}", instant(self.created_at), self.created_by)?;
        if self.never_expires() {
            writeln!(f, "  Expires:  never")?;
        } else {
            writeln!(f, "  Expires:  {}", instant(self.expires_at))?;
        }
        let enabled: Vec<&str> = self.features.enabled().collect();
        if enabled.is_empty() {
            writeln!(f, "  Features: none")?;
        } else {
            writeln!(f, "  Features: {}", enabled.join(", "))?;
        }
        write!(f, "  Trial:    {}", if self.trial { "yes" } else { "no" })
    }
}

impl Serialize for LicenseRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map =
            serializer.serialize_map(Some(CANONICAL_FIELD_ORDER.len() + self.features.len()))?;
        map.serialize_entry("license_id", &self.license_id)?;
        map.serialize_entry("customer_id", &self.customer_id)?;
        map.serialize_entry("customer_name", &self.customer_name)?;
        map.serialize_entry("tier", self.tier.as_str())?;
        map.serialize_entry("created_at", &self.created_at)?;
        map.serialize_entry("expires_at", &self.expires_at)?;
        map.serialize_entry("created_by", &self.created_by)?;
        map.serialize_entry("creator_name", &self.creator_name)?;
        map.serialize_entry("creator_email", &self.creator_email)?;
        for (name, enabled) in self.features.iter() {
            check_flag_name(name).map_err(<S::Error as ser::Error>::custom)?;
            map.serialize_entry(name, &enabled)?;
        }
        map.serialize_entry("trial", &self.trial)?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for LicenseRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(RecordVisitor)
    }
}

struct RecordVisitor;

fn fill<T, E: de::Error>(
    slot: &mut Option<T>,
    value: Result<T, E>,
    field: &'static str,
) -> Result<(), E> {
    if slot.replace(value?).is_some() {
        return Err(E::duplicate_field(field));
    }
    Ok(())
}

impl<'de> Visitor<'de> for RecordVisitor {
    type Value = LicenseRecord;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a license record object")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<LicenseRecord, A::Error> {
        let mut license_id: Option<String> = None;
        let mut customer_id: Option<String> = None;
        let mut customer_name: Option<String> = None;
        let mut tier: Option<String> = None;
        let mut created_at: Option<i64> = None;
        let mut expires_at: Option<i64> = None;
        let mut created_by: Option<String> = None;
        let mut creator_name: Option<String> = None;
        let mut creator_email: Option<String> = None;
        let mut trial: Option<bool> = None;
        let mut features = FeatureFlags::new();

        while let Some(key) = map.next_key::<String>()? {
            match key.as_str() {
                "license_id" => fill(&mut license_id, map.next_value(), "license_id")?,
                "customer_id" => fill(&mut customer_id, map.next_value(), "customer_id")?,
                "customer_name" => fill(&mut customer_name, map.next_value(), "customer_name")?,
                "tier" => fill(&mut tier, map.next_value(), "tier")?,
                "created_at" => fill(&mut created_at, map.next_value(), "created_at")?,
                "expires_at" => fill(&mut expires_at, map.next_value(), "expires_at")?,
                "created_by" => fill(&mut created_by, map.next_value(), "created_by")?,
                "creator_name" => fill(&mut creator_name, map.next_value(), "creator_name")?,
                "creator_email" => fill(&mut creator_email, map.next_value(), "creator_email")?,
                "trial" => fill(&mut trial, map.next_value(), "trial")?,
                _ => {
                    let enabled: bool = map.next_value()?;
                    if features.set(key.clone(), enabled).is_some() {
                        return Err(de::Error::custom(format!(
                            "duplicate feature flag `{key}`"
                        )));
                    }
                }
            }
        }

        Ok(LicenseRecord {
            license_id: license_id.ok_or_else(|| A::Error::missing_field("license_id"))?,
            customer_id: customer_id.ok_or_else(|| A::Error::missing_field("customer_id"))?,
            customer_name: customer_name
                .ok_or_else(|| A::Error::missing_field("customer_name"))?,
            tier: LicenseTier::from(tier.ok_or_else(|| A::Error::missing_field("tier"))?),
            created_at: created_at.ok_or_else(|| A::Error::missing_field("created_at"))?,
            expires_at: expires_at.ok_or_else(|| A::Error::missing_field("expires_at"))?,
            created_by: created_by.ok_or_else(|| A::Error::missing_field("created_by"))?,
            creator_name: creator_name.ok_or_else(|| A::Error::missing_field("creator_name"))?,
            creator_email: creator_email
                .ok_or_else(|| A::Error::missing_field("creator_email"))?,
            features,
            trial: trial.ok_or_else(|| A::Error::missing_field("trial"))?,
        })
    }
}

/// Builder for [`LicenseRecord`].
#[derive(Debug, Clone)]
pub struct LicenseRecordBuilder {
    record: LicenseRecord,
}

impl LicenseRecordBuilder {
    fn new(customer_id: String, customer_name: String) -> Self {
        Self {
            record: LicenseRecord {
                license_id: uuid::Uuid::new_v4().simple().to_string().to_uppercase(),
                customer_id,
                customer_name,
                tier: LicenseTier::Business,
                created_at: Utc::now().timestamp(),
                expires_at: NEVER_EXPIRES,
                created_by: String::new(),
                creator_name: String::new(),
                creator_email: String::new(),
                features: FeatureFlags::new(),
                trial: false,
            },
        }
    }

    #[must_use]
    pub fn license_id(mut self, id: impl Into<String>) -> Self {
        self.record.license_id = id.into();
        self
    }

    #[must_use]
    pub fn tier(mut self, tier: impl Into<LicenseTier>) -> Self {
        self.record.tier = tier.into().normalized();
        self
    }

    #[must_use]
    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.record.created_at = at.timestamp();
        self
    }

    #[must_use]
    pub fn created_at_secs(mut self, secs: i64) -> Self {
        self.record.created_at = secs;
        self
    }

    #[must_use]
    pub fn expires_at(mut self, at: DateTime<Utc>) -> Self {
        self.record.expires_at = at.timestamp();
        self
    }

    /// Sets the raw expiry; [`NEVER_EXPIRES`] means perpetual.
    #[must_use]
    pub fn expires_at_secs(mut self, secs: i64) -> Self {
        self.record.expires_at = secs;
        self
    }

    /// Expires `duration` after the creation instant.
    #[must_use]
    pub fn expires_after(mut self, duration: Duration) -> Self {
        self.record.expires_at = self.record.created_at.saturating_add(duration.num_seconds());
        self
    }

    #[must_use]
    pub fn never_expires(mut self) -> Self {
        self.record.expires_at = NEVER_EXPIRES;
        self
    }

    #[must_use]
    pub fn created_by(mut self, created_by: impl Into<String>) -> Self {
        self.record.created_by = created_by.into();
        self
    }

    #[must_use]
    pub fn creator_name(mut self, name: impl Into<String>) -> Self {
        self.record.creator_name = name.into();
        self
    }

    #[must_use]
    pub fn creator_email(mut self, email: impl Into<String>) -> Self {
        self.record.creator_email = email.into();
        self
    }

    #[must_use]
    pub fn feature(mut self, name: impl Into<String>, enabled: bool) -> Self {
        self.record.features.set(name, enabled);
        self
    }

    #[must_use]
    pub fn trial(mut self, trial: bool) -> Self {
        self.record.trial = trial;
        self
    }

    #[must_use]
    pub fn build(self) -> LicenseRecord {
        self.record
    }
}
