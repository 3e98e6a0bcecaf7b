//! Command-line tooling for the license authority.
//!
//! Generates issuer key pairs, issues signed licenses, verifies license files
//! and prints the public key as a Rust constant for embedding in a verifier.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use clap::{Args, Parser, Subcommand};
use licensekit::{
    DEFAULT_PRODUCT, KeyPair, LicenseIssuer, LicenseRecord, LicenseVerifier, PrivateKey,
    PublicKey,
};
use serde::Deserialize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "licensekit")]
#[command(about = "Issue and verify offline license keys")]
pub struct Cli {
    /// Enable verbose debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate a new issuer key pair
    Keygen(KeygenArgs),
    /// Sign a license for a customer
    Issue(IssueArgs),
    /// Verify a license file
    Verify(VerifyArgs),
    /// Print the public key as a Rust constant
    Embed(EmbedArgs),
}

#[derive(Args, Debug)]
pub struct KeygenArgs {
    /// Private key output path (PKCS#8 PEM)
    #[arg(long = "privkey", default_value = "private.pem")]
    pub private_key: PathBuf,

    /// Public key output path (SPKI PEM)
    #[arg(long = "pubkey", default_value = "public.pem")]
    pub public_key: PathBuf,

    /// Overwrite existing key files
    #[arg(long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct IssueArgs {
    /// Private key path
    #[arg(long = "privkey", default_value = "private.pem")]
    pub private_key: PathBuf,

    /// Customer name to embed (must match at verification)
    #[arg(short, long)]
    pub customer: String,

    /// Customer identifier
    #[arg(long, default_value = "")]
    pub customer_id: String,

    /// License identifier (random if omitted)
    #[arg(long)]
    pub license_id: Option<String>,

    /// Entitlement tier
    #[arg(long, default_value = "business")]
    pub tier: String,

    /// Days until expiry (never expires if omitted)
    #[arg(long)]
    pub expires_in_days: Option<i64>,

    /// Enabled feature flag (repeatable)
    #[arg(long = "feature")]
    pub features: Vec<String>,

    /// Mark as an evaluation license
    #[arg(long)]
    pub trial: bool,

    /// Product name used in the envelope markers
    #[arg(long)]
    pub product: Option<String>,

    /// Issuer profile (TOML)
    #[arg(long)]
    pub profile: Option<PathBuf>,

    /// License output path
    #[arg(short, long, default_value = "license.key")]
    pub output: PathBuf,
}

#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Public key path
    #[arg(long = "pubkey", default_value = "public.pem")]
    pub public_key: PathBuf,

    /// License file path
    #[arg(short, long, default_value = "license.key")]
    pub license: PathBuf,

    /// Customer name the license must be issued to
    #[arg(short, long)]
    pub customer: String,

    /// Product name expected in the envelope markers
    #[arg(long, default_value = DEFAULT_PRODUCT)]
    pub product: String,
}

#[derive(Args, Debug)]
pub struct EmbedArgs {
    /// Public key path
    #[arg(long = "pubkey", default_value = "public.pem")]
    pub public_key: PathBuf,

    /// Name of the generated constant
    #[arg(long, default_value = "LICENSE_PUBLIC_KEY_PEM")]
    pub name: String,

    /// Print the SPKI DER as hex instead of a Rust constant
    #[arg(long)]
    pub hex: bool,
}

/// Issuer defaults loaded from a TOML file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IssuerProfile {
    pub product: Option<String>,
    pub created_by: String,
    pub creator_name: String,
    pub creator_email: String,
}

impl IssuerProfile {
    /// Reads a profile from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read profile {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid profile {}", path.display()))
    }

    /// Parses profile TOML.
    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

/// Log filter: non-empty `directives` (from `RUST_LOG`) when they parse, otherwise
/// INFO, or DEBUG with `--verbose`.
#[must_use]
pub fn log_filter(verbose: bool, directives: Option<&str>) -> EnvFilter {
    let default_level = if verbose { "debug" } else { "info" };
    directives
        .filter(|d| !d.trim().is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(default_level))
}

/// Runs a parsed command line.
pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Keygen(args) => {
            generate_keys(&args)?;
            println!("Keys generated!");
            println!("  Private: {}", args.private_key.display());
            println!("  Public:  {}", args.public_key.display());
        }
        Command::Issue(args) => {
            let text = issue_license(&args)?;
            println!("License generated!");
            println!("  File:     {}", args.output.display());
            println!("  Customer: {}", args.customer);
            println!("\n{text}");
        }
        Command::Verify(args) => {
            let record = verify_license(&args)?;
            println!("License valid.");
            println!("{record}");
        }
        Command::Embed(args) => {
            print!("{}", embed_public_key(&args)?);
        }
    }
    Ok(())
}

/// Generates a key pair and writes both PEM files.
pub fn generate_keys(args: &KeygenArgs) -> Result<KeyPair> {
    for path in [&args.private_key, &args.public_key] {
        if path.exists() && !args.force {
            anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
        }
    }

    let keys = KeyPair::generate().context("Failed to generate key pair")?;
    write_secret(&args.private_key, keys.export_private()?.as_bytes())
        .context("Failed to write private key")?;
    fs::write(&args.public_key, keys.export_public()?).context("Failed to write public key")?;
    info!(
        private = %args.private_key.display(),
        public = %args.public_key.display(),
        "generated issuer key pair"
    );
    Ok(keys)
}

/// Builds, signs and writes a license; returns the envelope text.
pub fn issue_license(args: &IssueArgs) -> Result<String> {
    let profile = match &args.profile {
        Some(path) => IssuerProfile::load(path)?,
        None => IssuerProfile::default(),
    };
    let product = args
        .product
        .clone()
        .or(profile.product.clone())
        .unwrap_or_else(|| DEFAULT_PRODUCT.to_string());

    let pem = fs::read(&args.private_key).with_context(|| {
        format!("Failed to read private key {}", args.private_key.display())
    })?;
    let signing_key = PrivateKey::from_pem_bytes(&pem).context("Failed to load private key")?;

    let record = build_record(args, &profile)?;
    debug!(license_id = record.license_id(), %product, "issuing license");

    let text = LicenseIssuer::new(product, signing_key)
        .context("Invalid product name")?
        .issue_text(&record)
        .context("Failed to issue license")?;
    fs::write(&args.output, &text)
        .with_context(|| format!("Failed to write license {}", args.output.display()))?;
    Ok(text)
}

fn build_record(args: &IssueArgs, profile: &IssuerProfile) -> Result<LicenseRecord> {
    let created_at = Utc::now();
    let mut builder = LicenseRecord::builder(args.customer_id.clone(), args.customer.clone())
        .created_at(created_at)
        .tier(args.tier.as_str())
        .trial(args.trial)
        .created_by(profile.created_by.clone())
        .creator_name(profile.creator_name.clone())
        .creator_email(profile.creator_email.clone());
    if let Some(id) = &args.license_id {
        builder = builder.license_id(id.clone());
    }
    if let Some(days) = args.expires_in_days {
        let expires_at = Duration::try_days(days)
            .and_then(|validity| created_at.checked_add_signed(validity))
            .with_context(|| format!("--expires-in-days {days} is out of range"))?;
        builder = builder.expires_at(expires_at);
    }
    for feature in &args.features {
        builder = builder.feature(feature.clone(), true);
    }
    Ok(builder.build())
}

/// Verifies a license file against a public key file.
pub fn verify_license(args: &VerifyArgs) -> Result<LicenseRecord> {
    let pem = fs::read(&args.public_key)
        .with_context(|| format!("Failed to read public key {}", args.public_key.display()))?;
    let public_key = PublicKey::from_pem_bytes(&pem).context("Failed to load public key")?;
    let text = fs::read(&args.license)
        .with_context(|| format!("Failed to read license {}", args.license.display()))?;

    let record = LicenseVerifier::new(args.product.clone(), public_key)
        .verify(&text, &args.customer)
        .context("License verification failed")?;
    Ok(record)
}

/// Renders the public key file as a Rust constant, or as SPKI DER hex.
pub fn embed_public_key(args: &EmbedArgs) -> Result<String> {
    let pem = fs::read(&args.public_key)
        .with_context(|| format!("Failed to read public key {}", args.public_key.display()))?;
    let public_key = PublicKey::from_pem_bytes(&pem).context("Failed to load public key")?;
    if args.hex {
        return Ok(format!("{}\n", public_key.to_der_hex()?));
    }
    Ok(public_key.to_rust_const(&args.name)?)
}

#[cfg(unix)]
fn write_secret(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(contents)
}

#[cfg(not(unix))]
fn write_secret(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    fs::write(path, contents)
}
