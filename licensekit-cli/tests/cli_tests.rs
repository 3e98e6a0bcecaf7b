use std::fs;
use std::path::Path;

use clap::Parser;
use licensekit::{ErrorKind, LicenseError, LicenseTier};
use licensekit_cli::{
    Cli, Command, EmbedArgs, IssueArgs, IssuerProfile, KeygenArgs, VerifyArgs, embed_public_key,
    generate_keys, issue_license, log_filter, verify_license,
};
use tempfile::TempDir;

fn keygen(dir: &Path) -> KeygenArgs {
    KeygenArgs {
        private_key: dir.join("private.pem"),
        public_key: dir.join("public.pem"),
        force: false,
    }
}

fn issue_args(dir: &Path, customer: &str) -> IssueArgs {
    IssueArgs {
        private_key: dir.join("private.pem"),
        customer: customer.to_string(),
        customer_id: "CUST1234567890".to_string(),
        license_id: Some("1234567890ABCDEF".to_string()),
        tier: "business".to_string(),
        expires_in_days: None,
        features: vec!["unipdf".to_string(), "unioffice".to_string()],
        trial: false,
        product: Some("UNIDOC".to_string()),
        profile: None,
        output: dir.join("license.key"),
    }
}

fn verify_args(dir: &Path, customer: &str) -> VerifyArgs {
    VerifyArgs {
        public_key: dir.join("public.pem"),
        license: dir.join("license.key"),
        customer: customer.to_string(),
        product: "UNIDOC".to_string(),
    }
}

fn license_error(err: &anyhow::Error) -> Option<ErrorKind> {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<LicenseError>())
        .map(LicenseError::kind)
}

// ── Argument parsing ─────────────────────────────────────────────

#[test]
fn parse_keygen_defaults() {
    let cli = Cli::try_parse_from(["licensekit", "keygen"]).unwrap();
    match cli.command {
        Command::Keygen(args) => {
            assert_eq!(args.private_key, Path::new("private.pem"));
            assert_eq!(args.public_key, Path::new("public.pem"));
            assert!(!args.force);
        }
        other => panic!("expected keygen, got {other:?}"),
    }
}

#[test]
fn parse_issue_flags() {
    let cli = Cli::try_parse_from([
        "licensekit", "-v", "issue", "--customer", "Acme", "--feature", "unipdf", "--feature",
        "unihtml", "--expires-in-days", "30", "--trial",
    ])
    .unwrap();
    assert!(cli.verbose);
    match cli.command {
        Command::Issue(args) => {
            assert_eq!(args.customer, "Acme");
            assert_eq!(args.features, vec!["unipdf", "unihtml"]);
            assert_eq!(args.expires_in_days, Some(30));
            assert!(args.trial);
            assert_eq!(args.output, Path::new("license.key"));
        }
        other => panic!("expected issue, got {other:?}"),
    }
}

#[test]
fn verify_requires_customer() {
    assert!(Cli::try_parse_from(["licensekit", "verify"]).is_err());
}

// ── Profile ──────────────────────────────────────────────────────

#[test]
fn profile_parsing() {
    let profile = IssuerProfile::parse(
        r#"
        product = "UNIDOC"
        created_by = "license-generator"
        creator_name = "License Generator"
        creator_email = "admin@example.com"
        "#,
    )
    .unwrap();
    assert_eq!(profile.product.as_deref(), Some("UNIDOC"));
    assert_eq!(profile.creator_email, "admin@example.com");
}

#[test]
fn profile_rejects_unknown_keys() {
    assert!(IssuerProfile::parse("private_key = \"oops\"").is_err());
}

#[test]
fn empty_profile_is_default() {
    assert_eq!(IssuerProfile::parse("").unwrap(), IssuerProfile::default());
}

#[test]
fn log_filter_prefers_rust_log() {
    assert_eq!(log_filter(false, None).to_string(), "info");
    assert_eq!(log_filter(true, None).to_string(), "debug");
    assert_eq!(
        log_filter(false, Some("licensekit=trace")).to_string(),
        "licensekit=trace"
    );
    assert_eq!(log_filter(true, Some("licensekit=loud")).to_string(), "debug");
    assert_eq!(log_filter(false, Some("")).to_string(), "info");
}

// ── End to end ───────────────────────────────────────────────────

#[test]
fn keygen_issue_verify() {
    let dir = TempDir::new().unwrap();
    generate_keys(&keygen(dir.path())).unwrap();

    let text = issue_license(&issue_args(dir.path(), "TestCustomer")).unwrap();
    assert!(text.starts_with("-----BEGIN UNIDOC LICENSE KEY-----\n"));
    assert_eq!(fs::read_to_string(dir.path().join("license.key")).unwrap(), text);

    let record = verify_license(&verify_args(dir.path(), "TestCustomer")).unwrap();
    assert_eq!(record.customer_name(), "TestCustomer");
    assert_eq!(record.tier(), &LicenseTier::Business);
    assert!(record.has_feature("unipdf"));
    assert!(record.never_expires());
}

#[test]
fn verify_wrong_customer_fails() {
    let dir = TempDir::new().unwrap();
    generate_keys(&keygen(dir.path())).unwrap();
    issue_license(&issue_args(dir.path(), "TestCustomer")).unwrap();

    let err = verify_license(&verify_args(dir.path(), "Someone Else")).unwrap_err();
    assert_eq!(license_error(&err), Some(ErrorKind::CustomerMismatch));
}

#[test]
fn verify_with_other_key_fails() {
    let dir = TempDir::new().unwrap();
    let other = TempDir::new().unwrap();
    generate_keys(&keygen(dir.path())).unwrap();
    generate_keys(&keygen(other.path())).unwrap();
    issue_license(&issue_args(dir.path(), "Acme")).unwrap();

    let mut args = verify_args(dir.path(), "Acme");
    args.public_key = other.path().join("public.pem");
    let err = verify_license(&args).unwrap_err();
    assert_eq!(license_error(&err), Some(ErrorKind::SignatureInvalid));
}

#[test]
fn issue_uses_profile_defaults() {
    let dir = TempDir::new().unwrap();
    generate_keys(&keygen(dir.path())).unwrap();
    let profile = dir.path().join("issuer.toml");
    fs::write(
        &profile,
        "product = \"ACME\"\ncreated_by = \"ops\"\ncreator_email = \"ops@example.com\"\n",
    )
    .unwrap();

    let mut args = issue_args(dir.path(), "Acme");
    args.product = None;
    args.profile = Some(profile);
    let text = issue_license(&args).unwrap();
    assert!(text.starts_with("-----BEGIN ACME LICENSE KEY-----\n"));

    let mut verify = verify_args(dir.path(), "Acme");
    verify.product = "ACME".to_string();
    let record = verify_license(&verify).unwrap();
    assert_eq!(record.created_by(), "ops");
    assert_eq!(record.creator_email(), "ops@example.com");
}

#[test]
fn keygen_refuses_to_overwrite() {
    let dir = TempDir::new().unwrap();
    generate_keys(&keygen(dir.path())).unwrap();
    assert!(generate_keys(&keygen(dir.path())).is_err());

    let mut args = keygen(dir.path());
    args.force = true;
    assert!(generate_keys(&args).is_ok());
}

#[cfg(unix)]
#[test]
fn private_key_is_owner_only() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().unwrap();
    generate_keys(&keygen(dir.path())).unwrap();
    let mode = fs::metadata(dir.path().join("private.pem"))
        .unwrap()
        .permissions()
        .mode();
    assert_eq!(mode & 0o777, 0o600);
}

#[test]
fn missing_private_key_reports_path() {
    let dir = TempDir::new().unwrap();
    let err = issue_license(&issue_args(dir.path(), "Acme")).unwrap_err();
    assert!(err.to_string().contains("private.pem"));
}

#[test]
fn embed_prints_constant() {
    let dir = TempDir::new().unwrap();
    generate_keys(&keygen(dir.path())).unwrap();
    let snippet = embed_public_key(&EmbedArgs {
        public_key: dir.path().join("public.pem"),
        name: "PUBLIC_KEY".to_string(),
        hex: false,
    })
    .unwrap();
    assert!(snippet.contains("pub const PUBLIC_KEY: &str = \"-----BEGIN PUBLIC KEY-----"));
}

#[test]
fn embed_prints_der_hex() {
    let dir = TempDir::new().unwrap();
    let keys = generate_keys(&keygen(dir.path())).unwrap();
    let line = embed_public_key(&EmbedArgs {
        public_key: dir.path().join("public.pem"),
        name: "PUBLIC_KEY".to_string(),
        hex: true,
    })
    .unwrap();
    assert_eq!(line, format!("{}\n", keys.public_key().to_der_hex().unwrap()));
    assert!(line.starts_with("302a300506032b6570032100"));
}

#[test]
fn out_of_range_expiry_is_an_error() {
    let dir = TempDir::new().unwrap();
    generate_keys(&keygen(dir.path())).unwrap();
    for days in [i64::MAX, i64::MIN, 1_000_000_000_000] {
        let mut args = issue_args(dir.path(), "Acme");
        args.expires_in_days = Some(days);
        let err = issue_license(&args).unwrap_err();
        assert!(err.to_string().contains("out of range"), "{days}: {err:#}");
    }
    assert!(!dir.path().join("license.key").exists());
}

#[test]
fn expiry_in_days_is_applied() {
    let dir = TempDir::new().unwrap();
    generate_keys(&keygen(dir.path())).unwrap();
    let mut args = issue_args(dir.path(), "Acme");
    args.expires_in_days = Some(30);
    issue_license(&args).unwrap();

    let record = verify_license(&verify_args(dir.path(), "Acme")).unwrap();
    assert_eq!(
        record.expires_at_secs() - record.created_at_secs(),
        30 * 24 * 60 * 60
    );
}

#[test]
fn lowercase_product_is_rejected() {
    let dir = TempDir::new().unwrap();
    generate_keys(&keygen(dir.path())).unwrap();
    let mut args = issue_args(dir.path(), "Acme");
    args.product = Some("acme".to_string());
    let err = issue_license(&args).unwrap_err();
    assert_eq!(license_error(&err), Some(ErrorKind::Serialization));
}
