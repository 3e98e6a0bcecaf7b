//! licensekit command-line tool
//!
//! Usage:
//!   licensekit keygen --privkey private.pem --pubkey public.pem
//!   licensekit issue --customer "Acme" --feature unipdf --output license.key
//!   licensekit verify --customer "Acme" --license license.key
//!   licensekit embed --pubkey public.pem
//!
//! `RUST_LOG` overrides the log level chosen by `--verbose`.
//! Exits non-zero with a message on stderr when any step fails.

use anyhow::Result;
use clap::Parser;
use licensekit_cli::{Cli, log_filter, run};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let directives = std::env::var("RUST_LOG").ok();
    FmtSubscriber::builder()
        .with_env_filter(log_filter(cli.verbose, directives.as_deref()))
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    run(cli)
}
