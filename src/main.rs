//! openstack-auth-diag: report the OpenStack configuration and token in use,
//! then wait for SIGTERM.

use std::io;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use openstack_auth_diag::report::{self, Style};
use openstack_auth_diag::{auth, environ, lifecycle, token};

/// Verify OpenStack credentials without leaking secrets
#[derive(Parser)]
#[command(name = "openstack-auth-diag")]
#[command(about = "Report OS_* configuration and Keystone token details, then wait for SIGTERM", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, env = "OPENSTACK_AUTH_DIAG_VERBOSE")]
    verbose: bool,

    /// Print reports as single-line JSON
    #[arg(long)]
    compact: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let style = if cli.compact {
        Style::Compact
    } else {
        Style::Pretty
    };

    report::write_section(&mut io::stdout(), &environ::extract_os_environ(), style)?;

    let session = auth::authorize_from_env().await?;
    let detail = token::extract_auth_details(&session).await?;
    report::write_section(&mut io::stdout(), &detail, style)?;

    let controller = lifecycle::LifecycleController::install()?;
    println!("{}", report::SEPARATOR);
    println!("Waiting for SIGTERM...");
    controller.wait().await?;
    println!("Terminating...");

    Ok(())
}

/// Logs go to stderr so stdout carries only the reports.
fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "openstack_auth_diag=debug,warn"
    } else {
        "openstack_auth_diag=info,warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}
