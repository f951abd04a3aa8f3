//! sentry-sourcemaps - publish a package's source maps to Sentry

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::style::Stylize;
use tracing_subscriber::EnvFilter;

use sourcemaps_cli::ui::TerminalReporter;
use sourcemaps_cli::{Cli, EXIT_INTERRUPTED, exit_code};
use sourcemaps_core::npmrc::NpmConfig;
use sourcemaps_core::{PublishError, PublishReport, Reporter, publish};

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr so stdout stays usable for --json.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    // Fatal errors are shown even under --json or --quiet.
    let fatal = TerminalReporter::new(true);

    tokio::select! {
        result = run(cli) => match result {
            Ok(code) => ExitCode::from(code),
            Err(e) => {
                // PublishError already names the step and embeds its cause.
                let msg = match e.downcast_ref::<PublishError>() {
                    Some(err) => err.to_string(),
                    None => format!("{e:#}"),
                };
                fatal.error(&msg);
                ExitCode::FAILURE
            }
        },
        _ = tokio::signal::ctrl_c() => {
            eprintln!("\n{}", "interrupted".yellow());
            ExitCode::from(EXIT_INTERRUPTED)
        }
    }
}

async fn run(cli: Cli) -> Result<u8> {
    let lenient = cli.lenient;
    let json = cli.json;
    let reporter = if json {
        TerminalReporter::silent()
    } else {
        TerminalReporter::new(cli.quiet)
    };

    let cwd = std::env::current_dir().context("cannot determine working directory")?;
    let npmrc = NpmConfig::load(&cwd);
    let config = cli.into_config(&npmrc).context("invalid package")?;

    let report = publish(&config, &reporter).await?;

    if json {
        let out = match &report {
            PublishReport::Uploaded(summary) => serde_json::to_string_pretty(summary)?,
            PublishReport::Planned(plan) => serde_json::to_string_pretty(plan)?,
        };
        println!("{out}");
    } else if let PublishReport::Planned(plan) = &report {
        reporter.info(&format!(
            "dry run: {} file(s) planned, {} unmappable, nothing sent",
            plan.targets.len(),
            plan.rejected.len()
        ));
    }

    Ok(exit_code(&report, lenient))
}
