mod calculator;
mod domain;
mod error;
mod formulas;
mod mailer;
mod server;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use crate::calculator::CalculatorState;
use crate::domain::{Estimate, format_kg};
use crate::mailer::{HttpEmailSender, MailerConfig};
use crate::server::AppState;

/// One-rep-max calculator with percentage and hypertrophy tables.
#[derive(Parser, Debug)]
#[command(name = "onerm")]
#[command(about = "Estimate a one-rep max and the training loads derived from it")]
#[command(version)]
struct Args {
    /// Port number for the web server.
    /// Can also be set via ONERM_PORT environment variable.
    #[arg(long, value_name = "PORT", env = "ONERM_PORT", default_value = "8080")]
    port: u16,

    /// URL the email payload is posted to.
    /// Can also be set via ONERM_MAIL_ENDPOINT environment variable.
    #[arg(long, value_name = "URL", env = "ONERM_MAIL_ENDPOINT")]
    mail_endpoint: Option<String>,

    /// Timeout in seconds for the mail request.
    #[arg(
        long,
        value_name = "SECS",
        env = "ONERM_MAIL_TIMEOUT_SECS",
        default_value = "10"
    )]
    mail_timeout: u64,

    /// Directory with the frontend files.
    /// Can also be set via ONERM_STATIC_DIR environment variable.
    #[arg(long, value_name = "DIR", env = "ONERM_STATIC_DIR")]
    static_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::init();

    let args = Args::parse();

    let mut mailer_config = MailerConfig {
        timeout: Duration::from_secs(args.mail_timeout),
        ..MailerConfig::default()
    };
    if let Some(endpoint) = args.mail_endpoint {
        mailer_config.endpoint = endpoint;
    }
    let sender =
        HttpEmailSender::new(&mailer_config).context("Failed to build mail HTTP client")?;

    let calculator = CalculatorState::default();
    print_summary(calculator.estimate());

    println!();
    println!("Mail endpoint: {}", sender.endpoint());

    let static_dir = match args.static_dir {
        Some(dir) => dir,
        None => find_static_dir(),
    };
    println!("Static files: {}", static_dir.display());

    let state = Arc::new(AppState::new(calculator, sender));

    println!();
    server::run_server(state, args.port, static_dir).await?;

    Ok(())
}

/// Prints the starting estimate and its tables.
fn print_summary(estimate: &Estimate) {
    let input = estimate.input;

    println!();
    println!("=== Starting Estimate ===");
    println!();
    println!(
        "{} kg x {} reps ({}): 1RM {}",
        input.weight_kg(),
        input.reps(),
        input.formula(),
        format_kg(estimate.one_rm)
    );

    println!();
    for entry in &estimate.percentages {
        println!("{:>4}%  {:>7} kg", entry.percentage, entry.display_weight());
    }

    println!();
    println!("=== Hypertrophy ===");
    println!();
    for entry in &estimate.hypertrophy {
        println!("{:>4} reps  {:>7} kg", entry.reps, entry.display_weight());
    }
}

/// Finds the static directory for serving frontend files.
fn find_static_dir() -> PathBuf {
    // Try relative to current working directory
    let cwd_static = PathBuf::from("static");
    if cwd_static.is_dir() {
        return cwd_static;
    }

    // Try relative to executable
    if let Ok(exe_path) = std::env::current_exe()
        && let Some(exe_dir) = exe_path.parent()
    {
        let exe_static = exe_dir.join("static");
        if exe_static.is_dir() {
            return exe_static;
        }
    }

    cwd_static
}
