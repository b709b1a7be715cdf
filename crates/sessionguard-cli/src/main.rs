//! sessionguard - a terminal front end for a session-protected API.
//!
//! Resumes the previous session if the server still recognizes it, lets the
//! user log in and issue API calls, and logs out after a period without input.

mod config;
mod repl;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use sessionguard_core::{ActivityBus, ApiClient, InactivityGuard, SessionContext, SessionPhase};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use config::Config;

/// Log file name inside the cache directory
const LOG_FILE: &str = "sessionguard.log";

/// Initialize the tracing subscriber for logging.
///
/// With a log directory, output goes to a file there so it doesn't interleave
/// with the prompt; otherwise to stderr.
fn init_tracing(log_dir: Option<PathBuf>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::never(dir, LOG_FILE);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .with(filter)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(io::stderr))
                .with(filter)
                .init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args: Vec<String> = std::env::args().collect();
    let log_to_file = args.iter().any(|a| a == "--log-file");

    let mut config = Config::load()?;
    let log_dir = if log_to_file {
        let dir = config.cache_dir()?;
        std::fs::create_dir_all(&dir)?;
        Some(dir)
    } else {
        None
    };
    let _log_guard = init_tracing(log_dir);
    info!("sessionguard starting");

    let client_config = config.client_config();
    let client = ApiClient::new(&client_config, config.credential_store()?)?;
    let session = Arc::new(SessionContext::new(client));

    let bus = ActivityBus::new();
    let _idle_guard = InactivityGuard::spawn(&session, bus.clone(), client_config.idle_timeout);

    println!("Connecting to {}...", session.client().base_url());
    match session.initialize().await {
        SessionPhase::Authenticated => {
            if let Some(user) = session.user() {
                println!("Welcome back, {}.", user.display_name());
            }
        }
        _ => println!("Not logged in. Type `login <email>` or `help`."),
    }

    repl::run(&session, &bus, &mut config).await?;

    session.dispose();
    info!("sessionguard shutting down");
    Ok(())
}
