//! Site Synchronizer - Entry Point
//!
//! Listens for commit events on pubsub and keeps the website checkouts on
//! this box at the pushed revision.

use std::collections::HashMap;
use std::env;

use anyhow::Context;

use sitesync::app::options::AppOptions;
use sitesync::app::run::run;
use sitesync::filesys::file::File;
use sitesync::logs::{init_logging, LogOptions};
use sitesync::storage::settings::{Settings, DEFAULT_SETTINGS_FILE};
use sitesync::utils::{host_name, version_info};

use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    let version = version_info();
    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("Failed to serialize version: {e}"),
        }
        return;
    }

    // Retrieve the settings file
    let settings_path = cli_args
        .get("config")
        .cloned()
        .unwrap_or_else(|| DEFAULT_SETTINGS_FILE.to_string());
    let settings = match load_settings(&settings_path).await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{e:#}");
            return;
        }
    };

    // Initialize logging; the guard flushes file logs on exit
    let log_options = LogOptions {
        log_level: settings.log_level.clone(),
        log_dir: settings.log_dir.clone(),
        json_format: settings.json_logs,
        ..Default::default()
    };
    let _log_guard = match init_logging(log_options) {
        Ok(guard) => guard,
        Err(e) => {
            println!("Failed to initialize logging: {e}");
            None
        }
    };

    let host = host_name();
    let options = AppOptions::from_settings(&settings, &host);

    info!(
        "Running site synchronizer {} ({}) on {} with options: {:?}",
        version.version, version.git_hash, host, options
    );
    let result = run(options, await_shutdown_signal())
        .await
        .context("Failed to run the synchronizer");
    if let Err(e) = result {
        error!("{e:#}");
    }
}

async fn load_settings(path: &str) -> anyhow::Result<Settings> {
    File::new(path)
        .read_json_or_default::<Settings>()
        .await
        .with_context(|| format!("Unable to read settings file {path}"))
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
                (Err(e), _) | (_, Err(e)) => {
                    error!("Unable to install signal handlers: {e}");
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        error!("Failed to listen for Ctrl+C: {e}");
                    }
                    return;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl+C received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {e}");
        }
        info!("Ctrl+C received, shutting down...");
    }
}
