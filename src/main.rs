use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

/// cursor-ping - flash a marker at the mouse cursor on a global shortcut
#[derive(Parser, Debug)]
#[command(name = "cursor-ping")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Settings file (default: $XDG_CONFIG_HOME/cursor-ping/settings.json)
    #[arg(long, value_name = "PATH")]
    settings: Option<PathBuf>,

    /// Keep settings in memory only; nothing is read or written
    #[arg(long, conflicts_with = "settings")]
    ephemeral: bool,
}

fn main() -> ExitCode {
    // Load .env file if present (for development convenience)
    // Silently ignore if not found - production uses system env vars
    let _ = dotenvy::dotenv();

    // `RUST_LOG` overrides the default level; `log` records are bridged in
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let cli = Cli::parse();
    let options = cursor_ping::RunOptions {
        settings_path: cli.settings,
        ephemeral: cli.ephemeral,
    };

    match cursor_ping::run(options) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
