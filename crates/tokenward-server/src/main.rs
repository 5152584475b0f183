use clap::Parser;
use tokenward_server::ServerBuilder;
use tokenward_server::config::loader::{DEFAULT_CONFIG_PATH, load_config};

#[derive(Parser)]
#[command(name = "tokenward-server")]
#[command(about = "OAuth 2.0 token introspection and revocation server")]
#[command(version)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, env = "TOKENWARD_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: String,
}

#[tokio::main]
async fn main() {
    // .env is optional; anything other than a missing file is worth a warning
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound) {
            eprintln!("Warning: Failed to load .env file: {e}");
        }
    }

    let cli = Cli::parse();

    let cfg = match load_config(Some(&cli.config)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(2);
        }
    };

    tokenward_server::init_tracing(&cfg.logging);
    tracing::info!(
        path = %cli.config,
        storage = ?cfg.storage.backend,
        issuer = %cfg.auth.issuer,
        "Configuration loaded"
    );

    #[cfg(unix)]
    spawn_level_reload(cli.config.clone());

    let server = match ServerBuilder::new().with_config(cfg).build().await {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Server initialization failed: {e:#}");
            std::process::exit(2);
        }
    };

    if let Err(err) = server.run().await {
        eprintln!("Server error: {err:#}");
        std::process::exit(1);
    }
}

/// Re-reads the config file on SIGHUP and applies its `logging.level`.
#[cfg(unix)]
fn spawn_level_reload(config_path: String) {
    use tokio::signal::unix::{SignalKind, signal};

    tokio::spawn(async move {
        let mut hangup = match signal(SignalKind::hangup()) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, "SIGHUP handler unavailable; log level reload disabled");
                return;
            }
        };
        while hangup.recv().await.is_some() {
            match load_config(Some(&config_path)) {
                Ok(cfg) => {
                    tokenward_server::apply_logging_level(&cfg.logging.level);
                    tracing::info!(level = %cfg.logging.level, "log level reloaded");
                }
                Err(e) => tracing::warn!(error = %e, "config reload failed; keeping current level"),
            }
        }
    });
}
