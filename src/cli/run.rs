use super::phrase::load_key_material;
use sogs_bot::config::{default_config_path, BotConfig, CursorStore, LoggingConfig};
use sogs_bot::crypto::{BlindingEngine, Signer};
use sogs_bot::sogs::{BotSettings, HttpSogsClient, RequestAuthenticator, SogsBot};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Run the bot service
///
/// Loads the config (default `~/.local/share/sogs-bot/config.toml`),
/// derives keys from the recovery phrase, resumes from the saved cursor and
/// polls until Ctrl-C.
pub async fn execute(
    config_path: Option<String>,
    phrase_file: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = config_path
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path);

    if !config_path.exists() {
        return Err(format!(
            "No config file at '{}'. Create one with `sogs-bot init`.",
            config_path.display()
        )
        .into());
    }
    let config = BotConfig::load(&config_path)?;
    let _guards = init_logging(&config.logging)?;

    let keys = Arc::new(load_key_material(phrase_file, Some(&config))?);
    let server_key = config.server_public_key()?;
    let engine = BlindingEngine::new(Arc::clone(&keys));
    let signer = Signer::new(&engine, Arc::clone(&keys), &server_key, config.signing_mode())?;

    info!(
        account_id = %keys.account_id(),
        blinded_id = %signer.blinding().blinded_id(),
        mode = ?signer.mode(),
        "Running bot as {}",
        signer.identity()
    );

    let client = HttpSogsClient::new(&config.server_url()?)?;
    let store = CursorStore::beside(&config_path);
    let since = store.load()?;

    let mut bot = SogsBot::new(
        client,
        RequestAuthenticator::new(signer),
        config.response_table(),
        BotSettings::from_config(&config),
        since,
    );

    if let Some(greeting) = &config.identity.greeting {
        match bot.post(greeting).await {
            Ok(posted) => info!(seqno = ?posted.seqno, "posted greeting"),
            Err(e) => warn!("failed to post greeting: {}", e),
        }
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received shutdown signal"),
            Err(e) => warn!("Failed to listen for Ctrl-C, stopping: {}", e),
        }
        let _ = shutdown_tx.send(true);
    });

    bot.run(&store, shutdown_rx).await?;
    info!(cursor = bot.cursor(), "Shutdown complete");
    Ok(())
}

/// Install the global subscriber: stdout always, plus a file when configured.
///
/// The returned guards flush the non-blocking writers and must outlive the
/// bot.
fn init_logging(logging: &LoggingConfig) -> Result<Vec<WorkerGuard>, Box<dyn std::error::Error>> {
    let level: tracing::Level = logging.level.parse().unwrap_or(tracing::Level::INFO);
    let mut guards = Vec::new();

    let (stdout_writer, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
    guards.push(stdout_guard);
    let stdout_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(stdout_writer)
        .with_filter(env_filter(level));

    let file_layer = match &logging.file {
        Some(path) => {
            let (dir, name) = split_log_path(path)?;
            std::fs::create_dir_all(&dir)
                .map_err(|e| format!("Failed to create log directory '{}': {}", dir.display(), e))?;

            let (file_writer, file_guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(&dir, &name));
            guards.push(file_guard);
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(file_writer)
                    .with_ansi(false)
                    .with_filter(env_filter(level)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .try_init()?;

    Ok(guards)
}

fn env_filter(level: tracing::Level) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy()
}

fn split_log_path(path: &Path) -> Result<(PathBuf, PathBuf), Box<dyn std::error::Error>> {
    let name = path
        .file_name()
        .ok_or_else(|| format!("Log file path '{}' has no file name", path.display()))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((dir, PathBuf::from(name)))
}
