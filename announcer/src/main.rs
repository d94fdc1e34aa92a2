use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use announcer::api::client::HttpAnnouncementSource;
use announcer::config::AnnouncerConfig;
use announcer::console::{HELP, LoggingLinkOpener, run_console};
use announcer::engine::channel::ChannelSet;
use announcer::engine::runtime::spawn_scheduler;
use announcer::store::dismissal::DismissalStore;
use announcer::store::kv::FileStore;

/// Present published announcements in the terminal, one per channel at a time.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, default_value = "announcer.toml")]
    config: String,
    /// Published-announcements endpoint (overrides config).
    #[arg(long)]
    api_url: Option<String>,
    /// State file for dismissed announcements (overrides config).
    #[arg(long)]
    state_file: Option<PathBuf>,
    /// Do not persist dismissals.
    #[arg(long, conflicts_with = "state_file")]
    no_persist: bool,
    /// Also present banner announcements.
    #[arg(long)]
    enable_banner: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = AnnouncerConfig::load(&cli.config).context("failed to load configuration")?;
    if let Some(url) = cli.api_url {
        config.api.url = url;
    }
    if let Some(path) = cli.state_file {
        config.storage.path = Some(path);
    }
    if cli.no_persist {
        config.storage.path = None;
    }

    let mut scheduler_config = config.to_scheduler_config()?;
    if cli.enable_banner {
        scheduler_config.enabled |= ChannelSet::BANNER;
    }

    let store = match &config.storage.path {
        Some(path) => {
            info!(path = %path.display(), "persisting dismissals");
            DismissalStore::new(Arc::new(FileStore::new(path, config.storage.quota_bytes)))
        }
        None => DismissalStore::unavailable(),
    };
    let source = HttpAnnouncementSource::new(config.api.url.clone(), config.fetch_timeout());

    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c_cancel.cancel();
        }
    });

    info!(url = %config.api.url, "announcer starting");
    let handle = spawn_scheduler(
        source,
        store,
        scheduler_config,
        Arc::new(LoggingLinkOpener),
        cancel.clone(),
    );
    println!("{HELP}");

    let stdin = BufReader::new(tokio::io::stdin());
    run_console(&handle, stdin, &cancel, |line| println!("{line}")).await;

    handle.shutdown().await;
    info!("announcer stopped");
    Ok(())
}
