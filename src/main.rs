//! TradeVault - Failed trades registry
//!
//! Composition root: builds the one `FailedTradesManager` for this process,
//! hydrates it off the async runtime and runs the requested command.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

use tradevault::adapters::cli::{CliApp, Command, ImportCmd, ListCmd, ShowCmd};
use tradevault::adapters::{FileStore, KeyRing, PriceFeedService, WalletManager};
use tradevault::application::FailedTradesManager;
use tradevault::config::{load_config_or_default, Config};
use tradevault::domain::{PersistedTrade, Trade};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists
    dotenvy::dotenv().ok();

    let app = CliApp::parse();
    let config = load_config_or_default(&app.config)
        .with_context(|| format!("Failed to load configuration from {}", app.config.display()))?;
    init_logging(app.verbose, app.debug, &config.logging.level)?;

    let network = app.network_options();
    tracing::info!(
        peer_id = ?network.peer_id,
        port = network.port,
        interface = ?network.interface,
        "Starting {}",
        app.app_name()
    );

    let key_ring = Arc::new(load_key_ring(&config)?);
    let manager = Arc::new(build_manager(&app, &config, key_ring.clone())?);

    let loaded = {
        let manager = manager.clone();
        tokio::task::spawn_blocking(move || manager.hydrate())
            .await
            .context("Hydration task panicked")??
    };
    tracing::info!("Registry ready with {} failed trades", loaded);

    match app.command {
        Command::List(cmd) => list_command(&manager, cmd),
        Command::Show(cmd) => show_command(&manager, cmd),
        Command::Import(cmd) => import_command(manager, cmd).await,
        Command::Whoami => {
            println!("{}", key_ring.public_key());
            Ok(())
        }
    }
}

fn init_logging(verbose: bool, debug: bool, configured: &str) -> Result<()> {
    let filter = if debug {
        EnvFilter::new("debug")
    } else if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::new(configured.to_lowercase())
    };

    fmt().with_env_filter(filter).init();
    Ok(())
}

fn load_key_ring(config: &Config) -> Result<KeyRing> {
    match config.identity.get_keypair_path() {
        Some(path) => KeyRing::from_file(&path)
            .with_context(|| format!("Failed to load identity from {}", path.display())),
        None if config.identity.allow_random => {
            tracing::warn!("No identity keypair configured - using a throwaway identity");
            Ok(KeyRing::new_random())
        }
        None => bail!("identity.keypair_path is not set"),
    }
}

fn build_manager(app: &CliApp, config: &Config, key_ring: Arc<KeyRing>) -> Result<FailedTradesManager> {
    let wallet = match config.identity.get_keypair_path() {
        Some(path) => WalletManager::from_file(&path)
            .with_context(|| format!("Failed to load wallet from {}", path.display()))?,
        None => WalletManager::new_random(),
    };

    let storage_dir = config.storage.get_dir(&app.app_name());
    tracing::info!("Storage directory: {}", storage_dir.display());

    let manager = FailedTradesManager::new(
        key_ring,
        Arc::new(PriceFeedService::new()),
        Arc::new(wallet),
        Arc::new(FileStore::new(storage_dir)),
        config.storage.codec.resolver(),
    )
    .with_policy(config.storage.duplicate_policy);

    Ok(manager)
}

fn list_command(manager: &FailedTradesManager, cmd: ListCmd) -> Result<()> {
    let trades: Vec<Arc<Trade>> = if cmd.locked {
        manager.locked_trades()?.into_iter().collect()
    } else {
        manager.get_all()?
    };

    if trades.is_empty() {
        println!("No failed trades");
        return Ok(());
    }

    for trade in trades {
        let marker = if trade.is_funds_locked_in() { "LOCKED" } else { "" };
        let mine = if manager.was_my_offer(trade.offer()) { "own offer" } else { "" };
        println!("{} {} {}", trade, marker, mine);
    }
    Ok(())
}

fn show_command(manager: &FailedTradesManager, cmd: ShowCmd) -> Result<()> {
    let Some(trade) = manager.get_trade_by_id(&cmd.id)? else {
        bail!("No failed trade with id {}", cmd.id);
    };

    println!("Trade:         {}", trade.id());
    println!("Offer:         {} ({})", trade.offer().id(), trade.offer().direction());
    println!("Date:          {}", trade.date());
    println!("Amount:        {}", trade.amount());
    println!("Price:         {} {}", trade.trade_price(), trade.offer().currency_code());
    println!("State:         {}", trade.state());
    println!("Dispute:       {:?}", trade.dispute_state());
    println!("Funds locked:  {}", trade.is_funds_locked_in());
    println!("Own offer:     {}", manager.was_my_offer(trade.offer()));
    if let Some(message) = trade.error_message() {
        println!("Error:         {}", message);
    }
    Ok(())
}

async fn import_command(manager: Arc<FailedTradesManager>, cmd: ImportCmd) -> Result<()> {
    let content = std::fs::read_to_string(&cmd.file)
        .with_context(|| format!("Failed to read {}", cmd.file.display()))?;
    let record: PersistedTrade = serde_json::from_str(&content)
        .with_context(|| format!("{} is not a valid trade record", cmd.file.display()))?;
    let trade = Arc::new(Trade::from_record(record).context("Invalid trade record")?);
    let id = trade.id().to_string();

    let added = tokio::task::spawn_blocking(move || manager.add(trade))
        .await
        .context("Import task panicked")??;

    if added {
        println!("Registered failed trade {}", id);
    } else {
        println!("Failed trade {} already registered", id);
    }
    Ok(())
}
