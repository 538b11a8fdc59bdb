use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use stock_watcher::config::AppConfig;
use stock_watcher::plugins::notifiers::DiscordNotifier;
use stock_watcher::plugins::ResolverRegistry;
use stock_watcher::product_manager::ProductManager;
use stock_watcher::scheduler::StockMonitor;
use stock_watcher::scraper::PageSources;

#[derive(Parser, Debug)]
#[command(name = "stock-watcher", version, about = "Watches retail product pages and reports stock changes to Discord")]
struct Cli {
    /// TOML file layered over the built-in defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run a single check cycle and exit
    #[arg(long)]
    once: bool,

    /// Verbose logging
    #[arg(long)]
    debug: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if cli.debug {
        config.monitor.debug = true;
    }
    let _log_guard = init_tracing(&config)?;

    info!("Starting Stock Watcher...");

    let registry = ResolverRegistry::from_config(&config)?;
    info!("Resolvers registered for: {}", registry.site_ids().join(", "));

    let sources = PageSources::from_config(&config).await?;
    let notifier = DiscordNotifier::new(
        config.notifications.discord.clone(),
        config.notifications.chunk_size,
    )?;

    let mut monitor = StockMonitor::new(
        config.items.clone(),
        sources,
        ProductManager::new(registry),
        Box::new(notifier),
        Duration::from_secs(config.monitor.interval_secs),
    );

    if cli.once {
        monitor.run_cycle().await;
    } else {
        monitor.run().await;
    }

    info!("Shutting down...");
    Ok(())
}

fn init_tracing(config: &AppConfig) -> Result<Option<WorkerGuard>> {
    let directive = if config.monitor.debug {
        "stock_watcher=debug"
    } else {
        "stock_watcher=info"
    };
    let filter = EnvFilter::from_default_env().add_directive(directive.parse()?);

    match &config.logging.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, &config.logging.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer())
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer())
                .init();
            Ok(None)
        }
    }
}
