use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tagwatch::{commands, config, feed, notify, poller, store, telegram, watch};

#[derive(Parser, Debug)]
#[command(name = "tagwatch")]
#[command(about = "Telegram bot that watches feed tags and notifies chats about new posts")]
#[command(version)]
struct Args {
    /// Initialize configuration
    #[arg(long)]
    init: bool,

    /// Path to config file
    #[arg(long, short)]
    config: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tagwatch=info".parse()?),
        )
        .init();

    if args.init {
        config::init_wizard()?;
        return Ok(());
    }

    let config = config::load(args.config.as_deref())?;

    let db_path = config::db_path(&config)?;
    let store = store::TagStore::open(&db_path, &config.storage.bucket)?;
    let table = Arc::new(watch::WatchTable::new(store));

    let feed_source: Arc<dyn feed::FeedSource> =
        Arc::new(feed::HttpFeedSource::new(&config.feed.base_url));
    let notifier: Arc<dyn notify::Notifier> =
        Arc::new(notify::TelegramNotifier::new(&config.telegram.token));

    let poller = poller::Poller::new(
        Arc::clone(&table),
        Arc::clone(&feed_source),
        Arc::clone(&notifier),
        Duration::from_secs(config.polling.interval_secs),
        Duration::from_secs(config.feed.check_timeout_secs),
    );
    tokio::spawn(poller.run());

    let (tx, mut rx) = tokio::sync::mpsc::channel(32);
    tokio::spawn(telegram::run(config.telegram.token.clone(), tx));

    tracing::info!(
        "Started, polling every {}s, database at {}",
        config.polling.interval_secs,
        db_path.display()
    );

    while let Some(event) = rx.recv().await {
        commands::handle(&table, notifier.as_ref(), event).await;
    }

    Ok(())
}
