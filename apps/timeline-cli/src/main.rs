//! timeline-cli: fetch a feed through the sync engine and print it

mod config;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use config::{CliConfig, LogFormat};
use mastodon_client::{ClientConfig, HttpTransport, SearchLookup};
use prometheus::{Encoder, Registry, TextEncoder};
use std::sync::Arc;
use timeline_sync::ports::{MemoryPreferences, StaticCapabilities, Transport};
use timeline_sync::{
    EngineConfig, FeedKey, FeedKind, FetchOutcome, Item, TimelineEngine, TimelineMetrics,
};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about = "Fetch a timeline and print its items")]
struct Args {
    /// Feed kind: following, local, hashtag, list, account, ...
    kind: FeedKind,
    /// Hashtag, list id or account id (account falls back to TUSK_ACCOUNT_ID)
    param: Option<String>,
    /// Number of pages to fetch
    #[arg(long, default_value_t = 1)]
    pages: usize,
    /// Print collected metrics to stderr when done
    #[arg(long)]
    metrics: bool,
}

fn feed_key(args: &Args, client: &ClientConfig) -> Result<FeedKey> {
    let param = || args.param.clone().context("this feed kind needs a parameter");
    Ok(match args.kind {
        FeedKind::Following => FeedKey::following(),
        FeedKind::Local => FeedKey::Local,
        FeedKind::LocalPublic => FeedKey::LocalPublic,
        FeedKind::Trending => FeedKey::Trending,
        FeedKind::Notifications => FeedKey::Notifications,
        FeedKind::Account => {
            let id = args
                .param
                .clone()
                .or_else(|| client.account_id.clone())
                .context("account feed needs an id or TUSK_ACCOUNT_ID")?;
            FeedKey::account(id, true, false)
        }
        FeedKind::Hashtag => FeedKey::hashtag(param()?),
        FeedKind::List => FeedKey::list(param()?),
        FeedKind::Conversations => FeedKey::Conversations,
        FeedKind::Bookmarks => FeedKey::Bookmarks,
        FeedKind::Favourites => FeedKey::Favourites,
    })
}

fn init_tracing(config: &CliConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Text => registry.with(fmt::layer().with_writer(std::io::stderr)).init(),
    }
}

fn describe(item: &Item) -> String {
    match item {
        Item::Status(status) => {
            let shown = status.reblog.as_deref().unwrap_or(status);
            let marker = if status.shown_pinned { " [pinned]" } else { "" };
            format!("{} @{}{}: {}", status.id, shown.account.acct, marker, shown.content)
        }
        Item::Notification(n) => format!("{} {} from @{}", n.id, n.category, n.account.acct),
        Item::Conversation(c) => {
            let with: Vec<&str> = c.accounts.iter().map(|a| a.acct.as_str()).collect();
            format!("{} conversation with {}", c.id, with.join(", "))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let cli_config = CliConfig::from_env().map_err(|e| anyhow!("{}", e))?;
    init_tracing(&cli_config);

    let args = Args::parse();
    let client_config = ClientConfig::from_env().map_err(|e| anyhow!("{}", e))?;
    let engine_config = EngineConfig::from_env().map_err(|e| anyhow!("{}", e))?;
    let key = feed_key(&args, &client_config)?;

    let registry = Registry::new();
    TimelineMetrics::register(&registry).context("failed to register metrics")?;

    let transport: Arc<dyn Transport> =
        Arc::new(HttpTransport::new(&client_config).context("failed to build HTTP transport")?);
    let engine = TimelineEngine::new(
        transport.clone(),
        Arc::new(StaticCapabilities::default()),
        Arc::new(MemoryPreferences::new()),
        Arc::new(SearchLookup::new(transport)),
        engine_config,
    );

    info!(feed = %key, pages = args.pages, "Loading feed");
    let feed = engine.feed(key.clone());
    feed.load().await.with_context(|| format!("failed to load {}", key))?;
    for _ in 1..args.pages {
        if feed.fetch_next().await? == FetchOutcome::NoNextPage {
            break;
        }
    }

    let view = feed.view();
    for item in &view.items {
        println!("{}", describe(item));
    }
    info!(items = view.items.len(), has_next = view.has_next, "Done");

    if args.metrics {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&registry.gather(), &mut buffer)
            .context("failed to encode metrics")?;
        eprintln!("{}", String::from_utf8_lossy(&buffer));
    }

    Ok(())
}
