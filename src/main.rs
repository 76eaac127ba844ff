use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use pezzottify_notification_sync::config::{AppConfig, CliConfig, FileConfig};
use pezzottify_notification_sync::notifications::time_ago;
use pezzottify_notification_sync::{
    NotificationsClient, NotificationsStore, NotificationsSubscriptions, User, WebSocketConnector,
};

#[derive(Parser, Debug)]
struct CliArgs {
    /// Base URL of the notifications server (e.g., "http://localhost:3001").
    #[clap(long)]
    pub base_url: Option<String>,

    /// WebSocket URL for pushed notifications. Defaults to <base-url>/ws.
    #[clap(long)]
    pub ws_url: Option<String>,

    /// Path to a TOML config file. Its values override CLI arguments.
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Timeout in seconds for HTTP requests.
    #[clap(long, default_value_t = 30)]
    pub request_timeout_sec: u64,

    /// Delay in seconds before reconnecting a dropped push channel.
    #[clap(long, default_value_t = 5)]
    pub reconnect_delay_sec: u64,

    /// Maximum number of pushed batches waiting to be applied.
    #[clap(long, default_value_t = 64)]
    pub frame_buffer: usize,

    /// Mark every notification as read once it has been displayed.
    #[clap(long)]
    pub mark_read_on_view: bool,

    /// Interval in seconds between server push triggers. Set to 0 to disable.
    #[clap(long, default_value_t = 0)]
    pub trigger_interval_sec: u64,
}

impl From<&CliArgs> for CliConfig {
    fn from(args: &CliArgs) -> Self {
        CliConfig {
            base_url: args.base_url.clone(),
            ws_url: args.ws_url.clone(),
            request_timeout_sec: args.request_timeout_sec,
            reconnect_delay_sec: args.reconnect_delay_sec,
            frame_buffer: args.frame_buffer,
            mark_read_on_view: args.mark_read_on_view,
            trigger_interval_sec: args.trigger_interval_sec,
        }
    }
}

async fn next_trigger(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn render(store: &NotificationsStore, users: &[User]) {
    let views = store.views(users).await;
    let now = Utc::now();

    println!("--- {} notifications ---", views.len());
    for view in views {
        let marker = if view.is_new {
            "*"
        } else if view.read {
            " "
        } else {
            "+"
        };
        let ago = time_ago(&view.date, now).unwrap_or_else(|| view.date.clone());
        println!("{} {} ({} ago): {}", marker, view.user_name, ago, view.message);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()?;

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config file {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let config = AppConfig::resolve(&CliConfig::from(&cli_args), file_config)?;

    info!("Notifications server at {}", config.base_url);
    let client = Arc::new(
        NotificationsClient::new(&config.base_url, config.request_timeout_sec)
            .context("Failed to create notifications client")?,
    );

    let users = match client.fetch_users().await {
        Ok(users) => {
            info!("Loaded {} users", users.len());
            users
        }
        Err(e) => {
            warn!("Failed to fetch users, names will be unknown: {}", e);
            Vec::new()
        }
    };

    let store = Arc::new(NotificationsStore::new());
    let subscriptions = NotificationsSubscriptions::new(
        client.clone(),
        Arc::new(WebSocketConnector::new()),
        store.clone(),
        config.sync_settings(),
    );

    info!("Subscribing to pushed notifications at {}", config.ws_url);
    let handle = subscriptions.attach();
    let mut changes = store.subscribe();

    let mut ticker = config.trigger_interval.map(|period| {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    });

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down");
                break;
            }
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                render(&store, &users).await;
                if config.mark_read_on_view && store.unread_count().await > 0 {
                    store.mark_all_read().await;
                }
            }
            _ = next_trigger(&mut ticker) => {
                if let Err(e) = client.trigger_push(&store).await {
                    warn!("Failed to trigger notifications push: {}", e);
                }
            }
        }
    }

    if tokio::time::timeout(Duration::from_secs(5), handle.close())
        .await
        .is_err()
    {
        warn!("Timed out waiting for the push channel to close");
    }
    Ok(())
}
