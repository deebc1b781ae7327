//! CLI for appbridge
//!
//! Subcommands:
//! - `demo`: run two instances on one store and exchange a ping
//! - `apps`: list live instances recorded in a store
//! - `queue`: list pending durable-queue entries
//! - `session`: read, write or clear session values

use std::sync::Arc;

use appbridge::bridge::{Bridge, BridgeOptions, TransportMode};
use appbridge::config::{Settings, load_config};
use appbridge::host::HeadlessHost;
use appbridge::message::Payload;
use appbridge::persistence::{MemoryStore, SharedStore, SledStore};
use appbridge::presence::PresenceTracker;
use appbridge::session::SessionStore;
use appbridge::transport::{ChannelProvider, LocalChannelHub, QueueTransport, UnavailableChannels};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "appbridge")]
struct Cli {
    /// sled store directory; overrides `storage.path` from the configuration
    #[arg(long, global = true)]
    store: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    log: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Two instances exchange a ping and share a session value
    Demo {
        /// Force the durable queue instead of the broadcast channel
        #[arg(long)]
        no_broadcast: bool,
        /// Transport mode for the sending instance
        #[arg(long, default_value = "web")]
        mode: TransportMode,
    },
    /// List live instances
    Apps,
    /// List queued messages
    Queue,
    /// Inspect or change session values
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },
}

#[derive(Subcommand)]
enum SessionAction {
    Get { key: String },
    /// VALUE is parsed as JSON, falling back to a plain string
    Set { key: String, value: String },
    Clear,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    appbridge::utils::logging::init(&cli.log);

    if let Err(e) = run(cli).await {
        error!("{e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut settings = load_config()?;
    if cli.store.is_some() {
        settings.storage.path = cli.store;
    }

    match cli.command {
        Command::Demo { no_broadcast, mode } => {
            let store = open_store(&settings, true)?;
            let channels: Box<dyn ChannelProvider> = if no_broadcast {
                Box::new(UnavailableChannels)
            } else {
                Box::new(LocalChannelHub::new())
            };
            run_demo(&settings, store, channels.as_ref(), mode).await?;
        }
        Command::Apps => {
            let store = open_store(&settings, false)?;
            let presence = PresenceTracker::new(store, "", settings.timing.presence_window_ms);
            for id in presence.list_active() {
                println!("{id}");
            }
        }
        Command::Queue => {
            let store = open_store(&settings, false)?;
            let queue = QueueTransport::new(store, settings.timing.queue_retention_ms);
            for entry in queue.entries()? {
                println!(
                    "{} {} {} -> {}",
                    entry.key,
                    entry.message.action,
                    entry.message.source.as_deref().unwrap_or("-"),
                    entry.message.target.as_deref().unwrap_or("*"),
                );
            }
        }
        Command::Session { action } => {
            let session = SessionStore::new(open_store(&settings, false)?);
            match action {
                SessionAction::Get { key } => match session.read(&key)? {
                    Some(value) => println!("{value}"),
                    None => println!("(no value)"),
                },
                SessionAction::Set { key, value } => {
                    let value = serde_json::from_str(&value).unwrap_or(json!(value));
                    session.set(&key, &value)?;
                }
                SessionAction::Clear => {
                    let removed = session.clear()?;
                    println!("removed {removed} key(s)");
                }
            }
        }
    }

    Ok(())
}

fn open_store(
    settings: &Settings,
    allow_memory: bool,
) -> Result<Arc<dyn SharedStore>, Box<dyn std::error::Error>> {
    match &settings.storage.path {
        Some(path) => Ok(Arc::new(SledStore::open(path)?)),
        None if allow_memory => Ok(Arc::new(MemoryStore::new())),
        None => Err("no store configured; pass --store or set storage.path".into()),
    }
}

async fn run_demo(
    settings: &Settings,
    store: Arc<dyn SharedStore>,
    channels: &dyn ChannelProvider,
    mode: TransportMode,
) -> Result<(), Box<dyn std::error::Error>> {
    let host = Arc::new(HeadlessHost::parse(&settings.bridge.origin)?);
    let base = BridgeOptions::from_settings(settings);

    let sender = Bridge::initialize(
        BridgeOptions {
            app_id: "demo-a".to_string(),
            mode,
            ..base.clone()
        },
        store.clone(),
        channels,
        host.clone(),
    );
    let receiver = Bridge::initialize(
        BridgeOptions {
            app_id: "demo-b".to_string(),
            mode: TransportMode::Web,
            ..base
        },
        store,
        channels,
        host,
    );

    if let Some(mut inbound) = receiver.take_messages() {
        tokio::spawn(async move {
            while let Some(msg) = inbound.recv().await {
                info!(
                    "demo-b received '{}' from {} with {}",
                    msg.action,
                    msg.source.as_deref().unwrap_or("-"),
                    serde_json::Value::Object(msg.payload)
                );
            }
        });
    }

    let mut payload = Payload::new();
    payload.insert("text".to_string(), json!("hello from demo-a"));
    let acked = sender.send("ping", payload, Some("demo-b")).await;
    info!("ping acknowledged: {acked}");

    sender.set_session_data("demo", json!({"acked": acked}));
    info!("active apps: {:?}", sender.list_active_apps());

    sender.dispose();
    receiver.dispose();
    Ok(())
}
