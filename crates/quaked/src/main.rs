// # quaked - Seismic Feed Relay Daemon
//
// This daemon is a THIN integration layer only:
// - All feed, aggregation and delivery logic lives in quake-core
// - Collaborators come from plugin crates registered at startup
// - Configuration is via environment variables only
//
// The quaked daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Registering plugins and building collaborators
// 4. Running the QuakeEngine until SIGTERM or SIGINT
//
// ## Configuration
//
// ### Feed
// - `QUAKE_FEED_URL`: Feed WebSocket URL (default `wss://api.p2pquake.net/v2/ws`)
//
// ### Google Maps
// - `QUAKE_GOOGLE_MAPS_API_KEY`: Enables geocoding and map images when set
// - `QUAKE_GEOCODE_REGION`: Region hint for lookups (default `jp`)
//
// ### Geocode Store
// - `QUAKE_STORE_TYPE`: `file` (default) or `memory`
// - `QUAKE_STORE_PATH`: Cache file path (default `data/geocode.json`)
//
// ### Notifier
// - `QUAKE_NOTIFIER_TYPE`: `log` (default) or `webhook`
// - `QUAKE_WEBHOOK_URL`: Webhook URL template, `{channel_id}` is substituted
// - `QUAKE_WEBHOOK_TOKEN`: Optional bearer token
//
// ### Destinations
// - `QUAKE_DESTINATIONS`: Comma-separated `guild:channel:min_intensity` triples
//
// ### Engine
// - `QUAKE_RECONNECT_DELAY_MS`: Delay before reconnecting (default 1000)
// - `QUAKE_FAILED_LOOKUP_POLICY`: `pin` (default) or `reset`
// - `QUAKE_LOG_LEVEL`: trace, debug, info (default), warn, error
//
// ## Example
//
// ```bash
// export QUAKE_GOOGLE_MAPS_API_KEY=your_key
// export QUAKE_NOTIFIER_TYPE=webhook
// export QUAKE_WEBHOOK_URL='https://relay.internal/channels/{channel_id}/messages'
// export QUAKE_DESTINATIONS=1111:2222:30,1111:3333:50
// export QUAKE_STORE_PATH=/var/lib/quake/geocode.json
//
// quaked
// ```

use anyhow::{Context, Result};
use quake_core::config::{
    DEFAULT_FEED_URL, FeedConfig, GeocodeStoreConfig, GeocoderConfig, MapConfig, NotifierConfig,
};
use quake_core::traits::{DestinationSource, GeocodeStore, Notifier, StaticDestinations};
use quake_core::{
    Destination, EewAggregator, EngineEvent, EventRouter, FailedLookupPolicy, GeocodeResolver,
    PluginRegistry, QuakeAggregator, QuakeConfig, QuakeEngine,
};
use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{Level, debug, error, info};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Default cache file for resolved coordinates
const DEFAULT_STORE_PATH: &str = "data/geocode.json";

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum QuakeExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<QuakeExitCode> for ExitCode {
    fn from(code: QuakeExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
struct Config {
    relay: QuakeConfig,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        let mut relay = QuakeConfig::new();

        relay.feed = FeedConfig::WebSocket {
            url: env::var("QUAKE_FEED_URL").unwrap_or_else(|_| DEFAULT_FEED_URL.to_string()),
        };

        if let Some(api_key) = non_empty_var("QUAKE_GOOGLE_MAPS_API_KEY") {
            relay.geocoder = GeocoderConfig::Google {
                api_key: api_key.clone(),
                region: env::var("QUAKE_GEOCODE_REGION").unwrap_or_else(|_| "jp".to_string()),
            };
            relay.map = MapConfig::GoogleStatic {
                api_key,
                size: "640x480".to_string(),
                zoom: 8,
                language: "ja".to_string(),
            };
        }

        relay.store = store_config(
            non_empty_var("QUAKE_STORE_TYPE").as_deref(),
            non_empty_var("QUAKE_STORE_PATH"),
        )?;

        relay.notifier = match env::var("QUAKE_NOTIFIER_TYPE")
            .unwrap_or_else(|_| "log".to_string())
            .as_str()
        {
            "log" => NotifierConfig::Log,
            "webhook" => NotifierConfig::Webhook {
                url_template: env::var("QUAKE_WEBHOOK_URL").context(
                    "QUAKE_WEBHOOK_URL is required when QUAKE_NOTIFIER_TYPE=webhook",
                )?,
                bearer_token: non_empty_var("QUAKE_WEBHOOK_TOKEN"),
            },
            other => anyhow::bail!(
                "QUAKE_NOTIFIER_TYPE '{}' is not supported. Supported types: log, webhook",
                other
            ),
        };

        relay.destinations = parse_destinations(&env::var("QUAKE_DESTINATIONS").unwrap_or_default())?;

        if let Some(delay) = non_empty_var("QUAKE_RECONNECT_DELAY_MS") {
            relay.engine.reconnect_delay_ms = delay
                .parse()
                .with_context(|| format!("QUAKE_RECONNECT_DELAY_MS must be a number. Got: {}", delay))?;
        }
        if let Some(policy) = non_empty_var("QUAKE_FAILED_LOOKUP_POLICY") {
            relay.engine.failed_lookup_policy = policy.parse::<FailedLookupPolicy>()?;
        }

        Ok(Self {
            relay,
            log_level: env::var("QUAKE_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        self.relay.validate()?;

        if let FeedConfig::WebSocket { url } = &self.relay.feed
            && !url.starts_with("wss://")
            && !url.starts_with("ws://")
        {
            anyhow::bail!("QUAKE_FEED_URL must use ws:// or wss://. Got: {}", url);
        }

        if !(100..=600_000).contains(&self.relay.engine.reconnect_delay_ms) {
            anyhow::bail!(
                "QUAKE_RECONNECT_DELAY_MS must be between 100 and 600000. Got: {}",
                self.relay.engine.reconnect_delay_ms
            );
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "QUAKE_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Geocode store selection
///
/// The daemon persists lookups to a file unless told otherwise, so a
/// restart does not repeat every lookup. The library default stays
/// `Memory`.
fn store_config(store_type: Option<&str>, path: Option<String>) -> Result<GeocodeStoreConfig> {
    match store_type.unwrap_or("file") {
        "file" => Ok(GeocodeStoreConfig::File {
            path: path.unwrap_or_else(|| DEFAULT_STORE_PATH.to_string()),
        }),
        "memory" => Ok(GeocodeStoreConfig::Memory),
        other => anyhow::bail!(
            "QUAKE_STORE_TYPE '{}' is not supported. Supported types: file, memory",
            other
        ),
    }
}

/// Parse `guild:channel:min_intensity` triples separated by commas
fn parse_destinations(raw: &str) -> Result<Vec<Destination>> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| -> Result<Destination> {
            let parts: Vec<&str> = entry.split(':').map(str::trim).collect();
            let [guild, channel, min_intensity] = parts.as_slice() else {
                anyhow::bail!(
                    "QUAKE_DESTINATIONS entry '{}' must be guild:channel:min_intensity",
                    entry
                );
            };
            let min_intensity = min_intensity.parse::<i32>().with_context(|| {
                format!("Invalid minimum intensity in QUAKE_DESTINATIONS entry '{}'", entry)
            })?;
            Ok(Destination::new(*guild, *channel, min_intensity))
        })
        .collect()
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return QuakeExitCode::ConfigError.into();
        }
    };

    // Initialize tracing
    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return QuakeExitCode::ConfigError.into();
    }

    // Validate configuration
    if let Err(e) = config.validate() {
        error!("Configuration validation error: {:#}", e);
        return QuakeExitCode::ConfigError.into();
    }

    info!("Starting quaked daemon");
    info!(
        "Configuration loaded: {} destination(s)",
        config.relay.destinations.len()
    );

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return QuakeExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(config.relay).await {
            error!("Daemon error: {:#}", e);
            QuakeExitCode::RuntimeError
        } else {
            QuakeExitCode::CleanShutdown
        }
    });

    result.into()
}

fn build_registry() -> PluginRegistry {
    let registry = PluginRegistry::with_builtins();

    #[cfg(feature = "websocket")]
    quake_feed_ws::register(&registry);

    #[cfg(feature = "google")]
    quake_geocode_google::register(&registry);

    #[cfg(feature = "webhook")]
    quake_notify_webhook::register(&registry);

    debug!("Registered feeds: {:?}", registry.list_feeds());
    debug!("Registered notifiers: {:?}", registry.list_notifiers());
    registry
}

/// Run the daemon
async fn run_daemon(config: QuakeConfig) -> Result<()> {
    let registry = build_registry();

    let connector = registry.create_feed(&config.feed)?;
    let store: Arc<dyn GeocodeStore> = Arc::from(registry.create_store(&config.store)?);
    let notifier: Arc<dyn Notifier> = Arc::from(registry.create_notifier(&config.notifier)?);
    let destinations: Arc<dyn DestinationSource> =
        Arc::new(StaticDestinations::new(config.destinations.clone()));

    info!("Feed: {}", connector.endpoint());
    info!("Geocode store: {}", config.store.type_name());
    info!("Notifier: {}", notifier.notifier_name());

    let mut quake = QuakeAggregator::new(
        Arc::clone(&notifier),
        Arc::clone(&destinations),
        &config.engine.collation_locale,
    )?;
    if let Some(map) = registry.create_map(&config.map)? {
        info!("Map images: {}", map.renderer_name());
        quake = quake.with_map(Arc::from(map));

        if let Some(lookup) = registry.create_lookup(&config.geocoder)? {
            info!("Geocoder: {} (region {})", lookup.lookup_name(), config.geocoder.region());
            let resolver = GeocodeResolver::new(
                Arc::from(lookup),
                Arc::clone(&store),
                config.geocoder.region(),
            )
            .with_engine_config(&config.engine);
            quake = quake.with_resolver(Arc::new(resolver), config.engine.max_map_markers);
        }
    }
    let eew = EewAggregator::new(notifier, destinations);
    let router = Arc::new(EventRouter::new(quake, eew));

    let (engine, mut events) = QuakeEngine::new(connector, router, &config.engine)?;
    let engine = engine.with_geocode_store(store);

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                EngineEvent::FrameRejected { error } => debug!("engine: frame rejected: {}", error),
                other => debug!("engine: {:?}", other),
            }
        }
    });

    let shutdown = shutdown_signal()?;
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    tokio::spawn(async move {
        let signal = shutdown.await;
        info!("Received shutdown signal: {}", signal);
        let _ = shutdown_tx.send(());
    });

    info!("Starting feed relay");
    engine.run_with_shutdown(Some(shutdown_rx)).await?;
    info!("Shutting down daemon");

    Ok(())
}

/// Install SIGTERM and SIGINT handlers
///
/// Returns a future resolving to the name of the first signal received.
#[cfg(unix)]
fn shutdown_signal() -> Result<impl std::future::Future<Output = &'static str>> {
    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to setup SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to setup SIGINT handler")?;

    Ok(async move {
        tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        }
    })
}

/// Install a CTRL-C handler
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
fn shutdown_signal() -> Result<impl std::future::Future<Output = &'static str>> {
    Ok(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to wait for CTRL-C: {}", e);
            std::future::pending::<()>().await;
        }
        "SIGINT"
    })
}
