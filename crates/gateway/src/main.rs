use std::sync::Arc;

use anyhow::Context;
use axum::http::{header, Method};
use clap::{Parser, Subcommand};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use vb_conversation::ConversationStore;
use vb_domain::config::Config;
use vb_gateway::api;
use vb_gateway::state::AppState;
use vb_gateway::tools::ToolDispatcher;
use vb_store::{RestStoreClient, StoreProvider};

#[derive(Parser)]
#[command(name = "voicebridge", about = "Real-time voice bridge for spa bookings")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the bridge server (default).
    Serve,
    /// Print the version and exit.
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        // Default to serve when no subcommand is given.
        None | Some(Command::Serve) => {
            let config = Config::from_env().context("loading configuration")?;
            init_tracing(&config.log_level);
            run_server(Arc::new(config)).await
        }
        Some(Command::Version) => {
            println!("voicebridge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Initialize structured JSON tracing.
fn init_tracing(log_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("{log_level},vb_gateway=debug"))),
        )
        .json()
        .init();
}

/// Start the bridge server with the given configuration.
async fn run_server(config: Arc<Config>) -> anyhow::Result<()> {
    tracing::info!(
        model = %config.realtime.model,
        voice = %config.realtime.voice,
        spa = %config.spa.name,
        "VoiceBridge starting"
    );

    // ── Booking store client ─────────────────────────────────────────
    let store: Arc<dyn StoreProvider> = Arc::new(
        RestStoreClient::new(&config.store).context("creating booking store client")?,
    );
    tracing::info!(url = %config.store.base_url, "booking store client ready");

    // ── Conversation store ───────────────────────────────────────────
    let conversations = Arc::new(ConversationStore::new());
    tracing::info!("conversation store ready");

    // ── Tool dispatcher ──────────────────────────────────────────────
    let dispatcher = Arc::new(ToolDispatcher::new(
        store.clone(),
        config.spa.clone(),
        &config.tools,
    ));
    tracing::info!(
        timeout_secs = config.tools.dispatch_timeout.as_secs(),
        "tool dispatcher ready"
    );

    let state = AppState {
        config: config.clone(),
        store,
        conversations,
        dispatcher,
    };

    // ── CORS (webhook + diagnostics surface, browser dashboards) ────
    let cors_layer = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    // ── Concurrency limit (backpressure protection) ──────────────────
    let max_concurrent = std::env::var("MAX_CONCURRENT_REQUESTS")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(256);
    tracing::info!(max_concurrent, "concurrency limit set");

    // ── Router ───────────────────────────────────────────────────────
    let app = api::router()
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_concurrent))
        .with_state(state);

    // ── Bind ─────────────────────────────────────────────────────────
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;

    tracing::info!(addr = %addr, "VoiceBridge listening");

    axum::serve(listener, app)
        .await
        .context("axum server error")?;

    Ok(())
}
