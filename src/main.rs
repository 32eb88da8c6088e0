use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use clap::Parser;
use tokio::sync::mpsc;

use tunelink::library::cache::LibraryCache;
use tunelink::prefs::PrefsStore;
use tunelink::server::router::{self, ServerState};
use tunelink::server::state::AppState;
use tunelink::{cli, config, server};

/// Set to true once the first Ctrl+C is received. Second Ctrl+C force-exits.
static SHUTTING_DOWN: AtomicBool = AtomicBool::new(false);

/// Wait for the first Ctrl+C (graceful shutdown).
/// On second Ctrl+C (during shutdown wait), force-exits immediately.
async fn wait_for_shutdown() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install Ctrl+C handler");
    if SHUTTING_DOWN.swap(true, Ordering::SeqCst) {
        eprintln!("\ntunelink: forced exit");
        std::process::exit(1);
    }
    tracing::info!("Shutting down...");
    tokio::spawn(async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
        eprintln!("\ntunelink: forced exit");
        std::process::exit(1);
    });
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = cli::Args::parse();

    let file_config = config::find_config_file(args.config.as_deref()).and_then(|path| {
        match config::load_config(&path) {
            Ok(cfg) => {
                tracing::debug!("Loaded config from {}", path.display());
                Some(cfg)
            }
            Err(e) => {
                tracing::warn!("Failed to parse config file: {}", e);
                None
            }
        }
    });
    let config = config::Config::resolve(file_config, &args);

    let prefs = PrefsStore::new(config.prefs.clone());
    let cache = Arc::new(LibraryCache::new(config.cache.clone()));
    let snapshot = Arc::new(RwLock::new(None));
    let serving_root = Arc::new(RwLock::new(None));

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let state = ServerState::new(
        Arc::clone(&snapshot),
        Arc::clone(&serving_root),
        prefs,
        cache,
        events_tx.clone(),
    );
    tokio::spawn(router::run(state, events_rx));

    let app_state = AppState::new(snapshot, serving_root, events_tx);
    let app = server::build_router(app_state, &config.assets);

    let addr = if config.localhost {
        format!("127.0.0.1:{}", config.port)
    } else {
        format!("0.0.0.0:{}", config.port)
    };
    tracing::info!("tunelink on http://{}", addr);
    tracing::info!("  desktop clients connect on /desktop, remotes on /remote");

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap_or_else(|e| {
        eprintln!("error: failed to bind {}: {}", addr, e);
        std::process::exit(1);
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown())
        .await
        .unwrap_or_else(|e| {
            eprintln!("error: server error: {}", e);
            std::process::exit(1);
        });

    tracing::info!("Goodbye.");
}
