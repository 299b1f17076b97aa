//! API gatekeeper demo server.
//!
//! Serves a handful of routes behind the admission chain, backed by an
//! in-memory identity store.
//!
//! ```text
//!  request ─▶ recovery ─▶ metrics ─▶ rate limit ─▶ cors ─▶ authenticate ─▶ guard ─▶ handler
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use api_gatekeeper::config::{load_config, ApiConfig};
use api_gatekeeper::lifecycle::signals;
use api_gatekeeper::observability::{logging, metrics};
use api_gatekeeper::security::{require_activated, require_permission, Identity};
use api_gatekeeper::security::User;
use api_gatekeeper::store::{validate_token_plaintext, MemoryStore, TokenScope};
use api_gatekeeper::{AdmissionChain, ApiServer, Shutdown};
use axum::{routing::get, Json, Router};
use clap::Parser;
use serde_json::{json, Value};
use tokio::net::TcpListener;

#[derive(Parser, Debug)]
#[command(name = "api-gatekeeper", version, about = "Admission layer demo server")]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Register an activated demo user holding this authentication token
    /// and the `metrics:read` permission.
    #[arg(long, value_name = "TOKEN")]
    demo_token: Option<String>,
}

async fn healthcheck() -> Json<Value> {
    Json(json!({
        "status": "available",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn whoami(identity: Identity) -> Json<Value> {
    match identity.user() {
        Some(user) => Json(json!({
            "id": user.id,
            "name": user.name,
            "email": user.email,
        })),
        None => Json(json!({ "anonymous": true })),
    }
}

fn routes(chain: &AdmissionChain, store: Arc<MemoryStore>) -> Router {
    Router::new()
        .route("/v1/healthcheck", get(healthcheck))
        .route("/v1/whoami", require_activated(get(whoami)))
        .route(
            "/debug/vars",
            require_permission(
                "metrics:read",
                store,
                get(metrics::debug_vars).with_state(chain.metrics().clone()),
            ),
        )
}

fn seed_demo_user(store: &MemoryStore, token: &str) -> Result<(), String> {
    if !validate_token_plaintext(token) {
        return Err("demo token must be 26 base32 characters (A-Z, 2-7)".to_string());
    }

    store.insert_user(User {
        id: 1,
        name: "Demo".to_string(),
        email: "demo@example.com".to_string(),
        activated: true,
    });
    store.insert_token(TokenScope::Authentication, token, 1);
    store.grant(1, ["metrics:read"]);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => ApiConfig::default(),
    };

    logging::init_logging(&config.observability.log_level);
    tracing::info!("api-gatekeeper v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        limiter_enabled = config.limiter.enabled,
        limiter_rps = config.limiter.rps,
        limiter_burst = config.limiter.burst,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start Prometheus exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let store = Arc::new(MemoryStore::new());
    if let Some(token) = &args.demo_token {
        seed_demo_user(&store, token)?;
        tracing::info!(user_id = 1, "Demo user registered");
    }

    let chain = AdmissionChain::new(&config, store.clone());
    let app_routes = routes(&chain, store);

    let listener = TcpListener::bind(&config.listener.bind_address).await?;

    let shutdown = Shutdown::new();
    signals::trigger_on_signal(shutdown.clone());

    let server = ApiServer::new(config, chain, app_routes);
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
