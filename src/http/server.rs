//! HTTP server setup.
//!
//! # Responsibilities
//! - Wrap the application routes in the admission chain
//! - Add request IDs and access tracing around the chain
//! - Run the sweeper and the server until shutdown

use std::net::SocketAddr;

use axum::{http::HeaderName, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::ApiConfig;
use crate::http::chain::AdmissionChain;

pub const X_REQUEST_ID: &str = "x-request-id";

/// HTTP server fronted by the admission chain.
pub struct ApiServer {
    router: Router,
    chain: AdmissionChain,
    config: ApiConfig,
}

impl ApiServer {
    /// Build the server. `routes` carries its own route-level guards.
    pub fn new(config: ApiConfig, chain: AdmissionChain, routes: Router) -> Self {
        let router = Self::build_router(&chain, routes);
        Self {
            router,
            chain,
            config,
        }
    }

    fn build_router(chain: &AdmissionChain, routes: Router) -> Router {
        let request_id = HeaderName::from_static(X_REQUEST_ID);

        chain.wrap(routes).layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::new(request_id)),
        )
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            limiter_enabled = self.config.limiter.enabled,
            trusted_origins = self.config.cors.trusted_origins.len(),
            "HTTP server starting"
        );

        let sweeper = self.chain.spawn_sweeper(shutdown.resubscribe());

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        if let Err(e) = sweeper.await {
            tracing::warn!(error = %e, "Rate limiter sweeper ended abnormally");
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
