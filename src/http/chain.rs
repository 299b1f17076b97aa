//! Admission chain composition.
//!
//! # Order
//! ```text
//! request
//!     → recovery       (catch panics from everything below)
//!     → metrics        (count every request, including rejected ones)
//!     → rate_limit     (per-client token bucket)
//!     → cors           (vary headers, allow-list, preflight answer)
//!     → authenticate   (attach Identity)
//!     → [route guards] (require_authenticated / activated / permission)
//!     → handler
//! ```
//!
//! `tower::ServiceBuilder` applies layers top to bottom, so the list in
//! [`AdmissionChain::wrap`] reads in request order.

use std::sync::Arc;

use axum::{middleware, Router};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;

use crate::config::ApiConfig;
use crate::http::recovery;
use crate::observability::metrics::{self, MetricsState};
use crate::security::authentication::{self, Authenticator};
use crate::security::cors::{self, CorsPolicy};
use crate::security::rate_limit::{self, ClientRegistry};
use crate::store::UserStore;

/// Shared state of every admission stage, built once per process.
#[derive(Clone)]
pub struct AdmissionChain {
    limiter: Arc<ClientRegistry>,
    metrics: Arc<MetricsState>,
    cors: Arc<CorsPolicy>,
    authenticator: Authenticator,
}

impl AdmissionChain {
    pub fn new(config: &ApiConfig, users: Arc<dyn UserStore>) -> Self {
        Self {
            limiter: Arc::new(ClientRegistry::new(&config.limiter)),
            metrics: Arc::new(MetricsState::new()),
            cors: Arc::new(CorsPolicy::new(&config.cors)),
            authenticator: Authenticator::new(users),
        }
    }

    pub fn limiter(&self) -> &Arc<ClientRegistry> {
        &self.limiter
    }

    pub fn metrics(&self) -> &Arc<MetricsState> {
        &self.metrics
    }

    /// Wrap an application router in the admission stages.
    ///
    /// Idle clients are only evicted while a sweeper runs. [`ApiServer::run`]
    /// starts one; callers serving the router themselves must call
    /// [`AdmissionChain::spawn_sweeper`].
    ///
    /// [`ApiServer::run`]: crate::http::ApiServer::run
    pub fn wrap(&self, routes: Router) -> Router {
        routes.layer(
            ServiceBuilder::new()
                .layer(CatchPanicLayer::custom(recovery::handle_panic))
                .layer(middleware::from_fn_with_state(
                    self.metrics.clone(),
                    metrics::track_metrics,
                ))
                .layer(middleware::from_fn_with_state(
                    self.limiter.clone(),
                    rate_limit::rate_limit,
                ))
                .layer(middleware::from_fn_with_state(
                    self.cors.clone(),
                    cors::negotiate_cors,
                ))
                .layer(middleware::from_fn_with_state(
                    self.authenticator.clone(),
                    authentication::authenticate,
                )),
        )
    }

    /// Start the idle-client sweeper; it runs until `shutdown` fires.
    ///
    /// Calling this again while a sweeper is running spawns a task that
    /// returns immediately.
    pub fn spawn_sweeper(&self, shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(self.limiter.clone().run_sweeper(shutdown))
    }
}
