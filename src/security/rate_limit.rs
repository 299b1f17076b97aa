//! Per-client rate limiting with idle eviction.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tokio::sync::broadcast;
use tokio::time::{self, Instant};

use crate::config::LimiterConfig;
use crate::http::request::client_ip;
use crate::http::response::ApiError;
use crate::observability::metrics;

/// How often the sweeper scans the registry.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Entries not seen for longer than this are evicted by the sweeper.
pub const IDLE_THRESHOLD: Duration = Duration::from_secs(3 * 60);

/// A simple token bucket rate limiter.
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            last_update: now,
        }
    }

    fn try_acquire(&mut self, capacity: f64, refill_rate: f64, now: Instant) -> bool {
        let elapsed = now.duration_since(self.last_update).as_secs_f64();

        // Refill tokens
        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

struct ClientEntry {
    bucket: TokenBucket,
    last_seen: Instant,
}

/// Tracks one token bucket per client key.
///
/// All reads and writes go through a single lock which is held only for the
/// admission check or one sweep, never across downstream handlers.
pub struct ClientRegistry {
    clients: Mutex<HashMap<String, ClientEntry>>,
    sweeper_running: AtomicBool,
    enabled: bool,
    refill_rate: f64,
    capacity: f64,
}

impl ClientRegistry {
    pub fn new(config: &LimiterConfig) -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            sweeper_running: AtomicBool::new(false),
            enabled: config.enabled,
            refill_rate: config.rps,
            capacity: f64::from(config.burst),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Decide whether `key` may make one more request now.
    ///
    /// A denied check consumes nothing but still refreshes `last_seen`.
    pub fn admit(&self, key: &str) -> bool {
        if !self.enabled {
            return true;
        }

        let now = Instant::now();
        let mut clients = self.lock();

        let entry = clients
            .entry(key.to_string())
            .or_insert_with(|| ClientEntry {
                bucket: TokenBucket::new(self.capacity, now),
                last_seen: now,
            });

        entry.last_seen = now;
        entry.bucket.try_acquire(self.capacity, self.refill_rate, now)
    }

    /// Remove every client idle for longer than [`IDLE_THRESHOLD`].
    ///
    /// Returns the number of entries removed.
    pub fn evict_idle(&self) -> usize {
        let now = Instant::now();
        let mut clients = self.lock();
        let before = clients.len();

        clients.retain(|_, entry| now.duration_since(entry.last_seen) <= IDLE_THRESHOLD);

        let evicted = before - clients.len();
        metrics::record_tracked_clients(clients.len());
        evicted
    }

    /// Number of tracked clients.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    /// Run the idle sweeper until `shutdown` fires.
    ///
    /// At most one sweeper runs per registry; further calls return at once.
    pub async fn run_sweeper(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        if !self.enabled {
            tracing::debug!("Rate limiter disabled, sweeper not started");
            return;
        }

        if self.sweeper_running.swap(true, Ordering::SeqCst) {
            tracing::warn!("Rate limiter sweeper already running");
            return;
        }

        tracing::info!(
            interval_secs = SWEEP_INTERVAL.as_secs(),
            idle_secs = IDLE_THRESHOLD.as_secs(),
            "Rate limiter sweeper starting"
        );

        let mut ticker = time::interval_at(Instant::now() + SWEEP_INTERVAL, SWEEP_INTERVAL);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let evicted = self.evict_idle();
                    if evicted > 0 {
                        tracing::debug!(evicted, "Evicted idle rate limiter clients");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Rate limiter sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }

        self.sweeper_running.store(false, Ordering::SeqCst);
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ClientEntry>> {
        // Entries stay consistent even if a holder panicked; keep serving.
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Middleware rejecting clients that exhausted their bucket.
pub async fn rate_limit(
    State(registry): State<Arc<ClientRegistry>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if registry.is_enabled() {
        let key = client_ip(&request);
        if !registry.admit(&key) {
            tracing::warn!(client = %key, "Rate limit exceeded");
            metrics::record_rate_limited();
            return Err(ApiError::RateLimitExceeded);
        }
    }

    Ok(next.run(request).await)
}
