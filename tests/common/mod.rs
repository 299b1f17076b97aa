//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use api_gatekeeper::config::ApiConfig;
use api_gatekeeper::observability::metrics;
use api_gatekeeper::security::{require_activated, require_authenticated, require_permission, Identity, User};
use api_gatekeeper::store::{MemoryStore, TokenScope};
use api_gatekeeper::AdmissionChain;
use axum::{
    body::Body,
    http::{request::Builder, Method, Request},
    response::Response,
    routing::{get, put},
    Router,
};
use tower::ServiceExt;

pub const ACTIVE_TOKEN: &str = "AAAAAAAAAAAAAAAAAAAAAAAAAA";
pub const INACTIVE_TOKEN: &str = "BBBBBBBBBBBBBBBBBBBBBBBBBB";
pub const ADMIN_TOKEN: &str = "CCCCCCCCCCCCCCCCCCCCCCCCCC";
pub const TRUSTED_ORIGIN: &str = "http://localhost:9000";

pub struct TestApp {
    pub router: Router,
    pub chain: AdmissionChain,
    pub store: Arc<MemoryStore>,
    pub handler_hits: Arc<AtomicUsize>,
}

impl TestApp {
    pub fn hits(&self) -> usize {
        self.handler_hits.load(Ordering::SeqCst)
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }
}

/// Limiter off, one trusted origin.
pub fn default_config() -> ApiConfig {
    let mut config = ApiConfig::default();
    config.limiter.enabled = false;
    config.cors.trusted_origins.insert(TRUSTED_ORIGIN.to_string());
    config
}

fn seed(store: &MemoryStore) {
    for (id, name, activated, token) in [
        (1, "Active", true, ACTIVE_TOKEN),
        (2, "Inactive", false, INACTIVE_TOKEN),
        (3, "Admin", true, ADMIN_TOKEN),
    ] {
        store.insert_user(User {
            id,
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            activated,
        });
        store.insert_token(TokenScope::Authentication, token, id);
    }
    store.grant(1, ["movies:read"]);
    store.grant(3, ["movies:read", "movies:write", "metrics:read"]);
}

pub fn test_app(config: ApiConfig) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    seed(&store);

    let chain = AdmissionChain::new(&config, store.clone());
    let hits = Arc::new(AtomicUsize::new(0));

    TestApp {
        router: chain.wrap(routes(&chain, &store, &hits)),
        chain,
        store,
        handler_hits: hits,
    }
}

fn counted(
    hits: &Arc<AtomicUsize>,
) -> impl Fn(Identity) -> std::pin::Pin<Box<dyn std::future::Future<Output = String> + Send>>
       + Clone
       + Send
       + Sync
       + 'static {
    let hits = hits.clone();
    move |identity: Identity| {
        let hits = hits.clone();
        Box::pin(async move {
            hits.fetch_add(1, Ordering::SeqCst);
            match identity.user() {
                Some(user) => format!("user:{}", user.id),
                None => "anonymous".to_string(),
            }
        })
    }
}

/// Application routes used by the tests, not yet wrapped in the chain.
pub fn routes(chain: &AdmissionChain, store: &Arc<MemoryStore>, hits: &Arc<AtomicUsize>) -> Router {
    Router::new()
        .route("/v1/healthcheck", get(counted(hits)))
        .route("/v1/me", require_authenticated(get(counted(hits))))
        .route("/v1/whoami", require_activated(get(counted(hits))))
        .route(
            "/v1/movies/{id}",
            require_permission("movies:read", store.clone(), get(counted(hits))).merge(
                require_permission("movies:write", store.clone(), put(counted(hits))),
            ),
        )
        .route(
            "/v1/panic",
            get(|| async {
                if true {
                    panic!("handler exploded");
                }
                "unreachable"
            }),
        )
        .route(
            "/debug/vars",
            require_permission(
                "metrics:read",
                store.clone(),
                get(metrics::debug_vars).with_state(chain.metrics().clone()),
            ),
        )
}

/// Request builder tagged with a client address.
pub fn request(method: Method, uri: &str, client: &str) -> Builder {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("x-real-ip", client)
}

pub fn get_as(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = request(Method::GET, uri, "198.51.100.1");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub fn vary(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all("vary")
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}
