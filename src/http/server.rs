//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router with the public and admin handlers
//! - Wire up middleware (request ID, tracing, timeout, body limit, CSRF, metrics)
//! - Apply configuration reloads to live state
//! - Serve until the shutdown signal fires

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    http::Request,
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::ServiceBuilder;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin::setup_admin_router;
use crate::config::GuardConfig;
use crate::http::handlers::{check_rate_limit_handler, health_handler, validate_url_handler};
use crate::http::middleware::{csrf_middleware, track_metrics};
use crate::http::request::{make_request_span, UuidRequestId};
use crate::security::csrf::CsrfGuard;
use crate::security::rate_limit::RateLimiter;
use crate::security::store::RateLimitStore;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub limiter: RateLimiter,
    pub config: Arc<ArcSwap<GuardConfig>>,
    pub csrf: Arc<ArcSwap<CsrfGuard>>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: GuardConfig, store: Arc<dyn RateLimitStore>) -> Self {
        Self {
            limiter: RateLimiter::new(store),
            csrf: Arc::new(ArcSwap::from_pointee(CsrfGuard::from_config(&config.csrf))),
            config: Arc::new(ArcSwap::from_pointee(config)),
            started_at: Instant::now(),
        }
    }

    pub fn store(&self) -> &Arc<dyn RateLimitStore> {
        self.limiter.store()
    }

    /// Whether `config` changes settings that are only read at startup.
    pub fn restart_required(&self, config: &GuardConfig) -> bool {
        let current = self.config.load();
        current.listener != config.listener
            || current.rate_limit.persistence_path != config.rate_limit.persistence_path
    }

    /// Swap in a reloaded config. The CSRF guard is rebuilt from it.
    pub fn apply_config(&self, config: GuardConfig) {
        if self.restart_required(&config) {
            tracing::warn!("Listener and store settings only take effect on restart");
        }
        self.csrf.store(Arc::new(CsrfGuard::from_config(&config.csrf)));
        self.config.store(Arc::new(config));
        tracing::info!("Configuration reloaded");
    }
}

/// HTTP server for the guard API.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration and counter store.
    pub fn new(config: GuardConfig, store: Arc<dyn RateLimitStore>) -> Self {
        let state = AppState::new(config, store);
        let router = Self::build_router(&state);
        Self { router, state }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(state: &AppState) -> Router {
        let config = state.config.load();

        let mut router = Router::new()
            .route("/health", get(health_handler))
            .route("/v1/rate-limit/{preset}", post(check_rate_limit_handler))
            .route("/v1/validate-url", post(validate_url_handler))
            .with_state(state.clone());

        if config.admin.enabled {
            router = router.merge(setup_admin_router(state.clone()));
        }

        router
            .layer(middleware::from_fn_with_state(state.clone(), csrf_middleware))
            .layer(middleware::from_fn(track_metrics))
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                    .layer(
                        TraceLayer::new_for_http()
                            .make_span_with(|req: &Request<Body>| make_request_span(req)),
                    )
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
                    .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs))),
            )
    }

    /// The fully layered router, for driving without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Serve on `listener`, applying config updates, until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<GuardConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let state = self.state.clone();
        tokio::spawn(async move {
            while let Some(config) = config_updates.recv().await {
                state.apply_config(config);
            }
        });

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
