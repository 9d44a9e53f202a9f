//! HTTP server setup.
//!
//! # Responsibilities
//! - Build the shared application state (limiters, filter, provider)
//! - Create the Axum router with per-route middleware stacks
//! - Wire cross-cutting layers (request ID, timeout, optional tracing)
//! - Run background tasks (store sweeper, config hot reload)
//! - Serve until the shutdown coordinator fires

use axum::http::StatusCode;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post, MethodRouter};
use axum::Router;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::{ConfigWatcher, GatewayConfig};
use crate::http::handlers::{analysis, chat, health};
use crate::http::middleware::{rate_limit_middleware, security_middleware, track_request, ScopedRateLimit};
use crate::http::request::{UuidRequestId, X_REQUEST_ID};
use crate::lifecycle::Shutdown;
use crate::llm::{CompletionProvider, LlmError, OpenAiProvider};
use crate::security::{Clock, RateLimitScope, RateLimiters, SecurityFilter, SecuritySettings, Sweeper, SystemClock};

/// Errors raised while assembling the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to build completion provider: {0}")]
    Provider(#[from] LlmError),

    #[error("Invalid security pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub limiters: Arc<RateLimiters>,
    pub filter: Arc<SecurityFilter>,
    pub provider: Arc<dyn CompletionProvider>,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(
        config: GatewayConfig,
        provider: Arc<dyn CompletionProvider>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ServerError> {
        let limiters = Arc::new(RateLimiters::in_memory(&config.rate_limits, clock.clone()));
        let settings = SecuritySettings::from_config(&config.security)?;
        let filter = Arc::new(SecurityFilter::in_memory(settings, clock.clone()));

        Ok(Self {
            config: Arc::new(config),
            limiters,
            filter,
            provider,
            clock,
        })
    }
}

/// HTTP server for the nutrition API.
pub struct HttpServer {
    state: AppState,
    router: Router,
    config_path: Option<PathBuf>,
}

impl HttpServer {
    /// Server talking to the configured OpenAI-compatible provider.
    pub fn new(config: GatewayConfig) -> Result<Self, ServerError> {
        let provider = OpenAiProvider::new(&config.provider)?;
        Self::with_provider(config, Arc::new(provider), Arc::new(SystemClock))
    }

    /// Server with an explicit provider and clock.
    pub fn with_provider(
        config: GatewayConfig,
        provider: Arc<dyn CompletionProvider>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ServerError> {
        let state = AppState::new(config, provider, clock)?;
        let router = build_router(state.clone());
        Ok(Self {
            state,
            router,
            config_path: None,
        })
    }

    /// Reload security settings whenever `path` changes.
    pub fn watch_config(mut self, path: PathBuf) -> Self {
        self.config_path = Some(path);
        self
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Serve on `listener` until `shutdown` triggers.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let sweeper = Sweeper::new(
            self.state.limiters.clone(),
            self.state.filter.clone(),
            Duration::from_secs(self.state.config.rate_limits.sweep_interval_secs),
        );
        tokio::spawn(sweeper.run(shutdown.subscribe()));

        // Dropping the watcher stops notifications, so it lives until serve returns.
        let _watcher = match self.config_path {
            Some(path) => spawn_config_reload(path, self.state.filter.clone(), &shutdown),
            None => None,
        };

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(Shutdown::wait(shutdown.subscribe()))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the router: one middleware stack per AI route, shared outer layers.
pub fn build_router(state: AppState) -> Router {
    let config = state.config.clone();

    let router = Router::new()
        .route("/api/chat", ai_route(&state, post(chat::chat), RateLimitScope::Chat))
        .route(
            "/api/nutrition-analysis",
            ai_route(&state, post(analysis::nutrition_analysis), RateLimitScope::Nutrition),
        )
        .route("/health", get(health::health).layer(from_fn(track_request)))
        .with_state(state)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.timeouts.request_secs),
        ))
        .layer(PropagateRequestIdLayer::new(X_REQUEST_ID));

    let router = if config.features.enable_request_logging {
        router.layer(TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<axum::body::Body>| {
            tracing::info_span!(
                "request",
                method = %request.method(),
                path = %request.uri().path(),
                request_id = crate::http::request::request_id(request),
            )
        }))
    } else {
        router
    };

    router.layer(SetRequestIdLayer::new(X_REQUEST_ID, UuidRequestId))
}

fn ai_route(
    state: &AppState,
    route: MethodRouter<AppState>,
    scope: RateLimitScope,
) -> MethodRouter<AppState> {
    let features = &state.config.features;

    let route = if features.enable_security_filter {
        route.layer(from_fn_with_state(state.filter.clone(), security_middleware))
    } else {
        route
    };

    let route = if features.enable_rate_limiting {
        let limit = ScopedRateLimit {
            limiters: state.limiters.clone(),
            scope,
        };
        route.layer(from_fn_with_state(limit, rate_limit_middleware))
    } else {
        route
    };

    route.layer(from_fn(track_request))
}

fn spawn_config_reload(
    path: PathBuf,
    filter: Arc<SecurityFilter>,
    shutdown: &Shutdown,
) -> Option<notify::RecommendedWatcher> {
    let (watcher, mut updates) = ConfigWatcher::new(&path);
    let handle = match watcher.run() {
        Ok(handle) => handle,
        Err(e) => {
            tracing::error!(path = ?path, error = %e, "Failed to start config watcher, hot reload disabled");
            return None;
        }
    };

    let mut shutdown_rx = shutdown.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(settings) = updates.recv() => {
                    tracing::info!(
                        policy = settings.policy.name(),
                        max_suspicious_attempts = settings.max_suspicious_attempts,
                        "Security settings reloaded"
                    );
                    filter.replace_settings(settings);
                }
                _ = shutdown_rx.recv() => break,
                else => break,
            }
        }
    });

    Some(handle)
}
