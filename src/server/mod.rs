use axum::{
    extract::{Path, RawQuery, Request, State},
    http::{header, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time::timeout;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info, warn};

use crate::auth::{require_bearer, TokenResponse, TokenService};
use crate::cache::{CacheClient, CacheStats};
use crate::config::Config;
use crate::error::{GatewayError, GatewayResult};
use crate::observability::MetricsRegistry;
use crate::resolve::NameResolver;
use crate::service::ResourceService;
use crate::types::{Endpoint, Filters, SortOrder, WarmupReport, WarmupStatus};
use crate::upstream::{HttpUpstream, Upstream};
use crate::warmup::WarmupOrchestrator;

/// HTTP server in front of the cached catalog
pub struct GatewayServer {
    app: Router,
    state: Arc<AppState>,
}

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub cache: Arc<CacheClient>,
    pub service: Arc<ResourceService>,
    pub warmup: Arc<WarmupOrchestrator>,
    pub tokens: Arc<TokenService>,
    pub metrics: MetricsRegistry,
}

impl AppState {
    /// Wire every component around an existing cache client and upstream
    pub fn new(
        config: Config,
        cache: Arc<CacheClient>,
        upstream: Arc<dyn Upstream>,
        metrics: MetricsRegistry,
    ) -> GatewayResult<Self> {
        let names = Arc::new(
            NameResolver::new(
                cache.clone(),
                upstream.clone(),
                config.cache.name_ttl_secs,
                config.cache.resolve_concurrency,
            )
            .with_metrics(metrics.metrics.clone()),
        );

        let service = Arc::new(
            ResourceService::new(
                cache.clone(),
                upstream.clone(),
                names,
                config.upstream.base_url.clone(),
                &config.cache,
            )
            .with_metrics(metrics.metrics.clone()),
        );

        let warmup = Arc::new(
            WarmupOrchestrator::new(
                cache.clone(),
                upstream,
                config.upstream.base_url.clone(),
                &config.warmup,
                config.cache.raw_ttl_secs,
            )
            .with_metrics(metrics.metrics.clone()),
        );

        let tokens = Arc::new(TokenService::new(&config.auth)?);

        Ok(Self {
            config,
            cache,
            service,
            warmup,
            tokens,
            metrics,
        })
    }
}

impl GatewayServer {
    /// Build all components from configuration and connect the cache
    pub async fn new(config: Config) -> GatewayResult<Self> {
        info!("Initializing gateway components...");
        config.validate()?;

        let metrics = MetricsRegistry::new()?;

        let cache = Arc::new(CacheClient::from_config(&config.redis)?);
        if let Err(e) = cache.connect().await {
            warn!("Cache unavailable, serving without cache: {}", e);
        }

        let upstream: Arc<dyn Upstream> =
            Arc::new(HttpUpstream::new(config.upstream_timeout())?.with_metrics(metrics.metrics.clone()));

        let state = Arc::new(AppState::new(config, cache, upstream, metrics)?);
        let app = router(state.clone());

        info!("Gateway initialized successfully");
        Ok(GatewayServer { app, state })
    }

    /// Serve until Ctrl-C, then release the cache connection
    pub async fn run(self) -> GatewayResult<()> {
        let config = &self.state.config;
        let bind_addr = format!("{}:{}", config.server.host, config.server.port);
        let listener = TcpListener::bind(&bind_addr)
            .await
            .map_err(|e| GatewayError::ConfigError(format!("Failed to bind to {}: {}", bind_addr, e)))?;

        info!("HTTP server listening on {}", bind_addr);

        if config.warmup.on_startup {
            let warmup = self.state.warmup.clone();
            tokio::spawn(async move {
                let report = warmup.warm_all().await;
                info!(status = report.status.as_str(), "Startup warm-up complete: {}", report.message);
            });
        }

        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| GatewayError::Internal(format!("Server error: {}", e)))?;

        self.state.cache.disconnect().await;
        info!("Gateway stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Routes, the bearer gate and the shared layers
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .allow_origin(Any)
        .max_age(Duration::from_secs(3600));

    let api = Router::new()
        .route("/:endpoint", get(list_handler))
        .route("/:endpoint/:id", get(item_handler))
        .route_layer(middleware::from_fn_with_state(state.tokens.clone(), require_bearer));

    // Warm-up runs to completion, so it sits outside the request deadline
    Router::new()
        .route("/auth", post(auth_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .nest("/api/v1/swapi", api)
        .route_layer(middleware::from_fn_with_state(state.clone(), deadline_middleware))
        .route("/warm-cache", post(warm_cache_handler))
        .layer(RequestBodyLimitLayer::new(state.config.server.max_request_size))
        .layer(middleware::from_fn_with_state(state.clone(), request_metrics_middleware))
        .layer(cors)
        .with_state(state)
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn error_response(e: &GatewayError) -> ApiError {
    let status = StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::BAD_GATEWAY);
    let message = match e {
        GatewayError::Internal(_) | GatewayError::ConfigError(_) => "Internal server error".to_string(),
        other => other.to_string(),
    };
    (
        status,
        Json(ErrorResponse {
            error: e.error_type().to_string(),
            message,
        }),
    )
}

/// Request deadline; expiry answers 504
async fn deadline_middleware(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    let deadline = Duration::from_millis(state.config.server.request_timeout_ms);
    match timeout(deadline, next.run(request)).await {
        Ok(response) => response,
        Err(_) => {
            error!("Request timed out after {:?}", deadline);
            error_response(&GatewayError::Timeout).into_response()
        }
    }
}

/// Per-status request counting
async fn request_metrics_middleware(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    let response = next.run(request).await;
    state
        .metrics
        .metrics
        .http_requests_total
        .with_label_values(&[response.status().as_str()])
        .inc();
    response
}

/// Listing query: filters plus `sort_by` and `order`
#[derive(Debug, Default, PartialEq)]
struct ListQuery {
    filters: Filters,
    sort_by: Option<String>,
    order: SortOrder,
}

fn parse_list_query(endpoint: Endpoint, raw: Option<&str>) -> GatewayResult<ListQuery> {
    let mut sort_by = None;
    let mut order = SortOrder::default();
    let mut filter_pairs = Vec::new();

    for (key, value) in url::form_urlencoded::parse(raw.unwrap_or_default().as_bytes()) {
        match key.as_ref() {
            "sort_by" => sort_by = Some(value.into_owned()).filter(|v| !v.is_empty()),
            "order" if !value.is_empty() => order = value.parse()?,
            "order" => {}
            _ => filter_pairs.push((key.into_owned(), value.into_owned())),
        }
    }

    Ok(ListQuery {
        filters: Filters::from_pairs(endpoint, filter_pairs)?,
        sort_by,
        order,
    })
}

async fn list_handler(
    State(state): State<Arc<AppState>>,
    Path(endpoint): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<Json<Value>, ApiError> {
    let endpoint: Endpoint = endpoint.parse().map_err(|e| error_response(&e))?;
    let query = parse_list_query(endpoint, query.as_deref()).map_err(|e| error_response(&e))?;
    let filters = (!query.filters.is_empty()).then_some(&query.filters);

    state
        .service
        .list_resources(endpoint, filters, query.sort_by.as_deref(), query.order)
        .await
        .map(Json)
        .map_err(|e| {
            error!(endpoint = %endpoint, "Listing failed: {}", e);
            error_response(&e)
        })
}

async fn item_handler(
    State(state): State<Arc<AppState>>,
    Path((endpoint, id)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let endpoint: Endpoint = endpoint.parse().map_err(|e| error_response(&e))?;

    state.service.get_resource(endpoint, &id).await.map(Json).map_err(|e| {
        error!(endpoint = %endpoint, id = %id, "Lookup failed: {}", e);
        error_response(&e)
    })
}

async fn auth_handler(State(state): State<Arc<AppState>>) -> Result<(StatusCode, Json<TokenResponse>), ApiError> {
    let token = state.tokens.issue().map_err(|e| error_response(&e))?;
    Ok((StatusCode::CREATED, Json(token)))
}

async fn warm_cache_handler(State(state): State<Arc<AppState>>) -> (StatusCode, Json<WarmupReport>) {
    // A dropped connection must not cancel the run halfway
    let warmup = state.warmup.clone();
    let report = match tokio::spawn(async move { warmup.warm_all().await }).await {
        Ok(report) => report,
        Err(e) => {
            error!("Warm-up task failed: {}", e);
            WarmupReport::error("warm-up task failed")
        }
    };
    let status = match report.status {
        WarmupStatus::Error => StatusCode::SERVICE_UNAVAILABLE,
        WarmupStatus::Success | WarmupStatus::Partial => StatusCode::OK,
    };
    (status, Json(report))
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let cache = state.cache.ping().await;
    Json(HealthResponse {
        status: if cache { "ok" } else { "degraded" }.to_string(),
        cache,
        cache_stats: state.cache.stats(),
        timestamp: chrono::Utc::now(),
    })
}

async fn metrics_handler(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let body = state.metrics.gather().map_err(|e| error_response(&e))?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body).into_response())
}

/// Error response structure
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Health check response structure
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub cache: bool,
    pub cache_stats: CacheStats,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}
