//! Axum API server for CleanBites.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderName, HeaderValue, Method};
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::analysis::{Analyzer, PromptTemplates};
use crate::cache::ResponseCache;
use crate::config::{Config, ServerConfig};
use crate::error::Result;
use crate::providers::{GeminiExtractor, GeminiProvider, TextExtractor};
use crate::store::{ContentStore, FoodSearchStore, UserStore};

use super::routes::SESSION_HEADER;

/// Shared state for all API handlers.
#[derive(Clone)]
pub struct AppState {
    /// User profile records.
    pub users: Arc<UserStore>,
    /// Latest food submission per session.
    pub food: Arc<FoodSearchStore>,
    /// Cached AI responses.
    pub cache: Arc<ResponseCache>,
    // ── Model-backed services (absent when no Gemini credentials) ───────────
    /// Cached food analysis.
    pub analyzer: Option<Arc<Analyzer>>,
    /// Label image reader.
    pub extractor: Option<Arc<dyn TextExtractor>>,
}

impl AppState {
    pub fn new(users: UserStore, food: FoodSearchStore, cache: Arc<ResponseCache>) -> Self {
        Self {
            users: Arc::new(users),
            food: Arc::new(food),
            cache,
            analyzer: None,
            extractor: None,
        }
    }

    /// Wire stores, cache and (when credentials exist) Gemini services from
    /// configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let storage = &config.storage;
        let cache = Arc::new(
            ResponseCache::new(ContentStore::new(storage.cache_dir()))
                .with_compute_timeout(Duration::from_secs(config.cache.compute_timeout_secs))
                .with_per_key_locking(config.cache.per_key_locking),
        );
        let mut state = Self::new(
            UserStore::new(ContentStore::new(storage.users_dir())),
            FoodSearchStore::new(ContentStore::new(storage.food_dir())),
            Arc::clone(&cache),
        );

        let templates = PromptTemplates::load(&config.prompts)?;
        match GeminiProvider::from_config(&config.gemini)? {
            Some(provider) => {
                let provider = Arc::new(provider);
                info!(model = %provider.model(), "Gemini provider configured");
                state.analyzer = Some(Arc::new(Analyzer::new(
                    cache,
                    provider.clone(),
                    templates.analysis,
                )));
                state.extractor = Some(Arc::new(GeminiExtractor::new(
                    provider,
                    templates.extraction,
                )));
            }
            None => warn!(
                "No Gemini credentials (set GEMINI_API_KEY); analysis and extraction routes will return 503"
            ),
        }
        Ok(state)
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([
            HeaderName::from_static("content-type"),
            HeaderName::from_static(SESSION_HEADER),
        ])
}

/// Build the axum router with all API routes.
pub fn build_router(state: AppState, config: &ServerConfig) -> Router {
    let shared_state = Arc::new(state);

    Router::new()
        .route("/health", get(super::routes::health::get_health))
        // User details
        .route("/save-details", post(super::routes::users::save_details))
        .route(
            "/get-user-details/{user_id}",
            get(super::routes::users::get_user_details),
        )
        .route(
            "/update-user-details/{user_id}",
            post(super::routes::users::update_user_details),
        )
        // Food submission and label reading
        .route(
            "/save-food-details",
            post(super::routes::food::save_food_details),
        )
        .route(
            "/extract-text-from-image",
            post(super::routes::food::extract_text_from_image),
        )
        // Analysis
        .route("/gemini-call", post(super::routes::analysis::gemini_call))
        // Cache operations
        .route("/cache", delete(super::routes::cache::clear_cache))
        .route("/cache/stats", get(super::routes::cache::get_cache_stats))
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(cors_layer(&config.allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(shared_state)
}

/// Start the API server.
pub async fn start_server(
    config: &ServerConfig,
    state: AppState,
) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = build_router(state, config);
    let addr = format!("{}:{}", config.bind, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("CleanBites API listening on {addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("CleanBites API stopped");
    Ok(())
}

/// Resolves on Ctrl+C or, on unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
