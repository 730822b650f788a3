use axum::{
    extract::{Query, State},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::blob_store::BlobStore;
use crate::error::{Result, StylizerError};
use crate::generator::ImageGenerator;
use crate::orchestrator::Orchestrator;
use crate::outcome::StyleReport;
use crate::rate_limiter::SlidingWindowLimiter;
use crate::styles::StyleCatalog;
use crate::validation::{validated, ListQuery, ListRequest, StyleRequest};

/// Shared application state
pub type SharedState = Arc<AppState>;

/// Message returned by the API when no storage connection string is set
pub const STORAGE_NOT_CONFIGURED: &str = "storage connection string is not set";

/// The blob store, or the reason there is none
pub type StorageSlot = std::result::Result<Arc<dyn BlobStore>, String>;

/// Everything a request handler needs. Built once at startup.
pub struct AppState {
    pub rate_limiter: Arc<SlidingWindowLimiter>,
    /// `Err` holds the message reported while storage is missing or misconfigured
    pub storage: StorageSlot,
    /// `None` when the generation API key or endpoint is missing
    pub generator: Option<Arc<dyn ImageGenerator>>,
    pub catalog: Arc<StyleCatalog>,
}

impl AppState {
    fn admit(&self) -> Result<()> {
        if self.rate_limiter.admit() {
            Ok(())
        } else {
            Err(StylizerError::RateLimited {
                limit: self.rate_limiter.settings().limit,
                retry_after: self.rate_limiter.retry_after(),
            })
        }
    }

    fn storage(&self) -> Result<Arc<dyn BlobStore>> {
        self.storage.clone().map_err(StylizerError::Configuration)
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub storage_configured: bool,
    pub generation_configured: bool,
    pub styles: Vec<String>,
    pub rate_limit: RateLimitStatus,
}

#[derive(Debug, Serialize)]
pub struct RateLimitStatus {
    pub limit: usize,
    pub window_secs: u64,
    pub in_window: usize,
}

/// List every blob path in a container
pub async fn list_files(
    State(state): State<SharedState>,
    Query(query): Query<ListQuery>,
    body: Option<Json<ListQuery>>,
) -> Result<Json<Vec<String>>> {
    state.admit()?;
    let store = state.storage()?;

    let request = validated(ListRequest::resolve(query, body.map(|Json(b)| b)))?;
    tracing::info!(container = %request.container, "Listing files");

    let files = store
        .list(&request.container, "")
        .await
        .map_err(|e| StylizerError::Storage(format!("Error listing files: {}", e)))?;

    Ok(Json(files))
}

/// Back up and restyle every image under the source folder
pub async fn style_images(
    State(state): State<SharedState>,
    body: Option<Json<StyleRequest>>,
) -> Result<Json<StyleReport>> {
    state.admit()?;
    let store = state.storage()?;

    let request = validated(body.map(|Json(b)| b).unwrap_or_default())?;
    if state.generator.is_none() {
        tracing::warn!("Image generation API is not configured; styles will be reported as failed");
    }

    let orchestrator = Orchestrator::new(
        store,
        state.generator.clone(),
        Arc::clone(&state.catalog),
    );
    let run_request = request.clone();
    // A panic inside the run surfaces as a 500 instead of dropping the connection.
    let outcome = tokio::spawn(async move {
        orchestrator
            .run(
                &run_request.container,
                &run_request.source_folder,
                &run_request.output_folder,
            )
            .await
    })
    .await
    .map_err(|e| StylizerError::Internal(format!("style run aborted: {}", e)))??;

    Ok(Json(StyleReport::new(
        &request.container,
        &request.source_folder,
        outcome,
    )))
}

/// Health check endpoint; not rate limited
pub async fn health_check(State(state): State<SharedState>) -> Json<HealthResponse> {
    let settings = state.rate_limiter.settings();

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        storage_configured: state.storage.is_ok(),
        generation_configured: state.generator.is_some(),
        styles: state.catalog.names().into_iter().map(String::from).collect(),
        rate_limit: RateLimitStatus {
            limit: settings.limit,
            window_secs: settings.window.as_secs(),
            in_window: state.rate_limiter.in_window(),
        },
    })
}
