use crate::blob_store::{BlobStore, ObjectStoreBlobStore};
use crate::config::Config;
use crate::handlers::{
    health_check, list_files, style_images, AppState, SharedState, STORAGE_NOT_CONFIGURED,
};
use crate::middleware::logging_middleware;
use crate::rate_limiter::SlidingWindowLimiter;
use crate::styles::StyleCatalog;
use anyhow::Context;
use axum::routing::get;
use axum::{middleware, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Build the router around an already assembled state
pub fn create_app(state: SharedState) -> Router {
    Router::new()
        .route("/api/list_files", get(list_files).post(list_files))
        .route("/api/style_images", get(style_images).post(style_images))
        .route("/health", get(health_check))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(middleware::from_fn(logging_middleware)),
        )
}

/// Assemble the shared state from configuration
pub fn build_state(config: &Config) -> anyhow::Result<SharedState> {
    let catalog = match &config.styles_path {
        Some(path) => StyleCatalog::from_json_file(path)
            .with_context(|| format!("Failed to load style catalog from {}", path.display()))?,
        None => StyleCatalog::builtin(),
    };

    let storage = match &config.storage_connection {
        Some(raw) => match ObjectStoreBlobStore::from_connection_string(raw) {
            Ok(store) => {
                tracing::info!(backend = store.backend_name(), "Blob storage configured");
                Ok(Arc::new(store) as Arc<dyn BlobStore>)
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    "Invalid storage connection string; API requests will fail with 500"
                );
                Err(format!("Invalid storage connection string: {}", e))
            }
        },
        None => {
            tracing::warn!("No storage connection string set; API requests will fail with 500");
            Err(STORAGE_NOT_CONFIGURED.to_string())
        }
    };

    let generator = config
        .generation
        .build_generator()
        .context("Failed to create image generation client")?;
    if generator.is_none() {
        tracing::warn!("IMAGE_API_KEY or IMAGE_API_ENDPOINT not set; image generation disabled");
    }

    Ok(Arc::new(AppState {
        rate_limiter: Arc::new(SlidingWindowLimiter::new(config.rate_limit)),
        storage,
        generator,
        catalog: Arc::new(catalog),
    }))
}

pub struct Server {
    app: Router,
    bind_addr: SocketAddr,
}

impl Server {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let state = build_state(config)?;
        Ok(Self {
            app: create_app(state),
            bind_addr: config.bind_addr,
        })
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.bind_addr)
            .await
            .with_context(|| format!("Failed to bind {}", self.bind_addr))?;

        tracing::info!("Stylizer server listening on {}", self.bind_addr);
        tracing::info!("Health check available at /health");

        axum::serve(
            listener,
            self.app
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;

        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        },
    }
}
