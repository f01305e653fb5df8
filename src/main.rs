//! Declaration renderer service
//!
//! Serves the director declaration form, renders declarations and board
//! resolutions to PDF through headless Chrome, and stores submitted
//! documents and signatures under the upload root.
//!
//! ## Configuration
//!
//! See [`declaration_renderer::config`] for the full list of environment
//! variables. `RUST_LOG` controls the log level (default: info).

use anyhow::{Context, Result};
use declaration_renderer::{
    binder::DocumentBinder,
    chrome::ChromeBackend,
    config::{LogFormat, ServiceConfig},
    directors::StaticResolutionStore,
    http::{app_router, AppState},
    pipeline::DocumentPipeline,
    render::RenderEngine,
    sink::ArtifactSink,
    telemetry,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServiceConfig::from_env();

    // Initialize tracing
    let registry = tracing_subscriber::registry().with(
        EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
    );
    match config.log_format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Text => registry.with(fmt::layer()).init(),
    }

    // Initialize OpenTelemetry
    if let Some(endpoint) = &config.otlp_endpoint {
        if let Err(e) = telemetry::init_telemetry(endpoint) {
            warn!("Failed to initialize telemetry: {}", e);
        }
    }

    info!("Starting declaration renderer");
    info!(
        "Configuration: bind_addr={}, upload_root={}, page_format={}, max_concurrent_renders={}, render_timeout_ms={}",
        config.bind_addr,
        config.upload_root.display(),
        config.page_format,
        config.max_concurrent_renders,
        config.render_timeout.as_millis()
    );

    let sink = ArtifactSink::new(&config.upload_root);
    sink.ensure_storage_root()
        .context("Failed to prepare upload directory")?;

    let binder = DocumentBinder::new().context("Failed to load document templates")?;
    let backend = ChromeBackend::new(
        config.chrome_path.clone(),
        config.chrome_sandbox,
        config.render_timeout,
    );
    let engine = RenderEngine::new(Arc::new(backend), config.render_settings());
    let pipeline = DocumentPipeline::new(Arc::new(binder), engine, sink, config.max_image_bytes);

    let state = AppState {
        pipeline,
        resolutions: Arc::new(StaticResolutionStore::seeded()),
    };
    let app = app_router(state, config.body_limit_bytes);

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!("Listening on {}, press Ctrl+C to shutdown", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    telemetry::shutdown_telemetry();
    info!("Declaration renderer shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Received shutdown signal, draining in-flight requests..."),
        Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
    }
}
