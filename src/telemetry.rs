//! Telemetry and structured logging for render jobs.

use crate::job::{JobStatus, RenderJob};
use opentelemetry::trace::{Span, Tracer};
use opentelemetry::{global, KeyValue};
use tracing::{info, warn};

const TRACER_NAME: &str = "declaration-renderer";

/// Renders slower than this are logged as warnings.
const SLOW_RENDER_MS: i64 = 5000;

/// Records telemetry for a finished render.
///
/// Emits a `render_job` span and a structured log line so render health can
/// be watched per template. Attributes include:
/// - Job id, template and page format
/// - Status and duration (ms)
/// - HTML input and PDF output sizes
/// - Error message (failed and timed-out jobs only)
///
/// Renders over 5 seconds are also logged as warnings.
///
/// # Arguments
///
/// * `job` - The job after `mark_complete`, `mark_failed` or `mark_timed_out`
pub fn record_render_telemetry(job: &RenderJob) {
    let tracer = global::tracer(TRACER_NAME);
    let mut span = tracer.start("render_job");

    span.set_attribute(KeyValue::new("job_id", job.job_id.clone()));
    span.set_attribute(KeyValue::new("template", job.template));
    span.set_attribute(KeyValue::new("page_format", job.page_format.as_str()));
    span.set_attribute(KeyValue::new("status", job.status.to_string()));
    span.set_attribute(KeyValue::new("html_bytes", job.html_bytes as i64));

    if let Some(pdf_bytes) = job.pdf_bytes {
        span.set_attribute(KeyValue::new("pdf_bytes", pdf_bytes as i64));
    }

    if let Some(duration_ms) = job.processing_duration_ms() {
        span.set_attribute(KeyValue::new("duration_ms", duration_ms));

        info!(
            job_id = %job.job_id,
            template = job.template,
            duration_ms = duration_ms,
            status = %job.status,
            pdf_bytes = job.pdf_bytes.unwrap_or(0),
            "Render job finished"
        );

        if duration_ms > SLOW_RENDER_MS {
            warn!(
                job_id = %job.job_id,
                duration_ms = duration_ms,
                "Render exceeded performance threshold ({}ms)",
                SLOW_RENDER_MS
            );
        }
    }

    if matches!(job.status, JobStatus::Failed | JobStatus::TimedOut) {
        if let Some(ref error) = job.error {
            span.set_attribute(KeyValue::new("error", error.clone()));
            warn!(
                job_id = %job.job_id,
                status = %job.status,
                error = %error,
                "Render job did not complete"
            );
        }
    }

    span.end();
}

/// Installs the OTLP trace exporter.
///
/// Called once at startup when `OTEL_EXPORTER_OTLP_ENDPOINT` is configured.
/// `OTEL_SERVICE_NAME` overrides the reported service name.
///
/// # Arguments
///
/// * `endpoint` - OTLP gRPC collector address, e.g. `http://localhost:4317`
///
/// # Returns
///
/// An error if the exporter could not be built; the service keeps running
/// with the no-op tracer in that case.
pub fn init_telemetry(endpoint: &str) -> Result<(), Box<dyn std::error::Error>> {
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::trace::Config;

    let service_name =
        std::env::var("OTEL_SERVICE_NAME").unwrap_or_else(|_| TRACER_NAME.to_string());

    let tracer = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(
            opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(endpoint),
        )
        .with_trace_config(Config::default().with_resource(
            opentelemetry_sdk::Resource::new(vec![
                KeyValue::new("service.name", service_name),
                KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
            ]),
        ))
        .install_batch(opentelemetry_sdk::runtime::Tokio)?;

    if let Some(provider) = tracer.provider() {
        global::set_tracer_provider(provider);
    }

    info!("Telemetry initialized: endpoint={}", endpoint);
    Ok(())
}

/// Flushes pending spans on shutdown.
///
/// Blocks until the batch exporter has drained, so call it after the HTTP
/// server has stopped accepting requests.
pub fn shutdown_telemetry() {
    global::shutdown_tracer_provider();
}
