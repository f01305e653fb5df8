//! HTML to PDF rendering through a headless browser backend.
//!
//! The engine owns no browser itself. Each render opens a fresh session from
//! the configured [`RenderBackend`] on the blocking pool, wrapped in a
//! [`RenderContext`] guard so the session is closed on every exit path:
//! success, backend error, panic, or the caller giving up after the timeout.

use crate::binder::RenderedDocument;
use crate::error::{DocumentError, Result};
use crate::job::RenderJob;
use crate::telemetry;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, error, info};

/// Paper sizes the engine can print to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum PageFormat {
    A3,
    #[default]
    A4,
    A5,
    Letter,
    Legal,
}

impl PageFormat {
    /// Page dimensions in PostScript points.
    pub fn dimensions(&self) -> (f64, f64) {
        match self {
            PageFormat::A3 => (841.89, 1190.55),
            PageFormat::A4 => (595.28, 841.89),
            PageFormat::A5 => (419.53, 595.28),
            PageFormat::Letter => (612.0, 792.0),
            PageFormat::Legal => (612.0, 1008.0),
        }
    }

    /// Page dimensions in inches, as the DevTools print call expects.
    pub fn paper_size_inches(&self) -> (f64, f64) {
        let (width, height) = self.dimensions();
        (width / 72.0, height / 72.0)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PageFormat::A3 => "A3",
            PageFormat::A4 => "A4",
            PageFormat::A5 => "A5",
            PageFormat::Letter => "Letter",
            PageFormat::Legal => "Legal",
        }
    }
}

impl fmt::Display for PageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PageFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a3" => Ok(PageFormat::A3),
            "a4" => Ok(PageFormat::A4),
            "a5" => Ok(PageFormat::A5),
            "letter" => Ok(PageFormat::Letter),
            "legal" => Ok(PageFormat::Legal),
            other => Err(format!("unknown page format '{}'", other)),
        }
    }
}

/// PDF bytes produced by one render.
#[derive(Debug, Clone)]
pub struct PdfArtifact {
    bytes: Vec<u8>,
    job_id: String,
}

impl PdfArtifact {
    pub fn new(bytes: Vec<u8>, job_id: String) -> Self {
        Self { bytes, job_id }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }
}

/// Starts rendering sessions (one browser process per session).
#[cfg_attr(test, mockall::automock)]
pub trait RenderBackend: Send + Sync {
    /// Opens a session that must give up on its own once `deadline` passes.
    fn open_session(&self, deadline: Instant) -> Result<Box<dyn RenderSession>>;
}

/// One live rendering session. Dropping it must release the browser.
pub trait RenderSession: Send {
    /// Loads `html` and returns once its images and fonts have settled.
    fn load(&mut self, html: &str) -> Result<()>;

    fn print_pdf(&mut self, format: PageFormat) -> Result<Vec<u8>>;
}

/// Counters for rendering context acquisition.
#[derive(Debug, Default)]
pub struct ContextStats {
    acquired: AtomicUsize,
    active: AtomicUsize,
}

impl ContextStats {
    /// Number of times a context was requested from the backend.
    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    /// Contexts currently open.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

/// Scoped rendering session. Releases the session and its concurrency permit on drop.
struct RenderContext {
    session: Option<Box<dyn RenderSession>>,
    stats: Arc<ContextStats>,
    job_id: String,
    _permit: OwnedSemaphorePermit,
}

impl RenderContext {
    fn acquire(
        backend: &dyn RenderBackend,
        stats: Arc<ContextStats>,
        permit: OwnedSemaphorePermit,
        job_id: String,
        deadline: Instant,
    ) -> Result<Self> {
        stats.acquired.fetch_add(1, Ordering::SeqCst);
        let session = backend.open_session(deadline)?;
        stats.active.fetch_add(1, Ordering::SeqCst);
        debug!(job_id = %job_id, "Rendering context acquired");

        Ok(Self {
            session: Some(session),
            stats,
            job_id,
            _permit: permit,
        })
    }

    fn render(&mut self, html: &str, format: PageFormat) -> Result<Vec<u8>> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| DocumentError::RenderFailed("session already closed".to_string()))?;
        session.load(html)?;
        session.print_pdf(format)
    }
}

impl Drop for RenderContext {
    fn drop(&mut self) {
        drop(self.session.take());
        self.stats.active.fetch_sub(1, Ordering::SeqCst);
        debug!(job_id = %self.job_id, "Rendering context released");
    }
}

/// Engine limits.
#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub timeout: Duration,
    pub max_concurrent: usize,
    pub page_format: PageFormat,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_concurrent: 4,
            page_format: PageFormat::A4,
        }
    }
}

/// Converts bound documents to PDF. Cheap to clone; clones share limits and counters.
#[derive(Clone)]
pub struct RenderEngine {
    backend: Arc<dyn RenderBackend>,
    stats: Arc<ContextStats>,
    permits: Arc<Semaphore>,
    settings: RenderSettings,
}

impl RenderEngine {
    pub fn new(backend: Arc<dyn RenderBackend>, settings: RenderSettings) -> Self {
        let permits = Arc::new(Semaphore::new(settings.max_concurrent.max(1)));
        Self {
            backend,
            stats: Arc::new(ContextStats::default()),
            permits,
            settings,
        }
    }

    pub fn stats(&self) -> &ContextStats {
        &self.stats
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    /// Renders with the configured page format.
    pub async fn render(&self, document: RenderedDocument) -> Result<PdfArtifact> {
        self.render_with_format(document, self.settings.page_format)
            .await
    }

    pub async fn render_with_format(
        &self,
        document: RenderedDocument,
        format: PageFormat,
    ) -> Result<PdfArtifact> {
        let mut job = RenderJob::new(document.template, format, document.html.len());
        let timeout = self.settings.timeout;
        let deadline = Instant::now() + timeout;

        let RenderedDocument { template, html } = document;
        let backend = self.backend.clone();
        let stats = self.stats.clone();
        let permits = self.permits.clone();
        let job_ref = &mut job;

        // One bound covers waiting for a slot and the render itself. The
        // session is handed the same deadline, so an abandoned render still
        // gives its slot back shortly after the caller stops waiting.
        let work = async move {
            let permit = permits.acquire_owned().await.map_err(|_| {
                DocumentError::RenderBackendUnavailable("render engine is shut down".to_string())
            })?;

            job_ref.start_rendering();
            info!(
                job_id = %job_ref.job_id,
                template = %template,
                page_format = %format,
                html_bytes = job_ref.html_bytes,
                "Rendering document"
            );
            let job_id = job_ref.job_id.clone();

            tokio::task::spawn_blocking(move || -> Result<Vec<u8>> {
                let mut context =
                    RenderContext::acquire(backend.as_ref(), stats, permit, job_id, deadline)?;
                context.render(&html, format)
            })
            .await
            .map_err(|join_error| {
                DocumentError::RenderFailed(format!("render task aborted: {}", join_error))
            })?
        };

        let result = match tokio::time::timeout(timeout, work).await {
            Ok(result) => result,
            Err(_) => Err(DocumentError::RenderTimeout(timeout)),
        }
        .and_then(|bytes| {
            if bytes.starts_with(b"%PDF") {
                Ok(bytes)
            } else {
                Err(DocumentError::RenderFailed(
                    "backend returned a non-PDF payload".to_string(),
                ))
            }
        });

        match &result {
            Ok(bytes) => job.mark_complete(bytes.len()),
            Err(e @ DocumentError::RenderTimeout(_)) => job.mark_timed_out(e.to_string()),
            Err(e) => job.mark_failed(e.to_string()),
        }
        telemetry::record_render_telemetry(&job);

        match result {
            Ok(bytes) => Ok(PdfArtifact::new(bytes, job.job_id)),
            Err(e) => {
                error!(job_id = %job.job_id, error = %e, "Render failed");
                Err(e)
            }
        }
    }
}
