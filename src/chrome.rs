//! Chrome DevTools Protocol backend for the render engine.

use crate::error::{DocumentError, Result};
use crate::render::{PageFormat, RenderBackend, RenderSession};
use headless_chrome::browser::tab::Tab;
use headless_chrome::types::PrintToPdfOptions;
use headless_chrome::{Browser, LaunchOptions};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Extra time a browser may sit idle before Chrome's own watchdog kills it.
const IDLE_GRACE: Duration = Duration::from_secs(5);

// Resolves once every image has loaded or failed and web fonts are ready.
const WAIT_FOR_ASSETS: &str = r#"
Promise.all(Array.from(document.images, function (img) {
    if (img.complete) return Promise.resolve();
    return new Promise(function (resolve) {
        img.addEventListener('load', resolve, { once: true });
        img.addEventListener('error', resolve, { once: true });
    });
}))
.then(function () { return document.fonts ? document.fonts.ready : null; })
.then(function () { return document.images.length; })
"#;

/// Launches one headless Chrome process per session.
#[derive(Debug, Clone)]
pub struct ChromeBackend {
    path: Option<PathBuf>,
    sandbox: bool,
    timeout: Duration,
}

impl ChromeBackend {
    /// `timeout` is the render bound; Chrome's idle watchdog fires a little after it.
    /// Individual DevTools calls are limited by the per-render deadline instead.
    pub fn new(path: Option<PathBuf>, sandbox: bool, timeout: Duration) -> Self {
        Self {
            path,
            sandbox,
            timeout,
        }
    }
}

impl RenderBackend for ChromeBackend {
    fn open_session(&self, deadline: Instant) -> Result<Box<dyn RenderSession>> {
        let launch_options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(self.sandbox)
            .path(self.path.clone())
            .idle_browser_timeout(self.timeout + IDLE_GRACE)
            .build()
            .map_err(|e| {
                DocumentError::RenderBackendUnavailable(format!(
                    "Failed to build launch options: {}",
                    e
                ))
            })?;

        let browser = Browser::new(launch_options).map_err(|e| {
            DocumentError::RenderBackendUnavailable(format!("Failed to launch browser: {}", e))
        })?;

        let tab = browser.new_tab().map_err(|e| {
            DocumentError::RenderBackendUnavailable(format!("Failed to create tab: {}", e))
        })?;

        let session = ChromeSession {
            tab,
            browser,
            deadline,
        };
        session.arm()?;

        debug!("Chrome session started");
        Ok(Box::new(session))
    }
}

/// A browser process and the tab documents are printed from.
///
/// Dropping the session drops the `Browser`, which kills the child process.
struct ChromeSession {
    tab: Arc<Tab>,
    #[allow(dead_code)]
    browser: Browser,
    deadline: Instant,
}

impl ChromeSession {
    /// Limits the next DevTools call to the time left before the deadline.
    fn arm(&self) -> Result<()> {
        let remaining = self.deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(DocumentError::RenderFailed(
                "render deadline passed".to_string(),
            ));
        }
        self.tab.set_default_timeout(remaining);
        Ok(())
    }
}

impl RenderSession for ChromeSession {
    fn load(&mut self, html: &str) -> Result<()> {
        self.arm()?;
        self.tab
            .navigate_to("about:blank")
            .map_err(|e| DocumentError::RenderFailed(format!("Navigation failed: {}", e)))?;
        self.arm()?;
        self.tab.wait_until_navigated().map_err(|e| {
            DocumentError::RenderFailed(format!("Wait for navigation failed: {}", e))
        })?;

        // A JSON string is a valid JS string literal for any HTML payload.
        let literal = serde_json::to_string(html)
            .map_err(|e| DocumentError::RenderFailed(format!("Failed to encode document: {}", e)))?;
        let write = format!(
            "document.open(); document.write({}); document.close(); true",
            literal
        );
        self.arm()?;
        self.tab
            .evaluate(&write, false)
            .map_err(|e| DocumentError::RenderFailed(format!("Failed to write document: {}", e)))?;

        self.arm()?;
        let settled = self.tab.evaluate(WAIT_FOR_ASSETS, true).map_err(|e| {
            DocumentError::RenderFailed(format!("Waiting for document assets failed: {}", e))
        })?;
        debug!(images = ?settled.value, "Document assets settled");

        Ok(())
    }

    fn print_pdf(&mut self, format: PageFormat) -> Result<Vec<u8>> {
        let (paper_width, paper_height) = format.paper_size_inches();
        let options = PrintToPdfOptions {
            paper_width: Some(paper_width),
            paper_height: Some(paper_height),
            print_background: Some(true),
            prefer_css_page_size: Some(false),
            ..Default::default()
        };

        self.arm()?;
        self.tab
            .print_to_pdf(Some(options))
            .map_err(|e| DocumentError::RenderFailed(format!("Print to PDF failed: {}", e)))
    }
}
