//! Per-render job record used for logging and telemetry.

use crate::binder::TemplateId;
use crate::render::PageFormat;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// State of one HTML-to-PDF render.
#[derive(Debug, Clone, Serialize)]
pub struct RenderJob {
    pub job_id: String,
    pub template: &'static str,
    pub page_format: PageFormat,
    pub html_bytes: usize,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub pdf_bytes: Option<usize>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Rendering,
    Complete,
    Failed,
    TimedOut,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "queued"),
            JobStatus::Rendering => write!(f, "rendering"),
            JobStatus::Complete => write!(f, "complete"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::TimedOut => write!(f, "timed_out"),
        }
    }
}

impl RenderJob {
    /// Creates a queued job with a fresh UUID.
    ///
    /// # Arguments
    ///
    /// * `template` - Template the HTML was bound from
    /// * `page_format` - Paper size requested from the backend
    /// * `html_bytes` - Size of the bound HTML document
    pub fn new(template: TemplateId, page_format: PageFormat, html_bytes: usize) -> Self {
        let now = Utc::now();
        Self {
            job_id: Uuid::new_v4().to_string(),
            template: template.as_str(),
            page_format,
            html_bytes,
            status: JobStatus::Queued,
            created_at: now,
            updated_at: now,
            pdf_bytes: None,
            error: None,
        }
    }

    /// Called once a render slot has been acquired.
    pub fn start_rendering(&mut self) {
        self.status = JobStatus::Rendering;
        self.updated_at = Utc::now();
    }

    /// Marks the job complete and clears any earlier error.
    ///
    /// # Arguments
    ///
    /// * `pdf_bytes` - Size of the produced PDF
    pub fn mark_complete(&mut self, pdf_bytes: usize) {
        self.status = JobStatus::Complete;
        self.updated_at = Utc::now();
        self.pdf_bytes = Some(pdf_bytes);
        self.error = None;
    }

    pub fn mark_failed(&mut self, error: String) {
        self.status = JobStatus::Failed;
        self.updated_at = Utc::now();
        self.error = Some(error);
    }

    /// Like `mark_failed`, but for renders cut off by the render bound.
    pub fn mark_timed_out(&mut self, error: String) {
        self.status = JobStatus::TimedOut;
        self.updated_at = Utc::now();
        self.error = Some(error);
    }

    pub fn is_finished(&self) -> bool {
        matches!(
            self.status,
            JobStatus::Complete | JobStatus::Failed | JobStatus::TimedOut
        )
    }

    /// Time from creation to the last state change.
    ///
    /// # Returns
    ///
    /// `None` while the job is still queued or rendering.
    pub fn processing_duration_ms(&self) -> Option<i64> {
        if self.is_finished() {
            Some(
                self.updated_at
                    .signed_duration_since(self.created_at)
                    .num_milliseconds(),
            )
        } else {
            None
        }
    }
}
