//! Artifact delivery: stream to the caller or persist under the upload root.
//!
//! Persisted artifacts are written to a hidden `.partial-*` temp file in the
//! upload root and renamed into place without clobbering, so a failed write
//! never leaves a truncated file under a final name and concurrent writers
//! never overwrite each other.

use crate::error::{DocumentError, Result};
use crate::render::PdfArtifact;
use chrono::Utc;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

const PARTIAL_PREFIX: &str = ".partial-";
const MAX_NAME_ATTEMPTS: u32 = 16;

/// How an artifact leaves the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Returned to the caller as a download named `filename`.
    Attachment { filename: String },
    /// Written under the upload root as `<stamp>-<discriminator>`.
    Persist { discriminator: String },
}

/// Bytes plus the headers a download needs.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub filename: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

impl Attachment {
    pub fn content_length(&self) -> usize {
        self.bytes.len()
    }

    pub fn content_disposition(&self) -> String {
        format!("attachment; filename=\"{}\"", self.filename.replace(['"', '\\'], "_"))
    }
}

/// A file written under the upload root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArtifact {
    pub filename: String,
    pub path: PathBuf,
}

impl StoredArtifact {
    /// URL path the static file layer serves the artifact from.
    pub fn public_path(&self) -> String {
        format!("/uploads/{}", self.filename)
    }
}

#[derive(Debug, Clone)]
pub enum Delivered {
    Streamed(Attachment),
    Stored(StoredArtifact),
}

/// Writes artifacts under one upload root. Shared by all requests.
#[derive(Debug, Clone)]
pub struct ArtifactSink {
    root: PathBuf,
    last_stamp: Arc<AtomicI64>,
}

impl ArtifactSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            last_stamp: Arc::new(AtomicI64::new(0)),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates the upload root if absent. Idempotent; call once at startup.
    pub fn ensure_storage_root(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root).map_err(|source| DocumentError::SinkWrite {
            path: self.root.clone(),
            source,
        })?;
        info!(root = %self.root.display(), "Upload root ready");
        Ok(())
    }

    pub async fn deliver(&self, artifact: PdfArtifact, delivery: Delivery) -> Result<Delivered> {
        match delivery {
            Delivery::Attachment { filename } => {
                debug!(job_id = artifact.job_id(), bytes = artifact.len(), "Streaming PDF");
                Ok(Delivered::Streamed(Attachment {
                    filename,
                    content_type: "application/pdf",
                    bytes: artifact.into_bytes(),
                }))
            }
            Delivery::Persist { discriminator } => {
                let stored = self.persist(artifact.into_bytes(), &discriminator).await?;
                Ok(Delivered::Stored(stored))
            }
        }
    }

    /// Persists `bytes` as `<stamp>-<discriminator>` under the upload root.
    pub async fn persist(&self, bytes: Vec<u8>, discriminator: &str) -> Result<StoredArtifact> {
        let stamp = self.next_stamp();
        let suffix = sanitize_discriminator(discriminator);
        let root = self.root.clone();

        let stored = tokio::task::spawn_blocking(move || write_new_file(&root, stamp, &suffix, &bytes))
            .await
            .map_err(|e| DocumentError::SinkWrite {
                path: self.root.clone(),
                source: io::Error::new(io::ErrorKind::Other, e.to_string()),
            })?;

        match &stored {
            Ok(artifact) => info!(filename = %artifact.filename, "Artifact persisted"),
            Err(e) => error!(error = %e, "Failed to persist artifact"),
        }
        stored
    }

    /// Millisecond timestamp, strictly increasing within this process.
    fn next_stamp(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let mut last = self.last_stamp.load(Ordering::SeqCst);
        loop {
            let next = now.max(last + 1);
            match self
                .last_stamp
                .compare_exchange(last, next, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return next,
                Err(actual) => last = actual,
            }
        }
    }
}

fn write_new_file(root: &Path, stamp: i64, suffix: &str, bytes: &[u8]) -> Result<StoredArtifact> {
    let mut temp = tempfile::Builder::new()
        .prefix(PARTIAL_PREFIX)
        .tempfile_in(root)
        .map_err(sink_error(root))?;
    temp.write_all(bytes).map_err(sink_error(temp.path()))?;
    temp.as_file().sync_all().map_err(sink_error(temp.path()))?;

    let mut filename = format!("{}-{}", stamp, suffix);
    let mut attempt = 0;
    loop {
        let path = root.join(&filename);
        match temp.persist_noclobber(&path) {
            Ok(_) => return Ok(StoredArtifact { filename, path }),
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists && attempt < MAX_NAME_ATTEMPTS => {
                // Another process claimed the name; keep the temp file and try the next one.
                temp = e.file;
                attempt += 1;
                filename = format!("{}-{}-{}", stamp, attempt, suffix);
            }
            Err(e) => {
                return Err(DocumentError::SinkWrite {
                    path,
                    source: e.error,
                })
            }
        }
    }
}

fn sink_error(path: &Path) -> impl FnOnce(io::Error) -> DocumentError {
    let path = path.to_path_buf();
    move |source| DocumentError::SinkWrite { path, source }
}

/// Restricts a filename discriminator to `[A-Za-z0-9._-]`.
fn sanitize_discriminator(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.trim_matches('.').is_empty() {
        "artifact".to_string()
    } else {
        cleaned
    }
}
