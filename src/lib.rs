//! Declaration and board-resolution document service.
//!
//! Binds submitted form data into HTML templates, prints the result to PDF
//! through headless Chrome and either streams the PDF back to the caller or
//! persists it under the upload root.
//!
//! ## Module Overview
//!
//! - `model`: request shapes accepted from forms and JSON bodies
//! - `image`: base64 / data-URI image normalization
//! - `binder`: template parsing and placeholder binding
//! - `render`: bounded, time-limited rendering contexts
//! - `chrome`: headless Chrome rendering backend
//! - `job`: per-render bookkeeping
//! - `sink`: attachment streaming and collision-free persistence
//! - `pipeline`: validate, bind, render and deliver in one place
//! - `directors`: resolution and director lookups
//! - `http`: axum routes
//! - `config`: environment configuration
//! - `telemetry`: OpenTelemetry integration and structured logging
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use declaration_renderer::{
//!     binder::{declaration_context, DocumentBinder, TemplateId},
//!     model::DeclarationRequest,
//! };
//!
//! let binder = DocumentBinder::new().unwrap();
//! let req = DeclarationRequest {
//!     director_name: "Alice".to_string(),
//!     company_name: "Acme".to_string(),
//!     ..Default::default()
//! };
//! let doc = binder
//!     .bind(TemplateId::Preview, &declaration_context(&req, None, None))
//!     .unwrap();
//! assert!(doc.html.contains("Alice"));
//! ```

pub mod binder;
pub mod chrome;
pub mod config;
pub mod directors;
pub mod error;
pub mod http;
pub mod image;
pub mod job;
pub mod model;
pub mod pipeline;
pub mod render;
pub mod sink;
pub mod telemetry;

pub use error::{DocumentError, Result};
