//! Request orchestration: validate, normalize images, bind, render, deliver.
//!
//! Validation and image decoding always run before a rendering context is
//! requested, so incomplete submissions never cost a browser launch.

use crate::binder::{declaration_context, resolution_context, DocumentBinder, RenderedDocument, TemplateId};
use crate::error::{DocumentError, Result};
use crate::image::normalize;
use crate::model::{DeclarationRequest, ResolutionRequest, SignatureForm, SignatureSubmission};
use crate::render::RenderEngine;
use crate::sink::{ArtifactSink, Delivered, Delivery, StoredArtifact};
use std::sync::Arc;
use tracing::info;

/// Values shown on the blank declaration form.
const DEFAULT_DIRECTOR: &str = "John Doe";
const DEFAULT_COMPANY: &str = "Demo Pvt Ltd";
const DEFAULT_MOBILE: &str = "9876543210";

#[derive(Clone)]
pub struct DocumentPipeline {
    binder: Arc<DocumentBinder>,
    engine: RenderEngine,
    sink: ArtifactSink,
    max_image_bytes: usize,
}

impl DocumentPipeline {
    pub fn new(
        binder: Arc<DocumentBinder>,
        engine: RenderEngine,
        sink: ArtifactSink,
        max_image_bytes: usize,
    ) -> Self {
        Self {
            binder,
            engine,
            sink,
            max_image_bytes,
        }
    }

    pub fn engine(&self) -> &RenderEngine {
        &self.engine
    }

    pub fn sink(&self) -> &ArtifactSink {
        &self.sink
    }

    /// Blank declaration form pre-filled with placeholder values and `today`.
    pub fn initial_form(&self, today: &str) -> Result<String> {
        let req = DeclarationRequest {
            director_name: DEFAULT_DIRECTOR.to_string(),
            company_name: DEFAULT_COMPANY.to_string(),
            mobile_number: DEFAULT_MOBILE.to_string(),
            declaration_date: today.to_string(),
            ..Default::default()
        };
        let ctx = declaration_context(&req, None, None);
        Ok(self.binder.bind(TemplateId::Declaration, &ctx)?.html)
    }

    pub fn preview(&self, req: &DeclarationRequest) -> Result<String> {
        Ok(self.bind_declaration(TemplateId::Preview, req)?.html)
    }

    /// Renders the declaration PDF and hands it to the sink.
    pub async fn deliver_declaration(
        &self,
        req: &DeclarationRequest,
        delivery: Delivery,
    ) -> Result<Delivered> {
        let document = self.bind_declaration(TemplateId::Declaration, req)?;
        let artifact = self.engine.render(document).await?;
        self.sink.deliver(artifact, delivery).await
    }

    pub fn resolution_html(&self, res: &ResolutionRequest) -> Result<String> {
        Ok(self
            .binder
            .bind(TemplateId::Resolution, &resolution_context(res))?
            .html)
    }

    pub async fn deliver_resolution(
        &self,
        res: &ResolutionRequest,
        delivery: Delivery,
    ) -> Result<Delivered> {
        let document = self
            .binder
            .bind(TemplateId::Resolution, &resolution_context(res))?;
        let artifact = self.engine.render(document).await?;
        self.sink.deliver(artifact, delivery).await
    }

    /// Stores a standalone signature drawn on the signature pad.
    pub async fn save_signature(&self, image: &str) -> Result<StoredArtifact> {
        let signature = normalize(image, self.max_image_bytes)?
            .ok_or_else(|| DocumentError::Validation("Missing image".to_string()))?;
        if signature.extension() != "png" {
            return Err(DocumentError::Validation(
                "Signature must be a PNG image".to_string(),
            ));
        }
        self.sink.persist(signature.bytes, "signature.png").await
    }

    /// Records one director signing one document.
    pub async fn submit_signature(&self, form: SignatureForm) -> Result<SignatureSubmission> {
        form.validate()?;
        let image = normalize(&form.image, self.max_image_bytes)?
            .ok_or_else(|| DocumentError::Validation("Missing image or directorID".to_string()))?;

        let discriminator = format!("{}.{}", form.director_id.trim(), image.extension());
        let stored = self.sink.persist(image.bytes, &discriminator).await?;

        let submission = SignatureSubmission {
            director_id: form.director_id,
            name: form.name,
            email: form.email,
            document_name: form.docname,
            file_path: stored.public_path(),
            file_name: stored.filename,
        };
        info!(
            director_id = %submission.director_id,
            document = %submission.document_name,
            file = %submission.file_name,
            "Signature recorded"
        );
        Ok(submission)
    }

    /// Stores a PDF posted as a raw request body.
    pub async fn store_upload(&self, bytes: Vec<u8>) -> Result<StoredArtifact> {
        if bytes.is_empty() {
            return Err(DocumentError::Validation("Request body is empty".to_string()));
        }
        if !bytes.starts_with(b"%PDF-") {
            return Err(DocumentError::Validation(
                "Request body is not a PDF document".to_string(),
            ));
        }
        self.sink.persist(bytes, "upload.pdf").await
    }

    fn bind_declaration(&self, id: TemplateId, req: &DeclarationRequest) -> Result<RenderedDocument> {
        req.validate()?;
        let signature = normalize(&req.signature_image, self.max_image_bytes)?;
        let portrait = normalize(&req.portrait_image, self.max_image_bytes)?;
        let ctx = declaration_context(req, signature.as_ref(), portrait.as_ref());
        self.binder.bind(id, &ctx)
    }
}
