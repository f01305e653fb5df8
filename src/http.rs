//! HTTP routes.
//!
//! Form endpoints answer errors with plain text; JSON endpoints answer with
//! `{ "success": false, "message": ... }`.

use crate::directors::ResolutionStore;
use crate::error::DocumentError;
use crate::model::{DeclarationRequest, SignatureForm, SignatureSubmission};
use crate::pipeline::DocumentPipeline;
use crate::sink::{Attachment, Delivered, Delivery};
use axum::{
    async_trait,
    body::{Body, Bytes},
    extract::{DefaultBodyLimit, FromRequest, Path, Request, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use chrono::Local;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};

const FORM_MISSING: &str = "Form data missing. Please fill the form and try again.";

#[derive(Clone)]
pub struct AppState {
    pub pipeline: DocumentPipeline,
    pub resolutions: Arc<dyn ResolutionStore>,
}

pub fn app_router(state: AppState, body_limit: usize) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .route("/preview", post(preview))
        .route("/download-pdf", post(download_pdf))
        .route("/submit-form", post(submit_form))
        .route("/save-signature", post(save_signature))
        .route("/uploads", post(upload_pdf))
        .route("/resolution/:id", get(resolution_view))
        .route("/resolution/:id/pdf", get(resolution_pdf))
        .route("/submit-signature", post(submit_signature))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Accepts either a urlencoded form or a JSON body.
pub struct FormOrJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for FormOrJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let headers = req.headers();
        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        let declared_empty = headers
            .get(header::CONTENT_LENGTH)
            .is_some_and(|v| v.as_bytes() == b"0");

        if content_type.is_empty() || declared_empty {
            warn!("Rejected request without a body");
            return Err((StatusCode::BAD_REQUEST, FORM_MISSING).into_response());
        }

        let parsed = if content_type.starts_with("application/json") {
            Json::<T>::from_request(req, state)
                .await
                .map(|Json(value)| value)
                .map_err(|e| (e.status(), e.body_text()))
        } else {
            Form::<T>::from_request(req, state)
                .await
                .map(|Form(value)| value)
                .map_err(|e| (e.status(), e.body_text()))
        };

        parsed.map(FormOrJson).map_err(|(status, reason)| {
            warn!(status = status.as_u16(), reason = %reason, "Rejected request body");
            (status, reason).into_response()
        })
    }
}

/// Error answered as plain text.
pub struct PageError(DocumentError);

impl From<DocumentError> for PageError {
    fn from(err: DocumentError) -> Self {
        Self(err)
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        let (status, message) = describe(&self.0);
        (status, message).into_response()
    }
}

/// Error answered as `{ success: false, message }`.
pub struct ApiError(DocumentError);

impl From<DocumentError> for ApiError {
    fn from(err: DocumentError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = describe(&self.0);
        (status, Json(json!({ "success": false, "message": message }))).into_response()
    }
}

/// Logs the error and picks what the caller gets to see.
fn describe(err: &DocumentError) -> (StatusCode, String) {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    if err.is_client_error() {
        warn!(status = status.as_u16(), error = %err, "Request rejected");
        return (status, err.to_string());
    }

    error!(status = status.as_u16(), error = %err, "Request failed");
    let message = match err {
        DocumentError::RenderTimeout(_) => "Generating the PDF took too long. Please try again.",
        DocumentError::RenderBackendUnavailable(_) => "The PDF renderer is unavailable.",
        DocumentError::SinkWrite { .. } => "Failed to save file",
        _ => "Failed to generate the document",
    };
    (status, message.to_string())
}

fn attachment_response(attachment: Attachment) -> Response {
    let built = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, attachment.content_type)
        .header(header::CONTENT_DISPOSITION, attachment.content_disposition())
        .header(header::CONTENT_LENGTH, attachment.content_length())
        .body(Body::from(attachment.bytes));

    built.unwrap_or_else(|e| {
        error!(error = %e, "Failed to build attachment response");
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    })
}

impl IntoResponse for Delivered {
    fn into_response(self) -> Response {
        match self {
            Delivered::Streamed(attachment) => attachment_response(attachment),
            Delivered::Stored(stored) => {
                Json(json!({ "success": true, "filename": stored.filename })).into_response()
            }
        }
    }
}

async fn health_check() -> &'static str {
    "ok"
}

async fn index(State(state): State<AppState>) -> Result<Html<String>, PageError> {
    let today = Local::now().format("%d/%m/%Y").to_string();
    Ok(Html(state.pipeline.initial_form(&today)?))
}

async fn preview(
    State(state): State<AppState>,
    FormOrJson(req): FormOrJson<DeclarationRequest>,
) -> Result<Html<String>, PageError> {
    Ok(Html(state.pipeline.preview(&req)?))
}

async fn download_pdf(
    State(state): State<AppState>,
    FormOrJson(req): FormOrJson<DeclarationRequest>,
) -> Result<Delivered, PageError> {
    let delivery = Delivery::Attachment {
        filename: "declaration.pdf".to_string(),
    };
    Ok(state.pipeline.deliver_declaration(&req, delivery).await?)
}

async fn submit_form(
    State(state): State<AppState>,
    FormOrJson(req): FormOrJson<DeclarationRequest>,
) -> Result<&'static str, PageError> {
    let delivery = Delivery::Persist {
        discriminator: "form.pdf".to_string(),
    };
    if let Delivered::Stored(stored) = state.pipeline.deliver_declaration(&req, delivery).await? {
        info!(filename = %stored.filename, "Declaration submitted");
    }
    Ok("PDF Submitted Successfully!")
}

#[derive(Debug, Deserialize)]
struct SaveSignatureBody {
    #[serde(default)]
    image: String,
}

async fn save_signature(
    State(state): State<AppState>,
    FormOrJson(body): FormOrJson<SaveSignatureBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let stored = state.pipeline.save_signature(&body.image).await?;
    Ok(Json(json!({ "filename": stored.filename })))
}

async fn upload_pdf(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let is_pdf = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/pdf"));
    if !is_pdf {
        let body = json!({ "success": false, "message": "Expected an application/pdf body" });
        return Ok((StatusCode::UNSUPPORTED_MEDIA_TYPE, Json(body)).into_response());
    }

    let stored = state.pipeline.store_upload(body.to_vec()).await?;
    Ok(Json(json!({ "success": true, "filename": stored.filename })).into_response())
}

async fn resolution_view(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, PageError> {
    let Some(resolution) = state.resolutions.find(&id) else {
        return Ok((StatusCode::NOT_FOUND, "Resolution not found").into_response());
    };
    Ok(Html(state.pipeline.resolution_html(&resolution)?).into_response())
}

async fn resolution_pdf(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, PageError> {
    let Some(resolution) = state.resolutions.find(&id) else {
        return Ok((StatusCode::NOT_FOUND, "Resolution not found").into_response());
    };
    let delivery = Delivery::Attachment {
        filename: "resolution.pdf".to_string(),
    };
    let delivered = state
        .pipeline
        .deliver_resolution(&resolution, delivery)
        .await?;
    Ok(delivered.into_response())
}

#[derive(Debug, Serialize)]
struct SignatureResponse {
    success: bool,
    message: &'static str,
    #[serde(flatten)]
    submission: SignatureSubmission,
}

async fn submit_signature(
    State(state): State<AppState>,
    FormOrJson(form): FormOrJson<SignatureForm>,
) -> Result<Json<SignatureResponse>, ApiError> {
    let submission = state.pipeline.submit_signature(form).await?;
    Ok(Json(SignatureResponse {
        success: true,
        message: "Signature saved successfully",
        submission,
    }))
}
