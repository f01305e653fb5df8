//! Request records accepted by the service.

use crate::error::{DocumentError, Result};
use serde::{Deserialize, Serialize};

/// Declaration form submission.
///
/// Older clients post the images as `signature` and `imageBase64`; both names
/// are accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclarationRequest {
    #[serde(default)]
    pub director_name: String,
    #[serde(default)]
    pub company_name: String,
    #[serde(default)]
    pub mobile_number: String,
    #[serde(default)]
    pub declaration_date: String,
    #[serde(default, alias = "signature")]
    pub signature_image: String,
    #[serde(default, alias = "imageBase64")]
    pub portrait_image: String,
}

impl DeclarationRequest {
    /// Checks that every field, images included, is present.
    ///
    /// Runs before any image decoding or rendering work.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("directorName", &self.director_name),
            ("companyName", &self.company_name),
            ("mobileNumber", &self.mobile_number),
            ("declarationDate", &self.declaration_date),
            ("signatureImage", &self.signature_image),
            ("portraitImage", &self.portrait_image),
        ];

        let missing: Vec<&str> = fields
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(DocumentError::Validation(format!(
                "Some required fields are missing ({}). Please fill the form and try again.",
                missing.join(", ")
            )))
        }
    }
}

/// One director listed on a resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectorRecord {
    pub id: String,
    pub name: String,
    pub pan_number: String,
    pub email: String,
}

/// Company resolution with its meeting metadata and directors, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionRequest {
    pub resolution_id: String,
    pub company_name: String,
    pub date: String,
    pub time: String,
    pub address: String,
    pub directors: Vec<DirectorRecord>,
}

/// Form body of `POST /submit-signature`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignatureForm {
    #[serde(default, rename = "directorID")]
    pub director_id: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub docname: String,
}

impl SignatureForm {
    pub fn validate(&self) -> Result<()> {
        if self.image.trim().is_empty() || self.director_id.trim().is_empty() {
            return Err(DocumentError::Validation(
                "Missing image or directorID".to_string(),
            ));
        }
        Ok(())
    }
}

/// One director's act of signing one document. Immutable once persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureSubmission {
    #[serde(rename = "directorID")]
    pub director_id: String,
    pub name: String,
    pub email: String,
    #[serde(rename = "docname")]
    pub document_name: String,
    pub file_name: String,
    pub file_path: String,
}
