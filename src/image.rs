//! Decoding of base64 image payloads posted by the browser.

use crate::error::{DocumentError, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

const DATA_PREFIX: &str = "data:";
const BASE64_MARKER: &str = ";base64,";

/// Raster types accepted for embedding, with the extension used on disk.
const ACCEPTED_TYPES: [(&str, &str); 4] = [
    ("image/png", "png"),
    ("image/jpeg", "jpg"),
    ("image/gif", "gif"),
    ("image/webp", "webp"),
];

/// A decoded image with the MIME type it was declared as.
///
/// `mime` is always one of the accepted raster types, so it is safe to place
/// inside a `data:` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedImage {
    pub mime: &'static str,
    pub bytes: Vec<u8>,
}

impl NormalizedImage {
    /// File extension for the declared MIME type.
    pub fn extension(&self) -> &'static str {
        ACCEPTED_TYPES
            .iter()
            .find(|(mime, _)| *mime == self.mime)
            .map(|(_, ext)| *ext)
            .unwrap_or("png")
    }

    /// Canonical `data:` URI for embedding in a document.
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime, BASE64.encode(&self.bytes))
    }
}

/// Maps a declared media type onto an accepted one.
fn accepted_mime(declared: &str) -> Result<&'static str> {
    let declared = declared.trim().to_ascii_lowercase();
    let declared = match declared.as_str() {
        "image/jpg" | "image/pjpeg" => "image/jpeg",
        other => other,
    };

    ACCEPTED_TYPES
        .iter()
        .map(|(mime, _)| *mime)
        .find(|mime| *mime == declared)
        .ok_or_else(|| {
            DocumentError::InvalidImageEncoding(format!(
                "unsupported media type '{}'; expected PNG, JPEG, GIF or WebP",
                declared.escape_default()
            ))
        })
}

/// Strips the data-URI prefix and decodes the payload.
///
/// Empty input yields `Ok(None)`. A payload without a `data:` prefix is taken
/// as raw base64 PNG, which is what signature pads post. Decoded images larger
/// than `max_bytes` are rejected as a validation failure.
pub fn normalize(input: &str, max_bytes: usize) -> Result<Option<NormalizedImage>> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(None);
    }

    let (mime, payload) = match input.strip_prefix(DATA_PREFIX) {
        Some(rest) => {
            let (mime, payload) = rest.split_once(BASE64_MARKER).ok_or_else(|| {
                DocumentError::InvalidImageEncoding("data URI is not base64 encoded".to_string())
            })?;
            (accepted_mime(mime)?, payload)
        }
        None => ("image/png", input),
    };

    // Browsers and mail clients sometimes wrap long payloads.
    let payload: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if payload.is_empty() {
        return Err(DocumentError::InvalidImageEncoding(
            "image payload is empty".to_string(),
        ));
    }

    // Reject before decoding anything oversized.
    if payload.len() / 4 * 3 > max_bytes.saturating_add(2) {
        return Err(too_large(max_bytes));
    }

    let bytes = BASE64
        .decode(payload.as_bytes())
        .map_err(|e| DocumentError::InvalidImageEncoding(e.to_string()))?;

    if bytes.len() > max_bytes {
        return Err(too_large(max_bytes));
    }

    Ok(Some(NormalizedImage { mime, bytes }))
}

fn too_large(max_bytes: usize) -> DocumentError {
    DocumentError::Validation(format!(
        "Image exceeds the maximum allowed size of {} bytes",
        max_bytes
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMIT: usize = 1024;

    #[test]
    fn test_empty_input() {
        assert_eq!(normalize("", LIMIT).unwrap(), None);
        assert_eq!(normalize("   ", LIMIT).unwrap(), None);
    }

    #[test]
    fn test_data_uri_png() {
        let image = normalize("data:image/png;base64,AAAA", LIMIT).unwrap().unwrap();
        assert_eq!(image.mime, "image/png");
        assert_eq!(image.bytes, vec![0, 0, 0]);
        assert_eq!(image.extension(), "png");
    }

    #[test]
    fn test_jpeg_extension() {
        let image = normalize("data:image/jpeg;base64,/9j/4AAQ", LIMIT).unwrap().unwrap();
        assert_eq!(image.extension(), "jpg");
    }

    #[test]
    fn test_raw_payload_is_png() {
        let image = normalize("iVBORw0KGgo=", LIMIT).unwrap().unwrap();
        assert_eq!(image.mime, "image/png");
        assert_eq!(&image.bytes[1..4], b"PNG");
    }

    #[test]
    fn test_round_trip_is_idempotent() {
        let first = normalize("data:image/png;base64,iVBORw0KGgoAAAANSUhEUg==", LIMIT)
            .unwrap()
            .unwrap();
        let second = normalize(&first.to_data_uri(), LIMIT).unwrap().unwrap();
        assert_eq!(first, second);
        assert_eq!(second.to_data_uri(), first.to_data_uri());
    }

    #[test]
    fn test_wrapped_payload() {
        let image = normalize("data:image/png;base64,AA\nAA", LIMIT).unwrap().unwrap();
        assert_eq!(image.bytes.len(), 3);
    }

    #[test]
    fn test_missing_base64_marker() {
        let err = normalize("data:image/png,AAAA", LIMIT).unwrap_err();
        assert!(matches!(err, DocumentError::InvalidImageEncoding(_)));
    }

    #[test]
    fn test_non_image_mime() {
        let err = normalize("data:text/html;base64,AAAA", LIMIT).unwrap_err();
        assert!(matches!(err, DocumentError::InvalidImageEncoding(_)));
    }

    #[test]
    fn test_vector_and_unknown_images_rejected() {
        for mime in ["image/svg+xml", "image/bmp", "image/x-icon"] {
            let err = normalize(&format!("data:{};base64,AAAA", mime), LIMIT).unwrap_err();
            assert!(
                matches!(err, DocumentError::InvalidImageEncoding(_)),
                "{mime} should be rejected"
            );
        }
    }

    #[test]
    fn test_markup_in_media_type_rejected() {
        let input = "data:image/png\" onerror=\"fetch('http://169.254.169.254/')\" x=\";base64,AAAA";
        let err = normalize(input, LIMIT).unwrap_err();
        assert!(matches!(err, DocumentError::InvalidImageEncoding(_)));
    }

    #[test]
    fn test_jpg_alias_is_canonical() {
        let image = normalize("data:IMAGE/JPG;base64,/9j/4AAQ", LIMIT).unwrap().unwrap();
        assert_eq!(image.mime, "image/jpeg");
        assert!(image.to_data_uri().starts_with("data:image/jpeg;base64,"));
    }

    #[test]
    fn test_garbage_payload() {
        let err = normalize("data:image/png;base64,@@not-base64@@", LIMIT).unwrap_err();
        assert!(matches!(err, DocumentError::InvalidImageEncoding(_)));
    }

    #[test]
    fn test_empty_payload_after_marker() {
        let err = normalize("data:image/png;base64,", LIMIT).unwrap_err();
        assert!(matches!(err, DocumentError::InvalidImageEncoding(_)));
    }

    #[test]
    fn test_oversized_image_is_validation_error() {
        let payload = BASE64.encode(vec![7u8; LIMIT + 1]);
        let err = normalize(&format!("data:image/png;base64,{}", payload), LIMIT).unwrap_err();
        assert!(matches!(err, DocumentError::Validation(_)));

        let payload = BASE64.encode(vec![7u8; LIMIT]);
        assert!(normalize(&payload, LIMIT).is_ok());
    }
}
