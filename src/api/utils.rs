//! API utility functions
//!
//! Pure, stateless helpers for HTTP request processing, kept out of
//! services.rs so they can be unit tested.

use crate::api::error::ApiError;

/// Validates the Content-Type of an upload body
///
/// Accepts:
/// - any `image/*` type (`image/jpeg`, `image/png`, ...)
/// - `application/octet-stream` (raw camera uploads)
/// - a missing header
///
/// Rejects other media types with 415 and malformed values with 400.
pub fn check_upload_content_type(content_type: Option<&str>) -> Result<(), ApiError> {
    let Some(content_type) = content_type else {
        return Ok(());
    };

    let media_type: mime::Mime = content_type.parse().map_err(|_| {
        ApiError::InvalidPayload(format!("invalid Content-Type: {}", content_type))
    })?;

    let is_image = media_type.type_() == mime::IMAGE;
    let is_octet_stream =
        media_type.type_() == mime::APPLICATION && media_type.subtype() == mime::OCTET_STREAM;

    if !is_image && !is_octet_stream {
        return Err(ApiError::UnsupportedMediaType(format!(
            "expected an image, got: {}/{}",
            media_type.type_(),
            media_type.subtype()
        )));
    }

    Ok(())
}

/// Validates that body size does not exceed the maximum allowed size
pub fn validate_body_size(data: &[u8], max_size: usize) -> Result<(), ApiError> {
    if data.len() > max_size {
        return Err(ApiError::PayloadTooLarge(max_size));
    }
    Ok(())
}
