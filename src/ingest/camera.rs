use thiserror::Error;

use crate::pipeline::DEFAULT_CAMERA;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CameraIdError {
    #[error("camera id exceeds {limit} characters")]
    TooLong { limit: usize },
    #[error("camera id may only contain letters, digits, '_', '-' and '.'")]
    InvalidCharacter,
}

/// Resolve the uploader's camera id; missing or blank falls back to the default camera
pub fn resolve_camera(raw: Option<&str>, max_len: usize) -> Result<String, CameraIdError> {
    let camera = raw.map(str::trim).unwrap_or_default();

    if camera.is_empty() {
        return Ok(DEFAULT_CAMERA.to_string());
    }

    if camera.chars().count() > max_len {
        return Err(CameraIdError::TooLong { limit: max_len });
    }

    if !camera
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        return Err(CameraIdError::InvalidCharacter);
    }

    Ok(camera.to_string())
}
