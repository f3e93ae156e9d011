use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ImageNameError {
    #[error("image name must end in .jpg")]
    WrongExtension,
    #[error("image name must be a stored image id")]
    NotAnImageId,
}

/// Only names of the form `<uuid>.jpg`, as assigned at intake, are served
pub fn validate_image_name(name: &str) -> Result<Uuid, ImageNameError> {
    let stem = name
        .strip_suffix(".jpg")
        .ok_or(ImageNameError::WrongExtension)?;

    Uuid::try_parse(stem).map_err(|_| ImageNameError::NotAnImageId)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stored_name_accepted() {
        let id = Uuid::now_v7();
        assert_eq!(validate_image_name(&format!("{id}.jpg")), Ok(id));
    }

    #[test]
    fn test_other_names_rejected() {
        assert_eq!(
            validate_image_name("../../etc/passwd"),
            Err(ImageNameError::WrongExtension)
        );
        assert_eq!(
            validate_image_name("..%2Fsecret.jpg"),
            Err(ImageNameError::NotAnImageId)
        );
        assert_eq!(
            validate_image_name(".jpg"),
            Err(ImageNameError::NotAnImageId)
        );
    }
}
