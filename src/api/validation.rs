//! Upload validation: file extensions and size caps (SPEC_FULL.md §4.1).

use thiserror::Error;

use crate::domain::BuildKind;

#[derive(Debug, Error)]
pub enum UploadValidationError {
    #[error("missing required 'file' field")]
    MissingFile,
    #[error("file name '{0}' must end in {1}")]
    WrongExtension(String, &'static str),
    #[error("icon must be a .png, .jpg, or .jpeg file")]
    InvalidIconExtension,
}

fn required_extensions(kind: BuildKind) -> &'static [&'static str] {
    match kind {
        BuildKind::Html => &["html", "htm"],
        BuildKind::Zip => &["zip"],
    }
}

fn has_extension(name: &str, exts: &[&str]) -> bool {
    let lower = name.to_lowercase();
    exts.iter().any(|ext| lower.ends_with(&format!(".{ext}")))
}

pub fn validate_upload_name(name: &str, kind: BuildKind) -> Result<(), UploadValidationError> {
    let exts = required_extensions(kind);
    if !has_extension(name, exts) {
        return Err(UploadValidationError::WrongExtension(
            name.to_string(),
            exts[0],
        ));
    }
    Ok(())
}

pub fn validate_icon_name(name: &str) -> Result<(), UploadValidationError> {
    if !has_extension(name, &["png", "jpg", "jpeg"]) {
        return Err(UploadValidationError::InvalidIconExtension);
    }
    Ok(())
}
