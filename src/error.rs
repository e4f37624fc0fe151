//! Error taxonomy for the render, export, upload and submit paths.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Failures of a single banner operation. None of them are fatal: the caller
/// can always retry once the offending input or environment is fixed.
#[derive(Error, Debug)]
pub enum BannerError {
    /// The node to rasterize is not mounted in the render tree
    #[error("capture target '{id}' is not mounted")]
    CaptureTargetMissing { id: String },

    /// Rasterization itself failed (unreadable background, encoder error, ...)
    #[error("could not generate image: {0}")]
    Capture(String),

    /// Rasterization did not settle within the configured budget
    #[error("capture timed out after {timeout_ms}ms")]
    CaptureTimeout { timeout_ms: u64 },

    /// An export was requested while another one is still generating
    #[error("an export is already in progress")]
    ExportInFlight,

    /// The rendered image could not be handed to the download sink
    #[error("failed to save {}: {source}", path.display())]
    Save {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The image hosting service failed or returned no usable URL
    #[error("upload failed: {0}")]
    Upload(String),

    /// Required profile fields are missing
    #[error("{0}")]
    Validation(ValidationErrors),
}

impl BannerError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::CaptureTargetMissing { .. } => "CAPTURE_TARGET_MISSING",
            Self::Capture(_) => "CAPTURE_FAILED",
            Self::CaptureTimeout { .. } => "CAPTURE_TIMEOUT",
            Self::ExportInFlight => "EXPORT_IN_FLIGHT",
            Self::Save { .. } => "SAVE_FAILED",
            Self::Upload(_) => "UPLOAD_FAILED",
            Self::Validation(_) => "VALIDATION_FAILED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// Per-field validation failures, reported together so a form can mark every
/// offending input at once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|error| error.field == field)
    }

    pub fn into_result(self) -> Result<(), BannerError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(BannerError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid profile")?;
        for (index, error) in self.errors.iter().enumerate() {
            let sep = if index == 0 { ": " } else { "; " };
            write!(f, "{sep}{} {}", error.field, error.message)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{BannerError, ValidationErrors};

    #[test]
    fn validation_errors_list_every_field() {
        let mut errors = ValidationErrors::default();
        errors.push("name", "is required");
        errors.push("field", "is required");

        assert!(errors.has_field("name"));
        assert!(!errors.has_field("twitter"));
        assert_eq!(
            errors.to_string(),
            "invalid profile: name is required; field is required"
        );
    }

    #[test]
    fn empty_validation_errors_are_ok() {
        assert!(ValidationErrors::default().into_result().is_ok());
    }

    #[test]
    fn codes_are_stable() {
        assert_eq!(
            BannerError::CaptureTargetMissing { id: "banner".to_owned() }.code(),
            "CAPTURE_TARGET_MISSING"
        );
        assert_eq!(
            BannerError::CaptureTimeout { timeout_ms: 10 }.code(),
            "CAPTURE_TIMEOUT"
        );
        assert_eq!(BannerError::ExportInFlight.code(), "EXPORT_IN_FLIGHT");
    }
}
