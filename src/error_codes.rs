use std::fmt;

use anyhow::Error;
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::BannerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodedErrorKind {
    /// Bad arguments or input documents; exit code 2.
    Usage,
    /// The operation itself failed; exit code 1.
    Failure,
}

#[derive(Debug, Clone)]
pub struct CodedError {
    pub code: &'static str,
    pub message: String,
    pub details: Option<Value>,
    pub kind: CodedErrorKind,
}

impl CodedError {
    pub fn usage(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            kind: CodedErrorKind::Usage,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn exit_code(&self) -> i32 {
        match self.kind {
            CodedErrorKind::Usage => 2,
            CodedErrorKind::Failure => 1,
        }
    }

    pub fn envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope {
            ok: false,
            error: ErrorEnvelopeBody {
                code: self.code.to_owned(),
                message: self.message.clone(),
                details: self.details.clone(),
            },
        }
    }
}

impl From<&BannerError> for CodedError {
    fn from(error: &BannerError) -> Self {
        let (kind, details) = match error {
            BannerError::Validation(errors) => (CodedErrorKind::Usage, Some(json!(errors.errors))),
            BannerError::CaptureTargetMissing { id } => {
                (CodedErrorKind::Failure, Some(json!({ "target": id })))
            }
            BannerError::CaptureTimeout { timeout_ms } => {
                (CodedErrorKind::Failure, Some(json!({ "timeout_ms": timeout_ms })))
            }
            _ => (CodedErrorKind::Failure, None),
        };
        Self {
            code: error.code(),
            message: error.to_string(),
            details,
            kind,
        }
    }
}

impl fmt::Display for CodedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for CodedError {}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope {
    pub ok: bool,
    pub error: ErrorEnvelopeBody,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelopeBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Finds the most specific coded failure in an error chain. A usage error
/// raised by the CLI wins over a banner error wrapped beneath it.
pub fn find_coded_error(error: &Error) -> Option<CodedError> {
    error
        .chain()
        .find_map(|cause| cause.downcast_ref::<CodedError>().cloned())
        .or_else(|| {
            error
                .chain()
                .find_map(|cause| cause.downcast_ref::<BannerError>())
                .map(CodedError::from)
        })
}
