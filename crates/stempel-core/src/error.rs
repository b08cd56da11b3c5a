// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Stempel.

use std::path::PathBuf;

use thiserror::Error;

/// Why an icon image could not be used.
#[derive(Debug, Error)]
pub enum IconLoadCause {
    #[error("file not found")]
    NotFound,

    #[error("unreadable: {0}")]
    Io(#[source] std::io::Error),

    #[error("not a decodable image: {0}")]
    Decode(String),
}

/// Errors produced by the icon-overlaid QR code generator.
///
/// Every variant carries enough context (payload size, offending path,
/// underlying cause) for the caller to log or display it.
#[derive(Debug, Error)]
pub enum QrError {
    /// The payload cannot be represented as a QR symbol under the chosen
    /// mode and error-correction level.
    #[error("QR encoding failed: {0}")]
    Encoding(String),

    /// A requested pixel size is zero or otherwise unusable.
    #[error("invalid target size: {0}")]
    Scaling(String),

    #[error("cannot load icon {}: {cause}", path.display())]
    IconLoad {
        path: PathBuf,
        #[source]
        cause: IconLoadCause,
    },

    #[error("cannot write {}: {detail}", path.display())]
    Write { path: PathBuf, detail: String },
}

impl QrError {
    /// True when the icon file does not exist.
    pub fn is_icon_not_found(&self) -> bool {
        matches!(
            self,
            QrError::IconLoad {
                cause: IconLoadCause::NotFound,
                ..
            }
        )
    }
}

/// Top-level error type for all Stempel operations.
#[derive(Debug, Error)]
pub enum StempelError {
    // -- File dispatch --
    #[error("unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("unsupported operation: {0}")]
    Unsupported(String),

    // -- Stamping --
    #[error("no stamp image configured")]
    MissingStamp,

    #[error("stamp image not found: {}", .0.display())]
    StampNotFound(PathBuf),

    // -- Document errors --
    #[error("PDF operation failed: {0}")]
    PdfError(String),

    #[error("image processing failed: {0}")]
    ImageError(String),

    // -- Passwords --
    #[error("{} is password protected and no password was supplied", .0.display())]
    PasswordRequired(PathBuf),

    #[error("PDF validation failed for {}: {detail}", path.display())]
    ValidationFailed { path: PathBuf, detail: String },

    // -- External tool --
    #[error("{tool} failed (exit code {code}): {stderr}")]
    ToolFailed {
        tool: String,
        code: String,
        stderr: String,
    },

    #[error("external tool not available: {0}")]
    ToolUnavailable(String),

    // -- QR generation --
    #[error(transparent)]
    Qr(#[from] QrError),

    // -- Configuration / persistence --
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, StempelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn icon_not_found_is_detected() {
        let err = QrError::IconLoad {
            path: PathBuf::from("missing.png"),
            cause: IconLoadCause::NotFound,
        };
        assert!(err.is_icon_not_found());
        assert_eq!(
            err.to_string(),
            "cannot load icon missing.png: file not found"
        );
    }

    #[test]
    fn decode_failure_is_not_reported_as_missing() {
        let err = QrError::IconLoad {
            path: PathBuf::from("broken.png"),
            cause: IconLoadCause::Decode("bad signature".into()),
        };
        assert!(!err.is_icon_not_found());
        assert!(err.to_string().contains("not a decodable image"));
    }

    #[test]
    fn qr_errors_convert_transparently() {
        let err: StempelError = QrError::Encoding("payload is empty".into()).into();
        assert_eq!(err.to_string(), "QR encoding failed: payload is empty");
    }
}
