// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Processing pipeline — bring an input file into PDF form, unlock it, stamp
// it, set its properties, lock it again, and hand back the result.

use std::path::{Path, PathBuf};

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use stempel_core::config::{FileOptions, FileOverrides, ProcessorConfig};
use stempel_core::error::{Result, StempelError};
use stempel_core::types::{FileType, PasswordState, PdfMetadata};

use crate::convert::DocumentConverter;
use crate::pdf::{PdfCpu, PdfTool};

/// Result of a successful [`PdfProcessor::process_file`] run.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessOutcome {
    /// The PDF that was stamped (the input itself, or the converted copy).
    pub pdf_path: PathBuf,
    /// Final PDF bytes, base64 encoded.
    pub base64: String,
    /// Whether the input was password protected (and has been re-encrypted).
    pub was_protected: bool,
    /// Hex SHA-256 of the final PDF bytes.
    pub sha256: String,
}

/// Stamps one input file. The PDF tool is a type parameter so the pipeline
/// can run against a fake in tests.
pub struct PdfProcessor<T: PdfTool = PdfCpu> {
    path: PathBuf,
    file: FileOptions,
    metadata: PdfMetadata,
    tool: T,
}

impl PdfProcessor<PdfCpu> {
    /// Processor for `path` with default options and `pdfcpu` from `PATH`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::from_config(path, &ProcessorConfig::default())
    }

    /// Processor for `path` configured from a loaded [`ProcessorConfig`].
    pub fn from_config(path: impl Into<PathBuf>, config: &ProcessorConfig) -> Self {
        Self {
            path: path.into(),
            file: config.file.clone(),
            metadata: config.metadata.clone(),
            tool: PdfCpu::new(&config.pdfcpu_binary),
        }
    }
}

impl<T: PdfTool> PdfProcessor<T> {
    /// Swap the PDF tool implementation.
    pub fn with_tool<U: PdfTool>(self, tool: U) -> PdfProcessor<U> {
        PdfProcessor {
            path: self.path,
            file: self.file,
            metadata: self.metadata,
            tool,
        }
    }

    /// Merge document properties; non-blank fields replace configured ones.
    pub fn with_metadata(mut self, metadata: PdfMetadata) -> Self {
        self.metadata = self.metadata.merge(metadata);
        self
    }

    /// Merge per-file options (password, stamp image, stamp position).
    pub fn with_file_options(mut self, overrides: FileOverrides) -> Self {
        self.file = self.file.merge(overrides);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_options(&self) -> &FileOptions {
        &self.file
    }

    pub fn metadata(&self) -> &PdfMetadata {
        &self.metadata
    }

    /// Run the whole pipeline.
    ///
    /// Nothing on disk is touched until the input type and stamp image have
    /// been checked. A protected input is decrypted in place and encrypted
    /// again with the same password afterwards, also when stamping fails.
    #[instrument(skip_all, fields(path = %self.path.display()))]
    pub fn process_file(&self) -> Result<ProcessOutcome> {
        let file_type = DocumentConverter::classify(&self.path)?;
        let stamp = self.stamp_image()?;

        let (pdf_path, relock) = match file_type {
            FileType::Pdf => {
                let password = self.unlock(&self.path)?;
                (self.path.clone(), password)
            }
            _ => (DocumentConverter::image_to_pdf(&self.path)?, None),
        };

        let applied = self.apply(&pdf_path, stamp);
        if let Some(password) = relock {
            match (applied.is_ok(), self.tool.encrypt(&pdf_path, password)) {
                (_, Ok(())) => debug!("PDF re-encrypted"),
                (true, Err(err)) => return Err(err),
                (false, Err(err)) => warn!(error = %err, "re-encrypting after a failed run"),
            }
        }
        applied?;

        let bytes = std::fs::read(&pdf_path)?;
        let sha256 = hex::encode(Sha256::digest(&bytes));
        info!(
            pdf = %pdf_path.display(),
            bytes = bytes.len(),
            %sha256,
            "File processed"
        );

        Ok(ProcessOutcome {
            base64: BASE64.encode(&bytes),
            pdf_path,
            was_protected: relock.is_some(),
            sha256,
        })
    }

    /// The configured stamp image, which must exist.
    fn stamp_image(&self) -> Result<&Path> {
        let stamp = self
            .file
            .stamp_image
            .as_deref()
            .ok_or(StempelError::MissingStamp)?;
        if !stamp.is_file() {
            return Err(StempelError::StampNotFound(stamp.to_path_buf()));
        }
        Ok(stamp)
    }

    /// Decrypt `pdf` in place if it is protected. Returns the password to
    /// re-encrypt with, or `None` for an unprotected file.
    fn unlock(&self, pdf: &Path) -> Result<Option<&str>> {
        if self.tool.detect_password(pdf, None)? == PasswordState::Unprotected {
            return Ok(None);
        }

        let password = self
            .file
            .password
            .as_deref()
            .ok_or_else(|| StempelError::PasswordRequired(pdf.to_path_buf()))?;

        if self.tool.detect_password(pdf, Some(password))?.is_protected() {
            return Err(StempelError::ValidationFailed {
                path: pdf.to_path_buf(),
                detail: "the supplied password was rejected".into(),
            });
        }

        self.tool.decrypt(pdf, password)?;
        Ok(Some(password))
    }

    fn apply(&self, pdf: &Path, stamp: &Path) -> Result<()> {
        self.tool.stamp(pdf, stamp, self.file.stamp_position)?;
        if !self.metadata.is_empty() {
            self.tool.set_metadata(pdf, &self.metadata)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use stempel_core::types::StampPosition;

    /// Records every call; the "file" is protected by `password` until
    /// decrypted.
    #[derive(Default)]
    struct RecordingTool {
        password: Option<String>,
        fail_stamp: bool,
        calls: RefCell<Vec<String>>,
    }

    impl RecordingTool {
        fn protected(password: &str) -> Self {
            Self {
                password: Some(password.into()),
                ..Self::default()
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }
    }

    impl PdfTool for &RecordingTool {
        fn detect_password(&self, _pdf: &Path, password: Option<&str>) -> Result<PasswordState> {
            self.calls
                .borrow_mut()
                .push(format!("validate {}", password.unwrap_or("-")));
            Ok(match (&self.password, password) {
                (None, _) => PasswordState::Unprotected,
                (Some(expected), Some(given)) if expected == given => PasswordState::Unprotected,
                _ => PasswordState::Protected,
            })
        }

        fn decrypt(&self, _pdf: &Path, password: &str) -> Result<()> {
            self.calls.borrow_mut().push(format!("decrypt {password}"));
            Ok(())
        }

        fn encrypt(&self, _pdf: &Path, password: &str) -> Result<()> {
            self.calls.borrow_mut().push(format!("encrypt {password}"));
            Ok(())
        }

        fn stamp(&self, _pdf: &Path, image: &Path, position: StampPosition) -> Result<()> {
            let name = image.file_name().unwrap().to_string_lossy().into_owned();
            self.calls
                .borrow_mut()
                .push(format!("stamp {name} {position}"));
            if self.fail_stamp {
                return Err(StempelError::ToolFailed {
                    tool: "pdfcpu stamp".into(),
                    code: "1".into(),
                    stderr: "boom".into(),
                });
            }
            Ok(())
        }

        fn set_metadata(&self, _pdf: &Path, metadata: &PdfMetadata) -> Result<()> {
            let keys: Vec<&str> = metadata.entries().into_iter().map(|(k, _)| k).collect();
            self.calls
                .borrow_mut()
                .push(format!("properties {}", keys.join(",")));
            Ok(())
        }
    }

    struct Fixture {
        dir: tempfile::TempDir,
        stamp: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let stamp = dir.path().join("qr.png");
            std::fs::write(&stamp, b"png bytes are not inspected").unwrap();
            Self { dir, stamp }
        }

        fn pdf(&self, name: &str) -> PathBuf {
            let path = self.dir.path().join(name);
            std::fs::write(&path, b"%PDF-1.7 fake").unwrap();
            path
        }

        fn with_stamp(&self) -> FileOverrides {
            FileOverrides {
                stamp_image: Some(self.stamp.clone()),
                ..FileOverrides::default()
            }
        }
    }

    #[test]
    fn unprotected_pdf_is_stamped_and_encoded() {
        let fx = Fixture::new();
        let pdf = fx.pdf("invoice.pdf");
        let tool = RecordingTool::default();

        let outcome = PdfProcessor::new(&pdf)
            .with_file_options(fx.with_stamp())
            .with_tool(&tool)
            .process_file()
            .unwrap();

        assert_eq!(tool.calls(), ["validate -", "stamp qr.png br"]);
        assert_eq!(outcome.pdf_path, pdf);
        assert!(!outcome.was_protected);
        assert_eq!(BASE64.decode(&outcome.base64).unwrap(), b"%PDF-1.7 fake");
        assert_eq!(
            outcome.sha256,
            hex::encode(Sha256::digest(b"%PDF-1.7 fake"))
        );
    }

    #[test]
    fn protected_pdf_is_decrypted_stamped_and_reencrypted() {
        let fx = Fixture::new();
        let pdf = fx.pdf("secret.pdf");
        let tool = RecordingTool::protected("hunter2");

        let outcome = PdfProcessor::new(&pdf)
            .with_file_options(FileOverrides {
                password: Some("hunter2".into()),
                stamp_position: Some(StampPosition::TopCenter),
                ..fx.with_stamp()
            })
            .with_metadata(PdfMetadata {
                title: Some("Lease".into()),
                author: Some("  ".into()),
                subject: None,
            })
            .with_tool(&tool)
            .process_file()
            .unwrap();

        assert!(outcome.was_protected);
        assert_eq!(
            tool.calls(),
            [
                "validate -",
                "validate hunter2",
                "decrypt hunter2",
                "stamp qr.png tc",
                "properties Title",
                "encrypt hunter2",
            ]
        );
    }

    #[test]
    fn protected_pdf_without_password_is_rejected() {
        let fx = Fixture::new();
        let pdf = fx.pdf("secret.pdf");
        let tool = RecordingTool::protected("hunter2");

        let err = PdfProcessor::new(&pdf)
            .with_file_options(fx.with_stamp())
            .with_tool(&tool)
            .process_file()
            .unwrap_err();

        assert!(matches!(err, StempelError::PasswordRequired(ref p) if p == &pdf));
        assert_eq!(tool.calls(), ["validate -"]);
    }

    #[test]
    fn wrong_password_does_not_touch_the_file() {
        let fx = Fixture::new();
        let pdf = fx.pdf("secret.pdf");
        let tool = RecordingTool::protected("hunter2");

        let err = PdfProcessor::new(&pdf)
            .with_file_options(FileOverrides {
                password: Some("letmein".into()),
                ..fx.with_stamp()
            })
            .with_tool(&tool)
            .process_file()
            .unwrap_err();

        assert!(matches!(err, StempelError::ValidationFailed { .. }));
        assert_eq!(tool.calls(), ["validate -", "validate letmein"]);
    }

    #[test]
    fn failed_stamp_still_reencrypts() {
        let fx = Fixture::new();
        let pdf = fx.pdf("secret.pdf");
        let tool = RecordingTool {
            fail_stamp: true,
            ..RecordingTool::protected("pw")
        };

        let err = PdfProcessor::new(&pdf)
            .with_file_options(FileOverrides {
                password: Some("pw".into()),
                ..fx.with_stamp()
            })
            .with_tool(&tool)
            .process_file()
            .unwrap_err();

        assert!(matches!(err, StempelError::ToolFailed { .. }));
        assert_eq!(tool.calls().last().map(String::as_str), Some("encrypt pw"));
    }

    #[test]
    fn missing_stamp_is_reported_before_any_tool_call() {
        let fx = Fixture::new();
        let pdf = fx.pdf("plain.pdf");
        let tool = RecordingTool::default();

        let err = PdfProcessor::new(&pdf)
            .with_tool(&tool)
            .process_file()
            .unwrap_err();
        assert!(matches!(err, StempelError::MissingStamp));

        let err = PdfProcessor::new(&pdf)
            .with_file_options(FileOverrides {
                stamp_image: Some(fx.dir.path().join("gone.png")),
                ..FileOverrides::default()
            })
            .with_tool(&tool)
            .process_file()
            .unwrap_err();
        assert!(matches!(err, StempelError::StampNotFound(_)));
        assert!(tool.calls().is_empty());
    }

    #[test]
    fn image_input_is_converted_then_stamped() {
        let fx = Fixture::new();
        let source = fx.dir.path().join("photo.png");
        image::RgbImage::from_pixel(30, 20, image::Rgb([0, 128, 255]))
            .save(&source)
            .unwrap();
        let tool = RecordingTool::default();

        let outcome = PdfProcessor::new(&source)
            .with_file_options(fx.with_stamp())
            .with_tool(&tool)
            .process_file()
            .unwrap();

        assert_eq!(outcome.pdf_path, fx.dir.path().join("process-photo.pdf"));
        assert!(BASE64.decode(&outcome.base64).unwrap().starts_with(b"%PDF"));
        assert_eq!(tool.calls(), ["stamp qr.png br"]);
    }

    #[test]
    fn documents_and_unknown_types_are_rejected() {
        let fx = Fixture::new();
        let tool = RecordingTool::default();

        let err = PdfProcessor::new(fx.dir.path().join("letter.doc"))
            .with_file_options(fx.with_stamp())
            .with_tool(&tool)
            .process_file()
            .unwrap_err();
        assert!(matches!(err, StempelError::Unsupported(_)));

        let err = PdfProcessor::new(fx.dir.path().join("data.csv"))
            .with_tool(&tool)
            .process_file()
            .unwrap_err();
        assert!(matches!(err, StempelError::UnsupportedFileType(_)));
        assert!(tool.calls().is_empty());
    }

    #[test]
    fn from_config_carries_options() {
        let mut config = ProcessorConfig::default();
        config.file.password = Some("cfg".into());
        config.metadata.author = Some("Ada".into());
        config.pdfcpu_binary = PathBuf::from("/opt/pdfcpu/bin/pdfcpu");

        let processor = PdfProcessor::from_config("in.pdf", &config).with_file_options(
            FileOverrides {
                password: Some(String::new()),
                ..FileOverrides::default()
            },
        );
        assert_eq!(processor.path(), Path::new("in.pdf"));
        assert_eq!(processor.file_options().password.as_deref(), Some("cfg"));
        assert_eq!(processor.metadata().author.as_deref(), Some("Ada"));
        assert_eq!(
            processor.tool.binary(),
            Path::new("/opt/pdfcpu/bin/pdfcpu")
        );
    }
}
