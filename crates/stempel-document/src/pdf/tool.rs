// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// External PDF tool — stamping, document properties, and password handling
// delegated to a command-line PDF processor.
//
// `PdfTool` is the capability the processing pipeline depends on; `PdfCpu`
// implements it by running the pdfcpu binary. Arguments are passed as a
// vector, never through a shell, so paths and passwords need no quoting.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use stempel_core::error::{Result, StempelError};
use stempel_core::types::{PasswordState, PdfMetadata, StampPosition};
use tracing::{debug, info, instrument, warn};

/// Stamp scale relative to the page, as pdfcpu's `sc:` parameter.
const STAMP_SCALE: &str = ".1";

/// Operations on a PDF file that are delegated to an external tool. All
/// mutating operations rewrite `pdf` in place.
pub trait PdfTool {
    /// Probe whether `pdf` needs a password, trying `password` if given.
    ///
    /// A file that fails validation for reasons unrelated to encryption
    /// (corruption, unsupported structure) is an error, not `Protected`.
    fn detect_password(&self, pdf: &Path, password: Option<&str>) -> Result<PasswordState>;

    /// Remove password protection.
    fn decrypt(&self, pdf: &Path, password: &str) -> Result<()>;

    /// Protect the file, using `password` as both user and owner password.
    fn encrypt(&self, pdf: &Path, password: &str) -> Result<()>;

    /// Stamp `image` onto every page at `position`.
    fn stamp(&self, pdf: &Path, image: &Path, position: StampPosition) -> Result<()>;

    /// Add or replace the document properties that are set in `metadata`.
    fn set_metadata(&self, pdf: &Path, metadata: &PdfMetadata) -> Result<()>;
}

/// [`PdfTool`] backed by the pdfcpu command-line tool.
#[derive(Debug, Clone)]
pub struct PdfCpu {
    binary: PathBuf,
}

impl Default for PdfCpu {
    fn default() -> Self {
        Self::new("pdfcpu")
    }
}

impl PdfCpu {
    /// Use the executable at `binary` (a bare name is looked up on `PATH`).
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Run pdfcpu and return its output whatever the exit status.
    fn run(&self, args: &[OsString]) -> Result<Output> {
        debug!(binary = %self.binary.display(), ?args, "Running pdfcpu");
        Command::new(&self.binary)
            .args(args)
            .output()
            .map_err(|err| match err.kind() {
                io::ErrorKind::NotFound => StempelError::ToolUnavailable(format!(
                    "{} ({})",
                    self.binary.display(),
                    err
                )),
                _ => StempelError::Io(err),
            })
    }

    /// Run pdfcpu and turn a non-zero exit status into `ToolFailed`.
    fn run_checked(&self, args: Vec<OsString>) -> Result<()> {
        let output = self.run(&args)?;
        if output.status.success() {
            return Ok(());
        }
        let subcommand = args
            .first()
            .map(|a| a.to_string_lossy().into_owned())
            .unwrap_or_default();
        Err(StempelError::ToolFailed {
            tool: format!("pdfcpu {subcommand}"),
            code: exit_code(&output),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

impl PdfTool for PdfCpu {
    #[instrument(skip_all, fields(pdf = %pdf.display(), with_password = password.is_some()))]
    fn detect_password(&self, pdf: &Path, password: Option<&str>) -> Result<PasswordState> {
        let output = self.run(&validate_args(pdf, password))?;
        if output.status.success() {
            debug!("PDF validated without a password prompt");
            return Ok(PasswordState::Unprotected);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        if mentions_password(&stderr) || mentions_password(&stdout) {
            info!("PDF is password protected");
            return Ok(PasswordState::Protected);
        }

        warn!(code = %exit_code(&output), "PDF validation failed");
        Err(StempelError::ValidationFailed {
            path: pdf.to_path_buf(),
            detail: format!(
                "exit code {}: {}",
                exit_code(&output),
                stderr.trim()
            ),
        })
    }

    #[instrument(skip_all, fields(pdf = %pdf.display()))]
    fn decrypt(&self, pdf: &Path, password: &str) -> Result<()> {
        self.run_checked(decrypt_args(pdf, password))?;
        info!("PDF decrypted");
        Ok(())
    }

    #[instrument(skip_all, fields(pdf = %pdf.display()))]
    fn encrypt(&self, pdf: &Path, password: &str) -> Result<()> {
        self.run_checked(encrypt_args(pdf, password))?;
        info!("PDF encrypted");
        Ok(())
    }

    #[instrument(skip_all, fields(pdf = %pdf.display(), image = %image.display(), %position))]
    fn stamp(&self, pdf: &Path, image: &Path, position: StampPosition) -> Result<()> {
        self.run_checked(stamp_args(pdf, image, position))?;
        info!("Stamp added");
        Ok(())
    }

    #[instrument(skip_all, fields(pdf = %pdf.display()))]
    fn set_metadata(&self, pdf: &Path, metadata: &PdfMetadata) -> Result<()> {
        if metadata.is_empty() {
            debug!("No metadata to write");
            return Ok(());
        }
        self.run_checked(properties_args(pdf, metadata))?;
        info!(fields = metadata.entries().len(), "Metadata written");
        Ok(())
    }
}

// -- Argument builders --------------------------------------------------------

fn validate_args(pdf: &Path, password: Option<&str>) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["validate".into()];
    if let Some(pw) = password.filter(|pw| !pw.is_empty()) {
        args.push("-upw".into());
        args.push(pw.into());
    }
    args.push(pdf.into());
    args
}

fn decrypt_args(pdf: &Path, password: &str) -> Vec<OsString> {
    vec!["decrypt".into(), "-upw".into(), password.into(), pdf.into()]
}

fn encrypt_args(pdf: &Path, password: &str) -> Vec<OsString> {
    vec![
        "encrypt".into(),
        "-upw".into(),
        password.into(),
        "-opw".into(),
        password.into(),
        pdf.into(),
    ]
}

fn stamp_args(pdf: &Path, image: &Path, position: StampPosition) -> Vec<OsString> {
    vec![
        "stamp".into(),
        "add".into(),
        "-pages".into(),
        "even,odd".into(),
        "-mode".into(),
        "image".into(),
        "--".into(),
        image.into(),
        format!("pos:{}, rot:0, sc:{}", position.keyword(), STAMP_SCALE).into(),
        pdf.into(),
    ]
}

fn properties_args(pdf: &Path, metadata: &PdfMetadata) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["properties".into(), "add".into(), pdf.into()];
    args.extend(
        metadata
            .entries()
            .into_iter()
            .map(|(key, value)| OsString::from(format!("{key} = {value}"))),
    );
    args
}

fn mentions_password(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    lower.contains("password") || lower.contains("encrypt")
}

fn exit_code(output: &Output) -> String {
    output
        .status
        .code()
        .map_or_else(|| "unknown".to_string(), |c| c.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: Vec<OsString>) -> Vec<String> {
        args.into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn validate_passes_password_only_when_present() {
        let pdf = Path::new("in.pdf");
        assert_eq!(strings(validate_args(pdf, None)), ["validate", "in.pdf"]);
        assert_eq!(strings(validate_args(pdf, Some(""))), ["validate", "in.pdf"]);
        assert_eq!(
            strings(validate_args(pdf, Some("it's secret"))),
            ["validate", "-upw", "it's secret", "in.pdf"]
        );
    }

    #[test]
    fn encrypt_sets_user_and_owner_password() {
        assert_eq!(
            strings(encrypt_args(Path::new("a.pdf"), "pw")),
            ["encrypt", "-upw", "pw", "-opw", "pw", "a.pdf"]
        );
        assert_eq!(
            strings(decrypt_args(Path::new("a.pdf"), "pw")),
            ["decrypt", "-upw", "pw", "a.pdf"]
        );
    }

    #[test]
    fn stamp_uses_position_keyword_and_scale() {
        let args = strings(stamp_args(
            Path::new("doc.pdf"),
            Path::new("qr code.png"),
            StampPosition::TopLeft,
        ));
        assert_eq!(
            args,
            [
                "stamp",
                "add",
                "-pages",
                "even,odd",
                "-mode",
                "image",
                "--",
                "qr code.png",
                "pos:tl, rot:0, sc:.1",
                "doc.pdf"
            ]
        );
    }

    #[test]
    fn properties_skip_blank_fields() {
        let meta = PdfMetadata {
            title: Some("Me to".into()),
            author: Some(String::new()),
            subject: Some("Tax".into()),
        };
        assert_eq!(
            strings(properties_args(Path::new("x.pdf"), &meta)),
            ["properties", "add", "x.pdf", "Title = Me to", "Subject = Tax"]
        );
    }

    #[test]
    fn password_messages_are_recognised() {
        assert!(mentions_password("pdfcpu: please provide the correct password"));
        assert!(mentions_password("This file is Encrypted"));
        assert!(!mentions_password("pdfcpu: corrupt xref table"));
    }

    #[test]
    fn missing_binary_is_tool_unavailable() {
        let tool = PdfCpu::new("/nonexistent/bin/pdfcpu-missing");
        let err = tool
            .detect_password(Path::new("in.pdf"), None)
            .unwrap_err();
        assert!(matches!(err, StempelError::ToolUnavailable(_)));
    }

    #[test]
    fn empty_metadata_does_not_run_the_tool() {
        let tool = PdfCpu::new("/nonexistent/bin/pdfcpu-missing");
        tool.set_metadata(Path::new("in.pdf"), &PdfMetadata::default())
            .unwrap();
    }

    #[cfg(unix)]
    mod with_fake_binary {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        /// Shell script that records its arguments and exits with `code`
        /// after writing `stderr`.
        fn fake_pdfcpu(dir: &Path, stderr: &str, code: i32) -> PathBuf {
            let path = dir.join("pdfcpu");
            let script = format!(
                "#!/bin/sh\nprintf '%s\\n' \"$@\" > \"{}\"\nprintf '%s' '{}' >&2\nexit {}\n",
                dir.join("args.txt").display(),
                stderr,
                code
            );
            std::fs::write(&path, script).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        fn recorded_args(dir: &Path) -> Vec<String> {
            std::fs::read_to_string(dir.join("args.txt"))
                .unwrap()
                .lines()
                .map(str::to_string)
                .collect()
        }

        #[test]
        fn clean_validation_is_unprotected() {
            let dir = tempfile::tempdir().unwrap();
            let tool = PdfCpu::new(fake_pdfcpu(dir.path(), "", 0));
            let state = tool.detect_password(Path::new("in.pdf"), None).unwrap();
            assert_eq!(state, PasswordState::Unprotected);
            assert_eq!(recorded_args(dir.path()), ["validate", "in.pdf"]);
        }

        #[test]
        fn password_failure_is_protected() {
            let dir = tempfile::tempdir().unwrap();
            let tool = PdfCpu::new(fake_pdfcpu(
                dir.path(),
                "pdfcpu: please provide the correct password",
                1,
            ));
            let state = tool.detect_password(Path::new("in.pdf"), None).unwrap();
            assert_eq!(state, PasswordState::Protected);
        }

        #[test]
        fn unrelated_failure_is_not_mistaken_for_a_password() {
            let dir = tempfile::tempdir().unwrap();
            let tool = PdfCpu::new(fake_pdfcpu(dir.path(), "pdfcpu: corrupt xref table", 1));
            let err = tool
                .detect_password(Path::new("in.pdf"), Some("pw"))
                .unwrap_err();
            match err {
                StempelError::ValidationFailed { detail, .. } => {
                    assert!(detail.contains("corrupt xref table"));
                    assert!(detail.contains("exit code 1"));
                }
                other => panic!("unexpected error variant: {other}"),
            }
        }

        #[test]
        fn failed_stamp_reports_exit_code_and_stderr() {
            let dir = tempfile::tempdir().unwrap();
            let tool = PdfCpu::new(fake_pdfcpu(dir.path(), "  bad image  ", 3));
            let err = tool
                .stamp(Path::new("in.pdf"), Path::new("qr.png"), StampPosition::Center)
                .unwrap_err();
            match err {
                StempelError::ToolFailed { tool, code, stderr } => {
                    assert_eq!(tool, "pdfcpu stamp");
                    assert_eq!(code, "3");
                    assert_eq!(stderr, "bad image");
                }
                other => panic!("unexpected error variant: {other}"),
            }
            assert_eq!(recorded_args(dir.path())[8], "pos:c, rot:0, sc:.1");
        }

        #[test]
        fn successful_encrypt_passes_arguments_verbatim() {
            let dir = tempfile::tempdir().unwrap();
            let tool = PdfCpu::new(fake_pdfcpu(dir.path(), "", 0));
            tool.encrypt(Path::new("with space.pdf"), "p w; rm -rf")
                .unwrap();
            assert_eq!(
                recorded_args(dir.path()),
                ["encrypt", "-upw", "p w; rm -rf", "-opw", "p w; rm -rf", "with space.pdf"]
            );
        }
    }
}
