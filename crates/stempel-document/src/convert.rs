// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Input conversion — turn whatever the user supplied into a PDF the stamping
// pipeline can work on.
//
// Raster images are wrapped in a single A4 page; word-processor documents
// are rejected.

use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use stempel_core::error::{Result, StempelError};
use stempel_core::types::FileType;

use crate::image::ImageProcessor;
use crate::pdf::PdfWriter;

/// Prefix of PDFs produced from non-PDF input.
pub const CONVERTED_PREFIX: &str = "process-";

/// Where the PDF converted from `source` is written: `process-<stem>.pdf`
/// in the same directory.
pub fn converted_pdf_path(source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    source.with_file_name(format!("{CONVERTED_PREFIX}{stem}.pdf"))
}

/// Converts supported inputs to PDF.
pub struct DocumentConverter;

impl DocumentConverter {
    /// Determine how `source` enters the pipeline, rejecting word-processor
    /// documents and unknown extensions.
    pub fn classify(source: &Path) -> Result<FileType> {
        match FileType::from_path(source) {
            Some(FileType::Document) => Err(StempelError::Unsupported(format!(
                "converting {} to PDF",
                source.display()
            ))),
            Some(file_type) => {
                debug!(?file_type, "input classified");
                Ok(file_type)
            }
            None => Err(StempelError::UnsupportedFileType(
                source
                    .extension()
                    .map(|e| e.to_string_lossy().into_owned())
                    .unwrap_or_else(|| source.display().to_string()),
            )),
        }
    }

    /// Wrap a JPEG/PNG in a single-page A4 PDF next to the source.
    #[instrument(skip_all, fields(source = %source.display()))]
    pub fn image_to_pdf(source: &Path) -> Result<PathBuf> {
        let image = ImageProcessor::open(source)?;
        let target = converted_pdf_path(source);

        let mut writer = PdfWriter::a4();
        if let Some(stem) = source.file_stem() {
            writer.set_title(stem.to_string_lossy());
        }
        writer.write_image_to_file(image.as_dynamic(), &target)?;

        info!(target = %target.display(), "Image converted to PDF");
        Ok(target)
    }
}
