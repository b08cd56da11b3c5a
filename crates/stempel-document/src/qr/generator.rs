// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Icon-overlaid QR code generator.
//
// Pipeline: encode -> sharp scale -> load icon -> smooth resize -> composite
// (QR first, icon second, both "over") -> PNG -> atomic write. Every step
// fails fast and nothing is left at the output path on failure.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbaImage};
use stempel_core::config::QrOptions;
use stempel_core::error::{IconLoadCause, QrError};
use stempel_core::types::PixelSize;
use tracing::{debug, instrument};

use crate::image::ImageProcessor;
use crate::qr::symbol::SymbolMatrix;

/// Generates QR codes with a small icon composited at their centre.
///
/// Holds only immutable options, so one generator can be shared between
/// threads and used for any number of calls.
#[derive(Debug, Clone, Default)]
pub struct IconQrGenerator {
    options: QrOptions,
}

impl IconQrGenerator {
    pub fn new(options: QrOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &QrOptions {
        &self.options
    }

    /// Build the composite RGBA image in memory.
    #[instrument(skip(self, data, icon_path), fields(data_len = data.len(), icon = %icon_path.as_ref().display()))]
    pub fn render(&self, data: &str, icon_path: impl AsRef<Path>) -> Result<RgbaImage, QrError> {
        let opts = &self.options;

        let symbol =
            SymbolMatrix::encode(data, opts.ecc, opts.mode)?.with_quiet_zone(opts.quiet_zone);
        let qr_image = symbol.render(opts.qr_size)?;

        let icon = load_icon(icon_path.as_ref())?;
        let icon = resize_icon(icon, opts.icon_size, opts.qr_size)?;

        Ok(composite(&qr_image, &icon))
    }

    /// Render and write the composite as a PNG at `output_path`, returning
    /// the path on success.
    ///
    /// The PNG is written to a temporary file beside `output_path` and
    /// renamed into place, so a failed call never leaves a truncated file.
    pub fn generate(
        &self,
        data: &str,
        icon_path: impl AsRef<Path>,
        output_path: impl AsRef<Path>,
    ) -> Result<PathBuf, QrError> {
        let output_path = output_path.as_ref();
        let canvas = self.render(data, icon_path)?;

        let png = ImageProcessor::from_dynamic(DynamicImage::ImageRgba8(canvas))
            .to_png_bytes()
            .map_err(|err| QrError::Write {
                path: output_path.to_path_buf(),
                detail: err.to_string(),
            })?;

        write_atomically(output_path, &png).map_err(|err| QrError::Write {
            path: output_path.to_path_buf(),
            detail: err.to_string(),
        })?;

        debug!(path = %output_path.display(), bytes = png.len(), "QR code written");
        Ok(output_path.to_path_buf())
    }
}

/// Generate an icon-overlaid QR code PNG with the given options.
pub fn generate(
    data: &str,
    icon_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    options: QrOptions,
) -> Result<PathBuf, QrError> {
    IconQrGenerator::new(options).generate(data, icon_path, output_path)
}

/// Top-left corner that centres `icon` on `canvas` (truncating division).
pub fn icon_offset(canvas: PixelSize, icon: PixelSize) -> (u32, u32) {
    (
        canvas.width.saturating_sub(icon.width) / 2,
        canvas.height.saturating_sub(icon.height) / 2,
    )
}

fn load_icon(path: &Path) -> Result<DynamicImage, QrError> {
    let bytes = std::fs::read(path).map_err(|err| QrError::IconLoad {
        path: path.to_path_buf(),
        cause: match err.kind() {
            io::ErrorKind::NotFound => IconLoadCause::NotFound,
            _ => IconLoadCause::Io(err),
        },
    })?;

    image::load_from_memory(&bytes).map_err(|err| QrError::IconLoad {
        path: path.to_path_buf(),
        cause: IconLoadCause::Decode(err.to_string()),
    })
}

fn resize_icon(icon: DynamicImage, size: PixelSize, canvas: PixelSize) -> Result<RgbaImage, QrError> {
    if size.is_empty() {
        return Err(QrError::Scaling(format!(
            "icon size must be non-zero, got {size}"
        )));
    }
    if size.width > canvas.width || size.height > canvas.height {
        return Err(QrError::Scaling(format!(
            "icon size {size} does not fit inside QR size {canvas}"
        )));
    }

    Ok(ImageProcessor::from_dynamic(icon)
        .resize_exact_with(size.width, size.height, FilterType::CatmullRom)
        .to_rgba8())
}

fn composite(qr_image: &RgbaImage, icon: &RgbaImage) -> RgbaImage {
    let mut canvas = RgbaImage::new(qr_image.width(), qr_image.height());
    imageops::overlay(&mut canvas, qr_image, 0, 0);

    let (x, y) = icon_offset(
        PixelSize::new(canvas.width(), canvas.height()),
        PixelSize::new(icon.width(), icon.height()),
    );
    imageops::overlay(&mut canvas, icon, i64::from(x), i64::from(y));
    canvas
}

fn write_atomically(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::Builder::new()
        .prefix(".stempel-")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|err| err.error)?;
    Ok(())
}
