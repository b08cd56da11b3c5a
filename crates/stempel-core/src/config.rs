// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Configuration objects and their override/merge rules.
//
// Each option struct has a companion `*Overrides` struct whose fields are all
// optional. `merge` keeps the base value for every field the override leaves
// unset, so callers can change one setting without restating the rest.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, StempelError};
use crate::types::{EccLevel, EncodeMode, PdfMetadata, PixelSize, StampPosition};

/// Settings for the icon-overlaid QR code generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QrOptions {
    /// Output image size (default 125x125).
    pub qr_size: PixelSize,
    /// Footprint the icon is resized to (default 30x30).
    pub icon_size: PixelSize,
    /// Error-correction level (default Medium).
    pub ecc: EccLevel,
    /// Data encoding mode (default Automatic).
    pub mode: EncodeMode,
    /// Light border around the symbol, in modules (default 0).
    pub quiet_zone: u32,
}

impl Default for QrOptions {
    fn default() -> Self {
        Self {
            qr_size: PixelSize::square(125),
            icon_size: PixelSize::square(30),
            ecc: EccLevel::Medium,
            mode: EncodeMode::Automatic,
            quiet_zone: 0,
        }
    }
}

/// Partial [`QrOptions`]; only the fields that are `Some` take effect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QrOverrides {
    pub qr_size: Option<PixelSize>,
    pub icon_size: Option<PixelSize>,
    pub ecc: Option<EccLevel>,
    pub mode: Option<EncodeMode>,
    pub quiet_zone: Option<u32>,
}

impl QrOptions {
    pub fn merge(self, overrides: QrOverrides) -> Self {
        Self {
            qr_size: overrides.qr_size.unwrap_or(self.qr_size),
            icon_size: overrides.icon_size.unwrap_or(self.icon_size),
            ecc: overrides.ecc.unwrap_or(self.ecc),
            mode: overrides.mode.unwrap_or(self.mode),
            quiet_zone: overrides.quiet_zone.unwrap_or(self.quiet_zone),
        }
    }
}

/// Per-file settings for the PDF processing pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileOptions {
    /// User password of a protected PDF; also used to re-encrypt it.
    pub password: Option<String>,
    /// Image stamped onto every page.
    pub stamp_image: Option<PathBuf>,
    /// Where the stamp is anchored (default bottom-right).
    pub stamp_position: StampPosition,
}

/// Partial [`FileOptions`].
///
/// Blank strings count as "not set", so a form that submits empty fields
/// does not wipe out configured values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileOverrides {
    pub password: Option<String>,
    pub stamp_image: Option<PathBuf>,
    pub stamp_position: Option<StampPosition>,
}

impl FileOptions {
    pub fn merge(self, overrides: FileOverrides) -> Self {
        Self {
            password: overrides
                .password
                .filter(|p| !p.is_empty())
                .or(self.password),
            stamp_image: overrides
                .stamp_image
                .filter(|p| !p.as_os_str().is_empty())
                .or(self.stamp_image),
            stamp_position: overrides.stamp_position.unwrap_or(self.stamp_position),
        }
    }
}

impl PdfMetadata {
    /// Field-wise merge: a non-blank field in `overrides` replaces the base.
    pub fn merge(self, overrides: PdfMetadata) -> Self {
        fn pick(base: Option<String>, over: Option<String>) -> Option<String> {
            over.filter(|v| !v.trim().is_empty()).or(base)
        }
        Self {
            title: pick(self.title, overrides.title),
            author: pick(self.author, overrides.author),
            subject: pick(self.subject, overrides.subject),
        }
    }
}

/// Everything the PDF processor needs, loadable from a JSON file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    pub file: FileOptions,
    pub metadata: PdfMetadata,
    pub qr: QrOptions,
    /// Path or name of the pdfcpu executable.
    pub pdfcpu_binary: PathBuf,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            file: FileOptions::default(),
            metadata: PdfMetadata::default(),
            qr: QrOptions::default(),
            pdfcpu_binary: PathBuf::from("pdfcpu"),
        }
    }
}

impl ProcessorConfig {
    /// Read a JSON configuration file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|err| {
            StempelError::Config(format!("cannot read {}: {}", path.display(), err))
        })?;
        let config = serde_json::from_str(&raw)?;
        Ok(config)
    }

    /// Write the configuration as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }
}
