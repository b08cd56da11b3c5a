// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// QR symbol encoding and sharp (nearest-neighbour) rasterisation.
//
// Encoding is delegated to the `qrcode` crate. Rendering scales every module
// to an integer number of pixels so module edges stay crisp; leftover space
// is split evenly around the symbol and painted light.

use image::{ImageBuffer, Rgba, RgbaImage};
use qrcode::bits::Bits;
use qrcode::{Color, EcLevel, QrCode, Version};
use stempel_core::error::QrError;
use stempel_core::types::{EccLevel, EncodeMode, PixelSize};
use tracing::debug;

const DARK: Rgba<u8> = Rgba([0, 0, 0, 255]);
const LIGHT: Rgba<u8> = Rgba([255, 255, 255, 255]);

const ALPHANUMERIC_CHARSET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ $%*+-./:";

/// Unscaled QR module grid. `true` is a dark module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolMatrix {
    width: usize,
    modules: Vec<bool>,
}

impl SymbolMatrix {
    /// Encode `data` at the given error-correction level and mode.
    ///
    /// Explicit modes use the smallest QR version (1-40) that holds the
    /// payload; `Automatic` lets the encoder split the text into optimal
    /// numeric/alphanumeric/byte segments.
    pub fn encode(data: &str, ecc: EccLevel, mode: EncodeMode) -> Result<Self, QrError> {
        if data.is_empty() {
            return Err(QrError::Encoding("payload is empty".into()));
        }

        let ec_level = ec_level(ecc);
        let code = match mode {
            EncodeMode::Automatic => QrCode::with_error_correction_level(data.as_bytes(), ec_level)
                .map_err(|err| encoding_error(data, ecc, err))?,
            explicit => {
                check_charset(data, explicit)?;
                encode_with_mode(data, ec_level, explicit)
                    .map_err(|err| encoding_error(data, ecc, err))?
            }
        };

        let modules = code
            .to_colors()
            .into_iter()
            .map(|color| color == Color::Dark)
            .collect();

        debug!(
            version = ?code.version(),
            width = code.width(),
            ?ecc,
            ?mode,
            "QR symbol encoded"
        );

        Ok(Self {
            width: code.width(),
            modules,
        })
    }

    /// Side length in modules.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Module at column `x`, row `y`. Out-of-range coordinates are light.
    pub fn is_dark(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.width && self.modules[y * self.width + x]
    }

    /// Surround the symbol with `border` light modules on every side.
    pub fn with_quiet_zone(self, border: u32) -> Self {
        if border == 0 {
            return self;
        }
        let border = border as usize;
        let width = self.width + 2 * border;
        let mut modules = vec![false; width * width];
        for y in 0..self.width {
            for x in 0..self.width {
                modules[(y + border) * width + x + border] = self.is_dark(x, y);
            }
        }
        Self { width, modules }
    }

    /// Rasterise to exactly `size` pixels with nearest-neighbour scaling.
    ///
    /// Each module becomes a `factor x factor` block where
    /// `factor = min(width / modules, height / modules)`. Fails when either
    /// dimension is zero or too small to give every module one pixel.
    pub fn render(&self, size: PixelSize) -> Result<RgbaImage, QrError> {
        if size.is_empty() {
            return Err(QrError::Scaling(format!(
                "QR size must be non-zero, got {size}"
            )));
        }

        let modules = self.width as u32;
        let factor = (size.width / modules).min(size.height / modules);
        if factor == 0 {
            return Err(QrError::Scaling(format!(
                "cannot scale a {modules}x{modules} module symbol down to {size}"
            )));
        }

        let offset_x = (size.width - modules * factor) / 2;
        let offset_y = (size.height - modules * factor) / 2;

        let image = ImageBuffer::from_fn(size.width, size.height, |x, y| {
            if x < offset_x || y < offset_y {
                return LIGHT;
            }
            let mx = ((x - offset_x) / factor) as usize;
            let my = ((y - offset_y) / factor) as usize;
            if self.is_dark(mx, my) { DARK } else { LIGHT }
        });

        debug!(factor, offset_x, offset_y, "QR symbol rasterised");
        Ok(image)
    }
}

fn ec_level(ecc: EccLevel) -> EcLevel {
    match ecc {
        EccLevel::Low => EcLevel::L,
        EccLevel::Medium => EcLevel::M,
        EccLevel::Quartile => EcLevel::Q,
        EccLevel::High => EcLevel::H,
    }
}

/// Reject characters the selected mode cannot carry before handing the data
/// to the encoder, which assumes its input is already valid.
fn check_charset(data: &str, mode: EncodeMode) -> Result<(), QrError> {
    let invalid = match mode {
        EncodeMode::Numeric => data.bytes().find(|b| !b.is_ascii_digit()),
        EncodeMode::Alphanumeric => data.bytes().find(|b| !ALPHANUMERIC_CHARSET.contains(b)),
        EncodeMode::Automatic | EncodeMode::Byte => None,
    };
    match invalid {
        Some(byte) => Err(QrError::Encoding(format!(
            "character {:?} is not allowed in {:?} mode",
            char::from(byte),
            mode
        ))),
        None => Ok(()),
    }
}

fn encode_with_mode(
    data: &str,
    ec_level: EcLevel,
    mode: EncodeMode,
) -> qrcode::QrResult<QrCode> {
    let mut last_err = qrcode::types::QrError::DataTooLong;
    for version in 1..=40 {
        let mut bits = Bits::new(Version::Normal(version));
        let pushed = match mode {
            EncodeMode::Numeric => bits.push_numeric_data(data.as_bytes()),
            EncodeMode::Alphanumeric => bits.push_alphanumeric_data(data.as_bytes()),
            EncodeMode::Automatic | EncodeMode::Byte => bits.push_byte_data(data.as_bytes()),
        };
        match pushed.and_then(|()| bits.push_terminator(ec_level)) {
            Ok(()) => return QrCode::with_bits(bits, ec_level),
            Err(err) => last_err = err,
        }
    }
    Err(last_err)
}

fn encoding_error(data: &str, ecc: EccLevel, err: qrcode::types::QrError) -> QrError {
    QrError::Encoding(format!(
        "{} byte payload at {:?} error correction: {}",
        data.len(),
        ecc,
        err
    ))
}
