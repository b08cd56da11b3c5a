// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// stempel-document — QR stamps and PDF processing for Stempel.
//
// Provides the icon-overlaid QR code generator, image-to-PDF conversion, PDF
// inspection, and the stamping pipeline that drives an external PDF tool
// (pdfcpu) to stamp, tag, and re-encrypt documents.

pub mod convert;
pub mod image;
pub mod pdf;
pub mod processor;
pub mod qr;

// Re-export the primary structs so callers can use `stempel_document::PdfReader` etc.
pub use crate::convert::DocumentConverter;
pub use crate::image::ImageProcessor;
pub use crate::pdf::{PdfCpu, PdfReader, PdfTool, PdfWriter};
pub use crate::processor::{PdfProcessor, ProcessOutcome};
pub use crate::qr::{IconQrGenerator, SymbolMatrix};
