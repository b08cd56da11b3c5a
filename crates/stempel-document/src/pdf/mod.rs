// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF module — reading and creating PDFs, plus the external tool used for
// stamping, properties, and encryption.

pub mod reader;
pub mod tool;
pub mod writer;

pub use reader::PdfReader;
pub use tool::{PdfCpu, PdfTool};
pub use writer::PdfWriter;
