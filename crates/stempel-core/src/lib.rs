// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Stempel — Core types, options, and error definitions shared across all crates.

pub mod config;
pub mod error;
pub mod types;

pub use config::{FileOptions, FileOverrides, ProcessorConfig, QrOptions, QrOverrides};
pub use error::{IconLoadCause, QrError, StempelError};
pub use types::*;
