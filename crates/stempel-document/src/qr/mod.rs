// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// QR module — symbol encoding, sharp rasterisation, and icon overlay.

pub mod generator;
pub mod symbol;

pub use generator::{IconQrGenerator, generate, icon_offset};
pub use symbol::SymbolMatrix;
