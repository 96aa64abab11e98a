// SPDX-FileCopyrightText: 2025 nofault contributors
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::types::VAddr;

/// Front-end settings, populated from the config INI and command line.
#[derive(Debug, Clone)]
pub struct Settings {
    // Input
    pub input_format: InputFormat,
    pub start_offset: usize,
    pub base_address: VAddr,

    // Debug
    pub use_debug_logging: bool,
    pub disassemble: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            input_format: InputFormat::Raw,
            start_offset: 0,
            base_address: 0,
            use_debug_logging: false,
            disassemble: 0,
        }
    }
}

/// How the captured function body is stored on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    /// Raw little-endian instruction bytes, e.g. dumped from `/proc/kcore`.
    Raw,
    /// Hex text: `1f 20 03 d5`, `0x1f, 0x20, ...`, with `//` comments.
    Hex,
}

impl InputFormat {
    pub fn from_str_or_default(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "hex" | "text" => Self::Hex,
            _ => Self::Raw,
        }
    }
}

/// Parse an integer that may carry a `0x` prefix.
pub fn parse_int(s: &str) -> Option<u64> {
    let s = s.trim().replace('_', "");
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}
