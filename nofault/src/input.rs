// SPDX-FileCopyrightText: 2025 nofault contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! Reading captured function bodies from disk.

use anyhow::{Context, Result};
use nofault_common::settings::InputFormat;
use std::path::Path;

/// Read `path` as raw bytes or hex text.
pub fn load_code(path: &Path, format: InputFormat) -> Result<Vec<u8>> {
    match format {
        InputFormat::Raw => {
            std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
        }
        InputFormat::Hex => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            parse_hex(&text).with_context(|| format!("Bad hex in {}", path.display()))
        }
    }
}

/// Parse hex text such as `0x1f, 0x20, 0x03, 0xd5, // nop`.
///
/// Tokens are separated by whitespace or commas and may carry a `0x`
/// prefix. Each token is a whole number of bytes; an odd digit count is an
/// error rather than being merged with its neighbour. Anything after `//`
/// or `#` on a line is ignored.
pub fn parse_hex(text: &str) -> Result<Vec<u8>> {
    let mut bytes = Vec::with_capacity(text.len() / 2);
    for (lineno, line) in text.lines().enumerate() {
        let line = line.split("//").next().unwrap_or("");
        let line = line.split('#').next().unwrap_or("");
        for token in line.split(|c: char| c.is_whitespace() || c == ',') {
            if token.is_empty() {
                continue;
            }
            let digits = token
                .strip_prefix("0x")
                .or_else(|| token.strip_prefix("0X"))
                .unwrap_or(token);
            let decoded = hex::decode(digits)
                .with_context(|| format!("line {}: bad hex token `{}`", lineno + 1, token))?;
            bytes.extend_from_slice(&decoded);
        }
    }
    Ok(bytes)
}
