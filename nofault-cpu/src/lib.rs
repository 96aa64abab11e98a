// SPDX-FileCopyrightText: 2025 nofault contributors
// SPDX-License-Identifier: GPL-3.0-or-later

pub mod code;
pub mod decoder;
pub mod pattern_decoder;

pub use code::CodeBuffer;
pub use decoder::{AddrMode, Condition, Family, Instruction};
pub use pattern_decoder::decode;
