// SPDX-FileCopyrightText: 2025 nofault contributors
// SPDX-License-Identifier: GPL-3.0-or-later

pub mod error;
pub mod settings;
pub mod types;

pub use error::{DetectError, NearMiss};
pub use types::*;
