// SPDX-FileCopyrightText: 2025 nofault contributors
// SPDX-License-Identifier: GPL-3.0-or-later

use ini::Ini;
use log::{debug, info, warn};
use nofault_common::settings::{parse_int, InputFormat, Settings};
use std::path::PathBuf;

/// Locate `nofault/config.ini` under the user's config directory.
pub fn find_config_path() -> Option<PathBuf> {
    // XDG_CONFIG_HOME
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        let path = PathBuf::from(&xdg).join("nofault").join("config.ini");
        if path.exists() {
            return Some(path);
        }
    }

    // ~/.config/nofault/config.ini
    if let Ok(home) = std::env::var("HOME") {
        let path = PathBuf::from(&home)
            .join(".config")
            .join("nofault")
            .join("config.ini");
        if path.exists() {
            return Some(path);
        }
    }

    None
}

/// Load settings from a config INI, falling back to defaults on any problem.
pub fn load_config(path: Option<&PathBuf>) -> Settings {
    let mut settings = Settings::default();

    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                warn!("Config file not found: {}", p.display());
                return settings;
            }
            p.clone()
        }
        None => match find_config_path() {
            Some(p) => p,
            None => {
                debug!("No config found, using defaults");
                return settings;
            }
        },
    };

    info!("Loading config from: {}", config_path.display());

    let conf = match Ini::load_from_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to parse config: {}", e);
            return settings;
        }
    };

    apply_ini(&conf, &mut settings);
    settings
}

fn parse_bool(key: &str, s: &str) -> bool {
    match s.trim() {
        "true" | "1" => true,
        "false" | "0" => false,
        other => {
            debug!("Unrecognised {} value {:?}, treating as false", key, other);
            false
        }
    }
}

/// Copy every recognised key from `conf` into `settings`.
pub fn apply_ini(conf: &Ini, settings: &mut Settings) {
    // [Input]
    if let Some(section) = conf.section(Some("Input")) {
        if let Some(format) = section.get("format") {
            settings.input_format = InputFormat::from_str_or_default(format);
            debug!("Input format: {:?}", settings.input_format);
        }
        if let Some(offset) = section.get("offset") {
            match parse_int(offset).and_then(|v| usize::try_from(v).ok()) {
                Some(v) => settings.start_offset = v,
                None => warn!("Ignoring bad offset: {}", offset),
            }
        }
        if let Some(base) = section.get("base_address") {
            match parse_int(base) {
                Some(v) => settings.base_address = v,
                None => warn!("Ignoring bad base_address: {}", base),
            }
        }
    }

    // [Debugging]
    if let Some(section) = conf.section(Some("Debugging")) {
        if let Some(debug_log) = section.get("use_debug_logging") {
            settings.use_debug_logging = parse_bool("use_debug_logging", debug_log);
        }
        if let Some(n) = section.get("disassemble") {
            match n.trim().parse() {
                Ok(v) => settings.disassemble = v,
                Err(_) => warn!("Ignoring bad disassemble: {}", n),
            }
        }
    }
}
