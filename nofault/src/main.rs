// SPDX-FileCopyrightText: 2025 nofault contributors
// SPDX-License-Identifier: GPL-3.0-or-later

mod config;
mod input;

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info};
use std::path::PathBuf;
use std::process::ExitCode;

use nofault_common::settings::{parse_int, InputFormat};
use nofault_common::Verdict;
use nofault_cpu::CodeBuffer;
use nofault_signature::{Arm64Detector, PatchDetector, CATALOG_VERSION};

/// nofault - copy_from_user_nofault bounds-check detector
#[derive(Parser, Debug)]
#[command(
    name = "nofault",
    version,
    about = "Check whether an arm64 kernel's copy_from_user_nofault has the user-range clamp"
)]
struct Args {
    /// Captured function body (raw bytes, or hex text with --format hex)
    file: PathBuf,

    /// Input format: raw or hex
    #[arg(short, long)]
    format: Option<String>,

    /// Byte offset of the function entry within the file
    #[arg(short, long, value_parser = parse_usize)]
    offset: Option<usize>,

    /// Kernel address of the function entry, used in diagnostics
    #[arg(short, long, value_parser = parse_u64)]
    base: Option<u64>,

    /// Path to config file (default: ~/.config/nofault/config.ini)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print this many instructions from the entry before classifying
    #[arg(short, long)]
    disasm: Option<usize>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn parse_u64(s: &str) -> Result<u64, String> {
    parse_int(s).ok_or_else(|| format!("invalid number: {s}"))
}

fn parse_usize(s: &str) -> Result<usize, String> {
    parse_u64(s)?.try_into().map_err(|_| format!("offset out of range: {s}"))
}

const EXIT_PATCHED: u8 = 0;
const EXIT_ERROR: u8 = 1;
const EXIT_UNDETERMINED: u8 = 2;
const EXIT_UNPATCHED: u8 = 3;

fn main() -> ExitCode {
    match run() {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(EXIT_ERROR)
        }
    }
}

fn run() -> Result<u8> {
    let args = Args::parse();

    // Config is read before the logger exists so it can turn on debug
    // output; messages from loading it are not shown.
    if let Some(path) = &args.config {
        anyhow::ensure!(path.exists(), "Config file not found: {}", path.display());
    }
    let mut settings = config::load_config(args.config.as_ref());

    let log_level = if args.verbose || settings.use_debug_logging { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp_millis()
        .init();

    // Command line wins over config.
    if let Some(format) = &args.format {
        settings.input_format = InputFormat::from_str_or_default(format);
    }
    if let Some(offset) = args.offset {
        settings.start_offset = offset;
    }
    if let Some(base) = args.base {
        settings.base_address = base;
    }
    if let Some(n) = args.disasm {
        settings.disassemble = n;
    }
    debug!("Settings: {:?}", settings);

    let bytes = input::load_code(&args.file, settings.input_format)
        .with_context(|| format!("Failed to load {}", args.file.display()))?;
    info!(
        "Loaded {} byte(s) from {}, catalog v{}",
        bytes.len(),
        args.file.display(),
        CATALOG_VERSION
    );

    let code = CodeBuffer::new(&bytes, settings.base_address);
    if settings.disassemble > 0 {
        for (offset, raw, insn) in code.instructions(settings.start_offset).take(settings.disassemble) {
            println!("0x{:016x}:  {:08x}  {}", code.address_of(offset), raw, insn);
        }
    }

    let detector = Arm64Detector;
    match detector.classify(&code, settings.start_offset) {
        Ok(result) => {
            println!(
                "{} ({}, {} instruction(s))",
                result.verdict, result.signature, result.consumed
            );
            Ok(match result.verdict {
                Verdict::Patched => EXIT_PATCHED,
                Verdict::Unpatched => EXIT_UNPATCHED,
            })
        }
        Err(e) => {
            println!("undetermined: {e}");
            if let Some(miss) = e.near_miss() {
                println!("  {miss}");
            }
            Ok(EXIT_UNDETERMINED)
        }
    }
}
