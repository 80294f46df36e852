use anyhow::Context;
use serde::Deserialize;
use std::path::PathBuf;

use crate::normalize::Severity;
use crate::{Args, LogFormat, LogLevel, OutputFmt, DEFAULT_DAYS, DEFAULT_DIR, DEFAULT_MIN_COUNT};

pub const DEFAULT_CONFIG: &str = "AlarmDoctor.toml";

#[derive(Clone, Debug, Default, Deserialize)]
pub struct AppConfig {
    pub dir: Option<String>,
    pub days: Option<u32>,
    pub severity: Option<Severity>,
    pub min_count: Option<u32>,
    pub output: Option<OutputFmt>,
    pub json_path: Option<String>,
    pub csv_path: Option<String>,
    pub no_progress: Option<bool>,
    pub log_level: Option<LogLevel>,
    pub log_format: Option<LogFormat>,
    pub log_path: Option<String>,
}

/// Reads the named config, or `AlarmDoctor.toml` from the working directory when none is given.
/// A missing default file is `Ok(None)`; an unreadable named file or any parse failure is an error.
pub fn load_config(path_opt: Option<&str>) -> anyhow::Result<Option<AppConfig>> {
    let (p, explicit) = match path_opt {
        Some(s) => (PathBuf::from(s), true),
        None => (PathBuf::from(DEFAULT_CONFIG), false),
    };
    let data = match std::fs::read_to_string(&p) {
        Ok(d) => d,
        Err(_) if !explicit => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("Failed to read config file {}", p.to_string_lossy())),
    };
    let cfg = toml::from_str::<AppConfig>(&data).with_context(|| format!("Failed to parse config file {}", p.to_string_lossy()))?;
    Ok(Some(cfg))
}

/// Fills in only what the command line left at its default.
pub fn apply_config(args: &mut Args, cfg: AppConfig) {
    if args.dir == DEFAULT_DIR && let Some(v) = cfg.dir { args.dir = v; }
    if args.days == DEFAULT_DAYS && let Some(v) = cfg.days { args.days = v; }
    if args.severity.is_none() && let Some(v) = cfg.severity { args.severity = Some(v); }
    if args.min_count == DEFAULT_MIN_COUNT && let Some(v) = cfg.min_count { args.min_count = v; }
    if matches!(args.output, OutputFmt::Text) && let Some(v) = cfg.output { args.output = v; }
    if args.json_path.is_none() && let Some(v) = cfg.json_path { args.json_path = Some(v); }
    if args.csv_path.is_none() && let Some(v) = cfg.csv_path { args.csv_path = Some(v); }
    if let Some(v) = cfg.no_progress { args.no_progress |= v; }
    if args.log_level.is_none() && let Some(v) = cfg.log_level { args.log_level = Some(v); }
    if args.log_format.is_none() && let Some(v) = cfg.log_format { args.log_format = Some(v); }
    if args.log_path.is_none() && let Some(v) = cfg.log_path { args.log_path = Some(v); }
}
