use anyhow::Context;
use chrono::{Duration, NaiveDateTime};
use globset::GlobBuilder;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::aggregate::{Aggregator, ScanStats};
use crate::extract;
use crate::normalize::{self, AlarmEntry, Severity};

pub const LOG_FILE_GLOB: &str = "*FmAlarmLog*.log";

#[derive(Clone, Copy, Debug)]
pub struct AnalysisOptions {
    pub cutoff: NaiveDateTime,
    pub severity: Option<Severity>,
}

impl AnalysisOptions {
    pub fn new(now: NaiveDateTime, days: u32, severity: Option<Severity>) -> Self {
        Self { cutoff: window_start(now, days), severity }
    }
}

/// `now` minus `days`; a window reaching past the earliest representable time starts there.
pub fn window_start(now: NaiveDateTime, days: u32) -> NaiveDateTime {
    now.checked_sub_signed(Duration::days(i64::from(days))).unwrap_or(NaiveDateTime::MIN)
}

/// Alarm log files directly under `dir`, sorted by file name. Fails only when `dir` itself cannot be read.
pub fn list_log_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let meta = std::fs::metadata(dir).with_context(|| format!("Error accessing directory {}", dir.display()))?;
    if !meta.is_dir() { anyhow::bail!("Error accessing directory {}: not a directory", dir.display()); }
    let matcher = GlobBuilder::new(LOG_FILE_GLOB).build()?.compile_matcher();
    let mut files: Vec<PathBuf> = vec![];
    for de in WalkDir::new(dir).min_depth(1).max_depth(1).follow_links(false) {
        let de = match de {
            Ok(de) => de,
            Err(e) if e.path() == Some(dir) => return Err(anyhow::Error::new(e).context(format!("Error accessing directory {}", dir.display()))),
            Err(e) => { log::warn!("Skipping unreadable entry: {}", e); continue }
        };
        let p = de.path();
        if !p.is_file() || !matcher.is_match(de.file_name()) { continue; }
        files.push(p.to_path_buf());
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Alarm entries of one file plus the number of alarm records that did not make it through.
pub fn parse_alarms(content: &str) -> (Vec<AlarmEntry>, usize) {
    let mut entries = vec![];
    let mut dropped = 0usize;
    for chunk in extract::alarm_chunks(content) {
        match extract::extract(chunk).and_then(|rec| normalize::normalize(&rec)) {
            Some(e) => {
                log::trace!("alarm {} on {} [{} {}] at {}", e.specific_problem, e.managed_element, e.severity, e.alarm_type, e.timestamp);
                entries.push(e);
            }
            None => { dropped += 1; log::trace!("dropped alarm record: {}", chunk.trim()); }
        }
    }
    (entries, dropped)
}

fn progress_bar(len: usize, show: bool) -> ProgressBar {
    if !show { return ProgressBar::hidden(); }
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::with_template("Processing files: {pos}/{len} {wide_bar}") { pb.set_style(style); }
    pb
}

/// Folds every file into one aggregate, in the order given. Unreadable files are logged and skipped.
pub fn analyze(files: &[PathBuf], opts: &AnalysisOptions, show_progress: bool) -> (Aggregator, ScanStats) {
    let mut agg = Aggregator::new();
    let mut stats = ScanStats::default();
    if show_progress {
        eprintln!("\nFound {} log files to analyze:", files.len());
        for f in files { eprintln!("- {}", f.file_name().map(|n| n.to_string_lossy()).unwrap_or_default()); }
        eprintln!("\nStarting analysis...");
    }
    let pb = progress_bar(files.len(), show_progress);
    for path in files {
        stats.files += 1;
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                pb.suspend(|| log::error!("Error reading file {}: {}", path.display(), e));
                stats.unreadable_files += 1;
                pb.inc(1);
                continue;
            }
        };
        let (entries, dropped) = parse_alarms(&content);
        let matched = agg.process(&entries, opts.cutoff, opts.severity);
        log::debug!("{}: {} alarm records, {} parsed, {} dropped, {} in window", path.display(), entries.len() + dropped, entries.len(), dropped, matched);
        stats.records += entries.len() + dropped;
        stats.entries += entries.len();
        stats.dropped += dropped;
        stats.matched += matched;
        pb.inc(1);
    }
    pb.finish_and_clear();
    (agg, stats)
}
