use std::path::PathBuf;
use chrono::{Local, NaiveDateTime};
use clap::{Parser, ValueEnum, ColorChoice, ArgAction, CommandFactory};
use clap_complete::Shell;
use serde::{Deserialize, Serialize};
use is_terminal::IsTerminal;
mod aggregate;
mod config;
mod extract;
mod normalize;
mod report;
mod scan;

use normalize::Severity;

pub const DEFAULT_DIR: &str = "/storage/no-backup/coremw/var/log/saflog/FaultManagementLog/alarm/";
pub const DEFAULT_DAYS: u32 = 15;
pub const DEFAULT_MIN_COUNT: u32 = 3;

#[derive(Clone, Copy, Debug, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum OutputFmt { Text, Table, Json }

#[derive(Clone, Copy, Debug, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum LogLevel { Error, Warn, Info, Debug, Trace }

#[derive(Clone, Copy, Debug, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum LogFormat { Text, Json }

#[derive(Parser, Debug)]
#[command(
    name = "AlarmDoctor",
    about = "Analyze alarm logs for recurring issues",
    long_about = "Scans FmAlarmLog*.log files, counts alarms per specific problem within a recent window and reports the problems that keep coming back.",
    after_long_help = "Examples:\n  AlarmDoctor --dir /var/log/alarm\n  AlarmDoctor -d ./logs -t 7 -s CRITICAL -m 1\n  AlarmDoctor -d ./logs --output json --csv-path problems.csv",
    color = ColorChoice::Auto
)]
struct Args {
    /// Directory containing alarm log files
    #[arg(long, short = 'd', default_value = DEFAULT_DIR)]
    dir: String,
    /// Number of days to analyze
    #[arg(long, short = 't', default_value_t = DEFAULT_DAYS)]
    days: u32,
    /// Filter by alarm severity
    #[arg(long, short = 's', value_enum)]
    severity: Option<Severity>,
    /// Report problems seen more than this many times
    #[arg(long, short = 'm', default_value_t = DEFAULT_MIN_COUNT)]
    min_count: u32,
    #[arg(long, short = 'o', value_enum, default_value = "text")]
    output: OutputFmt,
    #[arg(long, short = 'j')]
    json_path: Option<String>,
    #[arg(long)]
    csv_path: Option<String>,
    #[arg(long)]
    config: Option<String>,
    #[arg(long, default_value_t = false)]
    no_progress: bool,
    #[arg(long, short = 'C', default_value_t = false)]
    no_color: bool,
    #[arg(long, default_value_t = false)]
    force_color: bool,
    #[arg(long)]
    log_level: Option<LogLevel>,
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,
    #[arg(long)]
    log_path: Option<String>,
    #[arg(short = 'v', long, action = ArgAction::Count)]
    verbose: u8,
    #[arg(short = 'q', long, default_value_t = false)]
    quiet: bool,
    #[arg(long, value_enum)]
    completions: Option<Shell>,
    #[arg(long)]
    completions_out: Option<String>,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            dir: DEFAULT_DIR.to_string(),
            days: DEFAULT_DAYS,
            severity: None,
            min_count: DEFAULT_MIN_COUNT,
            output: OutputFmt::Text,
            json_path: None,
            csv_path: None,
            config: None,
            no_progress: false,
            no_color: false,
            force_color: false,
            log_level: None,
            log_format: None,
            log_path: None,
            verbose: 0,
            quiet: false,
            completions: None,
            completions_out: None,
        }
    }
}

fn main() {
    let mut args = Args::parse();
    if let Some(sh) = args.completions {
        let mut cmd = Args::command();
        if let Some(path) = args.completions_out.as_ref() {
            if let Ok(mut f) = std::fs::File::create(path) { clap_complete::generate(sh, &mut cmd, "AlarmDoctor", &mut f); } else { clap_complete::generate(sh, &mut cmd, "AlarmDoctor", &mut std::io::stdout()); }
        } else {
            clap_complete::generate(sh, &mut cmd, "AlarmDoctor", &mut std::io::stdout());
        }
        return;
    }
    let cfg_err = match config::load_config(args.config.as_deref()) {
        Ok(Some(cfg)) => { config::apply_config(&mut args, cfg); None }
        Ok(None) => None,
        Err(e) => Some(e),
    };
    init_logging(&args);
    if let Some(e) = cfg_err { log::warn!("{:#}", e); }
    let term = std::env::var("TERM").unwrap_or_default();
    let no_color_env = std::env::var_os("NO_COLOR").is_some();
    let color_default = std::io::stdout().is_terminal() && !no_color_env && term != "dumb";
    let enable_color = if args.force_color { true } else { color_default && !args.no_color };
    match run(&args, Local::now().naive_local(), enable_color) {
        Ok(out) => print!("{}", out),
        Err(e) => {
            log::error!("{:#}", e);
            std::process::exit(1);
        }
    }
}

impl From<LogLevel> for log::LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l { LogLevel::Error => Self::Error, LogLevel::Warn => Self::Warn, LogLevel::Info => Self::Info, LogLevel::Debug => Self::Debug, LogLevel::Trace => Self::Trace }
    }
}

/// `None` leaves the filter to `RUST_LOG`.
fn level_filter(args: &Args) -> Option<log::LevelFilter> {
    if args.quiet { return Some(log::LevelFilter::Error); }
    if let Some(lvl) = args.log_level { return Some(lvl.into()); }
    match args.verbose { 0 => None, 1 => Some(log::LevelFilter::Info), 2 => Some(log::LevelFilter::Debug), _ => Some(log::LevelFilter::Trace) }
}

fn init_logging(args: &Args) {
    use std::io::Write;
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
    if let Some(f) = level_filter(args) { builder.filter_level(f); }
    match args.log_format {
        Some(LogFormat::Json) => {
            builder.format(|buf, record| {
                let obj = serde_json::json!({ "ts": Local::now().to_rfc3339(), "level": record.level().to_string(), "target": record.target(), "msg": record.args().to_string() });
                writeln!(buf, "{}", obj)
            });
        }
        Some(LogFormat::Text) => {
            builder.format(|buf, record| writeln!(buf, "[{:<5} {}] {}", record.level(), Local::now().format("%H:%M:%S"), record.args()));
        }
        None => {}
    }
    if let Some(path) = args.log_path.as_ref() {
        match std::fs::File::create(path) {
            Ok(f) => { builder.target(env_logger::Target::Pipe(Box::new(f))); }
            Err(e) => eprintln!("Failed to open log file {}: {}", path, e),
        }
    }
    builder.init();
}

/// One analysis pass over `args.dir` as of `now`; returns what goes to stdout.
fn run(args: &Args, now: NaiveDateTime, color: bool) -> anyhow::Result<String> {
    let dir = PathBuf::from(&args.dir);
    let files = scan::list_log_files(&dir)?;
    let opts = scan::AnalysisOptions::new(now, args.days, args.severity);
    let show_progress = !args.quiet && !args.no_progress;
    let (agg, stats) = scan::analyze(&files, &opts, show_progress);
    log::info!("{} files ({} unreadable), {} alarm records, {} parsed, {} dropped, {} in window, {} distinct problems", stats.files, stats.unreadable_files, stats.records, stats.entries, stats.dropped, stats.matched, agg.len());
    if agg.is_empty() { log::debug!("no alarms within the last {} days", args.days); }
    let rows = report::rank(agg.problems(), args.min_count);
    let rep = report::Report {
        window_days: args.days,
        cutoff: opts.cutoff.format(report::DISPLAY_TIME_FORMAT).to_string(),
        min_occurrences: args.min_count,
        severity_filter: args.severity,
        scan: stats,
        problems: rows,
    };
    if let Some(path) = args.json_path.as_ref() { report::write_json(path, &rep)?; }
    if let Some(path) = args.csv_path.as_ref() { report::write_csv(path, &rep.problems)?; }
    let out = match args.output {
        OutputFmt::Text => report::render(agg.problems(), args.min_count, args.days, color),
        OutputFmt::Table => report::render_table(&rep.problems, args.days),
        OutputFmt::Json => format!("{}\n", report::to_json(&rep)?),
    };
    Ok(out)
}
