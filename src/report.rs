use anyhow::Context;
use chrono::NaiveDateTime;
use comfy_table::{ContentArrangement, Table};
use serde::Serialize;
use std::collections::HashMap;

use crate::aggregate::{ProblemStats, ScanStats};
use crate::normalize::Severity;

pub const DISPLAY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const NO_RESULTS: &str = "No alarms found matching the specified criteria.";
const RULE_WIDTH: usize = 80;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProblemRow {
    pub problem: String,
    pub managed_element: String,
    pub severity: String,
    pub count: usize,
    pub duration_days: i64,
    pub duration_hours: i64,
    pub first_seen: String,
    pub last_seen: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct Report {
    pub window_days: u32,
    pub cutoff: String,
    pub min_occurrences: u32,
    pub severity_filter: Option<Severity>,
    pub scan: ScanStats,
    pub problems: Vec<ProblemRow>,
}

fn fmt_time(t: NaiveDateTime) -> String { t.format(DISPLAY_TIME_FORMAT).to_string() }

/// Whole days, then whole hours of what is left; minutes and below are dropped.
pub fn split_duration(first: NaiveDateTime, last: NaiveDateTime) -> (i64, i64) {
    let d = last - first;
    let days = d.num_seconds().div_euclid(86_400);
    let hours = d.num_seconds().rem_euclid(86_400) / 3600;
    (days, hours)
}

/// Problems seen more than `min_occurrences` times, most frequent first, ties by problem name.
pub fn rank(problems: &HashMap<String, ProblemStats>, min_occurrences: u32) -> Vec<ProblemRow> {
    let mut kept: Vec<(&String, &ProblemStats)> = problems.iter().filter(|(_, s)| s.count > min_occurrences as usize).collect();
    kept.sort_by(|a, b| b.1.count.cmp(&a.1.count).then_with(|| a.0.cmp(b.0)));
    kept.into_iter()
        .filter_map(|(problem, s)| {
            let (first, last) = (s.first_seen?, s.last_seen?);
            let (duration_days, duration_hours) = split_duration(first, last);
            Some(ProblemRow {
                problem: problem.clone(),
                managed_element: s.managed_element.clone().unwrap_or_default(),
                severity: s.severity.clone().unwrap_or_default(),
                count: s.count,
                duration_days,
                duration_hours,
                first_seen: fmt_time(first),
                last_seen: fmt_time(last),
            })
        })
        .collect()
}

fn paint(s: &str, code: &str, color: bool) -> String {
    if color { format!("\x1b[{}m{}\x1b[0m", code, s) } else { s.to_string() }
}

fn render_rows(rows: &[ProblemRow], window_days: u32, color: bool) -> String {
    let mut s = String::new();
    s.push_str(&format!("\n{}\n", paint(&format!("Alarm Analysis Report (Last {} days)", window_days), "1;36", color)));
    s.push_str(&"=".repeat(RULE_WIDTH));
    s.push('\n');
    for r in rows {
        s.push_str(&format!("\n{} {}\n", paint("Problem:", "1", color), r.problem));
        s.push_str(&format!("Managed Element: {}\n", r.managed_element));
        s.push_str(&format!("Severity: {}\n", paint(&r.severity, severity_code(&r.severity), color)));
        s.push_str(&format!("Count: {} occurrences\n", r.count));
        s.push_str(&format!("Duration: {} days, {} hours\n", r.duration_days, r.duration_hours));
        s.push_str(&format!("First seen: {}\n", r.first_seen));
        s.push_str(&format!("Last seen: {}\n", r.last_seen));
        s.push_str(&"-".repeat(RULE_WIDTH));
        s.push('\n');
    }
    if rows.is_empty() { s.push_str(&format!("\n{}\n", NO_RESULTS)); }
    s
}

pub fn render(problems: &HashMap<String, ProblemStats>, min_occurrences: u32, window_days: u32, color: bool) -> String {
    render_rows(&rank(problems, min_occurrences), window_days, color)
}

fn severity_code(sev: &str) -> &'static str {
    match sev { "CRITICAL" => "1;31", "MAJOR" => "31", "MINOR" => "33", "WARNING" => "34", "CLEARED" => "32", _ => "37" }
}

pub fn render_table(rows: &[ProblemRow], window_days: u32) -> String {
    if rows.is_empty() { return format!("Alarm Analysis Report (Last {} days)\n{}\n", window_days, NO_RESULTS); }
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Problem", "Managed Element", "Severity", "Count", "Duration", "First Seen", "Last Seen"]);
    for r in rows {
        table.add_row(vec![
            r.problem.clone(),
            r.managed_element.clone(),
            r.severity.clone(),
            r.count.to_string(),
            format!("{}d {}h", r.duration_days, r.duration_hours),
            r.first_seen.clone(),
            r.last_seen.clone(),
        ]);
    }
    format!("Alarm Analysis Report (Last {} days)\n{}\n", window_days, table)
}

pub fn to_json(rep: &Report) -> anyhow::Result<String> {
    serde_json::to_string_pretty(rep).context("serializing report")
}

pub fn write_json(path: &str, rep: &Report) -> anyhow::Result<()> {
    let body = to_json(rep)?;
    std::fs::write(path, body).with_context(|| format!("writing JSON report {}", path))
}

pub fn write_csv(path: &str, rows: &[ProblemRow]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path).with_context(|| format!("creating CSV report {}", path))?;
    if rows.is_empty() {
        wtr.write_record(["problem", "managed_element", "severity", "count", "duration_days", "duration_hours", "first_seen", "last_seen"])?;
    }
    for r in rows { wtr.serialize(r)?; }
    wtr.flush().with_context(|| format!("flushing CSV report {}", path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn t0() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap().and_hms_micro_opt(8, 30, 15, 250_000).unwrap()
    }

    fn stats(count: usize, first: NaiveDateTime, last: NaiveDateTime) -> ProblemStats {
        ProblemStats { count, first_seen: Some(first), last_seen: Some(last), severity: Some("MAJOR".to_string()), managed_element: Some("NE1".to_string()) }
    }

    #[test]
    fn threshold_is_strict() {
        let mut m = HashMap::new();
        m.insert("AtThreshold".to_string(), stats(3, t0(), t0()));
        m.insert("AboveThreshold".to_string(), stats(4, t0(), t0()));
        let rows = rank(&m, 3);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].problem, "AboveThreshold");
    }

    #[test]
    fn ranks_by_count_then_name() {
        let mut m = HashMap::new();
        m.insert("Zeta".to_string(), stats(5, t0(), t0()));
        m.insert("Alpha".to_string(), stats(5, t0(), t0()));
        m.insert("Most".to_string(), stats(9, t0(), t0()));
        m.insert("Few".to_string(), stats(2, t0(), t0()));
        let names: Vec<String> = rank(&m, 0).into_iter().map(|r| r.problem).collect();
        assert_eq!(names, vec!["Most", "Alpha", "Zeta", "Few"]);
    }

    #[test]
    fn duration_truncates_to_whole_hours() {
        let last = t0() + Duration::days(2) + Duration::hours(5) + Duration::minutes(59) + Duration::seconds(59);
        assert_eq!(split_duration(t0(), last), (2, 5));
        assert_eq!(split_duration(t0(), t0() + Duration::minutes(59)), (0, 0));
    }

    #[test]
    fn renders_entry_block() {
        let mut m = HashMap::new();
        m.insert("LinkDown".to_string(), stats(4, t0(), t0() + Duration::days(1) + Duration::hours(3)));
        let out = render(&m, 3, 15, false);
        let want = format!(
            "\nAlarm Analysis Report (Last 15 days)\n{}\n\nProblem: LinkDown\nManaged Element: NE1\nSeverity: MAJOR\nCount: 4 occurrences\nDuration: 1 days, 3 hours\nFirst seen: 2024-06-01 08:30:15\nLast seen: 2024-06-02 11:30:15\n{}\n",
            "=".repeat(80),
            "-".repeat(80)
        );
        assert_eq!(out, want);
    }

    #[test]
    fn renders_no_results_message() {
        let out = render(&HashMap::new(), 3, 7, false);
        assert!(out.starts_with("\nAlarm Analysis Report (Last 7 days)\n"));
        assert!(out.ends_with(&format!("\n{}\n", NO_RESULTS)));
        assert!(!out.contains("Problem:"));
    }

    #[test]
    fn color_wraps_headings_only_when_enabled() {
        let mut m = HashMap::new();
        m.insert("LinkDown".to_string(), stats(4, t0(), t0()));
        assert!(render(&m, 3, 15, true).contains("\x1b[1;36m"));
        assert!(!render(&m, 3, 15, false).contains('\x1b'));
    }

    #[test]
    fn table_lists_rows() {
        let mut m = HashMap::new();
        m.insert("LinkDown".to_string(), stats(4, t0(), t0()));
        let out = render_table(&rank(&m, 3), 15);
        assert!(out.contains("LinkDown"));
        assert!(out.contains("Managed Element"));
        assert!(render_table(&[], 15).contains(NO_RESULTS));
    }

    #[test]
    fn csv_and_json_writers() {
        let mut m = HashMap::new();
        m.insert("LinkDown".to_string(), stats(4, t0(), t0()));
        let rows = rank(&m, 3);
        let dir = std::env::temp_dir();
        let csv_path = dir.join(format!("alarmdoctor_report_{}.csv", std::process::id()));
        write_csv(&csv_path.to_string_lossy(), &rows).unwrap();
        let data = std::fs::read_to_string(&csv_path).unwrap();
        let mut lines = data.lines();
        assert_eq!(lines.next(), Some("problem,managed_element,severity,count,duration_days,duration_hours,first_seen,last_seen"));
        assert_eq!(lines.next(), Some("LinkDown,NE1,MAJOR,4,0,0,2024-06-01 08:30:15,2024-06-01 08:30:15"));
        let _ = std::fs::remove_file(&csv_path);

        let rep = Report { window_days: 15, cutoff: "2024-05-17 08:30:15".to_string(), min_occurrences: 3, severity_filter: Some(Severity::Major), scan: ScanStats::default(), problems: rows };
        let v: serde_json::Value = serde_json::from_str(&to_json(&rep).unwrap()).unwrap();
        assert_eq!(v["severity_filter"], "MAJOR");
        assert_eq!(v["problems"][0]["count"], 4);
        assert_eq!(v["problems"][0]["managed_element"], "NE1");
    }
}
