use chrono::NaiveDateTime;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::extract::RawRecord;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";
pub const MIN_FIELDS: usize = 12;

const MANAGED_ELEMENT_FIELD: usize = 2;
const SEVERITY_FIELD: usize = 7;
const SPECIFIC_PROBLEM_FIELD: usize = 8;
const ALARM_TYPE_FIELD: usize = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    #[value(name = "CRITICAL")]
    Critical,
    #[value(name = "MAJOR")]
    Major,
    #[value(name = "MINOR")]
    Minor,
    #[value(name = "WARNING")]
    Warning,
    #[value(name = "CLEARED")]
    Cleared,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self { Severity::Critical => "CRITICAL", Severity::Major => "MAJOR", Severity::Minor => "MINOR", Severity::Warning => "WARNING", Severity::Cleared => "CLEARED" }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(self.as_str()) }
}

/// One alarm occurrence. `severity` is kept verbatim from the log, it is not checked against [`Severity`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AlarmEntry {
    pub timestamp: NaiveDateTime,
    pub managed_element: String,
    pub specific_problem: String,
    pub severity: String,
    pub alarm_type: String,
}

/// Parses `YYYY-MM-DDTHH:MM:SS.ffffff`. Anything from the first `+` on is dropped, not applied.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let head = s.split('+').next().unwrap_or_default();
    let (_, frac) = head.rsplit_once('.')?;
    if frac.is_empty() || frac.len() > 6 || !frac.bytes().all(|b| b.is_ascii_digit()) { return None; }
    NaiveDateTime::parse_from_str(head, TIMESTAMP_FORMAT).ok()
}

pub fn normalize(rec: &RawRecord<'_>) -> Option<AlarmEntry> {
    let timestamp = parse_timestamp(rec.timestamp)?;
    if rec.fields.len() < MIN_FIELDS { return None; }
    Some(AlarmEntry {
        timestamp,
        managed_element: rec.fields[MANAGED_ELEMENT_FIELD].to_string(),
        specific_problem: rec.fields[SPECIFIC_PROBLEM_FIELD].to_string(),
        severity: rec.fields[SEVERITY_FIELD].to_string(),
        alarm_type: rec.fields[ALARM_TYPE_FIELD].to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn fields(n: usize) -> Vec<&'static str> {
        let all = ["f0", "f1", "NE1", "f3", "f4", "f5", "f6", "MAJOR", "LinkDown", "f9", "COMMUNICATIONS", "f11", "f12"];
        all[..n].to_vec()
    }

    #[test]
    fn parses_microsecond_timestamp() {
        let ts = parse_timestamp("2024-03-01T10:20:30.123456").unwrap();
        let want = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_micro_opt(10, 20, 30, 123_456).unwrap();
        assert_eq!(ts, want);
    }

    #[test]
    fn offset_suffix_is_ignored() {
        assert_eq!(parse_timestamp("2024-03-01T10:20:30.5+02:00"), parse_timestamp("2024-03-01T10:20:30.5"));
        assert!(parse_timestamp("2024-03-01T10:20:30.5+02:00").is_some());
    }

    #[test]
    fn rejects_malformed_timestamps() {
        assert!(parse_timestamp("2024-03-01T10:20:30").is_none());
        assert!(parse_timestamp("2024-03-01 10:20:30.000001").is_none());
        assert!(parse_timestamp("2024-03-01T10:20:30.1234567").is_none());
        assert!(parse_timestamp("2024-03-01T10:20:30.000001Z").is_none());
        assert!(parse_timestamp("2024-13-01T10:20:30.000001").is_none());
        assert!(parse_timestamp("").is_none());
    }

    #[test]
    fn field_count_boundary() {
        let f11 = fields(11);
        let f12 = fields(12);
        assert!(normalize(&RawRecord { timestamp: "2024-03-01T10:20:30.000001", fields: f11 }).is_none());
        assert!(normalize(&RawRecord { timestamp: "2024-03-01T10:20:30.000001", fields: f12 }).is_some());
    }

    #[test]
    fn maps_fields_by_position() {
        let e = normalize(&RawRecord { timestamp: "2024-03-01T10:20:30.000001", fields: fields(13) }).unwrap();
        assert_eq!(e.managed_element, "NE1");
        assert_eq!(e.severity, "MAJOR");
        assert_eq!(e.specific_problem, "LinkDown");
        assert_eq!(e.alarm_type, "COMMUNICATIONS");
    }

    #[test]
    fn bad_timestamp_drops_whole_record() {
        assert!(normalize(&RawRecord { timestamp: "yesterday", fields: fields(12) }).is_none());
    }

    #[test]
    fn unknown_severity_passes_through() {
        let mut f = fields(12);
        f[7] = "indeterminate";
        let e = normalize(&RawRecord { timestamp: "2024-03-01T10:20:30.000001", fields: f }).unwrap();
        assert_eq!(e.severity, "indeterminate");
    }
}
