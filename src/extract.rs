use regex::Regex;
use std::sync::OnceLock;

pub const RECORD_SEPARATOR: &str = "<FmLogRecord>";
pub const ALARM_MARKER: &str = "<Alarm>";

static TIMESTAMP_RE: OnceLock<Regex> = OnceLock::new();
static ALARM_RE: OnceLock<Regex> = OnceLock::new();

/// Timestamp text and the `;`-split alarm fields of one record, borrowed from the file content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawRecord<'a> {
    pub timestamp: &'a str,
    pub fields: Vec<&'a str>,
}

fn timestamp_re() -> &'static Regex {
    TIMESTAMP_RE.get_or_init(|| Regex::new(r"<LogTimestamp>(.*?)</LogTimestamp>").expect("static timestamp pattern"))
}

fn alarm_re() -> &'static Regex {
    ALARM_RE.get_or_init(|| Regex::new(r"<Alarm>(.*?)</Alarm>").expect("static alarm pattern"))
}

/// Chunks of `content` between record separators that carry an alarm marker.
pub fn alarm_chunks(content: &str) -> impl Iterator<Item = &str> {
    content.split(RECORD_SEPARATOR).filter(|chunk| chunk.contains(ALARM_MARKER))
}

/// Shortest match of each marker pair; `.` does not cross line breaks, so a pair split over lines is not a match.
pub fn extract(chunk: &str) -> Option<RawRecord<'_>> {
    let timestamp = timestamp_re().captures(chunk)?.get(1)?.as_str();
    let alarm = alarm_re().captures(chunk)?.get(1)?.as_str();
    Some(RawRecord { timestamp, fields: alarm.split(';').collect() })
}
