use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::HashMap;

use crate::normalize::{AlarmEntry, Severity};

/// Running totals for one specific problem. `severity` and `managed_element` follow the last entry folded in.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProblemStats {
    pub count: usize,
    pub first_seen: Option<NaiveDateTime>,
    pub last_seen: Option<NaiveDateTime>,
    pub severity: Option<String>,
    pub managed_element: Option<String>,
}

impl ProblemStats {
    fn record(&mut self, e: &AlarmEntry) {
        self.count += 1;
        self.severity = Some(e.severity.clone());
        self.managed_element = Some(e.managed_element.clone());
        if self.first_seen.is_none_or(|t| e.timestamp < t) { self.first_seen = Some(e.timestamp); }
        if self.last_seen.is_none_or(|t| e.timestamp > t) { self.last_seen = Some(e.timestamp); }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    pub files: usize,
    pub unreadable_files: usize,
    pub records: usize,
    pub entries: usize,
    pub dropped: usize,
    pub matched: usize,
}

#[derive(Debug, Default)]
pub struct Aggregator {
    problems: HashMap<String, ProblemStats>,
}

impl Aggregator {
    pub fn new() -> Self { Self::default() }

    pub fn get_or_insert_default(&mut self, problem: &str) -> &mut ProblemStats {
        self.problems.entry(problem.to_string()).or_default()
    }

    /// Folds `entries` in order; returns how many passed the cutoff and severity filter.
    pub fn process<'a, I>(&mut self, entries: I, cutoff: NaiveDateTime, severity_filter: Option<Severity>) -> usize
    where
        I: IntoIterator<Item = &'a AlarmEntry>,
    {
        let mut matched = 0usize;
        for e in entries {
            if e.timestamp < cutoff { continue; }
            if let Some(sev) = severity_filter && e.severity != sev.as_str() { continue; }
            self.get_or_insert_default(&e.specific_problem).record(e);
            matched += 1;
        }
        matched
    }

    pub fn problems(&self) -> &HashMap<String, ProblemStats> { &self.problems }

    pub fn len(&self) -> usize { self.problems.len() }

    pub fn is_empty(&self) -> bool { self.problems.is_empty() }
}
