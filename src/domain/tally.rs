//! Per-severity tallies and their dump formats.
//!
//! `CounterState` is the live, mutable state a counter layer guards with its
//! mutex. `DumpSnapshot` is the serialized view of it: the exact structure
//! written to dump files and parsed back by the check client.

use crate::domain::severity::SeverityLabel;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::io;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

/// Count and most recent occurrence for one label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub count: u64,
    pub last_seen: SystemTime,
}

/// Accumulated tallies. Counts only ever grow.
#[derive(Debug, Clone, Default)]
pub struct CounterState {
    tallies: HashMap<SeverityLabel, Tally>,
}

impl CounterState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one occurrence of `label` at `at`.
    pub fn record(&mut self, label: SeverityLabel, at: SystemTime) {
        self.tallies
            .entry(label)
            .and_modify(|tally| {
                tally.count += 1;
                tally.last_seen = at;
            })
            .or_insert(Tally {
                count: 1,
                last_seen: at,
            });
    }

    pub fn get(&self, label: &SeverityLabel) -> Option<Tally> {
        self.tallies.get(label).copied()
    }

    pub fn count(&self, label: &SeverityLabel) -> u64 {
        self.tallies.get(label).map_or(0, |tally| tally.count)
    }

    pub fn len(&self) -> usize {
        self.tallies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tallies.is_empty()
    }

    /// Copy the state into its serializable form.
    pub fn snapshot(&self) -> DumpSnapshot {
        let mut snapshot = DumpSnapshot::default();
        for (label, tally) in &self.tallies {
            let key = label.to_string();
            snapshot.count.insert(key.clone(), tally.count);
            snapshot.last_record.insert(key, epoch_secs(tally.last_seen));
        }
        snapshot
    }
}

/// Seconds since the Unix epoch as a float; times before the epoch clamp to 0.
pub fn epoch_secs(at: SystemTime) -> f64 {
    at.duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs_f64())
        .unwrap_or(0.0)
}

/// Output format of a dump.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DumpFormat {
    #[default]
    Json,
    Text,
}

/// Error returned for an unknown dump format name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown dump format '{0}', expected 'json' or 'text'")]
pub struct UnknownFormatError(pub String);

impl FromStr for DumpFormat {
    type Err = UnknownFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(DumpFormat::Json),
            "text" => Ok(DumpFormat::Text),
            _ => Err(UnknownFormatError(s.to_string())),
        }
    }
}

/// Error returned when dump content cannot be parsed.
#[derive(Debug, thiserror::Error)]
pub enum DumpParseError {
    #[error("malformed JSON dump: {0}")]
    Json(#[from] serde_json::Error),
    #[error("malformed dump line {line}: '{content}'")]
    Line { line: usize, content: String },
}

/// Serialized tallies: `{"count": {...}, "last_record": {...}}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DumpSnapshot {
    #[serde(default)]
    pub count: BTreeMap<String, u64>,
    #[serde(default)]
    pub last_record: BTreeMap<String, f64>,
}

impl DumpSnapshot {
    /// Render as JSON with `", "` and `": "` separators.
    pub fn to_json(&self) -> serde_json::Result<String> {
        let mut buf = Vec::with_capacity(64 + 32 * self.count.len());
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, SpacedFormatter);
        self.serialize(&mut serializer)?;
        String::from_utf8(buf).map_err(<serde_json::Error as serde::ser::Error>::custom)
    }

    /// Render one `LABEL COUNT TIMESTAMP` line per label, sorted by label.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for (label, count) in &self.count {
            let last = self.last_record.get(label).copied().unwrap_or(0.0);
            // Writing to a String cannot fail
            let _ = writeln!(out, "{} {} {:.3}", label, count, last);
        }
        out
    }

    /// Render in the given format.
    pub fn render(&self, format: DumpFormat) -> serde_json::Result<String> {
        match format {
            DumpFormat::Json => self.to_json(),
            DumpFormat::Text => Ok(self.to_text()),
        }
    }

    /// Parse dump content, detecting JSON by the presence of `{`.
    pub fn parse(content: &str) -> Result<Self, DumpParseError> {
        if content.contains('{') {
            return Ok(serde_json::from_str(content)?);
        }

        let mut snapshot = DumpSnapshot::default();
        for (index, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let malformed = || DumpParseError::Line {
                line: index + 1,
                content: line.to_string(),
            };
            let mut parts = line.split_whitespace();
            let (Some(label), Some(count), Some(last), None) =
                (parts.next(), parts.next(), parts.next(), parts.next())
            else {
                return Err(malformed());
            };
            let count = count.parse::<u64>().map_err(|_| malformed())?;
            let last = last.parse::<f64>().map_err(|_| malformed())?;
            snapshot.count.insert(label.to_string(), count);
            snapshot.last_record.insert(label.to_string(), last);
        }
        Ok(snapshot)
    }

    pub fn count_of(&self, label: &str) -> u64 {
        self.count.get(label).copied().unwrap_or(0)
    }

    pub fn last_record_of(&self, label: &str) -> f64 {
        self.last_record.get(label).copied().unwrap_or(0.0)
    }

    /// Sum of all counts.
    pub fn total_count(&self) -> u64 {
        self.count.values().sum()
    }

    /// Most recent record across labels, or 0 when nothing was tallied.
    pub fn latest_record(&self) -> f64 {
        self.last_record.values().copied().fold(0.0, f64::max)
    }
}

/// JSON formatter matching the conventional `", "` / `": "` separators.
struct SpacedFormatter;

impl serde_json::ser::Formatter for SpacedFormatter {
    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }

    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn at(secs: f64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs_f64(secs)
    }

    fn sample_state() -> CounterState {
        let mut state = CounterState::new();
        state.record(SeverityLabel::Info, at(100.0));
        state.record(SeverityLabel::Info, at(101.5));
        state.record(SeverityLabel::Debug, at(99.25));
        state.record(SeverityLabel::Exception, at(102.0));
        state
    }

    #[test]
    fn test_record_counts_and_last_seen() {
        let state = sample_state();
        assert_eq!(state.count(&SeverityLabel::Info), 2);
        assert_eq!(state.count(&SeverityLabel::Error), 0);
        assert_eq!(
            state.get(&SeverityLabel::Info).unwrap().last_seen,
            at(101.5)
        );
        assert_eq!(state.len(), 3);
    }

    #[test]
    fn test_json_layout() {
        let json = sample_state().snapshot().to_json().unwrap();
        assert_eq!(
            json,
            "{\"count\": {\"DEBUG\": 1, \"EXCEPTION\": 1, \"INFO\": 2}, \
             \"last_record\": {\"DEBUG\": 99.25, \"EXCEPTION\": 102.0, \"INFO\": 101.5}}"
        );
    }

    #[test]
    fn test_empty_json() {
        let json = DumpSnapshot::default().to_json().unwrap();
        assert_eq!(json, "{\"count\": {}, \"last_record\": {}}");
    }

    #[test]
    fn test_text_layout() {
        let text = sample_state().snapshot().to_text();
        assert_eq!(
            text,
            "DEBUG 1 99.250\nEXCEPTION 1 102.000\nINFO 2 101.500\n"
        );
    }

    #[test]
    fn test_text_sorts_lexicographically() {
        let mut state = CounterState::new();
        state.record(SeverityLabel::Level(5), at(1.0));
        state.record(SeverityLabel::Level(15), at(1.0));
        state.record(SeverityLabel::Fatal, at(1.0));

        let labels: Vec<String> = state
            .snapshot()
            .to_text()
            .lines()
            .map(|line| line.split(' ').next().unwrap().to_string())
            .collect();
        assert_eq!(labels, vec!["FATAL", "LEVEL15", "LEVEL5"]);
    }

    #[test]
    fn test_parse_both_formats() {
        let snapshot = sample_state().snapshot();

        let from_json = DumpSnapshot::parse(&snapshot.to_json().unwrap()).unwrap();
        assert_eq!(from_json, snapshot);

        let from_text = DumpSnapshot::parse(&snapshot.to_text()).unwrap();
        assert_eq!(from_text.count, snapshot.count);
        assert_eq!(from_text.last_record_of("DEBUG"), 99.25);
    }

    #[test]
    fn test_parse_rejects_malformed_line() {
        let err = DumpSnapshot::parse("INFO 2 10.000\nERROR two 11.0\n").unwrap_err();
        match err {
            DumpParseError::Line { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }
        assert!(DumpSnapshot::parse("INFO 2").is_err());
        assert!(DumpSnapshot::parse("{\"count\": ").is_err());
    }

    #[test]
    fn test_parse_empty_text() {
        let snapshot = DumpSnapshot::parse("").unwrap();
        assert_eq!(snapshot.total_count(), 0);
        assert_eq!(snapshot.latest_record(), 0.0);
    }

    #[test]
    fn test_aggregates() {
        let snapshot = sample_state().snapshot();
        assert_eq!(snapshot.total_count(), 4);
        assert_eq!(snapshot.latest_record(), 102.0);
        assert_eq!(snapshot.count_of("WARNING"), 0);
    }

    #[test]
    fn test_format_names() {
        assert_eq!("JSON".parse::<DumpFormat>().unwrap(), DumpFormat::Json);
        assert_eq!("text".parse::<DumpFormat>().unwrap(), DumpFormat::Text);
        assert!("yaml".parse::<DumpFormat>().is_err());
    }
}
