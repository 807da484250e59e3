//! Threshold rules evaluated against a dump.
//!
//! A rule reads `"<LABEL|ANY> <count|last_record> <lt|gt> <number>"`. For
//! `last_record` the number is an offset from the evaluation time, so
//! `"any last_record gt -60"` means "something was logged in the last minute".

use crate::domain::severity::SeverityLabel;
use crate::domain::tally::DumpSnapshot;
use std::fmt;
use std::str::FromStr;

/// Which tallies a rule reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleTarget {
    /// Sum of counts, or latest record, across every label
    Any,
    Label(SeverityLabel),
}

impl fmt::Display for RuleTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleTarget::Any => f.write_str("ANY"),
            RuleTarget::Label(label) => fmt::Display::fmt(label, f),
        }
    }
}

/// Which dumped value a rule reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleField {
    Count,
    LastRecord,
}

impl fmt::Display for RuleField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleField::Count => f.write_str("count"),
            RuleField::LastRecord => f.write_str("last_record"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    LessThan,
    GreaterThan,
}

impl Comparator {
    fn holds(self, observed: f64, threshold: f64) -> bool {
        match self {
            Comparator::LessThan => observed < threshold,
            Comparator::GreaterThan => observed > threshold,
        }
    }
}

/// Error returned for a malformed rule string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleParseError {
    #[error("invalid rule '{0}': expected '<LABEL|ANY> <count|last_record> <lt|gt> <number>'")]
    Shape(String),
    #[error("invalid rule '{rule}': unknown label '{label}'")]
    Label { rule: String, label: String },
    #[error("invalid rule '{rule}': unknown variable '{field}', allowed 'count', 'last_record'")]
    Field { rule: String, field: String },
    #[error("invalid rule '{rule}': invalid comparison '{comparator}', allowed 'gt', 'lt'")]
    Comparator { rule: String, comparator: String },
    #[error("invalid rule '{rule}': '{value}' is not a number")]
    Threshold { rule: String, value: String },
}

/// A parsed threshold rule.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdRule {
    source: String,
    target: RuleTarget,
    field: RuleField,
    comparator: Comparator,
    threshold: f64,
}

/// Result of evaluating one rule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleEvaluation {
    pub passed: bool,
    pub observed: f64,
}

impl ThresholdRule {
    pub fn new(target: RuleTarget, field: RuleField, comparator: Comparator, threshold: f64) -> Self {
        let source = format!(
            "{} {} {} {}",
            target,
            field,
            match comparator {
                Comparator::LessThan => "lt",
                Comparator::GreaterThan => "gt",
            },
            threshold
        );
        Self {
            source,
            target,
            field,
            comparator,
            threshold,
        }
    }

    /// The rule as originally written.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn target(&self) -> &RuleTarget {
        &self.target
    }

    pub fn field(&self) -> RuleField {
        self.field
    }

    pub fn comparator(&self) -> Comparator {
        self.comparator
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// The value this rule reads from a snapshot.
    pub fn observe(&self, snapshot: &DumpSnapshot) -> f64 {
        match (&self.target, self.field) {
            (RuleTarget::Any, RuleField::Count) => snapshot.total_count() as f64,
            (RuleTarget::Any, RuleField::LastRecord) => snapshot.latest_record(),
            (RuleTarget::Label(label), RuleField::Count) => {
                snapshot.count_of(&label.to_string()) as f64
            }
            (RuleTarget::Label(label), RuleField::LastRecord) => {
                snapshot.last_record_of(&label.to_string())
            }
        }
    }

    /// Evaluate against a snapshot; `now` is seconds since the epoch.
    pub fn evaluate(&self, snapshot: &DumpSnapshot, now: f64) -> RuleEvaluation {
        let threshold = match self.field {
            RuleField::Count => self.threshold,
            RuleField::LastRecord => self.threshold + now,
        };
        let observed = self.observe(snapshot);
        RuleEvaluation {
            passed: self.comparator.holds(observed, threshold),
            observed,
        }
    }
}

impl FromStr for ThresholdRule {
    type Err = RuleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rule = s.trim().to_string();
        let parts: Vec<&str> = rule.split_whitespace().collect();
        let [label, field, comparator, value] = parts.as_slice() else {
            return Err(RuleParseError::Shape(rule.clone()));
        };

        let target = if label.eq_ignore_ascii_case("any") {
            RuleTarget::Any
        } else {
            let parsed = label.parse::<SeverityLabel>().map_err(|_| RuleParseError::Label {
                rule: rule.clone(),
                label: label.to_string(),
            })?;
            RuleTarget::Label(parsed)
        };

        let field = match field.to_ascii_lowercase().as_str() {
            "count" => RuleField::Count,
            "last_record" => RuleField::LastRecord,
            _ => {
                return Err(RuleParseError::Field {
                    rule: rule.clone(),
                    field: field.to_string(),
                })
            }
        };

        let comparator = match comparator.to_ascii_lowercase().as_str() {
            "lt" | "<" => Comparator::LessThan,
            "gt" | ">" => Comparator::GreaterThan,
            _ => {
                return Err(RuleParseError::Comparator {
                    rule: rule.clone(),
                    comparator: comparator.to_string(),
                })
            }
        };

        let threshold = value
            .parse::<f64>()
            .ok()
            .filter(|t| t.is_finite())
            .ok_or_else(|| RuleParseError::Threshold {
                rule: rule.clone(),
                value: value.to_string(),
            })?;

        Ok(Self {
            target,
            field,
            comparator,
            threshold,
            source: rule,
        })
    }
}

impl fmt::Display for ThresholdRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
