use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::intent::IntentKind;
use super::plan::{CallLabel, Operation};
use super::record::Record;

/// A named value the synthesizer can substitute into a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Text(String),
    Count(u64),
    DurationMs(u64),
    Date(NaiveDate),
    Ratio(f64),
    List(Vec<String>),
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

/// Reference value a result is compared against, e.g. the song's average length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    /// "average", "median", ...
    pub label: String,
    pub measured: f64,
    pub baseline: f64,
}

impl Baseline {
    pub fn ratio(&self) -> Option<f64> {
        (self.baseline > 0.0).then(|| self.measured / self.baseline)
    }
}

/// Non-fatal issue carried through to the answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum Warning {
    LowConfidenceJoin { dropped: usize, total: usize },
    OptionalDataMissing { label: CallLabel },
}

impl Warning {
    pub fn code(&self) -> &'static str {
        match self {
            Self::LowConfidenceJoin { .. } => "low_confidence_join",
            Self::OptionalDataMissing { .. } => "optional_data_missing",
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::LowConfidenceJoin { dropped, total } => format!(
                "Only {} of {} rows could be matched across sources, so this may be incomplete.",
                total.saturating_sub(*dropped),
                total
            ),
            Self::OptionalDataMissing { label } => {
                format!("Some supporting {label} data was unavailable.")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationResult {
    pub kind: IntentKind,
    pub operation: Operation,
    pub fields: BTreeMap<String, FieldValue>,
    /// Supporting rows, best first.
    pub records: Vec<Record>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline: Option<Baseline>,
    /// Rows the operation ran over.
    pub sample_size: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<Warning>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_optional: Vec<CallLabel>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parts: Vec<AggregationResult>,
}

impl AggregationResult {
    pub fn new(kind: IntentKind, operation: Operation) -> Self {
        Self {
            kind,
            operation,
            fields: BTreeMap::new(),
            records: Vec::new(),
            baseline: None,
            sample_size: 0,
            warnings: Vec::new(),
            missing_optional: Vec::new(),
            parts: Vec::new(),
        }
    }

    pub fn set(&mut self, name: &str, value: impl Into<FieldValue>) {
        self.fields.insert(name.to_string(), value.into());
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn has_low_confidence_join(&self) -> bool {
        self.warnings
            .iter()
            .any(|w| matches!(w, Warning::LowConfidenceJoin { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baseline_ratio_requires_positive_baseline() {
        let b = Baseline {
            label: "average".into(),
            measured: 30.0,
            baseline: 12.0,
        };
        assert_eq!(b.ratio(), Some(2.5));
        let zero = Baseline {
            baseline: 0.0,
            ..b
        };
        assert_eq!(zero.ratio(), None);
    }

    #[test]
    fn warning_codes() {
        let w = Warning::LowConfidenceJoin {
            dropped: 6,
            total: 10,
        };
        assert_eq!(w.code(), "low_confidence_join");
        assert!(w.message().contains("4 of 10"));
    }
}
