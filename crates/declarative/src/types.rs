//! Core types for declarative resource management

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Terminal outcome of reconciling a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Resource is in the desired state, either already or after a change
    Success,
    /// Dry run: a change is needed but nothing was mutated
    DryRunPending,
    /// Reconciliation failed
    Failure,
}

impl Outcome {
    /// Tri-state result reported to callers (`None` = dry-run pending)
    pub fn as_result(&self) -> Option<bool> {
        match self {
            Self::Success => Some(true),
            Self::DryRunPending => None,
            Self::Failure => Some(false),
        }
    }

    /// Inverse of [`Outcome::as_result`]
    pub fn from_result(result: Option<bool>) -> Self {
        match result {
            Some(true) => Self::Success,
            None => Self::DryRunPending,
            Some(false) => Self::Failure,
        }
    }
}

/// Before/after view of a change
///
/// Either side may be an empty object. Empty sides are omitted when
/// serialized, so "no changes" serializes as `{}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Changes {
    #[serde(default = "empty_object", skip_serializing_if = "is_empty_value")]
    pub old: Value,
    #[serde(default = "empty_object", skip_serializing_if = "is_empty_value")]
    pub new: Value,
}

impl Changes {
    /// Create a change record from two values
    pub fn new(old: impl Into<Value>, new: impl Into<Value>) -> Self {
        Self {
            old: old.into(),
            new: new.into(),
        }
    }

    /// No changes
    pub fn none() -> Self {
        Self {
            old: empty_object(),
            new: empty_object(),
        }
    }

    /// Check if neither side carries anything
    pub fn is_empty(&self) -> bool {
        is_empty_value(&self.old) && is_empty_value(&self.new)
    }
}

impl Default for Changes {
    fn default() -> Self {
        Self::none()
    }
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Result of reconciling one resource
///
/// Serializes as `{name, result, comment, changes}` where `result` is
/// `true`, `false` or `null` (dry-run pending).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateResult {
    pub name: String,
    #[serde(rename = "result", with = "result_repr")]
    pub outcome: Outcome,
    pub comment: String,
    #[serde(default)]
    pub changes: Changes,
}

impl StateResult {
    /// Resource is in the desired state
    pub fn success(name: impl Into<String>, comment: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            outcome: Outcome::Success,
            comment: comment.into(),
            changes: Changes::none(),
        }
    }

    /// A change would be made outside of dry-run
    pub fn pending(name: impl Into<String>, comment: impl Into<String>, changes: Changes) -> Self {
        Self {
            name: name.into(),
            outcome: Outcome::DryRunPending,
            comment: comment.into(),
            changes,
        }
    }

    /// Reconciliation failed
    pub fn failure(name: impl Into<String>, comment: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            outcome: Outcome::Failure,
            comment: comment.into(),
            changes: Changes::none(),
        }
    }

    /// Attach changes
    pub fn with_changes(mut self, changes: Changes) -> Self {
        self.changes = changes;
        self
    }

    /// Tri-state result (`None` = dry-run pending)
    pub fn result(&self) -> Option<bool> {
        self.outcome.as_result()
    }

    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }

    pub fn is_pending(&self) -> bool {
        self.outcome == Outcome::DryRunPending
    }

    pub fn is_failure(&self) -> bool {
        self.outcome == Outcome::Failure
    }

    /// Whether a change was made or would be made
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }
}

mod result_repr {
    use super::Outcome;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(outcome: &Outcome, serializer: S) -> Result<S::Ok, S::Error> {
        outcome.as_result().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Outcome, D::Error> {
        Option::<bool>::deserialize(deserializer).map(Outcome::from_result)
    }
}

/// Summary of execution results
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecuteSummary {
    /// Succeeded and changed something
    pub changed: usize,
    /// Succeeded without a change
    pub unchanged: usize,
    /// Dry run: change pending
    pub pending: usize,
    pub failed: usize,
}

impl ExecuteSummary {
    /// Build a summary from a list of results
    pub fn from_results(results: &[StateResult]) -> Self {
        let mut summary = Self::default();
        for result in results {
            summary.add_result(result);
        }
        summary
    }

    /// Total number of actual changes made
    pub fn total_changes(&self) -> usize {
        self.changed
    }

    /// Check if execution was fully successful (no failures)
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Total number of resources processed
    pub fn total(&self) -> usize {
        self.changed + self.unchanged + self.pending + self.failed
    }

    /// Merge another summary into this one
    pub fn merge(&mut self, other: &ExecuteSummary) {
        self.changed += other.changed;
        self.unchanged += other.unchanged;
        self.pending += other.pending;
        self.failed += other.failed;
    }

    /// Add a result to the summary
    pub fn add_result(&mut self, result: &StateResult) {
        match result.outcome {
            Outcome::Success if result.has_changes() => self.changed += 1,
            Outcome::Success => self.unchanged += 1,
            Outcome::DryRunPending => self.pending += 1,
            Outcome::Failure => self.failed += 1,
        }
    }
}

/// Options for execution
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Don't make changes, just show what would happen
    pub dry_run: bool,
    /// Number of resources applied concurrently
    pub jobs: usize,
    /// Verbose output
    pub verbose: bool,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            jobs: 1,
            verbose: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_result_serializes_tri_state() {
        let pending = StateResult::pending(
            "rg1",
            "Resource group rg1 would be created.",
            Changes::new(json!({}), json!({"name": "rg1"})),
        );
        let value = serde_json::to_value(&pending).unwrap();
        assert_eq!(value["result"], Value::Null);
        assert_eq!(value["changes"], json!({"new": {"name": "rg1"}}));

        let ok = StateResult::success("rg1", "Resource group rg1 is already present.");
        let value = serde_json::to_value(&ok).unwrap();
        assert_eq!(value["result"], json!(true));
        assert_eq!(value["changes"], json!({}));

        let failed = StateResult::failure("rg1", "boom");
        assert_eq!(serde_json::to_value(&failed).unwrap()["result"], json!(false));
    }

    #[test]
    fn test_result_deserializes_null_as_pending() {
        let parsed: StateResult = serde_json::from_value(json!({
            "name": "rg1",
            "result": null,
            "comment": "Resource group rg1 would be deleted.",
        }))
        .unwrap();
        assert!(parsed.is_pending());
        assert!(!parsed.has_changes());
    }

    #[test]
    fn test_summary_counts_outcomes() {
        let results = vec![
            StateResult::success("a", "already present"),
            StateResult::success("b", "created").with_changes(Changes::new(json!({}), json!({"name": "b"}))),
            StateResult::pending("c", "would be created", Changes::none()),
            StateResult::failure("d", "failed"),
        ];
        let summary = ExecuteSummary::from_results(&results);
        assert_eq!(summary.unchanged, 1);
        assert_eq!(summary.changed, 1);
        assert_eq!(summary.pending, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.total(), 4);
        assert!(!summary.is_success());
    }
}
