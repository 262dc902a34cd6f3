//! Structural diff computation

use crate::types::Changes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Compute a recursive structural diff between two values
///
/// Keys holding equal values on both sides are pruned, descending into
/// nested objects. What remains of each side becomes `old` / `new`.
/// The result is empty iff `old == new`.
pub fn deep_diff(old: &Value, new: &Value) -> Changes {
    if old == new {
        return Changes::none();
    }

    match (old, new) {
        (Value::Object(old), Value::Object(new)) => {
            let (old, new) = prune_objects(old, new);
            Changes::new(Value::Object(old), Value::Object(new))
        }
        _ => Changes::new(old.clone(), new.clone()),
    }
}

fn prune_objects(
    old: &Map<String, Value>,
    new: &Map<String, Value>,
) -> (Map<String, Value>, Map<String, Value>) {
    let mut old_out = Map::new();
    let mut new_out = Map::new();

    for (key, old_value) in old {
        match (old_value, new.get(key)) {
            (_, None) => {
                old_out.insert(key.clone(), old_value.clone());
            }
            (_, Some(new_value)) if new_value == old_value => {}
            (Value::Object(old_inner), Some(Value::Object(new_inner))) => {
                let (old_pruned, new_pruned) = prune_objects(old_inner, new_inner);
                if !old_pruned.is_empty() {
                    old_out.insert(key.clone(), Value::Object(old_pruned));
                }
                if !new_pruned.is_empty() {
                    new_out.insert(key.clone(), Value::Object(new_pruned));
                }
            }
            (_, Some(new_value)) => {
                old_out.insert(key.clone(), old_value.clone());
                new_out.insert(key.clone(), new_value.clone());
            }
        }
    }

    for (key, new_value) in new {
        if !old.contains_key(key) {
            new_out.insert(key.clone(), new_value.clone());
        }
    }

    (old_out, new_out)
}

/// Typed view of the drift between two string maps (e.g. tag sets)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagDiff {
    /// Keys only in the desired map
    pub added: BTreeMap<String, String>,
    /// Keys only in the live map
    pub removed: BTreeMap<String, String>,
    /// Keys in both with differing values: `(live, desired)`
    pub changed: BTreeMap<String, (String, String)>,
}

impl TagDiff {
    /// Compare a live map against a desired map
    pub fn between(live: &BTreeMap<String, String>, desired: &BTreeMap<String, String>) -> Self {
        let mut diff = Self::default();

        for (key, value) in live {
            match desired.get(key) {
                None => {
                    diff.removed.insert(key.clone(), value.clone());
                }
                Some(wanted) if wanted != value => {
                    diff.changed
                        .insert(key.clone(), (value.clone(), wanted.clone()));
                }
                Some(_) => {}
            }
        }

        for (key, value) in desired {
            if !live.contains_key(key) {
                diff.added.insert(key.clone(), value.clone());
            }
        }

        diff
    }

    /// Number of differing keys
    pub fn len(&self) -> usize {
        self.added.len() + self.removed.len() + self.changed.len()
    }

    /// Check if the maps are equal
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Display for TagDiff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts = Vec::with_capacity(self.len());
        for (key, value) in &self.added {
            parts.push(format!("+{key}={value}"));
        }
        for (key, (from, to)) in &self.changed {
            parts.push(format!("~{key}={from}->{to}"));
        }
        for key in self.removed.keys() {
            parts.push(format!("-{key}"));
        }
        write!(f, "{}", parts.join(" "))
    }
}
