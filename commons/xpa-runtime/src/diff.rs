//! Schema-agnostic comparison of desired and observed parameters.
//!
//! Both sides are serialized to JSON and diffed as RFC 6902 operations. The
//! resulting patch keeps the desired value of every top-level field that
//! differs. Fields the desired side leaves unset never count as drift.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange {
    pub current: Value,
    pub desired: Value,
}

/// Top-level fields of a parameter struct whose desired value differs from
/// the current one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldPatch {
    changes: BTreeMap<String, FieldChange>,
}

impl FieldPatch {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.changes.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&FieldChange> {
        self.changes.get(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.changes.keys().map(String::as_str)
    }

    /// A copy with `ignored` fields dropped.
    pub fn without(&self, ignored: &[&str]) -> FieldPatch {
        FieldPatch {
            changes: self
                .changes
                .iter()
                .filter(|(k, _)| !ignored.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    pub fn is_empty_ignoring(&self, ignored: &[&str]) -> bool {
        self.changes
            .keys()
            .all(|k| ignored.contains(&k.as_str()))
    }

    /// The desired values as an object of the parameter shape.
    pub fn to_value(&self) -> Value {
        let map: Map<String, Value> = self
            .changes
            .iter()
            .map(|(k, c)| (k.clone(), c.desired.clone()))
            .collect();
        Value::Object(map)
    }

    /// Deserialize the desired values into a patch type whose fields are all
    /// optional.
    pub fn to_typed<P: DeserializeOwned>(&self) -> Result<P, serde_json::Error> {
        serde_json::from_value(self.to_value())
    }

    /// One `field: current -> desired` line per change.
    pub fn describe(&self) -> String {
        self.changes
            .iter()
            .map(|(k, c)| format!("{k}: {} -> {}", c.current, c.desired))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn unescape(segment: &str) -> String {
    segment.replace("~1", "/").replace("~0", "~")
}

/// Compute the patch taking `current` to `target`.
pub fn create_patch<T: Serialize>(
    current: &T,
    target: &T,
) -> Result<FieldPatch, serde_json::Error> {
    let current = serde_json::to_value(current)?;
    let target = serde_json::to_value(target)?;
    let ops = json_patch::diff(&current, &target);

    let empty = Map::new();
    let current_obj = current.as_object().unwrap_or(&empty);
    let target_obj = target.as_object().unwrap_or(&empty);

    let mut touched: BTreeSet<String> = BTreeSet::new();
    for op in ops.0.iter() {
        let path = match op {
            json_patch::PatchOperation::Add(o) => o.path.as_str(),
            json_patch::PatchOperation::Remove(o) => o.path.as_str(),
            json_patch::PatchOperation::Replace(o) => o.path.as_str(),
            json_patch::PatchOperation::Move(o) => o.path.as_str(),
            json_patch::PatchOperation::Copy(o) => o.path.as_str(),
            json_patch::PatchOperation::Test(o) => o.path.as_str(),
        };
        match path.trim_start_matches('/').split('/').next() {
            Some(seg) if !seg.is_empty() => {
                touched.insert(unescape(seg));
            }
            _ => touched.extend(target_obj.keys().cloned()),
        }
    }

    let changes = touched
        .into_iter()
        .filter_map(|k| {
            let desired = target_obj.get(&k).filter(|v| !v.is_null())?.clone();
            let current = current_obj.get(&k).cloned().unwrap_or(Value::Null);
            (current != desired).then_some((k, FieldChange { current, desired }))
        })
        .collect();
    Ok(FieldPatch { changes })
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagDiff {
    pub add: BTreeMap<String, String>,
    pub remove: Vec<String>,
}

impl TagDiff {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }
}

/// Tags to add (missing or mismatched) and keys to remove (not desired).
pub fn diff_tags(
    desired: &BTreeMap<String, String>,
    observed: &BTreeMap<String, String>,
) -> TagDiff {
    let add = desired
        .iter()
        .filter(|(k, v)| observed.get(*k) != Some(*v))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let remove = observed
        .keys()
        .filter(|k| !desired.contains_key(*k))
        .cloned()
        .collect();
    TagDiff { add, remove }
}

fn segment_cmp(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}

/// Dotted-numeric comparison; a missing segment sorts first.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => match segment_cmp(x, y) {
                Ordering::Equal => continue,
                other => return other,
            },
        }
    }
}

/// `observed` is `desired` or a more specific version of it (`12` / `12.3`).
pub fn version_has_prefix(desired: &str, observed: &str) -> bool {
    observed == desired
        || observed
            .strip_prefix(desired)
            .is_some_and(|rest| rest.starts_with('.'))
}

/// Upgrades only; a desired version below the observed one is ignored.
pub fn version_needs_upgrade(desired: &str, observed: &str) -> bool {
    if desired.is_empty() || version_has_prefix(desired, observed) {
        return false;
    }
    compare_versions(desired, observed) == Ordering::Greater
}

/// Unordered comparison, duplicates ignored.
pub fn same_set<T: Ord>(a: &[T], b: &[T]) -> bool {
    let left: BTreeSet<&T> = a.iter().collect();
    let right: BTreeSet<&T> = b.iter().collect();
    left == right
}
