//! Matching objects against metadata constraints.
//!
//! A [`MetadataConstraint`] compares one metadata entry with a literal.
//! Values that both parse as numbers compare numerically; anything else
//! compares as text.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::model::{ExerciseObject, MetadataConstraint, ObjectConstraints};

/// Comparators understood by [`MetadataConstraint::matches`].
pub const COMPARATORS: &[&str] = &["exists", "==", "!=", "<", "<=", ">", ">="];

impl MetadataConstraint {
    pub fn new(key: &str, comparator: &str, value: Option<&str>) -> Self {
        Self {
            key: Some(key.to_string()),
            comparator: Some(comparator.to_string()),
            value: value.map(str::to_string),
        }
    }

    /// Whether `metadata` satisfies this constraint. Incomplete constraints
    /// and unknown comparators match nothing.
    pub fn matches(&self, metadata: &BTreeMap<String, String>) -> bool {
        let (Some(key), Some(comparator)) = (self.key.as_deref(), self.comparator.as_deref())
        else {
            return false;
        };
        let actual = metadata.get(key);
        if comparator == "exists" {
            return actual.is_some();
        }
        let (Some(actual), Some(expected)) = (actual, self.value.as_deref()) else {
            return false;
        };
        let ordering = compare_values(actual, expected);
        match comparator {
            "==" => ordering == Ordering::Equal,
            "!=" => ordering != Ordering::Equal,
            "<" => ordering == Ordering::Less,
            "<=" => ordering != Ordering::Greater,
            ">" => ordering == Ordering::Greater,
            ">=" => ordering != Ordering::Less,
            _ => false,
        }
    }
}

fn compare_values(actual: &str, expected: &str) -> Ordering {
    match (actual.trim().parse::<f64>(), expected.trim().parse::<f64>()) {
        (Ok(a), Ok(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        _ => actual.cmp(expected),
    }
}

impl ObjectConstraints {
    /// Whether `object` has the allowed type, is not excluded and satisfies
    /// every metadata constraint.
    pub fn matches(&self, object: &ExerciseObject) -> bool {
        if self.allowed_type.is_some_and(|kind| kind != object.kind) {
            return false;
        }
        if object.id.is_some_and(|id| self.excluded.contains(&id)) {
            return false;
        }
        self.metadata_constraints
            .iter()
            .all(|c| c.matches(&object.metadata))
    }
}
