//! `$variable` substitution in exercise text, and metadata-to-text helpers.
//!
//! A token is `$` followed by the longest run of ASCII letters and digits.
//! Bound tokens are replaced by their formatted value; unbound tokens are
//! left verbatim, so `$xx` is never touched by a binding for `x`.

use crate::formula::Bindings;
use crate::model::ExerciseObject;

pub const VARIABLE_MARKER: char = '$';

/// Replace every bound `$name` token in `text`.
pub fn interpolate(text: &str, bindings: &Bindings) -> String {
    if bindings.is_empty() || !text.contains(VARIABLE_MARKER) {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find(VARIABLE_MARKER) {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + VARIABLE_MARKER.len_utf8()..];
        let name_len = after
            .find(|c: char| !c.is_ascii_alphanumeric())
            .unwrap_or(after.len());
        let name = &after[..name_len];
        match bindings.get(name) {
            Some(value) if !name.is_empty() => out.push_str(&format_value(*value)),
            _ => {
                out.push(VARIABLE_MARKER);
                out.push_str(name);
            }
        }
        rest = &after[name_len..];
    }
    out.push_str(rest);
    out
}

/// [`interpolate`] applied to each element.
pub fn interpolate_all(values: &[String], bindings: &Bindings) -> Vec<String> {
    values.iter().map(|v| interpolate(v, bindings)).collect()
}

/// Interpolate an object's content and values.
pub fn interpolate_object(object: &ExerciseObject, bindings: &Bindings) -> ExerciseObject {
    ExerciseObject {
        content: object.content.as_deref().map(|c| interpolate(c, bindings)),
        values: interpolate_all(&object.values, bindings),
        ..object.clone()
    }
}

/// Whole numbers print without a fractional part.
pub fn format_value(value: f64) -> String {
    if value == 0.0 {
        "0".to_string()
    } else {
        value.to_string()
    }
}

/// A text object whose content is `object`'s metadata value for `key`,
/// carrying the same metadata. `None` when the key is absent.
pub fn object_to_meta_string(object: &ExerciseObject, key: &str) -> Option<ExerciseObject> {
    let value = object.metadata.get(key)?;
    let mut text = ExerciseObject::text(value.clone());
    text.metadata = object.metadata.clone();
    Some(text)
}

/// [`object_to_meta_string`] over a list, skipping objects without the key.
pub fn objects_to_meta_strings(objects: &[ExerciseObject], key: &str) -> Vec<ExerciseObject> {
    objects
        .iter()
        .filter_map(|o| object_to_meta_string(o, key))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ResourceKind;
    use std::collections::BTreeMap;

    fn bindings(pairs: &[(&str, f64)]) -> Bindings {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn whole_token_replacement() {
        let b = bindings(&[("x", 5.0)]);
        assert_eq!(interpolate("$x plus $xx", &b), "5 plus $xx");
        assert_eq!(interpolate("$x+$x=$y.", &b), "5+5=$y.");
    }

    #[test]
    fn values_and_edge_tokens() {
        let b = bindings(&[("speed", 2.5), ("t0", 3.0), ("z", 0.0)]);
        assert_eq!(
            interpolate("v = $speed m/s after $t0 s, $z", &b),
            "v = 2.5 m/s after 3 s, 0"
        );
        assert_eq!(interpolate("costs $ and $", &b), "costs $ and $");
        assert_eq!(interpolate("nothing here", &b), "nothing here");
        assert_eq!(interpolate("$speed", &Bindings::new()), "$speed");
    }

    #[test]
    fn interpolate_idempotent_on_numeric_values() {
        let b = bindings(&[("a", 12.0), ("b", -1.5)]);
        let once = interpolate("$a and $b and $c", &b);
        assert_eq!(interpolate(&once, &b), once);
    }

    #[test]
    fn interpolate_all_and_objects() {
        let b = bindings(&[("n", 4.0)]);
        assert_eq!(
            interpolate_all(&["$n".to_string(), "n".to_string()], &b),
            vec!["4".to_string(), "n".to_string()]
        );
        let mut object = ExerciseObject::text("take $n apples");
        object.values = vec!["$n".into()];
        let done = interpolate_object(&object, &b);
        assert_eq!(done.content.as_deref(), Some("take 4 apples"));
        assert_eq!(done.values, vec!["4".to_string()]);
    }

    #[test]
    fn meta_strings() {
        let picture = ExerciseObject {
            id: Some(3),
            kind: ResourceKind::Picture,
            content: None,
            values: vec![],
            metadata: BTreeMap::from([("capital".to_string(), "Paris".to_string())]),
        };
        let text = object_to_meta_string(&picture, "capital").unwrap();
        assert_eq!(text.kind, ResourceKind::Text);
        assert_eq!(text.content.as_deref(), Some("Paris"));
        assert_eq!(text.metadata, picture.metadata);
        assert!(object_to_meta_string(&picture, "river").is_none());

        let bare = ExerciseObject::text("no metadata");
        let labels = objects_to_meta_strings(&[picture.clone(), bare, picture], "capital");
        assert_eq!(labels.len(), 2);
    }
}
