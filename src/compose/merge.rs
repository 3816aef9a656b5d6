//! Deep merge of configuration trees

use serde_yaml::Value;

/// Merge `later` into `earlier` in place.
///
/// Mappings on both sides merge key by key, recursively. Anything else
/// (scalars, lists, null, a scalar replacing a mapping or the reverse) is
/// last-write-wins: lists are replaced whole, never concatenated.
pub fn deep_merge(earlier: &mut Value, later: Value) {
    match (earlier, later) {
        (Value::Mapping(base), Value::Mapping(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

/// Non-mutating form of [`deep_merge`].
pub fn merged(earlier: &Value, later: &Value) -> Value {
    let mut out = earlier.clone();
    deep_merge(&mut out, later.clone());
    out
}
