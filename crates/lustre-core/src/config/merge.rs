//! Key-by-key merge of JSON values.

use serde_json::Value;

/// Merge `overrides` into `base` in place.
///
/// Objects merge recursively; any other override value (including arrays and
/// `null`) replaces the base value. Keys absent from `overrides` are left
/// untouched.
pub fn merge_values(base: &mut Value, overrides: &Value) {
    match (base, overrides) {
        (Value::Object(base_map), Value::Object(override_map)) => {
            for (key, value) in override_map {
                match base_map.get_mut(key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, value) => *base = value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_objects_merge() {
        let mut base = json!({"a": 1, "nested": {"x": 1, "y": 2}});
        merge_values(&mut base, &json!({"nested": {"y": 5}}));
        assert_eq!(base, json!({"a": 1, "nested": {"x": 1, "y": 5}}));
    }

    #[test]
    fn test_arrays_and_scalars_replace() {
        let mut base = json!({"crop": [0, 0, 0, 0], "fmt": null});
        merge_values(&mut base, &json!({"crop": [1, 2], "fmt": "PNG"}));
        assert_eq!(base, json!({"crop": [1, 2], "fmt": "PNG"}));
    }

    #[test]
    fn test_key_order_does_not_matter() {
        let mut a = json!({"p": 1, "q": 1});
        let mut b = a.clone();
        merge_values(&mut a, &json!({"p": 2, "q": 3}));
        merge_values(&mut b, &json!({"q": 3, "p": 2}));
        assert_eq!(a, b);
    }
}
