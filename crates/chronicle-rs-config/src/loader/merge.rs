//! JSON merge helper for layered configuration.

use serde_json::{Map, Value};

/// Recursively merge `overlay` into `base`.
///
/// Objects merge key by key; any other value replaces what was there. A key
/// whose entry in `locks` is a non-object value is locked and left alone, and
/// an object entry in `locks` constrains the keys beneath it.
pub(super) fn overlay(base: &mut Value, overlay_value: &Value, locks: Option<&Value>) {
    match (base, overlay_value) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                let lock = locks.and_then(|locks| locks.get(key));
                if lock.is_some_and(|lock| !lock.is_object()) {
                    continue;
                }
                match base_map.get_mut(key) {
                    Some(existing) => overlay(existing, value, lock),
                    None if lock.is_none() => {
                        base_map.insert(key.clone(), value.clone());
                    }
                    None => {
                        let mut slot = Value::Object(Map::new());
                        overlay(&mut slot, value, lock);
                        base_map.insert(key.clone(), slot);
                    }
                }
            }
        }
        (slot, value) => {
            if locks.is_none() {
                *slot = value.clone();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::overlay;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn nested_objects_merge_and_leaves_replace() {
        let mut base = json!({ "history": { "capacity": 10, "window": { "max_messages": 4 } } });
        overlay(
            &mut base,
            &json!({ "history": { "window": { "max_messages": 6 } } }),
            None,
        );
        assert_eq!(
            base,
            json!({ "history": { "capacity": 10, "window": { "max_messages": 6 } } })
        );
    }

    #[test]
    fn locked_leaves_are_skipped() {
        let locks = json!({ "history": { "capacity": 5 } });
        let mut base = json!({ "history": { "capacity": 5 } });
        overlay(
            &mut base,
            &json!({ "history": { "capacity": 50, "window": { "max_messages": 3 } } }),
            Some(&locks),
        );
        assert_eq!(
            base,
            json!({ "history": { "capacity": 5, "window": { "max_messages": 3 } } })
        );
    }
}
