//! Field-by-field merging of configuration tiers.
//!
//! Objects merge recursively. Arrays and scalars from the higher tier
//! replace the lower tier. A null in the higher tier means "not specified".

use serde_json::Value;

/// Merge `overlay` onto `base`, with `overlay` taking precedence.
///
/// # Example
/// ```
/// use serde_json::json;
/// use stride_analytics::config::deep_merge;
///
/// let base = json!({"reports": {"stale_days": 3, "top_items": 10}});
/// let overlay = json!({"reports": {"stale_days": 7}});
/// let merged = deep_merge(base, overlay);
/// assert_eq!(merged, json!({"reports": {"stale_days": 7, "top_items": 10}}));
/// ```
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => overlay_value,
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (base, Value::Null) => base,
        (_, overlay) => overlay,
    }
}

/// Fold `deep_merge` over tiers ordered lowest to highest.
pub fn deep_merge_all(values: impl IntoIterator<Item = Value>) -> Value {
    values.into_iter().fold(Value::Null, deep_merge)
}
