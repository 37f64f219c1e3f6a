//! Shared helper for decoding a Step's untyped `params` map into a typed
//! record, per spec.md §9's "Preflight becomes the decoder" redesign note.

use crate::error::CoreError;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;

/// Decodes `params` into `T` via its `Deserialize` impl.
///
/// # Errors
///
/// Returns `CoreError::BadParam` if the map doesn't match `T`'s shape.
pub fn decode<T: DeserializeOwned>(
    params: &BTreeMap<String, serde_json::Value>,
) -> Result<T, CoreError> {
    let value = serde_json::Value::Object(
        params
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
    );
    serde_json::from_value(value).map_err(|e| CoreError::BadParam(e.to_string()))
}
