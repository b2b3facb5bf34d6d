// WatchBridge - Streaming companion client core
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! Shapes returned to the UI
//!
//! Service payloads are mostly passed through as `serde_json::Value`; only
//! the envelope is normalized. Every list-like endpoint comes back as a
//! [`ListResponse`], mutations as a [`MutationResult`].

use crate::error::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Canonical list envelope
///
/// The service sometimes omits `total` or `meta`; `total` then defaults to
/// the number of items and `meta` to an empty object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListResponse<T = Value> {
    pub data: Vec<T>,
    pub total: u64,
    pub meta: Map<String, Value>,
}

impl<T> Default for ListResponse<T> {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            total: 0,
            meta: Map::new(),
        }
    }
}

impl<T> ListResponse<T> {
    pub fn new(data: Vec<T>) -> Self {
        Self {
            total: data.len() as u64,
            data,
            meta: Map::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }
}

impl ListResponse<Value> {
    /// Normalize a raw list payload
    ///
    /// Accepts `{data: [...]}`, `{items: [...]}` or a bare array. An object
    /// with neither key is an empty list.
    pub fn from_raw(raw: Value) -> Result<Self> {
        match raw {
            Value::Array(data) => Ok(Self::new(data)),
            Value::Object(mut obj) => {
                let data = match obj.remove("data").or_else(|| obj.remove("items")) {
                    Some(Value::Array(items)) => items,
                    Some(Value::Null) | None => Vec::new(),
                    Some(other) => {
                        return Err(BridgeError::invalid_response(
                            "list payload 'data' is not an array",
                            Some(other.to_string()),
                        ))
                    }
                };
                let total = obj
                    .get("total")
                    .and_then(Value::as_u64)
                    .unwrap_or(data.len() as u64);
                let meta = match obj.remove("meta") {
                    Some(Value::Object(meta)) => meta,
                    _ => Map::new(),
                };
                Ok(Self { data, total, meta })
            }
            Value::Null => Ok(Self::default()),
            other => Err(BridgeError::invalid_response(
                "expected a list payload",
                Some(other.to_string()),
            )),
        }
    }
}

/// Outcome of a mutating call, as seen by the UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationResult {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Set when the service reported the item was already there
    #[serde(rename = "alreadyInHash", default, skip_serializing_if = "Option::is_none")]
    pub already_in_hash: Option<bool>,
}

impl MutationResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
            already_in_hash: None,
        }
    }

    pub fn already_present() -> Self {
        Self {
            success: true,
            error: None,
            already_in_hash: Some(true),
        }
    }

    pub fn failed(error: &BridgeError) -> Self {
        Self {
            success: false,
            error: Some(error.user_message()),
            already_in_hash: None,
        }
    }
}

/// First element of a `data` array, the service's way of returning one object
pub fn first_data_item(raw: Value) -> Option<Value> {
    match raw {
        Value::Object(mut obj) => match obj.remove("data") {
            Some(Value::Array(items)) => items.into_iter().next(),
            Some(Value::Object(item)) => Some(Value::Object(item)),
            _ => None,
        },
        Value::Array(items) => items.into_iter().next(),
        _ => None,
    }
}

/// Follow a key path through nested objects
pub fn value_at<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |current, key| current.get(*key))
}

/// String or number at `path`, as a string
pub fn string_at(value: &Value, path: &[&str]) -> Option<String> {
    match value_at(value, path)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_raw_fills_missing_total_and_meta() {
        let list = ListResponse::from_raw(json!({"data": [{"id": "a"}, {"id": "b"}]})).unwrap();
        assert_eq!(list.total, 2);
        assert!(list.meta.is_empty());

        let list = ListResponse::from_raw(json!({"data": [], "total": 40, "meta": {"x": 1}})).unwrap();
        assert_eq!(list.total, 40);
        assert_eq!(list.meta["x"], 1);
    }

    #[test]
    fn test_from_raw_variants() {
        assert_eq!(ListResponse::from_raw(json!([1, 2, 3])).unwrap().total, 3);
        assert_eq!(ListResponse::from_raw(json!({"items": [1]})).unwrap().len(), 1);
        assert!(ListResponse::from_raw(json!({})).unwrap().is_empty());
        assert!(ListResponse::from_raw(Value::Null).unwrap().is_empty());
        assert!(ListResponse::from_raw(json!({"data": "nope"})).is_err());
        assert!(ListResponse::from_raw(json!("nope")).is_err());
    }

    #[test]
    fn test_list_serializes_canonical_shape() {
        let list = ListResponse::new(vec![json!({"id": 1})]);
        assert_eq!(
            serde_json::to_value(&list).unwrap(),
            json!({"data": [{"id": 1}], "total": 1, "meta": {}})
        );
    }

    #[test]
    fn test_mutation_result_wire_names() {
        assert_eq!(
            serde_json::to_value(MutationResult::already_present()).unwrap(),
            json!({"success": true, "alreadyInHash": true})
        );
        assert_eq!(serde_json::to_value(MutationResult::ok()).unwrap(), json!({"success": true}));

        let failed = MutationResult::failed(&BridgeError::http(500, "boom", None));
        assert!(!failed.success);
        assert!(failed.error.is_some());
    }

    #[test]
    fn test_key_paths() {
        let v = json!({"panel": {"episode_metadata": {"series_id": "S1"}, "id": 7}});
        assert_eq!(string_at(&v, &["panel", "episode_metadata", "series_id"]).as_deref(), Some("S1"));
        assert_eq!(string_at(&v, &["panel", "id"]).as_deref(), Some("7"));
        assert_eq!(string_at(&v, &["missing"]), None);
    }

    #[test]
    fn test_first_data_item() {
        assert_eq!(first_data_item(json!({"data": [{"id": "x"}, {"id": "y"}]})), Some(json!({"id": "x"})));
        assert_eq!(first_data_item(json!({"data": []})), None);
        assert_eq!(first_data_item(json!({"other": 1})), None);
    }
}
