//! Sanitization stage: runs over what body ingestion produced.
//!
//! - object keys that start with `$` or contain `.` are removed, so a
//!   body can never smuggle query operators into a store filter;
//! - `<` and `>` in string values are escaped;
//! - repeated query keys keep only their last value unless the key is
//!   repeatable;
//! - path segments carrying operator or markup characters are rejected.

use std::collections::HashSet;

use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use parkbase_core::query::REPEATABLE_PARAMS;
use percent_encoding::percent_decode_str;
use serde_json::Value;

use super::{request_id_of, QueryPairs, StructuredBody};
use crate::api::ApiError;

fn is_operator_key(key: &str) -> bool {
    key.starts_with('$') || key.contains('.')
}

pub(crate) fn neutralize_markup(text: &str) -> String {
    text.replace('<', "&lt;").replace('>', "&gt;")
}

/// Strip operator keys and escape markup, recursively.
pub(crate) fn clean_value(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|key, _| !is_operator_key(key));
            for child in map.values_mut() {
                clean_value(child);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(clean_value),
        Value::String(text) => {
            if text.contains(['<', '>']) {
                *text = neutralize_markup(text);
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

/// Query keys are checked segment by segment: `price[lt]` is fine,
/// `price[$gt]` and `a.b` are dropped.
fn has_operator_segment(key: &str) -> bool {
    key.split(['[', ']'])
        .filter(|s| !s.is_empty())
        .any(is_operator_key)
}

pub(crate) fn clean_query(pairs: Vec<(String, String)>) -> Vec<(String, String)> {
    let pairs: Vec<(String, String)> = pairs
        .into_iter()
        .filter(|(key, _)| !has_operator_segment(key))
        .map(|(key, value)| (key, neutralize_markup(&value)))
        .collect();

    // Keep the last occurrence of every non-repeatable key.
    let mut seen = HashSet::new();
    let mut kept: Vec<(String, String)> = pairs
        .into_iter()
        .rev()
        .filter(|(key, _)| REPEATABLE_PARAMS.contains(&key.as_str()) || seen.insert(key.clone()))
        .collect();
    kept.reverse();
    kept
}

fn unsafe_path(path: &str) -> bool {
    path.split('/').any(|segment| {
        let decoded = percent_decode_str(segment).decode_utf8_lossy();
        decoded.contains(['$', '<', '>', '{', '}'])
    })
}

pub async fn sanitize(mut req: Request, next: Next) -> Response {
    if unsafe_path(req.uri().path()) {
        return ApiError::new(
            request_id_of(&req),
            "bad_request",
            "route parameters may not contain operator or markup characters",
        )
        .into_response();
    }

    if let Some(StructuredBody(Some(value))) = req.extensions_mut().get_mut::<StructuredBody>() {
        clean_value(value);
    }
    if let Some(QueryPairs(pairs)) = req.extensions_mut().get_mut::<QueryPairs>() {
        *pairs = clean_query(std::mem::take(pairs));
    }
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn strips_operator_keys_recursively() {
        let mut body = json!({
            "email": {"$gt": ""},
            "name": "Forest Camp",
            "nested": [{"a.b": 1, "ok": true}],
            "$where": "1"
        });
        clean_value(&mut body);
        assert_eq!(
            body,
            json!({"email": {}, "name": "Forest Camp", "nested": [{"ok": true}]})
        );
    }

    #[test]
    fn escapes_markup_in_strings() {
        let mut body = json!({"name": "<script>alert(1)</script>", "tags": ["a<b"]});
        clean_value(&mut body);
        assert_eq!(body["name"], "&lt;script&gt;alert(1)&lt;/script&gt;");
        assert_eq!(body["tags"][0], "a&lt;b");
    }

    #[test]
    fn query_pollution_keeps_last_unless_repeatable() {
        let cleaned = clean_query(pairs(&[
            ("sort", "price"),
            ("duration", "5"),
            ("sort", "-price"),
            ("duration", "9"),
        ]));
        assert_eq!(
            cleaned,
            pairs(&[("duration", "5"), ("sort", "-price"), ("duration", "9")])
        );
    }

    #[test]
    fn query_operator_keys_are_dropped() {
        let cleaned = clean_query(pairs(&[
            ("price[$gt]", "1"),
            ("price[lt]", "500"),
            ("a.b", "1"),
        ]));
        assert_eq!(cleaned, pairs(&[("price[lt]", "500")]));
    }

    #[test]
    fn detects_unsafe_path_segments() {
        assert!(unsafe_path("/api/parks/%24gt"));
        assert!(unsafe_path("/api/parks/slug/%3Cb%3E"));
        assert!(!unsafe_path("/api/parks/within/200/center/34.1,-118.1/unit/mi"));
    }
}
