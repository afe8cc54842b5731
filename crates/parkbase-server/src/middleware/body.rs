//! Body ingestion: parses structured request bodies, the query string and
//! cookies once, into request extensions that later stages and handlers
//! read from.

use std::collections::HashMap;

use axum::{
    body::Body,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use percent_encoding::percent_decode_str;
use serde::de::{self, DeserializeOwned};
use serde_json::{Map, Value};

use super::request_id_of;
use crate::api::ApiError;

/// Maximum accepted size of a structured body, in bytes.
#[derive(Debug, Clone, Copy)]
pub struct BodyLimit(pub usize);

/// The parsed request body; `None` when the content type is not one the
/// ingestion stage understands.
#[derive(Debug, Clone, Default)]
pub struct StructuredBody(pub Option<Value>);

/// Decoded query-string pairs, in order.
#[derive(Debug, Clone, Default)]
pub struct QueryPairs(pub Vec<(String, String)>);

/// Cookies from the `Cookie` header with percent-decoded values.
#[derive(Debug, Clone, Default)]
pub struct Cookies(pub HashMap<String, String>);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyKind {
    Json,
    Form,
}

fn body_kind(headers: &HeaderMap) -> Option<BodyKind> {
    let content_type = headers.get(header::CONTENT_TYPE)?.to_str().ok()?;
    let mime = content_type.split(';').next()?.trim().to_ascii_lowercase();
    match mime.as_str() {
        "application/json" => Some(BodyKind::Json),
        "application/x-www-form-urlencoded" => Some(BodyKind::Form),
        _ => None,
    }
}

fn declared_length(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

pub(crate) fn parse_cookies(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            let value = percent_decode_str(value.trim().trim_matches('"'))
                .decode_utf8_lossy()
                .into_owned();
            Some((name.to_string(), value))
        })
        .collect()
}

/// Split a form key such as `a[b][]` into `["a", "b", ""]`.
fn key_path(key: &str) -> Vec<&str> {
    let Some(open) = key.find('[') else {
        return vec![key];
    };
    let mut path = vec![&key[..open]];
    let mut rest = &key[open..];
    while let Some(inner) = rest.strip_prefix('[') {
        let Some(close) = inner.find(']') else {
            // Unbalanced brackets: treat the remainder as a plain key segment.
            return vec![key];
        };
        path.push(&inner[..close]);
        rest = &inner[close + 1..];
    }
    if rest.is_empty() {
        path
    } else {
        vec![key]
    }
}

fn insert_path(target: &mut Value, path: &[&str], value: String) {
    let Some((head, tail)) = path.split_first() else {
        *target = Value::String(value);
        return;
    };
    if head.is_empty() {
        if !target.is_array() {
            *target = Value::Array(Vec::new());
        }
        if let Value::Array(items) = target {
            let mut slot = Value::Null;
            insert_path(&mut slot, tail, value);
            items.push(slot);
        }
        return;
    }
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(map) = target {
        let slot = map.entry((*head).to_string()).or_insert(Value::Null);
        insert_path(slot, tail, value);
    }
}

/// Decode an urlencoded form into JSON, expanding bracket keys into nested
/// objects (`a[b]=c`) and arrays (`a[]=c`). Text that is not UTF-8, raw or
/// after percent-decoding, is rejected rather than replaced.
pub(crate) fn parse_form(bytes: &[u8]) -> Result<Value, serde_urlencoded::de::Error> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| de::Error::custom("form body is not valid UTF-8"))?;
    if text
        .split(['&', '='])
        .any(|part| percent_decode_str(part).decode_utf8().is_err())
    {
        return Err(de::Error::custom(
            "form body has a percent-encoded sequence that is not UTF-8",
        ));
    }
    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(text)?;
    let mut root = Value::Object(Map::new());
    for (key, value) in pairs {
        let path = key_path(&key);
        insert_path(&mut root, &path, value);
    }
    Ok(root)
}

fn too_large(request_id: String, limit: usize) -> Response {
    ApiError::new(
        request_id,
        "payload_too_large",
        format!("request body exceeds {limit} bytes"),
    )
    .into_response()
}

/// Ingestion stage. Structured bodies are read up to the configured limit
/// and parsed; the raw body is not available to anything behind this stage.
pub async fn ingest_body(State(limit): State<BodyLimit>, req: Request, next: Next) -> Response {
    let request_id = request_id_of(&req);
    let (mut parts, body) = req.into_parts();

    let query = parts.uri.query().unwrap_or("");
    let pairs: Vec<(String, String)> = match serde_urlencoded::from_str(query) {
        Ok(pairs) => pairs,
        Err(e) => {
            return ApiError::new(request_id, "bad_request", format!("malformed query string: {e}"))
                .into_response()
        }
    };
    parts.extensions.insert(QueryPairs(pairs));
    parts
        .extensions
        .insert(Cookies(parse_cookies(&parts.headers)));

    let Some(kind) = body_kind(&parts.headers) else {
        parts.extensions.insert(StructuredBody(None));
        return next.run(Request::from_parts(parts, body)).await;
    };

    if declared_length(&parts.headers).is_some_and(|len| len > limit.0) {
        return too_large(request_id, limit.0);
    }
    let Ok(bytes) = axum::body::to_bytes(body, limit.0).await else {
        return too_large(request_id, limit.0);
    };

    let value = if bytes.is_empty() {
        None
    } else {
        let parsed = match kind {
            BodyKind::Json => serde_json::from_slice(&bytes).map_err(|e| e.to_string()),
            BodyKind::Form => parse_form(&bytes).map_err(|e| e.to_string()),
        };
        match parsed {
            Ok(value) => Some(value),
            Err(e) => {
                return ApiError::new(request_id, "bad_request", format!("malformed body: {e}"))
                    .into_response()
            }
        }
    };
    parts.extensions.insert(StructuredBody(value));
    next.run(Request::from_parts(parts, Body::empty())).await
}

/// Extractor for the ingested (and sanitized) body. A request without a
/// structured body deserializes from `{}`.
#[derive(Debug, Clone)]
pub struct Structured<T>(pub T);

impl<S, T> FromRequestParts<S> for Structured<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .extensions
            .get::<StructuredBody>()
            .and_then(|b| b.0.clone())
            .unwrap_or_else(|| Value::Object(Map::new()));
        serde_json::from_value(value).map(Structured).map_err(|e| {
            let request_id = parts
                .extensions
                .get::<super::RequestId>()
                .map(|r| r.0.clone())
                .unwrap_or_default();
            ApiError::new(request_id, "bad_request", format!("invalid body: {e}"))
        })
    }
}

impl<S> FromRequestParts<S> for QueryPairs
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<QueryPairs>()
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn form_brackets_nest() {
        let value = parse_form(b"name=Forest+Camp&price[lt]=500&images[]=a.jpg&images[]=b.jpg")
            .expect("form");
        assert_eq!(value["name"], "Forest Camp");
        assert_eq!(value["price"]["lt"], "500");
        assert_eq!(value["images"], serde_json::json!(["a.jpg", "b.jpg"]));
    }

    #[test]
    fn form_with_invalid_utf8_is_rejected() {
        assert!(parse_form(b"name=%FF%FE&price=1").is_err());
        assert!(parse_form(b"name=\xFF&price=1").is_err());
        assert!(parse_form(b"name=Caf%C3%A9+Camp").is_ok());
    }

    #[test]
    fn unbalanced_brackets_stay_flat() {
        let value = parse_form(b"a[b=1").expect("form");
        assert_eq!(value["a[b"], "1");
    }

    #[test]
    fn cookies_are_split_and_decoded() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("jwt=abc%2Edef; theme=dark"),
        );
        let cookies = parse_cookies(&headers);
        assert_eq!(cookies.get("jwt").map(String::as_str), Some("abc.def"));
        assert_eq!(cookies.get("theme").map(String::as_str), Some("dark"));
    }

    #[test]
    fn content_type_detection_ignores_parameters() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json; charset=utf-8"),
        );
        assert_eq!(body_kind(&headers), Some(BodyKind::Json));
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        assert_eq!(body_kind(&headers), None);
    }
}
