//! Query-string grammar for listing reads.
//!
//! ```text
//! ?difficulty=easy&price[lt]=500&sort=-ratingsAverage,price&fields=name,price&page=2&limit=10
//! ```

use chrono::{DateTime, Utc};

use super::{
    Comparison, Condition, FieldKind, FilterValue, ListingField, ListingQuery, Page,
    Projection, Sort, SortKey, DEFAULT_PAGE_LIMIT,
};
use crate::error::CoreError;
use crate::listing::Difficulty;

/// Keys that configure the read rather than filter it.
pub const RESERVED_PARAMS: [&str; 4] = ["page", "sort", "limit", "fields"];

/// Filter keys that may be repeated; repetition means "any of". Every other
/// repeated key keeps only its last value.
pub const REPEATABLE_PARAMS: [&str; 6] = [
    "duration",
    "ratingsQuantity",
    "ratingsAverage",
    "maxGroupSize",
    "difficulty",
    "price",
];

/// Parse decoded query-string pairs into a [`ListingQuery`]. Pagination
/// defaults to page 1 with the default limit.
///
/// # Errors
///
/// Returns [`CoreError::InvalidQuery`] for unknown fields, unsupported
/// operators and values that do not fit the field's type.
pub fn parse_listing_query(pairs: &[(String, String)]) -> Result<ListingQuery, CoreError> {
    let mut query = ListingQuery::default();
    let mut page = 1_u32;
    let mut limit = DEFAULT_PAGE_LIMIT;
    let mut equalities: Vec<(ListingField, Vec<FilterValue>)> = Vec::new();

    for (key, raw) in pairs {
        match key.as_str() {
            "page" => page = parse_count(key, raw)?,
            "limit" => limit = parse_count(key, raw)?,
            "sort" => query.sort = parse_sort(raw)?,
            "fields" => query.projection = parse_projection(raw)?,
            _ => {
                let (name, op) = split_operator(key)?;
                let field = filter_field(key, name)?;
                let value = parse_value(key, field, raw)?;
                if op.is_range() && !matches!(field.kind(), FieldKind::Number | FieldKind::Timestamp)
                {
                    return Err(invalid(key, "range operators need a numeric or date field"));
                }
                if op == Comparison::Eq {
                    match equalities.iter_mut().find(|(f, _)| *f == field) {
                        Some((_, values)) if REPEATABLE_PARAMS.contains(&name) => {
                            values.push(value);
                        }
                        Some((_, values)) => *values = vec![value],
                        None => equalities.push((field, vec![value])),
                    }
                } else {
                    query.filter = query.filter.and(Condition::Compare { field, op, value });
                }
            }
        }
    }

    for (field, mut values) in equalities {
        let condition = if values.len() == 1 {
            Condition::Compare {
                field,
                op: Comparison::Eq,
                value: values.remove(0),
            }
        } else {
            Condition::AnyOf { field, values }
        };
        query.filter = query.filter.and(condition);
    }
    query.page = Some(Page::new(page, limit));
    Ok(query)
}

fn invalid(param: &str, reason: impl Into<String>) -> CoreError {
    CoreError::InvalidQuery {
        param: param.to_string(),
        reason: reason.into(),
    }
}

fn parse_count(key: &str, raw: &str) -> Result<u32, CoreError> {
    raw.trim()
        .parse::<u32>()
        .map_err(|_| invalid(key, "expected a positive whole number"))
}

fn split_operator(key: &str) -> Result<(&str, Comparison), CoreError> {
    let Some((name, rest)) = key.split_once('[') else {
        return Ok((key, Comparison::Eq));
    };
    let op = rest
        .strip_suffix(']')
        .and_then(Comparison::parse)
        .ok_or_else(|| invalid(key, "operator must be one of eq, ne, gt, gte, lt, lte"))?;
    Ok((name, op))
}

fn filter_field(key: &str, name: &str) -> Result<ListingField, CoreError> {
    ListingField::from_api_name(name)
        .filter(|f| f.is_scalar())
        .ok_or_else(|| invalid(key, format!("'{name}' is not a filterable field")))
}

fn parse_value(key: &str, field: ListingField, raw: &str) -> Result<FilterValue, CoreError> {
    let raw = raw.trim();
    match field.kind() {
        FieldKind::Number => raw
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .map(FilterValue::Number)
            .ok_or_else(|| invalid(key, "expected a number")),
        FieldKind::Bool => match raw {
            "true" => Ok(FilterValue::Bool(true)),
            "false" => Ok(FilterValue::Bool(false)),
            _ => Err(invalid(key, "expected true or false")),
        },
        FieldKind::Difficulty => Difficulty::parse(raw)
            .map(FilterValue::Difficulty)
            .ok_or_else(|| invalid(key, "expected easy, medium or difficult")),
        FieldKind::Timestamp => DateTime::parse_from_rfc3339(raw)
            .map(|t| FilterValue::Timestamp(t.with_timezone(&Utc)))
            .map_err(|_| invalid(key, "expected an RFC 3339 timestamp")),
        FieldKind::Text => Ok(FilterValue::Text(raw.to_string())),
        FieldKind::Composite => Err(invalid(key, "field cannot be filtered")),
    }
}

fn list_items(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn parse_sort(raw: &str) -> Result<Sort, CoreError> {
    let mut keys = Vec::new();
    for item in list_items(raw) {
        let (name, descending) = match item.strip_prefix('-') {
            Some(name) => (name, true),
            None => (item, false),
        };
        let field = ListingField::from_api_name(name)
            .filter(|f| f.is_scalar())
            .ok_or_else(|| invalid("sort", format!("'{name}' is not a sortable field")))?;
        keys.push(SortKey { field, descending });
    }
    if keys.is_empty() {
        return Ok(Sort::default());
    }
    Ok(Sort { keys })
}

fn parse_projection(raw: &str) -> Result<Projection, CoreError> {
    let mut included = Vec::new();
    let mut excluded = Vec::new();
    for item in list_items(raw) {
        let (name, exclude) = match item.strip_prefix('-') {
            Some(name) => (name, true),
            None => (item, false),
        };
        let field = ListingField::from_api_name(name)
            .ok_or_else(|| invalid("fields", format!("'{name}' is not a listing field")))?;
        if exclude {
            excluded.push(field);
        } else {
            included.push(field);
        }
    }
    match (included.is_empty(), excluded.is_empty()) {
        (true, true) => Ok(Projection::Default),
        (false, true) => Ok(Projection::Include(included)),
        (true, false) => Ok(Projection::Exclude(excluded)),
        (false, false) => Err(invalid(
            "fields",
            "cannot mix included and excluded fields",
        )),
    }
}
