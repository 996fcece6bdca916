use std::collections::BTreeMap;

use bson::Bson;

use crate::collection::REVISION_FIELD;
use crate::errors::DbError;

use super::types::{
    CmpOp, CREATED_AT_FIELD, Filter, FindOptions, ID_FIELD, Order, Projection, SortSpec,
};

/// Caller-supplied, unvalidated description of a read: a flat map of filter
/// and control keys to raw string values, e.g. `price[lte] -> "1500"`,
/// `sort -> "-price,name"`. Consumed once per request.
pub type RawQuery = BTreeMap<String, String>;

/// Control keys never interpreted as filter fields.
pub const RESERVED_KEYS: [&str; 4] = ["page", "sort", "limit", "fields"];

pub const DEFAULT_PAGE: usize = 1;
pub const DEFAULT_LIMIT: usize = 100;

/// Translates a [`RawQuery`] into a filter plus resolved [`FindOptions`]
/// through four ordered steps: [`filter`](Self::filter), [`sort`](Self::sort),
/// [`project`](Self::project), [`paginate`](Self::paginate).
///
/// Each step reads only its own directives, so running one never disturbs
/// another, and re-running a step is a no-op. The builder itself never fails:
/// a malformed directive degrades to that step's default. Surfacing bad
/// requests is the boundary layer's concern, not this one's.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    raw: RawQuery,
    filter: Filter,
    options: FindOptions,
}

impl QueryBuilder {
    #[must_use]
    pub fn new(raw: RawQuery) -> Self {
        let options = FindOptions {
            sort: default_sort(),
            projection: default_projection(),
            skip: 0,
            limit: Some(DEFAULT_LIMIT),
        };
        Self { raw, filter: Filter::True, options }
    }

    /// Filter step: every non-reserved key becomes one predicate.
    #[must_use]
    pub fn filter(mut self) -> Self {
        let mut predicates: Vec<Filter> = self
            .raw
            .iter()
            .filter(|(key, _)| !RESERVED_KEYS.contains(&key.as_str()))
            .map(|(key, value)| predicate_for(key, value))
            .collect();
        self.filter = match predicates.len() {
            0 => Filter::True,
            1 => predicates.remove(0),
            _ => Filter::And(predicates),
        };
        self
    }

    /// Sort step: comma-separated fields, `-` prefix for descending; later
    /// fields break ties.
    #[must_use]
    pub fn sort(mut self) -> Self {
        if let Some(directive) = self.raw.get("sort") {
            let specs = parse_sort(directive);
            if !specs.is_empty() {
                self.options.sort = specs;
            }
        }
        self
    }

    /// Projection step: comma-separated field names, trimmed.
    #[must_use]
    pub fn project(mut self) -> Self {
        if let Some(projection) = self.raw.get("fields").and_then(|d| parse_projection(d)) {
            self.options.projection = projection;
        }
        self
    }

    /// Pagination step: `skip = (page - 1) * limit`.
    #[must_use]
    pub fn paginate(mut self) -> Self {
        let page = parse_positive(self.raw.get("page")).unwrap_or(DEFAULT_PAGE);
        let limit = parse_positive(self.raw.get("limit")).unwrap_or(DEFAULT_LIMIT);
        self.options.skip = (page - 1).saturating_mul(limit);
        self.options.limit = Some(limit);
        self
    }

    /// Applies all four steps in their canonical order and resolves the
    /// descriptor.
    #[must_use]
    pub fn shape(self) -> (Filter, FindOptions) {
        self.filter().sort().project().paginate().build()
    }

    /// Resolves the descriptor as accumulated so far.
    #[must_use]
    pub fn build(self) -> (Filter, FindOptions) {
        (self.filter, self.options)
    }
}

/// Builds a [`RawQuery`] from a JSON object, stringifying scalar values the
/// way a query-string layer would deliver them.
///
/// # Errors
/// Returns an error if `json` is not a JSON object.
pub fn raw_query_from_json(json: &str) -> Result<RawQuery, DbError> {
    let map: BTreeMap<String, serde_json::Value> = serde_json::from_str(json)?;
    Ok(map
        .into_iter()
        .map(|(key, value)| {
            let raw = match value {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            (key, raw)
        })
        .collect())
}

/// Interprets one filter entry. The permissive policy lives here alone:
/// unrecognized suffixes pass the whole key through as an equality field, and
/// unknown field names are not checked against any schema.
fn predicate_for(key: &str, value: &str) -> Filter {
    let (path, op) = match key.split_once('[') {
        Some((field, rest)) => match rest.strip_suffix(']') {
            Some("gt") => (field, CmpOp::Gt),
            Some("gte") => (field, CmpOp::Gte),
            Some("lt") => (field, CmpOp::Lt),
            Some("lte") => (field, CmpOp::Lte),
            _ => (key, CmpOp::Eq),
        },
        None => (key, CmpOp::Eq),
    };
    Filter::Cmp { path: path.to_string(), op, value: coerce_value(value) }
}

/// Numeric-looking strings compare as numbers; everything else stays a string.
fn coerce_value(raw: &str) -> Bson {
    if let Ok(int) = raw.parse::<i64>() {
        return Bson::Int64(int);
    }
    if let Ok(float) = raw.parse::<f64>() {
        return Bson::Double(float);
    }
    Bson::String(raw.to_string())
}

fn parse_sort(directive: &str) -> Vec<SortSpec> {
    directive
        .split(',')
        .map(str::trim)
        .filter_map(|entry| match entry.strip_prefix('-') {
            Some(field) if !field.is_empty() => {
                Some(SortSpec { field: field.to_string(), order: Order::Desc })
            }
            None if !entry.is_empty() => {
                Some(SortSpec { field: entry.to_string(), order: Order::Asc })
            }
            _ => None,
        })
        .collect()
}

/// Descending creation time then ascending id keeps pagination deterministic
/// when the caller supplies no sort directive.
fn default_sort() -> Vec<SortSpec> {
    vec![
        SortSpec { field: CREATED_AT_FIELD.to_string(), order: Order::Desc },
        SortSpec { field: ID_FIELD.to_string(), order: Order::Asc },
    ]
}

/// All entries plain -> inclusion list; all entries `-`-prefixed -> exclusion
/// list; mixed or empty -> `None`, which leaves the default in place.
fn parse_projection(directive: &str) -> Option<Projection> {
    let entries: Vec<&str> =
        directive.split(',').map(str::trim).filter(|e| !e.is_empty() && *e != "-").collect();
    if entries.is_empty() {
        return None;
    }
    let excluded = entries.iter().filter(|e| e.starts_with('-')).count();
    if excluded == 0 {
        Some(Projection::Include(entries.iter().map(|e| (*e).to_string()).collect()))
    } else if excluded == entries.len() {
        Some(Projection::Exclude(
            entries.iter().map(|e| e.trim_start_matches('-').trim().to_string()).collect(),
        ))
    } else {
        None
    }
}

fn default_projection() -> Projection {
    Projection::Exclude(vec![REVISION_FIELD.to_string()])
}

fn parse_positive(raw: Option<&String>) -> Option<usize> {
    raw.and_then(|s| s.trim().parse::<usize>().ok()).filter(|n| *n > 0)
}
