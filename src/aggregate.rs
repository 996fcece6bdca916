use std::cmp::Ordering;
use std::sync::Arc;

use bson::{Bson, Document as BsonDocument};
use chrono::Datelike;

use crate::collection::Collection;
use crate::errors::DbError;
use crate::query::{Filter, Order, SortSpec, bson_cmp, bson_equal, eval_filter, get_path, to_f64};

/// Group identity for a [`Stage::Group`].
#[derive(Debug, Clone)]
pub enum GroupKey {
    /// Single bucket for the whole input.
    Null,
    Field(String),
    /// Calendar month (1-12) extracted from a datetime field.
    Month(String),
}

#[derive(Debug, Clone)]
pub enum Accumulator {
    Count,
    Sum(String),
    Avg(String),
    Min(String),
    Max(String),
    Push(String),
}

/// One step of an aggregation stage sequence. Stages run in the order given;
/// the caller is responsible for an order that makes sense.
#[derive(Debug, Clone)]
pub enum Stage {
    Match(Filter),
    /// Fans a row out once per element of the named array field. Rows where
    /// the field is a non-array pass through unchanged; rows missing the
    /// field are dropped.
    Unwind(String),
    Group { key: GroupKey, fields: Vec<(String, Accumulator)> },
    Sort(Vec<SortSpec>),
    Limit(usize),
}

/// Executes a stage sequence over the collection's current payloads and
/// returns the materialized result rows.
///
/// # Errors
/// Returns `MalformedQuery` if a group stage binds an output field named
/// `_id` (reserved for the group key).
pub fn run_pipeline(col: &Arc<Collection>, stages: &[Stage]) -> Result<Vec<BsonDocument>, DbError> {
    let mut rows: Vec<BsonDocument> = col.get_all_documents().into_iter().map(|d| d.data).collect();
    for stage in stages {
        rows = apply_stage(rows, stage)?;
    }
    Ok(rows)
}

fn apply_stage(rows: Vec<BsonDocument>, stage: &Stage) -> Result<Vec<BsonDocument>, DbError> {
    Ok(match stage {
        Stage::Match(filter) => rows.into_iter().filter(|row| eval_filter(row, filter)).collect(),
        Stage::Unwind(path) => unwind(rows, path),
        Stage::Group { key, fields } => group(&rows, key, fields)?,
        Stage::Sort(specs) => {
            let mut rows = rows;
            sort_rows(&mut rows, specs);
            rows
        }
        Stage::Limit(n) => {
            let mut rows = rows;
            rows.truncate(*n);
            rows
        }
    })
}

fn unwind(rows: Vec<BsonDocument>, path: &str) -> Vec<BsonDocument> {
    let mut out = Vec::new();
    for row in rows {
        match row.get(path) {
            Some(Bson::Array(items)) => {
                for item in items.clone() {
                    let mut copy = row.clone();
                    copy.insert(path.to_string(), item);
                    out.push(copy);
                }
            }
            Some(_) => out.push(row),
            None => {}
        }
    }
    out
}

fn group(
    rows: &[BsonDocument],
    key: &GroupKey,
    fields: &[(String, Accumulator)],
) -> Result<Vec<BsonDocument>, DbError> {
    if fields.iter().any(|(name, _)| name == "_id") {
        return Err(DbError::MalformedQuery(
            "group stage may not bind an output field named _id".into(),
        ));
    }
    // Buckets keep first-appearance order so downstream stages see stable input.
    let mut buckets: Vec<(Bson, Vec<AccState>)> = Vec::new();
    for row in rows {
        let key_value = group_key_value(row, key);
        let idx = match buckets.iter().position(|(existing, _)| bson_equal(existing, &key_value)) {
            Some(i) => i,
            None => {
                buckets.push((key_value, fields.iter().map(|(_, a)| AccState::new(a)).collect()));
                buckets.len() - 1
            }
        };
        for ((_, accumulator), state) in fields.iter().zip(buckets[idx].1.iter_mut()) {
            state.fold(accumulator, row);
        }
    }
    Ok(buckets
        .into_iter()
        .map(|(key_value, states)| {
            let mut out = BsonDocument::new();
            out.insert("_id", key_value);
            for ((name, _), state) in fields.iter().zip(states) {
                out.insert(name.clone(), state.finish());
            }
            out
        })
        .collect())
}

fn group_key_value(row: &BsonDocument, key: &GroupKey) -> Bson {
    match key {
        GroupKey::Null => Bson::Null,
        GroupKey::Field(path) => get_path(row, path).cloned().unwrap_or(Bson::Null),
        GroupKey::Month(path) => match get_path(row, path) {
            Some(Bson::DateTime(dt)) => month_of(*dt),
            _ => Bson::Null,
        },
    }
}

#[allow(clippy::cast_possible_wrap)]
fn month_of(dt: bson::DateTime) -> Bson {
    chrono::DateTime::from_timestamp_millis(dt.timestamp_millis())
        .map_or(Bson::Null, |d| Bson::Int32(d.month() as i32))
}

fn sort_rows(rows: &mut [BsonDocument], specs: &[SortSpec]) {
    rows.sort_by(|a, b| {
        for spec in specs {
            let ord = match (get_path(a, &spec.field), get_path(b, &spec.field)) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (Some(x), Some(y)) => bson_cmp(x, y).unwrap_or(Ordering::Equal),
            };
            if ord != Ordering::Equal {
                return if spec.order == Order::Asc { ord } else { ord.reverse() };
            }
        }
        Ordering::Equal
    });
}

/// Running state for one accumulator within one bucket.
enum AccState {
    Count(u64),
    Sum(f64),
    Avg { sum: f64, count: u64 },
    Min(Option<Bson>),
    Max(Option<Bson>),
    Push(Vec<Bson>),
}

impl AccState {
    fn new(accumulator: &Accumulator) -> Self {
        match accumulator {
            Accumulator::Count => Self::Count(0),
            Accumulator::Sum(_) => Self::Sum(0.0),
            Accumulator::Avg(_) => Self::Avg { sum: 0.0, count: 0 },
            Accumulator::Min(_) => Self::Min(None),
            Accumulator::Max(_) => Self::Max(None),
            Accumulator::Push(_) => Self::Push(Vec::new()),
        }
    }

    /// Non-numeric or missing values are skipped, as a document store's
    /// accumulators do.
    fn fold(&mut self, accumulator: &Accumulator, row: &BsonDocument) {
        match (self, accumulator) {
            (Self::Count(n), Accumulator::Count) => *n += 1,
            (Self::Sum(total), Accumulator::Sum(path)) => {
                if let Some(v) = get_path(row, path).and_then(to_f64) {
                    *total += v;
                }
            }
            (Self::Avg { sum, count }, Accumulator::Avg(path)) => {
                if let Some(v) = get_path(row, path).and_then(to_f64) {
                    *sum += v;
                    *count += 1;
                }
            }
            (Self::Min(current), Accumulator::Min(path)) => {
                if let Some(v) = get_path(row, path) {
                    let replace =
                        current.as_ref().is_none_or(|c| bson_cmp(v, c) == Some(Ordering::Less));
                    if replace {
                        *current = Some(v.clone());
                    }
                }
            }
            (Self::Max(current), Accumulator::Max(path)) => {
                if let Some(v) = get_path(row, path) {
                    let replace =
                        current.as_ref().is_none_or(|c| bson_cmp(v, c) == Some(Ordering::Greater));
                    if replace {
                        *current = Some(v.clone());
                    }
                }
            }
            (Self::Push(items), Accumulator::Push(path)) => {
                if let Some(v) = get_path(row, path) {
                    items.push(v.clone());
                }
            }
            _ => {}
        }
    }

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_wrap)]
    fn finish(self) -> Bson {
        match self {
            Self::Count(n) => Bson::Int64(n as i64),
            Self::Sum(total) => Bson::Double(total),
            Self::Avg { sum, count } => {
                if count == 0 {
                    Bson::Null
                } else {
                    Bson::Double(sum / count as f64)
                }
            }
            Self::Min(value) | Self::Max(value) => value.unwrap_or(Bson::Null),
            Self::Push(items) => Bson::Array(items),
        }
    }
}
