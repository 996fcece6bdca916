use std::cmp::Ordering;

use bson::{Bson, Document as BsonDocument};

use crate::document::Document;

use super::types::{CmpOp, CREATED_AT_FIELD, Filter, ID_FIELD, Order, Projection, SortSpec};

// Safety limits to bound work on hostile input
const MAX_PATH_DEPTH: usize = 32;
const MAX_PROJECTION_FIELDS: usize = 64;

#[must_use]
pub fn eval_filter(doc: &BsonDocument, filter: &Filter) -> bool {
    match filter {
        Filter::True => true,
        Filter::And(parts) => parts.iter().all(|p| eval_filter(doc, p)),
        Filter::Not(inner) => !eval_filter(doc, inner),
        Filter::Cmp { path, op, value } => match (get_path(doc, path), op) {
            (Some(v), CmpOp::Eq) => bson_equal(v, value),
            (Some(v), CmpOp::Gt) => bson_cmp(v, value) == Some(Ordering::Greater),
            (Some(v), CmpOp::Gte) => bson_cmp(v, value).is_some_and(|o| o != Ordering::Less),
            (Some(v), CmpOp::Lt) => bson_cmp(v, value) == Some(Ordering::Less),
            (Some(v), CmpOp::Lte) => bson_cmp(v, value).is_some_and(|o| o != Ordering::Greater),
            (None, _) => false,
        },
    }
}

/// Applies a resolved projection to one payload.
#[must_use]
pub fn apply_projection(doc: &BsonDocument, projection: &Projection) -> BsonDocument {
    match projection {
        Projection::Include(fields) => {
            let mut out = BsonDocument::new();
            for field in fields.iter().take(MAX_PROJECTION_FIELDS) {
                if let Some(value) = get_path(doc, field) {
                    out.insert(field.clone(), value.clone());
                }
            }
            out
        }
        Projection::Exclude(fields) => {
            let mut out = doc.clone();
            for field in fields {
                out.remove(field);
            }
            out
        }
    }
}

/// Multi-key sort; earlier specs win, later specs break ties.
pub fn sort_docs(docs: &mut [Document], specs: &[SortSpec]) {
    docs.sort_by(|a, b| compare_docs(a, b, specs));
}

fn compare_docs(a: &Document, b: &Document, specs: &[SortSpec]) -> Ordering {
    for spec in specs {
        let ord = compare_field(a, b, &spec.field);
        if ord != Ordering::Equal {
            return if spec.order == Order::Asc { ord } else { ord.reverse() };
        }
    }
    Ordering::Equal
}

/// `_id` and `createdAt` live on the envelope, everything else on the payload.
/// Documents missing the field sort before documents that have it.
fn compare_field(a: &Document, b: &Document, field: &str) -> Ordering {
    match field {
        ID_FIELD => a.id.cmp(&b.id),
        CREATED_AT_FIELD => a.metadata.created_at.cmp(&b.metadata.created_at),
        _ => match (get_path(&a.data, field), get_path(&b.data, field)) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(x), Some(y)) => bson_cmp(x, y).unwrap_or(Ordering::Equal),
        },
    }
}

pub(crate) fn get_path<'a>(doc: &'a BsonDocument, path: &str) -> Option<&'a Bson> {
    let mut iter = path.split('.');
    let first = iter.next()?;
    let mut depth = 1usize;
    let mut cur: Option<&Bson> = doc.get(first);
    for part in iter {
        depth += 1;
        if depth > MAX_PATH_DEPTH {
            return None;
        }
        match cur {
            Some(Bson::Document(d)) => cur = d.get(part),
            _ => return None,
        }
    }
    cur
}

#[allow(clippy::cast_precision_loss)]
pub(crate) fn to_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(i) => Some(f64::from(*i)),
        Bson::Int64(i) => Some(*i as f64),
        Bson::Double(f) => Some(*f),
        _ => None,
    }
}

#[allow(clippy::float_cmp)]
pub(crate) fn bson_equal(a: &Bson, b: &Bson) -> bool {
    if let (Some(x), Some(y)) = (to_f64(a), to_f64(b)) {
        return x == y;
    }
    a == b
}

pub(crate) fn bson_cmp(a: &Bson, b: &Bson) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (to_f64(a), to_f64(b)) {
        return x.partial_cmp(&y);
    }
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => Some(x.cmp(y)),
        (Bson::Boolean(x), Bson::Boolean(y)) => Some(x.cmp(y)),
        (Bson::DateTime(x), Bson::DateTime(y)) => Some(x.cmp(y)),
        _ => None,
    }
}
