use std::sync::Arc;
use std::time::Instant;

use bson::{Bson, Document as BsonDocument};
use chrono::TimeZone;

use crate::aggregate::{Accumulator, GroupKey, Stage, run_pipeline};
use crate::collection::Collection;
use crate::document::Document;
use crate::errors::DbError;
use crate::observe::{LogObserver, QueryEvent, QueryObserver};
use crate::query::{
    CmpOp, Filter, FindOptions, Order, QueryBuilder, RawQuery, SortSpec, count_docs, eval_filter,
    find_docs, to_f64,
};
use crate::types::DocumentId;

/// Payload fields with lifecycle rules attached.
pub const NAME_FIELD: &str = "name";
pub const SLUG_FIELD: &str = "slug";
pub const PRICE_FIELD: &str = "price";
pub const PRICE_DISCOUNT_FIELD: &str = "priceDiscount";
pub const HIDDEN_FIELD: &str = "hidden";
pub const START_DATES_FIELD: &str = "startDates";

/// Lifecycle-enforcing handle over the tour collection.
///
/// Every read, write, and aggregation against tour records goes through this
/// wrapper. The visibility rule, slug derivation, and the discount check are
/// applied here, never at call sites and never by the store itself, so no
/// caller can forget them.
pub struct Tours {
    collection: Arc<Collection>,
    observer: Arc<dyn QueryObserver>,
}

impl Tours {
    #[must_use]
    pub fn new(collection: Arc<Collection>) -> Self {
        Self { collection, observer: Arc::new(LogObserver) }
    }

    #[must_use]
    pub fn with_observer(collection: Arc<Collection>, observer: Arc<dyn QueryObserver>) -> Self {
        Self { collection, observer }
    }

    #[must_use]
    pub fn collection(&self) -> &Arc<Collection> {
        &self.collection
    }

    /// Persists a new tour. The slug is derived from `name` and the discount
    /// rule is checked before anything is written.
    ///
    /// # Errors
    /// `Validation` if `priceDiscount` is not strictly below `price`; nothing
    /// is persisted in that case.
    pub fn create(&self, mut data: BsonDocument) -> Result<Document, DbError> {
        validate_discount(&data)?;
        if let Some(slug) = derive_slug(&data) {
            data.insert(SLUG_FIELD, slug);
        }
        Ok(self.collection.insert_document(Document::new(data)))
    }

    /// Applies a partial update and returns the stored document. The merged
    /// payload is revalidated and the slug follows any rename.
    ///
    /// # Errors
    /// `NotFound` for unknown ids; `Validation` if the merged payload breaks
    /// the discount rule. The stored document is untouched in both cases.
    pub fn update(&self, id: &DocumentId, patch: BsonDocument) -> Result<Document, DbError> {
        let current =
            self.collection.find_document(id).ok_or_else(|| DbError::NotFound(id.to_string()))?;
        let mut merged = current.data;
        for (key, value) in patch {
            merged.insert(key, value);
        }
        validate_discount(&merged)?;
        if let Some(slug) = derive_slug(&merged) {
            merged.insert(SLUG_FIELD, slug);
        }
        self.collection
            .update_document(id, merged)
            .ok_or_else(|| DbError::NotFound(id.to_string()))
    }

    /// Removes a tour and returns it.
    ///
    /// # Errors
    /// `NotFound` for unknown ids.
    pub fn delete(&self, id: &DocumentId) -> Result<Document, DbError> {
        self.collection.delete_document(id).ok_or_else(|| DbError::NotFound(id.to_string()))
    }

    /// Point lookup. Hidden tours are indistinguishable from absent ones.
    ///
    /// # Errors
    /// `NotFound` for unknown or hidden ids.
    pub fn get(&self, id: &DocumentId) -> Result<Document, DbError> {
        let started = Instant::now();
        let found =
            self.collection.find_document(id).filter(|doc| eval_filter(&doc.data, &visible()));
        self.emit("get", started, usize::from(found.is_some()));
        found.ok_or_else(|| DbError::NotFound(id.to_string()))
    }

    /// Runs a caller query description through the pipeline builder and
    /// returns the materialized page. The visibility predicate is composed
    /// with, not substituted for, whatever the description asked for.
    #[must_use]
    pub fn find(&self, raw: &RawQuery) -> Vec<Document> {
        let (filter, options) = QueryBuilder::new(raw.clone()).shape();
        self.find_shaped(filter, options)
    }

    /// Same read path for callers that already hold a resolved descriptor.
    #[must_use]
    pub fn find_shaped(&self, filter: Filter, options: FindOptions) -> Vec<Document> {
        let constrained = visible().and(filter);
        let started = Instant::now();
        let docs = find_docs(&self.collection, &constrained, &options).to_vec();
        self.emit("find", started, docs.len());
        docs
    }

    /// Number of visible tours matching the description's filter keys.
    #[must_use]
    pub fn count(&self, raw: &RawQuery) -> usize {
        let (filter, _) = QueryBuilder::new(raw.clone()).filter().build();
        count_docs(&self.collection, &visible().and(filter))
    }

    /// Runs an aggregation with the visibility match prepended as the first
    /// stage, so grouping and accumulation only ever see visible records.
    ///
    /// # Errors
    /// Whatever the stage executor rejects (`MalformedQuery`).
    pub fn aggregate(&self, stages: Vec<Stage>) -> Result<Vec<BsonDocument>, DbError> {
        let mut pipeline = Vec::with_capacity(stages.len() + 1);
        pipeline.push(Stage::Match(visible()));
        pipeline.extend(stages);
        let started = Instant::now();
        let rows = run_pipeline(&self.collection, &pipeline)?;
        self.emit("aggregate", started, rows.len());
        Ok(rows)
    }

    /// Per-difficulty rating and price statistics over well-rated tours,
    /// cheapest group first.
    ///
    /// # Errors
    /// Whatever the stage executor rejects.
    pub fn stats(&self) -> Result<Vec<BsonDocument>, DbError> {
        self.aggregate(vec![
            Stage::Match(Filter::Cmp {
                path: "ratingsAverage".into(),
                op: CmpOp::Gte,
                value: Bson::Double(4.5),
            }),
            Stage::Group {
                key: GroupKey::Field("difficulty".into()),
                fields: vec![
                    ("numTours".into(), Accumulator::Count),
                    ("numRatings".into(), Accumulator::Sum("ratingsQuantity".into())),
                    ("avgRating".into(), Accumulator::Avg("ratingsAverage".into())),
                    ("avgPrice".into(), Accumulator::Avg(PRICE_FIELD.into())),
                    ("minPrice".into(), Accumulator::Min(PRICE_FIELD.into())),
                    ("maxPrice".into(), Accumulator::Max(PRICE_FIELD.into())),
                ],
            },
            Stage::Sort(vec![SortSpec { field: "avgPrice".into(), order: Order::Asc }]),
        ])
    }

    /// How many tours start in each month of `year`, busiest months first.
    ///
    /// # Errors
    /// Whatever the stage executor rejects.
    pub fn monthly_plan(&self, year: i32) -> Result<Vec<BsonDocument>, DbError> {
        self.aggregate(vec![
            Stage::Unwind(START_DATES_FIELD.into()),
            Stage::Match(Filter::And(vec![
                Filter::Cmp {
                    path: START_DATES_FIELD.into(),
                    op: CmpOp::Gte,
                    value: Bson::DateTime(year_bound(year, 1, 1)),
                },
                Filter::Cmp {
                    path: START_DATES_FIELD.into(),
                    op: CmpOp::Lte,
                    value: Bson::DateTime(year_bound(year, 12, 31)),
                },
            ])),
            Stage::Group {
                key: GroupKey::Month(START_DATES_FIELD.into()),
                fields: vec![
                    ("numTourStarts".into(), Accumulator::Count),
                    ("tours".into(), Accumulator::Push(NAME_FIELD.into())),
                ],
            },
            Stage::Sort(vec![SortSpec { field: "numTourStarts".into(), order: Order::Desc }]),
            Stage::Limit(6),
        ])
    }

    /// Pre-filled description for the "top 5 tours" listing.
    #[must_use]
    pub fn top_rated_query() -> RawQuery {
        RawQuery::from([
            ("limit".to_string(), "5".to_string()),
            ("sort".to_string(), "-ratingsAverage,price".to_string()),
            ("fields".to_string(), "name,price,ratingsAverage,summary,difficulty".to_string()),
        ])
    }

    fn emit(&self, operation: &'static str, started: Instant, returned: usize) {
        let event = QueryEvent {
            collection: self.collection.name().to_string(),
            operation,
            elapsed: started.elapsed(),
            returned,
        };
        self.observer.query_executed(&event);
    }
}

/// The unconditional read-path constraint: `hidden != true`. A missing
/// `hidden` field counts as visible.
fn visible() -> Filter {
    Filter::ne(HIDDEN_FIELD, true)
}

fn derive_slug(data: &BsonDocument) -> Option<String> {
    match data.get(NAME_FIELD) {
        Some(Bson::String(name)) => Some(slugify(name)),
        _ => None,
    }
}

/// Lower-cases and separator-normalizes a tour name: alphanumeric runs
/// survive, everything between them collapses to a single `-`.
#[must_use]
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_separator = false;
    for c in name.chars() {
        if c.is_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push('-');
            }
            pending_separator = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_separator = true;
        }
    }
    slug
}

/// The one cross-field rule: a discount must undercut the price it discounts.
/// Checked at the moment of write against the full payload.
fn validate_discount(data: &BsonDocument) -> Result<(), DbError> {
    let Some(discount) = data.get(PRICE_DISCOUNT_FIELD).and_then(to_f64) else {
        return Ok(());
    };
    let price = data.get(PRICE_FIELD).and_then(to_f64).unwrap_or(0.0);
    if discount < price {
        Ok(())
    } else {
        Err(DbError::Validation {
            field: PRICE_DISCOUNT_FIELD.to_string(),
            message: format!("discount ({discount}) must be below the regular price ({price})"),
        })
    }
}

fn year_bound(year: i32, month: u32, day: u32) -> bson::DateTime {
    let millis = chrono::Utc
        .with_ymd_and_hms(year, month, day, 0, 0, 0)
        .single()
        .map_or(0, |d| d.timestamp_millis());
    bson::DateTime::from_millis(millis)
}
