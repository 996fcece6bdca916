use std::sync::Arc;

use bson::{Bson, doc};
use parking_lot::Mutex;
use tourstore::Catalog;
use tourstore::errors::DbError;
use tourstore::observe::{QueryEvent, QueryObserver};
use tourstore::query::{Order, Projection, QueryBuilder, RawQuery, SortSpec};
use tourstore::tours::{Tours, slugify};
use tourstore::types::DocumentId;

fn raw(pairs: &[(&str, &str)]) -> RawQuery {
    pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect()
}

#[test]
fn create_derives_the_slug_from_the_name() {
    let tours = Catalog::new().tours();
    let stored = tours.create(doc! {"name": "The Forest Hiker", "price": 397.0}).unwrap();
    assert_eq!(stored.data.get_str("slug").unwrap(), "the-forest-hiker");
}

#[test]
fn slugify_normalizes_separators_and_case() {
    assert_eq!(slugify("The Forest Hiker"), "the-forest-hiker");
    assert_eq!(slugify("Tour & Trek!"), "tour-trek");
    assert_eq!(slugify("  Åre 2030  "), "åre-2030");
}

#[test]
fn renaming_recomputes_the_slug() {
    let tours = Catalog::new().tours();
    let stored = tours.create(doc! {"name": "The Forest Hiker", "price": 397.0}).unwrap();
    let updated = tours.update(&stored.id, doc! {"name": "The Sea Explorer"}).unwrap();
    assert_eq!(updated.data.get_str("slug").unwrap(), "the-sea-explorer");
    assert_eq!(updated.data.get_f64("price").unwrap(), 397.0);
}

#[test]
fn discount_must_be_strictly_below_price() {
    let tours = Catalog::new().tours();

    let err = tours
        .create(doc! {"name": "Overpriced", "price": 100.0, "priceDiscount": 150.0})
        .unwrap_err();
    match err {
        DbError::Validation { field, .. } => assert_eq!(field, "priceDiscount"),
        other => panic!("expected validation failure, got {other:?}"),
    }
    assert_eq!(tours.collection().len(), 0);

    tours.create(doc! {"name": "Fair Deal", "price": 100.0, "priceDiscount": 50.0}).unwrap();
    assert_eq!(tours.collection().len(), 1);
}

#[test]
fn equal_discount_and_price_is_rejected() {
    let tours = Catalog::new().tours();
    let err =
        tours.create(doc! {"name": "Zero Margin", "price": 100.0, "priceDiscount": 100.0});
    assert!(matches!(err, Err(DbError::Validation { .. })));
}

#[test]
fn update_validates_the_merged_payload() {
    let tours = Catalog::new().tours();
    let stored = tours.create(doc! {"name": "Fair Deal", "price": 100.0}).unwrap();

    let err = tours.update(&stored.id, doc! {"priceDiscount": 150.0}).unwrap_err();
    assert!(matches!(err, DbError::Validation { .. }));

    // The stored document is untouched by the failed write.
    let current = tours.get(&stored.id).unwrap();
    assert!(current.data.get("priceDiscount").is_none());

    let updated = tours.update(&stored.id, doc! {"priceDiscount": 60.0}).unwrap();
    assert_eq!(updated.data.get_f64("priceDiscount").unwrap(), 60.0);
}

#[test]
fn point_operations_on_unknown_ids_return_not_found() {
    let tours = Catalog::new().tours();
    let missing = DocumentId::new();
    assert!(matches!(tours.get(&missing), Err(DbError::NotFound(_))));
    assert!(matches!(tours.update(&missing, doc! {"price": 1.0}), Err(DbError::NotFound(_))));
    assert!(matches!(tours.delete(&missing), Err(DbError::NotFound(_))));
}

#[test]
fn hidden_tours_never_escape_read_paths() {
    let tours = Catalog::new().tours();
    tours.create(doc! {"name": "Open A", "price": 100.0}).unwrap();
    tours.create(doc! {"name": "Open B", "price": 200.0, "hidden": false}).unwrap();
    let secret = tours.create(doc! {"name": "Secret", "price": 300.0, "hidden": true}).unwrap();

    let listed = tours.find(&RawQuery::new());
    assert_eq!(listed.len(), 2);
    assert!(listed.iter().all(|d| d.data.get_str("name").unwrap() != "Secret"));

    assert_eq!(tours.count(&RawQuery::new()), 2);
    assert!(matches!(tours.get(&secret.id), Err(DbError::NotFound(_))));

    // Asking for hidden records explicitly does not override the rule.
    assert!(tours.find(&raw(&[("hidden", "true")])).is_empty());

    // The record is still there for the write path.
    assert!(tours.delete(&secret.id).is_ok());
}

#[test]
fn sort_directive_orders_and_breaks_ties() {
    let tours = Catalog::new().tours();
    tours.create(doc! {"name": "Zeta", "price": 10.0}).unwrap();
    tours.create(doc! {"name": "Alpha", "price": 10.0}).unwrap();
    tours.create(doc! {"name": "Mid", "price": 5.0}).unwrap();

    let listed = tours.find(&raw(&[("sort", "-price,name")]));
    let names: Vec<&str> = listed.iter().map(|d| d.data.get_str("name").unwrap()).collect();
    assert_eq!(names, ["Alpha", "Zeta", "Mid"]);
}

#[test]
fn fields_directive_projects_exactly_the_named_fields() {
    let tours = Catalog::new().tours();
    tours.create(doc! {"name": "Trail", "price": 42.0, "summary": "short walk"}).unwrap();

    let listed = tours.find(&raw(&[("fields", "name, price")]));
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].data, doc! {"name": "Trail", "price": 42.0});
}

#[test]
fn default_projection_strips_the_revision_marker() {
    let tours = Catalog::new().tours();
    tours.create(doc! {"name": "Trail", "price": 42.0}).unwrap();

    let listed = tours.find(&RawQuery::new());
    assert!(listed[0].data.get("revision").is_none());
    assert!(listed[0].data.get("name").is_some());
}

#[test]
fn filter_directives_constrain_finds() {
    let tours = Catalog::new().tours();
    tours.create(doc! {"name": "Cheap", "price": 100.0, "difficulty": "easy"}).unwrap();
    tours.create(doc! {"name": "Mid", "price": 800.0, "difficulty": "easy"}).unwrap();
    tours.create(doc! {"name": "Steep", "price": 2000.0, "difficulty": "difficult"}).unwrap();

    let listed = tours.find(&raw(&[("price[lte]", "1500"), ("difficulty", "easy")]));
    assert_eq!(listed.len(), 2);

    let page = tours.find(&raw(&[("page", "2"), ("limit", "2")]));
    assert_eq!(page.len(), 1);
}

#[derive(Default)]
struct CapturingObserver {
    events: Mutex<Vec<QueryEvent>>,
}

impl QueryObserver for CapturingObserver {
    fn query_executed(&self, event: &QueryEvent) {
        self.events.lock().push(event.clone());
    }
}

#[test]
fn observer_receives_one_event_per_read() {
    let catalog = Catalog::new();
    let observer = Arc::new(CapturingObserver::default());
    let tours = catalog.tours_with_observer(observer.clone());
    let stored = tours.create(doc! {"name": "Trail", "price": 42.0}).unwrap();

    tours.find(&RawQuery::new());
    tours.get(&stored.id).unwrap();
    tours.aggregate(Vec::new()).unwrap();

    let events = observer.events.lock();
    let operations: Vec<&str> = events.iter().map(|e| e.operation).collect();
    assert_eq!(operations, ["find", "get", "aggregate"]);
    assert!(events.iter().all(|e| e.collection == "tours"));
    assert_eq!(events[0].returned, 1);
}

#[test]
fn top_rated_query_shapes_as_expected() {
    let (filter, options) = QueryBuilder::new(Tours::top_rated_query()).shape();
    assert_eq!(filter, tourstore::query::Filter::True);
    assert_eq!(options.limit, Some(5));
    assert_eq!(
        options.sort,
        vec![
            SortSpec { field: "ratingsAverage".into(), order: Order::Desc },
            SortSpec { field: "price".into(), order: Order::Asc },
        ]
    );
    assert_eq!(
        options.projection,
        Projection::Include(vec![
            "name".into(),
            "price".into(),
            "ratingsAverage".into(),
            "summary".into(),
            "difficulty".into(),
        ])
    );
}

#[test]
fn top_rated_query_returns_the_best_five() {
    let tours = Catalog::new().tours();
    for i in 0..8 {
        let rating = 4.0 + f64::from(i) / 10.0;
        tours
            .create(doc! {"name": format!("Tour {i}"), "price": 100.0, "ratingsAverage": rating})
            .unwrap();
    }
    let best = tours.find(&Tours::top_rated_query());
    assert_eq!(best.len(), 5);
    assert_eq!(best[0].data.get_f64("ratingsAverage").unwrap(), 4.7);
}

#[test]
fn create_returns_the_stored_envelope() {
    let tours = Catalog::new().tours();
    let stored = tours.create(doc! {"name": "Trail", "price": 42.0}).unwrap();
    assert_eq!(stored.data.get("revision"), Some(&Bson::Int64(0)));
    let fetched = tours.get(&stored.id).unwrap();
    assert_eq!(fetched.id, stored.id);
}
