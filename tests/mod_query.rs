use std::sync::Arc;

use bson::{Bson, doc};
use tourstore::collection::Collection;
use tourstore::document::Document;
use tourstore::query::{
    CmpOp, Filter, FindOptions, Order, Projection, SortSpec, count_docs, eval_filter, find_docs,
    find_one,
};

fn seeded() -> Arc<Collection> {
    let col = Arc::new(Collection::new("people".into()));
    col.insert_document(Document::new(doc! {"age": 30, "name": "alice"}));
    col.insert_document(Document::new(doc! {"age": 40, "name": "bob"}));
    col.insert_document(Document::new(doc! {"age": 35, "name": "carol"}));
    col
}

fn cmp(path: &str, op: CmpOp, value: impl Into<Bson>) -> Filter {
    Filter::Cmp { path: path.into(), op, value: value.into() }
}

#[test]
fn eval_filter_compares_and_negates() {
    let doc = doc! {"age": 30, "name": "alice"};
    assert!(eval_filter(&doc, &cmp("age", CmpOp::Eq, 30)));
    assert!(eval_filter(&doc, &cmp("age", CmpOp::Lte, 30)));
    assert!(!eval_filter(&doc, &cmp("age", CmpOp::Gt, 45)));
    assert!(eval_filter(&doc, &Filter::Not(Box::new(cmp("age", CmpOp::Gt, 45)))));
    assert!(eval_filter(
        &doc,
        &Filter::And(vec![cmp("age", CmpOp::Gte, 30), cmp("name", CmpOp::Eq, "alice")])
    ));
}

#[test]
fn missing_fields_never_match_comparisons() {
    let doc = doc! {"age": 30};
    assert!(!eval_filter(&doc, &cmp("price", CmpOp::Eq, 30)));
    assert!(!eval_filter(&doc, &cmp("price", CmpOp::Lt, 30)));
    // ...which makes the negated form true.
    assert!(eval_filter(&doc, &Filter::ne("price", 30)));
}

#[test]
fn numeric_comparisons_widen_across_bson_types() {
    let doc = doc! {"price": 100_i32};
    assert!(eval_filter(&doc, &cmp("price", CmpOp::Eq, Bson::Double(100.0))));
    assert!(eval_filter(&doc, &cmp("price", CmpOp::Lt, Bson::Int64(200))));
}

#[test]
fn find_filters_sorts_projects_and_limits() {
    let col = seeded();
    let filter = cmp("age", CmpOp::Gt, 30);
    let opts = FindOptions {
        sort: vec![SortSpec { field: "age".into(), order: Order::Desc }],
        projection: Projection::Include(vec!["name".into()]),
        skip: 0,
        limit: Some(2),
    };
    let docs = find_docs(&col, &filter, &opts).to_vec();
    assert_eq!(docs.len(), 2);
    assert_eq!(docs[0].data, doc! {"name": "bob"});
    assert_eq!(docs[1].data, doc! {"name": "carol"});
}

#[test]
fn skip_past_the_end_yields_nothing() {
    let col = seeded();
    let opts = FindOptions { skip: 10, ..FindOptions::default() };
    assert!(find_docs(&col, &Filter::True, &opts).to_vec().is_empty());
}

#[test]
fn lazy_path_slices_without_materializing() {
    let col = seeded();
    let opts = FindOptions { skip: 1, limit: Some(1), ..FindOptions::default() };
    let docs = find_docs(&col, &Filter::True, &opts).to_vec();
    assert_eq!(docs.len(), 1);
}

#[test]
fn cursor_iterates_forward_only() {
    let col = seeded();
    let mut seen = 0;
    for doc in find_docs(&col, &Filter::True, &FindOptions::default()) {
        assert!(doc.data.get("age").is_some());
        seen += 1;
    }
    assert_eq!(seen, 3);
}

#[test]
fn exclusion_projection_removes_only_named_fields() {
    let col = seeded();
    let opts = FindOptions {
        projection: Projection::Exclude(vec!["age".into(), "revision".into()]),
        ..FindOptions::default()
    };
    for doc in find_docs(&col, &Filter::True, &opts).to_vec() {
        assert!(doc.data.get("age").is_none());
        assert!(doc.data.get("revision").is_none());
        assert!(doc.data.get("name").is_some());
    }
}

#[test]
fn documents_missing_the_sort_field_come_first() {
    let col = Arc::new(Collection::new("people".into()));
    col.insert_document(Document::new(doc! {"name": "unpriced"}));
    col.insert_document(Document::new(doc! {"name": "priced", "price": 10}));
    let opts = FindOptions {
        sort: vec![SortSpec { field: "price".into(), order: Order::Asc }],
        ..FindOptions::default()
    };
    let docs = find_docs(&col, &Filter::True, &opts).to_vec();
    assert_eq!(docs[0].data.get_str("name").unwrap(), "unpriced");
}

#[test]
fn find_one_and_count() {
    let col = seeded();
    let found = find_one(&col, &cmp("name", CmpOp::Eq, "carol")).expect("carol exists");
    assert_eq!(found.data.get("age"), Some(&Bson::Int32(35)));
    assert!(find_one(&col, &cmp("name", CmpOp::Eq, "dave")).is_none());
    assert_eq!(count_docs(&col, &cmp("age", CmpOp::Gte, 35)), 2);
    assert_eq!(count_docs(&col, &Filter::True), 3);
}
