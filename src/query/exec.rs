use std::sync::Arc;

use crate::collection::Collection;
use crate::document::Document;
use crate::types::DocumentId;

use super::cursor::Cursor;
use super::eval::{apply_projection, eval_filter, sort_docs};
use super::types::{Filter, FindOptions, SortSpec};

const MAX_SORT_FIELDS: usize = 8;

/// Executes a resolved descriptor: filter, then sort, then the skip/limit
/// slice, then projection.
///
/// When neither sort nor projection work is needed the result is a lazy
/// cursor over matching ids, avoiding cloning documents that may never be
/// iterated.
pub fn find_docs(col: &Arc<Collection>, filter: &Filter, opts: &FindOptions) -> Cursor {
    if opts.sort.is_empty() && opts.projection.is_passthrough() {
        let mut ids: Vec<DocumentId> = col.list_ids();
        ids.retain(|id| col.find_document(id).is_some_and(|d| eval_filter(&d.data, filter)));
        return Cursor::lazy(col.clone(), slice(ids, opts.skip, opts.limit));
    }

    let mut docs: Vec<Document> = col.get_all_documents();
    docs.retain(|d| eval_filter(&d.data, filter));
    if !opts.sort.is_empty() {
        let specs: Vec<SortSpec> = opts.sort.iter().take(MAX_SORT_FIELDS).cloned().collect();
        sort_docs(&mut docs, &specs);
    }
    let mut page = slice(docs, opts.skip, opts.limit);
    if !opts.projection.is_passthrough() {
        for doc in &mut page {
            doc.data = apply_projection(&doc.data, &opts.projection);
        }
    }
    Cursor::materialized(col.clone(), page)
}

/// First match in stored-id order, unsorted and unprojected.
#[must_use]
pub fn find_one(col: &Arc<Collection>, filter: &Filter) -> Option<Document> {
    col.list_ids()
        .into_iter()
        .find_map(|id| col.find_document(&id).filter(|d| eval_filter(&d.data, filter)))
}

#[must_use]
pub fn count_docs(col: &Arc<Collection>, filter: &Filter) -> usize {
    col.list_ids()
        .into_iter()
        .filter_map(|id| col.find_document(&id))
        .filter(|d| eval_filter(&d.data, filter))
        .count()
}

fn slice<T>(mut items: Vec<T>, skip: usize, limit: Option<usize>) -> Vec<T> {
    if skip >= items.len() {
        return Vec::new();
    }
    let mut rest = items.split_off(skip);
    if let Some(limit) = limit {
        rest.truncate(limit);
    }
    rest
}
