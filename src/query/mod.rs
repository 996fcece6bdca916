// Submodules for separation of concerns
mod builder;
mod cursor;
mod eval;
mod exec;
mod types;

// Public API re-exports
pub use builder::{
    DEFAULT_LIMIT, DEFAULT_PAGE, QueryBuilder, RESERVED_KEYS, RawQuery, raw_query_from_json,
};
pub use cursor::Cursor;
pub use eval::{apply_projection, eval_filter, sort_docs};
pub use exec::{count_docs, find_docs, find_one};
pub use types::{
    CREATED_AT_FIELD, CmpOp, Filter, FindOptions, ID_FIELD, Order, Projection, SortSpec,
};

// Shared internals for the aggregation executor and the lifecycle layer
pub(crate) use eval::{bson_cmp, bson_equal, get_path, to_f64};
