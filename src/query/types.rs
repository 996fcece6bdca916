use bson::Bson;
use serde::{Deserialize, Serialize};

/// Envelope sort keys understood in addition to payload paths.
pub const ID_FIELD: &str = "_id";
pub const CREATED_AT_FIELD: &str = "createdAt";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Order {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    pub order: Order,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

/// Predicate tree executed by the collection scan.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    True,
    And(Vec<Filter>),
    Not(Box<Filter>),
    Cmp { path: String, op: CmpOp, value: Bson },
}

impl Filter {
    /// `field != value`, the composable form used by the visibility rewrite.
    #[must_use]
    pub fn ne(path: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::Not(Box::new(Self::Cmp { path: path.into(), op: CmpOp::Eq, value: value.into() }))
    }

    /// Conjoins `self` with `other` without discarding either side.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        match (self, other) {
            (Self::True, f) | (f, Self::True) => f,
            (Self::And(mut v), f) => {
                v.push(f);
                Self::And(v)
            }
            (a, b) => Self::And(vec![a, b]),
        }
    }
}

/// Which payload fields survive into returned documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Projection {
    Include(Vec<String>),
    Exclude(Vec<String>),
}

impl Projection {
    /// An empty exclusion list leaves payloads untouched.
    #[must_use]
    pub fn is_passthrough(&self) -> bool {
        matches!(self, Self::Exclude(fields) if fields.is_empty())
    }
}

impl Default for Projection {
    fn default() -> Self {
        Self::Exclude(Vec::new())
    }
}

/// Fully-resolved read options. Executed exactly as given: sort first, then
/// the skip/limit slice, then projection.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FindOptions {
    pub sort: Vec<SortSpec>,
    pub projection: Projection,
    pub skip: usize,
    pub limit: Option<usize>,
}
