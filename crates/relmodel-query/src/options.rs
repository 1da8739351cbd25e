//! Per-call query options.
//!
//! Every tunable that affects a read lives here: filters, paging, ordering,
//! relation depth, projection and timeout. Nothing is read from globals.

use relmodel_core::Value;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Relation depth used by [`Options::default`].
pub const DEFAULT_RELATION_DEPTH: u32 = 1;

/// Timeout used by [`Options::default`].
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// Predicates
// ============================================================================

/// Comparison operator of a [`Cond::Op`] predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `!=`
    Ne,
    /// `col & ? != 0`
    BitAnd,
    /// `col & ? = ?`
    BitAndExact,
}

/// Value side of one predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cond {
    /// NULL renders `IS NULL`, text renders a substring `LIKE`, anything
    /// else renders `=`.
    Value(Value),
    /// Exact text match (`=` instead of `LIKE`).
    StrictText(String),
    /// Operator-wrapped comparison.
    Op { op: Operator, value: Value },
    /// `IN (...)` for a single column, or one tuple per group of values for
    /// comma-separated keys (`"a,b"`).
    List(Vec<Value>),
}

impl Cond {
    pub fn eq(value: impl Into<Value>) -> Self {
        Cond::Value(value.into())
    }

    pub fn strict(text: impl Into<String>) -> Self {
        Cond::StrictText(text.into())
    }

    pub fn op(op: Operator, value: impl Into<Value>) -> Self {
        Cond::Op {
            op,
            value: value.into(),
        }
    }

    pub fn gt(value: impl Into<Value>) -> Self {
        Self::op(Operator::Gt, value)
    }

    pub fn ge(value: impl Into<Value>) -> Self {
        Self::op(Operator::Ge, value)
    }

    pub fn lt(value: impl Into<Value>) -> Self {
        Self::op(Operator::Lt, value)
    }

    pub fn le(value: impl Into<Value>) -> Self {
        Self::op(Operator::Le, value)
    }

    pub fn ne(value: impl Into<Value>) -> Self {
        Self::op(Operator::Ne, value)
    }

    /// Any of the given bits set.
    pub fn bit_and(mask: impl Into<Value>) -> Self {
        Self::op(Operator::BitAnd, mask)
    }

    /// Exactly the given bits set, within the mask.
    pub fn bit_and_exact(mask: impl Into<Value>) -> Self {
        Self::op(Operator::BitAndExact, mask)
    }

    pub fn list<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Cond::List(values.into_iter().map(Into::into).collect())
    }
}

macro_rules! cond_from {
    ($($t:ty),* $(,)?) => {
        $(
            impl From<$t> for Cond {
                fn from(v: $t) -> Self {
                    Cond::Value(Value::from(v))
                }
            }
        )*
    };
}

cond_from!(i64, i32, u32, bool, f64, String, &str);

impl From<Value> for Cond {
    fn from(v: Value) -> Self {
        Cond::Value(v)
    }
}

impl From<Vec<Value>> for Cond {
    fn from(v: Vec<Value>) -> Self {
        Cond::List(v)
    }
}

/// Ordered set of predicates, keyed by column name.
///
/// A key may list several columns separated by commas when its condition is
/// a [`Cond::List`] of tuples.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Where {
    entries: Vec<(String, Cond)>,
}

impl Where {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a predicate, replacing an earlier one on the same key.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, cond: impl Into<Cond>) -> Self {
        self.insert(key, cond);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, cond: impl Into<Cond>) {
        let key = key.into();
        let cond = cond.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = cond,
            None => self.entries.push((key, cond)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Cond)> {
        self.entries.iter().map(|(k, c)| (k.as_str(), c))
    }
}

impl<K: Into<String>, C: Into<Cond>> FromIterator<(K, C)> for Where {
    fn from_iter<I: IntoIterator<Item = (K, C)>>(iter: I) -> Self {
        let mut filter = Where::new();
        for (k, c) in iter {
            filter.insert(k, c);
        }
        filter
    }
}

/// Glue between predicates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Divider {
    #[default]
    And,
    Or,
}

impl Divider {
    pub const fn as_sql(self) -> &'static str {
        match self {
            Divider::And => " AND ",
            Divider::Or => " OR ",
        }
    }
}

/// Ordering rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    /// `asc` or `desc`, case-insensitive. Empty means ascending.
    #[serde(default)]
    pub order: String,
}

impl OrderBy {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: "asc".to_string(),
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: "desc".to_string(),
        }
    }
}

/// Restrict results to records linked to the given targets through a
/// relation field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedFilter {
    /// Rust name of the relation field.
    pub field: String,
    /// Target primary key values, flattened for composite keys.
    pub keys: Vec<Value>,
}

// ============================================================================
// Options
// ============================================================================

/// Query options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    #[serde(rename = "where")]
    pub filter: Where,
    /// Required when there is more than one predicate.
    pub divider: Option<Divider>,
    /// 0 means no limit.
    pub limit: u64,
    /// Only applied together with a limit.
    pub offset: u64,
    pub order_by: Option<OrderBy>,
    /// Relation hops to load. 0 disables relation loading.
    pub relation_depth: u32,
    /// Column allow-list. Primary key columns are always selected. Empty
    /// selects every column.
    pub columns: Vec<String>,
    pub related: Vec<RelatedFilter>,
    /// Per-call timeout, applied on top of the caller's `Cx`.
    pub timeout: Option<Duration>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            filter: Where::new(),
            divider: Some(Divider::And),
            limit: 0,
            offset: 0,
            order_by: None,
            relation_depth: DEFAULT_RELATION_DEPTH,
            columns: Vec::new(),
            related: Vec::new(),
            timeout: Some(DEFAULT_TIMEOUT),
        }
    }
}

impl Options {
    /// Options with nothing set: no divider, no relation loading, no timeout.
    pub fn bare() -> Self {
        Self {
            divider: None,
            relation_depth: 0,
            timeout: None,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_where(mut self, filter: Where) -> Self {
        self.filter = filter;
        self
    }

    #[must_use]
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    /// Set the offset. Ignored unless a positive limit is already set.
    #[must_use]
    pub fn with_offset(mut self, offset: u64) -> Self {
        if self.limit != 0 {
            self.offset = offset;
        }
        self
    }

    #[must_use]
    pub fn with_order(mut self, order: OrderBy) -> Self {
        self.order_by = Some(order);
        self
    }

    #[must_use]
    pub fn with_depth(mut self, depth: u32) -> Self {
        self.relation_depth = depth;
        self
    }

    #[must_use]
    pub fn with_divider(mut self, divider: Divider) -> Self {
        self.divider = Some(divider);
        self
    }

    #[must_use]
    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Keep only records linked to `keys` through relation `field`.
    #[must_use]
    pub fn related_to<I, V>(mut self, field: impl Into<String>, keys: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.related.push(RelatedFilter {
            field: field.into(),
            keys: keys.into_iter().map(Into::into).collect(),
        });
        self
    }
}
