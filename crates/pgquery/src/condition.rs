//! Canonical filter conditions.
//!
//! Every accepted filter shorthand is normalized into [`Condition`]s and
//! [`RawFragment`]s held by a [`ConditionGroup`]. A group has two connective
//! buckets: members of the `AND` bucket are joined with `AND`, members of the
//! `OR` bucket with `OR`, and the two buckets are joined with `AND`.

use crate::builder::Statement;
use crate::error::{QueryError, QueryResult};
use crate::value::Value;
use std::fmt;
use std::str::FromStr;

/// Comparison operator of a [`Condition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Lt,
    Gte,
    Lte,
    In,
    NotIn,
    Like,
    NotLike,
    Between,
    NotBetween,
    IsNull,
    IsNotNull,
    /// Right-hand side is raw SQL
    Exp,
}

impl Operator {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "<>",
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::Gte => ">=",
            Operator::Lte => "<=",
            Operator::In => "IN",
            Operator::NotIn => "NOT IN",
            Operator::Like => "LIKE",
            Operator::NotLike => "NOT LIKE",
            Operator::Between => "BETWEEN",
            Operator::NotBetween => "NOT BETWEEN",
            Operator::IsNull => "IS NULL",
            Operator::IsNotNull => "IS NOT NULL",
            Operator::Exp => "EXP",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for Operator {
    type Err = QueryError;

    /// Case-insensitive; inner whitespace is collapsed (`not   in` == `NOT IN`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm = s
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_ascii_uppercase();
        let op = match norm.as_str() {
            "=" | "EQ" => Operator::Eq,
            "<>" | "!=" | "NEQ" => Operator::Ne,
            ">" | "GT" => Operator::Gt,
            "<" | "LT" => Operator::Lt,
            ">=" | "EGT" | "GTE" => Operator::Gte,
            "<=" | "ELT" | "LTE" => Operator::Lte,
            "IN" => Operator::In,
            "NOT IN" => Operator::NotIn,
            "LIKE" => Operator::Like,
            "NOT LIKE" => Operator::NotLike,
            "BETWEEN" => Operator::Between,
            "NOT BETWEEN" => Operator::NotBetween,
            "NULL" | "IS NULL" => Operator::IsNull,
            "NOT NULL" | "IS NOT NULL" => Operator::IsNotNull,
            "EXP" => Operator::Exp,
            _ => {
                return Err(QueryError::invalid_input(format!(
                    "unsupported operator '{}'",
                    s
                )));
            }
        };
        Ok(op)
    }
}

/// Right-hand side of a [`Condition`].
#[derive(Debug, Clone)]
pub enum Operand {
    None,
    Value(Value),
    /// Another column reference (used by join predicates)
    Column(String),
    SubQuery(Box<Statement>),
    Raw(String),
}

impl From<Value> for Operand {
    fn from(v: Value) -> Self {
        Operand::Value(v)
    }
}

impl From<Statement> for Operand {
    fn from(s: Statement) -> Self {
        Operand::SubQuery(Box::new(s))
    }
}

/// `(column, operator, operand)`
#[derive(Debug, Clone)]
pub struct Condition {
    pub column: String,
    pub op: Operator,
    pub operand: Operand,
}

impl Condition {
    /// Build a validated condition.
    ///
    /// `IN`/`BETWEEN` accept a comma-joined string in place of a list, and
    /// `EXP` accepts text as its raw right-hand side.
    pub fn new(column: impl Into<String>, op: Operator, operand: Operand) -> QueryResult<Self> {
        let column = column.into();
        if column.trim().is_empty() {
            return Err(QueryError::invalid_input("condition column must not be empty"));
        }
        let operand = normalize_operand(&column, op, operand)?;
        Ok(Self {
            column,
            op,
            operand,
        })
    }

    /// `column = value`, or `column IN (...)` when the value is a list.
    pub fn matching(column: impl Into<String>, value: impl Into<Value>) -> Self {
        let value = value.into();
        let op = if value.is_list() {
            Operator::In
        } else {
            Operator::Eq
        };
        Self {
            column: column.into(),
            op,
            operand: Operand::Value(value),
        }
    }

    /// `left = right` over two column references.
    pub fn columns_eq(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self {
            column: left.into(),
            op: Operator::Eq,
            operand: Operand::Column(right.into()),
        }
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            op: Operator::IsNull,
            operand: Operand::None,
        }
    }
}

fn normalize_operand(column: &str, op: Operator, operand: Operand) -> QueryResult<Operand> {
    let bad = |what: &str| {
        QueryError::invalid_input(format!("'{}' {} expects {}", column, op, what))
    };
    match op {
        Operator::IsNull | Operator::IsNotNull => Ok(Operand::None),
        Operator::In | Operator::NotIn => match operand {
            Operand::Value(Value::Text(s)) => Ok(Operand::Value(Value::split_comma(&s))),
            Operand::Value(v @ Value::List(_)) => Ok(Operand::Value(v)),
            Operand::Value(Value::Null) | Operand::None => Err(bad("a list")),
            Operand::Value(v) => Ok(Operand::Value(Value::List(vec![v]))),
            other => Ok(other),
        },
        Operator::Between | Operator::NotBetween => {
            let list = match operand {
                Operand::Value(Value::Text(s)) => Value::split_comma(&s),
                Operand::Value(v) => v,
                _ => return Err(bad("two values")),
            };
            match list {
                Value::List(items) if items.len() == 2 => Ok(Operand::Value(Value::List(items))),
                _ => Err(bad("two values")),
            }
        }
        Operator::Exp => match operand {
            Operand::Value(Value::Text(s)) | Operand::Raw(s) => Ok(Operand::Raw(s)),
            _ => Err(bad("a raw SQL expression")),
        },
        _ => match operand {
            Operand::Value(Value::List(_)) => Err(bad("a single value")),
            Operand::None => Err(bad("a value")),
            other => Ok(other),
        },
    }
}

/// Pre-formatted SQL with its own positional (`?`) binds.
///
/// The SQL may also reference explicitly bound names as `:name`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFragment {
    pub sql: String,
    pub binds: Vec<Value>,
}

impl RawFragment {
    pub fn new(sql: impl Into<String>, binds: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            binds,
        }
    }

    /// Lists become one bind per item, `Null` means no binds.
    pub fn with_value(sql: impl Into<String>, value: Value) -> Self {
        let binds = match value {
            Value::Null => Vec::new(),
            Value::List(items) => items,
            v => vec![v],
        };
        Self::new(sql, binds)
    }
}

/// Connective of a [`ConditionGroup`] bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Logic {
    And,
    Or,
}

impl Logic {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Logic::And => "AND",
            Logic::Or => "OR",
        }
    }
}

impl FromStr for Logic {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AND" => Ok(Logic::And),
            "OR" => Ok(Logic::Or),
            _ => Err(QueryError::invalid_input(format!("unknown logic '{}'", s))),
        }
    }
}

#[derive(Debug, Clone)]
pub enum ConditionNode {
    Condition(Condition),
    Raw(RawFragment),
    Group(ConditionGroup),
}

#[derive(Debug, Clone)]
pub(crate) struct Entry {
    pub(crate) key: Option<String>,
    pub(crate) node: ConditionNode,
}

/// AND/OR buckets of conditions, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct ConditionGroup {
    and: Vec<Entry>,
    or: Vec<Entry>,
}

impl ConditionGroup {
    pub fn new() -> Self {
        Self::default()
    }

    fn bucket_mut(&mut self, logic: Logic) -> &mut Vec<Entry> {
        match logic {
            Logic::And => &mut self.and,
            Logic::Or => &mut self.or,
        }
    }

    pub(crate) fn entries(&self, logic: Logic) -> &[Entry] {
        match logic {
            Logic::And => &self.and,
            Logic::Or => &self.or,
        }
    }

    /// Append a node. A key already present in the bucket is not repeated:
    /// the new node is appended unkeyed instead of overwriting.
    pub fn push(&mut self, logic: Logic, key: Option<String>, node: ConditionNode) {
        let bucket = self.bucket_mut(logic);
        let key = key.filter(|k| !bucket.iter().any(|e| e.key.as_deref() == Some(k.as_str())));
        bucket.push(Entry { key, node });
    }

    /// Insert a node under `key`, replacing the existing keyed node if any.
    pub fn replace(&mut self, logic: Logic, key: impl Into<String>, node: ConditionNode) {
        let key = key.into();
        let bucket = self.bucket_mut(logic);
        match bucket.iter_mut().find(|e| e.key.as_deref() == Some(key.as_str())) {
            Some(entry) => entry.node = node,
            None => bucket.push(Entry {
                key: Some(key),
                node,
            }),
        }
    }

    /// Drop every node for `field`: the node keyed by it and any plain
    /// condition on that column. Raw fragments and nested groups are kept.
    /// Returns whether anything was removed.
    pub fn remove_field(&mut self, logic: Logic, field: &str) -> bool {
        let bucket = self.bucket_mut(logic);
        let before = bucket.len();
        bucket.retain(|e| {
            let on_field = match &e.node {
                ConditionNode::Condition(c) => c.column == field,
                _ => false,
            };
            e.key.as_deref() != Some(field) && !on_field
        });
        before != bucket.len()
    }

    pub fn nodes(&self, logic: Logic) -> impl Iterator<Item = &ConditionNode> {
        self.entries(logic).iter().map(|e| &e.node)
    }

    pub fn len(&self) -> usize {
        self.and.len() + self.or.len()
    }

    pub fn is_empty(&self) -> bool {
        self.and.is_empty() && self.or.is_empty()
    }
}
