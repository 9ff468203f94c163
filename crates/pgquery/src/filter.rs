//! Filter shorthands and their normalization into a [`ConditionGroup`].
//!
//! ```ignore
//! use pgquery::{FilterInput, Logic};
//!
//! // all three normalize to `status = ?`
//! q.where_(FilterInput::map([("status", 1)]))?;
//! q.where_(("status", 1))?;
//! q.where_op("status", "=", 1)?;
//! ```

use crate::condition::{Condition, ConditionGroup, ConditionNode, Logic, Operand, Operator, RawFragment};
use crate::error::{QueryError, QueryResult};
use crate::value::Value;

/// A deferred predicate. It receives a fresh group and is invoked exactly once.
pub type Predicate = Box<dyn FnOnce(&mut ConditionGroup) -> QueryResult<()> + Send>;

/// Every accepted filter shape.
pub enum FilterInput {
    /// column -> value; lists become `IN`, everything else `=`
    Map(Vec<(String, Value)>),
    /// Pre-built conditions, merged positionally
    Triples(Vec<Condition>),
    Pair(String, Value),
    Triple(String, Operator, Operand),
    Predicate(Predicate),
    Raw(RawFragment),
}

impl std::fmt::Debug for FilterInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterInput::Map(m) => f.debug_tuple("Map").field(m).finish(),
            FilterInput::Triples(t) => f.debug_tuple("Triples").field(t).finish(),
            FilterInput::Pair(k, v) => f.debug_tuple("Pair").field(k).field(v).finish(),
            FilterInput::Triple(k, op, v) => {
                f.debug_tuple("Triple").field(k).field(op).field(v).finish()
            }
            FilterInput::Predicate(_) => f.write_str("Predicate(..)"),
            FilterInput::Raw(r) => f.debug_tuple("Raw").field(r).finish(),
        }
    }
}

/// True when a filter key looks like a SQL expression rather than a column.
///
/// This is purely lexical: any `<`, `>` or `=` routes the key to raw SQL. A
/// column name containing one of those characters is misclassified.
pub fn looks_like_expression(field: &str) -> bool {
    field.contains(['<', '>', '='])
}

impl FilterInput {
    pub fn map<K, V, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        FilterInput::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// `(field, value)`. A field that looks like an expression
    /// (`"age > ?"`) becomes a raw fragment with `value` as its binds.
    pub fn field(field: impl Into<String>, value: impl Into<Value>) -> Self {
        let field = field.into();
        let value = value.into();
        if looks_like_expression(&field) {
            FilterInput::Raw(RawFragment::with_value(field, value))
        } else {
            FilterInput::Pair(field, value)
        }
    }

    /// `(field, operator, value)` with the operator given as text.
    pub fn op(field: impl Into<String>, op: &str, value: impl Into<Value>) -> QueryResult<Self> {
        Ok(FilterInput::Triple(
            field.into(),
            op.parse()?,
            Operand::Value(value.into()),
        ))
    }

    pub fn triple(field: impl Into<String>, op: Operator, operand: Operand) -> Self {
        FilterInput::Triple(field.into(), op, operand)
    }

    pub fn predicate<F>(f: F) -> Self
    where
        F: FnOnce(&mut ConditionGroup) -> QueryResult<()> + Send + 'static,
    {
        FilterInput::Predicate(Box::new(f))
    }

    pub fn raw(sql: impl Into<String>, binds: Vec<Value>) -> Self {
        FilterInput::Raw(RawFragment::new(sql, binds))
    }

    /// Interpret loosely-typed JSON input.
    ///
    /// - object: column -> value map
    /// - array of arrays: each `[field, value]` or `[field, op, value]`
    /// - array starting with a string: a single pair or triple
    /// - string: raw SQL without binds
    pub fn from_json(input: &serde_json::Value) -> QueryResult<Self> {
        use serde_json::Value as J;
        match input {
            J::Object(map) => Ok(FilterInput::map(
                map.iter().map(|(k, v)| (k.clone(), Value::from(v.clone()))),
            )),
            J::String(sql) => Ok(FilterInput::raw(sql.clone(), Vec::new())),
            J::Array(items) => match items.first() {
                None => Ok(FilterInput::Triples(Vec::new())),
                Some(J::String(_)) => single_from_json(items),
                Some(J::Array(_)) => {
                    let mut conditions = Vec::with_capacity(items.len());
                    for item in items {
                        let J::Array(parts) = item else {
                            return Err(shape_error(item));
                        };
                        conditions.push(condition_from_json(parts)?);
                    }
                    Ok(FilterInput::Triples(conditions))
                }
                Some(_) => Err(shape_error(input)),
            },
            _ => Err(shape_error(input)),
        }
    }
}

fn shape_error(input: &serde_json::Value) -> QueryError {
    QueryError::invalid_input(format!("unsupported filter shape: {}", input))
}

fn single_from_json(parts: &[serde_json::Value]) -> QueryResult<FilterInput> {
    match parts {
        [serde_json::Value::String(field), value] => {
            Ok(FilterInput::field(field.clone(), Value::from(value.clone())))
        }
        [serde_json::Value::String(field), serde_json::Value::String(op), value] => {
            FilterInput::op(field.clone(), op, Value::from(value.clone()))
        }
        _ => Err(shape_error(&serde_json::Value::Array(parts.to_vec()))),
    }
}

fn condition_from_json(parts: &[serde_json::Value]) -> QueryResult<Condition> {
    match single_from_json(parts)? {
        FilterInput::Pair(field, value) => Ok(Condition::matching(field, value)),
        FilterInput::Triple(field, op, operand) => Condition::new(field, op, operand),
        _ => Err(shape_error(&serde_json::Value::Array(parts.to_vec()))),
    }
}

impl<K: Into<String>, V: Into<Value>> From<(K, V)> for FilterInput {
    fn from((field, value): (K, V)) -> Self {
        FilterInput::field(field, value)
    }
}

impl From<Condition> for FilterInput {
    fn from(c: Condition) -> Self {
        FilterInput::Triples(vec![c])
    }
}

impl From<RawFragment> for FilterInput {
    fn from(r: RawFragment) -> Self {
        FilterInput::Raw(r)
    }
}

impl ConditionGroup {
    /// Normalize `input` into the bucket named by `logic`.
    pub fn add(&mut self, logic: Logic, input: impl Into<FilterInput>) -> QueryResult<&mut Self> {
        match input.into() {
            FilterInput::Map(entries) => {
                for (column, value) in entries {
                    let cond = Condition::matching(column.clone(), value);
                    self.push(logic, Some(column), ConditionNode::Condition(cond));
                }
            }
            FilterInput::Triples(conditions) => {
                for cond in conditions {
                    self.push(logic, None, ConditionNode::Condition(cond));
                }
            }
            FilterInput::Pair(column, value) => {
                let cond = Condition::matching(column.clone(), value);
                self.push(logic, Some(column), ConditionNode::Condition(cond));
            }
            FilterInput::Triple(column, op, operand) => {
                let cond = Condition::new(column.clone(), op, operand)?;
                self.push(logic, Some(column), ConditionNode::Condition(cond));
            }
            FilterInput::Predicate(f) => {
                let mut nested = ConditionGroup::new();
                f(&mut nested)?;
                if !nested.is_empty() {
                    self.push(logic, None, ConditionNode::Group(nested));
                }
            }
            FilterInput::Raw(raw) => {
                if raw.sql.trim().is_empty() {
                    return Err(QueryError::invalid_input("raw filter must not be empty"));
                }
                self.push(logic, None, ConditionNode::Raw(raw));
            }
        }
        Ok(self)
    }

    /// [`ConditionGroup::add`] into the `AND` bucket.
    pub fn and(&mut self, input: impl Into<FilterInput>) -> QueryResult<&mut Self> {
        self.add(Logic::And, input)
    }

    /// [`ConditionGroup::add`] into the `OR` bucket.
    pub fn or(&mut self, input: impl Into<FilterInput>) -> QueryResult<&mut Self> {
        self.add(Logic::Or, input)
    }
}

/// Primary-key shorthand.
///
/// A scalar or a single-item list gives `pk = ?`; several values (as a list or
/// a comma-joined string) give `pk IN (...)`. The column is qualified with
/// `alias` when one is given.
pub fn primary_key_condition(pk: &str, alias: Option<&str>, value: Value) -> QueryResult<Condition> {
    let column = match alias {
        Some(alias) => format!("{}.{}", alias, pk),
        None => pk.to_string(),
    };
    let value = match value {
        Value::Text(s) if s.contains(',') => Value::split_comma(&s),
        v => v,
    };
    match value {
        Value::Null => Err(QueryError::invalid_input(format!(
            "primary key '{}' value must not be null",
            pk
        ))),
        Value::List(mut items) if items.len() == 1 => {
            Ok(Condition::matching(column, items.remove(0)))
        }
        v => Ok(Condition::matching(column, v)),
    }
}
