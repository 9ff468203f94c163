//! Scalar aggregates (COUNT/MAX/MIN/AVG/SUM).
//!
//! An aggregate replaces the field list with `FN(field) AS tmp_<fn>` and reads
//! one row. Grouped aggregates first render the grouped SELECT and then
//! aggregate over it as a derived table:
//!
//! ```text
//! SELECT COUNT(*) AS tmp_count
//!   FROM (SELECT COUNT(id) AS tmp_count FROM t GROUP BY status) _group_count
//!  LIMIT 1
//! ```

use crate::builder::build_select;
use crate::condition::ConditionGroup;
use crate::config::PlaceholderStyle;
use crate::error::{QueryError, QueryResult};
use crate::field::{FieldItem, FieldSpec};
use crate::ident::TableSpec;
use crate::options::{Limit, OptionState};
use crate::record::Record;
use crate::value::Value;
use std::str::FromStr;

/// Alias of the derived table used for grouped aggregates.
pub const GROUP_COUNT_ALIAS: &str = "_group_count";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFn {
    Count,
    Max,
    Min,
    Avg,
    Sum,
}

impl AggregateFn {
    pub fn as_sql(&self) -> &'static str {
        match self {
            AggregateFn::Count => "COUNT",
            AggregateFn::Max => "MAX",
            AggregateFn::Min => "MIN",
            AggregateFn::Avg => "AVG",
            AggregateFn::Sum => "SUM",
        }
    }

    /// Column alias of the aggregate result (`tmp_count`, ...).
    pub fn result_alias(&self) -> &'static str {
        match self {
            AggregateFn::Count => "tmp_count",
            AggregateFn::Max => "tmp_max",
            AggregateFn::Min => "tmp_min",
            AggregateFn::Avg => "tmp_avg",
            AggregateFn::Sum => "tmp_sum",
        }
    }

    fn expr(&self, field: &str) -> FieldItem {
        FieldItem::Aliased {
            expr: format!("{}({})", self.as_sql(), field),
            alias: self.result_alias().to_string(),
        }
    }
}

impl FromStr for AggregateFn {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "COUNT" => Ok(AggregateFn::Count),
            "MAX" => Ok(AggregateFn::Max),
            "MIN" => Ok(AggregateFn::Min),
            "AVG" => Ok(AggregateFn::Avg),
            "SUM" => Ok(AggregateFn::Sum),
            _ => Err(QueryError::invalid_input(format!("unknown aggregate '{}'", s))),
        }
    }
}

fn single(item: FieldItem) -> FieldSpec {
    let mut spec = FieldSpec::new();
    spec.push(item);
    spec
}

/// Rewrite a finalized state to compute `func(field)`.
pub(crate) fn plan(
    state: &mut OptionState,
    func: AggregateFn,
    field: &str,
    grouped: bool,
    style: PlaceholderStyle,
) -> QueryResult<()> {
    let field = match field.trim() {
        "" => "*",
        f => f,
    };

    let outer = if grouped {
        let mut inner = state.clone();
        inner.fields = Some(single(func.expr(field)));
        inner.order = None;
        inner.limit = None;
        let statement = build_select(&inner, style)?;

        state.table = Some(TableSpec::Derived {
            statement: Box::new(statement),
            alias: GROUP_COUNT_ALIAS.to_string(),
        });
        state.joins = Some(Vec::new());
        state.filters = Some(ConditionGroup::new());
        state.group = None;
        state.having = None;
        match func {
            AggregateFn::Count => func.expr("*"),
            _ => func.expr(func.result_alias()),
        }
    } else {
        func.expr(field)
    };

    state.fields = Some(single(outer));
    state.order = None;
    state.limit = Some(Limit::new(1));
    Ok(())
}

/// First column of the first row, `Null` when there is no row.
pub(crate) fn scalar(rows: Vec<Record>) -> Value {
    rows.into_iter()
        .next()
        .and_then(|row| row.into_iter().next())
        .map(|(_, v)| v)
        .unwrap_or_default()
}
