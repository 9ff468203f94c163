use super::statement::{Statement, StatementBuilder, StatementKind};
use super::where_clause::push_where;
use super::{ensure_finalized, write_table};
use crate::config::PlaceholderStyle;
use crate::error::{QueryError, QueryResult};
use crate::options::OptionState;

/// `UPDATE t [alias] SET c = ?, ... WHERE ...`
///
/// Requires data and at least one explicit condition.
pub(crate) fn build_update(state: &OptionState, style: PlaceholderStyle) -> QueryResult<Statement> {
    ensure_finalized(state)?;
    let table = write_table(state)?;
    let data = state.data().filter(|d| !d.is_empty());
    if data.is_none() && state.data_exprs.is_empty() {
        return Err(QueryError::invalid_input("update needs data to set"));
    }
    if !state.has_filters() {
        return Err(QueryError::invalid_input(
            "update needs a WHERE condition; refusing to update every row",
        ));
    }
    if !state.joins().is_empty() {
        return Err(QueryError::invalid_input("update does not support joins"));
    }

    let mut b = StatementBuilder::new();
    b.push("UPDATE ").push(table);
    if let Some(alias) = state.primary_alias() {
        b.push(" ").push(alias);
    }
    b.push(" SET ");

    let mut first = true;
    for (column, value) in data.into_iter().flat_map(|d| d.iter()) {
        if !first {
            b.push(", ");
        }
        first = false;
        b.push(column).push(" = ").push_value(value.clone());
    }
    for (column, expr) in &state.data_exprs {
        if !first {
            b.push(", ");
        }
        first = false;
        b.push(column).push(" = ").push(expr);
    }

    push_where(&mut b, state)?;
    Ok(b.finish(StatementKind::Update, style, state.binds().counter()))
}
