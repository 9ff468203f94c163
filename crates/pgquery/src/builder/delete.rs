use super::statement::{Statement, StatementBuilder, StatementKind};
use super::where_clause::push_where;
use super::{ensure_finalized, write_table};
use crate::config::PlaceholderStyle;
use crate::error::{QueryError, QueryResult};
use crate::options::OptionState;

/// `DELETE FROM t [alias] WHERE ...`
///
/// Without an explicit condition this is refused unless `allow_all` is set.
pub(crate) fn build_delete(
    state: &OptionState,
    allow_all: bool,
    style: PlaceholderStyle,
) -> QueryResult<Statement> {
    ensure_finalized(state)?;
    let table = write_table(state)?;
    if !allow_all && !state.has_filters() {
        return Err(QueryError::invalid_input(
            "delete needs a WHERE condition; use delete_all to delete every row",
        ));
    }
    if !state.joins().is_empty() {
        return Err(QueryError::invalid_input("delete does not support joins"));
    }

    let mut b = StatementBuilder::new();
    b.push("DELETE FROM ").push(table);
    if let Some(alias) = state.primary_alias() {
        b.push(" ").push(alias);
    }
    push_where(&mut b, state)?;
    Ok(b.finish(StatementKind::Delete, style, state.binds().counter()))
}
