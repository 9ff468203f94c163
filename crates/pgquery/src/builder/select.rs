use super::statement::{Statement, StatementBuilder, StatementKind};
use super::where_clause::{push_group, push_where};
use super::{ensure_finalized, push_from};
use crate::config::PlaceholderStyle;
use crate::error::QueryResult;
use crate::join::JoinOn;
use crate::options::OptionState;
use std::fmt::Write;

/// `SELECT <fields> FROM <table> [joins] [WHERE] [GROUP BY] [HAVING] [ORDER BY] [LIMIT]`
pub(crate) fn build_select(state: &OptionState, style: PlaceholderStyle) -> QueryResult<Statement> {
    ensure_finalized(state)?;
    let mut b = StatementBuilder::new();

    let fields = match state.fields() {
        Some(fields) => fields.render()?,
        None => "*".to_string(),
    };
    b.push("SELECT ").push(&fields);
    push_from(&mut b, state)?;

    for join in state.joins() {
        b.push(" ").push(join.kind.as_sql()).push(" ").push(&join.target.table);
        let alias = state
            .aliases()
            .alias_of(&join.target.table)
            .or(join.target.alias.as_deref());
        if let Some(alias) = alias {
            b.push(" ").push(alias);
        }
        b.push(" ON ");
        match &join.on {
            JoinOn::Raw(sql) => {
                b.push(sql);
            }
            JoinOn::Conditions(group) => push_group(&mut b, group, state.binds())?,
        }
    }

    push_where(&mut b, state)?;

    if let Some(group) = state.group().filter(|g| !g.trim().is_empty()) {
        b.push(" GROUP BY ").push(group);
    }
    if let Some(having) = state.having.as_deref().filter(|h| !h.trim().is_empty()) {
        b.push(" HAVING ").push(having);
    }
    if let Some(order) = state.order().filter(|o| !o.trim().is_empty()) {
        b.push(" ORDER BY ").push(order);
    }
    if let Some(limit) = state.limit() {
        let mut tail = String::new();
        let _ = write!(tail, " LIMIT {}", limit.length);
        if let Some(offset) = limit.offset {
            let _ = write!(tail, " OFFSET {}", offset);
        }
        b.push(&tail);
    }

    Ok(b.finish(StatementKind::Select, style, state.binds().counter()))
}
