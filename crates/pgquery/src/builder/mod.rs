//! SQL assembly.
//!
//! Every builder takes a finalized [`OptionState`] and produces a
//! [`Statement`]. Building never mutates the state, so rendering the same
//! state twice yields the same statement.

mod delete;
mod insert;
mod select;
mod statement;
mod update;
mod where_clause;

#[cfg(test)]
mod tests;

pub use insert::InsertOptions;
pub use statement::{Statement, StatementKind};

pub(crate) use delete::build_delete;
pub(crate) use insert::build_insert;
pub(crate) use select::build_select;
pub(crate) use statement::StatementBuilder;
pub(crate) use update::build_update;

use crate::error::{QueryError, QueryResult};
use crate::ident::{AliasRegistry, TableSpec};
use crate::options::{OptionState, Stage};

fn ensure_finalized(state: &OptionState) -> QueryResult<()> {
    if state.stage() != Stage::Finalized {
        return Err(QueryError::render("query options must be finalized before rendering"));
    }
    Ok(())
}

/// Physical primary table for write statements.
fn write_table(state: &OptionState) -> QueryResult<&str> {
    state
        .primary_table()
        .ok_or_else(|| QueryError::render("write statements need a physical table"))
}

fn push_table(b: &mut StatementBuilder, spec: &TableSpec, aliases: &AliasRegistry) {
    match spec {
        TableSpec::Single(name) | TableSpec::Aliased { name, .. } => {
            b.push(name);
            if let Some(alias) = aliases.alias_of(name) {
                b.push(" ").push(alias);
            }
        }
        TableSpec::Multiple(items) => {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    b.push(", ");
                }
                push_table(b, item, aliases);
            }
        }
        TableSpec::Derived { statement, alias } => {
            b.push("(").push_statement(statement).push(") ").push(alias);
        }
    }
}

fn push_from(b: &mut StatementBuilder, state: &OptionState) -> QueryResult<()> {
    let spec = state
        .table()
        .ok_or_else(|| QueryError::render("no table to select from"))?;
    b.push(" FROM ");
    push_table(b, spec, state.aliases());
    Ok(())
}
