use super::statement::{Statement, StatementBuilder, StatementKind};
use super::{ensure_finalized, write_table};
use crate::config::PlaceholderStyle;
use crate::error::{QueryError, QueryResult};
use crate::options::OptionState;
use crate::record::Record;

/// Extra clauses of an INSERT.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InsertOptions {
    /// Replace existing rows: rendered as `ON CONFLICT ... DO UPDATE`.
    pub replace: bool,
    /// Conflict target for `replace`. Without one the insert becomes
    /// `ON CONFLICT DO NOTHING`.
    pub conflict_key: Option<String>,
    /// Column to return (`RETURNING col`).
    pub returning: Option<String>,
}

impl InsertOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(mut self, conflict_key: Option<String>) -> Self {
        self.replace = true;
        self.conflict_key = conflict_key;
        self
    }

    pub fn returning(mut self, column: impl Into<String>) -> Self {
        self.returning = Some(column.into());
        self
    }
}

/// `INSERT INTO t (cols) VALUES (...)[, (...)]`. Every row must carry the
/// same columns as the first one; values are ordered by the first row.
pub(crate) fn build_insert(
    state: &OptionState,
    rows: &[Record],
    options: &InsertOptions,
    style: PlaceholderStyle,
) -> QueryResult<Statement> {
    ensure_finalized(state)?;
    let table = write_table(state)?;
    let first = rows
        .first()
        .filter(|r| !r.is_empty())
        .ok_or_else(|| QueryError::invalid_input("insert needs at least one non-empty row"))?;
    let columns: Vec<&str> = first.columns().collect();

    let mut b = StatementBuilder::new();
    b.push("INSERT INTO ").push(table).push(" (");
    b.push(&columns.join(", ")).push(") VALUES ");

    for (i, row) in rows.iter().enumerate() {
        if row.len() != columns.len() {
            return Err(QueryError::invalid_input(format!(
                "insert row {} has {} columns, expected {}",
                i,
                row.len(),
                columns.len()
            )));
        }
        if i > 0 {
            b.push(", ");
        }
        b.push("(");
        for (j, column) in columns.iter().enumerate() {
            let value = row.get(column).ok_or_else(|| {
                QueryError::invalid_input(format!("insert row {} is missing column '{}'", i, column))
            })?;
            if j > 0 {
                b.push(", ");
            }
            b.push_value(value.clone());
        }
        b.push(")");
    }

    if options.replace {
        match &options.conflict_key {
            Some(key) => {
                let updates: Vec<String> = columns
                    .iter()
                    .filter(|c| **c != key.as_str())
                    .map(|c| format!("{c} = EXCLUDED.{c}"))
                    .collect();
                b.push(" ON CONFLICT (").push(key).push(")");
                if updates.is_empty() {
                    b.push(" DO NOTHING");
                } else {
                    b.push(" DO UPDATE SET ").push(&updates.join(", "));
                }
            }
            None => {
                b.push(" ON CONFLICT DO NOTHING");
            }
        }
    }

    if let Some(returning) = &options.returning {
        b.push(" RETURNING ").push(returning);
    }

    Ok(b.finish(StatementKind::Insert, style, state.binds().counter()))
}
