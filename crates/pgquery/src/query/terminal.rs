//! Terminal operations: render the accumulated options and run them.
//!
//! Each operation finalizes the query and works on a copy of its options, so
//! per-operation rewrites (aggregate field lists, `find`'s limit) do not leak
//! into the next call. In fetch-sql mode the rendered statement is returned as
//! [`Fetched::Sql`] and the connection's `query`/`execute` are never called.

use super::Query;
use crate::aggregate::{self, AggregateFn};
use crate::builder::{
    InsertOptions, Statement, build_delete, build_insert, build_select, build_update,
};
use crate::condition::{ConditionNode, Logic};
use crate::connection::Connection;
use crate::error::{QueryError, QueryResult};
use crate::field::FieldSpec;
use crate::filter::primary_key_condition;
use crate::options::{Limit, OptionState};
use crate::record::Record;
use crate::value::Value;
use tracing::debug;

/// Outcome of a terminal operation: the rendered statement in fetch-sql mode,
/// the data otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched<T> {
    Sql(Statement),
    Data(T),
}

impl<T> Fetched<T> {
    pub fn is_sql(&self) -> bool {
        matches!(self, Fetched::Sql(_))
    }

    pub fn into_data(self) -> Option<T> {
        match self {
            Fetched::Data(data) => Some(data),
            Fetched::Sql(_) => None,
        }
    }

    pub fn into_sql(self) -> Option<Statement> {
        match self {
            Fetched::Sql(stmt) => Some(stmt),
            Fetched::Data(_) => None,
        }
    }

    /// The data, or a configuration error when the query was in fetch-sql mode.
    pub fn data(self) -> QueryResult<T> {
        match self {
            Fetched::Data(data) => Ok(data),
            Fetched::Sql(stmt) => Err(QueryError::configuration(format!(
                "query is in fetch-sql mode, statement was not executed: {}",
                stmt
            ))),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Fetched<U> {
        match self {
            Fetched::Sql(stmt) => Fetched::Sql(stmt),
            Fetched::Data(data) => Fetched::Data(f(data)),
        }
    }
}

impl Query {
    /// Finalize and copy the options, expanding schema-dependent field lists.
    async fn prepare(&mut self, conn: &impl Connection) -> QueryResult<OptionState> {
        self.finalize()?;
        let mut working = self.options.clone();
        if let Some(fields) = working.fields.as_mut() {
            fields.resolve(conn).await?;
        }
        Ok(working)
    }

    fn remember(&mut self, statement: &Statement, fetch_only: bool) {
        let sql = statement.sql();
        if fetch_only {
            debug!(
                target: "pgquery.sql",
                kind = statement.kind().as_str(),
                sql = %sql,
                "fetch-sql: statement not executed"
            );
        }
        self.last_sql = Some(sql);
    }

    async fn fetch_rows(
        &mut self,
        conn: &impl Connection,
        working: &OptionState,
        statement: Statement,
    ) -> QueryResult<Fetched<Vec<Record>>> {
        let fetch_only = working.fetch_sql();
        self.remember(&statement, fetch_only);
        if fetch_only {
            return Ok(Fetched::Sql(statement));
        }
        Ok(Fetched::Data(conn.query(&statement).await?))
    }

    async fn run_execute(
        &mut self,
        conn: &impl Connection,
        working: &OptionState,
        statement: Statement,
    ) -> QueryResult<Fetched<u64>> {
        let fetch_only = working.fetch_sql();
        self.remember(&statement, fetch_only);
        if fetch_only {
            return Ok(Fetched::Sql(statement));
        }
        Ok(Fetched::Data(conn.execute(&statement).await?))
    }

    /// Primary key of `table`: explicit, from the model, else from the schema.
    async fn resolve_pk(&self, conn: &impl Connection, table: &str) -> QueryResult<String> {
        if let Some(pk) = self.known_pk() {
            return Ok(pk);
        }
        conn.table_info(table)
            .await?
            .pk
            .ok_or_else(|| QueryError::unresolved_pk(table))
    }

    /// Apply the strict-column policy to write data.
    async fn check_columns(
        &self,
        conn: &impl Connection,
        working: &OptionState,
        mut data: Record,
    ) -> QueryResult<Record> {
        let Some(table) = working.primary_table() else {
            return Err(QueryError::render("write statements need a physical table"));
        };
        let info = conn.table_info(table).await?;
        let unknown: Vec<String> = data
            .columns()
            .filter(|c| !info.has_field(c))
            .map(str::to_string)
            .collect();
        if unknown.is_empty() {
            return Ok(data);
        }
        if working.strict().unwrap_or(self.config.fields_strict) {
            return Err(QueryError::invalid_input(format!(
                "columns {:?} do not exist in table '{}'",
                unknown, table
            )));
        }
        debug!(
            target: "pgquery.sql",
            table = table,
            dropped = ?unknown,
            "non-strict write: unknown columns dropped"
        );
        data.retain(|c| info.has_field(c));
        Ok(data)
    }

    // ==================== Reads ====================

    /// All matching rows.
    pub async fn select(&mut self, conn: &impl Connection) -> QueryResult<Fetched<Vec<Record>>> {
        let working = self.prepare(conn).await?;
        let statement = build_select(&working, self.config.placeholder)?;
        self.fetch_rows(conn, &working, statement).await
    }

    /// Alias of [`Query::select`].
    pub async fn all(&mut self, conn: &impl Connection) -> QueryResult<Fetched<Vec<Record>>> {
        self.select(conn).await
    }

    /// Rows whose primary key matches `value` (scalar, list or comma-joined).
    pub async fn select_by_pk(
        &mut self,
        conn: &impl Connection,
        value: impl Into<Value>,
    ) -> QueryResult<Fetched<Vec<Record>>> {
        self.filter_pk(conn, value.into()).await?;
        self.select(conn).await
    }

    /// First matching row. With `allow_empty` a missing row is an empty record.
    pub async fn find(&mut self, conn: &impl Connection) -> QueryResult<Fetched<Option<Record>>> {
        let mut working = self.prepare(conn).await?;
        working.limit = Some(Limit::new(1));
        let statement = build_select(&working, self.config.placeholder)?;
        let allow_empty = working.allow_empty();
        let fetched = self.fetch_rows(conn, &working, statement).await?;
        Ok(fetched.map(|rows| match rows.into_iter().next() {
            Some(row) => Some(row),
            None if allow_empty => Some(Record::new()),
            None => None,
        }))
    }

    pub async fn find_by_pk(
        &mut self,
        conn: &impl Connection,
        value: impl Into<Value>,
    ) -> QueryResult<Fetched<Option<Record>>> {
        self.filter_pk(conn, value.into()).await?;
        self.find(conn).await
    }

    async fn filter_pk(&mut self, conn: &impl Connection, value: Value) -> QueryResult<()> {
        let table = self.primary_table()?;
        let pk = self.resolve_pk(conn, &table).await?;
        self.where_pk_named(&pk, value)?;
        Ok(())
    }

    /// One column of every matching row.
    pub async fn column(
        &mut self,
        conn: &impl Connection,
        field: &str,
    ) -> QueryResult<Fetched<Vec<Value>>> {
        let mut working = self.prepare(conn).await?;
        working.fields = Some(FieldSpec::parse(field));
        let statement = build_select(&working, self.config.placeholder)?;
        let fetched = self.fetch_rows(conn, &working, statement).await?;
        Ok(fetched.map(|rows| {
            rows.into_iter()
                .map(|row| row.first_value().cloned().unwrap_or_default())
                .collect()
        }))
    }

    /// `(key, value)` pairs of every matching row, in row order.
    pub async fn column_keyed(
        &mut self,
        conn: &impl Connection,
        field: &str,
        key: &str,
    ) -> QueryResult<Fetched<Vec<(Value, Value)>>> {
        let mut working = self.prepare(conn).await?;
        let mut fields = FieldSpec::parse(field);
        fields.extend(FieldSpec::parse(key));
        working.fields = Some(fields);
        let statement = build_select(&working, self.config.placeholder)?;
        let fetched = self.fetch_rows(conn, &working, statement).await?;
        Ok(fetched.map(|rows| {
            rows.into_iter()
                .map(|row| {
                    let mut values = row.into_iter().map(|(_, v)| v);
                    let value = values.next().unwrap_or_default();
                    // field == key collapses to a single selected column
                    let key = values.next().unwrap_or_else(|| value.clone());
                    (key, value)
                })
                .collect()
        }))
    }

    /// A single value of the first matching row.
    pub async fn value(
        &mut self,
        conn: &impl Connection,
        field: &str,
    ) -> QueryResult<Fetched<Option<Value>>> {
        let mut working = self.prepare(conn).await?;
        working.fields = Some(FieldSpec::parse(field));
        working.limit = Some(Limit::new(1));
        let statement = build_select(&working, self.config.placeholder)?;
        let fetched = self.fetch_rows(conn, &working, statement).await?;
        Ok(fetched.map(|rows| {
            rows.into_iter()
                .next()
                .and_then(|row| row.into_iter().next().map(|(_, v)| v))
        }))
    }

    // ==================== Writes ====================

    async fn insert_with(
        &mut self,
        conn: &impl Connection,
        record: Record,
        options: InsertOptions,
    ) -> QueryResult<(OptionState, Statement)> {
        self.options.data_mut().merge(record);
        let working = self.prepare(conn).await?;
        let data = working.data().cloned().unwrap_or_default();
        let data = self.check_columns(conn, &working, data).await?;
        let statement = build_insert(&working, &[data], &options, self.config.placeholder)?;
        Ok((working, statement))
    }

    /// Insert one row (merged into any data set with [`Query::data`]).
    pub async fn insert(
        &mut self,
        conn: &impl Connection,
        record: Record,
    ) -> QueryResult<Fetched<u64>> {
        let (working, statement) = self.insert_with(conn, record, InsertOptions::new()).await?;
        self.run_execute(conn, &working, statement).await
    }

    /// Insert one row, replacing the existing row with the same primary key.
    pub async fn insert_replace(
        &mut self,
        conn: &impl Connection,
        record: Record,
    ) -> QueryResult<Fetched<u64>> {
        let table = self.primary_table()?;
        let pk = self.resolve_pk(conn, &table).await.ok();
        let options = InsertOptions::new().replace(pk);
        let (working, statement) = self.insert_with(conn, record, options).await?;
        self.run_execute(conn, &working, statement).await
    }

    /// Insert one row and return its primary key.
    pub async fn insert_get_id(
        &mut self,
        conn: &impl Connection,
        record: Record,
    ) -> QueryResult<Fetched<Value>> {
        let table = self.primary_table()?;
        let pk = self.resolve_pk(conn, &table).await?;
        let options = InsertOptions::new().returning(pk);
        let (working, statement) = self.insert_with(conn, record, options).await?;
        let fetched = self.fetch_rows(conn, &working, statement).await?;
        Ok(fetched.map(aggregate::scalar))
    }

    /// Insert several rows in one statement. Every row needs the same columns.
    pub async fn insert_all(
        &mut self,
        conn: &impl Connection,
        rows: Vec<Record>,
    ) -> QueryResult<Fetched<u64>> {
        let working = self.prepare(conn).await?;
        let mut checked = Vec::with_capacity(rows.len());
        for row in rows {
            checked.push(self.check_columns(conn, &working, row).await?);
        }
        let statement = build_insert(
            &working,
            &checked,
            &InsertOptions::new(),
            self.config.placeholder,
        )?;
        self.run_execute(conn, &working, statement).await
    }

    /// Update matching rows with `record` (merged into any data set before).
    ///
    /// Without a filter, a primary key present in the data becomes the
    /// condition. Updating without any condition is refused.
    pub async fn update(
        &mut self,
        conn: &impl Connection,
        record: Record,
    ) -> QueryResult<Fetched<u64>> {
        self.options.data_mut().merge(record);
        let mut working = self.prepare(conn).await?;
        let data = working.data().cloned().unwrap_or_default();
        let mut data = if data.is_empty() {
            data
        } else {
            self.check_columns(conn, &working, data).await?
        };

        if !working.has_filters() {
            let table = self.primary_table()?;
            if let Ok(pk) = self.resolve_pk(conn, &table).await
                && let Some(value) = data.remove(&pk)
            {
                let condition = primary_key_condition(&pk, working.primary_alias(), value)?;
                working
                    .filters
                    .get_or_insert_default()
                    .replace(Logic::And, pk, ConditionNode::Condition(condition));
            }
        }
        working.data = Some(data);

        let statement = build_update(&working, self.config.placeholder)?;
        self.run_execute(conn, &working, statement).await
    }

    /// Delete matching rows. Refused without a condition.
    pub async fn delete(&mut self, conn: &impl Connection) -> QueryResult<Fetched<u64>> {
        let working = self.prepare(conn).await?;
        let statement = build_delete(&working, false, self.config.placeholder)?;
        self.run_execute(conn, &working, statement).await
    }

    pub async fn delete_by_pk(
        &mut self,
        conn: &impl Connection,
        value: impl Into<Value>,
    ) -> QueryResult<Fetched<u64>> {
        self.filter_pk(conn, value.into()).await?;
        self.delete(conn).await
    }

    /// Delete every row matched by the current options, even without a condition.
    pub async fn delete_all(&mut self, conn: &impl Connection) -> QueryResult<Fetched<u64>> {
        let working = self.prepare(conn).await?;
        let statement = build_delete(&working, true, self.config.placeholder)?;
        self.run_execute(conn, &working, statement).await
    }

    // ==================== Aggregates ====================

    /// `COUNT(field)`; with a GROUP BY, the number of groups.
    pub async fn count(&mut self, conn: &impl Connection, field: &str) -> QueryResult<Fetched<i64>> {
        let grouped = self.options.group().is_some_and(|g| !g.trim().is_empty());
        let fetched = self
            .aggregate(conn, AggregateFn::Count, field, grouped, false)
            .await?;
        Ok(fetched.map(|v| v.as_i64().unwrap_or(0)))
    }

    pub async fn max(&mut self, conn: &impl Connection, field: &str) -> QueryResult<Fetched<Value>> {
        self.aggregate(conn, AggregateFn::Max, field, false, false).await
    }

    pub async fn min(&mut self, conn: &impl Connection, field: &str) -> QueryResult<Fetched<Value>> {
        self.aggregate(conn, AggregateFn::Min, field, false, false).await
    }

    pub async fn avg(&mut self, conn: &impl Connection, field: &str) -> QueryResult<Fetched<Value>> {
        self.aggregate(conn, AggregateFn::Avg, field, false, false).await
    }

    pub async fn sum(&mut self, conn: &impl Connection, field: &str) -> QueryResult<Fetched<Value>> {
        self.aggregate(conn, AggregateFn::Sum, field, false, false).await
    }

    /// Compute `func(field)`. `grouped` aggregates over the groups of the
    /// current GROUP BY; `force_fetch_sql` returns the statement regardless of
    /// the fetch-sql flag.
    pub async fn aggregate(
        &mut self,
        conn: &impl Connection,
        func: AggregateFn,
        field: &str,
        grouped: bool,
        force_fetch_sql: bool,
    ) -> QueryResult<Fetched<Value>> {
        let mut working = self.prepare(conn).await?;
        aggregate::plan(&mut working, func, field, grouped, self.config.placeholder)?;
        let statement = build_select(&working, self.config.placeholder)?;

        let fetch_only = force_fetch_sql || working.fetch_sql();
        self.remember(&statement, fetch_only);
        if fetch_only {
            return Ok(Fetched::Sql(statement));
        }
        let rows = conn.query(&statement).await?;
        Ok(Fetched::Data(aggregate::scalar(rows)))
    }

    // ==================== Transactions ====================

    pub async fn start_trans(&self, conn: &impl Connection) -> QueryResult<()> {
        conn.begin().await
    }

    pub async fn commit(&self, conn: &impl Connection) -> QueryResult<()> {
        conn.commit().await
    }

    pub async fn rollback(&self, conn: &impl Connection) -> QueryResult<()> {
        conn.rollback().await
    }
}
