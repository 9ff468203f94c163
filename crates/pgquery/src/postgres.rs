//! [`Connection`] for tokio-postgres clients and transactions.

use crate::builder::Statement;
use crate::config::PlaceholderStyle;
use crate::connection::{Connection, TableInfo};
use crate::error::{QueryError, QueryResult};
use crate::record::Record;
use crate::value::Value;
use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use tokio_postgres::{GenericClient, Row};
use tokio_postgres::types::{FromSql, Type};
use tracing::debug;
use uuid::Uuid;

const TABLE_INFO_SQL: &str = r#"
SELECT
  a.attname::text AS column_name,
  COALESCE(
    (SELECT true
       FROM pg_catalog.pg_index i
      WHERE i.indrelid = a.attrelid
        AND i.indisprimary
        AND a.attnum = ANY(i.indkey)),
    false
  ) AS is_pk
FROM pg_catalog.pg_attribute a
WHERE a.attrelid = to_regclass($1)
  AND a.attnum > 0
  AND NOT a.attisdropped
ORDER BY a.attnum
"#;

async fn run_query<C: GenericClient + Sync>(client: &C, statement: &Statement) -> QueryResult<Vec<Record>> {
    let sql = statement.to_sql_with(PlaceholderStyle::Dollar);
    let params = statement.params_ref();
    debug!(
        target: "pgquery.sql",
        kind = statement.kind().as_str(),
        sql = %sql,
        params = params.len(),
        "query"
    );
    let rows = client
        .query(sql.as_str(), &params)
        .await
        .map_err(QueryError::from_db_error)?;
    rows.iter().map(decode_row).collect()
}

async fn run_execute<C: GenericClient + Sync>(client: &C, statement: &Statement) -> QueryResult<u64> {
    let sql = statement.to_sql_with(PlaceholderStyle::Dollar);
    let params = statement.params_ref();
    debug!(
        target: "pgquery.sql",
        kind = statement.kind().as_str(),
        sql = %sql,
        params = params.len(),
        "execute"
    );
    client
        .execute(sql.as_str(), &params)
        .await
        .map_err(QueryError::from_db_error)
}

async fn load_table_info<C: GenericClient + Sync>(client: &C, table: &str) -> QueryResult<TableInfo> {
    let rows = client
        .query(TABLE_INFO_SQL, &[&table])
        .await
        .map_err(QueryError::from_db_error)?;
    if rows.is_empty() {
        return Err(QueryError::configuration(format!("table '{}' not found", table)));
    }

    let mut info = TableInfo {
        name: table.to_string(),
        ..TableInfo::default()
    };
    let mut pks = Vec::new();
    for row in &rows {
        let column: String = row
            .try_get("column_name")
            .map_err(|e| QueryError::decode("column_name", e.to_string()))?;
        let is_pk: bool = row
            .try_get("is_pk")
            .map_err(|e| QueryError::decode("is_pk", e.to_string()))?;
        if is_pk {
            pks.push(column.clone());
        }
        info.fields.push(column);
    }
    // composite keys are not usable as a pk shorthand
    if pks.len() == 1 {
        info.pk = pks.pop();
    }
    Ok(info)
}

async fn run_batch<C: GenericClient + Sync>(client: &C, sql: &str) -> QueryResult<()> {
    debug!(target: "pgquery.sql", sql = sql, "transaction");
    client
        .batch_execute(sql)
        .await
        .map_err(QueryError::from_db_error)
}

fn get<'a, T: FromSql<'a>>(row: &'a Row, idx: usize) -> QueryResult<Option<T>> {
    row.try_get::<_, Option<T>>(idx)
        .map_err(|e| QueryError::decode(row.columns()[idx].name(), e.to_string()))
}

fn decode_row(row: &Row) -> QueryResult<Record> {
    let mut record = Record::new();
    for (idx, column) in row.columns().iter().enumerate() {
        record.set(column.name(), decode_column(row, idx, column.type_())?);
    }
    Ok(record)
}

fn decode_column(row: &Row, idx: usize, ty: &Type) -> QueryResult<Value> {
    let value = match *ty {
        Type::BOOL => get::<bool>(row, idx)?.into(),
        Type::INT2 => get::<i16>(row, idx)?.into(),
        Type::INT4 => get::<i32>(row, idx)?.into(),
        Type::INT8 => get::<i64>(row, idx)?.into(),
        Type::FLOAT4 => get::<f32>(row, idx)?.into(),
        Type::FLOAT8 => get::<f64>(row, idx)?.into(),
        Type::NUMERIC => get::<Decimal>(row, idx)?.into(),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME => get::<String>(row, idx)?.into(),
        Type::JSON | Type::JSONB => get::<serde_json::Value>(row, idx)?
            .map(Value::Json)
            .unwrap_or_default(),
        Type::UUID => get::<Uuid>(row, idx)?.into(),
        Type::TIMESTAMPTZ => get::<DateTime<Utc>>(row, idx)?.into(),
        Type::TIMESTAMP => get::<NaiveDateTime>(row, idx)?.into(),
        Type::INT4_ARRAY => get::<Vec<i32>>(row, idx)?.into(),
        Type::INT8_ARRAY => get::<Vec<i64>>(row, idx)?.into(),
        Type::TEXT_ARRAY | Type::VARCHAR_ARRAY => get::<Vec<String>>(row, idx)?.into(),
        _ => {
            return Err(QueryError::decode(
                row.columns()[idx].name(),
                format!("unsupported column type {}; cast it in the field list", ty),
            ));
        }
    };
    Ok(value)
}

impl Connection for tokio_postgres::Client {
    async fn query(&self, statement: &Statement) -> QueryResult<Vec<Record>> {
        run_query(self, statement).await
    }

    async fn execute(&self, statement: &Statement) -> QueryResult<u64> {
        run_execute(self, statement).await
    }

    async fn table_info(&self, table: &str) -> QueryResult<TableInfo> {
        load_table_info(self, table).await
    }

    async fn begin(&self) -> QueryResult<()> {
        run_batch(self, "BEGIN").await
    }

    async fn commit(&self) -> QueryResult<()> {
        run_batch(self, "COMMIT").await
    }

    async fn rollback(&self) -> QueryResult<()> {
        run_batch(self, "ROLLBACK").await
    }
}

/// Inside an open transaction, `begin`/`commit`/`rollback` manage a single
/// savepoint. Committing the transaction itself stays with its owner.
impl Connection for tokio_postgres::Transaction<'_> {
    async fn query(&self, statement: &Statement) -> QueryResult<Vec<Record>> {
        run_query(self, statement).await
    }

    async fn execute(&self, statement: &Statement) -> QueryResult<u64> {
        run_execute(self, statement).await
    }

    async fn table_info(&self, table: &str) -> QueryResult<TableInfo> {
        load_table_info(self, table).await
    }

    async fn begin(&self) -> QueryResult<()> {
        run_batch(self, "SAVEPOINT pgquery_trans").await
    }

    async fn commit(&self) -> QueryResult<()> {
        run_batch(self, "RELEASE SAVEPOINT pgquery_trans").await
    }

    async fn rollback(&self) -> QueryResult<()> {
        run_batch(self, "ROLLBACK TO SAVEPOINT pgquery_trans").await
    }
}

#[cfg(feature = "pool")]
impl Connection for deadpool_postgres::Client {
    async fn query(&self, statement: &Statement) -> QueryResult<Vec<Record>> {
        let client: &tokio_postgres::Client = self;
        run_query(client, statement).await
    }

    async fn execute(&self, statement: &Statement) -> QueryResult<u64> {
        let client: &tokio_postgres::Client = self;
        run_execute(client, statement).await
    }

    async fn table_info(&self, table: &str) -> QueryResult<TableInfo> {
        let client: &tokio_postgres::Client = self;
        load_table_info(client, table).await
    }

    async fn begin(&self) -> QueryResult<()> {
        let client: &tokio_postgres::Client = self;
        run_batch(client, "BEGIN").await
    }

    async fn commit(&self) -> QueryResult<()> {
        let client: &tokio_postgres::Client = self;
        run_batch(client, "COMMIT").await
    }

    async fn rollback(&self) -> QueryResult<()> {
        let client: &tokio_postgres::Client = self;
        run_batch(client, "ROLLBACK").await
    }
}
