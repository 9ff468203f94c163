//! The executor a [`Query`](crate::Query) hands its statements to.

use crate::builder::Statement;
use crate::error::QueryResult;
use crate::record::Record;

/// Schema facts the query needs about one table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableInfo {
    pub name: String,
    /// Column names in ordinal order.
    pub fields: Vec<String>,
    /// Single-column primary key, if the table has one.
    pub pk: Option<String>,
}

impl TableInfo {
    pub fn has_field(&self, column: &str) -> bool {
        self.fields.iter().any(|f| f == column)
    }
}

/// Executes rendered statements, answers schema lookups and passes
/// transaction control through.
///
/// Implemented for `tokio_postgres::Client` (and pooled clients with the
/// `pool` feature). Implementations render statements with the placeholder
/// style they execute, regardless of the statement's own style.
pub trait Connection: Send + Sync {
    /// Run a statement that returns rows.
    fn query(
        &self,
        statement: &Statement,
    ) -> impl std::future::Future<Output = QueryResult<Vec<Record>>> + Send;

    /// Run a statement and return the number of affected rows.
    fn execute(
        &self,
        statement: &Statement,
    ) -> impl std::future::Future<Output = QueryResult<u64>> + Send;

    /// Columns and primary key of a physical table.
    fn table_info(
        &self,
        table: &str,
    ) -> impl std::future::Future<Output = QueryResult<TableInfo>> + Send;

    fn begin(&self) -> impl std::future::Future<Output = QueryResult<()>> + Send;

    fn commit(&self) -> impl std::future::Future<Output = QueryResult<()>> + Send;

    fn rollback(&self) -> impl std::future::Future<Output = QueryResult<()>> + Send;
}
