#![allow(dead_code)]

use pgquery::{
    Connection, PlaceholderStyle, QueryError, QueryResult, Record, Statement, TableInfo,
};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// In-memory connection that records every statement it is asked to run.
#[derive(Default)]
pub struct MockConnection {
    tables: HashMap<String, TableInfo>,
    responses: Mutex<VecDeque<Vec<Record>>>,
    executed: Mutex<Vec<String>>,
    lookups: Mutex<Vec<String>>,
    transactions: Mutex<Vec<&'static str>>,
    affected: u64,
}

impl MockConnection {
    pub fn new() -> Self {
        Self {
            affected: 1,
            ..Self::default()
        }
    }

    /// Fixture tables shared by the integration tests.
    pub fn with_fixtures() -> Self {
        Self::new()
            .with_table("app_user", &["id", "name", "status", "password"], Some("id"))
            .with_table("app_post", &["id", "title", "author_id"], Some("id"))
            .with_table("app_tag", &["post_id", "tag"], None)
    }

    pub fn with_table(mut self, name: &str, fields: &[&str], pk: Option<&str>) -> Self {
        self.tables.insert(
            name.to_string(),
            TableInfo {
                name: name.to_string(),
                fields: fields.iter().map(|f| f.to_string()).collect(),
                pk: pk.map(str::to_string),
            },
        );
        self
    }

    /// Queue the rows returned by the next `query` call.
    pub fn push_rows(&self, rows: Vec<Record>) {
        self.responses.lock().unwrap().push_back(rows);
    }

    /// SQL of every executed statement, rendered with `$n` placeholders.
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    pub fn last_executed(&self) -> Option<String> {
        self.executed.lock().unwrap().last().cloned()
    }

    pub fn lookups(&self) -> Vec<String> {
        self.lookups.lock().unwrap().clone()
    }

    pub fn transactions(&self) -> Vec<&'static str> {
        self.transactions.lock().unwrap().clone()
    }

    fn record(&self, statement: &Statement) {
        self.executed
            .lock()
            .unwrap()
            .push(statement.to_sql_with(PlaceholderStyle::Dollar));
    }
}

impl Connection for MockConnection {
    async fn query(&self, statement: &Statement) -> QueryResult<Vec<Record>> {
        self.record(statement);
        Ok(self.responses.lock().unwrap().pop_front().unwrap_or_default())
    }

    async fn execute(&self, statement: &Statement) -> QueryResult<u64> {
        self.record(statement);
        Ok(self.affected)
    }

    async fn table_info(&self, table: &str) -> QueryResult<TableInfo> {
        self.lookups.lock().unwrap().push(table.to_string());
        self.tables
            .get(table)
            .cloned()
            .ok_or_else(|| QueryError::configuration(format!("table '{}' not found", table)))
    }

    async fn begin(&self) -> QueryResult<()> {
        self.transactions.lock().unwrap().push("BEGIN");
        Ok(())
    }

    async fn commit(&self) -> QueryResult<()> {
        self.transactions.lock().unwrap().push("COMMIT");
        Ok(())
    }

    async fn rollback(&self) -> QueryResult<()> {
        self.transactions.lock().unwrap().push("ROLLBACK");
        Ok(())
    }
}
