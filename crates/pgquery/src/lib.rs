//! # pgquery
//!
//! A PostgreSQL query accumulator for entity layers.
//!
//! ## Features
//!
//! - **Option model**: setters accumulate typed options; nothing runs until a terminal operation
//! - **Filter normalization**: maps, `(field, value)` pairs, operator triples, raw SQL and closures
//! - **Name resolution**: logical names (`User`, `__USER__`) map to prefixed physical tables
//! - **Eager joins**: one-to-one relations are selected through joins with `<relation>__<column>` aliases
//! - **Safe defaults**: UPDATE and DELETE require a condition
//! - **fetch-sql mode**: every terminal operation can return its statement instead of executing
//!
//! ```ignore
//! use pgquery::{Query, QueryConfig, Record};
//!
//! let config = QueryConfig::new().with_prefix("app_");
//!
//! // SELECT
//! let rows = Query::new(config.clone())
//!     .table("app_user u")?
//!     .where_(("u.status", 1))?
//!     .order("u.id DESC")
//!     .limit(10)
//!     .select(&client)
//!     .await?
//!     .data()?;
//!
//! // INSERT
//! Query::new(config.clone())
//!     .name("User")
//!     .insert(&client, Record::new().with("name", "alice"))
//!     .await?;
//!
//! // COUNT over groups
//! let groups = Query::new(config)
//!     .name("User")
//!     .group("status")
//!     .count(&client, "id")
//!     .await?;
//! ```

pub mod aggregate;
pub mod bind;
pub mod builder;
pub mod condition;
pub mod config;
pub mod connection;
pub mod error;
pub mod field;
pub mod filter;
pub mod ident;
pub mod join;
pub mod options;
pub mod postgres;
pub mod query;
pub mod record;
pub mod relation;
pub mod value;

pub use aggregate::AggregateFn;
pub use bind::{BindEntry, BindTable};
pub use builder::{InsertOptions, Statement, StatementKind};
pub use condition::{Condition, ConditionGroup, Logic, Operand, Operator, RawFragment};
pub use config::{NamingConfig, PlaceholderStyle, QueryConfig};
pub use connection::{Connection, TableInfo};
pub use error::{QueryError, QueryResult};
pub use field::{FieldItem, FieldSpec};
pub use filter::FilterInput;
pub use ident::{AliasRegistry, TableResolver, TableSpec};
pub use join::{JoinKind, JoinOn, JoinSpec};
pub use options::{Limit, OptionKey, OptionState, SoftDeleteRule, Stage};
pub use query::{Fetched, Query};
pub use record::Record;
pub use relation::{EntityModel, Relation, RelationKind};
pub use value::{ParamType, Value};

#[cfg(feature = "pool")]
pub mod pool;

#[cfg(feature = "pool")]
pub use pool::{create_pool, create_pool_with_size};
