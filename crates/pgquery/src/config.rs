//! Configuration threaded into every [`Query`](crate::Query).
//!
//! All types implement `serde::Deserialize`, so they can be embedded in an
//! application's own config file:
//!
//! ```ignore
//! #[derive(serde::Deserialize)]
//! struct AppConfig {
//!     database_url: String,
//!     query: pgquery::QueryConfig,
//! }
//! ```

use serde::Deserialize;

/// How logical entity names map to physical table names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    /// Prefix prepended to every resolved table name (e.g. `app_`).
    pub prefix: String,
}

impl NamingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }
}

/// Placeholder syntax used when a [`Statement`](crate::Statement) is rendered to text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaceholderStyle {
    /// `?`
    #[default]
    Question,
    /// `$1, $2, ...` (what PostgreSQL executes)
    Dollar,
    /// `:Bind_1`, `:name`
    Named,
}

/// Query configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub naming: NamingConfig,
    pub placeholder: PlaceholderStyle,
    /// Default for `strict`: reject write columns missing from the table.
    pub fields_strict: bool,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            naming: NamingConfig::default(),
            placeholder: PlaceholderStyle::default(),
            fields_strict: true,
        }
    }
}

impl QueryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.naming.prefix = prefix.into();
        self
    }

    pub fn with_naming(mut self, naming: NamingConfig) -> Self {
        self.naming = naming;
        self
    }

    pub fn with_placeholder(mut self, style: PlaceholderStyle) -> Self {
        self.placeholder = style;
        self
    }

    pub fn with_fields_strict(mut self, strict: bool) -> Self {
        self.fields_strict = strict;
        self
    }
}
