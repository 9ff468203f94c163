//! Error types for pgquery

use thiserror::Error;

/// Result type alias for pgquery operations
pub type QueryResult<T> = Result<T, QueryError>;

/// Error types raised while building or executing a query
#[derive(Debug, Error)]
pub enum QueryError {
    /// A required identifier is missing or empty (e.g. no table resolvable)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A filter/join/table/data argument does not match any supported shape
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Primary-key shorthand used but no key could be discovered
    #[error("Unresolved primary key: {0}")]
    UnresolvedPrimaryKey(String),

    /// The option state cannot be rendered as-is
    #[error("Render error: {0}")]
    Render(String),

    /// Opaque failure reported by the executor
    #[error("Execution error: {message}")]
    Execution {
        /// SQLSTATE code, when the executor reported one
        code: Option<String>,
        message: String,
    },

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Pool error
    #[cfg(feature = "pool")]
    #[error("Pool error: {0}")]
    Pool(String),
}

impl QueryError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create an invalid-input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create an unresolved primary key error for a table
    pub fn unresolved_pk(table: impl Into<String>) -> Self {
        Self::UnresolvedPrimaryKey(format!("no primary key found for '{}'", table.into()))
    }

    /// Create a render error
    pub fn render(message: impl Into<String>) -> Self {
        Self::Render(message.into())
    }

    /// Create an execution error without a SQLSTATE code
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution {
            code: None,
            message: message.into(),
        }
    }

    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }

    pub fn is_unresolved_pk(&self) -> bool {
        matches!(self, Self::UnresolvedPrimaryKey(_))
    }

    pub fn is_render(&self) -> bool {
        matches!(self, Self::Render(_))
    }

    pub fn is_execution(&self) -> bool {
        matches!(self, Self::Execution { .. })
    }

    /// SQLSTATE code of an execution error, if any.
    pub fn sql_state(&self) -> Option<&str> {
        match self {
            Self::Execution { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Convert a tokio_postgres error, keeping the SQLSTATE code when present.
    pub fn from_db_error(err: tokio_postgres::Error) -> Self {
        let code = err.code().map(|c| c.code().to_string());
        let message = match err.as_db_error() {
            Some(db_err) => db_err.message().to_string(),
            None => err.to_string(),
        };
        Self::Execution { code, message }
    }
}

impl From<tokio_postgres::Error> for QueryError {
    fn from(err: tokio_postgres::Error) -> Self {
        Self::from_db_error(err)
    }
}

#[cfg(feature = "pool")]
impl From<deadpool_postgres::PoolError> for QueryError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Self::Pool(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execution_error_keeps_code() {
        let err = QueryError::Execution {
            code: Some("23505".to_string()),
            message: "duplicate key".to_string(),
        };
        assert!(err.is_execution());
        assert_eq!(err.sql_state(), Some("23505"));
        assert_eq!(err.to_string(), "Execution error: duplicate key");
    }

    #[test]
    fn unresolved_pk_message_names_table() {
        let err = QueryError::unresolved_pk("app_user");
        assert!(err.is_unresolved_pk());
        assert!(err.to_string().contains("app_user"));
    }
}
