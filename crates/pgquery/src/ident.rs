//! Table name resolution and alias tracking.
//!
//! A *logical* name (`UserRole`, `user_role`, `__USER_ROLE__`) is turned into a
//! *physical* table name by applying the configured prefix and snake_case.
//! Resolution is idempotent: resolving a physical name returns it unchanged.
//! Explicit table names given to [`TableSpec::parse`] are taken as physical;
//! only `__NAME__` placeholders in them are expanded.

use crate::builder::Statement;
use crate::config::NamingConfig;
use crate::error::{QueryError, QueryResult};
use heck::ToSnakeCase;
use std::collections::BTreeMap;

/// Resolves logical entity names to physical table names.
#[derive(Debug, Clone, Default)]
pub struct TableResolver {
    naming: NamingConfig,
}

impl TableResolver {
    pub fn new(naming: NamingConfig) -> Self {
        Self { naming }
    }

    pub fn prefix(&self) -> &str {
        &self.naming.prefix
    }

    /// Resolve a logical name to a physical table name.
    ///
    /// - schema-qualified names (`public.users`) are returned as-is
    /// - `__NAME__` placeholders expand to `prefix + lowercase(NAME)`
    /// - names already carrying the prefix in snake_case are returned as-is
    /// - everything else becomes `prefix + snake_case(name)`
    pub fn resolve(&self, logical: &str) -> QueryResult<String> {
        let name = logical.trim();
        if name.is_empty() {
            return Err(QueryError::configuration("table name must not be empty"));
        }
        if name.contains('.') {
            return Ok(name.to_string());
        }
        if let Some(inner) = placeholder_inner(name) {
            return Ok(format!("{}{}", self.prefix(), inner.to_snake_case()));
        }
        if self.is_physical(name) {
            return Ok(name.to_string());
        }
        Ok(format!("{}{}", self.prefix(), name.to_snake_case()))
    }

    /// Expand a `__NAME__` placeholder; any other name is kept as given.
    pub fn expand(&self, name: &str) -> QueryResult<String> {
        let name = name.trim();
        if name.is_empty() {
            return Err(QueryError::configuration("table name must not be empty"));
        }
        match placeholder_inner(name) {
            Some(inner) => Ok(format!("{}{}", self.prefix(), inner.to_snake_case())),
            None => Ok(name.to_string()),
        }
    }

    fn is_physical(&self, name: &str) -> bool {
        let prefix = self.prefix();
        match name.strip_prefix(prefix) {
            Some(rest) if !prefix.is_empty() => !rest.is_empty() && rest == rest.to_snake_case(),
            _ => false,
        }
    }
}

/// `__USER_ROLE__` -> `USER_ROLE`
pub(crate) fn placeholder_inner(name: &str) -> Option<&str> {
    name.strip_prefix("__")
        .and_then(|s| s.strip_suffix("__"))
        .filter(|s| !s.is_empty())
}

/// Physical table -> alias mapping. Last registration for a table wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasRegistry {
    map: BTreeMap<String, String>,
}

impl AliasRegistry {
    pub fn register(&mut self, physical: impl Into<String>, alias: impl Into<String>) {
        self.map.insert(physical.into(), alias.into());
    }

    pub fn alias_of(&self, physical: &str) -> Option<&str> {
        self.map.get(physical).map(String::as_str)
    }

    pub fn remove(&mut self, physical: &str) -> Option<String> {
        self.map.remove(physical)
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter().map(|(t, a)| (t.as_str(), a.as_str()))
    }
}

/// The FROM source of a statement.
#[derive(Debug, Clone)]
pub enum TableSpec {
    Single(String),
    Aliased { name: String, alias: String },
    Multiple(Vec<TableSpec>),
    /// A rendered sub-select used as a FROM source.
    Derived {
        statement: Box<Statement>,
        alias: String,
    },
}

impl TableSpec {
    /// Parse `"user u, role r"` style input, expanding `__NAME__` placeholders
    /// and registering inline aliases. Other names are used verbatim.
    pub fn parse(
        input: &str,
        resolver: &TableResolver,
        aliases: &mut AliasRegistry,
    ) -> QueryResult<TableSpec> {
        let mut specs = Vec::new();
        for item in input.split(',') {
            let item = item.trim();
            if item.is_empty() {
                return Err(QueryError::invalid_input(format!(
                    "empty table entry in '{}'",
                    input
                )));
            }
            let mut words = item.split_whitespace();
            let name = words.next().unwrap_or_default();
            let alias = match (words.next(), words.next(), words.next()) {
                (None, _, _) => None,
                (Some(a), None, _) => Some(a),
                (Some(kw), Some(a), None) if kw.eq_ignore_ascii_case("as") => Some(a),
                _ => {
                    return Err(QueryError::invalid_input(format!(
                        "unsupported table expression '{}'",
                        item
                    )));
                }
            };
            let physical = resolver.expand(name)?;
            match alias {
                Some(alias) => {
                    aliases.register(physical.clone(), alias);
                    specs.push(TableSpec::Aliased {
                        name: physical,
                        alias: alias.to_string(),
                    });
                }
                None => specs.push(TableSpec::Single(physical)),
            }
        }
        Ok(match specs.len() {
            1 => specs.remove(0),
            _ => TableSpec::Multiple(specs),
        })
    }

    /// Physical name of the primary (first) table. Derived tables have none.
    pub fn primary_name(&self) -> Option<&str> {
        match self {
            TableSpec::Single(name) | TableSpec::Aliased { name, .. } => Some(name),
            TableSpec::Multiple(items) => items.first().and_then(TableSpec::primary_name),
            TableSpec::Derived { .. } => None,
        }
    }

    /// Whether `physical` is one of the FROM tables.
    pub fn contains(&self, physical: &str) -> bool {
        match self {
            TableSpec::Single(name) | TableSpec::Aliased { name, .. } => name == physical,
            TableSpec::Multiple(items) => items.iter().any(|t| t.contains(physical)),
            TableSpec::Derived { .. } => false,
        }
    }

    pub fn is_derived(&self) -> bool {
        matches!(self, TableSpec::Derived { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver(prefix: &str) -> TableResolver {
        TableResolver::new(NamingConfig::new().with_prefix(prefix))
    }

    #[test]
    fn resolve_applies_prefix_and_snake_case() {
        let r = resolver("app_");
        assert_eq!(r.resolve("UserRole").unwrap(), "app_user_role");
        assert_eq!(r.resolve("user").unwrap(), "app_user");
    }

    #[test]
    fn resolve_is_idempotent() {
        let r = resolver("app_");
        let once = r.resolve("UserRole").unwrap();
        assert_eq!(r.resolve(&once).unwrap(), once);

        let r = resolver("");
        assert_eq!(r.resolve("user_role").unwrap(), "user_role");
    }

    #[test]
    fn resolve_placeholders_and_qualified_names() {
        let r = resolver("app_");
        assert_eq!(r.resolve("__USER_ROLE__").unwrap(), "app_user_role");
        assert_eq!(r.resolve("public.Users").unwrap(), "public.Users");
    }

    #[test]
    fn resolve_empty_is_configuration_error() {
        let err = resolver("").resolve("  ").unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn alias_last_write_wins() {
        let mut aliases = AliasRegistry::default();
        aliases.register("users", "u");
        aliases.register("users", "x");
        assert_eq!(aliases.alias_of("users"), Some("x"));
    }

    #[test]
    fn parse_table_list() {
        let r = resolver("app_");
        let mut aliases = AliasRegistry::default();
        let spec = TableSpec::parse("app_user u, __ROLE__ AS r", &r, &mut aliases).unwrap();
        assert!(matches!(spec, TableSpec::Multiple(ref items) if items.len() == 2));
        assert_eq!(spec.primary_name(), Some("app_user"));
        assert_eq!(aliases.alias_of("app_user"), Some("u"));
        assert_eq!(aliases.alias_of("app_role"), Some("r"));
    }

    #[test]
    fn parse_keeps_explicit_names() {
        let r = resolver("app_");
        let mut aliases = AliasRegistry::default();
        let spec = TableSpec::parse("users", &r, &mut aliases).unwrap();
        assert_eq!(spec.primary_name(), Some("users"));
        let spec = TableSpec::parse("UserRole ur", &r, &mut aliases).unwrap();
        assert_eq!(spec.primary_name(), Some("UserRole"));
        assert_eq!(aliases.alias_of("UserRole"), Some("ur"));
    }

    #[test]
    fn parse_rejects_garbage() {
        let r = resolver("");
        let mut aliases = AliasRegistry::default();
        assert!(TableSpec::parse("a b c d", &r, &mut aliases).is_err());
        assert!(TableSpec::parse("a,,b", &r, &mut aliases).is_err());
    }
}
