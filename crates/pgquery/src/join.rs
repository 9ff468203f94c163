//! Join target parsing and join clauses.

use crate::condition::{Condition, ConditionGroup};
use crate::error::{QueryError, QueryResult};
use crate::ident::{AliasRegistry, TableResolver};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinKind {
    #[default]
    Inner,
    Left,
    Right,
    Full,
}

impl JoinKind {
    pub fn as_sql(&self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Right => "RIGHT JOIN",
            JoinKind::Full => "FULL JOIN",
        }
    }
}

impl FromStr for JoinKind {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "" | "INNER" => Ok(JoinKind::Inner),
            "LEFT" => Ok(JoinKind::Left),
            "RIGHT" => Ok(JoinKind::Right),
            "FULL" => Ok(JoinKind::Full),
            _ => Err(QueryError::invalid_input(format!("unknown join type '{}'", s))),
        }
    }
}

/// How the joined table was named by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinSource {
    /// `"profile"`, `"profile p"`, `"__PROFILE__"`, `"public.profile"`
    Text(String),
    /// Explicit `(table, alias)`, used as given.
    Pair(String, String),
}

impl From<&str> for JoinSource {
    fn from(s: &str) -> Self {
        JoinSource::Text(s.to_string())
    }
}

impl From<String> for JoinSource {
    fn from(s: String) -> Self {
        JoinSource::Text(s)
    }
}

impl<T: Into<String>, A: Into<String>> From<(T, A)> for JoinSource {
    fn from((table, alias): (T, A)) -> Self {
        JoinSource::Pair(table.into(), alias.into())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinTarget {
    pub table: String,
    pub alias: Option<String>,
}

/// Turn a join source into a physical table and optional alias.
///
/// A bare name with no schema qualifier and no `__` placeholder marker is its
/// own alias candidate. The alias is dropped when it equals the table name.
pub fn parse_join_target(
    source: JoinSource,
    resolver: &TableResolver,
) -> QueryResult<JoinTarget> {
    let (table, alias) = match source {
        JoinSource::Pair(table, alias) => (table, Some(alias)),
        JoinSource::Text(text) => {
            let text = text.trim();
            if text.is_empty() {
                return Err(QueryError::configuration("join table must not be empty"));
            }
            match text.split_once(' ') {
                Some((table, alias)) => {
                    let alias = alias.trim();
                    if alias.is_empty() || alias.contains(' ') {
                        return Err(QueryError::invalid_input(format!(
                            "unsupported join target '{}'",
                            text
                        )));
                    }
                    (resolver.resolve(table)?, Some(alias.to_string()))
                }
                None => {
                    let self_alias = (!text.contains('.') && !text.starts_with("__"))
                        .then(|| text.to_string());
                    (resolver.resolve(text)?, self_alias)
                }
            }
        }
    };
    let alias = alias.filter(|a| *a != table);
    Ok(JoinTarget { table, alias })
}

/// Join predicate.
#[derive(Debug, Clone)]
pub enum JoinOn {
    Raw(String),
    Conditions(ConditionGroup),
}

impl From<&str> for JoinOn {
    fn from(s: &str) -> Self {
        JoinOn::Raw(s.to_string())
    }
}

impl From<String> for JoinOn {
    fn from(s: String) -> Self {
        JoinOn::Raw(s)
    }
}

impl From<Condition> for JoinOn {
    fn from(c: Condition) -> Self {
        let mut group = ConditionGroup::new();
        group.push(
            crate::condition::Logic::And,
            None,
            crate::condition::ConditionNode::Condition(c),
        );
        JoinOn::Conditions(group)
    }
}

impl From<ConditionGroup> for JoinOn {
    fn from(g: ConditionGroup) -> Self {
        JoinOn::Conditions(g)
    }
}

#[derive(Debug, Clone)]
pub struct JoinClause {
    pub target: JoinTarget,
    pub kind: JoinKind,
    pub on: JoinOn,
}

/// One entry of a multi-join call: `(target, on, kind)`.
#[derive(Debug, Clone)]
pub struct JoinSpec {
    pub source: JoinSource,
    pub on: JoinOn,
    pub kind: JoinKind,
}

impl JoinSpec {
    pub fn new(source: impl Into<JoinSource>, on: impl Into<JoinOn>) -> Self {
        Self {
            source: source.into(),
            on: on.into(),
            kind: JoinKind::Inner,
        }
    }

    pub fn kind(mut self, kind: JoinKind) -> Self {
        self.kind = kind;
        self
    }

    /// Resolve the target, register its alias and produce the clause.
    pub(crate) fn into_clause(
        self,
        resolver: &TableResolver,
        aliases: &mut AliasRegistry,
    ) -> QueryResult<JoinClause> {
        let target = parse_join_target(self.source, resolver)?;
        if let Some(alias) = &target.alias {
            aliases.register(target.table.clone(), alias.clone());
        }
        Ok(JoinClause {
            target,
            kind: self.kind,
            on: self.on,
        })
    }
}
