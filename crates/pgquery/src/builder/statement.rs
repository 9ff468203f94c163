//! Rendered statements: SQL pieces plus the values bound to them.

use crate::bind::{BindEntry, BindTable};
use crate::condition::RawFragment;
use crate::config::PlaceholderStyle;
use crate::error::{QueryError, QueryResult};
use crate::value::Value;
use std::fmt::{self, Write};
use tokio_postgres::types::ToSql;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
}

impl StatementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatementKind::Select => "SELECT",
            StatementKind::Insert => "INSERT",
            StatementKind::Update => "UPDATE",
            StatementKind::Delete => "DELETE",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Part {
    Raw(String),
    /// Positional value; named `Bind_<n>` when rendered with named placeholders.
    Value(Value),
    /// Explicitly bound parameter referenced by name.
    Named(BindEntry),
}

/// A rendered SQL statement with its bound values captured alongside the text.
///
/// Placeholders are generated when the text is produced, so the same statement
/// can be rendered as `?`, `$n` or `:name`.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    kind: StatementKind,
    parts: Vec<Part>,
    style: PlaceholderStyle,
    auto_base: usize,
}

impl Statement {
    pub fn kind(&self) -> StatementKind {
        self.kind
    }

    pub fn style(&self) -> PlaceholderStyle {
        self.style
    }

    /// Same statement, rendered with a different placeholder style.
    pub fn with_style(mut self, style: PlaceholderStyle) -> Self {
        self.style = style;
        self
    }

    /// SQL text in the statement's own placeholder style.
    pub fn sql(&self) -> String {
        self.to_sql_with(self.style)
    }

    /// SQL text in the given placeholder style.
    pub fn to_sql_with(&self, style: PlaceholderStyle) -> String {
        let mut out = String::new();
        let mut position = 0usize;
        let mut auto = self.auto_base;
        for part in &self.parts {
            match part {
                Part::Raw(s) => out.push_str(s),
                Part::Value(_) => {
                    auto += 1;
                    match style {
                        PlaceholderStyle::Question => out.push('?'),
                        PlaceholderStyle::Dollar => {
                            position += 1;
                            let _ = write!(out, "${}", position);
                        }
                        PlaceholderStyle::Named => {
                            let _ = write!(out, ":Bind_{}", auto);
                        }
                    }
                }
                Part::Named(entry) => match style {
                    PlaceholderStyle::Question => out.push('?'),
                    PlaceholderStyle::Dollar => {
                        position += 1;
                        let _ = write!(out, "${}", position);
                    }
                    PlaceholderStyle::Named => {
                        let _ = write!(out, ":{}", entry.name);
                    }
                },
            }
        }
        out
    }

    /// Values in placeholder order (one per positional placeholder).
    pub fn params(&self) -> Vec<&Value> {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Value(v) => Some(v),
                Part::Named(entry) => Some(&entry.value),
                Part::Raw(_) => None,
            })
            .collect()
    }

    /// Parameter refs compatible with `tokio-postgres`.
    pub fn params_ref(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.params()
            .into_iter()
            .map(|v| v as &(dyn ToSql + Sync))
            .collect()
    }

    /// The bind table as seen by named placeholders: generated entries are
    /// named `Bind_<n>`, explicit entries appear once under their own name.
    pub fn binds(&self) -> Vec<BindEntry> {
        let mut out: Vec<BindEntry> = Vec::new();
        let mut auto = self.auto_base;
        for part in &self.parts {
            match part {
                Part::Raw(_) => {}
                Part::Value(v) => {
                    auto += 1;
                    out.push(BindEntry::new(format!("Bind_{}", auto), v.clone()));
                }
                Part::Named(entry) => {
                    if !out.iter().any(|e| e.name == entry.name) {
                        out.push(entry.clone());
                    }
                }
            }
        }
        out
    }

    pub fn param_count(&self) -> usize {
        self.parts.iter().filter(|p| !matches!(p, Part::Raw(_))).count()
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql())
    }
}

/// Accumulates statement parts while a statement is rendered.
#[derive(Debug, Default)]
pub(crate) struct StatementBuilder {
    parts: Vec<Part>,
}

impl StatementBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, sql: &str) -> &mut Self {
        if sql.is_empty() {
            return self;
        }
        match self.parts.last_mut() {
            Some(Part::Raw(last)) => last.push_str(sql),
            _ => self.parts.push(Part::Raw(sql.to_string())),
        }
        self
    }

    pub(crate) fn push_value(&mut self, value: Value) -> &mut Self {
        self.parts.push(Part::Value(value));
        self
    }

    /// `?, ?, ?` for each item.
    pub(crate) fn push_value_list(&mut self, values: &[Value]) -> &mut Self {
        for (i, v) in values.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.push_value(v.clone());
        }
        self
    }

    /// Splice another statement (e.g. a sub-select) in place.
    pub(crate) fn push_statement(&mut self, stmt: &Statement) -> &mut Self {
        for part in &stmt.parts {
            match part {
                Part::Raw(s) => {
                    self.push(s);
                }
                other => self.parts.push(other.clone()),
            }
        }
        self
    }

    /// Splice a raw fragment verbatim. `?` consumes the fragment's own binds in
    /// order; `:name` refers to an explicit bind in `binds`. Quoted text and
    /// `::` casts are left alone.
    pub(crate) fn push_raw(&mut self, raw: &RawFragment, binds: &BindTable) -> QueryResult<()> {
        let sql = raw.sql.as_str();
        let mut own = raw.binds.iter();
        let mut text = String::new();
        let mut chars = sql.char_indices().peekable();
        let mut in_quote = false;

        while let Some((i, c)) = chars.next() {
            if in_quote {
                text.push(c);
                if c == '\'' {
                    in_quote = false;
                }
                continue;
            }
            match c {
                '\'' => {
                    in_quote = true;
                    text.push(c);
                }
                '?' => {
                    let value = own.next().ok_or_else(|| {
                        QueryError::invalid_input(format!(
                            "raw fragment '{}' has more placeholders than binds",
                            sql
                        ))
                    })?;
                    self.push(&text);
                    text.clear();
                    self.push_value(value.clone());
                }
                ':' if matches!(chars.peek(), Some((_, ':'))) => {
                    text.push_str("::");
                    chars.next();
                }
                ':' => {
                    let start = i + 1;
                    let mut end = start;
                    while let Some(&(j, n)) = chars.peek() {
                        if n.is_ascii_alphanumeric() || n == '_' {
                            end = j + n.len_utf8();
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    let name = &sql[start..end];
                    match binds.get(name) {
                        Some(entry) if !name.is_empty() => {
                            self.push(&text);
                            text.clear();
                            self.parts.push(Part::Named(entry.clone()));
                        }
                        _ => {
                            text.push(':');
                            text.push_str(name);
                        }
                    }
                }
                _ => text.push(c),
            }
        }
        self.push(&text);

        if own.next().is_some() {
            return Err(QueryError::invalid_input(format!(
                "raw fragment '{}' has more binds than placeholders",
                sql
            )));
        }
        Ok(())
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Append everything accumulated in `other`.
    pub(crate) fn append(&mut self, other: StatementBuilder) -> &mut Self {
        for part in other.parts {
            match part {
                Part::Raw(s) => {
                    self.push(&s);
                }
                p => self.parts.push(p),
            }
        }
        self
    }

    pub(crate) fn finish(
        self,
        kind: StatementKind,
        style: PlaceholderStyle,
        auto_base: usize,
    ) -> Statement {
        Statement {
            kind,
            parts: self.parts,
            style,
            auto_base,
        }
    }
}
