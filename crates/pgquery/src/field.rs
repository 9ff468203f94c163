//! SELECT field lists.

use crate::connection::Connection;
use crate::error::{QueryError, QueryResult};

/// One entry of a field list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldItem {
    Column(String),
    Qualified { table: String, column: String },
    Aliased { expr: String, alias: String },
    /// `*`
    AllColumns,
    /// Every column of `table`, expanded from schema metadata before rendering.
    TableColumns {
        table: String,
        /// Qualifier written before each column (`prefix.col`).
        prefix: Option<String>,
        /// When set, each column is selected as `prefix.col AS {alias_prefix}col`.
        alias_prefix: Option<String>,
        except: Vec<String>,
    },
}

impl FieldItem {
    /// Parse a single item: `*`, `col`, `t.col`, `expr AS alias`.
    pub fn parse(item: &str) -> Option<FieldItem> {
        let item = item.trim();
        if item.is_empty() {
            return None;
        }
        if item == "*" {
            return Some(FieldItem::AllColumns);
        }
        if let Some((expr, alias)) = split_alias(item) {
            return Some(FieldItem::Aliased {
                expr: expr.to_string(),
                alias: alias.to_string(),
            });
        }
        if let Some((table, column)) = item.split_once('.') {
            let simple = |s: &str| s.chars().all(|c| c == '_' || c == '*' || c.is_alphanumeric());
            if simple(table) && simple(column) {
                return Some(FieldItem::Qualified {
                    table: table.to_string(),
                    column: column.to_string(),
                });
            }
        }
        Some(FieldItem::Column(item.to_string()))
    }

    fn render(&self) -> QueryResult<String> {
        Ok(match self {
            FieldItem::Column(c) => c.clone(),
            FieldItem::Qualified { table, column } => format!("{}.{}", table, column),
            FieldItem::Aliased { expr, alias } => format!("{} AS {}", expr, alias),
            FieldItem::AllColumns => "*".to_string(),
            FieldItem::TableColumns {
                table,
                prefix,
                alias_prefix: None,
                except,
            } if except.is_empty() => match prefix {
                Some(prefix) => format!("{}.*", prefix),
                None => format!("{}.*", table),
            },
            FieldItem::TableColumns { table, .. } => {
                return Err(QueryError::render(format!(
                    "columns of '{}' were not resolved against the schema",
                    table
                )));
            }
        })
    }
}

/// `expr AS alias` (case-insensitive `AS`, outside parentheses).
fn split_alias(item: &str) -> Option<(&str, &str)> {
    let upper = item.to_ascii_uppercase();
    let idx = upper.rfind(" AS ")?;
    if item[idx..].contains(')') {
        return None;
    }
    let expr = item[..idx].trim();
    let alias = item[idx + 4..].trim();
    (!expr.is_empty() && !alias.is_empty()).then_some((expr, alias))
}

/// Split on `sep` outside parentheses and quotes.
pub(crate) fn split_top_level(input: &str, sep: char) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut in_quote = false;
    let mut start = 0;
    for (i, c) in input.char_indices() {
        match c {
            '\'' => in_quote = !in_quote,
            '(' if !in_quote => depth += 1,
            ')' if !in_quote => depth -= 1,
            c if c == sep && depth == 0 && !in_quote => {
                out.push(&input[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    out.push(&input[start..]);
    out
}

/// Ordered, de-duplicated field list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSpec {
    items: Vec<FieldItem>,
}

impl FieldSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// `*`
    pub fn all() -> Self {
        Self {
            items: vec![FieldItem::AllColumns],
        }
    }

    /// Parse a comma-separated list (`"id, u.name, COUNT(*) AS n"`).
    pub fn parse(list: &str) -> Self {
        let mut spec = Self::new();
        for item in split_top_level(list, ',') {
            if let Some(item) = FieldItem::parse(item) {
                spec.push(item);
            }
        }
        spec
    }

    /// Append unless an equal item is already present.
    pub fn push(&mut self, item: FieldItem) {
        if !self.items.contains(&item) {
            self.items.push(item);
        }
    }

    pub fn extend(&mut self, other: FieldSpec) {
        for item in other.items {
            self.push(item);
        }
    }

    pub fn items(&self) -> &[FieldItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Whether rendering needs [`FieldSpec::resolve`] first.
    pub fn needs_schema(&self) -> bool {
        self.items.iter().any(|item| {
            matches!(item, FieldItem::TableColumns { except, alias_prefix, .. }
                if !except.is_empty() || alias_prefix.is_some())
        })
    }

    /// Expand every [`FieldItem::TableColumns`] using the table's schema.
    pub async fn resolve(&mut self, conn: &impl Connection) -> QueryResult<()> {
        if !self.needs_schema() {
            return Ok(());
        }
        let mut resolved = FieldSpec::new();
        for item in std::mem::take(&mut self.items) {
            let (table, prefix, alias_prefix, except) = match item {
                FieldItem::TableColumns {
                    table,
                    prefix,
                    alias_prefix,
                    except,
                } => (table, prefix, alias_prefix, except),
                other => {
                    resolved.push(other);
                    continue;
                }
            };
            let info = conn.table_info(&table).await?;
            for column in info.fields.iter().filter(|c| !except.contains(c)) {
                let qualified = match &prefix {
                    Some(p) => format!("{}.{}", p, column),
                    None => column.clone(),
                };
                let item = match &alias_prefix {
                    Some(ap) => FieldItem::Aliased {
                        expr: qualified,
                        alias: format!("{}{}", ap, column),
                    },
                    None => FieldItem::parse(&qualified)
                        .unwrap_or_else(|| FieldItem::Column(qualified.clone())),
                };
                resolved.push(item);
            }
        }
        self.items = resolved.items;
        Ok(())
    }

    /// `a, b, c`
    pub fn render(&self) -> QueryResult<String> {
        if self.items.is_empty() {
            return Ok("*".to_string());
        }
        let rendered = self
            .items
            .iter()
            .map(FieldItem::render)
            .collect::<QueryResult<Vec<_>>>()?;
        Ok(rendered.join(", "))
    }
}
