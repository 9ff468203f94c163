//! The typed option state accumulated by a [`Query`](crate::Query).

use crate::bind::BindTable;
use crate::condition::{Condition, ConditionGroup, Logic};
use crate::error::{QueryError, QueryResult};
use crate::field::FieldSpec;
use crate::ident::{AliasRegistry, TableSpec};
use crate::join::JoinClause;
use crate::record::Record;
use crate::value::Value;
use tracing::trace;

/// Lifecycle of an option state. Rendering requires `Finalized`; any setter
/// moves the state back to `Accumulating`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stage {
    #[default]
    Empty,
    Accumulating,
    Finalized,
}

/// `LIMIT length [OFFSET offset]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limit {
    pub offset: Option<u64>,
    pub length: u64,
}

impl Limit {
    pub fn new(length: u64) -> Self {
        Self {
            offset: None,
            length,
        }
    }

    pub fn with_offset(offset: u64, length: u64) -> Self {
        Self {
            offset: Some(offset),
            length,
        }
    }

    /// `"10"` or `"offset,length"`.
    pub fn parse(s: &str) -> QueryResult<Self> {
        let num = |p: &str| {
            p.trim()
                .parse::<u64>()
                .map_err(|_| QueryError::invalid_input(format!("invalid limit '{}'", s)))
        };
        match s.split_once(',') {
            Some((offset, length)) => Ok(Self::with_offset(num(offset)?, num(length)?)),
            None => Ok(Self::new(num(s)?)),
        }
    }
}

/// Rows whose `field` differs from `value` are considered deleted.
/// A `Null` value means "not deleted while the field is NULL".
#[derive(Debug, Clone, PartialEq)]
pub struct SoftDeleteRule {
    pub field: String,
    pub value: Value,
}

impl SoftDeleteRule {
    pub fn new(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Condition selecting live rows, qualified with `alias` when given.
    pub(crate) fn condition(&self, alias: Option<&str>) -> Condition {
        let column = match alias {
            Some(a) if !self.field.contains('.') => format!("{}.{}", a, self.field),
            _ => self.field.clone(),
        };
        Condition::matching(column, self.value.clone())
    }
}

/// Names of removable options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKey {
    Table,
    Alias,
    Field,
    Join,
    Where,
    Group,
    Having,
    Order,
    Limit,
    Data,
    FetchSql,
    Strict,
    AllowEmpty,
    With,
    WithJoin,
    SoftDelete,
    WithTrashed,
    Bind,
}

/// Everything a query has accumulated. Unset options are `None` until
/// [`OptionState::finalize`] fills their defaults.
#[derive(Debug, Clone, Default)]
pub struct OptionState {
    pub(crate) table: Option<TableSpec>,
    pub(crate) aliases: AliasRegistry,
    pub(crate) fields: Option<FieldSpec>,
    pub(crate) joins: Option<Vec<JoinClause>>,
    pub(crate) filters: Option<ConditionGroup>,
    pub(crate) group: Option<String>,
    pub(crate) having: Option<String>,
    pub(crate) order: Option<String>,
    pub(crate) limit: Option<Limit>,
    pub(crate) data: Option<Record>,
    /// `column = <sql>` assignments for UPDATE (`inc`, `dec`, `exp`).
    pub(crate) data_exprs: Vec<(String, String)>,
    pub(crate) fetch_sql: Option<bool>,
    pub(crate) strict: Option<bool>,
    pub(crate) allow_empty: bool,
    pub(crate) eager_loads: Vec<String>,
    pub(crate) eager_join_loads: Vec<String>,
    pub(crate) soft_delete: Option<SoftDeleteRule>,
    pub(crate) with_trashed: bool,
    pub(crate) binds: BindTable,
    pub(crate) stage: Stage,
}

impl OptionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the state as modified.
    pub(crate) fn touch(&mut self) -> &mut Self {
        self.stage = Stage::Accumulating;
        self
    }

    pub(crate) fn filters_mut(&mut self) -> &mut ConditionGroup {
        self.touch();
        self.filters.get_or_insert_with(ConditionGroup::new)
    }

    pub(crate) fn fields_mut(&mut self) -> &mut FieldSpec {
        self.touch();
        self.fields.get_or_insert_with(FieldSpec::new)
    }

    pub(crate) fn joins_mut(&mut self) -> &mut Vec<JoinClause> {
        self.touch();
        self.joins.get_or_insert_with(Vec::new)
    }

    pub(crate) fn data_mut(&mut self) -> &mut Record {
        self.touch();
        self.data.get_or_insert_with(Record::new)
    }

    /// Fill defaults for every unset option without overwriting explicit ones.
    ///
    /// `default_table` is only called when no table was set.
    pub fn finalize(
        &mut self,
        default_table: impl FnOnce() -> QueryResult<String>,
        strict_default: bool,
    ) -> QueryResult<()> {
        if self.table.is_none() {
            self.table = Some(TableSpec::Single(default_table()?));
        }
        match &mut self.fields {
            Some(fields) if !fields.is_empty() => {}
            slot => *slot = Some(FieldSpec::all()),
        }
        self.data.get_or_insert_with(Record::new);
        self.joins.get_or_insert_with(Vec::new);
        self.filters.get_or_insert_with(ConditionGroup::new);
        self.fetch_sql.get_or_insert(false);
        self.strict.get_or_insert(strict_default);
        if self.stage != Stage::Finalized {
            trace!(
                target: "pgquery.sql",
                table = ?self.primary_table(),
                "query options finalized"
            );
        }
        self.stage = Stage::Finalized;
        Ok(())
    }

    /// Drop every option and the bind table.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Drop a single option.
    pub fn remove(&mut self, key: OptionKey) {
        match key {
            OptionKey::Table => self.table = None,
            OptionKey::Alias => self.aliases.clear(),
            OptionKey::Field => self.fields = None,
            OptionKey::Join => self.joins = None,
            OptionKey::Where => self.filters = None,
            OptionKey::Group => self.group = None,
            OptionKey::Having => self.having = None,
            OptionKey::Order => self.order = None,
            OptionKey::Limit => self.limit = None,
            OptionKey::Data => {
                self.data = None;
                self.data_exprs.clear();
            }
            OptionKey::FetchSql => self.fetch_sql = None,
            OptionKey::Strict => self.strict = None,
            OptionKey::AllowEmpty => self.allow_empty = false,
            OptionKey::With => self.eager_loads.clear(),
            OptionKey::WithJoin => self.eager_join_loads.clear(),
            OptionKey::SoftDelete => self.soft_delete = None,
            OptionKey::WithTrashed => self.with_trashed = false,
            OptionKey::Bind => self.binds.clear(),
        }
        self.touch();
    }

    /// Drop the conditions on `field` from the `logic` bucket.
    pub fn remove_where_field(&mut self, field: &str, logic: Logic) -> bool {
        let removed = self
            .filters
            .as_mut()
            .is_some_and(|f| f.remove_field(logic, field));
        if removed {
            self.touch();
        }
        removed
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn table(&self) -> Option<&TableSpec> {
        self.table.as_ref()
    }

    /// Physical name of the primary table, if one is set.
    pub fn primary_table(&self) -> Option<&str> {
        self.table.as_ref().and_then(TableSpec::primary_name)
    }

    /// Alias under which the primary table is referenced.
    pub fn primary_alias(&self) -> Option<&str> {
        match self.table.as_ref()? {
            TableSpec::Derived { alias, .. } => Some(alias.as_str()),
            spec => spec.primary_name().and_then(|t| self.aliases.alias_of(t)),
        }
    }

    pub fn aliases(&self) -> &AliasRegistry {
        &self.aliases
    }

    pub fn fields(&self) -> Option<&FieldSpec> {
        self.fields.as_ref()
    }

    pub fn joins(&self) -> &[JoinClause] {
        self.joins.as_deref().unwrap_or_default()
    }

    pub fn filters(&self) -> Option<&ConditionGroup> {
        self.filters.as_ref()
    }

    pub fn has_filters(&self) -> bool {
        self.filters.as_ref().is_some_and(|f| !f.is_empty())
    }

    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    pub fn order(&self) -> Option<&str> {
        self.order.as_deref()
    }

    pub fn limit(&self) -> Option<Limit> {
        self.limit
    }

    pub fn data(&self) -> Option<&Record> {
        self.data.as_ref()
    }

    pub fn fetch_sql(&self) -> bool {
        self.fetch_sql.unwrap_or(false)
    }

    pub fn strict(&self) -> Option<bool> {
        self.strict
    }

    pub fn allow_empty(&self) -> bool {
        self.allow_empty
    }

    pub fn eager_loads(&self) -> &[String] {
        &self.eager_loads
    }

    pub fn eager_join_loads(&self) -> &[String] {
        &self.eager_join_loads
    }

    pub fn soft_delete(&self) -> Option<&SoftDeleteRule> {
        self.soft_delete.as_ref()
    }

    pub fn binds(&self) -> &BindTable {
        &self.binds
    }

    /// The soft-delete condition to inject at render time, if it applies.
    pub(crate) fn soft_delete_condition(&self) -> Option<Condition> {
        if self.with_trashed || self.table.as_ref().is_some_and(TableSpec::is_derived) {
            return None;
        }
        let rule = self.soft_delete.as_ref()?;
        Some(rule.condition(self.primary_alias()))
    }
}
