//! The fluent query accumulator.
//!
//! Setters only touch the in-memory [`OptionState`]; nothing is executed until
//! a terminal operation (see `terminal.rs`) is awaited.
//!
//! ```ignore
//! use pgquery::{Query, QueryConfig, Record};
//!
//! let mut q = Query::new(QueryConfig::new().with_prefix("app_"));
//! let users = q
//!     .table("app_user u")?
//!     .field("u.id, u.name")
//!     .where_(("u.status", 1))?
//!     .order("u.id DESC")
//!     .limit(10)
//!     .select(&client)
//!     .await?;
//! ```
//!
//! A `Query` keeps its options after a terminal operation. Running a second
//! terminal operation re-renders the current options, including binds and
//! aliases from earlier calls; call [`Query::clear`] to start over.

mod terminal;

#[cfg(test)]
mod tests;

pub use terminal::Fetched;

use crate::bind::BindEntry;
use crate::builder::{Statement, build_select};
use crate::condition::{Condition, ConditionGroup, ConditionNode, Logic, Operand, Operator};
use crate::config::QueryConfig;
use crate::error::{QueryError, QueryResult};
use crate::field::{FieldItem, FieldSpec};
use crate::filter::{FilterInput, primary_key_condition};
use crate::ident::{TableResolver, TableSpec};
use crate::join::{JoinKind, JoinOn, JoinSource, JoinSpec, JoinTarget};
use crate::options::{Limit, OptionKey, OptionState, SoftDeleteRule};
use crate::record::Record;
use crate::relation::EntityModel;
use crate::value::{ParamType, Value};
use heck::{ToLowerCamelCase, ToSnakeCase};
use std::fmt;
use std::sync::Arc;

/// Accumulates query options and runs terminal operations against a
/// [`Connection`](crate::Connection).
#[derive(Clone)]
pub struct Query {
    config: QueryConfig,
    resolver: TableResolver,
    name: Option<String>,
    pk: Option<String>,
    model: Option<Arc<dyn EntityModel>>,
    options: OptionState,
    last_sql: Option<String>,
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("name", &self.name)
            .field("model", &self.model.as_ref().map(|m| m.name().to_string()))
            .field("options", &self.options)
            .field("last_sql", &self.last_sql)
            .finish()
    }
}

fn default_table(
    resolver: &TableResolver,
    name: Option<&str>,
    model: Option<&Arc<dyn EntityModel>>,
) -> QueryResult<String> {
    match name.or(model.map(|m| m.name())) {
        Some(name) => resolver.resolve(name),
        None => Err(QueryError::configuration(
            "no table resolvable: set a table, a name or a model",
        )),
    }
}

impl Query {
    pub fn new(config: QueryConfig) -> Self {
        Self {
            resolver: TableResolver::new(config.naming.clone()),
            config,
            name: None,
            pk: None,
            model: None,
            options: OptionState::new(),
            last_sql: None,
        }
    }

    /// A query serving `model`: its name is the default table, and its primary
    /// key and soft-delete rule apply.
    pub fn for_model(config: QueryConfig, model: Arc<dyn EntityModel>) -> Self {
        let mut query = Self::new(config);
        query.options.soft_delete = model.soft_delete();
        query.model = Some(model);
        query
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    pub fn options(&self) -> &OptionState {
        &self.options
    }

    /// SQL of the most recently rendered terminal statement.
    pub fn last_sql(&self) -> Option<&str> {
        self.last_sql.as_deref()
    }

    // ==================== Tables ====================

    /// Set the FROM table(s): `"user"`, `"user u"`, `"user u, role r"`.
    ///
    /// Names are physical and used as given, except `__NAME__` placeholders
    /// which expand to `prefix + name`. Use [`Query::name`] for a logical name.
    pub fn table(&mut self, spec: &str) -> QueryResult<&mut Self> {
        let spec = TableSpec::parse(spec, &self.resolver, &mut self.options.aliases)?;
        self.options.table = Some(spec);
        self.options.touch();
        Ok(self)
    }

    /// Logical entity name used when no table is set.
    pub fn name(&mut self, logical: impl Into<String>) -> &mut Self {
        self.name = Some(logical.into());
        self.options.touch();
        self
    }

    /// Primary key column used by the pk shorthands.
    pub fn pk(&mut self, column: impl Into<String>) -> &mut Self {
        self.pk = Some(column.into());
        self
    }

    /// Alias the primary table.
    pub fn alias(&mut self, alias: &str) -> QueryResult<&mut Self> {
        let table = self.primary_table()?;
        self.alias_for(&table, alias)
    }

    /// Alias any table. A table already in the statement is used as given,
    /// anything else is resolved as a logical name (`__USER__`, `User`).
    pub fn alias_for(&mut self, table: &str, alias: &str) -> QueryResult<&mut Self> {
        let alias = alias.trim();
        if alias.is_empty() {
            return Err(QueryError::invalid_input("alias must not be empty"));
        }
        let physical = self.physical_name(table)?;
        self.options.aliases.register(physical, alias);
        self.options.touch();
        Ok(self)
    }

    /// Physical primary table: the explicit table, else the resolved name.
    pub fn primary_table(&self) -> QueryResult<String> {
        match self.options.primary_table() {
            Some(table) => Ok(table.to_string()),
            None => default_table(&self.resolver, self.name.as_deref(), self.model.as_ref()),
        }
    }

    fn physical_name(&self, table: &str) -> QueryResult<String> {
        let table = table.trim();
        let in_statement = self
            .options
            .table
            .as_ref()
            .is_some_and(|spec| spec.contains(table))
            || self
                .options
                .joins
                .iter()
                .flatten()
                .any(|j| j.target.table == table);
        if in_statement {
            Ok(table.to_string())
        } else {
            self.resolver.resolve(table)
        }
    }

    fn primary_alias(&self) -> Option<String> {
        if let Some(alias) = self.options.primary_alias() {
            return Some(alias.to_string());
        }
        let table = self.primary_table().ok()?;
        self.options.aliases.alias_of(&table).map(str::to_string)
    }

    // ==================== Fields ====================

    /// Add comma-separated fields; duplicates are dropped.
    pub fn field(&mut self, list: &str) -> &mut Self {
        self.options.fields_mut().extend(FieldSpec::parse(list));
        self
    }

    /// Every column of the primary table except `except`.
    pub fn field_except(&mut self, except: &[&str]) -> QueryResult<&mut Self> {
        let table = self.primary_table()?;
        self.options.fields_mut().push(FieldItem::TableColumns {
            table,
            prefix: None,
            alias_prefix: None,
            except: except.iter().map(|c| c.to_string()).collect(),
        });
        Ok(self)
    }

    /// Every column of `table` except `except`, qualified with the table's
    /// alias (or name).
    pub fn field_of(&mut self, table: &str, except: &[&str]) -> QueryResult<&mut Self> {
        let physical = self.physical_name(table)?;
        let prefix = self
            .options
            .aliases
            .alias_of(&physical)
            .unwrap_or(&physical)
            .to_string();
        self.options.fields_mut().push(FieldItem::TableColumns {
            table: physical,
            prefix: Some(prefix),
            alias_prefix: None,
            except: except.iter().map(|c| c.to_string()).collect(),
        });
        Ok(self)
    }

    // ==================== Joins ====================

    /// `INNER JOIN`.
    pub fn join(
        &mut self,
        target: impl Into<JoinSource>,
        on: impl Into<JoinOn>,
    ) -> QueryResult<&mut Self> {
        self.join_kind(target, on, JoinKind::Inner)
    }

    pub fn left_join(
        &mut self,
        target: impl Into<JoinSource>,
        on: impl Into<JoinOn>,
    ) -> QueryResult<&mut Self> {
        self.join_kind(target, on, JoinKind::Left)
    }

    pub fn right_join(
        &mut self,
        target: impl Into<JoinSource>,
        on: impl Into<JoinOn>,
    ) -> QueryResult<&mut Self> {
        self.join_kind(target, on, JoinKind::Right)
    }

    pub fn full_join(
        &mut self,
        target: impl Into<JoinSource>,
        on: impl Into<JoinOn>,
    ) -> QueryResult<&mut Self> {
        self.join_kind(target, on, JoinKind::Full)
    }

    pub fn join_kind(
        &mut self,
        target: impl Into<JoinSource>,
        on: impl Into<JoinOn>,
        kind: JoinKind,
    ) -> QueryResult<&mut Self> {
        self.join_many([JoinSpec::new(target, on).kind(kind)])
    }

    /// Several joins at once, appended in order.
    pub fn join_many(&mut self, specs: impl IntoIterator<Item = JoinSpec>) -> QueryResult<&mut Self> {
        for spec in specs {
            let clause = spec.into_clause(&self.resolver, &mut self.options.aliases)?;
            self.options.joins_mut().push(clause);
        }
        Ok(self)
    }

    // ==================== Eager loading ====================

    fn model(&self) -> QueryResult<&Arc<dyn EntityModel>> {
        self.model
            .as_ref()
            .ok_or_else(|| QueryError::configuration("eager loading needs a model"))
    }

    /// Request relations to be loaded by the entity layer after the main query.
    pub fn with(&mut self, relations: &[&str]) -> QueryResult<&mut Self> {
        let model = Arc::clone(self.model()?);
        for name in relations {
            let name = name.to_lower_camel_case();
            if model.relation(&name).is_none() {
                return Err(QueryError::invalid_input(format!(
                    "model '{}' has no relation '{}'",
                    model.name(),
                    name
                )));
            }
            if !self.options.eager_loads.contains(&name) {
                self.options.eager_loads.push(name);
            }
        }
        self.options.touch();
        Ok(self)
    }

    /// Load one-to-one relations through an `INNER JOIN`.
    pub fn with_join(&mut self, relations: &[&str]) -> QueryResult<&mut Self> {
        self.with_join_kind(relations, JoinKind::Inner)
    }

    /// Load one-to-one relations through a join of `kind`.
    ///
    /// The first relation aliases the primary table as the snake_case model
    /// name, unless it already has an alias, and selects its columns under
    /// that alias. Each relation's columns
    /// are selected as `<relation>__<column>`.
    pub fn with_join_kind(&mut self, relations: &[&str], kind: JoinKind) -> QueryResult<&mut Self> {
        let model = Arc::clone(self.model()?);
        let parent_alias = self
            .primary_alias()
            .unwrap_or_else(|| model.name().to_snake_case());

        for name in relations {
            let name = name.to_lower_camel_case();
            let relation = model.relation(&name).ok_or_else(|| {
                QueryError::invalid_input(format!(
                    "model '{}' has no relation '{}'",
                    model.name(),
                    name
                ))
            })?;
            if !relation.kind.is_one_to_one() {
                return Err(QueryError::invalid_input(format!(
                    "with_join only supports one-to-one relations; '{}' is {:?}",
                    name, relation.kind
                )));
            }

            if self.options.eager_join_loads.is_empty() {
                let table = self.primary_table()?;
                self.options.aliases.register(table.clone(), parent_alias.clone());
                self.options.fields_mut().push(FieldItem::TableColumns {
                    table,
                    prefix: Some(parent_alias.clone()),
                    alias_prefix: None,
                    except: Vec::new(),
                });
            }

            let related_alias = name.to_snake_case();
            let related_table = self.resolver.resolve(&relation.model)?;
            self.options.fields_mut().push(FieldItem::TableColumns {
                table: related_table.clone(),
                prefix: Some(related_alias.clone()),
                alias_prefix: Some(format!("{}__", related_alias)),
                except: Vec::new(),
            });

            let (left, right) = relation.join_columns(&parent_alias, &related_alias);
            self.options
                .aliases
                .register(related_table.clone(), related_alias.clone());
            self.options.joins_mut().push(crate::join::JoinClause {
                target: JoinTarget {
                    table: related_table,
                    alias: Some(related_alias),
                },
                kind,
                on: JoinOn::from(Condition::columns_eq(left, right)),
            });
            if !self.options.eager_join_loads.contains(&name) {
                self.options.eager_join_loads.push(name);
            }
        }
        Ok(self)
    }

    // ==================== Filters ====================

    fn add_filter(&mut self, logic: Logic, input: impl Into<FilterInput>) -> QueryResult<&mut Self> {
        self.options.filters_mut().add(logic, input)?;
        Ok(self)
    }

    /// Add a filter to the `AND` bucket. Accepts any [`FilterInput`], a
    /// `(field, value)` pair, a [`Condition`] or a [`RawFragment`](crate::RawFragment).
    pub fn where_(&mut self, input: impl Into<FilterInput>) -> QueryResult<&mut Self> {
        self.add_filter(Logic::And, input)
    }

    /// Add a filter to the `OR` bucket.
    pub fn where_or(&mut self, input: impl Into<FilterInput>) -> QueryResult<&mut Self> {
        self.add_filter(Logic::Or, input)
    }

    /// `field = value` (a list gives `IN`). Unlike a `(field, value)` pair the
    /// field is never taken for a raw expression.
    pub fn where_eq(&mut self, field: &str, value: impl Into<Value>) -> QueryResult<&mut Self> {
        self.add_filter(
            Logic::And,
            FilterInput::Pair(field.to_string(), value.into()),
        )
    }

    /// `field <op> value`, operator given as text (`">="`, `"not in"`, ...).
    pub fn where_op(
        &mut self,
        field: &str,
        op: &str,
        value: impl Into<Value>,
    ) -> QueryResult<&mut Self> {
        self.add_filter(Logic::And, FilterInput::op(field, op, value)?)
    }

    pub fn where_or_op(
        &mut self,
        field: &str,
        op: &str,
        value: impl Into<Value>,
    ) -> QueryResult<&mut Self> {
        self.add_filter(Logic::Or, FilterInput::op(field, op, value)?)
    }

    pub fn where_in(&mut self, field: &str, values: impl Into<Value>) -> QueryResult<&mut Self> {
        self.add_filter(
            Logic::And,
            FilterInput::triple(field, Operator::In, Operand::Value(values.into())),
        )
    }

    pub fn where_null(&mut self, field: &str) -> QueryResult<&mut Self> {
        self.add_filter(
            Logic::And,
            FilterInput::triple(field, Operator::IsNull, Operand::None),
        )
    }

    /// `field IN (<sub-select>)`
    pub fn where_in_sub(&mut self, field: &str, sub: Statement) -> QueryResult<&mut Self> {
        self.add_filter(
            Logic::And,
            FilterInput::triple(field, Operator::In, Operand::from(sub)),
        )
    }

    /// Raw SQL with `?` placeholders for `binds`; `:name` refers to explicit binds.
    pub fn where_raw(&mut self, sql: &str, binds: Vec<Value>) -> QueryResult<&mut Self> {
        self.add_filter(Logic::And, FilterInput::raw(sql, binds))
    }

    /// A nested, parenthesized group built by `f`.
    pub fn where_fn<F>(&mut self, f: F) -> QueryResult<&mut Self>
    where
        F: FnOnce(&mut ConditionGroup) -> QueryResult<()> + Send + 'static,
    {
        self.add_filter(Logic::And, FilterInput::predicate(f))
    }

    /// Primary-key shorthand: a scalar, a list or a comma-joined string.
    ///
    /// A later pk filter replaces an earlier one.
    pub fn where_pk(&mut self, value: impl Into<Value>) -> QueryResult<&mut Self> {
        let pk = self.known_pk().ok_or_else(|| {
            QueryError::unresolved_pk(self.primary_table().unwrap_or_default())
        })?;
        self.where_pk_named(&pk, value.into())
    }

    fn known_pk(&self) -> Option<String> {
        self.pk
            .clone()
            .or_else(|| self.model.as_ref().and_then(|m| m.pk().map(str::to_string)))
    }

    pub(crate) fn where_pk_named(&mut self, pk: &str, value: Value) -> QueryResult<&mut Self> {
        let alias = self.primary_alias();
        let condition = primary_key_condition(pk, alias.as_deref(), value)?;
        self.options
            .filters_mut()
            .replace(Logic::And, pk, ConditionNode::Condition(condition));
        Ok(self)
    }

    /// Drop every condition on `field` from the `logic` bucket, keyed or not.
    pub fn remove_where_field(&mut self, field: &str, logic: Logic) -> &mut Self {
        self.options.remove_where_field(field, logic);
        self
    }

    // ==================== Binds ====================

    /// Bind a value under a generated name (`Bind_<n>`) and return the name,
    /// for use as `:Bind_<n>` in raw SQL.
    pub fn bind(&mut self, value: impl Into<Value>) -> String {
        self.options.touch();
        self.options.binds.bind(value)
    }

    pub fn bind_named(&mut self, name: &str, value: impl Into<Value>) -> &mut Self {
        self.options.binds.insert(BindEntry::new(name, value));
        self.options.touch();
        self
    }

    /// Bind a value coerced to `ty`.
    pub fn bind_typed(
        &mut self,
        name: &str,
        value: impl Into<Value>,
        ty: ParamType,
    ) -> QueryResult<&mut Self> {
        self.options.binds.insert(BindEntry::typed(name, value, ty)?);
        self.options.touch();
        Ok(self)
    }

    // ==================== Grouping, ordering, paging ====================

    pub fn limit(&mut self, length: u64) -> &mut Self {
        self.options.limit = Some(Limit::new(length));
        self.options.touch();
        self
    }

    pub fn limit_offset(&mut self, offset: u64, length: u64) -> &mut Self {
        self.options.limit = Some(Limit::with_offset(offset, length));
        self.options.touch();
        self
    }

    /// `"10"` or `"offset,length"`.
    pub fn limit_str(&mut self, limit: &str) -> QueryResult<&mut Self> {
        self.options.limit = Some(Limit::parse(limit)?);
        self.options.touch();
        Ok(self)
    }

    /// 1-based page of `per_page` rows.
    pub fn page(&mut self, page: u64, per_page: u64) -> &mut Self {
        let page = page.max(1);
        self.limit_offset((page - 1) * per_page, per_page)
    }

    pub fn order(&mut self, order: &str) -> &mut Self {
        self.options.order = Some(order.to_string());
        self.options.touch();
        self
    }

    pub fn group(&mut self, group: &str) -> &mut Self {
        self.options.group = Some(group.to_string());
        self.options.touch();
        self
    }

    pub fn having(&mut self, having: &str) -> &mut Self {
        self.options.having = Some(having.to_string());
        self.options.touch();
        self
    }

    // ==================== Writes ====================

    /// Reject (`true`) or silently drop (`false`) write columns missing from
    /// the table.
    pub fn strict(&mut self, strict: bool) -> &mut Self {
        self.options.strict = Some(strict);
        self.options.touch();
        self
    }

    /// Merge data for the next write.
    pub fn data(&mut self, data: Record) -> &mut Self {
        self.options.data_mut().merge(data);
        self
    }

    pub fn data_json(&mut self, json: serde_json::Value) -> QueryResult<&mut Self> {
        let record = Record::from_json(json)?;
        Ok(self.data(record))
    }

    /// `column = column + step` on update.
    pub fn inc(&mut self, column: &str, step: i64) -> &mut Self {
        self.exp(column, &format!("{} + {}", column, step))
    }

    /// `column = column - step` on update.
    pub fn dec(&mut self, column: &str, step: i64) -> &mut Self {
        self.exp(column, &format!("{} - {}", column, step))
    }

    /// `column = <sql>` on update.
    pub fn exp(&mut self, column: &str, sql: &str) -> &mut Self {
        self.options.data_exprs.retain(|(c, _)| c != column);
        self.options.data_exprs.push((column.to_string(), sql.to_string()));
        self.options.touch();
        self
    }

    // ==================== Flags ====================

    /// Return rendered statements from terminal operations instead of executing.
    pub fn fetch_sql(&mut self, enabled: bool) -> &mut Self {
        self.options.fetch_sql = Some(enabled);
        self.options.touch();
        self
    }

    /// Make `find` return an empty record instead of `None`.
    pub fn allow_empty(&mut self, enabled: bool) -> &mut Self {
        self.options.allow_empty = enabled;
        self.options.touch();
        self
    }

    /// Only rows whose `field` equals `value` are live.
    pub fn use_soft_delete(&mut self, field: &str, value: impl Into<Value>) -> &mut Self {
        self.options.soft_delete = Some(SoftDeleteRule::new(field, value));
        self.options.touch();
        self
    }

    /// Include soft-deleted rows.
    pub fn with_trashed(&mut self) -> &mut Self {
        self.options.with_trashed = true;
        self.options.touch();
        self
    }

    // ==================== Lifecycle ====================

    /// Drop every option and bind. The model's soft-delete rule is restored.
    pub fn clear(&mut self) -> &mut Self {
        self.options.clear();
        self.options.soft_delete = self.model.as_ref().and_then(|m| m.soft_delete());
        self
    }

    pub fn remove_option(&mut self, key: OptionKey) -> &mut Self {
        self.options.remove(key);
        self
    }

    /// Fill defaults for unset options. Idempotent.
    pub fn finalize(&mut self) -> QueryResult<&mut Self> {
        let resolver = &self.resolver;
        let name = self.name.as_deref();
        let model = self.model.as_ref();
        self.options.finalize(
            || default_table(resolver, name, model),
            self.config.fields_strict,
        )?;
        Ok(self)
    }

    /// Finalize and render the current SELECT without executing it.
    ///
    /// Field lists that need schema metadata (`field_except`, `with_join`)
    /// can only be rendered by a terminal operation.
    pub fn build_select_sql(&mut self) -> QueryResult<Statement> {
        self.finalize()?;
        build_select(&self.options, self.config.placeholder)
    }
}
