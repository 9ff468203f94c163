//! Rendering tests for the statement builders.

use super::*;
use crate::bind::BindEntry;
use crate::condition::{Condition, ConditionNode, Logic, Operand, Operator};
use crate::config::{NamingConfig, PlaceholderStyle};
use crate::filter::{FilterInput, primary_key_condition};
use crate::ident::TableResolver;
use crate::join::{JoinKind, JoinSpec};
use crate::options::{OptionState, SoftDeleteRule};
use crate::record::Record;
use crate::value::Value;

const Q: PlaceholderStyle = PlaceholderStyle::Question;

fn resolver() -> TableResolver {
    TableResolver::new(NamingConfig::new().with_prefix("app_"))
}

fn state(table: &str) -> OptionState {
    let mut state = OptionState::new();
    state.table = Some(TableSpec::parse(table, &resolver(), &mut state.aliases).unwrap());
    state
}

fn finalized(mut state: OptionState) -> OptionState {
    state.finalize(|| Ok(String::new()), true).unwrap();
    state
}

fn select_sql(state: OptionState) -> String {
    build_select(&finalized(state), Q).unwrap().sql()
}

#[test]
fn test_select_all() {
    assert_eq!(select_sql(state("app_user")), "SELECT * FROM app_user");
}

#[test]
fn test_filter_shapes_normalize_to_same_condition() {
    let inputs: Vec<FilterInput> = vec![
        FilterInput::map([("status", 1)]),
        ("status", 1).into(),
        FilterInput::op("status", "=", 1).unwrap(),
        FilterInput::op("status", "eq", 1).unwrap(),
    ];
    for input in inputs {
        let mut s = state("app_user");
        s.filters_mut().add(Logic::And, input).unwrap();
        let stmt = build_select(&finalized(s), Q).unwrap();
        assert_eq!(stmt.sql(), "SELECT * FROM app_user WHERE status = ?");
        assert_eq!(stmt.params(), vec![&Value::Int(1)]);
    }
}

#[test]
fn test_expression_key_becomes_raw() {
    let mut s = state("app_user");
    s.filters_mut().and(("score > 10", Value::Null)).unwrap();
    assert_eq!(select_sql(s), "SELECT * FROM app_user WHERE score > 10");
}

#[test]
fn test_and_then_or_bucket() {
    let mut s = state("app_user");
    s.filters_mut().and(("status", 1)).unwrap();
    s.filters_mut().or(("role", "admin")).unwrap();
    s.filters_mut().or(("role", "owner")).unwrap();
    assert_eq!(
        select_sql(s),
        "SELECT * FROM app_user WHERE status = ? AND (role = ? OR role = ?)"
    );
}

#[test]
fn test_nested_predicate_group() {
    let mut s = state("app_user");
    s.filters_mut().and(("status", 1)).unwrap();
    s.filters_mut()
        .and(FilterInput::predicate(|g| {
            g.or(("a", 1))?.or(("b", 2))?;
            Ok(())
        }))
        .unwrap();
    assert_eq!(
        select_sql(s),
        "SELECT * FROM app_user WHERE status = ? AND (a = ? OR b = ?)"
    );
}

#[test]
fn test_pk_scalar_vs_list() {
    let eq = primary_key_condition("id", None, 7.into()).unwrap();
    assert_eq!(eq.op, Operator::Eq);

    let mut s = state("app_user");
    let cond = primary_key_condition("id", None, Value::from("1,2,3")).unwrap();
    s.filters_mut().replace(Logic::And, "id", ConditionNode::Condition(cond));
    let stmt = build_select(&finalized(s), Q).unwrap();
    assert_eq!(stmt.sql(), "SELECT * FROM app_user WHERE id IN (?, ?, ?)");
    assert_eq!(
        stmt.params(),
        vec![&Value::Int(1), &Value::Int(2), &Value::Int(3)]
    );
}

#[test]
fn test_pk_uses_primary_alias() {
    let mut s = state("app_user u");
    let alias = s.primary_alias().map(str::to_string);
    let cond = primary_key_condition("id", alias.as_deref(), 5.into()).unwrap();
    s.filters_mut().replace(Logic::And, "id", ConditionNode::Condition(cond));
    assert_eq!(select_sql(s), "SELECT * FROM app_user u WHERE u.id = ?");
}

#[test]
fn test_empty_in_lists() {
    let mut s = state("app_user");
    let none = Condition::new("id", Operator::In, Operand::Value(Value::List(vec![]))).unwrap();
    let all = Condition::new("id", Operator::NotIn, Operand::Value(Value::List(vec![]))).unwrap();
    s.filters_mut().and(none).unwrap();
    s.filters_mut().and(all).unwrap();
    assert_eq!(select_sql(s), "SELECT * FROM app_user WHERE 1=0 AND 1=1");
}

#[test]
fn test_null_and_between() {
    let mut s = state("app_user");
    s.filters_mut().and(("deleted_at", Value::Null)).unwrap();
    s.filters_mut()
        .and(FilterInput::op("age", "between", "18,30").unwrap())
        .unwrap();
    let stmt = build_select(&finalized(s), Q).unwrap();
    assert_eq!(
        stmt.sql(),
        "SELECT * FROM app_user WHERE deleted_at IS NULL AND age BETWEEN ? AND ?"
    );
    assert_eq!(stmt.params(), vec![&Value::Int(18), &Value::Int(30)]);
}

#[test]
fn test_join_order_is_stable() {
    let mut s = state("app_user u");
    for spec in [
        JoinSpec::new("Role r", "r.id = u.role_id"),
        JoinSpec::new("Dept d", "d.id = u.dept_id").kind(JoinKind::Left),
        JoinSpec::new(("app_team", "t"), Condition::columns_eq("t.id", "u.team_id")),
    ] {
        let clause = spec.into_clause(&resolver(), &mut s.aliases).unwrap();
        s.joins_mut().push(clause);
    }
    assert_eq!(
        select_sql(s),
        "SELECT * FROM app_user u \
         INNER JOIN app_role r ON r.id = u.role_id \
         LEFT JOIN app_dept d ON d.id = u.dept_id \
         INNER JOIN app_team t ON t.id = u.team_id"
    );
}

#[test]
fn test_group_having_order_limit() {
    let mut s = state("app_order");
    s.fields_mut().extend(crate::field::FieldSpec::parse("status, COUNT(*) AS n"));
    s.group = Some("status".into());
    s.having = Some("COUNT(*) > 1".into());
    s.order = Some("n DESC".into());
    s.limit = Some(crate::options::Limit::with_offset(20, 10));
    assert_eq!(
        select_sql(s),
        "SELECT status, COUNT(*) AS n FROM app_order GROUP BY status HAVING COUNT(*) > 1 \
         ORDER BY n DESC LIMIT 10 OFFSET 20"
    );
}

#[test]
fn test_soft_delete_injection() {
    let mut s = state("app_user");
    s.soft_delete = Some(SoftDeleteRule::new("deleted_at", Value::Null));
    assert_eq!(
        select_sql(s.clone()),
        "SELECT * FROM app_user WHERE deleted_at IS NULL"
    );

    s.filters_mut().and(("status", 1)).unwrap();
    assert_eq!(
        select_sql(s.clone()),
        "SELECT * FROM app_user WHERE status = ? AND deleted_at IS NULL"
    );

    s.filters_mut().or(("vip", true)).unwrap();
    assert_eq!(
        select_sql(s.clone()),
        "SELECT * FROM app_user WHERE (status = ? AND vip = ?) AND deleted_at IS NULL"
    );

    s.with_trashed = true;
    assert_eq!(
        select_sql(s),
        "SELECT * FROM app_user WHERE status = ? AND vip = ?"
    );
}

#[test]
fn test_soft_delete_wraps_or_only_filters() {
    let mut s = state("app_user");
    s.soft_delete = Some(SoftDeleteRule::new("deleted", 0));
    s.filters_mut()
        .or(FilterInput::raw("status = 1 OR status = 2", vec![]))
        .unwrap();
    assert_eq!(
        select_sql(s),
        "SELECT * FROM app_user WHERE (status = 1 OR status = 2) AND deleted = ?"
    );

    let mut s = state("app_user");
    s.soft_delete = Some(SoftDeleteRule::new("deleted", 0));
    s.filters_mut().or(("role", "admin")).unwrap();
    s.filters_mut().or(("role", "owner")).unwrap();
    assert_eq!(
        select_sql(s),
        "SELECT * FROM app_user WHERE (role = ? OR role = ?) AND deleted = ?"
    );

    let mut s = state("app_user");
    s.soft_delete = Some(SoftDeleteRule::new("deleted", 0));
    s.filters_mut().or(("role", "admin")).unwrap();
    assert_eq!(
        select_sql(s),
        "SELECT * FROM app_user WHERE role = ? AND deleted = ?"
    );
}

#[test]
fn test_soft_delete_after_single_raw_or_group() {
    let mut s = state("app_user");
    s.soft_delete = Some(SoftDeleteRule::new("deleted", 0));
    s.filters_mut()
        .and(FilterInput::raw("a = 1 OR b = 2", vec![]))
        .unwrap();
    assert_eq!(
        select_sql(s),
        "SELECT * FROM app_user WHERE (a = 1 OR b = 2) AND deleted = ?"
    );

    // a nested group already renders its own parentheses
    let mut s = state("app_user");
    s.soft_delete = Some(SoftDeleteRule::new("deleted", 0));
    s.filters_mut()
        .and(FilterInput::predicate(|g| {
            g.or(("a", 1))?.or(("b", 2))?;
            Ok(())
        }))
        .unwrap();
    assert_eq!(
        select_sql(s),
        "SELECT * FROM app_user WHERE (a = ? OR b = ?) AND deleted = ?"
    );
}

#[test]
fn test_raw_fragment_with_explicit_bind() {
    let mut s = state("app_user");
    s.binds.insert(BindEntry::new("min", 10));
    s.filters_mut()
        .and(FilterInput::raw("score > :min OR age < ?", vec![18.into()]))
        .unwrap();
    s.filters_mut().and(("status", 1)).unwrap();
    let stmt = build_select(&finalized(s), PlaceholderStyle::Named).unwrap();
    assert_eq!(
        stmt.sql(),
        "SELECT * FROM app_user WHERE (score > :min OR age < :Bind_1) AND status = :Bind_2"
    );
    let names: Vec<String> = stmt.binds().into_iter().map(|b| b.name).collect();
    assert_eq!(names, vec!["min", "Bind_1", "Bind_2"]);
}

#[test]
fn test_render_requires_finalize() {
    let err = build_select(&state("app_user"), Q).unwrap_err();
    assert!(err.is_render());
}

#[test]
fn test_insert_single_and_returning() {
    let s = finalized(state("app_user"));
    let row = Record::new().with("name", "alice").with("age", 30);
    let stmt = build_insert(&s, &[row], &InsertOptions::new().returning("id"), Q).unwrap();
    assert_eq!(
        stmt.sql(),
        "INSERT INTO app_user (name, age) VALUES (?, ?) RETURNING id"
    );
    assert_eq!(stmt.kind(), StatementKind::Insert);
}

#[test]
fn test_insert_bulk_shares_binds() {
    let s = finalized(state("app_user"));
    let rows = vec![
        Record::new().with("name", "a").with("age", 1),
        Record::new().with("name", "b").with("age", 2),
    ];
    let stmt = build_insert(&s, &rows, &InsertOptions::new(), PlaceholderStyle::Dollar).unwrap();
    assert_eq!(
        stmt.sql(),
        "INSERT INTO app_user (name, age) VALUES ($1, $2), ($3, $4)"
    );
    assert_eq!(stmt.param_count(), 4);

    let uneven = vec![Record::new().with("name", "a"), Record::new().with("age", 2)];
    let err = build_insert(&s, &uneven, &InsertOptions::new(), Q).unwrap_err();
    assert!(err.is_invalid_input());
}

#[test]
fn test_insert_replace_is_upsert() {
    let s = finalized(state("app_user"));
    let row = Record::new().with("id", 1).with("name", "alice");
    let stmt = build_insert(&s, &[row.clone()], &InsertOptions::new().replace(Some("id".into())), Q)
        .unwrap();
    assert_eq!(
        stmt.sql(),
        "INSERT INTO app_user (id, name) VALUES (?, ?) ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name"
    );

    let stmt = build_insert(&s, &[row], &InsertOptions::new().replace(None), Q).unwrap();
    assert!(stmt.sql().ends_with("ON CONFLICT DO NOTHING"));
}

#[test]
fn test_update_renders_data_and_exprs() {
    let mut s = state("app_user");
    s.data_mut().set("name", "bob");
    s.data_exprs.push(("score".into(), "score + 1".into()));
    s.filters_mut().and(("id", 3)).unwrap();
    let stmt = build_update(&finalized(s), Q).unwrap();
    assert_eq!(
        stmt.sql(),
        "UPDATE app_user SET name = ?, score = score + 1 WHERE id = ?"
    );
    assert_eq!(stmt.params(), vec![&Value::from("bob"), &Value::Int(3)]);
}

#[test]
fn test_update_safety() {
    let mut no_where = state("app_user");
    no_where.data_mut().set("name", "bob");
    assert!(build_update(&finalized(no_where), Q).unwrap_err().is_invalid_input());

    let mut no_data = state("app_user");
    no_data.filters_mut().and(("id", 1)).unwrap();
    assert!(build_update(&finalized(no_data), Q).unwrap_err().is_invalid_input());
}

#[test]
fn test_update_with_soft_delete_and_alias() {
    let mut s = state("app_user u");
    s.soft_delete = Some(SoftDeleteRule::new("deleted", false));
    s.data_mut().set("name", "bob");
    s.filters_mut().and(("u.id", 1)).unwrap();
    assert_eq!(
        build_update(&finalized(s), Q).unwrap().sql(),
        "UPDATE app_user u SET name = ? WHERE u.id = ? AND u.deleted = ?"
    );
}

#[test]
fn test_delete_safety() {
    let s = finalized(state("app_user"));
    assert!(build_delete(&s, false, Q).unwrap_err().is_invalid_input());
    assert_eq!(build_delete(&s, true, Q).unwrap().sql(), "DELETE FROM app_user");

    let mut s = state("app_user");
    s.filters_mut().and(("id", Value::from(vec![1, 2]))).unwrap();
    assert_eq!(
        build_delete(&finalized(s), false, Q).unwrap().sql(),
        "DELETE FROM app_user WHERE id IN (?, ?)"
    );
}

#[test]
fn test_writes_reject_joins() {
    let mut s = state("app_user u");
    let clause = JoinSpec::new("Role r", "r.id = u.role_id")
        .into_clause(&resolver(), &mut s.aliases)
        .unwrap();
    s.joins_mut().push(clause);
    s.filters_mut().and(("u.id", 1)).unwrap();
    s.data_mut().set("name", "x");
    let s = finalized(s);
    assert!(build_update(&s, Q).unwrap_err().is_invalid_input());
    assert!(build_delete(&s, false, Q).unwrap_err().is_invalid_input());
}

#[test]
fn test_sub_select_operand() {
    let mut inner = state("app_order");
    inner.fields_mut().push(crate::field::FieldItem::Column("user_id".into()));
    inner.filters_mut().and(("paid", true)).unwrap();
    let sub = build_select(&finalized(inner), Q).unwrap();

    let mut s = state("app_user");
    s.filters_mut().and(("status", 1)).unwrap();
    s.filters_mut()
        .and(FilterInput::triple("id", Operator::In, Operand::from(sub)))
        .unwrap();
    let stmt = build_select(&finalized(s), PlaceholderStyle::Dollar).unwrap();
    assert_eq!(
        stmt.sql(),
        "SELECT * FROM app_user WHERE status = $1 AND id IN (SELECT user_id FROM app_order WHERE paid = $2)"
    );
}
