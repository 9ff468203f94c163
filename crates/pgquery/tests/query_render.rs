use pgquery::{
    Condition, FilterInput, JoinKind, JoinSpec, Operand, Operator, PlaceholderStyle, Query,
    QueryConfig, Value,
};
use serde_json::json;

fn query() -> Query {
    Query::new(QueryConfig::new().with_prefix("app_"))
}

fn sql(q: &mut Query) -> String {
    q.build_select_sql().unwrap().sql()
}

#[test]
fn logical_names_resolve_through_prefix() {
    let mut q = query();
    q.name("UserProfile");
    assert_eq!(sql(&mut q), "SELECT * FROM app_user_profile");

    let mut q = query();
    q.table("__USER_PROFILE__").unwrap();
    assert_eq!(sql(&mut q), "SELECT * FROM app_user_profile");
}

#[test]
fn explicit_table_names_are_kept() {
    let mut q = query();
    q.table("users").unwrap();
    assert_eq!(sql(&mut q), "SELECT * FROM users");

    let mut q = query();
    q.table("app_user_profile").unwrap();
    assert_eq!(sql(&mut q), "SELECT * FROM app_user_profile");

    let mut q = query();
    q.table("audit.event e").unwrap();
    assert_eq!(sql(&mut q), "SELECT * FROM audit.event e");
}

#[test]
fn multiple_tables_with_aliases() {
    let mut q = query();
    q.table("app_user u, __ROLE__ AS r")
        .unwrap()
        .where_(Condition::new("r.id", Operator::Eq, Operand::Column("u.role_id".into())).unwrap())
        .unwrap();
    assert_eq!(
        sql(&mut q),
        "SELECT * FROM app_user u, app_role r WHERE r.id = u.role_id"
    );
}

#[test]
fn empty_table_is_rejected() {
    assert!(query().table("users,").unwrap_err().is_invalid_input());
    assert!(query().table("   ").is_err());
}

#[test]
fn json_filters() {
    let mut q = query();
    q.name("User");
    q.where_(FilterInput::from_json(&json!({ "status": 1 })).unwrap())
        .unwrap();
    q.where_(
        FilterInput::from_json(&json!([
            ["role", "in", ["a", "b"]],
            ["age", ">", 18],
            ["name", "like", "a%"]
        ]))
        .unwrap(),
    )
    .unwrap();
    let stmt = q.build_select_sql().unwrap();
    assert_eq!(
        stmt.sql(),
        "SELECT * FROM app_user WHERE status = ? AND role IN (?, ?) AND age > ? AND name LIKE ?"
    );
    assert_eq!(stmt.param_count(), 5);

    assert!(FilterInput::from_json(&json!(42)).unwrap_err().is_invalid_input());
    assert!(FilterInput::from_json(&json!([1, 2])).is_err());
}

#[test]
fn duplicate_field_is_kept_unkeyed() {
    let mut q = query();
    q.name("User");
    q.where_op("age", ">", 18).unwrap().where_op("age", "<", 65).unwrap();
    assert_eq!(sql(&mut q), "SELECT * FROM app_user WHERE age > ? AND age < ?");
}

#[test]
fn sub_select_filter() {
    let mut inner = query();
    inner.name("Order").field("user_id").where_(("paid", true)).unwrap();
    let sub = inner.build_select_sql().unwrap();

    let mut q = query();
    q.name("User");
    q.where_(("status", 1)).unwrap().where_in_sub("id", sub).unwrap();
    assert_eq!(
        q.build_select_sql()
            .unwrap()
            .to_sql_with(PlaceholderStyle::Dollar),
        "SELECT * FROM app_user WHERE status = $1 AND id IN (SELECT user_id FROM app_order WHERE paid = $2)"
    );
}

#[test]
fn where_in_and_null() {
    let mut q = query();
    q.name("User");
    q.where_in("id", "3,4,5").unwrap().where_null("deleted_at").unwrap();
    let stmt = q.build_select_sql().unwrap();
    assert_eq!(
        stmt.sql(),
        "SELECT * FROM app_user WHERE id IN (?, ?, ?) AND deleted_at IS NULL"
    );
    assert_eq!(stmt.params()[0], &Value::Int(3));
}

#[test]
fn join_many_preserves_order_and_kinds() {
    let mut q = query();
    q.table("app_user u").unwrap();
    q.join_many(vec![
        JoinSpec::new("profile", "profile.user_id = u.id").kind(JoinKind::Left),
        JoinSpec::new("__ROLE__ r", "r.id = u.role_id"),
        JoinSpec::new("audit.login l", "l.user_id = u.id").kind(JoinKind::Right),
    ])
    .unwrap();
    assert_eq!(
        sql(&mut q),
        "SELECT * FROM app_user u \
         LEFT JOIN app_profile profile ON profile.user_id = u.id \
         INNER JOIN app_role r ON r.id = u.role_id \
         RIGHT JOIN audit.login l ON l.user_id = u.id"
    );
}

#[test]
fn named_placeholders_follow_explicit_binds() {
    let mut q = Query::new(
        QueryConfig::new()
            .with_prefix("app_")
            .with_placeholder(PlaceholderStyle::Named),
    );
    q.name("User").bind_named("min_age", 18);
    q.where_raw("age >= :min_age", Vec::new()).unwrap();
    let stmt = q.build_select_sql().unwrap();
    assert_eq!(stmt.sql(), "SELECT * FROM app_user WHERE age >= :min_age");
    assert_eq!(stmt.binds()[0].name, "min_age");
    assert_eq!(stmt.binds()[0].value, Value::Int(18));
}

#[test]
fn raw_placeholder_mismatch_surfaces_at_render() {
    let mut q = query();
    q.name("User");
    q.where_raw("a = ? AND b = ?", vec![1.into()]).unwrap();
    assert!(q.build_select_sql().unwrap_err().is_invalid_input());
}
