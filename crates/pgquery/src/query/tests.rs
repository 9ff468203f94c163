use super::*;
use crate::condition::Logic;
use crate::config::PlaceholderStyle;
use crate::options::Stage;
use crate::relation::Relation;

struct Post;

impl EntityModel for Post {
    fn name(&self) -> &str {
        "Post"
    }

    fn pk(&self) -> Option<&str> {
        Some("id")
    }

    fn relation(&self, name: &str) -> Option<Relation> {
        match name {
            "author" => Some(Relation::belongs_to("User", "author_id", "id")),
            "comments" => Some(Relation::has_many("Comment", "post_id", "id")),
            _ => None,
        }
    }

    fn soft_delete(&self) -> Option<SoftDeleteRule> {
        Some(SoftDeleteRule::new("deleted_at", Value::Null))
    }
}

fn config() -> QueryConfig {
    QueryConfig::new().with_prefix("app_")
}

fn query() -> Query {
    Query::new(config())
}

fn post_query() -> Query {
    Query::for_model(config(), Arc::new(Post))
}

#[test]
fn test_name_resolves_default_table() {
    let mut q = query();
    q.name("UserProfile");
    assert_eq!(q.build_select_sql().unwrap().sql(), "SELECT * FROM app_user_profile");
}

#[test]
fn test_missing_table_is_configuration_error() {
    let err = query().build_select_sql().unwrap_err();
    assert!(err.is_configuration());
}

#[test]
fn test_finalize_is_idempotent() {
    let mut q = query();
    q.table("app_user").unwrap().where_(("status", 1)).unwrap().order("id");
    q.finalize().unwrap();
    let first = q.build_select_sql().unwrap();
    q.finalize().unwrap();
    let second = q.build_select_sql().unwrap();
    assert_eq!(first, second);
    assert_eq!(q.options().stage(), Stage::Finalized);

    q.limit(5);
    assert_eq!(q.options().stage(), Stage::Accumulating);
}

#[test]
fn test_setters_chain() {
    let mut q = query();
    q.table("app_user u")
        .unwrap()
        .field("u.id, u.name")
        .where_op("u.age", ">=", 18)
        .unwrap()
        .where_or(("u.vip", true))
        .unwrap()
        .group("u.id")
        .order("u.id DESC")
        .page(3, 20);
    assert_eq!(
        q.build_select_sql().unwrap().sql(),
        "SELECT u.id, u.name FROM app_user u WHERE u.age >= ? AND u.vip = ? \
         GROUP BY u.id ORDER BY u.id DESC LIMIT 20 OFFSET 40"
    );
}

#[test]
fn test_where_pk_needs_a_key() {
    let mut q = query();
    q.table("app_user").unwrap();
    assert!(q.where_pk(1).unwrap_err().is_unresolved_pk());

    q.pk("id");
    q.where_pk(1).unwrap();
    assert_eq!(q.build_select_sql().unwrap().sql(), "SELECT * FROM app_user WHERE id = ?");
}

#[test]
fn test_later_pk_filter_replaces_earlier() {
    let mut q = query();
    q.table("app_user u").unwrap().pk("id");
    q.where_pk(1).unwrap();
    q.where_pk("2,3").unwrap();
    let stmt = q.build_select_sql().unwrap();
    assert_eq!(stmt.sql(), "SELECT * FROM app_user u WHERE u.id IN (?, ?)");
    assert_eq!(stmt.params(), vec![&Value::Int(2), &Value::Int(3)]);
}

#[test]
fn test_alias_registered_after_table() {
    let mut q = query();
    q.table("app_user").unwrap().alias("usr").unwrap().pk("id");
    q.where_pk(9).unwrap();
    assert_eq!(
        q.build_select_sql().unwrap().sql(),
        "SELECT * FROM app_user usr WHERE usr.id = ?"
    );
}

#[test]
fn test_generated_bind_in_raw_filter() {
    let mut q = Query::new(config().with_placeholder(PlaceholderStyle::Named));
    q.table("app_user").unwrap();
    let name = q.bind(100);
    assert_eq!(name, "Bind_1");
    q.where_raw(&format!("score > :{}", name), Vec::new()).unwrap();
    q.where_(("status", 1)).unwrap();

    let stmt = q.build_select_sql().unwrap();
    assert_eq!(
        stmt.sql(),
        "SELECT * FROM app_user WHERE (score > :Bind_1) AND status = :Bind_2"
    );
    assert_eq!(
        stmt.to_sql_with(PlaceholderStyle::Dollar),
        "SELECT * FROM app_user WHERE (score > $1) AND status = $2"
    );
    assert_eq!(stmt.params(), vec![&Value::Int(100), &Value::Int(1)]);
}

#[test]
fn test_bind_typed_coerces() {
    let mut q = query();
    q.table("app_user").unwrap();
    q.bind_typed("age", "42", ParamType::Int).unwrap();
    assert_eq!(q.options().binds().get("age").unwrap().value, Value::Int(42));
    assert!(q.bind_typed("age", "x", ParamType::Int).unwrap_err().is_invalid_input());
}

#[test]
fn test_where_fn_nests_group() {
    let mut q = query();
    q.table("app_user").unwrap();
    q.where_(("status", 1)).unwrap();
    q.where_fn(|g| {
        g.or(("role", "admin"))?.or(("role", "owner"))?;
        Ok(())
    })
    .unwrap();
    assert_eq!(
        q.build_select_sql().unwrap().sql(),
        "SELECT * FROM app_user WHERE status = ? AND (role = ? OR role = ?)"
    );
}

#[test]
fn test_unknown_operator_rejected_at_setter() {
    let mut q = query();
    let err = q.where_op("age", "~~", 1).unwrap_err();
    assert!(err.is_invalid_input());
}

#[test]
fn test_remove_where_field() {
    let mut q = query();
    q.table("app_user").unwrap();
    q.where_(("status", 1)).unwrap().where_(("age", 20)).unwrap();
    q.remove_where_field("status", Logic::And);
    assert_eq!(q.build_select_sql().unwrap().sql(), "SELECT * FROM app_user WHERE age = ?");
}

#[test]
fn test_remove_where_field_drops_repeated_conditions() {
    let mut q = query();
    q.name("User");
    q.where_eq("status", 1).unwrap().where_eq("status", 2).unwrap();
    q.where_(Condition::new("status", Operator::Gt, Operand::Value(0.into())).unwrap())
        .unwrap();
    q.where_(("age", 20)).unwrap();
    q.where_or_op("status", "=", 9).unwrap();

    q.remove_where_field("status", Logic::And);
    assert_eq!(
        q.build_select_sql().unwrap().sql(),
        "SELECT * FROM app_user WHERE age = ? AND status = ?"
    );
}

#[test]
fn test_rerender_carries_state_until_clear() {
    let mut q = query();
    q.name("User");
    q.where_(("status", 1)).unwrap();
    let first = q.build_select_sql().unwrap().sql();
    assert_eq!(first, q.build_select_sql().unwrap().sql());

    q.clear();
    assert_eq!(q.options().stage(), Stage::Empty);
    assert_eq!(q.build_select_sql().unwrap().sql(), "SELECT * FROM app_user");
}

#[test]
fn test_model_defaults_and_soft_delete() {
    let mut q = post_query();
    q.where_pk(3).unwrap();
    assert_eq!(
        q.build_select_sql().unwrap().sql(),
        "SELECT * FROM app_post WHERE id = ? AND deleted_at IS NULL"
    );

    q.with_trashed();
    assert_eq!(q.build_select_sql().unwrap().sql(), "SELECT * FROM app_post WHERE id = ?");

    // clear drops with_trashed but keeps the model's rule
    q.clear();
    assert_eq!(
        q.build_select_sql().unwrap().sql(),
        "SELECT * FROM app_post WHERE deleted_at IS NULL"
    );
}

#[test]
fn test_remove_soft_delete_option() {
    let mut q = post_query();
    q.remove_option(OptionKey::SoftDelete);
    assert_eq!(q.build_select_sql().unwrap().sql(), "SELECT * FROM app_post");
}

#[test]
fn test_with_validates_relations() {
    assert!(query().with(&["author"]).unwrap_err().is_configuration());

    let mut q = post_query();
    q.with(&["author", "comments"]).unwrap();
    assert_eq!(q.options().eager_loads(), &["author", "comments"]);
    assert!(q.with(&["tags"]).unwrap_err().is_invalid_input());
}

#[test]
fn test_with_join_rejects_one_to_many() {
    let mut q = post_query();
    let err = q.with_join(&["comments"]).unwrap_err();
    assert!(err.is_invalid_input());
    assert!(q.options().eager_join_loads().is_empty());
}

#[test]
fn test_with_join_needs_schema_to_render() {
    let mut q = post_query();
    q.with_join(&["author"]).unwrap();
    assert_eq!(q.options().eager_join_loads(), &["author"]);
    assert_eq!(q.options().aliases().alias_of("app_post"), Some("post"));
    assert_eq!(q.options().aliases().alias_of("app_user"), Some("author"));
    // relation columns are expanded from table_info by terminal operations
    assert!(q.build_select_sql().unwrap_err().is_render());
}

#[test]
fn test_join_kinds() {
    let mut q = query();
    q.table("app_user u")
        .unwrap()
        .left_join("Profile p", "p.user_id = u.id")
        .unwrap()
        .full_join(("app_team", "t"), "t.id = u.team_id")
        .unwrap();
    assert_eq!(
        q.build_select_sql().unwrap().sql(),
        "SELECT * FROM app_user u LEFT JOIN app_profile p ON p.user_id = u.id \
         FULL JOIN app_team t ON t.id = u.team_id"
    );
}

#[test]
fn test_limit_str() {
    let mut q = query();
    q.table("app_user").unwrap().limit_str("5,10").unwrap();
    assert_eq!(q.build_select_sql().unwrap().sql(), "SELECT * FROM app_user LIMIT 10 OFFSET 5");
    assert!(q.limit_str("ten").unwrap_err().is_invalid_input());
}
