//! WHERE rendering.
//!
//! The `AND` bucket is rendered first, then the `OR` bucket; the two are joined
//! with `AND`, the `OR` bucket parenthesized when it has several members.

use super::statement::StatementBuilder;
use crate::bind::BindTable;
use crate::condition::{Condition, ConditionGroup, ConditionNode, Logic, Operand, Operator};
use crate::error::{QueryError, QueryResult};
use crate::options::OptionState;
use crate::value::Value;

/// ` WHERE ...` with the soft-delete rule appended, or nothing.
pub(crate) fn push_where(b: &mut StatementBuilder, state: &OptionState) -> QueryResult<()> {
    let mut body = StatementBuilder::new();
    let filters = state.filters().filter(|f| !f.is_empty());
    let soft = state.soft_delete_condition();

    if let Some(group) = filters {
        let wrap = soft.is_some() && needs_parens(group);
        if wrap {
            body.push("(");
        }
        push_group(&mut body, group, state.binds())?;
        if wrap {
            body.push(")");
        }
    }
    if let Some(cond) = soft {
        if !body.is_empty() {
            body.push(" AND ");
        }
        push_condition(&mut body, &cond)?;
    }

    if !body.is_empty() {
        b.push(" WHERE ");
        b.append(body);
    }
    Ok(())
}

/// The user filters need parentheses before an appended `AND` unless they
/// are a single plain condition or a single nested group, which renders its
/// own. Raw fragments may carry a top-level `OR` in either bucket.
fn needs_parens(group: &ConditionGroup) -> bool {
    if group.len() > 1 {
        return true;
    }
    !group
        .nodes(Logic::And)
        .chain(group.nodes(Logic::Or))
        .all(|n| matches!(n, ConditionNode::Condition(_) | ConditionNode::Group(_)))
}

pub(crate) fn push_group(
    b: &mut StatementBuilder,
    group: &ConditionGroup,
    binds: &BindTable,
) -> QueryResult<()> {
    let wrap_raw = group.len() > 1;
    let (and, and_count) = render_bucket(group, Logic::And, binds, wrap_raw)?;
    let (or, or_count) = render_bucket(group, Logic::Or, binds, wrap_raw)?;

    b.append(and);
    if or_count == 0 {
        return Ok(());
    }
    let wrap_or = and_count > 0 && or_count > 1;
    if and_count > 0 {
        b.push(" AND ");
    }
    if wrap_or {
        b.push("(");
    }
    b.append(or);
    if wrap_or {
        b.push(")");
    }
    Ok(())
}

fn render_bucket(
    group: &ConditionGroup,
    logic: Logic,
    binds: &BindTable,
    wrap_raw: bool,
) -> QueryResult<(StatementBuilder, usize)> {
    let mut out = StatementBuilder::new();
    let mut count = 0;
    for node in group.nodes(logic) {
        if count > 0 {
            out.push(" ").push(logic.as_sql()).push(" ");
        }
        match node {
            ConditionNode::Condition(c) => push_condition(&mut out, c)?,
            ConditionNode::Raw(raw) => {
                if wrap_raw {
                    out.push("(");
                }
                out.push_raw(raw, binds)?;
                if wrap_raw {
                    out.push(")");
                }
            }
            ConditionNode::Group(inner) => {
                out.push("(");
                push_group(&mut out, inner, binds)?;
                out.push(")");
            }
        }
        count += 1;
    }
    Ok((out, count))
}

pub(crate) fn push_condition(b: &mut StatementBuilder, c: &Condition) -> QueryResult<()> {
    let col = c.column.as_str();
    match (c.op, &c.operand) {
        (Operator::Eq, Operand::Value(Value::Null)) | (Operator::IsNull, _) => {
            b.push(col).push(" IS NULL");
        }
        (Operator::Ne, Operand::Value(Value::Null)) | (Operator::IsNotNull, _) => {
            b.push(col).push(" IS NOT NULL");
        }
        (Operator::In, Operand::Value(Value::List(items))) if items.is_empty() => {
            b.push("1=0");
        }
        (Operator::NotIn, Operand::Value(Value::List(items))) if items.is_empty() => {
            b.push("1=1");
        }
        (op @ (Operator::In | Operator::NotIn), Operand::Value(Value::List(items))) => {
            b.push(col).push(" ").push(op.as_sql()).push(" (");
            b.push_value_list(items).push(")");
        }
        (
            op @ (Operator::Between | Operator::NotBetween),
            Operand::Value(Value::List(items)),
        ) if items.len() == 2 => {
            b.push(col).push(" ").push(op.as_sql()).push(" ");
            b.push_value(items[0].clone()).push(" AND ").push_value(items[1].clone());
        }
        (Operator::Exp, Operand::Raw(sql)) => {
            b.push(col).push(" ").push(sql);
        }
        (
            op @ (Operator::In
            | Operator::NotIn
            | Operator::Between
            | Operator::NotBetween
            | Operator::Exp),
            Operand::Value(_),
        ) => {
            return Err(QueryError::render(format!(
                "invalid operand for '{}' {}",
                col, op
            )));
        }
        (op, Operand::Value(v)) => {
            b.push(col).push(" ").push(op.as_sql()).push(" ").push_value(v.clone());
        }
        (op, Operand::Column(other)) => {
            b.push(col).push(" ").push(op.as_sql()).push(" ").push(other);
        }
        (op, Operand::SubQuery(stmt)) => {
            b.push(col).push(" ").push(op.as_sql()).push(" (");
            b.push_statement(stmt).push(")");
        }
        (op @ (Operator::In | Operator::NotIn), Operand::Raw(sql)) => {
            b.push(col).push(" ").push(op.as_sql()).push(" (").push(sql).push(")");
        }
        (op, Operand::Raw(sql)) => {
            b.push(col).push(" ").push(op.as_sql()).push(" ").push(sql);
        }
        (op, Operand::None) => {
            return Err(QueryError::render(format!("'{}' {} has no operand", col, op)));
        }
    }
    Ok(())
}
