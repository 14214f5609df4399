//! Subqueries around embedded `@cypher` statements.

use super::{Block, Clause, Scope, ROOT_VAR};
use crate::schema::{escape_name, ComputedField};

/// `CALL { WITH var [WITH var AS this] <statement> }`
pub(crate) fn statement_call(var: &str, field: &ComputedField) -> Block {
    let mut inner = Block::new();
    inner.line(format!("WITH {}", var));
    if var != ROOT_VAR {
        inner.line(format!("WITH {} AS {}", var, ROOT_VAR));
    }
    for line in field.binding.statement.trim().lines() {
        let line = line.trim();
        if !line.is_empty() {
            inner.line(line);
        }
    }
    inner
}

/// Open a subquery that runs the statement and binds its result column
/// to `bound`; the caller appends the closing `RETURN`
pub(crate) fn open(var: &str, field: &ComputedField, bound: &str) -> Block {
    let mut body = Block::new();
    body.line(format!("WITH {}", var));
    body.call(statement_call(var, field));
    body.line(format!(
        "WITH {} AS {}",
        escape_name(field.binding.column()),
        bound
    ));
    body
}

/// Scalar value of a computed field for the node bound to `var`, returned as `out`
pub(crate) fn scalar_subquery(scope: &mut Scope, var: &str, field: &ComputedField, out: &str) -> Clause {
    let bound = scope.var();
    let mut body = open(var, field, &bound);
    let collected = if field.is_list() {
        format!("collect({})", bound)
    } else {
        format!("head(collect({}))", bound)
    };
    body.line(format!("RETURN {} AS {}", collected, out));
    Clause::Call(body.into_clauses())
}
