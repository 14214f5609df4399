//! Parameter/text consistency check.
//!
//! Every `$name` in the text must be in the parameter map, and every
//! parameter except the reserved context entries must be used. Quoted
//! text (guard messages, type names, embedded statements) is skipped.

use super::StatementTransform;
use crate::error::TransformError;
use crate::render::{CompiledStatement, RESERVED_PARAMS};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

static PARAM_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$([A-Za-z_][A-Za-z0-9_]*)").expect("valid parameter regex"));

static STRING_LITERAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""(?:[^"\\]|\\.)*""#).expect("valid literal regex"));

/// Checks the parameter/text invariant of a compiled statement.
pub struct StatementValidator;

impl StatementValidator {
    /// All problems found, empty when the statement is consistent
    pub fn problems(statement: &CompiledStatement) -> Vec<String> {
        let mut problems = Vec::new();
        let text = &statement.text;

        let mut used = BTreeSet::new();
        let without_literals = STRING_LITERAL.replace_all(text, "\"\"");
        for capture in PARAM_REF.captures_iter(&without_literals) {
            used.insert(capture[1].to_string());
        }

        for name in &used {
            if !statement.params.contains_key(name) {
                problems.push(format!("undeclared parameter ${}", name));
            }
        }
        for name in statement.param_names() {
            if !used.contains(name) {
                problems.push(format!("orphan parameter ${}", name));
            }
        }
        for reserved in RESERVED_PARAMS {
            if !statement.params.contains_key(reserved) {
                problems.push(format!("missing context parameter ${}", reserved));
            }
        }
        problems
    }
}

impl StatementTransform for StatementValidator {
    fn name(&self) -> &'static str {
        "validate"
    }

    fn transform(&self, statement: CompiledStatement) -> Result<CompiledStatement, TransformError> {
        let problems = Self::problems(&statement);
        if problems.is_empty() {
            Ok(statement)
        } else {
            Err(TransformError::Rejected {
                transform: self.name().to_string(),
                message: problems.join("; "),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::collections::BTreeMap;

    fn statement(text: &str, params: &[(&str, Value)]) -> CompiledStatement {
        let mut map: BTreeMap<String, Value> = params
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        map.insert("jwt".to_string(), json!({}));
        map.insert("isAuthenticated".to_string(), json!(false));
        CompiledStatement {
            text: text.to_string(),
            params: map,
            events: Vec::new(),
        }
    }

    #[test]
    fn test_consistent_statement_passes() {
        let s = statement(
            "MATCH (this:Movie)\nWHERE this.title = $param0\nWITH *\nCALL apoc.util.validate(NOT (coalesce($isAuthenticated = true, false)), \"@graphloom/FORBIDDEN\", [0])\nRETURN this { .title } AS this",
            &[("param0", json!("x"))],
        );
        assert!(StatementValidator::problems(&s).is_empty());
        assert!(StatementValidator.transform(s).is_ok());
    }

    #[test]
    fn test_orphan_parameter() {
        let s = statement("MATCH (this:Movie)\nRETURN this", &[("param0", json!(1))]);
        assert_eq!(StatementValidator::problems(&s), vec!["orphan parameter $param0"]);
    }

    #[test]
    fn test_undeclared_parameter() {
        let s = statement("MATCH (this:Movie)\nWHERE this.x = $param3\nRETURN this", &[]);
        assert_eq!(StatementValidator::problems(&s), vec!["undeclared parameter $param3"]);
    }

    #[test]
    fn test_dollar_inside_quotes_is_not_a_reference() {
        let s = statement("RETURN this { __typename: \"$Movie\" } AS this", &[]);
        assert!(StatementValidator::problems(&s).is_empty());

        let s = statement("MATCH (this:Movie)\nWHERE this.x = $param0\nRETURN this", &[]);
        let err = StatementValidator.transform(s).unwrap_err();
        assert!(err.to_string().contains("undeclared parameter $param0"));
    }

    #[test]
    fn test_reserved_params_may_be_unused() {
        let s = statement("RETURN 1 AS x", &[]);
        assert!(StatementValidator::problems(&s).is_empty());
    }
}
