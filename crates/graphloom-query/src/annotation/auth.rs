//! `@authorization` rules.

use super::parser::Args;
use crate::error::AnnotationError;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;

/// Operations an authorization rule can apply to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AuthOperation {
    Read,
    Aggregate,
    Create,
    Update,
    Delete,
    CreateRelationship,
    DeleteRelationship,
    Subscribe,
}

impl AuthOperation {
    pub const ALL: [AuthOperation; 8] = [
        AuthOperation::Read,
        AuthOperation::Aggregate,
        AuthOperation::Create,
        AuthOperation::Update,
        AuthOperation::Delete,
        AuthOperation::CreateRelationship,
        AuthOperation::DeleteRelationship,
        AuthOperation::Subscribe,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "READ" => AuthOperation::Read,
            "AGGREGATE" => AuthOperation::Aggregate,
            "CREATE" => AuthOperation::Create,
            "UPDATE" => AuthOperation::Update,
            "DELETE" => AuthOperation::Delete,
            "CREATE_RELATIONSHIP" => AuthOperation::CreateRelationship,
            "DELETE_RELATIONSHIP" => AuthOperation::DeleteRelationship,
            "SUBSCRIBE" => AuthOperation::Subscribe,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            AuthOperation::Read => "READ",
            AuthOperation::Aggregate => "AGGREGATE",
            AuthOperation::Create => "CREATE",
            AuthOperation::Update => "UPDATE",
            AuthOperation::Delete => "DELETE",
            AuthOperation::CreateRelationship => "CREATE_RELATIONSHIP",
            AuthOperation::DeleteRelationship => "DELETE_RELATIONSHIP",
            AuthOperation::Subscribe => "SUBSCRIBE",
        }
    }
}

impl fmt::Display for AuthOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// When a validate rule runs relative to the mutation it guards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AuthStage {
    Before,
    After,
}

/// Filter rules narrow results; validate rules abort the statement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleEffect {
    Filter,
    Validate,
}

/// The `where` of a rule.
///
/// `node` is a filter over the guarded node (string values of the form
/// `$jwt.<claim>` are claim placeholders). `jwt` is a filter over the
/// claim set itself.
#[derive(Debug, Clone, PartialEq)]
pub enum PredicateTemplate {
    Leaf {
        node: Option<Map<String, Value>>,
        jwt: Option<Map<String, Value>>,
    },
    And(Vec<PredicateTemplate>),
    Or(Vec<PredicateTemplate>),
    Not(Box<PredicateTemplate>),
}

impl PredicateTemplate {
    /// Template that always holds
    pub fn empty() -> Self {
        PredicateTemplate::Leaf {
            node: None,
            jwt: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuthRule {
    pub effect: RuleEffect,
    pub operations: BTreeSet<AuthOperation>,
    /// Always both stages for filter rules
    pub when: BTreeSet<AuthStage>,
    pub require_authentication: bool,
    pub predicate: PredicateTemplate,
}

impl AuthRule {
    pub fn applies_to(&self, operation: AuthOperation, stage: AuthStage) -> bool {
        self.operations.contains(&operation) && self.when.contains(&stage)
    }
}

/// All rules declared by one `@authorization` occurrence
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Authorization {
    pub rules: Vec<AuthRule>,
    /// On a node type: replace the rules of implemented interfaces
    /// instead of adding to them
    pub overrides: bool,
}

impl Authorization {
    pub fn rules(&self, effect: RuleEffect) -> impl Iterator<Item = &AuthRule> {
        self.rules.iter().filter(move |r| r.effect == effect)
    }
}

const FILTER_ARGS: [&str; 3] = ["operations", "requireAuthentication", "where"];
const VALIDATE_ARGS: [&str; 4] = ["operations", "when", "requireAuthentication", "where"];

pub(super) fn parse_authorization(args: &Args<'_>) -> Result<Authorization, AnnotationError> {
    args.allow_only(&["filter", "validate", "override"])?;
    let overrides = args.opt_bool("override")?.unwrap_or(false);
    let mut rules = Vec::new();

    for (key, effect) in [("filter", RuleEffect::Filter), ("validate", RuleEffect::Validate)] {
        let Some(value) = args.get(key) else {
            continue;
        };
        let items = value
            .as_array()
            .ok_or_else(|| args.invalid(key, "expected a list of rules"))?;
        for item in items {
            let map = item
                .as_object()
                .ok_or_else(|| args.invalid(key, "expected each rule to be an object"))?;
            rules.push(parse_rule(&args.nested(map), key, effect)?);
        }
    }

    if rules.is_empty() {
        return Err(args.missing("filter"));
    }
    Ok(Authorization { rules, overrides })
}

fn parse_rule(args: &Args<'_>, key: &str, effect: RuleEffect) -> Result<AuthRule, AnnotationError> {
    match effect {
        RuleEffect::Filter => args.allow_only(&FILTER_ARGS)?,
        RuleEffect::Validate => args.allow_only(&VALIDATE_ARGS)?,
    }

    let operations = match args.opt_str_list("operations")? {
        Some(names) => {
            let mut ops = BTreeSet::new();
            for name in names {
                let op = AuthOperation::from_name(name).ok_or_else(|| {
                    args.invalid("operations", format!("unknown operation '{}'", name))
                })?;
                if effect == RuleEffect::Filter && op == AuthOperation::Create {
                    return Err(args.invalid(
                        "operations",
                        "filter rules cannot apply to CREATE; use a validate rule",
                    ));
                }
                ops.insert(op);
            }
            if ops.is_empty() {
                return Err(args.invalid("operations", "at least one operation is required"));
            }
            ops
        }
        None => AuthOperation::ALL
            .into_iter()
            .filter(|op| effect == RuleEffect::Validate || *op != AuthOperation::Create)
            .collect(),
    };

    let when = match args.opt_str_list("when")? {
        Some(names) => {
            let mut stages = BTreeSet::new();
            for name in names {
                let stage = match name {
                    "BEFORE" => AuthStage::Before,
                    "AFTER" => AuthStage::After,
                    other => {
                        return Err(args.invalid("when", format!("unknown stage '{}'", other)))
                    }
                };
                stages.insert(stage);
            }
            if stages.is_empty() {
                return Err(args.invalid("when", "validate rules need at least one stage"));
            }
            stages
        }
        None => [AuthStage::Before, AuthStage::After].into_iter().collect(),
    };

    let require_authentication = args.opt_bool("requireAuthentication")?.unwrap_or(true);

    let predicate = match args.get("where") {
        Some(value) => parse_template(args, value)?,
        None => PredicateTemplate::empty(),
    };

    tracing::trace!(rule = key, ?operations, "parsed authorization rule");

    Ok(AuthRule {
        effect,
        operations,
        when,
        require_authentication,
        predicate,
    })
}

fn parse_template(args: &Args<'_>, value: &Value) -> Result<PredicateTemplate, AnnotationError> {
    let map = value
        .as_object()
        .ok_or_else(|| args.invalid("where", "expected an object"))?;

    let mut parts = Vec::new();
    let mut node = None;
    let mut jwt = None;

    for (key, inner) in map {
        match key.as_str() {
            "node" => node = Some(object_arg(args, inner, "where.node")?),
            "jwt" => jwt = Some(object_arg(args, inner, "where.jwt")?),
            "AND" | "OR" => {
                let items = inner
                    .as_array()
                    .ok_or_else(|| args.invalid("where", format!("{} expects a list", key)))?;
                let children = items
                    .iter()
                    .map(|item| parse_template(args, item))
                    .collect::<Result<Vec<_>, _>>()?;
                parts.push(if key == "AND" {
                    PredicateTemplate::And(children)
                } else {
                    PredicateTemplate::Or(children)
                });
            }
            "NOT" => parts.push(PredicateTemplate::Not(Box::new(parse_template(args, inner)?))),
            other => {
                return Err(args.invalid("where", format!("unexpected key '{}'", other)));
            }
        }
    }

    if node.is_some() || jwt.is_some() {
        parts.insert(0, PredicateTemplate::Leaf { node, jwt });
    }

    Ok(match parts.len() {
        0 => PredicateTemplate::empty(),
        1 => parts.remove(0),
        _ => PredicateTemplate::And(parts),
    })
}

fn object_arg(
    args: &Args<'_>,
    value: &Value,
    argument: &str,
) -> Result<Map<String, Value>, AnnotationError> {
    value
        .as_object()
        .cloned()
        .ok_or_else(|| args.invalid(argument, "expected an object"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{Annotation, AnnotationParser, AnnotationTarget};
    use crate::schema::RawAnnotation;
    use serde_json::json;

    fn parse(arguments: Value) -> Result<Authorization, AnnotationError> {
        let mut raw = RawAnnotation::new("authorization");
        if let Value::Object(map) = arguments {
            raw.arguments = map;
        }
        match AnnotationParser::parse(&raw, &AnnotationTarget::node("Post"))? {
            Annotation::Authorization(auth) => Ok(auth),
            other => panic!("unexpected annotation {:?}", other),
        }
    }

    #[test]
    fn test_validate_defaults_to_both_stages() {
        let auth = parse(json!({
            "validate": [{ "where": { "node": { "author": "$jwt.sub" } } }]
        }))
        .unwrap();

        let rule = &auth.rules[0];
        assert_eq!(rule.effect, RuleEffect::Validate);
        assert!(rule.when.contains(&AuthStage::Before));
        assert!(rule.when.contains(&AuthStage::After));
        assert!(rule.require_authentication);
        assert!(matches!(
            &rule.predicate,
            PredicateTemplate::Leaf { node: Some(node), jwt: None } if node["author"] == "$jwt.sub"
        ));
    }

    #[test]
    fn test_filter_defaults_exclude_create() {
        let auth = parse(json!({ "filter": [{ "requireAuthentication": false }] })).unwrap();
        let rule = &auth.rules[0];
        assert!(!rule.operations.contains(&AuthOperation::Create));
        assert!(rule.operations.contains(&AuthOperation::Read));
        assert!(!rule.require_authentication);
        assert_eq!(rule.predicate, PredicateTemplate::empty());
    }

    #[test]
    fn test_override_flag() {
        let plain = parse(json!({ "filter": [{}] })).unwrap();
        assert!(!plain.overrides);
        let overriding = parse(json!({ "override": true, "filter": [{}] })).unwrap();
        assert!(overriding.overrides);
        assert!(parse(json!({ "override": "yes", "filter": [{}] })).is_err());
    }

    #[test]
    fn test_unknown_operation_rejected() {
        let err = parse(json!({ "validate": [{ "operations": ["READ", "PUBLISH"] }] })).unwrap_err();
        assert!(matches!(err, AnnotationError::InvalidValue { ref argument, .. } if argument == "operations"));
    }

    #[test]
    fn test_validate_with_empty_when_rejected() {
        let err = parse(json!({ "validate": [{ "when": [] }] })).unwrap_err();
        assert!(matches!(err, AnnotationError::InvalidValue { ref argument, .. } if argument == "when"));
    }

    #[test]
    fn test_filter_rule_rejects_when() {
        let err = parse(json!({ "filter": [{ "when": ["BEFORE"] }] })).unwrap_err();
        assert!(matches!(err, AnnotationError::UnknownArgument { ref argument, .. } if argument == "when"));
    }

    #[test]
    fn test_filter_rule_rejects_create() {
        let err = parse(json!({ "filter": [{ "operations": ["CREATE"] }] })).unwrap_err();
        assert!(matches!(err, AnnotationError::InvalidValue { .. }));
    }

    #[test]
    fn test_combinators_in_where() {
        let auth = parse(json!({
            "validate": [{
                "where": {
                    "OR": [
                        { "jwt": { "roles_INCLUDES": "admin" } },
                        { "node": { "id": "$jwt.sub" } }
                    ]
                }
            }]
        }))
        .unwrap();
        assert!(matches!(auth.rules[0].predicate, PredicateTemplate::Or(ref parts) if parts.len() == 2));
    }

    #[test]
    fn test_missing_rule_lists_rejected() {
        let err = parse(json!({})).unwrap_err();
        assert!(matches!(err, AnnotationError::MissingArgument { .. }));
    }
}
