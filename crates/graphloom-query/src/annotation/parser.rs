//! Raw annotation occurrence → typed [`Annotation`].

use super::auth::parse_authorization;
use super::{
    Annotation, ComputedBinding, Direction, IdAnnotation, LimitAnnotation, OperationToggles,
    RelationshipAnnotation, SubscriptionEvent, SubscriptionFilter, TimestampAnnotation,
    TimestampOperation, ToggleOrigin, UniqueConstraint,
};
use crate::error::AnnotationError;
use crate::schema::RawAnnotation;
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// What an annotation is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationTarget<'a> {
    Type { name: &'a str, interface: bool },
    Field { owner: &'a str, field: &'a str },
}

impl<'a> AnnotationTarget<'a> {
    pub fn node(name: &'a str) -> Self {
        AnnotationTarget::Type {
            name,
            interface: false,
        }
    }

    pub fn interface(name: &'a str) -> Self {
        AnnotationTarget::Type {
            name,
            interface: true,
        }
    }

    pub fn field(owner: &'a str, field: &'a str) -> Self {
        AnnotationTarget::Field { owner, field }
    }

    pub fn describe(&self) -> String {
        match self {
            AnnotationTarget::Type { name, .. } => name.to_string(),
            AnnotationTarget::Field { owner, field } => format!("{}.{}", owner, field),
        }
    }

    fn location(&self) -> &'static str {
        match self {
            AnnotationTarget::Type {
                interface: false, ..
            } => "type",
            AnnotationTarget::Type { interface: true, .. } => "interface",
            AnnotationTarget::Field { .. } => "field",
        }
    }
}

const TYPE_ANNOTATIONS: [&str; 7] = [
    "authorization",
    "query",
    "mutation",
    "subscription",
    "exclude",
    "limit",
    "node",
];

const INTERFACE_ANNOTATIONS: [&str; 2] = ["authorization", "limit"];

const FIELD_ANNOTATIONS: [&str; 8] = [
    "authorization",
    "cypher",
    "unique",
    "relationship",
    "alias",
    "id",
    "timestamp",
    "default",
];

/// Parses one raw annotation occurrence
pub struct AnnotationParser;

impl AnnotationParser {
    pub fn parse(
        raw: &RawAnnotation,
        target: &AnnotationTarget<'_>,
    ) -> Result<Annotation, AnnotationError> {
        let name = raw.name.trim_start_matches('@');
        let known = TYPE_ANNOTATIONS.contains(&name) || FIELD_ANNOTATIONS.contains(&name);
        if !known {
            return Err(AnnotationError::Unknown {
                annotation: name.to_string(),
                target: target.describe(),
            });
        }

        let allowed: &[&str] = match target {
            AnnotationTarget::Type {
                interface: false, ..
            } => &TYPE_ANNOTATIONS,
            AnnotationTarget::Type { interface: true, .. } => &INTERFACE_ANNOTATIONS,
            AnnotationTarget::Field { .. } => &FIELD_ANNOTATIONS,
        };
        if !allowed.contains(&name) {
            return Err(AnnotationError::WrongLocation {
                annotation: name.to_string(),
                location: target.location().to_string(),
                target: target.describe(),
            });
        }

        let args = Args {
            annotation: name,
            target: target.describe(),
            map: &raw.arguments,
        };

        match name {
            "authorization" => parse_authorization(&args).map(Annotation::Authorization),
            "cypher" => parse_cypher(&args),
            "query" => parse_query(&args),
            "mutation" => parse_mutation(&args),
            "subscription" => parse_subscription(&args),
            "exclude" => parse_exclude(&args),
            "unique" => {
                args.allow_only(&["constraintName"])?;
                Ok(Annotation::Unique(UniqueConstraint {
                    constraint_name: args.opt_str("constraintName")?.map(str::to_string),
                }))
            }
            "relationship" => parse_relationship(&args),
            "alias" => {
                args.allow_only(&["property"])?;
                let property = args.required_str("property")?;
                if property.is_empty() {
                    return Err(args.invalid("property", "must not be empty"));
                }
                Ok(Annotation::Alias(property.to_string()))
            }
            "id" => {
                args.allow_only(&["autogenerate"])?;
                Ok(Annotation::Id(IdAnnotation {
                    autogenerate: args.opt_bool("autogenerate")?.unwrap_or(true),
                }))
            }
            "timestamp" => parse_timestamp(&args),
            "default" => {
                args.allow_only(&["value"])?;
                let value = args.get("value").ok_or_else(|| args.missing("value"))?;
                Ok(Annotation::Default(value.clone()))
            }
            "limit" => parse_limit(&args),
            "node" => {
                args.allow_only(&["labels"])?;
                let labels = args
                    .opt_str_list("labels")?
                    .ok_or_else(|| args.missing("labels"))?;
                if labels.is_empty() {
                    return Err(args.invalid("labels", "at least one label is required"));
                }
                Ok(Annotation::NodeLabels(
                    labels.into_iter().map(str::to_string).collect(),
                ))
            }
            other => Err(AnnotationError::Unknown {
                annotation: other.to_string(),
                target: target.describe(),
            }),
        }
    }
}

fn parse_cypher(args: &Args<'_>) -> Result<Annotation, AnnotationError> {
    args.allow_only(&["statement", "columnName"])?;
    let statement = args.required_str("statement")?;
    if statement.trim().is_empty() {
        return Err(args.invalid("statement", "must not be empty"));
    }
    Ok(Annotation::Computed(ComputedBinding {
        statement: statement.trim().to_string(),
        result_column: args.opt_str("columnName")?.map(str::to_string),
    }))
}

fn parse_query(args: &Args<'_>) -> Result<Annotation, AnnotationError> {
    args.allow_only(&["read", "aggregate"])?;
    let mut toggles = OperationToggles::all_enabled(ToggleOrigin::Query);
    toggles.read = args.opt_bool("read")?.unwrap_or(true);
    toggles.aggregate = args.opt_bool("aggregate")?.unwrap_or(true);
    Ok(Annotation::OperationToggles(toggles))
}

fn parse_mutation(args: &Args<'_>) -> Result<Annotation, AnnotationError> {
    args.allow_only(&["operations"])?;
    let mut toggles = OperationToggles::all_enabled(ToggleOrigin::Mutation);
    if let Some(ops) = args.opt_str_list("operations")? {
        toggles.create = false;
        toggles.update = false;
        toggles.delete = false;
        for op in ops {
            match op {
                "CREATE" => toggles.create = true,
                "UPDATE" => toggles.update = true,
                "DELETE" => toggles.delete = true,
                other => {
                    return Err(args.invalid("operations", format!("unknown operation '{}'", other)))
                }
            }
        }
    }
    Ok(Annotation::OperationToggles(toggles))
}

fn parse_subscription(args: &Args<'_>) -> Result<Annotation, AnnotationError> {
    args.allow_only(&["events"])?;
    let events: BTreeSet<SubscriptionEvent> = match args.opt_str_list("events")? {
        Some(names) => names
            .into_iter()
            .map(|name| {
                SubscriptionEvent::from_name(name)
                    .ok_or_else(|| args.invalid("events", format!("unknown event '{}'", name)))
            })
            .collect::<Result<_, _>>()?,
        None => SubscriptionEvent::ALL.into_iter().collect(),
    };
    Ok(Annotation::SubscriptionFilter(SubscriptionFilter { events }))
}

fn parse_exclude(args: &Args<'_>) -> Result<Annotation, AnnotationError> {
    args.allow_only(&["operations"])?;
    let mut toggles = OperationToggles::all_enabled(ToggleOrigin::Exclude);
    let ops = args
        .opt_str_list("operations")?
        .unwrap_or_else(|| vec!["READ", "CREATE", "UPDATE", "DELETE"]);
    for op in ops {
        match op {
            "READ" => {
                toggles.read = false;
                toggles.aggregate = false;
            }
            "CREATE" => toggles.create = false,
            "UPDATE" => toggles.update = false,
            "DELETE" => toggles.delete = false,
            other => {
                return Err(args.invalid("operations", format!("unknown operation '{}'", other)))
            }
        }
    }
    Ok(Annotation::OperationToggles(toggles))
}

fn parse_relationship(args: &Args<'_>) -> Result<Annotation, AnnotationError> {
    args.allow_only(&["type", "direction", "properties", "queryDirection"])?;
    let rel_type = args.required_str("type")?;
    if rel_type.is_empty() {
        return Err(args.invalid("type", "must not be empty"));
    }
    let direction = match args.required_str("direction")? {
        "OUT" => Direction::Out,
        "IN" => Direction::In,
        other => {
            return Err(args.invalid(
                "direction",
                format!("expected IN or OUT, found '{}'", other),
            ))
        }
    };
    let undirected_queries = match args.opt_str("queryDirection")? {
        None | Some("DIRECTED") => false,
        Some("UNDIRECTED") => true,
        Some(other) => {
            return Err(args.invalid(
                "queryDirection",
                format!("expected DIRECTED or UNDIRECTED, found '{}'", other),
            ))
        }
    };
    Ok(Annotation::Relationship(RelationshipAnnotation {
        rel_type: rel_type.to_string(),
        direction,
        properties: args.opt_str("properties")?.map(str::to_string),
        undirected_queries,
    }))
}

fn parse_timestamp(args: &Args<'_>) -> Result<Annotation, AnnotationError> {
    args.allow_only(&["operations"])?;
    let operations = match args.opt_str_list("operations")? {
        Some(names) => names
            .into_iter()
            .map(|name| match name {
                "CREATE" => Ok(TimestampOperation::Create),
                "UPDATE" => Ok(TimestampOperation::Update),
                other => Err(args.invalid("operations", format!("unknown operation '{}'", other))),
            })
            .collect::<Result<Vec<_>, _>>()?,
        None => vec![TimestampOperation::Create, TimestampOperation::Update],
    };
    Ok(Annotation::Timestamp(TimestampAnnotation { operations }))
}

fn parse_limit(args: &Args<'_>) -> Result<Annotation, AnnotationError> {
    args.allow_only(&["default", "max"])?;
    let default = args.opt_positive("default")?;
    let max = args.opt_positive("max")?;
    if let (Some(d), Some(m)) = (default, max) {
        if d > m {
            return Err(args.invalid(
                "default",
                format!("default {} is greater than max {}", d, m),
            ));
        }
    }
    Ok(Annotation::Limit(LimitAnnotation { default, max }))
}

/// Argument accessor that reports errors against one annotation occurrence
pub(super) struct Args<'a> {
    annotation: &'a str,
    target: String,
    map: &'a Map<String, Value>,
}

impl<'a> Args<'a> {
    /// Same annotation and target, different argument object
    pub(super) fn nested<'b>(&'b self, map: &'b Map<String, Value>) -> Args<'b> {
        Args {
            annotation: self.annotation,
            target: self.target.clone(),
            map,
        }
    }

    pub(super) fn get(&self, key: &str) -> Option<&'a Value> {
        self.map.get(key)
    }

    pub(super) fn allow_only(&self, allowed: &[&str]) -> Result<(), AnnotationError> {
        match self.map.keys().find(|k| !allowed.contains(&k.as_str())) {
            Some(unknown) => Err(AnnotationError::UnknownArgument {
                annotation: self.annotation.to_string(),
                target: self.target.clone(),
                argument: unknown.clone(),
            }),
            None => Ok(()),
        }
    }

    pub(super) fn invalid(&self, argument: &str, reason: impl Into<String>) -> AnnotationError {
        AnnotationError::InvalidValue {
            annotation: self.annotation.to_string(),
            target: self.target.clone(),
            argument: argument.to_string(),
            reason: reason.into(),
        }
    }

    pub(super) fn missing(&self, argument: &str) -> AnnotationError {
        AnnotationError::MissingArgument {
            annotation: self.annotation.to_string(),
            target: self.target.clone(),
            argument: argument.to_string(),
        }
    }

    pub(super) fn required_str(&self, key: &str) -> Result<&'a str, AnnotationError> {
        self.opt_str(key)?.ok_or_else(|| self.missing(key))
    }

    pub(super) fn opt_str(&self, key: &str) -> Result<Option<&'a str>, AnnotationError> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(_) => Err(self.invalid(key, "expected a string")),
        }
    }

    pub(super) fn opt_bool(&self, key: &str) -> Result<Option<bool>, AnnotationError> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(_) => Err(self.invalid(key, "expected a boolean")),
        }
    }

    pub(super) fn opt_positive(&self, key: &str) -> Result<Option<u64>, AnnotationError> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => match n.as_u64() {
                Some(0) | None => Err(self.invalid(key, "expected a positive integer")),
                Some(v) => Ok(Some(v)),
            },
            Some(_) => Err(self.invalid(key, "expected a positive integer")),
        }
    }

    /// A list of strings; a bare string is a one-element list
    pub(super) fn opt_str_list(&self, key: &str) -> Result<Option<Vec<&'a str>>, AnnotationError> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(vec![s.as_str()])),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .ok_or_else(|| self.invalid(key, "expected a list of strings"))
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Some),
            Some(_) => Err(self.invalid(key, "expected a list of strings")),
        }
    }
}
