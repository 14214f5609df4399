//! Change events and subscriptions.
//!
//! Writes describe the events they produce as [`EventDescriptor`]s next
//! to the compiled statement. A subscribe request compiles to a
//! [`SubscriptionPlan`], whose filter runs in memory against the
//! properties carried by each event.

use crate::annotation::{AuthOperation, AuthStage, PredicateTemplate, SubscriptionEvent};
use crate::error::{TranslateError, TranslateResult};
use crate::plan::OperationPlanner;
use crate::predicate::{classify, split_claim_key, value, FilterKey, FilterTarget, KeyError};
use crate::request::{OperationKind, OperationRequest};
use crate::schema::{FilterOperator, NodeType, SchemaModel};
use graphloom_config::TranslatorConfig;
use regex::Regex;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use tracing::{debug, trace};

/// One change a compiled write publishes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventDescriptor {
    pub event: SubscriptionEvent,
    pub type_name: String,
    /// Variable holding the node's properties before the write
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<String>,
    /// Variable bound to the node after the write
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relationship: Option<RelationshipEvent>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelationshipEvent {
    pub field: String,
    pub rel_type: String,
    pub from_type: String,
    pub from: String,
    pub to_type: String,
    pub to: String,
    /// Variable bound to the relationship
    pub relationship: String,
}

/// True when writes to `node` publish `event`; `@subscription` narrows the toggles
pub(crate) fn publishes(config: &TranslatorConfig, node: &NodeType, event: SubscriptionEvent) -> bool {
    config.subscriptions.enabled && node.toggles().allows_event(event)
}

/// Right-hand side of a property comparison
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operand {
    Literal(Value),
    /// Dotted path into the subscriber's claims
    Claim(String),
}

/// In-memory filter over event properties and subscriber claims
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventFilter {
    Property {
        property: String,
        #[serde(serialize_with = "operator_name")]
        operator: FilterOperator,
        operand: Operand,
    },
    Claim {
        path: String,
        #[serde(serialize_with = "operator_name")]
        operator: FilterOperator,
        operand: Value,
    },
    Authenticated,
    And(Vec<EventFilter>),
    Or(Vec<EventFilter>),
    Not(Box<EventFilter>),
}

fn operator_name<S: Serializer>(operator: &FilterOperator, serializer: S) -> Result<S::Ok, S::Error> {
    let name = match operator.suffix().trim_start_matches('_') {
        "" => "EQ",
        other => other,
    };
    serializer.serialize_str(name)
}

impl EventFilter {
    fn and(mut parts: Vec<EventFilter>) -> Option<EventFilter> {
        match parts.len() {
            0 => None,
            1 => parts.pop(),
            _ => Some(EventFilter::And(parts)),
        }
    }

    fn or(mut parts: Vec<EventFilter>) -> Option<EventFilter> {
        match parts.len() {
            0 => None,
            1 => parts.pop(),
            _ => Some(EventFilter::Or(parts)),
        }
    }

    pub fn evaluate(&self, properties: &Map<String, Value>, claims: Option<&Map<String, Value>>) -> bool {
        match self {
            EventFilter::Property {
                property,
                operator,
                operand,
            } => {
                let actual = properties.get(property).unwrap_or(&Value::Null);
                match operand {
                    Operand::Literal(expected) => compare(actual, *operator, expected),
                    Operand::Claim(path) => match claim(claims, path) {
                        Some(expected) => compare(actual, *operator, expected),
                        None => false,
                    },
                }
            }
            EventFilter::Claim {
                path,
                operator,
                operand,
            } => {
                let actual = claim(claims, path).unwrap_or(&Value::Null);
                compare(actual, *operator, operand)
            }
            EventFilter::Authenticated => claims.is_some(),
            EventFilter::And(parts) => parts.iter().all(|p| p.evaluate(properties, claims)),
            EventFilter::Or(parts) => parts.iter().any(|p| p.evaluate(properties, claims)),
            EventFilter::Not(inner) => !inner.evaluate(properties, claims),
        }
    }
}

/// A compiled subscribe request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubscriptionPlan {
    pub type_name: String,
    pub events: Vec<SubscriptionEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<EventFilter>,
    /// SUBSCRIBE rules; every declaring type must be satisfied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization: Option<EventFilter>,
}

impl SubscriptionPlan {
    pub fn accepts(&self, event: SubscriptionEvent) -> bool {
        self.events.contains(&event)
    }

    /// Whether an event carrying `properties` reaches a subscriber with `claims`
    pub fn matches(&self, properties: &Map<String, Value>, claims: Option<&Map<String, Value>>) -> bool {
        let allowed = self
            .authorization
            .as_ref()
            .map_or(true, |auth| auth.evaluate(properties, claims));
        allowed && self.filter.as_ref().map_or(true, |f| f.evaluate(properties, claims))
    }
}

/// Compiles subscribe requests
pub struct SubscriptionPlanner<'m> {
    model: &'m SchemaModel,
    config: &'m TranslatorConfig,
}

impl<'m> SubscriptionPlanner<'m> {
    pub fn new(model: &'m SchemaModel, config: &'m TranslatorConfig) -> Self {
        Self { model, config }
    }

    pub fn plan(&self, request: &OperationRequest) -> TranslateResult<SubscriptionPlan> {
        let node = OperationPlanner::new(self.model, self.config).root_node(&request.target, OperationKind::Subscribe)?;
        let disabled = || TranslateError::OperationDisabled {
            type_name: node.name.clone(),
            operation: OperationKind::Subscribe.name().to_string(),
        };

        let published: Vec<SubscriptionEvent> = SubscriptionEvent::ALL
            .into_iter()
            .filter(|event| publishes(self.config, node, *event))
            .collect();
        let events = if request.arguments.events.is_empty() {
            published
        } else {
            let mut requested = request.arguments.events.clone();
            requested.sort();
            requested.dedup();
            if requested.iter().any(|event| !published.contains(event)) {
                return Err(disabled());
            }
            requested
        };
        if events.is_empty() {
            return Err(disabled());
        }

        let filter = match request.arguments.filter.as_ref() {
            Some(map) => self.compile(node, map, false)?,
            None => None,
        };
        let authorization = self.authorization(node)?;
        debug!(type_name = %node.name, events = events.len(), "compiled subscription");
        Ok(SubscriptionPlan {
            type_name: node.name.clone(),
            events,
            filter,
            authorization,
        })
    }

    fn authorization(&self, node: &'m NodeType) -> TranslateResult<Option<EventFilter>> {
        let mut groups = Vec::new();
        for set in self.model.governing_annotations(node) {
            let Some(auth) = set.authorization() else {
                continue;
            };
            let mut alternatives = Vec::new();
            for rule in auth.rules.iter().filter(|r| r.applies_to(AuthOperation::Subscribe, AuthStage::Before)) {
                let mut parts = Vec::new();
                if rule.require_authentication {
                    parts.push(EventFilter::Authenticated);
                }
                parts.extend(self.template(node, &rule.predicate)?);
                // an empty rule admits everyone
                alternatives.push(EventFilter::and(parts).unwrap_or(EventFilter::And(Vec::new())));
            }
            if let Some(group) = EventFilter::or(alternatives) {
                groups.push(group);
            }
        }
        trace!(type_name = %node.name, groups = groups.len(), "subscription rules");
        Ok(EventFilter::and(groups))
    }

    fn template(&self, node: &'m NodeType, template: &PredicateTemplate) -> TranslateResult<Option<EventFilter>> {
        match template {
            PredicateTemplate::Leaf { node: filter, jwt } => {
                let mut parts = Vec::new();
                if let Some(map) = filter {
                    parts.extend(self.compile(node, map, true)?);
                }
                if let Some(map) = jwt {
                    parts.extend(claims_filter(map)?);
                }
                Ok(EventFilter::and(parts))
            }
            PredicateTemplate::And(items) => {
                let mut parts = Vec::new();
                for item in items {
                    parts.extend(self.template(node, item)?);
                }
                Ok(EventFilter::and(parts))
            }
            PredicateTemplate::Or(items) => {
                let mut parts = Vec::new();
                for item in items {
                    // an always-true alternative makes the whole disjunction true
                    match self.template(node, item)? {
                        Some(part) => parts.push(part),
                        None => return Ok(None),
                    }
                }
                Ok(EventFilter::or(parts))
            }
            PredicateTemplate::Not(inner) => Ok(Some(EventFilter::Not(Box::new(
                self.template(node, inner)?.unwrap_or(EventFilter::And(Vec::new())),
            )))),
        }
    }

    /// Compile a node filter; `placeholders` lets `$jwt.` strings refer to claims
    fn compile(&self, node: &'m NodeType, map: &Map<String, Value>, placeholders: bool) -> TranslateResult<Option<EventFilter>> {
        let type_name = node.name.as_str();
        let mut parts = Vec::with_capacity(map.len());
        for (key, operand) in map {
            let kind = classify(key, FilterTarget::Node(node)).map_err(|e| match e {
                KeyError::Unknown => TranslateError::filter(type_name, key, "unknown filter field"),
                KeyError::Unsupported(suffix) => TranslateError::filter(
                    type_name,
                    key,
                    format!("operator '{}' is not supported for this field", suffix),
                ),
            })?;
            match kind {
                FilterKey::And | FilterKey::Or => {
                    let items = operand
                        .as_array()
                        .ok_or_else(|| TranslateError::filter(type_name, key, "expected a list of filters"))?;
                    let mut compiled = Vec::with_capacity(items.len());
                    for item in items {
                        let item = item
                            .as_object()
                            .ok_or_else(|| TranslateError::filter(type_name, key, "expected a filter object"))?;
                        compiled.extend(self.compile(node, item, placeholders)?);
                    }
                    let combined = if matches!(kind, FilterKey::And) {
                        EventFilter::and(compiled)
                    } else if compiled.len() < items.len() {
                        // some alternative always holds
                        None
                    } else {
                        EventFilter::or(compiled)
                    };
                    parts.extend(combined);
                }
                FilterKey::Not => {
                    let inner = operand
                        .as_object()
                        .ok_or_else(|| TranslateError::filter(type_name, key, "expected a filter object"))?;
                    let inner = self.compile(node, inner, placeholders)?;
                    parts.push(EventFilter::Not(Box::new(inner.unwrap_or(EventFilter::And(Vec::new())))));
                }
                FilterKey::Attribute(attr, op) => {
                    if !attr.supports(op, &self.config.filters) {
                        return Err(TranslateError::filter(type_name, key, "operator is disabled by configuration"));
                    }
                    if op == FilterOperator::Distance {
                        return Err(TranslateError::filter(type_name, key, "distance is not available in subscriptions"));
                    }
                    let claim_path = operand
                        .as_str()
                        .filter(|_| placeholders)
                        .and_then(|s| s.strip_prefix("$jwt."));
                    let operand = match claim_path {
                        Some(path) => Operand::Claim(path.to_string()),
                        None => {
                            let normalized = if op.takes_list() {
                                value::normalize_list(self.model, &attr.ty.kind, operand)
                            } else if matches!(op, FilterOperator::Includes | FilterOperator::NotIncludes) {
                                value::normalize_scalar(self.model, &attr.ty.kind, operand)
                            } else {
                                value::normalize(self.model, &attr.ty, operand)
                            };
                            Operand::Literal(normalized.map_err(|m| TranslateError::filter(type_name, key, m))?)
                        }
                    };
                    parts.push(EventFilter::Property {
                        property: attr.db_name.clone(),
                        operator: op,
                        operand,
                    });
                }
                FilterKey::TypenameIn | FilterKey::Computed(..) => {
                    return Err(TranslateError::filter(type_name, key, "not available in subscriptions"));
                }
                FilterKey::Relationship { .. } | FilterKey::Connection(..) | FilterKey::Aggregate(_) => {
                    return Err(TranslateError::filter(
                        type_name,
                        key,
                        "relationship filters are not available in subscriptions",
                    ));
                }
            }
        }
        Ok(EventFilter::and(parts))
    }
}

fn claims_filter(map: &Map<String, Value>) -> TranslateResult<Option<EventFilter>> {
    let mut parts = Vec::with_capacity(map.len());
    for (key, operand) in map {
        match key.as_str() {
            "AND" | "OR" => {
                let items = operand
                    .as_array()
                    .ok_or_else(|| TranslateError::filter("jwt", key, "expected a list of filters"))?;
                let mut compiled = Vec::with_capacity(items.len());
                for item in items {
                    let item = item
                        .as_object()
                        .ok_or_else(|| TranslateError::filter("jwt", key, "expected a filter object"))?;
                    compiled.extend(claims_filter(item)?);
                }
                let combined = if key == "AND" {
                    EventFilter::and(compiled)
                } else if compiled.len() < items.len() {
                    None
                } else {
                    EventFilter::or(compiled)
                };
                parts.extend(combined);
            }
            "NOT" => {
                let inner = operand
                    .as_object()
                    .ok_or_else(|| TranslateError::filter("jwt", key, "expected a filter object"))?;
                let inner = claims_filter(inner)?.unwrap_or(EventFilter::And(Vec::new()));
                parts.push(EventFilter::Not(Box::new(inner)));
            }
            _ => {
                let (path, operator) = split_claim_key(key);
                if operator == FilterOperator::Distance {
                    return Err(TranslateError::filter("jwt", key, "operator is not supported for claims"));
                }
                parts.push(EventFilter::Claim {
                    path: path.to_string(),
                    operator,
                    operand: operand.clone(),
                });
            }
        }
    }
    Ok(EventFilter::and(parts))
}

fn claim<'c>(claims: Option<&'c Map<String, Value>>, path: &str) -> Option<&'c Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = claims?.get(first)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn compare(actual: &Value, operator: FilterOperator, expected: &Value) -> bool {
    if expected.is_null() {
        return match operator {
            FilterOperator::Equals => actual.is_null(),
            FilterOperator::Not => !actual.is_null(),
            _ => false,
        };
    }
    if actual.is_null() {
        return false;
    }
    let positive = match operator.positive() {
        FilterOperator::Equals => same(actual, expected),
        FilterOperator::In => expected
            .as_array()
            .is_some_and(|items| items.iter().any(|item| same(actual, item))),
        FilterOperator::LessThan => order(actual, expected) == Some(Ordering::Less),
        FilterOperator::LessThanOrEqual => {
            matches!(order(actual, expected), Some(Ordering::Less | Ordering::Equal))
        }
        FilterOperator::GreaterThan => order(actual, expected) == Some(Ordering::Greater),
        FilterOperator::GreaterThanOrEqual => {
            matches!(order(actual, expected), Some(Ordering::Greater | Ordering::Equal))
        }
        FilterOperator::Contains => text(actual, expected, |a, e| a.contains(e)),
        FilterOperator::StartsWith => text(actual, expected, |a, e| a.starts_with(e)),
        FilterOperator::EndsWith => text(actual, expected, |a, e| a.ends_with(e)),
        FilterOperator::Matches => text(actual, expected, |a, e| {
            Regex::new(&format!("^(?:{})$", e)).is_ok_and(|re| re.is_match(a))
        }),
        FilterOperator::Includes => actual
            .as_array()
            .is_some_and(|items| items.iter().any(|item| same(item, expected))),
        _ => false,
    };
    positive != operator.is_negated()
}

fn same(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn order(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn text(actual: &Value, expected: &Value, test: impl Fn(&str, &str) -> bool) -> bool {
    match (actual.as_str(), expected.as_str()) {
        (Some(a), Some(e)) => test(a, e),
        _ => false,
    }
}
