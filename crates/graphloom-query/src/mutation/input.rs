//! Property writes.
//!
//! Input values are checked against attribute types and normalized here.
//! Generated values (`@id`, `@timestamp`) and `@default`s are settled at
//! plan time, so rendering only decides how each write is spelled.

use crate::annotation::TimestampOperation;
use crate::error::{TranslateError, TranslateResult};
use crate::predicate::value;
use crate::schema::{Attribute, ScalarKind, SchemaModel};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl ArithmeticOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            ArithmeticOp::Add => "+",
            ArithmeticOp::Subtract => "-",
            ArithmeticOp::Multiply => "*",
            ArithmeticOp::Divide => "/",
        }
    }
}

/// Right-hand side of one `SET` assignment
#[derive(Debug, Clone, PartialEq)]
pub enum SetValue {
    /// Normalized literal, bound as a parameter
    Value(Value),
    /// Store-side expression such as `randomUUID()`
    Generated(String),
    Arithmetic(ArithmeticOp, Value),
    /// Elements appended to a list
    Push(Value),
    /// Number of trailing elements removed from a list
    Pop(u64),
}

#[derive(Debug, Clone)]
pub struct PropertyWrite<'m> {
    pub attribute: &'m Attribute,
    pub value: SetValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UpdateSuffix {
    Arithmetic(ArithmeticOp),
    Push,
    Pop,
}

const SUFFIXES: [(&str, UpdateSuffix); 8] = [
    ("_INCREMENT", UpdateSuffix::Arithmetic(ArithmeticOp::Add)),
    ("_DECREMENT", UpdateSuffix::Arithmetic(ArithmeticOp::Subtract)),
    ("_ADD", UpdateSuffix::Arithmetic(ArithmeticOp::Add)),
    ("_SUBTRACT", UpdateSuffix::Arithmetic(ArithmeticOp::Subtract)),
    ("_MULTIPLY", UpdateSuffix::Arithmetic(ArithmeticOp::Multiply)),
    ("_DIVIDE", UpdateSuffix::Arithmetic(ArithmeticOp::Divide)),
    ("_PUSH", UpdateSuffix::Push),
    ("_POP", UpdateSuffix::Pop),
];

/// Writes for a newly created node or relationship.
///
/// Attributes named in `skip` are set elsewhere (a `MERGE` key) and are
/// neither generated nor required here.
pub(crate) fn create_writes<'m>(
    model: &SchemaModel,
    owner: &str,
    attributes: &'m [Attribute],
    entries: &[(&str, &Value)],
    skip: &[&str],
    path: &str,
) -> TranslateResult<Vec<PropertyWrite<'m>>> {
    let mut writes = Vec::with_capacity(attributes.len());
    for (key, input) in entries {
        let attr = find(attributes, owner, key)?;
        let at = format!("{}.{}", path, key);
        if is_generated(attr) {
            return Err(TranslateError::invalid_input(at, "value is generated and cannot be set"));
        }
        writes.push(PropertyWrite {
            attribute: attr,
            value: SetValue::Value(literal(model, attr, input, &at)?),
        });
    }

    for attr in attributes {
        let name = attr.name.as_str();
        if skip.contains(&name) || entries.iter().any(|(key, _)| *key == name) {
            continue;
        }
        if let Some(value) = generated(attr, TimestampOperation::Create) {
            writes.push(PropertyWrite { attribute: attr, value });
            continue;
        }
        if let Some(default) = attr.annotations.default_value() {
            let at = format!("{}.{}", path, name);
            writes.push(PropertyWrite {
                attribute: attr,
                value: SetValue::Value(literal(model, attr, default, &at)?),
            });
            continue;
        }
        if attr.ty.required && attr.annotations.timestamp().is_none() {
            return Err(TranslateError::invalid_input(
                format!("{}.{}", path, name),
                format!("{}.{} is required", owner, name),
            ));
        }
    }
    Ok(writes)
}

/// Writes for an existing node or relationship, including the
/// `_INCREMENT`-style operators and update timestamps
pub(crate) fn update_writes<'m>(
    model: &SchemaModel,
    owner: &str,
    attributes: &'m [Attribute],
    entries: &[(&str, &Value)],
    path: &str,
) -> TranslateResult<Vec<PropertyWrite<'m>>> {
    let mut writes: Vec<PropertyWrite<'m>> = Vec::with_capacity(entries.len());
    for (key, input) in entries {
        let (attr, suffix) = update_key(attributes, owner, key)?;
        let at = format!("{}.{}", path, key);
        if is_generated(attr) {
            return Err(TranslateError::invalid_input(at, "value is generated and cannot be set"));
        }
        if writes.iter().any(|w| w.attribute.name == attr.name) {
            return Err(TranslateError::invalid_input(
                at,
                format!("conflicting updates to '{}'", attr.name),
            ));
        }
        let value = match suffix {
            None => SetValue::Value(literal(model, attr, input, &at)?),
            Some(UpdateSuffix::Arithmetic(op)) => {
                let integral = key.ends_with("_INCREMENT") || key.ends_with("_DECREMENT");
                let accepted = match attr.ty.scalar_kind() {
                    Some(ScalarKind::Int | ScalarKind::BigInt) => integral,
                    Some(ScalarKind::Float) => !integral,
                    _ => false,
                };
                if attr.ty.list || !accepted {
                    return Err(TranslateError::invalid_input(
                        at,
                        format!("operator not supported on {}", attr.ty),
                    ));
                }
                let operand = value::normalize_scalar(model, &attr.ty.kind, input)
                    .map_err(|m| TranslateError::invalid_input(&at, m))?;
                if operand.is_null() {
                    return Err(TranslateError::invalid_input(at, "operand cannot be null"));
                }
                SetValue::Arithmetic(op, operand)
            }
            Some(UpdateSuffix::Push) => {
                if !attr.ty.list {
                    return Err(TranslateError::invalid_input(at, "only lists support _PUSH"));
                }
                let items = if input.is_array() {
                    value::normalize_list(model, &attr.ty.kind, input)
                } else {
                    value::normalize_scalar(model, &attr.ty.kind, input).map(|v| Value::Array(vec![v]))
                }
                .map_err(|m| TranslateError::invalid_input(&at, m))?;
                SetValue::Push(items)
            }
            Some(UpdateSuffix::Pop) => {
                if !attr.ty.list {
                    return Err(TranslateError::invalid_input(at, "only lists support _POP"));
                }
                let count = input
                    .as_u64()
                    .ok_or_else(|| TranslateError::invalid_input(&at, "expected a non-negative integer"))?;
                SetValue::Pop(count)
            }
        };
        writes.push(PropertyWrite { attribute: attr, value });
    }

    for attr in attributes {
        if let Some(value) = generated(attr, TimestampOperation::Update) {
            writes.push(PropertyWrite { attribute: attr, value });
        }
    }
    Ok(writes)
}

fn find<'m>(attributes: &'m [Attribute], owner: &str, key: &str) -> TranslateResult<&'m Attribute> {
    attributes
        .iter()
        .find(|a| a.name == key)
        .ok_or_else(|| TranslateError::UnknownField {
            type_name: owner.to_string(),
            field: key.to_string(),
        })
}

fn update_key<'m>(
    attributes: &'m [Attribute],
    owner: &str,
    key: &str,
) -> TranslateResult<(&'m Attribute, Option<UpdateSuffix>)> {
    if let Some(attr) = attributes.iter().find(|a| a.name == key) {
        return Ok((attr, None));
    }
    for (suffix, op) in SUFFIXES {
        if let Some(base) = key.strip_suffix(suffix) {
            return Ok((find(attributes, owner, base)?, Some(op)));
        }
    }
    Err(TranslateError::UnknownField {
        type_name: owner.to_string(),
        field: key.to_string(),
    })
}

fn is_generated(attr: &Attribute) -> bool {
    attr.annotations.id().is_some_and(|id| id.autogenerate) || attr.annotations.timestamp().is_some()
}

fn generated(attr: &Attribute, operation: TimestampOperation) -> Option<SetValue> {
    if operation == TimestampOperation::Create && attr.annotations.id().is_some_and(|id| id.autogenerate) {
        return Some(SetValue::Generated("randomUUID()".to_string()));
    }
    let timestamp = attr.annotations.timestamp()?;
    if !timestamp.operations.contains(&operation) {
        return None;
    }
    let constructor = attr.ty.scalar_kind()?.constructor()?;
    Some(SetValue::Generated(format!("{}()", constructor)))
}

fn literal(model: &SchemaModel, attr: &Attribute, input: &Value, path: &str) -> TranslateResult<Value> {
    if input.is_null() && attr.ty.required {
        return Err(TranslateError::invalid_input(
            path,
            format!("{}.{} cannot be null", attr.owner, attr.name),
        ));
    }
    value::normalize(model, &attr.ty, input).map_err(|m| TranslateError::invalid_input(path, m))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{RawAnnotation, SchemaDeclarations, TypeDeclaration};
    use serde_json::json;

    fn model() -> SchemaModel {
        let mut decls = SchemaDeclarations::default();
        decls.nodes.push(
            TypeDeclaration::new("Movie")
                .annotated_field("id", "ID!", vec![RawAnnotation::new("id")])
                .field("title", "String!")
                .field("rating", "Float")
                .field("views", "Int")
                .field("tags", "[String!]")
                .annotated_field(
                    "status",
                    "String!",
                    vec![RawAnnotation::new("default").with_argument("value", json!("draft"))],
                )
                .annotated_field(
                    "updatedAt",
                    "DateTime",
                    vec![RawAnnotation::new("timestamp").with_argument("operations", json!(["UPDATE"]))],
                ),
        );
        SchemaModel::build(&decls).unwrap()
    }

    fn movie(model: &SchemaModel) -> &[Attribute] {
        &model.node("Movie").unwrap().fields.attributes
    }

    #[test]
    fn test_create_fills_generated_and_default() {
        let model = model();
        let title = json!("Heat");
        let writes = create_writes(&model, "Movie", movie(&model), &[("title", &title)], &[], "input[0]").unwrap();
        let summary: Vec<(&str, &SetValue)> = writes.iter().map(|w| (w.attribute.name.as_str(), &w.value)).collect();
        assert_eq!(
            summary,
            vec![
                ("title", &SetValue::Value(json!("Heat"))),
                ("id", &SetValue::Generated("randomUUID()".to_string())),
                ("status", &SetValue::Value(json!("draft"))),
            ]
        );
    }

    #[test]
    fn test_create_rejects_generated_id() {
        let model = model();
        let (id, title) = (json!("x"), json!("Heat"));
        let err = create_writes(&model, "Movie", movie(&model), &[("id", &id), ("title", &title)], &[], "input[0]")
            .unwrap_err();
        assert!(matches!(err, TranslateError::InvalidInput { ref path, .. } if path == "input[0].id"));
    }

    #[test]
    fn test_create_requires_non_null_attributes() {
        let model = model();
        let err = create_writes(&model, "Movie", movie(&model), &[], &[], "input[0]").unwrap_err();
        assert!(matches!(err, TranslateError::InvalidInput { ref path, .. } if path == "input[0].title"));
    }

    #[test]
    fn test_update_operators() {
        let model = model();
        let (views, tags, rating) = (json!(2), json!("new"), json!(1.5));
        let writes = update_writes(
            &model,
            "Movie",
            movie(&model),
            &[("views_INCREMENT", &views), ("tags_PUSH", &tags), ("rating_MULTIPLY", &rating)],
            "update",
        )
        .unwrap();
        assert_eq!(writes[0].value, SetValue::Arithmetic(ArithmeticOp::Add, json!(2)));
        assert_eq!(writes[1].value, SetValue::Push(json!(["new"])));
        assert_eq!(writes[2].value, SetValue::Arithmetic(ArithmeticOp::Multiply, json!(1.5)));
        assert_eq!(writes[3].attribute.name, "updatedAt");
        assert_eq!(writes[3].value, SetValue::Generated("datetime()".to_string()));
    }

    #[test]
    fn test_update_operator_kind_mismatch() {
        let model = model();
        let one = json!(1);
        let err = update_writes(&model, "Movie", movie(&model), &[("rating_INCREMENT", &one)], "update").unwrap_err();
        assert!(matches!(err, TranslateError::InvalidInput { .. }));
    }

    #[test]
    fn test_update_conflicting_keys() {
        let model = model();
        let (set, inc) = (json!(3), json!(1));
        let err = update_writes(&model, "Movie", movie(&model), &[("views", &set), ("views_INCREMENT", &inc)], "update")
            .unwrap_err();
        assert!(matches!(err, TranslateError::InvalidInput { ref message, .. } if message.contains("conflicting")));
    }

    #[test]
    fn test_update_unknown_attribute() {
        let model = model();
        let v = json!(1);
        let err = update_writes(&model, "Movie", movie(&model), &[("budget_INCREMENT", &v)], "update").unwrap_err();
        assert_eq!(
            err,
            TranslateError::UnknownField {
                type_name: "Movie".to_string(),
                field: "budget".to_string(),
            }
        );
    }
}
