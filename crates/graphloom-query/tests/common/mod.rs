//! Shared schema fixtures for the integration tests

#![allow(dead_code)]

use graphloom_config::TranslatorConfig;
use graphloom_query::{
    AuthContext, CompiledStatement, OperationRequest, RawAnnotation, SchemaDeclarations,
    SchemaModel, Translation, TranslateResult, Translator, TypeDeclaration,
};
use serde_json::{json, Map, Value};

pub fn rel(rel_type: &str, direction: &str) -> Vec<RawAnnotation> {
    vec![RawAnnotation::new("relationship")
        .with_argument("type", json!(rel_type))
        .with_argument("direction", json!(direction))]
}

pub fn rel_with_properties(rel_type: &str, direction: &str, properties: &str) -> Vec<RawAnnotation> {
    vec![RawAnnotation::new("relationship")
        .with_argument("type", json!(rel_type))
        .with_argument("direction", json!(direction))
        .with_argument("properties", json!(properties))]
}

pub fn authorization(arguments: Value) -> RawAnnotation {
    let mut raw = RawAnnotation::new("authorization");
    if let Value::Object(map) = arguments {
        raw.arguments = map;
    }
    raw
}

/// Movies, series, people and a small social graph
pub fn catalog() -> SchemaModel {
    let mut decls = SchemaDeclarations::default();
    decls
        .interfaces
        .push(TypeDeclaration::new("Production").field("title", "String!"));
    decls.nodes.push(
        TypeDeclaration::new("Movie")
            .implements("Production")
            .annotated_field("id", "ID!", vec![RawAnnotation::new("id")])
            .field("title", "String!")
            .field("released", "Int")
            .field("tags", "[String!]")
            .annotated_field(
                "actors",
                "[Actor!]!",
                rel_with_properties("ACTED_IN", "IN", "ActedIn"),
            )
            .annotated_field("director", "Person!", rel("DIRECTED", "IN")),
    );
    decls.nodes.push(
        TypeDeclaration::new("Series")
            .implements("Production")
            .field("title", "String!")
            .field("episodes", "Int"),
    );
    decls.nodes.push(
        TypeDeclaration::new("Actor")
            .field("name", "String!")
            .annotated_field(
                "movies",
                "[Movie!]!",
                rel_with_properties("ACTED_IN", "OUT", "ActedIn"),
            ),
    );
    decls
        .nodes
        .push(TypeDeclaration::new("Person").field("name", "String!"));
    decls.nodes.push(
        TypeDeclaration::new("Post")
            .field("title", "String")
            .annotated_field("likes", "[User!]!", rel("LIKES", "OUT")),
    );
    decls
        .nodes
        .push(TypeDeclaration::new("User").field("name", "String"));
    decls
        .relationship_properties
        .push(TypeDeclaration::new("ActedIn").field("role", "String"));
    SchemaModel::build(&decls).unwrap()
}

pub fn claims(value: Value) -> AuthContext {
    match value {
        Value::Object(map) => AuthContext::with_claims(map),
        _ => AuthContext::with_claims(Map::new()),
    }
}

pub fn compile(
    model: &SchemaModel,
    config: &TranslatorConfig,
    request: &OperationRequest,
    auth: &AuthContext,
) -> TranslateResult<CompiledStatement> {
    match Translator::new(model, config).translate(request, auth)? {
        Translation::Statement(statement) => Ok(statement),
        Translation::Subscription(plan) => panic!("expected a statement, got {:?}", plan),
    }
}

pub fn object(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

pub fn position(text: &str, needle: &str) -> usize {
    text.find(needle)
        .unwrap_or_else(|| panic!("missing {:?} in:\n{}", needle, text))
}
