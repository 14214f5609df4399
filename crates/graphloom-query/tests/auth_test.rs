//! Authorization rules woven into statements

mod common;

use common::{authorization, claims, compile, position, rel};
use graphloom_config::TranslatorConfig;
use graphloom_query::{
    AuthContext, ErrorKind, Field, OperationKind, OperationRequest, SchemaDeclarations,
    SchemaModel, SelectionSet, TranslateError, TypeDeclaration,
};
use serde_json::json;

fn guarded() -> SchemaModel {
    let mut decls = SchemaDeclarations::default();
    decls.interfaces.push(
        TypeDeclaration::new("Content")
            .field("title", "String!")
            .annotation(authorization(json!({
                "validate": [{ "operations": ["READ"], "where": { "jwt": { "roles_INCLUDES": "reader" } } }]
            }))),
    );
    decls.nodes.push(
        TypeDeclaration::new("Movie")
            .implements("Content")
            .field("title", "String!")
            .annotated_field("actors", "[Actor!]!", rel("ACTED_IN", "IN"))
            .annotation(authorization(json!({
                "validate": [{ "operations": ["READ"], "where": { "node": { "title_NOT": "classified" } } }]
            }))),
    );
    decls.nodes.push(
        TypeDeclaration::new("Actor")
            .field("name", "String!")
            .annotation(authorization(json!({
                "validate": [{ "operations": ["READ"], "where": { "jwt": { "roles_INCLUDES": "casting" } } }]
            }))),
    );
    decls.nodes.push(
        TypeDeclaration::new("Note")
            .field("body", "String!")
            .field("owner", "String!")
            .annotation(authorization(json!({
                "filter": [{ "where": { "node": { "owner": "$jwt.sub" } } }]
            }))),
    );
    decls.nodes.push(
        TypeDeclaration::new("Notice")
            .field("body", "String!")
            .annotation(authorization(json!({
                "validate": [
                    { "operations": ["READ"], "requireAuthentication": false, "where": { "node": { "body_NOT": "" } } }
                ]
            }))),
    );
    decls.nodes.push(
        TypeDeclaration::new("Doc")
            .field("title", "String")
            .field("published", "Boolean")
            .annotation(authorization(json!({
                "validate": [
                    { "operations": ["READ"], "where": { "jwt": { "roles_INCLUDES": "admin" } } },
                    { "operations": ["READ"], "requireAuthentication": false, "where": { "node": { "published": true } } }
                ]
            }))),
    );
    SchemaModel::build(&decls).unwrap()
}

fn staff() -> AuthContext {
    claims(json!({ "sub": "u1", "roles": ["reader", "casting"] }))
}

// ===== Validate rules =====

#[test]
fn test_ancestor_guard_precedes_descendant_guard() {
    let model = guarded();
    let config = TranslatorConfig::default();
    let request = OperationRequest::new(OperationKind::Read, "Movie").with_selection(
        SelectionSet::of(["title"]).field(Field::new("actors").select(SelectionSet::of(["name"]))),
    );
    let statement = compile(&model, &config, &request, &staff()).unwrap();
    let text = &statement.text;

    assert_eq!(text.matches("apoc.util.validate").count(), 2, "{}", text);
    let movie_guard = position(text, "apoc.util.validate");
    let nested = position(text, "CALL {");
    assert!(movie_guard < nested, "{}", text);
    assert!(text.rfind("apoc.util.validate").unwrap() > nested);
    assert!(text.contains("\"@graphloom/FORBIDDEN\""));
}

#[test]
fn test_local_and_interface_rules_must_both_hold() {
    let model = guarded();
    let config = TranslatorConfig::default();
    let request = OperationRequest::new(OperationKind::Read, "Movie").with_selection(SelectionSet::of(["title"]));
    let statement = compile(&model, &config, &request, &staff()).unwrap();
    let guard = statement
        .text
        .lines()
        .find(|line| line.contains("apoc.util.validate"))
        .unwrap()
        .to_string();

    // both groups sit inside the one negated conjunction
    assert!(guard.contains("this.title = $param"), "{}", guard);
    assert!(guard.contains("IN $jwt.roles"), "{}", guard);
    assert!(!guard.contains(" OR "), "{}", guard);
}

#[test]
fn test_anonymous_caller_rejected_before_emission() {
    let model = guarded();
    let config = TranslatorConfig::default();
    let request = OperationRequest::new(OperationKind::Read, "Movie").with_selection(SelectionSet::of(["title"]));
    let err = compile(&model, &config, &request, &AuthContext::anonymous()).unwrap_err();
    assert!(matches!(err, TranslateError::Forbidden { .. }));
    assert_eq!(err.kind(), ErrorKind::Forbidden);
}

#[test]
fn test_rule_without_authentication_allows_anonymous() {
    let model = guarded();
    let config = TranslatorConfig::default();
    let request = OperationRequest::new(OperationKind::Read, "Notice").with_selection(SelectionSet::of(["body"]));
    let statement = compile(&model, &config, &request, &AuthContext::anonymous()).unwrap();
    assert!(
        statement.text.contains("apoc.util.validate(NOT (coalesce(NOT (this.body = $param0), false))"),
        "{}",
        statement.text
    );
    assert!(!statement.text.contains("$isAuthenticated = true"));
}

#[test]
fn test_read_guard_ignored_for_other_operations() {
    let model = guarded();
    let config = TranslatorConfig::default();
    let request = OperationRequest::new(OperationKind::Aggregate, "Movie").with_selection(SelectionSet::of(["count"]));
    let statement = compile(&model, &config, &request, &AuthContext::anonymous()).unwrap();
    assert!(!statement.text.contains("apoc.util.validate"));
}

#[test]
fn test_guard_rejects_when_claim_or_property_is_missing() {
    let model = guarded();
    let config = TranslatorConfig::default();
    let request = OperationRequest::new(OperationKind::Read, "Doc").with_selection(SelectionSet::of(["title"]));
    let statement = compile(&model, &config, &request, &claims(json!({ "sub": "u1" }))).unwrap();

    assert!(
        statement.text.contains(
            "CALL apoc.util.validate(NOT (coalesce(($isAuthenticated = true AND $jwt.roles IS NOT NULL \
             AND $param0 IN $jwt.roles) OR this.published = $param1, false)), \"@graphloom/FORBIDDEN\", [0])"
        ),
        "{}",
        statement.text
    );
    assert!(statement.params["jwt"].get("roles").is_none());
    assert_eq!(statement.params["isAuthenticated"], json!(true));
}

// ===== Filter rules =====

#[test]
fn test_filter_rule_narrows_with_claim_placeholder() {
    let model = guarded();
    let config = TranslatorConfig::default();
    let request = OperationRequest::new(OperationKind::Read, "Note")
        .with_selection(SelectionSet::of(["body"]))
        .with_where(json!({ "body_CONTAINS": "todo" }));
    let statement = compile(&model, &config, &request, &staff()).unwrap();
    let text = &statement.text;

    assert!(text.contains("this.body CONTAINS $param0"), "{}", text);
    assert!(text.contains("this.owner = $jwt.sub"), "{}", text);
    assert!(!text.contains("apoc.util.validate"));
    // the claim is never copied into a parameter
    assert!(statement.params.values().all(|v| v != &json!("u1")));
    assert_eq!(statement.params["jwt"]["sub"], json!("u1"));
}

#[test]
fn test_filter_rule_does_not_reject_anonymous_callers() {
    let model = guarded();
    let config = TranslatorConfig::default();
    let request = OperationRequest::new(OperationKind::Read, "Note").with_selection(SelectionSet::of(["body"]));
    let statement = compile(&model, &config, &request, &AuthContext::anonymous()).unwrap();
    assert!(statement.text.contains("$isAuthenticated = true"));
    assert_eq!(statement.params["isAuthenticated"], json!(false));
}
