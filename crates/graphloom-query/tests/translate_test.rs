//! End-to-end translation through `Translator`

mod common;

use common::{catalog, claims, compile, object, position};
use graphloom_config::TranslatorConfig;
use graphloom_query::{
    AuthContext, ErrorKind, Field, OperationKind, OperationRequest, SelectionSet,
    StatementValidator, TranslateError, Translator,
};
use regex::Regex;
use serde_json::json;
use std::collections::BTreeSet;

fn deep_read() -> OperationRequest {
    let inner = SelectionSet::of(["title"])
        .field(Field::new("actors").select(SelectionSet::of(["name"])));
    let middle = SelectionSet::of(["name"]).field(Field::new("movies").select(inner));
    OperationRequest::new(OperationKind::Read, "Movie")
        .with_selection(SelectionSet::of(["title"]).field(Field::new("actors").select(middle)))
        .with_where(json!({ "title_STARTS_WITH": "The", "actors_SOME": { "name": "Keanu" } }))
}

// ===== Determinism =====

#[test]
fn test_same_request_same_statement() {
    let model = catalog();
    let config = TranslatorConfig::default();
    let auth = AuthContext::anonymous();

    let first = compile(&model, &config, &deep_read(), &auth).unwrap();
    let second = compile(&model, &config, &deep_read(), &auth).unwrap();
    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn test_translator_is_reusable_across_requests() {
    let model = catalog();
    let config = TranslatorConfig::default();
    let translator = Translator::new(&model, &config);
    let auth = AuthContext::anonymous();

    let read = OperationRequest::new(OperationKind::Read, "Series").with_selection(SelectionSet::of(["title"]));
    let before = translator.translate(&read, &auth).unwrap();
    translator.translate(&deep_read(), &auth).unwrap();
    let after = translator.translate(&read, &auth).unwrap();
    assert_eq!(before, after);
}

// ===== Scoping =====

#[test]
fn test_nested_positions_never_share_a_variable() {
    let model = catalog();
    let config = TranslatorConfig::default();
    let statement = compile(&model, &config, &deep_read(), &AuthContext::anonymous()).unwrap();

    let binders = Regex::new(r"[(\[](this\d+):|AS (var\d+)").unwrap();
    let mut seen = BTreeSet::new();
    for capture in binders.captures_iter(&statement.text) {
        let name = capture.get(1).or_else(|| capture.get(2)).unwrap().as_str().to_string();
        assert!(seen.insert(name.clone()), "{} bound twice in:\n{}", name, statement.text);
    }
    // three relationship hops in the projection plus one in the filter
    assert!(seen.len() >= 8, "{:?}", seen);
}

#[test]
fn test_parameters_are_numbered_in_emission_order() {
    let model = catalog();
    let config = TranslatorConfig::default();
    let statement = compile(&model, &config, &deep_read(), &AuthContext::anonymous()).unwrap();

    let names: Vec<&str> = statement.param_names().collect();
    assert_eq!(names, vec!["param0", "param1"]);
    assert_eq!(statement.params["jwt"], json!({}));
    assert_eq!(statement.params["isAuthenticated"], json!(false));
}

// ===== Reads =====

#[test]
fn test_relationship_aggregate_filter_on_string_length() {
    let model = catalog();
    let config = TranslatorConfig::default();
    let request = OperationRequest::new(OperationKind::Read, "Post")
        .with_selection(SelectionSet::of(["title"]))
        .with_where(json!({
            "title": "x",
            "likesAggregate": { "node": { "name_AVERAGE_LENGTH_GT": 5 } }
        }));
    let statement = compile(&model, &config, &request, &AuthContext::anonymous()).unwrap();
    let text = &statement.text;

    let title = Regex::new(r"this\.title = \$(param\d+)").unwrap();
    let title_param = &title.captures(text).unwrap()[1];
    assert_eq!(statement.params[title_param], json!("x"));

    let average = Regex::new(r"avg\(size\(this1\.name\)\) > \$(param\d+)").unwrap();
    let average_param = &average.captures(text).unwrap()[1];
    assert_eq!(statement.params[average_param].as_f64(), Some(5.0));

    assert!(text.contains("MATCH (this)-[this0:LIKES]->(this1:User)"), "{}", text);
    assert!(position(text, "WHERE this.title") < position(text, "CALL {"));
    assert!(text.contains("WITH *\nWHERE var2 = true"), "{}", text);
    assert_eq!(statement.param_names().count(), 2);
}

#[test]
fn test_interface_read_fans_out_to_every_implementation() {
    let model = catalog();
    let config = TranslatorConfig::default();
    let request = OperationRequest::new(OperationKind::Read, "Production")
        .with_selection(SelectionSet::of(["title"]))
        .with_where(json!({ "title_STARTS_WITH": "The" }));
    let statement = compile(&model, &config, &request, &AuthContext::anonymous()).unwrap();
    let text = &statement.text;

    assert!(position(text, "MATCH (this0:Movie)") < position(text, "UNION"));
    assert!(position(text, "UNION") < position(text, "MATCH (this1:Series)"));
    assert_eq!(text.matches("STARTS WITH $param").count(), 2);
    assert!(text.contains("__typename: \"Movie\""));
    assert!(text.contains("__typename: \"Series\""));
    assert!(text.ends_with("RETURN this AS this"));
}

#[test]
fn test_typename_filter_prunes_fan_out() {
    let model = catalog();
    let config = TranslatorConfig::default();
    let request = OperationRequest::new(OperationKind::Read, "Production")
        .with_selection(SelectionSet::of(["title"]))
        .with_where(json!({ "typename_IN": ["Series"] }));
    let statement = compile(&model, &config, &request, &AuthContext::anonymous()).unwrap();
    assert!(!statement.text.contains(":Movie"));
    assert!(statement.text.contains(":Series"));
}

#[test]
fn test_root_aggregate_counts() {
    let model = catalog();
    let config = TranslatorConfig::default();
    let request = OperationRequest::new(OperationKind::Aggregate, "Movie")
        .with_selection(SelectionSet::of(["count"]))
        .with_where(json!({ "released_GT": 1999 }));
    let statement = compile(&model, &config, &request, &AuthContext::anonymous()).unwrap();
    assert_eq!(
        statement.text,
        "MATCH (this:Movie)\nWHERE this.released > $param0\nRETURN { count: count(this) } AS this"
    );
    assert_eq!(statement.params["param0"], json!(1999));
    insta::assert_snapshot!("root_aggregate_counts", statement.text);
}

#[test]
fn test_indent_follows_config() {
    let model = catalog();
    let mut config = TranslatorConfig::default();
    config.emit.indent = 2;
    let request = OperationRequest::new(OperationKind::Read, "Movie").with_selection(
        SelectionSet::default().field(Field::new("actors").select(SelectionSet::of(["name"]))),
    );
    let statement = compile(&model, &config, &request, &AuthContext::anonymous()).unwrap();
    assert!(statement.text.contains("CALL {\n  WITH this\n"), "{}", statement.text);
}

// ===== Errors =====

#[test]
fn test_unknown_target_and_field() {
    let model = catalog();
    let config = TranslatorConfig::default();
    let auth = AuthContext::anonymous();

    let unknown_type = OperationRequest::new(OperationKind::Read, "Nope");
    let err = compile(&model, &config, &unknown_type, &auth).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ClientInput);

    let unknown_field = OperationRequest::new(OperationKind::Read, "Movie").with_selection(SelectionSet::of(["budget"]));
    let err = compile(&model, &config, &unknown_field, &auth).unwrap_err();
    assert!(matches!(err, TranslateError::UnknownField { ref field, .. } if field == "budget"));
}

#[test]
fn test_errors_abort_without_partial_output() {
    let model = catalog();
    let config = TranslatorConfig::default();
    let request = OperationRequest::new(OperationKind::Read, "Movie")
        .with_selection(SelectionSet::of(["title"]))
        .with_where(json!({ "title": "A", "released_CONTAINS": "9" }));
    let err = Translator::new(&model, &config)
        .translate(&request, &AuthContext::anonymous())
        .unwrap_err();
    assert!(matches!(err, TranslateError::Filter { ref key, .. } if key == "released_CONTAINS"));
}

// ===== Validator over every operation =====

#[test]
fn test_every_operation_passes_the_validator() {
    let model = catalog();
    let config = TranslatorConfig::default();
    let auth = claims(json!({ "sub": "u1", "roles": ["admin"] }));

    let mut create = OperationRequest::new(OperationKind::Create, "Movie").with_selection(SelectionSet::of(["id", "title"]));
    create.arguments.input = vec![json!({
        "title": "Heat",
        "tags": ["crime"],
        "director": { "connect": { "where": { "node": { "name": "Mann" } } } },
        "actors": { "create": [{ "node": { "name": "Pacino" }, "edge": { "role": "Hanna" } }] }
    })];

    let mut update = OperationRequest::new(OperationKind::Update, "Movie")
        .with_selection(SelectionSet::of(["title"]))
        .with_where(json!({ "title": "Heat" }));
    update.arguments.update = Some(object(json!({
        "released_INCREMENT": 1,
        "tags_PUSH": ["heist"],
        "actors": [{ "where": { "node": { "name": "De Niro" } }, "update": { "edge": { "role": "McCauley" } } }]
    })));

    let mut delete = OperationRequest::new(OperationKind::Delete, "Movie").with_where(json!({ "title": "Heat" }));
    delete.arguments.delete = Some(object(json!({ "actors": [{ "where": { "node": { "name": "Kilmer" } } }] })));

    let requests = vec![
        deep_read(),
        OperationRequest::new(OperationKind::Read, "Production").with_selection(SelectionSet::of(["title"])),
        OperationRequest::new(OperationKind::Aggregate, "Movie").with_selection(SelectionSet::of(["count"])),
        create,
        update,
        delete,
    ];
    for request in &requests {
        let statement = compile(&model, &config, request, &auth).unwrap();
        let problems = StatementValidator::problems(&statement);
        assert!(problems.is_empty(), "{:?} in:\n{}", problems, statement.text);
        assert_eq!(statement.params["isAuthenticated"], json!(true));
        assert_eq!(statement.params["jwt"]["sub"], json!("u1"));
    }
}

#[test]
fn test_validator_as_pipeline_transform() {
    let model = catalog();
    let config = TranslatorConfig::default();
    let translator = Translator::new(&model, &config).with_transform(StatementValidator);
    let translation = translator.translate(&deep_read(), &AuthContext::anonymous()).unwrap();
    assert!(translation.statement().is_some());
}
