//! Mutations, their events and subscription plans

mod common;

use common::{catalog, claims, compile, object, position};
use graphloom_config::TranslatorConfig;
use graphloom_query::{
    AuthContext, ErrorKind, OperationKind, OperationRequest, SelectionSet, SubscriptionEvent,
    TranslateError, Translation, Translator,
};
use regex::Regex;
use serde_json::{json, Map, Value};

fn create_movie(input: Value) -> OperationRequest {
    let mut request = OperationRequest::new(OperationKind::Create, "Movie").with_selection(SelectionSet::of(["title"]));
    request.arguments.input = vec![input];
    request
}

// ===== Cardinality =====

#[test]
fn test_two_directors_in_one_input_fail_at_translation() {
    let model = catalog();
    let config = TranslatorConfig::default();
    let request = create_movie(json!({
        "title": "Heat",
        "director": {
            "create": [{ "node": { "name": "Mann" } }],
            "connect": [{ "where": { "node": { "name": "Scott" } } }]
        }
    }));
    let err = compile(&model, &config, &request, &AuthContext::anonymous()).unwrap_err();
    assert!(matches!(
        err,
        TranslateError::Cardinality { ref type_name, ref field, .. } if type_name == "Movie" && field == "director"
    ));
    assert_eq!(err.kind(), ErrorKind::BusinessRule);
}

#[test]
fn test_required_relationship_guard_round_trips() {
    let model = catalog();
    let config = TranslatorConfig::default();
    let request = create_movie(json!({ "title": "Heat" }));
    let statement = compile(&model, &config, &request, &AuthContext::anonymous()).unwrap();

    let guard = Regex::new(r#""(@graphloom/RELATIONSHIP-REQUIRED[^"]*)""#).unwrap();
    let message = guard.captures(&statement.text).unwrap()[1].to_string();
    let classified = TranslateError::from_store_message("@graphloom", &message).unwrap();
    assert!(matches!(
        classified,
        TranslateError::Cardinality { ref type_name, ref field, .. } if type_name == "Movie" && field == "director"
    ));
}

#[test]
fn test_many_relationship_has_no_count_check() {
    let model = catalog();
    let config = TranslatorConfig::default();
    let request = create_movie(json!({
        "title": "Heat",
        "director": { "connect": { "where": { "node": { "name": "Mann" } } } },
        "actors": { "create": [{ "node": { "name": "Pacino" } }, { "node": { "name": "De Niro" } }] }
    }));
    let statement = compile(&model, &config, &request, &AuthContext::anonymous()).unwrap();
    assert!(!statement.text.contains("Movie.actors"));
    assert_eq!(statement.text.matches("RELATIONSHIP-REQUIRED").count(), 1);
}

// ===== Ordering =====

#[test]
fn test_create_runs_nested_writes_before_checks() {
    let model = catalog();
    let config = TranslatorConfig::default();
    let request = create_movie(json!({
        "title": "Heat",
        "director": { "create": { "node": { "name": "Mann" } } },
        "actors": { "create": [{ "node": { "name": "Pacino" }, "edge": { "role": "Hanna" } }] }
    }));
    let statement = compile(&model, &config, &request, &AuthContext::anonymous()).unwrap();
    let text = &statement.text;

    let movie = position(text, "CREATE (this0:Movie)");
    let check = position(text, "RELATIONSHIP-REQUIRED");
    assert!(movie < position(text, ":Person)"));
    assert!(position(text, ":Actor)") < check);
    assert!(position(text, ":Person)") < check);
    assert!(text.ends_with("RETURN [this0 { .title }] AS data"), "{}", text);
}

#[test]
fn test_update_orders_disconnect_before_connect_on_one_field() {
    let model = catalog();
    let config = TranslatorConfig::default();
    let mut request = OperationRequest::new(OperationKind::Update, "Movie").with_where(json!({ "title": "Heat" }));
    request.arguments.update = Some(object(json!({
        "director": [{
            "connect": { "where": { "node": { "name": "Scott" } } },
            "disconnect": { "where": { "node": { "name": "Mann" } } }
        }]
    })));
    let statement = compile(&model, &config, &request, &AuthContext::anonymous()).unwrap();
    let text = &statement.text;

    let disconnect = text.find("DELETE this").unwrap();
    let connect = position(text, "MERGE (this)<-[");
    assert!(disconnect < connect, "{}", text);
    assert!(connect < position(text, "RELATIONSHIP-REQUIRED"));
    assert!(text.ends_with("AS data"));
}

#[test]
fn test_update_deletes_old_one_node_before_creating_replacement() {
    let model = catalog();
    let config = TranslatorConfig::default();
    let mut request = OperationRequest::new(OperationKind::Update, "Movie").with_where(json!({ "title": "Heat" }));
    request.arguments.update = Some(object(json!({
        "director": [{ "delete": {} }, { "create": { "node": { "name": "New" } } }]
    })));
    let statement = compile(&model, &config, &request, &AuthContext::anonymous()).unwrap();
    let text = &statement.text;

    let delete = position(text, "DETACH DELETE");
    let create = position(text, "CREATE (");
    assert!(delete < create, "{}", text);
    assert!(create < position(text, "RELATIONSHIP-REQUIRED"), "{}", text);
}

#[test]
fn test_delete_returns_nothing() {
    let model = catalog();
    let config = TranslatorConfig::default();
    let mut request = OperationRequest::new(OperationKind::Delete, "Movie").with_where(json!({ "title": "Heat" }));
    request.arguments.delete = Some(object(json!({ "actors": [{ "where": { "node": { "name": "Kilmer" } } }] })));
    let statement = compile(&model, &config, &request, &AuthContext::anonymous()).unwrap();

    assert!(statement.text.ends_with("DETACH DELETE this"), "{}", statement.text);
    assert!(!statement.text.contains("AS data"));
    let types: Vec<&str> = statement.events.iter().map(|e| e.type_name.as_str()).collect();
    assert_eq!(types, vec!["Actor", "Movie"]);
}

#[test]
fn test_connect_or_create_needs_unique_key() {
    let model = catalog();
    let config = TranslatorConfig::default();
    let request = create_movie(json!({
        "title": "Heat",
        "director": { "connectOrCreate": [{ "where": { "node": { "name": "Mann" } } }] }
    }));
    let err = compile(&model, &config, &request, &AuthContext::anonymous()).unwrap_err();
    assert!(matches!(err, TranslateError::Filter { .. }), "{:?}", err);
}

#[test]
fn test_mutation_input_errors_are_client_input() {
    let model = catalog();
    let config = TranslatorConfig::default();
    let request = create_movie(json!({ "title": 12 }));
    let err = compile(&model, &config, &request, &AuthContext::anonymous()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ClientInput);
}

// ===== Events =====

#[test]
fn test_create_describes_its_events() {
    let model = catalog();
    let config = TranslatorConfig::default();
    let request = create_movie(json!({
        "title": "Heat",
        "director": { "connect": { "where": { "node": { "name": "Mann" } } } }
    }));
    let statement = compile(&model, &config, &request, &AuthContext::anonymous()).unwrap();

    let created = statement
        .events
        .iter()
        .find(|e| e.event == SubscriptionEvent::Created)
        .unwrap();
    assert_eq!(created.type_name, "Movie");
    assert_eq!(created.after.as_deref(), Some("this0"));

    let linked = statement
        .events
        .iter()
        .find(|e| e.event == SubscriptionEvent::RelationshipCreated)
        .unwrap();
    let relationship = linked.relationship.as_ref().unwrap();
    assert_eq!(relationship.field, "director");
    assert_eq!(relationship.rel_type, "DIRECTED");

    let value = serde_json::to_value(&statement).unwrap();
    assert_eq!(value["events"][0]["event"], json!("RELATIONSHIP_CREATED"));
}

#[test]
fn test_disabled_subscriptions_emit_no_events() {
    let model = catalog();
    let mut config = TranslatorConfig::default();
    config.subscriptions.enabled = false;
    let request = create_movie(json!({
        "title": "Heat",
        "director": { "connect": { "where": { "node": { "name": "Mann" } } } }
    }));
    let statement = compile(&model, &config, &request, &AuthContext::anonymous()).unwrap();
    assert!(statement.events.is_empty());
    assert!(serde_json::to_value(&statement).unwrap().get("events").is_none());

    let subscribe = OperationRequest::new(OperationKind::Subscribe, "Movie");
    let err = Translator::new(&model, &config)
        .translate(&subscribe, &AuthContext::anonymous())
        .unwrap_err();
    assert!(matches!(err, TranslateError::OperationDisabled { .. }));
}

// ===== Subscriptions =====

fn props(value: Value) -> Map<String, Value> {
    object(value)
}

#[test]
fn test_subscription_plan_filters_events() {
    let model = catalog();
    let config = TranslatorConfig::default();
    let mut request = OperationRequest::new(OperationKind::Subscribe, "Post").with_where(json!({
        "OR": [{ "title_CONTAINS": "rust" }, { "NOT": { "title": null } }]
    }));
    request.arguments.events = vec![SubscriptionEvent::Updated, SubscriptionEvent::Created];

    let translation = Translator::new(&model, &config)
        .translate(&request, &AuthContext::anonymous())
        .unwrap();
    let Translation::Subscription(plan) = translation else {
        panic!("expected a subscription plan");
    };

    assert_eq!(plan.events, vec![SubscriptionEvent::Created, SubscriptionEvent::Updated]);
    assert!(plan.accepts(SubscriptionEvent::Created));
    assert!(!plan.accepts(SubscriptionEvent::Deleted));
    assert!(plan.matches(&props(json!({ "title": "learning rust" })), None));
    assert!(plan.matches(&props(json!({ "title": "gardening" })), None));
    assert!(!plan.matches(&props(json!({ "title": null })), None));
    assert!(!plan.matches(&props(json!({})), None));
}

#[test]
fn test_subscription_rejects_relationship_filters() {
    let model = catalog();
    let config = TranslatorConfig::default();
    let request = OperationRequest::new(OperationKind::Subscribe, "Post")
        .with_where(json!({ "likes_SOME": { "name": "ada" } }));
    let err = Translator::new(&model, &config)
        .translate(&request, &claims(json!({ "sub": "u1" })))
        .unwrap_err();
    assert!(matches!(err, TranslateError::Filter { .. }));
}
