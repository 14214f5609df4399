//! Per-translation state shared by the planner, predicate builder,
//! authorization weaver and emitters.

use crate::render::Scope;
use crate::schema::SchemaModel;
use graphloom_config::TranslatorConfig;
use serde_json::{Map, Value};

/// Caller identity for one request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthContext {
    claims: Option<Map<String, Value>>,
}

impl AuthContext {
    /// No claims; every `requireAuthentication` rule fails
    pub fn anonymous() -> Self {
        Self { claims: None }
    }

    pub fn with_claims(claims: Map<String, Value>) -> Self {
        Self {
            claims: Some(claims),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.claims.is_some()
    }

    pub fn claims(&self) -> Option<&Map<String, Value>> {
        self.claims.as_ref()
    }

    /// Value bound to the `jwt` parameter
    pub fn jwt_value(&self) -> Value {
        Value::Object(self.claims.clone().unwrap_or_default())
    }
}

/// Everything a translation reads, plus the naming scope it writes
pub struct TranslationContext<'m> {
    pub model: &'m SchemaModel,
    pub config: &'m TranslatorConfig,
    pub auth: &'m AuthContext,
    pub scope: Scope,
}

impl<'m> TranslationContext<'m> {
    pub fn new(model: &'m SchemaModel, config: &'m TranslatorConfig, auth: &'m AuthContext) -> Self {
        Self {
            model,
            config,
            auth,
            scope: Scope::new(),
        }
    }

    pub fn error_prefix(&self) -> &'m str {
        &self.config.emit.error_prefix
    }
}
