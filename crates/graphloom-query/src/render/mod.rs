//! Statement emission.
//!
//! Plans are walked into a [`Block`] of clauses; the block is rendered to
//! text once at the end. Every literal goes through [`Scope::param`], so
//! the text itself only ever contains schema-derived names.

mod clause;
pub(crate) mod computed;
pub(crate) mod read;
mod scope;
pub(crate) mod write;

pub use clause::{quote, render, render_inline, Block, Clause};
pub use scope::{
    Scope, ScopeFrame, AUTHENTICATED_PARAM, JWT_PARAM, RESERVED_PARAMS, ROOT_VAR,
};

use crate::subscription::EventDescriptor;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Guard code for authorization failures
pub const FORBIDDEN_CODE: &str = "FORBIDDEN";
/// Guard code for a required one-cardinality relationship left empty or doubled
pub const REQUIRED_CODE: &str = "RELATIONSHIP-REQUIRED";
/// Guard code for an optional one-cardinality relationship holding more than one edge
pub const SINGLE_CODE: &str = "RELATIONSHIP-SINGLE";

/// Final output of translating one request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledStatement {
    pub text: String,
    pub params: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<EventDescriptor>,
}

impl CompiledStatement {
    /// Names of all non-reserved parameters
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.params
            .keys()
            .map(String::as_str)
            .filter(|name| !RESERVED_PARAMS.contains(name))
    }
}

/// Message raised by an authorization guard
pub(crate) fn forbidden_message(prefix: &str) -> String {
    format!("{}/{}", prefix, FORBIDDEN_CODE)
}
