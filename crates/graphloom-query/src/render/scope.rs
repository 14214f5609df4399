//! Variable and parameter naming.
//!
//! One [`Scope`] lives for one translation. Node positions get `this<n>`,
//! helper values get `var<n>`; both draw from the same counter so no two
//! names can ever collide, however deep the nesting.

use serde_json::Value;
use std::collections::BTreeMap;

/// Claim set, always present
pub const JWT_PARAM: &str = "jwt";
/// Whether the caller presented claims, always present
pub const AUTHENTICATED_PARAM: &str = "isAuthenticated";
/// Root node variable
pub const ROOT_VAR: &str = "this";

/// Parameters that may appear in the map without being referenced
pub const RESERVED_PARAMS: [&str; 2] = [JWT_PARAM, AUTHENTICATED_PARAM];

/// Names and parameters allocated during one translation
#[derive(Debug, Default)]
pub struct Scope {
    next_name: usize,
    next_param: usize,
    params: BTreeMap<String, Value>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh variable for a node or relationship position
    pub fn node_var(&mut self) -> String {
        let name = format!("this{}", self.next_name);
        self.next_name += 1;
        name
    }

    /// Fresh variable for a computed value
    pub fn var(&mut self) -> String {
        let name = format!("var{}", self.next_name);
        self.next_name += 1;
        name
    }

    /// Register a literal and return its reference (`$param<n>`)
    pub fn param(&mut self, value: Value) -> String {
        let name = format!("param{}", self.next_param);
        self.next_param += 1;
        self.params.insert(name.clone(), value);
        format!("${}", name)
    }

    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    /// Parameter map with the reserved context entries added
    pub fn into_params(self, jwt: Value, authenticated: bool) -> BTreeMap<String, Value> {
        let mut params = self.params;
        params.insert(JWT_PARAM.to_string(), jwt);
        params.insert(AUTHENTICATED_PARAM.to_string(), Value::Bool(authenticated));
        params
    }
}

/// The node variable clauses are currently written against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeFrame {
    pub variable: String,
    pub type_name: String,
    pub depth: usize,
}

impl ScopeFrame {
    pub fn root(type_name: impl Into<String>) -> Self {
        Self {
            variable: ROOT_VAR.to_string(),
            type_name: type_name.into(),
            depth: 0,
        }
    }

    pub fn child(&self, variable: String, type_name: impl Into<String>) -> Self {
        Self {
            variable,
            type_name: type_name.into(),
            depth: self.depth + 1,
        }
    }
}
