//! The normalized request handed to the translator.
//!
//! Filters, sorts and mutation inputs stay as JSON maps: their keys are
//! schema-dependent (`title_CONTAINS`, `actorsAggregate`, ...) and are
//! interpreted by the planner against the model.

use crate::annotation::SubscriptionEvent;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A filter argument tree (`where`)
pub type FilterArgs = Map<String, Value>;

/// Root operation kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Read,
    Aggregate,
    Create,
    Update,
    Delete,
    Subscribe,
}

impl OperationKind {
    pub fn name(&self) -> &'static str {
        match self {
            OperationKind::Read => "read",
            OperationKind::Aggregate => "aggregate",
            OperationKind::Create => "create",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
            OperationKind::Subscribe => "subscribe",
        }
    }
}

/// One incoming operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRequest {
    pub operation: OperationKind,
    /// Node type name; reads may also name an interface or union
    pub target: String,
    #[serde(default)]
    pub selection: SelectionSet,
    #[serde(default)]
    pub arguments: OperationArguments,
}

impl OperationRequest {
    pub fn new(operation: OperationKind, target: impl Into<String>) -> Self {
        Self {
            operation,
            target: target.into(),
            selection: SelectionSet::default(),
            arguments: OperationArguments::default(),
        }
    }

    pub fn with_selection(mut self, selection: SelectionSet) -> Self {
        self.selection = selection;
        self
    }

    pub fn with_where(mut self, filter: Value) -> Self {
        self.arguments.filter = filter.as_object().cloned();
        self
    }
}

/// Root arguments; which ones apply depends on the operation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperationArguments {
    #[serde(rename = "where", skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterArgs>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
    /// Create inputs
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub input: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connect: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disconnect: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete: Option<Map<String, Value>>,
    /// Subscribe events; empty means every event the type publishes
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<SubscriptionEvent>,
}

/// Requested fields plus per-type fragments for interfaces and unions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionSet {
    pub fields: Vec<Field>,
    /// Type name → extra selection applied to that concrete type only
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub fragments: BTreeMap<String, SelectionSet>,
}

impl SelectionSet {
    /// Plain fields without arguments or sub-selections
    pub fn of<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: names.into_iter().map(Field::new).collect(),
            fragments: BTreeMap::new(),
        }
    }

    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn fragment(mut self, type_name: impl Into<String>, selection: SelectionSet) -> Self {
        self.fragments.insert(type_name.into(), selection);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.fragments.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// One selected field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "FieldRepr")]
pub struct Field {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default)]
    pub arguments: FieldArguments,
    #[serde(default)]
    pub selection: SelectionSet,
}

impl Field {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
            arguments: FieldArguments::default(),
            selection: SelectionSet::default(),
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn select(mut self, selection: SelectionSet) -> Self {
        self.selection = selection;
        self
    }

    pub fn with_where(mut self, filter: Value) -> Self {
        self.arguments.filter = filter.as_object().cloned();
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.arguments.limit = Some(limit);
        self
    }

    /// Key under which the value is returned
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// Arguments on a nested field
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldArguments {
    #[serde(rename = "where", skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterArgs>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
    /// Connection page size
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first: Option<u64>,
}

/// A field may be written as a bare name
#[derive(Deserialize)]
#[serde(untagged)]
enum FieldRepr {
    Name(String),
    Full {
        name: String,
        #[serde(default)]
        alias: Option<String>,
        #[serde(default)]
        arguments: FieldArguments,
        #[serde(default)]
        selection: SelectionSet,
    },
}

impl From<FieldRepr> for Field {
    fn from(repr: FieldRepr) -> Self {
        match repr {
            FieldRepr::Name(name) => Field::new(name),
            FieldRepr::Full {
                name,
                alias,
                arguments,
                selection,
            } => Field {
                name,
                alias,
                arguments,
                selection,
            },
        }
    }
}
