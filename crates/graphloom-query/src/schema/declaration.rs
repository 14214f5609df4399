//! Raw schema declarations consumed by the model builder.
//!
//! These mirror what a schema front-end produces after parsing its own
//! syntax: named types with fields, each carrying raw annotation
//! occurrences. Nothing here is validated; see [`SchemaBuilder`].
//!
//! [`SchemaBuilder`]: crate::schema::SchemaBuilder

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The complete declaration set for one schema
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SchemaDeclarations {
    /// Node types
    pub nodes: Vec<TypeDeclaration>,
    /// Interfaces implemented by node types
    pub interfaces: Vec<TypeDeclaration>,
    /// Unions of node types
    pub unions: Vec<UnionDeclaration>,
    /// Enumerations usable as attribute types
    pub enums: Vec<EnumDeclaration>,
    /// Property types attached to relationships
    pub relationship_properties: Vec<TypeDeclaration>,
}

/// A node, interface or relationship-properties type
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TypeDeclaration {
    pub name: String,
    pub implements: Vec<String>,
    pub fields: Vec<FieldDeclaration>,
    pub annotations: Vec<RawAnnotation>,
}

/// A field on a declared type
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldDeclaration {
    pub name: String,
    /// Type reference such as `String!` or `[Movie!]!`
    #[serde(rename = "type")]
    pub type_ref: String,
    #[serde(default)]
    pub annotations: Vec<RawAnnotation>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UnionDeclaration {
    pub name: String,
    pub members: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EnumDeclaration {
    pub name: String,
    pub values: Vec<String>,
}

/// One annotation occurrence: name plus argument values
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawAnnotation {
    pub name: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl RawAnnotation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: Map::new(),
        }
    }

    pub fn with_argument(mut self, key: impl Into<String>, value: Value) -> Self {
        self.arguments.insert(key.into(), value);
        self
    }
}

impl TypeDeclaration {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn field(mut self, name: impl Into<String>, type_ref: impl Into<String>) -> Self {
        self.fields.push(FieldDeclaration {
            name: name.into(),
            type_ref: type_ref.into(),
            annotations: Vec::new(),
        });
        self
    }

    /// Add a field carrying annotations
    pub fn annotated_field(
        mut self,
        name: impl Into<String>,
        type_ref: impl Into<String>,
        annotations: Vec<RawAnnotation>,
    ) -> Self {
        self.fields.push(FieldDeclaration {
            name: name.into(),
            type_ref: type_ref.into(),
            annotations,
        });
        self
    }

    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.implements.push(interface.into());
        self
    }

    pub fn annotation(mut self, annotation: RawAnnotation) -> Self {
        self.annotations.push(annotation);
        self
    }
}
