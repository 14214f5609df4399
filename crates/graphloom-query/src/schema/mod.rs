//! The schema model.
//!
//! An arena of type definitions plus a name index, built once by
//! [`SchemaBuilder`] and read-only afterwards. Translations borrow it;
//! nothing in the model is mutated after [`SchemaBuilder::build`] returns.

mod attribute;
mod builder;
mod declaration;
mod type_ref;

pub use attribute::{Attribute, AttributeKind, AttributeType, FilterOperator, ScalarKind};
pub use builder::SchemaBuilder;
pub use declaration::{
    EnumDeclaration, FieldDeclaration, RawAnnotation, SchemaDeclarations, TypeDeclaration,
    UnionDeclaration,
};
pub use type_ref::TypeRef;

use crate::annotation::{
    AnnotationSet, AuthOperation, ComputedBinding, Direction, LimitAnnotation, OperationToggles,
};
use std::collections::HashMap;

/// Arena position of a named type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeId {
    Node(usize),
    Interface(usize),
    Union(usize),
    Enum(usize),
    Properties(usize),
}

/// Target of a relationship or node-typed computed field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Node,
    Interface,
    Union,
}

/// Attributes, relationships and computed fields of one type
#[derive(Debug, Clone, Default)]
pub struct FieldSet {
    pub attributes: Vec<Attribute>,
    pub relationships: Vec<RelationshipField>,
    pub computed: Vec<ComputedField>,
}

impl FieldSet {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn relationship(&self, name: &str) -> Option<&RelationshipField> {
        self.relationships.iter().find(|r| r.name == name)
    }

    pub fn computed(&self, name: &str) -> Option<&ComputedField> {
        self.computed.iter().find(|c| c.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.attribute(name).is_some()
            || self.relationship(name).is_some()
            || self.computed(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.attributes
            .iter()
            .map(|a| a.name.as_str())
            .chain(self.relationships.iter().map(|r| r.name.as_str()))
            .chain(self.computed.iter().map(|c| c.name.as_str()))
    }
}

/// A concrete node type
#[derive(Debug, Clone)]
pub struct NodeType {
    pub name: String,
    /// Storage labels, `[name]` unless `@node` says otherwise
    pub labels: Vec<String>,
    pub fields: FieldSet,
    /// Implemented interfaces, declaration order
    pub interfaces: Vec<String>,
    pub annotations: AnnotationSet,
}

impl NodeType {
    pub fn toggles(&self) -> OperationToggles {
        self.annotations.toggles()
    }

    pub fn limit(&self) -> Option<&LimitAnnotation> {
        self.annotations.limit()
    }

    /// Label pattern such as `:Movie` or `:Film:Published`
    pub fn label_pattern(&self) -> String {
        self.labels.iter().map(|l| format!(":{}", escape_name(l))).collect()
    }

    /// Attributes that identify a node: `@id` or `@unique`
    pub fn unique_attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.fields.attributes.iter().filter(|a| a.is_unique())
    }
}

#[derive(Debug, Clone)]
pub struct InterfaceType {
    pub name: String,
    pub fields: FieldSet,
    /// Implementing node types, declaration order
    pub implementers: Vec<String>,
    pub annotations: AnnotationSet,
}

#[derive(Debug, Clone)]
pub struct UnionType {
    pub name: String,
    pub members: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct EnumType {
    pub name: String,
    pub values: Vec<String>,
}

/// Attributes stored on a relationship
#[derive(Debug, Clone)]
pub struct PropertiesType {
    pub name: String,
    pub attributes: Vec<Attribute>,
}

impl PropertiesType {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

/// How many target nodes one source node may have
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    One { required: bool },
    Many,
}

/// A relationship field on a node or interface
#[derive(Debug, Clone)]
pub struct RelationshipField {
    pub owner: String,
    pub name: String,
    /// Stored relationship label
    pub rel_type: String,
    pub direction: Direction,
    pub undirected_queries: bool,
    pub target: String,
    pub target_kind: TargetKind,
    pub cardinality: Cardinality,
    /// Relationship-properties type name
    pub properties: Option<String>,
    /// Field on the target that walks the same edge back, if declared
    pub inverse: Option<String>,
    pub annotations: AnnotationSet,
}

impl RelationshipField {
    pub fn is_many(&self) -> bool {
        matches!(self.cardinality, Cardinality::Many)
    }

    /// Direction used when matching
    pub fn read_direction(&self) -> Direction {
        if self.undirected_queries {
            Direction::Undirected
        } else {
            self.direction
        }
    }

    /// Render `(from)-[rel:TYPE]->(to)` with the given direction
    pub fn pattern(&self, from: &str, rel: &str, to: &str, direction: Direction) -> String {
        let rel_type = escape_name(&self.rel_type);
        match direction {
            Direction::Out => format!("({})-[{}:{}]->({})", from, rel, rel_type, to),
            Direction::In => format!("({})<-[{}:{}]-({})", from, rel, rel_type, to),
            Direction::Undirected => format!("({})-[{}:{}]-({})", from, rel, rel_type, to),
        }
    }
}

/// What a computed field returns
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComputedResult {
    Scalar(AttributeType),
    Node {
        target: String,
        target_kind: TargetKind,
        list: bool,
    },
}

/// A field whose value comes from an embedded statement
#[derive(Debug, Clone)]
pub struct ComputedField {
    pub owner: String,
    pub name: String,
    pub binding: ComputedBinding,
    pub result: ComputedResult,
    pub annotations: AnnotationSet,
}

impl ComputedField {
    pub fn is_list(&self) -> bool {
        match &self.result {
            ComputedResult::Scalar(ty) => ty.list,
            ComputedResult::Node { list, .. } => *list,
        }
    }
}

/// Any field that can appear in a selection
#[derive(Debug, Clone, Copy)]
pub enum FieldRef<'a> {
    Attribute(&'a Attribute),
    Relationship(&'a RelationshipField),
    Computed(&'a ComputedField),
}

/// The immutable, cross-linked schema
#[derive(Debug, Clone, Default)]
pub struct SchemaModel {
    pub(crate) nodes: Vec<NodeType>,
    pub(crate) interfaces: Vec<InterfaceType>,
    pub(crate) unions: Vec<UnionType>,
    pub(crate) enums: Vec<EnumType>,
    pub(crate) properties: Vec<PropertiesType>,
    pub(crate) index: HashMap<String, TypeId>,
}

impl SchemaModel {
    /// Build and validate a model from declarations
    pub fn build(declarations: &SchemaDeclarations) -> crate::error::ModelResult<Self> {
        SchemaBuilder::new(declarations).build()
    }

    pub fn type_id(&self, name: &str) -> Option<TypeId> {
        self.index.get(name).copied()
    }

    pub fn node(&self, name: &str) -> Option<&NodeType> {
        match self.type_id(name)? {
            TypeId::Node(i) => self.nodes.get(i),
            _ => None,
        }
    }

    pub fn interface(&self, name: &str) -> Option<&InterfaceType> {
        match self.type_id(name)? {
            TypeId::Interface(i) => self.interfaces.get(i),
            _ => None,
        }
    }

    pub fn union(&self, name: &str) -> Option<&UnionType> {
        match self.type_id(name)? {
            TypeId::Union(i) => self.unions.get(i),
            _ => None,
        }
    }

    pub fn enum_type(&self, name: &str) -> Option<&EnumType> {
        match self.type_id(name)? {
            TypeId::Enum(i) => self.enums.get(i),
            _ => None,
        }
    }

    pub fn properties(&self, name: &str) -> Option<&PropertiesType> {
        match self.type_id(name)? {
            TypeId::Properties(i) => self.properties.get(i),
            _ => None,
        }
    }

    pub fn nodes(&self) -> impl Iterator<Item = &NodeType> {
        self.nodes.iter()
    }

    pub fn interfaces(&self) -> impl Iterator<Item = &InterfaceType> {
        self.interfaces.iter()
    }

    pub fn unions(&self) -> impl Iterator<Item = &UnionType> {
        self.unions.iter()
    }

    pub fn enums(&self) -> impl Iterator<Item = &EnumType> {
        self.enums.iter()
    }

    /// Concrete node types behind a node, interface or union name
    pub fn concrete_types(&self, name: &str) -> Vec<&NodeType> {
        match self.type_id(name) {
            Some(TypeId::Node(i)) => self.nodes.get(i).into_iter().collect(),
            Some(TypeId::Interface(i)) => self
                .interfaces
                .get(i)
                .map(|iface| {
                    iface
                        .implementers
                        .iter()
                        .filter_map(|n| self.node(n))
                        .collect()
                })
                .unwrap_or_default(),
            Some(TypeId::Union(i)) => self
                .unions
                .get(i)
                .map(|u| u.members.iter().filter_map(|n| self.node(n)).collect())
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    /// Field set of a node or interface
    pub fn fields_of(&self, name: &str) -> Option<&FieldSet> {
        match self.type_id(name)? {
            TypeId::Node(i) => self.nodes.get(i).map(|n| &n.fields),
            TypeId::Interface(i) => self.interfaces.get(i).map(|n| &n.fields),
            _ => None,
        }
    }

    pub fn field(&self, type_name: &str, field: &str) -> Option<FieldRef<'_>> {
        let fields = self.fields_of(type_name)?;
        if let Some(attr) = fields.attribute(field) {
            return Some(FieldRef::Attribute(attr));
        }
        if let Some(rel) = fields.relationship(field) {
            return Some(FieldRef::Relationship(rel));
        }
        fields.computed(field).map(FieldRef::Computed)
    }

    /// Annotation sets that govern `node`: its own, then each interface's
    /// unless the node's `@authorization` overrides them
    pub fn governing_annotations<'a>(&'a self, node: &'a NodeType) -> Vec<&'a AnnotationSet> {
        if node.annotations.authorization().is_some_and(|auth| auth.overrides) {
            return vec![&node.annotations];
        }
        std::iter::once(&node.annotations)
            .chain(
                node.interfaces
                    .iter()
                    .filter_map(|i| self.interface(i))
                    .map(|i| &i.annotations),
            )
            .collect()
    }

    /// True when any rule anywhere applies to `operation`
    pub fn has_rules_for(&self, operation: AuthOperation) -> bool {
        let type_sets = self
            .nodes
            .iter()
            .map(|n| &n.annotations)
            .chain(self.interfaces.iter().map(|i| &i.annotations));
        type_sets
            .filter_map(|set| set.authorization())
            .any(|auth| auth.rules.iter().any(|r| r.operations.contains(&operation)))
    }
}

/// Backtick-quote a label or relationship type when it is not a plain identifier
pub fn escape_name(name: &str) -> String {
    let plain = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if plain {
        name.to_string()
    } else {
        format!("`{}`", name.replace('`', "``"))
    }
}
