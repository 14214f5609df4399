//! Operation trees.
//!
//! The planner resolves a request against the model once: every selected
//! name becomes a typed [`ProjectionItem`], every abstract position is
//! expanded into one [`Branch`] per concrete node type, and pagination
//! defaults are settled. Emission never looks a name up again.

mod planner;

pub use planner::OperationPlanner;
pub(crate) use planner::branch_targets;

use crate::request::{FilterArgs, OperationKind};
use crate::schema::{Attribute, AttributeType, ComputedField, NodeType, RelationshipField, ScalarKind};

/// A planned read or aggregate request
#[derive(Debug, Clone)]
pub struct OperationTree<'m> {
    pub operation: OperationKind,
    pub root: PlannedRoot<'m>,
}

#[derive(Debug, Clone)]
pub enum PlannedRoot<'m> {
    Read(NodeSelection<'m>),
    Aggregate {
        node: &'m NodeType,
        filter: Option<FilterArgs>,
        selection: AggregateSelection<'m>,
    },
}

/// A list or single position in the tree, fanned out over concrete types
#[derive(Debug, Clone)]
pub struct NodeSelection<'m> {
    /// Declared type at this position: node, interface or union
    pub type_name: &'m str,
    pub is_abstract: bool,
    pub branches: Vec<Branch<'m>>,
    pub sort: Vec<SortItem>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl NodeSelection<'_> {
    pub fn is_paged(&self) -> bool {
        !self.sort.is_empty() || self.limit.is_some() || self.offset.is_some()
    }
}

/// One concrete type under a selection
#[derive(Debug, Clone)]
pub struct Branch<'m> {
    pub node: &'m NodeType,
    /// Request filter for this branch, already narrowed for unions
    pub filter: Option<FilterArgs>,
    pub projection: Vec<ProjectionItem<'m>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortItem {
    /// Key in the projected map
    pub key: String,
    /// Stored property
    pub property: String,
    pub descending: bool,
}

#[derive(Debug, Clone)]
pub struct ProjectionItem<'m> {
    /// Response key (alias or field name)
    pub key: String,
    pub kind: ProjectionKind<'m>,
}

#[derive(Debug, Clone)]
pub enum ProjectionKind<'m> {
    Attribute(&'m Attribute),
    Typename,
    /// `@cypher` field; node-typed results carry a nested selection
    Computed {
        field: &'m ComputedField,
        nested: Option<NodeSelection<'m>>,
    },
    Relationship {
        field: &'m RelationshipField,
        nested: NodeSelection<'m>,
    },
    Aggregate {
        field: &'m RelationshipField,
        filter: Option<FilterArgs>,
        selection: AggregateSelection<'m>,
    },
    Connection {
        field: &'m RelationshipField,
        connection: ConnectionSelection<'m>,
    },
}

impl<'m> ProjectionItem<'m> {
    /// Annotations of the selected field, if it has any
    pub fn annotations(&self) -> Option<&'m crate::annotation::AnnotationSet> {
        match &self.kind {
            ProjectionKind::Attribute(attr) => Some(&attr.annotations),
            ProjectionKind::Computed { field, .. } => Some(&field.annotations),
            ProjectionKind::Relationship { field, .. }
            | ProjectionKind::Aggregate { field, .. }
            | ProjectionKind::Connection { field, .. } => Some(&field.annotations),
            ProjectionKind::Typename => None,
        }
    }
}

/// `count` plus per-attribute aggregates
#[derive(Debug, Clone, Default)]
pub struct AggregateSelection<'m> {
    pub count: Option<String>,
    pub node: Option<AggregateGroup<'m>>,
    pub edge: Option<AggregateGroup<'m>>,
}

/// Attribute aggregates; `key` is `None` when they sit at the top level
#[derive(Debug, Clone, Default)]
pub struct AggregateGroup<'m> {
    pub key: Option<String>,
    pub attributes: Vec<AttributeAggregate<'m>>,
}

#[derive(Debug, Clone)]
pub struct AttributeAggregate<'m> {
    pub key: String,
    pub attribute: &'m Attribute,
    pub outputs: Vec<(String, AggregateOutput)>,
}

/// One value of an attribute aggregate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateOutput {
    Min,
    Max,
    Average,
    Sum,
    Shortest,
    Longest,
}

impl AggregateOutput {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "min" => AggregateOutput::Min,
            "max" => AggregateOutput::Max,
            "average" => AggregateOutput::Average,
            "sum" => AggregateOutput::Sum,
            "shortest" => AggregateOutput::Shortest,
            "longest" => AggregateOutput::Longest,
            _ => return None,
        })
    }

    pub fn accepts(&self, ty: &AttributeType) -> bool {
        if ty.list {
            return false;
        }
        let Some(kind) = ty.scalar_kind() else {
            return false;
        };
        match self {
            AggregateOutput::Min | AggregateOutput::Max => {
                kind.is_numeric() || kind.is_temporal() || kind == ScalarKind::String
            }
            AggregateOutput::Average | AggregateOutput::Sum => kind.is_numeric(),
            AggregateOutput::Shortest | AggregateOutput::Longest => {
                matches!(kind, ScalarKind::String | ScalarKind::Id)
            }
        }
    }
}

/// `<rel>Connection` selection
#[derive(Debug, Clone)]
pub struct ConnectionSelection<'m> {
    pub filter: Option<FilterArgs>,
    pub sort: Vec<ConnectionSort>,
    pub first: Option<u64>,
    pub total_count: Option<String>,
    pub edges: Option<EdgesSelection<'m>>,
}

#[derive(Debug, Clone)]
pub struct EdgesSelection<'m> {
    pub key: String,
    /// Response key plus relationship-property attributes
    pub properties: Option<(String, Vec<(String, &'m Attribute)>)>,
    pub node: Option<(String, NodeSelection<'m>)>,
}

/// Ordering of connection edges by a value inside the edge map
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSort {
    /// Keys from the edge map down to the value
    pub path: Vec<String>,
    pub descending: bool,
}
