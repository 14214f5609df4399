//! Mutation plans.
//!
//! A write request becomes an explicit, ordered list of typed steps per
//! node level. The planner checks inputs against the model and settles
//! every decision that does not need the store: generated values,
//! defaults, step order and which cardinality checks run. Emission then
//! walks the steps once.

mod input;
mod planner;

pub use input::{ArithmeticOp, PropertyWrite, SetValue};
pub use planner::MutationPlanner;

use crate::plan::ProjectionItem;
use crate::request::{FilterArgs, OperationKind};
use crate::schema::{Attribute, NodeType, RelationshipField};
use serde_json::Value;

/// A planned create, update or delete request
#[derive(Debug, Clone)]
pub struct MutationPlan<'m> {
    pub operation: OperationKind,
    pub root: MutationRoot<'m>,
}

#[derive(Debug, Clone)]
pub enum MutationRoot<'m> {
    Create {
        node: &'m NodeType,
        inputs: Vec<NodeCreate<'m>>,
        projection: Vec<ProjectionItem<'m>>,
    },
    /// One branch per concrete type when the target is an interface
    Update {
        type_name: &'m str,
        is_abstract: bool,
        branches: Vec<UpdateBranch<'m>>,
    },
    Delete {
        type_name: &'m str,
        is_abstract: bool,
        branches: Vec<DeleteBranch<'m>>,
    },
}

/// A node to create, with everything hanging off it
#[derive(Debug, Clone)]
pub struct NodeCreate<'m> {
    pub node: &'m NodeType,
    pub properties: Vec<PropertyWrite<'m>>,
    pub steps: Vec<Step<'m>>,
    /// One-cardinality relationships verified once the steps have run
    pub checks: Vec<&'m RelationshipField>,
}

/// Changes to a matched node
#[derive(Debug, Clone, Default)]
pub struct NodeUpdate<'m> {
    pub properties: Vec<PropertyWrite<'m>>,
    pub steps: Vec<Step<'m>>,
    pub checks: Vec<&'m RelationshipField>,
}

#[derive(Debug, Clone)]
pub struct UpdateBranch<'m> {
    pub node: &'m NodeType,
    pub filter: Option<FilterArgs>,
    pub update: NodeUpdate<'m>,
    pub projection: Vec<ProjectionItem<'m>>,
}

#[derive(Debug, Clone)]
pub struct DeleteBranch<'m> {
    pub node: &'m NodeType,
    pub filter: Option<FilterArgs>,
    /// Related nodes deleted before the matched node
    pub cascade: Vec<DeleteStep<'m>>,
}

/// Related nodes reached across one relationship field
#[derive(Debug, Clone)]
pub struct RelatedMatch<'m> {
    pub field: &'m RelationshipField,
    pub target: &'m NodeType,
    pub node_filter: Option<FilterArgs>,
    pub edge_filter: Option<FilterArgs>,
}

#[derive(Debug, Clone)]
pub enum Step<'m> {
    Update {
        matched: RelatedMatch<'m>,
        node: NodeUpdate<'m>,
        edge: Vec<PropertyWrite<'m>>,
    },
    Create {
        field: &'m RelationshipField,
        node: NodeCreate<'m>,
        edge: Vec<PropertyWrite<'m>>,
    },
    Connect(ConnectStep<'m>),
    ConnectOrCreate {
        field: &'m RelationshipField,
        target: &'m NodeType,
        /// Unique attributes the `MERGE` matches on
        key: Vec<(&'m Attribute, Value)>,
        on_create: Vec<PropertyWrite<'m>>,
        edge: Vec<PropertyWrite<'m>>,
    },
    Disconnect(DisconnectStep<'m>),
    Delete(DeleteStep<'m>),
}

/// Emission order within one node level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StepKind {
    Update,
    Create,
    Connect,
    ConnectOrCreate,
    Disconnect,
    Delete,
}

impl<'m> Step<'m> {
    pub fn field(&self) -> &'m RelationshipField {
        match self {
            Step::Update { matched, .. } => matched.field,
            Step::Create { field, .. } | Step::ConnectOrCreate { field, .. } => field,
            Step::Connect(step) => step.field,
            Step::Disconnect(step) => step.matched.field,
            Step::Delete(step) => step.matched.field,
        }
    }

    pub fn kind(&self) -> StepKind {
        match self {
            Step::Update { .. } => StepKind::Update,
            Step::Create { .. } => StepKind::Create,
            Step::Connect(_) => StepKind::Connect,
            Step::ConnectOrCreate { .. } => StepKind::ConnectOrCreate,
            Step::Disconnect(_) => StepKind::Disconnect,
            Step::Delete(_) => StepKind::Delete,
        }
    }
}

impl StepKind {
    /// Adds a node to the relationship
    pub fn attaches(&self) -> bool {
        matches!(self, StepKind::Create | StepKind::Connect | StepKind::ConnectOrCreate)
    }

    /// Changes how many edges the relationship holds
    pub fn changes_edges(&self) -> bool {
        !matches!(self, StepKind::Update)
    }
}

#[derive(Debug, Clone)]
pub struct ConnectStep<'m> {
    pub field: &'m RelationshipField,
    pub target: &'m NodeType,
    pub node_filter: Option<FilterArgs>,
    pub edge: Vec<PropertyWrite<'m>>,
    /// Further connections made from each connected node
    pub nested: Vec<ConnectStep<'m>>,
}

#[derive(Debug, Clone)]
pub struct DisconnectStep<'m> {
    pub matched: RelatedMatch<'m>,
    pub nested: Vec<DisconnectStep<'m>>,
}

#[derive(Debug, Clone)]
pub struct DeleteStep<'m> {
    pub matched: RelatedMatch<'m>,
    pub nested: Vec<DeleteStep<'m>>,
}
