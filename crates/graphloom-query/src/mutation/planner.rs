use super::input::{create_writes, update_writes};
use super::{
    ConnectStep, DeleteBranch, DeleteStep, DisconnectStep, MutationPlan, MutationRoot, NodeCreate,
    NodeUpdate, PropertyWrite, RelatedMatch, Step, StepKind, UpdateBranch,
};
use crate::error::{TranslateError, TranslateResult};
use crate::plan::{branch_targets, OperationPlanner, ProjectionItem, ProjectionKind};
use crate::predicate::value;
use crate::request::{FilterArgs, OperationKind, OperationRequest};
use crate::schema::{Cardinality, NodeType, RelationshipField, SchemaModel, TargetKind, TypeId};
use graphloom_config::TranslatorConfig;
use serde_json::{Map, Value};
use std::ptr;
use tracing::trace;

const TYPENAME: &str = "__typename";

/// Operations allowed inside a create input
const CREATE_OPERATIONS: [&str; 3] = ["create", "connect", "connectOrCreate"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Create,
    Update,
}

type Targets<'m> = Vec<(&'m NodeType, Option<FilterArgs>)>;

/// One item of a nested operation map
struct Nested<'m, 'v> {
    field: &'m RelationshipField,
    target: &'m str,
    item: &'v Map<String, Value>,
    path: String,
}

/// Resolves write requests against the model into [`MutationPlan`]s
pub struct MutationPlanner<'m> {
    model: &'m SchemaModel,
    reads: OperationPlanner<'m>,
}

impl<'m> MutationPlanner<'m> {
    pub fn new(model: &'m SchemaModel, config: &'m TranslatorConfig) -> Self {
        Self {
            model,
            reads: OperationPlanner::new(model, config),
        }
    }

    pub fn plan(&self, request: &OperationRequest) -> TranslateResult<MutationPlan<'m>> {
        let root = match request.operation {
            OperationKind::Create => self.plan_create(request)?,
            OperationKind::Update => self.plan_update(request)?,
            OperationKind::Delete => self.plan_delete(request)?,
            other => {
                return Err(TranslateError::invalid_input(
                    "operation",
                    format!("'{}' is not a mutation", other.name()),
                ))
            }
        };
        Ok(MutationPlan {
            operation: request.operation,
            root,
        })
    }

    fn plan_create(&self, request: &OperationRequest) -> TranslateResult<MutationRoot<'m>> {
        let node = self.reads.root_node(&request.target, OperationKind::Create)?;
        let mut inputs = Vec::with_capacity(request.arguments.input.len());
        for (i, input) in request.arguments.input.iter().enumerate() {
            let path = format!("input[{}]", i);
            inputs.push(self.node_create(node, object(input, &path)?, &path)?);
        }
        trace!(type_name = %node.name, inputs = inputs.len(), "planned create");
        Ok(MutationRoot::Create {
            node,
            inputs,
            projection: self.reads.projection(node, &request.selection)?,
        })
    }

    fn plan_update(&self, request: &OperationRequest) -> TranslateResult<MutationRoot<'m>> {
        let args = &request.arguments;
        let (type_name, is_abstract, targets) = self.root_targets(request, OperationKind::Update)?;
        let empty = Map::new();
        let update = args.update.as_ref().unwrap_or(&empty);
        let roots = [
            ("create", args.create.as_ref()),
            ("connect", args.connect.as_ref()),
            ("disconnect", args.disconnect.as_ref()),
            ("delete", args.delete.as_ref()),
        ];

        let mut branches = Vec::with_capacity(targets.len());
        for (node, filter) in targets {
            let merged = merge_root_operations(node, update, &roots)?;
            let mut projection = self.reads.projection(node, &request.selection)?;
            if is_abstract && !projection.iter().any(|p| p.key == TYPENAME) {
                projection.push(ProjectionItem {
                    key: TYPENAME.to_string(),
                    kind: ProjectionKind::Typename,
                });
            }
            branches.push(UpdateBranch {
                node,
                filter,
                update: self.node_update(node, &merged, "update")?,
                projection,
            });
        }
        trace!(type_name, branches = branches.len(), "planned update");
        Ok(MutationRoot::Update {
            type_name,
            is_abstract,
            branches,
        })
    }

    fn plan_delete(&self, request: &OperationRequest) -> TranslateResult<MutationRoot<'m>> {
        let (type_name, is_abstract, targets) = self.root_targets(request, OperationKind::Delete)?;
        let mut branches = Vec::with_capacity(targets.len());
        for (node, filter) in targets {
            let mut cascade = Vec::new();
            if let Some(delete) = &request.arguments.delete {
                let value = Value::Object(delete.clone());
                for nested in self.nested(node, &value, "delete")? {
                    cascade.extend(self.delete_steps(nested.field, nested.target, nested.item, &nested.path)?);
                }
            }
            branches.push(DeleteBranch {
                node,
                filter,
                cascade,
            });
        }
        trace!(type_name, branches = branches.len(), "planned delete");
        Ok(MutationRoot::Delete {
            type_name,
            is_abstract,
            branches,
        })
    }

    /// Root node, or every enabled implementer of a root interface
    fn root_targets(
        &self,
        request: &OperationRequest,
        operation: OperationKind,
    ) -> TranslateResult<(&'m str, bool, Targets<'m>)> {
        let model = self.model;
        let filter = request.arguments.filter.as_ref();
        if let Some(TypeId::Interface(_)) = model.type_id(&request.target) {
            let Some(interface) = model.interface(&request.target) else {
                return Err(TranslateError::UnknownField {
                    type_name: "<root>".to_string(),
                    field: request.target.clone(),
                });
            };
            let candidates: Vec<&'m NodeType> = model
                .concrete_types(&interface.name)
                .into_iter()
                .filter(|n| allows(n, operation))
                .collect();
            if candidates.is_empty() {
                return Err(TranslateError::OperationDisabled {
                    type_name: interface.name.clone(),
                    operation: operation.name().to_string(),
                });
            }
            let targets = branch_targets(model, &interface.name, candidates, filter)?;
            return Ok((interface.name.as_str(), true, targets));
        }
        let node = self.reads.root_node(&request.target, operation)?;
        let filter = filter.filter(|f| !f.is_empty()).cloned();
        Ok((node.name.as_str(), false, vec![(node, filter)]))
    }

    fn node_create(
        &self,
        node: &'m NodeType,
        input: &Map<String, Value>,
        path: &str,
    ) -> TranslateResult<NodeCreate<'m>> {
        let (attributes, relationships) = split(node, input);
        let properties = create_writes(self.model, &node.name, &node.fields.attributes, &attributes, &[], path)?;
        let steps = self.field_steps(node, &relationships, Mode::Create, path)?;
        let checks = node
            .fields
            .relationships
            .iter()
            .filter(|rel| match rel.cardinality {
                Cardinality::One { required: true } => true,
                Cardinality::One { required: false } => touches(&steps, rel),
                Cardinality::Many => false,
            })
            .collect();
        Ok(NodeCreate {
            node,
            properties,
            steps,
            checks,
        })
    }

    fn node_update(
        &self,
        node: &'m NodeType,
        input: &Map<String, Value>,
        path: &str,
    ) -> TranslateResult<NodeUpdate<'m>> {
        let (attributes, relationships) = split(node, input);
        let properties = update_writes(self.model, &node.name, &node.fields.attributes, &attributes, path)?;
        let steps = self.field_steps(node, &relationships, Mode::Update, path)?;
        let checks = node
            .fields
            .relationships
            .iter()
            .filter(|rel| !rel.is_many() && touches(&steps, rel))
            .collect();
        Ok(NodeUpdate {
            properties,
            steps,
            checks,
        })
    }

    /// Steps for every relationship key of one input, in emission order
    fn field_steps(
        &self,
        node: &'m NodeType,
        relationships: &[(&'m RelationshipField, &Value)],
        mode: Mode,
        path: &str,
    ) -> TranslateResult<Vec<Step<'m>>> {
        let mut steps = Vec::new();
        for &(field, input) in relationships {
            let at = format!("{}.{}", path, field.name);
            let mut attached = 0;
            for (target, operand) in member_values(self.model, field, input, &at)? {
                attached += self.operations(&mut steps, field, target, operand, mode, &at)?;
            }
            if !field.is_many() && attached > 1 {
                return Err(TranslateError::Cardinality {
                    type_name: node.name.clone(),
                    field: field.name.clone(),
                    message: format!("received {} nodes, expected at most one", attached),
                });
            }
        }
        Ok(order(steps))
    }

    /// Parse one field's operation items; returns how many nodes they attach
    fn operations(
        &self,
        steps: &mut Vec<Step<'m>>,
        field: &'m RelationshipField,
        target: &'m str,
        input: &Value,
        mode: Mode,
        path: &str,
    ) -> TranslateResult<usize> {
        let mut attached = 0;
        for item in items(input, path)? {
            if item.contains_key("where") && !item.contains_key("update") {
                return Err(TranslateError::invalid_input(
                    format!("{}.where", path),
                    "'where' selects the nodes of an 'update'",
                ));
            }
            for (key, operand) in item {
                let at = format!("{}.{}", path, key);
                if mode == Mode::Create && !CREATE_OPERATIONS.contains(&key.as_str()) {
                    return Err(TranslateError::invalid_input(
                        at,
                        format!("'{}' is not available when creating", key),
                    ));
                }
                match key.as_str() {
                    "where" => {}
                    "update" => steps.extend(self.update_steps(field, target, item, operand, &at)?),
                    "create" => {
                        for entry in items(operand, &at)? {
                            attached += 1;
                            steps.push(self.create_step(field, target, entry, &at)?);
                        }
                    }
                    "connect" => {
                        for entry in items(operand, &at)? {
                            attached += 1;
                            steps.extend(self.connect_steps(field, target, entry, &at)?.into_iter().map(Step::Connect));
                        }
                    }
                    "connectOrCreate" => {
                        for entry in items(operand, &at)? {
                            attached += 1;
                            steps.push(self.connect_or_create(field, target, entry, &at)?);
                        }
                    }
                    "disconnect" => {
                        for entry in items(operand, &at)? {
                            steps.extend(
                                self.disconnect_steps(field, target, entry, &at)?
                                    .into_iter()
                                    .map(Step::Disconnect),
                            );
                        }
                    }
                    "delete" => {
                        for entry in items(operand, &at)? {
                            steps.extend(self.delete_steps(field, target, entry, &at)?.into_iter().map(Step::Delete));
                        }
                    }
                    other => {
                        return Err(TranslateError::invalid_input(
                            at,
                            format!("unknown operation '{}'", other),
                        ))
                    }
                }
            }
        }
        Ok(attached)
    }

    fn create_step(
        &self,
        field: &'m RelationshipField,
        target: &'m str,
        item: &Map<String, Value>,
        path: &str,
    ) -> TranslateResult<Step<'m>> {
        only_keys(item, &["node", "edge"], path)?;
        let input = item
            .get("node")
            .ok_or_else(|| TranslateError::invalid_input(path, "create requires 'node'"))?;
        let node_path = format!("{}.node", path);
        let (node, input) = match self.model.node(target) {
            Some(node) => (node, object(input, &node_path)?),
            None => {
                // abstract target: `{ <Implementer>: { ... } }`
                let map = object(input, &node_path)?;
                let mut entries = map.iter();
                let (Some((name, inner)), None) = (entries.next(), entries.next()) else {
                    return Err(TranslateError::invalid_input(
                        node_path,
                        format!("name exactly one implementation of {}", target),
                    ));
                };
                let node = self
                    .model
                    .concrete_types(target)
                    .into_iter()
                    .find(|n| &n.name == name)
                    .ok_or_else(|| TranslateError::UnknownField {
                        type_name: target.to_string(),
                        field: name.clone(),
                    })?;
                (node, object(inner, &format!("{}.{}", node_path, name))?)
            }
        };
        enabled(node, OperationKind::Create)?;
        Ok(Step::Create {
            field,
            node: self.node_create(node, input, &node_path)?,
            edge: self.edge_writes(field, item.get("edge"), Mode::Create, path)?,
        })
    }

    fn connect_steps(
        &self,
        field: &'m RelationshipField,
        target: &'m str,
        item: &Map<String, Value>,
        path: &str,
    ) -> TranslateResult<Vec<ConnectStep<'m>>> {
        only_keys(item, &["where", "edge", "connect"], path)?;
        let (node_filter, edge_filter) = where_parts(item, path)?;
        if edge_filter.is_some() {
            return Err(TranslateError::invalid_input(
                format!("{}.where.edge", path),
                "connect matches nodes only",
            ));
        }
        let edge = self.edge_writes(field, item.get("edge"), Mode::Create, path)?;
        let mut steps = Vec::new();
        for (node, filter) in self.targets(target, node_filter.as_ref())? {
            let mut nested = Vec::new();
            if let Some(more) = item.get("connect") {
                for inner in self.nested(node, more, &format!("{}.connect", path))? {
                    nested.extend(self.connect_steps(inner.field, inner.target, inner.item, &inner.path)?);
                }
            }
            steps.push(ConnectStep {
                field,
                target: node,
                node_filter: filter,
                edge: edge.clone(),
                nested,
            });
        }
        Ok(steps)
    }

    fn connect_or_create(
        &self,
        field: &'m RelationshipField,
        target: &'m str,
        item: &Map<String, Value>,
        path: &str,
    ) -> TranslateResult<Step<'m>> {
        only_keys(item, &["where", "onCreate"], path)?;
        let node = self.model.node(target).ok_or_else(|| {
            TranslateError::invalid_input(path, format!("connectOrCreate needs a node type, {} is abstract", target))
        })?;
        enabled(node, OperationKind::Create)?;

        let (node_filter, edge_filter) = where_parts(item, path)?;
        let Some(node_filter) = node_filter.filter(|f| !f.is_empty()) else {
            return Err(TranslateError::filter(&node.name, "where", "a unique attribute is required"));
        };
        if edge_filter.is_some() {
            return Err(TranslateError::filter(&node.name, "edge", "connectOrCreate matches nodes only"));
        }
        let mut key = Vec::with_capacity(node_filter.len());
        for (name, literal) in &node_filter {
            let attr = node
                .fields
                .attribute(name)
                .filter(|a| a.is_unique())
                .ok_or_else(|| {
                    TranslateError::filter(&node.name, name, "connectOrCreate matches on @unique or @id attributes only")
                })?;
            let literal = value::normalize(self.model, &attr.ty, literal)
                .map_err(|m| TranslateError::filter(&node.name, name, m))?;
            if literal.is_null() {
                return Err(TranslateError::filter(&node.name, name, "cannot match on null"));
            }
            key.push((attr, literal));
        }

        let create_path = format!("{}.onCreate", path);
        let on_create = item.get("onCreate").map(|v| object(v, &create_path)).transpose()?;
        if let Some(map) = on_create {
            only_keys(map, &["node", "edge"], &create_path)?;
        }
        let node_path = format!("{}.node", create_path);
        let empty = Map::new();
        let input = match on_create.and_then(|m| m.get("node")) {
            Some(v) => object(v, &node_path)?,
            None => &empty,
        };
        let (attributes, relationships) = split(node, input);
        if let Some((rel, _)) = relationships.first() {
            return Err(TranslateError::invalid_input(
                format!("{}.{}", node_path, rel.name),
                "relationships cannot be written inside connectOrCreate",
            ));
        }
        let skip: Vec<&str> = key.iter().map(|(attr, _)| attr.name.as_str()).collect();
        if let Some((name, _)) = attributes.iter().find(|(name, _)| skip.contains(name)) {
            return Err(TranslateError::invalid_input(
                format!("{}.{}", node_path, name),
                "already set by 'where'",
            ));
        }
        let on_create_writes =
            create_writes(self.model, &node.name, &node.fields.attributes, &attributes, &skip, &node_path)?;
        let edge = self.edge_writes(field, on_create.and_then(|m| m.get("edge")), Mode::Create, &create_path)?;
        Ok(Step::ConnectOrCreate {
            field,
            target: node,
            key,
            on_create: on_create_writes,
            edge,
        })
    }

    fn update_steps(
        &self,
        field: &'m RelationshipField,
        target: &'m str,
        item: &Map<String, Value>,
        update: &Value,
        path: &str,
    ) -> TranslateResult<Vec<Step<'m>>> {
        let update = object(update, path)?;
        only_keys(update, &["node", "edge"], path)?;
        let (node_filter, edge_filter) = where_parts(item, path)?;
        self.check_edge_filter(field, edge_filter.as_ref())?;
        let edge = self.edge_writes(field, update.get("edge"), Mode::Update, path)?;

        let mut steps = Vec::new();
        for (node, filter) in self.targets(target, node_filter.as_ref())? {
            enabled(node, OperationKind::Update)?;
            let changes = match update.get("node") {
                Some(input) => {
                    let node_path = format!("{}.node", path);
                    self.node_update(node, object(input, &node_path)?, &node_path)?
                }
                None => NodeUpdate::default(),
            };
            steps.push(Step::Update {
                matched: RelatedMatch {
                    field,
                    target: node,
                    node_filter: filter,
                    edge_filter: edge_filter.clone(),
                },
                node: changes,
                edge: edge.clone(),
            });
        }
        Ok(steps)
    }

    fn disconnect_steps(
        &self,
        field: &'m RelationshipField,
        target: &'m str,
        item: &Map<String, Value>,
        path: &str,
    ) -> TranslateResult<Vec<DisconnectStep<'m>>> {
        only_keys(item, &["where", "disconnect"], path)?;
        let (node_filter, edge_filter) = where_parts(item, path)?;
        self.check_edge_filter(field, edge_filter.as_ref())?;
        let mut steps = Vec::new();
        for (node, filter) in self.targets(target, node_filter.as_ref())? {
            let mut nested = Vec::new();
            if let Some(more) = item.get("disconnect") {
                for inner in self.nested(node, more, &format!("{}.disconnect", path))? {
                    nested.extend(self.disconnect_steps(inner.field, inner.target, inner.item, &inner.path)?);
                }
            }
            steps.push(DisconnectStep {
                matched: RelatedMatch {
                    field,
                    target: node,
                    node_filter: filter,
                    edge_filter: edge_filter.clone(),
                },
                nested,
            });
        }
        Ok(steps)
    }

    fn delete_steps(
        &self,
        field: &'m RelationshipField,
        target: &'m str,
        item: &Map<String, Value>,
        path: &str,
    ) -> TranslateResult<Vec<DeleteStep<'m>>> {
        only_keys(item, &["where", "delete"], path)?;
        let (node_filter, edge_filter) = where_parts(item, path)?;
        self.check_edge_filter(field, edge_filter.as_ref())?;
        let mut steps = Vec::new();
        for (node, filter) in self.targets(target, node_filter.as_ref())? {
            enabled(node, OperationKind::Delete)?;
            let mut nested = Vec::new();
            if let Some(more) = item.get("delete") {
                for inner in self.nested(node, more, &format!("{}.delete", path))? {
                    nested.extend(self.delete_steps(inner.field, inner.target, inner.item, &inner.path)?);
                }
            }
            steps.push(DeleteStep {
                matched: RelatedMatch {
                    field,
                    target: node,
                    node_filter: filter,
                    edge_filter: edge_filter.clone(),
                },
                nested,
            });
        }
        Ok(steps)
    }

    /// Concrete nodes behind a field target, interface filters narrowed
    fn targets(&self, target: &'m str, filter: Option<&FilterArgs>) -> TranslateResult<Targets<'m>> {
        let candidates = self.model.concrete_types(target);
        branch_targets(self.model, target, candidates, filter)
    }

    /// Flatten `{ <rel>: [item, ...] }` maps (or lists of them) keyed by
    /// the relationships of `node`
    fn nested<'v>(&self, node: &'m NodeType, input: &'v Value, path: &str) -> TranslateResult<Vec<Nested<'m, 'v>>> {
        let mut out = Vec::new();
        for map in items(input, path)? {
            for (name, operand) in map {
                let field = relationship(node, name)?;
                let at = format!("{}.{}", path, name);
                for (target, operand) in member_values(self.model, field, operand, &at)? {
                    for item in items(operand, &at)? {
                        out.push(Nested {
                            field,
                            target,
                            item,
                            path: at.clone(),
                        });
                    }
                }
            }
        }
        Ok(out)
    }

    fn edge_writes(
        &self,
        field: &'m RelationshipField,
        input: Option<&Value>,
        mode: Mode,
        path: &str,
    ) -> TranslateResult<Vec<PropertyWrite<'m>>> {
        let edge_path = format!("{}.edge", path);
        let Some(name) = &field.properties else {
            if input.is_some() {
                return Err(TranslateError::invalid_input(
                    edge_path,
                    format!("{}.{} has no relationship properties", field.owner, field.name),
                ));
            }
            return Ok(Vec::new());
        };
        let properties = self.model.properties(name).ok_or_else(|| TranslateError::UnknownField {
            type_name: field.owner.clone(),
            field: field.name.clone(),
        })?;
        let empty = Map::new();
        let map = match input {
            Some(v) => object(v, &edge_path)?,
            None => &empty,
        };
        let entries: Vec<(&str, &Value)> = map.iter().map(|(k, v)| (k.as_str(), v)).collect();
        match mode {
            Mode::Create => create_writes(self.model, &properties.name, &properties.attributes, &entries, &[], &edge_path),
            Mode::Update => update_writes(self.model, &properties.name, &properties.attributes, &entries, &edge_path),
        }
    }

    fn check_edge_filter(&self, field: &RelationshipField, filter: Option<&FilterArgs>) -> TranslateResult<()> {
        if filter.is_some() && field.properties.is_none() {
            return Err(TranslateError::filter(
                &field.owner,
                "edge",
                format!("{} has no relationship properties", field.name),
            ));
        }
        Ok(())
    }
}

/// Emission order: by step kind, except that a one-cardinality field
/// replacing its node disconnects or deletes the old one first
fn order(mut steps: Vec<Step<'_>>) -> Vec<Step<'_>> {
    steps.sort_by_key(Step::kind);
    let replaced: Vec<*const RelationshipField> = steps
        .iter()
        .filter(|s| s.kind().attaches() && !s.field().is_many())
        .map(|s| s.field() as *const RelationshipField)
        .collect();
    let (first, rest): (Vec<_>, Vec<_>) = steps
        .into_iter()
        .partition(|s| {
            matches!(s.kind(), StepKind::Disconnect | StepKind::Delete)
                && replaced.contains(&(s.field() as *const _))
        });
    first.into_iter().chain(rest).collect()
}

fn touches(steps: &[Step<'_>], field: &RelationshipField) -> bool {
    steps
        .iter()
        .any(|s| s.kind().changes_edges() && ptr::eq(s.field(), field))
}

fn allows(node: &NodeType, operation: OperationKind) -> bool {
    let toggles = node.toggles();
    match operation {
        OperationKind::Create => toggles.create,
        OperationKind::Update => toggles.update,
        OperationKind::Delete => toggles.delete,
        OperationKind::Read => toggles.read,
        OperationKind::Aggregate => toggles.aggregate,
        OperationKind::Subscribe => true,
    }
}

fn enabled(node: &NodeType, operation: OperationKind) -> TranslateResult<()> {
    if allows(node, operation) {
        Ok(())
    } else {
        Err(TranslateError::OperationDisabled {
            type_name: node.name.clone(),
            operation: operation.name().to_string(),
        })
    }
}

/// Attribute entries and relationship entries of an input map
#[allow(clippy::type_complexity)]
fn split<'m, 'v>(
    node: &'m NodeType,
    input: &'v Map<String, Value>,
) -> (Vec<(&'v str, &'v Value)>, Vec<(&'m RelationshipField, &'v Value)>) {
    let mut attributes = Vec::new();
    let mut relationships = Vec::new();
    for (key, value) in input {
        match node.fields.relationship(key) {
            Some(rel) => relationships.push((rel, value)),
            None => attributes.push((key.as_str(), value)),
        }
    }
    (attributes, relationships)
}

/// Union fields are keyed by member; other fields have a single target
fn member_values<'m, 'v>(
    model: &'m SchemaModel,
    field: &'m RelationshipField,
    input: &'v Value,
    path: &str,
) -> TranslateResult<Vec<(&'m str, &'v Value)>> {
    if field.target_kind != TargetKind::Union {
        return Ok(vec![(field.target.as_str(), input)]);
    }
    let union = model.union(&field.target).ok_or_else(|| TranslateError::UnknownField {
        type_name: field.owner.clone(),
        field: field.name.clone(),
    })?;
    let mut out = Vec::new();
    for (member, operand) in object(input, path)? {
        let name = union
            .members
            .iter()
            .find(|m| *m == member)
            .ok_or_else(|| TranslateError::UnknownField {
                type_name: union.name.clone(),
                field: member.clone(),
            })?;
        out.push((name.as_str(), operand));
    }
    Ok(out)
}

/// Fold root-level `create`/`connect`/`disconnect`/`delete` maps into
/// the per-field items of an update input
fn merge_root_operations(
    node: &NodeType,
    update: &Map<String, Value>,
    roots: &[(&str, Option<&Map<String, Value>>)],
) -> TranslateResult<Map<String, Value>> {
    let mut merged = update.clone();
    for (operation, map) in roots {
        let Some(map) = map else {
            continue;
        };
        for (name, operand) in *map {
            let field = relationship(node, name)?;
            let slot = merged.entry(name.clone()).or_insert(Value::Null);
            if field.target_kind == TargetKind::Union {
                let members = operand.as_object().ok_or_else(|| {
                    TranslateError::invalid_input(
                        format!("{}.{}", operation, name),
                        "expected an object keyed by union member",
                    )
                })?;
                if slot.is_null() {
                    *slot = Value::Object(Map::new());
                }
                let slot = slot.as_object_mut().ok_or_else(|| {
                    TranslateError::invalid_input(format!("update.{}", name), "expected an object keyed by union member")
                })?;
                for (member, inner) in members {
                    append(slot.entry(member.clone()).or_insert(Value::Null), operation, inner);
                }
            } else {
                append(slot, operation, operand);
            }
        }
    }
    Ok(merged)
}

fn append(slot: &mut Value, operation: &str, operand: &Value) {
    let mut item = Map::new();
    item.insert(operation.to_string(), operand.clone());
    let item = Value::Object(item);
    match slot {
        Value::Array(list) => list.push(item),
        Value::Null => *slot = Value::Array(vec![item]),
        other => {
            let previous = std::mem::take(other);
            *other = Value::Array(vec![previous, item]);
        }
    }
}

fn relationship<'m>(node: &'m NodeType, name: &str) -> TranslateResult<&'m RelationshipField> {
    node.fields
        .relationship(name)
        .ok_or_else(|| TranslateError::UnknownField {
            type_name: node.name.clone(),
            field: name.to_string(),
        })
}

/// `where: { node, edge }`
fn where_parts(item: &Map<String, Value>, path: &str) -> TranslateResult<(Option<FilterArgs>, Option<FilterArgs>)> {
    let Some(input) = item.get("where") else {
        return Ok((None, None));
    };
    let at = format!("{}.where", path);
    let map = object(input, &at)?;
    only_keys(map, &["node", "edge"], &at)?;
    let part = |key: &str| -> TranslateResult<Option<FilterArgs>> {
        map.get(key)
            .map(|v| object(v, &format!("{}.{}", at, key)).cloned())
            .transpose()
    };
    Ok((part("node")?, part("edge")?))
}

fn object<'v>(value: &'v Value, path: &str) -> TranslateResult<&'v Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| TranslateError::invalid_input(path, "expected an object"))
}

/// An object, or a list of objects
fn items<'v>(value: &'v Value, path: &str) -> TranslateResult<Vec<&'v Map<String, Value>>> {
    match value {
        Value::Object(map) => Ok(vec![map]),
        Value::Array(list) => list
            .iter()
            .enumerate()
            .map(|(i, v)| object(v, &format!("{}[{}]", path, i)))
            .collect(),
        _ => Err(TranslateError::invalid_input(path, "expected an object or a list of objects")),
    }
}

fn only_keys(map: &Map<String, Value>, allowed: &[&str], path: &str) -> TranslateResult<()> {
    match map.keys().find(|k| !allowed.contains(&k.as_str())) {
        Some(key) => Err(TranslateError::invalid_input(
            format!("{}.{}", path, key),
            format!("expected one of: {}", allowed.join(", ")),
        )),
        None => Ok(()),
    }
}
