use super::{
    AggregateGroup, AggregateOutput, AggregateSelection, AttributeAggregate, Branch,
    ConnectionSelection, ConnectionSort, EdgesSelection, NodeSelection, OperationTree,
    PlannedRoot, ProjectionItem, ProjectionKind, SortItem,
};
use crate::annotation::LimitAnnotation;
use crate::error::{TranslateError, TranslateResult};
use crate::request::{Field, FilterArgs, OperationKind, OperationRequest, SelectionSet};
use crate::schema::{
    Attribute, ComputedResult, FieldSet, NodeType, PropertiesType, RelationshipField, SchemaModel,
    TypeId,
};
use graphloom_config::{LimitConfig, TranslatorConfig};
use serde_json::{Map, Value};
use tracing::trace;

const TYPENAME: &str = "__typename";

/// Sort and pagination arguments for one position
#[derive(Clone, Copy)]
struct Window<'a> {
    sort: &'a [Map<String, Value>],
    limit: Option<u64>,
    offset: Option<u64>,
    /// Lists get limits; single positions never do
    paged: bool,
}

impl Window<'static> {
    fn unpaged() -> Self {
        Window {
            sort: &[],
            limit: None,
            offset: None,
            paged: false,
        }
    }
}

/// Resolves requests against the model into [`OperationTree`]s
pub struct OperationPlanner<'m> {
    model: &'m SchemaModel,
    config: &'m TranslatorConfig,
}

impl<'m> OperationPlanner<'m> {
    pub fn new(model: &'m SchemaModel, config: &'m TranslatorConfig) -> Self {
        Self { model, config }
    }

    /// Plan a read or aggregate request
    pub fn plan(&self, request: &OperationRequest) -> TranslateResult<OperationTree<'m>> {
        let args = &request.arguments;
        let root = match request.operation {
            OperationKind::Read => {
                let window = Window {
                    sort: &args.sort,
                    limit: args.limit,
                    offset: args.offset,
                    paged: true,
                };
                PlannedRoot::Read(self.selection(
                    &request.target,
                    &request.selection,
                    args.filter.as_ref(),
                    window,
                    true,
                )?)
            }
            OperationKind::Aggregate => {
                let node = self.root_node(&request.target, OperationKind::Aggregate)?;
                PlannedRoot::Aggregate {
                    node,
                    filter: args.filter.clone(),
                    selection: self.root_aggregate(node, &request.selection)?,
                }
            }
            other => {
                return Err(TranslateError::invalid_input(
                    "operation",
                    format!("'{}' is not a read operation", other.name()),
                ))
            }
        };
        Ok(OperationTree {
            operation: request.operation,
            root,
        })
    }

    /// Node type targeted by a root operation, checked against its toggles
    pub fn root_node(&self, target: &str, operation: OperationKind) -> TranslateResult<&'m NodeType> {
        let model = self.model;
        let node = match model.type_id(target) {
            Some(TypeId::Node(_)) => model.node(target),
            Some(_) => {
                return Err(TranslateError::invalid_input(
                    "target",
                    format!("{} requires a node type, '{}' is abstract", operation.name(), target),
                ))
            }
            None => None,
        }
        .ok_or_else(|| unknown_root(target))?;

        let toggles = node.toggles();
        let enabled = match operation {
            OperationKind::Read => toggles.read,
            OperationKind::Aggregate => toggles.aggregate,
            OperationKind::Create => toggles.create,
            OperationKind::Update => toggles.update,
            OperationKind::Delete => toggles.delete,
            // event toggles are checked per event
            OperationKind::Subscribe => true,
        };
        if !enabled {
            return Err(TranslateError::OperationDisabled {
                type_name: node.name.clone(),
                operation: operation.name().to_string(),
            });
        }
        Ok(node)
    }

    /// Projection of one concrete node, as returned by mutations
    pub fn projection(
        &self,
        node: &'m NodeType,
        selection: &SelectionSet,
    ) -> TranslateResult<Vec<ProjectionItem<'m>>> {
        self.project(node, &fields_for(node, selection))
    }

    fn selection(
        &self,
        type_name: &str,
        selection: &SelectionSet,
        filter: Option<&FilterArgs>,
        window: Window<'_>,
        root: bool,
    ) -> TranslateResult<NodeSelection<'m>> {
        let model = self.model;
        let (declared, limit_annotation): (&'m str, Option<&'m LimitAnnotation>) =
            match model.type_id(type_name) {
                Some(TypeId::Node(_)) => model.node(type_name).map(|n| (n.name.as_str(), n.limit())),
                Some(TypeId::Interface(_)) => model
                    .interface(type_name)
                    .map(|i| (i.name.as_str(), i.annotations.limit())),
                Some(TypeId::Union(_)) => model.union(type_name).map(|u| (u.name.as_str(), None)),
                _ => None,
            }
            .ok_or_else(|| unknown_root(type_name))?;
        let kind = model.type_id(type_name);
        let is_abstract = !matches!(kind, Some(TypeId::Node(_)));

        let all = model.concrete_types(type_name);
        for key in selection.fragments.keys() {
            let known = all.iter().any(|n| &n.name == key) || model.interface(key).is_some();
            if !known {
                return Err(TranslateError::UnknownField {
                    type_name: declared.to_string(),
                    field: key.clone(),
                });
            }
        }

        let mut candidates = all.clone();
        if root {
            if is_abstract {
                candidates.retain(|n| {
                    let readable = n.toggles().read;
                    if !readable {
                        trace!(type_name = %n.name, "read disabled, branch pruned");
                    }
                    readable
                });
                if candidates.is_empty() {
                    return Err(TranslateError::OperationDisabled {
                        type_name: declared.to_string(),
                        operation: OperationKind::Read.name().to_string(),
                    });
                }
            } else {
                self.root_node(declared, OperationKind::Read)?;
            }
        }

        let targets = branch_targets(model, declared, candidates, filter)?;
        if is_abstract {
            trace!(type_name = declared, branches = targets.len(), "fanned out abstract selection");
        }

        let mut branches = Vec::with_capacity(targets.len());
        for (node, filter) in targets {
            let mut projection = self.project(node, &fields_for(node, selection))?;
            if is_abstract && !projection.iter().any(|p| p.key == TYPENAME) {
                projection.push(ProjectionItem {
                    key: TYPENAME.to_string(),
                    kind: ProjectionKind::Typename,
                });
            }
            branches.push(Branch {
                node,
                filter,
                projection,
            });
        }

        let sort = self.sort_items(declared, window.sort)?;
        if is_abstract {
            // rows are sorted after the union, by their projected values
            for branch in &mut branches {
                for item in &sort {
                    if branch.projection.iter().any(|p| p.key == item.key) {
                        continue;
                    }
                    if let Some(attr) = branch.node.fields.attribute(&item.key) {
                        branch.projection.push(ProjectionItem {
                            key: item.key.clone(),
                            kind: ProjectionKind::Attribute(attr),
                        });
                    }
                }
            }
        }

        let (limit, offset) = if window.paged {
            (
                effective_limit(window.limit, limit_annotation, &self.config.limits),
                window.offset,
            )
        } else {
            (None, None)
        };

        Ok(NodeSelection {
            type_name: declared,
            is_abstract,
            branches,
            sort,
            limit,
            offset,
        })
    }

    fn sort_items(&self, type_name: &str, sort: &[Map<String, Value>]) -> TranslateResult<Vec<SortItem>> {
        let mut items = Vec::new();
        for map in sort {
            for (field, direction) in map {
                let attr = self
                    .model
                    .fields_of(type_name)
                    .and_then(|fields| fields.attribute(field))
                    .ok_or_else(|| {
                        TranslateError::invalid_input(
                            format!("sort.{}", field),
                            format!("'{}' is not a sortable attribute of {}", field, type_name),
                        )
                    })?;
                items.push(SortItem {
                    key: attr.name.clone(),
                    property: attr.db_name.clone(),
                    descending: parse_direction(field, direction)?,
                });
            }
        }
        Ok(items)
    }

    fn project(&self, node: &'m NodeType, fields: &[&Field]) -> TranslateResult<Vec<ProjectionItem<'m>>> {
        let mut items: Vec<ProjectionItem<'m>> = Vec::with_capacity(fields.len());
        for field in fields {
            let key = field.response_key();
            if items.iter().any(|i| i.key == key) {
                continue;
            }
            let kind = self.project_field(node, field)?;
            items.push(ProjectionItem {
                key: key.to_string(),
                kind,
            });
        }
        Ok(items)
    }

    fn project_field(&self, node: &'m NodeType, field: &Field) -> TranslateResult<ProjectionKind<'m>> {
        if field.name == TYPENAME {
            return Ok(ProjectionKind::Typename);
        }
        let fields = &node.fields;
        if let Some(attr) = fields.attribute(&field.name) {
            return Ok(ProjectionKind::Attribute(attr));
        }
        if let Some(rel) = fields.relationship(&field.name) {
            let args = &field.arguments;
            let window = Window {
                sort: &args.sort,
                limit: args.limit,
                offset: args.offset,
                paged: rel.is_many(),
            };
            let nested = self.selection(&rel.target, &field.selection, args.filter.as_ref(), window, false)?;
            return Ok(ProjectionKind::Relationship { field: rel, nested });
        }
        if let Some(computed) = fields.computed(&field.name) {
            let nested = match &computed.result {
                ComputedResult::Scalar(_) => None,
                ComputedResult::Node { target, .. } => Some(self.selection(
                    target,
                    &field.selection,
                    None,
                    Window::unpaged(),
                    false,
                )?),
            };
            return Ok(ProjectionKind::Computed {
                field: computed,
                nested,
            });
        }
        if let Some(rel) = field
            .name
            .strip_suffix("Aggregate")
            .and_then(|name| fields.relationship(name))
        {
            return Ok(ProjectionKind::Aggregate {
                field: rel,
                filter: field.arguments.filter.clone(),
                selection: self.relationship_aggregate(rel, &field.selection)?,
            });
        }
        if let Some(rel) = field
            .name
            .strip_suffix("Connection")
            .and_then(|name| fields.relationship(name))
        {
            return Ok(ProjectionKind::Connection {
                field: rel,
                connection: self.connection(rel, field)?,
            });
        }
        Err(TranslateError::UnknownField {
            type_name: node.name.clone(),
            field: field.name.clone(),
        })
    }

    fn root_aggregate(&self, node: &'m NodeType, selection: &SelectionSet) -> TranslateResult<AggregateSelection<'m>> {
        let mut out = AggregateSelection::default();
        let mut group = AggregateGroup::default();
        for field in &selection.fields {
            if field.name == "count" {
                out.count = Some(field.response_key().to_string());
                continue;
            }
            let attr = node.fields.attribute(&field.name).ok_or_else(|| TranslateError::UnknownField {
                type_name: format!("{}Aggregate", node.name),
                field: field.name.clone(),
            })?;
            group.attributes.push(attribute_aggregate(field, attr)?);
        }
        if !group.attributes.is_empty() {
            out.node = Some(group);
        }
        Ok(out)
    }

    fn relationship_aggregate(
        &self,
        rel: &'m RelationshipField,
        selection: &SelectionSet,
    ) -> TranslateResult<AggregateSelection<'m>> {
        let scope = format!("{}.{}Aggregate", rel.owner, rel.name);
        let mut out = AggregateSelection::default();
        for field in &selection.fields {
            let key = Some(field.response_key().to_string());
            match field.name.as_str() {
                "count" => out.count = key,
                "node" => {
                    let target = self.target_fields(rel).ok_or_else(|| TranslateError::UnknownField {
                        type_name: scope.clone(),
                        field: field.name.clone(),
                    })?;
                    out.node = Some(AggregateGroup {
                        key,
                        attributes: attribute_aggregates(&scope, |name| target.attribute(name), &field.selection)?,
                    });
                }
                "edge" => {
                    let props = self.properties_of(rel)?;
                    out.edge = Some(AggregateGroup {
                        key,
                        attributes: attribute_aggregates(&scope, |name| props.attribute(name), &field.selection)?,
                    });
                }
                _ => {
                    return Err(TranslateError::UnknownField {
                        type_name: scope,
                        field: field.name.clone(),
                    })
                }
            }
        }
        Ok(out)
    }

    fn connection(&self, rel: &'m RelationshipField, field: &Field) -> TranslateResult<ConnectionSelection<'m>> {
        let scope = format!("{}.{}Connection", rel.owner, rel.name);
        let args = &field.arguments;
        let limit_annotation = self.model.node(&rel.target).and_then(|n| n.limit());
        let first = if rel.is_many() {
            effective_limit(args.first, limit_annotation, &self.config.limits)
        } else {
            None
        };

        let mut connection = ConnectionSelection {
            filter: args.filter.clone(),
            sort: Vec::new(),
            first,
            total_count: None,
            edges: None,
        };
        for sub in &field.selection.fields {
            match sub.name.as_str() {
                "totalCount" => connection.total_count = Some(sub.response_key().to_string()),
                "edges" => connection.edges = Some(self.edges(rel, sub, &scope)?),
                _ => {
                    return Err(TranslateError::UnknownField {
                        type_name: scope,
                        field: sub.name.clone(),
                    })
                }
            }
        }

        for map in &args.sort {
            for (side, inner) in map {
                let inner = inner.as_object().ok_or_else(|| {
                    TranslateError::invalid_input(format!("sort.{}", side), "expected an object")
                })?;
                for (name, direction) in inner {
                    let descending = parse_direction(name, direction)?;
                    let path = match side.as_str() {
                        "node" => self.node_sort_path(rel, &mut connection.edges, name)?,
                        "edge" => self.edge_sort_path(rel, &mut connection.edges, name)?,
                        other => {
                            return Err(TranslateError::invalid_input(
                                format!("sort.{}", other),
                                "expected node or edge",
                            ))
                        }
                    };
                    // nothing to order when edges are not selected
                    if let Some(path) = path {
                        connection.sort.push(ConnectionSort { path, descending });
                    }
                }
            }
        }
        Ok(connection)
    }

    fn edges(&self, rel: &'m RelationshipField, field: &Field, scope: &str) -> TranslateResult<EdgesSelection<'m>> {
        let mut edges = EdgesSelection {
            key: field.response_key().to_string(),
            properties: None,
            node: None,
        };
        for sub in &field.selection.fields {
            let key = sub.response_key().to_string();
            match sub.name.as_str() {
                "node" => {
                    let nested = self.selection(&rel.target, &sub.selection, None, Window::unpaged(), false)?;
                    edges.node = Some((key, nested));
                }
                "properties" => {
                    let props = self.properties_of(rel)?;
                    let mut attributes = Vec::with_capacity(sub.selection.fields.len());
                    for f in &sub.selection.fields {
                        let attr = props.attribute(&f.name).ok_or_else(|| TranslateError::UnknownField {
                            type_name: props.name.clone(),
                            field: f.name.clone(),
                        })?;
                        attributes.push((f.response_key().to_string(), attr));
                    }
                    edges.properties = Some((key, attributes));
                }
                _ => {
                    return Err(TranslateError::UnknownField {
                        type_name: format!("{}.edges", scope),
                        field: sub.name.clone(),
                    })
                }
            }
        }
        Ok(edges)
    }

    fn node_sort_path(
        &self,
        rel: &'m RelationshipField,
        edges: &mut Option<EdgesSelection<'m>>,
        name: &str,
    ) -> TranslateResult<Option<Vec<String>>> {
        let attr = self
            .target_fields(rel)
            .and_then(|f| f.attribute(name))
            .ok_or_else(|| {
                TranslateError::invalid_input(
                    format!("sort.node.{}", name),
                    format!("'{}' is not a sortable attribute of {}", name, rel.target),
                )
            })?;
        let Some(edges) = edges.as_mut() else {
            return Ok(None);
        };
        if edges.node.is_none() {
            let nested = self.selection(&rel.target, &SelectionSet::default(), None, Window::unpaged(), false)?;
            edges.node = Some(("node".to_string(), nested));
        }
        let Some((node_key, nested)) = edges.node.as_mut() else {
            return Ok(None);
        };
        for branch in &mut nested.branches {
            if branch.projection.iter().any(|p| p.key == attr.name) {
                continue;
            }
            if let Some(own) = branch.node.fields.attribute(&attr.name) {
                branch.projection.push(ProjectionItem {
                    key: attr.name.clone(),
                    kind: ProjectionKind::Attribute(own),
                });
            }
        }
        Ok(Some(vec![node_key.clone(), attr.name.clone()]))
    }

    fn edge_sort_path(
        &self,
        rel: &'m RelationshipField,
        edges: &mut Option<EdgesSelection<'m>>,
        name: &str,
    ) -> TranslateResult<Option<Vec<String>>> {
        let props = self.properties_of(rel)?;
        let attr = props.attribute(name).ok_or_else(|| {
            TranslateError::invalid_input(
                format!("sort.edge.{}", name),
                format!("'{}' is not an attribute of {}", name, props.name),
            )
        })?;
        let Some(edges) = edges.as_mut() else {
            return Ok(None);
        };
        let (key, attributes) = edges
            .properties
            .get_or_insert_with(|| ("properties".to_string(), Vec::new()));
        if !attributes.iter().any(|(k, _)| k == &attr.name) {
            attributes.push((attr.name.clone(), attr));
        }
        Ok(Some(vec![key.clone(), attr.name.clone()]))
    }

    fn target_fields(&self, rel: &RelationshipField) -> Option<&'m FieldSet> {
        self.model.fields_of(&rel.target)
    }

    fn properties_of(&self, rel: &RelationshipField) -> TranslateResult<&'m PropertiesType> {
        let model = self.model;
        rel.properties
            .as_deref()
            .and_then(|name| model.properties(name))
            .ok_or_else(|| TranslateError::UnknownField {
                type_name: rel.owner.clone(),
                field: format!("{}.properties", rel.name),
            })
    }
}

/// Limit for a list position: requested, else `@limit` default, else
/// config default, capped by the applicable maximum
pub(crate) fn effective_limit(
    requested: Option<u64>,
    annotation: Option<&LimitAnnotation>,
    config: &LimitConfig,
) -> Option<u64> {
    let max = annotation.and_then(|l| l.max).or(config.max_limit);
    let default = annotation.and_then(|l| l.default).or(config.default_limit);
    match (requested.or(default).or(max), max) {
        (Some(limit), Some(max)) => Some(limit.min(max)),
        (limit, _) => limit,
    }
}

fn unknown_root(target: &str) -> TranslateError {
    TranslateError::UnknownField {
        type_name: "<root>".to_string(),
        field: target.to_string(),
    }
}

fn parse_direction(field: &str, value: &Value) -> TranslateResult<bool> {
    match value.as_str() {
        Some("ASC") => Ok(false),
        Some("DESC") => Ok(true),
        _ => Err(TranslateError::invalid_input(
            format!("sort.{}", field),
            "expected ASC or DESC",
        )),
    }
}

/// Common fields plus fragments for the node or its interfaces
fn fields_for<'s>(node: &NodeType, selection: &'s SelectionSet) -> Vec<&'s Field> {
    let mut fields: Vec<&Field> = selection.fields.iter().collect();
    for (type_name, fragment) in &selection.fragments {
        if *type_name == node.name || node.interfaces.contains(type_name) {
            fields.extend(fragment.fields.iter());
        }
    }
    fields
}

/// Concrete targets behind `type_name`, each with its share of `filter`
pub(crate) fn branch_targets<'m>(
    model: &'m SchemaModel,
    type_name: &str,
    candidates: Vec<&'m NodeType>,
    filter: Option<&FilterArgs>,
) -> TranslateResult<BranchTargets<'m>> {
    let all = model.concrete_types(type_name);
    match model.type_id(type_name) {
        Some(TypeId::Union(_)) => union_branches(type_name, &all, candidates, filter),
        Some(TypeId::Interface(_)) => interface_branches(type_name, &all, candidates, filter),
        _ => Ok(candidates
            .into_iter()
            .map(|n| (n, filter.filter(|f| !f.is_empty()).cloned()))
            .collect()),
    }
}

pub(crate) type BranchTargets<'m> = Vec<(&'m NodeType, Option<FilterArgs>)>;

/// Union filters are keyed by member; only named members are read
fn union_branches<'m>(
    declared: &str,
    all: &[&'m NodeType],
    candidates: Vec<&'m NodeType>,
    filter: Option<&FilterArgs>,
) -> TranslateResult<BranchTargets<'m>> {
    let Some(map) = filter.filter(|f| !f.is_empty()) else {
        return Ok(candidates.into_iter().map(|n| (n, None)).collect());
    };
    for (key, value) in map {
        if !all.iter().any(|n| &n.name == key) {
            return Err(TranslateError::filter(declared, key, "not a member of this union"));
        }
        if !value.is_object() {
            return Err(TranslateError::filter(declared, key, "expected a filter object"));
        }
    }
    Ok(candidates
        .into_iter()
        .filter_map(|n| {
            let member = map.get(&n.name)?.as_object()?;
            Some((n, Some(member.clone()).filter(|m| !m.is_empty())))
        })
        .collect())
}

/// `typename_IN` prunes interface branches before anything is emitted
fn interface_branches<'m>(
    declared: &str,
    all: &[&'m NodeType],
    mut candidates: Vec<&'m NodeType>,
    filter: Option<&FilterArgs>,
) -> TranslateResult<BranchTargets<'m>> {
    let mut filter = filter.cloned().unwrap_or_default();
    if let Some(value) = filter.remove("typename_IN") {
        let names = value
            .as_array()
            .ok_or_else(|| TranslateError::filter(declared, "typename_IN", "expected a list of type names"))?;
        let mut keep = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_str().unwrap_or_default();
            if !all.iter().any(|n| n.name == name) {
                return Err(TranslateError::filter(
                    declared,
                    "typename_IN",
                    format!("'{}' does not implement {}", name, declared),
                ));
            }
            keep.push(name);
        }
        candidates.retain(|n| keep.contains(&n.name.as_str()));
        trace!(type_name = declared, kept = candidates.len(), "typename_IN pruned branches");
    }
    let shared = Some(filter).filter(|f| !f.is_empty());
    Ok(candidates.into_iter().map(|n| (n, shared.clone())).collect())
}

fn attribute_aggregates<'m, F>(
    scope: &str,
    lookup: F,
    selection: &SelectionSet,
) -> TranslateResult<Vec<AttributeAggregate<'m>>>
where
    F: Fn(&str) -> Option<&'m Attribute>,
{
    let mut out = Vec::with_capacity(selection.fields.len());
    for field in &selection.fields {
        let attr = lookup(&field.name).ok_or_else(|| TranslateError::UnknownField {
            type_name: scope.to_string(),
            field: field.name.clone(),
        })?;
        out.push(attribute_aggregate(field, attr)?);
    }
    Ok(out)
}

fn attribute_aggregate<'m>(field: &Field, attr: &'m Attribute) -> TranslateResult<AttributeAggregate<'m>> {
    let mut outputs = Vec::with_capacity(field.selection.fields.len());
    for sub in &field.selection.fields {
        let output = AggregateOutput::from_name(&sub.name)
            .filter(|o| o.accepts(&attr.ty))
            .ok_or_else(|| TranslateError::UnknownField {
                type_name: format!("{}.{}", attr.owner, attr.name),
                field: sub.name.clone(),
            })?;
        outputs.push((sub.response_key().to_string(), output));
    }
    Ok(AttributeAggregate {
        key: field.response_key().to_string(),
        attribute: attr,
        outputs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Field;
    use crate::schema::{RawAnnotation, SchemaDeclarations, TypeDeclaration, UnionDeclaration};
    use serde_json::json;

    fn rel(rel_type: &str, direction: &str) -> Vec<RawAnnotation> {
        vec![RawAnnotation::new("relationship")
            .with_argument("type", json!(rel_type))
            .with_argument("direction", json!(direction))]
    }

    fn model() -> SchemaModel {
        let mut decls = SchemaDeclarations::default();
        decls.interfaces.push(TypeDeclaration::new("Production").field("title", "String!"));
        decls.nodes.push(
            TypeDeclaration::new("Movie")
                .implements("Production")
                .field("title", "String!")
                .field("runtime", "Int"),
        );
        decls.nodes.push(
            TypeDeclaration::new("Series")
                .implements("Production")
                .field("title", "String!")
                .field("episodes", "Int"),
        );
        decls.nodes.push(
            TypeDeclaration::new("Actor")
                .field("name", "String!")
                .annotation(
                    RawAnnotation::new("limit")
                        .with_argument("default", json!(10))
                        .with_argument("max", json!(50)),
                )
                .annotated_field("actedIn", "[Production!]!", rel("ACTED_IN", "OUT"))
                .annotated_field("friends", "[Actor!]!", rel("FRIEND", "OUT")),
        );
        decls.unions.push(UnionDeclaration {
            name: "Search".to_string(),
            members: vec!["Movie".to_string(), "Series".to_string()],
        });
        SchemaModel::build(&decls).unwrap()
    }

    fn read(model: &SchemaModel, request: OperationRequest) -> TranslateResult<NodeSelection<'_>> {
        let config = Box::leak(Box::new(TranslatorConfig::default()));
        match OperationPlanner::new(model, config).plan(&request)?.root {
            PlannedRoot::Read(selection) => Ok(selection),
            PlannedRoot::Aggregate { .. } => panic!("expected a read"),
        }
    }

    fn names<'a>(selection: &'a NodeSelection<'a>) -> Vec<&'a str> {
        selection.branches.iter().map(|b| b.node.name.as_str()).collect()
    }

    #[test]
    fn test_interface_fans_out_with_same_filter() {
        let model = model();
        let request = OperationRequest::new(OperationKind::Read, "Production")
            .with_selection(SelectionSet::of(["title"]))
            .with_where(json!({ "title_STARTS_WITH": "The" }));
        let selection = read(&model, request).unwrap();

        assert!(selection.is_abstract);
        assert_eq!(names(&selection), vec!["Movie", "Series"]);
        for branch in &selection.branches {
            assert_eq!(branch.filter, Some(json!({ "title_STARTS_WITH": "The" }).as_object().unwrap().clone()));
            assert!(branch.projection.iter().any(|p| p.key == "__typename"));
        }
    }

    #[test]
    fn test_typename_in_prunes_branches() {
        let model = model();
        let request = OperationRequest::new(OperationKind::Read, "Production")
            .with_where(json!({ "typename_IN": ["Series"] }));
        let selection = read(&model, request).unwrap();
        assert_eq!(names(&selection), vec!["Series"]);
        assert_eq!(selection.branches[0].filter, None);
    }

    #[test]
    fn test_union_filter_keyed_by_member() {
        let model = model();
        let request = OperationRequest::new(OperationKind::Read, "Search")
            .with_where(json!({ "Movie": { "runtime_GT": 90 } }));
        let selection = read(&model, request).unwrap();
        assert_eq!(names(&selection), vec!["Movie"]);

        let bad = OperationRequest::new(OperationKind::Read, "Search").with_where(json!({ "Actor": {} }));
        assert!(matches!(read(&model, bad), Err(TranslateError::Filter { .. })));
    }

    #[test]
    fn test_fragments_apply_per_type() {
        let model = model();
        let selection = SelectionSet::of(["title"])
            .fragment("Movie", SelectionSet::of(["runtime"]))
            .fragment("Series", SelectionSet::of(["episodes"]));
        let request = OperationRequest::new(OperationKind::Read, "Production").with_selection(selection);
        let planned = read(&model, request).unwrap();

        let keys: Vec<Vec<&str>> = planned
            .branches
            .iter()
            .map(|b| b.projection.iter().map(|p| p.key.as_str()).collect())
            .collect();
        assert_eq!(keys, vec![vec!["title", "runtime", "__typename"], vec!["title", "episodes", "__typename"]]);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let model = model();
        let request = OperationRequest::new(OperationKind::Read, "Actor").with_selection(SelectionSet::of(["age"]));
        let err = read(&model, request).unwrap_err();
        assert_eq!(
            err,
            TranslateError::UnknownField {
                type_name: "Actor".to_string(),
                field: "age".to_string()
            }
        );
    }

    #[test]
    fn test_limit_annotation_default_and_cap() {
        let model = model();
        let selection = read(&model, OperationRequest::new(OperationKind::Read, "Actor")).unwrap();
        assert_eq!(selection.limit, Some(10));

        let mut request = OperationRequest::new(OperationKind::Read, "Actor");
        request.arguments.limit = Some(500);
        assert_eq!(read(&model, request).unwrap().limit, Some(50));
    }

    #[test]
    fn test_effective_limit_from_config() {
        let config = LimitConfig {
            default_limit: Some(20),
            max_limit: Some(100),
        };
        assert_eq!(effective_limit(None, None, &config), Some(20));
        assert_eq!(effective_limit(Some(250), None, &config), Some(100));
        assert_eq!(effective_limit(None, None, &LimitConfig::default()), None);
    }

    #[test]
    fn test_abstract_sort_adds_projected_key() {
        let model = model();
        let mut request = OperationRequest::new(OperationKind::Read, "Production")
            .with_selection(SelectionSet::of(["__typename"]));
        request.arguments.sort = vec![json!({ "title": "DESC" }).as_object().unwrap().clone()];
        let selection = read(&model, request).unwrap();

        assert_eq!(
            selection.sort,
            vec![SortItem {
                key: "title".to_string(),
                property: "title".to_string(),
                descending: true
            }]
        );
        assert!(selection.branches.iter().all(|b| b.projection.iter().any(|p| p.key == "title")));
    }

    #[test]
    fn test_nested_relationship_selection() {
        let model = model();
        let selection = SelectionSet::default().field(
            Field::new("friends").select(
                SelectionSet::default().field(Field::new("actedIn").select(SelectionSet::of(["title"]))),
            ),
        );
        let planned = read(
            &model,
            OperationRequest::new(OperationKind::Read, "Actor").with_selection(selection),
        )
        .unwrap();

        let ProjectionKind::Relationship { nested, .. } = &planned.branches[0].projection[0].kind else {
            panic!("expected relationship");
        };
        assert_eq!(nested.limit, Some(10));
        let ProjectionKind::Relationship { nested: inner, .. } = &nested.branches[0].projection[0].kind else {
            panic!("expected relationship");
        };
        assert!(inner.is_abstract);
        assert_eq!(inner.branches.len(), 2);
    }

    #[test]
    fn test_aggregate_selection_type_checked() {
        let model = model();
        let selection = SelectionSet::default()
            .field(Field::new("count"))
            .field(Field::new("name").select(SelectionSet::of(["shortest", "longest"])));
        let request = OperationRequest::new(OperationKind::Aggregate, "Actor").with_selection(selection);
        let config = TranslatorConfig::default();
        let tree = OperationPlanner::new(&model, &config).plan(&request).unwrap();
        let PlannedRoot::Aggregate { selection, .. } = tree.root else {
            panic!("expected aggregate");
        };
        assert_eq!(selection.count.as_deref(), Some("count"));
        assert_eq!(selection.node.unwrap().attributes[0].outputs.len(), 2);

        let bad = SelectionSet::default().field(Field::new("name").select(SelectionSet::of(["sum"])));
        let request = OperationRequest::new(OperationKind::Aggregate, "Actor").with_selection(bad);
        assert!(OperationPlanner::new(&model, &config).plan(&request).is_err());
    }

    #[test]
    fn test_disabled_read_rejected() {
        let mut decls = SchemaDeclarations::default();
        decls.nodes.push(
            TypeDeclaration::new("Secret")
                .field("code", "String")
                .annotation(RawAnnotation::new("query").with_argument("read", json!(false))),
        );
        let model = SchemaModel::build(&decls).unwrap();
        let err = read(&model, OperationRequest::new(OperationKind::Read, "Secret")).unwrap_err();
        assert!(matches!(err, TranslateError::OperationDisabled { .. }));
    }
}
