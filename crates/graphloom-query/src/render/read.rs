//! Read emission.
//!
//! Each concrete node position is narrowed the same way: request filter,
//! READ filter rules, then READ validate guards. Nested positions run in
//! their own `CALL` after the parent's guards, so an ancestor's guard
//! always aborts before a descendant's is evaluated.

use super::{computed, quote, Block, ROOT_VAR};
use crate::annotation::{AnnotationSet, AuthOperation, AuthStage};
use crate::auth;
use crate::context::TranslationContext;
use crate::error::{TranslateError, TranslateResult};
use crate::plan::{
    AggregateGroup, AggregateOutput, AggregateSelection, Branch, ConnectionSelection,
    NodeSelection, ProjectionItem, ProjectionKind,
};
use crate::predicate::{property, Filter, FilterTarget, Predicate, PredicateBuilder, RelatedTarget};
use crate::request::FilterArgs;
use crate::schema::{escape_name, Attribute, ComputedField, NodeType, RelationshipField};
use serde_json::json;
use tracing::trace;

/// Emits read clauses for planned selections
pub(crate) struct ReadEmitter<'c, 'm> {
    ctx: &'c mut TranslationContext<'m>,
}

impl<'c, 'm> ReadEmitter<'c, 'm> {
    pub fn new(ctx: &'c mut TranslationContext<'m>) -> Self {
        Self { ctx }
    }

    /// Root read, returning one `this` row per result
    pub fn root(&mut self, selection: &NodeSelection<'m>) -> TranslateResult<Block> {
        let mut block = Block::new();
        if !selection.is_abstract {
            let branch = single(selection)?;
            let node = branch.node;
            auth::ensure_authenticated(
                self.ctx,
                node,
                AuthOperation::Read,
                AuthStage::Before,
                &field_rules(&branch.projection),
            )?;
            block.line(format!("MATCH ({}{})", ROOT_VAR, node.label_pattern()));
            self.narrow(&mut block, ROOT_VAR, node, branch.filter.as_ref(), None, &branch.projection)?;
            self.page(&mut block, "WITH *", ROOT_VAR, selection, false);
            let map = self.projection(&mut block, ROOT_VAR, node, &branch.projection)?;
            block.line(format!("RETURN {} {} AS {}", ROOT_VAR, map, ROOT_VAR));
            return Ok(block);
        }

        if selection.branches.is_empty() {
            block.line(format!("UNWIND [] AS {}", ROOT_VAR));
        } else {
            let mut branches = Vec::with_capacity(selection.branches.len());
            for branch in &selection.branches {
                let var = self.ctx.scope.node_var();
                let mut body = Block::new();
                body.line(format!("MATCH ({}{})", var, branch.node.label_pattern()));
                self.narrow(&mut body, &var, branch.node, branch.filter.as_ref(), None, &branch.projection)?;
                let map = self.projection(&mut body, &var, branch.node, &branch.projection)?;
                body.line(format!("RETURN {} {} AS {}", var, map, ROOT_VAR));
                branches.push(body);
            }
            let mut union = Block::new();
            union.union(branches);
            block.call(union);
        }
        self.page(&mut block, "WITH *", ROOT_VAR, selection, true);
        block.line(format!("RETURN {} AS {}", ROOT_VAR, ROOT_VAR));
        Ok(block)
    }

    /// Root aggregate over one node type
    pub fn root_aggregate(
        &mut self,
        node: &'m NodeType,
        filter: Option<&FilterArgs>,
        selection: &AggregateSelection<'m>,
    ) -> TranslateResult<Block> {
        auth::ensure_authenticated(self.ctx, node, AuthOperation::Aggregate, AuthStage::Before, &[])?;

        let mut block = Block::new();
        block.line(format!("MATCH ({}{})", ROOT_VAR, node.label_pattern()));
        let request = self.request_filter(ROOT_VAR, node, filter)?;
        let rules = auth::filter_rules(self.ctx, ROOT_VAR, node, AuthOperation::Aggregate)?;
        request.and(rules).apply_to(&mut block);
        let validate = auth::validate_rules(
            self.ctx,
            ROOT_VAR,
            node,
            AuthOperation::Aggregate,
            AuthStage::Before,
            &[],
        )?;
        auth::guard(&mut block, validate, self.ctx.error_prefix());

        let map = self.aggregate_map(selection, ROOT_VAR, None);
        block.line(format!("RETURN {} AS {}", map, ROOT_VAR));
        Ok(block)
    }

    /// Map projection for the node bound to `var`. Subqueries needed by
    /// nested items are appended to `block` first.
    pub fn projection(
        &mut self,
        block: &mut Block,
        var: &str,
        node: &'m NodeType,
        items: &[ProjectionItem<'m>],
    ) -> TranslateResult<String> {
        let mut entries = Vec::with_capacity(items.len());
        for item in items {
            let key = escape_name(&item.key);
            let entry = match &item.kind {
                ProjectionKind::Attribute(attr) => attribute_entry(var, &item.key, attr),
                ProjectionKind::Typename => format!("{}: {}", key, quote(&node.name)),
                ProjectionKind::Computed { field, nested: None } => {
                    let out = self.ctx.scope.var();
                    let call = computed::scalar_subquery(&mut self.ctx.scope, var, field, &out);
                    block.push(call);
                    format!("{}: {}", key, out)
                }
                ProjectionKind::Computed {
                    field,
                    nested: Some(nested),
                } => {
                    let out = self.computed_nodes(block, var, field, nested)?;
                    format!("{}: {}", key, out)
                }
                ProjectionKind::Relationship { field, nested } => {
                    let out = self.relationship(block, var, field, nested)?;
                    format!("{}: {}", key, out)
                }
                ProjectionKind::Aggregate {
                    field,
                    filter,
                    selection,
                } => {
                    let out = self.relationship_aggregate(block, var, field, filter.as_ref(), selection)?;
                    format!("{}: {}", key, out)
                }
                ProjectionKind::Connection { field, connection } => {
                    let out = self.connection(block, var, field, connection)?;
                    format!("{}: {}", key, out)
                }
            };
            entries.push(entry);
        }
        Ok(braces(entries))
    }

    /// Request filter, READ filter rules and READ guards for one node
    fn narrow(
        &mut self,
        block: &mut Block,
        var: &str,
        node: &'m NodeType,
        filter: Option<&FilterArgs>,
        label: Option<Predicate>,
        items: &[ProjectionItem<'m>],
    ) -> TranslateResult<()> {
        let request = self.request_filter(var, node, filter)?;
        let rules = auth::filter_rules(self.ctx, var, node, AuthOperation::Read)?;
        Filter::new(label, Vec::new())
            .and(request)
            .and(rules)
            .apply_to(block);

        let validate = auth::validate_rules(
            self.ctx,
            var,
            node,
            AuthOperation::Read,
            AuthStage::Before,
            &field_rules(items),
        )?;
        auth::guard(block, validate, self.ctx.error_prefix());
        Ok(())
    }

    fn request_filter(
        &mut self,
        var: &str,
        node: &'m NodeType,
        filter: Option<&FilterArgs>,
    ) -> TranslateResult<Filter> {
        match filter.filter(|f| !f.is_empty()) {
            Some(map) => PredicateBuilder::new(self.ctx).build(var, FilterTarget::Node(node), map),
            None => Ok(Filter::default()),
        }
    }

    /// `ORDER BY`/`SKIP`/`LIMIT` under a `WITH`; rows are maps when `by_key`
    fn page(&mut self, block: &mut Block, with: &str, var: &str, selection: &NodeSelection<'m>, by_key: bool) {
        if !selection.is_paged() {
            return;
        }
        block.line(with);
        if !selection.sort.is_empty() {
            let keys: Vec<String> = selection
                .sort
                .iter()
                .map(|item| {
                    let expr = if by_key {
                        property(var, &item.key)
                    } else {
                        property(var, &item.property)
                    };
                    format!("{} {}", expr, if item.descending { "DESC" } else { "ASC" })
                })
                .collect();
            block.line(format!("ORDER BY {}", keys.join(", ")));
        }
        if let Some(offset) = selection.offset {
            let param = self.ctx.scope.param(json!(offset));
            block.line(format!("SKIP {}", param));
        }
        if let Some(limit) = selection.limit {
            let param = self.ctx.scope.param(json!(limit));
            block.line(format!("LIMIT {}", param));
        }
    }

    /// `MATCH` from `var` across `rel` to `node`; returns (relationship, node) variables
    fn match_related(
        &mut self,
        block: &mut Block,
        var: &str,
        rel: &RelationshipField,
        node: &NodeType,
    ) -> (String, String) {
        let rel_var = self.ctx.scope.node_var();
        let node_var = self.ctx.scope.node_var();
        let to = format!("{}{}", node_var, node.label_pattern());
        block.line(format!(
            "MATCH {}",
            rel.pattern(var, &rel_var, &to, rel.read_direction())
        ));
        (rel_var, node_var)
    }

    fn relationship(
        &mut self,
        block: &mut Block,
        var: &str,
        rel: &'m RelationshipField,
        nested: &NodeSelection<'m>,
    ) -> TranslateResult<String> {
        let many = rel.is_many();
        let mut body = Block::new();
        body.line(format!("WITH {}", var));

        if nested.branches.is_empty() {
            let out = self.ctx.scope.var();
            body.line(format!("RETURN {} AS {}", empty(many), out));
            block.call(body);
            return Ok(out);
        }

        if !nested.is_abstract {
            let branch = single(nested)?;
            let (_, node_var) = self.match_related(&mut body, var, rel, branch.node);
            self.narrow(&mut body, &node_var, branch.node, branch.filter.as_ref(), None, &branch.projection)?;
            self.page(&mut body, "WITH *", &node_var, nested, false);
            let map = self.projection(&mut body, &node_var, branch.node, &branch.projection)?;
            let out = self.ctx.scope.var();
            body.line(format!(
                "RETURN {} AS {}",
                collect(many, &format!("{} {}", node_var, map)),
                out
            ));
            block.call(body);
            return Ok(out);
        }

        let row = self.ctx.scope.var();
        let mut branches = Vec::with_capacity(nested.branches.len());
        for branch in &nested.branches {
            let mut inner = Block::new();
            inner.line(format!("WITH {}", var));
            let (_, node_var) = self.match_related(&mut inner, var, rel, branch.node);
            self.narrow(&mut inner, &node_var, branch.node, branch.filter.as_ref(), None, &branch.projection)?;
            let map = self.projection(&mut inner, &node_var, branch.node, &branch.projection)?;
            inner.line(format!("RETURN {} {} AS {}", node_var, map, row));
            branches.push(inner);
        }
        trace!(field = %rel.name, branches = branches.len(), "relationship fan-out");
        let mut union = Block::new();
        union.union(branches);
        body.call(union);
        self.page(&mut body, &format!("WITH {}", row), &row, nested, true);
        let out = self.ctx.scope.var();
        body.line(format!("RETURN {} AS {}", collect(many, &row), out));
        block.call(body);
        Ok(out)
    }

    /// Node-typed computed field: the statement's rows are rebound and
    /// narrowed like any other node position
    fn computed_nodes(
        &mut self,
        block: &mut Block,
        var: &str,
        field: &'m ComputedField,
        nested: &NodeSelection<'m>,
    ) -> TranslateResult<String> {
        let many = field.is_list();
        let bound = self.ctx.scope.var();
        let mut body = computed::open(var, field, &bound);

        if !nested.is_abstract {
            let branch = single(nested)?;
            self.narrow(&mut body, &bound, branch.node, None, None, &branch.projection)?;
            let map = self.projection(&mut body, &bound, branch.node, &branch.projection)?;
            let out = self.ctx.scope.var();
            body.line(format!(
                "RETURN {} AS {}",
                collect(many, &format!("{} {}", bound, map)),
                out
            ));
            block.call(body);
            return Ok(out);
        }

        let row = self.ctx.scope.var();
        let mut branches = Vec::with_capacity(nested.branches.len());
        for branch in &nested.branches {
            let node_var = self.ctx.scope.node_var();
            let mut inner = Block::new();
            inner.line(format!("WITH {}", bound));
            inner.line(format!("WITH {} AS {}", bound, node_var));
            let label = Predicate::leaf(format!("{}{}", node_var, branch.node.label_pattern()));
            self.narrow(&mut inner, &node_var, branch.node, None, Some(label), &branch.projection)?;
            let map = self.projection(&mut inner, &node_var, branch.node, &branch.projection)?;
            inner.line(format!("RETURN {} {} AS {}", node_var, map, row));
            branches.push(inner);
        }
        let out = self.ctx.scope.var();
        if branches.is_empty() {
            body.line(format!("RETURN {} AS {}", empty(many), out));
        } else {
            let mut union = Block::new();
            union.union(branches);
            body.call(union);
            body.line(format!("RETURN {} AS {}", collect(many, &row), out));
        }
        block.call(body);
        Ok(out)
    }

    fn relationship_aggregate(
        &mut self,
        block: &mut Block,
        var: &str,
        rel: &'m RelationshipField,
        filter: Option<&FilterArgs>,
        selection: &AggregateSelection<'m>,
    ) -> TranslateResult<String> {
        let model = self.ctx.model;
        let related = RelatedTarget::resolve(model, rel)?;
        let mut body = Block::new();
        body.line(format!("WITH {}", var));
        let rel_var = self.ctx.scope.node_var();
        let node_var = self.ctx.scope.node_var();
        let to = format!("{}{}", node_var, related.label());
        body.line(format!(
            "MATCH {}",
            rel.pattern(var, &rel_var, &to, rel.read_direction())
        ));

        let mut narrowed = match filter.filter(|f| !f.is_empty()) {
            Some(map) => PredicateBuilder::new(self.ctx).build_related(&node_var, related, map)?,
            None => Filter::default(),
        };
        let validate = match related {
            RelatedTarget::Node(node) => {
                narrowed = narrowed.and(auth::filter_rules(self.ctx, &node_var, node, AuthOperation::Aggregate)?);
                auth::validate_rules(
                    self.ctx,
                    &node_var,
                    node,
                    AuthOperation::Aggregate,
                    AuthStage::Before,
                    &[],
                )?
            }
            RelatedTarget::Interface(_) | RelatedTarget::Union(_) => {
                let nodes = model.concrete_types(related.name());
                narrowed = narrowed.and(self.per_type_rules(&node_var, &nodes, true, |ctx, var, node| {
                    auth::filter_rules(ctx, var, node, AuthOperation::Aggregate)
                })?);
                self.per_type_rules(&node_var, &nodes, false, |ctx, var, node| {
                    auth::validate_rules(ctx, var, node, AuthOperation::Aggregate, AuthStage::Before, &[])
                })?
            }
        };
        narrowed.apply_to(&mut body);
        auth::guard(&mut body, validate, self.ctx.error_prefix());

        let map = self.aggregate_map(selection, &node_var, Some(&rel_var));
        let out = self.ctx.scope.var();
        body.line(format!("RETURN {} AS {}", map, out));
        block.call(body);
        Ok(out)
    }

    /// Rules for an abstract position: each concrete type's rules apply
    /// only to nodes carrying its labels. With `restrict`, nodes of no
    /// known type are excluded too.
    fn per_type_rules<F>(
        &mut self,
        var: &str,
        nodes: &[&'m NodeType],
        restrict: bool,
        mut rules: F,
    ) -> TranslateResult<Filter>
    where
        F: FnMut(&mut TranslationContext<'m>, &str, &'m NodeType) -> TranslateResult<Filter>,
    {
        let mut preamble = Vec::new();
        let mut alternatives = Vec::with_capacity(nodes.len());
        let mut any = restrict;
        for &node in nodes {
            let filter = rules(&mut *self.ctx, var, node)?;
            any |= filter.predicate.is_some();
            preamble.extend(filter.preamble);
            alternatives.push(Predicate::and([
                Some(Predicate::leaf(format!("{}{}", var, node.label_pattern()))),
                filter.predicate,
            ]));
        }
        let predicate = if any { Predicate::or(alternatives) } else { None };
        Ok(Filter::new(predicate, preamble))
    }

    fn connection(
        &mut self,
        block: &mut Block,
        var: &str,
        rel: &'m RelationshipField,
        connection: &ConnectionSelection<'m>,
    ) -> TranslateResult<String> {
        let model = self.ctx.model;
        let related = RelatedTarget::resolve(model, rel)?;
        let node_selection = connection.edges.as_ref().and_then(|e| e.node.as_ref());
        let unselected: &[ProjectionItem<'m>] = &[];
        let targets: Vec<(&'m NodeType, &[ProjectionItem<'m>])> = match node_selection {
            Some((_, selection)) => selection
                .branches
                .iter()
                .map(|b| (b.node, b.projection.as_slice()))
                .collect(),
            None => model
                .concrete_types(&rel.target)
                .into_iter()
                .map(|n| (n, unselected))
                .collect(),
        };

        let edge = self.ctx.scope.var();
        let mut branches = Vec::with_capacity(targets.len());
        for (node, items) in targets {
            let mut inner = Block::new();
            inner.line(format!("WITH {}", var));
            let (rel_var, node_var) = self.match_related(&mut inner, var, rel, node);

            let request = match connection.filter.as_ref().filter(|f| !f.is_empty()) {
                Some(map) => PredicateBuilder::new(self.ctx)
                    .build_connection(&rel_var, &node_var, rel, related, map)?,
                None => Filter::default(),
            };
            let rules = auth::filter_rules(self.ctx, &node_var, node, AuthOperation::Read)?;
            request.and(rules).apply_to(&mut inner);
            let validate = auth::validate_rules(
                self.ctx,
                &node_var,
                node,
                AuthOperation::Read,
                AuthStage::Before,
                &field_rules(items),
            )?;
            auth::guard(&mut inner, validate, self.ctx.error_prefix());

            let mut parts = Vec::new();
            if let Some(edges) = &connection.edges {
                if let Some((key, attributes)) = &edges.properties {
                    let entries = attributes
                        .iter()
                        .map(|(k, attr)| attribute_entry(&rel_var, k, attr))
                        .collect();
                    parts.push(format!("{}: {} {}", escape_name(key), rel_var, braces(entries)));
                }
                if let Some((key, _)) = &edges.node {
                    let map = self.projection(&mut inner, &node_var, node, items)?;
                    parts.push(format!("{}: {} {}", escape_name(key), node_var, map));
                }
            }
            inner.line(format!("RETURN {} AS {}", braces(parts), edge));
            branches.push(inner);
        }

        let mut body = Block::new();
        body.line(format!("WITH {}", var));
        if branches.is_empty() {
            body.line(format!("UNWIND [] AS {}", edge));
        } else {
            let mut union = Block::new();
            union.union(branches);
            body.call(union);
        }
        if !connection.sort.is_empty() {
            let keys: Vec<String> = connection
                .sort
                .iter()
                .map(|s| {
                    let path: Vec<String> = s.path.iter().map(|p| escape_name(p)).collect();
                    format!(
                        "{}.{} {}",
                        edge,
                        path.join("."),
                        if s.descending { "DESC" } else { "ASC" }
                    )
                })
                .collect();
            body.line(format!("WITH {}", edge));
            body.line(format!("ORDER BY {}", keys.join(", ")));
        }
        let edges_var = self.ctx.scope.var();
        body.line(format!("WITH collect({}) AS {}", edge, edges_var));

        let mut entries = Vec::new();
        if let Some(edges) = &connection.edges {
            let page = match connection.first {
                Some(first) => {
                    let param = self.ctx.scope.param(json!(first));
                    format!("{}[0..{}]", edges_var, param)
                }
                None => edges_var.clone(),
            };
            entries.push(format!("{}: {}", escape_name(&edges.key), page));
        }
        if let Some(key) = &connection.total_count {
            entries.push(format!("{}: size({})", escape_name(key), edges_var));
        }
        let out = self.ctx.scope.var();
        body.line(format!("RETURN {} AS {}", braces(entries), out));
        block.call(body);
        Ok(out)
    }

    /// `{ count: ..., node: { attr: { min: ... } }, edge: { ... } }`
    fn aggregate_map(&mut self, selection: &AggregateSelection<'m>, node_var: &str, rel_var: Option<&str>) -> String {
        let mut entries = Vec::new();
        if let Some(key) = &selection.count {
            entries.push(format!("{}: count({})", escape_name(key), node_var));
        }
        if let Some(group) = &selection.node {
            self.group_entries(&mut entries, group, node_var);
        }
        if let (Some(group), Some(rel_var)) = (&selection.edge, rel_var) {
            self.group_entries(&mut entries, group, rel_var);
        }
        braces(entries)
    }

    fn group_entries(&mut self, entries: &mut Vec<String>, group: &AggregateGroup<'m>, var: &str) {
        let mut attributes = Vec::with_capacity(group.attributes.len());
        for aggregate in &group.attributes {
            let expr = property(var, &aggregate.attribute.db_name);
            let outputs = aggregate
                .outputs
                .iter()
                .map(|(key, output)| format!("{}: {}", escape_name(key), self.aggregate_expr(*output, &expr)))
                .collect();
            attributes.push(format!("{}: {}", escape_name(&aggregate.key), braces(outputs)));
        }
        match &group.key {
            Some(key) => entries.push(format!("{}: {}", escape_name(key), braces(attributes))),
            None => entries.extend(attributes),
        }
    }

    fn aggregate_expr(&mut self, output: AggregateOutput, expr: &str) -> String {
        let pick = match output {
            AggregateOutput::Min => return format!("min({})", expr),
            AggregateOutput::Max => return format!("max({})", expr),
            AggregateOutput::Average => return format!("avg({})", expr),
            AggregateOutput::Sum => return format!("sum({})", expr),
            AggregateOutput::Shortest => "<",
            AggregateOutput::Longest => ">",
        };
        let acc = self.ctx.scope.var();
        let item = self.ctx.scope.var();
        format!(
            "reduce({acc} = null, {item} IN collect({expr}) | CASE WHEN {acc} IS NULL OR size({item}) {pick} size({acc}) THEN {item} ELSE {acc} END)"
        )
    }
}

fn single<'a, 'm>(selection: &'a NodeSelection<'m>) -> TranslateResult<&'a Branch<'m>> {
    selection.branches.first().ok_or_else(|| TranslateError::UnknownField {
        type_name: "<root>".to_string(),
        field: selection.type_name.to_string(),
    })
}

/// Selected fields carrying their own authorization
pub(crate) fn field_rules<'m>(items: &[ProjectionItem<'m>]) -> Vec<&'m AnnotationSet> {
    items
        .iter()
        .filter_map(ProjectionItem::annotations)
        .filter(|set| set.authorization().is_some())
        .collect()
}

/// `.title` when key and stored name agree, `key: var.prop` otherwise
pub(crate) fn attribute_entry(var: &str, key: &str, attr: &Attribute) -> String {
    if key == attr.name && attr.db_name == attr.name {
        format!(".{}", escape_name(key))
    } else {
        format!("{}: {}", escape_name(key), property(var, &attr.db_name))
    }
}

pub(crate) fn braces(entries: Vec<String>) -> String {
    if entries.is_empty() {
        "{}".to_string()
    } else {
        format!("{{ {} }}", entries.join(", "))
    }
}

fn collect(many: bool, expr: &str) -> String {
    if many {
        format!("collect({})", expr)
    } else {
        format!("head(collect({}))", expr)
    }
}

fn empty(many: bool) -> &'static str {
    if many {
        "[]"
    } else {
        "null"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::AuthContext;
    use crate::plan::{OperationPlanner, PlannedRoot};
    use crate::request::{Field, OperationKind, OperationRequest, SelectionSet};
    use crate::schema::{RawAnnotation, SchemaDeclarations, SchemaModel, TypeDeclaration};
    use graphloom_config::TranslatorConfig;
    use serde_json::Value;

    fn rel(rel_type: &str, direction: &str) -> Vec<RawAnnotation> {
        vec![RawAnnotation::new("relationship")
            .with_argument("type", json!(rel_type))
            .with_argument("direction", json!(direction))]
    }

    fn authorization(arguments: Value) -> RawAnnotation {
        let mut raw = RawAnnotation::new("authorization");
        if let Value::Object(map) = arguments {
            raw.arguments = map;
        }
        raw
    }

    fn model() -> SchemaModel {
        let mut decls = SchemaDeclarations::default();
        decls.interfaces.push(TypeDeclaration::new("Production").field("title", "String!"));
        decls.nodes.push(
            TypeDeclaration::new("Movie")
                .implements("Production")
                .field("title", "String!")
                .field("released", "Int")
                .annotated_field("actors", "[Actor!]!", rel("ACTED_IN", "IN")),
        );
        decls.nodes.push(
            TypeDeclaration::new("Series")
                .implements("Production")
                .field("title", "String!"),
        );
        decls.nodes.push(
            TypeDeclaration::new("Actor")
                .field("name", "String!")
                .annotation(authorization(json!({
                    "validate": [{ "where": { "jwt": { "roles_INCLUDES": "casting" } } }]
                }))),
        );
        SchemaModel::build(&decls).unwrap()
    }

    fn emit(model: &SchemaModel, request: OperationRequest) -> TranslateResult<String> {
        let config = TranslatorConfig::default();
        let auth = AuthContext::with_claims(Default::default());
        let tree = OperationPlanner::new(model, &config).plan(&request)?;
        let mut ctx = TranslationContext::new(model, &config, &auth);
        let mut emitter = ReadEmitter::new(&mut ctx);
        let block = match &tree.root {
            PlannedRoot::Read(selection) => emitter.root(selection)?,
            PlannedRoot::Aggregate {
                node,
                filter,
                selection,
            } => emitter.root_aggregate(node, filter.as_ref(), selection)?,
        };
        Ok(block.render(4))
    }

    // ===== Root reads =====

    #[test]
    fn test_concrete_root_with_filter() {
        let model = model();
        let request = OperationRequest::new(OperationKind::Read, "Movie")
            .with_selection(SelectionSet::of(["title"]))
            .with_where(json!({ "title": "The Matrix" }));
        assert_eq!(
            emit(&model, request).unwrap(),
            "MATCH (this:Movie)\nWHERE this.title = $param0\nRETURN this { .title } AS this"
        );
    }

    #[test]
    fn test_abstract_root_sorted_after_union() {
        let model = model();
        let mut request = OperationRequest::new(OperationKind::Read, "Production")
            .with_selection(SelectionSet::of(["title"]));
        request.arguments.sort = vec![json!({ "title": "DESC" }).as_object().unwrap().clone()];
        request.arguments.limit = Some(5);

        assert_eq!(
            emit(&model, request).unwrap(),
            "CALL {\n    MATCH (this0:Movie)\n    RETURN this0 { .title, __typename: \"Movie\" } AS this\n    UNION\n    MATCH (this1:Series)\n    RETURN this1 { .title, __typename: \"Series\" } AS this\n}\nWITH *\nORDER BY this.title DESC\nLIMIT $param0\nRETURN this AS this"
        );
    }

    // ===== Nested positions =====

    #[test]
    fn test_nested_relationship_guard_runs_inside_call() {
        let model = model();
        let selection = SelectionSet::of(["title"])
            .field(Field::new("actors").select(SelectionSet::of(["name"])));
        let request = OperationRequest::new(OperationKind::Read, "Movie").with_selection(selection);

        assert_eq!(
            emit(&model, request).unwrap(),
            "MATCH (this:Movie)\nCALL {\n    WITH this\n    MATCH (this)<-[this0:ACTED_IN]-(this1:Actor)\n    WITH *\n    CALL apoc.util.validate(NOT (coalesce($isAuthenticated = true AND $jwt.roles IS NOT NULL AND $param0 IN $jwt.roles, false)), \"@graphloom/FORBIDDEN\", [0])\n    RETURN collect(this1 { .name }) AS var2\n}\nRETURN this { .title, actors: var2 } AS this"
        );
    }

    #[test]
    fn test_connection_pages_collected_edges() {
        let model = model();
        let mut connection = Field::new("actorsConnection").select(
            SelectionSet::of(["totalCount"]).field(
                Field::new("edges")
                    .select(SelectionSet::default().field(Field::new("node").select(SelectionSet::of(["name"])))),
            ),
        );
        connection.arguments.first = Some(2);
        let request = OperationRequest::new(OperationKind::Read, "Movie")
            .with_selection(SelectionSet::default().field(connection));

        let text = emit(&model, request).unwrap();
        assert!(text.contains("RETURN { node: this2 { .name } } AS var0"), "{}", text);
        assert!(text.contains("WITH collect(var0) AS var3"), "{}", text);
        assert!(text.contains("RETURN { edges: var3[0..$param1], totalCount: size(var3) } AS var4"), "{}", text);
        assert!(text.ends_with("RETURN this { actorsConnection: var4 } AS this"));
    }

    #[test]
    fn test_relationship_aggregate_count() {
        let model = model();
        let request = OperationRequest::new(OperationKind::Read, "Movie").with_selection(
            SelectionSet::default().field(Field::new("actorsAggregate").select(SelectionSet::of(["count"]))),
        );
        let text = emit(&model, request).unwrap();
        assert!(text.contains("MATCH (this)<-[this0:ACTED_IN]-(this1:Actor)"));
        assert!(text.contains("RETURN { count: count(this1) } AS var2"));
    }

    // ===== Aggregates =====

    #[test]
    fn test_root_aggregate_string_lengths() {
        let model = model();
        let selection = SelectionSet::of(["count"])
            .field(Field::new("title").select(SelectionSet::of(["shortest"])));
        let request = OperationRequest::new(OperationKind::Aggregate, "Movie").with_selection(selection);

        assert_eq!(
            emit(&model, request).unwrap(),
            "MATCH (this:Movie)\nRETURN { count: count(this), title: { shortest: reduce(var0 = null, var1 IN collect(this.title) | CASE WHEN var0 IS NULL OR size(var1) < size(var0) THEN var1 ELSE var0 END) } } AS this"
        );
    }

    #[test]
    fn test_root_aggregate_requires_node_type() {
        let model = model();
        let request = OperationRequest::new(OperationKind::Aggregate, "Production");
        assert!(matches!(
            emit(&model, request),
            Err(TranslateError::InvalidInput { .. })
        ));
    }
}
