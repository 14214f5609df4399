//! Write emission.
//!
//! Every nested step runs in its own unit `CALL` importing the node it
//! hangs off, so a step that matches nothing never removes rows from the
//! enclosing level. A level's steps come before its cardinality checks,
//! and the checks before its AFTER guards.

use super::read::{self, ReadEmitter};
use super::{Block, REQUIRED_CODE, ROOT_VAR, SINGLE_CODE};
use crate::annotation::{AnnotationSet, AuthOperation, AuthStage, SubscriptionEvent};
use crate::auth;
use crate::context::TranslationContext;
use crate::error::{TranslateError, TranslateResult};
use crate::mutation::{
    ConnectStep, DeleteBranch, DeleteStep, DisconnectStep, MutationPlan, MutationRoot, NodeCreate,
    NodeUpdate, PropertyWrite, RelatedMatch, SetValue, Step, UpdateBranch,
};
use crate::plan::ProjectionItem;
use crate::predicate::{property, value, Filter, FilterTarget, Predicate, PredicateBuilder, RelatedTarget};
use crate::request::FilterArgs;
use crate::annotation::Direction;
use crate::schema::{escape_name, Attribute, Cardinality, NodeType, RelationshipField};
use crate::subscription::{publishes, EventDescriptor, RelationshipEvent};
use serde_json::json;
use tracing::trace;

/// The node a nested step hangs off
#[derive(Clone, Copy)]
struct Parent<'a, 'm> {
    var: &'a str,
    node: &'m NodeType,
}

/// A new edge from the parent, with its properties
#[derive(Clone, Copy)]
struct Link<'a, 'm> {
    parent: Parent<'a, 'm>,
    field: &'m RelationshipField,
    edge: &'a [PropertyWrite<'m>],
}

/// Emits write clauses for planned mutations, collecting the events
/// they publish
pub(crate) struct WriteEmitter<'c, 'm> {
    ctx: &'c mut TranslationContext<'m>,
    events: Vec<EventDescriptor>,
}

impl<'c, 'm> WriteEmitter<'c, 'm> {
    pub fn new(ctx: &'c mut TranslationContext<'m>) -> Self {
        Self {
            ctx,
            events: Vec::new(),
        }
    }

    pub fn into_events(self) -> Vec<EventDescriptor> {
        self.events
    }

    pub fn root(&mut self, plan: &MutationPlan<'m>) -> TranslateResult<Block> {
        match &plan.root {
            MutationRoot::Create {
                node,
                inputs,
                projection,
            } => self.create(*node, inputs, projection),
            MutationRoot::Update {
                is_abstract,
                branches,
                ..
            } => self.update(*is_abstract, branches),
            MutationRoot::Delete {
                is_abstract,
                branches,
                ..
            } => self.delete(*is_abstract, branches),
        }
    }

    // ===== roots =====

    fn create(
        &mut self,
        node: &'m NodeType,
        inputs: &[NodeCreate<'m>],
        projection: &[ProjectionItem<'m>],
    ) -> TranslateResult<Block> {
        auth::ensure_authenticated(self.ctx, node, AuthOperation::Create, AuthStage::After, &[])?;

        let mut block = Block::new();
        let mut created = Vec::with_capacity(inputs.len());
        for input in inputs {
            let var = self.ctx.scope.node_var();
            let mut body = Block::new();
            self.node_create(&mut body, &var, input, None)?;
            body.line(format!("RETURN {}", var));
            block.call(body);
            created.push(var);
        }
        if created.is_empty() {
            block.line("RETURN [] AS data");
            return Ok(block);
        }

        let mut maps = Vec::with_capacity(created.len());
        for var in &created {
            let map = self.output(&mut block, var, node, projection)?;
            maps.push(format!("{} {}", var, map));
        }
        block.line(format!("RETURN [{}] AS data", maps.join(", ")));
        trace!(type_name = %node.name, nodes = created.len(), "emitted create");
        Ok(block)
    }

    fn update(&mut self, is_abstract: bool, branches: &[UpdateBranch<'m>]) -> TranslateResult<Block> {
        for branch in branches {
            let fields = written_fields(&branch.update.properties);
            auth::ensure_authenticated(self.ctx, branch.node, AuthOperation::Update, AuthStage::Before, &fields)?;
        }

        let mut block = Block::new();
        if !is_abstract {
            let branch = single(branches)?;
            block.line(format!("MATCH ({}{})", ROOT_VAR, branch.node.label_pattern()));
            let map = self.update_branch(&mut block, ROOT_VAR, branch)?;
            block.line(format!("RETURN collect(DISTINCT {} {}) AS data", ROOT_VAR, map));
            return Ok(block);
        }

        if branches.is_empty() {
            block.line(format!("UNWIND [] AS {}", ROOT_VAR));
        } else {
            let mut bodies = Vec::with_capacity(branches.len());
            for branch in branches {
                let var = self.ctx.scope.node_var();
                let mut body = Block::new();
                body.line(format!("MATCH ({}{})", var, branch.node.label_pattern()));
                let map = self.update_branch(&mut body, &var, branch)?;
                body.line(format!("RETURN {} {} AS {}", var, map, ROOT_VAR));
                bodies.push(body);
            }
            let mut union = Block::new();
            union.union(bodies);
            block.call(union);
        }
        block.line(format!("RETURN collect(DISTINCT {}) AS data", ROOT_VAR));
        Ok(block)
    }

    fn update_branch(&mut self, block: &mut Block, var: &str, branch: &UpdateBranch<'m>) -> TranslateResult<String> {
        let node = branch.node;
        let request = self.request_filter(var, node, branch.filter.as_ref())?;
        let rules = auth::filter_rules(self.ctx, var, node, AuthOperation::Update)?;
        request.and(rules).apply_to(block);
        self.apply_update(block, Parent { var, node }, &branch.update, None)?;
        self.output(block, var, node, &branch.projection)
    }

    fn delete(&mut self, is_abstract: bool, branches: &[DeleteBranch<'m>]) -> TranslateResult<Block> {
        for branch in branches {
            auth::ensure_authenticated(self.ctx, branch.node, AuthOperation::Delete, AuthStage::Before, &[])?;
        }

        let mut block = Block::new();
        if !is_abstract {
            let branch = single(branches)?;
            block.line(format!("MATCH ({}{})", ROOT_VAR, branch.node.label_pattern()));
            self.delete_branch(&mut block, ROOT_VAR, branch)?;
            return Ok(block);
        }
        for branch in branches {
            let var = self.ctx.scope.node_var();
            let mut body = Block::new();
            body.line(format!("MATCH ({}{})", var, branch.node.label_pattern()));
            self.delete_branch(&mut body, &var, branch)?;
            block.call(body);
        }
        Ok(block)
    }

    fn delete_branch(&mut self, block: &mut Block, var: &str, branch: &DeleteBranch<'m>) -> TranslateResult<()> {
        let node = branch.node;
        let request = self.request_filter(var, node, branch.filter.as_ref())?;
        let rules = auth::filter_rules(self.ctx, var, node, AuthOperation::Delete)?;
        request.and(rules).apply_to(block);
        let validate = auth::validate_rules(self.ctx, var, node, AuthOperation::Delete, AuthStage::Before, &[])?;
        auth::guard(block, validate, self.ctx.error_prefix());
        for step in &branch.cascade {
            self.delete_step(block, var, step)?;
        }
        self.detach_delete(block, var, node);
        Ok(())
    }

    // ===== node levels =====

    /// `CREATE` a node, link it to its parent, then run its own steps
    fn node_create(
        &mut self,
        block: &mut Block,
        var: &str,
        create: &NodeCreate<'m>,
        link: Option<Link<'_, 'm>>,
    ) -> TranslateResult<()> {
        let node = create.node;
        block.line(format!("CREATE ({}{})", var, node.label_pattern()));
        self.set(block, "SET", var, &create.properties);
        if let Some(link) = link {
            let rel_var = self.ctx.scope.node_var();
            block.line(format!(
                "CREATE {}",
                link.field.pattern(link.parent.var, &rel_var, var, write_direction(link.field))
            ));
            self.set(block, "SET", &rel_var, link.edge);
            self.relationship_event(SubscriptionEvent::RelationshipCreated, link, node, var, &rel_var);
        }

        let parent = Parent { var, node };
        self.steps(block, parent, &create.steps)?;
        self.checks(block, var, &create.checks)?;
        let fields = written_fields(&create.properties);
        let validate = auth::validate_rules(self.ctx, var, node, AuthOperation::Create, AuthStage::After, &fields)?;
        auth::guard(block, validate, self.ctx.error_prefix());
        self.node_event(SubscriptionEvent::Created, node, None, Some(var));
        Ok(())
    }

    /// Guards, `SET`s and steps for a node that is already matched and
    /// narrowed; `edge` is the relationship variable and its writes
    fn apply_update(
        &mut self,
        block: &mut Block,
        target: Parent<'_, 'm>,
        update: &NodeUpdate<'m>,
        edge: Option<(&str, &[PropertyWrite<'m>])>,
    ) -> TranslateResult<()> {
        let Parent { var, node } = target;
        let fields = written_fields(&update.properties);
        let before = auth::validate_rules(self.ctx, var, node, AuthOperation::Update, AuthStage::Before, &fields)?;
        auth::guard(block, before, self.ctx.error_prefix());

        let snapshot = self.snapshot(block, var, node, SubscriptionEvent::Updated);
        self.set(block, "SET", var, &update.properties);
        if let Some((rel_var, writes)) = edge {
            self.set(block, "SET", rel_var, writes);
        }
        self.steps(block, target, &update.steps)?;
        self.checks(block, var, &update.checks)?;

        let after = auth::validate_rules(self.ctx, var, node, AuthOperation::Update, AuthStage::After, &fields)?;
        auth::guard(block, after, self.ctx.error_prefix());
        if snapshot.is_some() {
            self.node_event(SubscriptionEvent::Updated, node, snapshot, Some(var));
        }
        Ok(())
    }

    fn steps(&mut self, block: &mut Block, parent: Parent<'_, 'm>, steps: &[Step<'m>]) -> TranslateResult<()> {
        for step in steps {
            match step {
                Step::Update { matched, node, edge } => self.update_step(block, parent, matched, node, edge)?,
                Step::Create { field, node, edge } => {
                    let var = self.ctx.scope.node_var();
                    let mut body = Block::new();
                    body.line(format!("WITH {}", parent.var));
                    let link = Link {
                        parent,
                        field: *field,
                        edge,
                    };
                    self.node_create(&mut body, &var, node, Some(link))?;
                    block.call(body);
                }
                Step::Connect(connect) => self.connect(block, parent, connect)?,
                Step::ConnectOrCreate {
                    field,
                    target,
                    key,
                    on_create,
                    edge,
                } => {
                    let link = Link {
                        parent,
                        field: *field,
                        edge,
                    };
                    self.connect_or_create(block, link, *target, key, on_create)?;
                }
                Step::Disconnect(disconnect) => self.disconnect(block, parent, disconnect)?,
                Step::Delete(delete) => self.delete_step(block, parent.var, delete)?,
            }
        }
        Ok(())
    }

    // ===== steps =====

    fn update_step(
        &mut self,
        block: &mut Block,
        parent: Parent<'_, 'm>,
        matched: &RelatedMatch<'m>,
        update: &NodeUpdate<'m>,
        edge: &[PropertyWrite<'m>],
    ) -> TranslateResult<()> {
        let mut body = Block::new();
        body.line(format!("WITH {}", parent.var));
        let (rel_var, node_var) = self.match_related(&mut body, parent.var, matched);
        self.matched_filter(&rel_var, &node_var, matched, AuthOperation::Update)?
            .apply_to(&mut body);
        let target = Parent {
            var: &node_var,
            node: matched.target,
        };
        self.apply_update(&mut body, target, update, Some((rel_var.as_str(), edge)))?;
        block.call(body);
        Ok(())
    }

    fn connect(&mut self, block: &mut Block, parent: Parent<'_, 'm>, step: &ConnectStep<'m>) -> TranslateResult<()> {
        let target = step.target;
        let var = self.ctx.scope.node_var();
        let mut body = Block::new();
        body.line(format!("WITH {}", parent.var));
        body.line(format!("MATCH ({}{})", var, target.label_pattern()));
        let request = self.request_filter(&var, target, step.node_filter.as_ref())?;
        let rules = auth::filter_rules(self.ctx, &var, target, AuthOperation::CreateRelationship)?;
        request.and(rules).apply_to(&mut body);
        self.relationship_guards(&mut body, parent, step.field, &var, target, AuthOperation::CreateRelationship)?;

        let rel_var = self.ctx.scope.node_var();
        body.line(format!(
            "MERGE {}",
            step.field.pattern(parent.var, &rel_var, &var, write_direction(step.field))
        ));
        self.set(&mut body, "SET", &rel_var, &step.edge);
        let link = Link {
            parent,
            field: step.field,
            edge: &step.edge,
        };
        self.relationship_event(SubscriptionEvent::RelationshipCreated, link, target, &var, &rel_var);

        let connected = Parent { var: &var, node: target };
        for nested in &step.nested {
            self.connect(&mut body, connected, nested)?;
        }
        block.call(body);
        Ok(())
    }

    fn connect_or_create(
        &mut self,
        block: &mut Block,
        link: Link<'_, 'm>,
        target: &'m NodeType,
        key: &[(&'m Attribute, serde_json::Value)],
        on_create: &[PropertyWrite<'m>],
    ) -> TranslateResult<()> {
        let parent = link.parent;
        let var = self.ctx.scope.node_var();
        let mut body = Block::new();
        body.line(format!("WITH {}", parent.var));
        let mut entries = Vec::with_capacity(key.len());
        for (attr, literal) in key {
            let param = self.ctx.scope.param(literal.clone());
            entries.push(format!("{}: {}", escape_name(&attr.db_name), value::wrap(&attr.ty.kind, &param)));
        }
        body.line(format!(
            "MERGE ({}{} {})",
            var,
            target.label_pattern(),
            read::braces(entries)
        ));
        self.set(&mut body, "ON CREATE SET", &var, on_create);
        self.relationship_guards(&mut body, parent, link.field, &var, target, AuthOperation::CreateRelationship)?;

        let rel_var = self.ctx.scope.node_var();
        body.line(format!(
            "MERGE {}",
            link.field.pattern(parent.var, &rel_var, &var, write_direction(link.field))
        ));
        self.set(&mut body, "SET", &rel_var, link.edge);
        let fields = written_fields(on_create);
        let validate = auth::validate_rules(self.ctx, &var, target, AuthOperation::Create, AuthStage::After, &fields)?;
        auth::guard(&mut body, validate, self.ctx.error_prefix());
        self.relationship_event(SubscriptionEvent::RelationshipCreated, link, target, &var, &rel_var);
        block.call(body);
        Ok(())
    }

    fn disconnect(
        &mut self,
        block: &mut Block,
        parent: Parent<'_, 'm>,
        step: &DisconnectStep<'m>,
    ) -> TranslateResult<()> {
        let matched = &step.matched;
        let mut body = Block::new();
        body.line(format!("WITH {}", parent.var));
        let (rel_var, node_var) = self.match_related(&mut body, parent.var, matched);
        self.matched_filter(&rel_var, &node_var, matched, AuthOperation::DeleteRelationship)?
            .apply_to(&mut body);
        self.relationship_guards(
            &mut body,
            parent,
            matched.field,
            &node_var,
            matched.target,
            AuthOperation::DeleteRelationship,
        )?;

        let disconnected = Parent {
            var: &node_var,
            node: matched.target,
        };
        for nested in &step.nested {
            self.disconnect(&mut body, disconnected, nested)?;
        }
        body.line(format!("DELETE {}", rel_var));
        let link = Link {
            parent,
            field: matched.field,
            edge: &[],
        };
        self.relationship_event(SubscriptionEvent::RelationshipDeleted, link, matched.target, &node_var, &rel_var);
        block.call(body);
        Ok(())
    }

    /// Delete related nodes, their own cascades first
    fn delete_step(&mut self, block: &mut Block, parent_var: &str, step: &DeleteStep<'m>) -> TranslateResult<()> {
        let matched = &step.matched;
        let node = matched.target;
        let mut body = Block::new();
        body.line(format!("WITH {}", parent_var));
        let (rel_var, node_var) = self.match_related(&mut body, parent_var, matched);
        self.matched_filter(&rel_var, &node_var, matched, AuthOperation::Delete)?
            .apply_to(&mut body);
        let validate = auth::validate_rules(self.ctx, &node_var, node, AuthOperation::Delete, AuthStage::Before, &[])?;
        auth::guard(&mut body, validate, self.ctx.error_prefix());
        for nested in &step.nested {
            self.delete_step(&mut body, &node_var, nested)?;
        }
        self.detach_delete(&mut body, &node_var, node);
        block.call(body);
        Ok(())
    }

    // ===== shared pieces =====

    fn detach_delete(&mut self, block: &mut Block, var: &str, node: &'m NodeType) {
        let snapshot = self.snapshot(block, var, node, SubscriptionEvent::Deleted);
        block.line(format!("DETACH DELETE {}", var));
        if snapshot.is_some() {
            self.node_event(SubscriptionEvent::Deleted, node, snapshot, None);
        }
    }

    /// Copy of the node's properties taken before it changes, when an
    /// event needs one
    fn snapshot(&mut self, block: &mut Block, var: &str, node: &NodeType, event: SubscriptionEvent) -> Option<String> {
        if !publishes(self.ctx.config, node, event) {
            return None;
        }
        let before = self.ctx.scope.var();
        block.line(format!("WITH *, {} {{ .* }} AS {}", var, before));
        Some(before)
    }

    /// One-cardinality counts, checked once the level's steps have run
    fn checks(&mut self, block: &mut Block, var: &str, checks: &[&'m RelationshipField]) -> TranslateResult<()> {
        let model = self.ctx.model;
        let prefix = self.ctx.error_prefix();
        for field in checks {
            let label = RelatedTarget::resolve(model, field)?.label();
            let rel_var = self.ctx.scope.var();
            let count = self.ctx.scope.var();
            let mut body = Block::new();
            body.line(format!("WITH {}", var));
            body.line(format!(
                "MATCH {}",
                field.pattern(var, &rel_var, &label, field.direction)
            ));
            body.line(format!("RETURN count({}) AS {}", rel_var, count));
            block.call(body);

            let (condition, code, detail) = match field.cardinality {
                Cardinality::One { required: true } => ("= 1", REQUIRED_CODE, "required exactly once"),
                _ => ("<= 1", SINGLE_CODE, "must not hold more than one node"),
            };
            block.guard(
                &Predicate::leaf(format!("{} {}", count, condition)),
                &format!("{}/{}: {}.{} {}", prefix, code, field.owner, field.name, detail),
            );
        }
        Ok(())
    }

    /// READ guard and map projection for a node returned by a mutation
    fn output(
        &mut self,
        block: &mut Block,
        var: &str,
        node: &'m NodeType,
        projection: &[ProjectionItem<'m>],
    ) -> TranslateResult<String> {
        let fields = read::field_rules(projection);
        let validate = auth::validate_rules(self.ctx, var, node, AuthOperation::Read, AuthStage::Before, &fields)?;
        auth::guard(block, validate, self.ctx.error_prefix());
        ReadEmitter::new(self.ctx).projection(block, var, node, projection)
    }

    /// BEFORE guards on both ends of a relationship being changed
    fn relationship_guards(
        &mut self,
        block: &mut Block,
        parent: Parent<'_, 'm>,
        field: &'m RelationshipField,
        var: &str,
        target: &'m NodeType,
        operation: AuthOperation,
    ) -> TranslateResult<()> {
        let fields = field_sets(field);
        let from = auth::validate_rules(self.ctx, parent.var, parent.node, operation, AuthStage::Before, &fields)?;
        let to = auth::validate_rules(self.ctx, var, target, operation, AuthStage::Before, &[])?;
        let prefix = self.ctx.error_prefix();
        auth::guard(block, from, prefix);
        auth::guard(block, to, prefix);
        Ok(())
    }

    /// `MATCH` from the parent to a related node; returns (relationship, node) variables
    fn match_related(&mut self, block: &mut Block, parent_var: &str, matched: &RelatedMatch<'m>) -> (String, String) {
        let rel_var = self.ctx.scope.node_var();
        let node_var = self.ctx.scope.node_var();
        let to = format!("{}{}", node_var, matched.target.label_pattern());
        block.line(format!(
            "MATCH {}",
            matched.field.pattern(parent_var, &rel_var, &to, matched.field.direction)
        ));
        (rel_var, node_var)
    }

    /// Request node and edge filters plus the filter rules for `operation`
    fn matched_filter(
        &mut self,
        rel_var: &str,
        node_var: &str,
        matched: &RelatedMatch<'m>,
        operation: AuthOperation,
    ) -> TranslateResult<Filter> {
        let model = self.ctx.model;
        let mut filter = self.request_filter(node_var, matched.target, matched.node_filter.as_ref())?;
        if let Some(edge) = matched.edge_filter.as_ref().filter(|f| !f.is_empty()) {
            let field = matched.field;
            let properties = field
                .properties
                .as_deref()
                .and_then(|name| model.properties(name))
                .ok_or_else(|| TranslateError::filter(&field.owner, &field.name, "relationship has no properties"))?;
            let on_edge = PredicateBuilder::new(self.ctx).build(rel_var, FilterTarget::Edge(properties), edge)?;
            filter = filter.and(on_edge);
        }
        let rules = auth::filter_rules(self.ctx, node_var, matched.target, operation)?;
        Ok(filter.and(rules))
    }

    fn request_filter(&mut self, var: &str, node: &'m NodeType, filter: Option<&FilterArgs>) -> TranslateResult<Filter> {
        match filter.filter(|f| !f.is_empty()) {
            Some(map) => PredicateBuilder::new(self.ctx).build(var, FilterTarget::Node(node), map),
            None => Ok(Filter::default()),
        }
    }

    /// One `SET`-style line for all writes; nothing when there are none
    fn set(&mut self, block: &mut Block, keyword: &str, var: &str, writes: &[PropertyWrite<'m>]) {
        if writes.is_empty() {
            return;
        }
        let assignments: Vec<String> = writes.iter().map(|w| self.assignment(var, w)).collect();
        block.line(format!("{} {}", keyword, assignments.join(", ")));
    }

    fn assignment(&mut self, var: &str, write: &PropertyWrite<'m>) -> String {
        let attr = write.attribute;
        let target = property(var, &attr.db_name);
        let expr = match &write.value {
            SetValue::Value(literal) => {
                let param = self.ctx.scope.param(literal.clone());
                self.wrapped(attr, &param)
            }
            SetValue::Generated(expr) => expr.clone(),
            SetValue::Arithmetic(op, operand) => {
                let param = self.ctx.scope.param(operand.clone());
                format!("{} {} {}", target, op.symbol(), param)
            }
            SetValue::Push(items) => {
                let param = self.ctx.scope.param(items.clone());
                format!("{} + {}", target, self.wrapped(attr, &param))
            }
            SetValue::Pop(count) => {
                let param = self.ctx.scope.param(json!(count));
                format!("{}[0..size({}) - {}]", target, target, param)
            }
        };
        format!("{} = {}", target, expr)
    }

    fn wrapped(&mut self, attr: &Attribute, param: &str) -> String {
        if !attr.ty.list {
            return value::wrap(&attr.ty.kind, param);
        }
        if value::needs_wrap(&attr.ty.kind) {
            let item = self.ctx.scope.var();
            value::wrap_list(&attr.ty.kind, param, &item)
        } else {
            param.to_string()
        }
    }

    // ===== events =====

    fn node_event(&mut self, event: SubscriptionEvent, node: &NodeType, before: Option<String>, after: Option<&str>) {
        if !publishes(self.ctx.config, node, event) {
            return;
        }
        self.events.push(EventDescriptor {
            event,
            type_name: node.name.clone(),
            before,
            after: after.map(str::to_string),
            relationship: None,
        });
    }

    fn relationship_event(
        &mut self,
        event: SubscriptionEvent,
        link: Link<'_, 'm>,
        target: &NodeType,
        target_var: &str,
        rel_var: &str,
    ) {
        let parent = link.parent;
        if !publishes(self.ctx.config, parent.node, event) {
            return;
        }
        let forward = (parent.node.name.clone(), parent.var.to_string());
        let backward = (target.name.clone(), target_var.to_string());
        let ((from_type, from), (to_type, to)) = match link.field.direction {
            Direction::In => (backward, forward),
            Direction::Out | Direction::Undirected => (forward, backward),
        };
        self.events.push(EventDescriptor {
            event,
            type_name: parent.node.name.clone(),
            before: None,
            after: None,
            relationship: Some(RelationshipEvent {
                field: link.field.name.clone(),
                rel_type: link.field.rel_type.clone(),
                from_type,
                from,
                to_type,
                to,
                relationship: rel_var.to_string(),
            }),
        });
    }
}

/// `CREATE`/`MERGE` need a direction; undirected fields store outgoing
fn write_direction(field: &RelationshipField) -> Direction {
    match field.direction {
        Direction::Undirected => Direction::Out,
        other => other,
    }
}

fn written_fields<'m>(writes: &[PropertyWrite<'m>]) -> Vec<&'m AnnotationSet> {
    writes
        .iter()
        .map(|w| &w.attribute.annotations)
        .filter(|set| set.authorization().is_some())
        .collect()
}

fn field_sets(field: &RelationshipField) -> Vec<&AnnotationSet> {
    if field.annotations.authorization().is_some() {
        vec![&field.annotations]
    } else {
        Vec::new()
    }
}

fn single<'a, T>(branches: &'a [T]) -> TranslateResult<&'a T> {
    branches.first().ok_or_else(|| TranslateError::invalid_input("target", "no type to write"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::AuthContext;
    use crate::mutation::MutationPlanner;
    use crate::request::{OperationKind, OperationRequest, SelectionSet};
    use crate::schema::{RawAnnotation, SchemaDeclarations, SchemaModel, TypeDeclaration};
    use graphloom_config::TranslatorConfig;
    use serde_json::{Map, Value};

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
        decls.nodes.push(
            TypeDeclaration::new("Movie")
                .annotated_field("id", "ID!", vec![RawAnnotation::new("id")])
                .field("title", "String!")
                .field("views", "Int")
                .field("tags", "[String!]")
                .annotated_field("director", "Person!", rel("DIRECTED", "IN"))
                .annotated_field("actors", "[Person!]!", rel("ACTED_IN", "IN"))
                .annotation(authorization(json!({
                    "validate": [{ "operations": ["UPDATE"], "when": ["BEFORE"], "where": { "jwt": { "roles_INCLUDES": "editor" } } }]
                }))),
        );
        decls.nodes.push(
            TypeDeclaration::new("Person")
                .field("name", "String!")
                .annotation(RawAnnotation::new("subscription").with_argument("events", json!(["DELETED"]))),
        );
        SchemaModel::build(&decls).unwrap()
    }

    struct Emitted {
        text: String,
        params: Map<String, Value>,
        events: Vec<EventDescriptor>,
    }

    fn emit(model: &SchemaModel, request: OperationRequest, auth: AuthContext) -> TranslateResult<Emitted> {
        let config = TranslatorConfig::default();
        let plan = MutationPlanner::new(model, &config).plan(&request)?;
        let mut ctx = TranslationContext::new(model, &config, &auth);
        let mut emitter = WriteEmitter::new(&mut ctx);
        let block = emitter.root(&plan)?;
        let events = emitter.into_events();
        let text = block.render(4);
        let params = ctx
            .scope
            .into_params(auth.jwt_value(), auth.is_authenticated())
            .into_iter()
            .collect();
        Ok(Emitted { text, params, events })
    }

    fn editor() -> AuthContext {
        let mut claims = Map::new();
        claims.insert("roles".to_string(), json!(["editor"]));
        AuthContext::with_claims(claims)
    }

    fn position(text: &str, needle: &str) -> usize {
        text.find(needle)
            .unwrap_or_else(|| panic!("missing {:?} in:\n{}", needle, text))
    }

    // ===== create =====

    #[test]
    fn test_create_generates_id_and_checks_director() {
        let model = model();
        let mut request = OperationRequest::new(OperationKind::Create, "Movie")
            .with_selection(SelectionSet::of(["title"]));
        request.arguments.input = vec![json!({
            "title": "Heat",
            "director": { "create": { "node": { "name": "Mann" } } }
        })];
        let out = emit(&model, request, AuthContext::anonymous()).unwrap();

        assert!(out.text.starts_with("CALL {\n    CREATE (this0:Movie)\n"));
        assert!(out.text.contains("this0.id = randomUUID()"));
        assert!(out.text.contains("CREATE (this0)<-[this2:DIRECTED]-(this1)"));
        assert!(out.text.contains("RELATIONSHIP-REQUIRED: Movie.director required exactly once"));
        assert!(out.text.ends_with("RETURN [this0 { .title }] AS data"));
        assert!(position(&out.text, "CREATE (this1:Person)") < position(&out.text, "RELATIONSHIP-REQUIRED"));
        assert_eq!(out.params.get("param0"), Some(&json!("Heat")));
        assert_eq!(out.params.get("param1"), Some(&json!("Mann")));
    }

    #[test]
    fn test_create_without_inputs_returns_empty_list() {
        let model = model();
        let request = OperationRequest::new(OperationKind::Create, "Movie");
        let out = emit(&model, request, AuthContext::anonymous()).unwrap();
        assert_eq!(out.text, "RETURN [] AS data");
    }

    #[test]
    fn test_create_events() {
        let model = model();
        let mut request = OperationRequest::new(OperationKind::Create, "Movie");
        request.arguments.input = vec![json!({ "title": "Heat", "director": { "connect": { "where": { "node": { "name": "Mann" } } } } })];
        let out = emit(&model, request, AuthContext::anonymous()).unwrap();
        let kinds: Vec<SubscriptionEvent> = out.events.iter().map(|e| e.event).collect();
        assert_eq!(
            kinds,
            vec![SubscriptionEvent::RelationshipCreated, SubscriptionEvent::Created]
        );
        let relationship = out.events[0].relationship.as_ref().unwrap();
        assert_eq!(relationship.from_type, "Person");
        assert_eq!(relationship.to, "this0");
    }

    // ===== update =====

    #[test]
    fn test_update_operators() {
        let model = model();
        let mut request = OperationRequest::new(OperationKind::Update, "Movie");
        request.arguments.update = json!({ "views_INCREMENT": 1, "tags_POP": 2 }).as_object().cloned();
        let out = emit(&model, request, editor()).unwrap();
        // keys arrive sorted
        assert!(out
            .text
            .contains("SET this.tags = this.tags[0..size(this.tags) - $param1], this.views = this.views + $param2"));
        assert!(out.text.contains("WITH *, this { .* } AS var0"));
        assert!(out.text.ends_with("RETURN collect(DISTINCT this {}) AS data"));
    }

    #[test]
    fn test_update_guard_precedes_writes_and_nested_steps() {
        let model = model();
        let mut request = OperationRequest::new(OperationKind::Update, "Movie").with_where(json!({ "title": "Heat" }));
        request.arguments.update = json!({
            "title": "Heat 2",
            "actors": [{ "where": { "node": { "name": "Pacino" } }, "update": { "node": { "name": "Al Pacino" } } }]
        })
        .as_object()
        .cloned();
        let out = emit(&model, request, editor()).unwrap();
        let guard = position(&out.text, "apoc.util.validate");
        assert!(position(&out.text, "WHERE this.title = $param0") < guard);
        assert!(guard < position(&out.text, "SET this.title"));
        assert!(position(&out.text, "SET this.title") < position(&out.text, "MATCH (this)<-[this1:ACTED_IN]-(this2:Person)"));
    }

    #[test]
    fn test_update_requires_authentication_at_compile_time() {
        let model = model();
        let mut request = OperationRequest::new(OperationKind::Update, "Movie");
        request.arguments.update = json!({ "title": "x" }).as_object().cloned();
        let err = emit(&model, request, AuthContext::anonymous()).err().unwrap();
        assert!(matches!(err, TranslateError::Forbidden { .. }));
    }

    #[test]
    fn test_disconnect_before_connect_on_one_field() {
        let model = model();
        let mut request = OperationRequest::new(OperationKind::Update, "Movie");
        request.arguments.update = json!({
            "director": [{
                "disconnect": { "where": { "node": { "name": "Mann" } } },
                "connect": { "where": { "node": { "name": "Scott" } } }
            }]
        })
        .as_object()
        .cloned();
        let out = emit(&model, request, editor()).unwrap();
        let disconnect = position(&out.text, "DELETE this1");
        let connect = position(&out.text, "MERGE (this)<-[");
        assert!(disconnect < connect);
        assert!(connect < position(&out.text, "RELATIONSHIP-REQUIRED"));
    }

    // ===== delete =====

    #[test]
    fn test_delete_cascades_before_owner() {
        let model = model();
        let mut request = OperationRequest::new(OperationKind::Delete, "Movie").with_where(json!({ "title": "Heat" }));
        request.arguments.delete = json!({ "actors": [{ "where": { "node": { "name": "Kilmer" } } }] })
            .as_object()
            .cloned();
        let out = emit(&model, request, AuthContext::anonymous()).unwrap();
        let owner = out.text.rfind("DETACH DELETE this").unwrap();
        assert!(position(&out.text, "DETACH DELETE this1") < owner);
        assert!(out.text.ends_with("DETACH DELETE this"));
        assert!(out.text.contains("WITH *, this1 { .* } AS var2"));
        let deleted: Vec<(&str, Option<&str>)> = out
            .events
            .iter()
            .map(|e| (e.type_name.as_str(), e.before.as_deref()))
            .collect();
        assert_eq!(deleted, vec![("Person", Some("var2")), ("Movie", Some("var3"))]);
    }
}
