//! Filter maps to predicates.

use super::operator::{
    classify, parse_aggregate_key, AggregateComparison, FilterKey, KeyError, Quantifier,
};
use super::{value, Filter, FilterTarget, Predicate, RelatedTarget};
use crate::annotation::AuthOperation;
use crate::context::TranslationContext;
use crate::error::{TranslateError, TranslateResult};
use crate::render::{computed, render_inline, Block, Clause};
use crate::schema::{
    escape_name, AttributeType, ComputedResult, FilterOperator, PropertiesType, RelationshipField,
};
use serde_json::{json, Map, Value};

type Args = Map<String, Value>;

/// Walks filter maps, allocating variables and parameters as it goes.
///
/// Subqueries that deferred leaves depend on collect in a preamble that
/// [`Filter::apply_to`] places between the match and the deferred `WHERE`.
pub struct PredicateBuilder<'c, 'm> {
    ctx: &'c mut TranslationContext<'m>,
    preamble: Vec<Clause>,
    /// Accept `$jwt.<claim>` strings as claim references
    placeholders: bool,
    /// Apply target READ filter rules inside relationship filters
    nested_auth: bool,
}

impl<'c, 'm> PredicateBuilder<'c, 'm> {
    /// Builder for request filters
    pub fn new(ctx: &'c mut TranslationContext<'m>) -> Self {
        Self {
            ctx,
            preamble: Vec::new(),
            placeholders: false,
            nested_auth: true,
        }
    }

    /// Builder for authorization rule templates
    pub fn for_rules(ctx: &'c mut TranslationContext<'m>) -> Self {
        Self {
            ctx,
            preamble: Vec::new(),
            placeholders: true,
            nested_auth: false,
        }
    }

    /// Filter over a node, interface or relationship-properties variable
    pub fn build(mut self, var: &str, target: FilterTarget<'m>, filter: &Args) -> TranslateResult<Filter> {
        let predicate = self.node_predicate(var, target, filter)?;
        Ok(self.finish(predicate))
    }

    /// Filter over a related node reached by `rel`, keyed per member for unions
    pub fn build_related(
        mut self,
        var: &str,
        related: RelatedTarget<'m>,
        filter: &Args,
    ) -> TranslateResult<Filter> {
        let predicate = self.related_predicate(var, related, filter)?;
        Ok(self.finish(predicate))
    }

    /// Connection filter: `{ node, edge, AND, OR, NOT }`
    pub fn build_connection(
        mut self,
        rel_var: &str,
        node_var: &str,
        rel: &'m RelationshipField,
        related: RelatedTarget<'m>,
        filter: &Args,
    ) -> TranslateResult<Filter> {
        let predicate = self.connection_predicate(rel_var, node_var, rel, related, filter)?;
        Ok(self.finish(predicate))
    }

    pub fn finish(self, predicate: Option<Predicate>) -> Filter {
        Filter::new(predicate, self.preamble)
    }

    pub fn ctx(&mut self) -> &mut TranslationContext<'m> {
        self.ctx
    }

    pub fn node_predicate(
        &mut self,
        var: &str,
        target: FilterTarget<'m>,
        map: &Args,
    ) -> TranslateResult<Option<Predicate>> {
        let mut parts = Vec::with_capacity(map.len());
        for (key, value) in map {
            parts.push(self.entry(var, target, key, value)?);
        }
        Ok(Predicate::and(parts))
    }

    fn entry(
        &mut self,
        var: &str,
        target: FilterTarget<'m>,
        key: &str,
        value: &Value,
    ) -> TranslateResult<Option<Predicate>> {
        let type_name = target.name();
        let kind = classify(key, target).map_err(|e| match e {
            KeyError::Unknown => TranslateError::filter(type_name, key, "unknown filter field"),
            KeyError::Unsupported(suffix) => TranslateError::filter(
                type_name,
                key,
                format!("operator '{}' is not supported for this field", suffix),
            ),
        })?;

        match kind {
            FilterKey::And | FilterKey::Or | FilterKey::Not => {
                self.combine(type_name, key, value, |b, map| b.node_predicate(var, target, map))
            }
            FilterKey::TypenameIn => self.typename_in(var, target, key, value),
            FilterKey::Attribute(attr, op) => {
                if !attr.supports(op, &self.ctx.config.filters) {
                    return Err(TranslateError::filter(
                        type_name,
                        key,
                        "operator is disabled by configuration",
                    ));
                }
                let expr = property(var, &attr.db_name);
                self.compare(&expr, &attr.ty, op, value, type_name, key, false)
                    .map(Some)
            }
            FilterKey::Computed(field, op) => {
                let ComputedResult::Scalar(ty) = &field.result else {
                    return Err(TranslateError::filter(
                        type_name,
                        key,
                        "node-typed computed fields cannot be filtered",
                    ));
                };
                if !ty.operators(&self.ctx.config.filters).contains(&op) {
                    return Err(TranslateError::filter(
                        type_name,
                        key,
                        format!("operator '{}' is not supported for this field", op.suffix()),
                    ));
                }
                let out = self.ctx.scope.var();
                let call = computed::scalar_subquery(&mut self.ctx.scope, var, field, &out);
                self.preamble.push(call);
                self.compare(&out, ty, op, value, type_name, key, true).map(Some)
            }
            FilterKey::Relationship {
                field,
                quantifier,
                implicit,
            } => {
                if value.is_null() {
                    if !implicit {
                        return Err(TranslateError::filter(type_name, key, "expected a filter object"));
                    }
                    let exists = self.quantified(var, field, Quantifier::Some, |_, _, _, _| Ok(None))?;
                    return Ok(Some(Predicate::not(exists)));
                }
                let map = object(value, type_name, key)?;
                self.quantified(var, field, quantifier, |b, _, node_var, related| {
                    b.related_predicate(node_var, related, map)
                })
            }
            FilterKey::Connection(field, quantifier) => {
                let map = object(value, type_name, key)?;
                self.quantified(var, field, quantifier, |b, rel_var, node_var, related| {
                    b.connection_predicate(rel_var, node_var, field, related, map)
                })
            }
            FilterKey::Aggregate(field) => self.aggregate_filter(var, field, key, value),
        }
    }

    /// `AND`/`OR` over a list of maps, `NOT` over exactly one map
    fn combine<F>(
        &mut self,
        type_name: &str,
        key: &str,
        value: &Value,
        mut inner: F,
    ) -> TranslateResult<Option<Predicate>>
    where
        F: FnMut(&mut Self, &Args) -> TranslateResult<Option<Predicate>>,
    {
        if key == "NOT" {
            let map = match value {
                Value::Object(map) => map,
                Value::Array(items) if items.len() == 1 => object(&items[0], type_name, key)?,
                _ => {
                    return Err(TranslateError::filter(
                        type_name,
                        key,
                        "NOT takes exactly one filter",
                    ))
                }
            };
            if map.is_empty() {
                return Err(TranslateError::filter(type_name, key, "NOT takes exactly one filter"));
            }
            return Ok(Some(Predicate::not(inner(self, map)?)));
        }

        let items = value
            .as_array()
            .ok_or_else(|| TranslateError::filter(type_name, key, "expected a list of filters"))?;
        let mut parts = Vec::with_capacity(items.len());
        for item in items {
            parts.push(inner(self, object(item, type_name, key)?)?);
        }
        Ok(if key == "AND" {
            Predicate::and(parts)
        } else {
            Predicate::or(parts)
        })
    }

    fn typename_in(
        &mut self,
        var: &str,
        target: FilterTarget<'m>,
        key: &str,
        value: &Value,
    ) -> TranslateResult<Option<Predicate>> {
        let type_name = target.name();
        let names = value
            .as_array()
            .ok_or_else(|| TranslateError::filter(type_name, key, "expected a list of type names"))?;
        let candidates = self.ctx.model.concrete_types(type_name);

        let mut labels = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_str().unwrap_or_default();
            let node = candidates.iter().find(|n| n.name == name).ok_or_else(|| {
                TranslateError::filter(type_name, key, format!("'{}' is not a member of {}", name, type_name))
            })?;
            labels.push(Some(Predicate::leaf(format!("{}{}", var, node.label_pattern()))));
        }
        if labels.is_empty() {
            return Ok(Some(Predicate::leaf("false")));
        }
        if let FilterTarget::Node(_) = target {
            // a concrete node always has its own label
            return Ok(None);
        }
        Ok(Predicate::or(labels))
    }

    /// Node-side filter for a relationship target; union filters are keyed by member
    fn related_predicate(
        &mut self,
        node_var: &str,
        related: RelatedTarget<'m>,
        map: &Args,
    ) -> TranslateResult<Option<Predicate>> {
        match related {
            RelatedTarget::Node(n) => self.node_predicate(node_var, FilterTarget::Node(n), map),
            RelatedTarget::Interface(i) => {
                self.node_predicate(node_var, FilterTarget::Interface(i), map)
            }
            RelatedTarget::Union(u) => {
                let model = self.ctx.model;
                let mut members = Vec::with_capacity(map.len());
                for (member, sub) in map {
                    let node = u
                        .members
                        .iter()
                        .find(|m| *m == member)
                        .and_then(|m| model.node(m))
                        .ok_or_else(|| {
                            TranslateError::filter(&u.name, member, "not a member of this union")
                        })?;
                    let sub = object(sub, &u.name, member)?;
                    let label = Some(Predicate::leaf(format!("{}{}", node_var, node.label_pattern())));
                    let inner = self.node_predicate(node_var, FilterTarget::Node(node), sub)?;
                    members.push(Predicate::and([label, inner]));
                }
                Ok(Predicate::or(members))
            }
        }
    }

    fn connection_predicate(
        &mut self,
        rel_var: &str,
        node_var: &str,
        rel: &'m RelationshipField,
        related: RelatedTarget<'m>,
        map: &Args,
    ) -> TranslateResult<Option<Predicate>> {
        let mut parts = Vec::with_capacity(map.len());
        for (key, value) in map {
            let part = match key.as_str() {
                "node" => {
                    let sub = object(value, &rel.name, key)?;
                    self.related_predicate(node_var, related, sub)?
                }
                "edge" => {
                    let props = self.edge_properties(rel, key)?;
                    let sub = object(value, &rel.name, key)?;
                    self.node_predicate(rel_var, FilterTarget::Edge(props), sub)?
                }
                "AND" | "OR" | "NOT" => self.combine(&rel.name, key, value, |b, sub| {
                    b.connection_predicate(rel_var, node_var, rel, related, sub)
                })?,
                _ => {
                    return Err(TranslateError::filter(
                        &rel.name,
                        key,
                        "expected node, edge, AND, OR or NOT",
                    ))
                }
            };
            parts.push(part);
        }
        Ok(Predicate::and(parts))
    }

    /// Existential subquery over `rel` with the given quantifier
    fn quantified<F>(
        &mut self,
        var: &str,
        rel: &'m RelationshipField,
        quantifier: Quantifier,
        mut inner: F,
    ) -> TranslateResult<Option<Predicate>>
    where
        F: FnMut(&mut Self, &str, &str, RelatedTarget<'m>) -> TranslateResult<Option<Predicate>>,
    {
        let related = RelatedTarget::resolve(self.ctx.model, rel)?;
        let predicate = match quantifier {
            Quantifier::Some => {
                let body = self.subquery_body(var, rel, related, &mut inner, false)?;
                Predicate::leaf(format!("EXISTS {{ {} }}", body))
            }
            Quantifier::None => {
                let body = self.subquery_body(var, rel, related, &mut inner, false)?;
                Predicate::not(Some(Predicate::leaf(format!("EXISTS {{ {} }}", body))))
            }
            Quantifier::Single => {
                let body = self.subquery_body(var, rel, related, &mut inner, false)?;
                Predicate::leaf(format!("COUNT {{ {} }} = 1", body))
            }
            Quantifier::All => {
                let matching = self.subquery_body(var, rel, related, &mut inner, false)?;
                let failing = self.subquery_body(var, rel, related, &mut inner, true)?;
                Predicate::And(vec![
                    Predicate::leaf(format!("EXISTS {{ {} }}", matching)),
                    Predicate::not(Some(Predicate::leaf(format!("EXISTS {{ {} }}", failing)))),
                ])
            }
        };
        Ok(Some(predicate))
    }

    fn subquery_body<F>(
        &mut self,
        var: &str,
        rel: &'m RelationshipField,
        related: RelatedTarget<'m>,
        inner: &mut F,
        negate: bool,
    ) -> TranslateResult<String>
    where
        F: FnMut(&mut Self, &str, &str, RelatedTarget<'m>) -> TranslateResult<Option<Predicate>>,
    {
        let rel_var = self.ctx.scope.node_var();
        let node_var = self.ctx.scope.node_var();

        let outer = std::mem::take(&mut self.preamble);
        let built = inner(self, &rel_var, &node_var, related);
        let nested = std::mem::replace(&mut self.preamble, outer);
        let mut predicate = built?;
        if negate {
            predicate = Some(Predicate::not(predicate));
        }

        let mut filter = Filter::new(predicate, nested);
        if self.nested_auth {
            if let RelatedTarget::Node(node) = related {
                let rules = crate::auth::filter_rules(self.ctx, &node_var, node, AuthOperation::Read)?;
                filter = filter.and(rules);
            }
        }

        let to = format!("{}{}", node_var, related.label());
        let mut block = Block::new();
        block.line(format!(
            "MATCH {}",
            rel.pattern(var, &rel_var, &to, rel.read_direction())
        ));
        filter.apply_to(&mut block);
        Ok(render_inline(block.clauses()))
    }

    fn aggregate_filter(
        &mut self,
        var: &str,
        rel: &'m RelationshipField,
        key: &str,
        value: &Value,
    ) -> TranslateResult<Option<Predicate>> {
        let map = object(value, &rel.owner, key)?;
        let related = RelatedTarget::resolve(self.ctx.model, rel)?;
        let node_target = match related {
            RelatedTarget::Node(n) => FilterTarget::Node(n),
            RelatedTarget::Interface(i) => FilterTarget::Interface(i),
            RelatedTarget::Union(_) => {
                return Err(TranslateError::filter(
                    &rel.owner,
                    key,
                    "aggregation filters are not available on union relationships",
                ))
            }
        };

        let rel_var = self.ctx.scope.node_var();
        let node_var = self.ctx.scope.node_var();
        let Some(test) = self.aggregate_predicate(&rel_var, &node_var, rel, node_target, map)? else {
            return Ok(None);
        };
        let out = self.ctx.scope.var();

        let to = format!("{}{}", node_var, related.label());
        let mut body = Block::new();
        body.line(format!("WITH {}", var));
        body.line(format!(
            "MATCH {}",
            rel.pattern(var, &rel_var, &to, rel.read_direction())
        ));
        body.line(format!("RETURN {} AS {}", test.render_operand(), out));
        self.preamble.push(Clause::Call(body.into_clauses()));

        Ok(Some(Predicate::deferred(format!("{} = true", out))))
    }

    fn aggregate_predicate(
        &mut self,
        rel_var: &str,
        node_var: &str,
        rel: &'m RelationshipField,
        node_target: FilterTarget<'m>,
        map: &Args,
    ) -> TranslateResult<Option<Predicate>> {
        let scope_name = format!("{}Aggregate", rel.name);
        let mut parts = Vec::with_capacity(map.len());
        for (key, value) in map {
            let part = match key.as_str() {
                "AND" | "OR" | "NOT" => self.combine(&scope_name, key, value, |b, sub| {
                    b.aggregate_predicate(rel_var, node_var, rel, node_target, sub)
                })?,
                "node" => {
                    let sub = object(value, &scope_name, key)?;
                    self.aggregate_attributes(node_var, node_target, sub)?
                }
                "edge" => {
                    let props = self.edge_properties(rel, key)?;
                    let sub = object(value, &scope_name, key)?;
                    self.aggregate_attributes(rel_var, FilterTarget::Edge(props), sub)?
                }
                other => {
                    let cmp = AggregateComparison::parse_count(other).ok_or_else(|| {
                        TranslateError::filter(&scope_name, other, "unknown aggregation filter")
                    })?;
                    let count = value.as_u64().ok_or_else(|| {
                        TranslateError::filter(&scope_name, other, "expected a non-negative integer")
                    })?;
                    let param = self.ctx.scope.param(json!(count));
                    Some(Predicate::leaf(format!(
                        "count({}) {} {}",
                        node_var,
                        cmp.symbol(),
                        param
                    )))
                }
            };
            parts.push(part);
        }
        Ok(Predicate::and(parts))
    }

    fn aggregate_attributes(
        &mut self,
        var: &str,
        target: FilterTarget<'m>,
        map: &Args,
    ) -> TranslateResult<Option<Predicate>> {
        let type_name = target.name();
        let mut parts = Vec::with_capacity(map.len());
        for (key, value) in map {
            if matches!(key.as_str(), "AND" | "OR" | "NOT") {
                parts.push(self.combine(type_name, key, value, |b, sub| {
                    b.aggregate_attributes(var, target, sub)
                })?);
                continue;
            }

            let (base, func, cmp) = parse_aggregate_key(key)
                .ok_or_else(|| TranslateError::filter(type_name, key, "unknown aggregation filter"))?;
            let attr = target
                .attribute(base)
                .ok_or_else(|| TranslateError::filter(type_name, key, "unknown filter field"))?;
            let kind = attr
                .ty
                .scalar_kind()
                .filter(|_| !attr.ty.list)
                .filter(|k| func.accepts(*k))
                .ok_or_else(|| {
                    TranslateError::filter(
                        type_name,
                        key,
                        format!("aggregation is not available for {}", attr.ty),
                    )
                })?;

            let operand = if func.compares_lengths() || kind.is_numeric() {
                if !value.is_number() {
                    return Err(TranslateError::filter(type_name, key, "expected a number"));
                }
                self.ctx.scope.param(value.clone())
            } else {
                let normalized = value::normalize_scalar(self.ctx.model, &attr.ty.kind, value)
                    .map_err(|msg| TranslateError::filter(type_name, key, msg))?;
                let param = self.ctx.scope.param(normalized);
                value::wrap(&attr.ty.kind, &param)
            };

            parts.push(Some(Predicate::leaf(format!(
                "{} {} {}",
                func.apply(&property(var, &attr.db_name)),
                cmp.symbol(),
                operand
            ))));
        }
        Ok(Predicate::and(parts))
    }

    fn edge_properties(&self, rel: &RelationshipField, key: &str) -> TranslateResult<&'m PropertiesType> {
        let model = self.ctx.model;
        rel.properties
            .as_deref()
            .and_then(|name| model.properties(name))
            .ok_or_else(|| {
                TranslateError::filter(&rel.owner, key, format!("'{}' has no relationship properties", rel.name))
            })
    }

    /// Single comparison, one parameter per literal
    #[allow(clippy::too_many_arguments)]
    fn compare(
        &mut self,
        expr: &str,
        ty: &AttributeType,
        op: FilterOperator,
        value: &Value,
        type_name: &str,
        key: &str,
        deferred: bool,
    ) -> TranslateResult<Predicate> {
        let leaf = |text: String| Predicate::Leaf { text, deferred };
        let fail = |msg: String| TranslateError::filter(type_name, key, msg);

        if value.is_null() {
            return match op {
                FilterOperator::Equals => Ok(leaf(format!("{} IS NULL", expr))),
                FilterOperator::Not => Ok(leaf(format!("{} IS NOT NULL", expr))),
                _ => Err(fail("null is only valid with equality".to_string())),
            };
        }

        if let Some(path) = self.placeholder(value) {
            let operand = if !ty.list && !op.takes_list() {
                value::wrap(&ty.kind, &path)
            } else {
                path.clone()
            };
            let positive = leaf(comparison(expr, ty, op.positive(), &operand));
            let test = if op.is_negated() {
                Predicate::Not(Box::new(positive))
            } else {
                positive
            };
            return Ok(Predicate::And(vec![leaf(format!("{} IS NOT NULL", path)), test]));
        }

        let model = self.ctx.model;
        let spatial = !ty.list && ty.scalar_kind().is_some_and(|k| k.is_spatial());
        let operand = match op.positive() {
            FilterOperator::LessThan
            | FilterOperator::LessThanOrEqual
            | FilterOperator::GreaterThan
            | FilterOperator::GreaterThanOrEqual
            | FilterOperator::Distance
                if spatial =>
            {
                let map = value
                    .as_object()
                    .ok_or_else(|| fail("expected { point, distance }".to_string()))?;
                let point = map
                    .get("point")
                    .ok_or_else(|| fail("missing 'point'".to_string()))?;
                let distance = map
                    .get("distance")
                    .and_then(Value::as_f64)
                    .ok_or_else(|| fail("missing numeric 'distance'".to_string()))?;
                let point = value::normalize_scalar(model, &ty.kind, point).map_err(fail)?;
                self.ctx
                    .scope
                    .param(json!({ "point": point, "distance": distance }))
            }
            FilterOperator::In => {
                let items = value::normalize_list(model, &ty.kind, value).map_err(fail)?;
                self.list_operand(&ty.kind, items)
            }
            FilterOperator::Includes => {
                let item = value::normalize_scalar(model, &ty.kind, value).map_err(fail)?;
                let param = self.ctx.scope.param(item);
                value::wrap(&ty.kind, &param)
            }
            _ if ty.list => {
                let items = value::normalize_list(model, &ty.kind, value).map_err(fail)?;
                self.list_operand(&ty.kind, items)
            }
            _ => {
                let item = value::normalize_scalar(model, &ty.kind, value).map_err(fail)?;
                let param = self.ctx.scope.param(item);
                value::wrap(&ty.kind, &param)
            }
        };

        let positive = leaf(comparison(expr, ty, op.positive(), &operand));
        Ok(if op.is_negated() {
            Predicate::Not(Box::new(positive))
        } else {
            positive
        })
    }

    fn list_operand(&mut self, kind: &crate::schema::AttributeKind, items: Value) -> String {
        let param = self.ctx.scope.param(items);
        if value::needs_wrap(kind) {
            let item = self.ctx.scope.var();
            value::wrap_list(kind, &param, &item)
        } else {
            param
        }
    }

    /// `$jwt.<claim>` reference when placeholders are enabled
    fn placeholder(&self, value: &Value) -> Option<String> {
        if !self.placeholders {
            return None;
        }
        let path = value.as_str()?.strip_prefix("$jwt.")?;
        Some(claim_path(path))
    }

    /// Filter over the claim set itself
    pub fn claims_predicate(&mut self, map: &Args) -> TranslateResult<Option<Predicate>> {
        let mut parts = Vec::with_capacity(map.len());
        for (key, value) in map {
            if matches!(key.as_str(), "AND" | "OR" | "NOT") {
                parts.push(self.combine("jwt", key, value, |b, sub| b.claims_predicate(sub))?);
                continue;
            }
            let (claim, op) = split_claim_key(key);
            let path = claim_path(claim);

            if value.is_null() {
                let text = match op {
                    FilterOperator::Equals => format!("{} IS NULL", path),
                    FilterOperator::Not => format!("{} IS NOT NULL", path),
                    _ => {
                        return Err(TranslateError::filter(
                            "jwt",
                            key,
                            "null is only valid with equality",
                        ))
                    }
                };
                parts.push(Some(Predicate::leaf(text)));
                continue;
            }
            if op == FilterOperator::Distance {
                return Err(TranslateError::filter("jwt", key, "operator is not supported for claims"));
            }

            let param = self.ctx.scope.param(value.clone());
            let text = match op.positive() {
                FilterOperator::Includes => format!("{} IN {}", param, path),
                positive => format!("{} {} {}", path, symbol(positive), param),
            };
            let leaf = Predicate::leaf(text);
            let compared = if op.is_negated() {
                Predicate::Not(Box::new(leaf))
            } else {
                leaf
            };
            // a missing claim fails the comparison instead of leaving it null
            parts.push(Predicate::and([
                Some(Predicate::leaf(format!("{} IS NOT NULL", path))),
                Some(compared),
            ]));
        }
        Ok(Predicate::and(parts))
    }
}

fn object<'v>(value: &'v Value, type_name: &str, key: &str) -> TranslateResult<&'v Args> {
    value
        .as_object()
        .ok_or_else(|| TranslateError::filter(type_name, key, "expected a filter object"))
}

/// `var.prop`, escaping the property name when needed
pub(crate) fn property(var: &str, name: &str) -> String {
    format!("{}.{}", var, escape_name(name))
}

fn claim_path(path: &str) -> String {
    let segments: Vec<String> = path.split('.').map(escape_name).collect();
    format!("$jwt.{}", segments.join("."))
}

pub(crate) fn split_claim_key(key: &str) -> (&str, FilterOperator) {
    for op in FilterOperator::ALL {
        if op == FilterOperator::Equals {
            continue;
        }
        if let Some(base) = key.strip_suffix(op.suffix()) {
            if !base.is_empty() {
                return (base, op);
            }
        }
    }
    (key, FilterOperator::Equals)
}

fn symbol(op: FilterOperator) -> &'static str {
    match op {
        FilterOperator::Equals => "=",
        FilterOperator::In => "IN",
        FilterOperator::LessThan => "<",
        FilterOperator::LessThanOrEqual => "<=",
        FilterOperator::GreaterThan => ">",
        FilterOperator::GreaterThanOrEqual => ">=",
        FilterOperator::Contains => "CONTAINS",
        FilterOperator::StartsWith => "STARTS WITH",
        FilterOperator::EndsWith => "ENDS WITH",
        FilterOperator::Matches => "=~",
        // negated and list forms are rendered by the caller
        _ => "=",
    }
}

fn comparison(expr: &str, ty: &AttributeType, op: FilterOperator, operand: &str) -> String {
    let spatial = !ty.list && ty.scalar_kind().is_some_and(|k| k.is_spatial());
    match op {
        FilterOperator::Distance => format!(
            "point.distance({}, point({}.point)) = {}.distance",
            expr, operand, operand
        ),
        FilterOperator::LessThan
        | FilterOperator::LessThanOrEqual
        | FilterOperator::GreaterThan
        | FilterOperator::GreaterThanOrEqual
            if spatial =>
        {
            format!(
                "point.distance({}, point({}.point)) {} {}.distance",
                expr,
                operand,
                symbol(op),
                operand
            )
        }
        FilterOperator::Includes => format!("{} IN {}", operand, expr),
        other => format!("{} {} {}", expr, symbol(other), operand),
    }
}
