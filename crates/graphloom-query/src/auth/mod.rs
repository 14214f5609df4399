//! Authorization weaving.
//!
//! Rules are grouped by where they were declared: the node type itself,
//! each interface it implements, and any fields the operation touches.
//! Within a group the applicable rules are alternatives; every group must
//! hold. A node governed by both a local and an interface rule for the
//! same operation therefore needs both to pass, unless the node's own
//! `@authorization` sets `override`.
//!
//! Filter rules narrow the match. Validate rules become guards that abort
//! the whole statement.

use crate::annotation::{
    AnnotationSet, AuthOperation, AuthRule, AuthStage, PredicateTemplate, RuleEffect,
};
use crate::context::TranslationContext;
use crate::error::{TranslateError, TranslateResult};
use crate::predicate::{Filter, FilterTarget, Predicate, PredicateBuilder};
use crate::render::{forbidden_message, Block, AUTHENTICATED_PARAM};
use crate::schema::NodeType;
use tracing::trace;

fn applicable(
    set: &AnnotationSet,
    effect: RuleEffect,
    operation: AuthOperation,
    stage: AuthStage,
) -> Vec<&AuthRule> {
    set.authorization()
        .map(|auth| {
            auth.rules(effect)
                .filter(|rule| rule.applies_to(operation, stage))
                .collect()
        })
        .unwrap_or_default()
}

/// Filter rules for `operation` on the node bound to `var`
pub(crate) fn filter_rules<'m>(
    ctx: &mut TranslationContext<'m>,
    var: &str,
    node: &'m NodeType,
    operation: AuthOperation,
) -> TranslateResult<Filter> {
    let model = ctx.model;
    let sets = model.governing_annotations(node);
    weave(ctx, var, node, &sets, RuleEffect::Filter, operation, AuthStage::Before)
}

/// Validate rules for `operation` at `stage`, including rules declared on
/// the given fields
pub(crate) fn validate_rules<'m>(
    ctx: &mut TranslationContext<'m>,
    var: &str,
    node: &'m NodeType,
    operation: AuthOperation,
    stage: AuthStage,
    fields: &[&'m AnnotationSet],
) -> TranslateResult<Filter> {
    let model = ctx.model;
    let mut sets = model.governing_annotations(node);
    sets.extend_from_slice(fields);
    weave(ctx, var, node, &sets, RuleEffect::Validate, operation, stage)
}

fn weave<'m>(
    ctx: &mut TranslationContext<'m>,
    var: &str,
    node: &'m NodeType,
    sets: &[&'m AnnotationSet],
    effect: RuleEffect,
    operation: AuthOperation,
    stage: AuthStage,
) -> TranslateResult<Filter> {
    let mut builder = PredicateBuilder::for_rules(ctx);
    let mut groups = Vec::new();

    for set in sets {
        let rules = applicable(set, effect, operation, stage);
        if rules.is_empty() {
            continue;
        }
        let mut alternatives = Vec::with_capacity(rules.len());
        for rule in rules {
            alternatives.push(rule_predicate(&mut builder, var, node, rule)?);
        }
        groups.push(Predicate::or(alternatives));
    }

    trace!(
        type_name = %node.name,
        %operation,
        ?effect,
        groups = groups.len(),
        "woven authorization rules"
    );
    Ok(builder.finish(Predicate::and(groups)))
}

fn rule_predicate<'m>(
    builder: &mut PredicateBuilder<'_, 'm>,
    var: &str,
    node: &'m NodeType,
    rule: &AuthRule,
) -> TranslateResult<Option<Predicate>> {
    let authenticated = rule
        .require_authentication
        .then(|| Predicate::leaf(format!("${} = true", AUTHENTICATED_PARAM)));
    let body = template_predicate(builder, var, node, &rule.predicate)?;
    Ok(Predicate::and([authenticated, body]))
}

fn template_predicate<'m>(
    builder: &mut PredicateBuilder<'_, 'm>,
    var: &str,
    node: &'m NodeType,
    template: &PredicateTemplate,
) -> TranslateResult<Option<Predicate>> {
    match template {
        PredicateTemplate::Leaf { node: filter, jwt } => {
            let on_node = match filter {
                Some(map) => builder.node_predicate(var, FilterTarget::Node(node), map)?,
                None => None,
            };
            let on_claims = match jwt {
                Some(map) => builder.claims_predicate(map)?,
                None => None,
            };
            Ok(Predicate::and([on_node, on_claims]))
        }
        PredicateTemplate::And(parts) => {
            let mut out = Vec::with_capacity(parts.len());
            for part in parts {
                out.push(template_predicate(builder, var, node, part)?);
            }
            Ok(Predicate::and(out))
        }
        PredicateTemplate::Or(parts) => {
            let mut out = Vec::with_capacity(parts.len());
            for part in parts {
                out.push(template_predicate(builder, var, node, part)?);
            }
            Ok(Predicate::or(out))
        }
        PredicateTemplate::Not(inner) => Ok(Some(Predicate::not(template_predicate(
            builder, var, node, inner,
        )?))),
    }
}

/// Emit a validate filter as a guard: preamble subqueries, then the check.
/// A rule that evaluates to null (missing property or claim) fails.
pub(crate) fn guard(block: &mut Block, filter: Filter, prefix: &str) {
    let Some(predicate) = filter.predicate else {
        return;
    };
    block.extend(filter.preamble);
    let checked = Predicate::leaf(format!("coalesce({}, false)", predicate));
    block.guard(&checked, &forbidden_message(prefix));
}

/// Fail before emission when an anonymous caller can never pass.
///
/// A group whose applicable validate rules all require authentication
/// rejects every anonymous request, whatever the data.
pub(crate) fn ensure_authenticated(
    ctx: &TranslationContext<'_>,
    node: &NodeType,
    operation: AuthOperation,
    stage: AuthStage,
    fields: &[&AnnotationSet],
) -> TranslateResult<()> {
    if ctx.auth.is_authenticated() {
        return Ok(());
    }
    let mut sets = ctx.model.governing_annotations(node);
    sets.extend_from_slice(fields);
    for set in sets {
        let rules = applicable(set, RuleEffect::Validate, operation, stage);
        if !rules.is_empty() && rules.iter().all(|r| r.require_authentication) {
            return Err(TranslateError::Forbidden {
                message: format!("{} on {} requires authentication", operation, node.name),
            });
        }
    }
    Ok(())
}
