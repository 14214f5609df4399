//! Boolean predicates over graph variables.
//!
//! Leaves are already-rendered Cypher expressions: variable and parameter
//! names are allocated while the filter is walked, so nothing is left to
//! resolve at render time. A leaf is *deferred* when it reads a value
//! computed by a preamble subquery; deferred leaves can only be tested
//! after that subquery has run.

mod builder;
mod operator;
pub(crate) mod value;

pub use builder::PredicateBuilder;
pub(crate) use builder::{property, split_claim_key};
pub use operator::{AggregateComparison, AggregateFunction, Quantifier};
pub(crate) use operator::{classify, FilterKey, KeyError};

use crate::error::{TranslateError, TranslateResult};
use crate::render::{Block, Clause};
use crate::schema::{
    Attribute, ComputedField, InterfaceType, NodeType, PropertiesType, RelationshipField,
    SchemaModel, TargetKind, UnionType,
};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
    Leaf { text: String, deferred: bool },
}

impl Predicate {
    pub fn leaf(text: impl Into<String>) -> Self {
        Predicate::Leaf {
            text: text.into(),
            deferred: false,
        }
    }

    pub fn deferred(text: impl Into<String>) -> Self {
        Predicate::Leaf {
            text: text.into(),
            deferred: true,
        }
    }

    /// Conjunction; `None` stands for `true` and drops out
    pub fn and<I>(parts: I) -> Option<Predicate>
    where
        I: IntoIterator<Item = Option<Predicate>>,
    {
        let mut terms = Vec::new();
        for part in parts.into_iter().flatten() {
            match part {
                Predicate::And(inner) => terms.extend(inner),
                other => terms.push(other),
            }
        }
        match terms.len() {
            0 => None,
            1 => terms.pop(),
            _ => Some(Predicate::And(terms)),
        }
    }

    /// Disjunction; any `true` operand makes the whole thing `true`
    pub fn or<I>(parts: I) -> Option<Predicate>
    where
        I: IntoIterator<Item = Option<Predicate>>,
    {
        let mut terms = Vec::new();
        for part in parts {
            match part {
                None => return None,
                Some(Predicate::Or(inner)) => terms.extend(inner),
                Some(other) => terms.push(other),
            }
        }
        match terms.len() {
            0 => None,
            1 => terms.pop(),
            _ => Some(Predicate::Or(terms)),
        }
    }

    /// Negation; the negation of `true` is the literal `false`
    pub fn not(inner: Option<Predicate>) -> Predicate {
        match inner {
            Some(p) => Predicate::Not(Box::new(p)),
            None => Predicate::leaf("false"),
        }
    }

    pub fn is_deferred(&self) -> bool {
        match self {
            Predicate::Leaf { deferred, .. } => *deferred,
            Predicate::Not(inner) => inner.is_deferred(),
            Predicate::And(parts) | Predicate::Or(parts) => parts.iter().any(Predicate::is_deferred),
        }
    }

    /// Split into (testable right after the match, testable after preambles)
    pub fn split_deferred(self) -> (Option<Predicate>, Option<Predicate>) {
        match self {
            Predicate::And(parts) => {
                let (late, early): (Vec<_>, Vec<_>) =
                    parts.into_iter().partition(Predicate::is_deferred);
                (
                    Predicate::and(early.into_iter().map(Some)),
                    Predicate::and(late.into_iter().map(Some)),
                )
            }
            p if p.is_deferred() => (None, Some(p)),
            p => (Some(p), None),
        }
    }

    /// Rendering safe to embed next to other operators
    pub(crate) fn render_operand(&self) -> String {
        match self {
            Predicate::And(_) | Predicate::Or(_) => format!("({})", self),
            _ => self.to_string(),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Leaf { text, .. } => f.write_str(text),
            Predicate::Not(inner) => write!(f, "NOT ({})", inner),
            Predicate::And(parts) => {
                let rendered: Vec<String> = parts.iter().map(Predicate::render_operand).collect();
                f.write_str(&rendered.join(" AND "))
            }
            Predicate::Or(parts) => {
                let rendered: Vec<String> = parts.iter().map(Predicate::render_operand).collect();
                f.write_str(&rendered.join(" OR "))
            }
        }
    }
}

/// A predicate plus the subqueries its deferred leaves depend on
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub predicate: Option<Predicate>,
    pub preamble: Vec<Clause>,
}

impl Filter {
    pub fn new(predicate: Option<Predicate>, preamble: Vec<Clause>) -> Self {
        Self {
            predicate,
            preamble,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.predicate.is_none() && self.preamble.is_empty()
    }

    /// Both filters must hold
    pub fn and(mut self, other: Filter) -> Filter {
        self.predicate = Predicate::and([self.predicate, other.predicate]);
        self.preamble.extend(other.preamble);
        self
    }

    /// Emit after a `MATCH`: the `WHERE` for plain leaves, then the
    /// preamble subqueries, then a second `WHERE` for deferred leaves
    pub fn apply_to(self, block: &mut Block) {
        let (early, late) = match self.predicate {
            Some(p) => p.split_deferred(),
            None => (None, None),
        };
        block.where_clause(early.as_ref());
        block.extend(self.preamble);
        if let Some(late) = late {
            block.line("WITH *");
            block.line(format!("WHERE {}", late));
        }
    }
}

/// Resolved target of a relationship
#[derive(Debug, Clone, Copy)]
pub enum RelatedTarget<'m> {
    Node(&'m NodeType),
    Interface(&'m InterfaceType),
    Union(&'m UnionType),
}

impl<'m> RelatedTarget<'m> {
    pub fn resolve(model: &'m SchemaModel, rel: &RelationshipField) -> TranslateResult<Self> {
        let found = match rel.target_kind {
            TargetKind::Node => model.node(&rel.target).map(RelatedTarget::Node),
            TargetKind::Interface => model.interface(&rel.target).map(RelatedTarget::Interface),
            TargetKind::Union => model.union(&rel.target).map(RelatedTarget::Union),
        };
        found.ok_or_else(|| TranslateError::UnknownField {
            type_name: rel.owner.clone(),
            field: rel.name.clone(),
        })
    }

    /// Label suffix for the target node pattern; abstract targets have none
    pub fn label(&self) -> String {
        match self {
            RelatedTarget::Node(n) => n.label_pattern(),
            RelatedTarget::Interface(_) | RelatedTarget::Union(_) => String::new(),
        }
    }

    pub fn name(&self) -> &'m str {
        match self {
            RelatedTarget::Node(n) => &n.name,
            RelatedTarget::Interface(i) => &i.name,
            RelatedTarget::Union(u) => &u.name,
        }
    }
}

/// The entity a filter map is interpreted against
#[derive(Debug, Clone, Copy)]
pub enum FilterTarget<'m> {
    Node(&'m NodeType),
    Interface(&'m InterfaceType),
    /// Relationship properties
    Edge(&'m PropertiesType),
}

impl<'m> FilterTarget<'m> {
    pub fn name(&self) -> &'m str {
        match self {
            FilterTarget::Node(n) => &n.name,
            FilterTarget::Interface(i) => &i.name,
            FilterTarget::Edge(p) => &p.name,
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&'m Attribute> {
        match self {
            FilterTarget::Node(n) => n.fields.attribute(name),
            FilterTarget::Interface(i) => i.fields.attribute(name),
            FilterTarget::Edge(p) => p.attribute(name),
        }
    }

    pub fn relationships(&self) -> &'m [RelationshipField] {
        match self {
            FilterTarget::Node(n) => &n.fields.relationships,
            FilterTarget::Interface(i) => &i.fields.relationships,
            FilterTarget::Edge(_) => &[],
        }
    }

    pub fn computed(&self, name: &str) -> Option<&'m ComputedField> {
        match self {
            FilterTarget::Node(n) => n.fields.computed(name),
            FilterTarget::Interface(i) => i.fields.computed(name),
            FilterTarget::Edge(_) => None,
        }
    }
}
