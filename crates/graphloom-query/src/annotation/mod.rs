//! Typed annotations.
//!
//! Raw annotation occurrences from the declarations are parsed once, at
//! model build time, into the closed [`Annotation`] union. Every consumer
//! works on the typed form; nothing downstream looks at raw names.

mod auth;
mod parser;

pub use auth::{AuthOperation, AuthRule, AuthStage, Authorization, PredicateTemplate, RuleEffect};
pub use parser::{AnnotationParser, AnnotationTarget};

use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;

/// One parsed annotation
#[derive(Debug, Clone, PartialEq)]
pub enum Annotation {
    /// `@authorization(filter: [...], validate: [...])`
    Authorization(Authorization),
    /// `@cypher(statement, columnName)`
    Computed(ComputedBinding),
    /// `@query`, `@mutation` or the deprecated `@exclude`
    OperationToggles(OperationToggles),
    /// `@unique(constraintName)`
    Unique(UniqueConstraint),
    /// `@subscription(events)`
    SubscriptionFilter(SubscriptionFilter),
    /// `@relationship(type, direction, properties, queryDirection)`
    Relationship(RelationshipAnnotation),
    /// `@alias(property)`
    Alias(String),
    /// `@id(autogenerate)`
    Id(IdAnnotation),
    /// `@timestamp(operations)`
    Timestamp(TimestampAnnotation),
    /// `@default(value)`
    Default(Value),
    /// `@limit(default, max)`
    Limit(LimitAnnotation),
    /// `@node(labels)`
    NodeLabels(Vec<String>),
}

/// Discriminant of [`Annotation`], used for duplicate and conflict checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AnnotationKind {
    Authorization,
    Computed,
    OperationToggles,
    Unique,
    SubscriptionFilter,
    Relationship,
    Alias,
    Id,
    Timestamp,
    Default,
    Limit,
    NodeLabels,
}

impl Annotation {
    pub fn kind(&self) -> AnnotationKind {
        match self {
            Annotation::Authorization(_) => AnnotationKind::Authorization,
            Annotation::Computed(_) => AnnotationKind::Computed,
            Annotation::OperationToggles(_) => AnnotationKind::OperationToggles,
            Annotation::Unique(_) => AnnotationKind::Unique,
            Annotation::SubscriptionFilter(_) => AnnotationKind::SubscriptionFilter,
            Annotation::Relationship(_) => AnnotationKind::Relationship,
            Annotation::Alias(_) => AnnotationKind::Alias,
            Annotation::Id(_) => AnnotationKind::Id,
            Annotation::Timestamp(_) => AnnotationKind::Timestamp,
            Annotation::Default(_) => AnnotationKind::Default,
            Annotation::Limit(_) => AnnotationKind::Limit,
            Annotation::NodeLabels(_) => AnnotationKind::NodeLabels,
        }
    }
}

impl fmt::Display for AnnotationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AnnotationKind::Authorization => "authorization",
            AnnotationKind::Computed => "cypher",
            AnnotationKind::OperationToggles => "operation toggles",
            AnnotationKind::Unique => "unique",
            AnnotationKind::SubscriptionFilter => "subscription",
            AnnotationKind::Relationship => "relationship",
            AnnotationKind::Alias => "alias",
            AnnotationKind::Id => "id",
            AnnotationKind::Timestamp => "timestamp",
            AnnotationKind::Default => "default",
            AnnotationKind::Limit => "limit",
            AnnotationKind::NodeLabels => "node",
        };
        f.write_str(name)
    }
}

/// Embedded statement bound to a computed field.
///
/// The statement sees the owning node as `this` and may reference the
/// context parameters `$jwt` and `$isAuthenticated`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputedBinding {
    pub statement: String,
    pub result_column: Option<String>,
}

impl ComputedBinding {
    /// Result column; always present once the model is built
    pub fn column(&self) -> &str {
        self.result_column.as_deref().unwrap_or_default()
    }
}

/// Which annotation produced a set of toggles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToggleOrigin {
    Query,
    Mutation,
    /// The deprecated `@exclude`
    Exclude,
}

/// Per-operation enable flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationToggles {
    pub origin: ToggleOrigin,
    pub read: bool,
    pub aggregate: bool,
    pub create: bool,
    pub update: bool,
    pub delete: bool,
    pub subscribe_create: bool,
    pub subscribe_update: bool,
    pub subscribe_delete: bool,
    pub subscribe_rel_create: bool,
    pub subscribe_rel_delete: bool,
}

impl OperationToggles {
    pub fn all_enabled(origin: ToggleOrigin) -> Self {
        Self {
            origin,
            read: true,
            aggregate: true,
            create: true,
            update: true,
            delete: true,
            subscribe_create: true,
            subscribe_update: true,
            subscribe_delete: true,
            subscribe_rel_create: true,
            subscribe_rel_delete: true,
        }
    }

    /// Flags enabled in both
    pub fn intersect(self, other: OperationToggles) -> Self {
        Self {
            origin: self.origin,
            read: self.read && other.read,
            aggregate: self.aggregate && other.aggregate,
            create: self.create && other.create,
            update: self.update && other.update,
            delete: self.delete && other.delete,
            subscribe_create: self.subscribe_create && other.subscribe_create,
            subscribe_update: self.subscribe_update && other.subscribe_update,
            subscribe_delete: self.subscribe_delete && other.subscribe_delete,
            subscribe_rel_create: self.subscribe_rel_create && other.subscribe_rel_create,
            subscribe_rel_delete: self.subscribe_rel_delete && other.subscribe_rel_delete,
        }
    }

    pub fn allows_event(&self, event: SubscriptionEvent) -> bool {
        match event {
            SubscriptionEvent::Created => self.subscribe_create,
            SubscriptionEvent::Updated => self.subscribe_update,
            SubscriptionEvent::Deleted => self.subscribe_delete,
            SubscriptionEvent::RelationshipCreated => self.subscribe_rel_create,
            SubscriptionEvent::RelationshipDeleted => self.subscribe_rel_delete,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UniqueConstraint {
    pub constraint_name: Option<String>,
}

/// Events published for a type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionEvent {
    Created,
    Updated,
    Deleted,
    RelationshipCreated,
    RelationshipDeleted,
}

impl SubscriptionEvent {
    pub const ALL: [SubscriptionEvent; 5] = [
        SubscriptionEvent::Created,
        SubscriptionEvent::Updated,
        SubscriptionEvent::Deleted,
        SubscriptionEvent::RelationshipCreated,
        SubscriptionEvent::RelationshipDeleted,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "CREATED" => SubscriptionEvent::Created,
            "UPDATED" => SubscriptionEvent::Updated,
            "DELETED" => SubscriptionEvent::Deleted,
            "RELATIONSHIP_CREATED" => SubscriptionEvent::RelationshipCreated,
            "RELATIONSHIP_DELETED" => SubscriptionEvent::RelationshipDeleted,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionFilter {
    pub events: BTreeSet<SubscriptionEvent>,
}

/// Declared edge direction, relative to the owning type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Out,
    In,
    Undirected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipAnnotation {
    /// Stored relationship label
    pub rel_type: String,
    pub direction: Direction,
    /// Name of a relationship-properties type
    pub properties: Option<String>,
    /// Reads ignore the direction
    pub undirected_queries: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdAnnotation {
    pub autogenerate: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimestampOperation {
    Create,
    Update,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampAnnotation {
    pub operations: Vec<TimestampOperation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitAnnotation {
    pub default: Option<u64>,
    pub max: Option<u64>,
}

/// The annotations attached to one type or field
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationSet {
    items: Vec<Annotation>,
}

impl AnnotationSet {
    pub fn new(items: Vec<Annotation>) -> Self {
        Self { items }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Annotation> {
        self.items.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn push(&mut self, annotation: Annotation) {
        self.items.push(annotation);
    }

    pub fn authorization(&self) -> Option<&Authorization> {
        self.items.iter().find_map(|a| match a {
            Annotation::Authorization(auth) => Some(auth),
            _ => None,
        })
    }

    pub fn computed(&self) -> Option<&ComputedBinding> {
        self.items.iter().find_map(|a| match a {
            Annotation::Computed(binding) => Some(binding),
            _ => None,
        })
    }

    /// Effective toggles: all `@query`/`@mutation`/`@exclude` flags
    /// intersected, with subscribe flags narrowed by `@subscription`.
    pub fn toggles(&self) -> OperationToggles {
        let mut toggles = OperationToggles::all_enabled(ToggleOrigin::Query);
        for annotation in &self.items {
            if let Annotation::OperationToggles(t) = annotation {
                toggles = toggles.intersect(*t);
            }
        }
        if let Some(filter) = self.subscription_filter() {
            toggles.subscribe_create &= filter.events.contains(&SubscriptionEvent::Created);
            toggles.subscribe_update &= filter.events.contains(&SubscriptionEvent::Updated);
            toggles.subscribe_delete &= filter.events.contains(&SubscriptionEvent::Deleted);
            toggles.subscribe_rel_create &=
                filter.events.contains(&SubscriptionEvent::RelationshipCreated);
            toggles.subscribe_rel_delete &=
                filter.events.contains(&SubscriptionEvent::RelationshipDeleted);
        }
        toggles
    }

    pub fn toggle_origins(&self) -> Vec<ToggleOrigin> {
        self.items
            .iter()
            .filter_map(|a| match a {
                Annotation::OperationToggles(t) => Some(t.origin),
                _ => None,
            })
            .collect()
    }

    pub fn unique(&self) -> Option<&UniqueConstraint> {
        self.items.iter().find_map(|a| match a {
            Annotation::Unique(u) => Some(u),
            _ => None,
        })
    }

    pub fn subscription_filter(&self) -> Option<&SubscriptionFilter> {
        self.items.iter().find_map(|a| match a {
            Annotation::SubscriptionFilter(s) => Some(s),
            _ => None,
        })
    }

    pub fn relationship(&self) -> Option<&RelationshipAnnotation> {
        self.items.iter().find_map(|a| match a {
            Annotation::Relationship(r) => Some(r),
            _ => None,
        })
    }

    pub fn alias(&self) -> Option<&str> {
        self.items.iter().find_map(|a| match a {
            Annotation::Alias(property) => Some(property.as_str()),
            _ => None,
        })
    }

    pub fn id(&self) -> Option<&IdAnnotation> {
        self.items.iter().find_map(|a| match a {
            Annotation::Id(id) => Some(id),
            _ => None,
        })
    }

    pub fn timestamp(&self) -> Option<&TimestampAnnotation> {
        self.items.iter().find_map(|a| match a {
            Annotation::Timestamp(t) => Some(t),
            _ => None,
        })
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.items.iter().find_map(|a| match a {
            Annotation::Default(v) => Some(v),
            _ => None,
        })
    }

    pub fn limit(&self) -> Option<&LimitAnnotation> {
        self.items.iter().find_map(|a| match a {
            Annotation::Limit(l) => Some(l),
            _ => None,
        })
    }

    pub fn labels(&self) -> Option<&[String]> {
        self.items.iter().find_map(|a| match a {
            Annotation::NodeLabels(labels) => Some(labels.as_slice()),
            _ => None,
        })
    }
}
