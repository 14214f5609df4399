//! Attributes and their filter operator sets.

use crate::annotation::AnnotationSet;
use graphloom_config::FilterFeatures;
use std::fmt;

/// Built-in scalar types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Id,
    String,
    Int,
    BigInt,
    Float,
    Boolean,
    DateTime,
    LocalDateTime,
    Date,
    Time,
    LocalTime,
    Duration,
    Point,
    CartesianPoint,
}

impl ScalarKind {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "ID" => ScalarKind::Id,
            "String" => ScalarKind::String,
            "Int" => ScalarKind::Int,
            "BigInt" => ScalarKind::BigInt,
            "Float" => ScalarKind::Float,
            "Boolean" => ScalarKind::Boolean,
            "DateTime" => ScalarKind::DateTime,
            "LocalDateTime" => ScalarKind::LocalDateTime,
            "Date" => ScalarKind::Date,
            "Time" => ScalarKind::Time,
            "LocalTime" => ScalarKind::LocalTime,
            "Duration" => ScalarKind::Duration,
            "Point" => ScalarKind::Point,
            "CartesianPoint" => ScalarKind::CartesianPoint,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            ScalarKind::Id => "ID",
            ScalarKind::String => "String",
            ScalarKind::Int => "Int",
            ScalarKind::BigInt => "BigInt",
            ScalarKind::Float => "Float",
            ScalarKind::Boolean => "Boolean",
            ScalarKind::DateTime => "DateTime",
            ScalarKind::LocalDateTime => "LocalDateTime",
            ScalarKind::Date => "Date",
            ScalarKind::Time => "Time",
            ScalarKind::LocalTime => "LocalTime",
            ScalarKind::Duration => "Duration",
            ScalarKind::Point => "Point",
            ScalarKind::CartesianPoint => "CartesianPoint",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ScalarKind::Int | ScalarKind::BigInt | ScalarKind::Float)
    }

    pub fn is_textual(&self) -> bool {
        matches!(self, ScalarKind::Id | ScalarKind::String)
    }

    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            ScalarKind::DateTime
                | ScalarKind::LocalDateTime
                | ScalarKind::Date
                | ScalarKind::Time
                | ScalarKind::LocalTime
                | ScalarKind::Duration
        )
    }

    pub fn is_spatial(&self) -> bool {
        matches!(self, ScalarKind::Point | ScalarKind::CartesianPoint)
    }

    /// Cypher function that turns the wire value into the store's native type
    pub fn constructor(&self) -> Option<&'static str> {
        match self {
            ScalarKind::DateTime => Some("datetime"),
            ScalarKind::LocalDateTime => Some("localdatetime"),
            ScalarKind::Date => Some("date"),
            ScalarKind::Time => Some("time"),
            ScalarKind::LocalTime => Some("localtime"),
            ScalarKind::Duration => Some("duration"),
            ScalarKind::Point | ScalarKind::CartesianPoint => Some("point"),
            _ => None,
        }
    }
}

/// Scalar or enum
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeKind {
    Scalar(ScalarKind),
    Enum(String),
}

/// Declared type of an attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeType {
    pub kind: AttributeKind,
    pub list: bool,
    pub required: bool,
    pub items_required: bool,
}

impl AttributeType {
    pub fn scalar(kind: ScalarKind) -> Self {
        Self {
            kind: AttributeKind::Scalar(kind),
            list: false,
            required: false,
            items_required: false,
        }
    }

    pub fn scalar_kind(&self) -> Option<ScalarKind> {
        match &self.kind {
            AttributeKind::Scalar(kind) => Some(*kind),
            AttributeKind::Enum(_) => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        !self.list && self.scalar_kind().is_some_and(|k| k.is_numeric())
    }

    pub fn is_textual(&self) -> bool {
        !self.list && self.scalar_kind().is_some_and(|k| k.is_textual())
    }

    pub fn is_temporal(&self) -> bool {
        !self.list && self.scalar_kind().is_some_and(|k| k.is_temporal())
    }

    pub fn type_name(&self) -> &str {
        match &self.kind {
            AttributeKind::Scalar(kind) => kind.name(),
            AttributeKind::Enum(name) => name,
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.list {
            write!(f, "[{}{}]", self.type_name(), if self.items_required { "!" } else { "" })?;
        } else {
            write!(f, "{}", self.type_name())?;
        }
        if self.required {
            write!(f, "!")?;
        }
        Ok(())
    }
}

/// Comparison operators selected by a filter key suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterOperator {
    Equals,
    Not,
    In,
    NotIn,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Contains,
    NotContains,
    StartsWith,
    NotStartsWith,
    EndsWith,
    NotEndsWith,
    Matches,
    Includes,
    NotIncludes,
    Distance,
}

impl FilterOperator {
    /// All operators, longest suffix first so decomposition is unambiguous
    pub const ALL: [FilterOperator; 18] = [
        FilterOperator::NotStartsWith,
        FilterOperator::NotEndsWith,
        FilterOperator::NotContains,
        FilterOperator::NotIncludes,
        FilterOperator::StartsWith,
        FilterOperator::EndsWith,
        FilterOperator::Contains,
        FilterOperator::Includes,
        FilterOperator::Distance,
        FilterOperator::Matches,
        FilterOperator::NotIn,
        FilterOperator::LessThanOrEqual,
        FilterOperator::GreaterThanOrEqual,
        FilterOperator::LessThan,
        FilterOperator::GreaterThan,
        FilterOperator::Not,
        FilterOperator::In,
        FilterOperator::Equals,
    ];

    pub fn suffix(&self) -> &'static str {
        match self {
            FilterOperator::Equals => "",
            FilterOperator::Not => "_NOT",
            FilterOperator::In => "_IN",
            FilterOperator::NotIn => "_NOT_IN",
            FilterOperator::LessThan => "_LT",
            FilterOperator::LessThanOrEqual => "_LTE",
            FilterOperator::GreaterThan => "_GT",
            FilterOperator::GreaterThanOrEqual => "_GTE",
            FilterOperator::Contains => "_CONTAINS",
            FilterOperator::NotContains => "_NOT_CONTAINS",
            FilterOperator::StartsWith => "_STARTS_WITH",
            FilterOperator::NotStartsWith => "_NOT_STARTS_WITH",
            FilterOperator::EndsWith => "_ENDS_WITH",
            FilterOperator::NotEndsWith => "_NOT_ENDS_WITH",
            FilterOperator::Matches => "_MATCHES",
            FilterOperator::Includes => "_INCLUDES",
            FilterOperator::NotIncludes => "_NOT_INCLUDES",
            FilterOperator::Distance => "_DISTANCE",
        }
    }

    /// Operators whose operand is a list of values
    pub fn takes_list(&self) -> bool {
        matches!(self, FilterOperator::In | FilterOperator::NotIn)
    }

    pub fn is_negated(&self) -> bool {
        matches!(
            self,
            FilterOperator::Not
                | FilterOperator::NotIn
                | FilterOperator::NotContains
                | FilterOperator::NotStartsWith
                | FilterOperator::NotEndsWith
                | FilterOperator::NotIncludes
        )
    }

    /// The positive form of a negated operator
    pub fn positive(&self) -> FilterOperator {
        match self {
            FilterOperator::Not => FilterOperator::Equals,
            FilterOperator::NotIn => FilterOperator::In,
            FilterOperator::NotContains => FilterOperator::Contains,
            FilterOperator::NotStartsWith => FilterOperator::StartsWith,
            FilterOperator::NotEndsWith => FilterOperator::EndsWith,
            FilterOperator::NotIncludes => FilterOperator::Includes,
            other => *other,
        }
    }
}

const EQUALITY: [FilterOperator; 2] = [FilterOperator::Equals, FilterOperator::Not];
const MEMBERSHIP: [FilterOperator; 2] = [FilterOperator::In, FilterOperator::NotIn];
const ORDERING: [FilterOperator; 4] = [
    FilterOperator::LessThan,
    FilterOperator::LessThanOrEqual,
    FilterOperator::GreaterThan,
    FilterOperator::GreaterThanOrEqual,
];
const SUBSTRING: [FilterOperator; 6] = [
    FilterOperator::Contains,
    FilterOperator::NotContains,
    FilterOperator::StartsWith,
    FilterOperator::NotStartsWith,
    FilterOperator::EndsWith,
    FilterOperator::NotEndsWith,
];
const LIST: [FilterOperator; 2] = [FilterOperator::Includes, FilterOperator::NotIncludes];

impl AttributeType {
    /// Legal filter operators for this type
    pub fn operators(&self, features: &FilterFeatures) -> Vec<FilterOperator> {
        let mut ops: Vec<FilterOperator> = EQUALITY.to_vec();
        if self.list {
            ops.extend(LIST);
            return ops;
        }
        match &self.kind {
            AttributeKind::Enum(_) => ops.extend(MEMBERSHIP),
            AttributeKind::Scalar(kind) => match kind {
                ScalarKind::Boolean => {}
                ScalarKind::Id | ScalarKind::String => {
                    ops.extend(MEMBERSHIP);
                    ops.extend(SUBSTRING);
                    if features.regex_matches {
                        ops.push(FilterOperator::Matches);
                    }
                    if features.string_comparisons {
                        ops.extend(ORDERING);
                    }
                }
                ScalarKind::Point | ScalarKind::CartesianPoint => {
                    ops.extend(MEMBERSHIP);
                    ops.extend(ORDERING);
                    ops.push(FilterOperator::Distance);
                }
                k if k.is_numeric() || k.is_temporal() => {
                    ops.extend(MEMBERSHIP);
                    ops.extend(ORDERING);
                }
                _ => {}
            },
        }
        ops
    }
}

/// A scalar or enum field stored as a node or relationship property
#[derive(Debug, Clone)]
pub struct Attribute {
    /// Owning type name
    pub owner: String,
    /// Wire name
    pub name: String,
    /// Storage property name (differs from `name` under `@alias`)
    pub db_name: String,
    pub ty: AttributeType,
    pub annotations: AnnotationSet,
}

impl Attribute {
    pub fn operators(&self, features: &FilterFeatures) -> Vec<FilterOperator> {
        self.ty.operators(features)
    }

    pub fn supports(&self, op: FilterOperator, features: &FilterFeatures) -> bool {
        self.operators(features).contains(&op)
    }

    /// `@unique` or `@id`
    pub fn is_unique(&self) -> bool {
        self.annotations.unique().is_some() || self.annotations.id().is_some()
    }
}
