//! Filter key decomposition.
//!
//! A key is a field name followed by an optional operator suffix
//! (`title_STARTS_WITH`), a relationship quantifier (`actors_SOME`) or an
//! aggregation suffix (`name_AVERAGE_LENGTH_GT`). Suffixes are tried
//! longest first so `_NOT_IN` never parses as `_IN` on a field `title_NOT`.

use super::FilterTarget;
use crate::schema::{Attribute, ComputedField, FilterOperator, RelationshipField, ScalarKind};

/// Quantifier over the targets of a relationship
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantifier {
    Some,
    All,
    None,
    Single,
}

impl Quantifier {
    const SUFFIXES: [(&'static str, Quantifier); 4] = [
        ("_SOME", Quantifier::Some),
        ("_ALL", Quantifier::All),
        ("_NONE", Quantifier::None),
        ("_SINGLE", Quantifier::Single),
    ];
}

/// What a filter key refers to
#[derive(Debug, Clone, Copy)]
pub(crate) enum FilterKey<'m> {
    And,
    Or,
    Not,
    TypenameIn,
    Attribute(&'m Attribute, FilterOperator),
    Computed(&'m ComputedField, FilterOperator),
    /// `implicit` is the bare field name form
    Relationship {
        field: &'m RelationshipField,
        quantifier: Quantifier,
        implicit: bool,
    },
    Connection(&'m RelationshipField, Quantifier),
    Aggregate(&'m RelationshipField),
}

/// Why a key did not resolve
pub(crate) enum KeyError {
    Unknown,
    Unsupported(&'static str),
}

pub(crate) fn classify<'m>(key: &str, target: FilterTarget<'m>) -> Result<FilterKey<'m>, KeyError> {
    match key {
        "AND" => return Ok(FilterKey::And),
        "OR" => return Ok(FilterKey::Or),
        "NOT" => return Ok(FilterKey::Not),
        "typename_IN" if !matches!(target, FilterTarget::Edge(_)) => {
            return Ok(FilterKey::TypenameIn)
        }
        _ => {}
    }

    for rel in target.relationships() {
        if let Some(found) = relationship_key(key, rel) {
            return Ok(found);
        }
    }

    let mut unsupported = None;
    for op in FilterOperator::ALL {
        let Some(base) = key.strip_suffix(op.suffix()) else {
            continue;
        };
        if let Some(attr) = target.attribute(base) {
            if target_supports(attr, op) {
                return Ok(FilterKey::Attribute(attr, op));
            }
            unsupported.get_or_insert(op.suffix());
        } else if let Some(field) = target.computed(base) {
            return Ok(FilterKey::Computed(field, op));
        }
    }
    match unsupported {
        Some(suffix) => Err(KeyError::Unsupported(suffix)),
        None => Err(KeyError::Unknown),
    }
}

// Feature flags are checked by the builder, which has the config
fn target_supports(attr: &Attribute, op: FilterOperator) -> bool {
    let all = graphloom_config::FilterFeatures {
        string_comparisons: true,
        regex_matches: true,
    };
    attr.supports(op, &all)
}

fn relationship_key<'m>(key: &str, rel: &'m RelationshipField) -> Option<FilterKey<'m>> {
    if key == rel.name {
        return Some(FilterKey::Relationship {
            field: rel,
            quantifier: Quantifier::Some,
            implicit: true,
        });
    }
    let rest = key.strip_prefix(rel.name.as_str())?;
    if rest == "Aggregate" {
        return Some(FilterKey::Aggregate(rel));
    }
    if rest == "Connection" {
        return Some(FilterKey::Connection(rel, Quantifier::Some));
    }
    let (quantified, connection) = match rest.strip_prefix("Connection") {
        Some(after) => (after, true),
        None => (rest, false),
    };
    Quantifier::SUFFIXES
        .iter()
        .find(|(suffix, _)| quantified == *suffix)
        .map(|(_, q)| {
            if connection {
                FilterKey::Connection(rel, *q)
            } else {
                FilterKey::Relationship {
                    field: rel,
                    quantifier: *q,
                    implicit: false,
                }
            }
        })
}

/// Aggregate applied to a target attribute inside an aggregation filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    Min,
    Max,
    Average,
    Sum,
    ShortestLength,
    LongestLength,
    AverageLength,
}

impl AggregateFunction {
    const SUFFIXES: [(&'static str, AggregateFunction); 7] = [
        ("_AVERAGE_LENGTH", AggregateFunction::AverageLength),
        ("_SHORTEST_LENGTH", AggregateFunction::ShortestLength),
        ("_LONGEST_LENGTH", AggregateFunction::LongestLength),
        ("_AVERAGE", AggregateFunction::Average),
        ("_MIN", AggregateFunction::Min),
        ("_MAX", AggregateFunction::Max),
        ("_SUM", AggregateFunction::Sum),
    ];

    /// Whether the function applies to values of `kind`
    pub fn accepts(&self, kind: ScalarKind) -> bool {
        match self {
            AggregateFunction::Min | AggregateFunction::Max => {
                kind.is_numeric() || kind.is_temporal()
            }
            AggregateFunction::Average | AggregateFunction::Sum => kind.is_numeric(),
            AggregateFunction::ShortestLength
            | AggregateFunction::LongestLength
            | AggregateFunction::AverageLength => kind == ScalarKind::String,
        }
    }

    pub fn apply(&self, expr: &str) -> String {
        match self {
            AggregateFunction::Min => format!("min({})", expr),
            AggregateFunction::Max => format!("max({})", expr),
            AggregateFunction::Average => format!("avg({})", expr),
            AggregateFunction::Sum => format!("sum({})", expr),
            AggregateFunction::ShortestLength => format!("min(size({}))", expr),
            AggregateFunction::LongestLength => format!("max(size({}))", expr),
            AggregateFunction::AverageLength => format!("avg(size({}))", expr),
        }
    }

    /// Length functions compare against plain numbers
    pub fn compares_lengths(&self) -> bool {
        matches!(
            self,
            AggregateFunction::ShortestLength
                | AggregateFunction::LongestLength
                | AggregateFunction::AverageLength
        )
    }
}

/// Comparison applied to an aggregate result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateComparison {
    Equal,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl AggregateComparison {
    const SUFFIXES: [(&'static str, AggregateComparison); 5] = [
        ("_EQUAL", AggregateComparison::Equal),
        ("_GTE", AggregateComparison::Gte),
        ("_GT", AggregateComparison::Gt),
        ("_LTE", AggregateComparison::Lte),
        ("_LT", AggregateComparison::Lt),
    ];

    pub fn symbol(&self) -> &'static str {
        match self {
            AggregateComparison::Equal => "=",
            AggregateComparison::Gt => ">",
            AggregateComparison::Gte => ">=",
            AggregateComparison::Lt => "<",
            AggregateComparison::Lte => "<=",
        }
    }

    /// `count`, `count_GT`, ...
    pub(crate) fn parse_count(key: &str) -> Option<Self> {
        if key == "count" {
            return Some(AggregateComparison::Equal);
        }
        let rest = key.strip_prefix("count")?;
        Self::SUFFIXES
            .iter()
            .find(|(suffix, _)| *suffix != "_EQUAL" && rest == *suffix)
            .map(|(_, c)| *c)
    }
}

/// Split `name_AVERAGE_LENGTH_GT` into (`name`, function, comparison)
pub(crate) fn parse_aggregate_key(key: &str) -> Option<(&str, AggregateFunction, AggregateComparison)> {
    for (cmp_suffix, cmp) in AggregateComparison::SUFFIXES {
        let Some(head) = key.strip_suffix(cmp_suffix) else {
            continue;
        };
        for (fn_suffix, func) in AggregateFunction::SUFFIXES {
            if let Some(base) = head.strip_suffix(fn_suffix) {
                if !base.is_empty() {
                    return Some((base, func, cmp));
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("name_AVERAGE_LENGTH_GT", "name", AggregateFunction::AverageLength, AggregateComparison::Gt ; "average length")]
    #[test_case("age_MIN_LTE", "age", AggregateFunction::Min, AggregateComparison::Lte ; "min lte")]
    #[test_case("score_SUM_EQUAL", "score", AggregateFunction::Sum, AggregateComparison::Equal ; "sum equal")]
    #[test_case("title_SHORTEST_LENGTH_GTE", "title", AggregateFunction::ShortestLength, AggregateComparison::Gte ; "shortest")]
    #[test_case("rating_AVERAGE_LT", "rating", AggregateFunction::Average, AggregateComparison::Lt ; "average")]
    fn test_parse_aggregate_key(
        key: &str,
        base: &str,
        func: AggregateFunction,
        cmp: AggregateComparison,
    ) {
        assert_eq!(parse_aggregate_key(key), Some((base, func, cmp)));
    }

    #[test]
    fn test_parse_aggregate_key_rejects_plain() {
        assert_eq!(parse_aggregate_key("name"), None);
        assert_eq!(parse_aggregate_key("name_GT"), None);
        assert_eq!(parse_aggregate_key("_MIN_GT"), None);
    }

    #[test]
    fn test_parse_count() {
        assert_eq!(AggregateComparison::parse_count("count"), Some(AggregateComparison::Equal));
        assert_eq!(AggregateComparison::parse_count("count_GTE"), Some(AggregateComparison::Gte));
        assert_eq!(AggregateComparison::parse_count("count_EQUAL"), None);
        assert_eq!(AggregateComparison::parse_count("counter"), None);
    }

    #[test]
    fn test_length_functions_only_for_strings() {
        assert!(AggregateFunction::AverageLength.accepts(ScalarKind::String));
        assert!(!AggregateFunction::AverageLength.accepts(ScalarKind::Int));
        assert!(AggregateFunction::Max.accepts(ScalarKind::DateTime));
        assert!(!AggregateFunction::Sum.accepts(ScalarKind::DateTime));
    }
}
