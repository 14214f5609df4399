//! Two-pass schema model builder.
//!
//! Pass one registers a stub for every declared name so declarations may
//! reference each other in any order. Pass two resolves field types,
//! relationship targets and annotations against that index.

use super::{
    Attribute, AttributeKind, AttributeType, Cardinality, ComputedField, ComputedResult,
    EnumType, FieldDeclaration, FieldSet, InterfaceType, NodeType, PropertiesType,
    RelationshipField, SchemaDeclarations, SchemaModel, TargetKind, TypeDeclaration, TypeId,
    TypeRef, UnionType,
};
use crate::annotation::{
    Annotation, AnnotationKind, AnnotationParser, AnnotationSet, AnnotationTarget, Direction,
    RelationshipAnnotation, RuleEffect, ToggleOrigin,
};
use crate::error::{AnnotationError, ModelError, ModelResult};
use crate::schema::ScalarKind;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

static NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid name regex"));

/// Builds a [`SchemaModel`] from [`SchemaDeclarations`]
pub struct SchemaBuilder<'a> {
    declarations: &'a SchemaDeclarations,
    index: HashMap<String, TypeId>,
}

impl<'a> SchemaBuilder<'a> {
    pub fn new(declarations: &'a SchemaDeclarations) -> Self {
        Self {
            declarations,
            index: HashMap::new(),
        }
    }

    pub fn build(mut self) -> ModelResult<SchemaModel> {
        self.collect_stubs()?;

        let decls = self.declarations;
        let enums = decls
            .enums
            .iter()
            .map(|e| EnumType {
                name: e.name.clone(),
                values: e.values.clone(),
            })
            .collect();

        let properties = decls
            .relationship_properties
            .iter()
            .map(|decl| self.resolve_properties(decl))
            .collect::<ModelResult<Vec<_>>>()?;

        let mut interfaces = decls
            .interfaces
            .iter()
            .map(|decl| self.resolve_interface(decl))
            .collect::<ModelResult<Vec<_>>>()?;

        let mut nodes = decls
            .nodes
            .iter()
            .map(|decl| self.resolve_node(decl, &interfaces))
            .collect::<ModelResult<Vec<_>>>()?;

        for node in &nodes {
            for iface_name in &node.interfaces {
                if let Some(iface) = interfaces.iter_mut().find(|i| &i.name == iface_name) {
                    check_interface_fields(node, iface)?;
                    iface.implementers.push(node.name.clone());
                }
            }
        }

        let unions = decls
            .unions
            .iter()
            .map(|u| self.resolve_union(u))
            .collect::<ModelResult<Vec<_>>>()?;

        link_inverses(&mut nodes);

        info!(
            nodes = nodes.len(),
            interfaces = interfaces.len(),
            unions = unions.len(),
            enums = decls.enums.len(),
            "built schema model"
        );

        Ok(SchemaModel {
            nodes,
            interfaces,
            unions,
            enums,
            properties,
            index: self.index,
        })
    }

    /// Pass one: register every name
    fn collect_stubs(&mut self) -> ModelResult<()> {
        let decls = self.declarations;
        let names = decls
            .nodes
            .iter()
            .enumerate()
            .map(|(i, d)| (d.name.as_str(), TypeId::Node(i)))
            .chain(
                decls
                    .interfaces
                    .iter()
                    .enumerate()
                    .map(|(i, d)| (d.name.as_str(), TypeId::Interface(i))),
            )
            .chain(
                decls
                    .unions
                    .iter()
                    .enumerate()
                    .map(|(i, d)| (d.name.as_str(), TypeId::Union(i))),
            )
            .chain(
                decls
                    .enums
                    .iter()
                    .enumerate()
                    .map(|(i, d)| (d.name.as_str(), TypeId::Enum(i))),
            )
            .chain(
                decls
                    .relationship_properties
                    .iter()
                    .enumerate()
                    .map(|(i, d)| (d.name.as_str(), TypeId::Properties(i))),
            );

        for (name, id) in names {
            validate_type_name(name)?;
            if self.index.insert(name.to_string(), id).is_some() {
                return Err(ModelError::DuplicateType {
                    name: name.to_string(),
                });
            }
        }
        debug!(types = self.index.len(), "collected type stubs");
        Ok(())
    }

    fn resolve_properties(&self, decl: &TypeDeclaration) -> ModelResult<PropertiesType> {
        if let Some(raw) = decl.annotations.first() {
            return Err(AnnotationError::WrongLocation {
                annotation: raw.name.clone(),
                location: "relationship properties".to_string(),
                target: decl.name.clone(),
            }
            .into());
        }
        let fields = self.resolve_fields(&decl.name, &decl.fields, &[])?;
        if let Some(field) = fields.relationships.first().map(|r| r.name.clone()).or_else(|| {
            fields.computed.first().map(|c| c.name.clone())
        }) {
            return Err(ModelError::InvalidTypeReference {
                owner: decl.name.clone(),
                field,
                reference: "relationship properties".to_string(),
                reason: "only scalar and enum attributes are allowed".to_string(),
            });
        }
        Ok(PropertiesType {
            name: decl.name.clone(),
            attributes: fields.attributes,
        })
    }

    fn resolve_interface(&self, decl: &TypeDeclaration) -> ModelResult<InterfaceType> {
        let annotations = parse_annotations(
            &decl.annotations,
            &AnnotationTarget::interface(&decl.name),
        )?;
        check_type_conflicts(&decl.name, &annotations)?;
        let fields = self.resolve_fields(&decl.name, &decl.fields, &[])?;
        Ok(InterfaceType {
            name: decl.name.clone(),
            fields,
            implementers: Vec::new(),
            annotations,
        })
    }

    fn resolve_node(
        &self,
        decl: &TypeDeclaration,
        interfaces: &[InterfaceType],
    ) -> ModelResult<NodeType> {
        let mut implemented = Vec::new();
        for iface in &decl.implements {
            match self.index.get(iface) {
                Some(TypeId::Interface(_)) => {
                    if let Some(resolved) = interfaces.iter().find(|i| &i.name == iface) {
                        implemented.push(resolved);
                    }
                }
                _ => {
                    return Err(ModelError::UndeclaredInterface {
                        type_name: decl.name.clone(),
                        interface: iface.clone(),
                    })
                }
            }
        }

        let annotations =
            parse_annotations(&decl.annotations, &AnnotationTarget::node(&decl.name))?;
        check_type_conflicts(&decl.name, &annotations)?;

        let fields = self.resolve_fields(&decl.name, &decl.fields, &implemented)?;
        let labels = annotations
            .labels()
            .map(<[String]>::to_vec)
            .unwrap_or_else(|| vec![decl.name.clone()]);

        Ok(NodeType {
            name: decl.name.clone(),
            labels,
            fields,
            interfaces: decl.implements.clone(),
            annotations,
        })
    }

    fn resolve_union(&self, decl: &super::UnionDeclaration) -> ModelResult<UnionType> {
        if decl.members.is_empty() {
            return Err(ModelError::InvalidUnionMember {
                union: decl.name.clone(),
                member: String::new(),
            });
        }
        for member in &decl.members {
            match self.index.get(member) {
                Some(TypeId::Node(_)) => {}
                _ => {
                    return Err(ModelError::InvalidUnionMember {
                        union: decl.name.clone(),
                        member: member.clone(),
                    })
                }
            }
        }
        Ok(UnionType {
            name: decl.name.clone(),
            members: decl.members.clone(),
        })
    }

    fn resolve_fields(
        &self,
        owner: &str,
        decls: &[FieldDeclaration],
        interfaces: &[&InterfaceType],
    ) -> ModelResult<FieldSet> {
        let mut seen = HashSet::new();
        let mut fields = FieldSet::default();

        for decl in decls {
            if !NAME_RE.is_match(&decl.name) || decl.name.starts_with("__") {
                return Err(ModelError::InvalidName {
                    name: format!("{}.{}", owner, decl.name),
                    reason: "field names must be identifiers and must not start with '__'"
                        .to_string(),
                });
            }
            if !seen.insert(decl.name.as_str()) {
                return Err(ModelError::DuplicateField {
                    type_name: owner.to_string(),
                    field: decl.name.clone(),
                });
            }

            let type_ref =
                TypeRef::parse(&decl.type_ref).map_err(|reason| ModelError::InvalidTypeReference {
                    owner: owner.to_string(),
                    field: decl.name.clone(),
                    reference: decl.type_ref.clone(),
                    reason,
                })?;

            let target = AnnotationTarget::field(owner, &decl.name);
            let mut annotations = parse_annotations(&decl.annotations, &target)?;
            check_field_annotations(owner, &decl.name, &annotations)?;

            if let Some(binding) = annotations.computed().cloned() {
                if annotations.relationship().is_some() {
                    return Err(conflict(
                        &target,
                        "@cypher and @relationship cannot both be applied",
                    ));
                }
                if binding.result_column.as_deref().map_or(true, str::is_empty) {
                    return Err(ModelError::MissingResultColumn {
                        owner: owner.to_string(),
                        field: decl.name.clone(),
                    });
                }
                let result = match self.resolve_named(owner, &decl.name, &type_ref)? {
                    Resolved::Attribute(ty) => ComputedResult::Scalar(ty),
                    Resolved::Object(target, target_kind) => ComputedResult::Node {
                        target,
                        target_kind,
                        list: type_ref.list,
                    },
                };
                fields.computed.push(ComputedField {
                    owner: owner.to_string(),
                    name: decl.name.clone(),
                    binding,
                    result,
                    annotations,
                });
                continue;
            }

            match self.resolve_named(owner, &decl.name, &type_ref)? {
                Resolved::Attribute(ty) => {
                    if annotations.relationship().is_some() {
                        return Err(ModelError::InvalidRelationship {
                            owner: owner.to_string(),
                            field: decl.name.clone(),
                            reason: "@relationship requires a node, interface or union type"
                                .to_string(),
                        });
                    }
                    let db_name = annotations.alias().unwrap_or(&decl.name).to_string();
                    fields.attributes.push(Attribute {
                        owner: owner.to_string(),
                        name: decl.name.clone(),
                        db_name,
                        ty,
                        annotations,
                    });
                }
                Resolved::Object(target_name, target_kind) => {
                    let rel = match annotations.relationship().cloned() {
                        Some(rel) => rel,
                        None => {
                            let inherited = inherited_relationship(interfaces, &decl.name)
                                .ok_or_else(|| ModelError::InvalidRelationship {
                                    owner: owner.to_string(),
                                    field: decl.name.clone(),
                                    reason: format!(
                                        "field of type '{}' needs @relationship or @cypher",
                                        target_name
                                    ),
                                })?;
                            annotations.push(Annotation::Relationship(inherited.clone()));
                            inherited
                        }
                    };
                    fields.relationships.push(self.relationship_field(
                        owner,
                        &decl.name,
                        &type_ref,
                        target_name,
                        target_kind,
                        rel,
                        annotations,
                    )?);
                }
            }
        }
        Ok(fields)
    }

    #[allow(clippy::too_many_arguments)]
    fn relationship_field(
        &self,
        owner: &str,
        field: &str,
        type_ref: &TypeRef,
        target: String,
        target_kind: TargetKind,
        rel: RelationshipAnnotation,
        annotations: AnnotationSet,
    ) -> ModelResult<RelationshipField> {
        if let Some(props) = &rel.properties {
            match self.index.get(props) {
                Some(TypeId::Properties(_)) => {}
                Some(_) => {
                    return Err(ModelError::InvalidRelationship {
                        owner: owner.to_string(),
                        field: field.to_string(),
                        reason: format!("'{}' is not a relationship-properties type", props),
                    })
                }
                None => {
                    return Err(ModelError::UndeclaredType {
                        owner: owner.to_string(),
                        field: field.to_string(),
                        referenced: props.clone(),
                    })
                }
            }
        }

        let cardinality = if type_ref.list {
            Cardinality::Many
        } else {
            Cardinality::One {
                required: type_ref.required,
            }
        };

        Ok(RelationshipField {
            owner: owner.to_string(),
            name: field.to_string(),
            rel_type: rel.rel_type,
            direction: rel.direction,
            undirected_queries: rel.undirected_queries,
            target,
            target_kind,
            cardinality,
            properties: rel.properties,
            inverse: None,
            annotations,
        })
    }

    fn resolve_named(&self, owner: &str, field: &str, type_ref: &TypeRef) -> ModelResult<Resolved> {
        if let Some(kind) = ScalarKind::from_name(&type_ref.name) {
            return Ok(Resolved::Attribute(attribute_type(
                AttributeKind::Scalar(kind),
                type_ref,
            )));
        }
        match self.index.get(&type_ref.name) {
            Some(TypeId::Enum(_)) => Ok(Resolved::Attribute(attribute_type(
                AttributeKind::Enum(type_ref.name.clone()),
                type_ref,
            ))),
            Some(TypeId::Node(_)) => Ok(Resolved::Object(type_ref.name.clone(), TargetKind::Node)),
            Some(TypeId::Interface(_)) => Ok(Resolved::Object(
                type_ref.name.clone(),
                TargetKind::Interface,
            )),
            Some(TypeId::Union(_)) => {
                Ok(Resolved::Object(type_ref.name.clone(), TargetKind::Union))
            }
            Some(TypeId::Properties(_)) => Err(ModelError::InvalidTypeReference {
                owner: owner.to_string(),
                field: field.to_string(),
                reference: type_ref.to_string(),
                reason: "relationship-properties types cannot be used as field types".to_string(),
            }),
            None => Err(ModelError::UndeclaredType {
                owner: owner.to_string(),
                field: field.to_string(),
                referenced: type_ref.name.clone(),
            }),
        }
    }
}

enum Resolved {
    Attribute(AttributeType),
    Object(String, TargetKind),
}

fn attribute_type(kind: AttributeKind, type_ref: &TypeRef) -> AttributeType {
    AttributeType {
        kind,
        list: type_ref.list,
        required: type_ref.required,
        items_required: type_ref.items_required,
    }
}

fn validate_type_name(name: &str) -> ModelResult<()> {
    if !NAME_RE.is_match(name) {
        return Err(ModelError::InvalidName {
            name: name.to_string(),
            reason: "type names must be identifiers".to_string(),
        });
    }
    if name.starts_with("__") {
        return Err(ModelError::InvalidName {
            name: name.to_string(),
            reason: "names starting with '__' are reserved".to_string(),
        });
    }
    if ScalarKind::from_name(name).is_some() {
        return Err(ModelError::InvalidName {
            name: name.to_string(),
            reason: "shadows a built-in scalar".to_string(),
        });
    }
    Ok(())
}

fn parse_annotations(
    raws: &[super::RawAnnotation],
    target: &AnnotationTarget<'_>,
) -> ModelResult<AnnotationSet> {
    let mut set = AnnotationSet::default();
    let mut kinds = HashSet::new();
    for raw in raws {
        let annotation = AnnotationParser::parse(raw, target)?;
        let kind = annotation.kind();
        // Several toggle annotations may stack; conflicts are checked separately
        if kind != AnnotationKind::OperationToggles && !kinds.insert(kind) {
            return Err(conflict(target, &format!("@{} applied more than once", kind)));
        }
        set.push(annotation);
    }
    Ok(set)
}

fn conflict(target: &AnnotationTarget<'_>, message: &str) -> ModelError {
    ModelError::ConflictingAnnotations {
        target: target.describe(),
        message: message.to_string(),
    }
}

/// `@exclude` cannot be combined with the annotations that replaced it
fn check_type_conflicts(name: &str, annotations: &AnnotationSet) -> ModelResult<()> {
    let target = AnnotationTarget::node(name);
    let origins = annotations.toggle_origins();
    let excluded = origins.contains(&ToggleOrigin::Exclude);

    if excluded {
        if origins.contains(&ToggleOrigin::Query) {
            return Err(conflict(&target, "@exclude cannot be combined with @query"));
        }
        if origins.contains(&ToggleOrigin::Mutation) {
            return Err(conflict(&target, "@exclude cannot be combined with @mutation"));
        }
        if annotations.subscription_filter().is_some() {
            return Err(conflict(&target, "@exclude cannot be combined with @subscription"));
        }
    }

    let mut seen = HashSet::new();
    for origin in origins {
        if !seen.insert(origin) {
            let message = match origin {
                ToggleOrigin::Query => "@query applied more than once",
                ToggleOrigin::Mutation => "@mutation applied more than once",
                ToggleOrigin::Exclude => "@exclude applied more than once",
            };
            return Err(conflict(&target, message));
        }
    }
    Ok(())
}

fn check_field_annotations(
    owner: &str,
    field: &str,
    annotations: &AnnotationSet,
) -> ModelResult<()> {
    let target = AnnotationTarget::field(owner, field);
    if let Some(auth) = annotations.authorization() {
        if auth.rules(RuleEffect::Filter).next().is_some() {
            return Err(AnnotationError::InvalidValue {
                annotation: "authorization".to_string(),
                target: target.describe(),
                argument: "filter".to_string(),
                reason: "fields only support validate rules".to_string(),
            }
            .into());
        }
    }
    for annotation in annotations.iter() {
        let clash = match annotation {
            Annotation::Id(_) | Annotation::Unique(_) | Annotation::Timestamp(_) => {
                annotations.computed().is_some()
            }
            Annotation::Default(_) => {
                annotations.computed().is_some() || annotations.id().is_some()
            }
            Annotation::Alias(_) => annotations.computed().is_some(),
            Annotation::Authorization(_)
            | Annotation::Computed(_)
            | Annotation::OperationToggles(_)
            | Annotation::SubscriptionFilter(_)
            | Annotation::Relationship(_)
            | Annotation::Limit(_)
            | Annotation::NodeLabels(_) => false,
        };
        if clash {
            return Err(conflict(
                &target,
                &format!("@{} cannot be combined with the other annotations here", annotation.kind()),
            ));
        }
    }
    Ok(())
}

fn inherited_relationship(
    interfaces: &[&InterfaceType],
    field: &str,
) -> Option<RelationshipAnnotation> {
    interfaces
        .iter()
        .filter_map(|i| i.fields.relationship(field))
        .find_map(|r| r.annotations.relationship().cloned())
}

fn check_interface_fields(node: &NodeType, iface: &InterfaceType) -> ModelResult<()> {
    for field in iface.fields.names() {
        if !node.fields.contains(field) {
            return Err(ModelError::MissingInterfaceField {
                type_name: node.name.clone(),
                interface: iface.name.clone(),
                field: field.to_string(),
            });
        }
    }
    Ok(())
}

/// Record, for every relationship field, the field on the target that
/// traverses the same edge type in the opposite direction.
fn link_inverses(nodes: &mut [NodeType]) {
    let mut inverses = Vec::new();
    for (ni, node) in nodes.iter().enumerate() {
        for (ri, rel) in node.fields.relationships.iter().enumerate() {
            let opposite = match rel.direction {
                Direction::Out => Direction::In,
                Direction::In => Direction::Out,
                Direction::Undirected => Direction::Undirected,
            };
            let inverse = nodes
                .iter()
                .find(|n| n.name == rel.target)
                .and_then(|target| {
                    target.fields.relationships.iter().find(|other| {
                        other.rel_type == rel.rel_type
                            && other.direction == opposite
                            && other.target == node.name
                    })
                })
                .map(|other| other.name.clone());
            inverses.push((ni, ri, inverse));
        }
    }
    for (ni, ri, inverse) in inverses {
        nodes[ni].fields.relationships[ri].inverse = inverse;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{RawAnnotation, UnionDeclaration};
    use serde_json::json;

    fn rel(rel_type: &str, direction: &str) -> RawAnnotation {
        RawAnnotation::new("relationship")
            .with_argument("type", json!(rel_type))
            .with_argument("direction", json!(direction))
    }

    fn movies() -> SchemaDeclarations {
        SchemaDeclarations {
            nodes: vec![
                TypeDeclaration::new("Movie")
                    .field("title", "String!")
                    .annotated_field("actors", "[Actor!]!", vec![rel("ACTED_IN", "IN")]),
                TypeDeclaration::new("Actor")
                    .field("name", "String!")
                    .annotated_field("movies", "[Movie!]!", vec![rel("ACTED_IN", "OUT")]),
            ],
            ..Default::default()
        }
    }

    // ===== Successful builds =====

    #[test]
    fn test_builds_cross_linked_model() {
        let model = SchemaModel::build(&movies()).unwrap();
        let movie = model.node("Movie").unwrap();
        let actors = movie.fields.relationship("actors").unwrap();
        assert_eq!(actors.target, "Actor");
        assert_eq!(actors.direction, Direction::In);
        assert_eq!(actors.cardinality, Cardinality::Many);
        assert_eq!(actors.inverse.as_deref(), Some("movies"));
        assert_eq!(movie.labels, vec!["Movie".to_string()]);
    }

    #[test]
    fn test_forward_references_are_legal() {
        // Actor is referenced before it is declared
        let decls = SchemaDeclarations {
            nodes: vec![
                TypeDeclaration::new("Movie")
                    .annotated_field("lead", "Actor", vec![rel("STARS", "OUT")]),
                TypeDeclaration::new("Actor").field("name", "String"),
            ],
            ..Default::default()
        };
        let model = SchemaModel::build(&decls).unwrap();
        let lead = model.node("Movie").unwrap().fields.relationship("lead").unwrap();
        assert_eq!(lead.cardinality, Cardinality::One { required: false });
    }

    #[test]
    fn test_interface_implementers_and_inherited_relationship() {
        let decls = SchemaDeclarations {
            interfaces: vec![TypeDeclaration::new("Production")
                .field("title", "String!")
                .annotated_field("actors", "[Actor!]!", vec![rel("ACTED_IN", "IN")])],
            nodes: vec![
                TypeDeclaration::new("Movie")
                    .implements("Production")
                    .field("title", "String!")
                    .field("actors", "[Actor!]!"),
                TypeDeclaration::new("Series")
                    .implements("Production")
                    .field("title", "String!")
                    .field("actors", "[Actor!]!"),
                TypeDeclaration::new("Actor").field("name", "String!"),
            ],
            ..Default::default()
        };
        let model = SchemaModel::build(&decls).unwrap();
        let names: Vec<_> = model
            .concrete_types("Production")
            .into_iter()
            .map(|n| n.name.as_str())
            .collect();
        assert_eq!(names, vec!["Movie", "Series"]);
        let series_actors = model.node("Series").unwrap().fields.relationship("actors").unwrap();
        assert_eq!(series_actors.rel_type, "ACTED_IN");
    }

    #[test]
    fn test_alias_sets_db_name() {
        let decls = SchemaDeclarations {
            nodes: vec![TypeDeclaration::new("Movie").annotated_field(
                "title",
                "String",
                vec![RawAnnotation::new("alias").with_argument("property", json!("name"))],
            )],
            ..Default::default()
        };
        let model = SchemaModel::build(&decls).unwrap();
        let title = model.node("Movie").unwrap().fields.attribute("title").unwrap();
        assert_eq!(title.db_name, "name");
    }

    // ===== Failures =====

    #[test]
    fn test_duplicate_type_name() {
        let decls = SchemaDeclarations {
            nodes: vec![TypeDeclaration::new("Movie"), TypeDeclaration::new("Movie")],
            ..Default::default()
        };
        assert!(matches!(
            SchemaModel::build(&decls),
            Err(ModelError::DuplicateType { ref name }) if name == "Movie"
        ));
    }

    #[test]
    fn test_duplicate_across_kinds() {
        let decls = SchemaDeclarations {
            nodes: vec![TypeDeclaration::new("Genre")],
            enums: vec![crate::schema::EnumDeclaration {
                name: "Genre".to_string(),
                values: vec!["DRAMA".to_string()],
            }],
            ..Default::default()
        };
        assert!(matches!(SchemaModel::build(&decls), Err(ModelError::DuplicateType { .. })));
    }

    #[test]
    fn test_relationship_to_undeclared_type() {
        let decls = SchemaDeclarations {
            nodes: vec![TypeDeclaration::new("Movie")
                .annotated_field("studio", "Studio", vec![rel("MADE_BY", "OUT")])],
            ..Default::default()
        };
        assert!(matches!(
            SchemaModel::build(&decls),
            Err(ModelError::UndeclaredType { ref referenced, .. }) if referenced == "Studio"
        ));
    }

    #[test]
    fn test_exclude_conflicts_with_query() {
        let decls = SchemaDeclarations {
            nodes: vec![TypeDeclaration::new("Movie")
                .field("title", "String")
                .annotation(RawAnnotation::new("exclude"))
                .annotation(RawAnnotation::new("query").with_argument("read", json!(false)))],
            ..Default::default()
        };
        assert!(matches!(
            SchemaModel::build(&decls),
            Err(ModelError::ConflictingAnnotations { .. })
        ));
    }

    #[test]
    fn test_computed_without_column() {
        let decls = SchemaDeclarations {
            nodes: vec![TypeDeclaration::new("Movie").annotated_field(
                "score",
                "Float",
                vec![RawAnnotation::new("cypher")
                    .with_argument("statement", json!("RETURN 1.0 AS s"))],
            )],
            ..Default::default()
        };
        assert!(matches!(
            SchemaModel::build(&decls),
            Err(ModelError::MissingResultColumn { ref field, .. }) if field == "score"
        ));
    }

    #[test]
    fn test_object_field_without_relationship() {
        let decls = SchemaDeclarations {
            nodes: vec![
                TypeDeclaration::new("Movie").field("lead", "Actor"),
                TypeDeclaration::new("Actor").field("name", "String"),
            ],
            ..Default::default()
        };
        assert!(matches!(
            SchemaModel::build(&decls),
            Err(ModelError::InvalidRelationship { .. })
        ));
    }

    #[test]
    fn test_union_member_must_be_node() {
        let decls = SchemaDeclarations {
            nodes: vec![TypeDeclaration::new("Movie")],
            unions: vec![UnionDeclaration {
                name: "Search".to_string(),
                members: vec!["Movie".to_string(), "Unknown".to_string()],
            }],
            ..Default::default()
        };
        assert!(matches!(
            SchemaModel::build(&decls),
            Err(ModelError::InvalidUnionMember { ref member, .. }) if member == "Unknown"
        ));
    }

    #[test]
    fn test_missing_interface_field() {
        let decls = SchemaDeclarations {
            interfaces: vec![TypeDeclaration::new("Named").field("name", "String")],
            nodes: vec![TypeDeclaration::new("Movie").implements("Named").field("title", "String")],
            ..Default::default()
        };
        assert!(matches!(
            SchemaModel::build(&decls),
            Err(ModelError::MissingInterfaceField { .. })
        ));
    }

    #[test]
    fn test_undeclared_interface() {
        let decls = SchemaDeclarations {
            nodes: vec![TypeDeclaration::new("Movie").implements("Production")],
            ..Default::default()
        };
        assert!(matches!(
            SchemaModel::build(&decls),
            Err(ModelError::UndeclaredInterface { .. })
        ));
    }

    #[test]
    fn test_annotation_error_propagates() {
        let decls = SchemaDeclarations {
            nodes: vec![TypeDeclaration::new("Movie")
                .annotation(RawAnnotation::new("limit").with_argument("max", json!("lots")))],
            ..Default::default()
        };
        assert!(matches!(
            SchemaModel::build(&decls),
            Err(ModelError::Annotation(AnnotationError::InvalidValue { .. }))
        ));
    }

    #[test]
    fn test_scalar_name_cannot_be_redeclared() {
        let decls = SchemaDeclarations {
            nodes: vec![TypeDeclaration::new("String")],
            ..Default::default()
        };
        assert!(matches!(SchemaModel::build(&decls), Err(ModelError::InvalidName { .. })));
    }

    #[test]
    fn test_field_filter_rule_rejected() {
        let decls = SchemaDeclarations {
            nodes: vec![TypeDeclaration::new("User").annotated_field(
                "email",
                "String",
                vec![RawAnnotation::new("authorization").with_argument("filter", json!([{}]))],
            )],
            ..Default::default()
        };
        assert!(matches!(
            SchemaModel::build(&decls),
            Err(ModelError::Annotation(AnnotationError::InvalidValue { .. }))
        ));
    }
}
