use anyhow::Result;
use graphloom_query::{AuthOperation, SchemaModel};
use std::fmt::Write;
use std::path::Path;

/// Execute the check command
pub fn execute(schema: &Path) -> Result<()> {
    let model = super::load_model(schema)?;
    print!("{}", summary(&model));
    Ok(())
}

/// Human-readable overview of a built model
pub fn summary(model: &SchemaModel) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "schema ok: {} node types, {} interfaces, {} unions, {} enums",
        model.nodes().count(),
        model.interfaces().count(),
        model.unions().count(),
        model.enums().count()
    );

    for node in model.nodes() {
        let fields = &node.fields;
        let _ = writeln!(
            out,
            "  {} [{}]: {} attributes, {} relationships, {} computed",
            node.name,
            node.labels.join(":"),
            fields.attributes.len(),
            fields.relationships.len(),
            fields.computed.len()
        );
    }
    for interface in model.interfaces() {
        let _ = writeln!(out, "  interface {}: {}", interface.name, interface.implementers.join(", "));
    }
    for union in model.unions() {
        let _ = writeln!(out, "  union {}: {}", union.name, union.members.join(", "));
    }

    let guarded: Vec<&str> = AuthOperation::ALL
        .iter()
        .filter(|op| model.has_rules_for(**op))
        .map(|op| op.name())
        .collect();
    if !guarded.is_empty() {
        let _ = writeln!(out, "authorization rules for: {}", guarded.join(", "));
    }
    out
}
