//! Ada source emitter.
//!
//! Pure text rendering over resolved pairs; no name resolution happens here.
//! Every `Map` declaration goes into the package spec before any body is
//! rendered, so mutually referencing pairs need no topological ordering.
//! Output is byte-deterministic: pairs render in the order given, fields in
//! destination declaration order.

use crate::arrays::{index_names, ArrayPlan};
use crate::resolve::{PairKind, ResolvedField, ResolvedPair, ValuePlan};
use crate::schema::TypeGraph;

const HEADER: &str = "--  Generated by adamap. Do not edit.\n";

/// One generated Ada compilation unit: package spec and body text.
#[derive(Debug, Clone, PartialEq)]
pub struct EmittedUnit {
    pub unit_name: String,
    pub spec: String,
    pub body: String,
}

impl EmittedUnit {
    /// GNAT-style file stem ("Position_Mappers" -> "position_mappers").
    pub fn file_stem(&self) -> String {
        self.unit_name.to_ascii_lowercase().replace('.', "-")
    }
}

fn qualify(graph: &TypeGraph, key: &str) -> String {
    format!("{}.{}", graph.package, graph.display_name(key))
}

/// Render one value plan against a source expression string.
fn value_expr(plan: &ValuePlan, src_expr: &str) -> String {
    match plan {
        ValuePlan::Cast { dst_mark, .. } => format!("{dst_mark} ({src_expr})"),
        ValuePlan::Delegate { .. } => format!("Map({src_expr})"),
        ValuePlan::EnumCase { arms } => {
            let alts = arms
                .iter()
                .map(|(s, d)| format!("when {s} => {d}"))
                .collect::<Vec<_>>()
                .join(", ");
            format!("(case {src_expr} is {alts})")
        }
        ValuePlan::Inline { fields } => {
            let parts = fields
                .iter()
                .map(|f| {
                    let sub = value_expr(&f.plan, &format!("{src_expr}.{}", f.src_field));
                    format!("{} => {sub}", f.dest)
                })
                .collect::<Vec<_>>()
                .join(", ");
            format!("( {parts} )")
        }
        ValuePlan::Default => "<>".to_string(),
    }
}

fn record_association(f: &ResolvedField) -> String {
    if matches!(f.plan, ValuePlan::Default) {
        return format!("{} => <>", f.dest);
    }
    let src_expr = format!("X.{}", f.path.join("."));
    format!("{} => {}", f.dest, value_expr(&f.plan, &src_expr))
}

fn spec_line(src: &TypeGraph, dst: &TypeGraph, pair: &ResolvedPair) -> String {
    let from = qualify(src, &pair.key.0);
    let to = qualify(dst, &pair.key.1);
    let param = match pair.kind {
        PairKind::Record { .. } => "X",
        PairKind::Enum { .. } => "E",
        PairKind::Array(_) => "A",
    };
    format!("   function Map ({param} : {from}) return {to};\n")
}

fn record_body(src: &TypeGraph, dst: &TypeGraph, pair: &ResolvedPair, fields: &[ResolvedField]) -> String {
    let from = qualify(src, &pair.key.0);
    let to = qualify(dst, &pair.key.1);
    let joined = fields
        .iter()
        .map(record_association)
        .collect::<Vec<_>>()
        .join(",\n       ");
    format!(
        "   function Map (X : {from}) return {to} is\n     ( {joined} );\n"
    )
}

fn enum_body(src: &TypeGraph, dst: &TypeGraph, pair: &ResolvedPair, arms: &[(String, String)]) -> String {
    let from = qualify(src, &pair.key.0);
    let to = qualify(dst, &pair.key.1);
    let alts = arms
        .iter()
        .map(|(s, d)| format!("when {s} => {d}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "   function Map (E : {from}) return {to} is\n     (case E is {alts});\n"
    )
}

fn array_body(src: &TypeGraph, dst: &TypeGraph, pair: &ResolvedPair, plan: &ArrayPlan) -> String {
    let from = qualify(src, &pair.key.0);
    let to = qualify(dst, &pair.key.1);
    let rank = plan.rank();
    let indices = index_names(rank);

    let mut asserts = String::new();
    for (i, guarded) in plan.guard.iter().enumerate() {
        if *guarded {
            if rank == 1 {
                asserts.push_str("      pragma Assert (A'Length >= R'Length);\n");
            } else {
                asserts.push_str(&format!(
                    "      pragma Assert (A'Length ({k}) >= R'Length ({k}));\n",
                    k = i + 1
                ));
            }
        }
    }

    let mut lines = Vec::new();
    let indent = "      ";
    for (level, idx) in indices.iter().enumerate() {
        let spaces = format!("{indent}{}", "   ".repeat(level));
        let range_attr = if level == 0 {
            "R'Range".to_string()
        } else {
            format!("R'Range({})", level + 1)
        };
        lines.push(format!("{spaces}for {idx} in {range_attr} loop"));
    }
    let assign_indent = format!("{indent}{}", "   ".repeat(rank));
    let joined_idx = indices.join(", ");
    let (dest_expr, access_expr) = if rank > 1 {
        (format!("R({joined_idx})"), format!("A({joined_idx})"))
    } else {
        ("R(I)".to_string(), "A(I)".to_string())
    };
    let elem = value_expr(&plan.elem, &access_expr);
    lines.push(format!("{assign_indent}{dest_expr} := {elem};"));
    for level in (0..rank).rev() {
        let spaces = format!("{indent}{}", "   ".repeat(level));
        lines.push(format!("{spaces}end loop;"));
    }
    let loops = lines.join("\n");

    format!(
        "   function Map (A : {from}) return {to} is\n\
         \x20     R : {to};\n\
         \x20  begin\n\
         {asserts}{loops}\n\
         \x20     return R;\n\
         \x20  end Map;\n"
    )
}

fn pair_body(src: &TypeGraph, dst: &TypeGraph, pair: &ResolvedPair) -> String {
    match &pair.kind {
        PairKind::Record { fields } => record_body(src, dst, pair, fields),
        PairKind::Enum { arms } => enum_body(src, dst, pair, arms),
        PairKind::Array(plan) => array_body(src, dst, pair, plan),
    }
}

/// Render the full compilation unit for a set of resolved pairs.
pub fn render(
    unit_name: &str,
    src: &TypeGraph,
    dst: &TypeGraph,
    pairs: &[&ResolvedPair],
) -> EmittedUnit {
    let mut spec = String::new();
    spec.push_str(HEADER);
    spec.push('\n');
    spec.push_str(&format!("with {};\n", src.package));
    spec.push_str(&format!("with {};\n", dst.package));
    spec.push('\n');
    spec.push_str(&format!("package {unit_name} is\n\n"));
    for pair in pairs {
        spec.push_str(&spec_line(src, dst, pair));
    }
    spec.push_str(&format!("\nend {unit_name};\n"));

    let mut body = String::new();
    body.push_str(HEADER);
    body.push('\n');
    body.push_str(&format!("with {};\n", src.package));
    body.push_str(&format!("with {};\n", dst.package));
    // casts and enum literals use unqualified destination names
    body.push_str(&format!("use {};\n", dst.package));
    body.push('\n');
    body.push_str(&format!("package body {unit_name} is\n\n"));
    for pair in pairs {
        body.push_str(&pair_body(src, dst, pair));
        body.push('\n');
    }
    body.push_str(&format!("end {unit_name};\n"));

    EmittedUnit {
        unit_name: unit_name.to_string(),
        spec,
        body,
    }
}

// ------------------------------- Tests ------------------------------------ //
