//! Default provider: a line/pattern-driven scanner over `.ads` text.
//!
//! Best-effort by design: unrecognized lines are skipped, partial files are
//! fine, and formatting is free as long as one declaration stays on one line
//! (enum literal lists may span lines, as may record blocks).

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::GenError;
use crate::schema::{
    Dim, FieldDecl, NumericRepr, PrimitiveTy, RangeConstraint, Side, TypeDecl, TypeGraph, TypeKind,
    TypeRef,
};

use super::SchemaParser;

const NUM: &str = r"[-+]?[0-9][0-9_]*(?:\.[0-9_]+)?(?:[eE][-+]?[0-9]+)?";

macro_rules! rx {
    ($name:ident, $pat:expr) => {
        static $name: Lazy<Regex> = Lazy::new(|| Regex::new($pat).unwrap());
    };
}

rx!(PKG, r"(?i)^\s*package\s+([A-Za-z]\w*)\s+is\b");
rx!(END_NAMED, r"(?i)^\s*end\s+([A-Za-z][\w.]*)\s*;");
rx!(END_ANON, r"(?i)^\s*end\s*;");
rx!(REC_OPEN, r"(?i)^\s*type\s+([A-Za-z]\w*)\s+is\s+record\b");
rx!(REC_END, r"(?i)^\s*end\s+record\s*;");
rx!(FIELD, r"(?i)^\s*([A-Za-z]\w*)\s*:\s*([A-Za-z][\w.]*)\s*;");
rx!(ENUM_OPEN, r"(?i)^\s*type\s+([A-Za-z]\w*)\s+is\s*\(");
rx!(TYPE_DEFER, r"(?i)^\s*type\s+([A-Za-z]\w*)\s+is\s*$");
rx!(DIM_RANGE, r"(?i)^\s*([-+]?[0-9][0-9_]*)\s*\.\.\s*([-+]?[0-9][0-9_]*)\s*$");
rx!(DIM_NAMED, r"(?i)^\s*([A-Za-z][\w.]*)\s*$");

static INT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)^\s*type\s+([A-Za-z]\w*)\s+is\s+range\s+({NUM})\s*\.\.\s*({NUM})\s*;"
    ))
    .unwrap()
});
static FLT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)^\s*type\s+([A-Za-z]\w*)\s+is\s+digits\s+(\d+)(?:\s+range\s+({NUM})\s*\.\.\s*({NUM}))?\s*;"
    ))
    .unwrap()
});
static FIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)^\s*type\s+([A-Za-z]\w*)\s+is\s+delta\s+({NUM})\s+range\s+({NUM})\s*\.\.\s*({NUM})\s*;"
    ))
    .unwrap()
});
static ARR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*type\s+([A-Za-z]\w*)\s+is\s+array\s*\(([^)]*)\)\s*of\s+([A-Za-z][\w.]*)\s*;")
        .unwrap()
});
static SUB: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)^\s*subtype\s+([A-Za-z]\w*)\s+is\s+([A-Za-z][\w.]*)(?:\s+range\s+({NUM})\s*\.\.\s*({NUM}))?\s*;"
    ))
    .unwrap()
});

fn parse_num(s: &str) -> Option<f64> {
    s.replace('_', "").parse().ok()
}

fn parse_int(s: &str) -> Option<i64> {
    s.replace('_', "").parse().ok()
}

fn strip_comment(line: &str) -> &str {
    match line.find("--") {
        Some(i) => &line[..i],
        None => line,
    }
}

fn parse_dims(text: &str) -> Vec<Dim> {
    let mut dims = Vec::new();
    for part in text.split(',') {
        if let Some(c) = DIM_RANGE.captures(part) {
            if let (Some(lo), Some(hi)) = (parse_int(&c[1]), parse_int(&c[2])) {
                dims.push(Dim::Range(lo, hi));
                continue;
            }
        }
        if let Some(c) = DIM_NAMED.captures(part) {
            dims.push(Dim::Named(TypeRef::new(&c[1])));
        }
        // anything else: tolerated, skipped
    }
    dims
}

pub struct LexicalParser;

impl SchemaParser for LexicalParser {
    fn parse(&self, side: Side, source: &str) -> Result<TypeGraph, GenError> {
        let mut graph = TypeGraph::new(side);
        let mut scope: Vec<String> = Vec::new();
        let mut saw_root = false;

        // in-flight multi-line state
        let mut record: Option<(String, Vec<FieldDecl>)> = None;
        let mut enum_buf: Option<(String, String)> = None;

        for raw in source.lines() {
            let line = strip_comment(raw);
            if line.trim().is_empty() {
                continue;
            }

            if let Some((_, buf)) = enum_buf.as_mut() {
                buf.push(' ');
                buf.push_str(line);
                if buf.contains('(') {
                    if line.contains(')') && line.contains(';') {
                        let (name, buf) = enum_buf.take().unwrap();
                        add_enum(&mut graph, &scope, name, &buf)?;
                    }
                } else if line.contains(';') {
                    // "type X is" turned out not to open a literal list
                    enum_buf = None;
                }
                continue;
            }

            if let Some((_, fields)) = record.as_mut() {
                if REC_END.is_match(line) {
                    let (name, fields) = record.take().unwrap();
                    graph.add(TypeDecl {
                        name,
                        scope: scope.clone(),
                        kind: TypeKind::Record { fields },
                    })?;
                } else if let Some(c) = FIELD.captures(line) {
                    fields.push(FieldDecl { name: c[1].to_string(), ty: TypeRef::new(&c[2]) });
                }
                // irregular lines inside a record are skipped
                continue;
            }

            if let Some(c) = PKG.captures(line) {
                if !saw_root {
                    graph.set_package(c[1].to_string());
                    saw_root = true;
                } else {
                    scope.push(c[1].to_string());
                }
                continue;
            }
            if let Some(c) = END_NAMED.captures(line) {
                let name = &c[1];
                if scope.last().is_some_and(|top| top.eq_ignore_ascii_case(name)) {
                    scope.pop();
                }
                continue;
            }
            if END_ANON.is_match(line) {
                scope.pop();
                continue;
            }

            if let Some(c) = REC_OPEN.captures(line) {
                record = Some((c[1].to_string(), Vec::new()));
                continue;
            }
            if let Some(c) = INT.captures(line) {
                if let (Some(lo), Some(hi)) = (parse_num(&c[2]), parse_num(&c[3])) {
                    graph.add(TypeDecl {
                        name: c[1].to_string(),
                        scope: scope.clone(),
                        kind: TypeKind::Primitive(PrimitiveTy {
                            repr: NumericRepr::Integer,
                            range: RangeConstraint::new(lo, hi),
                        }),
                    })?;
                }
                continue;
            }
            if let Some(c) = FLT.captures(line) {
                let digits: u32 = c[2].parse().unwrap_or(6);
                let lo = c.get(3).and_then(|m| parse_num(m.as_str())).unwrap_or(f64::MIN);
                let hi = c.get(4).and_then(|m| parse_num(m.as_str())).unwrap_or(f64::MAX);
                graph.add(TypeDecl {
                    name: c[1].to_string(),
                    scope: scope.clone(),
                    kind: TypeKind::Primitive(PrimitiveTy {
                        repr: NumericRepr::Float { digits },
                        range: RangeConstraint::new(lo, hi),
                    }),
                })?;
                continue;
            }
            if let Some(c) = FIX.captures(line) {
                if let (Some(delta), Some(lo), Some(hi)) =
                    (parse_num(&c[2]), parse_num(&c[3]), parse_num(&c[4]))
                {
                    graph.add(TypeDecl {
                        name: c[1].to_string(),
                        scope: scope.clone(),
                        kind: TypeKind::Primitive(PrimitiveTy {
                            repr: NumericRepr::Fixed { delta: delta.into() },
                            range: RangeConstraint::new(lo, hi),
                        }),
                    })?;
                }
                continue;
            }
            if let Some(c) = ARR.captures(line) {
                let dims = parse_dims(&c[2]);
                if !dims.is_empty() {
                    graph.add(TypeDecl {
                        name: c[1].to_string(),
                        scope: scope.clone(),
                        kind: TypeKind::Array { elem: TypeRef::new(&c[3]), dims },
                    })?;
                }
                continue;
            }
            if let Some(c) = SUB.captures(line) {
                let range = match (c.get(3), c.get(4)) {
                    (Some(lo), Some(hi)) => match (parse_num(lo.as_str()), parse_num(hi.as_str())) {
                        (Some(lo), Some(hi)) => Some(RangeConstraint::new(lo, hi)),
                        _ => None,
                    },
                    _ => None,
                };
                graph.add(TypeDecl {
                    name: c[1].to_string(),
                    scope: scope.clone(),
                    kind: TypeKind::Subtype { base: TypeRef::new(&c[2]), range },
                })?;
                continue;
            }
            if let Some(c) = ENUM_OPEN.captures(line) {
                if line.contains(')') && line.contains(';') {
                    add_enum(&mut graph, &scope, c[1].to_string(), line)?;
                } else {
                    enum_buf = Some((c[1].to_string(), line.to_string()));
                }
                continue;
            }
            // definition continues on a later line; buffer until it closes
            if let Some(c) = TYPE_DEFER.captures(line) {
                enum_buf = Some((c[1].to_string(), line.to_string()));
                continue;
            }
            // anything else: tolerated, skipped
        }

        Ok(graph)
    }
}

fn add_enum(
    graph: &mut TypeGraph,
    scope: &[String],
    name: String,
    text: &str,
) -> Result<(), GenError> {
    let open = match text.find('(') {
        Some(i) => i,
        None => return Ok(()),
    };
    let close = match text.rfind(')') {
        Some(i) if i > open => i,
        _ => return Ok(()),
    };
    let literals: Vec<String> = text[open + 1..close]
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if literals.is_empty() {
        return Ok(());
    }
    graph.add(TypeDecl {
        name,
        scope: scope.to_vec(),
        kind: TypeKind::Enum { literals },
    })
}

// ------------------------------- Tests ------------------------------------ //
