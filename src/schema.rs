//! The Type Graph: canonical, language-agnostic model of one schema side.
//!
//! Both parser strategies (`provider::lexical`, `provider::syntax`) produce
//! this same shape, so swapping providers never changes what downstream
//! stages observe. A graph is built once per run from immutable input text,
//! `link()`ed (fail-fast name resolution), and read-only afterward.

use std::fmt;

use indexmap::IndexMap;
use once_cell::sync::{Lazy, OnceCell};
use ordered_float::OrderedFloat;

use crate::error::GenError;

/// Which schema a graph (or an error) belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    From,
    To,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::From => write!(f, "source"),
            Side::To => write!(f, "destination"),
        }
    }
}

/// Inclusive numeric range; always present on a primitive and bounds every
/// legal value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RangeConstraint {
    pub lo: OrderedFloat<f64>,
    pub hi: OrderedFloat<f64>,
}

impl RangeConstraint {
    pub fn new(lo: f64, hi: f64) -> Self {
        Self { lo: OrderedFloat(lo), hi: OrderedFloat(hi) }
    }

    /// True when every value legal under `other` is legal under `self`.
    pub fn covers(&self, other: &RangeConstraint) -> bool {
        self.lo <= other.lo && self.hi >= other.hi
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NumericRepr {
    /// Bounded integer (`type I is range -5 .. 5;`).
    Integer,
    /// Floating point with decimal digit precision.
    Float { digits: u32 },
    /// Fixed point with a delta step.
    Fixed { delta: OrderedFloat<f64> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrimitiveTy {
    pub repr: NumericRepr,
    pub range: RangeConstraint,
}

/// A type name plus a lazily-resolved pointer into the graph. Unresolved and
/// resolved are distinct states; `link()` resolves every ref up front so that
/// emission never meets an unresolved name.
#[derive(Debug, Clone)]
pub struct TypeRef {
    /// The mark as written in the declaration, possibly dotted.
    pub mark: String,
    resolved: OnceCell<String>,
}

impl TypeRef {
    pub fn new(mark: impl Into<String>) -> Self {
        Self { mark: mark.into(), resolved: OnceCell::new() }
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.get().is_some()
    }

    /// Canonical key after linking; falls back to the raw mark so callers on
    /// an unlinked graph see a stable (if unresolved) name.
    pub fn target(&self) -> &str {
        self.resolved.get().map(String::as_str).unwrap_or(&self.mark)
    }

    fn resolve_to(&self, key: String) {
        let _ = self.resolved.set(key);
    }
}

/// One array dimension: either literal static bounds or a named integer type
/// whose range supplies them.
#[derive(Debug, Clone)]
pub enum Dim {
    Range(i64, i64),
    Named(TypeRef),
}

#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub name: String,
    pub ty: TypeRef,
}

#[derive(Debug, Clone)]
pub enum TypeKind {
    Primitive(PrimitiveTy),
    /// Ordinal = position; literal order is preserved, never normalized.
    Enum { literals: Vec<String> },
    /// Field order preserved for deterministic output.
    Record { fields: Vec<FieldDecl> },
    Array { elem: TypeRef, dims: Vec<Dim> },
    /// Subtype with optional narrowed constraint (inherited otherwise).
    Subtype { base: TypeRef, range: Option<RangeConstraint> },
}

#[derive(Debug, Clone)]
pub struct TypeDecl {
    /// Simple name with declared casing.
    pub name: String,
    /// Enclosing nested-package path under the root package.
    pub scope: Vec<String>,
    pub kind: TypeKind,
}

impl TypeDecl {
    /// Scope-qualified display name ("Geo.Pos"), declared casing.
    pub fn qualified(&self) -> String {
        if self.scope.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.scope.join("."), self.name)
        }
    }
}

// Ada's predefined scalar types, so schemas may reference them without
// declaring them. User declarations shadow these.
static BUILTINS: Lazy<IndexMap<String, TypeDecl>> = Lazy::new(|| {
    let int = |name: &str, lo: f64, hi: f64| TypeDecl {
        name: name.to_string(),
        scope: Vec::new(),
        kind: TypeKind::Primitive(PrimitiveTy {
            repr: NumericRepr::Integer,
            range: RangeConstraint::new(lo, hi),
        }),
    };
    let flt = |name: &str, digits: u32, lo: f64, hi: f64| TypeDecl {
        name: name.to_string(),
        scope: Vec::new(),
        kind: TypeKind::Primitive(PrimitiveTy {
            repr: NumericRepr::Float { digits },
            range: RangeConstraint::new(lo, hi),
        }),
    };
    let mut m = IndexMap::new();
    m.insert("integer".to_string(), int("Integer", -2147483648.0, 2147483647.0));
    m.insert("long_integer".to_string(), int("Long_Integer", -9.223372036854776e18, 9.223372036854776e18));
    m.insert("natural".to_string(), int("Natural", 0.0, 2147483647.0));
    m.insert("positive".to_string(), int("Positive", 1.0, 2147483647.0));
    m.insert("float".to_string(), flt("Float", 6, -3.40282e38, 3.40282e38));
    m.insert("long_float".to_string(), flt("Long_Float", 15, -1.79769e308, 1.79769e308));
    m.insert("boolean".to_string(), TypeDecl {
        name: "Boolean".to_string(),
        scope: Vec::new(),
        kind: TypeKind::Enum { literals: vec!["False".to_string(), "True".to_string()] },
    });
    m
});

#[derive(Debug, Clone)]
pub struct TypeGraph {
    /// Root package name of the schema ("Types_From").
    pub package: String,
    pub side: Side,
    /// Keyed by canonical lowercase dotted name within the root package.
    decls: IndexMap<String, TypeDecl>,
}

fn scoped_key(scope: &[String], name: &str) -> String {
    let mut key = String::new();
    for s in scope {
        key.push_str(&s.to_ascii_lowercase());
        key.push('.');
    }
    key.push_str(&name.to_ascii_lowercase());
    key
}

impl TypeGraph {
    pub fn new(side: Side) -> Self {
        Self { package: String::new(), side, decls: IndexMap::new() }
    }

    pub fn set_package(&mut self, name: impl Into<String>) {
        self.package = name.into();
    }

    pub fn add(&mut self, decl: TypeDecl) -> Result<(), GenError> {
        let key = scoped_key(&decl.scope, &decl.name);
        if self.decls.contains_key(&key) {
            return Err(GenError::Parse {
                side: self.side,
                detail: format!("duplicate declaration of type '{}'", decl.qualified()),
            });
        }
        self.decls.insert(key, decl);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }

    pub fn decl(&self, key: &str) -> Option<&TypeDecl> {
        self.decls.get(key).or_else(|| BUILTINS.get(key))
    }

    /// Declared qualified name for a canonical key.
    pub fn display_name(&self, key: &str) -> String {
        self.decl(key)
            .map(|d| d.qualified())
            .unwrap_or_else(|| key.to_string())
    }

    /// Resolve a written mark against an enclosing scope: innermost scope
    /// first, falling outward to the root, then Ada builtins for unqualified
    /// names. Qualified marks may name a scope relative to any enclosing
    /// level; a leading root-package prefix is accepted and stripped.
    pub fn resolve_key(&self, mark: &str, scope: &[String]) -> Option<String> {
        let mut norm = mark.trim().to_ascii_lowercase();
        let root_prefix = format!("{}.", self.package.to_ascii_lowercase());
        if !self.package.is_empty() && norm.starts_with(&root_prefix) {
            norm = norm[root_prefix.len()..].to_string();
        }
        for depth in (0..=scope.len()).rev() {
            let key = if depth == 0 {
                norm.clone()
            } else {
                scoped_key(&scope[..depth], &norm)
            };
            if self.decls.contains_key(&key) {
                return Some(key);
            }
        }
        if !norm.contains('.') && BUILTINS.contains_key(&norm) {
            return Some(norm);
        }
        None
    }

    /// Resolve a type name from the root scope (capability interface entry).
    pub fn resolve_type(&self, mark: &str) -> Option<&TypeDecl> {
        let key = self.resolve_key(mark, &[])?;
        self.decl(&key)
    }

    pub fn key_for(&self, mark: &str) -> Option<String> {
        self.resolve_key(mark, &[])
    }

    /// Kind of a type seen through any chain of subtypes.
    pub fn effective_kind(&self, key: &str) -> Option<&TypeKind> {
        let mut cur = key;
        for _ in 0..32 {
            match &self.decl(cur)?.kind {
                TypeKind::Subtype { base, .. } => cur = base.target(),
                other => return Some(other),
            }
        }
        None
    }

    /// Ordered record fields, or None if the type is not a record.
    pub fn record_fields(&self, key: &str) -> Option<&[FieldDecl]> {
        match self.effective_kind(key)? {
            TypeKind::Record { fields } => Some(fields),
            _ => None,
        }
    }

    /// Ordered enum literal names, or None if not an enum.
    pub fn enum_literals(&self, key: &str) -> Option<&[String]> {
        match self.effective_kind(key)? {
            TypeKind::Enum { literals } => Some(literals),
            _ => None,
        }
    }

    /// Element ref plus numeric dimension bounds, or None if not an array.
    pub fn array_shape(&self, key: &str) -> Option<(&TypeRef, Vec<(i64, i64)>)> {
        match self.effective_kind(key)? {
            TypeKind::Array { elem, dims } => {
                let bounds = dims
                    .iter()
                    .map(|d| self.dim_bounds(d))
                    .collect::<Option<Vec<_>>>()?;
                Some((elem, bounds))
            }
            _ => None,
        }
    }

    /// Effective primitive of a type: subtype chains inherit the base
    /// representation while the outermost explicit constraint wins.
    pub fn primitive_of(&self, key: &str) -> Option<PrimitiveTy> {
        let mut cur = key;
        let mut narrowed: Option<RangeConstraint> = None;
        for _ in 0..32 {
            match &self.decl(cur)?.kind {
                TypeKind::Subtype { base, range } => {
                    if narrowed.is_none() {
                        narrowed = range.clone();
                    }
                    cur = base.target();
                }
                TypeKind::Primitive(p) => {
                    return Some(PrimitiveTy {
                        repr: p.repr.clone(),
                        range: narrowed.unwrap_or_else(|| p.range.clone()),
                    });
                }
                _ => return None,
            }
        }
        None
    }

    pub fn dim_bounds(&self, dim: &Dim) -> Option<(i64, i64)> {
        match dim {
            Dim::Range(lo, hi) => Some((*lo, *hi)),
            Dim::Named(r) => {
                let p = self.primitive_of(r.target())?;
                match p.repr {
                    NumericRepr::Integer => Some((p.range.lo.0 as i64, p.range.hi.0 as i64)),
                    _ => None,
                }
            }
        }
    }

    /// Resolve every `TypeRef` in the graph. Fails fast on the first name
    /// that does not resolve, before any downstream stage runs.
    pub fn link(&self) -> Result<(), GenError> {
        let unknown = |mark: &str| GenError::UnknownType {
            side: self.side,
            name: mark.to_string(),
        };
        for decl in self.decls.values() {
            match &decl.kind {
                TypeKind::Primitive(_) | TypeKind::Enum { .. } => {}
                TypeKind::Record { fields } => {
                    let mut seen = Vec::<String>::new();
                    for f in fields {
                        let lower = f.name.to_ascii_lowercase();
                        if seen.contains(&lower) {
                            return Err(GenError::Parse {
                                side: self.side,
                                detail: format!(
                                    "duplicate field '{}' in record '{}'",
                                    f.name,
                                    decl.qualified()
                                ),
                            });
                        }
                        seen.push(lower);
                        let key = self
                            .resolve_key(&f.ty.mark, &decl.scope)
                            .ok_or_else(|| unknown(&f.ty.mark))?;
                        f.ty.resolve_to(key);
                    }
                }
                TypeKind::Array { elem, dims } => {
                    let key = self
                        .resolve_key(&elem.mark, &decl.scope)
                        .ok_or_else(|| unknown(&elem.mark))?;
                    elem.resolve_to(key);
                    for dim in dims {
                        if let Dim::Named(r) = dim {
                            let key = self
                                .resolve_key(&r.mark, &decl.scope)
                                .ok_or_else(|| unknown(&r.mark))?;
                            r.resolve_to(key.clone());
                            let is_int = matches!(
                                self.primitive_of(&key),
                                Some(PrimitiveTy { repr: NumericRepr::Integer, .. })
                            );
                            if !is_int {
                                return Err(GenError::Parse {
                                    side: self.side,
                                    detail: format!(
                                        "array '{}' indexes by '{}', which is not an integer type",
                                        decl.qualified(),
                                        r.mark
                                    ),
                                });
                            }
                        }
                    }
                }
                TypeKind::Subtype { base, .. } => {
                    let key = self
                        .resolve_key(&base.mark, &decl.scope)
                        .ok_or_else(|| unknown(&base.mark))?;
                    base.resolve_to(key);
                }
            }
        }
        Ok(())
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_with(decls: Vec<TypeDecl>) -> TypeGraph {
        let mut g = TypeGraph::new(Side::From);
        g.set_package("Types_From");
        for d in decls {
            g.add(d).unwrap();
        }
        g
    }

    fn int_ty(name: &str, lo: f64, hi: f64) -> TypeDecl {
        TypeDecl {
            name: name.to_string(),
            scope: Vec::new(),
            kind: TypeKind::Primitive(PrimitiveTy {
                repr: NumericRepr::Integer,
                range: RangeConstraint::new(lo, hi),
            }),
        }
    }

    #[test]
    fn unresolved_refs_fail_link_not_emission() {
        let g = graph_with(vec![TypeDecl {
            name: "R".into(),
            scope: Vec::new(),
            kind: TypeKind::Record {
                fields: vec![FieldDecl { name: "A".into(), ty: TypeRef::new("Nope") }],
            },
        }]);
        let err = g.link().unwrap_err();
        assert_eq!(err, GenError::UnknownType { side: Side::From, name: "Nope".into() });
    }

    #[test]
    fn namespace_resolution_prefers_innermost() {
        // Geo.Pos shadows root Pos for refs inside Geo.
        let mut g = graph_with(vec![int_ty("I32", -10.0, 10.0)]);
        g.add(TypeDecl {
            name: "Pos".into(),
            scope: Vec::new(),
            kind: TypeKind::Primitive(PrimitiveTy {
                repr: NumericRepr::Integer,
                range: RangeConstraint::new(0.0, 1.0),
            }),
        })
        .unwrap();
        g.add(TypeDecl {
            name: "Pos".into(),
            scope: vec!["Geo".into()],
            kind: TypeKind::Record {
                fields: vec![FieldDecl { name: "X".into(), ty: TypeRef::new("I32") }],
            },
        })
        .unwrap();
        let inner = g.resolve_key("Pos", &["Geo".into()]).unwrap();
        assert_eq!(inner, "geo.pos");
        let outer = g.resolve_key("Pos", &[]).unwrap();
        assert_eq!(outer, "pos");
        // qualified reference from the root
        assert_eq!(g.resolve_key("Geo.Pos", &[]).unwrap(), "geo.pos");
        // root-package prefix is accepted
        assert_eq!(g.resolve_key("Types_From.Geo.Pos", &[]).unwrap(), "geo.pos");
    }

    #[test]
    fn subtype_inherits_repr_and_narrows_range() {
        let mut g = graph_with(vec![int_ty("I32", -1000.0, 1000.0)]);
        g.add(TypeDecl {
            name: "Small".into(),
            scope: Vec::new(),
            kind: TypeKind::Subtype {
                base: TypeRef::new("I32"),
                range: Some(RangeConstraint::new(-5.0, 5.0)),
            },
        })
        .unwrap();
        g.link().unwrap();
        let p = g.primitive_of("small").unwrap();
        assert_eq!(p.repr, NumericRepr::Integer);
        assert_eq!(p.range, RangeConstraint::new(-5.0, 5.0));
    }

    #[test]
    fn named_dim_resolves_to_integer_range() {
        let mut g = graph_with(vec![int_ty("Idx", 1.0, 4.0), int_ty("I32", -10.0, 10.0)]);
        g.add(TypeDecl {
            name: "Arr".into(),
            scope: Vec::new(),
            kind: TypeKind::Array {
                elem: TypeRef::new("I32"),
                dims: vec![Dim::Named(TypeRef::new("Idx"))],
            },
        })
        .unwrap();
        g.link().unwrap();
        let (elem, dims) = g.array_shape("arr").unwrap();
        assert_eq!(elem.target(), "i32");
        assert_eq!(dims, vec![(1, 4)]);
    }

    #[test]
    fn builtins_are_shadowed_by_declarations() {
        let g = graph_with(vec![int_ty("Integer", 0.0, 9.0)]);
        let p = g.primitive_of(&g.key_for("Integer").unwrap()).unwrap();
        assert_eq!(p.range, RangeConstraint::new(0.0, 9.0));
        // Boolean still comes from the builtin table
        assert_eq!(g.enum_literals("boolean").unwrap(), ["False", "True"]);
    }
}
