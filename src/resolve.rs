//! Expression resolver: decides, for every destination field of every
//! mapping pair, how its value is obtained from the source type.
//!
//! Priority order per field: explicit dotted path, then same-name lookup,
//! then leaf-type comparison (cast / enum correspondence / record
//! delegation-or-inlining / array synthesis). Delegation is preferred over
//! inlining whenever a pair for the exact (source, destination) identity
//! exists, so one function serves every reference.
//!
//! Resolution of independent pairs may run on rayon workers; the memo cache
//! uses insert-if-absent semantics and derived array pairs are merged back
//! in deterministic discovery order before the global cycle check runs.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use indexmap::{IndexMap, IndexSet};
use rayon::prelude::*;

use crate::arrays::{self, ArrayPlan};
use crate::error::{Diagnostic, GenError};
use crate::schema::{NumericRepr, PrimitiveTy, TypeGraph, TypeKind};
use crate::spec::{PairDef, Rule};

/// Pair identity: canonical (source, destination) type keys.
pub type PairKey = (String, String);

/// How one value is produced from one source expression.
#[derive(Debug, Clone, PartialEq)]
pub enum ValuePlan {
    /// Explicit numeric conversion to the destination mark.
    Cast { dst_mark: String, lossy: bool },
    /// Enum correspondence by literal name, source declaration order.
    EnumCase { arms: Vec<(String, String)> },
    /// Call the `Map` overload emitted for another pair.
    Delegate { pair: PairKey },
    /// Field-by-field aggregate, used when no pair exists for a nested
    /// record correspondence.
    Inline { fields: Vec<InlineField> },
    /// Ada box default (`<>`), from an explicit DEFAULT rule.
    Default,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InlineField {
    pub dest: String,
    pub src_field: String,
    pub plan: ValuePlan,
}

/// One resolved destination field: canonical source path plus value plan.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedField {
    pub dest: String,
    pub path: Vec<String>,
    pub plan: ValuePlan,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PairKind {
    Record { fields: Vec<ResolvedField> },
    Enum { arms: Vec<(String, String)> },
    Array(ArrayPlan),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPair {
    pub name: String,
    pub key: PairKey,
    pub kind: PairKind,
}

#[derive(Debug, Clone)]
pub struct PairResult {
    pub name: String,
    pub key: PairKey,
    pub outcome: Result<ResolvedPair, GenError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NarrowingPolicy {
    /// Emit the cast, flag `LossyCoercion`.
    #[default]
    Warn,
    /// Treat a narrowing coercion as a per-pair `TypeMismatch`.
    Reject,
}

/// Output of one resolution phase: explicit pairs in specification order,
/// derived array pairs in first-reference order, diagnostics in the same
/// combined order.
#[derive(Debug)]
pub struct Resolution {
    pub pairs: Vec<PairResult>,
    pub derived: Vec<PairResult>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Resolution {
    /// Successfully resolved pairs in emission order.
    pub fn emitted(&self) -> Vec<&ResolvedPair> {
        self.pairs
            .iter()
            .chain(self.derived.iter())
            .filter_map(|p| p.outcome.as_ref().ok())
            .collect()
    }

    pub fn failures(&self) -> Vec<(&str, &GenError)> {
        self.pairs
            .iter()
            .chain(self.derived.iter())
            .filter_map(|p| p.outcome.as_ref().err().map(|e| (p.name.as_str(), e)))
            .collect()
    }
}

// ------------------------------ Resolver ---------------------------------- //

pub(crate) struct Resolver<'a> {
    pub(crate) src: &'a TypeGraph,
    pub(crate) dst: &'a TypeGraph,
    policy: NarrowingPolicy,
    /// Explicit pair identities, known before resolution starts; this is
    /// what makes delegate-vs-inline stable under parallelism.
    explicit: IndexMap<PairKey, ()>,
    /// (source type key, destination field path) -> plan plus the
    /// diagnostics its resolution raised. Shared across workers; first
    /// insert wins, and hits replay the diagnostics for their own pair.
    memo: Mutex<HashMap<(String, String), (ValuePlan, Vec<Diagnostic>)>>,
}

/// Per-pair scratch state; merged deterministically after the parallel
/// phase.
pub(crate) struct PairCtx {
    pub(crate) label: String,
    pub(crate) deps: Vec<PairKey>,
    pub(crate) requests: Vec<PairKey>,
    pub(crate) diags: Vec<Diagnostic>,
    /// Pair identities currently being inlined, outermost first; re-entry
    /// means the record graph cycles with no pair to delegate to.
    inline: Vec<PairKey>,
}

struct PairWork {
    result: PairResult,
    deps: Vec<PairKey>,
    requests: Vec<PairKey>,
    diags: Vec<Diagnostic>,
}

/// A coercion is lossy when the destination range does not cover the
/// source range, or the representation narrows: float or fixed to integer,
/// or fixed to a coarser delta. Returns a human-readable reason.
fn lossy_note(sp: &PrimitiveTy, dp: &PrimitiveTy) -> Option<String> {
    if !dp.range.covers(&sp.range) {
        return Some(format!(
            "destination range {} .. {} does not cover source range {} .. {}",
            dp.range.lo, dp.range.hi, sp.range.lo, sp.range.hi
        ));
    }
    match (&sp.repr, &dp.repr) {
        (NumericRepr::Float { .. }, NumericRepr::Integer) => {
            Some("floating-point source truncated to integer".to_string())
        }
        (NumericRepr::Fixed { .. }, NumericRepr::Integer) => {
            Some("fixed-point source truncated to integer".to_string())
        }
        (NumericRepr::Fixed { delta: sd }, NumericRepr::Fixed { delta: dd }) if dd > sd => {
            Some(format!("fixed-point delta coarsens from {sd} to {dd}"))
        }
        (NumericRepr::Float { digits: sd }, NumericRepr::Float { digits: dd }) if dd < sd => {
            Some(format!("float precision drops from {sd} to {dd} digits"))
        }
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Cat {
    Prim,
    Enum,
    Record,
    Array,
}

fn category(graph: &TypeGraph, key: &str) -> Option<Cat> {
    match graph.effective_kind(key)? {
        TypeKind::Primitive(_) => Some(Cat::Prim),
        TypeKind::Enum { .. } => Some(Cat::Enum),
        TypeKind::Record { .. } => Some(Cat::Record),
        TypeKind::Array { .. } => Some(Cat::Array),
        TypeKind::Subtype { .. } => None, // effective_kind sees through these
    }
}

impl<'a> Resolver<'a> {
    fn pair_label(&self, key: &PairKey) -> String {
        format!(
            "{} -> {}",
            self.src.display_name(&key.0),
            self.dst.display_name(&key.1)
        )
    }

    fn mismatch(&self, context: &str, src_key: &str, dst_key: &str, detail: &str) -> GenError {
        GenError::TypeMismatch {
            context: context.to_string(),
            src: self.src.display_name(src_key),
            dst: self.dst.display_name(dst_key),
            detail: detail.to_string(),
        }
    }

    /// Record delegation edges (and derived-pair requests) implied by a
    /// plan. Done on the finished plan so memo hits register them too.
    pub(crate) fn note_delegates(&self, plan: &ValuePlan, ctx: &mut PairCtx) {
        match plan {
            ValuePlan::Delegate { pair } => {
                ctx.deps.push(pair.clone());
                if !self.explicit.contains_key(pair) {
                    ctx.requests.push(pair.clone());
                }
            }
            ValuePlan::Inline { fields } => {
                for f in fields {
                    self.note_delegates(&f.plan, ctx);
                }
            }
            _ => {}
        }
    }

    /// Walk a dotted path through the source record graph. Returns the
    /// canonical-cased segments and the leaf type key.
    fn walk_path(&self, root_key: &str, segs: &[String]) -> Result<(Vec<String>, String), GenError> {
        let full = segs.join(".");
        let mut cur = root_key.to_string();
        let mut canon = Vec::with_capacity(segs.len());
        for seg in segs {
            let fields = self.src.record_fields(&cur).ok_or_else(|| GenError::MissingField {
                type_name: self.src.display_name(root_key),
                path: full.clone(),
            })?;
            let f = fields
                .iter()
                .find(|f| f.name.eq_ignore_ascii_case(seg))
                .ok_or_else(|| GenError::MissingField {
                    type_name: self.src.display_name(root_key),
                    path: full.clone(),
                })?;
            canon.push(f.name.clone());
            cur = f.ty.target().to_string();
        }
        Ok((canon, cur))
    }

    fn enum_arms(
        &self,
        context: &str,
        src_key: &str,
        dst_key: &str,
        overrides: Option<&IndexMap<String, String>>,
    ) -> Result<Vec<(String, String)>, GenError> {
        let s_lits = self
            .src
            .enum_literals(src_key)
            .ok_or_else(|| self.mismatch(context, src_key, dst_key, "source is not an enum"))?;
        let d_lits = self
            .dst
            .enum_literals(dst_key)
            .ok_or_else(|| self.mismatch(context, src_key, dst_key, "destination is not an enum"))?;
        let d_by_name: HashMap<String, &String> =
            d_lits.iter().map(|l| (l.to_ascii_lowercase(), l)).collect();
        let s_by_name: HashMap<String, &String> =
            s_lits.iter().map(|l| (l.to_ascii_lowercase(), l)).collect();

        let mut over = HashMap::<String, String>::new();
        if let Some(map) = overrides {
            for (raw_src, raw_dst) in map {
                let s = s_by_name.get(&raw_src.trim().to_ascii_lowercase()).ok_or_else(|| {
                    self.mismatch(
                        context,
                        src_key,
                        dst_key,
                        &format!("enum override references unknown source literal '{raw_src}'"),
                    )
                })?;
                let d = d_by_name.get(&raw_dst.trim().to_ascii_lowercase()).ok_or_else(|| {
                    self.mismatch(
                        context,
                        src_key,
                        dst_key,
                        &format!("enum override targets unknown destination literal '{raw_dst}'"),
                    )
                })?;
                over.insert(s.to_ascii_lowercase(), (*d).clone());
            }
        }

        let mut arms = Vec::with_capacity(s_lits.len());
        let mut missing = Vec::new();
        for lit in s_lits {
            let lower = lit.to_ascii_lowercase();
            let target = over
                .get(&lower)
                .cloned()
                .or_else(|| d_by_name.get(&lower).map(|d| (*d).clone()));
            match target {
                Some(t) => arms.push((lit.clone(), t)),
                None => missing.push(lit.clone()),
            }
        }
        if !missing.is_empty() {
            return Err(self.mismatch(
                context,
                src_key,
                dst_key,
                &format!("source literals without correspondence: {}", missing.join(", ")),
            ));
        }
        Ok(arms)
    }

    fn inline_fields(
        &self,
        ctx: &mut PairCtx,
        src_key: &str,
        dst_key: &str,
        dest_path: &str,
    ) -> Result<Vec<InlineField>, GenError> {
        let d_fields = self.dst.record_fields(dst_key).unwrap_or_default();
        let s_fields = self.src.record_fields(src_key).unwrap_or_default();
        let mut fields = Vec::with_capacity(d_fields.len());
        for f in d_fields {
            let sub_path = format!("{dest_path}.{}", f.name);
            let sf = s_fields
                .iter()
                .find(|s| s.name.eq_ignore_ascii_case(&f.name))
                .ok_or_else(|| GenError::MissingField {
                    type_name: self.src.display_name(src_key),
                    path: sub_path.clone(),
                })?;
            let plan = self.value_plan(
                ctx,
                sf.ty.target(),
                f.ty.target(),
                &self.dst.display_name(f.ty.target()),
                &sub_path,
            )?;
            fields.push(InlineField {
                dest: f.name.clone(),
                src_field: sf.name.clone(),
                plan,
            });
        }
        Ok(fields)
    }

    /// Leaf-type comparison: the §4.3 decision table.
    pub(crate) fn value_plan(
        &self,
        ctx: &mut PairCtx,
        src_key: &str,
        dst_key: &str,
        dst_mark: &str,
        dest_path: &str,
    ) -> Result<ValuePlan, GenError> {
        let s_cat = category(self.src, src_key)
            .ok_or_else(|| self.mismatch(dest_path, src_key, dst_key, "unresolvable source type"))?;
        let d_cat = category(self.dst, dst_key).ok_or_else(|| {
            self.mismatch(dest_path, src_key, dst_key, "unresolvable destination type")
        })?;
        let identity = (src_key.to_string(), dst_key.to_string());

        match (s_cat, d_cat) {
            (Cat::Record, Cat::Record) => {
                if self.explicit.contains_key(&identity) {
                    return Ok(ValuePlan::Delegate { pair: identity });
                }
                // no pair for this identity: inline an aggregate, matching
                // fields by name. Re-entering an identity already being
                // inlined means the record graph cycles with nothing to
                // delegate to.
                if ctx.inline.contains(&identity) {
                    let mut cycle: Vec<String> = ctx
                        .inline
                        .iter()
                        .skip_while(|k| **k != identity)
                        .map(|k| self.pair_label(k))
                        .collect();
                    cycle.push(self.pair_label(&identity));
                    return Err(GenError::CyclicDelegation { cycle });
                }
                ctx.inline.push(identity.clone());
                let fields = self.inline_fields(ctx, src_key, dst_key, dest_path);
                ctx.inline.pop();
                Ok(ValuePlan::Inline { fields: fields? })
            }
            (Cat::Enum, Cat::Enum) => {
                if self.explicit.contains_key(&identity) {
                    return Ok(ValuePlan::Delegate { pair: identity });
                }
                Ok(ValuePlan::EnumCase {
                    arms: self.enum_arms(dest_path, src_key, dst_key, None)?,
                })
            }
            (Cat::Array, Cat::Array) => {
                arrays::check_ranks(self, dest_path, src_key, dst_key)?;
                Ok(ValuePlan::Delegate { pair: identity })
            }
            (Cat::Prim, Cat::Prim) => {
                let sp = self.src.primitive_of(src_key).ok_or_else(|| {
                    self.mismatch(dest_path, src_key, dst_key, "source primitive unresolvable")
                })?;
                let dp = self.dst.primitive_of(dst_key).ok_or_else(|| {
                    self.mismatch(dest_path, src_key, dst_key, "destination primitive unresolvable")
                })?;
                let note = lossy_note(&sp, &dp);
                let lossy = note.is_some();
                if lossy && self.policy == NarrowingPolicy::Reject {
                    return Err(self.mismatch(
                        dest_path,
                        src_key,
                        dst_key,
                        &format!(
                            "{} (narrowing rejected by policy)",
                            note.unwrap_or_default()
                        ),
                    ));
                }
                if let Some(note) = note {
                    ctx.diags.push(Diagnostic::LossyCoercion {
                        pair: ctx.label.clone(),
                        dest: dest_path.to_string(),
                        src: self.src.display_name(src_key),
                        dst: self.dst.display_name(dst_key),
                        note,
                    });
                }
                Ok(ValuePlan::Cast { dst_mark: dst_mark.to_string(), lossy })
            }
            _ => Err(self.mismatch(
                dest_path,
                src_key,
                dst_key,
                "no coercion or delegation bridges these kinds",
            )),
        }
    }

    /// Memoized per-field resolution: each distinct (source type,
    /// destination field path) resolves exactly once.
    fn field_plan(
        &self,
        ctx: &mut PairCtx,
        src_leaf: &str,
        dst_key: &str,
        dst_mark: &str,
        dest_path: &str,
    ) -> Result<ValuePlan, GenError> {
        let memo_key = (src_leaf.to_string(), dest_path.to_string());
        let cached = self.memo.lock().expect("memo lock").get(&memo_key).cloned();
        let plan = match cached {
            Some((plan, notes)) => {
                // replay the first resolution's findings for this pair
                for note in &notes {
                    ctx.diags.push(note.for_pair(&ctx.label));
                }
                plan
            }
            None => {
                let mark = ctx.diags.len();
                let plan = self.value_plan(ctx, src_leaf, dst_key, dst_mark, dest_path)?;
                let notes = ctx.diags[mark..].to_vec();
                let mut memo = self.memo.lock().expect("memo lock");
                memo.entry(memo_key)
                    .or_insert_with(|| (plan.clone(), notes))
                    .0
                    .clone()
            }
        };
        self.note_delegates(&plan, ctx);
        Ok(plan)
    }

    fn resolve_record_pair(
        &self,
        def: &PairDef,
        ctx: &mut PairCtx,
    ) -> Result<Vec<ResolvedField>, GenError> {
        let d_fields = self.dst.record_fields(&def.to_key).unwrap_or_default();
        let rules: HashMap<String, (&String, &Rule)> = def
            .fields
            .iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), (k, v)))
            .collect();
        let mut used = HashSet::<String>::new();
        let mut out = Vec::with_capacity(d_fields.len());

        for f in d_fields {
            let lower = f.name.to_ascii_lowercase();
            let rule = rules.get(&lower).map(|(_, r)| *r);
            if rule.is_some() {
                used.insert(lower);
            }
            let dest_path = format!("{}.{}", self.dst.display_name(&def.to_key), f.name);
            let dst_mark = self.dst.display_name(f.ty.target());

            let resolved = match rule {
                Some(Rule::Default) => ResolvedField {
                    dest: f.name.clone(),
                    path: Vec::new(),
                    plan: ValuePlan::Default,
                },
                Some(Rule::WithEnumMap { path, map }) => {
                    let (canon, leaf) = self.walk_path(&def.from_key, path)?;
                    let arms = self.enum_arms(&dest_path, &leaf, f.ty.target(), Some(map))?;
                    ResolvedField {
                        dest: f.name.clone(),
                        path: canon,
                        plan: ValuePlan::EnumCase { arms },
                    }
                }
                Some(Rule::Path(segs)) => {
                    let (canon, leaf) = self.walk_path(&def.from_key, segs)?;
                    let plan = self.field_plan(ctx, &leaf, f.ty.target(), &dst_mark, &dest_path)?;
                    ResolvedField { dest: f.name.clone(), path: canon, plan }
                }
                // no rule: default to a same-name top-level source field
                None => {
                    let segs = vec![f.name.clone()];
                    let (canon, leaf) = self.walk_path(&def.from_key, &segs)?;
                    let plan = self.field_plan(ctx, &leaf, f.ty.target(), &dst_mark, &dest_path)?;
                    ResolvedField { dest: f.name.clone(), path: canon, plan }
                }
            };
            out.push(resolved);
        }

        // rules naming fields the destination record does not have
        for (lower, (orig, _)) in &rules {
            if !used.contains(lower) {
                return Err(GenError::MissingField {
                    type_name: self.dst.display_name(&def.to_key),
                    path: (*orig).clone(),
                });
            }
        }
        Ok(out)
    }

    fn resolve_enum_pair(
        &self,
        def: &PairDef,
        ctx: &PairCtx,
    ) -> Result<Vec<(String, String)>, GenError> {
        let d_lits = self.dst.enum_literals(&def.to_key).unwrap_or_default();
        // entry fields map destination literal -> source literal; invert to
        // the resolver's source -> destination direction
        let mut inverted = IndexMap::<String, String>::new();
        for (dest_lit, rule) in &def.fields {
            let known = d_lits.iter().any(|l| l.eq_ignore_ascii_case(dest_lit));
            if !known {
                return Err(GenError::MissingField {
                    type_name: self.dst.display_name(&def.to_key),
                    path: dest_lit.clone(),
                });
            }
            let src_lit = match rule {
                Rule::Path(segs) if segs.len() == 1 => segs[0].clone(),
                _ => {
                    return Err(GenError::BadFieldRule {
                        entry: ctx.label.clone(),
                        field: dest_lit.clone(),
                        detail: "enum literal rules must be bare literal names".to_string(),
                    });
                }
            };
            if inverted.insert(src_lit.to_ascii_lowercase(), dest_lit.clone()).is_some() {
                return Err(self.mismatch(
                    &ctx.label,
                    &def.from_key,
                    &def.to_key,
                    &format!("source literal '{src_lit}' mapped to more than one destination"),
                ));
            }
        }
        self.enum_arms(&ctx.label, &def.from_key, &def.to_key, Some(&inverted))
    }

    fn resolve_pair(&self, def: &PairDef, ctx: &mut PairCtx) -> Result<ResolvedPair, GenError> {
        let key = (def.from_key.clone(), def.to_key.clone());
        let s_cat = category(self.src, &def.from_key)
            .ok_or_else(|| self.mismatch(&def.name, &def.from_key, &def.to_key, "unresolvable source type"))?;
        let d_cat = category(self.dst, &def.to_key)
            .ok_or_else(|| self.mismatch(&def.name, &def.from_key, &def.to_key, "unresolvable destination type"))?;

        let kind = match (s_cat, d_cat) {
            (Cat::Record, Cat::Record) => PairKind::Record {
                fields: self.resolve_record_pair(def, ctx)?,
            },
            (Cat::Enum, Cat::Enum) => PairKind::Enum {
                arms: self.resolve_enum_pair(def, ctx)?,
            },
            (Cat::Array, Cat::Array) => {
                if !def.fields.is_empty() {
                    return Err(GenError::BadFieldRule {
                        entry: def.name.clone(),
                        field: def.fields.keys().next().cloned().unwrap_or_default(),
                        detail: "array mapping entries take no field rules".to_string(),
                    });
                }
                PairKind::Array(arrays::synthesize(self, ctx, &def.from_key, &def.to_key)?)
            }
            _ => {
                return Err(self.mismatch(
                    &def.name,
                    &def.from_key,
                    &def.to_key,
                    "mapping pairs must join records, enums or arrays of like kind",
                ));
            }
        };
        Ok(ResolvedPair { name: def.name.clone(), key, kind })
    }

    fn resolve_entry(&self, def: &PairDef) -> PairWork {
        let key = (def.from_key.clone(), def.to_key.clone());
        let mut ctx = PairCtx {
            label: def.name.clone(),
            deps: Vec::new(),
            requests: Vec::new(),
            diags: Vec::new(),
            inline: Vec::new(),
        };
        let outcome = self.resolve_pair(def, &mut ctx);
        PairWork {
            result: PairResult { name: def.name.clone(), key, outcome },
            deps: ctx.deps,
            requests: ctx.requests,
            diags: ctx.diags,
        }
    }

    fn resolve_array_pair(&self, key: &PairKey) -> PairWork {
        let label = self.pair_label(key);
        let mut ctx = PairCtx {
            label: label.clone(),
            deps: Vec::new(),
            requests: Vec::new(),
            diags: Vec::new(),
            inline: Vec::new(),
        };
        let outcome = arrays::synthesize(self, &mut ctx, &key.0, &key.1).map(|plan| ResolvedPair {
            name: label.clone(),
            key: key.clone(),
            kind: PairKind::Array(plan),
        });
        PairWork {
            result: PairResult { name: label, key: key.clone(), outcome },
            deps: ctx.deps,
            requests: ctx.requests,
            diags: ctx.diags,
        }
    }
}

// --------------------------- Cycle detection ------------------------------- //

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Active,
    Done,
}

fn find_cycles(nodes: &[PairKey], adj: &HashMap<PairKey, Vec<PairKey>>) -> Vec<Vec<PairKey>> {
    fn visit(
        k: &PairKey,
        adj: &HashMap<PairKey, Vec<PairKey>>,
        marks: &mut HashMap<PairKey, Mark>,
        stack: &mut Vec<PairKey>,
        cycles: &mut Vec<Vec<PairKey>>,
    ) {
        marks.insert(k.clone(), Mark::Active);
        stack.push(k.clone());
        for t in adj.get(k).into_iter().flatten() {
            match marks.get(t) {
                Some(Mark::Active) => {
                    if let Some(pos) = stack.iter().position(|x| x == t) {
                        let mut cyc = stack[pos..].to_vec();
                        cyc.push(t.clone());
                        cycles.push(cyc);
                    }
                }
                Some(Mark::Done) => {}
                None => visit(t, adj, marks, stack, cycles),
            }
        }
        stack.pop();
        marks.insert(k.clone(), Mark::Done);
    }

    let mut marks = HashMap::new();
    let mut cycles = Vec::new();
    for n in nodes {
        if !marks.contains_key(n) {
            let mut stack = Vec::new();
            visit(n, adj, &mut marks, &mut stack, &mut cycles);
        }
    }
    cycles
}

// ------------------------------ Entry point -------------------------------- //

/// Resolve every explicit pair (optionally in parallel), then derived array
/// pairs, then run the global cycle check and cascade failures to
/// dependents so emitted output always compiles as a unit.
pub fn resolve_all(
    defs: &[PairDef],
    src: &TypeGraph,
    dst: &TypeGraph,
    policy: NarrowingPolicy,
    parallel: bool,
) -> Resolution {
    let resolver = Resolver {
        src,
        dst,
        policy,
        explicit: defs
            .iter()
            .map(|d| ((d.from_key.clone(), d.to_key.clone()), ()))
            .collect(),
        memo: Mutex::new(HashMap::new()),
    };

    let mut works: Vec<PairWork> = if parallel {
        defs.par_iter().map(|d| resolver.resolve_entry(d)).collect()
    } else {
        defs.iter().map(|d| resolver.resolve_entry(d)).collect()
    };

    // derived array pairs, first-reference order; resolving one may
    // transitively request more (arrays of arrays)
    let mut derived_works: Vec<PairWork> = Vec::new();
    let mut queued = IndexSet::<PairKey>::new();
    let mut queue = VecDeque::<PairKey>::new();
    let enqueue = |k: &PairKey, queued: &mut IndexSet<PairKey>, queue: &mut VecDeque<PairKey>| {
        if !resolver.explicit.contains_key(k) && queued.insert(k.clone()) {
            queue.push_back(k.clone());
        }
    };
    for w in &works {
        for k in &w.requests {
            enqueue(k, &mut queued, &mut queue);
        }
    }
    while let Some(key) = queue.pop_front() {
        let w = resolver.resolve_array_pair(&key);
        for k in &w.requests {
            enqueue(k, &mut queued, &mut queue);
        }
        derived_works.push(w);
    }

    // cycle check over the full dependency graph
    let mut labels = HashMap::<PairKey, String>::new();
    let mut nodes = Vec::<PairKey>::new();
    let mut adj = HashMap::<PairKey, Vec<PairKey>>::new();
    for w in works.iter().chain(derived_works.iter()) {
        labels.insert(w.result.key.clone(), w.result.name.clone());
        nodes.push(w.result.key.clone());
        adj.entry(w.result.key.clone()).or_default().extend(w.deps.iter().cloned());
    }
    let cycles = find_cycles(&nodes, &adj);
    let mut failed = HashSet::<PairKey>::new();
    for w in works.iter().chain(derived_works.iter()) {
        if w.result.outcome.is_err() {
            failed.insert(w.result.key.clone());
        }
    }
    for cyc in &cycles {
        let named: Vec<String> = cyc
            .iter()
            .map(|k| labels.get(k).cloned().unwrap_or_else(|| format!("({}, {})", k.0, k.1)))
            .collect();
        for k in cyc.iter().take(cyc.len().saturating_sub(1)) {
            for w in works.iter_mut().chain(derived_works.iter_mut()) {
                if &w.result.key == k && w.result.outcome.is_ok() {
                    w.result.outcome = Err(GenError::CyclicDelegation { cycle: named.clone() });
                }
            }
            failed.insert(k.clone());
        }
    }

    // cascade: a pair delegating to a failed pair cannot emit either
    loop {
        let mut newly_failed: Vec<(PairKey, PairKey)> = Vec::new();
        for w in works.iter().chain(derived_works.iter()) {
            if failed.contains(&w.result.key) {
                continue;
            }
            if let Some(bad) = w.deps.iter().find(|d| failed.contains(*d)) {
                newly_failed.push((w.result.key.clone(), bad.clone()));
            }
        }
        if newly_failed.is_empty() {
            break;
        }
        for (key, on) in newly_failed {
            let on_label = labels.get(&on).cloned().unwrap_or_else(|| format!("({}, {})", on.0, on.1));
            for w in works.iter_mut().chain(derived_works.iter_mut()) {
                if w.result.key == key && w.result.outcome.is_ok() {
                    w.result.outcome = Err(GenError::DependencyFailed {
                        pair: w.result.name.clone(),
                        on: on_label.clone(),
                    });
                }
            }
            failed.insert(key);
        }
    }

    let mut diagnostics = Vec::new();
    for w in works.iter().chain(derived_works.iter()) {
        diagnostics.extend(w.diags.iter().cloned());
    }

    Resolution {
        pairs: works.into_iter().map(|w| w.result).collect(),
        derived: derived_works.into_iter().map(|w| w.result).collect(),
        diagnostics,
    }
}

// ------------------------------- Tests ------------------------------------ //
