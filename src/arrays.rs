//! Array mapper synthesis.
//!
//! An array correspondence never appears as a hand-written field rule; it is
//! synthesized from the two array type declarations. The plan carries the
//! destination's dimension bounds (the loop ranges), a per-dimension overhang
//! guard, and the element plan resolved through the ordinary decision table,
//! so nested arrays and record elements delegate like everything else.

use crate::error::{Diagnostic, GenError};
use crate::resolve::{PairCtx, Resolver, ValuePlan};

const IDX_LETTERS: [&str; 5] = ["I", "J", "K", "L", "M"];

/// Loop index names, one per dimension: `I` through `M`, then `I6`, `I7`, ...
/// for higher ranks.
pub fn index_names(rank: usize) -> Vec<String> {
    (0..rank)
        .map(|i| match IDX_LETTERS.get(i) {
            Some(n) => (*n).to_string(),
            None => format!("I{}", i + 1),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayPlan {
    /// Destination bounds per dimension, outermost first.
    pub dims: Vec<(i64, i64)>,
    /// True where the static source and destination lengths differ, so the
    /// emitted body asserts length compatibility at run time.
    pub guard: Vec<bool>,
    pub elem: Box<ValuePlan>,
}

impl ArrayPlan {
    pub fn rank(&self) -> usize {
        self.dims.len()
    }
}

/// Rank agreement check shared by synthesis and by record fields whose leaf
/// types are arrays (the mismatch must surface where the field resolves,
/// not later in a derived pair).
pub(crate) fn check_ranks(
    rs: &Resolver,
    context: &str,
    src_key: &str,
    dst_key: &str,
) -> Result<(), GenError> {
    let ((_, s_dims), (_, d_dims)) = shapes(rs, context, src_key, dst_key)?;
    if s_dims.len() != d_dims.len() {
        return Err(GenError::DimensionMismatch {
            src: rs.src.display_name(src_key),
            dst: rs.dst.display_name(dst_key),
            src_rank: s_dims.len(),
            dst_rank: d_dims.len(),
        });
    }
    Ok(())
}

type Shape = (String, Vec<(i64, i64)>);

fn shapes(
    rs: &Resolver,
    context: &str,
    src_key: &str,
    dst_key: &str,
) -> Result<(Shape, Shape), GenError> {
    let mismatch = |detail: &str| GenError::TypeMismatch {
        context: context.to_string(),
        src: rs.src.display_name(src_key),
        dst: rs.dst.display_name(dst_key),
        detail: detail.to_string(),
    };
    let (s_elem, s_dims) = rs
        .src
        .array_shape(src_key)
        .ok_or_else(|| mismatch("source is not an array with static bounds"))?;
    let (d_elem, d_dims) = rs
        .dst
        .array_shape(dst_key)
        .ok_or_else(|| mismatch("destination is not an array with static bounds"))?;
    Ok((
        (s_elem.target().to_string(), s_dims),
        (d_elem.target().to_string(), d_dims),
    ))
}

/// Build the element-wise transformation plan for one array pair.
pub(crate) fn synthesize(
    rs: &Resolver,
    ctx: &mut PairCtx,
    src_key: &str,
    dst_key: &str,
) -> Result<ArrayPlan, GenError> {
    check_ranks(rs, &ctx.label, src_key, dst_key)?;
    let ((s_elem, s_dims), (d_elem, d_dims)) = shapes(rs, &ctx.label, src_key, dst_key)?;

    let mut guard = Vec::with_capacity(d_dims.len());
    for (i, (s, d)) in s_dims.iter().zip(d_dims.iter()).enumerate() {
        let s_len = s.1 - s.0 + 1;
        let d_len = d.1 - d.0 + 1;
        guard.push(s_len != d_len);
        // the loop reads one source element per destination slot; bounds may
        // come from distinct subtypes, so length disagreement is a warning
        // plus a run-time assert, never a generation-time error
        if s_len < d_len {
            ctx.diags.push(Diagnostic::ArrayShortfall {
                pair: ctx.label.clone(),
                dim: i + 1,
                src: rs.src.display_name(src_key),
                dst: rs.dst.display_name(dst_key),
            });
        } else if s_len > d_len {
            ctx.diags.push(Diagnostic::ArrayOverhang {
                pair: ctx.label.clone(),
                dim: i + 1,
                src: rs.src.display_name(src_key),
                dst: rs.dst.display_name(dst_key),
            });
        }
    }

    let elem_mark = rs.dst.display_name(&d_elem);
    let dest_path = format!("{}[]", rs.dst.display_name(dst_key));
    let elem = rs.value_plan(ctx, &s_elem, &d_elem, &elem_mark, &dest_path)?;
    rs.note_delegates(&elem, ctx);

    Ok(ArrayPlan { dims: d_dims, guard, elem: Box::new(elem) })
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GenError;
    use crate::resolve::{resolve_all, NarrowingPolicy, PairKind};
    use crate::testutil::{defs_for, from_graph, to_graph};

    #[test]
    fn array_pair_is_derived_once_for_many_references() {
        let from = from_graph(
            "package Types_From is\n\
             \x20  type I is range -100 .. 100;\n\
             \x20  type Vec is array (1 .. 4) of I;\n\
             \x20  type R is record\n\
             \x20     A : Vec;\n\
             \x20     B : Vec;\n\
             \x20  end record;\n\
             end Types_From;",
        );
        let to = to_graph(
            "package Types_To is\n\
             \x20  type I is range -100 .. 100;\n\
             \x20  type Vec is array (1 .. 4) of I;\n\
             \x20  type R is record\n\
             \x20     A : Vec;\n\
             \x20     B : Vec;\n\
             \x20  end record;\n\
             end Types_To;",
        );
        let defs = defs_for(
            r#"{"mappings":[{"name":"R","from":"R","to":"R","fields":{"A":"A","B":"B"}}]}"#,
            &from,
            &to,
        );
        let res = resolve_all(&defs, &from, &to, NarrowingPolicy::Warn, false);
        assert_eq!(res.derived.len(), 1);
        let derived = res.derived[0].outcome.as_ref().unwrap();
        match &derived.kind {
            PairKind::Array(plan) => {
                assert_eq!(plan.dims, vec![(1, 4)]);
                assert_eq!(plan.guard, vec![false]);
            }
            other => panic!("unexpected kind {other:?}"),
        }
    }

    #[test]
    fn rank_disagreement_is_a_dimension_mismatch() {
        let from = from_graph(
            "package Types_From is\n\
             \x20  type I is range 0 .. 10;\n\
             \x20  type M is array (1 .. 2, 1 .. 3) of I;\n\
             \x20  type R is record\n\
             \x20     V : M;\n\
             \x20  end record;\n\
             end Types_From;",
        );
        let to = to_graph(
            "package Types_To is\n\
             \x20  type I is range 0 .. 10;\n\
             \x20  type M is array (1 .. 6) of I;\n\
             \x20  type R is record\n\
             \x20     V : M;\n\
             \x20  end record;\n\
             end Types_To;",
        );
        let defs = defs_for(
            r#"{"mappings":[{"name":"R","from":"R","to":"R","fields":{"V":"V"}}]}"#,
            &from,
            &to,
        );
        let res = resolve_all(&defs, &from, &to, NarrowingPolicy::Warn, false);
        match res.pairs[0].outcome.as_ref().unwrap_err() {
            GenError::DimensionMismatch { src_rank, dst_rank, .. } => {
                assert_eq!((*src_rank, *dst_rank), (2, 1));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn longer_source_dimension_guards_and_warns() {
        let from = from_graph(
            "package Types_From is\n\
             \x20  type I is range 0 .. 10;\n\
             \x20  type Vec is array (1 .. 8) of I;\n\
             \x20  type R is record\n\
             \x20     V : Vec;\n\
             \x20  end record;\n\
             end Types_From;",
        );
        let to = to_graph(
            "package Types_To is\n\
             \x20  type I is range 0 .. 10;\n\
             \x20  type Vec is array (1 .. 4) of I;\n\
             \x20  type R is record\n\
             \x20     V : Vec;\n\
             \x20  end record;\n\
             end Types_To;",
        );
        let defs = defs_for(
            r#"{"mappings":[{"name":"R","from":"R","to":"R","fields":{"V":"V"}}]}"#,
            &from,
            &to,
        );
        let res = resolve_all(&defs, &from, &to, NarrowingPolicy::Warn, false);
        let derived = res.derived[0].outcome.as_ref().unwrap();
        match &derived.kind {
            PairKind::Array(plan) => assert_eq!(plan.guard, vec![true]),
            other => panic!("unexpected kind {other:?}"),
        }
        assert!(res
            .diagnostics
            .iter()
            .any(|d| matches!(d, crate::error::Diagnostic::ArrayOverhang { dim: 1, .. })));
    }

    #[test]
    fn shorter_source_dimension_defers_to_a_runtime_check() {
        let from = from_graph(
            "package Types_From is\n\
             \x20  type I is range 0 .. 10;\n\
             \x20  type Vec is array (1 .. 3) of I;\n\
             \x20  type R is record\n\
             \x20     V : Vec;\n\
             \x20  end record;\n\
             end Types_From;",
        );
        let to = to_graph(
            "package Types_To is\n\
             \x20  type I is range 0 .. 10;\n\
             \x20  type Vec is array (1 .. 4) of I;\n\
             \x20  type R is record\n\
             \x20     V : Vec;\n\
             \x20  end record;\n\
             end Types_To;",
        );
        let defs = defs_for(
            r#"{"mappings":[{"name":"R","from":"R","to":"R","fields":{"V":"V"}}]}"#,
            &from,
            &to,
        );
        let res = resolve_all(&defs, &from, &to, NarrowingPolicy::Warn, false);
        assert!(res.failures().is_empty(), "{:?}", res.failures());
        let derived = res.derived[0].outcome.as_ref().unwrap();
        match &derived.kind {
            PairKind::Array(plan) => assert_eq!(plan.guard, vec![true]),
            other => panic!("unexpected kind {other:?}"),
        }
        assert!(res
            .diagnostics
            .iter()
            .any(|d| matches!(d, crate::error::Diagnostic::ArrayShortfall { dim: 1, .. })));
    }

    #[test]
    fn index_names_extend_beyond_the_letter_table() {
        assert_eq!(index_names(2), ["I", "J"]);
        assert_eq!(index_names(7), ["I", "J", "K", "L", "M", "I6", "I7"]);
    }

    #[test]
    fn nested_arrays_chain_derived_pairs() {
        let from = from_graph(
            "package Types_From is\n\
             \x20  type I is range 0 .. 10;\n\
             \x20  type Row is array (1 .. 3) of I;\n\
             \x20  type Grid is array (1 .. 2) of Row;\n\
             \x20  type R is record\n\
             \x20     G : Grid;\n\
             \x20  end record;\n\
             end Types_From;",
        );
        let to = to_graph(
            "package Types_To is\n\
             \x20  type I is range 0 .. 10;\n\
             \x20  type Row is array (1 .. 3) of I;\n\
             \x20  type Grid is array (1 .. 2) of Row;\n\
             \x20  type R is record\n\
             \x20     G : Grid;\n\
             \x20  end record;\n\
             end Types_To;",
        );
        let defs = defs_for(
            r#"{"mappings":[{"name":"R","from":"R","to":"R","fields":{"G":"G"}}]}"#,
            &from,
            &to,
        );
        let res = resolve_all(&defs, &from, &to, NarrowingPolicy::Warn, false);
        // Grid pair first (referenced by the record), then Row (referenced
        // by Grid's element plan)
        assert_eq!(res.derived.len(), 2);
        assert_eq!(res.derived[0].key.0, "grid");
        assert_eq!(res.derived[1].key.0, "row");
        assert!(res.failures().is_empty());
    }
}
