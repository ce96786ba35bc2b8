//! Error taxonomy for one generation run.
//!
//! Structural errors (`Parse`, `SpecSyntax`, `UnknownType`, `DuplicateMapping`,
//! `BadFieldRule`) abort the run before resolution starts. Per-pair errors
//! (`MissingField`, `TypeMismatch`, `DimensionMismatch`, `CyclicDelegation`)
//! abort only that pair; independent pairs still emit.

use std::fmt;

use thiserror::Error;

use crate::schema::Side;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GenError {
    #[error("{side} schema: {detail}")]
    Parse { side: Side, detail: String },

    #[error("mapping specification: {detail}")]
    SpecSyntax { detail: String },

    #[error("mapping '{entry}', field '{field}': {detail}")]
    BadFieldRule {
        entry: String,
        field: String,
        detail: String,
    },

    #[error("unknown type '{name}' in {side} schema")]
    UnknownType { side: Side, name: String },

    #[error("duplicate mapping for pair ({from}, {to})")]
    DuplicateMapping { from: String, to: String },

    #[error("missing field: '{path}' not found in {type_name}")]
    MissingField { type_name: String, path: String },

    #[error("type mismatch at {context}: no rule bridges {src} -> {dst} ({detail})")]
    TypeMismatch {
        context: String,
        src: String,
        dst: String,
        detail: String,
    },

    #[error("array rank mismatch: {src} has rank {src_rank}, {dst} has rank {dst_rank}")]
    DimensionMismatch {
        src: String,
        dst: String,
        src_rank: usize,
        dst_rank: usize,
    },

    #[error("cyclic delegation among mapping pairs: {}", cycle.join(" -> "))]
    CyclicDelegation { cycle: Vec<String> },

    #[error("mapping '{pair}' depends on failed mapping '{on}'")]
    DependencyFailed { pair: String, on: String },

    #[error("validation toolchain '{tool}' is not available")]
    ToolchainMissing { tool: String },

    #[error("validation toolchain failed to run: {detail}")]
    Tool { detail: String },
}

/// Non-fatal findings surfaced alongside successful output. These never abort
/// anything; the run collects them and the CLI prints them as warnings.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// Narrowing numeric cast accepted under `NarrowingPolicy::Warn`.
    LossyCoercion {
        pair: String,
        dest: String,
        src: String,
        dst: String,
        note: String,
    },
    /// A source array dimension is statically longer than the destination's;
    /// trailing source elements are dropped and the emitted body asserts
    /// lengths for that dimension.
    ArrayOverhang {
        pair: String,
        dim: usize,
        src: String,
        dst: String,
    },
    /// A source array dimension is statically shorter than the destination's.
    /// Bounds may come from distinct subtypes, so the condition defers to the
    /// length assert emitted at the top of the generated body.
    ArrayShortfall {
        pair: String,
        dim: usize,
        src: String,
        dst: String,
    },
}

impl Diagnostic {
    /// The same finding attributed to a different mapping pair, used when a
    /// memoized resolution is reused from another pair.
    pub(crate) fn for_pair(&self, pair: &str) -> Diagnostic {
        let mut d = self.clone();
        match &mut d {
            Diagnostic::LossyCoercion { pair: p, .. }
            | Diagnostic::ArrayOverhang { pair: p, .. }
            | Diagnostic::ArrayShortfall { pair: p, .. } => *p = pair.to_string(),
        }
        d
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::LossyCoercion { pair, dest, src, dst, note } => write!(
                f,
                "lossy coercion in '{pair}' at {dest}: {src} -> {dst} ({note})"
            ),
            Diagnostic::ArrayOverhang { pair, dim, src, dst } => write!(
                f,
                "array '{src}' is longer than '{dst}' in dimension {dim} of '{pair}'; trailing source elements are dropped"
            ),
            Diagnostic::ArrayShortfall { pair, dim, src, dst } => write!(
                f,
                "array '{src}' is shorter than '{dst}' in dimension {dim} of '{pair}'; the generated body asserts lengths at run time"
            ),
        }
    }
}
