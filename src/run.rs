//! One generation run, end to end: parse both schemas, load and validate
//! the mapping document, resolve, emit.
//!
//! Structural problems abort the run with an error. Per-pair problems do
//! not: every pair that resolved (and does not depend on a failed pair)
//! still emits, and the failures ride along in the outcome.

use crate::emit::{self, EmittedUnit};
use crate::error::{Diagnostic, GenError};
use crate::provider::{parse_schema, ProviderKind};
use crate::resolve::{resolve_all, NarrowingPolicy};
use crate::schema::Side;
use crate::spec;

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub provider: ProviderKind,
    pub policy: NarrowingPolicy,
    pub parallel: bool,
    pub unit_name: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            policy: NarrowingPolicy::default(),
            parallel: false,
            unit_name: "Position_Mappers".to_string(),
        }
    }
}

#[derive(Debug)]
pub struct RunOutcome {
    /// None when no pair survived resolution.
    pub unit: Option<EmittedUnit>,
    pub emitted_pairs: Vec<String>,
    pub failures: Vec<(String, GenError)>,
    pub diagnostics: Vec<Diagnostic>,
}

pub fn generate(
    cfg: &RunConfig,
    from_source: &str,
    to_source: &str,
    mapping_json: &str,
) -> Result<RunOutcome, GenError> {
    let from = parse_schema(cfg.provider, Side::From, from_source)?;
    let to = parse_schema(cfg.provider, Side::To, to_source)?;
    let doc = spec::load(mapping_json)?;
    let defs = spec::validate(&doc, &from, &to)?;

    let res = resolve_all(&defs, &from, &to, cfg.policy, cfg.parallel);
    let emitted = res.emitted();
    let unit = if emitted.is_empty() {
        None
    } else {
        Some(emit::render(&cfg.unit_name, &from, &to, &emitted))
    };
    let emitted_pairs: Vec<String> = emitted.iter().map(|p| p.name.clone()).collect();
    let failures: Vec<(String, GenError)> = res
        .failures()
        .into_iter()
        .map(|(n, e)| (n.to_string(), e.clone()))
        .collect();
    drop(emitted);

    Ok(RunOutcome {
        unit,
        emitted_pairs,
        failures,
        diagnostics: res.diagnostics,
    })
}

// ------------------------------- Tests ------------------------------------ //
