//! Shared test fixtures: inline Ada schemas and mapping documents.

use crate::provider::{parse_schema, ProviderKind};
use crate::schema::{Side, TypeGraph};
use crate::spec::{self, PairDef};

pub fn from_graph(source: &str) -> TypeGraph {
    parse_schema(ProviderKind::Lexical, Side::From, source).expect("source schema")
}

pub fn to_graph(source: &str) -> TypeGraph {
    parse_schema(ProviderKind::Lexical, Side::To, source).expect("destination schema")
}

pub fn defs_for(json: &str, from: &TypeGraph, to: &TypeGraph) -> Vec<PairDef> {
    let doc = spec::load(json).expect("mapping json");
    spec::validate(&doc, from, to).expect("mapping validation")
}
