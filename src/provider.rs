//! Pluggable schema parsing strategies.
//!
//! Both variants turn raw Ada declaration text into the same [`TypeGraph`]
//! shape; the choice is a robustness/precision trade-off, never a semantic
//! one. The lexical scanner is line/pattern driven and tolerates irregular or
//! partial input; the syntax variant tokenizes and parses strictly, resolving
//! nested-package scoping and subtype constraints precisely.

pub mod lexical;
pub mod syntax;

use crate::error::GenError;
use crate::schema::{Side, TypeGraph};

pub trait SchemaParser {
    fn parse(&self, side: Side, source: &str) -> Result<TypeGraph, GenError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProviderKind {
    #[default]
    Lexical,
    Syntax,
}

impl ProviderKind {
    pub fn parser(&self) -> Box<dyn SchemaParser + Send + Sync> {
        match self {
            ProviderKind::Lexical => Box::new(lexical::LexicalParser),
            ProviderKind::Syntax => Box::new(syntax::SyntaxParser),
        }
    }
}

/// Parse and link in one step; every ref in the returned graph is resolved.
pub fn parse_schema(kind: ProviderKind, side: Side, source: &str) -> Result<TypeGraph, GenError> {
    let graph = kind.parser().parse(side, source)?;
    graph.link()?;
    Ok(graph)
}

// ------------------------------- Tests ------------------------------------ //
