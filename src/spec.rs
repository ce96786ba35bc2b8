//! Mapping specification loader.
//!
//! Parses the declarative `mappings.json` document into [`PairDef`]s and
//! performs the structural checks that abort a run before resolution:
//! unknown type names, duplicate (from, to) identities, malformed field
//! rules. Semantic resolution is the resolver's job.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::error::GenError;
use crate::schema::TypeGraph;

/// Rule sentinel: emit the Ada box default (`Field => <>`) for a component.
const DEFAULT_SENTINEL: &str = "DEFAULT";

#[derive(Debug, Deserialize)]
pub struct MappingDoc {
    pub mappings: Vec<MappingEntry>,
}

#[derive(Debug, Deserialize)]
pub struct MappingEntry {
    #[serde(default)]
    pub name: String,
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub fields: IndexMap<String, FieldRule>,
}

/// A field rule is either a bare source reference string or an object
/// carrying a reference plus enum literal overrides.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum FieldRule {
    Path(String),
    Detailed {
        #[serde(alias = "from", alias = "source")]
        path: String,
        #[serde(default)]
        enum_map: IndexMap<String, String>,
    },
}

/// Structured rule after syntax validation.
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    /// Explicit `"DEFAULT"`: destination component keeps its default value.
    Default,
    /// Dotted path into the source record (single segment = direct field).
    Path(Vec<String>),
    /// Path plus explicit enum literal overrides (source -> destination).
    WithEnumMap {
        path: Vec<String>,
        map: IndexMap<String, String>,
    },
}

/// One mapping pair, names resolved to canonical type-graph keys.
#[derive(Debug, Clone)]
pub struct PairDef {
    pub name: String,
    pub from_key: String,
    pub to_key: String,
    pub fields: IndexMap<String, Rule>,
}

/// Deserialize with JSON-path context in error messages.
pub fn load(src: &str) -> Result<MappingDoc, GenError> {
    let de = &mut serde_json::Deserializer::from_str(src);
    serde_path_to_error::deserialize::<_, MappingDoc>(de).map_err(|err| {
        let path = err.path().to_string();
        GenError::SpecSyntax {
            detail: format!("at JSON path {path}: {}", err.into_inner()),
        }
    })
}

static PATH_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").unwrap());

fn split_path(entry: &str, field: &str, raw: &str) -> Result<Vec<String>, GenError> {
    let segs: Vec<String> = raw.split('.').map(|s| s.trim().to_string()).collect();
    if segs.is_empty() || segs.iter().any(|s| !PATH_SEGMENT.is_match(s)) {
        return Err(GenError::BadFieldRule {
            entry: entry.to_string(),
            field: field.to_string(),
            detail: format!("'{raw}' is not a well-formed dotted path"),
        });
    }
    Ok(segs)
}

/// Validate a loaded document against both graphs and produce pair
/// definitions keyed by canonical type names.
pub fn validate(
    doc: &MappingDoc,
    from_graph: &TypeGraph,
    to_graph: &TypeGraph,
) -> Result<Vec<PairDef>, GenError> {
    let mut defs = Vec::with_capacity(doc.mappings.len());
    let mut seen = IndexMap::<(String, String), ()>::new();

    for entry in &doc.mappings {
        let from_key = from_graph.key_for(&entry.from).ok_or_else(|| GenError::UnknownType {
            side: from_graph.side,
            name: entry.from.clone(),
        })?;
        let to_key = to_graph.key_for(&entry.to).ok_or_else(|| GenError::UnknownType {
            side: to_graph.side,
            name: entry.to.clone(),
        })?;

        let identity = (from_key.clone(), to_key.clone());
        if seen.insert(identity, ()).is_some() {
            return Err(GenError::DuplicateMapping {
                from: entry.from.clone(),
                to: entry.to.clone(),
            });
        }

        let name = if entry.name.is_empty() {
            format!("{} -> {}", entry.from, entry.to)
        } else {
            entry.name.clone()
        };

        let mut fields = IndexMap::new();
        for (dest, rule) in &entry.fields {
            let rule = match rule {
                FieldRule::Path(raw) if raw.trim().eq_ignore_ascii_case(DEFAULT_SENTINEL) => {
                    Rule::Default
                }
                FieldRule::Path(raw) => Rule::Path(split_path(&name, dest, raw)?),
                FieldRule::Detailed { path, enum_map } if enum_map.is_empty() => {
                    Rule::Path(split_path(&name, dest, path)?)
                }
                FieldRule::Detailed { path, enum_map } => Rule::WithEnumMap {
                    path: split_path(&name, dest, path)?,
                    map: enum_map.clone(),
                },
            };
            fields.insert(dest.clone(), rule);
        }

        defs.push(PairDef { name, from_key, to_key, fields });
    }

    Ok(defs)
}

// ------------------------------- Tests ------------------------------------ //
