//! Mapping-document scaffolding.
//!
//! Builds a `mappings.json` skeleton from destination types: every record
//! field and enum literal gets either a same-name suggestion drawn from the
//! source schema or an angle-bracket placeholder for the user to fill in.
//! Nested record, array-element and enum correspondences spawn their own
//! entries, deduplicated by pair identity. An existing document can also be
//! updated in place: fresh suggestions fill placeholders and new fields
//! without touching values the user has already written.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::GenError;
use crate::schema::{TypeGraph, TypeKind};

#[derive(Debug, Serialize, Deserialize)]
pub struct ScaffoldDoc {
    pub mappings: Vec<ScaffoldEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ScaffoldEntry {
    pub name: String,
    pub from: String,
    pub to: String,
    pub fields: IndexMap<String, String>,
}

impl ScaffoldDoc {
    pub fn to_json(&self) -> String {
        // struct serialization cannot fail
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

struct Request {
    name: String,
    to_key: String,
    from_key: Option<String>,
}

/// "T_Position" suggests the mapping name "Position".
fn default_name(type_name: &str) -> String {
    let simple = type_name.rsplit('.').next().unwrap_or(type_name);
    match simple.to_ascii_uppercase().strip_prefix("T_") {
        Some(_) if simple.len() > 2 => simple[2..].to_string(),
        _ => simple.to_string(),
    }
}

fn field_placeholder(field: &str) -> String {
    let token: String = field
        .to_ascii_uppercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    let token = token.trim_matches('_');
    if token.is_empty() {
        "<FIELD_INPUT_FIELD>".to_string()
    } else {
        format!("<{token}_INPUT_FIELD>")
    }
}

fn from_placeholder(type_name: &str) -> String {
    let token: String = type_name
        .to_ascii_uppercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    let token = token.trim_matches('_');
    if token.is_empty() {
        "<SOURCE_TYPE>".to_string()
    } else {
        format!("<SOURCE_TYPE_FOR_{token}>")
    }
}

pub fn is_placeholder(value: &str) -> bool {
    value.starts_with('<') && value.ends_with('>')
}

/// Source type with the same simple name as a destination type, if any.
fn same_name_source(from_graph: &TypeGraph, to_graph: &TypeGraph, to_key: &str) -> Option<String> {
    from_graph.key_for(&to_graph.display_name(to_key))
}

fn is_record(graph: &TypeGraph, key: &str) -> bool {
    matches!(graph.effective_kind(key), Some(TypeKind::Record { .. }))
}

fn is_enum(graph: &TypeGraph, key: &str) -> bool {
    matches!(graph.effective_kind(key), Some(TypeKind::Enum { .. }))
}

fn root_request(to_graph: &TypeGraph, root: &str) -> Result<Request, GenError> {
    let to_key = to_graph.key_for(root).ok_or_else(|| GenError::UnknownType {
        side: to_graph.side,
        name: root.to_string(),
    })?;
    if !is_record(to_graph, &to_key) && !is_enum(to_graph, &to_key) {
        return Err(GenError::SpecSyntax {
            detail: format!("'{root}' is not a record or enum type; nothing to scaffold"),
        });
    }
    Ok(Request {
        name: default_name(root),
        to_key,
        from_key: None,
    })
}

/// Build scaffold entries for the named destination types and everything
/// they transitively require.
pub fn build(
    from_graph: &TypeGraph,
    to_graph: &TypeGraph,
    roots: &[String],
) -> Result<ScaffoldDoc, GenError> {
    let mut queue = Vec::with_capacity(roots.len());
    for root in roots {
        queue.push(root_request(to_graph, root)?);
    }
    Ok(expand(from_graph, to_graph, queue))
}

fn expand(from_graph: &TypeGraph, to_graph: &TypeGraph, mut queue: Vec<Request>) -> ScaffoldDoc {
    let mut processed = IndexMap::<(String, String), ()>::new();
    let mut mappings = Vec::new();
    let mut cursor = 0;
    while cursor < queue.len() {
        let req = &queue[cursor];
        cursor += 1;

        let from_key = req
            .from_key
            .clone()
            .or_else(|| same_name_source(from_graph, to_graph, &req.to_key));
        let identity = (
            from_key.clone().unwrap_or_default(),
            req.to_key.clone(),
        );
        if processed.insert(identity, ()).is_some() {
            continue;
        }

        let (entry, nested) = build_entry(from_graph, to_graph, req, from_key.as_deref());
        mappings.push(entry);
        queue.extend(nested);
    }

    ScaffoldDoc { mappings }
}

fn entry_all_placeholders(entry: &ScaffoldEntry) -> bool {
    is_placeholder(&entry.from) && entry.fields.values().all(|v| is_placeholder(v))
}

/// Merge fresh suggestions into an existing mapping document. Values the
/// user has filled in are kept; placeholders and newly appeared destination
/// fields take the suggestion; entries whose destination type no longer
/// yields a suggestion are dropped. Returns the merged document and whether
/// anything changed.
pub fn update(
    from_graph: &TypeGraph,
    to_graph: &TypeGraph,
    existing_json: &str,
    extra_roots: &[String],
) -> Result<(ScaffoldDoc, bool), GenError> {
    let existing: ScaffoldDoc =
        serde_json::from_str(existing_json).map_err(|e| GenError::SpecSyntax {
            detail: format!("existing mapping file: {e}"),
        })?;

    let mut queue = Vec::new();
    for entry in &existing.mappings {
        let Some(to_key) = to_graph.key_for(&entry.to) else { continue };
        if !is_record(to_graph, &to_key) && !is_enum(to_graph, &to_key) {
            continue;
        }
        if entry_all_placeholders(entry) {
            continue;
        }
        let from_key = if is_placeholder(&entry.from) {
            None
        } else {
            from_graph.key_for(&entry.from)
        };
        queue.push(Request {
            name: entry.name.clone(),
            to_key,
            from_key,
        });
    }
    for root in extra_roots {
        let req = root_request(to_graph, root)?;
        if !queue.iter().any(|r| r.to_key == req.to_key) {
            queue.push(req);
        }
    }

    let fresh = expand(from_graph, to_graph, queue);
    let mut fresh_by_to: IndexMap<String, ScaffoldEntry> = fresh
        .mappings
        .into_iter()
        .map(|e| (e.to.to_ascii_lowercase(), e))
        .collect();

    let mut changed = false;
    let mut merged = Vec::new();
    for entry in existing.mappings {
        let Some(sugg) = fresh_by_to.shift_remove(&entry.to.to_ascii_lowercase()) else {
            // destination type gone or entry never got beyond placeholders
            changed = true;
            continue;
        };
        let keep_from = !is_placeholder(&entry.from) && from_graph.key_for(&entry.from).is_some();
        let from = if keep_from { entry.from.clone() } else { sugg.from };
        let mut fields = IndexMap::with_capacity(sugg.fields.len());
        for (name, sugg_value) in sugg.fields {
            let value = match entry.fields.get(&name) {
                Some(v) if !is_placeholder(v) => v.clone(),
                _ => sugg_value,
            };
            fields.insert(name, value);
        }
        if from != entry.from || fields != entry.fields {
            changed = true;
        }
        merged.push(ScaffoldEntry {
            name: entry.name,
            from,
            to: entry.to,
            fields,
        });
    }
    for (_, sugg) in fresh_by_to {
        merged.push(sugg);
        changed = true;
    }

    Ok((ScaffoldDoc { mappings: merged }, changed))
}

fn build_entry(
    from_graph: &TypeGraph,
    to_graph: &TypeGraph,
    req: &Request,
    from_key: Option<&str>,
) -> (ScaffoldEntry, Vec<Request>) {
    let to_display = to_graph.display_name(&req.to_key);
    let from_value = from_key
        .map(|k| from_graph.display_name(k))
        .unwrap_or_else(|| from_placeholder(&to_display));

    let mut fields = IndexMap::new();
    let mut nested = Vec::new();

    if let Some(lits) = to_graph.enum_literals(&req.to_key) {
        let src_lits = from_key.and_then(|k| from_graph.enum_literals(k)).unwrap_or_default();
        for lit in lits {
            let suggestion = src_lits
                .iter()
                .find(|s| s.eq_ignore_ascii_case(lit))
                .cloned()
                .unwrap_or_else(|| field_placeholder(lit));
            fields.insert(lit.clone(), suggestion);
        }
    } else if let Some(decls) = to_graph.record_fields(&req.to_key) {
        let src_fields = from_key.and_then(|k| from_graph.record_fields(k)).unwrap_or_default();
        for f in decls {
            let src = src_fields.iter().find(|s| s.name.eq_ignore_ascii_case(&f.name));
            let value = src
                .map(|s| s.name.clone())
                .unwrap_or_else(|| field_placeholder(&f.name));
            fields.insert(f.name.clone(), value);

            // nested entries for aggregate field types
            let dest_ty = f.ty.target();
            let src_ty = src.map(|s| s.ty.target().to_string());
            if is_record(to_graph, dest_ty) {
                nested.push(Request {
                    name: default_name(&to_graph.display_name(dest_ty)),
                    to_key: dest_ty.to_string(),
                    from_key: src_ty.filter(|t| is_record(from_graph, t)),
                });
            } else if is_enum(to_graph, dest_ty) {
                nested.push(Request {
                    name: default_name(&to_graph.display_name(dest_ty)),
                    to_key: dest_ty.to_string(),
                    from_key: src_ty.filter(|t| is_enum(from_graph, t)),
                });
            } else if let Some((elem, _)) = to_graph.array_shape(dest_ty) {
                // element records need their own pair; scalar elements do not
                let elem_key = elem.target().to_string();
                if is_record(to_graph, &elem_key) {
                    let src_elem = src_ty
                        .and_then(|t| from_graph.array_shape(&t).map(|(e, _)| e.target().to_string()))
                        .filter(|t| is_record(from_graph, t));
                    nested.push(Request {
                        name: default_name(&to_graph.display_name(&elem_key)),
                        to_key: elem_key,
                        from_key: src_elem,
                    });
                }
            }
        }
    }

    (
        ScaffoldEntry {
            name: req.name.clone(),
            from: from_value,
            to: to_display,
            fields,
        },
        nested,
    )
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{from_graph, to_graph};

    const FROM: &str = "package Types_From is\n\
        \x20  type I32 is range -2147483648 .. 2147483647;\n\
        \x20  type Mode is (Off, Active);\n\
        \x20  type Inner is record\n\
        \x20     X : I32;\n\
        \x20  end record;\n\
        \x20  type T_Pos is record\n\
        \x20     Lat : I32;\n\
        \x20     Inr : Inner;\n\
        \x20     M : Mode;\n\
        \x20  end record;\n\
        end Types_From;";

    const TO: &str = "package Types_To is\n\
        \x20  type I16 is range -32768 .. 32767;\n\
        \x20  type Mode is (Off, Active);\n\
        \x20  type Inner is record\n\
        \x20     X : I16;\n\
        \x20  end record;\n\
        \x20  type T_Pos is record\n\
        \x20     Lat : I16;\n\
        \x20     Alt : I16;\n\
        \x20     Inr : Inner;\n\
        \x20     M : Mode;\n\
        \x20  end record;\n\
        end Types_To;";

    #[test]
    fn same_names_are_suggested_and_gaps_become_placeholders() {
        let from = from_graph(FROM);
        let to = to_graph(TO);
        let doc = build(&from, &to, &["T_Pos".to_string()]).unwrap();
        let entry = &doc.mappings[0];
        assert_eq!(entry.name, "Pos");
        assert_eq!(entry.from, "T_Pos");
        assert_eq!(entry.fields["Lat"], "Lat");
        assert_eq!(entry.fields["Alt"], "<ALT_INPUT_FIELD>");
        assert!(is_placeholder(&entry.fields["Alt"]));
    }

    #[test]
    fn nested_record_and_enum_spawn_their_own_entries() {
        let from = from_graph(FROM);
        let to = to_graph(TO);
        let doc = build(&from, &to, &["T_Pos".to_string()]).unwrap();
        let tos: Vec<&str> = doc.mappings.iter().map(|e| e.to.as_str()).collect();
        assert_eq!(tos, ["T_Pos", "Inner", "Mode"]);
        let mode = doc.mappings.iter().find(|e| e.to == "Mode").unwrap();
        assert_eq!(mode.fields["Off"], "Off");
        assert_eq!(mode.fields["Active"], "Active");
    }

    #[test]
    fn shared_nested_type_is_scaffolded_once() {
        let from = from_graph(
            "package Types_From is\n\
             \x20  type I32 is range 0 .. 10;\n\
             \x20  type Inner is record\n\
             \x20     X : I32;\n\
             \x20  end record;\n\
             \x20  type Outer is record\n\
             \x20     A : Inner;\n\
             \x20     B : Inner;\n\
             \x20  end record;\n\
             end Types_From;",
        );
        let to = to_graph(
            "package Types_To is\n\
             \x20  type I16 is range 0 .. 10;\n\
             \x20  type Inner is record\n\
             \x20     X : I16;\n\
             \x20  end record;\n\
             \x20  type Outer is record\n\
             \x20     A : Inner;\n\
             \x20     B : Inner;\n\
             \x20  end record;\n\
             end Types_To;",
        );
        let doc = build(&from, &to, &["Outer".to_string()]).unwrap();
        assert_eq!(doc.mappings.len(), 2);
    }

    #[test]
    fn missing_source_type_becomes_a_placeholder() {
        let from = from_graph(
            "package Types_From is\n\
             \x20  type I32 is range 0 .. 10;\n\
             end Types_From;",
        );
        let to = to_graph(
            "package Types_To is\n\
             \x20  type I16 is range 0 .. 10;\n\
             \x20  type Lone is record\n\
             \x20     V : I16;\n\
             \x20  end record;\n\
             end Types_To;",
        );
        let doc = build(&from, &to, &["Lone".to_string()]).unwrap();
        assert_eq!(doc.mappings[0].from, "<SOURCE_TYPE_FOR_LONE>");
        assert_eq!(doc.mappings[0].fields["V"], "<V_INPUT_FIELD>");
    }

    #[test]
    fn unknown_root_is_rejected() {
        let from = from_graph("package Types_From is\nend Types_From;");
        let to = to_graph("package Types_To is\nend Types_To;");
        let err = build(&from, &to, &["Nope".to_string()]).unwrap_err();
        assert!(matches!(err, GenError::UnknownType { .. }));
    }

    #[test]
    fn update_keeps_user_values_and_fills_new_fields() {
        let from = from_graph(FROM);
        let to = to_graph(TO);
        // hand-edited file: Lat mapped from a differently named source
        // field, Alt still a placeholder, Inr/M not yet present
        let existing = r#"{"mappings":[
            {"name":"Pos","from":"T_Pos","to":"T_Pos",
             "fields":{"Lat":"Inr.X","Alt":"<ALT_INPUT_FIELD>"}}]}"#;
        let (doc, changed) = update(&from, &to, existing, &[]).unwrap();
        assert!(changed);
        let entry = &doc.mappings[0];
        assert_eq!(entry.fields["Lat"], "Inr.X");
        assert_eq!(entry.fields["Alt"], "<ALT_INPUT_FIELD>");
        assert_eq!(entry.fields["Inr"], "Inr");
        assert_eq!(entry.fields["M"], "M");
        // nested types referenced by the refreshed entry get their own pairs
        let tos: Vec<&str> = doc.mappings.iter().map(|e| e.to.as_str()).collect();
        assert_eq!(tos, ["T_Pos", "Inner", "Mode"]);
    }

    #[test]
    fn update_of_an_already_complete_document_changes_nothing() {
        let from = from_graph(FROM);
        let to = to_graph(TO);
        let first = build(&from, &to, &["T_Pos".to_string()]).unwrap();
        let (second, changed) = update(&from, &to, &first.to_json(), &[]).unwrap();
        assert!(!changed, "{}", second.to_json());
        assert_eq!(second.to_json(), first.to_json());
    }

    #[test]
    fn update_drops_entries_whose_destination_type_disappeared() {
        let from = from_graph(FROM);
        let to = to_graph(TO);
        let existing = r#"{"mappings":[
            {"name":"Pos","from":"T_Pos","to":"T_Pos",
             "fields":{"Lat":"Lat","Alt":"Lat","Inr":"Inr","M":"M"}},
            {"name":"Gone","from":"Old","to":"Removed_Type","fields":{"V":"V"}}]}"#;
        let (doc, changed) = update(&from, &to, existing, &[]).unwrap();
        assert!(changed);
        assert!(doc.mappings.iter().all(|e| e.to != "Removed_Type"));
    }

    #[test]
    fn update_accepts_extra_roots() {
        let from = from_graph(FROM);
        let to = to_graph(TO);
        let existing = r#"{"mappings":[]}"#;
        let (doc, changed) = update(&from, &to, existing, &["Mode".to_string()]).unwrap();
        assert!(changed);
        assert_eq!(doc.mappings[0].to, "Mode");
        assert_eq!(doc.mappings[0].fields["Off"], "Off");
    }

    #[test]
    fn json_output_preserves_field_order() {
        let from = from_graph(FROM);
        let to = to_graph(TO);
        let doc = build(&from, &to, &["T_Pos".to_string()]).unwrap();
        let json = doc.to_json();
        let lat = json.find("\"Lat\"").unwrap();
        let alt = json.find("\"Alt\"").unwrap();
        let inr = json.find("\"Inr\"").unwrap();
        assert!(lat < alt && alt < inr);
    }
}
