//! `.kicad_sch` reader
//!
//! Collects placed symbols from the root sheet and every sub-sheet it
//! references. Library symbol definitions are not instances and are skipped.

use crate::error::{FabError, Result};
use crate::schematic::SchematicComponent;
use crate::sexpr::{self, Sexpr};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

fn property<'a>(item: &'a Sexpr, name: &str) -> Option<&'a str> {
    item.find_all_lists("property")
        .find(|p| p.get(1).and_then(Sexpr::as_text) == Some(name))
        .and_then(|p| p.get(2))
        .and_then(Sexpr::as_text)
}

fn yes_no(item: &Sexpr, name: &str, default: bool) -> bool {
    match item.find_list(name).and_then(|l| l.get(1)).and_then(Sexpr::as_text) {
        Some("yes") => true,
        Some("no") => false,
        _ => default,
    }
}

/// Annotated instances of a symbol as `(reference, unit)`. A sheet used
/// several times lists one instance path per use. Symbols without instance
/// data fall back to the `Reference` property.
fn symbol_instances(symbol: &Sexpr) -> Vec<(&str, Option<u32>)> {
    let mut seen = HashSet::new();
    let mut instances = Vec::new();

    let paths = symbol
        .find_list("instances")
        .into_iter()
        .flat_map(|instances| instances.find_all_lists("project"))
        .flat_map(|project| project.find_all_lists("path"));
    for path in paths {
        let id = path.get(1).and_then(Sexpr::as_text).unwrap_or_default();
        let Some(reference) = path
            .find_list("reference")
            .and_then(|r| r.get(1))
            .and_then(Sexpr::as_text)
        else {
            continue;
        };
        if seen.insert(id) {
            instances.push((reference, unit_of(path)));
        }
    }

    if instances.is_empty() {
        instances.extend(property(symbol, "Reference").map(|reference| (reference, None)));
    }
    instances
}

fn unit_of(item: &Sexpr) -> Option<u32> {
    item.find_list("unit")
        .and_then(|u| u.get(1))
        .and_then(Sexpr::as_f64)
        .map(|u| u as u32)
}

/// One component per instance of `symbol`
fn parse_symbol(symbol: &Sexpr) -> Vec<SchematicComponent> {
    let symbol_unit = unit_of(symbol).unwrap_or(1);
    let in_bom = yes_no(symbol, "in_bom", true);
    let fields: Vec<(&str, &str)> = symbol
        .find_all_lists("property")
        .filter_map(|prop| {
            Some((
                prop.get(1).and_then(Sexpr::as_text)?,
                prop.get(2).and_then(Sexpr::as_text)?,
            ))
        })
        .collect();

    symbol_instances(symbol)
        .into_iter()
        .map(|(reference, unit)| {
            let component = fields
                .iter()
                .fold(SchematicComponent::new(reference), |c, (key, value)| {
                    c.with_field(key, value)
                });
            component
                .with_field("Reference", reference)
                .with_unit(unit.unwrap_or(symbol_unit))
                .with_in_bom(in_bom)
        })
        .collect()
}

/// Parse one sheet. Returns its components and the sub-sheet file names.
pub fn parse_sheet(path: &Path, text: &str) -> Result<(Vec<SchematicComponent>, Vec<String>)> {
    let invalid = |reason: String| FabError::InvalidSchematic {
        path: path.display().to_string(),
        reason,
    };

    let root = sexpr::parse(text).map_err(|e| invalid(e.to_string()))?;
    if root.head() != Some("kicad_sch") {
        return Err(invalid("not a KiCad schematic".to_string()).into());
    }

    let components = root
        .find_all_lists("symbol")
        .flat_map(parse_symbol)
        .collect();

    let sheets = root
        .find_all_lists("sheet")
        .filter_map(|sheet| property(sheet, "Sheetfile").or_else(|| property(sheet, "Sheet file")))
        .map(str::to_string)
        .collect();

    Ok((components, sheets))
}

/// Read a schematic and its whole sheet hierarchy
pub fn read_schematic(path: &Path) -> Result<Vec<SchematicComponent>> {
    let mut components = Vec::new();
    let mut visited: HashSet<PathBuf> = HashSet::new();
    let mut pending = vec![path.to_path_buf()];

    while let Some(sheet_path) = pending.pop() {
        if !visited.insert(sheet_path.clone()) {
            continue;
        }

        let text = std::fs::read_to_string(&sheet_path).map_err(|e| FabError::InvalidSchematic {
            path: sheet_path.display().to_string(),
            reason: e.to_string(),
        })?;
        let (sheet_components, sub_sheets) = parse_sheet(&sheet_path, &text)?;
        debug!(
            "Read {} symbol(s) from {}",
            sheet_components.len(),
            sheet_path.display()
        );
        components.extend(sheet_components);

        let dir = sheet_path.parent().unwrap_or_else(|| Path::new("."));
        // Reverse so sheets are visited in file order
        pending.extend(sub_sheets.iter().rev().map(|name| dir.join(name)));
    }

    Ok(components)
}
