//! `.kicad_pcb` reader

use crate::board::{Board, Footprint, Point, Side};
use crate::error::{FabError, Result};
use crate::sexpr::{self, Sexpr};
use std::path::Path;

/// Reference designator of a `footprint` (or legacy `module`) node
pub fn footprint_reference(item: &Sexpr) -> Option<&str> {
    footprint_text(item, "Reference", "reference")
}

fn footprint_text<'a>(item: &'a Sexpr, property: &str, fp_text_kind: &str) -> Option<&'a str> {
    // KiCad 8 and later store texts as properties
    let from_property = item
        .find_all_lists("property")
        .find(|p| p.get(1).and_then(Sexpr::as_text) == Some(property))
        .and_then(|p| p.get(2))
        .and_then(Sexpr::as_text);

    from_property.or_else(|| {
        item.find_all_lists("fp_text")
            .find(|t| t.get(1).and_then(Sexpr::as_text) == Some(fp_text_kind))
            .and_then(|t| t.get(2))
            .and_then(Sexpr::as_text)
    })
}

fn parse_footprint(item: &Sexpr) -> Option<Footprint> {
    let reference = footprint_reference(item)?;

    let at = item.find_list("at");
    let coord = |index: usize| at.and_then(|a| a.get(index)).and_then(Sexpr::as_f64);
    let position = Point::new(coord(1).unwrap_or(0.0), coord(2).unwrap_or(0.0));
    let rotation = coord(3).unwrap_or(0.0);

    let side = match item
        .find_list("layer")
        .and_then(|l| l.get(1))
        .and_then(Sexpr::as_text)
    {
        Some(layer) if layer.starts_with("B.") => Side::Back,
        _ => Side::Front,
    };

    let mut footprint = Footprint::new(reference, position, rotation, side);
    if let Some(attrs) = item.find_list("attr").and_then(Sexpr::as_list) {
        for attr in attrs.iter().skip(1).filter_map(Sexpr::as_text) {
            match attr {
                "exclude_from_pos_files" => footprint.exclude_from_pos_files = true,
                "exclude_from_bom" => footprint.exclude_from_bom = true,
                "dnp" => footprint.dnp = true,
                _ => {}
            }
        }
    }
    Some(footprint)
}

fn copper_layer_count(root: &Sexpr) -> u8 {
    let count = root
        .find_list("layers")
        .and_then(Sexpr::as_list)
        .map(|layers| {
            layers
                .iter()
                .filter_map(|layer| layer.get(1).and_then(Sexpr::as_text))
                .filter(|name| name.ends_with(".Cu"))
                .count()
        })
        .unwrap_or(0);
    u8::try_from(count).unwrap_or(u8::MAX)
}

fn aux_origin(root: &Sexpr) -> Point {
    root.find_list("setup")
        .and_then(|setup| setup.find_list("aux_axis_origin"))
        .map(|origin| {
            Point::new(
                origin.get(1).and_then(Sexpr::as_f64).unwrap_or(0.0),
                origin.get(2).and_then(Sexpr::as_f64).unwrap_or(0.0),
            )
        })
        .unwrap_or_default()
}

/// Parse board text read from `path`
pub fn parse_board(path: &Path, text: &str) -> Result<Board> {
    let invalid = |reason: String| FabError::InvalidBoard {
        path: path.display().to_string(),
        reason,
    };

    let root = sexpr::parse(text).map_err(|e| invalid(e.to_string()))?;
    if root.head() != Some("kicad_pcb") {
        return Err(invalid("not a KiCad board".to_string()).into());
    }

    let footprints = root
        .as_list()
        .unwrap_or_default()
        .iter()
        .filter(|item| matches!(item.head(), Some("footprint") | Some("module")))
        .filter_map(parse_footprint)
        .collect();

    Ok(Board::new(
        path,
        copper_layer_count(&root),
        aux_origin(&root),
        footprints,
    )
    .with_tree(root))
}

/// Read and parse a board file
pub fn read_board(path: &Path) -> Result<Board> {
    if !path.is_file() {
        return Err(FabError::BoardNotFound {
            path: path.display().to_string(),
        }
        .into());
    }
    let text = std::fs::read_to_string(path).map_err(|e| FabError::InvalidBoard {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    parse_board(path, &text)
}
