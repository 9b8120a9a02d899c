//! Component placement data
//!
//! Coordinates are relative to the board's aux origin with the Y axis
//! pointing up, as pick-and-place machines expect.

use crate::board::{Board, Side};
use crate::error::{Result, ResultExt};
use crate::schematic::ComponentFields;
use regex::Regex;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

const HEADER: [&str; 5] = ["Designator", "Mid X", "Mid Y", "Rotation", "Layer"];

/// Placement of one component
#[derive(Debug, Clone, PartialEq)]
pub struct PositionRow {
    pub reference: String,
    pub x: f64,
    pub y: f64,
    pub rotation: f64,
    pub side: Side,
}

impl PositionRow {
    pub fn layer(&self) -> &'static str {
        match self.side {
            Side::Front => "top",
            Side::Back => "bottom",
        }
    }
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Chunk {
    Text(String),
    Number(u64),
}

/// Sort key ordering `R2` before `R10`
fn natural_key(reference: &str) -> Vec<Chunk> {
    lazy_static::lazy_static! {
        static ref CHUNKS: Regex = Regex::new(r"\d+|\D+").expect("valid chunk regex");
    }

    CHUNKS
        .find_iter(reference)
        .map(|m| match m.as_str().parse::<u64>() {
            Ok(number) => Chunk::Number(number),
            Err(_) => Chunk::Text(m.as_str().to_string()),
        })
        .collect()
}

pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    natural_key(a).cmp(&natural_key(b))
}

/// Placement rows for every footprint that is placed, in the BOM on both
/// board and schematic, and not excluded from position files
pub fn collect_pos_data<C: ComponentFields>(board: &Board, components: &[C]) -> Vec<PositionRow> {
    // A multi-unit symbol is in the BOM when any of its units is
    let mut in_bom: HashMap<&str, bool> = HashMap::new();
    for component in components {
        *in_bom.entry(component.reference()).or_default() |= component.in_bom();
    }
    let origin = board.aux_origin();

    let mut rows: Vec<PositionRow> = board
        .footprints()
        .iter()
        .filter(|fp| {
            let keep = !fp.exclude_from_pos_files
                && !fp.exclude_from_bom
                && !fp.dnp
                && in_bom.get(fp.reference.as_str()).copied().unwrap_or(false);
            if !keep {
                debug!("Skipping {} in position data", fp.reference);
            }
            keep
        })
        .map(|fp| PositionRow {
            reference: fp.reference.clone(),
            // Adding 0.0 turns -0.0 into 0.0
            x: fp.position.x - origin.x + 0.0,
            y: origin.y - fp.position.y + 0.0,
            rotation: fp.rotation.rem_euclid(360.0),
            side: fp.side,
        })
        .collect();

    rows.sort_by(|a, b| natural_cmp(&a.reference, &b.reference));
    rows
}

/// References of the collected rows
pub fn placed_references(rows: &[PositionRow]) -> HashSet<String> {
    rows.iter().map(|row| row.reference.clone()).collect()
}

pub fn write_pos_csv<W: Write>(rows: &[PositionRow], writer: W) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(HEADER)?;
    for row in rows {
        csv.write_record([
            row.reference.clone(),
            format!("{:.4}", row.x),
            format!("{:.4}", row.y),
            format!("{:.4}", row.rotation),
            row.layer().to_string(),
        ])?;
    }
    csv.flush()?;
    Ok(())
}

pub fn write_pos_file(rows: &[PositionRow], path: &Path) -> Result<()> {
    let file = std::fs::File::create(path).with_path_context("create position file", path)?;
    write_pos_csv(rows, file).with_path_context("write position file", path)?;
    info!("Wrote {} placement(s) to {}", rows.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{Footprint, Point};
    use crate::schematic::SchematicComponent;

    fn board() -> Board {
        let mut excluded = Footprint::new("R3", Point::new(0.0, 0.0), 0.0, Side::Front);
        excluded.exclude_from_pos_files = true;
        let mut dnp = Footprint::new("R4", Point::new(0.0, 0.0), 0.0, Side::Front);
        dnp.dnp = true;

        Board::new(
            "demo.kicad_pcb",
            2,
            Point::new(100.0, 100.0),
            vec![
                Footprint::new("R10", Point::new(110.0, 90.0), -90.0, Side::Front),
                Footprint::new("R2", Point::new(100.0, 100.0), 450.0, Side::Back),
                excluded,
                dnp,
                Footprint::new("H1", Point::new(0.0, 0.0), 0.0, Side::Front),
            ],
        )
    }

    fn schematic() -> Vec<SchematicComponent> {
        ["R2", "R3", "R4", "R10"]
            .iter()
            .map(|r| SchematicComponent::new(r))
            .collect()
    }

    #[test]
    fn test_filter_and_natural_order() {
        let rows = collect_pos_data(&board(), &schematic());
        let refs: Vec<&str> = rows.iter().map(|r| r.reference.as_str()).collect();
        assert_eq!(refs, vec!["R2", "R10"]);
    }

    #[test]
    fn test_coordinates_relative_to_aux_origin() {
        let rows = collect_pos_data(&board(), &schematic());

        assert_eq!(rows[0].x, 0.0);
        assert_eq!(rows[0].y, 0.0);
        assert_eq!(rows[0].rotation, 90.0);
        assert_eq!(rows[0].layer(), "bottom");

        assert_eq!(rows[1].x, 10.0);
        assert_eq!(rows[1].y, 10.0);
        assert_eq!(rows[1].rotation, 270.0);
        assert_eq!(rows[1].layer(), "top");
    }

    #[test]
    fn test_not_in_bom_parts_are_not_placed() {
        let mut hole = Footprint::new("H1", Point::new(5.0, 5.0), 0.0, Side::Front);
        hole.exclude_from_bom = true;
        let board = Board::new(
            "demo.kicad_pcb",
            2,
            Point::default(),
            vec![
                hole,
                Footprint::new("TP1", Point::new(1.0, 1.0), 0.0, Side::Front),
                Footprint::new("U1", Point::new(2.0, 2.0), 0.0, Side::Front),
            ],
        );
        let components = vec![
            SchematicComponent::new("H1"),
            SchematicComponent::new("TP1").with_in_bom(false),
            SchematicComponent::new("U1").with_unit(1).with_in_bom(false),
            SchematicComponent::new("U1").with_unit(2),
        ];

        let rows = collect_pos_data(&board, &components);
        let refs: Vec<&str> = rows.iter().map(|r| r.reference.as_str()).collect();
        assert_eq!(refs, vec!["U1"]);
    }

    #[test]
    fn test_natural_cmp() {
        assert_eq!(natural_cmp("R2", "R10"), Ordering::Less);
        assert_eq!(natural_cmp("C1", "R1"), Ordering::Less);
        assert_eq!(natural_cmp("U10", "U10"), Ordering::Equal);
    }

    #[test]
    fn test_csv_output() {
        let rows = collect_pos_data(&board(), &schematic());
        let mut out = Vec::new();
        write_pos_csv(&rows, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Designator,Mid X,Mid Y,Rotation,Layer");
        assert_eq!(lines[1], "R2,0.0000,0.0000,90.0000,bottom");
        assert_eq!(lines[2], "R10,10.0000,10.0000,270.0000,top");
    }
}
