//! Loaded board model
//!
//! A [`Board`] is loaded once per run and shared by every exporter. The only
//! mutation is dropping ignored footprints before export.

use crate::sexpr::Sexpr;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A point in millimeters, KiCad board coordinates (Y grows downward)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Board side a footprint is mounted on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Front,
    Back,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Front => "front",
            Side::Back => "back",
        }
    }
}

/// A placed footprint
#[derive(Debug, Clone, PartialEq)]
pub struct Footprint {
    pub reference: String,
    pub position: Point,
    pub rotation: f64,
    pub side: Side,
    pub exclude_from_pos_files: bool,
    pub exclude_from_bom: bool,
    pub dnp: bool,
}

impl Footprint {
    pub fn new(reference: &str, position: Point, rotation: f64, side: Side) -> Self {
        Self {
            reference: reference.to_string(),
            position,
            rotation,
            side,
            exclude_from_pos_files: false,
            exclude_from_bom: false,
            dnp: false,
        }
    }
}

/// A board loaded from disk
#[derive(Debug, Clone)]
pub struct Board {
    path: PathBuf,
    copper_layer_count: u8,
    aux_origin: Point,
    footprints: Vec<Footprint>,
    tree: Option<Sexpr>,
    modified: bool,
}

impl Board {
    pub fn new(
        path: impl Into<PathBuf>,
        copper_layer_count: u8,
        aux_origin: Point,
        footprints: Vec<Footprint>,
    ) -> Self {
        Self {
            path: path.into(),
            copper_layer_count,
            aux_origin,
            footprints,
            tree: None,
            modified: false,
        }
    }

    /// Attach the parsed source tree so removals can be written back out
    pub fn with_tree(mut self, tree: Sexpr) -> Self {
        self.tree = Some(tree);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name without the `.kicad_pcb` extension
    pub fn name(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "board".to_string())
    }

    pub fn copper_layer_count(&self) -> u8 {
        self.copper_layer_count
    }

    pub fn aux_origin(&self) -> Point {
        self.aux_origin
    }

    pub fn footprints(&self) -> &[Footprint] {
        &self.footprints
    }

    pub fn tree(&self) -> Option<&Sexpr> {
        self.tree.as_ref()
    }

    /// Whether the in-memory board differs from the file on disk
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Remove footprints whose reference is in `references`.
    /// Returns the number of removed footprints.
    pub fn remove_footprints(&mut self, references: &HashSet<String>) -> usize {
        if references.is_empty() {
            return 0;
        }

        let before = self.footprints.len();
        self.footprints
            .retain(|fp| !references.contains(&fp.reference));
        let removed = before - self.footprints.len();

        if let Some(items) = self.tree.as_mut().and_then(Sexpr::as_list_mut) {
            items.retain(|item| {
                if item.head() != Some("footprint") && item.head() != Some("module") {
                    return true;
                }
                match crate::kicad::board::footprint_reference(item) {
                    Some(reference) => !references.contains(reference),
                    None => true,
                }
            });
        }

        if removed > 0 {
            self.modified = true;
            info!("Removed {} ignored footprint(s) from {}", removed, self.name());
        } else {
            debug!("No footprints matched the ignore list");
        }
        removed
    }
}
