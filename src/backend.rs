//! CAD backend capability
//!
//! Board loading, plotting, drilling, DRC and schematic extraction all live
//! outside kifab. Exporters only talk to them through [`CadBackend`], which
//! keeps the pipeline testable with a recording fake.

use crate::board::Board;
use crate::drill::DrillRequest;
use crate::error::Result;
use crate::plot::{PlotOptions, PlotSession};
use crate::schematic::SchematicComponent;
use std::path::{Path, PathBuf};

pub trait CadBackend {
    /// Load and validate a board file
    fn load_board(&self, path: &Path) -> Result<Board>;

    /// Run the design rule check; fails when the board has violations
    fn check_drc(&self, board: &Board) -> Result<()>;

    /// Open a plot session on `board`
    fn open_plot_session<'a>(
        &'a self,
        board: &'a Board,
        options: &PlotOptions,
    ) -> Result<Box<dyn PlotSession + 'a>>;

    /// Write NC-drill files (and map/report when requested). Returns the produced files.
    fn write_drill_files(&self, board: &Board, request: &DrillRequest) -> Result<Vec<PathBuf>>;

    /// Validate a schematic and extract its components
    fn load_schematic(&self, path: &Path) -> Result<Vec<SchematicComponent>>;
}
