//! Rezonit fabrication export
//!
//! Runs the vendor pipeline on one board: validate, Gerbers, paste DXFs and,
//! when assembly is requested, the assembly data, review set and renders.
//! Each deliverable is staged in its own directory under the output
//! directory, zipped, and the staging directory removed again.

use crate::ancillary::AncillaryExporter;
use crate::archive::{remove_staging_dir, ArchiveCreator};
use crate::backend::CadBackend;
use crate::board::Board;
use crate::bom::collect_bom;
use crate::error::{FabError, Result, ResultExt};
use crate::gerber::GerberExporter;
use crate::plan::rezonit_plan;
use crate::plot::ExportReport;
use crate::position::{collect_pos_data, placed_references, write_pos_file};
use crate::progress::ProgressTracker;
use crate::render::{render_board_images, BoardRenderer};
use crate::settings::ExportSettings;
use anyhow::Context;
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Archive name pattern; `{}` is replaced by the deliverable kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameTemplate(String);

impl NameTemplate {
    pub fn new(template: &str) -> Result<Self> {
        if !template.contains("{}") {
            return Err(FabError::InvalidNameTemplate {
                template: template.to_string(),
            }
            .into());
        }
        Ok(Self(template.to_string()))
    }

    pub fn format(&self, kind: &str) -> String {
        self.0.replace("{}", kind)
    }
}

impl Default for NameTemplate {
    fn default() -> Self {
        Self("{}".to_string())
    }
}

/// A packaged output of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deliverable {
    Gerbers,
    Dxf,
    Assembly,
    Review,
    Render,
}

impl Deliverable {
    /// Kind substituted into the name template
    pub fn kind(&self) -> &'static str {
        match self {
            Deliverable::Gerbers => "gerbers",
            Deliverable::Dxf => "dxf",
            Deliverable::Assembly => "assembly",
            Deliverable::Review => "review",
            Deliverable::Render => "render",
        }
    }

    /// Staging directory name, also the prefix of every archive entry
    pub fn stage_dir(&self) -> &'static str {
        match self {
            Deliverable::Gerbers => "gerber",
            other => other.kind(),
        }
    }
}

impl fmt::Display for Deliverable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())
    }
}

/// Split a comma-separated reference list, e.g. `"R5, C3"`
pub fn parse_references(references: &str) -> HashSet<String> {
    references
        .split(',')
        .map(str::trim)
        .filter(|reference| !reference.is_empty())
        .map(str::to_string)
        .collect()
}

/// Inputs of one Rezonit export run
#[derive(Debug, Clone)]
pub struct RezonitOptions {
    pub board: PathBuf,
    pub output_dir: PathBuf,
    pub assembly: bool,
    pub schematic: Option<PathBuf>,
    pub ignore: HashSet<String>,
    pub name_template: NameTemplate,
    pub drc: bool,
}

impl RezonitOptions {
    pub fn new(board: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            board: board.into(),
            output_dir: output_dir.into(),
            assembly: false,
            schematic: None,
            ignore: HashSet::new(),
            name_template: NameTemplate::default(),
            drc: false,
        }
    }
}

/// What a run produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineSummary {
    pub archives: Vec<PathBuf>,
    pub warnings: Vec<String>,
}

/// Progress of one run: what was produced and which stages were entered
#[derive(Debug, Default)]
struct StageRun {
    summary: PipelineSummary,
    started: Vec<Deliverable>,
}

/// The Rezonit vendor pipeline
pub struct RezonitExport<'a> {
    backend: &'a dyn CadBackend,
    renderer: &'a dyn BoardRenderer,
    progress: ProgressTracker,
}

impl<'a> RezonitExport<'a> {
    pub fn new(backend: &'a dyn CadBackend, renderer: &'a dyn BoardRenderer) -> Self {
        Self {
            backend,
            renderer,
            progress: ProgressTracker::new(false),
        }
    }

    pub fn with_progress(mut self, progress: ProgressTracker) -> Self {
        self.progress = progress;
        self
    }

    /// Run the export. Preconditions are checked before anything is
    /// written; once stages start, their staging directories are removed
    /// afterwards whether the run succeeded or not.
    pub fn run(&self, options: &RezonitOptions) -> Result<PipelineSummary> {
        let start = Instant::now();
        info!("Starting Rezonit export of {}", options.board.display());

        let board = self.validate(options).with_stage_context("validate")?;

        let mut run = StageRun::default();
        let result = self.run_stages(&board, options, &mut run);
        let cleanup = cleanup(&options.output_dir, &run.started);

        result?;
        cleanup?;

        let summary = run.summary;
        info!(
            "Rezonit export finished in {} ms: {} archive(s), {} warning(s)",
            start.elapsed().as_millis(),
            summary.archives.len(),
            summary.warnings.len()
        );
        Ok(summary)
    }

    fn run_stages(&self, board: &Board, options: &RezonitOptions, run: &mut StageRun) -> Result<()> {
        let output_dir = options.output_dir.as_path();
        let template = &options.name_template;

        self.stage(output_dir, Deliverable::Gerbers, template, run, |dir| {
            GerberExporter::new(self.backend).export(
                board,
                dir,
                &rezonit_plan(),
                true,
                &ExportSettings::rezonit(),
            )
        })?;

        self.stage(output_dir, Deliverable::Dxf, template, run, |dir| {
            AncillaryExporter::new(self.backend)
                .paste_dxf(board, dir)
                .map(|(_, report)| report)
        })?;

        let schematic = match (&options.schematic, options.assembly) {
            (Some(schematic), true) => schematic,
            _ => {
                debug!("Assembly data not requested");
                return Ok(());
            }
        };

        self.stage(output_dir, Deliverable::Assembly, template, run, |dir| {
            self.assembly(board, schematic, &options.ignore, template, dir)
        })?;

        self.stage(output_dir, Deliverable::Review, template, run, |dir| {
            AncillaryExporter::new(self.backend).review_set(board, dir)
        })?;

        self.stage(output_dir, Deliverable::Render, template, run, |dir| {
            Ok(ExportReport {
                files: render_board_images(self.renderer, board.path(), dir)?,
                warnings: Vec::new(),
            })
        })?;

        Ok(())
    }

    /// Check every precondition and load the board with ignored
    /// footprints removed
    fn validate(&self, options: &RezonitOptions) -> Result<Board> {
        if options.assembly {
            if options.schematic.is_none() {
                return Err(FabError::SchematicRequired.into());
            }
            self.renderer.ensure_available()?;
        }

        let mut board = self
            .backend
            .load_board(&options.board)
            .with_path_context("load board", &options.board)?;

        if options.drc {
            info!("Running design rule check");
            self.backend.check_drc(&board)?;
        }

        board.remove_footprints(&options.ignore);

        fs::create_dir_all(&options.output_dir)
            .with_path_context("create output directory", &options.output_dir)?;
        Ok(board)
    }

    fn assembly(
        &self,
        board: &Board,
        schematic: &Path,
        ignore: &HashSet<String>,
        template: &NameTemplate,
        dir: &Path,
    ) -> Result<ExportReport> {
        let components = self
            .backend
            .load_schematic(schematic)
            .with_path_context("load schematic", schematic)?;

        let mut bom = collect_bom(&components, ignore);
        let positions = collect_pos_data(board, &components);
        bom.retain_placed(&placed_references(&positions));

        let pos_path = dir.join(format!("{}.csv", template.format("pos")));
        let bom_path = dir.join(format!("{}.csv", template.format("bom")));
        write_pos_file(&positions, &pos_path)?;
        bom.write_csv_file(&bom_path)?;

        let mut report = AncillaryExporter::new(self.backend).assembly_drawing(board, dir)?;
        report.files.push(pos_path);
        report.files.push(bom_path);
        Ok(report)
    }

    /// Stage one deliverable: fresh staging directory, export, zip, remove
    fn stage<F>(
        &self,
        output_dir: &Path,
        deliverable: Deliverable,
        template: &NameTemplate,
        run: &mut StageRun,
        export: F,
    ) -> Result<()>
    where
        F: FnOnce(&Path) -> Result<ExportReport>,
    {
        let progress = self.progress.start(deliverable.kind());
        let stage_dir = output_dir.join(deliverable.stage_dir());
        run.started.push(deliverable);

        let result = (|| {
            remove_staging_dir(&stage_dir)?;
            fs::create_dir_all(&stage_dir)
                .with_path_context("create staging directory", &stage_dir)?;

            let report = export(&stage_dir)?;
            let archive = ArchiveCreator::zip_directory(
                output_dir,
                deliverable.stage_dir(),
                &template.format(deliverable.kind()),
                progress.bar(),
            )?;
            remove_staging_dir(&stage_dir)?;
            Ok::<_, anyhow::Error>((archive, report))
        })()
        .with_stage_context(deliverable.kind());

        match result {
            Ok((archive, report)) => {
                run.summary.archives.push(archive);
                run.summary.warnings.extend(report.warnings);
                progress.succeed();
                Ok(())
            }
            Err(e) => {
                progress.fail(&e);
                Err(e)
            }
        }
    }
}

/// Remove the staging directories of `deliverables` under `output_dir`
pub fn cleanup(output_dir: &Path, deliverables: &[Deliverable]) -> Result<()> {
    let mut first_error = None;
    for deliverable in deliverables {
        if let Err(e) = remove_staging_dir(&output_dir.join(deliverable.stage_dir())) {
            warn!("Cleanup failed: {:#}", e);
            first_error.get_or_insert(e);
        }
    }
    match first_error {
        Some(e) => Err(e).context("Failed to clean up staging directories"),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_template() {
        let template = NameTemplate::new("board-v2-{}").unwrap();
        assert_eq!(template.format("gerbers"), "board-v2-gerbers");
        assert_eq!(NameTemplate::default().format("dxf"), "dxf");

        let err = NameTemplate::new("board").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FabError>(),
            Some(FabError::InvalidNameTemplate { .. })
        ));
    }

    #[test]
    fn test_parse_references() {
        let refs = parse_references("R5, C3,,  U1 ");
        assert_eq!(refs.len(), 3);
        assert!(refs.contains("R5"));
        assert!(refs.contains("U1"));
        assert!(parse_references("").is_empty());
    }

    #[test]
    fn test_deliverable_names() {
        assert_eq!(Deliverable::Gerbers.kind(), "gerbers");
        assert_eq!(Deliverable::Gerbers.stage_dir(), "gerber");
        assert_eq!(Deliverable::Render.stage_dir(), "render");
    }

    #[test]
    fn test_cleanup_only_touches_given_stages() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("review")).unwrap();
        std::fs::create_dir_all(dir.path().join("render")).unwrap();

        cleanup(dir.path(), &[Deliverable::Gerbers, Deliverable::Review]).unwrap();
        assert!(!dir.path().join("review").exists());
        assert!(dir.path().join("render").exists());
    }
}
