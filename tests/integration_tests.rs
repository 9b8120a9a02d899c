//! Integration tests for kifab
//!
//! The export pipeline runs against a recording fake backend that writes
//! placeholder files, and a fake renderer. Archives are inspected with
//! `zip::ZipArchive`.

use anyhow::anyhow;
use kifab::{
    backend::CadBackend,
    board::{Board, Footprint, Point, Side},
    drill::DrillRequest,
    error::{FabError, Result},
    gerber::GerberExporter,
    layers::Layer,
    plan::{rezonit_plan, PlotPlanEntry},
    pipeline::{NameTemplate, RezonitExport, RezonitOptions},
    plot::{plot_file_path, PlotFormat, PlotJob, PlotOptions, PlotSession},
    render::{BoardRenderer, RenderError},
    schematic::SchematicComponent,
    settings::ExportSettings,
};
use std::{
    cell::RefCell,
    collections::HashSet,
    fs,
    io::Read,
    path::{Path, PathBuf},
};
use tempfile::TempDir;

/// Backend that writes placeholder files and records what it was asked to do
#[derive(Default)]
struct FakeBackend {
    copper_layers: u8,
    footprints: Vec<Footprint>,
    components: Vec<SchematicComponent>,
    fail_layer: Option<Layer>,
    drc_violations: usize,
    fail_schematic: bool,
    events: RefCell<Vec<String>>,
}

impl FakeBackend {
    fn new(copper_layers: u8) -> Self {
        Self {
            copper_layers,
            ..Self::default()
        }
    }

    fn record(&self, event: impl Into<String>) {
        self.events.borrow_mut().push(event.into());
    }

    fn events(&self) -> Vec<String> {
        self.events.borrow().clone()
    }
}

struct FakeSession<'a> {
    backend: &'a FakeBackend,
    board_name: String,
    options: PlotOptions,
    current: Option<(Layer, PathBuf)>,
}

impl PlotSession for FakeSession<'_> {
    fn open_plot_file(&mut self, job: &PlotJob) -> Result<PathBuf> {
        let path = plot_file_path(
            &self.options.output_dir,
            &self.board_name,
            &job.suffix,
            job.layer,
            job.format,
            self.options.use_protel_extensions,
        );
        self.backend.record(format!("open {}", job.layer));
        self.current = Some((job.layer, path.clone()));
        Ok(path)
    }

    fn plot_layer(&mut self) -> Result<()> {
        let (layer, path) = self.current.take().ok_or_else(|| anyhow!("nothing open"))?;
        if self.backend.fail_layer == Some(layer) {
            return Err(anyhow!("cannot plot {}", layer));
        }
        fs::write(&path, format!("plot of {}", layer))?;
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<()> {
        self.backend.record("close");
        Ok(())
    }
}

impl CadBackend for FakeBackend {
    fn load_board(&self, path: &Path) -> Result<Board> {
        self.record("load_board");
        if !path.exists() {
            return Err(FabError::BoardNotFound {
                path: path.display().to_string(),
            }
            .into());
        }
        Ok(Board::new(
            path,
            self.copper_layers,
            Point::new(100.0, 100.0),
            self.footprints.clone(),
        ))
    }

    fn check_drc(&self, _board: &Board) -> Result<()> {
        self.record("drc");
        if self.drc_violations > 0 {
            return Err(FabError::DrcFailed {
                violations: self.drc_violations,
            }
            .into());
        }
        Ok(())
    }

    fn open_plot_session<'a>(
        &'a self,
        board: &'a Board,
        options: &PlotOptions,
    ) -> Result<Box<dyn PlotSession + 'a>> {
        self.record("open_session");
        Ok(Box::new(FakeSession {
            backend: self,
            board_name: board.name(),
            options: options.clone(),
            current: None,
        }))
    }

    fn write_drill_files(&self, board: &Board, request: &DrillRequest) -> Result<Vec<PathBuf>> {
        self.record("drill");
        let names = if request.merge_npth {
            vec![format!("{}.drl", board.name())]
        } else {
            vec![
                format!("{}-PTH.drl", board.name()),
                format!("{}-NPTH.drl", board.name()),
            ]
        };

        let mut files = Vec::new();
        for name in names {
            let path = request.output_dir.join(name);
            fs::write(&path, "M48\nM30\n")?;
            files.push(path);
        }
        if request.generate_map_pdf {
            let map = request.output_dir.join(format!("{}-drl_map.pdf", board.name()));
            fs::write(&map, "%PDF")?;
            files.push(map);
        }
        if let Some(report) = &request.report_path {
            fs::write(report, "Drill report")?;
            files.push(report.clone());
        }
        Ok(files)
    }

    fn load_schematic(&self, _path: &Path) -> Result<Vec<SchematicComponent>> {
        self.record("load_schematic");
        if self.fail_schematic {
            return Err(FabError::InvalidSchematic {
                path: "demo.kicad_sch".to_string(),
                reason: "broken".to_string(),
            }
            .into());
        }
        Ok(self.components.clone())
    }
}

/// Renderer writing placeholder images
struct FakeRenderer {
    available: bool,
}

impl BoardRenderer for FakeRenderer {
    fn ensure_available(&self) -> std::result::Result<(), RenderError> {
        if self.available {
            Ok(())
        } else {
            Err(RenderError::ToolNotFound {
                tool: "pcbdraw".to_string(),
            })
        }
    }

    fn render(
        &self,
        _board: &Path,
        _side: Side,
        output: &Path,
    ) -> std::result::Result<(), RenderError> {
        fs::write(output, "png").map_err(|e| RenderError::ProcessFailed {
            tool: "pcbdraw".to_string(),
            side: "front",
            reason: e.to_string(),
        })
    }
}

/// Temporary workspace with an (empty) board and schematic file
fn workspace() -> (TempDir, PathBuf, PathBuf) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let board = dir.path().join("demo.kicad_pcb");
    let schematic = dir.path().join("demo.kicad_sch");
    fs::write(&board, "(kicad_pcb)").expect("Failed to write board");
    fs::write(&schematic, "(kicad_sch)").expect("Failed to write schematic");
    (dir, board, schematic)
}

fn assembly_backend() -> FakeBackend {
    let mut backend = FakeBackend::new(2);
    backend.footprints = vec![
        Footprint::new("R1", Point::new(110.0, 90.0), 0.0, Side::Front),
        Footprint::new("R2", Point::new(120.0, 90.0), 0.0, Side::Front),
        Footprint::new("R5", Point::new(130.0, 90.0), 0.0, Side::Back),
        Footprint::new("C1", Point::new(105.0, 95.0), 90.0, Side::Front),
    ];
    backend.components = vec![
        SchematicComponent::new("R1")
            .with_field("Value", "10k")
            .with_field("Footprint", "R_0603"),
        SchematicComponent::new("R2")
            .with_field("Value", "10k")
            .with_field("Footprint", "R_0603"),
        SchematicComponent::new("R5").with_field("Value", "1k"),
        SchematicComponent::new("C1").with_field("Value", "100n"),
        SchematicComponent::new("R7").with_field("Value", "10k"),
        SchematicComponent::new("#PWR01").with_field("Value", "GND"),
    ];
    backend
}

fn zip_entries(path: &Path) -> Vec<String> {
    let file = fs::File::open(path).expect("Failed to open archive");
    let archive = zip::ZipArchive::new(file).expect("Failed to read archive");
    archive.file_names().map(str::to_string).collect()
}

/// Sorted file entries of an archive, without directory entries
fn zip_files(path: &Path) -> Vec<String> {
    let mut files: Vec<String> = zip_entries(path)
        .into_iter()
        .filter(|name| !name.ends_with('/'))
        .collect();
    files.sort();
    files
}

fn zip_text(path: &Path, name: &str) -> String {
    let file = fs::File::open(path).expect("Failed to open archive");
    let mut archive = zip::ZipArchive::new(file).expect("Failed to read archive");
    let mut content = String::new();
    archive
        .by_name(name)
        .expect("Missing archive entry")
        .read_to_string(&mut content)
        .expect("Failed to read archive entry");
    content
}

fn files_with_extension(dir: &Path, extension: &str) -> usize {
    fs::read_dir(dir)
        .expect("Failed to read output directory")
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().extension().and_then(|e| e.to_str()) == Some(extension))
        .count()
}

fn three_layer_plan() -> Vec<PlotPlanEntry> {
    vec![
        PlotPlanEntry::new("CuTop", Layer::FrontCopper, "Top layer"),
        PlotPlanEntry::new("CuBottom", Layer::BackCopper, "Bottom layer"),
        PlotPlanEntry::new("EdgeCuts", Layer::EdgeCuts, "Edges"),
    ]
}

#[test]
fn test_two_layer_gerber_export_merged_drill() {
    let (dir, board_path, _) = workspace();
    let backend = FakeBackend::new(2);
    let output = dir.path().join("out");

    let report = GerberExporter::new(&backend)
        .export_file(
            &board_path,
            Some(output.as_path()),
            &three_layer_plan(),
            true,
            &ExportSettings::rezonit(),
        )
        .unwrap();

    assert!(report.is_clean());
    assert_eq!(files_with_extension(&output, "gbr"), 3);
    assert_eq!(files_with_extension(&output, "drl"), 1);
    assert!(!output.join("demo-inner1.gbr").exists());

    let events = backend.events();
    assert_eq!(events.iter().filter(|e| *e == "close").count(), 1);
    let close = events.iter().position(|e| e == "close").unwrap();
    let drill = events.iter().position(|e| e == "drill").unwrap();
    assert!(close < drill);
}

#[test]
fn test_two_layer_gerber_export_separate_drill() {
    let (dir, board_path, _) = workspace();
    let backend = FakeBackend::new(2);
    let output = dir.path().join("out");

    GerberExporter::new(&backend)
        .export_file(
            &board_path,
            Some(output.as_path()),
            &three_layer_plan(),
            true,
            &ExportSettings::pcbway(),
        )
        .unwrap();

    assert_eq!(files_with_extension(&output, "drl"), 2);
    assert!(output.join("demo-PTH.drl").exists());
    assert!(output.join("demo-NPTH.drl").exists());
}

#[test]
fn test_job_file_lists_every_gerber() {
    let (dir, board_path, _) = workspace();
    let backend = FakeBackend::new(2);
    let output = dir.path().join("out");

    let report = GerberExporter::new(&backend)
        .export_file(
            &board_path,
            Some(output.as_path()),
            &three_layer_plan(),
            true,
            &ExportSettings::jlcpcb(),
        )
        .unwrap();

    let job_path = output.join("demo.gbrjob");
    assert!(report.files.contains(&job_path));

    let job: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&job_path).unwrap()).unwrap();
    let listed: Vec<&str> = job["FilesAttributes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|file| file["Path"].as_str().unwrap())
        .collect();

    let plotted: Vec<String> = three_layer_plan()
        .iter()
        .map(|entry| {
            plot_file_path(&output, "demo", &entry.name, entry.layer, PlotFormat::Gerber, true)
        })
        .inspect(|path| assert!(path.exists(), "{} not plotted", path.display()))
        .map(|path| path.file_name().unwrap().to_string_lossy().to_string())
        .collect();
    assert_eq!(listed, plotted);
    assert_eq!(job["GeneralSpecs"]["LayerNumber"], 2);
}

#[test]
fn test_drill_map_and_report() {
    let (dir, board_path, _) = workspace();
    let backend = FakeBackend::new(2);
    let output = dir.path().join("out");

    let report = GerberExporter::new(&backend)
        .export_file(
            &board_path,
            Some(output.as_path()),
            &three_layer_plan(),
            true,
            &ExportSettings::jlcpcb(),
        )
        .unwrap();

    let map = output.join("demo-drl_map.pdf");
    let drill_report = output.join("drill_report.rpt");
    assert!(map.exists());
    assert!(drill_report.exists());
    assert!(report.files.contains(&map));
    assert!(report.files.contains(&drill_report));
    assert_eq!(files_with_extension(&output, "drl"), 1);

    // Presets without map and report leave them out
    let plain = dir.path().join("plain");
    GerberExporter::new(&backend)
        .export_file(
            &board_path,
            Some(plain.as_path()),
            &three_layer_plan(),
            true,
            &ExportSettings::rezonit(),
        )
        .unwrap();
    assert!(!plain.join("demo-drl_map.pdf").exists());
    assert!(!plain.join("drill_report.rpt").exists());
}

#[test]
fn test_four_layer_board_gets_inner_layers() {
    let (dir, board_path, _) = workspace();
    let backend = FakeBackend::new(4);
    let output = dir.path().join("out");

    GerberExporter::new(&backend)
        .export_file(
            &board_path,
            Some(output.as_path()),
            &three_layer_plan(),
            false,
            &ExportSettings::rezonit(),
        )
        .unwrap();

    assert_eq!(files_with_extension(&output, "gbr"), 5);
    assert!(output.join("demo-inner1.gbr").exists());
    assert!(output.join("demo-inner2.gbr").exists());
    assert_eq!(files_with_extension(&output, "drl"), 0);
}

#[test]
fn test_failed_layer_is_reported_and_batch_continues() {
    let (dir, board_path, _) = workspace();
    let mut backend = FakeBackend::new(2);
    backend.fail_layer = Some(Layer::BackCopper);
    let output = dir.path().join("out");

    let report = GerberExporter::new(&backend)
        .export_file(
            &board_path,
            Some(output.as_path()),
            &three_layer_plan(),
            false,
            &ExportSettings::rezonit(),
        )
        .unwrap();

    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].contains("B.Cu"));
    assert!(output.join("demo-EdgeCuts.gbr").exists());
}

#[test]
fn test_rezonit_fabrication_archives() {
    let (dir, board_path, _) = workspace();
    let backend = FakeBackend::new(2);
    let renderer = FakeRenderer { available: false };
    let output = dir.path().join("fab");

    let mut options = RezonitOptions::new(&board_path, &output);
    options.name_template = NameTemplate::new("demo-{}").unwrap();

    let summary = RezonitExport::new(&backend, &renderer).run(&options).unwrap();

    assert_eq!(
        summary.archives,
        vec![output.join("demo-gerbers.zip"), output.join("demo-dxf.zip")]
    );
    assert!(summary.warnings.is_empty());

    let mut expected: Vec<String> = rezonit_plan()
        .iter()
        .map(|entry| format!("gerber/demo-{}.gbr", entry.name))
        .chain(["gerber/demo.drl".to_string()])
        .collect();
    expected.sort();
    assert_eq!(zip_files(&output.join("demo-gerbers.zip")), expected);

    assert_eq!(
        zip_files(&output.join("demo-dxf.zip")),
        vec![
            "dxf/demo-EdgeCuts.dxf".to_string(),
            "dxf/demo-PasteBottom.dxf".to_string(),
            "dxf/demo-PasteTop.dxf".to_string(),
        ]
    );

    for stage in ["gerber", "dxf", "assembly", "review", "render"] {
        assert!(!output.join(stage).exists(), "{} left behind", stage);
    }
}

#[test]
fn test_rezonit_assembly_archives() {
    let (dir, board_path, schematic) = workspace();
    let backend = assembly_backend();
    let renderer = FakeRenderer { available: true };
    let output = dir.path().join("fab");

    let mut options = RezonitOptions::new(&board_path, &output);
    options.assembly = true;
    options.schematic = Some(schematic);
    options.ignore = ["R5".to_string()].into_iter().collect::<HashSet<_>>();
    options.name_template = NameTemplate::new("demo-{}").unwrap();

    let summary = RezonitExport::new(&backend, &renderer).run(&options).unwrap();
    assert_eq!(summary.archives.len(), 5);

    let assembly = output.join("demo-assembly.zip");
    let entries = zip_entries(&assembly);
    assert!(entries.contains(&"assembly/demo-pos.csv".to_string()));
    assert!(entries.contains(&"assembly/demo-bom.csv".to_string()));
    assert!(entries.contains(&"assembly/demo-FabTop.pdf".to_string()));

    let bom = zip_text(&assembly, "assembly/demo-bom.csv");
    assert!(!bom.contains("R5"));
    // R7 is only in the schematic
    assert!(!bom.contains("R7"));
    assert!(bom.contains("\"R1,R2\",2,10k"));

    let pos = zip_text(&assembly, "assembly/demo-pos.csv");
    let designators: Vec<&str> = pos
        .lines()
        .skip(1)
        .filter_map(|line| line.split(',').next())
        .collect();
    assert_eq!(designators, vec!["C1", "R1", "R2"]);

    let render = zip_entries(&output.join("demo-render.zip"));
    assert!(render.contains(&"render/demo-front.png".to_string()));
    assert!(render.contains(&"render/demo-back.png".to_string()));

    let review = zip_entries(&output.join("demo-review.zip"));
    assert!(review.contains(&"review/demo-CuTop.pdf".to_string()));
}

#[test]
fn test_assembly_without_schematic_fails_early() {
    let (dir, board_path, _) = workspace();
    let backend = assembly_backend();
    let renderer = FakeRenderer { available: true };
    let output = dir.path().join("fab");

    let mut options = RezonitOptions::new(&board_path, &output);
    options.assembly = true;

    let err = RezonitExport::new(&backend, &renderer)
        .run(&options)
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<FabError>(),
        Some(FabError::SchematicRequired)
    ));
    assert!(backend.events().is_empty());
    assert!(!output.join("gerbers.zip").exists());
}

#[test]
fn test_missing_renderer_fails_before_gerbers() {
    let (dir, board_path, schematic) = workspace();
    let backend = assembly_backend();
    let renderer = FakeRenderer { available: false };
    let output = dir.path().join("fab");

    let mut options = RezonitOptions::new(&board_path, &output);
    options.assembly = true;
    options.schematic = Some(schematic);

    let err = RezonitExport::new(&backend, &renderer)
        .run(&options)
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<RenderError>(),
        Some(RenderError::ToolNotFound { .. })
    ));
    assert!(!backend.events().contains(&"open_session".to_string()));
}

#[test]
fn test_failing_drc_aborts() {
    let (dir, board_path, _) = workspace();
    let mut backend = FakeBackend::new(2);
    backend.drc_violations = 3;
    let renderer = FakeRenderer { available: true };

    let output = dir.path().join("fab");
    fs::create_dir_all(output.join("render")).unwrap();
    fs::write(output.join("render").join("keep.png"), "png").unwrap();

    let mut options = RezonitOptions::new(&board_path, &output);
    options.drc = true;

    let err = RezonitExport::new(&backend, &renderer)
        .run(&options)
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<FabError>(),
        Some(FabError::DrcFailed { violations: 3 })
    ));
    assert!(!backend.events().contains(&"open_session".to_string()));
    // Nothing was staged, so nothing in the output directory is touched
    assert!(output.join("render").join("keep.png").exists());
}

#[test]
fn test_missing_board_aborts() {
    let dir = TempDir::new().unwrap();
    let backend = FakeBackend::new(2);
    let renderer = FakeRenderer { available: true };
    let options = RezonitOptions::new(dir.path().join("nope.kicad_pcb"), dir.path().join("fab"));

    let err = RezonitExport::new(&backend, &renderer)
        .run(&options)
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<FabError>(),
        Some(FabError::BoardNotFound { .. })
    ));
}

#[test]
fn test_staging_removed_after_failure() {
    let (dir, board_path, schematic) = workspace();
    let mut backend = assembly_backend();
    backend.fail_schematic = true;
    let renderer = FakeRenderer { available: true };
    let output = dir.path().join("fab");

    let mut options = RezonitOptions::new(&board_path, &output);
    options.assembly = true;
    options.schematic = Some(schematic);

    let err = RezonitExport::new(&backend, &renderer)
        .run(&options)
        .unwrap_err();
    assert!(format!("{:#}", err).contains("assembly"));

    // Earlier deliverables are kept, staging is gone
    assert!(output.join("gerbers.zip").exists());
    assert!(output.join("dxf.zip").exists());
    assert!(!output.join("assembly").exists());
    assert!(!output.join("assembly.zip").exists());
}

#[test]
fn test_layer_failure_reaches_summary() {
    let (dir, board_path, _) = workspace();
    let mut backend = FakeBackend::new(2);
    backend.fail_layer = Some(Layer::FrontPaste);
    let renderer = FakeRenderer { available: true };

    let options = RezonitOptions::new(&board_path, dir.path().join("fab"));
    let summary = RezonitExport::new(&backend, &renderer).run(&options).unwrap();

    // F.Paste is plotted by both the Gerber and the DXF stage
    assert_eq!(summary.warnings.len(), 2);
    assert_eq!(summary.archives.len(), 2);
}
