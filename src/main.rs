//! kifab - Fabrication packages from KiCad boards
//!
//! Exports Gerbers, drill files, paste DXFs, assembly data and renders, and
//! packs them into vendor-ready archives.

use kifab::ancillary::AncillaryExporter;
use kifab::config::{Action, Config};
use kifab::error::Result;
use kifab::gerber::GerberExporter;
use kifab::kicad::KicadBackend;
use kifab::pipeline::RezonitExport;
use kifab::plan::full_plan;
use kifab::plot::ExportReport;
use kifab::progress::ProgressTracker;
use kifab::render::PcbDrawRenderer;
use tracing::{error, info};

fn report_warnings(warnings: &[String]) {
    for warning in warnings {
        eprintln!("Warning: {}", warning);
    }
}

fn run(config: &Config) -> Result<()> {
    let backend = KicadBackend::new();
    let progress = ProgressTracker::new(!config.no_progress);

    match &config.action {
        Action::Rezonit(options) => {
            let renderer = PcbDrawRenderer::new();
            let summary = RezonitExport::new(&backend, &renderer)
                .with_progress(progress)
                .run(options)?;

            report_warnings(&summary.warnings);
            for archive in &summary.archives {
                println!("{}", archive.display());
            }
        }
        Action::Gerber {
            board,
            output_dir,
            settings,
            drilling,
        } => {
            let stage = progress.start("gerbers");
            let result: Result<ExportReport> = GerberExporter::new(&backend).export_file(
                board,
                output_dir.as_deref(),
                &full_plan(),
                *drilling,
                settings,
            );
            let report = match result {
                Ok(report) => {
                    stage.succeed();
                    report
                }
                Err(e) => {
                    stage.fail(&e);
                    return Err(e);
                }
            };
            report_warnings(&report.warnings);
            println!("Wrote {} file(s)", report.files.len());
        }
        Action::Dxf { board, output_dir } => {
            let (paths, report) =
                AncillaryExporter::new(&backend).dxf_file(board, output_dir.as_deref())?;
            report_warnings(&report.warnings);
            for path in &paths {
                println!("{}", path.display());
            }
        }
    }
    Ok(())
}

fn main() {
    let config = Config::from_args().unwrap_or_else(|e| {
        eprintln!("Configuration error: {:#}", e);
        std::process::exit(2);
    });
    config.init_logging();

    match run(&config) {
        Ok(()) => info!("Export completed successfully"),
        Err(e) => {
            error!("Export failed: {:#}", e);
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}
