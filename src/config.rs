//! Configuration management for kifab
//!
//! This module handles CLI argument parsing and logging setup.

use crate::error::Result;
use crate::pipeline::{parse_references, NameTemplate, RezonitOptions};
use crate::settings::{ExportSettings, PRESET_NAMES};
use anyhow::anyhow;
use clap::builder::styling;
use clap::{value_parser, Arg, ArgAction, ArgMatches, ColorChoice, Command};
use std::path::PathBuf;
use tracing::debug;

fn board_arg() -> Arg {
    Arg::new("board")
        .help("KiCad board file (.kicad_pcb)")
        .value_parser(value_parser!(PathBuf))
        .required(true)
}

/// Build the CLI command
pub fn build_cli() -> Command {
    let styles = styling::Styles::styled()
        .header(styling::AnsiColor::Green.on_default() | styling::Effects::BOLD)
        .usage(styling::AnsiColor::Green.on_default() | styling::Effects::BOLD)
        .literal(styling::AnsiColor::Blue.on_default() | styling::Effects::BOLD)
        .placeholder(styling::AnsiColor::Cyan.on_default());

    Command::new("kifab")
        .about("kifab - Prepare KiCad fabrication packages for PCB vendors")
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging output")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new("no_progress")
                .long("no-progress")
                .help("Disable progress indicators")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(
            Command::new("rezonit")
                .about("Prepare fabrication (and assembly) archives for Rezonit")
                .arg(board_arg())
                .arg(
                    Arg::new("outputdir")
                        .help("Directory receiving the archives")
                        .value_parser(value_parser!(PathBuf))
                        .required(true),
                )
                .arg(
                    Arg::new("assembly")
                        .long("assembly")
                        .help("Also export assembly data, review set and renders")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("schematic")
                        .long("schematic")
                        .help("Board schematic, required for assembly data")
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("ignore")
                        .long("ignore")
                        .help("Comma separated list of references to leave out")
                        .default_value(""),
                )
                .arg(
                    Arg::new("nametemplate")
                        .long("nametemplate")
                        .help("Archive name template, '{}' is replaced by the archive kind")
                        .default_value("{}"),
                )
                .arg(
                    Arg::new("drc")
                        .long("drc")
                        .help("Abort when the design rule check fails")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("gerber")
                .about("Export Gerber and drill files")
                .arg(board_arg())
                .arg(
                    Arg::new("outputdir")
                        .help("Output directory, defaults to <board>-gerber")
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("preset")
                        .short('p')
                        .long("preset")
                        .help("Vendor export preset")
                        .value_parser(PRESET_NAMES)
                        .default_value("rezonit"),
                )
                .arg(
                    Arg::new("no_drill")
                        .long("no-drill")
                        .help("Skip drill files")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("dxf")
                .about("Export paste layers and board outline as DXF")
                .arg(board_arg())
                .arg(
                    Arg::new("outputdir")
                        .help("Output directory, defaults to the board's directory")
                        .value_parser(value_parser!(PathBuf)),
                ),
        )
}

/// Selected command with its arguments
#[derive(Debug, Clone)]
pub enum Action {
    Rezonit(RezonitOptions),
    Gerber {
        board: PathBuf,
        output_dir: Option<PathBuf>,
        settings: ExportSettings,
        drilling: bool,
    },
    Dxf {
        board: PathBuf,
        output_dir: Option<PathBuf>,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub action: Action,

    /// Enable verbose logging
    pub verbose: bool,

    /// Disable progress bars
    pub no_progress: bool,
}

fn required_path(matches: &ArgMatches, id: &str) -> Result<PathBuf> {
    matches
        .get_one::<PathBuf>(id)
        .cloned()
        .ok_or_else(|| anyhow!("Missing argument: {}", id))
}

impl Config {
    /// Parse arguments from the process command line
    pub fn from_args() -> Result<Self> {
        Self::from_matches(&build_cli().get_matches())
    }

    pub fn from_matches(matches: &ArgMatches) -> Result<Self> {
        let action = match matches.subcommand() {
            Some(("rezonit", sub)) => {
                let mut options =
                    RezonitOptions::new(required_path(sub, "board")?, required_path(sub, "outputdir")?);
                options.assembly = sub.get_flag("assembly");
                options.schematic = sub.get_one::<PathBuf>("schematic").cloned();
                options.drc = sub.get_flag("drc");
                options.ignore = sub
                    .get_one::<String>("ignore")
                    .map(|refs| parse_references(refs))
                    .unwrap_or_default();
                if let Some(template) = sub.get_one::<String>("nametemplate") {
                    options.name_template = NameTemplate::new(template)?;
                }
                Action::Rezonit(options)
            }
            Some(("gerber", sub)) => {
                let preset = sub
                    .get_one::<String>("preset")
                    .map(String::as_str)
                    .unwrap_or("rezonit");
                Action::Gerber {
                    board: required_path(sub, "board")?,
                    output_dir: sub.get_one::<PathBuf>("outputdir").cloned(),
                    settings: ExportSettings::by_name(preset)?,
                    drilling: !sub.get_flag("no_drill"),
                }
            }
            Some(("dxf", sub)) => Action::Dxf {
                board: required_path(sub, "board")?,
                output_dir: sub.get_one::<PathBuf>("outputdir").cloned(),
            },
            _ => return Err(anyhow!("No command given")),
        };

        Ok(Config {
            action,
            verbose: matches.get_flag("verbose"),
            no_progress: matches.get_flag("no_progress"),
        })
    }

    /// Set up tracing. RUST_LOG takes precedence over the verbose flag.
    pub fn init_logging(&self) {
        let default_level = if self.verbose { "debug" } else { "warn" };
        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();

        debug!("Configuration: {:?}", self);
    }
}
