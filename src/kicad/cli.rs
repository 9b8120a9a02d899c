//! `kicad-cli` invocation

use crate::error::{FabError, Result};
use anyhow::Context;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, warn};

/// Locate `kicad-cli`: the `KICAD_CLI` environment variable wins, then `PATH`
pub fn locate_kicad_cli() -> Result<PathBuf> {
    if let Some(path) = std::env::var_os("KICAD_CLI") {
        return Ok(PathBuf::from(path));
    }

    which::which("kicad-cli").map_err(|_| {
        FabError::ToolNotFound {
            tool: "kicad-cli".to_string(),
            purpose: "plot boards, write drill files and run DRC".to_string(),
        }
        .into()
    })
}

/// Builder for `kicad-cli` commands
#[derive(Debug)]
pub struct KiCadCliBuilder {
    program: PathBuf,
    args: Vec<OsString>,
}

impl KiCadCliBuilder {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Add a command (e.g. "pcb")
    pub fn command(self, cmd: &str) -> Self {
        self.arg(cmd)
    }

    /// Add a subcommand (e.g. "export")
    pub fn subcommand(self, subcmd: &str) -> Self {
        self.arg(subcmd)
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Add a flag only when `enabled`
    pub fn flag_if(self, enabled: bool, flag: &str) -> Self {
        if enabled {
            self.arg(flag)
        } else {
            self
        }
    }

    /// Add `--output <path>`
    pub fn output(self, path: &Path) -> Self {
        self.arg("--output").arg(path)
    }

    pub fn command_line(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        line
    }

    /// Run the command; a non-zero exit status is an error
    pub fn run(self) -> Result<()> {
        debug!("Running {}", self.command_line());

        let output = Command::new(&self.program)
            .args(&self.args)
            .output()
            .with_context(|| format!("Failed to execute {}", self.program.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if !stderr.trim().is_empty() {
                warn!("kicad-cli: {}", stderr.trim());
            }
            return Err(FabError::ProcessFailed {
                tool: "kicad-cli".to_string(),
                status: output.status.to_string(),
            }
            .into());
        }

        Ok(())
    }
}
