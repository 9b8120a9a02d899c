//! Board renders
//!
//! Front and back images come from an external renderer, `pcbdraw` by
//! default.

use crate::board::Side;
use crate::error::{Result, ResultExt};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("{tool} needs to be installed in order to render boards")]
    ToolNotFound { tool: String },

    #[error("{tool} failed to render the {side} side: {reason}")]
    ProcessFailed {
        tool: String,
        side: &'static str,
        reason: String,
    },
}

/// Renders one side of a board into an image
pub trait BoardRenderer {
    /// Fail early when the renderer cannot run at all
    fn ensure_available(&self) -> std::result::Result<(), RenderError>;

    fn render(
        &self,
        board: &Path,
        side: Side,
        output: &Path,
    ) -> std::result::Result<(), RenderError>;
}

/// `pcbdraw plot` with V-cuts taken from the comments layer
#[derive(Debug, Clone)]
pub struct PcbDrawRenderer {
    program: String,
}

impl Default for PcbDrawRenderer {
    fn default() -> Self {
        Self {
            program: "pcbdraw".to_string(),
        }
    }
}

impl PcbDrawRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    fn resolve(&self) -> std::result::Result<PathBuf, RenderError> {
        which::which(&self.program).map_err(|_| RenderError::ToolNotFound {
            tool: self.program.clone(),
        })
    }

    pub fn arguments(board: &Path, side: Side, output: &Path) -> Vec<String> {
        vec![
            "plot".to_string(),
            "--vcuts".to_string(),
            "Cmts_User".to_string(),
            "--silent".to_string(),
            "--side".to_string(),
            side.as_str().to_string(),
            board.display().to_string(),
            output.display().to_string(),
        ]
    }
}

impl BoardRenderer for PcbDrawRenderer {
    fn ensure_available(&self) -> std::result::Result<(), RenderError> {
        self.resolve().map(|path| debug!("Using renderer {}", path.display()))
    }

    fn render(
        &self,
        board: &Path,
        side: Side,
        output: &Path,
    ) -> std::result::Result<(), RenderError> {
        let program = self.resolve()?;
        let args = Self::arguments(board, side, output);
        debug!("Running {} {}", program.display(), args.join(" "));

        let failed = |reason: String| RenderError::ProcessFailed {
            tool: self.program.clone(),
            side: side.as_str(),
            reason,
        };

        let output = Command::new(&program)
            .args(&args)
            .output()
            .map_err(|e| failed(e.to_string()))?;

        if output.status.success() {
            Ok(())
        } else {
            Err(failed(format!(
                "{}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )))
        }
    }
}

/// Render both sides into `render_dir` as `<board stem>-front.png` and
/// `<board stem>-back.png`
pub fn render_board_images(
    renderer: &dyn BoardRenderer,
    board_path: &Path,
    render_dir: &Path,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(render_dir).with_path_context("create render directory", render_dir)?;

    let stem = board_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "board".to_string());

    let mut images = Vec::with_capacity(2);
    for side in [Side::Front, Side::Back] {
        let output = render_dir.join(format!("{}-{}.png", stem, side.as_str()));
        renderer.render(board_path, side, &output)?;
        info!("Rendered {} side to {}", side.as_str(), output.display());
        images.push(output);
    }
    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use tempfile::tempdir;

    struct RecordingRenderer {
        calls: RefCell<Vec<(Side, PathBuf)>>,
    }

    impl BoardRenderer for RecordingRenderer {
        fn ensure_available(&self) -> std::result::Result<(), RenderError> {
            Ok(())
        }

        fn render(
            &self,
            _board: &Path,
            side: Side,
            output: &Path,
        ) -> std::result::Result<(), RenderError> {
            self.calls.borrow_mut().push((side, output.to_path_buf()));
            Ok(())
        }
    }

    #[test]
    fn test_pcbdraw_arguments() {
        let args = PcbDrawRenderer::arguments(
            Path::new("demo.kicad_pcb"),
            Side::Back,
            Path::new("render/demo-back.png"),
        );
        assert_eq!(
            args.join(" "),
            "plot --vcuts Cmts_User --silent --side back demo.kicad_pcb render/demo-back.png"
        );
    }

    #[test]
    fn test_renders_both_sides() {
        let dir = tempdir().unwrap();
        let renderer = RecordingRenderer {
            calls: RefCell::new(Vec::new()),
        };

        let images =
            render_board_images(&renderer, Path::new("/boards/demo.kicad_pcb"), dir.path())
                .unwrap();

        assert_eq!(images.len(), 2);
        assert!(images[0].ends_with("demo-front.png"));
        assert!(images[1].ends_with("demo-back.png"));
        assert_eq!(renderer.calls.borrow()[1].0, Side::Back);
    }

    #[test]
    fn test_missing_renderer() {
        let renderer = PcbDrawRenderer {
            program: "kifab-no-such-renderer".to_string(),
        };
        assert!(matches!(
            renderer.ensure_available(),
            Err(RenderError::ToolNotFound { .. })
        ));
    }
}
