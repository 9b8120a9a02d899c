//! Deliverable archives and staging directories
//!
//! Every deliverable is staged in `<outputdir>/<stage>` and packed into
//! `<outputdir>/<name>.zip`, entries prefixed by the stage directory name.

use crate::error::{Result, ResultExt};
use anyhow::Context;
use indicatif::ProgressBar;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;

/// Remove a staging directory; a missing directory is fine
pub fn remove_staging_dir(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => {
            debug!("Removed staging directory {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_path_context("remove staging directory", path),
    }
}

/// Archive creator for deliverable ZIP files
pub struct ArchiveCreator;

impl ArchiveCreator {
    /// Zip `<output_dir>/<stage_dir>` into `<output_dir>/<archive_name>.zip`.
    /// Returns the archive path.
    pub fn zip_directory(
        output_dir: &Path,
        stage_dir: &str,
        archive_name: &str,
        progress: Option<&ProgressBar>,
    ) -> Result<PathBuf> {
        let source = output_dir.join(stage_dir);
        let archive_path = output_dir.join(format!("{}.zip", archive_name));
        info!(
            "Creating archive {} from {}",
            archive_path.display(),
            source.display()
        );

        let file =
            fs::File::create(&archive_path).with_path_context("create ZIP file", &archive_path)?;
        let mut zip = zip::ZipWriter::new(file);
        let options = SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated)
            .unix_permissions(0o644);

        let mut count = 0usize;
        for entry in WalkDir::new(&source).sort_by_file_name() {
            let entry = entry.with_path_context("walk staging directory", &source)?;
            let relative = entry
                .path()
                .strip_prefix(output_dir)
                .context("Staging entry outside the output directory")?;
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            if entry.file_type().is_dir() {
                zip.add_directory(name, options)
                    .context("Failed to add ZIP directory entry")?;
                continue;
            }

            zip.start_file(name, options)
                .context("Failed to start ZIP file entry")?;
            let mut input =
                fs::File::open(entry.path()).with_path_context("read file for ZIP", entry.path())?;
            io::copy(&mut input, &mut zip).context("Failed to write file content to ZIP")?;
            count += 1;

            if let Some(pb) = progress {
                pb.set_message(format!("Archiving {}", entry.file_name().to_string_lossy()));
            }
        }

        zip.finish().context("Failed to finalize ZIP file")?;
        info!(
            "Archive {} created with {} file(s)",
            archive_path.display(),
            count
        );
        Ok(archive_path)
    }
}
