/*!
 * Export writer: render discovered files into the marker-delimited text format
 */

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use chrono::Local;
use indicatif::ProgressBar;
use tracing::{debug, warn};

use crate::encoding::decode_text;
use crate::marker::{
    self, END_FILE_PREFIX, EXPORT_ROOT_PREFIX, START_FILE_PREFIX, TIMESTAMP_FORMAT,
    TIMESTAMP_PREFIX,
};
use crate::report::FileReportInfo;
use crate::types::{ExportOutput, ExportStatistics, Issue};
use crate::utils::to_marker_path;

/// Writer for the export document
pub struct ExportWriter {
    /// Progress bar, advanced once per file
    progress: Arc<ProgressBar>,
    /// Fixed timestamp, mostly for reproducible output in tests
    timestamp: Option<String>,
}

impl Default for ExportWriter {
    fn default() -> Self {
        Self::new(Arc::new(ProgressBar::hidden()))
    }
}

impl ExportWriter {
    /// Create a new export writer
    pub fn new(progress: Arc<ProgressBar>) -> Self {
        Self {
            progress,
            timestamp: None,
        }
    }

    /// Use a fixed timestamp instead of the current local time
    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    /// Render the export document into a String
    pub fn serialize(&self, root: &Path, files: &[impl AsRef<Path>]) -> ExportOutput {
        let mut buffer = Vec::new();
        // Writing into a Vec cannot fail
        let statistics = match self.write_to(&mut buffer, root, files) {
            Ok(stats) => stats,
            Err(e) => {
                warn!("Unexpected error rendering export: {}", e);
                ExportStatistics::default()
            }
        };
        ExportOutput {
            text: String::from_utf8_lossy(&buffer).into_owned(),
            statistics,
        }
    }

    /// Render the export document into `path`, UTF-8 without BOM
    pub fn write_file(
        &self,
        path: &Path,
        root: &Path,
        files: &[impl AsRef<Path>],
    ) -> io::Result<ExportStatistics> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        let stats = self.write_to(&mut writer, root, files)?;
        writer.flush()?;
        Ok(stats)
    }

    /// Write the header and one block per readable file.
    ///
    /// Per-file read failures are logged and counted; only failures of the
    /// output sink abort.
    pub fn write_to<W: Write>(
        &self,
        out: &mut W,
        root: &Path,
        files: &[impl AsRef<Path>],
    ) -> io::Result<ExportStatistics> {
        let mut stats = ExportStatistics::default();

        let timestamp = self
            .timestamp
            .clone()
            .unwrap_or_else(|| Local::now().format(TIMESTAMP_FORMAT).to_string());
        writeln!(out, "{}", marker::render(EXPORT_ROOT_PREFIX, &root.display().to_string()))?;
        writeln!(out, "{}", marker::render(TIMESTAMP_PREFIX, &timestamp))?;
        writeln!(out)?;

        // Relative paths are computed against the canonical root when possible,
        // since discovery hands back canonical file paths.
        let canonical_root = fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());

        for file in files {
            let path = file.as_ref();
            self.progress.inc(1);

            let relative = path
                .strip_prefix(&canonical_root)
                .or_else(|_| path.strip_prefix(root))
                .ok()
                .and_then(to_marker_path);
            let Some(relative) = relative else {
                warn!("Skipping {}: not under export root {}", path.display(), root.display());
                stats.files_skipped += 1;
                stats
                    .issues
                    .push(Issue::for_path(path, "not under the export root"));
                continue;
            };

            self.progress.set_message(format!("Current file: {}", relative));

            let content = match fs::read(path) {
                Ok(bytes) => decode_text(&bytes, &relative),
                Err(e) => {
                    warn!("Could not read file '{}', skipping: {}", path.display(), e);
                    stats.files_skipped += 1;
                    stats.issues.push(Issue::for_path(path, format!("read failed: {}", e)));
                    continue;
                }
            };
            let content = content.trim_end_matches(['\r', '\n']);

            writeln!(out, "{}", marker::render(START_FILE_PREFIX, &relative))?;
            writeln!(out)?;
            writeln!(out, "{}", content)?;
            writeln!(out)?;
            writeln!(out, "{}", marker::render(END_FILE_PREFIX, &relative))?;
            writeln!(out)?;

            let chars = content.chars().count();
            let lines = if content.is_empty() {
                0
            } else {
                content.lines().count()
            };
            stats.files_exported += 1;
            stats.total_chars += chars;
            stats.total_lines += lines;
            stats
                .file_details
                .insert(relative.clone(), FileReportInfo { lines, chars });
            debug!("Exported {} ({} chars)", relative, chars);
        }

        Ok(stats)
    }
}
