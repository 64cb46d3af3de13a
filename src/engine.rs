/*!
 * Engine entry points used by the CLI: discover, export and import
 *
 * The engine owns an immutable catalog snapshot and the folder exclusions.
 * Every call takes the profile name explicitly; `None` means the catalog's
 * active profile.
 */

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use indicatif::ProgressBar;
use tracing::{debug, info, warn};

use crate::backup::create_backup;
use crate::error::{CodeShareError, Result};
use crate::parser::ImportParser;
use crate::profile::{Profile, ProfileCatalog};
use crate::safe_writer::SafeWriter;
use crate::scanner::Scanner;
use crate::types::{ExportOutput, ExportStatistics, ImportSummary, Issue, ParseOutcome};
use crate::utils::{normalize_folder_names, to_marker_path, DEFAULT_EXCLUDED_FOLDERS};
use crate::writer::ExportWriter;
use crate::{ensure, error};

/// Largest import file read into memory
pub const MAX_IMPORT_BYTES: u64 = 256 * 1024 * 1024;

/// Options for an import run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportOptions {
    /// Copy the project next to itself before writing anything
    pub create_backup: bool,
    /// Parse and check paths, write nothing
    pub dry_run: bool,
}

/// Export/import engine
pub struct Engine {
    catalog: Arc<ProfileCatalog>,
    excluded_folders: BTreeSet<String>,
    progress: Arc<ProgressBar>,
    timestamp: Option<String>,
    max_import_bytes: u64,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(Arc::new(ProfileCatalog::builtin()))
    }
}

impl Engine {
    pub fn new(catalog: Arc<ProfileCatalog>) -> Self {
        Self {
            catalog,
            excluded_folders: DEFAULT_EXCLUDED_FOLDERS.clone(),
            progress: Arc::new(ProgressBar::hidden()),
            timestamp: None,
            max_import_bytes: MAX_IMPORT_BYTES,
        }
    }

    /// Replace the excluded folder names (case-insensitive whole components)
    pub fn with_excluded_folders<I, S>(mut self, folders: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.excluded_folders = normalize_folder_names(folders);
        self
    }

    pub fn with_progress(mut self, progress: Arc<ProgressBar>) -> Self {
        self.progress = progress;
        self
    }

    /// Fixed export timestamp
    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    pub fn with_max_import_bytes(mut self, limit: u64) -> Self {
        self.max_import_bytes = limit;
        self
    }

    pub fn catalog(&self) -> &ProfileCatalog {
        &self.catalog
    }

    pub fn excluded_folders(&self) -> &BTreeSet<String> {
        &self.excluded_folders
    }

    fn scanner(&self) -> Scanner {
        Scanner::new(self.excluded_folders.iter())
    }

    fn export_writer(&self) -> ExportWriter {
        let writer = ExportWriter::new(self.progress.clone());
        match &self.timestamp {
            Some(ts) => writer.with_timestamp(ts.clone()),
            None => writer,
        }
    }

    fn profile(&self, name: Option<&str>) -> Result<&Profile> {
        let profile = self.catalog.resolve(name)?;
        debug!("Using profile '{}'", profile.name());
        Ok(profile)
    }

    /// Relative (`/`-separated) paths of the files `profile_name` selects under `root`
    pub fn discover(&self, root: &Path, profile_name: Option<&str>) -> Result<Vec<String>> {
        let profile = self.profile(profile_name)?;
        let files = self.scanner().discover(root, profile)?;
        let canonical_root = fs::canonicalize(root)?;

        Ok(files
            .iter()
            .filter_map(|f| f.strip_prefix(&canonical_root).ok())
            .filter_map(to_marker_path)
            .collect())
    }

    /// Build the export document in memory
    pub fn export(&self, root: &Path, profile_name: Option<&str>) -> Result<ExportOutput> {
        let profile = self.profile(profile_name)?;
        let files = self.scanner().discover(root, profile)?;
        if files.is_empty() {
            warn!("No files matched profile '{}' under {}", profile.name(), root.display());
        }

        info!("Exporting {} files from {}", files.len(), root.display());
        self.progress.set_length(files.len() as u64);
        let output = self.export_writer().serialize(root, &files);
        self.progress.finish_and_clear();
        Ok(output)
    }

    /// Write the export document to `output`, creating its directory if needed.
    /// The output file is never part of its own export.
    pub fn export_to_file(
        &self,
        root: &Path,
        profile_name: Option<&str>,
        output: &Path,
    ) -> Result<ExportStatistics> {
        let profile = self.profile(profile_name)?;
        let scanner = self.scanner().with_skip_path(output);
        let files = scanner.discover(root, profile)?;
        ensure!(
            !files.is_empty(),
            Validation,
            "no matching files for profile '{}' under '{}'",
            profile.name(),
            root.display()
        );

        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                debug!("Creating export directory: {}", parent.display());
                fs::create_dir_all(parent)?;
            }
        }

        info!("Exporting {} files to {}", files.len(), output.display());
        self.progress.set_length(files.len() as u64);
        let stats = self.export_writer().write_file(output, root, &files)?;
        self.progress.finish_and_clear();
        Ok(stats)
    }

    /// Parse `text` and write its blocks under `root`
    pub fn import(&self, root: &Path, text: &str, create_backup: bool) -> Result<ImportSummary> {
        self.import_with(
            root,
            text,
            ImportOptions {
                create_backup,
                dry_run: false,
            },
        )
    }

    pub fn import_with(
        &self,
        root: &Path,
        text: &str,
        options: ImportOptions,
    ) -> Result<ImportSummary> {
        ensure_project_dir(root)?;
        self.apply(root, ImportParser::parse_str(text), options)
    }

    /// Read an export file (any supported encoding) and import it
    pub fn import_file(
        &self,
        root: &Path,
        input: &Path,
        options: ImportOptions,
    ) -> Result<ImportSummary> {
        ensure!(
            input.is_file(),
            Validation,
            "import file '{}' does not exist",
            input.display()
        );
        ensure_project_dir(root)?;

        let size = fs::metadata(input)?.len();
        ensure!(
            size <= self.max_import_bytes,
            ResourceExhausted,
            "'{}' is {} bytes, more than the {} byte import limit",
            input.display(),
            size,
            self.max_import_bytes
        );

        let bytes = fs::read(input)?;
        self.apply(root, ImportParser::parse_bytes(&bytes), options)
    }

    fn apply(
        &self,
        root: &Path,
        outcome: ParseOutcome,
        options: ImportOptions,
    ) -> Result<ImportSummary> {
        let ParseOutcome {
            blocks,
            skipped,
            issues,
        } = outcome;
        let writer = SafeWriter::new(root)?.dry_run(options.dry_run);

        let mut summary = ImportSummary {
            skipped,
            issues,
            ..Default::default()
        };

        if options.create_backup {
            if options.dry_run {
                info!("Dry run: backup of {} not created", root.display());
            } else {
                let backup = create_backup(root, self.excluded_folders.iter()).map_err(|e| {
                    error!(Validation, "backup failed, nothing was imported: {}", e)
                })?;
                summary.backup = Some(backup);
            }
        }

        info!("Importing {} blocks into {}", blocks.len(), writer.base().display());
        self.progress.set_length(blocks.len() as u64);
        for block in &blocks {
            self.progress.inc(1);
            match writer.write_block(block) {
                Ok(path) => {
                    summary.imported += 1;
                    summary.written.push(path);
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(
                        "Skipping block '{}' at line {}: {}",
                        block.relative_path, block.start_line, e
                    );
                    summary.skipped += 1;
                    summary.issues.push(Issue::at_line(
                        block.start_line,
                        Some(&block.relative_path),
                        e.to_string(),
                    ));
                }
            }
        }
        self.progress.finish_and_clear();

        info!(
            "Import finished: {} imported, {} skipped",
            summary.imported, summary.skipped
        );
        Ok(summary)
    }
}

fn ensure_project_dir(root: &Path) -> Result<()> {
    if root.is_dir() {
        Ok(())
    } else {
        Err(CodeShareError::Validation(format!(
            "project directory '{}' does not exist",
            root.display()
        )))
    }
}
