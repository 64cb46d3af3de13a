/*!
 * Core types and data structures shared by the export and import pipelines
 */

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::report::FileReportInfo;

/// One file's relative path and content as carried between a Start and End marker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileBlock {
    /// Relative path with forward slashes
    pub relative_path: String,
    /// File content with trailing line terminators trimmed
    pub content: String,
    /// Line number of the Start-File marker
    pub start_line: usize,
}

impl FileBlock {
    /// Relative path converted to the host separator convention
    pub fn host_path(&self) -> PathBuf {
        self.relative_path
            .split('/')
            .filter(|segment| !segment.is_empty() && *segment != ".")
            .collect()
    }
}

/// A skipped file or block, with the reason it was skipped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    /// Line number in the import text, if the issue came from parsing
    pub line: Option<usize>,
    /// Path the issue refers to, if one is known
    pub path: Option<String>,
    /// Human readable reason
    pub reason: String,
}

impl Issue {
    pub fn at_line(line: usize, path: Option<&str>, reason: impl Into<String>) -> Self {
        Self {
            line: Some(line),
            path: path.map(str::to_string),
            reason: reason.into(),
        }
    }

    pub fn for_path(path: &Path, reason: impl Into<String>) -> Self {
        Self {
            line: None,
            path: Some(path.display().to_string()),
            reason: reason.into(),
        }
    }
}

/// Statistics gathered while serializing an export
#[derive(Debug, Clone, Default)]
pub struct ExportStatistics {
    /// Number of files embedded in the document
    pub files_exported: usize,
    /// Files that could not be read
    pub files_skipped: usize,
    /// Total number of content lines
    pub total_lines: usize,
    /// Sum of trimmed content lengths in characters
    pub total_chars: usize,
    /// Details for each exported file, keyed by relative path
    pub file_details: HashMap<String, FileReportInfo>,
    /// Files that were skipped and why
    pub issues: Vec<Issue>,
}

/// Result of rendering an export document
#[derive(Debug, Clone)]
pub struct ExportOutput {
    /// The marker-delimited document
    pub text: String,
    /// Export statistics
    pub statistics: ExportStatistics,
}

impl ExportOutput {
    /// Total trimmed content characters, for user-facing reporting
    pub fn total_chars(&self) -> usize {
        self.statistics.total_chars
    }
}

/// Outcome of parsing import text, before anything is written
#[derive(Debug, Clone, Default)]
pub struct ParseOutcome {
    /// Complete blocks whose start and end markers agree
    pub blocks: Vec<FileBlock>,
    /// Blocks that were rejected or left unterminated
    pub skipped: usize,
    /// Reasons for every skip, with line numbers
    pub issues: Vec<Issue>,
}

/// Final summary of an import run
#[derive(Debug, Clone, Default)]
pub struct ImportSummary {
    /// Blocks written (or that would be written, in a dry run)
    pub imported: usize,
    /// Blocks skipped during parsing or writing
    pub skipped: usize,
    /// Absolute paths of written files
    pub written: Vec<PathBuf>,
    /// Reasons for every skip
    pub issues: Vec<Issue>,
    /// Backup location, when one was requested
    pub backup: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_path_from_forward_slashes() {
        let block = FileBlock {
            relative_path: "src/./nested//a.py".to_string(),
            content: String::new(),
            start_line: 1,
        };
        assert_eq!(block.host_path(), Path::new("src").join("nested").join("a.py"));
    }
}
