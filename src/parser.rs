/*!
 * Import parser: recover file blocks from marker-delimited text
 *
 * The parser is a two-state machine (`Idle`, `ReadingFile`) fed one physical
 * line at a time. Lines are trimmed only to recognise markers; content lines
 * are kept verbatim. Every rejected or incomplete block is counted as
 * skipped and recorded with its line number.
 */

use std::io::{self, BufRead};
use std::path::Path;

use tracing::{debug, warn};

use crate::encoding::decode_text;
use crate::marker::{self, END_FILE_PREFIX, START_FILE_PREFIX};
use crate::types::{FileBlock, Issue, ParseOutcome};

/// Parser state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseState {
    /// Outside any block: headers and separators are ignored
    Idle,
    /// Inside a block started at `start_line`
    ReadingFile { path: String, start_line: usize },
}

/// Streaming parser for the export format
#[derive(Debug)]
pub struct ImportParser {
    state: ParseState,
    buffer: String,
    line_number: usize,
    /// Set right after a Start-File marker: one empty line is discarded
    skip_next_blank: bool,
    outcome: ParseOutcome,
}

impl Default for ImportParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportParser {
    pub fn new() -> Self {
        Self {
            state: ParseState::Idle,
            buffer: String::new(),
            line_number: 0,
            skip_next_blank: false,
            outcome: ParseOutcome::default(),
        }
    }

    pub fn state(&self) -> &ParseState {
        &self.state
    }

    /// Number of lines consumed so far
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    /// Parse a complete text. Lines are split on `\n` only, so a `\r` at the
    /// end of a content line is kept.
    pub fn parse_str(text: &str) -> ParseOutcome {
        let mut parser = Self::new();
        for line in text.split_inclusive('\n') {
            parser.push_line(line.strip_suffix('\n').unwrap_or(line));
        }
        parser.finish()
    }

    /// Parse raw bytes, choosing UTF-8 / UTF-16LE / UTF-16BE from the BOM
    pub fn parse_bytes(bytes: &[u8]) -> ParseOutcome {
        Self::parse_str(&decode_text(bytes, "import text"))
    }

    /// Parse UTF-8 text from a line-oriented reader
    pub fn parse_reader<R: BufRead>(mut reader: R) -> io::Result<ParseOutcome> {
        let mut parser = Self::new();
        let mut line = String::new();
        while reader.read_line(&mut line)? > 0 {
            parser.push_line(line.strip_suffix('\n').unwrap_or(&line));
            line.clear();
        }
        Ok(parser.finish())
    }

    /// Feed one physical line without its `\n`. A trailing `\r` is ignored
    /// for marker and blank-line detection but kept in block content.
    pub fn push_line(&mut self, line: &str) {
        self.line_number += 1;

        let line = if self.line_number == 1 {
            line.strip_prefix('\u{feff}').unwrap_or(line)
        } else {
            line
        };
        let bare = line.strip_suffix('\r').unwrap_or(line);

        if std::mem::take(&mut self.skip_next_blank) && bare.is_empty() {
            return;
        }

        let trimmed = bare.trim();
        if marker::matches(trimmed, START_FILE_PREFIX) {
            self.on_start_marker(trimmed);
            return;
        }

        let reading = matches!(self.state, ParseState::ReadingFile { .. });
        if reading && marker::matches(trimmed, END_FILE_PREFIX) {
            self.on_end_marker(trimmed);
        } else if reading {
            self.buffer.push_str(line);
            self.buffer.push('\n');
        }
    }

    /// End of input: an open block is truncated and skipped
    pub fn finish(mut self) -> ParseOutcome {
        if let ParseState::ReadingFile { path, start_line } = &self.state {
            warn!(
                "Reached end of input while reading '{}' (started line {}); block is truncated or missing its end marker, skipping",
                path, start_line
            );
            let issue = Issue::at_line(
                *start_line,
                Some(path.as_str()),
                "truncated block: end of input before end marker",
            );
            self.skip(issue);
        }
        debug!(
            "Parsed {} lines: {} blocks, {} skipped",
            self.line_number,
            self.outcome.blocks.len(),
            self.outcome.skipped
        );
        self.outcome
    }

    fn skip(&mut self, issue: Issue) {
        self.outcome.skipped += 1;
        self.outcome.issues.push(issue);
    }

    fn reset(&mut self) {
        self.state = ParseState::Idle;
        self.buffer.clear();
    }

    fn on_start_marker(&mut self, trimmed: &str) {
        let line = self.line_number;

        if let ParseState::ReadingFile { path, .. } = &self.state {
            warn!(
                "Line {}: new start marker before end marker for '{}', skipping partial content",
                line, path
            );
            let issue = Issue::at_line(line, Some(path.as_str()), "start marker before end marker");
            self.skip(issue);
        }
        self.reset();

        let raw = marker::extract(trimmed, START_FILE_PREFIX).unwrap_or_default();
        match validate_import_path(&raw) {
            Ok(path) => {
                self.state = ParseState::ReadingFile {
                    path,
                    start_line: line,
                };
                self.skip_next_blank = true;
            }
            Err(reason) => {
                warn!("Line {}: {} in start marker ('{}'), skipping block", line, reason, raw);
                self.skip(Issue::at_line(line, Some(raw.as_str()), reason));
            }
        }
    }

    fn on_end_marker(&mut self, trimmed: &str) {
        let line = self.line_number;
        let raw = marker::extract(trimmed, END_FILE_PREFIX).unwrap_or_default();

        // The writer emits one blank line before the end marker
        drop_trailing_blank_line(&mut self.buffer);

        // An end marker without a path is dropped and reading continues, so
        // the next end marker closes the block with both parts merged.
        if raw.is_empty() {
            warn!("Line {}: end marker with empty path ignored", line);
            return;
        }

        let ParseState::ReadingFile { path, start_line } =
            std::mem::replace(&mut self.state, ParseState::Idle)
        else {
            return;
        };

        let end_path = normalize_separators(&raw);
        if end_path.to_lowercase() == path.to_lowercase() {
            let content = self.buffer.trim_end_matches(['\r', '\n']).to_string();
            debug!("Line {}: block '{}' complete ({} chars)", line, path, content.len());
            self.outcome.blocks.push(FileBlock {
                relative_path: path,
                content,
                start_line,
            });
        } else {
            warn!(
                "Line {}: end marker path '{}' does not match expected '{}', skipping block",
                line, end_path, path
            );
            self.skip(Issue::at_line(
                line,
                Some(path.as_str()),
                format!("end marker path '{}' does not match", end_path),
            ));
        }
        self.reset();
    }
}

/// Remove the last buffered line if it is blank (`\n` or `\r\n`)
fn drop_trailing_blank_line(buffer: &mut String) {
    let Some(head) = buffer.strip_suffix('\n') else {
        return;
    };
    let head = head.strip_suffix('\r').unwrap_or(head);
    if head.ends_with('\n') {
        let keep = head.len();
        buffer.truncate(keep);
    }
}

/// Forward-slash form with empty and `.` segments removed
fn normalize_separators(raw: &str) -> String {
    raw.replace('\\', "/")
        .split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(windows)]
const INVALID_PATH_CHARS: &[char] = &['<', '>', '"', '|', '?', '*', ':'];
#[cfg(not(windows))]
const INVALID_PATH_CHARS: &[char] = &[];

/// Validate a marker path for import and return its normalized `/` form.
///
/// Rejects empty paths, control or host-invalid characters, `..` segments
/// and rooted paths (including drive prefixes on every host).
pub fn validate_import_path(raw: &str) -> Result<String, &'static str> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err("empty path");
    }

    let unified = raw.replace('\\', "/");
    let has_drive = unified.len() >= 2
        && unified.as_bytes()[1] == b':'
        && unified.as_bytes()[0].is_ascii_alphabetic();
    if unified.starts_with('/') || has_drive || Path::new(raw).is_absolute() {
        return Err("absolute path");
    }
    if unified.split('/').any(|segment| segment.trim() == "..") {
        return Err("path traversal");
    }
    if raw
        .chars()
        .any(|c| c.is_control() || INVALID_PATH_CHARS.contains(&c))
    {
        return Err("invalid path characters");
    }

    let normalized = normalize_separators(&unified);
    if normalized.is_empty() {
        return Err("empty path");
    }
    Ok(normalized)
}
