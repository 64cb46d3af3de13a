/*!
 * Reporting for codeshare
 *
 * Console tables for export and import results, rendered with the tabled
 * library.
 */

use std::collections::HashMap;
use std::time::Duration;

use tabled::{
    settings::{object::Columns, Alignment, Modify, Padding, Style},
    Table, Tabled,
};

use crate::profile::ProfileCatalog;
use crate::types::{ExportStatistics, ImportSummary, Issue};
use crate::utils::format_file_size;

/// Per-file numbers shown in the export report
#[derive(Debug, Clone, Default)]
pub struct FileReportInfo {
    /// Number of lines in the file
    pub lines: usize,
    /// Number of characters in the file
    pub chars: usize,
}

/// Everything shown after an export
#[derive(Debug, Clone)]
pub struct ExportReport {
    /// Output file, or "stdout"
    pub output: String,
    /// Size of the written output file
    pub output_size: Option<u64>,
    /// Time taken for discovery and serialization
    pub duration: Duration,
    pub files_exported: usize,
    pub files_skipped: usize,
    pub total_lines: usize,
    pub total_chars: usize,
    pub file_details: HashMap<String, FileReportInfo>,
}

impl ExportReport {
    pub fn new(output: impl Into<String>, duration: Duration, stats: ExportStatistics) -> Self {
        Self {
            output: output.into(),
            output_size: None,
            duration,
            files_exported: stats.files_exported,
            files_skipped: stats.files_skipped,
            total_lines: stats.total_lines,
            total_chars: stats.total_chars,
            file_details: stats.file_details,
        }
    }
}

/// Everything shown after an import
#[derive(Debug, Clone)]
pub struct ImportReport {
    /// Project directory written into
    pub target: String,
    pub duration: Duration,
    pub dry_run: bool,
    pub summary: ImportSummary,
}

/// Format of the report output
pub enum ReportFormat {
    /// Console table output
    ConsoleTable,
}

/// Report generator
pub struct Reporter {
    format: ReportFormat,
}

#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "Metric")]
    key: String,

    #[tabled(rename = "Value")]
    value: String,
}

impl SummaryRow {
    fn new(key: &str, value: impl Into<String>) -> Self {
        Self {
            key: key.to_string(),
            value: value.into(),
        }
    }
}

fn styled(mut table: Table) -> String {
    table
        .with(Style::rounded())
        .with(Padding::new(1, 1, 0, 0))
        .with(Modify::new(Columns::new(..)).with(Alignment::left()));
    table.to_string()
}

/// Rough LLM token estimate: four characters per token
pub fn estimate_tokens(chars: usize) -> usize {
    chars / 4
}

impl Reporter {
    /// Create a new reporter
    pub fn new(format: ReportFormat) -> Self {
        Self { format }
    }

    /// Format a number with human-readable units
    fn format_number(&self, num: usize) -> String {
        if num >= 1_000_000 {
            format!("{:.1}M", num as f64 / 1_000_000.0)
        } else if num >= 1_000 {
            format!("{:.1}K", num as f64 / 1_000.0)
        } else {
            num.to_string()
        }
    }

    // Shorten a `/`-separated path to at most `max_len` chars, keeping the tail
    fn format_path(&self, path: &str, max_len: usize) -> String {
        if path.chars().count() <= max_len {
            return path.to_string();
        }

        let parts: Vec<&str> = path.split('/').collect();
        if parts.len() <= 2 {
            let tail: String = path
                .chars()
                .rev()
                .take(max_len.saturating_sub(3))
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect();
            return format!("...{}", tail);
        }

        let mut current_len = 3; // "..."
        let mut segments = Vec::new();
        for part in parts.iter().rev() {
            let part_len = part.chars().count() + 1;
            if current_len + part_len <= max_len {
                segments.push(*part);
                current_len += part_len;
            } else {
                break;
            }
        }

        let mut result = String::from("...");
        for part in segments.iter().rev() {
            result.push('/');
            result.push_str(part);
        }
        result
    }

    /// Render the export report
    pub fn export_report(&self, report: &ExportReport) -> String {
        match self.format {
            ReportFormat::ConsoleTable => self.export_console_report(report),
        }
    }

    /// Render the import report
    pub fn import_report(&self, report: &ImportReport) -> String {
        match self.format {
            ReportFormat::ConsoleTable => self.import_console_report(report),
        }
    }

    /// Render the profile catalog, marking the active profile
    pub fn profiles_report(&self, catalog: &ProfileCatalog) -> String {
        #[derive(Tabled)]
        struct ProfileRow {
            #[tabled(rename = "")]
            active: String,
            #[tabled(rename = "Profile")]
            name: String,
            #[tabled(rename = "Patterns")]
            patterns: String,
            #[tabled(rename = "Blacklisted")]
            blacklisted: String,
        }

        let active = catalog.get_active().ok().map(|p| p.name().to_string());
        let rows: Vec<ProfileRow> = catalog
            .list_profiles()
            .iter()
            .map(|p| {
                let blacklisted: Vec<&str> = p
                    .blacklisted_extensions()
                    .chain(p.blacklisted_file_names())
                    .collect();
                ProfileRow {
                    active: if active.as_deref() == Some(p.name()) {
                        "*".to_string()
                    } else {
                        String::new()
                    },
                    name: p.name().to_string(),
                    patterns: p.search_patterns().join(" "),
                    blacklisted: blacklisted.join(" "),
                }
            })
            .collect();

        styled(Table::new(rows))
    }

    pub fn print_export_report(&self, report: &ExportReport) {
        println!("\n{}", self.export_report(report));
    }

    pub fn print_import_report(&self, report: &ImportReport) {
        println!("\n{}", self.import_report(report));
    }

    fn create_export_summary_table(&self, report: &ExportReport) -> String {
        let mut rows = vec![SummaryRow::new("📂 Output", report.output.clone())];
        if let Some(size) = report.output_size {
            rows.push(SummaryRow::new("💾 Output Size", format_file_size(size)));
        }
        rows.extend([
            SummaryRow::new("⏱️ Process Time", format!("{:.4?}", report.duration)),
            SummaryRow::new("📄 Files Exported", self.format_number(report.files_exported)),
            SummaryRow::new("⚠️ Files Skipped", self.format_number(report.files_skipped)),
            SummaryRow::new("📝 Total Lines", self.format_number(report.total_lines)),
            SummaryRow::new("🔤 Characters", self.format_number(report.total_chars)),
            SummaryRow::new(
                "📦 LLM Tokens",
                format!(
                    "{} tokens (estimated)",
                    self.format_number(estimate_tokens(report.total_chars))
                ),
            ),
        ]);
        styled(Table::new(rows))
    }

    fn create_files_table(&self, report: &ExportReport) -> String {
        #[derive(Tabled)]
        struct FileRow {
            #[tabled(rename = "File Path")]
            path: String,

            #[tabled(rename = "Lines")]
            lines: String,

            #[tabled(rename = "Est. Tokens")]
            tokens: String,
        }

        // Largest first, ties by path so the table is stable
        let mut files: Vec<_> = report.file_details.iter().collect();
        files.sort_by(|(pa, a), (pb, b)| b.chars.cmp(&a.chars).then_with(|| pa.cmp(pb)));

        let files_to_show = if files.len() > 15 {
            &files[0..10]
        } else {
            &files[..]
        };

        let rows: Vec<FileRow> = files_to_show
            .iter()
            .map(|(path, info)| FileRow {
                path: self.format_path(path, 60),
                lines: self.format_number(info.lines),
                tokens: self.format_number(estimate_tokens(info.chars)),
            })
            .collect();

        styled(Table::new(rows))
    }

    fn export_console_report(&self, report: &ExportReport) -> String {
        let summary_table = self.create_export_summary_table(report);
        let files_table = self.create_files_table(report);

        let files_title = if report.file_details.len() > 15 {
            "📋  TOP 10 LARGEST FILES BY CHARACTER COUNT  📋"
        } else {
            "📋  EXPORTED FILES"
        };

        format!(
            "{}\n{}\n\n{}\n{}",
            files_title, files_table, "✅  EXPORT COMPLETE", summary_table
        )
    }

    fn create_issues_table(&self, issues: &[Issue]) -> String {
        #[derive(Tabled)]
        struct IssueRow {
            #[tabled(rename = "Line")]
            line: String,
            #[tabled(rename = "Path")]
            path: String,
            #[tabled(rename = "Reason")]
            reason: String,
        }

        let rows: Vec<IssueRow> = issues
            .iter()
            .map(|issue| IssueRow {
                line: issue.line.map(|l| l.to_string()).unwrap_or_default(),
                path: issue
                    .path
                    .as_deref()
                    .map(|p| self.format_path(p, 50))
                    .unwrap_or_default(),
                reason: issue.reason.clone(),
            })
            .collect();

        styled(Table::new(rows))
    }

    fn import_console_report(&self, report: &ImportReport) -> String {
        let summary = &report.summary;
        let mut rows = vec![
            SummaryRow::new("📂 Project", report.target.clone()),
            SummaryRow::new("⏱️ Process Time", format!("{:.4?}", report.duration)),
            SummaryRow::new(
                if report.dry_run {
                    "📄 Would Import"
                } else {
                    "📄 Files Imported"
                },
                self.format_number(summary.imported),
            ),
            SummaryRow::new("⚠️ Blocks Skipped", self.format_number(summary.skipped)),
        ];
        if let Some(backup) = &summary.backup {
            rows.push(SummaryRow::new("💾 Backup", backup.display().to_string()));
        }

        let title = if report.dry_run {
            "🔎  DRY RUN COMPLETE"
        } else if summary.skipped == 0 {
            "✅  IMPORT COMPLETE"
        } else {
            "⚠️  IMPORT FINISHED WITH SKIPPED BLOCKS"
        };

        let mut out = String::new();
        if !summary.issues.is_empty() {
            out.push_str("📋  SKIPPED BLOCKS\n");
            out.push_str(&self.create_issues_table(&summary.issues));
            out.push_str("\n\n");
        }
        out.push_str(title);
        out.push('\n');
        out.push_str(&styled(Table::new(rows)));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn export_report(files: usize) -> ExportReport {
        let mut details = HashMap::new();
        for i in 0..files {
            details.insert(
                format!("src/file{:02}.cs", i),
                FileReportInfo {
                    lines: 1,
                    chars: 100 + i,
                },
            );
        }
        ExportReport {
            output: "out.txt".to_string(),
            output_size: Some(2048),
            duration: Duration::from_millis(5),
            files_exported: files,
            files_skipped: 0,
            total_lines: files,
            total_chars: 4000,
            file_details: details,
        }
    }

    #[test]
    fn test_number_formatting() {
        let reporter = Reporter::new(ReportFormat::ConsoleTable);
        assert_eq!(reporter.format_number(999), "999");
        assert_eq!(reporter.format_number(1_500), "1.5K");
        assert_eq!(reporter.format_number(2_000_000), "2.0M");
    }

    #[test]
    fn test_path_truncation_keeps_tail() {
        let reporter = Reporter::new(ReportFormat::ConsoleTable);
        assert_eq!(reporter.format_path("src/a.py", 60), "src/a.py");

        let long = "very/long/directory/structure/that/goes/on/and/on/forever/file.rs";
        let short = reporter.format_path(long, 30);
        assert!(short.starts_with("..."));
        assert!(short.ends_with("/file.rs"));
        assert!(short.chars().count() <= 30);
    }

    #[test]
    fn test_export_report_lists_all_small_sets() {
        let reporter = Reporter::new(ReportFormat::ConsoleTable);
        let text = reporter.export_report(&export_report(3));
        assert!(text.contains("EXPORTED FILES"));
        assert!(text.contains("src/file00.cs"));
        assert!(text.contains("1.0K tokens (estimated)"));
        assert!(text.contains("2.00 KB"));
    }

    #[test]
    fn test_export_report_top_ten_for_large_sets() {
        let reporter = Reporter::new(ReportFormat::ConsoleTable);
        let text = reporter.export_report(&export_report(20));
        assert!(text.contains("TOP 10"));
        assert!(text.contains("src/file19.cs"));
        assert!(!text.contains("src/file00.cs"));
    }

    #[test]
    fn test_import_report_shows_issues() {
        let reporter = Reporter::new(ReportFormat::ConsoleTable);
        let report = ImportReport {
            target: "/proj".to_string(),
            duration: Duration::from_millis(1),
            dry_run: false,
            summary: ImportSummary {
                imported: 1,
                skipped: 1,
                issues: vec![Issue::at_line(7, Some("../x"), "path traversal")],
                ..Default::default()
            },
        };
        let text = reporter.import_report(&report);
        assert!(text.contains("SKIPPED BLOCKS"));
        assert!(text.contains("path traversal"));
        assert!(text.contains("IMPORT FINISHED WITH SKIPPED BLOCKS"));
    }

    #[test]
    fn test_profiles_report_marks_active() {
        let reporter = Reporter::new(ReportFormat::ConsoleTable);
        let text = reporter.profiles_report(&ProfileCatalog::builtin());
        assert!(text.contains(".NET Default"));
        assert!(text.contains("Python"));
        assert!(text.contains('*'));
    }
}
