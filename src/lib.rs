/*!
 * codeshare - pack project files into one marker-delimited text and back
 *
 * Export walks a project directory with a named profile (search patterns,
 * blacklisted extensions and file names), and concatenates the matching files
 * between `// === Start File: ... ===` and `// === End File: ... ===` markers.
 * Import parses such a document and writes every complete block back under a
 * project directory, refusing any path that would leave it.
 */

pub mod backup;
pub mod config;
pub mod encoding;
pub mod engine;
pub mod error;
pub mod logging;
pub mod marker;
pub mod parser;
pub mod profile;
pub mod report;
pub mod safe_writer;
pub mod scanner;
pub mod types;
pub mod utils;
pub mod writer;


// Re-export main components for easier access
pub use config::Config;
pub use engine::{Engine, ImportOptions};
pub use error::{CodeShareError, Result};
pub use parser::ImportParser;
pub use profile::{CatalogHandle, Profile, ProfileCatalog};
pub use report::{ExportReport, FileReportInfo, ImportReport, ReportFormat, Reporter};
pub use safe_writer::SafeWriter;
pub use scanner::Scanner;
pub use types::{ExportOutput, ExportStatistics, FileBlock, ImportSummary, Issue, ParseOutcome};
pub use utils::format_file_size;
pub use writer::ExportWriter;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
