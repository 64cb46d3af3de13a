/*!
 * Marker lines of the export format
 *
 * ```text
 * // === Export Root: <root> ===
 * // === Timestamp: <yyyy-MM-dd HH:mm:ss> ===
 * // === Start File: <relative/path> ===
 * // === End File: <relative/path> ===
 * ```
 */

pub const START_FILE_PREFIX: &str = "// === Start File:";
pub const END_FILE_PREFIX: &str = "// === End File:";
pub const EXPORT_ROOT_PREFIX: &str = "// === Export Root:";
pub const TIMESTAMP_PREFIX: &str = "// === Timestamp:";
pub const MARKER_SUFFIX: &str = " ===";

/// chrono format string for the timestamp marker
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Render a marker line (without line terminator)
pub fn render(prefix: &str, value: &str) -> String {
    format!("{} {}{}", prefix, value, MARKER_SUFFIX)
}

/// Whether a trimmed line is a marker with the given prefix
pub fn matches(trimmed: &str, prefix: &str) -> bool {
    trimmed.starts_with(prefix) && trimmed.ends_with(MARKER_SUFFIX)
}

/// Extract the trimmed value between prefix and suffix. Returns None when the
/// line is not such a marker; an empty string when the value is blank.
pub fn extract(trimmed: &str, prefix: &str) -> Option<String> {
    if !matches(trimmed, prefix) {
        return None;
    }
    let start = prefix.len();
    let end = trimmed.len() - MARKER_SUFFIX.len();
    if end <= start {
        return Some(String::new());
    }
    Some(trimmed[start..end].trim().to_string())
}
