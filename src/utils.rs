/*!
 * Utility functions for codeshare
 */

use std::collections::BTreeSet;
use std::path::{Component, Path};

use once_cell::sync::Lazy;

/// Folder names excluded from discovery unless the caller overrides them
pub static DEFAULT_EXCLUDED_FOLDERS: Lazy<BTreeSet<String>> = Lazy::new(|| {
    ["bin", "obj", ".vs", ".git", "node_modules"]
        .iter()
        .map(|s| s.to_string())
        .collect()
});

/// Lowercased copy of a folder-name set, for case-insensitive component checks
pub fn normalize_folder_names<I, S>(names: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names
        .into_iter()
        .map(|n| n.as_ref().trim().to_lowercase())
        .filter(|n| !n.is_empty())
        .collect()
}

/// Render a relative path with `/` separators, whatever the host convention.
/// Returns None if the path has root, prefix or parent components.
pub fn to_marker_path(relative: &Path) -> Option<String> {
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Whether `path` is strictly inside `root` (component-wise, so `/proj2` is not under `/proj`)
pub fn is_strict_descendant(path: &Path, root: &Path) -> bool {
    path != root && path.starts_with(root)
}

/// Format a human-readable file size
pub fn format_file_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_marker_path_uses_forward_slashes() {
        let rel: PathBuf = ["src", "core", "lib.rs"].iter().collect();
        assert_eq!(to_marker_path(&rel).as_deref(), Some("src/core/lib.rs"));
        assert_eq!(to_marker_path(Path::new("../x")), None);
        assert_eq!(to_marker_path(Path::new("")), None);
    }

    #[test]
    fn test_descendant_is_component_based() {
        assert!(is_strict_descendant(Path::new("/proj/a.txt"), Path::new("/proj")));
        assert!(!is_strict_descendant(Path::new("/proj2/a.txt"), Path::new("/proj")));
        assert!(!is_strict_descendant(Path::new("/proj"), Path::new("/proj")));
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(512), "512 bytes");
        assert_eq!(format_file_size(2048), "2.00 KB");
        assert_eq!(format_file_size(3 * 1024 * 1024), "3.00 MB");
    }

    #[test]
    fn test_default_excluded_folders() {
        for name in ["bin", "obj", ".vs", ".git", "node_modules"] {
            assert!(DEFAULT_EXCLUDED_FOLDERS.contains(name));
        }
    }
}
