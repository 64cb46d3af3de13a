/*!
 * File discovery: walk a project tree and select files by profile
 */

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use glob_match::glob_match;
use rayon::prelude::*;
use tracing::{debug, trace, warn};
use walkdir::WalkDir;

use crate::error::Result;
use crate::profile::Profile;
use crate::ensure;
use crate::utils::{
    is_strict_descendant, normalize_folder_names, to_marker_path, DEFAULT_EXCLUDED_FOLDERS,
};

/// Discovery statistics
#[derive(Debug, Clone, Default)]
pub struct ScannerStatistics {
    /// Files whose name matched at least one search pattern
    pub candidates: usize,
    /// Candidates that survived every exclusion rule
    pub accepted: usize,
    /// Candidates that resolved outside the root
    pub outside_root: usize,
    /// Candidates under an excluded folder
    pub excluded_folder: usize,
    /// Candidates rejected by the profile blacklists
    pub blacklisted: usize,
    /// Entries the walk could not read
    pub inaccessible: usize,
    /// Search patterns that were rejected
    pub rejected_patterns: Vec<String>,
}

/// Why a candidate was left out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exclusion {
    OutsideRoot,
    ExcludedFolder,
    BlacklistedFileName,
    BlacklistedExtension,
    SkippedPath,
}

/// A search pattern prepared for case-insensitive matching
#[derive(Debug, Clone)]
struct SearchPattern {
    glob: String,
    /// Patterns with a separator match the relative path, others the file name
    match_path: bool,
}

impl SearchPattern {
    fn compile(raw: &str) -> std::result::Result<Self, &'static str> {
        let pattern = raw.trim().replace('\\', "/");
        if pattern.is_empty() {
            return Err("empty pattern");
        }
        if pattern.split('/').any(|segment| segment == "..") || pattern.contains("..") {
            return Err("pattern contains '..'");
        }
        if pattern.starts_with('/') || pattern.as_bytes().get(1) == Some(&b':') {
            return Err("pattern is rooted");
        }
        if !balanced(&pattern, '[', ']') || !balanced(&pattern, '{', '}') {
            return Err("unbalanced brackets");
        }
        Ok(Self {
            match_path: pattern.contains('/'),
            glob: pattern.to_lowercase(),
        })
    }

    fn is_match(&self, file_name: &str, relative: &str) -> bool {
        if self.match_path {
            glob_match(&self.glob, relative)
        } else {
            glob_match(&self.glob, file_name)
        }
    }
}

fn balanced(pattern: &str, open: char, close: char) -> bool {
    let mut depth: i32 = 0;
    for c in pattern.chars() {
        if c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth < 0 {
                return false;
            }
        }
    }
    depth == 0
}

/// Profile-driven file scanner
pub struct Scanner {
    /// Lowercased folder names pruned from the walk
    excluded_folders: BTreeSet<String>,
    /// Canonical paths never returned, such as the export output file
    skip_paths: Vec<PathBuf>,
    /// Scanner statistics
    statistics: Arc<Mutex<ScannerStatistics>>,
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new(DEFAULT_EXCLUDED_FOLDERS.iter())
    }
}

impl Scanner {
    /// Create a scanner that prunes the given folder names (case-insensitive)
    pub fn new<I, S>(excluded_folders: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            excluded_folders: normalize_folder_names(excluded_folders),
            skip_paths: Vec::new(),
            statistics: Arc::new(Mutex::new(ScannerStatistics::default())),
        }
    }

    /// Never return `path`; it need not exist yet
    pub fn with_skip_path(mut self, path: &Path) -> Self {
        let resolved = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        self.skip_paths.push(resolved);
        self
    }

    /// Get scanner statistics for the last discovery
    pub fn get_statistics(&self) -> ScannerStatistics {
        self.statistics
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn with_stats(&self, f: impl FnOnce(&mut ScannerStatistics)) {
        let mut stats = self.statistics.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut stats);
    }

    /// Discover files under `root` matching `profile`, sorted and deduplicated,
    /// as canonical absolute paths.
    pub fn discover(&self, root: &Path, profile: &Profile) -> Result<Vec<PathBuf>> {
        ensure!(
            root.is_dir(),
            Validation,
            "project directory '{}' not found or not a directory",
            root.display()
        );
        let root = fs::canonicalize(root)?;
        self.with_stats(|s| *s = ScannerStatistics::default());

        let patterns = self.compile_patterns(profile);
        if patterns.is_empty() {
            warn!("Profile '{}' has no usable search patterns", profile.name());
            return Ok(Vec::new());
        }

        debug!(
            "Discovering files in {} with profile '{}' ({} patterns)",
            root.display(),
            profile.name(),
            patterns.len()
        );

        let candidates = self.collect_candidates(&root, &patterns);
        self.with_stats(|s| s.candidates = candidates.len());

        let accepted: BTreeSet<PathBuf> = candidates
            .par_iter()
            .filter_map(|candidate| self.resolve_candidate(&root, candidate, profile))
            .collect();

        self.with_stats(|s| s.accepted = accepted.len());
        debug!("Discovery accepted {} files", accepted.len());
        Ok(accepted.into_iter().collect())
    }

    /// Canonicalize one candidate and apply the exclusion rules. A candidate
    /// that cannot be resolved is counted as inaccessible and dropped.
    fn resolve_candidate(&self, root: &Path, candidate: &Path, profile: &Profile) -> Option<PathBuf> {
        let canonical = match fs::canonicalize(candidate) {
            Ok(path) => path,
            Err(e) => {
                warn!("Could not resolve '{}', skipping: {}", candidate.display(), e);
                self.with_stats(|s| s.inaccessible += 1);
                return None;
            }
        };
        match self.check_exclusion(root, &canonical, profile) {
            None => Some(canonical),
            Some(reason) => {
                trace!("Excluded {} ({:?})", canonical.display(), reason);
                self.with_stats(|s| match reason {
                    Exclusion::OutsideRoot => s.outside_root += 1,
                    Exclusion::ExcludedFolder => s.excluded_folder += 1,
                    Exclusion::BlacklistedFileName | Exclusion::BlacklistedExtension => {
                        s.blacklisted += 1
                    }
                    Exclusion::SkippedPath => {}
                });
                None
            }
        }
    }

    fn compile_patterns(&self, profile: &Profile) -> Vec<SearchPattern> {
        profile
            .search_patterns()
            .iter()
            .filter_map(|raw| match SearchPattern::compile(raw) {
                Ok(pattern) => Some(pattern),
                Err(reason) => {
                    warn!("Search pattern '{}' rejected: {}", raw, reason);
                    self.with_stats(|s| s.rejected_patterns.push(raw.clone()));
                    None
                }
            })
            .collect()
    }

    /// Walk the tree, pruning excluded folders, and keep files matching any pattern
    fn collect_candidates(&self, root: &Path, patterns: &[SearchPattern]) -> Vec<PathBuf> {
        let walker = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| {
                e.depth() == 0
                    || !e.file_type().is_dir()
                    || !self.is_excluded_folder(&e.file_name().to_string_lossy())
            });

        let mut candidates = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    // Unreadable subtree; the rest of the walk carries on
                    let location = e
                        .path()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| root.display().to_string());
                    warn!("Skipping inaccessible entry {}: {}", location, e);
                    self.with_stats(|s| s.inaccessible += 1);
                    continue;
                }
            };

            let is_file = entry.file_type().is_file()
                || (entry.file_type().is_symlink() && entry.path().is_file());
            if !is_file {
                continue;
            }

            let file_name = entry.file_name().to_string_lossy().to_lowercase();
            let relative = entry
                .path()
                .strip_prefix(root)
                .ok()
                .and_then(to_marker_path)
                .map(|r| r.to_lowercase())
                .unwrap_or_else(|| file_name.clone());

            if patterns.iter().any(|p| p.is_match(&file_name, &relative)) {
                candidates.push(entry.into_path());
            }
        }
        candidates
    }

    fn is_excluded_folder(&self, name: &str) -> bool {
        self.excluded_folders.contains(&name.to_lowercase())
    }

    /// Apply the exclusion rules to a canonical candidate path
    pub fn check_exclusion(
        &self,
        root: &Path,
        canonical: &Path,
        profile: &Profile,
    ) -> Option<Exclusion> {
        if !is_strict_descendant(canonical, root) {
            return Some(Exclusion::OutsideRoot);
        }
        if self.skip_paths.iter().any(|p| p == canonical) {
            return Some(Exclusion::SkippedPath);
        }

        let relative = canonical.strip_prefix(root).ok()?;
        if let Some(parent) = relative.parent() {
            let in_excluded = parent
                .components()
                .any(|c| self.is_excluded_folder(&c.as_os_str().to_string_lossy()));
            if in_excluded {
                return Some(Exclusion::ExcludedFolder);
            }
        }

        let file_name = canonical.file_name()?.to_string_lossy();
        if profile.is_blacklisted_file_name(&file_name) {
            return Some(Exclusion::BlacklistedFileName);
        }
        if profile.is_blacklisted_extension(&file_name) {
            return Some(Exclusion::BlacklistedExtension);
        }
        None
    }
}
