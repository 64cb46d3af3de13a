/*!
 * Named filtering profiles and the catalog that holds them
 *
 * A profile bundles the glob patterns that select files for export with the
 * extensions and file names that are always left out. The catalog can come
 * from the built-in set or from a JSON file; reloading swaps a whole
 * immutable snapshot through `CatalogHandle`.
 */

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{CodeShareError, Result};
use crate::{bail, ensure};

/// Name of the profile that is active when a catalog is first built
pub const DEFAULT_PROFILE_NAME: &str = ".NET Default";

/// A named set of file-matching rules
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    name: String,
    search_patterns: Vec<String>,
    blacklisted_extensions: BTreeSet<String>,
    blacklisted_file_names: BTreeSet<String>,
}

impl Profile {
    /// Build a profile, normalizing extensions to a lowercase leading-dot form
    pub fn new<P, E, F>(name: &str, patterns: P, extensions: E, file_names: F) -> Result<Self>
    where
        P: IntoIterator,
        P::Item: AsRef<str>,
        E: IntoIterator,
        E::Item: AsRef<str>,
        F: IntoIterator,
        F::Item: AsRef<str>,
    {
        let name = name.trim();
        ensure!(!name.is_empty(), InvalidProfile, "profile name cannot be empty");

        let mut search_patterns: Vec<String> = Vec::new();
        for pattern in patterns {
            let pattern = pattern.as_ref().trim();
            if !pattern.is_empty() && !search_patterns.iter().any(|p| p == pattern) {
                search_patterns.push(pattern.to_string());
            }
        }
        ensure!(
            !search_patterns.is_empty(),
            InvalidProfile,
            "profile '{}' must have at least one search pattern",
            name
        );

        let blacklisted_extensions = extensions
            .into_iter()
            .map(|ext| normalize_extension(ext.as_ref()))
            .filter(|ext| ext.len() > 1)
            .collect();

        let blacklisted_file_names = file_names
            .into_iter()
            .map(|f| f.as_ref().trim().to_lowercase())
            .filter(|f| !f.is_empty())
            .collect();

        Ok(Self {
            name: name.to_string(),
            search_patterns,
            blacklisted_extensions,
            blacklisted_file_names,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn search_patterns(&self) -> &[String] {
        &self.search_patterns
    }

    pub fn blacklisted_extensions(&self) -> impl Iterator<Item = &str> {
        self.blacklisted_extensions.iter().map(String::as_str)
    }

    pub fn blacklisted_file_names(&self) -> impl Iterator<Item = &str> {
        self.blacklisted_file_names.iter().map(String::as_str)
    }

    /// Case-insensitive check against the blacklisted file names
    pub fn is_blacklisted_file_name(&self, file_name: &str) -> bool {
        self.blacklisted_file_names
            .contains(&file_name.to_lowercase())
    }

    /// Case-insensitive check of `file_name`'s extension against the blacklist
    pub fn is_blacklisted_extension(&self, file_name: &str) -> bool {
        match extension_of(file_name) {
            Some(ext) => self.blacklisted_extensions.contains(&ext),
            None => false,
        }
    }

    fn to_data(&self) -> ProfileData {
        ProfileData {
            name: self.name.clone(),
            search_patterns: self.search_patterns.clone(),
            blacklisted_extensions: self.blacklisted_extensions.iter().cloned().collect(),
            blacklisted_file_names: self.blacklisted_file_names.iter().cloned().collect(),
        }
    }
}

/// Lowercase extension with a leading dot
fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim().to_lowercase();
    if ext.starts_with('.') {
        ext
    } else {
        format!(".{}", ext)
    }
}

/// Extension of a file name including the dot, lowercased. Dotfiles like
/// `.gitignore` count as having the extension `.gitignore`.
fn extension_of(file_name: &str) -> Option<String> {
    let idx = file_name.rfind('.')?;
    if idx + 1 == file_name.len() {
        return None;
    }
    Some(file_name[idx..].to_lowercase())
}

/// On-disk shape of a profile
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ProfileData {
    name: String,
    search_patterns: Vec<String>,
    blacklisted_extensions: Vec<String>,
    blacklisted_file_names: Vec<String>,
}

impl TryFrom<ProfileData> for Profile {
    type Error = CodeShareError;

    fn try_from(data: ProfileData) -> Result<Self> {
        Profile::new(
            &data.name,
            data.search_patterns,
            data.blacklisted_extensions,
            data.blacklisted_file_names,
        )
    }
}

/// Ordered collection of profiles with one active entry
#[derive(Debug, Clone)]
pub struct ProfileCatalog {
    profiles: Vec<Profile>,
    active: Option<usize>,
}

impl ProfileCatalog {
    /// Build a catalog; later duplicates of a name (case-insensitive) are dropped.
    /// The default profile becomes active if present, otherwise the first one.
    pub fn from_profiles(profiles: Vec<Profile>) -> Self {
        let mut unique: Vec<Profile> = Vec::with_capacity(profiles.len());
        for profile in profiles {
            if unique.iter().any(|p| p.name.eq_ignore_ascii_case(&profile.name)) {
                warn!("Duplicate profile name '{}' ignored", profile.name);
                continue;
            }
            unique.push(profile);
        }

        let active = unique
            .iter()
            .position(|p| p.name == DEFAULT_PROFILE_NAME)
            .or(if unique.is_empty() { None } else { Some(0) });

        Self {
            profiles: unique,
            active,
        }
    }

    /// The built-in profiles
    pub fn builtin() -> Self {
        Self::from_profiles(builtin_profiles())
    }

    pub fn default_profile_name(&self) -> &'static str {
        DEFAULT_PROFILE_NAME
    }

    pub fn list_profiles(&self) -> &[Profile] {
        &self.profiles
    }

    /// Case-insensitive lookup by name
    pub fn get(&self, name: &str) -> Result<&Profile> {
        self.profiles
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name.trim()))
            .ok_or_else(|| CodeShareError::NotFound(format!("profile '{}'", name)))
    }

    pub fn get_active(&self) -> Result<&Profile> {
        self.active
            .and_then(|idx| self.profiles.get(idx))
            .ok_or(CodeShareError::NoActiveProfile)
    }

    /// Make `name` active; returns false and leaves the active profile unchanged if unknown
    pub fn set_active(&mut self, name: &str) -> bool {
        match self
            .profiles
            .iter()
            .position(|p| p.name.eq_ignore_ascii_case(name.trim()))
        {
            Some(idx) => {
                self.active = Some(idx);
                true
            }
            None => false,
        }
    }

    /// Resolve an explicit profile name, or fall back to the active one
    pub fn resolve(&self, name: Option<&str>) -> Result<&Profile> {
        match name {
            Some(name) => self.get(name),
            None => self.get_active(),
        }
    }

    /// Load a catalog from a JSON file.
    ///
    /// A missing or blank file yields the built-in catalog; entries that fail
    /// validation are skipped. Malformed JSON is an error.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!(
                "Profile file {} not found, using built-in profiles",
                path.display()
            );
            return Ok(Self::builtin());
        }

        let json = fs::read_to_string(path)?;
        if json.trim().is_empty() {
            warn!("Profile file {} is empty, using built-in profiles", path.display());
            return Ok(Self::builtin());
        }

        let entries: Vec<ProfileData> = serde_json::from_str(&json)?;
        let profiles: Vec<Profile> = entries
            .into_iter()
            .filter_map(|data| {
                let name = data.name.clone();
                match Profile::try_from(data) {
                    Ok(profile) => Some(profile),
                    Err(e) => {
                        warn!("Skipping profile '{}' from {}: {}", name, path.display(), e);
                        None
                    }
                }
            })
            .collect();

        if profiles.is_empty() {
            warn!(
                "Profile file {} has no usable profiles, using built-in profiles",
                path.display()
            );
            return Ok(Self::builtin());
        }

        debug!("Loaded {} profiles from {}", profiles.len(), path.display());
        Ok(Self::from_profiles(profiles))
    }

    /// Write the catalog as pretty-printed JSON
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if self.profiles.is_empty() {
            bail!(Validation, "refusing to save an empty profile catalog");
        }
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let data: Vec<ProfileData> = self.profiles.iter().map(Profile::to_data).collect();
        let json = serde_json::to_string_pretty(&data)?;
        fs::write(path, json)?;
        debug!("Saved {} profiles to {}", data.len(), path.display());
        Ok(())
    }
}

impl Default for ProfileCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Shared reference to the current catalog snapshot.
///
/// Readers get an `Arc` to an immutable catalog; reloads replace the whole
/// snapshot, so a discovery running on the old one is never torn.
#[derive(Debug, Clone)]
pub struct CatalogHandle {
    current: Arc<RwLock<Arc<ProfileCatalog>>>,
}

impl CatalogHandle {
    pub fn new(catalog: ProfileCatalog) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(catalog))),
        }
    }

    pub fn snapshot(&self) -> Arc<ProfileCatalog> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Swap in a new catalog, returning the previous snapshot
    pub fn replace(&self, catalog: ProfileCatalog) -> Arc<ProfileCatalog> {
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        std::mem::replace(&mut *guard, Arc::new(catalog))
    }

    /// Reload from a JSON file; the current snapshot is kept if loading fails
    pub fn reload_from_file(&self, path: &Path) -> Result<()> {
        let catalog = ProfileCatalog::load_from_file(path)?;
        self.replace(catalog);
        Ok(())
    }
}

fn builtin_profiles() -> Vec<Profile> {
    let specs: [(&str, &[&str], &[&str], &[&str]); 3] = [
        (
            DEFAULT_PROFILE_NAME,
            &[
                "*.cs", "*.xaml", "*.csproj", "*.sln", "*.json", "*.xml", "*.config", "*.md",
                "*.razor", "*.css", "*.js", "*.html", "*.htm", "*.props", "*.targets",
                "*.ruleset", ".dockerignore", "Dockerfile", ".editorconfig", "*.sh", "*.ps1",
                "*.cmd", "*.bat",
            ],
            &[
                ".user", ".suo", ".log", ".tmp", ".pdb", ".bak", ".dll", ".exe", ".nupkg",
                ".snupkg",
            ],
            &["launchSettings.json", "package-lock.json", "yarn.lock", ".gitignore"],
        ),
        (
            "Python",
            &[
                "*.py", "*.pyw", "*.ipynb", "*.json", "*.xml", "*.yaml", "*.yml", "*.toml",
                "*.md", "*.rst", "requirements.txt", "setup.py", "pyproject.toml",
                ".dockerignore", "Dockerfile", ".editorconfig", "*.sh", "*.bat",
            ],
            &[
                ".log", ".tmp", ".bak", ".pyc", ".pyd", ".so", ".egg", ".whl", ".coverage",
            ],
            &["__pycache__", ".env", "pipfile.lock", "poetry.lock", ".gitignore"],
        ),
        (
            "Generic Text",
            &[
                "*.txt", "*.md", "*.json", "*.xml", "*.yaml", "*.yml", "*.toml", "*.csv",
                "*.tsv", "*.sh", "*.ps1", "*.cmd", "*.bat", "*.html", "*.htm", "*.css", "*.js",
                "*.config", "*.ini", ".editorconfig", "Dockerfile", ".dockerignore",
            ],
            &[".log", ".tmp", ".bak"],
            &[".gitignore"],
        ),
    ];

    specs
        .iter()
        .filter_map(|(name, patterns, exts, names)| {
            Profile::new(name, patterns.iter(), exts.iter(), names.iter()).ok()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn python() -> Profile {
        Profile::new("Python", ["*.py"], ["pyc", ".LOG"], ["Poetry.lock"]).unwrap()
    }

    #[test]
    fn test_extensions_get_leading_dot_and_lowercase() {
        let profile = python();
        let exts: Vec<&str> = profile.blacklisted_extensions().collect();
        assert_eq!(exts, vec![".log", ".pyc"]);
        assert!(profile.is_blacklisted_extension("cache.PYC"));
        assert!(profile.is_blacklisted_extension("debug.log"));
        assert!(!profile.is_blacklisted_extension("main.py"));
        assert!(!profile.is_blacklisted_extension("Makefile"));
    }

    #[test]
    fn test_file_names_case_insensitive() {
        let profile = python();
        assert!(profile.is_blacklisted_file_name("poetry.LOCK"));
        assert!(!profile.is_blacklisted_file_name("poetry.toml"));
    }

    #[test]
    fn test_profile_requires_name_and_pattern() {
        let no_patterns: [&str; 0] = [];
        assert!(matches!(
            Profile::new("Empty", no_patterns, no_patterns, no_patterns),
            Err(CodeShareError::InvalidProfile(_))
        ));
        assert!(matches!(
            Profile::new("  ", ["*.rs"], no_patterns, no_patterns),
            Err(CodeShareError::InvalidProfile(_))
        ));
    }

    #[test]
    fn test_duplicate_patterns_collapse_in_order() {
        let none: [&str; 0] = [];
        let profile = Profile::new("Rust", ["*.rs", "*.toml", "*.rs"], none, none).unwrap();
        assert_eq!(profile.search_patterns(), &["*.rs", "*.toml"]);
    }

    #[test]
    fn test_builtin_catalog_default_active() {
        let catalog = ProfileCatalog::builtin();
        assert_eq!(catalog.list_profiles().len(), 3);
        assert_eq!(catalog.get_active().unwrap().name(), DEFAULT_PROFILE_NAME);
        assert!(catalog
            .get(".net default")
            .unwrap()
            .is_blacklisted_extension("app.user"));
    }

    #[test]
    fn test_set_active_unknown_leaves_active_unchanged() {
        let mut catalog = ProfileCatalog::builtin();
        assert!(catalog.set_active("python"));
        assert_eq!(catalog.get_active().unwrap().name(), "Python");
        assert!(!catalog.set_active("Cobol"));
        assert_eq!(catalog.get_active().unwrap().name(), "Python");
    }

    #[test]
    fn test_empty_catalog_has_no_active_profile() {
        let catalog = ProfileCatalog::from_profiles(vec![]);
        assert!(matches!(
            catalog.get_active(),
            Err(CodeShareError::NoActiveProfile)
        ));
        assert!(matches!(
            catalog.get("Python"),
            Err(CodeShareError::NotFound(_))
        ));
    }

    #[test]
    fn test_save_and_load_catalog() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config").join("profiles.json");

        let catalog = ProfileCatalog::from_profiles(vec![python()]);
        catalog.save_to_file(&path).unwrap();

        let json = fs::read_to_string(&path).unwrap();
        assert!(json.contains("\"searchPatterns\""));
        assert!(json.contains("\"blacklistedExtensions\""));

        let loaded = ProfileCatalog::load_from_file(&path).unwrap();
        assert_eq!(loaded.list_profiles(), &[python()]);
        assert_eq!(loaded.get_active().unwrap().name(), "Python");
    }

    #[test]
    fn test_load_skips_invalid_entries() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("profiles.json");
        fs::write(
            &path,
            r#"[
                {"name": "NoPatterns", "searchPatterns": []},
                {"name": "Rust", "searchPatterns": ["*.rs"], "blacklistedExtensions": ["bk"]}
            ]"#,
        )
        .unwrap();

        let catalog = ProfileCatalog::load_from_file(&path).unwrap();
        assert_eq!(catalog.list_profiles().len(), 1);
        assert!(catalog.get("rust").unwrap().is_blacklisted_extension("x.bk"));
    }

    #[test]
    fn test_load_missing_or_blank_file_uses_builtin() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        assert_eq!(ProfileCatalog::load_from_file(&missing).unwrap().list_profiles().len(), 3);

        let blank = dir.path().join("blank.json");
        fs::write(&blank, "  \n").unwrap();
        assert_eq!(ProfileCatalog::load_from_file(&blank).unwrap().list_profiles().len(), 3);
    }

    #[test]
    fn test_load_malformed_json_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "[{").unwrap();
        assert!(matches!(
            ProfileCatalog::load_from_file(&path),
            Err(CodeShareError::Json(_))
        ));
    }

    #[test]
    fn test_catalog_handle_swaps_snapshot() {
        let handle = CatalogHandle::new(ProfileCatalog::builtin());
        let before = handle.snapshot();

        handle.replace(ProfileCatalog::from_profiles(vec![python()]));

        assert_eq!(before.list_profiles().len(), 3);
        assert_eq!(handle.snapshot().list_profiles().len(), 1);
    }
}
