/*!
 * Contained file writes for import
 *
 * Every target is resolved against the canonical project root and must stay
 * strictly inside it, including through symlinked directories that already
 * exist on disk.
 */

use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, trace};

use crate::error::{CodeShareError, Result};
use crate::types::FileBlock;
use crate::utils::is_strict_descendant;
use crate::{bail, ensure};

/// Writes files below a fixed base directory
#[derive(Debug, Clone)]
pub struct SafeWriter {
    /// Canonical base directory
    base: PathBuf,
    /// Resolve and check only, never touch the disk
    dry_run: bool,
}

impl SafeWriter {
    /// Create a writer for an existing base directory
    pub fn new(base_dir: &Path) -> Result<Self> {
        ensure!(
            base_dir.is_dir(),
            Validation,
            "project directory '{}' does not exist",
            base_dir.display()
        );
        Ok(Self {
            base: fs::canonicalize(base_dir)?,
            dry_run: false,
        })
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Resolve `relative` to an absolute target inside the base directory
    pub fn resolve(&self, relative: &Path) -> Result<PathBuf> {
        let mut cleaned = PathBuf::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => cleaned.push(part),
                Component::CurDir => {}
                Component::ParentDir => {
                    bail!(PathSafety, "'{}' contains a '..' segment", relative.display())
                }
                Component::RootDir | Component::Prefix(_) => {
                    bail!(PathSafety, "'{}' is not a relative path", relative.display())
                }
            }
        }
        ensure!(
            !cleaned.as_os_str().is_empty(),
            PathSafety,
            "'{}' does not name a file",
            relative.display()
        );

        let target = self.base.join(&cleaned);
        self.ensure_contained(&target, relative)?;

        // Existing parts of the path may be symlinks; check where they really lead
        if let Some(existing) = target.ancestors().find(|p| p.symlink_metadata().is_ok()) {
            let resolved = fs::canonicalize(existing)?;
            let inside = if existing == target {
                is_strict_descendant(&resolved, &self.base)
            } else {
                resolved == self.base || is_strict_descendant(&resolved, &self.base)
            };
            if !inside {
                bail!(
                    PathSafety,
                    "'{}' resolves to '{}', outside '{}'",
                    relative.display(),
                    resolved.display(),
                    self.base.display()
                );
            }
        }

        Ok(target)
    }

    fn ensure_contained(&self, target: &Path, relative: &Path) -> Result<()> {
        if is_strict_descendant(target, &self.base) {
            Ok(())
        } else {
            Err(CodeShareError::PathSafety(format!(
                "target for '{}' is outside '{}'",
                relative.display(),
                self.base.display()
            )))
        }
    }

    /// Write `content` as UTF-8 (no BOM) to `relative`, creating parent
    /// directories and overwriting any existing file.
    pub fn write(&self, relative: &Path, content: &str) -> Result<PathBuf> {
        let target = self.resolve(relative)?;
        if self.dry_run {
            trace!("Dry run: would write {}", target.display());
            return Ok(target);
        }

        if let Some(parent) = target.parent() {
            if !parent.exists() {
                debug!("Creating directory: {}", parent.display());
                fs::create_dir_all(parent)?;
            }
            let resolved_parent = fs::canonicalize(parent)?;
            ensure!(
                resolved_parent == self.base || is_strict_descendant(&resolved_parent, &self.base),
                PathSafety,
                "directory for '{}' resolved outside '{}'",
                relative.display(),
                self.base.display()
            );
        }

        debug!("Writing file: {}", target.display());
        fs::write(&target, content.as_bytes())?;
        Ok(target)
    }

    /// Write a parsed block
    pub fn write_block(&self, block: &FileBlock) -> Result<PathBuf> {
        self.write(&block.host_path(), &block.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_write_creates_directories() {
        let dir = tempdir().unwrap();
        let writer = SafeWriter::new(dir.path()).unwrap();

        let path = writer
            .write(Path::new("src/nested/a.py"), "print(1)")
            .unwrap();
        assert!(path.ends_with("src/nested/a.py"));
        assert_eq!(fs::read_to_string(path).unwrap(), "print(1)");
    }

    #[test]
    fn test_write_overwrites() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "old content that is longer").unwrap();

        let writer = SafeWriter::new(dir.path()).unwrap();
        writer.write(Path::new("a.txt"), "new").unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("a.txt")).unwrap(), "new");
    }

    #[test]
    fn test_rejects_traversal_and_roots() {
        let dir = tempdir().unwrap();
        let writer = SafeWriter::new(dir.path()).unwrap();

        for bad in ["../escape.txt", "a/../../escape.txt", "/etc/passwd", ".", ""] {
            let result = writer.write(Path::new(bad), "x");
            assert!(
                matches!(result, Err(CodeShareError::PathSafety(_))),
                "{} should be rejected",
                bad
            );
        }
        assert!(!dir.path().parent().unwrap().join("escape.txt").exists());
    }

    #[test]
    fn test_sibling_with_common_prefix_is_outside() {
        let parent = tempdir().unwrap();
        let base = parent.path().join("proj");
        fs::create_dir(&base).unwrap();
        let writer = SafeWriter::new(&base).unwrap();

        // A path that would land in /.../proj2 must never pass the check
        let sibling = fs::canonicalize(parent.path()).unwrap().join("proj2").join("a.txt");
        assert!(writer.ensure_contained(&sibling, Path::new("a.txt")).is_err());
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let dir = tempdir().unwrap();
        let writer = SafeWriter::new(dir.path()).unwrap().dry_run(true);
        let target = writer.write(Path::new("x/y.txt"), "y").unwrap();
        assert!(!target.exists());
        assert!(!dir.path().join("x").exists());
    }

    #[test]
    fn test_missing_base_is_validation_error() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            SafeWriter::new(&dir.path().join("missing")),
            Err(CodeShareError::Validation(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_directory_escape_rejected() {
        let outside = tempdir().unwrap();
        let dir = tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();

        let writer = SafeWriter::new(dir.path()).unwrap();
        let result = writer.write(Path::new("link/evil.txt"), "x");
        assert!(matches!(result, Err(CodeShareError::PathSafety(_))));
        assert!(!outside.path().join("evil.txt").exists());
    }
}
