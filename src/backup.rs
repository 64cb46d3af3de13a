/*!
 * Pre-import backup of a project directory
 *
 * The backup is a plain copy of the project tree placed next to it, named
 * `<project>_backup_<yyyyMMdd_HHmmss>`. Excluded folders (build output,
 * VCS metadata) are not copied.
 */

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::Result;
use crate::utils::normalize_folder_names;
use crate::{ensure, error};

/// Copy `project_dir` into a fresh sibling directory and return its path
pub fn create_backup<I, S>(project_dir: &Path, excluded_folders: I) -> Result<PathBuf>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    ensure!(
        project_dir.is_dir(),
        Validation,
        "cannot back up '{}': not a directory",
        project_dir.display()
    );
    let source = fs::canonicalize(project_dir)?;
    let parent = source
        .parent()
        .ok_or_else(|| error!(Validation, "cannot back up filesystem root '{}'", source.display()))?;
    let name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "project".to_string());

    let destination = unique_destination(parent, &name);
    let excluded: BTreeSet<String> = normalize_folder_names(excluded_folders);

    info!(
        "Backing up {} to {}",
        source.display(),
        destination.display()
    );
    fs::create_dir(&destination)?;

    match copy_tree(&source, &destination, &excluded) {
        Ok(copied) => {
            info!("Backup complete: {} files copied", copied);
            Ok(destination)
        }
        Err(e) => {
            warn!("Backup failed, removing {}: {}", destination.display(), e);
            if let Err(cleanup) = fs::remove_dir_all(&destination) {
                warn!(
                    "Could not remove incomplete backup {}: {}",
                    destination.display(),
                    cleanup
                );
            }
            Err(e)
        }
    }
}

/// Copy the tree below `source` into `destination`, returning the file count
fn copy_tree(source: &Path, destination: &Path, excluded: &BTreeSet<String>) -> Result<usize> {
    let walker = WalkDir::new(source)
        .follow_links(false)
        .min_depth(1)
        .into_iter()
        .filter_entry(|e| {
            !(e.file_type().is_dir()
                && excluded.contains(&e.file_name().to_string_lossy().to_lowercase()))
        });

    let mut copied = 0usize;
    for entry in walker {
        let entry = entry.map_err(std::io::Error::from)?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| error!(Validation, "unexpected path in backup walk: {}", e))?;
        let target = destination.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() {
            fs::copy(entry.path(), &target)?;
            copied += 1;
        } else {
            debug!("Backup skips non-regular entry {}", entry.path().display());
        }
    }
    Ok(copied)
}

fn unique_destination(parent: &Path, name: &str) -> PathBuf {
    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    let base = format!("{}_backup_{}", name, stamp);
    let mut candidate = parent.join(&base);
    let mut counter = 1;
    while candidate.exists() {
        candidate = parent.join(format!("{}_{}", base, counter));
        counter += 1;
    }
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::DEFAULT_EXCLUDED_FOLDERS;
    use tempfile::tempdir;

    #[test]
    fn test_backup_copies_tree_next_to_project() {
        let parent = tempdir().unwrap();
        let project = parent.path().join("proj");
        fs::create_dir_all(project.join("src")).unwrap();
        fs::create_dir_all(project.join("bin")).unwrap();
        fs::write(project.join("src").join("a.py"), "print(1)").unwrap();
        fs::write(project.join("bin").join("junk.dll"), "junk").unwrap();

        let backup = create_backup(&project, DEFAULT_EXCLUDED_FOLDERS.iter()).unwrap();

        let name = backup.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("proj_backup_"));
        assert_eq!(
            fs::canonicalize(backup.parent().unwrap()).unwrap(),
            fs::canonicalize(parent.path()).unwrap()
        );
        assert_eq!(
            fs::read_to_string(backup.join("src").join("a.py")).unwrap(),
            "print(1)"
        );
        assert!(!backup.join("bin").exists());
    }

    #[test]
    fn test_two_backups_do_not_collide() {
        let parent = tempdir().unwrap();
        let project = parent.path().join("proj");
        fs::create_dir(&project).unwrap();

        let none: [&str; 0] = [];
        let first = create_backup(&project, none).unwrap();
        let second = create_backup(&project, none).unwrap();
        assert_ne!(first, second);
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_backup_leaves_no_partial_copy() {
        use std::os::unix::fs::PermissionsExt;

        let parent = tempdir().unwrap();
        let project = parent.path().join("proj");
        fs::create_dir_all(project.join("src")).unwrap();
        fs::write(project.join("src").join("a.py"), "print(1)").unwrap();
        let locked = project.join("src").join("z_locked.py");
        fs::write(&locked, "secret").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Permission bits do not bind a privileged user
        if fs::read(&locked).is_ok() {
            return;
        }

        let none: [&str; 0] = [];
        let result = create_backup(&project, none);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();

        assert!(result.is_err());
        let leftovers: Vec<String> = fs::read_dir(parent.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with("proj_backup_"))
            .collect();
        assert!(leftovers.is_empty(), "partial backup left behind: {:?}", leftovers);
    }
}
