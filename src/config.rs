/*!
 * Configuration handling for codeshare
 */

use std::env;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use tracing::{debug, warn};

use crate::ensure;
use crate::error::Result;
use crate::profile::ProfileCatalog;
use crate::utils::DEFAULT_EXCLUDED_FOLDERS;

/// Environment variable naming the profile catalog file
pub const PROFILES_ENV: &str = "CODESHARE_PROFILES";

/// Default export file name
pub const DEFAULT_OUTPUT_FILE: &str = ".codeshare.export.txt";

/// Command-line arguments for codeshare
#[derive(Parser, Debug, Clone)]
#[clap(
    name = "codeshare",
    version = env!("CARGO_PKG_VERSION"),
    about = "Pack project files into one marker-delimited text and unpack it again",
    long_about = "Concatenates the files a profile selects into a single text document with start/end markers, for pasting into an LLM chat, and writes the files back from such a document safely inside a project directory."
)]
pub struct Args {
    #[clap(subcommand)]
    pub command: Option<Command>,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[clap(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[clap(short, long, global = true)]
    pub quiet: bool,

    /// Profile catalog JSON file
    #[clap(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Generate shell completions
    #[clap(long = "generate", value_enum)]
    pub generate: Option<Shell>,
}

/// Selection options shared by discover and export
#[derive(clap::Args, Debug, Clone)]
pub struct SelectionArgs {
    /// Profile name (case-insensitive); defaults to the active profile
    #[clap(long, short)]
    pub profile: Option<String>,

    /// Comma-separated folder names to skip instead of the defaults
    #[clap(long, value_delimiter = ',')]
    pub exclude_folders: Vec<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List the available profiles
    Profiles,

    /// List the files a profile selects
    Discover {
        /// Project directory
        #[clap(default_value = ".")]
        directory: PathBuf,

        #[clap(flatten)]
        selection: SelectionArgs,
    },

    /// Write the selected files into one export document
    Export {
        /// Project directory
        #[clap(default_value = ".")]
        directory: PathBuf,

        /// Output file name
        #[clap(default_value = DEFAULT_OUTPUT_FILE)]
        output: PathBuf,

        #[clap(flatten)]
        selection: SelectionArgs,

        /// Print the document to stdout instead of writing a file
        #[clap(long)]
        stdout: bool,

        /// Number of threads to use for discovery
        #[clap(long, default_value = "4")]
        threads: usize,
    },

    /// Recreate files from an export document
    Import {
        /// Export document to read
        input: PathBuf,

        /// Project directory to write into
        #[clap(default_value = ".")]
        directory: PathBuf,

        /// Copy the project directory next to itself first
        #[clap(long)]
        backup: bool,

        /// Report what would be written without writing
        #[clap(long)]
        dry_run: bool,
    },

    /// Write the built-in profiles to the catalog file
    InitConfig {
        /// Overwrite an existing file
        #[clap(long)]
        force: bool,
    },
}

/// Where the export document goes
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExportTarget {
    File(PathBuf),
    Stdout,
}

/// Resolved operation
#[derive(Clone, Debug)]
pub enum Operation {
    Profiles,
    Discover {
        project_dir: PathBuf,
        profile: Option<String>,
    },
    Export {
        project_dir: PathBuf,
        target: ExportTarget,
        profile: Option<String>,
    },
    Import {
        project_dir: PathBuf,
        input: PathBuf,
        backup: bool,
        dry_run: bool,
    },
    InitConfig {
        force: bool,
    },
}

/// Application configuration
#[derive(Clone, Debug)]
pub struct Config {
    /// What to do
    pub operation: Operation,

    /// Profile catalog file, if one applies
    pub profiles_file: Option<PathBuf>,

    /// Folder names skipped during discovery and backup
    pub excluded_folders: Vec<String>,

    /// Number of threads to use for discovery
    pub num_threads: usize,

    pub verbose: u8,
    pub quiet: bool,
}

impl Config {
    /// Create configuration from command-line arguments. Returns None when
    /// no subcommand was given.
    pub fn from_args(args: Args) -> Option<Self> {
        let profiles_file = resolve_profiles_file(
            args.config,
            env::var_os(PROFILES_ENV).map(PathBuf::from),
            dirs::config_dir(),
        );
        let mut excluded_folders: Vec<String> =
            DEFAULT_EXCLUDED_FOLDERS.iter().cloned().collect();
        let mut num_threads = 4;

        let operation = match args.command? {
            Command::Profiles => Operation::Profiles,
            Command::Discover {
                directory,
                selection,
            } => {
                apply_exclusions(&mut excluded_folders, selection.exclude_folders);
                Operation::Discover {
                    project_dir: directory,
                    profile: selection.profile,
                }
            }
            Command::Export {
                directory,
                output,
                selection,
                stdout,
                threads,
            } => {
                apply_exclusions(&mut excluded_folders, selection.exclude_folders);
                num_threads = threads;
                Operation::Export {
                    project_dir: directory,
                    target: if stdout {
                        ExportTarget::Stdout
                    } else {
                        ExportTarget::File(output)
                    },
                    profile: selection.profile,
                }
            }
            Command::Import {
                input,
                directory,
                backup,
                dry_run,
            } => Operation::Import {
                project_dir: directory,
                input,
                backup,
                dry_run,
            },
            Command::InitConfig { force } => Operation::InitConfig { force },
        };

        Some(Self {
            operation,
            profiles_file,
            excluded_folders,
            num_threads,
            verbose: args.verbose,
            quiet: args.quiet,
        })
    }

    /// Check arguments before any I/O
    pub fn validate(&self) -> Result<()> {
        match &self.operation {
            Operation::Profiles => {}
            Operation::Discover { project_dir, .. } => check_project_dir(project_dir)?,
            Operation::Export {
                project_dir,
                target,
                ..
            } => {
                check_project_dir(project_dir)?;
                ensure!(self.num_threads > 0, Validation, "--threads must be at least 1");
                if let ExportTarget::File(path) = target {
                    ensure!(
                        !path.is_dir(),
                        Validation,
                        "output '{}' is a directory",
                        path.display()
                    );
                }
            }
            Operation::Import {
                project_dir, input, ..
            } => {
                check_project_dir(project_dir)?;
                ensure!(
                    input.is_file(),
                    Validation,
                    "import file not found: {}",
                    input.display()
                );
            }
            Operation::InitConfig { .. } => {
                ensure!(
                    self.profiles_file.is_some(),
                    Validation,
                    "no profile file location; pass --config FILE"
                );
            }
        }
        Ok(())
    }

    /// Load the profile catalog, falling back to the built-in one when the
    /// file is unusable
    pub fn load_catalog(&self) -> ProfileCatalog {
        let Some(path) = &self.profiles_file else {
            return ProfileCatalog::builtin();
        };
        match ProfileCatalog::load_from_file(path) {
            Ok(catalog) => catalog,
            Err(e) => {
                warn!(
                    "Could not load profiles from {}: {}; using built-in profiles",
                    path.display(),
                    e
                );
                ProfileCatalog::builtin()
            }
        }
    }
}

fn apply_exclusions(excluded: &mut Vec<String>, requested: Vec<String>) {
    let requested: Vec<String> = requested
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if !requested.is_empty() {
        *excluded = requested;
    }
}

fn check_project_dir(dir: &Path) -> Result<()> {
    ensure!(
        dir.is_dir(),
        Validation,
        "project directory not found: {}",
        dir.display()
    );
    Ok(())
}

/// Pick the catalog file: explicit flag, then environment, then the user
/// config directory
pub fn resolve_profiles_file(
    flag: Option<PathBuf>,
    from_env: Option<PathBuf>,
    config_dir: Option<PathBuf>,
) -> Option<PathBuf> {
    let chosen = flag
        .or_else(|| from_env.filter(|p| !p.as_os_str().is_empty()))
        .or_else(|| config_dir.map(|d| d.join("codeshare").join("profiles.json")));
    if let Some(path) = &chosen {
        debug!("Profile catalog file: {}", path.display());
    }
    chosen
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn parse(argv: &[&str]) -> Config {
        let args = Args::try_parse_from(argv).unwrap();
        Config::from_args(args).unwrap()
    }

    #[test]
    fn test_no_subcommand() {
        let args = Args::try_parse_from(["codeshare"]).unwrap();
        assert!(Config::from_args(args).is_none());
    }

    #[test]
    fn test_export_defaults() {
        let config = parse(&["codeshare", "export"]);
        match config.operation {
            Operation::Export {
                project_dir,
                target,
                profile,
            } => {
                assert_eq!(project_dir, PathBuf::from("."));
                assert_eq!(target, ExportTarget::File(PathBuf::from(DEFAULT_OUTPUT_FILE)));
                assert!(profile.is_none());
            }
            other => panic!("unexpected operation {:?}", other),
        }
        assert_eq!(config.num_threads, 4);
        assert_eq!(config.excluded_folders.len(), DEFAULT_EXCLUDED_FOLDERS.len());
    }

    #[test]
    fn test_export_options() {
        let config = parse(&[
            "codeshare",
            "-vv",
            "export",
            "proj",
            "--profile",
            "python",
            "--exclude-folders",
            "target, dist",
            "--stdout",
            "--threads",
            "2",
        ]);
        assert_eq!(config.verbose, 2);
        assert_eq!(config.num_threads, 2);
        assert_eq!(config.excluded_folders, vec!["target", "dist"]);
        assert!(matches!(
            config.operation,
            Operation::Export {
                target: ExportTarget::Stdout,
                ..
            }
        ));
    }

    #[test]
    fn test_import_arguments() {
        let config = parse(&["codeshare", "import", "dump.txt", "proj", "--backup", "--dry-run"]);
        match config.operation {
            Operation::Import {
                project_dir,
                input,
                backup,
                dry_run,
            } => {
                assert_eq!(project_dir, PathBuf::from("proj"));
                assert_eq!(input, PathBuf::from("dump.txt"));
                assert!(backup);
                assert!(dry_run);
            }
            other => panic!("unexpected operation {:?}", other),
        }
    }

    #[test]
    fn test_validate_reports_missing_paths() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing");
        let missing = missing.to_str().unwrap();

        assert!(parse(&["codeshare", "export", missing]).validate().is_err());
        assert!(parse(&["codeshare", "discover", missing]).validate().is_err());

        let project = dir.path().to_str().unwrap();
        assert!(parse(&["codeshare", "import", missing, project])
            .validate()
            .is_err());
        assert!(parse(&["codeshare", "discover", project]).validate().is_ok());
    }

    #[test]
    fn test_profiles_file_resolution_order() {
        let flag = Some(PathBuf::from("flag.json"));
        let env = Some(PathBuf::from("env.json"));
        let cfg = Some(PathBuf::from("/home/u/.config"));

        assert_eq!(
            resolve_profiles_file(flag, env.clone(), cfg.clone()),
            Some(PathBuf::from("flag.json"))
        );
        assert_eq!(
            resolve_profiles_file(None, env, cfg.clone()),
            Some(PathBuf::from("env.json"))
        );
        assert_eq!(
            resolve_profiles_file(None, None, cfg),
            Some(PathBuf::from("/home/u/.config/codeshare/profiles.json"))
        );
        assert_eq!(resolve_profiles_file(None, None, None), None);
    }

    #[test]
    fn test_load_catalog_falls_back_on_bad_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("profiles.json");
        fs::write(&path, "{ not json").unwrap();

        let mut config = parse(&["codeshare", "profiles"]);
        config.profiles_file = Some(path);
        let catalog = config.load_catalog();
        assert_eq!(catalog.get_active().unwrap().name(), ".NET Default");
    }
}
