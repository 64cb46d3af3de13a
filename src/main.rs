/*!
 * Command-line interface for codeshare
 */

use std::fs;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{CommandFactory, Parser};
use clap_complete::generate;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::ThreadPoolBuilder;
use tracing::{error, info, warn};

use codeshare::config::{Args, Config, ExportTarget, Operation};
use codeshare::engine::{Engine, ImportOptions};
use codeshare::error::{CodeShareError, Result};
use codeshare::logging::init_logging;
use codeshare::profile::{CatalogHandle, ProfileCatalog};
use codeshare::report::{ExportReport, ImportReport, ReportFormat, Reporter};

fn main() -> io::Result<()> {
    let args = Args::parse();

    if let Some(shell) = args.generate {
        let mut cmd = Args::command();
        let name = cmd.get_name().to_string();
        generate(shell, &mut cmd, name, &mut io::stdout());
        return Ok(());
    }

    let Some(config) = Config::from_args(args) else {
        Args::command().print_help()?;
        println!();
        return Ok(());
    };

    init_logging(config.verbose, config.quiet);

    run(&config).map_err(|e| {
        error!("{}", e);
        io::Error::from(e)
    })
}

fn run(config: &Config) -> Result<()> {
    config.validate()?;

    if let Err(e) = ThreadPoolBuilder::new()
        .num_threads(config.num_threads)
        .build_global()
    {
        warn!("Failed to set thread pool size: {}", e);
    }

    let catalog = CatalogHandle::new(config.load_catalog());
    let engine =
        Engine::new(catalog.snapshot()).with_excluded_folders(config.excluded_folders.iter());
    let reporter = Reporter::new(ReportFormat::ConsoleTable);

    match &config.operation {
        Operation::Profiles => {
            if let Some(path) = &config.profiles_file {
                info!("Profile catalog file: {}", path.display());
            }
            println!("{}", reporter.profiles_report(&catalog.snapshot()));
        }

        Operation::Discover {
            project_dir,
            profile,
        } => {
            let files = engine.discover(project_dir, profile.as_deref())?;
            if files.is_empty() {
                warn!("No files matched in {}", project_dir.display());
            }
            for file in &files {
                println!("{}", file);
            }
            info!("{} files discovered", files.len());
        }

        Operation::Export {
            project_dir,
            target: ExportTarget::Stdout,
            profile,
        } => {
            let output = engine.export(project_dir, profile.as_deref())?;
            print!("{}", output.text);
            info!(
                "Exported {} files ({} characters), {} skipped",
                output.statistics.files_exported,
                output.total_chars(),
                output.statistics.files_skipped
            );
        }

        Operation::Export {
            project_dir,
            target: ExportTarget::File(path),
            profile,
        } => {
            let progress = export_progress_bar();
            progress.set_message(format!("📂 Scanning directory: {}", project_dir.display()));
            let engine = engine.with_progress(Arc::new(progress.clone()));

            let start_time = Instant::now();
            let result = engine.export_to_file(project_dir, profile.as_deref(), path);
            progress.finish_and_clear();

            match result {
                Ok(stats) => {
                    let mut report =
                        ExportReport::new(path.display().to_string(), start_time.elapsed(), stats);
                    report.output_size = fs::metadata(path).ok().map(|m| m.len());
                    reporter.print_export_report(&report);
                }
                // Nothing to export is a warning, not a failure
                Err(CodeShareError::Validation(msg)) => warn!("{}", msg),
                Err(e) => return Err(e),
            }
        }

        Operation::Import {
            project_dir,
            input,
            backup,
            dry_run,
        } => {
            let options = ImportOptions {
                create_backup: *backup,
                dry_run: *dry_run,
            };
            let start_time = Instant::now();
            let summary = engine.import_file(project_dir, input, options)?;

            let report = ImportReport {
                target: project_dir.display().to_string(),
                duration: start_time.elapsed(),
                dry_run: *dry_run,
                summary,
            };
            reporter.print_import_report(&report);
        }

        Operation::InitConfig { force } => {
            let Some(path) = &config.profiles_file else {
                return Err(CodeShareError::Validation(
                    "no profile file location".to_string(),
                ));
            };
            if path.exists() && !force {
                return Err(CodeShareError::Validation(format!(
                    "{} already exists; pass --force to overwrite",
                    path.display()
                )));
            }
            ProfileCatalog::builtin().save_to_file(path)?;
            println!("Wrote built-in profiles to {}", path.display());
        }
    }

    Ok(())
}

fn export_progress_bar() -> ProgressBar {
    let progress = ProgressBar::new(0);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} {prefix:.bold.cyan} {wide_msg:.dim.white} {pos}/{len} ({percent}%) ⏱️  Elapsed: {elapsed_precise}")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    progress.set_style(style);
    progress.enable_steady_tick(Duration::from_millis(100));
    progress.set_prefix("📊 Exporting");
    progress
}
