use clap::{Parser, Subcommand};
use std::error::Error;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use snapdriver::compare::{CompareReport, accept, compare_test};
use snapdriver::config::{DEFAULT_FIXTURES_DIR, DEFAULT_TESTS_DIR};
use snapdriver::driver::{Driver, DriverOptions};
use snapdriver::harness::{load_script, run_script};
use snapdriver::ProcessConfig;

/// snapdriver - replay input scripts against an application and record snapshots
#[derive(Parser, Debug)]
#[command(
    name = "snapdriver",
    about = "Snapshot-driven interaction testing for reactive applications",
    after_help = "ENVIRONMENT VARIABLES:\n\
        SNAPDRIVER_TESTS_DIR         Root directory for snapshot artifacts\n\
        SNAPDRIVER_FIXTURES_DIR      Directory holding upload fixtures\n\
        SNAPDRIVER_TIMEOUT_MS        Response-cycle wait for inputs (ms)\n\
        SNAPDRIVER_LOAD_TIMEOUT_MS   Wait for the application to start (ms)\n\
        SNAPDRIVER_SCREENSHOT        Default screenshot policy\n\
        SNAPDRIVER_SEED              Random seed for the application\n\
        RUST_LOG                     Log filter (e.g. snapdriver=debug)"
)]
struct Args {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a script against an application binary
    Run {
        /// Path to the application binary
        #[arg(short, long)]
        app: PathBuf,

        /// Path to the JSON test script
        #[arg(short, long)]
        script: PathBuf,

        /// Random seed; overrides the one in the script
        #[arg(long, env = "SNAPDRIVER_SEED")]
        seed: Option<u64>,

        /// Root directory for snapshot artifacts
        #[arg(long, env = "SNAPDRIVER_TESTS_DIR", default_value = DEFAULT_TESTS_DIR)]
        tests_dir: PathBuf,

        /// Directory holding upload fixtures
        #[arg(long, env = "SNAPDRIVER_FIXTURES_DIR", default_value = DEFAULT_FIXTURES_DIR)]
        fixtures_dir: PathBuf,

        /// Skip visual captures regardless of the script
        #[arg(long)]
        no_screenshot: bool,

        /// Output results as JSON
        #[arg(long)]
        json: bool,

        /// Compare the run against the accepted snapshots
        #[arg(long)]
        compare: bool,

        /// Arguments to pass to the application
        #[arg(last = true)]
        args: Vec<String>,
    },

    /// Compare the current run of a test against its accepted snapshots
    Compare {
        #[arg(long, env = "SNAPDRIVER_TESTS_DIR", default_value = DEFAULT_TESTS_DIR)]
        tests_dir: PathBuf,

        /// Test name
        #[arg(short, long)]
        name: String,

        /// Output the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Accept the current run of a test as the expected snapshots
    Accept {
        #[arg(long, env = "SNAPDRIVER_TESTS_DIR", default_value = DEFAULT_TESTS_DIR)]
        tests_dir: PathBuf,

        /// Test name
        #[arg(short, long)]
        name: String,
    },
}

fn print_report(report: &CompareReport) {
    if report.is_match() {
        println!("Snapshots match ({} files)", report.unchanged);
        return;
    }
    println!(
        "Snapshots differ: {} changed file(s), {} unchanged",
        report.changes.len(),
        report.unchanged
    );
    for change in &report.changes {
        println!("  {:?}: {}", change.kind, change.file);
    }
}

fn compare_if_accepted(tests_dir: &Path, name: &str) -> Result<Option<CompareReport>, Box<dyn Error>> {
    if !snapdriver::session::expected_dir(tests_dir, name).is_dir() {
        tracing::info!(test = name, "no accepted snapshots to compare against");
        return Ok(None);
    }
    Ok(Some(compare_test(tests_dir, name)?))
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match args.command {
        Some(Commands::Run {
            app,
            script,
            seed,
            tests_dir,
            fixtures_dir,
            no_screenshot,
            json,
            compare,
            args,
        }) => {
            let mut script = load_script(&script)?;
            if no_screenshot {
                script.screenshot = Some(false);
            }
            let seed = seed.or(script.seed);

            let options = DriverOptions::from_config()
                .seed(seed)
                .tests_dir(&tests_dir)
                .fixtures_dir(fixtures_dir);
            let mut driver = Driver::launch_with(ProcessConfig::new(app).args(args), options)?;
            let mut result = run_script(&mut driver, &script);
            driver.close()?;

            if compare && result.success {
                result.comparison = compare_if_accepted(&tests_dir, &script.name)?;
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Run '{}': {} snapshot(s)", result.test_name, result.snapshots.len());
                for snapshot in &result.snapshots {
                    println!("  Step {}: {}", snapshot.step, snapshot.json_path.display());
                }
                for warning in &result.warnings {
                    println!("  Warning: {}", warning);
                }
                if let Some(report) = &result.comparison {
                    print_report(report);
                }
                if let Some(error) = &result.error {
                    eprintln!("Error: {}", error);
                }
            }

            let mismatch = result.comparison.as_ref().is_some_and(|r| !r.is_match());
            if !result.success || mismatch {
                std::process::exit(1);
            }
        }

        Some(Commands::Compare { tests_dir, name, json }) => {
            let report = compare_test(&tests_dir, &name)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
            if !report.is_match() {
                std::process::exit(1);
            }
        }

        Some(Commands::Accept { tests_dir, name }) => {
            let dir = accept(&tests_dir, &name)?;
            println!("Accepted snapshots: {}", dir.display());
        }

        None => {
            println!("snapdriver - snapshot-driven interaction testing");
            println!();
            println!("Usage: snapdriver <COMMAND>");
            println!();
            println!("Commands:");
            println!("  run      Replay a script against an application and record snapshots");
            println!("  compare  Compare the current run with the accepted snapshots");
            println!("  accept   Accept the current run as expected");
            println!();
            println!("Run with --help for more information.");
        }
    }

    Ok(())
}
