use covmut::coverage;
use covmut::logging;
use covmut::output;
use covmut::proposer::{self, OpenAiClient};
use covmut::report;
use covmut::runner::TestCommand;
use covmut::session::Session;

use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

use clap::Parser;

#[derive(Parser)]
#[command(
    name = "covmut",
    version,
    about = "LLM-driven mutation testing over JaCoCo coverage"
)]
struct Cli {
    /// Java project root (containing pom.xml)
    #[arg(long)]
    project_dir: PathBuf,
    /// JaCoCo XML report (e.g. target/site/jacoco/jacoco.xml)
    #[arg(long, alias = "coverage-report")]
    jacoco_path: PathBuf,
    /// API key for the generation service
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: String,
    /// Build tool used to run the tests
    #[arg(long, default_value = "mvn")]
    maven_path: String,
    /// Arguments passed to the build tool
    #[arg(long, default_value = "test")]
    test_command: String,
    /// Chat model that proposes mutations
    #[arg(long, env = "COVMUT_MODEL", default_value = proposer::DEFAULT_MODEL)]
    model: String,
    /// Base URL of an OpenAI-compatible API
    #[arg(long, env = "OPENAI_BASE_URL", default_value = proposer::DEFAULT_API_BASE)]
    api_base: String,
    /// Kill a test run after this many seconds (default: no limit)
    #[arg(long)]
    timeout_secs: Option<u64>,
    /// Where the log and summary files are written
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,
    /// Print the summary as JSON instead of human-readable text
    #[arg(long)]
    json: bool,
    /// No progress output
    #[arg(short, long)]
    quiet: bool,
    /// Debug-level diagnostics
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose, cli.quiet);
    process::exit(cmd_run(cli));
}

fn absolute(cwd: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

fn cmd_run(cli: Cli) -> i32 {
    let cwd = match std::env::current_dir() {
        Ok(cwd) => cwd,
        Err(e) => {
            output::print_error(&format!("Failed to get current directory: {}", e));
            return 3;
        }
    };
    let project_dir = absolute(&cwd, &cli.project_dir);
    let report_path = absolute(&cwd, &cli.jacoco_path);
    let output_dir = absolute(&cwd, &cli.output_dir);

    if !project_dir.is_dir() {
        output::print_error(&format!(
            "Project directory not found: {}. Pass --project-dir <path> to the project root.",
            project_dir.display()
        ));
        return 2;
    }

    let coverage = match coverage::read_report(&report_path, &project_dir) {
        Ok(c) => c,
        Err(e) => {
            output::print_error(&e.to_string());
            return 2;
        }
    };

    let client = match OpenAiClient::new(&cli.api_key, &cli.model, &cli.api_base) {
        Ok(c) => c,
        Err(e) => {
            output::print_error(&format!("Failed to set up the generation client: {}", e));
            return 3;
        }
    };

    let test_cmd = TestCommand::new(&cli.maven_path, &cli.test_command)
        .with_timeout(cli.timeout_secs.map(Duration::from_secs))
        .resolve(&project_dir, &cwd);

    let progress = !cli.quiet && !cli.json;
    let mut session = Session::new(&client, &test_cmd).with_progress(progress);
    let run = session.run(&coverage);

    let (log, summary) = session.render(chrono::Local::now());
    let written = report::write_outputs(&output_dir, &log, &summary);

    if let Err(failure) = run {
        output::print_restore_failure(&failure.to_string(), &failure.backup);
        if let Err(e) = written {
            output::print_error(&format!("Failed to write reports: {}", e));
        }
        return 3;
    }

    let (log_path, summary_path) = match written {
        Ok(paths) => paths,
        Err(e) => {
            output::print_error(&format!(
                "Failed to write reports to {}: {}",
                output_dir.display(),
                e
            ));
            return 3;
        }
    };

    if cli.json {
        match serde_json::to_string(&session.report().summary()) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                output::print_error(&format!("Failed to encode summary: {}", e));
                return 3;
            }
        }
    } else if !cli.quiet {
        println!("{}", summary);
        output::print_run_result(session.report(), &log_path, &summary_path);
    }

    0
}
