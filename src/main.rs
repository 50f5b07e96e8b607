use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use qmd_lint::{
    convert_file, gather_documents, is_broken_pipe, lint_documents, print_document_report,
    print_json, print_lint_statistics, report_error, LintOptions, LintSummary, QmdLintConfig,
};
use std::path::PathBuf;
use std::process::exit;

/// Lint Python code in Quarto (.qmd) documents
#[derive(Parser)]
#[command(name = "qmd-lint", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert a .qmd document to a .py file with the same line numbers
    Convert {
        /// Input .qmd file
        input: PathBuf,

        /// Output .py file (defaults to the input path with a .py extension)
        output: Option<PathBuf>,

        /// Print progress and check line alignment against the [verify] markers
        #[arg(short, long)]
        verbose: bool,

        /// Configuration file (defaults to ./qmd-lint.toml if present)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Convert .qmd documents and run the linter on them
    Lint {
        /// One or more .qmd files or directories to lint
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,

        /// Keep the converted .py files after linting
        #[arg(short, long)]
        keep_temp: bool,

        /// Configuration file (defaults to ./qmd-lint.toml if present)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Number of documents linted at once (defaults to the number of CPUs)
        #[arg(short, long)]
        jobs: Option<usize>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

impl Command {
    fn verbose(&self) -> bool {
        match self {
            Command::Convert { verbose, .. } | Command::Lint { verbose, .. } => *verbose,
        }
    }
}

pub fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.command.verbose() { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    match run(cli.command) {
        Ok(code) => exit(code),
        Err(e) => {
            report_error(&format!("{:#}", e));
            exit(1);
        }
    }
}

fn run(command: Command) -> Result<i32> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?;

    match command {
        Command::Convert {
            input,
            output,
            verbose,
            config,
        } => {
            let config = QmdLintConfig::load(config.as_deref())?;
            let summary =
                runtime.block_on(convert_file(&input, output.as_deref(), &config, verbose))?;

            log::info!(
                "Conversion of {} completed ({} lines)",
                summary.document.display(),
                summary.line_count
            );
            Ok(0)
        }
        Command::Lint {
            paths,
            verbose,
            keep_temp,
            config,
            format,
            jobs,
        } => {
            let config = QmdLintConfig::load(config.as_deref())?;
            let documents = gather_documents(&paths)?;
            if documents.is_empty() {
                anyhow::bail!("No .qmd files found.");
            }

            let options = LintOptions {
                keep_temp,
                verbose,
                jobs: jobs.unwrap_or_else(num_cpus::get),
            };
            let summary = runtime.block_on(lint_documents(&documents, &config, &options));

            match print_summary(&summary, format, verbose) {
                // Reader went away, e.g. piped into `head`
                Err(e) if is_broken_pipe(&e) => {}
                result => result?,
            }

            Ok(summary.exit_code())
        }
    }
}

fn print_summary(summary: &LintSummary, format: OutputFormat, verbose: bool) -> Result<()> {
    match format {
        OutputFormat::Text => {
            for report in &summary.reports {
                print_document_report(report)?;
            }
            if verbose || !summary.success() {
                print_lint_statistics(summary);
            }
        }
        OutputFormat::Json => print_json(summary)?,
    }
    Ok(())
}
