use crate::config::{ServiceArgs, Settings};
use crate::engine::{AnalysisEngine, Facades};
use crate::error::AppError;
use crate::logging::{self, LogTarget};
use crate::model::{AppEvent, ProjectStatus};
use crate::orchestrator;
use crate::report::{self, ReportData, ReportFormat};
use crate::text_summary::{self, TextSummary};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use tokio::sync::mpsc;

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "scrapemate",
    version,
    about = "Crawl a company website and turn it into an executive brief, with an optional TUI"
)]
pub struct Cli {
    #[command(flatten)]
    pub services: ServiceArgs,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// Append logs to this file (the TUI logs nowhere without it)
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Create a project for URL, crawl it and store its pages
    Analyze { url: String },
    /// List projects, newest first
    List,
    /// Show the pages stored for a project
    Pages { id: String },
    /// Show a project's executive brief
    Brief { id: String },
    /// Generate the executive brief from a project's stored pages
    ///
    /// A brief that already exists is shown as is unless --force is given.
    GenerateBrief {
        id: String,
        /// Replace an existing brief
        #[arg(long)]
        force: bool,
    },
    /// Write a report for a project
    Export {
        id: String,
        #[arg(long, value_enum, default_value = "markdown")]
        format: ReportFormat,
        /// Output directory (defaults to the download directory)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Delete a project with its pages and brief
    Delete { id: String },
    /// Check the store connection and API keys
    Status,
    /// Print the resolved configuration with secrets redacted
    Config,
}

/// How a successful invocation should exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Done,
    /// The command ran but its subject is unhealthy: a project ended `failed`,
    /// or a service is unreachable or unconfigured.
    Failed,
}

pub async fn run(args: Cli) -> Result<Outcome> {
    let settings = Settings::from_args(&args.services);

    let Some(command) = args.command.clone() else {
        let target = match args.log_file.as_deref() {
            Some(path) => LogTarget::File(path),
            None => LogTarget::Off,
        };
        logging::init(target)?;
        #[cfg(feature = "tui")]
        {
            crate::tui::run(settings).await?;
            return Ok(Outcome::Done);
        }
        #[cfg(not(feature = "tui"))]
        {
            // Fallback when built without TUI support.
            return run_command(&args, &settings, Command::List).await;
        }
    };

    let target = match args.log_file.as_deref() {
        Some(path) => LogTarget::File(path),
        None => LogTarget::Stderr,
    };
    logging::init(target)?;
    run_command(&args, &settings, command).await
}

async fn run_command(args: &Cli, settings: &Settings, command: Command) -> Result<Outcome> {
    let (out_tx, out_handle) = spawn_output_writer();
    let printer = Printer {
        json: args.json,
        tx: out_tx,
    };
    let res = dispatch(&printer, settings, command).await;
    drop(printer);
    let _ = out_handle.await;
    res
}

struct Printer {
    json: bool,
    tx: mpsc::UnboundedSender<OutputLine>,
}

impl Printer {
    fn emit<T: Serialize>(&self, value: &T, text: impl FnOnce() -> TextSummary) -> Result<()> {
        if self.json {
            let out = serde_json::to_string_pretty(value).context("serialize output")?;
            let _ = self.tx.send(OutputLine::Stdout(out));
        } else {
            for line in text().lines {
                let _ = self.tx.send(OutputLine::Stdout(line));
            }
        }
        Ok(())
    }

    fn note(&self, msg: String) {
        let _ = self.tx.send(OutputLine::Stderr(msg));
    }
}

/// Convert a typed failure into the user-facing sentence at the CLI edge.
fn user_error(e: AppError) -> anyhow::Error {
    let msg = e.user_message();
    anyhow::Error::new(e).context(msg)
}

async fn dispatch(printer: &Printer, settings: &Settings, command: Command) -> Result<Outcome> {
    let facades = || Facades::from_settings(settings).map_err(user_error);
    match command {
        Command::Config => {
            let redacted = settings.redacted_json();
            printer.emit(&redacted, || TextSummary {
                lines: serde_json::to_string_pretty(&redacted)
                    .map(|s| s.lines().map(str::to_string).collect())
                    .unwrap_or_default(),
            })?;
            Ok(Outcome::Done)
        }
        Command::Analyze { url } => analyze(printer, settings, facades()?, &url).await,
        Command::List => {
            let projects = facades()?.store.list_projects().await.map_err(user_error)?;
            printer.emit(&projects, || text_summary::build_project_list(&projects))?;
            Ok(Outcome::Done)
        }
        Command::Pages { id } => {
            let pages = facades()?.store.list_pages(&id).await.map_err(user_error)?;
            printer.emit(&pages, || text_summary::build_page_list(&pages))?;
            Ok(Outcome::Done)
        }
        Command::Brief { id } => {
            let brief = facades()?
                .store
                .get_brief(&id)
                .await
                .map_err(user_error)?
                .with_context(|| format!("No executive brief for project {id}"))?;
            printer.emit(&brief, || text_summary::build_brief(&brief))?;
            Ok(Outcome::Done)
        }
        Command::GenerateBrief { id, force } => {
            let facades = facades()?;
            let project = facades
                .store
                .get_project(&id)
                .await
                .map_err(user_error)?
                .ok_or_else(|| user_error(AppError::NotFound(id.clone())))?;
            printer.note(format!("Generating executive brief for {}…", project.display_name()));
            let brief =
                orchestrator::generate_brief(&facades, &project, settings.brief_char_cap, force)
                    .await
                    .map_err(user_error)?;
            printer.emit(&brief, || text_summary::build_brief(&brief))?;
            Ok(Outcome::Done)
        }
        Command::Export { id, format, out } => {
            let data = ReportData::fetch(facades()?.store.as_ref(), &id)
                .await
                .map_err(user_error)?;
            let dir = match out {
                Some(dir) => dir,
                None => report::default_dir()?,
            };
            let path = report::write_report(&data, format, &dir)?;
            let path_str = path.display().to_string();
            printer.emit(&serde_json::json!({ "path": path_str }), || TextSummary {
                lines: vec![format!("Exported: {}", path.display())],
            })?;
            Ok(Outcome::Done)
        }
        Command::Delete { id } => {
            facades()?.store.delete_project(&id).await.map_err(user_error)?;
            printer.emit(&serde_json::json!({ "deleted": id }), || TextSummary {
                lines: vec![format!("Deleted project {id}")],
            })?;
            Ok(Outcome::Done)
        }
        Command::Status => {
            let report = orchestrator::check_connections(&facades()?).await;
            printer.emit(&report, || text_summary::build_connection_report(&report))?;
            Ok(if report.ready() {
                Outcome::Done
            } else {
                Outcome::Failed
            })
        }
    }
}

/// Submit a URL and run the analysis in the foreground, streaming progress to stderr.
async fn analyze(
    printer: &Printer,
    settings: &Settings,
    facades: Facades,
    url: &str,
) -> Result<Outcome> {
    let project = orchestrator::create_project(&facades, url)
        .await
        .map_err(user_error)?;
    printer.note(format!(
        "Created project {} for {}",
        project.id, project.seed_url
    ));

    let engine = AnalysisEngine::new(facades, settings.page_limit);
    let (evt_tx, mut evt_rx) = mpsc::unbounded_channel::<AppEvent>();
    let note_tx = printer.tx.clone();
    let forward = tokio::spawn(async move {
        while let Some(ev) = evt_rx.recv().await {
            if let Some(msg) = ev.to_message() {
                let _ = note_tx.send(OutputLine::Stderr(msg));
            }
        }
    });

    let summary = engine
        .process_project(&project.id, &project.seed_url, &evt_tx)
        .await;
    drop(evt_tx);
    let _ = forward.await;

    #[derive(Serialize)]
    struct AnalyzeOutput<'a> {
        project_id: &'a str,
        seed_url: &'a str,
        status: ProjectStatus,
        message: &'a str,
        pages_stored: usize,
        brief: Option<&'a str>,
    }
    let brief = match &summary.brief {
        crate::engine::BriefOutcome::Generated => Some("generated"),
        crate::engine::BriefOutcome::Failed(msg) => Some(msg.as_str()),
        crate::engine::BriefOutcome::Skipped => None,
    };
    let output = AnalyzeOutput {
        project_id: &project.id,
        seed_url: &project.seed_url,
        status: summary.status,
        message: &summary.message,
        pages_stored: summary.pages_stored,
        brief,
    };
    printer.emit(&output, || text_summary::build_run_summary(&project, &summary))?;

    Ok(match summary.status {
        ProjectStatus::Failed => Outcome::Failed,
        _ => Outcome::Done,
    })
}
