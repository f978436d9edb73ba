//! CLI binary for edgequake-pdfdiff.
//!
//! A thin shim over the library crate: each subcommand maps its flags onto
//! `ClientConfig` / `RenderOptions`, drives the stores, and prints results.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use edgequake_pdfdiff::{
    render_job, ApiClient, ClientConfig, ComparisonBackend, ComparisonJob, DiffClientError,
    ExportFormat, FileCandidate, JobStatus, JobStore, PageSelection, RenderOptions, RenderProgress,
    RenderProgressCallback, RenderedComparison, SessionStore, UploadManager, UploadStore,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

fn spinner(prefix: &'static str, msg: &str) -> ProgressBar {
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS),
    );
    bar.set_prefix(prefix);
    bar.set_message(msg.to_string());
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

// ── Render progress using indicatif ──────────────────────────────────────────

/// Terminal render callback: a progress bar plus one log line per page.
struct CliRenderProgress {
    bar: ProgressBar,
    started: Instant,
    errors: AtomicUsize,
}

impl CliRenderProgress {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            bar: spinner("Preparing", "Opening documents…"),
            started: Instant::now(),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Rendering");
        self.bar.reset_eta();
    }
}

impl RenderProgressCallback for CliRenderProgress {
    fn on_render_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Rendering {total_pages} pages side by side…"))
        ));
    }

    fn on_page_rendered(&self, page_num: usize, total: usize, changes: usize) {
        let label = match changes {
            0 => dim("no changes"),
            1 => "1 change".to_string(),
            n => format!("{n} changes"),
        };
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            green("✓"),
            page_num,
            total,
            label,
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        let msg = if error.chars().count() > 80 {
            let cut: String = error.chars().take(79).collect();
            format!("{cut}\u{2026}")
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            red("✗"),
            page_num,
            total,
            red(&msg),
        ));
        self.bar.inc(1);
    }

    fn on_render_complete(&self, total_pages: usize, success_count: usize) {
        let failed = total_pages.saturating_sub(success_count);
        self.bar.finish_and_clear();
        let secs = self.started.elapsed().as_secs_f64();
        if failed == 0 {
            eprintln!(
                "{} {} pages rendered  {}",
                green("✔"),
                bold(&success_count.to_string()),
                dim(&format!("{secs:.1}s"))
            );
        } else {
            eprintln!(
                "{} {}/{} pages rendered  ({} failed)",
                if failed == total_pages {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&success_count.to_string()),
                total_pages,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Upload two versions, wait for the comparison, render into ./diff
  pdfdiff compare contract-v1.pdf contract-v2.pdf -o diff

  # Upload only; print the job id and exit
  pdfdiff compare --no-wait a.pdf b.pdf

  # Render an existing job (defaults to the last job of this machine)
  pdfdiff results 6f1c… -o diff --pages 1-5 --zoom 150

  # Follow a job until it finishes
  pdfdiff status --watch 6f1c…

  # Download the backend's HTML report
  pdfdiff export 6f1c… --format html -o report.html

POLLING:
  Every 3 s for the first 5 minutes, every 5 s up to 10 minutes, then every
  10 s. Failed status checks back off 2 s, 4 s, 8 s; after the fourth
  failure in a row polling stops and the job id is printed so you can
  resume with `pdfdiff status --watch`.

ENVIRONMENT VARIABLES:
  PDFDIFF_BASE_URL        Comparison service URL (default http://localhost:8000)
  PDFDIFF_TIMEOUT         Per-request timeout in seconds
  PDFDIFF_STATE_DIR       Where the last job id and upload draft are kept
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory) for rendering
  RUST_LOG                Override the log filter
"#;

/// Compare two PDF documents through a comparison service.
#[derive(Parser, Debug)]
#[command(
    name = "pdfdiff",
    version,
    about = "Upload two PDFs to a comparison service and render the differences",
    long_about = "Upload two PDF documents to an edgequake comparison service, follow the \
comparison job, and render both documents side by side with additions, deletions and \
modifications boxed on top.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    /// Comparison service base URL.
    #[arg(long, global = true, env = "PDFDIFF_BASE_URL", default_value = "http://localhost:8000")]
    base_url: String,

    /// Per-request timeout in seconds.
    #[arg(long, global = true, env = "PDFDIFF_TIMEOUT", default_value_t = 30)]
    timeout: u64,

    /// Directory for the session file (last job id, upload draft).
    #[arg(long, global = true, env = "PDFDIFF_STATE_DIR")]
    state_dir: Option<PathBuf>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PDFDIFF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and results.
    #[arg(short, long, global = true, env = "PDFDIFF_QUIET")]
    quiet: bool,

    /// Disable progress bars and spinners.
    #[arg(long, global = true, env = "PDFDIFF_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate and upload two PDFs, wait for the comparison, then render it.
    Compare {
        /// Original document (left column).
        file1: PathBuf,
        /// Revised document (right column).
        file2: PathBuf,

        /// Print the job id after the upload and exit.
        #[arg(long)]
        no_wait: bool,

        /// Wait for the comparison but do not render pages.
        #[arg(long)]
        no_render: bool,

        #[command(flatten)]
        render: RenderArgs,
    },

    /// Render a finished comparison to PNG pages.
    Results {
        /// Job id. Defaults to the last job started on this machine.
        job_id: Option<String>,

        #[command(flatten)]
        render: RenderArgs,
    },

    /// Show the status of a job.
    Status {
        /// Job id. Defaults to the last job started on this machine.
        job_id: Option<String>,

        /// Keep polling until the job finishes.
        #[arg(short, long)]
        watch: bool,

        /// Print the job as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Download a report generated by the service.
    Export {
        /// Job id. Defaults to the last job started on this machine.
        job_id: Option<String>,

        /// Report format.
        #[arg(short, long, value_enum, default_value = "pdf")]
        format: FormatArg,

        /// Output file. Default: comparison-<job>.<ext>
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args, Debug, Clone)]
struct RenderArgs {
    /// Directory for the composed page images.
    #[arg(short, long, env = "PDFDIFF_OUTPUT", default_value = "pdfdiff-out")]
    output: PathBuf,

    /// Page selection: all, 5, 3-15, or 1,3,5,7.
    #[arg(long, env = "PDFDIFF_PAGES", default_value = "all")]
    pages: String,

    /// Zoom in percent (25–400).
    #[arg(long, env = "PDFDIFF_ZOOM", default_value_t = 100,
          value_parser = clap::value_parser!(u32).range(25..=400))]
    zoom: u32,

    /// Gap between the two columns in pixels.
    #[arg(long, env = "PDFDIFF_GUTTER", default_value_t = 16)]
    gutter: u32,

    /// Render the pages without difference boxes.
    #[arg(long)]
    no_overlay: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Pdf,
    Html,
    Json,
}

impl From<FormatArg> for ExportFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Pdf => ExportFormat::Pdf,
            FormatArg::Html => ExportFormat::Html,
            FormatArg::Json => ExportFormat::Json,
        }
    }
}

/// Shared handles built once from the global flags.
struct App {
    config: ClientConfig,
    backend: Arc<dyn ComparisonBackend>,
    session: Option<Arc<SessionStore>>,
    show_progress: bool,
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let g = &cli.global;

    // ── Logging setup ────────────────────────────────────────────────────
    // Library INFO logs are suppressed while a bar is on screen; the bar
    // carries the feedback.
    let show_progress = !g.quiet && !g.no_progress;
    let filter = if g.verbose {
        "debug"
    } else if g.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let mut builder = ClientConfig::builder()
        .base_url(g.base_url.clone())
        .request_timeout_secs(g.timeout);
    if let Some(dir) = &g.state_dir {
        builder = builder.storage_dir(dir.clone());
    }
    let config = builder.build().context("Invalid configuration")?;

    let backend: Arc<dyn ComparisonBackend> =
        Arc::new(ApiClient::new(&config).context("Failed to build HTTP client")?);

    // A missing data dir only costs resume support.
    let session = match SessionStore::open(config.storage_dir.as_deref()) {
        Ok(s) => Some(Arc::new(s)),
        Err(e) => {
            tracing::warn!("Session storage unavailable: {}", e);
            None
        }
    };

    let ctx = App {
        config,
        backend,
        session,
        show_progress,
        quiet: g.quiet,
    };

    match cli.command {
        Command::Compare {
            file1,
            file2,
            no_wait,
            no_render,
            render,
        } => compare(&ctx, &file1, &file2, no_wait, no_render, &render).await,
        Command::Results { job_id, render } => {
            let job_id = resolve_job_id(&ctx, job_id)?;
            results(&ctx, &job_id, &render).await
        }
        Command::Status {
            job_id,
            watch,
            json,
        } => {
            let job_id = resolve_job_id(&ctx, job_id)?;
            status(&ctx, &job_id, watch, json).await
        }
        Command::Export {
            job_id,
            format,
            output,
        } => {
            let job_id = resolve_job_id(&ctx, job_id)?;
            export(&ctx, &job_id, format.into(), output).await
        }
    }
}

/// Use the given id or fall back to the one saved by the last upload.
fn resolve_job_id(ctx: &App, job_id: Option<String>) -> Result<String> {
    if let Some(id) = job_id {
        return Ok(id);
    }
    ctx.session
        .as_ref()
        .and_then(|s| s.last_job_id())
        .context("No job id given and no previous job recorded on this machine")
}

// ── compare ──────────────────────────────────────────────────────────────────

async fn compare(
    ctx: &App,
    file1: &Path,
    file2: &Path,
    no_wait: bool,
    no_render: bool,
    render: &RenderArgs,
) -> Result<()> {
    let candidates = vec![
        FileCandidate::from_path(file1).context("Cannot read first file")?,
        FileCandidate::from_path(file2).context("Cannot read second file")?,
    ];

    let manager = Arc::new(UploadManager::new(ctx.backend.clone()));
    let uploads = UploadStore::new(manager, ctx.session.clone());
    if let Some(draft) = uploads.restored_draft() {
        tracing::debug!("Previous selection: {}", draft.file_names.join(", "));
    }
    uploads
        .select_files(candidates)
        .context("Selection rejected")?;

    let Some(job_id) = upload_with_progress(ctx, &uploads).await? else {
        if !ctx.quiet {
            eprintln!(
                "{} {}",
                dim("✖"),
                dim("Upload cancelled. Run the same command again to retry.")
            );
        }
        return Ok(());
    };
    if !ctx.quiet {
        eprintln!("{} Uploaded  job {}", green("✔"), bold(&job_id));
    }
    if no_wait {
        println!("{job_id}");
        return Ok(());
    }

    let job = wait_for_job(ctx, &job_id).await?;
    print_job(&job, ctx.quiet);
    if job.status != JobStatus::Completed {
        anyhow::bail!(
            "{}",
            job.error_message
                .unwrap_or_else(|| "Comparison failed. Please try again.".to_string())
        );
    }
    if no_render {
        return Ok(());
    }
    results(ctx, &job_id, render).await
}

/// Upload the selection with a byte-progress bar. Ctrl-C cancels, which
/// yields `Ok(None)`.
async fn upload_with_progress(ctx: &App, uploads: &UploadStore) -> Result<Option<String>> {
    let bar = if ctx.show_progress {
        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}%  {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(TICKS),
        );
        bar.set_prefix("Uploading");
        bar.set_message(dim("Ctrl-C to cancel"));
        bar.enable_steady_tick(Duration::from_millis(80));
        Some(bar)
    } else {
        None
    };

    let follower = bar.clone().map(|bar| {
        let mut rx = uploads.subscribe();
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let pct = rx.borrow_and_update().upload_progress;
                bar.set_position(u64::from(pct));
            }
        })
    });

    let submit = uploads.submit();
    tokio::pin!(submit);
    let result = tokio::select! {
        r = &mut submit => r,
        _ = tokio::signal::ctrl_c() => {
            uploads.cancel();
            submit.await
        }
    };

    if let Some(task) = follower {
        task.abort();
    }
    if let Some(bar) = bar {
        match &result {
            Ok(_) => {
                bar.set_position(100);
                bar.finish_and_clear();
            }
            Err(e) if e.is_cancellation() => bar.finish_and_clear(),
            Err(_) => bar.abandon(),
        }
    }

    upload_outcome(result)
}

/// A user cancel is not an error; everything else carries its user message.
fn upload_outcome(result: std::result::Result<String, DiffClientError>) -> Result<Option<String>> {
    match result {
        Ok(job_id) => Ok(Some(job_id)),
        Err(e) if e.is_cancellation() => {
            tracing::debug!("Upload cancelled by user");
            Ok(None)
        }
        Err(e) => {
            let msg = e.user_message();
            Err(anyhow::Error::new(e).context(msg))
        }
    }
}

/// Poll until the job settles, showing a spinner with the latest status.
async fn wait_for_job(ctx: &App, job_id: &str) -> Result<ComparisonJob> {
    let jobs = JobStore::new(
        ctx.backend.clone(),
        ctx.config.polling.clone(),
        ctx.session.clone(),
    );
    jobs.load_job(job_id)
        .await
        .with_context(|| format!("Failed to load job {job_id}"))?;

    let bar = ctx
        .show_progress
        .then(|| spinner("Comparing", "waiting for the service…"));
    let follower = bar.clone().map(|bar| {
        let mut rx = jobs.subscribe();
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let s = rx.borrow_and_update().clone();
                let status = s
                    .job
                    .as_ref()
                    .map(|j| j.status.to_string())
                    .unwrap_or_else(|| "pending".into());
                let msg = match (&s.poll_error, s.retry_count) {
                    (Some(err), n) if n > 0 => {
                        format!("{status}  {}", red(&format!("retry {n}: {err}")))
                    }
                    _ => status,
                };
                bar.set_message(msg);
            }
        })
    });

    let settled = tokio::select! {
        s = jobs.wait_until_settled() => s,
        _ = tokio::signal::ctrl_c() => {
            jobs.stop_polling();
            if let Some(bar) = &bar {
                bar.abandon();
            }
            anyhow::bail!(
                "Stopped waiting. The job keeps running; resume with `pdfdiff status --watch {job_id}`"
            );
        }
    };

    if let Some(task) = follower {
        task.abort();
    }
    if let Some(bar) = bar {
        bar.finish_and_clear();
    }

    match settled.job {
        Some(job) if job.status.is_terminal() => Ok(job),
        _ => {
            let err = settled
                .poll_error
                .unwrap_or_else(|| "polling stopped".to_string());
            anyhow::bail!("{err}\nResume with `pdfdiff status --watch {job_id}`")
        }
    }
}

// ── results ──────────────────────────────────────────────────────────────────

async fn results(ctx: &App, job_id: &str, render: &RenderArgs) -> Result<()> {
    let options = RenderOptions {
        pages: parse_pages(&render.pages)?,
        zoom_percent: render.zoom,
        gutter_px: render.gutter,
        show_differences: !render.no_overlay,
    };

    let job: ComparisonJob = (&ctx
        .backend
        .job_status(job_id)
        .await
        .with_context(|| format!("Failed to fetch job {job_id}"))?)
        .into();
    if job.status != JobStatus::Completed {
        anyhow::bail!(
            "Job {} is {}; results are available once it has completed",
            job_id,
            job.status
        );
    }

    let progress: RenderProgress = if ctx.show_progress {
        CliRenderProgress::new()
    } else {
        Arc::new(edgequake_pdfdiff::NoopRenderProgress)
    };
    let rendered = render_job(
        ctx.backend.clone(),
        job_id,
        &options,
        &render.output,
        progress,
    )
    .await
    .context("Rendering failed")?;

    print_render_summary(&rendered, ctx);
    Ok(())
}

fn print_render_summary(rendered: &RenderedComparison, ctx: &App) {
    if ctx.quiet {
        return;
    }
    let s = &rendered.stats;
    if !ctx.show_progress {
        eprintln!(
            "Rendered {}/{} pages in {}ms",
            s.rendered_pages, s.total_pages, s.total_duration_ms
        );
    }
    if rendered.page_counts[0] != rendered.page_counts[1] {
        eprintln!(
            "   {} documents differ in length ({} vs {} pages)",
            cyan("⚠"),
            rendered.page_counts[0],
            rendered.page_counts[1]
        );
    }
    eprintln!(
        "   {} boxes drawn  →  {}",
        dim(&s.changes_drawn.to_string()),
        bold(&rendered.output_dir.display().to_string())
    );
}

// ── status ───────────────────────────────────────────────────────────────────

async fn status(ctx: &App, job_id: &str, watch: bool, json: bool) -> Result<()> {
    let job = if watch {
        wait_for_job(ctx, job_id).await?
    } else {
        let resp = ctx
            .backend
            .job_status(job_id)
            .await
            .with_context(|| format!("Failed to fetch job {job_id}"))?;
        ComparisonJob::from(&resp)
    };

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&job).context("Failed to serialise job")?
        );
    } else {
        print_job(&job, false);
    }
    Ok(())
}

fn print_job(job: &ComparisonJob, quiet: bool) {
    if quiet {
        return;
    }
    let status = match job.status {
        JobStatus::Completed => green(&job.status.to_string()),
        JobStatus::Failed => red(&job.status.to_string()),
        _ => cyan(&job.status.to_string()),
    };
    println!("Job:          {}", job.id);
    println!("Status:       {}", status);
    println!("Created:      {}", job.created_at.to_rfc3339());
    println!("Updated:      {}", job.updated_at.to_rfc3339());
    if let Some(ref msg) = job.error_message {
        println!("Error:        {}", red(msg));
    }
    if let Some(ref result) = job.result {
        println!("Differences:  {}", result.total_differences);
        println!("Pages:        {} affected", result.pages_affected);
        for page in &result.pages {
            println!(
                "  page {:>3}  {} added  {} removed  {} changed",
                page.number,
                green(&page.additions.len().to_string()),
                red(&page.deletions.len().to_string()),
                cyan(&page.modifications.len().to_string()),
            );
        }
    }
}

// ── export ───────────────────────────────────────────────────────────────────

async fn export(
    ctx: &App,
    job_id: &str,
    format: ExportFormat,
    output: Option<PathBuf>,
) -> Result<()> {
    let bytes = ctx
        .backend
        .export(job_id, format)
        .await
        .with_context(|| format!("Failed to export job {job_id} as {}", format.as_str()))?;

    let path = output
        .unwrap_or_else(|| PathBuf::from(format!("comparison-{job_id}.{}", format.extension())));
    if path.as_os_str() == "-" {
        io::stdout()
            .lock()
            .write_all(&bytes)
            .context("Failed to write to stdout")?;
        return Ok(());
    }
    tokio::fs::write(&path, &bytes)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    if !ctx.quiet {
        eprintln!(
            "{}  {} bytes  →  {}",
            green("✔"),
            bytes.len(),
            bold(&path.display().to_string())
        );
    }
    Ok(())
}

/// Parse `--pages` string into `PageSelection`.
fn parse_pages(s: &str) -> Result<PageSelection> {
    let s = s.trim().to_lowercase();

    if s == "all" {
        return Ok(PageSelection::All);
    }

    // Range: "3-15"
    if let Some((start, end)) = s.split_once('-') {
        let start: usize = start
            .trim()
            .parse()
            .context("Invalid start page in range")?;
        let end: usize = end.trim().parse().context("Invalid end page in range")?;
        if start < 1 {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", start);
        }
        if start > end {
            anyhow::bail!("Invalid page range '{}-{}': start must be <= end", start, end);
        }
        return Ok(PageSelection::Range(start, end));
    }

    // Set: "1,3,5,7"
    if s.contains(',') {
        let pages: Vec<usize> = s
            .split(',')
            .map(|p| {
                p.trim()
                    .parse::<usize>()
                    .with_context(|| format!("Invalid page number: '{}'", p.trim()))
            })
            .collect::<Result<Vec<_>>>()?;
        if let Some(&p) = pages.iter().find(|&&p| p < 1) {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", p);
        }
        return Ok(PageSelection::Set(pages));
    }

    // Single page: "5"
    let page: usize = s.parse().context("Invalid page number")?;
    if page < 1 {
        anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", page);
    }
    Ok(PageSelection::Single(page))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_page_selections() {
        assert_eq!(parse_pages("all").unwrap(), PageSelection::All);
        assert_eq!(parse_pages(" 7 ").unwrap(), PageSelection::Single(7));
        assert_eq!(parse_pages("3-5").unwrap(), PageSelection::Range(3, 5));
        assert_eq!(
            parse_pages("1,3, 9").unwrap(),
            PageSelection::Set(vec![1, 3, 9])
        );
    }

    #[test]
    fn rejects_bad_page_selections() {
        assert!(parse_pages("0").is_err());
        assert!(parse_pages("5-2").is_err());
        assert!(parse_pages("1,x").is_err());
        assert!(parse_pages("0-3").is_err());
    }

    #[test]
    fn cancelled_upload_is_not_an_error() {
        assert_eq!(upload_outcome(Ok("job-1".into())).unwrap().as_deref(), Some("job-1"));
        assert!(upload_outcome(Err(DiffClientError::AbortedByUser))
            .unwrap()
            .is_none());

        let err = upload_outcome(Err(DiffClientError::NetworkError {
            detail: "connection refused".into(),
        }))
        .unwrap_err();
        assert!(err.downcast_ref::<DiffClientError>().is_some());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
