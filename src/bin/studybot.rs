//! CLI binary for edgequake-studybot.
//!
//! A thin shim over the library crate that maps CLI flags to `StudyConfig`,
//! turns subcommands into `Request`s and prints the results.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use edgequake_studybot::present::{render_markdown, write_svg_plot};
use edgequake_studybot::session::runs_offline;
use edgequake_studybot::{
    CompletionClient, Document, Mode, PageRange, ProgressCallback, Request,
    RequestProgressCallback, Response, ResponseBody, StudyConfig, StudySession, Sweep,
    TransientKind,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
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
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

/// Terminal progress callback: a spinner while the model is working and one
/// log line per document load and per retry.
struct CliProgressCallback {
    /// Spinner for the request in flight; a fresh one per request.
    bar: Mutex<Option<ProgressBar>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            bar: Mutex::new(None),
        })
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(guard) = self.bar.lock() {
            if let Some(ref bar) = *guard {
                f(bar);
            }
        }
    }

    fn println(&self, line: String) {
        let mut printed = false;
        self.with_bar(|bar| {
            bar.println(&line);
            printed = true;
        });
        if !printed {
            eprintln!("{line}");
        }
    }
}

impl RequestProgressCallback for CliProgressCallback {
    fn on_document_loaded(&self, source: &str, page_count: usize, cached: bool) {
        let how = if cached { "cached" } else { "extracted" };
        eprintln!(
            "{} {}  {}",
            green("✓"),
            bold(source),
            dim(&format!("{page_count} pages, {how}"))
        );
    }

    fn on_request_start(&self, mode: Mode) {
        if !mode.uses_model() {
            return;
        }
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_prefix(mode.to_string());
        bar.set_message("waiting for model…");
        bar.enable_steady_tick(Duration::from_millis(80));
        if let Ok(mut guard) = self.bar.lock() {
            *guard = Some(bar);
        }
    }

    fn on_attempt_start(&self, attempt: u32, max_attempts: u32) {
        if attempt > 1 {
            self.with_bar(|bar| {
                bar.set_message(format!("waiting for model… (attempt {attempt}/{max_attempts})"))
            });
        }
    }

    fn on_retry(&self, attempt: u32, kind: TransientKind, delay: Duration, _detail: &str) {
        self.println(format!(
            "  {} attempt {} failed ({}), retrying in {}s",
            yellow("⚠"),
            attempt,
            kind,
            delay.as_secs()
        ));
    }

    fn on_request_complete(&self, _mode: Mode, _success: bool) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(bar) = guard.take() {
                bar.finish_and_clear();
            }
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Ask about the whole book, or only pages 40-52
  studybot ask physics.pdf What is Newton's second law?
  studybot ask physics.pdf --pages 40-52 How is momentum conserved?

  # Bullet-point summary of a chapter
  studybot summarize physics.pdf 10-15

  # Five-question multiple-choice quiz on a topic
  studybot quiz physics.pdf --pages 10-15 --topic friction --multiple-choice

  # Which pages mention a term (no API key needed)
  studybot find physics.pdf newton

  # Evaluate a formula at a point and over a range, with a plot (no PDF, no API key)
  studybot solve "2*x+3" --at 4 --sweep=-10..10 --plot line.svg

  # Page count and metadata (no API key needed)
  studybot inspect https://example.org/book.pdf

  # Interactive session: load once, ask many times
  studybot session physics.pdf

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  RUST_LOG                Override log filter (e.g. edgequake_studybot=debug)
"#;

const SESSION_HELP: &str = "\
commands:
  load <path|url>                         load or replace the document
  ask [--pages a-b] <question…>           answer from the document
  summarize <a-b>                         bullet-point summary
  quiz [--pages a-b] [--topic t] [--multiple-choice]
  find <keyword>                          pages mentioning a keyword
  solve <expr> [--at v] [--sweep a..b[:step]] [--plot file.svg]
  inspect                                 document metadata
  unload                                  forget the document
  help | quit";

/// Study a PDF textbook with an LLM: ask, summarise, quiz, find, solve.
#[derive(Parser, Debug)]
#[command(
    name = "studybot",
    version,
    about = "Ask questions about a PDF textbook, summarise pages and generate quizzes with LLMs",
    long_about = "Load a PDF textbook (local file or URL), then ask questions about it, summarise \
page ranges, generate quizzes, find which pages mention a term, or evaluate formulas. Supports \
OpenAI, Anthropic, Google Gemini, Azure OpenAI, and any OpenAI-compatible endpoint (Ollama, vLLM, \
LiteLLM, etc.).",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// LLM model ID (e.g. gpt-4.1-mini, gpt-4.1, claude-sonnet-4-20250514).
    #[arg(long, global = true, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, global = true, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Sampling temperature (0.0–1.0).
    #[arg(long, global = true, env = "STUDYBOT_TEMPERATURE", default_value_t = 0.2)]
    temperature: f32,

    /// Max tokens the model may generate per answer.
    #[arg(long, global = true, env = "STUDYBOT_MAX_TOKENS", default_value_t = 2048)]
    max_tokens: usize,

    /// Total attempts per API call, including the first.
    #[arg(long, global = true, env = "STUDYBOT_MAX_ATTEMPTS", default_value_t = 3)]
    max_attempts: u32,

    /// Path to a text file containing a system prompt.
    #[arg(long, global = true, env = "STUDYBOT_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Name of the free variable in `solve` expressions.
    #[arg(long, global = true, env = "STUDYBOT_VARIABLE", default_value = "x")]
    variable: String,

    /// Output structured JSON instead of Markdown.
    #[arg(long, global = true, env = "STUDYBOT_JSON")]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, global = true, env = "STUDYBOT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "STUDYBOT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except results and errors.
    #[arg(short, long, global = true, env = "STUDYBOT_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, global = true, env = "STUDYBOT_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Per-attempt LLM call timeout in seconds.
    #[arg(long, global = true, env = "STUDYBOT_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Answer a question from the document.
    Ask {
        /// Local PDF file path or HTTP/HTTPS URL.
        input: String,
        #[command(flatten)]
        args: AskArgs,
    },
    /// Bullet-point summary of a page range.
    Summarize {
        /// Local PDF file path or HTTP/HTTPS URL.
        input: String,
        #[command(flatten)]
        args: SummarizeArgs,
    },
    /// Five-question quiz with answers.
    Quiz {
        /// Local PDF file path or HTTP/HTTPS URL.
        input: String,
        #[command(flatten)]
        args: QuizArgs,
    },
    /// List the pages that mention a keyword (no model call).
    Find {
        /// Local PDF file path or HTTP/HTTPS URL.
        input: String,
        #[command(flatten)]
        args: FindArgs,
    },
    /// Evaluate an arithmetic expression (no PDF, no model call).
    Solve(SolveArgs),
    /// Print page count and metadata (no model call).
    Inspect {
        /// Local PDF file path or HTTP/HTTPS URL.
        input: String,
    },
    /// Interactive session: load a document once, then issue commands.
    Session {
        /// Document to load at start.
        input: Option<String>,
    },
}

#[derive(Args, Debug, Clone)]
struct AskArgs {
    /// Restrict context to a page range, e.g. 3-7 or 12.
    #[arg(long)]
    pages: Option<PageRange>,
    /// The question.
    #[arg(required = true, num_args = 1.., trailing_var_arg = true)]
    question: Vec<String>,
}

#[derive(Args, Debug, Clone)]
struct SummarizeArgs {
    /// Page range, e.g. 10-15.
    pages: PageRange,
}

#[derive(Args, Debug, Clone)]
struct QuizArgs {
    /// Page range to draw questions from (default: whole document).
    #[arg(long)]
    pages: Option<PageRange>,
    /// Focus the questions on a topic.
    #[arg(long)]
    topic: Option<String>,
    /// Four options (A–D) per question.
    #[arg(long)]
    multiple_choice: bool,
}

#[derive(Args, Debug, Clone)]
struct FindArgs {
    /// Keyword or phrase, matched case-insensitively.
    #[arg(required = true, num_args = 1..)]
    keyword: Vec<String>,
}

#[derive(Args, Debug, Clone)]
struct SolveArgs {
    /// Expression in the free variable, e.g. "2*x^2 - 3*x + 1".
    #[arg(allow_hyphen_values = true)]
    expression: String,
    /// Evaluate at this value.
    #[arg(long, allow_hyphen_values = true)]
    at: Option<f64>,
    /// Sweep `start..end[:step]`, e.g. -10..10 or 0..1:0.1.
    #[arg(long, allow_hyphen_values = true)]
    sweep: Option<Sweep>,
    /// Write an SVG line plot of the sweep to this file.
    #[arg(long, requires = "sweep")]
    plot: Option<PathBuf>,
}

impl AskArgs {
    fn into_request(self) -> Request {
        Request::Ask {
            question: self.question.join(" "),
            pages: self.pages,
        }
    }
}

impl QuizArgs {
    fn into_request(self) -> Request {
        Request::Quiz {
            pages: self.pages,
            topic: self.topic,
            multiple_choice: self.multiple_choice,
        }
    }
}

impl SolveArgs {
    fn to_request(&self) -> Request {
        Request::Solve {
            expression: self.expression.clone(),
            at: self.at,
            sweep: self.sweep,
        }
    }
}

/// One line typed at the `session` prompt.
#[derive(Parser, Debug)]
#[command(no_binary_name = true, disable_help_subcommand = true)]
struct SessionLine {
    #[command(subcommand)]
    command: SessionCommand,
}

#[derive(Subcommand, Debug)]
enum SessionCommand {
    Load { input: String },
    Ask(AskArgs),
    Summarize(SummarizeArgs),
    Quiz(QuizArgs),
    Find(FindArgs),
    Solve(SolveArgs),
    Inspect,
    Unload,
    Help,
    #[command(alias = "exit")]
    Quit,
}

/// How results are printed.
#[derive(Clone, Copy)]
struct OutputOpts {
    json: bool,
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner provides the feedback that matters; keep INFO logs out of
    // its way unless asked for.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
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

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn RequestProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb).await?;
    let out = OutputOpts {
        json: cli.json,
        quiet: cli.quiet,
    };

    match cli.command {
        Command::Ask { input, args } => {
            let session = loaded_session(config, Mode::AskQuestion, &input).await?;
            run(&session, args.into_request(), out).await?;
        }
        Command::Summarize { input, args } => {
            let session = loaded_session(config, Mode::Summarize, &input).await?;
            run(&session, Request::Summarize { pages: args.pages }, out).await?;
        }
        Command::Quiz { input, args } => {
            let session = loaded_session(config, Mode::GenerateQuiz, &input).await?;
            run(&session, args.into_request(), out).await?;
        }
        Command::Find { input, args } => {
            let session = loaded_session(config, Mode::FindPages, &input).await?;
            let keyword = args.keyword.join(" ");
            run(&session, Request::FindPages { keyword }, out).await?;
        }
        Command::Solve(args) => {
            let session = StudySession::offline(config);
            solve(&session, &args, out).await?;
        }
        Command::Inspect { input } => {
            let mut session = StudySession::offline(config);
            let doc = session
                .load(&input)
                .await
                .with_context(|| format!("Failed to load {input}"))?;
            print_inspection(&doc, out)?;
        }
        Command::Session { input } => {
            repl(config, input, out).await?;
        }
    }

    Ok(())
}

/// Map CLI args to `StudyConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<StudyConfig> {
    let system_prompt = if let Some(ref path) = cli.system_prompt {
        Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read system prompt from {:?}", path))?,
        )
    } else {
        None
    };

    let mut builder = StudyConfig::builder()
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .max_attempts(cli.max_attempts)
        .variable(cli.variable.as_str())
        .download_timeout_secs(cli.download_timeout)
        .api_timeout_secs(cli.api_timeout);

    if let Some(ref model) = cli.model {
        builder = builder.model(model.as_str());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.as_str());
    }
    if let Some(prompt) = system_prompt {
        builder = builder.system_prompt(prompt);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// A session able to serve `mode`, with `input` loaded.
async fn loaded_session(config: StudyConfig, mode: Mode, input: &str) -> Result<StudySession> {
    let mut session = if runs_offline(mode) {
        StudySession::offline(config)
    } else {
        let client = CompletionClient::from_config(&config)
            .context("Failed to initialise LLM provider")?;
        StudySession::new(config, client)
    };
    session
        .load(input)
        .await
        .with_context(|| format!("Failed to load {input}"))?;
    Ok(session)
}

async fn run(session: &StudySession, request: Request, out: OutputOpts) -> Result<Response> {
    let mode = request.mode();
    let response = session
        .handle(request)
        .await
        .with_context(|| format!("{mode} failed"))?;
    emit(&response, out)?;
    Ok(response)
}

async fn solve(session: &StudySession, args: &SolveArgs, out: OutputOpts) -> Result<()> {
    let response = run(session, args.to_request(), out).await?;
    if let (Some(path), ResponseBody::Evaluation(result)) = (&args.plot, &response.body) {
        let title = format!("{} = {}", result.variable, result.expression);
        write_svg_plot(path, &title, &result.variable, &result.samples)
            .context("Failed to write plot")?;
        if !out.quiet {
            eprintln!("{} plot written to {}", green("✔"), bold(&path.display().to_string()));
        }
    }
    Ok(())
}

/// Print a response to stdout, plus a one-line summary on stderr.
fn emit(response: &Response, out: OutputOpts) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if out.json {
        let json = serde_json::to_string_pretty(response).context("Failed to serialise output")?;
        writeln!(handle, "{json}").context("Failed to write to stdout")?;
        return Ok(());
    }

    handle
        .write_all(render_markdown(response).as_bytes())
        .context("Failed to write to stdout")?;

    if let (Some(c), false) = (response.completion(), out.quiet) {
        eprintln!(
            "   {}  {} tokens in  /  {} tokens out  /  {} attempt(s)  /  {}ms",
            dim(&c.model),
            dim(&c.input_tokens.to_string()),
            dim(&c.output_tokens.to_string()),
            c.attempts,
            response.duration_ms,
        );
    }
    Ok(())
}

fn print_inspection(doc: &Document, out: OutputOpts) -> Result<()> {
    if out.json {
        let value = serde_json::json!({
            "source": doc.source,
            "sha256": doc.digest,
            "page_count": doc.page_count(),
            "empty_pages": doc.empty_page_count(),
            "metadata": doc.metadata,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&value).context("Failed to serialize metadata")?
        );
        return Ok(());
    }

    let meta = &doc.metadata;
    println!("File:         {}", doc.source);
    if let Some(ref t) = meta.title {
        println!("Title:        {}", t);
    }
    if let Some(ref a) = meta.author {
        println!("Author:       {}", a);
    }
    if let Some(ref s) = meta.subject {
        println!("Subject:      {}", s);
    }
    println!("Pages:        {}", doc.page_count());
    println!("Empty pages:  {}", doc.empty_page_count());
    println!("PDF Version:  {}", meta.pdf_version);
    println!("SHA-256:      {}", doc.digest);
    Ok(())
}

// ── Interactive session ──────────────────────────────────────────────────────

async fn repl(config: StudyConfig, input: Option<String>, out: OutputOpts) -> Result<()> {
    let mut session = match CompletionClient::from_config(&config) {
        Ok(client) => StudySession::new(config, client),
        Err(e) => {
            eprintln!(
                "{} {}\n  only find, solve and inspect are available",
                yellow("⚠"),
                e
            );
            StudySession::offline(config)
        }
    };

    if let Some(input) = input {
        if let Err(e) = session.load(&input).await {
            eprintln!("{} {}", red("✗"), e);
        }
    }
    if !out.quiet {
        eprintln!("{}", dim("type 'help' for commands, 'quit' to leave"));
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        eprint!("{} ", bold("studybot>"));
        io::stderr().flush().ok();

        let Some(line) = lines.next_line().await.context("Failed to read stdin")? else {
            break;
        };
        let words = split_words(&line);
        if words.is_empty() {
            continue;
        }

        let command = match SessionLine::try_parse_from(&words) {
            Ok(parsed) => parsed.command,
            Err(e) => {
                eprintln!("{}", e.render());
                continue;
            }
        };

        let result = match command {
            SessionCommand::Quit => break,
            SessionCommand::Help => {
                eprintln!("{SESSION_HELP}");
                Ok(())
            }
            SessionCommand::Load { input } => session
                .load(&input)
                .await
                .map(|_| ())
                .with_context(|| format!("Failed to load {input}")),
            SessionCommand::Unload => {
                session.unload();
                Ok(())
            }
            SessionCommand::Inspect => match session.document() {
                Some(doc) => print_inspection(&doc, out),
                None => Err(anyhow::anyhow!("no document loaded; use 'load <path|url>'")),
            },
            SessionCommand::Ask(args) => run(&session, args.into_request(), out).await.map(|_| ()),
            SessionCommand::Summarize(args) => {
                run(&session, Request::Summarize { pages: args.pages }, out)
                    .await
                    .map(|_| ())
            }
            SessionCommand::Quiz(args) => run(&session, args.into_request(), out).await.map(|_| ()),
            SessionCommand::Find(args) => {
                let keyword = args.keyword.join(" ");
                run(&session, Request::FindPages { keyword }, out)
                    .await
                    .map(|_| ())
            }
            SessionCommand::Solve(args) => solve(&session, &args, out).await,
        };

        if let Err(e) = result {
            eprintln!("{} {:#}", red("✗"), e);
        }
    }
    Ok(())
}

/// Split a line into words, keeping double-quoted runs together.
fn split_words(line: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut pending = false;
    for ch in line.chars() {
        match ch {
            '"' => {
                quoted = !quoted;
                pending = true;
            }
            c if c.is_whitespace() && !quoted => {
                if pending {
                    words.push(std::mem::take(&mut current));
                    pending = false;
                }
            }
            c => {
                current.push(c);
                pending = true;
            }
        }
    }
    if pending {
        words.push(current);
    }
    words
}
