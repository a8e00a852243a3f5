//! # edgequake-studybot
//!
//! Ask questions about a textbook PDF, summarise page ranges, generate
//! quizzes, find where a term appears, and evaluate formulas.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input    resolve local file or download from URL
//!  ├─ 2. Extract  per-page text via lopdf (CPU-bound, spawn_blocking)
//!  ├─ 3. Cache    keep the extracted document, keyed by SHA-256 of its bytes
//!  ├─ 4. Select   validate the page range (never clipped)
//!  ├─ 5. Prompt   ask / summarize / quiz templates with [Page N] markers
//!  ├─ 6. Model    one chat completion, retried on transient failures
//!  └─ 7. Present  cleaned Markdown, page lists, value tables, SVG plots
//! ```
//!
//! `find` and `solve` stop after step 4 and never touch the network.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_studybot::{CompletionClient, Request, StudyConfig, StudySession};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = StudyConfig::default();
//!     let client = CompletionClient::from_config(&config)?;
//!     let mut session = StudySession::new(config, client);
//!     session.load("physics.pdf").await?;
//!
//!     let response = session
//!         .handle(Request::Summarize { pages: "3-5".parse()? })
//!         .await?;
//!     print!("{}", edgequake_studybot::present::render_markdown(&response));
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `studybot` binary (clap + indicatif + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-studybot = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod document;
pub mod error;
pub mod expr;
pub mod locate;
pub mod mode;
pub mod output;
pub mod pipeline;
pub mod present;
pub mod progress;
pub mod prompts;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{PageRange, RetryPolicy, StudyConfig, StudyConfigBuilder, DEFAULT_MODEL};
pub use document::{Document, DocumentCache, DocumentMetadata, Page};
pub use error::{EvaluationError, StudyBotError, TransientKind};
pub use expr::{Expression, Sample, Sweep};
pub use mode::{Mode, Request};
pub use output::{EvaluationResult, Response, ResponseBody};
pub use pipeline::llm::{
    Completion, CompletionClient, CompletionRequest, CompletionTransport, TransportError,
    TransportReply,
};
pub use progress::{NoopProgressCallback, ProgressCallback, RequestProgressCallback};
pub use session::StudySession;
