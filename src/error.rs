//! Error types for the edgequake-studybot library.
//!
//! Every failure path ends in a specific variant of [`StudyBotError`] so the
//! CLI can print a message naming the actual cause. Transient API failures
//! never reach this type while the retry budget lasts; only the exhausted
//! case ([`StudyBotError::RetriesExhausted`]) surfaces.
//!
//! Expression errors have their own type, [`EvaluationError`], because the
//! evaluator is usable on its own without a document or a provider.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the edgequake-studybot library.
#[derive(Debug, Error)]
pub enum StudyBotError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The path exists but could not be read (a directory, an I/O fault).
    #[error("Could not read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A user-supplied value is malformed (empty keyword, bad URL, …).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The bytes were read, but they are not a PDF.
    #[error("'{source_name}' is not a PDF (first bytes: {magic:?})")]
    NotAPdf { source_name: String, magic: Vec<u8> },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// The PDF could not be opened or contains no pages.
    #[error("Could not extract text from '{source_name}': {detail}")]
    Extraction { source_name: String, detail: String },

    /// A mode that needs document context was invoked before any PDF was loaded.
    #[error("No document loaded.\nLoad a PDF first (e.g. `load book.pdf` in a session).")]
    NoDocument,

    // ── Range errors ──────────────────────────────────────────────────────
    /// Requested pages fall outside the document.
    #[error("Pages {start}-{end} are out of range (document has {total} pages)")]
    Range {
        start: usize,
        end: usize,
        total: usize,
    },

    /// A page-range string could not be parsed.
    #[error("Invalid page range '{input}': {reason}")]
    InvalidRange { input: String, reason: String },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Every attempt failed with a transient error.
    #[error("LLM request failed after {attempts} attempts ({kind}): {detail}")]
    RetriesExhausted {
        attempts: u32,
        kind: TransientKind,
        detail: String,
    },

    /// The LLM API returned an error that retrying would not fix.
    #[error("LLM API error (not retried): {detail}")]
    PermanentApi { detail: String },

    // ── Evaluation errors ─────────────────────────────────────────────────
    /// The expression is malformed or could not be evaluated.
    #[error("Expression error: {0}")]
    Evaluation(#[from] EvaluationError),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file (plot, transcript).
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// The closed set of failure kinds that are worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransientKind {
    /// HTTP 429 or a provider-specific rate-limit signal.
    RateLimited,
    /// Connection refused/reset, DNS failure, or per-call timeout.
    Connection,
    /// Recoverable upstream status (5xx, overloaded backend).
    UpstreamStatus,
}

impl fmt::Display for TransientKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransientKind::RateLimited => "rate limit exceeded",
            TransientKind::Connection => "connection failure",
            TransientKind::UpstreamStatus => "upstream status error",
        };
        f.write_str(s)
    }
}

/// Why an arithmetic expression was rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvaluationError {
    #[error("expression is empty")]
    Empty,

    /// A character that is not part of the arithmetic grammar.
    #[error("unexpected character '{ch}' at position {pos}")]
    UnexpectedChar { ch: char, pos: usize },

    /// An identifier other than the free variable.
    #[error("unknown identifier '{name}' at position {pos} (only '{variable}' is allowed)")]
    UnknownIdentifier {
        name: String,
        pos: usize,
        variable: String,
    },

    #[error("malformed number '{text}' at position {pos}")]
    BadNumber { text: String, pos: usize },

    #[error("expected {expected} at position {pos}")]
    Syntax { expected: &'static str, pos: usize },

    /// Parentheses, signs or exponents nested beyond the supported depth.
    #[error("expression nests too deeply at position {pos} (limit {max})")]
    TooDeep { pos: usize, max: usize },

    #[error("expression has {tokens} tokens (limit {max})")]
    TooLong { tokens: usize, max: usize },

    #[error("division by zero")]
    DivisionByZero,

    /// The result overflowed or is otherwise not a finite number.
    #[error("result is not a finite number at {variable} = {at}")]
    NonFinite { variable: String, at: f64 },

    /// Sweep bounds or step are unusable.
    #[error("invalid sweep: {0}")]
    InvalidSweep(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_display_names_extent() {
        let e = StudyBotError::Range {
            start: 10,
            end: 15,
            total: 8,
        };
        let msg = e.to_string();
        assert!(msg.contains("10-15"), "got: {msg}");
        assert!(msg.contains("8 pages"), "got: {msg}");
    }

    #[test]
    fn retries_exhausted_display_has_attempts_and_kind() {
        let e = StudyBotError::RetriesExhausted {
            attempts: 3,
            kind: TransientKind::RateLimited,
            detail: "429 Too Many Requests".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("3 attempts"), "got: {msg}");
        assert!(msg.contains("rate limit"), "got: {msg}");
        assert!(msg.contains("429"), "got: {msg}");
    }

    #[test]
    fn permanent_api_display() {
        let e = StudyBotError::PermanentApi {
            detail: "invalid key".into(),
        };
        assert!(e.to_string().contains("not retried"));
        assert!(e.to_string().contains("invalid key"));
    }

    #[test]
    fn evaluation_error_converts() {
        let e: StudyBotError = EvaluationError::UnknownIdentifier {
            name: "os".into(),
            pos: 0,
            variable: "x".into(),
        }
        .into();
        assert!(e.to_string().contains("'os'"));
    }

    #[test]
    fn each_kind_has_distinct_message() {
        let msgs = [
            StudyBotError::NoDocument.to_string(),
            StudyBotError::Extraction {
                source_name: "a.pdf".into(),
                detail: "bad xref".into(),
            }
            .to_string(),
            StudyBotError::PermanentApi { detail: "x".into() }.to_string(),
            StudyBotError::Evaluation(EvaluationError::Empty).to_string(),
        ];
        for (i, a) in msgs.iter().enumerate() {
            for b in &msgs[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
