//! Request modes and the per-mode request payloads.

use crate::config::PageRange;
use crate::expr::Sweep;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The operation selected for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    AskQuestion,
    Summarize,
    GenerateQuiz,
    FindPages,
    SolveEquation,
}

impl Mode {
    /// Whether this mode sends a prompt to the model.
    pub fn uses_model(self) -> bool {
        matches!(self, Mode::AskQuestion | Mode::Summarize | Mode::GenerateQuiz)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Mode::AskQuestion => "ask",
            Mode::Summarize => "summarize",
            Mode::GenerateQuiz => "quiz",
            Mode::FindPages => "find",
            Mode::SolveEquation => "solve",
        };
        f.write_str(s)
    }
}

/// One user action with its mode-specific input.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// Answer a question from the whole document or a page range.
    Ask {
        question: String,
        pages: Option<PageRange>,
    },
    /// Bullet-point summary of a page range.
    Summarize { pages: PageRange },
    /// Five questions with answers over a page range (default: whole document).
    Quiz {
        pages: Option<PageRange>,
        topic: Option<String>,
        multiple_choice: bool,
    },
    /// Pages containing a keyword, case-insensitively. No model call.
    FindPages { keyword: String },
    /// Evaluate an expression at a value and/or over a sweep. No model call.
    Solve {
        expression: String,
        at: Option<f64>,
        sweep: Option<Sweep>,
    },
}

impl Request {
    pub fn mode(&self) -> Mode {
        match self {
            Request::Ask { .. } => Mode::AskQuestion,
            Request::Summarize { .. } => Mode::Summarize,
            Request::Quiz { .. } => Mode::GenerateQuiz,
            Request::FindPages { .. } => Mode::FindPages,
            Request::Solve { .. } => Mode::SolveEquation,
        }
    }
}
