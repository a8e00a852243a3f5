//! Structured results of a handled request.
//!
//! Every variant serialises with `serde`, which is what the CLI's `--json`
//! flag prints. Rendering for humans lives in [`crate::present`].

use crate::config::PageRange;
use crate::expr::Sample;
use crate::mode::Mode;
use crate::pipeline::llm::Completion;
use serde::Serialize;

/// The outcome of one [`crate::mode::Request`].
#[derive(Debug, Clone, Serialize)]
pub struct Response {
    pub mode: Mode,
    /// Pages used as model context, when a range was given.
    pub context: Option<PageRange>,
    pub body: ResponseBody,
    pub duration_ms: u64,
}

/// Mode-specific payload.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResponseBody {
    /// Text returned by the model.
    Completion(Completion),
    /// Keyword locator hits.
    Pages { keyword: String, pages: Vec<usize> },
    /// Expression evaluator output.
    Evaluation(EvaluationResult),
}

/// Literal value and/or sweep samples of one expression.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationResult {
    pub expression: String,
    pub variable: String,
    /// The literal point requested, with its value.
    pub point: Option<Sample>,
    /// Swept samples, empty when no sweep was requested.
    pub samples: Vec<Sample>,
}

impl Response {
    /// The completion, if this response came from the model.
    pub fn completion(&self) -> Option<&Completion> {
        match &self.body {
            ResponseBody::Completion(c) => Some(c),
            _ => None,
        }
    }
}
