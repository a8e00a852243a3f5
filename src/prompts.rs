//! Prompt templates for the model-backed modes.
//!
//! Every prompt the crate sends is built here, from plain data, without any
//! I/O. Tests can therefore check exactly what a request would contain
//! without a provider.
//!
//! Context pages are always tagged with `[Page N]` markers so the model can
//! cite page numbers that match the physical document.

use crate::document::Page;

/// Number of questions a generated quiz must contain.
pub const QUIZ_QUESTION_COUNT: usize = 5;

/// Render pages as a single context block with `[Page N]` markers.
///
/// Empty pages are kept as a marker with no body so page numbering in the
/// context stays aligned with the document.
pub fn format_context(pages: &[Page]) -> String {
    let mut out = String::new();
    for page in pages {
        if !out.is_empty() {
            out.push_str("\n\n");
        }
        out.push_str(&format!("[Page {}]\n", page.number));
        out.push_str(page.text.trim());
    }
    out
}

/// Prompt for answering a student's question from book content.
pub fn ask_prompt(question: &str, pages: &[Page]) -> String {
    format!(
        r#"You are a teaching assistant. Answer the student's question using the following book content:

"""
{context}
"""

- Provide clear explanations
- Solve equations step by step and show the calculations when relevant
- Cite the page numbers ([Page N]) your answer relies on
- Use simple examples to explain
- If the content does not cover the question, say so

Question: {question}"#,
        context = format_context(pages),
        question = question.trim(),
    )
}

/// Prompt for a bullet-point summary of a page range.
pub fn summarize_prompt(pages: &[Page]) -> String {
    format!(
        r#"Summarize the following chapter content in clear bullet points.
Group related points under short headings and keep formulas intact.

"""
{context}
"""
"#,
        context = format_context(pages),
    )
}

/// Prompt for a five-question quiz with answers.
pub fn quiz_prompt(pages: &[Page], topic: Option<&str>, multiple_choice: bool) -> String {
    let focus = match topic.map(str::trim).filter(|t| !t.is_empty()) {
        Some(t) => format!(" focusing on {t}"),
        None => String::new(),
    };
    let format_rule = if multiple_choice {
        "- Each question has four options labelled A) to D) with exactly one correct option\n\
         - Give the correct letter and a one-line explanation in the answer"
    } else {
        "- Questions are open-ended; give a short worked answer for each"
    };
    format!(
        r#"Create a {count}-question quiz with answers{focus} based on the following content:

"""
{context}
"""

- Write exactly {count} numbered questions
{format_rule}
- List all answers in a separate "Answers" section after the questions"#,
        count = QUIZ_QUESTION_COUNT,
        focus = focus,
        context = format_context(pages),
        format_rule = format_rule,
    )
}
