//! Pipeline stages from a PDF to a cleaned model answer.
//!
//! Each submodule implements exactly one transformation step, so each can be
//! tested on its own and the network stage can be swapped for a fake.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ (prompt) ──▶ llm ──▶ postprocess
//! (URL/path) (lopdf)                (retry)  (cleanup)
//! ```
//!
//! 1. [`input`]: read a local file or download a URL into memory, then
//!    check the `%PDF` magic
//! 2. [`extract`]: per-page text via lopdf; runs in `spawn_blocking`
//!    because parsing is CPU-bound
//! 3. [`llm`]: the completion client with bounded retry; the only stage
//!    with model I/O
//! 4. [`postprocess`]: deterministic cleanup of model Markdown

pub mod extract;
pub mod input;
pub mod llm;
pub mod postprocess;
