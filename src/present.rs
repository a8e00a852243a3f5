//! Rendering of responses for humans: Markdown text and SVG line plots.
//!
//! No decisions are made here; every function is a pure formatting step over
//! a [`Response`] or its parts.

use crate::error::StudyBotError;
use crate::expr::Sample;
use crate::mode::Mode;
use crate::output::{EvaluationResult, Response, ResponseBody};
use crate::pipeline::postprocess::clean_markdown;
use std::fmt::Write as _;
use std::path::Path;

/// Render any response as Markdown.
pub fn render_markdown(response: &Response) -> String {
    match &response.body {
        ResponseBody::Completion(c) => {
            let mut out = format!("### {}\n\n", heading(response.mode));
            out.push_str(&clean_markdown(&c.text));
            out
        }
        ResponseBody::Pages { keyword, pages } => render_pages(keyword, pages),
        ResponseBody::Evaluation(result) => render_evaluation(result),
    }
}

fn heading(mode: Mode) -> &'static str {
    match mode {
        Mode::AskQuestion => "Answer",
        Mode::Summarize => "Summary",
        Mode::GenerateQuiz => "Quiz",
        Mode::FindPages => "Pages",
        Mode::SolveEquation => "Result",
    }
}

/// "Found on pages: …" or a not-found line.
pub fn render_pages(keyword: &str, pages: &[usize]) -> String {
    if pages.is_empty() {
        return format!("No pages mention \"{keyword}\".\n");
    }
    let list = pages
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "\"{keyword}\" found on {} page{}: {list}\n",
        pages.len(),
        if pages.len() == 1 { "" } else { "s" }
    )
}

/// Literal value line plus a Markdown table of sweep samples.
pub fn render_evaluation(result: &EvaluationResult) -> String {
    let mut out = String::new();
    let var = &result.variable;
    if let Some(p) = result.point {
        let _ = writeln!(out, "{} = {} at {var} = {}", result.expression, fmt_num(p.y), fmt_num(p.x));
    }
    if !result.samples.is_empty() {
        if !out.is_empty() {
            out.push('\n');
        }
        let _ = writeln!(out, "| {var} | {} |", result.expression);
        out.push_str("| ---: | ---: |\n");
        for s in &result.samples {
            let _ = writeln!(out, "| {} | {} |", fmt_num(s.x), fmt_num(s.y));
        }
    }
    out
}

/// Format a number without trailing `.0` noise for integers.
fn fmt_num(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        let s = format!("{:.6}", v);
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

// ── SVG plot ─────────────────────────────────────────────────────────────────

const WIDTH: f64 = 640.0;
const HEIGHT: f64 = 400.0;
const MARGIN: f64 = 48.0;

/// Render samples as a standalone SVG line plot.
///
/// Axes are drawn through zero when zero is inside the data range. A flat
/// series is padded by ±1 so it still gets a visible vertical extent.
pub fn render_svg_plot(title: &str, variable: &str, samples: &[Sample]) -> String {
    let (min_x, max_x) = bounds(samples.iter().map(|s| s.x));
    let (mut min_y, mut max_y) = bounds(samples.iter().map(|s| s.y));
    if (max_y - min_y).abs() < f64::EPSILON {
        min_y -= 1.0;
        max_y += 1.0;
    }
    let span_x = if max_x > min_x { max_x - min_x } else { 1.0 };
    let span_y = max_y - min_y;

    let sx = |x: f64| MARGIN + (x - min_x) / span_x * (WIDTH - 2.0 * MARGIN);
    let sy = |y: f64| HEIGHT - MARGIN - (y - min_y) / span_y * (HEIGHT - 2.0 * MARGIN);

    let mut svg = String::new();
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{WIDTH}" height="{HEIGHT}" viewBox="0 0 {WIDTH} {HEIGHT}">"#
    );
    let _ = writeln!(svg, r#"  <rect width="100%" height="100%" fill="white"/>"#);
    let _ = writeln!(
        svg,
        r#"  <text x="{}" y="24" text-anchor="middle" font-family="sans-serif" font-size="16">{}</text>"#,
        WIDTH / 2.0,
        escape_xml(title)
    );

    // Axes: through zero if visible, otherwise along the plot edge
    let axis_y = if min_y <= 0.0 && 0.0 <= max_y { sy(0.0) } else { HEIGHT - MARGIN };
    let axis_x = if min_x <= 0.0 && 0.0 <= max_x { sx(0.0) } else { MARGIN };
    let _ = writeln!(
        svg,
        r##"  <line x1="{MARGIN}" y1="{axis_y:.2}" x2="{:.2}" y2="{axis_y:.2}" stroke="#888"/>"##,
        WIDTH - MARGIN
    );
    let _ = writeln!(
        svg,
        r##"  <line x1="{axis_x:.2}" y1="{MARGIN}" x2="{axis_x:.2}" y2="{:.2}" stroke="#888"/>"##,
        HEIGHT - MARGIN
    );
    let _ = writeln!(
        svg,
        r#"  <text x="{:.2}" y="{:.2}" font-family="sans-serif" font-size="12">{}</text>"#,
        WIDTH - MARGIN + 6.0,
        axis_y + 4.0,
        escape_xml(variable)
    );
    for (label, y) in [(fmt_num(max_y), MARGIN), (fmt_num(min_y), HEIGHT - MARGIN)] {
        let _ = writeln!(
            svg,
            r#"  <text x="4" y="{y:.2}" font-family="sans-serif" font-size="11">{label}</text>"#
        );
    }

    let points = samples
        .iter()
        .map(|s| format!("{:.2},{:.2}", sx(s.x), sy(s.y)))
        .collect::<Vec<_>>()
        .join(" ");
    let _ = writeln!(
        svg,
        r##"  <polyline fill="none" stroke="#1f77b4" stroke-width="2" points="{points}"/>"##
    );
    svg.push_str("</svg>\n");
    svg
}

/// Write [`render_svg_plot`] output to `path`.
pub fn write_svg_plot(
    path: &Path,
    title: &str,
    variable: &str,
    samples: &[Sample],
) -> Result<(), StudyBotError> {
    let svg = render_svg_plot(title, variable, samples);
    std::fs::write(path, svg).map_err(|e| StudyBotError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    })
}

fn bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if lo.is_finite() && hi.is_finite() {
        (lo, hi)
    } else {
        (0.0, 1.0)
    }
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
