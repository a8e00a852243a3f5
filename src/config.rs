//! Configuration types for study requests.
//!
//! [`StudyConfig`] holds every knob of a session: which model to call, how to
//! retry, how long to wait for downloads and API calls. It is built via
//! [`StudyConfigBuilder`] so callers only set what they care about.
//!
//! [`RetryPolicy`] and [`PageRange`] live here too because both are plain
//! values that the CLI parses and the library validates.

use crate::error::StudyBotError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Default model when neither `--model` nor `EDGEQUAKE_MODEL` is set.
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";

/// Configuration for a [`crate::session::StudySession`].
///
/// # Example
/// ```rust
/// use edgequake_studybot::StudyConfig;
///
/// let config = StudyConfig::builder()
///     .model("gpt-4.1-mini")
///     .temperature(0.3)
///     .build()
///     .unwrap();
/// assert_eq!(config.retry.max_attempts, 3);
/// ```
#[derive(Clone)]
pub struct StudyConfig {
    /// LLM model identifier, e.g. "gpt-4.1-mini", "claude-sonnet-4-20250514".
    /// If None, uses [`DEFAULT_MODEL`].
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider`, the provider is auto-detected.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature in [0, 1]. Default: 0.2.
    pub temperature: f32,

    /// Maximum tokens the model may generate per answer. Default: 2048.
    pub max_tokens: usize,

    /// Retry behaviour for transient API failures.
    pub retry: RetryPolicy,

    /// Optional system message sent before the prompt.
    pub system_prompt: Option<String>,

    /// Name of the single free variable in `solve` expressions. Default: "x".
    pub variable: String,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Per-attempt API call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Optional observer for request and retry events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.2,
            max_tokens: 2048,
            retry: RetryPolicy::default(),
            system_prompt: None,
            variable: "x".to_string(),
            download_timeout_secs: 120,
            api_timeout_secs: 60,
            progress_callback: None,
        }
    }
}

// The provider holds credentials; never print it.
impl fmt::Debug for StudyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StudyConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("retry", &self.retry)
            .field("variable", &self.variable)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .finish()
    }
}

impl StudyConfig {
    /// Create a new builder for `StudyConfig`.
    pub fn builder() -> StudyConfigBuilder {
        StudyConfigBuilder {
            config: Self::default(),
        }
    }

    /// The model that will be requested.
    pub fn model_or_default(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }
}

/// Builder for [`StudyConfig`].
pub struct StudyConfigBuilder {
    config: StudyConfig,
}

impl StudyConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    /// Set the temperature. Checked by [`Self::build`], not clamped.
    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t;
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.config.retry = policy;
        self
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.config.retry.max_attempts = n;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn variable(mut self, name: impl Into<String>) -> Self {
        self.config.variable = name.into();
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<StudyConfig, StudyBotError> {
        let c = &self.config;
        if !(0.0..=1.0).contains(&c.temperature) {
            return Err(StudyBotError::InvalidConfig(format!(
                "temperature must be 0.0–1.0, got {}",
                c.temperature
            )));
        }
        if c.retry.max_attempts == 0 {
            return Err(StudyBotError::InvalidConfig(
                "max attempts must be ≥ 1".into(),
            ));
        }
        if c.retry.initial_delay > c.retry.max_delay {
            return Err(StudyBotError::InvalidConfig(format!(
                "initial retry delay {:?} exceeds max delay {:?}",
                c.retry.initial_delay, c.retry.max_delay
            )));
        }
        let var = c.variable.as_str();
        let valid_var = var.chars().next().is_some_and(|ch| ch.is_ascii_alphabetic())
            && var.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_');
        if !valid_var {
            return Err(StudyBotError::InvalidConfig(format!(
                "variable name '{var}' must be an ASCII identifier"
            )));
        }
        if c.api_timeout_secs == 0 {
            return Err(StudyBotError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Retry policy ─────────────────────────────────────────────────────────

/// Bounded exponential backoff.
///
/// The delay before retry `n` (1-based) is `initial_delay * 2^(n-1)`, capped
/// at `max_delay`. With the defaults (3 attempts, 4 s floor, 10 s cap) the
/// waits are 4 s then 8 s, so the worst case adds 12 s to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first. Default: 3.
    pub max_attempts: u32,
    /// Delay before the first retry. Default: 4 s.
    pub initial_delay: Duration,
    /// Upper bound on any single delay. Default: 10 s.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(4),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait before retry number `retry` (1 = the first retry).
    pub fn delay_before(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(31);
        self.initial_delay
            .saturating_mul(1u32 << exp)
            .min(self.max_delay)
    }
}

// ── Page ranges ──────────────────────────────────────────────────────────

/// An inclusive, 1-based range of pages, e.g. `"3-7"` or `"5"`.
///
/// Parsing only checks syntax; [`PageRange::validate`] checks the range
/// against a concrete document and never clips it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub start: usize,
    pub end: usize,
}

impl PageRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn single(page: usize) -> Self {
        Self {
            start: page,
            end: page,
        }
    }

    /// Fail with [`StudyBotError::Range`] unless every page exists in a
    /// document of `total_pages` pages.
    pub fn validate(&self, total_pages: usize) -> Result<(), StudyBotError> {
        if self.start < 1 || self.end > total_pages || self.start > self.end {
            return Err(StudyBotError::Range {
                start: self.start,
                end: self.end,
                total: total_pages,
            });
        }
        Ok(())
    }

    /// 0-indexed positions of the covered pages.
    pub fn indices(&self) -> std::ops::Range<usize> {
        (self.start - 1)..self.end
    }
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

impl FromStr for PageRange {
    type Err = StudyBotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| StudyBotError::InvalidRange {
            input: s.to_string(),
            reason: reason.to_string(),
        };
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(invalid("expected '<start>-<end>' or a page number"));
        }

        let (start, end) = match trimmed.split_once('-') {
            Some((a, b)) => (
                a.trim()
                    .parse::<usize>()
                    .map_err(|_| invalid("start is not a page number"))?,
                b.trim()
                    .parse::<usize>()
                    .map_err(|_| invalid("end is not a page number"))?,
            ),
            None => {
                let p = trimmed
                    .parse::<usize>()
                    .map_err(|_| invalid("not a page number"))?;
                (p, p)
            }
        };

        if start < 1 {
            return Err(invalid("pages are 1-indexed"));
        }
        if start > end {
            return Err(invalid("start must be <= end"));
        }
        Ok(Self { start, end })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let c = StudyConfig::builder().build().unwrap();
        assert_eq!(c.temperature, 0.2);
        assert_eq!(c.retry, RetryPolicy::default());
        assert_eq!(c.model_or_default(), DEFAULT_MODEL);
        assert_eq!(c.variable, "x");
    }

    #[test]
    fn temperature_out_of_range_rejected() {
        assert!(StudyConfig::builder().temperature(1.5).build().is_err());
        assert!(StudyConfig::builder().temperature(-0.1).build().is_err());
        assert!(StudyConfig::builder().temperature(1.0).build().is_ok());
    }

    #[test]
    fn zero_attempts_rejected() {
        let err = StudyConfig::builder().max_attempts(0).build().unwrap_err();
        assert!(matches!(err, StudyBotError::InvalidConfig(_)));
    }

    #[test]
    fn bad_variable_rejected() {
        assert!(StudyConfig::builder().variable("2x").build().is_err());
        assert!(StudyConfig::builder().variable("").build().is_err());
        assert!(StudyConfig::builder().variable("t_1").build().is_ok());
    }

    #[test]
    fn debug_hides_provider() {
        let c = StudyConfig::default();
        let dbg = format!("{c:?}");
        assert!(dbg.contains("StudyConfig"));
        assert!(!dbg.to_lowercase().contains("key"));
    }

    #[test]
    fn backoff_grows_then_caps() {
        let p = RetryPolicy::default();
        assert_eq!(p.delay_before(1), Duration::from_secs(4));
        assert_eq!(p.delay_before(2), Duration::from_secs(8));
        assert_eq!(p.delay_before(3), Duration::from_secs(10));
        assert_eq!(p.delay_before(40), Duration::from_secs(10));
    }

    #[test]
    fn parse_range_and_single() {
        assert_eq!("3-7".parse::<PageRange>().unwrap(), PageRange::new(3, 7));
        assert_eq!(" 2 - 4 ".parse::<PageRange>().unwrap(), PageRange::new(2, 4));
        assert_eq!("5".parse::<PageRange>().unwrap(), PageRange::single(5));
    }

    #[test]
    fn parse_range_rejects_garbage() {
        for s in ["", "0-3", "5-2", "a-b", "3-", "-3", "1,2"] {
            assert!(s.parse::<PageRange>().is_err(), "accepted {s:?}");
        }
    }

    #[test]
    fn validate_reports_instead_of_clipping() {
        let r = PageRange::new(10, 15);
        match r.validate(8) {
            Err(StudyBotError::Range { start, end, total }) => {
                assert_eq!((start, end, total), (10, 15, 8));
            }
            other => panic!("expected Range error, got {other:?}"),
        }
        // Partially overlapping is still an error
        assert!(PageRange::new(6, 9).validate(8).is_err());
        assert!(PageRange::new(1, 8).validate(8).is_ok());
    }

    #[test]
    fn indices_are_zero_based() {
        assert_eq!(PageRange::new(2, 4).indices().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(PageRange::single(1).indices().len(), 1);
        assert_eq!(PageRange::new(2, 4).to_string(), "2-4");
    }
}
