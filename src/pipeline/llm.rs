//! Completion client: send one prompt, retry transient failures.
//!
//! The client talks to the model through the [`CompletionTransport`] trait.
//! [`ProviderTransport`] is the production implementation over an
//! `edgequake_llm` provider; tests substitute scripted transports.
//!
//! ## Retry Strategy
//!
//! Only three failure kinds are retried: rate limits, connection failures
//! (including the per-attempt timeout), and upstream status errors. Anything
//! else fails on the first attempt. Between attempts the client sleeps
//! [`RetryPolicy::delay_before`], which doubles from the floor up to the cap
//! (4 s → 8 s with defaults). When the budget runs out the last transient
//! error is returned with the number of attempts made.

use crate::config::{RetryPolicy, StudyConfig};
use crate::error::{StudyBotError, TransientKind};
use crate::progress::ProgressCallback;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, LlmError, ProviderFactory};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, info, warn};

/// One fully-formed request to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Optional system-role message sent before the prompt.
    pub system: Option<String>,
    /// The user-role message.
    pub prompt: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: usize,
}

/// What a transport returns for a successful call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransportReply {
    /// Text of the first choice.
    pub content: String,
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
}

/// A failed call, already classified.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    #[error("{kind}: {detail}")]
    Transient { kind: TransientKind, detail: String },
    #[error("{0}")]
    Permanent(String),
}

/// Sends a single request to a chat-completion endpoint.
#[async_trait]
pub trait CompletionTransport: Send + Sync {
    async fn send(&self, request: &CompletionRequest) -> Result<TransportReply, TransportError>;
}

/// [`CompletionTransport`] over an `edgequake_llm` provider.
pub struct ProviderTransport {
    provider: Arc<dyn LLMProvider>,
}

impl ProviderTransport {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl CompletionTransport for ProviderTransport {
    async fn send(&self, request: &CompletionRequest) -> Result<TransportReply, TransportError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = request.system.as_deref() {
            messages.push(ChatMessage::system(system));
        }
        messages.push(ChatMessage::user(request.prompt.as_str()));

        let options = CompletionOptions {
            temperature: Some(request.temperature),
            max_tokens: Some(request.max_tokens),
            ..Default::default()
        };

        match self.provider.chat(&messages, Some(&options)).await {
            Ok(response) => Ok(TransportReply {
                content: response.content,
                prompt_tokens: response.prompt_tokens as usize,
                completion_tokens: response.completion_tokens as usize,
            }),
            Err(e) => Err(classify_llm_error(&e)),
        }
    }
}

/// Map a provider error onto the retry classification.
///
/// `ApiError` carries non-2xx upstream responses, which are the
/// "upstream status" kind; auth, config and request-shape errors are
/// permanent.
pub fn classify_llm_error(err: &LlmError) -> TransportError {
    let detail = err.to_string();
    let kind = match err {
        LlmError::RateLimited(_) => TransientKind::RateLimited,
        LlmError::NetworkError(_) => TransientKind::Connection,
        LlmError::ApiError(_) => TransientKind::UpstreamStatus,
        _ => return TransportError::Permanent(detail),
    };
    TransportError::Transient { kind, detail }
}

/// A successful completion plus bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Completion {
    pub text: String,
    pub model: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
    /// Attempts made, including the successful one.
    pub attempts: u32,
    pub duration_ms: u64,
}

/// Sends prompts with bounded retry. Constructed once by the entry point
/// and owned by the session.
pub struct CompletionClient {
    transport: Arc<dyn CompletionTransport>,
    policy: RetryPolicy,
    attempt_timeout: Duration,
    progress: Option<ProgressCallback>,
}

impl CompletionClient {
    pub fn new(transport: Arc<dyn CompletionTransport>, policy: RetryPolicy) -> Self {
        Self {
            transport,
            policy,
            attempt_timeout: Duration::from_secs(60),
            progress: None,
        }
    }

    /// Build a client from config, resolving the provider from it or the
    /// environment.
    pub fn from_config(config: &StudyConfig) -> Result<Self, StudyBotError> {
        let provider = resolve_provider(config)?;
        Ok(Self::new(Arc::new(ProviderTransport::new(provider)), config.retry)
            .with_attempt_timeout(Duration::from_secs(config.api_timeout_secs))
            .with_progress(config.progress_callback.clone()))
    }

    pub fn with_attempt_timeout(mut self, t: Duration) -> Self {
        self.attempt_timeout = t;
        self
    }

    pub fn with_progress(mut self, cb: Option<ProgressCallback>) -> Self {
        self.progress = cb;
        self
    }

    /// Send `request`, retrying transient failures per the policy.
    pub async fn complete(&self, request: &CompletionRequest) -> Result<Completion, StudyBotError> {
        let start = Instant::now();
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            if let Some(ref cb) = self.progress {
                cb.on_attempt_start(attempt, max_attempts);
            }

            let outcome = match timeout(self.attempt_timeout, self.transport.send(request)).await {
                Ok(result) => result,
                Err(_) => Err(TransportError::Transient {
                    kind: TransientKind::Connection,
                    detail: format!(
                        "no response within {}s",
                        self.attempt_timeout.as_secs()
                    ),
                }),
            };

            match outcome {
                Ok(reply) => {
                    let duration = start.elapsed();
                    debug!(
                        "{}: {} input tokens, {} output tokens, {:?}",
                        request.model, reply.prompt_tokens, reply.completion_tokens, duration
                    );
                    info!("Completion received after {} attempt(s)", attempt);
                    return Ok(Completion {
                        text: reply.content,
                        model: request.model.clone(),
                        input_tokens: reply.prompt_tokens,
                        output_tokens: reply.completion_tokens,
                        attempts: attempt,
                        duration_ms: duration.as_millis() as u64,
                    });
                }
                Err(TransportError::Permanent(detail)) => {
                    warn!("Attempt {} failed permanently: {}", attempt, detail);
                    return Err(StudyBotError::PermanentApi { detail });
                }
                Err(TransportError::Transient { kind, detail }) => {
                    if attempt >= max_attempts {
                        warn!("Giving up after {} attempts: {}", attempt, detail);
                        return Err(StudyBotError::RetriesExhausted {
                            attempts: attempt,
                            kind,
                            detail,
                        });
                    }
                    let backoff = self.policy.delay_before(attempt);
                    warn!(
                        "Attempt {}/{} failed ({}): {}; retrying in {:?}",
                        attempt, max_attempts, kind, detail, backoff
                    );
                    if let Some(ref cb) = self.progress {
                        cb.on_retry(attempt, kind, backoff, &detail);
                    }
                    sleep(backoff).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`): used as-is.
/// 2. **Named provider** (`config.provider_name`) plus the configured model.
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
/// 4. **OpenAI** when `OPENAI_API_KEY` is set.
/// 5. **Full auto-detection** via `ProviderFactory::from_env`.
///
/// API keys are read by the factory and never pass through this crate.
pub fn resolve_provider(config: &StudyConfig) -> Result<Arc<dyn LLMProvider>, StudyBotError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        return create_provider(name, config.model_or_default());
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    if std::env::var("OPENAI_API_KEY").is_ok_and(|k| !k.is_empty()) {
        return create_provider("openai", config.model_or_default());
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| StudyBotError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or pass --provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, StudyBotError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        StudyBotError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays a fixed script of outcomes and records when each call happened.
    struct ScriptedTransport {
        script: Mutex<VecDeque<Result<TransportReply, TransportError>>>,
        calls: Mutex<Vec<tokio::time::Instant>>,
    }

    impl ScriptedTransport {
        fn new(script: Vec<Result<TransportReply, TransportError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn call_times(&self) -> Vec<tokio::time::Instant> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CompletionTransport for ScriptedTransport {
        async fn send(&self, _request: &CompletionRequest) -> Result<TransportReply, TransportError> {
            self.calls.lock().unwrap().push(tokio::time::Instant::now());
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::Permanent("script exhausted".into())))
        }
    }

    fn request() -> CompletionRequest {
        CompletionRequest {
            system: None,
            prompt: "Explain inertia".into(),
            model: "test-model".into(),
            temperature: 0.2,
            max_tokens: 256,
        }
    }

    fn ok(text: &str) -> Result<TransportReply, TransportError> {
        Ok(TransportReply {
            content: text.into(),
            prompt_tokens: 10,
            completion_tokens: 5,
        })
    }

    fn transient(kind: TransientKind) -> Result<TransportReply, TransportError> {
        Err(TransportError::Transient {
            kind,
            detail: format!("{kind}"),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_third_attempt_with_growing_backoff() {
        let transport = ScriptedTransport::new(vec![
            transient(TransientKind::RateLimited),
            transient(TransientKind::Connection),
            ok("Inertia is..."),
        ]);
        let client = CompletionClient::new(transport.clone(), RetryPolicy::default());

        let completion = client.complete(&request()).await.unwrap();
        assert_eq!(completion.text, "Inertia is...");
        assert_eq!(completion.attempts, 3);

        let times = transport.call_times();
        assert_eq!(times.len(), 3);
        let first_gap = times[1] - times[0];
        let second_gap = times[2] - times[1];
        assert!(first_gap >= Duration::from_secs(4), "{first_gap:?}");
        assert!(second_gap >= first_gap, "{second_gap:?} < {first_gap:?}");
        assert!(second_gap <= Duration::from_secs(10) + Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_error_is_not_retried() {
        let transport = ScriptedTransport::new(vec![
            Err(TransportError::Permanent("401 invalid api key".into())),
            ok("never reached"),
        ]);
        let client = CompletionClient::new(transport.clone(), RetryPolicy::default());

        let err = client.complete(&request()).await.unwrap_err();
        assert!(matches!(err, StudyBotError::PermanentApi { .. }), "{err:?}");
        assert_eq!(transport.call_times().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_report_attempts() {
        let transport = ScriptedTransport::new(vec![
            transient(TransientKind::UpstreamStatus),
            transient(TransientKind::UpstreamStatus),
            transient(TransientKind::UpstreamStatus),
            ok("too late"),
        ]);
        let client = CompletionClient::new(transport.clone(), RetryPolicy::default());

        match client.complete(&request()).await {
            Err(StudyBotError::RetriesExhausted { attempts, kind, .. }) => {
                assert_eq!(attempts, 3);
                assert_eq!(kind, TransientKind::UpstreamStatus);
            }
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
        assert_eq!(transport.call_times().len(), 3);
    }

    struct SlowTransport;

    #[async_trait]
    impl CompletionTransport for SlowTransport {
        async fn send(&self, _request: &CompletionRequest) -> Result<TransportReply, TransportError> {
            sleep(Duration::from_secs(3600)).await;
            Ok(TransportReply::default())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_counts_as_connection_failure() {
        let policy = RetryPolicy {
            max_attempts: 2,
            ..RetryPolicy::default()
        };
        let client = CompletionClient::new(Arc::new(SlowTransport), policy)
            .with_attempt_timeout(Duration::from_secs(5));

        match client.complete(&request()).await {
            Err(StudyBotError::RetriesExhausted { attempts, kind, detail }) => {
                assert_eq!(attempts, 2);
                assert_eq!(kind, TransientKind::Connection);
                assert!(detail.contains("5s"));
            }
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
    }

    #[test]
    fn classify_provider_errors() {
        let rate = classify_llm_error(&LlmError::RateLimited("slow down".into()));
        assert!(matches!(
            rate,
            TransportError::Transient {
                kind: TransientKind::RateLimited,
                ..
            }
        ));
        let net = classify_llm_error(&LlmError::NetworkError("reset".into()));
        assert!(matches!(
            net,
            TransportError::Transient {
                kind: TransientKind::Connection,
                ..
            }
        ));
        let auth = classify_llm_error(&LlmError::AuthError("bad key".into()));
        assert!(matches!(auth, TransportError::Permanent(_)));
    }
}
