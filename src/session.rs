//! The study session: one loaded document, one completion client, many
//! requests.
//!
//! A session replaces what a web page would keep in widget state. It owns
//! the [`DocumentCache`], so loading the same bytes twice skips extraction,
//! and loading different bytes replaces the current document.

use crate::config::{PageRange, StudyConfig};
use crate::document::{digest_bytes, Document, DocumentCache};
use crate::error::StudyBotError;
use crate::expr::{Expression, Sample, Sweep};
use crate::locate::find_pages;
use crate::mode::{Mode, Request};
use crate::output::{EvaluationResult, Response, ResponseBody};
use crate::pipeline::llm::{CompletionClient, CompletionRequest};
use crate::pipeline::{extract, input};
use crate::prompts;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Orchestrates load → select → prompt → complete for each request.
pub struct StudySession {
    config: StudyConfig,
    client: Option<CompletionClient>,
    cache: DocumentCache,
}

impl StudySession {
    /// Session with a completion client for the model-backed modes.
    pub fn new(config: StudyConfig, client: CompletionClient) -> Self {
        Self {
            config,
            client: Some(client),
            cache: DocumentCache::new(),
        }
    }

    /// Session that can only find pages and solve expressions.
    ///
    /// Model-backed requests fail with [`StudyBotError::ProviderNotConfigured`].
    pub fn offline(config: StudyConfig) -> Self {
        Self {
            config,
            client: None,
            cache: DocumentCache::new(),
        }
    }

    pub fn config(&self) -> &StudyConfig {
        &self.config
    }

    /// The currently loaded document, if any.
    pub fn document(&self) -> Option<Arc<Document>> {
        self.cache.current()
    }

    /// Load a PDF from a local path or URL.
    pub async fn load(&mut self, input_str: &str) -> Result<Arc<Document>, StudyBotError> {
        info!("Loading {}", input_str);
        let loaded = input::resolve_input(input_str, self.config.download_timeout_secs).await?;
        self.load_bytes(&loaded.source, loaded.bytes).await
    }

    /// Load a PDF already in memory. `source` is only used in messages.
    pub async fn load_bytes(
        &mut self,
        source: &str,
        bytes: Vec<u8>,
    ) -> Result<Arc<Document>, StudyBotError> {
        input::check_magic(source, &bytes)?;
        let digest = digest_bytes(&bytes);

        if let Some(doc) = self.cache.get(&digest) {
            debug!("Cache hit for {} ({})", source, &digest[..12]);
            self.notify_loaded(&doc, true);
            return Ok(doc);
        }

        let document = extract::extract_document(source, bytes).await?;
        let doc = self.cache.insert(document);
        self.notify_loaded(&doc, false);
        Ok(doc)
    }

    /// Forget the current document.
    pub fn unload(&mut self) {
        self.cache.invalidate();
    }

    /// Run one request against the current document.
    pub async fn handle(&self, request: Request) -> Result<Response, StudyBotError> {
        let mode = request.mode();
        let start = Instant::now();
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_request_start(mode);
        }

        let result = self.dispatch(request).await;

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_request_complete(mode, result.is_ok());
        }
        let (context, body) = result?;
        Ok(Response {
            mode,
            context,
            body,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn dispatch(
        &self,
        request: Request,
    ) -> Result<(Option<PageRange>, ResponseBody), StudyBotError> {
        match request {
            Request::Ask { question, pages } => {
                if question.trim().is_empty() {
                    return Err(StudyBotError::InvalidInput(
                        "question must not be empty".into(),
                    ));
                }
                let doc = self.require_document()?;
                let context = doc.select_or_all(pages)?;
                let prompt = prompts::ask_prompt(&question, context);
                Ok((pages, self.complete(prompt).await?))
            }
            Request::Summarize { pages } => {
                let doc = self.require_document()?;
                let context = doc.select(pages)?;
                let prompt = prompts::summarize_prompt(context);
                Ok((Some(pages), self.complete(prompt).await?))
            }
            Request::Quiz {
                pages,
                topic,
                multiple_choice,
            } => {
                let doc = self.require_document()?;
                let context = doc.select_or_all(pages)?;
                let topic = topic.as_deref().map(str::trim).filter(|t| !t.is_empty());
                let prompt = prompts::quiz_prompt(context, topic, multiple_choice);
                Ok((pages, self.complete(prompt).await?))
            }
            Request::FindPages { keyword } => {
                let doc = self.require_document()?;
                let pages = find_pages(&keyword, doc.pages())?;
                debug!("'{}' found on {} page(s)", keyword, pages.len());
                Ok((None, ResponseBody::Pages { keyword, pages }))
            }
            Request::Solve {
                expression,
                at,
                sweep,
            } => {
                let result = self.solve(&expression, at, sweep.as_ref())?;
                Ok((None, ResponseBody::Evaluation(result)))
            }
        }
    }

    fn solve(
        &self,
        expression: &str,
        at: Option<f64>,
        sweep: Option<&Sweep>,
    ) -> Result<EvaluationResult, StudyBotError> {
        let expr = Expression::parse(expression, &self.config.variable)?;
        let point = match at {
            Some(x) => Some(Sample {
                x,
                y: expr.evaluate(x)?,
            }),
            None => None,
        };
        let samples = match sweep {
            Some(s) => expr.sweep(s)?,
            None => Vec::new(),
        };
        if point.is_none() && samples.is_empty() {
            return Err(StudyBotError::InvalidInput(
                "solve needs a value (--at) or a sweep (--sweep)".into(),
            ));
        }
        Ok(EvaluationResult {
            expression: expr.source().to_string(),
            variable: expr.variable().to_string(),
            point,
            samples,
        })
    }

    async fn complete(&self, prompt: String) -> Result<ResponseBody, StudyBotError> {
        let client = self.client.as_ref().ok_or_else(|| StudyBotError::ProviderNotConfigured {
            provider: self
                .config
                .provider_name
                .clone()
                .unwrap_or_else(|| "auto".to_string()),
            hint: "this session was started without a completion client".to_string(),
        })?;

        let request = CompletionRequest {
            system: self.config.system_prompt.clone(),
            prompt,
            model: self.config.model_or_default().to_string(),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };
        debug!("Prompt is {} chars", request.prompt.len());
        let completion = client.complete(&request).await?;
        Ok(ResponseBody::Completion(completion))
    }

    fn require_document(&self) -> Result<Arc<Document>, StudyBotError> {
        self.cache.current().ok_or(StudyBotError::NoDocument)
    }

    fn notify_loaded(&self, doc: &Document, cached: bool) {
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_document_loaded(&doc.source, doc.page_count(), cached);
        }
    }
}

/// Whether `mode` can run in a session built with [`StudySession::offline`].
pub fn runs_offline(mode: Mode) -> bool {
    !mode.uses_model()
}
