//! OpenAI-compatible chat/completions client implementing `TextOracle`.
//! Connection pooling via reqwest, manual SSE parsing, strict JSON-schema
//! structured output, simple request pacing, bounded retries.
//!
//! The per-attempt timeout covers connecting and waiting for the first
//! streamed content only. Once content has started arriving the stream is
//! allowed to finish no matter how long it takes.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use super::prompts::{
    self, ClassifyEnvelope, ExamplesEnvelope, Prompt, SynonymsEnvelope, TranslationEnvelope,
};
use super::{Classification, DraftTranslation, ExampleSentence, TextOracle};
use crate::config::OracleConfig;
use crate::error::OracleError;

/// Longest wait honoured from a `Retry-After` header.
const MAX_RATE_LIMIT_WAIT: Duration = Duration::from_secs(10);

pub struct OpenAiOracle {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    timeout: Duration,
    max_attempts: u32,
    /// Tracks the next allowed request time.
    next_allowed: Arc<tokio::sync::Mutex<Instant>>,
    min_interval: Duration,
}

impl OpenAiOracle {
    /// Build a client, reading the API key from the env var named in `config`.
    pub fn new(config: &OracleConfig) -> Result<Self, OracleError> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            OracleError::Config(format!("{} environment variable not set", config.api_key_env))
        })?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: &OracleConfig, api_key: String) -> Result<Self, OracleError> {
        let timeout = Duration::from_millis(config.timeout_ms);
        // No whole-request timeout: it would cut off long streamed answers.
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(90))
            .connect_timeout(timeout)
            .build()
            .map_err(|e| OracleError::Config(e.to_string()))?;

        Ok(Self {
            http,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            timeout,
            max_attempts: config.max_attempts.max(1),
            next_allowed: Arc::new(tokio::sync::Mutex::new(Instant::now())),
            min_interval: Duration::from_millis(config.min_interval_ms),
        })
    }

    /// Wait until the pacing window allows a request.
    async fn pace(&self) {
        if self.min_interval.is_zero() {
            return;
        }
        let mut next = self.next_allowed.lock().await;
        let now = Instant::now();
        if *next > now {
            tokio::time::sleep(*next - now).await;
        }
        *next = Instant::now() + self.min_interval;
    }

    /// Run `prompt` with retries and decode the answer through envelope `E`.
    /// An empty answer on the final attempt is `Ok(None)`.
    async fn call<E, T>(&self, prompt: &Prompt) -> Result<Option<T>, OracleError>
    where
        E: DeserializeOwned,
        T: From<E>,
    {
        let mut last_err: Option<OracleError> = None;

        for attempt in 1..=self.max_attempts {
            self.pace().await;
            let start = Instant::now();

            match self.attempt(prompt).await {
                Ok(content) if content.trim().is_empty() => {
                    warn!(prompt = prompt.name, attempt, "oracle answer is empty");
                    last_err = None;
                }
                Ok(content) => match serde_json::from_str::<E>(&content) {
                    Ok(envelope) => {
                        debug!(
                            prompt = prompt.name,
                            attempt,
                            elapsed_ms = start.elapsed().as_millis() as u64,
                            "oracle answered"
                        );
                        return Ok(Some(T::from(envelope)));
                    }
                    Err(e) => {
                        warn!(prompt = prompt.name, attempt, error = %e, "oracle answer malformed");
                        last_err = Some(OracleError::Decode(e.to_string()));
                    }
                },
                Err(OracleError::RateLimited { retry_after_ms }) if attempt < self.max_attempts => {
                    let wait = Duration::from_millis(retry_after_ms).min(MAX_RATE_LIMIT_WAIT);
                    warn!(
                        prompt = prompt.name,
                        attempt,
                        wait_ms = wait.as_millis() as u64,
                        "429 rate limited, retrying"
                    );
                    tokio::time::sleep(wait).await;
                    last_err = Some(OracleError::RateLimited { retry_after_ms });
                }
                Err(e) => {
                    warn!(prompt = prompt.name, attempt, error = %e, "oracle call failed");
                    last_err = Some(e);
                }
            }
        }

        match last_err {
            None => Ok(None),
            Some(e) => Err(e),
        }
    }

    /// One streamed request. Returns the concatenated content deltas.
    async fn attempt(&self, prompt: &Prompt) -> Result<String, OracleError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": prompt.system},
                {"role": "user", "content": prompt.user}
            ],
            "stream": true,
            "temperature": self.temperature,
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": prompt.name,
                    "strict": true,
                    "schema": prompt.schema
                }
            }
        });

        let deadline = tokio::time::sleep(self.timeout);
        tokio::pin!(deadline);

        let request = self
            .http
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send();

        let response = tokio::select! {
            result = request => result.map_err(map_transport)?,
            _ = &mut deadline => return Err(OracleError::Timeout),
        };

        let status = response.status();
        if status.as_u16() == 429 {
            let retry_after_ms = retry_after_ms(response.headers());
            return Err(OracleError::RateLimited { retry_after_ms });
        }
        if !status.is_success() {
            let body_text = tokio::select! {
                body = response.text() => body.unwrap_or_default(),
                _ = &mut deadline => return Err(OracleError::Timeout),
            };
            return Err(OracleError::Api(format!(
                "unexpected status {}: {}",
                status,
                body_text.chars().take(200).collect::<String>()
            )));
        }

        let mut stream = response.bytes_stream();
        let mut sse = SseBuffer::default();
        let mut content = String::new();
        let mut streaming = false;

        loop {
            let next = if streaming {
                stream.next().await
            } else {
                tokio::select! {
                    chunk = stream.next() => chunk,
                    _ = &mut deadline => return Err(OracleError::Timeout),
                }
            };
            let Some(chunk) = next else { break };
            let bytes = chunk.map_err(map_transport)?;
            for delta in sse.push(&bytes) {
                streaming = true;
                content.push_str(&delta);
            }
            if sse.is_done() {
                break;
            }
        }

        Ok(content)
    }
}

/// `Retry-After` in milliseconds (seconds form only), defaulting to 1s.
fn retry_after_ms(headers: &reqwest::header::HeaderMap) -> u64 {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(|secs| secs.saturating_mul(1000))
        .unwrap_or(1000)
}

fn map_transport(e: reqwest::Error) -> OracleError {
    if e.is_timeout() {
        OracleError::Timeout
    } else {
        OracleError::Api(e.to_string())
    }
}

#[async_trait]
impl TextOracle for OpenAiOracle {
    async fn classify(&self, text: &str) -> Result<Option<Classification>, OracleError> {
        self.call::<ClassifyEnvelope, Classification>(&prompts::classify(text))
            .await
    }

    async fn translate_and_synonymize(
        &self,
        text: &str,
        want_synonyms: bool,
        source_language: &str,
        target_language: &str,
    ) -> Result<Option<DraftTranslation>, OracleError> {
        let prompt = prompts::translate(text, want_synonyms, source_language, target_language);
        self.call::<TranslationEnvelope, DraftTranslation>(&prompt)
            .await
    }

    async fn synonymize(
        &self,
        text: &str,
        language: &str,
    ) -> Result<Option<Vec<String>>, OracleError> {
        self.call::<SynonymsEnvelope, Vec<String>>(&prompts::synonyms(text, language))
            .await
    }

    async fn example_sentences(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<Option<Vec<ExampleSentence>>, OracleError> {
        let prompt = prompts::example_sentences(text, source_language, target_language);
        self.call::<ExamplesEnvelope, Vec<ExampleSentence>>(&prompt)
            .await
    }
}

// --- SSE parsing ---

/// Line buffer for `data:` events split across network chunks.
#[derive(Default)]
struct SseBuffer {
    pending: Vec<u8>,
    done: bool,
}

impl SseBuffer {
    /// Feed raw bytes; returns the content deltas from every complete line.
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let mut deltas = Vec::new();

        while let Some(newline_pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=newline_pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim();

            let Some(data) = line.strip_prefix("data:") else {
                continue;
            };
            let data = data.trim_start();
            if data == "[DONE]" {
                self.done = true;
                continue;
            }
            if let Ok(parsed) = serde_json::from_str::<SseChunk>(data) {
                if let Some(content) = parsed
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.delta.content)
                {
                    if !content.is_empty() {
                        deltas.push(content);
                    }
                }
            }
        }

        deltas
    }

    fn is_done(&self) -> bool {
        self.done
    }
}

#[derive(Deserialize)]
struct SseChunk {
    choices: Vec<SseChoice>,
}

#[derive(Deserialize)]
struct SseChoice {
    delta: SseDelta,
}

#[derive(Deserialize)]
struct SseDelta {
    content: Option<String>,
}
