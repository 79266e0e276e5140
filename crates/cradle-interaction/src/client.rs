//! HTTP content-generation client.
//!
//! Talks to the content-generation service over REST. Configuration comes
//! from the environment (`CRADLE_CONTENT_URL`, `CRADLE_API_TOKEN`) or is
//! injected by the caller. Streaming endpoints deliver the document as a
//! chunked text body; each chunk is appended to an accumulating buffer and
//! reported through the progress sink before the final parse.

use std::env;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::HeaderValue;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use cradle_core::content::model::{EndingSummary, GeneratedOutcome, InitialScene, SessionContext};
use cradle_core::content::service::{ContentService, ProgressSink};
use cradle_core::content::wire::{WireEnding, WireInitialScene, WireOutcome, WireQuestion};
use cradle_core::error::{CradleError, Result};
use cradle_core::session::question::Question;

/// Client for the content-generation REST service.
#[derive(Clone)]
pub struct HttpContentService {
    client: Client,
    base_url: String,
    api_token: Option<String>,
}

impl HttpContentService {
    /// Creates a client against the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_token: None,
        }
    }

    /// Loads configuration from environment variables.
    pub fn try_from_env() -> Result<Self> {
        let base_url = env::var("CRADLE_CONTENT_URL").map_err(|_| {
            CradleError::config("CRADLE_CONTENT_URL not set; content service unreachable")
        })?;
        let mut service = Self::new(base_url);
        if let Ok(token) = env::var("CRADLE_API_TOKEN") {
            service = service.with_token(token);
        }
        Ok(service)
    }

    /// Adds a bearer token sent with every request.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    fn request(&self, path: &str, body: &impl Serialize) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .post(self.endpoint(path))
            .header("content-type", "application/json")
            .json(body);
        if let Some(token) = &self.api_token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    /// Issues the request and reads the body, streaming chunks through the
    /// progress sink when one is provided.
    async fn fetch_document(
        &self,
        path: &str,
        body: &impl Serialize,
        progress: Option<ProgressSink>,
    ) -> Result<String> {
        let response = self
            .request(path, body)
            .send()
            .await
            .map_err(|err| CradleError::Generation {
                message: format!("content request failed: {err}"),
                retryable: err.is_connect() || err.is_timeout(),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let retry_after = parse_retry_after(response.headers().get("retry-after"));
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read error body".to_string());
            return Err(map_http_error(status, body_text, retry_after));
        }

        match progress {
            None => response.text().await.map_err(|err| {
                CradleError::generation(format!("failed to read content body: {err}"))
            }),
            Some(sink) => {
                let mut accumulated = String::new();
                let mut stream = response.bytes_stream();
                while let Some(chunk) = stream.next().await {
                    let chunk = chunk.map_err(|err| {
                        CradleError::generation_retryable(format!("content stream broke: {err}"))
                    })?;
                    accumulated.push_str(&String::from_utf8_lossy(&chunk));
                    sink(&accumulated);
                }
                Ok(accumulated)
            }
        }
    }

    async fn fetch_and_parse<W: DeserializeOwned>(
        &self,
        path: &str,
        body: &impl Serialize,
        progress: Option<ProgressSink>,
    ) -> Result<W> {
        let text = self.fetch_document(path, body, progress).await?;
        parse_document(&text)
    }
}

/// Parses the document span of a response body, tolerating narrative junk
/// around the braces.
pub fn parse_document<W: DeserializeOwned>(text: &str) -> Result<W> {
    let start = text.find('{').ok_or_else(|| {
        CradleError::generation(format!("no document in response: {}", preview(text)))
    })?;
    let end = text.rfind('}').ok_or_else(|| {
        CradleError::generation(format!("unterminated document in response: {}", preview(text)))
    })?;
    if end < start {
        return Err(CradleError::generation("malformed document in response"));
    }
    serde_json::from_str(&text[start..=end])
        .map_err(|err| CradleError::generation(format!("malformed content document: {err}")))
}

fn preview(text: &str) -> String {
    const LIMIT: usize = 80;
    if text.len() <= LIMIT {
        text.to_string()
    } else {
        let cut = text
            .char_indices()
            .take_while(|(i, _)| *i < LIMIT)
            .last()
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(0);
        format!("{}...", &text[..cut])
    }
}

#[derive(Serialize)]
struct InitialRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    requirements: Option<&'a str>,
}

#[derive(Serialize)]
struct QuestionRequest<'a> {
    context: &'a SessionContext,
}

#[derive(Serialize)]
struct OutcomeRequest<'a> {
    context: &'a SessionContext,
    question: &'a Question,
    choice: &'a str,
}

#[derive(Serialize)]
struct EndingRequest<'a> {
    context: &'a SessionContext,
}

#[async_trait]
impl ContentService for HttpContentService {
    async fn generate_initial_scene(
        &self,
        requirements: Option<&str>,
        progress: Option<ProgressSink>,
    ) -> Result<InitialScene> {
        let wire: WireInitialScene = self
            .fetch_and_parse("initial", &InitialRequest { requirements }, progress)
            .await?;
        Ok(wire.normalize())
    }

    async fn generate_question(
        &self,
        ctx: &SessionContext,
        progress: Option<ProgressSink>,
    ) -> Result<Question> {
        let wire: WireQuestion = self
            .fetch_and_parse("question", &QuestionRequest { context: ctx }, progress)
            .await?;
        Ok(wire.normalize())
    }

    async fn generate_outcome(
        &self,
        ctx: &SessionContext,
        question: &Question,
        choice_text: &str,
        progress: Option<ProgressSink>,
    ) -> Result<GeneratedOutcome> {
        let wire: WireOutcome = self
            .fetch_and_parse(
                "outcome",
                &OutcomeRequest {
                    context: ctx,
                    question,
                    choice: choice_text,
                },
                progress,
            )
            .await?;
        Ok(wire.normalize())
    }

    async fn generate_ending(&self, ctx: &SessionContext) -> Result<EndingSummary> {
        let wire: WireEnding = self
            .fetch_and_parse("ending", &EndingRequest { context: ctx }, None)
            .await?;
        Ok(wire.normalize())
    }
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

fn map_http_error(status: StatusCode, body: String, retry_after: Option<Duration>) -> CradleError {
    let message = serde_json::from_str::<ErrorResponse>(&body)
        .map(|wrapper| wrapper.error.message)
        .unwrap_or_else(|_| body.clone());

    let is_retryable = matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    );

    let suffix = match retry_after {
        Some(delay) => format!(" (retry after {}s)", delay.as_secs()),
        None => String::new(),
    };

    CradleError::Generation {
        message: format!("content service returned {status}: {message}{suffix}"),
        retryable: is_retryable,
    }
}

fn parse_retry_after(header: Option<&HeaderValue>) -> Option<Duration> {
    let value = header?.to_str().ok()?;
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    // Retry-After HTTP-date parsing is omitted for simplicity
    None
}
