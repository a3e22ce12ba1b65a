//! ModelBackend implementation for ClaudeClient (single request + streaming).

use std::ops::ControlFlow;

use async_trait::async_trait;
use futures_util::stream;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::backend::{EventStream, ModelBackend, ModelRequest, ModelResponse};
use crate::streaming::{parse_sse_stream, SseEvent};
use crate::AiError;

use super::client::ClaudeClient;
use super::events::decode_event;

impl ClaudeClient {
    /// POST a request body and check the HTTP status.
    async fn post(&self, body: &Value) -> Result<reqwest::Response, AiError> {
        let response = self
            .http
            .post(&self.config.api_url)
            .headers(self.auth_headers()?)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AiError::Timeout
                } else {
                    AiError::NetworkError(e.to_string())
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(AiError::RateLimited);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let text = text.chars().take(200).collect::<String>();
            return Err(AiError::ApiError(format!("HTTP {status}: {text}")));
        }

        Ok(response)
    }
}

#[async_trait]
impl ModelBackend for ClaudeClient {
    fn name(&self) -> &str {
        "claude"
    }

    async fn generate(&self, request: &ModelRequest) -> Result<ModelResponse, AiError> {
        let body = self.build_request_body(request, false);

        debug!(
            model = %self.config.model,
            turns = request.turns.len(),
            tools = request.catalog.len(),
            "Claude API request"
        );

        let response = self.post(&body).await?;
        let json: Value = response
            .json()
            .await
            .map_err(|e| AiError::ParseError(e.to_string()))?;

        self.parse_response(json)
    }

    async fn stream(&self, request: &ModelRequest) -> Result<EventStream, AiError> {
        let body = self.build_request_body(request, true);

        debug!(
            model = %self.config.model,
            turns = request.turns.len(),
            tools = request.catalog.len(),
            "Claude API streaming request"
        );

        let response = self.post(&body).await?;

        // The reader task stops at the next event once the consumer drops
        // the stream.
        let (tx, rx) = mpsc::unbounded_channel::<Result<crate::StreamEvent, AiError>>();
        tokio::spawn(async move {
            let events = tx.clone();
            let result = parse_sse_stream(response, move |sse: SseEvent| {
                match decode_event(&sse) {
                    Ok(Some(event)) => {
                        if events.send(Ok(event)).is_err() {
                            return ControlFlow::Break(());
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        let _ = events.send(Err(e));
                        return ControlFlow::Break(());
                    }
                }
                ControlFlow::Continue(())
            })
            .await;

            if let Err(e) = result {
                warn!(error = %e, "Claude event stream failed");
                let _ = tx.send(Err(e));
            }
        });

        let events = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });
        Ok(Box::pin(events))
    }
}
