//! services/api/src/adapters/summarizer.rs
//!
//! This module contains the adapter for the external summarization worker.
//! It implements the `SummarizationService` port from the `core` crate.

use async_trait::async_trait;
use insight_core::domain::SummaryRequest;
use insight_core::ports::{PortError, PortResult, SummarizationService};
use serde::Serialize;
use std::time::Duration;

/// The payload the worker accepts on `POST /summarize`.
#[derive(Debug, Serialize)]
struct SummarizePayload<'a> {
    topic_title: &'a str,
    start_date: String,
    end_date: String,
}

impl<'a> From<&'a SummaryRequest> for SummarizePayload<'a> {
    fn from(request: &'a SummaryRequest) -> Self {
        Self {
            topic_title: &request.topic_title,
            start_date: request.start_date.format("%Y-%m-%d").to_string(),
            end_date: request.end_date.format("%Y-%m-%d").to_string(),
        }
    }
}

/// An adapter that hands summary requests to the worker over HTTP.
#[derive(Clone)]
pub struct HttpSummarizerAdapter {
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpSummarizerAdapter {
    /// Creates a new `HttpSummarizerAdapter` for the worker at `base_url`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl SummarizationService for HttpSummarizerAdapter {
    async fn request_summary(&self, request: &SummaryRequest) -> PortResult<()> {
        let response = self
            .http_client
            .post(format!("{}/summarize", self.base_url))
            .json(&SummarizePayload::from(request))
            .send()
            .await
            .map_err(|e| PortError::DispatchFailure(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PortError::DispatchFailure(format!(
                "summarization worker answered {}",
                status
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use wiremock::{
        matchers::{body_json, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    fn request() -> SummaryRequest {
        SummaryRequest::new(
            "AI",
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 5, 8).unwrap(),
        )
    }

    #[tokio::test]
    async fn posts_descriptor_with_iso_dates() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/summarize"))
            .and(body_json(serde_json::json!({
                "topic_title": "AI",
                "start_date": "2024-05-01",
                "end_date": "2024-05-08"
            })))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&mock_server)
            .await;

        let adapter = HttpSummarizerAdapter::new(mock_server.uri(), Duration::from_secs(5)).unwrap();
        adapter.request_summary(&request()).await.unwrap();
    }

    #[tokio::test]
    async fn error_status_is_a_dispatch_failure() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/summarize"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let adapter = HttpSummarizerAdapter::new(mock_server.uri(), Duration::from_secs(5)).unwrap();
        let err = adapter.request_summary(&request()).await.unwrap_err();
        assert!(matches!(err, PortError::DispatchFailure(_)));
    }

    #[tokio::test]
    async fn unreachable_worker_is_a_dispatch_failure() {
        // Nothing listens on port 9 (discard) in the test environment.
        let adapter =
            HttpSummarizerAdapter::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let err = adapter.request_summary(&request()).await.unwrap_err();
        assert!(matches!(err, PortError::DispatchFailure(_)));
    }
}
