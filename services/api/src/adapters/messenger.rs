//! services/api/src/adapters/messenger.rs
//!
//! Adapter for the messaging worker, which delivers notifications to users.
//! It implements the `MessagingService` port from the `core` crate.

use async_trait::async_trait;
use insight_core::ports::{MessagingService, PortError, PortResult};
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Serialize)]
struct MessagePayload<'a> {
    user_id: Uuid,
    message: &'a str,
}

#[derive(Clone)]
pub struct HttpMessagingAdapter {
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpMessagingAdapter {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl MessagingService for HttpMessagingAdapter {
    async fn send_message(&self, user_id: Uuid, text: &str) -> PortResult<()> {
        self.http_client
            .post(format!("{}/send", self.base_url))
            .json(&MessagePayload {
                user_id,
                message: text,
            })
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| PortError::Unexpected(format!("messaging worker: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        matchers::{body_json, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    #[tokio::test]
    async fn sends_message_for_user() {
        let mock_server = MockServer::start().await;
        let user_id = Uuid::new_v4();
        Mock::given(method("POST"))
            .and(path("/send"))
            .and(body_json(serde_json::json!({
                "user_id": user_id,
                "message": "Your summary is ready."
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        let adapter = HttpMessagingAdapter::new(mock_server.uri(), Duration::from_secs(5)).unwrap();
        adapter
            .send_message(user_id, "Your summary is ready.")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn server_error_is_reported() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let adapter = HttpMessagingAdapter::new(mock_server.uri(), Duration::from_secs(5)).unwrap();
        assert!(adapter.send_message(Uuid::new_v4(), "hi").await.is_err());
    }
}
