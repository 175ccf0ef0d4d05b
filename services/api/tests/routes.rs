//! Router tests that drive the HTTP surface end to end against the
//! in-memory ports.

use api_lib::config::Config;
use api_lib::web::{build_router, AppState};
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{Duration, Local, Utc};
use insight_core::ports::DatabaseService;
use insight_core::testing::{InMemoryDatabase, RecordingMessenger, RecordingSummarizer};
use insight_core::SummaryRequest;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

struct TestApp {
    db: Arc<InMemoryDatabase>,
    summarizer: Arc<RecordingSummarizer>,
    messenger: Arc<RecordingMessenger>,
    state: Arc<AppState>,
}

impl TestApp {
    fn new() -> Self {
        Self::with(RecordingSummarizer::new(), &[])
    }

    fn with(summarizer: RecordingSummarizer, extra: &[(&str, &str)]) -> Self {
        let mut vars = vec![("DATABASE_URL", "postgres://unused")];
        vars.extend_from_slice(extra);
        let config = Config::from_lookup(|key| {
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        })
        .unwrap();

        let db = Arc::new(InMemoryDatabase::new());
        let summarizer = Arc::new(summarizer);
        let messenger = Arc::new(RecordingMessenger::new());
        let state = Arc::new(AppState::new(
            Arc::new(config),
            db.clone(),
            summarizer.clone(),
            messenger.clone(),
        ));
        Self {
            db,
            summarizer,
            messenger,
            state,
        }
    }

    fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    /// Creates a user with a live session and returns its id and cookie.
    async fn login(&self) -> (Uuid, String) {
        let email = format!("{}@example.com", Uuid::new_v4());
        let user = self.db.create_user_with_email(&email, "hash").await.unwrap();
        let session_id = Uuid::new_v4().to_string();
        self.db
            .create_auth_session(&session_id, user.user_id, Utc::now() + Duration::days(1))
            .await
            .unwrap();
        (user.user_id, format!("session={}", session_id))
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        (status, body)
    }
}

fn post_json(uri: &str, cookie: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::COOKIE, cookie)
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str, cookie: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap()
}

fn today() -> chrono::NaiveDate {
    Local::now().date_naive()
}

#[tokio::test]
async fn protected_routes_require_a_session() {
    let app = TestApp::new();
    let (status, _) = app.send(get("/user", "session=nope")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = Request::builder().uri("/summaries").body(Body::empty()).unwrap();
    let (status, _) = app.send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn signup_then_login_issue_session_cookies() {
    let app = TestApp::new();
    let credentials = json!({"email": "reader@example.com", "password": "correct horse"});

    let response = app
        .router()
        .oneshot(post_json("/auth/signup", "", credentials.clone()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
    assert!(cookie.starts_with("session="));

    let (status, _) = app.send(post_json("/auth/signup", "", credentials.clone())).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = app.send(post_json("/auth/login", "", credentials)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "reader@example.com");

    let wrong = json!({"email": "reader@example.com", "password": "wrong password"});
    let (status, _) = app.send(post_json("/auth/login", "", wrong)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_signups_with_one_email_conflict_instead_of_failing() {
    let app = TestApp::new();
    let credentials = json!({"email": "twice@example.com", "password": "correct horse"});

    let (first, second) = tokio::join!(
        app.send(post_json("/auth/signup", "", credentials.clone())),
        app.send(post_json("/auth/signup", "", credentials.clone())),
    );

    let mut statuses = vec![first.0, second.0];
    statuses.sort();
    assert_eq!(statuses, vec![StatusCode::CREATED, StatusCode::CONFLICT]);

    let user = app.db.get_user_by_email("twice@example.com").await.unwrap();
    let preference = app.db.get_or_create_user_preference(user.user_id).await.unwrap();
    assert!(!preference.send_notification_when_ready);
}

#[tokio::test]
async fn attaching_a_topic_requests_a_daily_summary() {
    let app = TestApp::new();
    let (user_id, cookie) = app.login().await;

    let (status, body) = app
        .send(post_json("/topic", &cookie, json!({"title": "AI"})))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "AI");
    assert_eq!(body["owner_id"], json!(user_id));
    let requests = app.summarizer.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].end_date, today());

    let (status, overview) = app.send(get("/user", &cookie)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(overview["topics"].as_array().unwrap().len(), 1);
    assert_eq!(overview["topic_preferences"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn summarize_week_then_duplicate() {
    let app = TestApp::new();
    let (user_id, cookie) = app.login().await;
    let topic = app.db.create_topic("AI", user_id).await.unwrap();
    let body = json!({"topic_id": topic.id.to_string(), "period": "week"});

    let (status, _) = app.send(post_json("/summarize", &cookie, body.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        app.summarizer.requests(),
        vec![SummaryRequest::new("AI", today() - Duration::days(7), today())]
    );

    let (status, _) = app.send(post_json("/summarize", &cookie, body)).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(app.summarizer.requests().len(), 1);
}

#[tokio::test]
async fn summarize_rejects_unknown_period() {
    let app = TestApp::new();
    let (user_id, cookie) = app.login().await;
    let topic = app.db.create_topic("AI", user_id).await.unwrap();

    let (status, _) = app
        .send(post_json(
            "/summarize",
            &cookie,
            json!({"topic_id": topic.id, "period": "yesterday"}),
        ))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(app.summarizer.requests().is_empty());
    assert!(app.state.summary_queue.pending().is_empty());
}

#[tokio::test]
async fn summarize_unknown_topic_is_unavailable() {
    let app = TestApp::new();
    let (_, cookie) = app.login().await;

    let (status, _) = app
        .send(post_json("/summarize", &cookie, json!({"topic_id": 999, "period": "day"})))
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (status, _) = app
        .send(post_json("/summarize", &cookie, json!({"topic_id": "abc", "period": "day"})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn summarize_with_worker_down_can_be_retried() {
    let app = TestApp::with(RecordingSummarizer::failing(), &[]);
    let (user_id, cookie) = app.login().await;
    let topic = app.db.create_topic("AI", user_id).await.unwrap();
    let body = json!({"topic_id": topic.id, "period": "month"});

    let (status, _) = app.send(post_json("/summarize", &cookie, body.clone())).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(app.state.summary_queue.pending().is_empty());

    // Not reported as "already in progress" on retry.
    let (status, _) = app.send(post_json("/summarize", &cookie, body)).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn topic_preference_without_record_is_not_found() {
    let app = TestApp::new();
    let (_, cookie) = app.login().await;

    let (status, _) = app
        .send(post_json(
            "/preference/TOPIC?topic_id=42&send_newsletter=true",
            &cookie,
            json!({}),
        ))
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn preferences_are_updated() {
    let app = TestApp::new();
    let (user_id, cookie) = app.login().await;
    let (_, topic) = app
        .send(post_json("/topic", &cookie, json!({"title": "Rust"})))
        .await;

    let uri = format!("/preference/TOPIC?topic_id={}&send_newsletter=true", topic["id"]);
    let (status, body) = app.send(post_json(&uri, &cookie, json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["send_newsletter"], true);

    let (status, body) = app
        .send(post_json("/preference/USER?send_when_ready=true", &cookie, json!({})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_id"], json!(user_id));
    assert_eq!(body["send_notification_when_ready"], true);

    let (status, _) = app
        .send(post_json("/preference/GROUP", &cookie, json!({})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn callback_completes_request_and_notifies() {
    let app = TestApp::new();
    let (user_id, cookie) = app.login().await;
    app.send(post_json("/preference/USER?send_when_ready=true", &cookie, json!({})))
        .await;
    app.send(post_json("/topic", &cookie, json!({"title": "AI"}))).await;
    let request = app.summarizer.requests()[0].clone();
    assert!(app.state.summary_queue.is_queued(&request));

    let (status, summary) = app
        .send(post_json(
            "/summaries/callback",
            "",
            json!({
                "topic_title": "AI",
                "start_date": request.start_date.to_string(),
                "end_date": request.end_date.to_string(),
                "content": "A busy day for AI."
            }),
        ))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["content"], "A busy day for AI.");
    assert!(!app.state.summary_queue.is_queued(&request));
    assert_eq!(app.messenger.messages().len(), 1);
    assert_eq!(app.messenger.messages()[0].0, user_id);

    let (status, listed) = app.send(get("/summaries", &cookie)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let (status, body) = app
        .send(get(&format!("/summary/{}", summary["id"]), &cookie))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["content"], "A busy day for AI.");

    let (_, stranger) = app.login().await;
    let (status, _) = app
        .send(get(&format!("/summary/{}", summary["id"]), &stranger))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.send(get("/summaries", &stranger)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn repeated_or_unsolicited_callbacks_store_nothing() {
    let app = TestApp::new();
    let (_, cookie) = app.login().await;
    app.send(post_json("/topic", &cookie, json!({"title": "AI"}))).await;
    let request = app.summarizer.requests()[0].clone();
    let completed = json!({
        "topic_title": "AI",
        "start_date": request.start_date.to_string(),
        "end_date": request.end_date.to_string(),
        "content": "A busy day for AI."
    });

    let (status, _) = app
        .send(post_json("/summaries/callback", "", completed.clone()))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.send(post_json("/summaries/callback", "", completed)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .send(post_json(
            "/summaries/callback",
            "",
            json!({
                "topic_title": "AI",
                "start_date": "2020-01-01",
                "end_date": "2020-01-08",
                "content": "Nobody asked for this."
            }),
        ))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, listed) = app.send(get("/summaries", &cookie)).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn callback_failure_releases_pending_entry() {
    let app = TestApp::new();
    let (_, cookie) = app.login().await;
    app.send(post_json("/topic", &cookie, json!({"title": "AI"}))).await;
    let request = app.summarizer.requests()[0].clone();

    let (status, body) = app
        .send(post_json(
            "/summaries/callback",
            "",
            json!({
                "topic_title": "AI",
                "start_date": request.start_date.to_string(),
                "end_date": request.end_date.to_string(),
                "error": "upstream timeout"
            }),
        ))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["released"], true);
    assert!(app.state.summary_queue.pending().is_empty());
}

#[tokio::test]
async fn callback_token_is_enforced_when_configured() {
    let app = TestApp::with(RecordingSummarizer::new(), &[("CALLBACK_TOKEN", "s3cret")]);
    let payload = json!({
        "topic_title": "AI",
        "start_date": "2024-05-01",
        "end_date": "2024-05-02",
        "error": "gave up"
    });

    let (status, _) = app
        .send(post_json("/summaries/callback", "", payload.clone()))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .method("POST")
        .uri("/summaries/callback")
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-callback-token", "s3cret")
        .body(Body::from(payload.to_string()))
        .unwrap();
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["released"], false);
}
