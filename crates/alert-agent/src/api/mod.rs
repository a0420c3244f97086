use crate::cache::TtlCache;
use crate::dispatch::EmailSender;
use crate::orchestrator::Orchestrator;
use crate::store::{AlertLogStore, SyncLogStore};
use anyhow::Context;
use axum::{http::StatusCode, response::IntoResponse};
use chrono::{DateTime, Utc};
use models::{AlertRecipient, AlertStats, AlertSummary};
use std::sync::Arc;

mod error;

pub use error::{ApiError, ApiErrorExt};

/// Shared state of the agent: runs alert passes, and serves alert statistics
/// from a cache which every pass invalidates.
#[derive(Debug)]
pub struct App<DB, ES> {
    orchestrator: Orchestrator<DB, ES>,
    stats_cache: TtlCache<AlertStats>,
}

impl<DB, ES> App<DB, ES>
where
    DB: SyncLogStore + AlertLogStore,
    ES: EmailSender,
{
    pub fn new(orchestrator: Orchestrator<DB, ES>, stats_cache: TtlCache<AlertStats>) -> Self {
        App {
            orchestrator,
            stats_cache,
        }
    }

    pub async fn run_pass(
        &self,
        now: DateTime<Utc>,
        recipients: Option<&[AlertRecipient]>,
    ) -> anyhow::Result<AlertSummary> {
        let result = self.orchestrator.run_pass(now, recipients).await;
        // Even a failed pass may have written alert records.
        self.stats_cache.invalidate().await;
        result
    }

    /// Returns counts of alerts recorded within the dedup window before `now`.
    ///
    /// Cached stats are returned unchanged, so their `since` is the start of
    /// the window as of when they were computed. It may trail `now` minus the
    /// dedup window by up to the cache TTL, and always describes the window
    /// the counts were taken over.
    pub async fn stats(&self, now: DateTime<Utc>) -> anyhow::Result<AlertStats> {
        if let Some(stats) = self.stats_cache.get().await {
            return Ok(stats);
        }
        let stats = self
            .orchestrator
            .store()
            .fetch_stats(now - crate::selector::dedup_window())
            .await
            .context("fetching alert stats")?;
        self.stats_cache.set(stats.clone()).await;
        Ok(stats)
    }
}

/// Body of the response to an alert pass request.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PassResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<AlertSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Optional body of an alert pass request.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct PassRequest {
    /// Recipients to alert instead of the configured recipients.
    #[serde(default)]
    recipients: Option<Vec<AlertRecipient>>,
}

/// Build the agent's API router.
pub fn build_router<DB, ES>(app: Arc<App<DB, ES>>) -> axum::Router<()>
where
    DB: SyncLogStore + AlertLogStore,
    ES: EmailSender,
{
    use axum::routing::{get, post};
    use tower_http::cors;

    let cors = cors::CorsLayer::new()
        .allow_origin(cors::Any)
        .allow_methods(cors::Any)
        .allow_headers(cors::Any);

    axum::Router::new()
        .route(
            "/sync-alerts",
            post(run_pass::<DB, ES>)
                .get(run_pass::<DB, ES>)
                .options(preflight_handler),
        )
        .route("/stats", get(alert_stats::<DB, ES>))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(app)
}

async fn run_pass<DB, ES>(
    axum::extract::State(app): axum::extract::State<Arc<App<DB, ES>>>,
    body: axum::body::Bytes,
) -> Result<axum::Json<PassResponse>, ApiError>
where
    DB: SyncLogStore + AlertLogStore,
    ES: EmailSender,
{
    let request = parse_pass_request(&body).map_err(|err| err.with_status(StatusCode::BAD_REQUEST))?;

    let summary = app
        .run_pass(Utc::now(), request.recipients.as_deref())
        .await?;

    let message = if summary.processed == 0 {
        "No sync failures to alert on".to_string()
    } else {
        format!(
            "Processed {} sync failures: {} alerted, {} errors",
            summary.processed, summary.alerted, summary.errors
        )
    };
    Ok(axum::Json(PassResponse {
        success: true,
        message: Some(message),
        results: Some(summary),
        error: None,
    }))
}

fn parse_pass_request(body: &[u8]) -> anyhow::Result<PassRequest> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(PassRequest::default());
    }
    let request: PassRequest =
        serde_json::from_slice(body).context("parsing alert pass request body")?;

    if let Some(recipients) = &request.recipients {
        if recipients.is_empty() {
            anyhow::bail!("recipients must not be empty");
        }
        for recipient in recipients {
            recipient.email.parse::<AlertRecipient>()?;
        }
    }
    Ok(request)
}

async fn alert_stats<DB, ES>(
    axum::extract::State(app): axum::extract::State<Arc<App<DB, ES>>>,
) -> Result<axum::Json<AlertStats>, ApiError>
where
    DB: SyncLogStore + AlertLogStore,
    ES: EmailSender,
{
    Ok(axum::Json(app.stats(Utc::now()).await?))
}

async fn preflight_handler() -> impl IntoResponse {
    (StatusCode::NO_CONTENT, "")
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::dispatch::Dispatcher;
    use crate::test_support::{recipients, sync_log, MemoryStore, TestSender};
    use axum::body::Body;
    use axum::http::{header, Request};
    use models::{AlertRecord, AlertStatus, SyncStatus};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tower::ServiceExt;

    fn router(store: MemoryStore, sender: TestSender) -> axum::Router<()> {
        let orchestrator = Orchestrator::new(
            store,
            notifications::Renderer::try_new().unwrap(),
            Dispatcher::new(sender, std::time::Duration::from_secs(5)),
            recipients(&["ops@acme.test", "eng@acme.test"]),
        );
        let app = App::new(
            orchestrator,
            TtlCache::new(std::time::Duration::from_secs(3600)),
        );
        build_router(Arc::new(app))
    }

    async fn call(
        router: &axum::Router<()>,
        request: Request<Body>,
    ) -> (StatusCode, serde_json::Value) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if body.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, body)
    }

    fn post(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/sync-alerts")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_pass_with_nothing_to_alert() {
        let sender = TestSender::new();
        let router = router(MemoryStore::new(Vec::new()), sender.clone());

        let (status, body) = call(&router, post("")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({
                "success": true,
                "message": "No sync failures to alert on",
                "results": {"processed": 0, "alerted": 0, "errors": 0},
            })
        );
        assert_eq!(sender.attempts().await, 0);
    }

    #[tokio::test]
    async fn test_pass_alerts_configured_recipients() {
        let now = Utc::now();
        let store = MemoryStore::new(vec![sync_log(SyncStatus::Error, now)]);
        let sender = TestSender::new();
        let router = router(store.clone(), sender.clone());

        let request = Request::builder()
            .method("GET")
            .uri("/sync-alerts")
            .body(Body::empty())
            .unwrap();
        let (status, body) = call(&router, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["results"],
            json!({"processed": 1, "alerted": 1, "errors": 0})
        );

        let mut sent: Vec<String> = sender.take_sent().await.into_iter().map(|(to, _)| to).collect();
        sent.sort();
        assert_eq!(sent, vec!["eng@acme.test", "ops@acme.test"]);
        assert_eq!(store.alerts().await.len(), 2);
    }

    #[tokio::test]
    async fn test_pass_with_recipient_override() {
        let store = MemoryStore::new(vec![sync_log(SyncStatus::Error, Utc::now())]);
        let sender = TestSender::new();
        let router = router(store, sender.clone());

        let (status, _body) = call(
            &router,
            post(r#"{"recipients": [{"email": "oncall@acme.test", "name": "On Call"}]}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let sent: Vec<String> = sender.take_sent().await.into_iter().map(|(to, _)| to).collect();
        assert_eq!(sent, vec!["oncall@acme.test"]);
    }

    #[tokio::test]
    async fn test_invalid_requests_are_rejected() {
        let store = MemoryStore::new(vec![sync_log(SyncStatus::Error, Utc::now())]);
        let sender = TestSender::new();
        let router = router(store, sender.clone());

        for body in [
            "not json",
            r#"{"recipients": []}"#,
            r#"{"recipients": [{"email": "nope"}]}"#,
            r#"{"unknown": true}"#,
        ] {
            let (status, response) = call(&router, post(body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "body: {body}");
            assert_eq!(response["success"], json!(false));
            assert!(response["error"].is_string());
        }
        assert_eq!(sender.attempts().await, 0);
    }

    #[tokio::test]
    async fn test_selection_failure_responds_with_500() {
        let store = MemoryStore::new(vec![sync_log(SyncStatus::Error, Utc::now())]);
        store.set_fail_sync_log_reads(true).await;
        let router = router(store, TestSender::new());

        let (status, body) = call(&router, post("")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], json!(false));
        assert!(body.get("results").is_none());
        let error = body["error"].as_str().unwrap();
        assert!(error.contains("mock error reading sync logs"), "{error}");
    }

    #[tokio::test]
    async fn test_preflight() {
        let router = router(MemoryStore::new(Vec::new()), TestSender::new());

        let request = Request::builder()
            .method("OPTIONS")
            .uri("/sync-alerts")
            .header(header::ORIGIN, "https://dashboard.acme.test")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type,authorization")
            .body(Body::empty())
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        assert!(response.status().is_success());
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "*"
        );
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(body.is_empty());

        let request = Request::builder()
            .method("OPTIONS")
            .uri("/sync-alerts")
            .body(Body::empty())
            .unwrap();
        let (status, body) = call(&router, request).await;
        assert!(status.is_success());
        assert_eq!(body, serde_json::Value::Null);
    }

    #[tokio::test]
    async fn test_stats_are_cached_until_a_pass() {
        let now = Utc::now();
        let entry = sync_log(SyncStatus::Error, now);
        let store = MemoryStore::new(vec![entry.clone()]);
        store
            .push_alerts(vec![AlertRecord::sync_failure(
                entry.id,
                "ops@acme.test",
                AlertStatus::Failed,
                now,
            )])
            .await;
        let sender = TestSender::new();
        sender.fail_for("eng@acme.test").await;
        let router = router(store.clone(), sender);

        let stats = || {
            Request::builder()
                .uri("/stats")
                .body(Body::empty())
                .unwrap()
        };

        let (status, body) = call(&router, stats()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            (&body["sent"], &body["failed"], &body["alerted_logs"]),
            (&json!(0), &json!(1), &json!(0))
        );

        // Records written outside of a pass aren't visible until the cache is invalidated.
        store
            .push_alerts(vec![AlertRecord::sync_failure(
                entry.id,
                "ops@acme.test",
                AlertStatus::Failed,
                now,
            )])
            .await;
        let (_, body) = call(&router, stats()).await;
        assert_eq!(body["failed"], json!(1));

        let (status, _) = call(&router, post("")).await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = call(&router, stats()).await;
        assert_eq!(
            (&body["sent"], &body["failed"], &body["alerted_logs"]),
            (&json!(1), &json!(3), &json!(1))
        );
    }

    #[tokio::test]
    async fn test_cached_stats_report_the_window_they_were_counted_over() {
        let store = MemoryStore::new(Vec::new());
        let orchestrator = Orchestrator::new(
            store,
            notifications::Renderer::try_new().unwrap(),
            Dispatcher::new(TestSender::new(), std::time::Duration::from_secs(5)),
            recipients(&["ops@acme.test"]),
        );
        let app = App::new(
            orchestrator,
            TtlCache::new(std::time::Duration::from_secs(3600)),
        );
        let window = crate::selector::dedup_window();

        let counted_at = Utc::now();
        let stats = app.stats(counted_at).await.unwrap();
        assert_eq!(stats.since, counted_at - window);

        // Served from the cache, with the window of its counts.
        let later = counted_at + chrono::Duration::minutes(30);
        let stats = app.stats(later).await.unwrap();
        assert_eq!(stats.since, counted_at - window);

        // A pass invalidates the cache, and the window moves forward.
        app.run_pass(later, None).await.unwrap();
        let stats = app.stats(later).await.unwrap();
        assert_eq!(stats.since, later - window);
    }
}
