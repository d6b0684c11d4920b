//! Webhook adapter: Telegram updates in, `Success`/`Failure` responses out
//!
//! Every update gets its own [`Orchestrator`]; the [`Relay`] only holds the
//! long-lived collaborators the orchestrators borrow.

use crate::api::{ApiAgent, ApiError, ModelStreamClient};
use crate::chat::{parse_update, ChatId, FinalSender, InboundEvent, ProgressChannel, TelegramClient};
use crate::config::{Config, ConfigError, ServerSettings};
use crate::metrics::{MetricsTracker, RelayMetrics};
use crate::orchestrator::{CompletionOutcome, Orchestrator, OrchestratorConfig, Request};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Error, Debug)]
pub enum RelayError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Transport-level answer to one webhook delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WebhookResponse {
    pub status: StatusCode,
    pub body: &'static str,
}

impl WebhookResponse {
    pub fn success() -> Self {
        Self {
            status: StatusCode::OK,
            body: "Success",
        }
    }

    pub fn failure() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: "Failure",
        }
    }

    pub fn from_outcome(outcome: &CompletionOutcome) -> Self {
        match outcome {
            CompletionOutcome::Success(_) | CompletionOutcome::EmptyResult => Self::success(),
            CompletionOutcome::Failure(_) => Self::failure(),
        }
    }
}

impl IntoResponse for WebhookResponse {
    fn into_response(self) -> Response {
        (self.status, self.body).into_response()
    }
}

/// Long-lived collaborators shared by all requests
pub struct Relay {
    orchestrator_config: OrchestratorConfig,
    model: Arc<dyn ModelStreamClient>,
    progress: Arc<dyn ProgressChannel>,
    sender: Arc<dyn FinalSender>,
    greeting: String,
    metrics: MetricsTracker,
}

impl Relay {
    pub fn new(
        orchestrator_config: OrchestratorConfig,
        model: Arc<dyn ModelStreamClient>,
        progress: Arc<dyn ProgressChannel>,
        sender: Arc<dyn FinalSender>,
        greeting: impl Into<String>,
    ) -> Self {
        Self {
            orchestrator_config,
            model,
            progress,
            sender,
            greeting: greeting.into(),
            metrics: MetricsTracker::new(),
        }
    }

    /// Wire the Telegram client and the configured model backend
    pub fn from_config(config: &Config) -> Result<Self, RelayError> {
        config.validate()?;

        let http = reqwest::Client::new();
        let model = ApiAgent::with_client(config.api_config(), http.clone())?;
        let telegram = Arc::new(TelegramClient::with_client(config.telegram_config()?, http));

        Ok(Self::new(
            OrchestratorConfig::from(&config.orchestrator),
            Arc::new(model),
            telegram.clone(),
            telegram,
            config.telegram.greeting.clone(),
        ))
    }

    pub fn metrics(&self) -> &MetricsTracker {
        &self.metrics
    }

    /// A fresh orchestrator scoped to one request
    pub fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(
            self.orchestrator_config.clone(),
            self.model.clone(),
            self.progress.clone(),
            self.sender.clone(),
        )
    }

    /// Handle one raw webhook body
    pub async fn handle_body(&self, body: &[u8]) -> WebhookResponse {
        match parse_update(body) {
            Ok(event) => self.handle_event(event).await,
            Err(e) => {
                warn!("rejecting webhook body: {}", e);
                self.metrics.record_invalid_update();
                WebhookResponse::failure()
            }
        }
    }

    pub async fn handle_event(&self, event: InboundEvent) -> WebhookResponse {
        match event {
            InboundEvent::Prompt(request) => self.handle_prompt(request).await,
            InboundEvent::Command { chat_id, name } => self.handle_command(chat_id, &name).await,
            InboundEvent::Ignored => {
                debug!("update ignored");
                WebhookResponse::success()
            }
        }
    }

    async fn handle_prompt(&self, request: Request) -> WebhookResponse {
        let report = self.orchestrator().run(request).await;
        self.metrics.record_run(&report);
        WebhookResponse::from_outcome(&report.outcome)
    }

    async fn handle_command(&self, chat_id: ChatId, name: &str) -> WebhookResponse {
        if name != "start" {
            debug!(command = name, "unsupported command ignored");
            return WebhookResponse::success();
        }

        match self.sender.send_final(chat_id, &self.greeting).await {
            Ok(()) => WebhookResponse::success(),
            Err(e) => {
                error!(%chat_id, "greeting failed: {}", e);
                WebhookResponse::failure()
            }
        }
    }
}

/// HTTP routes: the webhook plus health and metrics probes
pub fn router(relay: Arc<Relay>, webhook_path: &str) -> Router {
    Router::new()
        .route(webhook_path, post(webhook))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .with_state(relay)
}

async fn webhook(State(relay): State<Arc<Relay>>, body: Bytes) -> WebhookResponse {
    relay.handle_body(&body).await
}

async fn health() -> &'static str {
    "ok"
}

async fn metrics(State(relay): State<Arc<Relay>>) -> Json<RelayMetrics> {
    Json(relay.metrics().get_metrics())
}

/// Serve the webhook until Ctrl-C
pub async fn serve(relay: Arc<Relay>, settings: &ServerSettings) -> Result<(), RelayError> {
    let app = router(relay.clone(), &settings.webhook_path);
    let listener = tokio::net::TcpListener::bind(&settings.bind).await?;

    info!(
        "listening on {} (webhook at {})",
        listener.local_addr()?,
        settings.webhook_path
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    info!("shutting down\n{}", relay.metrics().get_metrics());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::StreamFragment;
    use crate::testing::{FailingModel, RecordingChat, ScriptedModel};
    use axum::body::Body;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn relay(model: Arc<dyn ModelStreamClient>, chat: &Arc<RecordingChat>) -> Arc<Relay> {
        Arc::new(Relay::new(
            OrchestratorConfig::default(),
            model,
            chat.clone(),
            chat.clone(),
            "hello there",
        ))
    }

    fn update(text: &str) -> String {
        serde_json::json!({
            "update_id": 1,
            "message": {
                "message_id": 2,
                "date": 0,
                "chat": { "id": 99, "type": "private" },
                "text": text
            }
        })
        .to_string()
    }

    async fn post_update(app: Router, body: String) -> (StatusCode, String) {
        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .method("POST")
                    .uri("/webhook")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_prompt_success_returns_200() {
        let chat = Arc::new(RecordingChat::default());
        let model = ScriptedModel::arc(vec![
            StreamFragment::TextDelta("pong".to_string()),
            StreamFragment::Stop,
        ]);
        let relay = relay(model, &chat);

        let (status, body) = post_update(router(relay.clone(), "/webhook"), update("ping")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "Success");
        assert_eq!(chat.finals(), vec!["pong".to_string()]);
        assert_eq!(relay.metrics().get_metrics().successes, 1);
    }

    #[tokio::test]
    async fn test_empty_result_returns_200() {
        let chat = Arc::new(RecordingChat::default());
        let relay = relay(ScriptedModel::arc(vec![StreamFragment::Stop]), &chat);

        let response = relay.handle_body(update("anything").as_bytes()).await;

        assert_eq!(response, WebhookResponse::success());
    }

    #[tokio::test]
    async fn test_stream_failure_returns_500() {
        let chat = Arc::new(RecordingChat::default());

        let (status, body) =
            post_update(router(relay(Arc::new(FailingModel), &chat), "/webhook"), update("ping")).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "Failure");
        assert_eq!(chat.finals().len(), 1);
    }

    #[tokio::test]
    async fn test_final_send_failure_returns_500_despite_good_stream() {
        let chat = Arc::new(RecordingChat::failing_finals());
        let model = ScriptedModel::arc(vec![
            StreamFragment::TextDelta("all good".to_string()),
            StreamFragment::Stop,
        ]);

        let response = relay(model, &chat).handle_body(update("ping").as_bytes()).await;

        assert_eq!(response, WebhookResponse::failure());
    }

    #[tokio::test]
    async fn test_malformed_body_returns_500() {
        let chat = Arc::new(RecordingChat::default());
        let relay = relay(ScriptedModel::arc(vec![]), &chat);

        let (status, body) = post_update(router(relay.clone(), "/webhook"), "{".to_string()).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "Failure");
        assert!(chat.finals().is_empty());
        assert_eq!(relay.metrics().get_metrics().invalid_updates, 1);
    }

    #[tokio::test]
    async fn test_start_command_sends_greeting() {
        let chat = Arc::new(RecordingChat::default());
        let model = ScriptedModel::arc(vec![StreamFragment::Stop]);

        let response = relay(model.clone(), &chat).handle_body(update("/start").as_bytes()).await;

        assert_eq!(response, WebhookResponse::success());
        assert_eq!(chat.finals(), vec!["hello there".to_string()]);
        assert!(model.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_non_text_update_is_acknowledged() {
        let chat = Arc::new(RecordingChat::default());
        let body = r#"{"update_id": 5, "my_chat_member": {}}"#;

        let response = relay(ScriptedModel::arc(vec![]), &chat).handle_body(body.as_bytes()).await;

        assert_eq!(response, WebhookResponse::success());
        assert!(chat.finals().is_empty());
    }

    #[tokio::test]
    async fn test_health_route() {
        let chat = Arc::new(RecordingChat::default());
        let app = router(relay(ScriptedModel::arc(vec![]), &chat), "/webhook");

        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_from_config_validates_settings() {
        let mut config = crate::config::ConfigBuilder::new()
            .telegram_bot_token("t")
            .model_api_key("k")
            .build();
        config.server.webhook_path = "webhook".to_string();
        assert!(matches!(
            Relay::from_config(&config),
            Err(RelayError::Config(_))
        ));
    }
}
