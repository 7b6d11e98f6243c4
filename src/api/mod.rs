//! HTTP API consumed by the presentation layer

use crate::config::ApiConfig;
use crate::error::SessionError;
use crate::history::TransactionRecord;
use crate::session::{Draft, DraftField, SessionSnapshot, Submission, TransactionSession};

use anyhow::Context;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<TransactionSession>,
}

/// Build the API router
pub fn router(session: Arc<TransactionSession>) -> Router {
    let state = AppState { session };

    Router::new()
        .route("/health", get(health_check))
        .route("/session", get(get_session))
        .route("/connect", post(connect))
        .route("/draft", get(get_draft).put(put_draft))
        .route("/draft/:field", patch(patch_draft_field))
        .route(
            "/transactions",
            get(list_transactions).post(submit_transaction),
        )
        .route("/transactions/refresh", post(refresh_transactions))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Run the HTTP API server
pub async fn run_server(config: ApiConfig, session: Arc<TransactionSession>) -> anyhow::Result<()> {
    let app = router(session);

    let addr = format!("{}:{}", config.host, config.port);
    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint - basic liveness
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn get_session(State(state): State<AppState>) -> Json<SessionSnapshot> {
    Json(state.session.snapshot().await)
}

/// Prompt the wallet for an account
async fn connect(State(state): State<AppState>) -> Result<Json<SessionSnapshot>, ApiError> {
    state.session.connect().await?;
    Ok(Json(state.session.snapshot().await))
}

async fn get_draft(State(state): State<AppState>) -> Json<Draft> {
    Json(state.session.draft().await)
}

async fn put_draft(State(state): State<AppState>, Json(draft): Json<Draft>) -> Json<Draft> {
    state.session.set_draft(draft.clone()).await;
    Json(draft)
}

async fn patch_draft_field(
    State(state): State<AppState>,
    Path(field): Path<String>,
    Json(update): Json<FieldUpdate>,
) -> Result<Json<Draft>, ApiError> {
    let field: DraftField = field.parse()?;
    Ok(Json(state.session.handle_change(field, update.value).await))
}

async fn list_transactions(State(state): State<AppState>) -> Json<Vec<TransactionRecord>> {
    Json(state.session.transactions().await)
}

/// Submit the current draft; responds once the record is confirmed
async fn submit_transaction(State(state): State<AppState>) -> Result<Json<Submission>, ApiError> {
    Ok(Json(state.session.submit_transaction().await?))
}

async fn refresh_transactions(
    State(state): State<AppState>,
) -> Result<Json<Vec<TransactionRecord>>, ApiError> {
    Ok(Json(state.session.refresh_history().await?))
}

/// Session error rendered as an HTTP response
pub struct ApiError(SessionError);

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self.0 {
            SessionError::WalletUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            SessionError::NotConnected => StatusCode::UNAUTHORIZED,
            SessionError::UserRejected { .. } => StatusCode::FORBIDDEN,
            SessionError::InvalidDraft(_) => StatusCode::BAD_REQUEST,
            SessionError::ContractRevert { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            SessionError::Network { .. } => StatusCode::BAD_GATEWAY,
            SessionError::Storage(_) | SessionError::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorResponse {
            error: self.0.to_string(),
            kind: self.0.kind().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

// Request and response types

#[derive(Deserialize)]
struct FieldUpdate {
    value: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    kind: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::MockTransferLedger;
    use crate::history::TimestampFormat;
    use crate::storage::MemoryStore;
    use crate::wallet::{MockWallet, WalletHandle};

    use axum::body::Body;
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    async fn app(handle: Option<WalletHandle>) -> Router {
        let session = TransactionSession::new(
            handle,
            Arc::new(MemoryStore::new()),
            TimestampFormat::default(),
        )
        .await;
        router(Arc::new(session))
    }

    async fn mocked_app() -> Router {
        let handle = WalletHandle::new(
            Arc::new(MockWallet::new()),
            Arc::new(MockTransferLedger::new()),
        );
        app(Some(handle)).await
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<&str>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
            .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    #[tokio::test]
    async fn test_health() {
        let app = app(None).await;
        let (status, body) = send(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_connect_without_wallet() {
        let app = app(None).await;

        let (status, body) = send(&app, "POST", "/connect", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["kind"], "wallet_unavailable");

        let (status, body) = send(&app, "GET", "/session", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["notice"], "Please install MetaMask");
        assert_eq!(body["isLoading"], false);
    }

    #[tokio::test]
    async fn test_draft_editing() {
        let app = mocked_app().await;

        let (status, body) = send(
            &app,
            "PUT",
            "/draft",
            Some(r#"{"addressTo": "0xabc", "amount": "0.01", "keyword": "", "message": "hi"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["addressTo"], "0xabc");

        let (status, body) =
            send(&app, "PATCH", "/draft/message", Some(r#"{"value": "hello"}"#)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "hello");
        assert_eq!(body["amount"], "0.01");

        let (status, body) = send(&app, "PATCH", "/draft/gas", Some(r#"{"value": "1"}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "invalid_draft");

        let (_, body) = send(&app, "GET", "/session", None).await;
        assert_eq!(body["formData"]["message"], "hello");
    }

    #[tokio::test]
    async fn test_submit_requires_account() {
        let app = mocked_app().await;

        let (status, body) = send(&app, "POST", "/transactions", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["kind"], "not_connected");

        let (status, body) = send(&app, "GET", "/transactions", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!([]));
    }
}
