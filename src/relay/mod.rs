//! Feedback relay: a small HTTP service that turns feedback posts into mail.
//!
//! # Routes
//! - `GET /api/health` - liveness check
//! - `POST /api/feedback` - validate a feedback payload and mail it

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::MailConfig;
use crate::error::RelayError;

pub mod client;
pub mod mailer;
pub mod payload;
pub mod routes;


use mailer::Mailer;

#[derive(Clone)]
pub struct RelayState {
    pub(crate) mailer: Arc<dyn Mailer>,
    pub(crate) mail: Arc<MailConfig>,
}

impl RelayState {
    pub fn new(mailer: Arc<dyn Mailer>, mail: MailConfig) -> Self {
        Self {
            mailer,
            mail: Arc::new(mail),
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = json!({
            "success": false,
            "message": self.public_message(),
        });
        (status, Json(body)).into_response()
    }
}

pub fn create_router(state: RelayState) -> Router {
    Router::new()
        .route("/api/health", get(routes::health_check))
        .route("/api/feedback", post(routes::submit_feedback))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Binds `addr` and serves the relay until the task is dropped.
pub async fn serve(addr: SocketAddr, state: RelayState) -> std::io::Result<()> {
    match state.mailer.verify().await {
        Ok(()) => tracing::info!(mailer = %state.mailer.describe(), "email service ready"),
        Err(e) => tracing::error!(mailer = %state.mailer.describe(), error = %e, "email config error"),
    }

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "feedback relay listening");
    axum::serve(listener, create_router(state)).await
}
