//! HTTP server hosting the VAPID key pair endpoint.
//!
//! The CORS headers are attached to every response by a
//! `SetResponseHeaderLayer` rather than negotiated per request, matching
//! the fixed header set that web-push setup pages send.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::{Json, Router};
use tokio::net::TcpListener;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::config::Config;
use crate::service::{
    KeyPairReply, KeyPairService, ServiceResponse, CORS_ALLOW_HEADERS, CORS_ALLOW_ORIGIN,
};

impl IntoResponse for KeyPairReply {
    fn into_response(self) -> Response {
        let status = if self.is_success() {
            StatusCode::OK
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (status, Json(self)).into_response()
    }
}

impl IntoResponse for ServiceResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Preflight => StatusCode::OK.into_response(),
            Self::Reply(reply) => reply.into_response(),
        }
    }
}

/// Build the application router with `service` mounted at `vapid_route`.
pub fn router(service: KeyPairService, vapid_route: &str) -> Router {
    Router::new()
        .route(vapid_route, any(handle_vapid))
        .route("/health", get(|| async { "ok" }))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static(CORS_ALLOW_ORIGIN),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(CORS_ALLOW_HEADERS),
        ))
        .with_state(service)
}

async fn handle_vapid(State(service): State<KeyPairService>, method: Method) -> ServiceResponse {
    log::debug!("[Server] {method} on VAPID route");
    service.handle(&method)
}

/// A bound server, ready to run.
#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
    app: Router,
}

impl Server {
    /// Bind the listener described by `config`.
    pub async fn bind(config: &Config, service: KeyPairService) -> Result<Self> {
        config.validate()?;
        let addr = config.socket_addr()?;
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {addr}"))?;
        Ok(Self {
            listener,
            app: router(service, &config.vapid_route),
        })
    }

    /// Address actually bound (resolves port 0).
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("Listener has no local address")
    }

    /// Serve until `shutdown` resolves.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        log::info!("[Server] Listening on http://{}", self.local_addr()?);
        axum::serve(self.listener, self.app)
            .with_graceful_shutdown(shutdown)
            .await
            .context("HTTP server error")?;
        log::info!("[Server] Stopped");
        Ok(())
    }

    /// Serve until Ctrl-C.
    pub async fn run(self) -> Result<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("[Server] Failed to listen for Ctrl-C: {e}");
                // Without a signal handler the server keeps running until killed.
                std::future::pending::<()>().await;
            }
            log::info!("[Server] Shutdown requested");
        })
        .await
    }
}
