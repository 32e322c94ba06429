//! HTTP API server for Dhruv.
//!
//! # Routes
//!
//! - `GET /ping`, `GET /health` (no auth)
//! - `POST /api/chat` streams a coaching turn as Server-Sent Events
//! - `GET /api/chat?chatId=` reattaches to the latest generation of a chat
//! - `DELETE /api/chat?id=` deletes a chat
//! - `GET /api/user/intake?userId=` returns today's IST intake totals
//! - `POST /api/user/update-details` saves the onboarding profile
//!
//! Every `/api` route requires `Authorization: Bearer <token>`.
//!
//! # Example
//!
//! ```ignore
//! use dhruv_server::{AppState, ChatModels, ModelHandle, Server, ServerConfig};
//!
//! let models = ChatModels::single(ModelHandle::new(backend, "gpt-4o-mini"));
//! let state = AppState::new(store, models, ServerConfig::default());
//! Server::from_state(state).run().await?;
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod stream;

pub use auth::{AuthError, auth_middleware};
pub use config::{Entitlements, ServerConfig};
pub use error::{JsonFailure, Result, ServerError};
pub use routes::{ChatModelId, ChatRequest};
pub use state::{AppState, ChatModels, ModelHandle};
pub use stream::{ResumableStream, StreamContext};

use std::net::SocketAddr;

use axum::{
    Router,
    body::Body,
    extract::{Request, State},
    http::{HeaderValue, Method, header},
    middleware::{self, Next},
    response::Response,
};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// The Dhruv HTTP server.
pub struct Server {
    state: AppState,
}

impl Server {
    pub fn from_state(state: AppState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Build the router with all routes and middleware.
    pub fn router(&self) -> Router {
        let mut router = Router::new()
            .merge(routes::health_routes())
            .nest("/api", self.api_routes())
            .layer(middleware::from_fn_with_state(
                self.state.clone(),
                request_logging_middleware,
            ))
            .layer(TraceLayer::new_for_http());

        if let Some(cors) = build_cors(&self.state.config.cors_origins) {
            router = router.layer(cors);
        }

        router.with_state(self.state.clone())
    }

    /// All API routes sit behind the auth middleware.
    fn api_routes(&self) -> Router<AppState> {
        use axum::routing::{get, post};

        Router::new()
            .route(
                "/chat",
                post(routes::chat_handler)
                    .get(routes::resume_handler)
                    .delete(routes::delete_chat_handler),
            )
            .route("/user/intake", get(routes::intake_summary_handler))
            .route("/user/update-details", post(routes::update_details_handler))
            .layer(middleware::from_fn_with_state(
                self.state.clone(),
                auth::auth_middleware,
            ))
    }

    /// Run on the configured bind address.
    pub async fn run(self) -> Result<()> {
        let addr = self.state.config.bind_address;
        self.run_on(addr).await
    }

    /// Run on a specific address (useful for testing).
    pub async fn run_on(self, addr: SocketAddr) -> Result<()> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Internal(format!("Failed to bind: {}", e)))?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener.
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        let router = self.router();
        if let Ok(addr) = listener.local_addr() {
            info!(
                addr = %addr,
                resumable_streams = self.state.streams.is_some(),
                memory = self.state.memory.is_some(),
                "Starting server"
            );
        }

        axum::serve(listener, router)
            .await
            .map_err(|e| ServerError::Internal(format!("Server error: {}", e)))
    }

    pub fn bind_address(&self) -> SocketAddr {
        self.state.config.bind_address
    }
}

fn build_cors(origins: &[String]) -> Option<CorsLayer> {
    if origins.is_empty() {
        return None;
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    Some(
        CorsLayer::new()
            .allow_origin(parsed)
            .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]),
    )
}

/// Log each request with its status and latency.
async fn request_logging_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !state.config.request_logging {
        return next.run(request).await;
    }

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = std::time::Instant::now();

    let response = next.run(request).await;

    let status = response.status().as_u16();
    let duration_ms = start.elapsed().as_millis();
    if response.status().is_server_error() {
        tracing::error!(%method, %path, status, duration_ms, "Request completed with server error");
    } else if response.status().is_client_error() {
        tracing::warn!(%method, %path, status, duration_ms, "Request completed with client error");
    } else {
        tracing::info!(%method, %path, status, duration_ms, "Request completed");
    }

    response
}
