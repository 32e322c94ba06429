//! Bearer-token authentication.
//!
//! Tokens are opaque strings issued by the store (`dhruv user token`). The
//! middleware resolves the token to its [`User`] and injects it into the
//! request extensions, where handlers pick it up with `Extension<User>`.

use axum::{
    body::Body,
    extract::{Request, State},
    http::{StatusCode, header::AUTHORIZATION},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dhruv_store::User;

use crate::state::AppState;

/// Authentication error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Missing authorization header.
    MissingToken,
    /// Header present but not `Bearer <token>`.
    InvalidFormat,
    /// No user holds this token.
    InvalidToken,
    /// The token lookup itself failed.
    Lookup(String),
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingToken => write!(f, "Missing authorization token"),
            AuthError::InvalidFormat => write!(f, "Invalid authorization format"),
            AuthError::InvalidToken => write!(f, "Invalid token"),
            AuthError::Lookup(e) => write!(f, "Token lookup failed: {}", e),
        }
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match self {
            AuthError::MissingToken | AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
            AuthError::InvalidFormat => StatusCode::BAD_REQUEST,
            AuthError::Lookup(ref e) => {
                tracing::error!(error = %e, "Token lookup failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let message = match self {
            AuthError::MissingToken | AuthError::InvalidToken => "Unauthorized".to_string(),
            other => other.to_string(),
        };

        (status, message).into_response()
    }
}

/// Authentication middleware function.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let user = authenticate(&request, &state)?;
    tracing::debug!(user_id = %user.id, "Authenticated request");

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

fn authenticate(request: &Request<Body>, state: &AppState) -> Result<User, AuthError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?;
    let value = header.to_str().map_err(|_| AuthError::InvalidFormat)?;
    let token = value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::InvalidFormat)?;

    state
        .store
        .user_for_token(token)
        .map_err(|e| AuthError::Lookup(e.to_string()))?
        .ok_or(AuthError::InvalidToken)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::state::{ChatModels, ModelHandle};
    use axum::{Extension, Router, middleware, routing::get};
    use dhruv_llm::MockBackend;
    use dhruv_store::Store;
    use dhruv_types::UserKind;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn create_test_state() -> (AppState, String) {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let user = store.create_user("asha@example.com", UserKind::Regular).unwrap();
        let token = store.issue_token(user.id).unwrap();
        let model = ModelHandle::new(Arc::new(MockBackend::with_text("Test")), "mock-model");
        let state = AppState::new(store, ChatModels::single(model), ServerConfig::default());
        (state, token)
    }

    async fn whoami(Extension(user): Extension<User>) -> String {
        user.email
    }

    fn create_test_router(state: AppState) -> Router {
        Router::new()
            .route("/whoami", get(whoami))
            .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
            .with_state(state)
    }

    async fn send(router: Router, auth: Option<&str>) -> (StatusCode, String) {
        let mut request = Request::builder().uri("/whoami");
        if let Some(auth) = auth {
            request = request.header("Authorization", auth);
        }
        let response = router
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_valid_token_injects_user() {
        let (state, token) = create_test_state();
        let (status, body) = send(create_test_router(state), Some(&format!("Bearer {token}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "asha@example.com");
    }

    #[tokio::test]
    async fn test_missing_token() {
        let (state, _) = create_test_state();
        let (status, _) = send(create_test_router(state), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unknown_token() {
        let (state, _) = create_test_state();
        let (status, _) = send(create_test_router(state), Some("Bearer dhv_nope")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_malformed_header() {
        let (state, token) = create_test_state();
        let (status, _) = send(create_test_router(state.clone()), Some(&format!("Token {token}"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(create_test_router(state), Some("Bearer ")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
