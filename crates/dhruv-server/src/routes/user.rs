//! `POST /api/user/update-details`: save the onboarding form.
//!
//! The account is addressed by the `email` in the body. Only the auth
//! middleware gates the route; the handler does not compare the email with
//! the caller. Fields missing from the body keep their stored value, and an
//! email with no account is a successful no-op.

use axum::{
    Json,
    body::Bytes,
    extract::State,
};
use dhruv_store::ProfileUpdate;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::JsonFailure;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UpdateDetailsRequest {
    pub email: String,
    #[serde(flatten)]
    pub profile: ProfileUpdate,
}

pub async fn update_details_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, JsonFailure> {
    let request: UpdateDetailsRequest =
        serde_json::from_slice(&body).map_err(|e| JsonFailure::internal(e.to_string()))?;

    let applied = state
        .store
        .update_user_profile(&request.email, request.profile)?;
    if applied {
        tracing::info!(email = %request.email, "Updated user details");
    } else {
        tracing::warn!(email = %request.email, "No account for user details update");
    }

    Ok(Json(json!({ "success": true })))
}
