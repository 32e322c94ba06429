//! `GET /api/user/intake`: today's totals for a user.

use axum::{
    Json,
    extract::{Query, State},
};
use chrono::Utc;
use dhruv_store::DailyIntakeSummary;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::JsonFailure;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntakeQuery {
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IntakeResponse {
    pub success: bool,
    pub data: DailyIntakeSummary,
}

pub async fn intake_summary_handler(
    State(state): State<AppState>,
    Query(query): Query<IntakeQuery>,
) -> Result<Json<IntakeResponse>, JsonFailure> {
    let user_id = query
        .user_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| JsonFailure::bad_request("User ID is required"))?;
    let user_id =
        Uuid::parse_str(user_id).map_err(|_| JsonFailure::bad_request("Invalid user ID"))?;

    let data = state.store.daily_summary(user_id, Utc::now())?;
    tracing::debug!(
        user_id = %user_id,
        date = %data.date,
        calories = data.calorie_amount,
        water_ml = data.water_intake_amount,
        "Served intake summary"
    );

    Ok(Json(IntakeResponse { success: true, data }))
}
