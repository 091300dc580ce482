//! HTTP handlers for deposits themselves.

use crate::{errors::AppError, models::user::Identity, state::AppState};
use axum::{Json, extract::State, http::StatusCode};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

#[derive(Debug, Serialize)]
pub struct DepositResponse {
    pub id: String,
    pub status: &'static str,
    pub created: DateTime<Utc>,
}

/// POST `/deposits`: create an empty draft owned by the caller.
pub async fn create_deposit(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<(StatusCode, Json<DepositResponse>), AppError> {
    let Some(user_id) = identity.user_id() else {
        return Err(AppError::unauthorized("authentication required"));
    };
    if !identity.can_write() {
        return Err(AppError::forbidden("token lacks the deposit:write scope"));
    }

    let deposit = state.deposits.create(user_id).await?;
    info!(user = %user_id, deposit = %deposit.pid, "deposit created");

    Ok((
        StatusCode::CREATED,
        Json(DepositResponse {
            id: deposit.pid,
            status: deposit.status.as_str(),
            created: deposit.created_at,
        }),
    ))
}
