use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use tracing::info;

use service::possession::{PossessOutcome, Possession};
use service::store::PossessionRecord;

use crate::errors::ApiError;
use crate::routes::AppState;

#[derive(Serialize, Debug)]
pub struct PossessionBody {
    pub group_id: i64,
    pub target_user_id: i64,
    pub target_name: String,
}

impl From<Possession> for PossessionBody {
    fn from(p: Possession) -> Self {
        Self { group_id: p.group_id, target_user_id: p.target_user_id, target_name: p.target_name }
    }
}

impl PossessionBody {
    fn from_record(group_id: i64, rec: PossessionRecord) -> Self {
        Self { group_id, target_user_id: rec.target_user_id, target_name: rec.target_name }
    }
}

fn check_group_id(group_id: i64) -> Result<(), ApiError> {
    if group_id <= 0 {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "group_id must be a positive integer"));
    }
    Ok(())
}

/// Possess a random member of the group right now.
pub async fn possess_now(
    State(state): State<AppState>,
    Path(group_id): Path<i64>,
) -> Result<Json<PossessionBody>, ApiError> {
    check_group_id(group_id)?;
    match state.service.possess_group(group_id).await? {
        PossessOutcome::Possessed(p) => {
            info!(group_id, target_user_id = p.target_user_id, target_name = %p.target_name, "on-demand possession");
            Ok(Json(p.into()))
        }
        PossessOutcome::NoEligibleTarget => Err(ApiError::new(
            StatusCode::NOT_FOUND,
            "could not find a suitable member, try again later",
        )),
        PossessOutcome::GroupNotAllowed => Err(ApiError::new(
            StatusCode::FORBIDDEN,
            "group is excluded by the group filter",
        )),
    }
}

/// Latest recorded possession in the group.
pub async fn status(
    State(state): State<AppState>,
    Path(group_id): Path<i64>,
) -> Result<Json<PossessionBody>, ApiError> {
    check_group_id(group_id)?;
    match state.service.status(group_id).await? {
        Some(rec) => Ok(Json(PossessionBody::from_record(group_id, rec))),
        None => Err(ApiError::new(StatusCode::NOT_FOUND, "no possession recorded for this group")),
    }
}

pub async fn clear(
    State(state): State<AppState>,
    Path(group_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    check_group_id(group_id)?;
    if state.service.clear(group_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::new(StatusCode::NOT_FOUND, "no possession recorded for this group"))
    }
}
