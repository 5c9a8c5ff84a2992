//! Fundraiser campaigns.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use donation_ledger::{FundraiserStatus, Quantity};
use serde::{Deserialize, Serialize};

use super::{ApiJson, ApiState, ListResponse};
use crate::db;
use crate::errors::{AppError, Result};
use crate::models::{FundraiserDonationRecord, FundraiserView, NewFundraiser, UserRole};

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub status: Option<FundraiserStatus>,
}

/// `GET /fundraisers?status=active`
pub async fn list(
    State(state): State<Arc<ApiState>>,
    Query(q): Query<StatusQuery>,
) -> Result<Json<ListResponse<FundraiserView>>> {
    let views = db::fundraisers::list_fundraisers(&state.pool, q.status).await?;
    Ok(Json(views.into()))
}

/// `POST /fundraisers`
pub async fn create(
    State(state): State<Arc<ApiState>>,
    ApiJson(new): ApiJson<NewFundraiser>,
) -> Result<(StatusCode, Json<FundraiserView>)> {
    db::users::require_role(&state.pool, new.orphanage_id, UserRole::Orphanage).await?;
    let view = db::fundraisers::insert_fundraiser(&state.pool, &new).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// `GET /fundraisers/:id`
pub async fn get(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
) -> Result<Json<FundraiserView>> {
    db::fundraisers::get_fundraiser(&state.pool, id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("fundraiser {id}")))
}

#[derive(Debug, Deserialize)]
pub struct PledgeBody {
    pub donor_id: i64,
    pub amount: Quantity,
}

#[derive(Debug, Serialize)]
pub struct PledgeResponse {
    pub id: i64,
    pub fundraiser_id: i64,
    pub amount: i64,
    pub confirmation: String,
}

/// `POST /fundraisers/:id/donations`
pub async fn pledge(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
    ApiJson(body): ApiJson<PledgeBody>,
) -> Result<(StatusCode, Json<PledgeResponse>)> {
    db::users::require_role(&state.pool, body.donor_id, UserRole::Donor).await?;
    let record = db::fundraisers::pledge(&state.pool, id, body.donor_id, body.amount.get()).await?;
    Ok((
        StatusCode::CREATED,
        Json(PledgeResponse {
            id: record.id,
            fundraiser_id: record.fundraiser_id,
            amount: record.amount,
            confirmation: record.confirmation,
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct ConfirmBody {
    pub orphanage_id: i64,
}

/// `POST /fundraisers/:id/donations/:donation_id/confirm`
pub async fn confirm(
    State(state): State<Arc<ApiState>>,
    Path((id, donation_id)): Path<(i64, i64)>,
    ApiJson(body): ApiJson<ConfirmBody>,
) -> Result<Json<FundraiserView>> {
    let view =
        db::fundraisers::confirm_pledge(&state.pool, id, donation_id, body.orphanage_id).await?;
    Ok(Json(view))
}

/// `POST /fundraisers/:id/donations/:donation_id/reject`
pub async fn reject(
    State(state): State<Arc<ApiState>>,
    Path((id, donation_id)): Path<(i64, i64)>,
    ApiJson(body): ApiJson<ConfirmBody>,
) -> Result<Json<FundraiserView>> {
    let view =
        db::fundraisers::reject_pledge(&state.pool, id, donation_id, body.orphanage_id).await?;
    Ok(Json(view))
}

/// `GET /fundraisers/:id/donations`
pub async fn gifts(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
) -> Result<Json<ListResponse<FundraiserDonationRecord>>> {
    db::fundraisers::gifts_for(&state.pool, id)
        .await?
        .map(|rows| Json(rows.into()))
        .ok_or_else(|| AppError::NotFound(format!("fundraiser {id}")))
}
