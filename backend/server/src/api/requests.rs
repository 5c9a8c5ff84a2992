//! Request browser, donation submission, confirmation and payment.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use donation_ledger::PledgeForm;
use serde::Deserialize;

use super::{ApiJson, ApiState, ListResponse};
use crate::db::{self, requests::Decision};
use crate::errors::{AppError, Result};
use crate::models::{
    DonationRecord, DonationView, NewRequest, RequestFilter, RequestView, Resolution, UserRole,
};
use crate::payment::{self, PaymentView, StartPayment, VerifyOutcome, VerifyPayment};

/// `GET /requests?city=Pune&kind=food&status=pending`
pub async fn list(
    State(state): State<Arc<ApiState>>,
    Query(filter): Query<RequestFilter>,
) -> Result<Json<ListResponse<RequestView>>> {
    let views = db::requests::list_requests(&state.pool, &filter).await?;
    Ok(Json(views.into()))
}

/// `POST /requests`
pub async fn create(
    State(state): State<Arc<ApiState>>,
    ApiJson(new): ApiJson<NewRequest>,
) -> Result<(StatusCode, Json<RequestView>)> {
    let orphanage =
        db::users::require_role(&state.pool, new.orphanage_id, UserRole::Orphanage).await?;

    let city = new
        .city
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .or(orphanage.city.as_deref())
        .ok_or_else(|| AppError::BadRequest("city is required".to_string()))?
        .to_string();

    let record = db::requests::insert_request(&state.pool, &new, &city).await?;
    let view = db::requests::get_request(&state.pool, record.id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("request {}", record.id)))?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// `GET /requests/:id`
pub async fn get(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
) -> Result<Json<RequestView>> {
    db::requests::get_request(&state.pool, id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("request {id}")))
}

#[derive(Debug, Deserialize)]
pub struct OwnerQuery {
    pub orphanage_id: i64,
}

/// `DELETE /requests/:id?orphanage_id=7`
pub async fn remove(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
    Query(q): Query<OwnerQuery>,
) -> Result<StatusCode> {
    if db::requests::delete_request(&state.pool, id, Some(q.orphanage_id)).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("request {id}")))
    }
}

/// `GET /requests/:id/donations`
pub async fn donations(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
) -> Result<Json<ListResponse<DonationView>>> {
    let rows = db::requests::donations_for_request(&state.pool, id).await?;
    let views = rows
        .iter()
        .map(DonationRecord::to_view)
        .collect::<Result<Vec<_>>>()?;
    Ok(Json(views.into()))
}

#[derive(Debug, Deserialize)]
pub struct DonateBody {
    pub donor_id: i64,
    #[serde(flatten)]
    pub pledge: PledgeForm,
}

/// `POST /requests/:id/donations`
///
/// Body carries the kind's field (`amount`, `clothes`, `meals`,
/// `quantity`) or `items` for subtyped requests.
pub async fn donate(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
    ApiJson(body): ApiJson<DonateBody>,
) -> Result<(StatusCode, Json<DonationView>)> {
    db::users::require_role(&state.pool, body.donor_id, UserRole::Donor).await?;
    let record = db::requests::submit_donation(&state.pool, body.donor_id, id, &body.pledge).await?;
    Ok((StatusCode::CREATED, Json(record.to_view()?)))
}

#[derive(Debug, Deserialize)]
pub struct OrphanageBody {
    pub orphanage_id: i64,
}

/// `POST /donations/:id/confirm`
pub async fn confirm(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
    ApiJson(body): ApiJson<OrphanageBody>,
) -> Result<Json<Resolution>> {
    let resolution =
        db::requests::resolve_donation(&state.pool, id, Some(body.orphanage_id), Decision::Confirm)
            .await?;
    Ok(Json(resolution))
}

/// `POST /donations/:id/reject`
pub async fn reject(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
    ApiJson(body): ApiJson<OrphanageBody>,
) -> Result<Json<Resolution>> {
    let resolution =
        db::requests::resolve_donation(&state.pool, id, Some(body.orphanage_id), Decision::Reject)
            .await?;
    Ok(Json(resolution))
}

/// `POST /donations/:id/payment`
pub async fn start_payment(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
    ApiJson(body): ApiJson<StartPayment>,
) -> Result<(StatusCode, Json<PaymentView>)> {
    let view = payment::start(&state.pool, &state.config, id, &body).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// `POST /donations/:id/payment/verify`
pub async fn verify_payment(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
    ApiJson(body): ApiJson<VerifyPayment>,
) -> Result<Json<VerifyOutcome>> {
    let outcome = payment::verify(&state.pool, &state.config, id, &body).await?;
    Ok(Json(outcome))
}
