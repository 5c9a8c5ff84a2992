//! Service requests (workshops, tutoring, repairs…).

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use donation_ledger::{ServiceAction, ServiceStatus};
use serde::Deserialize;

use super::{ApiJson, ApiState, ListResponse};
use crate::db;
use crate::errors::{AppError, Result};
use crate::models::{ServiceRecord, ServiceView, UserRole};

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub status: Option<ServiceStatus>,
}

/// `GET /services?status=pending`
pub async fn list(
    State(state): State<Arc<ApiState>>,
    Query(q): Query<StatusQuery>,
) -> Result<Json<ListResponse<ServiceView>>> {
    let rows = db::services::list_services(&state.pool, q.status).await?;
    let views = rows
        .iter()
        .map(ServiceRecord::to_view)
        .collect::<Result<Vec<_>>>()?;
    Ok(Json(views.into()))
}

#[derive(Debug, Deserialize)]
pub struct NewService {
    pub orphanage_id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// `POST /services`
pub async fn create(
    State(state): State<Arc<ApiState>>,
    ApiJson(new): ApiJson<NewService>,
) -> Result<(StatusCode, Json<ServiceView>)> {
    db::users::require_role(&state.pool, new.orphanage_id, UserRole::Orphanage).await?;
    let record =
        db::services::insert_service(&state.pool, new.orphanage_id, &new.title, &new.description)
            .await?;
    Ok((StatusCode::CREATED, Json(record.to_view()?)))
}

/// `GET /services/:id`
pub async fn get(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
) -> Result<Json<ServiceView>> {
    let record = db::services::get_service(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("service {id}")))?;
    Ok(Json(record.to_view()?))
}

#[derive(Debug, Deserialize)]
pub struct OfferBody {
    pub donor_id: i64,
    #[serde(default)]
    pub note: Option<String>,
}

/// `POST /services/:id/offers`
pub async fn offer(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
    ApiJson(body): ApiJson<OfferBody>,
) -> Result<(StatusCode, Json<ServiceView>)> {
    db::users::require_role(&state.pool, body.donor_id, UserRole::Donor).await?;
    let record = db::services::offer(&state.pool, id, body.donor_id, body.note.as_deref()).await?;
    Ok((StatusCode::CREATED, Json(record.to_view()?)))
}

#[derive(Debug, Deserialize)]
pub struct OrphanageBody {
    pub orphanage_id: i64,
}

async fn act(
    state: &ApiState,
    id: i64,
    orphanage_id: i64,
    action: ServiceAction,
) -> Result<Json<ServiceView>> {
    let record = db::services::transition(&state.pool, id, orphanage_id, action).await?;
    Ok(Json(record.to_view()?))
}

/// `POST /services/:id/accept`
pub async fn accept(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
    ApiJson(body): ApiJson<OrphanageBody>,
) -> Result<Json<ServiceView>> {
    act(&state, id, body.orphanage_id, ServiceAction::Accept).await
}

/// `POST /services/:id/complete`
pub async fn complete(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
    ApiJson(body): ApiJson<OrphanageBody>,
) -> Result<Json<ServiceView>> {
    act(&state, id, body.orphanage_id, ServiceAction::Complete).await
}

/// `POST /services/:id/reject`
pub async fn reject(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
    ApiJson(body): ApiJson<OrphanageBody>,
) -> Result<Json<ServiceView>> {
    act(&state, id, body.orphanage_id, ServiceAction::Reject).await
}
