//! Admin console: aggregate report and moderation.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::info;

use super::{ApiState, ListResponse};
use crate::db::{self, reports::AdminReport};
use crate::errors::{AppError, Result};
use crate::models::{UserRecord, UserRole};

#[derive(Debug, Deserialize)]
pub struct AdminQuery {
    pub admin_id: i64,
    #[serde(default)]
    pub role: Option<UserRole>,
}

async fn require_admin(state: &ApiState, admin_id: i64) -> Result<()> {
    db::users::require_role(&state.pool, admin_id, UserRole::Admin).await?;
    Ok(())
}

/// `GET /admin/report?admin_id=1`
pub async fn report(
    State(state): State<Arc<ApiState>>,
    Query(q): Query<AdminQuery>,
) -> Result<Json<AdminReport>> {
    require_admin(&state, q.admin_id).await?;
    Ok(Json(db::reports::admin_report(&state.pool).await?))
}

/// `GET /admin/users?admin_id=1&role=orphanage`
pub async fn users(
    State(state): State<Arc<ApiState>>,
    Query(q): Query<AdminQuery>,
) -> Result<Json<ListResponse<UserRecord>>> {
    require_admin(&state, q.admin_id).await?;
    let rows = db::users::list_users(&state.pool, q.role).await?;
    Ok(Json(rows.into()))
}

/// `DELETE /admin/users/:id?admin_id=1`
pub async fn delete_user(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
    Query(q): Query<AdminQuery>,
) -> Result<StatusCode> {
    require_admin(&state, q.admin_id).await?;
    if id == q.admin_id {
        return Err(AppError::BadRequest("admins cannot delete themselves".to_string()));
    }
    if !db::users::delete_user(&state.pool, id).await? {
        return Err(AppError::NotFound(format!("user {id}")));
    }
    info!("Admin {} removed user {id}", q.admin_id);
    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /admin/requests/:id?admin_id=1`
pub async fn delete_request(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
    Query(q): Query<AdminQuery>,
) -> Result<StatusCode> {
    require_admin(&state, q.admin_id).await?;
    if !db::requests::delete_request(&state.pool, id, None).await? {
        return Err(AppError::NotFound(format!("request {id}")));
    }
    info!("Admin {} removed request {id}", q.admin_id);
    Ok(StatusCode::NO_CONTENT)
}
