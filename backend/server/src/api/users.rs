//! Accounts, donor history, notifications, chat and geocoding.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::warn;

use super::{ApiJson, ApiState, ListResponse};
use crate::db;
use crate::errors::{AppError, Result};
use crate::geocode::{self, Place};
use crate::models::{
    DonationRecord, DonationView, MessageRecord, NewMessage, NewUser, NotificationRecord,
    UserRecord,
};

/// `POST /users`
///
/// When `city` is omitted but coordinates are given, the city is looked up
/// by reverse geocoding.  A failed lookup leaves the city empty.
pub async fn create_user(
    State(state): State<Arc<ApiState>>,
    ApiJson(new): ApiJson<NewUser>,
) -> Result<(StatusCode, Json<UserRecord>)> {
    if new.name.trim().is_empty() || !new.email.contains('@') {
        return Err(AppError::BadRequest("name and a valid email are required".to_string()));
    }

    let mut city = new
        .city
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string);

    if city.is_none() {
        if let (Some(lat), Some(lon)) = (new.latitude, new.longitude) {
            match state.geocoder.reverse(lat, lon).await {
                Ok(place) => city = Some(place.city),
                Err(e) => warn!("Could not resolve city for {}: {e}", new.email),
            }
        }
    }

    let user = db::users::insert_user(&state.pool, &new, city.as_deref()).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// `GET /users/:id`
pub async fn get_user(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
) -> Result<Json<UserRecord>> {
    db::users::get_user(&state.pool, id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("user {id}")))
}

/// `GET /users/:id/donations`
///
/// The donor dashboard's history, newest first.
pub async fn donation_history(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
) -> Result<Json<ListResponse<DonationView>>> {
    let rows = db::requests::donations_by_donor(&state.pool, id).await?;
    let views = rows
        .iter()
        .map(DonationRecord::to_view)
        .collect::<Result<Vec<_>>>()?;
    Ok(Json(views.into()))
}

#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread: bool,
}

/// `GET /users/:id/notifications?unread=true`
pub async fn notifications(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
    Query(q): Query<NotificationQuery>,
) -> Result<Json<ListResponse<NotificationRecord>>> {
    let rows = db::messages::notifications_for(&state.pool, id, q.unread).await?;
    Ok(Json(rows.into()))
}

/// `POST /notifications/:id/read`
pub async fn mark_read(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    if db::messages::mark_read(&state.pool, id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("notification {id}")))
    }
}

/// `POST /messages`
pub async fn send_message(
    State(state): State<Arc<ApiState>>,
    ApiJson(msg): ApiJson<NewMessage>,
) -> Result<(StatusCode, Json<MessageRecord>)> {
    let record = db::messages::send_message(&state.pool, &msg).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

#[derive(Debug, Deserialize)]
pub struct ConversationQuery {
    pub a: i64,
    pub b: i64,
}

/// `GET /messages?a=1&b=2`
pub async fn conversation(
    State(state): State<Arc<ApiState>>,
    Query(q): Query<ConversationQuery>,
) -> Result<Json<ListResponse<MessageRecord>>> {
    let rows = db::messages::conversation(&state.pool, q.a, q.b).await?;
    Ok(Json(rows.into()))
}

#[derive(Debug, Deserialize)]
pub struct GeocodeQuery {
    pub lat: f64,
    pub lon: f64,
}

/// `GET /geocode?lat=18.52&lon=73.85`
pub async fn geocode(
    State(state): State<Arc<ApiState>>,
    Query(q): Query<GeocodeQuery>,
) -> Result<Json<Place>> {
    geocode::validate_coordinates(q.lat, q.lon)?;
    let place = state.geocoder.reverse(q.lat, q.lon).await?;
    Ok(Json(place))
}
