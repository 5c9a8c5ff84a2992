//! Axum REST API: router, shared state and handlers grouped by surface.

use std::sync::Arc;

use axum::{
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::geocode::Geocoder;

pub use extract::ApiJson;

mod admin;
mod extract;
mod fundraisers;
mod requests;
mod services;
mod users;

#[derive(Clone)]
pub struct ApiState {
    pub pool: SqlitePool,
    pub config: Config,
    pub geocoder: Geocoder,
}

/// Every route the service exposes.
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(health))
        // Accounts & inbox
        .route("/users", post(users::create_user))
        .route("/users/:id", get(users::get_user))
        .route("/users/:id/donations", get(users::donation_history))
        .route("/users/:id/notifications", get(users::notifications))
        .route("/notifications/:id/read", post(users::mark_read))
        .route("/messages", post(users::send_message).get(users::conversation))
        .route("/geocode", get(users::geocode))
        // Requests, donations, payments
        .route("/requests", get(requests::list).post(requests::create))
        .route("/requests/:id", get(requests::get).delete(requests::remove))
        .route(
            "/requests/:id/donations",
            get(requests::donations).post(requests::donate),
        )
        .route("/donations/:id/confirm", post(requests::confirm))
        .route("/donations/:id/reject", post(requests::reject))
        .route("/donations/:id/payment", post(requests::start_payment))
        .route("/donations/:id/payment/verify", post(requests::verify_payment))
        // Fundraisers
        .route("/fundraisers", get(fundraisers::list).post(fundraisers::create))
        .route("/fundraisers/:id", get(fundraisers::get))
        .route(
            "/fundraisers/:id/donations",
            get(fundraisers::gifts).post(fundraisers::pledge),
        )
        .route(
            "/fundraisers/:id/donations/:donation_id/confirm",
            post(fundraisers::confirm),
        )
        .route(
            "/fundraisers/:id/donations/:donation_id/reject",
            post(fundraisers::reject),
        )
        // Services
        .route("/services", get(services::list).post(services::create))
        .route("/services/:id", get(services::get))
        .route("/services/:id/offers", post(services::offer))
        .route("/services/:id/accept", post(services::accept))
        .route("/services/:id/complete", post(services::complete))
        .route("/services/:id/reject", post(services::reject))
        // Admin console
        .route("/admin/report", get(admin::report))
        .route("/admin/users", get(admin::users))
        .route("/admin/users/:id", delete(admin::delete_user))
        .route("/admin/requests/:id", delete(admin::delete_request))
        .with_state(state)
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
pub struct ListResponse<T> {
    pub count: usize,
    pub items: Vec<T>,
}

impl<T> From<Vec<T>> for ListResponse<T> {
    fn from(items: Vec<T>) -> Self {
        Self {
            count: items.len(),
            items,
        }
    }
}
