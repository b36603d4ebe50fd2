use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Client, SpaService};
use crate::state::AppState;

use super::check_auth;

// POST /api/clients
#[derive(Deserialize)]
pub struct CreateClientRequest {
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
}

pub async fn create_client(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateClientRequest>,
) -> Result<(StatusCode, Json<Client>), AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let name = body.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("client name is required".to_string()));
    }

    let client = Client {
        id: uuid::Uuid::new_v4().to_string(),
        name: name.to_string(),
        phone: body.phone.filter(|p| !p.trim().is_empty()),
        email: body.email.filter(|e| !e.trim().is_empty()),
    };

    {
        let db = state.conn()?;
        queries::create_client(&db, &client)?;
    }

    Ok((StatusCode::CREATED, Json(client)))
}

// GET /api/clients/:id
pub async fn get_client(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Client>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let client = {
        let db = state.conn()?;
        queries::get_client_by_id(&db, &id)?
    };

    client
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("client {id}")))
}

// GET /api/services
pub async fn list_services(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<SpaService>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let services = {
        let db = state.conn()?;
        queries::list_services(&db)?
    };

    Ok(Json(services))
}

// POST /api/services
#[derive(Deserialize)]
pub struct CreateServiceRequest {
    pub name: String,
    pub duration_minutes: i32,
    #[serde(default)]
    pub price: f64,
}

pub async fn create_service(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateServiceRequest>,
) -> Result<(StatusCode, Json<SpaService>), AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    if body.name.trim().is_empty() || body.duration_minutes <= 0 {
        return Err(AppError::BadRequest(
            "service needs a name and a positive duration".to_string(),
        ));
    }

    let service = SpaService {
        id: uuid::Uuid::new_v4().to_string(),
        name: body.name.trim().to_string(),
        duration_minutes: body.duration_minutes,
        price: body.price,
    };

    {
        let db = state.conn()?;
        queries::create_service(&db, &service)?;
    }

    Ok((StatusCode::CREATED, Json(service)))
}
