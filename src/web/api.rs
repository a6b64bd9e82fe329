//! JSON endpoints for the mobile client.

use super::AppState;
use crate::errors::VetError;
use crate::images::full_image_url;
use crate::session::bearer_token;
use crate::storage::{self, HistoryWithService, OwnerAggregate, PetAggregate};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
    pub expiration: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub history_response_id: i32,
    pub description: String,
    /// RFC 3339, UTC
    pub date: String,
    pub remarks: Option<String>,
    pub service_type: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PetResponse {
    pub pet_response_id: i32,
    pub name: String,
    pub race: String,
    pub born: NaiveDate,
    pub image_url: Option<String>,
    pub remarks: Option<String>,
    pub pet_type: String,
    pub histories: Vec<HistoryResponse>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OwnerResponse {
    pub owner_response_id: i32,
    pub first_name: String,
    pub last_name: String,
    pub document: Option<String>,
    pub address: Option<String>,
    pub phone_number: Option<String>,
    pub email: String,
    pub pets: Vec<PetResponse>,
}

impl HistoryResponse {
    fn from_loaded(h: HistoryWithService) -> Self {
        Self {
            history_response_id: h.history.id,
            date: h
                .history
                .date_utc()
                .to_rfc3339_opts(SecondsFormat::Secs, true),
            description: h.history.description,
            remarks: h.history.remarks,
            service_type: h.service_type.name,
        }
    }
}

impl PetResponse {
    fn from_loaded(p: PetAggregate, base_url: &str) -> Self {
        Self {
            pet_response_id: p.pet.id,
            image_url: full_image_url(base_url, p.pet.image_url.as_deref()),
            name: p.pet.name,
            race: p.pet.race,
            born: p.pet.born,
            remarks: p.pet.remarks,
            pet_type: p.pet_type.name,
            histories: p
                .histories
                .into_iter()
                .map(HistoryResponse::from_loaded)
                .collect(),
        }
    }
}

impl OwnerResponse {
    /// Flatten a loaded owner; image paths become absolute under `base_url`.
    pub fn from_aggregate(owner: OwnerAggregate, base_url: &str) -> Self {
        Self {
            owner_response_id: owner.owner.id,
            first_name: owner.user.first_name,
            last_name: owner.user.last_name,
            document: owner.user.document,
            address: owner.user.address,
            phone_number: owner.user.phone_number,
            email: owner.user.email,
            pets: owner
                .pets
                .into_iter()
                .map(|p| PetResponse::from_loaded(p, base_url))
                .collect(),
        }
    }
}

/// A usable email: non-blank and containing `@`.
fn parse_email_request(body: &[u8]) -> Option<String> {
    let request: EmailRequest = serde_json::from_slice(body).ok()?;
    let email = request.email.trim();
    if email.is_empty() || !email.contains('@') {
        return None;
    }
    Some(email.to_string())
}

async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<i32, VetError> {
    let token = bearer_token(headers).ok_or(VetError::Unauthorized)?;
    match storage::get_api_token(&state.db, &token).await? {
        Some(t) => Ok(t.user_id),
        None => Err(VetError::Unauthorized),
    }
}

/// POST /api/account/CreateToken
pub async fn create_token(State(state): State<AppState>, body: Bytes) -> Response {
    let request: TokenRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(_) => {
            return VetError::Validation("Invalid token request.".to_string()).into_response()
        }
    };

    let user =
        match storage::verify_user_password(&state.db, &request.username, &request.password).await
        {
            Ok(Some(u)) => u,
            Ok(None) => {
                return VetError::Validation("Invalid username or password.".to_string())
                    .into_response()
            }
            Err(e) => return e.into_response(),
        };

    match storage::issue_api_token(&state.db, user.id, state.settings.auth.token_ttl_secs).await {
        Ok(token) => {
            tracing::info!(user_id = user.id, "Issued API token");
            let response = TokenResponse {
                token: token.token,
                expiration: crate::entities::utc_from_timestamp(token.expires_at),
            };
            (StatusCode::CREATED, Json(response)).into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// POST /api/owners/GetOwnerByEmail
pub async fn get_owner_by_email(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(e) = authenticate(&state, &headers).await {
        return e.into_response();
    }

    let Some(email) = parse_email_request(&body) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    match storage::find_owner_by_email(&state.db, &email).await {
        Ok(Some(owner)) => {
            let base_url = state.settings.public_base_url();
            Json(OwnerResponse::from_aggregate(owner, &base_url)).into_response()
        }
        Ok(None) => VetError::NotFound(format!("Owner with email {email}")).into_response(),
        Err(e) => e.into_response(),
    }
}
