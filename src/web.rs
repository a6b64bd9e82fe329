//! HTTP surface: the admin pages under `/owners`, `/pet-types`,
//! `/service-types` and `/agenda`, the login pages under `/account`, and the
//! JSON API under `/api`.
//!
//! Every admin handler starts with an explicit `require_admin` call. GET
//! handlers render a page; POST handlers mutate and answer `303 See Other`.

pub mod account;
pub mod agenda;
pub mod api;
pub mod catalog;
pub mod owners;
pub mod pets;

use crate::entities::user;
use crate::errors::VetError;
use crate::images::ImageStore;
use crate::session::SessionCookie;
use crate::settings::Settings;
use crate::storage::{self, Role};
use crate::views;
use axum::body::Body;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Request, Uri};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::Router;
use miette::IntoDiagnostic;
use sea_orm::DatabaseConnection;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::services::ServeDir;

/// Largest accepted request body; pet pictures are uploaded in one piece.
const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub db: DatabaseConnection,
    pub images: ImageStore,
}

impl AppState {
    pub fn new(settings: Settings, db: DatabaseConnection) -> Self {
        let images = ImageStore::new(&settings.images);
        Self {
            settings: Arc::new(settings),
            db,
            images,
        }
    }
}

// Security headers middleware
async fn security_headers(request: Request<Body>, next: Next) -> impl IntoResponse {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(
        HeaderName::from_static("x-frame-options"),
        HeaderValue::from_static("DENY"),
    );
    headers.insert(
        HeaderName::from_static("x-content-type-options"),
        HeaderValue::from_static("nosniff"),
    );
    // Pages use inline styles only; no scripts are served.
    headers.insert(
        HeaderName::from_static("content-security-policy"),
        HeaderValue::from_static(
            "default-src 'self'; script-src 'none'; style-src 'self' 'unsafe-inline'; img-src 'self' data:; form-action 'self'",
        ),
    );
    headers.insert(
        HeaderName::from_static("referrer-policy"),
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );

    response
}

pub fn router(state: AppState) -> Router {
    let images_prefix = state.images.url_prefix().to_string();
    let images_dir = state.images.dir().to_path_buf();

    Router::new()
        .route("/", get(|| async { Redirect::to("/owners") }))
        // Account
        .route(
            "/account/login",
            get(account::login_page).post(account::login_submit),
        )
        .route("/account/logout", get(account::logout))
        // Owners
        .route("/owners", get(owners::index))
        .route("/owners/details/{id}", get(owners::details))
        .route(
            "/owners/create",
            get(owners::create_page).post(owners::create_submit),
        )
        .route(
            "/owners/edit/{id}",
            get(owners::edit_page).post(owners::edit_submit),
        )
        .route(
            "/owners/delete/{id}",
            get(owners::delete_page).post(owners::delete_submit),
        )
        // Pets and their histories
        .route(
            "/owners/add-pet/{owner_id}",
            get(pets::add_pet_page).post(pets::add_pet_submit),
        )
        .route(
            "/owners/edit-pet/{id}",
            get(pets::edit_pet_page).post(pets::edit_pet_submit),
        )
        .route("/owners/details-pet/{id}", get(pets::details_pet))
        .route("/owners/delete-pet/{id}", post(pets::delete_pet))
        .route(
            "/owners/add-history/{pet_id}",
            get(pets::add_history_page).post(pets::add_history_submit),
        )
        .route(
            "/owners/edit-history/{id}",
            get(pets::edit_history_page).post(pets::edit_history_submit),
        )
        .route("/owners/delete-history/{id}", post(pets::delete_history))
        // Catalogs
        .nest(
            "/pet-types",
            catalog::router(state.clone(), catalog::Catalog::PetTypes),
        )
        .nest(
            "/service-types",
            catalog::router(state.clone(), catalog::Catalog::ServiceTypes),
        )
        // Agenda
        .route("/agenda", get(agenda::index))
        .route("/agenda/add-days", post(agenda::add_days))
        .route(
            "/agenda/assign/{id}",
            get(agenda::assign_page).post(agenda::assign_submit),
        )
        .route("/agenda/unassign/{id}", post(agenda::unassign))
        // Mobile API
        .route("/api/account/CreateToken", post(api::create_token))
        .route("/api/owners/GetOwnerByEmail", post(api::get_owner_by_email))
        .nest_service(&images_prefix, ServeDir::new(images_dir))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(middleware::from_fn(security_headers))
        .with_state(state)
}

pub async fn serve(settings: Settings, db: DatabaseConnection) -> miette::Result<()> {
    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port)
        .parse()
        .map_err(|e| miette::miette!("bad listen addr: {e}"))?;

    let state = AppState::new(settings, db);
    let router = router(state);

    tracing::info!(%addr, "MyVet listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .into_diagnostic()?;
    axum::serve(listener, router).await.into_diagnostic()?;
    Ok(())
}

/// Resolve the logged-in administrator. Anonymous requests are sent to the
/// login page (returning to `uri` afterwards); other roles get a 403 page.
pub(crate) async fn require_admin(
    state: &AppState,
    headers: &HeaderMap,
    uri: &Uri,
) -> Result<user::Model, Response> {
    let to_login = || {
        Redirect::to(&format!(
            "/account/login?return_to={}",
            views::urlencoded(uri.path())
        ))
        .into_response()
    };

    let Some(cookie) = SessionCookie::from_headers(headers) else {
        return Err(to_login());
    };
    let session = match storage::get_session(&state.db, &cookie.session_id).await {
        Ok(Some(s)) => s,
        Ok(None) => return Err(to_login()),
        Err(e) => return Err(views::error_page(e)),
    };
    let user = match storage::get_user(&state.db, session.user_id).await {
        Ok(Some(u)) => u,
        Ok(None) => return Err(to_login()),
        Err(e) => return Err(views::error_page(e)),
    };

    if Role::parse(&user.role) != Some(Role::Admin) {
        tracing::warn!(user_id = user.id, path = %uri.path(), "Non-admin denied");
        return Err(views::error_page(VetError::Forbidden));
    }
    Ok(user)
}

/// Form ids arrive as text; anything unparseable counts as "not selected".
pub(crate) fn parse_id(value: &str) -> i32 {
    value.trim().parse().unwrap_or(0)
}

pub(crate) fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub(crate) fn see_other(location: &str) -> Response {
    Redirect::to(location).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id(" 12 "), 12);
        assert_eq!(parse_id(""), 0);
        assert_eq!(parse_id("abc"), 0);
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty("  "), None);
        assert_eq!(non_empty(" x "), Some("x".to_string()));
    }
}
