//! Pet type and service type maintenance. Both catalogs are a list of
//! unique names and share the same pages; `Catalog` selects the table.

use super::{require_admin, see_other, AppState};
use crate::errors::VetError;
use crate::storage;
use crate::views::{self, html_escape};
use axum::extract::{Form, OriginalUri, Path, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use sea_orm::DatabaseConnection;
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Catalog {
    PetTypes,
    ServiceTypes,
}

impl Catalog {
    fn path(self) -> &'static str {
        match self {
            Catalog::PetTypes => "/pet-types",
            Catalog::ServiceTypes => "/service-types",
        }
    }

    fn title(self) -> &'static str {
        match self {
            Catalog::PetTypes => "Pet types",
            Catalog::ServiceTypes => "Service types",
        }
    }

    fn singular(self) -> &'static str {
        match self {
            Catalog::PetTypes => "pet type",
            Catalog::ServiceTypes => "service type",
        }
    }

    async fn list(self, db: &DatabaseConnection) -> Result<Vec<(i32, String)>, VetError> {
        Ok(match self {
            Catalog::PetTypes => storage::list_pet_types(db)
                .await?
                .into_iter()
                .map(|m| (m.id, m.name))
                .collect(),
            Catalog::ServiceTypes => storage::list_service_types(db)
                .await?
                .into_iter()
                .map(|m| (m.id, m.name))
                .collect(),
        })
    }

    async fn name_of(self, db: &DatabaseConnection, id: i32) -> Result<Option<String>, VetError> {
        Ok(match self {
            Catalog::PetTypes => storage::get_pet_type(db, id).await?.map(|m| m.name),
            Catalog::ServiceTypes => storage::get_service_type(db, id).await?.map(|m| m.name),
        })
    }

    async fn create(self, db: &DatabaseConnection, name: &str) -> Result<(), VetError> {
        match self {
            Catalog::PetTypes => storage::create_pet_type(db, name).await.map(|_| ()),
            Catalog::ServiceTypes => storage::create_service_type(db, name).await.map(|_| ()),
        }
    }

    async fn update(self, db: &DatabaseConnection, id: i32, name: &str) -> Result<(), VetError> {
        match self {
            Catalog::PetTypes => storage::update_pet_type(db, id, name).await.map(|_| ()),
            Catalog::ServiceTypes => storage::update_service_type(db, id, name).await.map(|_| ()),
        }
    }

    async fn delete(self, db: &DatabaseConnection, id: i32) -> Result<(), VetError> {
        match self {
            Catalog::PetTypes => storage::delete_pet_type(db, id).await,
            Catalog::ServiceTypes => storage::delete_service_type(db, id).await,
        }
    }
}

#[derive(Clone)]
pub struct CatalogState {
    app: AppState,
    kind: Catalog,
}

pub fn router(app: AppState, kind: Catalog) -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/create", get(create_page).post(create_submit))
        .route("/edit/{id}", get(edit_page).post(edit_submit))
        .route("/delete/{id}", get(delete_page).post(delete_submit))
        .with_state(CatalogState { app, kind })
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct NameForm {
    name: String,
}

fn render_form(kind: Catalog, action: &str, name: &str, errors: &[String]) -> Response {
    let body = format!(
        r#"{errors}
        <form method="POST" action="{action}">
            {name}
            <button type="submit">Save</button>
        </form>
        <p><a href="{back}">Back to list</a></p>"#,
        errors = views::errors_list(errors),
        action = html_escape(action),
        name = views::text_input("Name", "name", name),
        back = kind.path(),
    );
    views::page(kind.title(), &body).into_response()
}

fn render_delete(kind: Catalog, id: i32, name: &str, errors: &[String]) -> Response {
    let body = format!(
        r#"{errors}
        <p>Are you sure you want to delete the {singular} <strong>{name}</strong>?</p>
        <form method="POST" action="{path}/delete/{id}">
            <button type="submit" class="danger">Delete</button>
        </form>
        <p><a href="{path}">Back to list</a></p>"#,
        errors = views::errors_list(errors),
        singular = kind.singular(),
        name = html_escape(name),
        path = kind.path(),
    );
    views::page(kind.title(), &body).into_response()
}

pub async fn index(
    State(st): State<CatalogState>,
    headers: HeaderMap,
    OriginalUri(uri): OriginalUri,
) -> Response {
    if let Err(denied) = require_admin(&st.app, &headers, &uri).await {
        return denied;
    }

    let items = match st.kind.list(&st.app.db).await {
        Ok(items) => items,
        Err(e) => return views::error_page(e),
    };
    let path = st.kind.path();
    let rows: String = items
        .iter()
        .map(|(id, name)| {
            format!(
                r#"<tr><td>{name}</td><td><a href="{path}/edit/{id}">Edit</a> <a href="{path}/delete/{id}">Delete</a></td></tr>"#,
                name = html_escape(name),
            )
        })
        .collect();

    let body = format!(
        r#"<p><a href="{path}/create">Create new</a></p>
        <table>
            <tr><th>Name</th><th></th></tr>
            {rows}
        </table>"#
    );
    views::page(st.kind.title(), &body).into_response()
}

pub async fn create_page(
    State(st): State<CatalogState>,
    headers: HeaderMap,
    OriginalUri(uri): OriginalUri,
) -> Response {
    if let Err(denied) = require_admin(&st.app, &headers, &uri).await {
        return denied;
    }
    render_form(st.kind, &format!("{}/create", st.kind.path()), "", &[])
}

pub async fn create_submit(
    State(st): State<CatalogState>,
    headers: HeaderMap,
    OriginalUri(uri): OriginalUri,
    Form(form): Form<NameForm>,
) -> Response {
    if let Err(denied) = require_admin(&st.app, &headers, &uri).await {
        return denied;
    }

    let action = format!("{}/create", st.kind.path());
    match st.kind.create(&st.app.db, &form.name).await {
        Ok(()) => see_other(st.kind.path()),
        Err(VetError::Validation(msg)) => render_form(st.kind, &action, &form.name, &[msg]),
        Err(e) => {
            tracing::error!(error = %e, catalog = st.kind.singular(), "Failed to create entry");
            render_form(st.kind, &action, &form.name, &[e.to_string()])
        }
    }
}

pub async fn edit_page(
    State(st): State<CatalogState>,
    headers: HeaderMap,
    OriginalUri(uri): OriginalUri,
    Path(id): Path<i32>,
) -> Response {
    if let Err(denied) = require_admin(&st.app, &headers, &uri).await {
        return denied;
    }

    match st.kind.name_of(&st.app.db, id).await {
        Ok(Some(name)) => render_form(
            st.kind,
            &format!("{}/edit/{id}", st.kind.path()),
            &name,
            &[],
        ),
        Ok(None) => views::not_found_page(),
        Err(e) => views::error_page(e),
    }
}

pub async fn edit_submit(
    State(st): State<CatalogState>,
    headers: HeaderMap,
    OriginalUri(uri): OriginalUri,
    Path(id): Path<i32>,
    Form(form): Form<NameForm>,
) -> Response {
    if let Err(denied) = require_admin(&st.app, &headers, &uri).await {
        return denied;
    }

    let action = format!("{}/edit/{id}", st.kind.path());
    match st.kind.update(&st.app.db, id, &form.name).await {
        Ok(()) => see_other(st.kind.path()),
        Err(VetError::Validation(msg)) => render_form(st.kind, &action, &form.name, &[msg]),
        Err(e) => views::error_page(e),
    }
}

pub async fn delete_page(
    State(st): State<CatalogState>,
    headers: HeaderMap,
    OriginalUri(uri): OriginalUri,
    Path(id): Path<i32>,
) -> Response {
    if let Err(denied) = require_admin(&st.app, &headers, &uri).await {
        return denied;
    }

    match st.kind.name_of(&st.app.db, id).await {
        Ok(Some(name)) => render_delete(st.kind, id, &name, &[]),
        Ok(None) => views::not_found_page(),
        Err(e) => views::error_page(e),
    }
}

pub async fn delete_submit(
    State(st): State<CatalogState>,
    headers: HeaderMap,
    OriginalUri(uri): OriginalUri,
    Path(id): Path<i32>,
) -> Response {
    if let Err(denied) = require_admin(&st.app, &headers, &uri).await {
        return denied;
    }

    match st.kind.delete(&st.app.db, id).await {
        Ok(()) => see_other(st.kind.path()),
        Err(VetError::Validation(msg)) => match st.kind.name_of(&st.app.db, id).await {
            Ok(Some(name)) => render_delete(st.kind, id, &name, &[msg]),
            Ok(None) => views::not_found_page(),
            Err(e) => views::error_page(e),
        },
        Err(e) => views::error_page(e),
    }
}
