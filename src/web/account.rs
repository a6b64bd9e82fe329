use super::{see_other, AppState};
use crate::session::SessionCookie;
use crate::storage;
use crate::views::{self, html_escape, urlencoded};
use axum::extract::{Form, Query, State};
use axum::http::{header, HeaderMap};
use axum::response::{Html, IntoResponse, Redirect, Response};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    return_to: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    username: String,
    password: String,
    return_to: Option<String>,
}

/// Only same-site paths are followed after login.
fn safe_return_to(value: Option<&str>) -> &str {
    match value {
        Some(v) if v.starts_with('/') && !v.starts_with("//") => v,
        _ => "/owners",
    }
}

pub async fn login_page(Query(q): Query<LoginQuery>) -> Html<String> {
    let error_html = q
        .error
        .as_deref()
        .map(|e| views::errors_list(&[e.to_string()]))
        .unwrap_or_default();
    let return_to = html_escape(safe_return_to(q.return_to.as_deref()));

    let body = format!(
        r#"{error_html}
        <form method="POST" action="/account/login">
            <input type="hidden" name="return_to" value="{return_to}">
            <label>Email<input type="email" name="username" required autofocus></label>
            <label>Password<input type="password" name="password" required></label>
            <button type="submit">Log in</button>
        </form>"#
    );
    views::page("Log in", &body)
}

pub async fn login_submit(State(state): State<AppState>, Form(form): Form<LoginForm>) -> Response {
    let return_to = safe_return_to(form.return_to.as_deref()).to_string();
    let back_to_login = |message: &str| {
        Redirect::to(&format!(
            "/account/login?error={}&return_to={}",
            urlencoded(message),
            urlencoded(&return_to)
        ))
        .into_response()
    };

    let user = match storage::verify_user_password(&state.db, &form.username, &form.password).await
    {
        Ok(Some(user)) => user,
        Ok(None) => {
            tracing::info!(username = %form.username, "Failed login");
            return back_to_login("Invalid username or password.");
        }
        Err(e) => return views::error_page(e),
    };

    let session =
        match storage::create_session(&state.db, user.id, state.settings.auth.session_ttl_secs)
            .await
        {
            Ok(s) => s,
            Err(e) => return views::error_page(e),
        };
    tracing::info!(user_id = user.id, "User logged in");

    let cookie = SessionCookie::new(session.session_id).to_cookie_header(&state.settings);
    ([(header::SET_COOKIE, cookie)], Redirect::to(&return_to)).into_response()
}

pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(cookie) = SessionCookie::from_headers(&headers) {
        if let Err(e) = storage::delete_session(&state.db, &cookie.session_id).await {
            tracing::warn!(error = %e, "Failed to delete session");
        }
    }

    (
        [(header::SET_COOKIE, SessionCookie::delete_cookie_header())],
        see_other("/account/login"),
    )
        .into_response()
}
