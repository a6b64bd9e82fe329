//! HTML fragments shared by the server-rendered pages.

use crate::combos::ComboItem;
use crate::errors::VetError;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};

const STYLE: &str = r#"
    body { font-family: Arial, sans-serif; max-width: 960px; margin: 30px auto; padding: 0 20px; color: #333; }
    nav a { margin-right: 15px; }
    nav { border-bottom: 1px solid #ccc; padding-bottom: 10px; margin-bottom: 20px; }
    table { border-collapse: collapse; width: 100%; margin-top: 10px; }
    th, td { border-bottom: 1px solid #ddd; padding: 6px 8px; text-align: left; vertical-align: top; }
    label { display: block; margin-top: 10px; }
    input[type="text"], input[type="email"], input[type="password"], input[type="date"],
    input[type="datetime-local"], select, textarea { width: 100%; padding: 6px; margin-top: 4px; box-sizing: border-box; }
    button { margin-top: 15px; padding: 8px 16px; background-color: #007bff; color: white; border: none; cursor: pointer; }
    button.danger { background-color: #dc3545; }
    .errors { color: #b00020; }
    .inline { display: inline; }
    img.pet { max-width: 120px; }
"#;

pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

pub fn opt_escape(value: Option<&str>) -> String {
    value.map(html_escape).unwrap_or_default()
}

pub fn urlencoded(s: &str) -> String {
    serde_urlencoded::to_string([("", s)])
        .unwrap_or_default()
        .trim_start_matches('=')
        .to_string()
}

/// Wrap `body` in the site layout.
pub fn page(title: &str, body: &str) -> Html<String> {
    Html(format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>{title} - MyVet</title>
    <style>{STYLE}</style>
</head>
<body>
    <nav>
        <a href="/owners">Owners</a>
        <a href="/pet-types">Pet types</a>
        <a href="/service-types">Service types</a>
        <a href="/agenda">Agenda</a>
        <a href="/account/logout">Log out</a>
    </nav>
    <h1>{title}</h1>
    {body}
</body>
</html>"#,
        title = html_escape(title),
    ))
}

pub fn errors_list(errors: &[String]) -> String {
    if errors.is_empty() {
        return String::new();
    }
    let items: String = errors
        .iter()
        .map(|e| format!("<li>{}</li>", html_escape(e)))
        .collect();
    format!(r#"<ul class="errors">{items}</ul>"#)
}

pub fn text_input(label: &str, name: &str, value: &str) -> String {
    input("text", label, name, value)
}

pub fn input(kind: &str, label: &str, name: &str, value: &str) -> String {
    format!(
        r#"<label>{label}<input type="{kind}" name="{name}" value="{value}"></label>"#,
        label = html_escape(label),
        value = html_escape(value),
    )
}

pub fn textarea(label: &str, name: &str, value: Option<&str>) -> String {
    format!(
        r#"<label>{label}<textarea name="{name}" rows="3">{value}</textarea></label>"#,
        label = html_escape(label),
        value = opt_escape(value),
    )
}

/// `<select>` over a combo list, marking `selected` (an id) as chosen.
pub fn combo_select(label: &str, name: &str, items: &[ComboItem], selected: i32) -> String {
    let selected = selected.to_string();
    let options: String = items
        .iter()
        .map(|item| {
            format!(
                r#"<option value="{value}"{sel}>{text}</option>"#,
                value = html_escape(&item.value),
                sel = if item.value == selected { " selected" } else { "" },
                text = html_escape(&item.text),
            )
        })
        .collect();
    format!(
        r#"<label>{label}<select name="{name}">{options}</select></label>"#,
        label = html_escape(label),
    )
}

/// A one-button form posting to `action`.
pub fn post_button(action: &str, caption: &str, class: &str) -> String {
    format!(
        r#"<form class="inline" method="POST" action="{action}"><button type="submit" class="{class}">{caption}</button></form>"#,
        action = html_escape(action),
        caption = html_escape(caption),
    )
}

pub fn status_page(status: StatusCode, title: &str, message: &str) -> Response {
    let body = format!("<p>{}</p>", html_escape(message));
    (status, page(title, &body)).into_response()
}

pub fn not_found_page() -> Response {
    status_page(
        StatusCode::NOT_FOUND,
        "Not found",
        "The record you are looking for does not exist.",
    )
}

/// HTML counterpart of `VetError::into_response`.
pub fn error_page(err: VetError) -> Response {
    match err {
        VetError::NotFound(_) => not_found_page(),
        VetError::Forbidden => status_page(
            StatusCode::FORBIDDEN,
            "Access denied",
            "You are not allowed to see this page.",
        ),
        VetError::Validation(msg) => status_page(StatusCode::BAD_REQUEST, "Invalid request", &msg),
        other => {
            tracing::error!(error = %other, "request failed");
            status_page(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error",
                "An unexpected error occurred.",
            )
        }
    }
}
