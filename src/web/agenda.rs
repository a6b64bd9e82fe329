use super::{non_empty, parse_id, require_admin, see_other, AppState};
use crate::agenda::{next_open_day, slot_instants};
use crate::combos;
use crate::converter::local_to_utc;
use crate::entities::agenda;
use crate::errors::VetError;
use crate::storage;
use crate::views::{self, html_escape, opt_escape};
use axum::extract::{Form, Path, Query, State};
use axum::http::{HeaderMap, Uri};
use axum::response::{IntoResponse, Response};
use chrono::{Local, Utc};
use serde::Deserialize;

const MAX_DAYS: u32 = 31;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AddDaysForm {
    days: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AssignQuery {
    owner_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AssignForm {
    owner_id: String,
    pet_id: String,
    remarks: String,
}

fn parse_days(value: &str) -> Result<u32, String> {
    match value.trim().parse::<u32>() {
        Ok(days) if (1..=MAX_DAYS).contains(&days) => Ok(days),
        _ => Err(format!("The number of days must be between 1 and {MAX_DAYS}.")),
    }
}

async fn render_index(state: &AppState, errors: &[String]) -> Response {
    let today = Local::now().date_naive();
    let from = today
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| local_to_utc(&Local, midnight).ok())
        .unwrap_or_else(Utc::now);

    let entries = match storage::list_agenda(&state.db, from).await {
        Ok(e) => e,
        Err(e) => return views::error_page(e),
    };

    let rows: String = entries
        .iter()
        .map(|entry| {
            let id = entry.agenda.id;
            let (status, action) = if entry.agenda.is_available {
                (
                    "Available".to_string(),
                    format!(r#"<a href="/agenda/assign/{id}">Assign</a>"#),
                )
            } else {
                (
                    format!(
                        "{} / {}",
                        entry
                            .owner
                            .as_ref()
                            .map(|u| html_escape(&u.full_name()))
                            .unwrap_or_default(),
                        entry
                            .pet
                            .as_ref()
                            .map(|p| html_escape(&p.name))
                            .unwrap_or_default(),
                    ),
                    views::post_button(&format!("/agenda/unassign/{id}"), "Unassign", "danger"),
                )
            };
            format!(
                r#"<tr><td>{date}</td><td>{status}</td><td>{remarks}</td><td>{action}</td></tr>"#,
                date = entry.agenda.date_local().format("%a %Y/%m/%d %H:%M"),
                remarks = opt_escape(entry.agenda.remarks.as_deref()),
            )
        })
        .collect();

    let body = format!(
        r#"{errors}
        <form method="POST" action="/agenda/add-days">
            {days}
            <button type="submit">Add days</button>
        </form>
        <table>
            <tr><th>Date</th><th>Owner / Pet</th><th>Remarks</th><th></th></tr>
            {rows}
        </table>"#,
        errors = views::errors_list(errors),
        days = views::input("number", "Days", "days", "7"),
    );
    views::page("Agenda", &body).into_response()
}

async fn render_assign(
    state: &AppState,
    slot: &agenda::Model,
    owner_id: i32,
    pet_id: i32,
    remarks: Option<&str>,
    errors: &[String],
) -> Response {
    let owners = match combos::owners_combo(&state.db).await {
        Ok(c) => c,
        Err(e) => return views::error_page(e),
    };
    let pets = if owner_id > 0 {
        match combos::pets_combo(&state.db, owner_id).await {
            Ok(c) => c,
            Err(e) => return views::error_page(e),
        }
    } else {
        combos::build_combo(combos::PET_PLACEHOLDER, Vec::new())
    };
    let id = slot.id;

    let body = format!(
        r#"{errors}
        <p>{date}</p>
        <form method="GET" action="/agenda/assign/{id}">
            {owner_select}
            <button type="submit">Load pets</button>
        </form>
        <form method="POST" action="/agenda/assign/{id}">
            <input type="hidden" name="owner_id" value="{owner_id}">
            {pet_select}
            {remarks}
            <button type="submit">Assign</button>
        </form>
        <p><a href="/agenda">Back to agenda</a></p>"#,
        errors = views::errors_list(errors),
        date = slot.date_local().format("%A %Y/%m/%d %H:%M"),
        owner_select = views::combo_select("Owner", "owner_id", &owners, owner_id),
        pet_select = views::combo_select("Pet", "pet_id", &pets, pet_id),
        remarks = views::textarea("Remarks", "remarks", remarks),
    );
    views::page("Assign appointment", &body).into_response()
}

pub async fn index(State(state): State<AppState>, headers: HeaderMap, uri: Uri) -> Response {
    if let Err(denied) = require_admin(&state, &headers, &uri).await {
        return denied;
    }
    render_index(&state, &[]).await
}

/// Generate slots for the next `days` calendar days after the latest
/// existing slot (or from today).
pub async fn add_days(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    Form(form): Form<AddDaysForm>,
) -> Response {
    if let Err(denied) = require_admin(&state, &headers, &uri).await {
        return denied;
    }

    let days = match parse_days(&form.days) {
        Ok(d) => d,
        Err(msg) => return render_index(&state, &[msg]).await,
    };

    let latest = match storage::latest_agenda_date(&state.db).await {
        Ok(l) => l,
        Err(e) => return views::error_page(e),
    };
    let first_day = next_open_day(&Local, Local::now().date_naive(), latest);
    let slots = slot_instants(&Local, first_day, days, &state.settings.agenda);

    match storage::add_agenda_slots(&state.db, &slots).await {
        Ok(_) => see_other("/agenda"),
        Err(e) => views::error_page(e),
    }
}

pub async fn assign_page(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    Path(id): Path<i32>,
    Query(q): Query<AssignQuery>,
) -> Response {
    if let Err(denied) = require_admin(&state, &headers, &uri).await {
        return denied;
    }

    let slot = match storage::get_agenda(&state.db, id).await {
        Ok(Some(s)) => s,
        Ok(None) => return views::not_found_page(),
        Err(e) => return views::error_page(e),
    };
    if !slot.is_available {
        return see_other("/agenda");
    }

    render_assign(&state, &slot, parse_id(&q.owner_id), 0, None, &[]).await
}

pub async fn assign_submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    Path(id): Path<i32>,
    Form(form): Form<AssignForm>,
) -> Response {
    if let Err(denied) = require_admin(&state, &headers, &uri).await {
        return denied;
    }

    let slot = match storage::get_agenda(&state.db, id).await {
        Ok(Some(s)) => s,
        Ok(None) => return views::not_found_page(),
        Err(e) => return views::error_page(e),
    };
    let owner_id = parse_id(&form.owner_id);
    let pet_id = parse_id(&form.pet_id);
    let remarks = non_empty(&form.remarks);

    let mut errors = Vec::new();
    if owner_id <= 0 {
        errors.push("You must select an owner.".to_string());
    }
    if pet_id <= 0 {
        errors.push("You must select a pet.".to_string());
    }
    if !errors.is_empty() {
        return render_assign(&state, &slot, owner_id, pet_id, remarks.as_deref(), &errors).await;
    }

    match storage::assign_agenda(&state.db, id, owner_id, pet_id, remarks.clone()).await {
        Ok(_) => see_other("/agenda"),
        Err(VetError::Validation(msg)) => {
            render_assign(&state, &slot, owner_id, pet_id, remarks.as_deref(), &[msg]).await
        }
        Err(e) => views::error_page(e),
    }
}

pub async fn unassign(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    Path(id): Path<i32>,
) -> Response {
    if let Err(denied) = require_admin(&state, &headers, &uri).await {
        return denied;
    }

    match storage::unassign_agenda(&state.db, id).await {
        Ok(_) => see_other("/agenda"),
        Err(e) => views::error_page(e),
    }
}
