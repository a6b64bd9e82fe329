//! Pet pages under an owner, and the visit histories under a pet.

use super::{non_empty, parse_id, require_admin, see_other, AppState};
use crate::combos;
use crate::converter::{self, HistoryViewModel, PetViewModel};
use crate::entities;
use crate::errors::VetError;
use crate::storage::{self, PetDetails};
use crate::views::{self, html_escape, opt_escape};
use axum::extract::{Form, Multipart, Path, State};
use axum::http::{HeaderMap, Uri};
use axum::response::{IntoResponse, Response};
use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use std::collections::HashMap;

const BORN_FORMAT: &str = "%Y-%m-%d";
const DATETIME_LOCAL_FORMAT: &str = "%Y-%m-%dT%H:%M";

/// Text fields plus the optional picture of a submitted pet form.
#[derive(Debug, Default)]
struct PetUpload {
    fields: HashMap<String, String>,
    image: Option<(Option<String>, Vec<u8>)>,
}

impl PetUpload {
    async fn read(mut multipart: Multipart) -> Result<Self, VetError> {
        let mut upload = PetUpload::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| VetError::Validation(format!("Invalid form data: {e}")))?
        {
            let name = field.name().unwrap_or_default().to_string();
            if name == "image" {
                let file_name = field.file_name().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| VetError::Validation(format!("Invalid upload: {e}")))?;
                if !bytes.is_empty() {
                    upload.image = Some((file_name, bytes.to_vec()));
                }
            } else {
                let text = field
                    .text()
                    .await
                    .map_err(|e| VetError::Validation(format!("Invalid form data: {e}")))?;
                upload.fields.insert(name, text);
            }
        }
        Ok(upload)
    }

    fn field(&self, name: &str) -> &str {
        self.fields.get(name).map(String::as_str).unwrap_or_default()
    }

    /// Fill `model` from the submitted fields. Unparseable values keep the
    /// model's value and add a message.
    fn apply(&self, model: &mut PetViewModel) -> Vec<String> {
        let mut errors = Vec::new();
        model.name = self.field("name").trim().to_string();
        model.race = self.field("race").trim().to_string();
        model.remarks = non_empty(self.field("remarks"));
        model.pet_type_id = parse_id(self.field("pet_type_id"));
        match NaiveDate::parse_from_str(self.field("born").trim(), BORN_FORMAT) {
            Ok(born) => model.born = born,
            Err(_) => errors.push("The field Born is mandatory.".to_string()),
        }
        errors
    }
}

fn render_pet_form(title: &str, action: &str, model: &PetViewModel, errors: &[String]) -> Response {
    let current_image = model
        .image_url
        .as_deref()
        .map(|url| format!(r#"<p><img class="pet" src="{}" alt=""></p>"#, html_escape(url)))
        .unwrap_or_default();

    let body = format!(
        r#"{errors}
        <form method="POST" action="{action}" enctype="multipart/form-data">
            {name}
            {race}
            {born}
            {pet_type}
            {remarks}
            {current_image}
            <label>Image<input type="file" name="image" accept="image/*"></label>
            <button type="submit">Save</button>
        </form>
        <p><a href="/owners/details/{owner_id}">Back to owner</a></p>"#,
        errors = views::errors_list(errors),
        action = html_escape(action),
        name = views::text_input("Name", "name", &model.name),
        race = views::text_input("Race", "race", &model.race),
        born = views::input("date", "Born", "born", &model.born.format(BORN_FORMAT).to_string()),
        pet_type = views::combo_select("Pet Type", "pet_type_id", &model.pet_types, model.pet_type_id),
        remarks = views::textarea("Remarks", "remarks", model.remarks.as_deref()),
        owner_id = model.owner_id,
    );
    views::page(title, &body).into_response()
}

fn render_pet_details(details: &PetDetails, errors: &[String]) -> Response {
    let pet = &details.pet;
    let pet_id = pet.id;
    let owner_id = details.owner.id;

    let histories: String = details
        .histories
        .iter()
        .map(|h| {
            let history_id = h.history.id;
            format!(
                r#"<tr>
                    <td>{date}</td>
                    <td>{service}</td>
                    <td>{description}</td>
                    <td>{remarks}</td>
                    <td><a href="/owners/edit-history/{history_id}">Edit</a> {delete}</td>
                </tr>"#,
                date = h.history.date_local().format("%Y/%m/%d %H:%M"),
                service = html_escape(&h.service_type.name),
                description = html_escape(&h.history.description),
                remarks = opt_escape(h.history.remarks.as_deref()),
                delete = views::post_button(
                    &format!("/owners/delete-history/{history_id}"),
                    "Delete",
                    "danger"
                ),
            )
        })
        .collect();

    let image = pet
        .image_url
        .as_deref()
        .map(|url| format!(r#"<img class="pet" src="{}" alt="">"#, html_escape(url)))
        .unwrap_or_default();

    let body = format!(
        r#"{errors}
        {image}
        <dl>
            <dt>Owner</dt><dd><a href="/owners/details/{owner_id}">{owner}</a></dd>
            <dt>Name</dt><dd>{name}</dd>
            <dt>Race</dt><dd>{race}</dd>
            <dt>Pet type</dt><dd>{pet_type}</dd>
            <dt>Born</dt><dd>{born}</dd>
            <dt>Remarks</dt><dd>{remarks}</dd>
        </dl>
        <p><a href="/owners/edit-pet/{pet_id}">Edit</a> <a href="/owners/add-history/{pet_id}">Add history</a> {delete}</p>
        <h2>Histories</h2>
        <table>
            <tr><th>Date</th><th>Service</th><th>Description</th><th>Remarks</th><th></th></tr>
            {histories}
        </table>"#,
        errors = views::errors_list(errors),
        owner = html_escape(&details.user.full_name()),
        name = html_escape(&pet.name),
        race = html_escape(&pet.race),
        pet_type = html_escape(&details.pet_type.name),
        born = pet.born.format("%Y/%m/%d"),
        remarks = opt_escape(pet.remarks.as_deref()),
        delete = views::post_button(&format!("/owners/delete-pet/{pet_id}"), "Delete pet", "danger"),
    );
    views::page("Pet", &body).into_response()
}

pub async fn add_pet_page(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    Path(owner_id): Path<i32>,
) -> Response {
    if let Err(denied) = require_admin(&state, &headers, &uri).await {
        return denied;
    }

    match storage::get_owner(&state.db, owner_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return views::not_found_page(),
        Err(e) => return views::error_page(e),
    }
    let pet_types = match combos::pet_types_combo(&state.db).await {
        Ok(c) => c,
        Err(e) => return views::error_page(e),
    };

    let model = PetViewModel::blank(owner_id, pet_types);
    render_pet_form("Add pet", &format!("/owners/add-pet/{owner_id}"), &model, &[])
}

pub async fn add_pet_submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    Path(owner_id): Path<i32>,
    multipart: Multipart,
) -> Response {
    if let Err(denied) = require_admin(&state, &headers, &uri).await {
        return denied;
    }

    let upload = match PetUpload::read(multipart).await {
        Ok(u) => u,
        Err(e) => return views::error_page(e),
    };
    let pet_types = match combos::pet_types_combo(&state.db).await {
        Ok(c) => c,
        Err(e) => return views::error_page(e),
    };
    let action = format!("/owners/add-pet/{owner_id}");

    let mut model = PetViewModel::blank(owner_id, pet_types);
    let mut errors = upload.apply(&mut model);
    errors.extend(model.validate());
    if !errors.is_empty() {
        return render_pet_form("Add pet", &action, &model, &errors);
    }

    let image_url = match &upload.image {
        Some((file_name, bytes)) => {
            match state.images.save_pet_image(file_name.as_deref(), bytes).await {
                Ok(url) => Some(url),
                Err(VetError::Validation(msg)) => {
                    return render_pet_form("Add pet", &action, &model, &[msg])
                }
                Err(e) => return views::error_page(e),
            }
        }
        None => None,
    };

    let active = match converter::create_pet(&state.db, &model, image_url.clone()).await {
        Ok(a) => a,
        Err(e) => {
            discard_image(&state, image_url.as_deref()).await;
            return views::error_page(e);
        }
    };
    match storage::insert_pet(&state.db, active).await {
        Ok(_) => see_other(&format!("/owners/details/{owner_id}")),
        Err(e) => {
            tracing::error!(error = %e, owner_id, "Failed to create pet");
            discard_image(&state, image_url.as_deref()).await;
            render_pet_form("Add pet", &action, &model, &[e.to_string()])
        }
    }
}

async fn discard_image(state: &AppState, image_url: Option<&str>) {
    if let Some(url) = image_url {
        state.images.remove_pet_image(url).await;
    }
}

pub async fn edit_pet_page(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    Path(id): Path<i32>,
) -> Response {
    if let Err(denied) = require_admin(&state, &headers, &uri).await {
        return denied;
    }

    let pet = match storage::get_pet(&state.db, id).await {
        Ok(Some(p)) => p,
        Ok(None) => return views::not_found_page(),
        Err(e) => return views::error_page(e),
    };
    let pet_types = match combos::pet_types_combo(&state.db).await {
        Ok(c) => c,
        Err(e) => return views::error_page(e),
    };

    let model = converter::to_pet_view_model(&pet, pet_types);
    render_pet_form("Edit pet", &format!("/owners/edit-pet/{id}"), &model, &[])
}

pub async fn edit_pet_submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    Path(id): Path<i32>,
    multipart: Multipart,
) -> Response {
    if let Err(denied) = require_admin(&state, &headers, &uri).await {
        return denied;
    }

    let upload = match PetUpload::read(multipart).await {
        Ok(u) => u,
        Err(e) => return views::error_page(e),
    };
    // Owner and current picture come from the stored pet, not the form.
    let stored = match storage::get_pet(&state.db, id).await {
        Ok(Some(p)) => p,
        Ok(None) => return views::not_found_page(),
        Err(e) => return views::error_page(e),
    };
    let pet_types = match combos::pet_types_combo(&state.db).await {
        Ok(c) => c,
        Err(e) => return views::error_page(e),
    };
    let action = format!("/owners/edit-pet/{id}");

    let mut model = converter::to_pet_view_model(&stored, pet_types);
    let mut errors = upload.apply(&mut model);
    errors.extend(model.validate());
    if !errors.is_empty() {
        return render_pet_form("Edit pet", &action, &model, &errors);
    }

    let new_image = match &upload.image {
        Some((file_name, bytes)) => {
            match state.images.save_pet_image(file_name.as_deref(), bytes).await {
                Ok(url) => Some(url),
                Err(VetError::Validation(msg)) => {
                    return render_pet_form("Edit pet", &action, &model, &[msg])
                }
                Err(e) => return views::error_page(e),
            }
        }
        None => None,
    };
    let image_url = new_image.clone().or_else(|| stored.image_url.clone());

    let active = match converter::update_pet(&state.db, id, &model, image_url).await {
        Ok(a) => a,
        Err(e) => {
            discard_image(&state, new_image.as_deref()).await;
            return views::error_page(e);
        }
    };
    match storage::update_pet(&state.db, id, active).await {
        Ok(pet) => {
            if new_image.is_some() {
                discard_image(&state, stored.image_url.as_deref()).await;
            }
            see_other(&format!("/owners/details/{}", pet.owner_id))
        }
        Err(e) => {
            discard_image(&state, new_image.as_deref()).await;
            views::error_page(e)
        }
    }
}

pub async fn details_pet(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    Path(id): Path<i32>,
) -> Response {
    if let Err(denied) = require_admin(&state, &headers, &uri).await {
        return denied;
    }

    match storage::get_pet_details(&state.db, id).await {
        Ok(Some(details)) => render_pet_details(&details, &[]),
        Ok(None) => views::not_found_page(),
        Err(e) => views::error_page(e),
    }
}

pub async fn delete_pet(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    Path(id): Path<i32>,
) -> Response {
    if let Err(denied) = require_admin(&state, &headers, &uri).await {
        return denied;
    }

    match storage::delete_pet(&state.db, id).await {
        Ok(pet) => {
            discard_image(&state, pet.image_url.as_deref()).await;
            see_other(&format!("/owners/details/{}", pet.owner_id))
        }
        Err(VetError::Validation(msg)) => match storage::get_pet_details(&state.db, id).await {
            Ok(Some(details)) => render_pet_details(&details, &[msg]),
            Ok(None) => views::not_found_page(),
            Err(e) => views::error_page(e),
        },
        Err(e) => views::error_page(e),
    }
}

// Histories

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct HistoryForm {
    service_type_id: String,
    description: String,
    date: String,
    remarks: String,
}

impl HistoryForm {
    fn apply(&self, model: &mut HistoryViewModel) -> Vec<String> {
        let mut errors = Vec::new();
        model.description = self.description.trim().to_string();
        model.remarks = non_empty(&self.remarks);
        model.service_type_id = parse_id(&self.service_type_id);
        match NaiveDateTime::parse_from_str(self.date.trim(), DATETIME_LOCAL_FORMAT) {
            Ok(date) => model.date = date,
            Err(_) => errors.push("The field Date is mandatory.".to_string()),
        }
        errors
    }
}

fn render_history_form(
    title: &str,
    action: &str,
    model: &HistoryViewModel,
    errors: &[String],
) -> Response {
    let body = format!(
        r#"{errors}
        <form method="POST" action="{action}">
            {service}
            {description}
            {date}
            {remarks}
            <button type="submit">Save</button>
        </form>
        <p><a href="/owners/details-pet/{pet_id}">Back to pet</a></p>"#,
        errors = views::errors_list(errors),
        action = html_escape(action),
        service = views::combo_select(
            "Service Type",
            "service_type_id",
            &model.service_types,
            model.service_type_id
        ),
        description = views::text_input("Description", "description", &model.description),
        date = views::input(
            "datetime-local",
            "Date",
            "date",
            &model.date.format(DATETIME_LOCAL_FORMAT).to_string()
        ),
        remarks = views::textarea("Remarks", "remarks", model.remarks.as_deref()),
        pet_id = model.pet_id,
    );
    views::page(title, &body).into_response()
}

pub async fn add_history_page(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    Path(pet_id): Path<i32>,
) -> Response {
    if let Err(denied) = require_admin(&state, &headers, &uri).await {
        return denied;
    }

    match storage::get_pet(&state.db, pet_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return views::not_found_page(),
        Err(e) => return views::error_page(e),
    }
    let service_types = match combos::service_types_combo(&state.db).await {
        Ok(c) => c,
        Err(e) => return views::error_page(e),
    };

    let model = HistoryViewModel::blank(pet_id, service_types);
    render_history_form(
        "Add history",
        &format!("/owners/add-history/{pet_id}"),
        &model,
        &[],
    )
}

pub async fn add_history_submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    Path(pet_id): Path<i32>,
    Form(form): Form<HistoryForm>,
) -> Response {
    if let Err(denied) = require_admin(&state, &headers, &uri).await {
        return denied;
    }

    let service_types = match combos::service_types_combo(&state.db).await {
        Ok(c) => c,
        Err(e) => return views::error_page(e),
    };
    let action = format!("/owners/add-history/{pet_id}");

    let mut model = HistoryViewModel::blank(pet_id, service_types);
    let mut errors = form.apply(&mut model);
    errors.extend(model.validate());
    if !errors.is_empty() {
        return render_history_form("Add history", &action, &model, &errors);
    }

    let active = match converter::create_history(&state.db, &model).await {
        Ok(a) => a,
        Err(VetError::Validation(msg)) => {
            return render_history_form("Add history", &action, &model, &[msg])
        }
        Err(e) => return views::error_page(e),
    };
    match storage::insert_history(&state.db, active).await {
        Ok(_) => see_other(&format!("/owners/details-pet/{pet_id}")),
        Err(e) => {
            tracing::error!(error = %e, pet_id, "Failed to create history");
            render_history_form("Add history", &action, &model, &[e.to_string()])
        }
    }
}

pub async fn edit_history_page(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    Path(id): Path<i32>,
) -> Response {
    if let Err(denied) = require_admin(&state, &headers, &uri).await {
        return denied;
    }

    let history = match storage::get_history(&state.db, id).await {
        Ok(Some(h)) => h,
        Ok(None) => return views::not_found_page(),
        Err(e) => return views::error_page(e),
    };
    let service_types = match combos::service_types_combo(&state.db).await {
        Ok(c) => c,
        Err(e) => return views::error_page(e),
    };

    let model = converter::to_history_view_model(&history, service_types);
    render_history_form(
        "Edit history",
        &format!("/owners/edit-history/{id}"),
        &model,
        &[],
    )
}

pub async fn edit_history_submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    Path(id): Path<i32>,
    Form(form): Form<HistoryForm>,
) -> Response {
    if let Err(denied) = require_admin(&state, &headers, &uri).await {
        return denied;
    }

    let stored: entities::history::Model = match storage::get_history(&state.db, id).await {
        Ok(Some(h)) => h,
        Ok(None) => return views::not_found_page(),
        Err(e) => return views::error_page(e),
    };
    let service_types = match combos::service_types_combo(&state.db).await {
        Ok(c) => c,
        Err(e) => return views::error_page(e),
    };
    let action = format!("/owners/edit-history/{id}");

    let mut model = converter::to_history_view_model(&stored, service_types);
    let mut errors = form.apply(&mut model);
    errors.extend(model.validate());
    if !errors.is_empty() {
        return render_history_form("Edit history", &action, &model, &errors);
    }

    let active = match converter::update_history(&state.db, id, &model).await {
        Ok(a) => a,
        Err(VetError::Validation(msg)) => {
            return render_history_form("Edit history", &action, &model, &[msg])
        }
        Err(e) => return views::error_page(e),
    };
    match storage::update_history(&state.db, id, active).await {
        Ok(history) => see_other(&format!("/owners/details-pet/{}", history.pet_id)),
        Err(e) => views::error_page(e),
    }
}

pub async fn delete_history(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    Path(id): Path<i32>,
) -> Response {
    if let Err(denied) = require_admin(&state, &headers, &uri).await {
        return denied;
    }

    match storage::delete_history(&state.db, id).await {
        Ok(pet_id) => see_other(&format!("/owners/details-pet/{pet_id}")),
        Err(e) => views::error_page(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(pairs: &[(&str, &str)]) -> PetUpload {
        PetUpload {
            fields: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            image: None,
        }
    }

    #[test]
    fn test_pet_upload_fills_model() {
        let mut model = PetViewModel::blank(4, Vec::new());
        let errors = upload(&[
            ("name", " Rex "),
            ("race", "Beagle"),
            ("born", "2021-06-30"),
            ("pet_type_id", "2"),
            ("remarks", ""),
        ])
        .apply(&mut model);

        assert!(errors.is_empty());
        assert_eq!(model.name, "Rex");
        assert_eq!(model.pet_type_id, 2);
        assert_eq!(model.born, NaiveDate::from_ymd_opt(2021, 6, 30).unwrap());
        assert_eq!(model.remarks, None);
        assert_eq!(model.owner_id, 4);
    }

    #[test]
    fn test_pet_upload_bad_values() {
        let mut model = PetViewModel::blank(4, Vec::new());
        let errors = upload(&[("born", "yesterday"), ("pet_type_id", "x")]).apply(&mut model);

        assert_eq!(errors, vec!["The field Born is mandatory.".to_string()]);
        assert_eq!(model.pet_type_id, 0);
        assert_eq!(model.validate().len(), 3);
    }

    #[test]
    fn test_history_form_parses_local_datetime() {
        let form = HistoryForm {
            service_type_id: "5".to_string(),
            description: "Checkup".to_string(),
            date: "2024-03-10T09:30".to_string(),
            remarks: "Healthy".to_string(),
        };
        let mut model = HistoryViewModel::blank(1, Vec::new());

        assert!(form.apply(&mut model).is_empty());
        assert_eq!(
            model.date,
            NaiveDate::from_ymd_opt(2024, 3, 10)
                .unwrap()
                .and_hms_opt(9, 30, 0)
                .unwrap()
        );
        assert_eq!(model.remarks.as_deref(), Some("Healthy"));
        assert!(model.validate().is_empty());
    }
}
