use super::{non_empty, require_admin, see_other, AppState};
use crate::converter::{check_required, NAME_MAX_LEN};
use crate::entities::user;
use crate::errors::VetError;
use crate::storage::{self, NewUser, OwnerDetails, UserProfile};
use crate::views::{self, html_escape, opt_escape};
use axum::extract::{Form, Path, State};
use axum::http::{HeaderMap, Uri};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

const EMAIL_MAX_LEN: usize = 100;
const DOCUMENT_MAX_LEN: usize = 20;
const ADDRESS_MAX_LEN: usize = 100;
const PHONE_MAX_LEN: usize = 20;
const PASSWORD_MIN_LEN: usize = 6;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct OwnerForm {
    username: String,
    password: String,
    password_confirm: String,
    first_name: String,
    last_name: String,
    document: String,
    address: String,
    phone_number: String,
}

impl OwnerForm {
    fn from_user(user: &user::Model) -> Self {
        Self {
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            document: user.document.clone().unwrap_or_default(),
            address: user.address.clone().unwrap_or_default(),
            phone_number: user.phone_number.clone().unwrap_or_default(),
            ..Default::default()
        }
    }

    fn validate_profile(&self, errors: &mut Vec<String>) {
        check_required("First Name", &self.first_name, NAME_MAX_LEN, errors);
        check_required("Last Name", &self.last_name, NAME_MAX_LEN, errors);
        check_optional("Document", &self.document, DOCUMENT_MAX_LEN, errors);
        check_optional("Address", &self.address, ADDRESS_MAX_LEN, errors);
        check_optional("Phone Number", &self.phone_number, PHONE_MAX_LEN, errors);
    }

    fn validate_new(&self) -> Vec<String> {
        let mut errors = Vec::new();
        check_required("Email", &self.username, EMAIL_MAX_LEN, &mut errors);
        if !self.username.trim().is_empty() && !self.username.contains('@') {
            errors.push("The Email field is not a valid e-mail address.".to_string());
        }
        if self.password.chars().count() < PASSWORD_MIN_LEN {
            errors.push(format!(
                "The Password must be at least {PASSWORD_MIN_LEN} characters long."
            ));
        }
        if self.password != self.password_confirm {
            errors.push("The password and confirmation password do not match.".to_string());
        }
        self.validate_profile(&mut errors);
        errors
    }

    fn profile(&self) -> UserProfile {
        UserProfile {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            document: non_empty(&self.document),
            address: non_empty(&self.address),
            phone_number: non_empty(&self.phone_number),
        }
    }

    fn new_user(&self) -> NewUser {
        let profile = self.profile();
        NewUser {
            username: self.username.trim().to_string(),
            password: self.password.clone(),
            first_name: profile.first_name,
            last_name: profile.last_name,
            document: profile.document,
            address: profile.address,
            phone_number: profile.phone_number,
        }
    }
}

fn check_optional(field: &str, value: &str, max: usize, errors: &mut Vec<String>) {
    if value.trim().chars().count() > max {
        errors.push(format!(
            "The {field} field can not have more than {max} characters."
        ));
    }
}

fn profile_fields(form: &OwnerForm) -> String {
    [
        views::text_input("First Name", "first_name", &form.first_name),
        views::text_input("Last Name", "last_name", &form.last_name),
        views::text_input("Document", "document", &form.document),
        views::text_input("Address", "address", &form.address),
        views::text_input("Phone Number", "phone_number", &form.phone_number),
    ]
    .concat()
}

fn render_create(form: &OwnerForm, errors: &[String]) -> Response {
    let body = format!(
        r#"{errors}
        <form method="POST" action="/owners/create">
            {email}
            {password}
            {confirm}
            {profile}
            <button type="submit">Create</button>
        </form>
        <p><a href="/owners">Back to list</a></p>"#,
        errors = views::errors_list(errors),
        email = views::input("email", "Email", "username", &form.username),
        password = views::input("password", "Password", "password", ""),
        confirm = views::input("password", "Password Confirm", "password_confirm", ""),
        profile = profile_fields(form),
    );
    views::page("Create owner", &body).into_response()
}

fn render_edit(id: i32, form: &OwnerForm, errors: &[String]) -> Response {
    let body = format!(
        r#"{errors}
        <p>Email: {email}</p>
        <form method="POST" action="/owners/edit/{id}">
            {profile}
            <button type="submit">Save</button>
        </form>
        <p><a href="/owners/details/{id}">Back to owner</a></p>"#,
        errors = views::errors_list(errors),
        email = html_escape(&form.username),
        profile = profile_fields(form),
    );
    views::page("Edit owner", &body).into_response()
}

fn render_delete(details: &OwnerDetails, errors: &[String]) -> Response {
    let id = details.owner.id;
    let body = format!(
        r#"{errors}
        <p>Are you sure you want to delete <strong>{name}</strong> ({email})?</p>
        <form method="POST" action="/owners/delete/{id}">
            <button type="submit" class="danger">Delete</button>
        </form>
        <p><a href="/owners">Back to list</a></p>"#,
        errors = views::errors_list(errors),
        name = html_escape(&details.user.full_name()),
        email = html_escape(&details.user.email),
    );
    views::page("Delete owner", &body).into_response()
}

pub async fn index(State(state): State<AppState>, headers: HeaderMap, uri: Uri) -> Response {
    if let Err(denied) = require_admin(&state, &headers, &uri).await {
        return denied;
    }

    let owners = match storage::list_owners(&state.db).await {
        Ok(o) => o,
        Err(e) => return views::error_page(e),
    };

    let rows: String = owners
        .iter()
        .map(|o| {
            let id = o.owner.id;
            format!(
                r#"<tr>
                    <td><a href="/owners/details/{id}">{name}</a></td>
                    <td>{email}</td>
                    <td>{document}</td>
                    <td>{phone}</td>
                    <td>{address}</td>
                    <td>{pets}</td>
                    <td><a href="/owners/edit/{id}">Edit</a> <a href="/owners/delete/{id}">Delete</a></td>
                </tr>"#,
                name = html_escape(&o.user.full_name()),
                email = html_escape(&o.user.email),
                document = opt_escape(o.user.document.as_deref()),
                phone = opt_escape(o.user.phone_number.as_deref()),
                address = opt_escape(o.user.address.as_deref()),
                pets = o.pets.len(),
            )
        })
        .collect();

    let body = format!(
        r#"<p><a href="/owners/create">Create new</a></p>
        <table>
            <tr><th>Name</th><th>Email</th><th>Document</th><th>Phone</th><th>Address</th><th>Pets</th><th></th></tr>
            {rows}
        </table>"#
    );
    views::page("Owners", &body).into_response()
}

pub async fn details(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    Path(id): Path<i32>,
) -> Response {
    if let Err(denied) = require_admin(&state, &headers, &uri).await {
        return denied;
    }

    let details = match storage::get_owner_details(&state.db, id).await {
        Ok(Some(d)) => d,
        Ok(None) => return views::not_found_page(),
        Err(e) => return views::error_page(e),
    };

    let pets: String = details
        .pets
        .iter()
        .map(|p| {
            let pet_id = p.pet.id;
            let image = p
                .pet
                .image_url
                .as_deref()
                .map(|url| format!(r#"<img class="pet" src="{}" alt="">"#, html_escape(url)))
                .unwrap_or_default();
            format!(
                r#"<tr>
                    <td>{image}</td>
                    <td><a href="/owners/details-pet/{pet_id}">{name}</a></td>
                    <td>{race}</td>
                    <td>{pet_type}</td>
                    <td>{born}</td>
                    <td>{remarks}</td>
                    <td><a href="/owners/edit-pet/{pet_id}">Edit</a> {delete}</td>
                </tr>"#,
                name = html_escape(&p.pet.name),
                race = html_escape(&p.pet.race),
                pet_type = html_escape(&p.pet_type.name),
                born = p.pet.born.format("%Y/%m/%d"),
                remarks = opt_escape(p.pet.remarks.as_deref()),
                delete = views::post_button(&format!("/owners/delete-pet/{pet_id}"), "Delete", "danger"),
            )
        })
        .collect();

    let user = &details.user;
    let body = format!(
        r#"<dl>
            <dt>Name</dt><dd>{name}</dd>
            <dt>Email</dt><dd>{email}</dd>
            <dt>Document</dt><dd>{document}</dd>
            <dt>Address</dt><dd>{address}</dd>
            <dt>Phone Number</dt><dd>{phone}</dd>
        </dl>
        <p><a href="/owners/edit/{id}">Edit</a> <a href="/owners/add-pet/{id}">Add pet</a> <a href="/owners">Back to list</a></p>
        <h2>Pets</h2>
        <table>
            <tr><th></th><th>Name</th><th>Race</th><th>Pet type</th><th>Born</th><th>Remarks</th><th></th></tr>
            {pets}
        </table>"#,
        name = html_escape(&user.full_name()),
        email = html_escape(&user.email),
        document = opt_escape(user.document.as_deref()),
        address = opt_escape(user.address.as_deref()),
        phone = opt_escape(user.phone_number.as_deref()),
    );
    views::page("Owner", &body).into_response()
}

pub async fn create_page(State(state): State<AppState>, headers: HeaderMap, uri: Uri) -> Response {
    if let Err(denied) = require_admin(&state, &headers, &uri).await {
        return denied;
    }
    render_create(&OwnerForm::default(), &[])
}

pub async fn create_submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    Form(form): Form<OwnerForm>,
) -> Response {
    if let Err(denied) = require_admin(&state, &headers, &uri).await {
        return denied;
    }

    let errors = form.validate_new();
    if !errors.is_empty() {
        return render_create(&form, &errors);
    }

    match storage::create_owner(&state.db, form.new_user()).await {
        Ok(_) => see_other("/owners"),
        Err(VetError::Validation(msg)) => render_create(&form, &[msg]),
        Err(e) => {
            // Store failures on create are shown on the form.
            tracing::error!(error = %e, "Failed to create owner");
            render_create(&form, &[e.to_string()])
        }
    }
}

pub async fn edit_page(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    Path(id): Path<i32>,
) -> Response {
    if let Err(denied) = require_admin(&state, &headers, &uri).await {
        return denied;
    }

    match storage::get_owner_with_user(&state.db, id).await {
        Ok(Some((_, user))) => render_edit(id, &OwnerForm::from_user(&user), &[]),
        Ok(None) => views::not_found_page(),
        Err(e) => views::error_page(e),
    }
}

pub async fn edit_submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    Path(id): Path<i32>,
    Form(mut form): Form<OwnerForm>,
) -> Response {
    if let Err(denied) = require_admin(&state, &headers, &uri).await {
        return denied;
    }

    // The login name is not editable; show the stored one.
    match storage::get_owner_with_user(&state.db, id).await {
        Ok(Some((_, user))) => form.username = user.username,
        Ok(None) => return views::not_found_page(),
        Err(e) => return views::error_page(e),
    }

    let mut errors = Vec::new();
    form.validate_profile(&mut errors);
    if !errors.is_empty() {
        return render_edit(id, &form, &errors);
    }

    match storage::update_owner(&state.db, id, form.profile()).await {
        Ok(_) => see_other(&format!("/owners/details/{id}")),
        Err(VetError::Validation(msg)) => render_edit(id, &form, &[msg]),
        Err(e) => views::error_page(e),
    }
}

pub async fn delete_page(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    Path(id): Path<i32>,
) -> Response {
    if let Err(denied) = require_admin(&state, &headers, &uri).await {
        return denied;
    }

    match storage::get_owner_details(&state.db, id).await {
        Ok(Some(details)) => render_delete(&details, &[]),
        Ok(None) => views::not_found_page(),
        Err(e) => views::error_page(e),
    }
}

pub async fn delete_submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    Path(id): Path<i32>,
) -> Response {
    if let Err(denied) = require_admin(&state, &headers, &uri).await {
        return denied;
    }

    match storage::delete_owner(&state.db, id).await {
        Ok(()) => see_other("/owners"),
        Err(VetError::Validation(msg)) => match storage::get_owner_details(&state.db, id).await {
            Ok(Some(details)) => render_delete(&details, &[msg]),
            Ok(None) => views::not_found_page(),
            Err(e) => views::error_page(e),
        },
        Err(e) => views::error_page(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled() -> OwnerForm {
        OwnerForm {
            username: "ana@example.com".to_string(),
            password: "secret1".to_string(),
            password_confirm: "secret1".to_string(),
            first_name: "Ana".to_string(),
            last_name: "Lopez".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_new_owner_form() {
        assert!(filled().validate_new().is_empty());
    }

    #[test]
    fn test_new_owner_form_errors() {
        let mut form = filled();
        form.username = "not-an-email".to_string();
        form.password_confirm = "other".to_string();
        form.phone_number = "9".repeat(21);

        let errors = form.validate_new();
        assert_eq!(errors.len(), 3);
        assert!(errors.contains(&"The Email field is not a valid e-mail address.".to_string()));
    }

    #[test]
    fn test_profile_blank_optionals_are_none() {
        let mut form = filled();
        form.address = "   ".to_string();
        form.document = " 42 ".to_string();

        let profile = form.profile();
        assert_eq!(profile.address, None);
        assert_eq!(profile.document.as_deref(), Some("42"));
    }
}
