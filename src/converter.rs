//! Mapping between persisted entities and the flat view models used by the
//! pet and history forms.
//!
//! Foreign keys are resolved up front (`resolve_*_links`) so that the mapping
//! itself is a pure function of the view model and the resolved rows. New
//! rows are built with `*_create_from`, which never carries an identity, and
//! edits with `*_update_from`, which takes the identity from the route rather
//! than from the submitted form.

use crate::combos::ComboItem;
use crate::entities::{self, history, owner, pet, pet_type, service_type};
use crate::errors::VetError;
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use sea_orm::ActiveValue::{NotSet, Set, Unchanged};
use sea_orm::{DatabaseConnection, EntityTrait};
use serde::{Deserialize, Serialize};

pub const NAME_MAX_LEN: usize = 50;
pub const DESCRIPTION_MAX_LEN: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PetViewModel {
    pub pet_id: i32,
    pub owner_id: i32,
    pub pet_type_id: i32,
    pub name: String,
    pub race: String,
    pub born: NaiveDate,
    pub remarks: Option<String>,
    pub image_url: Option<String>,
    pub pet_types: Vec<ComboItem>,
}

impl PetViewModel {
    /// Blank form for a new pet of `owner_id`.
    pub fn blank(owner_id: i32, pet_types: Vec<ComboItem>) -> Self {
        Self {
            pet_id: 0,
            owner_id,
            pet_type_id: 0,
            name: String::new(),
            race: String::new(),
            born: Local::now().date_naive(),
            remarks: None,
            image_url: None,
            pet_types,
        }
    }

    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        check_required("Name", &self.name, NAME_MAX_LEN, &mut errors);
        check_required("Race", &self.race, NAME_MAX_LEN, &mut errors);
        if self.pet_type_id <= 0 {
            errors.push("You must select a pet type.".to_string());
        }
        errors
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryViewModel {
    pub history_id: i32,
    pub pet_id: i32,
    pub service_type_id: i32,
    pub description: String,
    /// Visit date as entered, in the clinic's local time
    pub date: NaiveDateTime,
    pub remarks: Option<String>,
    pub service_types: Vec<ComboItem>,
}

impl HistoryViewModel {
    pub fn blank(pet_id: i32, service_types: Vec<ComboItem>) -> Self {
        Self {
            history_id: 0,
            pet_id,
            service_type_id: 0,
            description: String::new(),
            date: Local::now().naive_local(),
            remarks: None,
            service_types,
        }
    }

    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        check_required("Description", &self.description, DESCRIPTION_MAX_LEN, &mut errors);
        if self.service_type_id <= 0 {
            errors.push("You must select a service type.".to_string());
        }
        errors
    }
}

/// Validation shared by every required, length-limited text field.
pub fn check_required(field: &str, value: &str, max: usize, errors: &mut Vec<String>) {
    if value.trim().is_empty() {
        errors.push(format!("The field {field} is mandatory."));
    } else if value.chars().count() > max {
        errors.push(format!(
            "The {field} field can not have more than {max} characters."
        ));
    }
}

/// Rows a pet refers to.
#[derive(Debug, Clone)]
pub struct PetLinks {
    pub owner: owner::Model,
    pub pet_type: pet_type::Model,
}

/// Rows a history entry refers to.
#[derive(Debug, Clone)]
pub struct HistoryLinks {
    pub pet: pet::Model,
    pub service_type: service_type::Model,
}

pub async fn resolve_pet_links(
    db: &DatabaseConnection,
    model: &PetViewModel,
) -> Result<PetLinks, VetError> {
    let owner = entities::Owner::find_by_id(model.owner_id)
        .one(db)
        .await?
        .ok_or_else(|| VetError::not_found("Owner", model.owner_id))?;
    let pet_type = entities::PetType::find_by_id(model.pet_type_id)
        .one(db)
        .await?
        .ok_or_else(|| VetError::not_found("Pet type", model.pet_type_id))?;
    Ok(PetLinks { owner, pet_type })
}

pub async fn resolve_history_links(
    db: &DatabaseConnection,
    model: &HistoryViewModel,
) -> Result<HistoryLinks, VetError> {
    let pet = entities::Pet::find_by_id(model.pet_id)
        .one(db)
        .await?
        .ok_or_else(|| VetError::not_found("Pet", model.pet_id))?;
    let service_type = entities::ServiceType::find_by_id(model.service_type_id)
        .one(db)
        .await?
        .ok_or_else(|| VetError::not_found("Service type", model.service_type_id))?;
    Ok(HistoryLinks { pet, service_type })
}

fn pet_fields(model: &PetViewModel, links: &PetLinks, image_url: Option<String>) -> pet::ActiveModel {
    pet::ActiveModel {
        id: NotSet,
        name: Set(model.name.clone()),
        race: Set(model.race.clone()),
        born: Set(model.born),
        remarks: Set(model.remarks.clone()),
        image_url: Set(image_url),
        owner_id: Set(links.owner.id),
        pet_type_id: Set(links.pet_type.id),
    }
}

/// A new pet; the identity is left for the store to assign, whatever
/// `model.pet_id` holds.
pub fn pet_create_from(
    model: &PetViewModel,
    links: &PetLinks,
    image_url: Option<String>,
) -> pet::ActiveModel {
    pet_fields(model, links, image_url)
}

/// Full replacement of pet `id`.
pub fn pet_update_from(
    id: i32,
    model: &PetViewModel,
    links: &PetLinks,
    image_url: Option<String>,
) -> pet::ActiveModel {
    let mut active = pet_fields(model, links, image_url);
    active.id = Unchanged(id);
    active
}

pub fn to_pet_view_model(pet: &pet::Model, pet_types: Vec<ComboItem>) -> PetViewModel {
    PetViewModel {
        pet_id: pet.id,
        owner_id: pet.owner_id,
        pet_type_id: pet.pet_type_id,
        name: pet.name.clone(),
        race: pet.race.clone(),
        born: pet.born,
        remarks: pet.remarks.clone(),
        image_url: pet.image_url.clone(),
        pet_types,
    }
}

pub async fn create_pet(
    db: &DatabaseConnection,
    model: &PetViewModel,
    image_url: Option<String>,
) -> Result<pet::ActiveModel, VetError> {
    let links = resolve_pet_links(db, model).await?;
    Ok(pet_create_from(model, &links, image_url))
}

pub async fn update_pet(
    db: &DatabaseConnection,
    id: i32,
    model: &PetViewModel,
    image_url: Option<String>,
) -> Result<pet::ActiveModel, VetError> {
    let links = resolve_pet_links(db, model).await?;
    Ok(pet_update_from(id, model, &links, image_url))
}

/// Interpret a wall-clock time in `tz`. Ambiguous times (DST fold) take the
/// earlier instant; times inside a DST gap are rejected.
pub fn local_to_utc<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> Result<DateTime<Utc>, VetError> {
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| {
            VetError::Validation(format!(
                "The date {} does not exist in local time.",
                naive.format("%Y/%m/%d %H:%M")
            ))
        })
}

pub fn utc_to_local<Tz: TimeZone>(tz: &Tz, timestamp: i64) -> NaiveDateTime {
    entities::utc_from_timestamp(timestamp)
        .with_timezone(tz)
        .naive_local()
}

fn history_fields_in<Tz: TimeZone>(
    tz: &Tz,
    model: &HistoryViewModel,
    links: &HistoryLinks,
) -> Result<history::ActiveModel, VetError> {
    let date = local_to_utc(tz, model.date)?;
    Ok(history::ActiveModel {
        id: NotSet,
        description: Set(model.description.clone()),
        date: Set(date.timestamp()),
        remarks: Set(model.remarks.clone()),
        pet_id: Set(links.pet.id),
        service_type_id: Set(links.service_type.id),
    })
}

pub fn history_create_from_in<Tz: TimeZone>(
    tz: &Tz,
    model: &HistoryViewModel,
    links: &HistoryLinks,
) -> Result<history::ActiveModel, VetError> {
    history_fields_in(tz, model, links)
}

pub fn history_update_from_in<Tz: TimeZone>(
    tz: &Tz,
    id: i32,
    model: &HistoryViewModel,
    links: &HistoryLinks,
) -> Result<history::ActiveModel, VetError> {
    let mut active = history_fields_in(tz, model, links)?;
    active.id = Unchanged(id);
    Ok(active)
}

pub fn history_create_from(
    model: &HistoryViewModel,
    links: &HistoryLinks,
) -> Result<history::ActiveModel, VetError> {
    history_create_from_in(&Local, model, links)
}

pub fn history_update_from(
    id: i32,
    model: &HistoryViewModel,
    links: &HistoryLinks,
) -> Result<history::ActiveModel, VetError> {
    history_update_from_in(&Local, id, model, links)
}

pub fn to_history_view_model_in<Tz: TimeZone>(
    tz: &Tz,
    history: &history::Model,
    service_types: Vec<ComboItem>,
) -> HistoryViewModel {
    HistoryViewModel {
        history_id: history.id,
        pet_id: history.pet_id,
        service_type_id: history.service_type_id,
        description: history.description.clone(),
        date: utc_to_local(tz, history.date),
        remarks: history.remarks.clone(),
        service_types,
    }
}

pub fn to_history_view_model(
    history: &history::Model,
    service_types: Vec<ComboItem>,
) -> HistoryViewModel {
    to_history_view_model_in(&Local, history, service_types)
}

pub async fn create_history(
    db: &DatabaseConnection,
    model: &HistoryViewModel,
) -> Result<history::ActiveModel, VetError> {
    let links = resolve_history_links(db, model).await?;
    history_create_from(model, &links)
}

pub async fn update_history(
    db: &DatabaseConnection,
    id: i32,
    model: &HistoryViewModel,
) -> Result<history::ActiveModel, VetError> {
    let links = resolve_history_links(db, model).await?;
    history_update_from(id, model, &links)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combos::{build_combo, PET_TYPE_PLACEHOLDER};
    use crate::test_zone::DaylightZone;
    use chrono::{FixedOffset, NaiveTime};
    use sea_orm::TryIntoModel;

    fn links() -> PetLinks {
        PetLinks {
            owner: owner::Model { id: 7, user_id: 70 },
            pet_type: pet_type::Model {
                id: 3,
                name: "Dog".to_string(),
            },
        }
    }

    fn stored_pet() -> pet::Model {
        pet::Model {
            id: 42,
            name: "Rex".to_string(),
            race: "Labrador".to_string(),
            born: NaiveDate::from_ymd_opt(2019, 4, 12).unwrap(),
            remarks: Some("Allergic to chicken".to_string()),
            image_url: Some("/images/pets/rex.jpg".to_string()),
            owner_id: 7,
            pet_type_id: 3,
        }
    }

    fn history_links() -> HistoryLinks {
        HistoryLinks {
            pet: stored_pet(),
            service_type: service_type::Model {
                id: 5,
                name: "Vaccine".to_string(),
            },
        }
    }

    fn history_model(date: NaiveDateTime) -> HistoryViewModel {
        HistoryViewModel {
            history_id: 9,
            pet_id: 42,
            service_type_id: 5,
            description: "Rabies booster".to_string(),
            date,
            remarks: None,
            service_types: Vec::new(),
        }
    }

    #[test]
    fn test_pet_view_model_round_trip_preserves_fields() {
        let pet = stored_pet();
        let combo = build_combo(PET_TYPE_PLACEHOLDER, vec![(3, "Dog".to_string())]);

        let vm = to_pet_view_model(&pet, combo.clone());
        assert_eq!(vm.owner_id, 7);
        assert_eq!(vm.pet_type_id, 3);
        assert_eq!(vm.pet_types, combo);

        let active = pet_update_from(vm.pet_id, &vm, &links(), vm.image_url.clone());
        let back = active.try_into_model().expect("all fields set");

        assert_eq!(back, pet);
    }

    #[test]
    fn test_pet_create_never_carries_identity() {
        let mut vm = to_pet_view_model(&stored_pet(), Vec::new());
        for id in [0, 1, 42, i32::MAX] {
            vm.pet_id = id;
            let active = pet_create_from(&vm, &links(), None);
            assert!(active.id.is_not_set());
        }
    }

    #[test]
    fn test_pet_update_uses_route_identity() {
        let mut vm = to_pet_view_model(&stored_pet(), Vec::new());
        vm.pet_id = 999;

        let active = pet_update_from(42, &vm, &links(), None);

        assert_eq!(active.id, Unchanged(42));
        assert_eq!(active.image_url, Set(None));
    }

    #[test]
    fn test_pet_fields_come_from_resolved_links() {
        let mut vm = to_pet_view_model(&stored_pet(), Vec::new());
        vm.owner_id = 1;
        vm.pet_type_id = 1;

        let active = pet_create_from(&vm, &links(), None);

        assert_eq!(active.owner_id, Set(7));
        assert_eq!(active.pet_type_id, Set(3));
    }

    #[test]
    fn test_pet_validation() {
        let mut vm = PetViewModel::blank(7, Vec::new());
        let errors = vm.validate();
        assert_eq!(errors.len(), 3);

        vm.name = "x".repeat(51);
        vm.race = "Mixed".to_string();
        vm.pet_type_id = 2;
        let errors = vm.validate();
        assert_eq!(
            errors,
            vec!["The Name field can not have more than 50 characters.".to_string()]
        );

        vm.name = "Luna".to_string();
        assert!(vm.validate().is_empty());
    }

    #[test]
    fn test_history_validation() {
        let mut vm = HistoryViewModel::blank(42, Vec::new());
        assert_eq!(vm.validate().len(), 2);

        vm.description = "d".repeat(101);
        vm.service_type_id = 5;
        assert_eq!(vm.validate().len(), 1);

        vm.description = "Checkup".to_string();
        assert!(vm.validate().is_empty());
    }

    #[test]
    fn test_history_date_stored_as_utc() {
        let tz = FixedOffset::west_opt(5 * 3600).unwrap();
        let local = NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_time(NaiveTime::from_hms_opt(9, 30, 0).unwrap());

        let active = history_create_from_in(&tz, &history_model(local), &history_links())
            .expect("valid date");

        let expected = Utc.with_ymd_and_hms(2024, 3, 10, 14, 30, 0).unwrap();
        assert_eq!(active.date, Set(expected.timestamp()));
        assert!(active.id.is_not_set());
        assert_eq!(active.pet_id, Set(42));
        assert_eq!(active.service_type_id, Set(5));
    }

    #[test]
    fn test_history_round_trip_recovers_local_time() {
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        let local = NaiveDate::from_ymd_opt(2023, 11, 2)
            .unwrap()
            .and_time(NaiveTime::from_hms_opt(16, 45, 0).unwrap());

        let active = history_update_from_in(&tz, 9, &history_model(local), &history_links())
            .expect("valid date");
        let stored = active.try_into_model().expect("all fields set");
        assert_eq!(stored.id, 9);

        let vm = to_history_view_model_in(&tz, &stored, Vec::new());
        assert_eq!(vm.date, local);
        assert_eq!(vm.description, "Rabies booster");
    }

    fn march(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day)
            .unwrap()
            .and_time(NaiveTime::from_hms_opt(hour, minute, 0).unwrap())
    }

    #[test]
    fn test_skipped_local_time_is_rejected() {
        let result = local_to_utc(&DaylightZone, march(11, 10, 15));
        assert!(matches!(result, Err(VetError::Validation(_))));

        // A history dated inside the gap is not saved
        let result =
            history_create_from_in(&DaylightZone, &history_model(march(11, 10, 30)), &history_links());
        assert!(matches!(result, Err(VetError::Validation(_))));

        // Either side of the gap is fine
        assert_eq!(
            local_to_utc(&DaylightZone, march(11, 9, 45)).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 11, 9, 45, 0).unwrap()
        );
        assert_eq!(
            local_to_utc(&DaylightZone, march(11, 11, 0)).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 11, 10, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_repeated_local_time_takes_earlier_instant() {
        let utc = local_to_utc(&DaylightZone, march(12, 10, 15)).unwrap();
        assert_eq!(utc, Utc.with_ymd_and_hms(2024, 3, 12, 9, 15, 0).unwrap());

        let active =
            history_create_from_in(&DaylightZone, &history_model(march(12, 10, 15)), &history_links())
                .expect("repeated time is valid");
        assert_eq!(active.date, Set(utc.timestamp()));
    }

    #[test]
    fn test_local_view_is_same_instant() {
        let stored = history::Model {
            id: 1,
            description: "Bath".to_string(),
            date: 1_700_000_000,
            remarks: None,
            pet_id: 1,
            service_type_id: 1,
        };

        assert_eq!(stored.date_local().with_timezone(&Utc), stored.date_utc());
        assert_eq!(stored.date_utc().timestamp(), 1_700_000_000);
    }
}
