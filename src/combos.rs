//! Label/value lists for the selection controls on the pet, history and
//! agenda forms. Every list starts with an "unselected" entry whose value
//! is `"0"`.

use crate::entities;
use crate::errors::VetError;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, LoaderTrait, QueryFilter};
use serde::{Deserialize, Serialize};

pub const PET_TYPE_PLACEHOLDER: &str = "Select a pet type...";
pub const SERVICE_TYPE_PLACEHOLDER: &str = "Select a service type...";
pub const OWNER_PLACEHOLDER: &str = "Select an owner...";
pub const PET_PLACEHOLDER: &str = "Select a pet...";

/// Value carried by the placeholder entry.
pub const UNSELECTED: &str = "0";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComboItem {
    pub text: String,
    pub value: String,
}

impl ComboItem {
    pub fn new(text: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            value: value.into(),
        }
    }
}

/// Sort `(id, label)` pairs by label and prepend the placeholder.
pub fn build_combo<I>(placeholder: &str, items: I) -> Vec<ComboItem>
where
    I: IntoIterator<Item = (i32, String)>,
{
    let mut list: Vec<ComboItem> = items
        .into_iter()
        .map(|(id, text)| ComboItem {
            text,
            value: id.to_string(),
        })
        .collect();
    list.sort_by(|a, b| a.text.cmp(&b.text));

    list.insert(0, ComboItem::new(placeholder, UNSELECTED));
    list
}

pub async fn pet_types_combo(db: &DatabaseConnection) -> Result<Vec<ComboItem>, VetError> {
    let rows = entities::PetType::find().all(db).await?;
    Ok(build_combo(
        PET_TYPE_PLACEHOLDER,
        rows.into_iter().map(|pt| (pt.id, pt.name)),
    ))
}

pub async fn service_types_combo(db: &DatabaseConnection) -> Result<Vec<ComboItem>, VetError> {
    let rows = entities::ServiceType::find().all(db).await?;
    Ok(build_combo(
        SERVICE_TYPE_PLACEHOLDER,
        rows.into_iter().map(|st| (st.id, st.name)),
    ))
}

/// Owners labelled by their user's full name.
pub async fn owners_combo(db: &DatabaseConnection) -> Result<Vec<ComboItem>, VetError> {
    let owners = entities::Owner::find().all(db).await?;
    let users = owners.load_one(entities::User, db).await?;

    Ok(build_combo(
        OWNER_PLACEHOLDER,
        owners
            .into_iter()
            .zip(users)
            .filter_map(|(owner, user)| user.map(|u| (owner.id, u.full_name()))),
    ))
}

pub async fn pets_combo(
    db: &DatabaseConnection,
    owner_id: i32,
) -> Result<Vec<ComboItem>, VetError> {
    let pets = entities::Pet::find()
        .filter(entities::pet::Column::OwnerId.eq(owner_id))
        .all(db)
        .await?;
    Ok(build_combo(
        PET_PLACEHOLDER,
        pets.into_iter().map(|p| (p.id, p.name)),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combo_sorted_with_placeholder_first() {
        let combo = build_combo(
            PET_TYPE_PLACEHOLDER,
            vec![(3, "Dog".to_string()), (1, "Cat".to_string())],
        );

        assert_eq!(
            combo,
            vec![
                ComboItem::new("Select a pet type...", "0"),
                ComboItem::new("Cat", "1"),
                ComboItem::new("Dog", "3"),
            ]
        );
    }

    #[test]
    fn test_empty_set_yields_only_placeholder() {
        let combo = build_combo(SERVICE_TYPE_PLACEHOLDER, Vec::new());
        assert_eq!(combo.len(), 1);
        assert_eq!(combo[0].text, "Select a service type...");
        assert_eq!(combo[0].value, UNSELECTED);
    }

    #[test]
    fn test_combo_has_one_extra_entry_and_sorted_tail() {
        let names = ["Vaccine", "Bath", "Surgery", "Checkup", "Deworm", "Bath 2"];
        let items: Vec<(i32, String)> = names
            .iter()
            .enumerate()
            .map(|(i, n)| (i as i32 + 10, n.to_string()))
            .collect();

        let combo = build_combo(SERVICE_TYPE_PLACEHOLDER, items);

        assert_eq!(combo.len(), names.len() + 1);
        assert_eq!(combo.iter().filter(|c| c.value == UNSELECTED).count(), 1);
        let labels: Vec<&str> = combo[1..].iter().map(|c| c.text.as_str()).collect();
        let mut sorted = labels.clone();
        sorted.sort();
        assert_eq!(labels, sorted);
    }
}
