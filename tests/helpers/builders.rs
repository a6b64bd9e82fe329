use chrono::NaiveDate;
use myvet::converter::{self, PetViewModel};
use myvet::entities;
use myvet::storage::{self, NewUser};
use sea_orm::ActiveValue::Set;
use sea_orm::DatabaseConnection;

/// Builder for creating test owners (and their Customer login)
pub struct OwnerBuilder {
    email: String,
    password: String,
    first_name: String,
    last_name: String,
    phone_number: Option<String>,
}

impl OwnerBuilder {
    pub fn new(email: &str) -> Self {
        Self {
            email: email.to_string(),
            password: "password123".to_string(),
            first_name: "Juan".to_string(),
            last_name: "Zuluaga".to_string(),
            phone_number: None,
        }
    }

    pub fn with_password(mut self, password: &str) -> Self {
        self.password = password.to_string();
        self
    }

    pub fn with_name(mut self, first: &str, last: &str) -> Self {
        self.first_name = first.to_string();
        self.last_name = last.to_string();
        self
    }

    pub fn with_phone(mut self, phone: &str) -> Self {
        self.phone_number = Some(phone.to_string());
        self
    }

    pub async fn create(
        self,
        db: &DatabaseConnection,
    ) -> (entities::owner::Model, entities::user::Model) {
        storage::create_owner(
            db,
            NewUser {
                username: self.email,
                password: self.password,
                first_name: self.first_name,
                last_name: self.last_name,
                document: None,
                address: None,
                phone_number: self.phone_number,
            },
        )
        .await
        .expect("Failed to create test owner")
    }
}

/// Builder for creating test pets
pub struct PetBuilder {
    owner_id: i32,
    pet_type_id: i32,
    name: String,
    race: String,
    born: NaiveDate,
    image_url: Option<String>,
}

impl PetBuilder {
    pub fn new(owner_id: i32, pet_type_id: i32, name: &str) -> Self {
        Self {
            owner_id,
            pet_type_id,
            name: name.to_string(),
            race: "Mixed".to_string(),
            born: NaiveDate::from_ymd_opt(2020, 1, 15).expect("valid date"),
            image_url: None,
        }
    }

    pub fn with_image(mut self, image_url: &str) -> Self {
        self.image_url = Some(image_url.to_string());
        self
    }

    pub async fn create(self, db: &DatabaseConnection) -> entities::pet::Model {
        let model = PetViewModel {
            pet_id: 0,
            owner_id: self.owner_id,
            pet_type_id: self.pet_type_id,
            name: self.name,
            race: self.race,
            born: self.born,
            remarks: None,
            image_url: None,
            pet_types: Vec::new(),
        };
        let active = converter::create_pet(db, &model, self.image_url)
            .await
            .expect("Failed to map test pet");
        storage::insert_pet(db, active)
            .await
            .expect("Failed to create test pet")
    }
}

/// Builder for creating test history entries
pub struct HistoryBuilder {
    pet_id: i32,
    service_type_id: i32,
    description: String,
    date: i64,
}

impl HistoryBuilder {
    pub fn new(pet_id: i32, service_type_id: i32) -> Self {
        Self {
            pet_id,
            service_type_id,
            description: "General checkup".to_string(),
            date: 1_700_000_000,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn at(mut self, timestamp: i64) -> Self {
        self.date = timestamp;
        self
    }

    pub async fn create(self, db: &DatabaseConnection) -> entities::history::Model {
        storage::insert_history(
            db,
            entities::history::ActiveModel {
                description: Set(self.description),
                date: Set(self.date),
                remarks: Set(None),
                pet_id: Set(self.pet_id),
                service_type_id: Set(self.service_type_id),
                ..Default::default()
            },
        )
        .await
        .expect("Failed to create test history")
    }
}
