use crate::converter::{check_required, NAME_MAX_LEN};
use crate::entities::{
    self, agenda, api_token, history, owner, pet, pet_type, service_type, session, user,
};
use crate::errors::VetError;
use crate::settings::Database as DbCfg;
use base64ct::Encoding;
use chrono::{DateTime, Utc};
use rand::RngCore;
use sea_orm::sea_query::{Expr, Func, SimpleExpr};
use sea_orm::ActiveValue::{Set, Unchanged};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Database, DatabaseConnection, DbErr, EntityTrait, LoaderTrait,
    ModelTrait, PaginatorTrait, PrimaryKeyTrait, QueryFilter, QueryOrder,
};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Customer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Customer => "Customer",
        }
    }

    pub fn parse(value: &str) -> Option<Role> {
        match value {
            "Admin" => Some(Role::Admin),
            "Customer" => Some(Role::Customer),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    /// Email address, also used as the login name
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub document: Option<String>,
    pub address: Option<String>,
    pub phone_number: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UserProfile {
    pub first_name: String,
    pub last_name: String,
    pub document: Option<String>,
    pub address: Option<String>,
    pub phone_number: Option<String>,
}

// Read shapes. Each one names exactly the relations it materialises.

/// Owners index row: owner, login identity and pets (without pet types).
#[derive(Debug, Clone)]
pub struct OwnerSummary {
    pub owner: owner::Model,
    pub user: user::Model,
    pub pets: Vec<pet::Model>,
}

#[derive(Debug, Clone)]
pub struct PetWithType {
    pub pet: pet::Model,
    pub pet_type: pet_type::Model,
}

/// Owner details page: owner, user, pets with their pet types.
#[derive(Debug, Clone)]
pub struct OwnerDetails {
    pub owner: owner::Model,
    pub user: user::Model,
    pub pets: Vec<PetWithType>,
}

#[derive(Debug, Clone)]
pub struct HistoryWithService {
    pub history: history::Model,
    pub service_type: service_type::Model,
}

/// Pet details page: pet, pet type, owner with user, histories with service types.
#[derive(Debug, Clone)]
pub struct PetDetails {
    pub pet: pet::Model,
    pub pet_type: pet_type::Model,
    pub owner: owner::Model,
    pub user: user::Model,
    pub histories: Vec<HistoryWithService>,
}

#[derive(Debug, Clone)]
pub struct PetAggregate {
    pub pet: pet::Model,
    pub pet_type: pet_type::Model,
    pub histories: Vec<HistoryWithService>,
}

/// Everything the mobile API returns for one owner.
#[derive(Debug, Clone)]
pub struct OwnerAggregate {
    pub owner: owner::Model,
    pub user: user::Model,
    pub pets: Vec<PetAggregate>,
}

/// Agenda row with the booking's owner (as its user) and pet, when booked.
#[derive(Debug, Clone)]
pub struct AgendaEntry {
    pub agenda: agenda::Model,
    pub owner: Option<user::Model>,
    pub pet: Option<pet::Model>,
}

/// Connect and bring the schema up to date.
pub async fn init(cfg: &DbCfg) -> Result<DatabaseConnection, VetError> {
    use migration::MigratorTrait;

    let db = Database::connect(&cfg.url).await?;
    migration::Migrator::up(&db, None).await?;
    tracing::info!("Database schema up to date");
    Ok(db)
}

pub(crate) fn random_id() -> String {
    let mut bytes = [0u8; 24];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64ct::Base64UrlUnpadded::encode_string(&bytes)
}

fn dangling(what: &str, id: i32, relation: &str) -> VetError {
    VetError::Other(format!("{what} {id} has no {relation}"))
}

/// After `update` reports no affected row: if the record is gone the caller
/// gets NotFound, otherwise the original error.
async fn settle_update_conflict<E>(
    db: &DatabaseConnection,
    id: i32,
    err: DbErr,
    what: &str,
) -> VetError
where
    E: EntityTrait,
    i32: Into<<E::PrimaryKey as PrimaryKeyTrait>::ValueType>,
{
    if !matches!(err, DbErr::RecordNotUpdated) {
        return err.into();
    }
    match E::find_by_id(id).one(db).await {
        Ok(None) => VetError::not_found(what, id),
        Ok(Some(_)) => err.into(),
        Err(e) => e.into(),
    }
}

// User management functions

fn username_matches(username: &str) -> SimpleExpr {
    Expr::expr(Func::lower(Expr::col(user::Column::Username))).eq(username.trim().to_lowercase())
}

pub async fn create_user(
    db: &DatabaseConnection,
    input: NewUser,
    role: Role,
) -> Result<user::Model, VetError> {
    use argon2::password_hash::{rand_core::OsRng, SaltString};
    use argon2::{Argon2, PasswordHasher};

    let username = input.username.trim().to_lowercase();
    if get_user_by_username(db, &username).await?.is_some() {
        return Err(VetError::Validation(format!(
            "A user with the email {username} already exists."
        )));
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(input.password.as_bytes(), &salt)
        .map_err(|e| VetError::Other(format!("Password hashing failed: {}", e)))?
        .to_string();

    let user = user::ActiveModel {
        username: Set(username.clone()),
        password_hash: Set(password_hash),
        first_name: Set(input.first_name),
        last_name: Set(input.last_name),
        document: Set(input.document),
        address: Set(input.address),
        phone_number: Set(input.phone_number),
        email: Set(username),
        role: Set(role.as_str().to_string()),
        created_at: Set(Utc::now().timestamp()),
        ..Default::default()
    };

    Ok(user.insert(db).await?)
}

/// Case-insensitive lookup by login name (email).
pub async fn get_user_by_username(
    db: &DatabaseConnection,
    username: &str,
) -> Result<Option<user::Model>, VetError> {
    Ok(entities::User::find()
        .filter(username_matches(username))
        .one(db)
        .await?)
}

pub async fn get_user(db: &DatabaseConnection, id: i32) -> Result<Option<user::Model>, VetError> {
    Ok(entities::User::find_by_id(id).one(db).await?)
}

pub async fn verify_user_password(
    db: &DatabaseConnection,
    username: &str,
    password: &str,
) -> Result<Option<user::Model>, VetError> {
    use argon2::{Argon2, PasswordHash, PasswordVerifier};

    let user = match get_user_by_username(db, username).await? {
        Some(u) => u,
        None => return Ok(None),
    };

    let parsed_hash = PasswordHash::new(&user.password_hash)
        .map_err(|e| VetError::Other(format!("Invalid password hash: {}", e)))?;

    if Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
    {
        Ok(Some(user))
    } else {
        Ok(None)
    }
}

/// Create the administrator account if it does not exist yet.
pub async fn ensure_admin(
    db: &DatabaseConnection,
    username: &str,
    password: &str,
) -> Result<bool, VetError> {
    if get_user_by_username(db, username).await?.is_some() {
        return Ok(false);
    }
    create_user(
        db,
        NewUser {
            username: username.to_string(),
            password: password.to_string(),
            first_name: "Clinic".to_string(),
            last_name: "Administrator".to_string(),
            document: None,
            address: None,
            phone_number: None,
        },
        Role::Admin,
    )
    .await?;
    Ok(true)
}

// Session management functions

pub async fn create_session(
    db: &DatabaseConnection,
    user_id: i32,
    ttl_secs: i64,
) -> Result<session::Model, VetError> {
    let now = Utc::now().timestamp();

    let session = session::ActiveModel {
        session_id: Set(random_id()),
        user_id: Set(user_id),
        created_at: Set(now),
        expires_at: Set(now + ttl_secs),
    };

    Ok(session.insert(db).await?)
}

pub async fn get_session(
    db: &DatabaseConnection,
    session_id: &str,
) -> Result<Option<session::Model>, VetError> {
    use entities::session::{Column, Entity};

    if let Some(model) = Entity::find()
        .filter(Column::SessionId.eq(session_id))
        .one(db)
        .await?
    {
        // Check if session is expired
        let now = Utc::now().timestamp();
        if now > model.expires_at {
            return Ok(None);
        }
        Ok(Some(model))
    } else {
        Ok(None)
    }
}

pub async fn delete_session(db: &DatabaseConnection, session_id: &str) -> Result<(), VetError> {
    use entities::session::{Column, Entity};

    Entity::delete_many()
        .filter(Column::SessionId.eq(session_id))
        .exec(db)
        .await?;

    Ok(())
}

// API token functions

pub async fn issue_api_token(
    db: &DatabaseConnection,
    user_id: i32,
    ttl_secs: i64,
) -> Result<api_token::Model, VetError> {
    let now = Utc::now().timestamp();

    let token = api_token::ActiveModel {
        token: Set(random_id()),
        user_id: Set(user_id),
        created_at: Set(now),
        expires_at: Set(now + ttl_secs),
    };

    Ok(token.insert(db).await?)
}

pub async fn get_api_token(
    db: &DatabaseConnection,
    token: &str,
) -> Result<Option<api_token::Model>, VetError> {
    use entities::api_token::{Column, Entity};

    if let Some(model) = Entity::find()
        .filter(Column::Token.eq(token))
        .one(db)
        .await?
    {
        let now = Utc::now().timestamp();
        if now > model.expires_at {
            return Ok(None);
        }
        Ok(Some(model))
    } else {
        Ok(None)
    }
}

// Owner functions

/// Create the owner's login (role Customer) and the owner record.
pub async fn create_owner(
    db: &DatabaseConnection,
    input: NewUser,
) -> Result<(owner::Model, user::Model), VetError> {
    let user = create_user(db, input, Role::Customer).await?;

    let owner = owner::ActiveModel {
        user_id: Set(user.id),
        ..Default::default()
    }
    .insert(db)
    .await?;

    tracing::info!(owner_id = owner.id, user_id = user.id, "Created owner");
    Ok((owner, user))
}

pub async fn get_owner(db: &DatabaseConnection, id: i32) -> Result<Option<owner::Model>, VetError> {
    Ok(entities::Owner::find_by_id(id).one(db).await?)
}

pub async fn get_owner_with_user(
    db: &DatabaseConnection,
    id: i32,
) -> Result<Option<(owner::Model, user::Model)>, VetError> {
    match entities::Owner::find_by_id(id)
        .find_also_related(entities::User)
        .one(db)
        .await?
    {
        Some((owner, Some(user))) => Ok(Some((owner, user))),
        Some((owner, None)) => Err(dangling("Owner", owner.id, "user")),
        None => Ok(None),
    }
}

/// All owners with their users and pets, ordered by last then first name.
pub async fn list_owners(db: &DatabaseConnection) -> Result<Vec<OwnerSummary>, VetError> {
    let owners = entities::Owner::find()
        .order_by_asc(owner::Column::Id)
        .all(db)
        .await?;
    let users = owners.load_one(entities::User, db).await?;
    let pets = owners.load_many(entities::Pet, db).await?;

    let mut rows = owners
        .into_iter()
        .zip(users)
        .zip(pets)
        .map(|((owner, user), pets)| match user {
            Some(user) => Ok(OwnerSummary { owner, user, pets }),
            None => Err(dangling("Owner", owner.id, "user")),
        })
        .collect::<Result<Vec<_>, VetError>>()?;

    rows.sort_by(|a, b| {
        (&a.user.last_name, &a.user.first_name).cmp(&(&b.user.last_name, &b.user.first_name))
    });
    Ok(rows)
}

async fn with_pet_types(
    db: &DatabaseConnection,
    pets: Vec<pet::Model>,
) -> Result<Vec<PetWithType>, VetError> {
    let types = pets.load_one(entities::PetType, db).await?;
    pets.into_iter()
        .zip(types)
        .map(|(pet, pet_type)| match pet_type {
            Some(pet_type) => Ok(PetWithType { pet, pet_type }),
            None => Err(dangling("Pet", pet.id, "pet type")),
        })
        .collect()
}

async fn histories_of(
    db: &DatabaseConnection,
    pet: &pet::Model,
) -> Result<Vec<HistoryWithService>, VetError> {
    let histories = pet
        .find_related(entities::History)
        .order_by_desc(history::Column::Date)
        .all(db)
        .await?;
    with_service_types(db, histories).await
}

async fn with_service_types(
    db: &DatabaseConnection,
    histories: Vec<history::Model>,
) -> Result<Vec<HistoryWithService>, VetError> {
    let services = histories.load_one(entities::ServiceType, db).await?;

    histories
        .into_iter()
        .zip(services)
        .map(|(history, service_type)| match service_type {
            Some(service_type) => Ok(HistoryWithService {
                history,
                service_type,
            }),
            None => Err(dangling("History", history.id, "service type")),
        })
        .collect()
}

pub async fn get_owner_details(
    db: &DatabaseConnection,
    id: i32,
) -> Result<Option<OwnerDetails>, VetError> {
    let Some((owner, user)) = get_owner_with_user(db, id).await? else {
        return Ok(None);
    };
    let pets = owner
        .find_related(entities::Pet)
        .order_by_asc(pet::Column::Name)
        .all(db)
        .await?;
    let pets = with_pet_types(db, pets).await?;

    Ok(Some(OwnerDetails { owner, user, pets }))
}

/// Owner whose login matches `email` (case-insensitive), with pets, pet
/// types, histories and service types. `None` when no owner matches.
pub async fn find_owner_by_email(
    db: &DatabaseConnection,
    email: &str,
) -> Result<Option<OwnerAggregate>, VetError> {
    let Some(user) = get_user_by_username(db, email).await? else {
        return Ok(None);
    };
    let Some(owner) = user.find_related(entities::Owner).one(db).await? else {
        return Ok(None);
    };

    let pets = owner
        .find_related(entities::Pet)
        .order_by_asc(pet::Column::Name)
        .all(db)
        .await?;

    // One query for every pet's histories and one for their service types.
    let grouped = pets.load_many(entities::History, db).await?;
    let mut counts = Vec::with_capacity(grouped.len());
    let mut all_histories = Vec::new();
    for mut histories in grouped {
        histories.sort_by(|a, b| b.date.cmp(&a.date));
        counts.push(histories.len());
        all_histories.extend(histories);
    }
    let mut loaded = with_service_types(db, all_histories).await?.into_iter();

    let aggregates = with_pet_types(db, pets)
        .await?
        .into_iter()
        .zip(counts)
        .map(|(PetWithType { pet, pet_type }, count)| PetAggregate {
            pet,
            pet_type,
            histories: loaded.by_ref().take(count).collect(),
        })
        .collect();

    Ok(Some(OwnerAggregate {
        owner,
        user,
        pets: aggregates,
    }))
}

pub async fn update_owner(
    db: &DatabaseConnection,
    id: i32,
    profile: UserProfile,
) -> Result<user::Model, VetError> {
    let owner = get_owner(db, id)
        .await?
        .ok_or_else(|| VetError::not_found("Owner", id))?;

    let active = user::ActiveModel {
        id: Unchanged(owner.user_id),
        first_name: Set(profile.first_name),
        last_name: Set(profile.last_name),
        document: Set(profile.document),
        address: Set(profile.address),
        phone_number: Set(profile.phone_number),
        ..Default::default()
    };

    match active.update(db).await {
        Ok(user) => {
            tracing::info!(owner_id = id, "Updated owner");
            Ok(user)
        }
        Err(err) => Err(settle_update_conflict::<entities::Owner>(db, id, err, "Owner").await),
    }
}

/// Delete an owner and its login. Owners with pets or booked agenda slots
/// are refused.
pub async fn delete_owner(db: &DatabaseConnection, id: i32) -> Result<(), VetError> {
    let owner = get_owner(db, id)
        .await?
        .ok_or_else(|| VetError::not_found("Owner", id))?;

    if owner.find_related(entities::Pet).count(db).await? > 0 {
        return Err(VetError::Validation(
            "The owner can't be deleted because it has pets.".to_string(),
        ));
    }
    if owner.find_related(entities::Agenda).count(db).await? > 0 {
        return Err(VetError::Validation(
            "The owner can't be deleted because it has appointments.".to_string(),
        ));
    }

    let user_id = owner.user_id;
    owner.delete(db).await?;

    entities::Session::delete_many()
        .filter(session::Column::UserId.eq(user_id))
        .exec(db)
        .await?;
    entities::ApiToken::delete_many()
        .filter(api_token::Column::UserId.eq(user_id))
        .exec(db)
        .await?;
    entities::User::delete_by_id(user_id).exec(db).await?;

    tracing::info!(owner_id = id, user_id, "Deleted owner");
    Ok(())
}

// Pet functions

pub async fn get_pet(db: &DatabaseConnection, id: i32) -> Result<Option<pet::Model>, VetError> {
    Ok(entities::Pet::find_by_id(id).one(db).await?)
}

pub async fn get_pet_details(
    db: &DatabaseConnection,
    id: i32,
) -> Result<Option<PetDetails>, VetError> {
    let Some((pet, pet_type)) = entities::Pet::find_by_id(id)
        .find_also_related(entities::PetType)
        .one(db)
        .await?
    else {
        return Ok(None);
    };
    let pet_type = pet_type.ok_or_else(|| dangling("Pet", pet.id, "pet type"))?;
    let (owner, user) = get_owner_with_user(db, pet.owner_id)
        .await?
        .ok_or_else(|| dangling("Pet", pet.id, "owner"))?;
    let histories = histories_of(db, &pet).await?;

    Ok(Some(PetDetails {
        pet,
        pet_type,
        owner,
        user,
        histories,
    }))
}

pub async fn insert_pet(
    db: &DatabaseConnection,
    active: pet::ActiveModel,
) -> Result<pet::Model, VetError> {
    let pet = active.insert(db).await?;
    tracing::info!(pet_id = pet.id, owner_id = pet.owner_id, "Created pet");
    Ok(pet)
}

pub async fn update_pet(
    db: &DatabaseConnection,
    id: i32,
    active: pet::ActiveModel,
) -> Result<pet::Model, VetError> {
    match active.update(db).await {
        Ok(pet) => {
            tracing::info!(pet_id = id, "Updated pet");
            Ok(pet)
        }
        Err(err) => Err(settle_update_conflict::<entities::Pet>(db, id, err, "Pet").await),
    }
}

/// Delete a pet without histories or appointments; returns its owner id.
pub async fn delete_pet(db: &DatabaseConnection, id: i32) -> Result<pet::Model, VetError> {
    let pet = get_pet(db, id)
        .await?
        .ok_or_else(|| VetError::not_found("Pet", id))?;

    if pet.find_related(entities::History).count(db).await? > 0 {
        return Err(VetError::Validation(
            "The pet can't be deleted because it has history records.".to_string(),
        ));
    }
    if pet.find_related(entities::Agenda).count(db).await? > 0 {
        return Err(VetError::Validation(
            "The pet can't be deleted because it has appointments.".to_string(),
        ));
    }

    pet.clone().delete(db).await?;
    tracing::info!(pet_id = id, owner_id = pet.owner_id, "Deleted pet");
    Ok(pet)
}

// Pet type and service type catalogs

fn validate_catalog_name(name: &str) -> Result<String, VetError> {
    let mut errors = Vec::new();
    check_required("Name", name, NAME_MAX_LEN, &mut errors);
    match errors.into_iter().next() {
        Some(message) => Err(VetError::Validation(message)),
        None => Ok(name.trim().to_string()),
    }
}

fn duplicate_name(kind: &str, name: &str) -> VetError {
    VetError::Validation(format!("There is already a {kind} named {name}."))
}

fn map_unique_violation(err: DbErr, kind: &str, name: &str) -> VetError {
    match err.sql_err() {
        Some(sea_orm::SqlErr::UniqueConstraintViolation(_)) => duplicate_name(kind, name),
        _ => err.into(),
    }
}

pub async fn list_pet_types(db: &DatabaseConnection) -> Result<Vec<pet_type::Model>, VetError> {
    Ok(entities::PetType::find()
        .order_by_asc(pet_type::Column::Name)
        .all(db)
        .await?)
}

pub async fn get_pet_type(
    db: &DatabaseConnection,
    id: i32,
) -> Result<Option<pet_type::Model>, VetError> {
    Ok(entities::PetType::find_by_id(id).one(db).await?)
}

async fn pet_type_name_taken(
    db: &DatabaseConnection,
    name: &str,
    except: Option<i32>,
) -> Result<bool, VetError> {
    let mut query = entities::PetType::find().filter(pet_type::Column::Name.eq(name));
    if let Some(id) = except {
        query = query.filter(pet_type::Column::Id.ne(id));
    }
    Ok(query.count(db).await? > 0)
}

pub async fn create_pet_type(
    db: &DatabaseConnection,
    name: &str,
) -> Result<pet_type::Model, VetError> {
    let name = validate_catalog_name(name)?;
    if pet_type_name_taken(db, &name, None).await? {
        return Err(duplicate_name("pet type", &name));
    }

    pet_type::ActiveModel {
        name: Set(name.clone()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(|e| map_unique_violation(e, "pet type", &name))
}

pub async fn update_pet_type(
    db: &DatabaseConnection,
    id: i32,
    name: &str,
) -> Result<pet_type::Model, VetError> {
    let name = validate_catalog_name(name)?;
    if pet_type_name_taken(db, &name, Some(id)).await? {
        return Err(duplicate_name("pet type", &name));
    }

    let active = pet_type::ActiveModel {
        id: Unchanged(id),
        name: Set(name.clone()),
    };
    match active.update(db).await {
        Ok(model) => Ok(model),
        Err(err @ DbErr::RecordNotUpdated) => {
            Err(settle_update_conflict::<entities::PetType>(db, id, err, "Pet type").await)
        }
        Err(err) => Err(map_unique_violation(err, "pet type", &name)),
    }
}

pub async fn delete_pet_type(db: &DatabaseConnection, id: i32) -> Result<(), VetError> {
    let pet_type = get_pet_type(db, id)
        .await?
        .ok_or_else(|| VetError::not_found("Pet type", id))?;

    if pet_type.find_related(entities::Pet).count(db).await? > 0 {
        return Err(VetError::Validation(
            "The pet type can't be deleted because it has related records.".to_string(),
        ));
    }

    pet_type.delete(db).await?;
    Ok(())
}

pub async fn list_service_types(
    db: &DatabaseConnection,
) -> Result<Vec<service_type::Model>, VetError> {
    Ok(entities::ServiceType::find()
        .order_by_asc(service_type::Column::Name)
        .all(db)
        .await?)
}

pub async fn get_service_type(
    db: &DatabaseConnection,
    id: i32,
) -> Result<Option<service_type::Model>, VetError> {
    Ok(entities::ServiceType::find_by_id(id).one(db).await?)
}

async fn service_type_name_taken(
    db: &DatabaseConnection,
    name: &str,
    except: Option<i32>,
) -> Result<bool, VetError> {
    let mut query = entities::ServiceType::find().filter(service_type::Column::Name.eq(name));
    if let Some(id) = except {
        query = query.filter(service_type::Column::Id.ne(id));
    }
    Ok(query.count(db).await? > 0)
}

pub async fn create_service_type(
    db: &DatabaseConnection,
    name: &str,
) -> Result<service_type::Model, VetError> {
    let name = validate_catalog_name(name)?;
    if service_type_name_taken(db, &name, None).await? {
        return Err(duplicate_name("service type", &name));
    }

    service_type::ActiveModel {
        name: Set(name.clone()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(|e| map_unique_violation(e, "service type", &name))
}

pub async fn update_service_type(
    db: &DatabaseConnection,
    id: i32,
    name: &str,
) -> Result<service_type::Model, VetError> {
    let name = validate_catalog_name(name)?;
    if service_type_name_taken(db, &name, Some(id)).await? {
        return Err(duplicate_name("service type", &name));
    }

    let active = service_type::ActiveModel {
        id: Unchanged(id),
        name: Set(name.clone()),
    };
    match active.update(db).await {
        Ok(model) => Ok(model),
        Err(err @ DbErr::RecordNotUpdated) => Err(settle_update_conflict::<entities::ServiceType>(
            db,
            id,
            err,
            "Service type",
        )
        .await),
        Err(err) => Err(map_unique_violation(err, "service type", &name)),
    }
}

pub async fn delete_service_type(db: &DatabaseConnection, id: i32) -> Result<(), VetError> {
    let service_type = get_service_type(db, id)
        .await?
        .ok_or_else(|| VetError::not_found("Service type", id))?;

    if service_type
        .find_related(entities::History)
        .count(db)
        .await?
        > 0
    {
        return Err(VetError::Validation(
            "The service type can't be deleted because it has related records.".to_string(),
        ));
    }

    service_type.delete(db).await?;
    Ok(())
}

// History functions

pub async fn get_history(
    db: &DatabaseConnection,
    id: i32,
) -> Result<Option<history::Model>, VetError> {
    Ok(entities::History::find_by_id(id).one(db).await?)
}

pub async fn insert_history(
    db: &DatabaseConnection,
    active: history::ActiveModel,
) -> Result<history::Model, VetError> {
    let history = active.insert(db).await?;
    tracing::info!(history_id = history.id, pet_id = history.pet_id, "Created history");
    Ok(history)
}

pub async fn update_history(
    db: &DatabaseConnection,
    id: i32,
    active: history::ActiveModel,
) -> Result<history::Model, VetError> {
    match active.update(db).await {
        Ok(history) => Ok(history),
        Err(err) => Err(settle_update_conflict::<entities::History>(db, id, err, "History").await),
    }
}

/// Returns the pet the deleted history belonged to.
pub async fn delete_history(db: &DatabaseConnection, id: i32) -> Result<i32, VetError> {
    let history = get_history(db, id)
        .await?
        .ok_or_else(|| VetError::not_found("History", id))?;
    let pet_id = history.pet_id;
    history.delete(db).await?;
    tracing::info!(history_id = id, pet_id, "Deleted history");
    Ok(pet_id)
}

// Agenda functions

pub async fn get_agenda(
    db: &DatabaseConnection,
    id: i32,
) -> Result<Option<agenda::Model>, VetError> {
    Ok(entities::Agenda::find_by_id(id).one(db).await?)
}

/// Slots starting at or after `from`, earliest first.
pub async fn list_agenda(
    db: &DatabaseConnection,
    from: DateTime<Utc>,
) -> Result<Vec<AgendaEntry>, VetError> {
    let slots = entities::Agenda::find()
        .filter(agenda::Column::Date.gte(from.timestamp()))
        .order_by_asc(agenda::Column::Date)
        .all(db)
        .await?;

    let owner_ids: HashSet<i32> = slots.iter().filter_map(|s| s.owner_id).collect();
    let pet_ids: HashSet<i32> = slots.iter().filter_map(|s| s.pet_id).collect();

    let owners = entities::Owner::find()
        .filter(owner::Column::Id.is_in(owner_ids))
        .find_also_related(entities::User)
        .all(db)
        .await?;
    let owners: HashMap<i32, user::Model> = owners
        .into_iter()
        .filter_map(|(owner, user)| user.map(|u| (owner.id, u)))
        .collect();

    let pets: HashMap<i32, pet::Model> = entities::Pet::find()
        .filter(pet::Column::Id.is_in(pet_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    Ok(slots
        .into_iter()
        .map(|agenda| AgendaEntry {
            owner: agenda.owner_id.and_then(|id| owners.get(&id).cloned()),
            pet: agenda.pet_id.and_then(|id| pets.get(&id).cloned()),
            agenda,
        })
        .collect())
}

pub async fn latest_agenda_date(db: &DatabaseConnection) -> Result<Option<i64>, VetError> {
    Ok(entities::Agenda::find()
        .order_by_desc(agenda::Column::Date)
        .one(db)
        .await?
        .map(|a| a.date))
}

/// Insert available slots, skipping instants that already have one.
/// Returns the number of slots created.
pub async fn add_agenda_slots(
    db: &DatabaseConnection,
    slots: &[DateTime<Utc>],
) -> Result<u64, VetError> {
    if slots.is_empty() {
        return Ok(0);
    }

    let wanted: Vec<i64> = slots.iter().map(|s| s.timestamp()).collect();
    let existing: HashSet<i64> = entities::Agenda::find()
        .filter(agenda::Column::Date.is_in(wanted.clone()))
        .all(db)
        .await?
        .into_iter()
        .map(|a| a.date)
        .collect();

    let mut seen = HashSet::new();
    let fresh: Vec<agenda::ActiveModel> = wanted
        .into_iter()
        .filter(|ts| !existing.contains(ts) && seen.insert(*ts))
        .map(|ts| agenda::ActiveModel {
            date: Set(ts),
            remarks: Set(None),
            is_available: Set(true),
            owner_id: Set(None),
            pet_id: Set(None),
            ..Default::default()
        })
        .collect();

    let created = fresh.len() as u64;
    if created > 0 {
        entities::Agenda::insert_many(fresh).exec(db).await?;
    }
    tracing::info!(created, "Added agenda slots");
    Ok(created)
}

/// Book an available slot for `pet_id`, which must belong to `owner_id`.
pub async fn assign_agenda(
    db: &DatabaseConnection,
    id: i32,
    owner_id: i32,
    pet_id: i32,
    remarks: Option<String>,
) -> Result<agenda::Model, VetError> {
    let slot = get_agenda(db, id)
        .await?
        .ok_or_else(|| VetError::not_found("Agenda", id))?;
    if !slot.is_available {
        return Err(VetError::Validation(
            "This appointment slot is already taken.".to_string(),
        ));
    }

    get_owner(db, owner_id)
        .await?
        .ok_or_else(|| VetError::not_found("Owner", owner_id))?;
    let pet = get_pet(db, pet_id)
        .await?
        .ok_or_else(|| VetError::not_found("Pet", pet_id))?;
    if pet.owner_id != owner_id {
        return Err(VetError::Validation(
            "The selected pet does not belong to the selected owner.".to_string(),
        ));
    }

    let mut active: agenda::ActiveModel = slot.into();
    active.is_available = Set(false);
    active.owner_id = Set(Some(owner_id));
    active.pet_id = Set(Some(pet_id));
    active.remarks = Set(remarks);

    match active.update(db).await {
        Ok(model) => {
            tracing::info!(agenda_id = id, owner_id, pet_id, "Assigned appointment");
            Ok(model)
        }
        Err(err) => Err(settle_update_conflict::<entities::Agenda>(db, id, err, "Agenda").await),
    }
}

pub async fn unassign_agenda(db: &DatabaseConnection, id: i32) -> Result<agenda::Model, VetError> {
    let slot = get_agenda(db, id)
        .await?
        .ok_or_else(|| VetError::not_found("Agenda", id))?;

    let mut active: agenda::ActiveModel = slot.into();
    active.is_available = Set(true);
    active.owner_id = Set(None);
    active.pet_id = Set(None);
    active.remarks = Set(None);

    match active.update(db).await {
        Ok(model) => {
            tracing::info!(agenda_id = id, "Released appointment");
            Ok(model)
        }
        Err(err) => Err(settle_update_conflict::<entities::Agenda>(db, id, err, "Agenda").await),
    }
}
