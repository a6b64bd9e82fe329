use myvet::entities;
use myvet::storage::{self, Role};
use sea_orm::{Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use tempfile::NamedTempFile;

/// Test database with automatic cleanup
pub struct TestDb {
    connection: DatabaseConnection,
    _temp_file: NamedTempFile,
}

impl TestDb {
    /// Create a new test database with migrations applied
    pub async fn new() -> Self {
        let temp_file = NamedTempFile::new().expect("Failed to create temp file");
        let db_path = temp_file.path().to_str().expect("Invalid temp file path");
        let db_url = format!("sqlite://{}?mode=rwc", db_path);

        let connection = Database::connect(&db_url)
            .await
            .expect("Failed to connect to test database");

        migration::Migrator::up(&connection, None)
            .await
            .expect("Failed to run migrations");

        Self {
            connection,
            _temp_file: temp_file,
        }
    }

    /// Get database connection
    pub fn connection(&self) -> &DatabaseConnection {
        &self.connection
    }
}

pub const ADMIN_USERNAME: &str = "admin@vet.test";
pub const ADMIN_PASSWORD: &str = "admin-pass";

/// Create the administrator account
pub async fn seed_admin(db: &DatabaseConnection) -> entities::user::Model {
    storage::ensure_admin(db, ADMIN_USERNAME, ADMIN_PASSWORD)
        .await
        .expect("Failed to create admin");
    let admin = storage::get_user_by_username(db, ADMIN_USERNAME)
        .await
        .expect("Failed to load admin")
        .expect("Admin exists");
    assert_eq!(Role::parse(&admin.role), Some(Role::Admin));
    admin
}

/// Open a browser session for `user_id` and return its cookie header value
pub async fn seed_session_cookie(db: &DatabaseConnection, user_id: i32) -> String {
    let session = storage::create_session(db, user_id, 3600)
        .await
        .expect("Failed to create session");
    format!("{}={}", myvet::session::SESSION_COOKIE_NAME, session.session_id)
}

pub async fn seed_pet_type(db: &DatabaseConnection, name: &str) -> entities::pet_type::Model {
    storage::create_pet_type(db, name)
        .await
        .expect("Failed to create pet type")
}

pub async fn seed_service_type(
    db: &DatabaseConnection,
    name: &str,
) -> entities::service_type::Model {
    storage::create_service_type(db, name)
        .await
        .expect("Failed to create service type")
}
