pub mod agenda;
pub mod api_token;
pub mod history;
pub mod owner;
pub mod pet;
pub mod pet_type;
pub mod service_type;
pub mod session;
pub mod user;

pub use agenda::Entity as Agenda;
pub use api_token::Entity as ApiToken;
pub use history::Entity as History;
pub use owner::Entity as Owner;
pub use pet::Entity as Pet;
pub use pet_type::Entity as PetType;
pub use service_type::Entity as ServiceType;
pub use session::Entity as Session;
pub use user::Entity as User;

use chrono::{DateTime, Local, Utc};

/// Stored instants are unix seconds in UTC. Out-of-range values clamp to the epoch.
pub fn utc_from_timestamp(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap_or_default()
}

pub fn local_from_timestamp(ts: i64) -> DateTime<Local> {
    utc_from_timestamp(ts).with_timezone(&Local)
}
