#![allow(dead_code)]

pub mod app;
pub mod builders;
pub mod db;

pub use app::{body_string, location, TestApp, PUBLIC_BASE_URL};
pub use builders::{HistoryBuilder, OwnerBuilder, PetBuilder};
pub use db::{seed_pet_type, seed_service_type, seed_session_cookie, TestDb};
