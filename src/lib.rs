//! MyVet - veterinary clinic records
//!
//! Owners and their pets, pet and service type catalogs, visit histories and
//! the appointment agenda, served as admin HTML pages plus a small JSON API.
//! All modules are public so the integration tests can drive them.

pub mod agenda;
pub mod combos;
pub mod converter;
pub mod entities;
pub mod errors;
pub mod images;
pub mod session;
pub mod settings;
pub mod storage;
pub mod views;
pub mod web;

#[cfg(test)]
mod test_zone;
