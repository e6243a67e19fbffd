//! Request handling for the tracker API.

pub mod orders;
