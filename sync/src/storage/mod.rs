//! Local settings storage

pub mod layout;
pub mod settings;
