//! Device directory API models

pub mod models;
