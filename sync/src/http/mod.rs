//! Device directory API client

pub mod client;
pub mod devices;
