//! Device identity, eligibility and the directory collaborator

pub mod compat;
pub mod directory;
