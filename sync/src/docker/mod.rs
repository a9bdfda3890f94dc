//! Remote container engine management

pub mod client;
pub mod env;
pub mod outcome;
pub mod policy;
pub mod progress;
pub mod rootfs;
