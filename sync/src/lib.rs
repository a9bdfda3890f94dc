//! resin-sync library
//!
//! Syncs local source trees into application containers on remote devices
//! and manages the container engine on those devices.

pub mod device;
pub mod docker;
pub mod errors;
pub mod filesys;
pub mod http;
pub mod logs;
pub mod remote;
pub mod storage;
pub mod sync;
pub mod utils;
