//! Device sync workflow

pub mod fsm;
pub mod orchestrator;
pub mod reporter;
pub mod request;
