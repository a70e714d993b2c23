//! Fetch orchestration for Terra: list, detail and border fetches routed
//! through the keyed cache into the country repository.

pub mod orchestrator;
pub mod status;

pub use orchestrator::FetchOrchestrator;
pub use status::{FetchPhase, FetchStatus, RequestShape};
