pub mod orchestrator;
pub mod sessions;
