pub mod api;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod jobs;
pub mod messaging;
pub mod models;
pub mod observability;
pub mod realtime;
pub mod state;
pub mod tracking;
