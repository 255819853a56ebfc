pub mod agents;
pub mod config;
pub mod db;
pub mod error;
pub mod memory;
pub mod models;
pub mod notify;
pub mod pipeline;
pub mod routes;
pub mod state;
pub mod storage;
pub mod templates;
pub mod traits;
