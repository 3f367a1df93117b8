pub mod candidates;
pub mod catchers;
pub mod config;
pub mod consumer;
pub mod coordinator;
pub mod cors;
pub mod error;
pub mod mem_store;
pub mod pg_store;
pub mod queue;
pub mod results;
pub mod routes;
pub mod snapshot;
pub mod store;
pub mod utils;
pub use shared::{models::*, identity::*};
