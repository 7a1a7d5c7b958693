//! `PostgreSQL` adapters for apps and processes.

mod models;
mod process;
mod schema;
mod webapp;

pub use process::PostgresProcessRepository;
pub use webapp::PostgresWebAppRepository;
