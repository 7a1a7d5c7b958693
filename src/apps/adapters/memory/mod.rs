//! In-memory adapters for apps and processes.

mod process;
mod webapp;

pub use process::InMemoryProcessRepository;
pub use webapp::InMemoryWebAppRepository;
