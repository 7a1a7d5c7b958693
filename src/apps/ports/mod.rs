//! Persistence ports for the apps module.

mod repository;

pub use repository::{
    ProcessRepository, ProcessRepositoryError, ProcessRepositoryResult, WebAppRepository,
    WebAppRepositoryError, WebAppRepositoryResult,
};
