//! Domain model for hosted web apps and supervised processes.

mod app;
mod error;
mod ids;
mod process;

pub use app::{AppRuntime, PersistedWebAppData, WebApp, WebAppStatus};
pub use error::{
    AppDomainError, ParseAppRuntimeError, ParseProcessStatusError, ParseWebAppStatusError,
};
pub use ids::{AppId, ProcessId};
pub use process::{AppProcess, PersistedProcessData, ProcessStatus};
