//! Application services for hosted apps.

mod site_config;
mod webapp;

pub use site_config::{SiteConfigError, app_root, render_site_config};
pub use webapp::{
    CREATE_WEBAPP_JOB_TYPE, CreateWebAppHandler, CreateWebAppPayload, CreateWebAppRequest,
    WebAppService, WebAppServiceError, WebAppServiceResult,
};
