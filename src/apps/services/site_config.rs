//! Server-config rendering for hosted apps.
//!
//! The control plane generates the web server's site configuration and
//! ships it inside the creation job payload; the agent only writes it to
//! disk and reloads.

use crate::apps::domain::{AppId, AppRuntime, WebApp};
use minijinja::Environment;
use serde_json::{Map, Value};
use thiserror::Error;

const PHP_SITE_TEMPLATE: &str = r"server {
    listen 80;
    server_name {{ domain }};
    root {{ app_root }}/public;
    index index.php index.html;

    location / {
        try_files $uri $uri/ /index.php?$query_string;
    }

    location ~ \.php$ {
        include fastcgi_params;
        fastcgi_pass unix:/run/php/php-fpm-{{ system_user }}.sock;
        fastcgi_param SCRIPT_FILENAME $document_root$fastcgi_script_name;
    }
}
";

const NODE_SITE_TEMPLATE: &str = r"server {
    listen 80;
    server_name {{ domain }};

    location / {
        proxy_pass http://127.0.0.1:{{ port }};
        proxy_http_version 1.1;
        proxy_set_header Upgrade $http_upgrade;
        proxy_set_header Connection 'upgrade';
        proxy_set_header Host $host;
        proxy_cache_bypass $http_upgrade;
    }
}
";

/// Errors raised while rendering a site configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SiteConfigError {
    /// A Node app reached rendering without an allocated port.
    #[error("app {0} has no allocated port")]
    MissingPort(AppId),

    /// Template rendering failed.
    #[error("failed to render site config for '{domain}': {reason}")]
    Render {
        /// Site domain being rendered.
        domain: String,
        /// Renderer error text.
        reason: String,
    },
}

/// Returns the on-server root directory for an app.
#[must_use]
pub fn app_root(app: &WebApp) -> String {
    format!("/home/{}/{}", app.system_user(), app.domain())
}

/// Renders the web server site block for an app.
///
/// # Errors
///
/// Returns [`SiteConfigError::MissingPort`] for a Node app without a port
/// and [`SiteConfigError::Render`] when the template fails to render.
pub fn render_site_config(app: &WebApp) -> Result<String, SiteConfigError> {
    let mut context = Map::new();
    context.insert("domain".to_owned(), Value::String(app.domain().to_owned()));
    context.insert(
        "system_user".to_owned(),
        Value::String(app.system_user().to_owned()),
    );
    context.insert("app_root".to_owned(), Value::String(app_root(app)));

    let template = match app.runtime() {
        AppRuntime::Php => PHP_SITE_TEMPLATE,
        AppRuntime::Node => {
            let port = app.port().ok_or(SiteConfigError::MissingPort(app.id()))?;
            context.insert("port".to_owned(), Value::Number(port.into()));
            NODE_SITE_TEMPLATE
        }
    };

    let environment = Environment::new();
    environment
        .render_str(template, context)
        .map_err(|error| SiteConfigError::Render {
            domain: app.domain().to_owned(),
            reason: error.to_string(),
        })
}
