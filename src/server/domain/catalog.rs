//! Fixed, ordered catalog of provisioning steps.
//!
//! The catalog is the source of truth for which components a server install
//! consists of and in what order they run. Entries marked required block
//! phase completion when they fail; optional entries are best-effort and
//! follow the tenant's stack selection.

use super::{ProvisioningStep, ServerId, StackSelection, StepCategory};
use chrono::{DateTime, Utc};

/// One catalog entry describing an installable component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Step type tag; doubles as the remote job type.
    pub step_type: &'static str,
    /// Catalog category.
    pub category: StepCategory,
    /// Whether failure blocks phase completion.
    pub is_required: bool,
    /// Whether tenants get this step without opting in.
    pub is_default: bool,
}

/// The standard catalog, in execution order.
///
/// `provision_nodejs` is the only non-default entry; tenants opt into it
/// through their stack selection.
pub const STANDARD_CATALOG: &[CatalogEntry] = &[
    CatalogEntry {
        step_type: "system_update",
        category: StepCategory::System,
        is_required: true,
        is_default: true,
    },
    CatalogEntry {
        step_type: "provision_firewall",
        category: StepCategory::System,
        is_required: true,
        is_default: true,
    },
    CatalogEntry {
        step_type: "provision_nginx",
        category: StepCategory::WebServer,
        is_required: true,
        is_default: true,
    },
    CatalogEntry {
        step_type: "provision_php",
        category: StepCategory::Php,
        is_required: true,
        is_default: true,
    },
    CatalogEntry {
        step_type: "provision_composer",
        category: StepCategory::Php,
        is_required: false,
        is_default: true,
    },
    CatalogEntry {
        step_type: "provision_database",
        category: StepCategory::Database,
        is_required: true,
        is_default: true,
    },
    CatalogEntry {
        step_type: "provision_redis",
        category: StepCategory::Cache,
        is_required: false,
        is_default: true,
    },
    CatalogEntry {
        step_type: "provision_supervisor",
        category: StepCategory::Supervisor,
        is_required: false,
        is_default: true,
    },
    CatalogEntry {
        step_type: "provision_nodejs",
        category: StepCategory::Runtime,
        is_required: false,
        is_default: false,
    },
];

/// Returns the catalog entries applicable to a stack selection, in order.
#[must_use]
pub fn applicable_entries(stack: &StackSelection) -> Vec<CatalogEntry> {
    STANDARD_CATALOG
        .iter()
        .filter(|entry| entry.is_required || stack.wants(entry.step_type, entry.is_default))
        .copied()
        .collect()
}

/// Instantiates pending steps for a server from its stack selection, in
/// catalog order.
#[must_use]
pub fn steps_for_server(
    server_id: ServerId,
    stack: &StackSelection,
    now: DateTime<Utc>,
) -> Vec<ProvisioningStep> {
    applicable_entries(stack)
        .into_iter()
        .enumerate()
        .map(|(position, entry)| {
            let order = i16::try_from(position).unwrap_or(i16::MAX);
            ProvisioningStep::new(
                server_id,
                entry.step_type,
                entry.category,
                order,
                entry.is_required,
                now,
            )
        })
        .collect()
}

/// Returns the catalog entry for a step type, if it exists.
#[must_use]
pub fn entry_for(step_type: &str) -> Option<&'static CatalogEntry> {
    STANDARD_CATALOG
        .iter()
        .find(|entry| entry.step_type == step_type)
}
