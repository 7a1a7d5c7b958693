//! Application services for managed servers.

mod handlers;
mod provisioning;
mod reconciler;
mod registration;

pub use handlers::{SERVICE_INSTALL_JOB_TYPE, ServiceInstallHandler, ServiceInstallPayload};
pub use provisioning::{
    ProvisioningError, ProvisioningResult, ProvisioningService, StepCompletionHandler,
    register_step_handlers,
};
pub use reconciler::{HeartbeatReconciler, ReconcileError, ReconcileResult};
pub use registration::{
    AgentCredentials, CreateServerRequest, DEFAULT_PROVISION_TOKEN_TTL_HOURS, NewServer,
    RegistrationError, RegistrationFacts, RegistrationResult, RegistrationService,
};
