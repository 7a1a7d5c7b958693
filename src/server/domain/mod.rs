//! Domain model for managed servers, provisioning, and observed state.
//!
//! Aggregates here are pure state machines: the server lifecycle and
//! provisioning phase, the per-component provisioning steps and their
//! catalog, installed-service records, and the value types carried by
//! heartbeat reports. All infrastructure concerns stay outside the domain
//! boundary; clocks are injected and secrets arrive pre-hashed.

pub mod catalog;
mod error;
mod heartbeat;
mod ids;
mod server;
mod service;
mod step;
pub mod token;

pub use error::{
    ParseProvisioningPhaseError, ParseServerStatusError, ParseServiceStatusError,
    ParseStepCategoryError, ParseStepStatusError, ServerDomainError,
};
pub use heartbeat::{
    DaemonObservation, HeartbeatReport, ResourceSample, ServerSpecs, ServiceObservation,
};
pub use ids::{ServerId, ServiceId, StepId, TenantId};
pub use server::{PersistedServerData, ProvisioningPhase, Server, ServerStatus, StackSelection};
pub use service::{PersistedServiceData, Service, ServiceStatus};
pub use step::{PersistedStepData, ProvisioningStep, StepCategory, StepStatus};
