//! Application services for the firewall safety net.

mod safety;

pub use safety::{
    APPLY_JOB_TYPE, AppliedRule, ApplyRuleRequest, ConfirmationTicket,
    DEFAULT_CONFIRMATION_TIMEOUT_SECS, FirewallError, FirewallResult, FirewallSafetyService,
    REVERT_JOB_TYPE,
};
