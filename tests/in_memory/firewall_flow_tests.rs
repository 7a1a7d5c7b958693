//! Confirm-or-rollback lifecycle tests for firewall rules applied against a
//! registered agent.

use crate::in_memory::helpers::{BoxError, Stack, register_agent, runtime, stack};
use chrono::Duration;
use fleetward::events::DomainEvent;
use fleetward::firewall::domain::{Direction, PortSpec, RuleAction, RuleProtocol};
use fleetward::firewall::services::ApplyRuleRequest;
use fleetward::protocol::ProtocolError;
use rstest::rstest;
use std::io;
use tokio::runtime::Runtime;

/// A scoped allow rule needs no confirmation and goes straight to the agent.
#[rstest]
fn safe_rule_applies_without_a_ticket(
    runtime: io::Result<Runtime>,
    stack: Result<Stack, BoxError>,
) -> Result<(), BoxError> {
    let rt = runtime?;
    let stack = stack?;
    let (server_id, tenant_id, token) = register_agent(&rt, &stack, "edge-01")?;

    let applied = rt.block_on(stack.firewall.apply(
        ApplyRuleRequest::new(server_id, tenant_id, Direction::Inbound, RuleAction::Allow)
            .with_protocol(RuleProtocol::Tcp)
            .with_port_spec(PortSpec::Single(443)),
    ))?;
    assert!(applied.confirmation.is_none());
    assert!(applied.rule.is_active());

    let batch = rt.block_on(stack.gateway.fetch_jobs(&token))?;
    assert_eq!(batch.jobs.len(), 1);
    assert!(
        batch
            .jobs
            .first()
            .is_some_and(|job| job.job_type == "firewall_apply")
    );
    Ok(())
}

/// A rule that would cut off management access stays conditional until the
/// operator confirms it through the gateway.
#[rstest]
fn risky_rule_survives_when_confirmed_in_time(
    runtime: io::Result<Runtime>,
    stack: Result<Stack, BoxError>,
) -> Result<(), BoxError> {
    let rt = runtime?;
    let stack = stack?;
    let (server_id, tenant_id, _token) = register_agent(&rt, &stack, "edge-02")?;

    let applied = rt.block_on(stack.firewall.apply(
        ApplyRuleRequest::new(server_id, tenant_id, Direction::Inbound, RuleAction::Deny)
            .with_protocol(RuleProtocol::Tcp)
            .with_port_spec(PortSpec::Single(22)),
    ))?;
    let ticket = applied.confirmation.ok_or("expected a confirmation ticket")?;
    assert!(applied.rule.is_pending_confirmation());

    stack.clock.advance(Duration::seconds(60));
    let confirmed = rt.block_on(stack.gateway.confirm_firewall(&ticket.token))?;
    assert_eq!(confirmed.status, "confirmed");
    assert_eq!(confirmed.rule_id, applied.rule.id());

    // The token resolves exactly once.
    let replay = rt.block_on(stack.gateway.confirm_firewall(&ticket.token));
    assert!(matches!(replay, Err(ProtocolError::UnknownToken)));

    // The sweep finds nothing to roll back afterwards.
    stack.clock.advance(Duration::seconds(600));
    let rolled_back = rt.block_on(stack.firewall.sweep())?;
    assert!(rolled_back.is_empty());
    Ok(())
}

/// An unconfirmed risky rule is rolled back by the sweep and a revert job is
/// queued for the agent.
#[rstest]
fn unconfirmed_rule_rolls_back_after_the_window(
    runtime: io::Result<Runtime>,
    stack: Result<Stack, BoxError>,
) -> Result<(), BoxError> {
    let rt = runtime?;
    let stack = stack?;
    let (server_id, tenant_id, token) = register_agent(&rt, &stack, "edge-03")?;

    let applied = rt.block_on(stack.firewall.apply(ApplyRuleRequest::new(
        server_id,
        tenant_id,
        Direction::Inbound,
        RuleAction::Deny,
    )))?;
    let ticket = applied.confirmation.ok_or("expected a confirmation ticket")?;

    stack.clock.advance(Duration::seconds(301));
    let rolled_back = rt.block_on(stack.firewall.sweep())?;
    assert_eq!(rolled_back.len(), 1);
    let rule = rolled_back.first().ok_or("rolled-back rule missing")?;
    assert!(!rule.is_active());
    assert!(rule.rollback_reason().is_some_and(|r| r.contains("expired")));

    // Confirmation after rollback resolves nothing.
    let late = rt.block_on(stack.gateway.confirm_firewall(&ticket.token));
    assert!(matches!(late, Err(ProtocolError::UnknownToken)));

    let batch = rt.block_on(stack.gateway.fetch_jobs(&token))?;
    let types: Vec<&str> = batch.jobs.iter().map(|job| job.job_type.as_str()).collect();
    assert!(types.contains(&"firewall_apply"));
    assert!(types.contains(&"firewall_revert"));

    let rollbacks = stack
        .events
        .snapshot()
        .iter()
        .filter(|event| matches!(event, DomainEvent::FirewallRuleRolledBack { .. }))
        .count();
    assert_eq!(rollbacks, 1);
    Ok(())
}
