use crate::firewall::domain::{
    Direction, FirewallDomainError, FirewallRule, PortSpec, RuleAction, RuleProtocol, RuleSource,
};
use crate::server::domain::{ServerId, TenantId};
use crate::test_support::TestClock;
use chrono::Duration;
use rstest::rstest;

fn rule(
    action: RuleAction,
    direction: Direction,
    port_spec: PortSpec,
    source: RuleSource,
) -> FirewallRule {
    let clock = TestClock::fixed();
    FirewallRule::new(
        ServerId::new(),
        TenantId::new(),
        direction,
        action,
        RuleProtocol::Tcp,
        port_spec,
        source,
        0,
        clock.now(),
    )
}

#[rstest]
#[case::deny_ssh(RuleAction::Deny, PortSpec::Single(22), RuleSource::Address("10.0.0.0/8".to_owned()), true)]
#[case::deny_alternate_ssh(RuleAction::Deny, PortSpec::Single(2222), RuleSource::Address("10.0.0.0/8".to_owned()), true)]
#[case::deny_range_over_ssh(RuleAction::Deny, PortSpec::Range(20, 25), RuleSource::Address("10.0.0.0/8".to_owned()), true)]
#[case::deny_unrestricted_source(RuleAction::Deny, PortSpec::Single(8080), RuleSource::Any, true)]
#[case::deny_scoped_web_port(RuleAction::Deny, PortSpec::Single(8080), RuleSource::Address("203.0.113.9".to_owned()), false)]
#[case::allow_anything(RuleAction::Allow, PortSpec::Any, RuleSource::Any, false)]
fn confirmation_decision(
    #[case] action: RuleAction,
    #[case] port_spec: PortSpec,
    #[case] source: RuleSource,
    #[case] expected: bool,
) {
    let rule = rule(action, Direction::Inbound, port_spec, source);
    assert_eq!(rule.requires_confirmation(), expected);
}

#[test]
fn deny_all_inbound_requires_confirmation() {
    let rule = rule(
        RuleAction::Deny,
        Direction::Inbound,
        PortSpec::Any,
        RuleSource::Any,
    );
    assert!(rule.requires_confirmation());
}

#[test]
fn pending_rule_stays_active_during_the_window() {
    let clock = TestClock::fixed();
    let mut rule = rule(
        RuleAction::Deny,
        Direction::Inbound,
        PortSpec::Single(22),
        RuleSource::Any,
    );
    rule.mark_pending_confirmation(
        "digest",
        clock.now() + Duration::seconds(300),
        clock.now(),
    );
    assert!(rule.is_active());
    assert!(rule.is_pending_confirmation());
    assert!(!rule.is_confirmation_expired(clock.now() + Duration::seconds(299)));
    assert!(rule.is_confirmation_expired(clock.now() + Duration::seconds(301)));
}

#[test]
fn confirm_clears_pending_state() {
    let clock = TestClock::fixed();
    let mut rule = rule(
        RuleAction::Deny,
        Direction::Inbound,
        PortSpec::Single(22),
        RuleSource::Any,
    );
    rule.mark_pending_confirmation(
        "digest",
        clock.now() + Duration::seconds(300),
        clock.now(),
    );
    rule.confirm(clock.now()).expect("confirm");
    assert!(rule.is_active());
    assert!(!rule.is_pending_confirmation());
    assert_eq!(rule.confirmation_token_digest(), None);
    assert_eq!(rule.confirmation_expires_at(), None);
}

#[test]
fn confirm_without_pending_state_is_rejected() {
    let clock = TestClock::fixed();
    let mut rule = rule(
        RuleAction::Allow,
        Direction::Inbound,
        PortSpec::Any,
        RuleSource::Any,
    );
    let err = rule.confirm(clock.now()).expect_err("nothing pending");
    assert!(matches!(err, FirewallDomainError::NotPendingConfirmation(_)));
}

#[test]
fn roll_back_deactivates_exactly_once() {
    let clock = TestClock::fixed();
    let mut rule = rule(
        RuleAction::Deny,
        Direction::Inbound,
        PortSpec::Single(22),
        RuleSource::Any,
    );
    rule.mark_pending_confirmation(
        "digest",
        clock.now() + Duration::seconds(300),
        clock.now(),
    );

    rule.roll_back("window expired", clock.now())
        .expect("first rollback");
    assert!(!rule.is_active());
    assert!(!rule.is_pending_confirmation());
    assert_eq!(rule.rollback_reason(), Some("window expired"));
    assert_eq!(rule.rolled_back_at(), Some(clock.now()));

    let err = rule
        .roll_back("late duplicate", clock.now())
        .expect_err("second rollback");
    assert!(matches!(err, FirewallDomainError::AlreadyRolledBack(_)));
    assert_eq!(rule.rollback_reason(), Some("window expired"));
}

#[test]
fn port_range_validation_rejects_inverted_bounds() {
    assert!(PortSpec::range(25, 20).is_err());
    let spec = PortSpec::range(20, 25).expect("valid range");
    assert!(spec.contains(22));
    assert!(!spec.contains(26));
}
