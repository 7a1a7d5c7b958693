//! `PostgreSQL` repository implementation for firewall rules.

use super::{
    models::{NewRuleRow, RuleRow},
    schema::firewall_rules,
};
use crate::firewall::domain::{
    Direction, FirewallRule, PersistedRuleData, PortSpec, RuleAction, RuleId, RuleProtocol,
    RuleSource,
};
use crate::firewall::ports::{
    FirewallRepositoryError, FirewallRepositoryResult, FirewallRuleRepository,
};
use crate::job::adapters::postgres::JobPgPool;
use crate::server::domain::{ServerId, TenantId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};

/// `PostgreSQL`-backed firewall rule repository.
#[derive(Debug, Clone)]
pub struct PostgresFirewallRuleRepository {
    pool: JobPgPool,
}

impl PostgresFirewallRuleRepository {
    /// Creates a new repository from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: JobPgPool) -> Self {
        Self { pool }
    }

    async fn run_blocking<F, T>(&self, f: F) -> FirewallRepositoryResult<T>
    where
        F: FnOnce(&mut PgConnection) -> FirewallRepositoryResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(FirewallRepositoryError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(FirewallRepositoryError::persistence)?
    }
}

#[async_trait]
impl FirewallRuleRepository for PostgresFirewallRuleRepository {
    async fn insert(&self, rule: &FirewallRule) -> FirewallRepositoryResult<()> {
        let rule_id = rule.id();
        let new_row = to_new_row(rule);
        self.run_blocking(move |connection| {
            diesel::insert_into(firewall_rules::table)
                .values(&new_row)
                .execute(connection)
                .map_err(|err| match err {
                    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                        FirewallRepositoryError::DuplicateRule(rule_id)
                    }
                    _ => FirewallRepositoryError::persistence(err),
                })?;
            Ok(())
        })
        .await
    }

    async fn update(&self, rule: &FirewallRule) -> FirewallRepositoryResult<()> {
        let rule_id = rule.id();
        let row = to_new_row(rule);
        self.run_blocking(move |connection| {
            let affected = diesel::update(firewall_rules::table.filter(firewall_rules::id.eq(row.id)))
                .set((
                    firewall_rules::is_active.eq(row.is_active),
                    firewall_rules::is_pending_confirmation.eq(row.is_pending_confirmation),
                    firewall_rules::confirmation_token_digest.eq(row.confirmation_token_digest),
                    firewall_rules::confirmation_expires_at.eq(row.confirmation_expires_at),
                    firewall_rules::rollback_reason.eq(row.rollback_reason),
                    firewall_rules::rolled_back_at.eq(row.rolled_back_at),
                    firewall_rules::updated_at.eq(row.updated_at),
                ))
                .execute(connection)
                .map_err(FirewallRepositoryError::persistence)?;
            if affected == 0 {
                return Err(FirewallRepositoryError::NotFound(rule_id));
            }
            Ok(())
        })
        .await
    }

    async fn find_by_id(&self, id: RuleId) -> FirewallRepositoryResult<Option<FirewallRule>> {
        let rule_uuid = id.into_inner();
        self.run_blocking(move |connection| {
            let row: Option<RuleRow> = firewall_rules::table
                .filter(firewall_rules::id.eq(rule_uuid))
                .select(RuleRow::as_select())
                .first(connection)
                .optional()
                .map_err(FirewallRepositoryError::persistence)?;
            row.map(row_to_rule).transpose()
        })
        .await
    }

    async fn find_pending_by_token_digest(
        &self,
        token_digest: &str,
    ) -> FirewallRepositoryResult<Option<FirewallRule>> {
        let digest = token_digest.to_owned();
        self.run_blocking(move |connection| {
            let row: Option<RuleRow> = firewall_rules::table
                .filter(firewall_rules::is_pending_confirmation.eq(true))
                .filter(firewall_rules::confirmation_token_digest.eq(digest))
                .select(RuleRow::as_select())
                .first(connection)
                .optional()
                .map_err(FirewallRepositoryError::persistence)?;
            row.map(row_to_rule).transpose()
        })
        .await
    }

    async fn list_expired_pending(
        &self,
        now: DateTime<Utc>,
    ) -> FirewallRepositoryResult<Vec<FirewallRule>> {
        self.run_blocking(move |connection| {
            let rows: Vec<RuleRow> = firewall_rules::table
                .filter(firewall_rules::is_pending_confirmation.eq(true))
                .filter(firewall_rules::confirmation_expires_at.lt(now))
                .order(firewall_rules::created_at.asc())
                .select(RuleRow::as_select())
                .load(connection)
                .map_err(FirewallRepositoryError::persistence)?;
            rows.into_iter().map(row_to_rule).collect()
        })
        .await
    }

    async fn list_for_server(
        &self,
        server_id: ServerId,
    ) -> FirewallRepositoryResult<Vec<FirewallRule>> {
        let server_uuid = server_id.into_inner();
        self.run_blocking(move |connection| {
            let rows: Vec<RuleRow> = firewall_rules::table
                .filter(firewall_rules::server_id.eq(server_uuid))
                .order((firewall_rules::rule_order.asc(), firewall_rules::created_at.asc()))
                .select(RuleRow::as_select())
                .load(connection)
                .map_err(FirewallRepositoryError::persistence)?;
            rows.into_iter().map(row_to_rule).collect()
        })
        .await
    }
}

fn to_new_row(rule: &FirewallRule) -> NewRuleRow {
    NewRuleRow {
        id: rule.id().into_inner(),
        server_id: rule.server_id().into_inner(),
        tenant_id: rule.tenant_id().into_inner(),
        direction: rule.direction().as_str().to_owned(),
        action: rule.action().as_str().to_owned(),
        protocol: rule.protocol().as_str().to_owned(),
        port_spec: rule.port_spec().canonical(),
        source: rule.source().canonical(),
        is_active: rule.is_active(),
        is_pending_confirmation: rule.is_pending_confirmation(),
        confirmation_token_digest: rule.confirmation_token_digest().map(ToOwned::to_owned),
        confirmation_expires_at: rule.confirmation_expires_at(),
        rollback_reason: rule.rollback_reason().map(ToOwned::to_owned),
        rolled_back_at: rule.rolled_back_at(),
        rule_order: rule.rule_order(),
        created_at: rule.created_at(),
        updated_at: rule.updated_at(),
    }
}

fn row_to_rule(row: RuleRow) -> FirewallRepositoryResult<FirewallRule> {
    let direction = Direction::try_from(row.direction.as_str())
        .map_err(FirewallRepositoryError::persistence)?;
    let action =
        RuleAction::try_from(row.action.as_str()).map_err(FirewallRepositoryError::persistence)?;
    let protocol = RuleProtocol::try_from(row.protocol.as_str())
        .map_err(FirewallRepositoryError::persistence)?;
    let port_spec = PortSpec::try_from(row.port_spec.as_str())
        .map_err(FirewallRepositoryError::persistence)?;
    let source = RuleSource::parse(&row.source);

    Ok(FirewallRule::from_persisted(PersistedRuleData {
        id: RuleId::from_uuid(row.id),
        server_id: ServerId::from_uuid(row.server_id),
        tenant_id: TenantId::from_uuid(row.tenant_id),
        direction,
        action,
        protocol,
        port_spec,
        source,
        is_active: row.is_active,
        is_pending_confirmation: row.is_pending_confirmation,
        confirmation_token_digest: row.confirmation_token_digest,
        confirmation_expires_at: row.confirmation_expires_at,
        rollback_reason: row.rollback_reason,
        rolled_back_at: row.rolled_back_at,
        rule_order: row.rule_order,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }))
}
