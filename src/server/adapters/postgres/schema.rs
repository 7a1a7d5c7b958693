//! Diesel schema for server persistence.

diesel::table! {
    /// Managed servers.
    servers (id) {
        /// Server identifier.
        id -> Uuid,
        /// Owning tenant.
        tenant_id -> Uuid,
        /// Display name.
        name -> Varchar,
        /// Lifecycle status.
        status -> Varchar,
        /// Provisioning phase.
        phase -> Varchar,
        /// Tenant stack selection.
        stack -> Jsonb,
        /// Outstanding provision-token digest.
        provision_token_digest -> Nullable<Varchar>,
        /// Provision-token expiry.
        provision_token_expires_at -> Nullable<Timestamptz>,
        /// Agent bearer-token digest.
        agent_token_digest -> Nullable<Varchar>,
        /// Agent-reported address.
        ip_address -> Nullable<Varchar>,
        /// Agent public key.
        public_key -> Nullable<Text>,
        /// Observed hardware facts.
        specs -> Nullable<Jsonb>,
        /// Observed per-service status map.
        services_status -> Jsonb,
        /// Observed per-daemon status map.
        daemons_status -> Jsonb,
        /// Observed tool-version map.
        tools_status -> Jsonb,
        /// Agent-reported database health summary.
        database_health -> Nullable<Text>,
        /// Last-heartbeat timestamp.
        last_heartbeat_at -> Nullable<Timestamptz>,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last-update timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Per-server provisioning steps.
    provisioning_steps (id) {
        /// Step identifier.
        id -> Uuid,
        /// Owning server.
        server_id -> Uuid,
        /// Step type tag.
        step_type -> Varchar,
        /// Catalog category.
        category -> Varchar,
        /// Catalog order.
        step_order -> Int2,
        /// Required flag.
        is_required -> Bool,
        /// Lifecycle status.
        status -> Varchar,
        /// Linked job while in flight.
        job_id -> Nullable<Uuid>,
        /// Remote output.
        output -> Nullable<Text>,
        /// Remote error.
        error -> Nullable<Text>,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Start timestamp.
        started_at -> Nullable<Timestamptz>,
        /// Completion timestamp.
        completed_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    /// Installed-service records.
    services (id) {
        /// Service identifier.
        id -> Uuid,
        /// Owning server.
        server_id -> Uuid,
        /// Service name.
        name -> Varchar,
        /// Installed version.
        version -> Nullable<Varchar>,
        /// Lifecycle status.
        status -> Varchar,
        /// Install failure text.
        error -> Nullable<Text>,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last-update timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Append-only heartbeat resource samples.
    server_metrics (id) {
        /// Sample identifier.
        id -> Uuid,
        /// Reporting server.
        server_id -> Uuid,
        /// CPU utilisation percentage.
        cpu_pct -> Nullable<Float4>,
        /// Memory utilisation percentage.
        memory_pct -> Nullable<Float4>,
        /// Disk utilisation percentage.
        disk_pct -> Nullable<Float4>,
        /// Append timestamp.
        recorded_at -> Timestamptz,
    }
}

diesel::allow_tables_to_appear_in_same_query!(servers, provisioning_steps, services);
