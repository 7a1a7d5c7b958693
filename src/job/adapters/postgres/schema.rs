//! Diesel schema for job persistence.

diesel::table! {
    /// Remote-command jobs with lifecycle and outcome fields.
    jobs (id) {
        /// Job identifier.
        id -> Uuid,
        /// Target server.
        server_id -> Uuid,
        /// Owning tenant.
        tenant_id -> Uuid,
        /// Job type tag, e.g. `provision_nginx`.
        #[max_length = 100]
        job_type -> Varchar,
        /// Opaque payload handed to the agent.
        payload -> Jsonb,
        /// Lifecycle status.
        #[max_length = 20]
        status -> Varchar,
        /// Priority; lower is more urgent.
        priority -> Int2,
        /// Re-enqueue bookkeeping.
        retry_count -> Int4,
        /// Operator-facing retry budget.
        max_retries -> Int4,
        /// Captured remote output.
        output -> Nullable<Text>,
        /// Agent-reported error text.
        error -> Nullable<Text>,
        /// Remote process exit code.
        exit_code -> Nullable<Int4>,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Queue-acceptance timestamp.
        queued_at -> Nullable<Timestamptz>,
        /// Claim timestamp.
        started_at -> Nullable<Timestamptz>,
        /// Completion timestamp.
        completed_at -> Nullable<Timestamptz>,
    }
}
