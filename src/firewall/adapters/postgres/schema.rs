//! Diesel schema for firewall rule persistence.

diesel::table! {
    /// Desired packet-filter rules with confirmation state.
    firewall_rules (id) {
        /// Rule identifier.
        id -> Uuid,
        /// Owning server.
        server_id -> Uuid,
        /// Owning tenant.
        tenant_id -> Uuid,
        /// Packet direction.
        #[max_length = 10]
        direction -> Varchar,
        /// Allow or deny.
        #[max_length = 10]
        action -> Varchar,
        /// Transport protocol.
        #[max_length = 10]
        protocol -> Varchar,
        /// Port specification (`any`, `22`, `8000:9000`).
        #[max_length = 20]
        port_spec -> Varchar,
        /// Source specification (`any` or an address/CIDR).
        #[max_length = 100]
        source -> Varchar,
        /// Whether the rule is live on the server.
        is_active -> Bool,
        /// Whether a confirmation is outstanding.
        is_pending_confirmation -> Bool,
        /// Confirmation-token digest while pending.
        #[max_length = 64]
        confirmation_token_digest -> Nullable<Varchar>,
        /// Confirmation deadline while pending.
        confirmation_expires_at -> Nullable<Timestamptz>,
        /// Recorded rollback reason.
        rollback_reason -> Nullable<Text>,
        /// Rollback timestamp.
        rolled_back_at -> Nullable<Timestamptz>,
        /// Evaluation order.
        rule_order -> Int2,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last-update timestamp.
        updated_at -> Timestamptz,
    }
}
