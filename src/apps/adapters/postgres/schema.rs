//! Diesel schema for app persistence.

diesel::table! {
    /// Hosted web apps.
    web_apps (id) {
        /// App identifier.
        id -> Uuid,
        /// Hosting server.
        server_id -> Uuid,
        /// Owning tenant.
        tenant_id -> Uuid,
        /// Site domain.
        domain -> Varchar,
        /// System user.
        system_user -> Varchar,
        /// App runtime tag.
        runtime -> Varchar,
        /// Allocated port for Node apps.
        port -> Nullable<Int4>,
        /// Creation status.
        status -> Varchar,
        /// Remote error text.
        error -> Nullable<Text>,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last-update timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Supervisor-managed processes; live rows own their ports.
    app_processes (id) {
        /// Process identifier.
        id -> Uuid,
        /// Hosting server.
        server_id -> Uuid,
        /// Owning app, if any.
        app_id -> Nullable<Uuid>,
        /// Supervisor program name.
        name -> Varchar,
        /// Supervised command line.
        command -> Text,
        /// Reserved port.
        port -> Nullable<Int4>,
        /// Lifecycle status.
        status -> Varchar,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last-update timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::allow_tables_to_appear_in_same_query!(web_apps, app_processes);
