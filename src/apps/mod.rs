//! Hosted web apps and their supervised processes.
//!
//! Apps are created through the job queue: the control plane reserves a
//! port (for Node runtimes), persists the pending app, renders its site
//! config, and enqueues a `create_webapp` job. The agent's report resolves
//! the app through the completion handler. Process rows own all allocated
//! ports; the process repository doubles as the allocator's usage source.

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
