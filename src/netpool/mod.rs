//! Per-server port pool and allocator.
//!
//! Every managed server exposes one bounded range of ports for application
//! processes. The allocator selects free ports against a live usage source;
//! actual reservation is enforced by the process repository, which rejects
//! conflicting inserts so concurrent callers can retry.

pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
