//! Agent-facing composition root.
//!
//! A typed gateway service fronts the domain services behind bearer-token
//! authentication; a warp adapter exposes it as the five-operation HTTP
//! protocol agents speak.

pub mod dto;
mod http;
mod service;

pub use http::{handle_rejection, routes};
pub use service::{AgentGateway, FETCH_JOB_LIMIT, ProtocolError, ProtocolResult};

#[cfg(test)]
mod tests;
