//! Endpoint-level integration flows.

pub mod fixtures;

mod agent_flows;
mod auth_flows;
