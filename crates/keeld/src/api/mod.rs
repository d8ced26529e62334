//! The agent's API operations, registered before the agent exists.
//!
//! [`agent_api_handlers`] wires every operation to the shared
//! [`AgentReady`](crate::agent::AgentReady) value. Nothing here waits: the
//! table is built immediately and each call waits for the agent on its own.
//!
//! Requests use the operation names below and carry JSON params:
//!
//! ```json
//! {"operation":"patch-endpoint-id-labels","params":{"id":12,"add":["tier=front"]}}
//! ```

mod deferred;
mod handlers;
pub mod params;
mod response;
mod set;

use tracing::debug;

use crate::agent::AgentReady;

pub use deferred::{DeferredHandler, DeferredRoutes, Handle, WaitPolicy};
pub use response::ApiResponse;
pub use set::{HandlerSet, HandlerSetBuilder, RegistryError};

const API_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::api");

/// Agent health summary.
pub const GET_HEALTHZ: &str = "get-healthz";
/// Endpoints matching a label selector.
pub const GET_ENDPOINT: &str = "get-endpoint";
/// Deletes every endpoint of a container.
pub const DELETE_ENDPOINT: &str = "delete-endpoint";
/// One endpoint.
pub const GET_ENDPOINT_ID: &str = "get-endpoint-id";
/// Creates an endpoint.
pub const PUT_ENDPOINT_ID: &str = "put-endpoint-id";
/// Updates an endpoint's container and addresses.
pub const PATCH_ENDPOINT_ID: &str = "patch-endpoint-id";
/// Deletes one endpoint.
pub const DELETE_ENDPOINT_ID: &str = "delete-endpoint-id";
/// Endpoint options.
pub const GET_ENDPOINT_ID_CONFIG: &str = "get-endpoint-id-config";
/// Sets or clears endpoint options.
pub const PATCH_ENDPOINT_ID_CONFIG: &str = "patch-endpoint-id-config";
/// Endpoint labels.
pub const GET_ENDPOINT_ID_LABELS: &str = "get-endpoint-id-labels";
/// Adds and removes endpoint labels.
pub const PATCH_ENDPOINT_ID_LABELS: &str = "patch-endpoint-id-labels";
/// Endpoint status log.
pub const GET_ENDPOINT_ID_LOG: &str = "get-endpoint-id-log";
/// Endpoint health.
pub const GET_ENDPOINT_ID_HEALTHZ: &str = "get-endpoint-id-healthz";
/// Identities matching a label selector.
pub const GET_IDENTITY: &str = "get-identity";
/// One identity.
pub const GET_IDENTITY_ID: &str = "get-identity-id";
/// Identities with their endpoint counts.
pub const GET_IDENTITY_ENDPOINTS: &str = "get-identity-endpoints";
/// Full agent state dump.
pub const GET_DEBUGINFO: &str = "get-debuginfo";
/// Address to identity mappings.
pub const GET_IP: &str = "get-ip";

/// Something that must hold before the API is reachable.
///
/// [`agent_api_handlers`] takes a gate only as proof that the caller has
/// already passed it; the gate is not consulted again.
pub trait StartupGate {
    /// Human-readable description for logs.
    fn description(&self) -> String;
}

/// Builds the table of agent operations.
///
/// `gate` must already be held: the returned set is meant to be exposed on
/// the socket straight away.
///
/// # Errors
///
/// [`RegistryError`] if two operations share a name.
pub fn agent_api_handlers(
    ready: &AgentReady,
    policy: WaitPolicy,
    gate: &dyn StartupGate,
) -> Result<HandlerSet, RegistryError> {
    let set = DeferredRoutes::new(ready.clone(), policy)
        .route(GET_HEALTHZ, handlers::get_healthz)?
        .route(GET_ENDPOINT, handlers::get_endpoints)?
        .route(DELETE_ENDPOINT, handlers::delete_container_endpoints)?
        .route(GET_ENDPOINT_ID, handlers::get_endpoint)?
        .route(PUT_ENDPOINT_ID, handlers::put_endpoint)?
        .route(PATCH_ENDPOINT_ID, handlers::patch_endpoint)?
        .route(DELETE_ENDPOINT_ID, handlers::delete_endpoint)?
        .route(GET_ENDPOINT_ID_CONFIG, handlers::get_endpoint_config)?
        .route(PATCH_ENDPOINT_ID_CONFIG, handlers::patch_endpoint_config)?
        .route(GET_ENDPOINT_ID_LABELS, handlers::get_endpoint_labels)?
        .route(PATCH_ENDPOINT_ID_LABELS, handlers::patch_endpoint_labels)?
        .route(GET_ENDPOINT_ID_LOG, handlers::get_endpoint_log)?
        .route(GET_ENDPOINT_ID_HEALTHZ, handlers::get_endpoint_healthz)?
        .route(GET_IDENTITY, handlers::get_identities)?
        .route(GET_IDENTITY_ID, handlers::get_identity)?
        .route(GET_IDENTITY_ENDPOINTS, handlers::get_identity_endpoints)?
        .route(GET_DEBUGINFO, handlers::get_debuginfo)?
        .route(GET_IP, handlers::get_ip)?
        .finish();
    debug!(
        target: API_TARGET,
        gate = %gate.description(),
        operations = set.len(),
        "API handlers registered"
    );
    Ok(set)
}
