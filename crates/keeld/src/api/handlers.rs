//! Operation bodies. Each runs against a ready agent.

use serde_json::json;

use crate::agent::Agent;

use super::params::{
    ContainerRef, EndpointRef, IdentityRef, IpQuery, LabelSelector, NoParams, PatchEndpoint,
    PatchEndpointConfig, PatchEndpointLabels, PutEndpoint,
};
use super::response::ApiResponse;

pub(super) fn get_healthz(agent: &Agent, _: NoParams) -> ApiResponse {
    ApiResponse::ok(&agent.health())
}

pub(super) fn get_endpoints(agent: &Agent, params: LabelSelector) -> ApiResponse {
    let endpoints = agent.endpoints(&params.labels);
    if endpoints.is_empty() && !params.labels.is_empty() {
        return ApiResponse::not_found("no endpoint matches the label selector");
    }
    ApiResponse::ok(&endpoints)
}

pub(super) fn delete_container_endpoints(agent: &Agent, params: ContainerRef) -> ApiResponse {
    let deleted = agent.delete_container_endpoints(&params.container_id);
    if deleted.is_empty() {
        return ApiResponse::not_found(format_args!(
            "no endpoint belongs to container '{}'",
            params.container_id
        ));
    }
    ApiResponse::ok(&json!({ "deleted": deleted }))
}

pub(super) fn get_endpoint(agent: &Agent, params: EndpointRef) -> ApiResponse {
    ApiResponse::from_result(agent.endpoint(params.id))
}

pub(super) fn put_endpoint(agent: &Agent, params: PutEndpoint) -> ApiResponse {
    match agent.create_endpoint(params.id, params.endpoint) {
        Ok(endpoint) => ApiResponse::created(&endpoint),
        Err(error) => ApiResponse::agent_error(&error),
    }
}

pub(super) fn patch_endpoint(agent: &Agent, params: PatchEndpoint) -> ApiResponse {
    ApiResponse::from_result(agent.patch_endpoint(params.id, params.endpoint))
}

pub(super) fn delete_endpoint(agent: &Agent, params: EndpointRef) -> ApiResponse {
    ApiResponse::from_result(agent.delete_endpoint(params.id))
}

pub(super) fn get_endpoint_config(agent: &Agent, params: EndpointRef) -> ApiResponse {
    ApiResponse::from_result(agent.endpoint_options(params.id))
}

pub(super) fn patch_endpoint_config(agent: &Agent, params: PatchEndpointConfig) -> ApiResponse {
    ApiResponse::from_result(agent.patch_endpoint_options(params.id, params.options))
}

pub(super) fn get_endpoint_labels(agent: &Agent, params: EndpointRef) -> ApiResponse {
    ApiResponse::from_result(agent.endpoint_labels(params.id))
}

pub(super) fn patch_endpoint_labels(agent: &Agent, params: PatchEndpointLabels) -> ApiResponse {
    ApiResponse::from_result(agent.modify_endpoint_labels(
        params.id,
        &params.add,
        &params.delete,
    ))
}

pub(super) fn get_endpoint_log(agent: &Agent, params: EndpointRef) -> ApiResponse {
    ApiResponse::from_result(agent.endpoint_log(params.id))
}

pub(super) fn get_endpoint_healthz(agent: &Agent, params: EndpointRef) -> ApiResponse {
    ApiResponse::from_result(agent.endpoint_health(params.id))
}

pub(super) fn get_identities(agent: &Agent, params: LabelSelector) -> ApiResponse {
    let identities = agent.identities(&params.labels);
    if identities.is_empty() && !params.labels.is_empty() {
        return ApiResponse::not_found("no identity matches the label selector");
    }
    ApiResponse::ok(&identities)
}

pub(super) fn get_identity(agent: &Agent, params: IdentityRef) -> ApiResponse {
    ApiResponse::from_result(agent.identity(params.id))
}

pub(super) fn get_identity_endpoints(agent: &Agent, _: NoParams) -> ApiResponse {
    ApiResponse::ok(&agent.identity_usage())
}

pub(super) fn get_debuginfo(agent: &Agent, _: NoParams) -> ApiResponse {
    ApiResponse::ok(&agent.debug_info())
}

pub(super) fn get_ip(agent: &Agent, params: IpQuery) -> ApiResponse {
    let entries = agent.ip_cache(params.address);
    match params.address {
        Some(address) if entries.is_empty() => {
            ApiResponse::not_found(format_args!("address {address} is not in the cache"))
        }
        _ => ApiResponse::ok(&entries),
    }
}
