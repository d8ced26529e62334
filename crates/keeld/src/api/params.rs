//! Request parameters, one struct per operation shape.
//!
//! Every struct rejects unknown fields so typos surface as `400` instead of
//! being silently ignored.

use std::net::IpAddr;

use serde::Deserialize;

use crate::agent::{EndpointOptions, EndpointPatch, EndpointSpec, Labels, NumericIdentity};

/// Operations that take no parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NoParams {}

/// Optional label selector; empty matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LabelSelector {
    /// Labels every match must carry.
    #[serde(default)]
    pub labels: Labels,
}

/// Names a runtime container.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContainerRef {
    /// Container id.
    pub container_id: String,
}

/// Names one endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EndpointRef {
    /// Endpoint id.
    pub id: u64,
}

/// `put-endpoint-id`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PutEndpoint {
    /// Endpoint id to create.
    pub id: u64,
    /// Endpoint definition.
    #[serde(default)]
    pub endpoint: EndpointSpec,
}

/// `patch-endpoint-id`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatchEndpoint {
    /// Endpoint id.
    pub id: u64,
    /// Fields to replace.
    #[serde(default)]
    pub endpoint: EndpointPatch,
}

/// `patch-endpoint-id-config`. Empty values remove the option.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatchEndpointConfig {
    /// Endpoint id.
    pub id: u64,
    /// Options to set or clear.
    pub options: EndpointOptions,
}

/// `patch-endpoint-id-labels`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatchEndpointLabels {
    /// Endpoint id.
    pub id: u64,
    /// Labels to add.
    #[serde(default)]
    pub add: Labels,
    /// Labels to remove.
    #[serde(default)]
    pub delete: Labels,
}

/// Names one identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IdentityRef {
    /// Numeric identity.
    pub id: NumericIdentity,
}

/// `get-ip`; without an address the whole cache is returned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IpQuery {
    /// Address to look up.
    #[serde(default)]
    pub address: Option<IpAddr>,
}
