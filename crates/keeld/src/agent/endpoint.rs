//! Endpoint records kept by the agent.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use super::identity::NumericIdentity;

/// Label set attached to an endpoint, e.g. `k8s:app=web`.
pub type Labels = BTreeSet<String>;

/// Per-endpoint configuration options.
pub type EndpointOptions = BTreeMap<String, String>;

/// Number of status entries retained per endpoint.
pub const STATUS_LOG_CAPACITY: usize = 32;

/// Lifecycle of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EndpointState {
    /// Created, identity not yet assigned.
    WaitingForIdentity,
    /// Identity assigned; traffic may flow.
    Ready,
    /// Being torn down.
    Disconnecting,
}

/// Coarse health derived from the endpoint's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Fully operational.
    Ok,
    /// Operational but not yet complete.
    Warning,
    /// Not operational.
    Failure,
}

/// Health summary returned by `get-endpoint-id-healthz`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EndpointHealth {
    /// Overall verdict.
    pub overall: HealthStatus,
    /// Whether the endpoint has an identity.
    pub connected: bool,
}

/// One entry in an endpoint's status log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEntry {
    /// Seconds since the Unix epoch.
    pub timestamp: u64,
    /// State the endpoint was in when the entry was recorded.
    pub state: EndpointState,
    /// Human-readable message.
    pub message: String,
}

/// Fields accepted when creating an endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EndpointSpec {
    /// Runtime container backing the endpoint.
    pub container_id: Option<String>,
    /// IPv4 address.
    pub ipv4: Option<Ipv4Addr>,
    /// IPv6 address.
    pub ipv6: Option<Ipv6Addr>,
    /// Labels used to derive the identity.
    pub labels: Labels,
    /// Initial configuration options.
    pub options: EndpointOptions,
}

/// Partial update applied by `patch-endpoint-id`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EndpointPatch {
    /// Replacement container id.
    pub container_id: Option<String>,
    /// Replacement IPv4 address.
    pub ipv4: Option<Ipv4Addr>,
    /// Replacement IPv6 address.
    pub ipv6: Option<Ipv6Addr>,
}

/// An endpoint managed by the agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Agent-local endpoint id.
    pub id: u64,
    /// Runtime container backing the endpoint.
    pub container_id: Option<String>,
    /// IPv4 address.
    pub ipv4: Option<Ipv4Addr>,
    /// IPv6 address.
    pub ipv6: Option<Ipv6Addr>,
    /// Labels used to derive the identity.
    pub labels: Labels,
    /// Configuration options.
    pub options: EndpointOptions,
    /// Lifecycle state.
    pub state: EndpointState,
    /// Security identity, once allocated.
    pub identity: Option<NumericIdentity>,
    /// Most recent status entries, oldest first.
    pub log: VecDeque<StatusEntry>,
}

impl Endpoint {
    pub(crate) fn from_spec(id: u64, spec: EndpointSpec) -> Self {
        let mut endpoint = Self {
            id,
            container_id: spec.container_id,
            ipv4: spec.ipv4,
            ipv6: spec.ipv6,
            labels: spec.labels,
            options: spec.options,
            state: EndpointState::WaitingForIdentity,
            identity: None,
            log: VecDeque::new(),
        };
        endpoint.record("endpoint created");
        endpoint
    }

    /// Addresses assigned to the endpoint.
    pub fn addresses(&self) -> impl Iterator<Item = IpAddr> + '_ {
        self.ipv4
            .map(IpAddr::V4)
            .into_iter()
            .chain(self.ipv6.map(IpAddr::V6))
    }

    /// Health derived from the current state.
    #[must_use]
    pub const fn health(&self) -> EndpointHealth {
        let overall = match self.state {
            EndpointState::Ready => HealthStatus::Ok,
            EndpointState::WaitingForIdentity => HealthStatus::Warning,
            EndpointState::Disconnecting => HealthStatus::Failure,
        };
        EndpointHealth {
            overall,
            connected: self.identity.is_some(),
        }
    }

    pub(crate) fn assign_identity(&mut self, identity: NumericIdentity) {
        self.identity = Some(identity);
        self.transition(EndpointState::Ready, format!("identity {identity} assigned"));
    }

    pub(crate) fn transition(&mut self, state: EndpointState, message: impl Into<String>) {
        self.state = state;
        self.record(message);
    }

    pub(crate) fn record(&mut self, message: impl Into<String>) {
        if self.log.len() == STATUS_LOG_CAPACITY {
            self.log.pop_front();
        }
        self.log.push_back(StatusEntry {
            timestamp: unix_seconds(),
            state: self.state,
            message: message.into(),
        });
    }
}

fn unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs())
}
