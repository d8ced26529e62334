//! The agent: the daemon's endpoint and identity registry.
//!
//! An [`Agent`] is expensive to produce (it may restore state from disk) and
//! is built exactly once on the `agent-init` thread by an [`AgentFactory`].
//! API handlers only ever see it through the readiness value returned by
//! [`spawn_initialiser`].

mod endpoint;
mod factory;
mod identity;
mod init;

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

use serde::Serialize;
use thiserror::Error;

pub use endpoint::{
    Endpoint, EndpointHealth, EndpointOptions, EndpointPatch, EndpointSpec, EndpointState,
    HealthStatus, Labels, STATUS_LOG_CAPACITY, StatusEntry,
};
pub use factory::{AgentFactory, AgentStartupError, StandardAgentFactory};
pub use identity::{Identity, IdentityUsage, MIN_ALLOCATED_IDENTITY, NumericIdentity};
pub use init::{AgentInit, AgentReady, spawn_initialiser};

use identity::IdentityAllocator;

/// Failures reported by agent operations once the agent is running.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AgentError {
    /// No endpoint has this id.
    #[error("endpoint {id} not found")]
    EndpointNotFound {
        /// Requested endpoint id.
        id: u64,
    },
    /// An endpoint with this id already exists.
    #[error("endpoint {id} already exists")]
    EndpointExists {
        /// Conflicting endpoint id.
        id: u64,
    },
    /// Endpoint id `0` is reserved for the host.
    #[error("endpoint id 0 is reserved")]
    ReservedEndpointId,
    /// Another endpoint already owns the address.
    #[error("address {address} is already used by endpoint {owner}")]
    AddressInUse {
        /// Contested address.
        address: IpAddr,
        /// Endpoint currently holding it.
        owner: u64,
    },
    /// No identity has this value.
    #[error("identity {id} not found")]
    IdentityNotFound {
        /// Requested identity.
        id: NumericIdentity,
    },
    /// Labels must be non-empty and free of surrounding whitespace.
    #[error("invalid label '{label}'")]
    InvalidLabel {
        /// Offending label.
        label: String,
    },
    /// Option keys must be non-empty.
    #[error("invalid option key '{key}'")]
    InvalidOption {
        /// Offending key.
        key: String,
    },
    /// Every identity value is in use.
    #[error("no free security identity left")]
    IdentitiesExhausted,
}

impl AgentError {
    /// HTTP-style status used when the error reaches a client.
    #[must_use]
    pub const fn status(&self) -> u16 {
        match self {
            Self::EndpointNotFound { .. } | Self::IdentityNotFound { .. } => 404,
            Self::EndpointExists { .. } | Self::AddressInUse { .. } => 409,
            Self::ReservedEndpointId | Self::InvalidLabel { .. } | Self::InvalidOption { .. } => {
                400
            }
            Self::IdentitiesExhausted => 503,
        }
    }
}

/// Agent-wide health summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentHealth {
    /// Always `ok` for a running agent.
    pub status: HealthStatus,
    /// Number of managed endpoints.
    pub endpoints: usize,
    /// Number of allocated identities.
    pub identities: usize,
    /// Seconds since the agent was built.
    pub uptime_secs: u64,
}

/// One address-to-identity mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IpCacheEntry {
    /// Endpoint address.
    pub address: IpAddr,
    /// Identity of the owning endpoint.
    pub identity: NumericIdentity,
    /// Owning endpoint.
    pub endpoint: u64,
}

/// Snapshot returned by `get-debuginfo`.
#[derive(Debug, Clone, Serialize)]
pub struct DebugInfo {
    /// Daemon version.
    pub version: &'static str,
    /// Seconds since the agent was built.
    pub uptime_secs: u64,
    /// Every endpoint.
    pub endpoints: Vec<Endpoint>,
    /// Every identity with its reference count.
    pub identities: Vec<IdentityUsage>,
}

#[derive(Debug, Default)]
struct AgentState {
    endpoints: BTreeMap<u64, Endpoint>,
    identities: IdentityAllocator,
}

impl AgentState {
    fn endpoint_mut(&mut self, id: u64) -> Result<&mut Endpoint, AgentError> {
        self.endpoints
            .get_mut(&id)
            .ok_or(AgentError::EndpointNotFound { id })
    }

    fn address_owner(&self, address: IpAddr, except: u64) -> Option<u64> {
        self.endpoints
            .values()
            .filter(|endpoint| endpoint.id != except)
            .find(|endpoint| endpoint.addresses().any(|owned| owned == address))
            .map(|endpoint| endpoint.id)
    }

    fn ensure_addresses_free(
        &self,
        addresses: impl IntoIterator<Item = IpAddr>,
        except: u64,
    ) -> Result<(), AgentError> {
        for address in addresses {
            if let Some(owner) = self.address_owner(address, except) {
                return Err(AgentError::AddressInUse { address, owner });
            }
        }
        Ok(())
    }

    fn remove_endpoint(&mut self, id: u64) -> Result<Endpoint, AgentError> {
        let mut endpoint = self
            .endpoints
            .remove(&id)
            .ok_or(AgentError::EndpointNotFound { id })?;
        endpoint.transition(EndpointState::Disconnecting, "endpoint deleted");
        if let Some(identity) = endpoint.identity {
            self.identities.release(identity);
        }
        Ok(endpoint)
    }
}

/// In-memory registry of endpoints and identities.
#[derive(Debug)]
pub struct Agent {
    state: RwLock<AgentState>,
    started: Instant,
}

impl Default for Agent {
    fn default() -> Self {
        Self::new()
    }
}

impl Agent {
    /// Creates an agent with no endpoints.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(AgentState::default()),
            started: Instant::now(),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, AgentState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, AgentState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn uptime_secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    /// Agent-wide health.
    pub fn health(&self) -> AgentHealth {
        let state = self.read();
        AgentHealth {
            status: HealthStatus::Ok,
            endpoints: state.endpoints.len(),
            identities: state.identities.len(),
            uptime_secs: self.uptime_secs(),
        }
    }

    /// Endpoints carrying every label in `selector`; all endpoints when empty.
    pub fn endpoints(&self, selector: &Labels) -> Vec<Endpoint> {
        self.read()
            .endpoints
            .values()
            .filter(|endpoint| selector.is_subset(&endpoint.labels))
            .cloned()
            .collect()
    }

    /// Deletes every endpoint backed by `container_id`; returns their ids.
    pub fn delete_container_endpoints(&self, container_id: &str) -> Vec<u64> {
        let mut state = self.write();
        let doomed: Vec<u64> = state
            .endpoints
            .values()
            .filter(|endpoint| endpoint.container_id.as_deref() == Some(container_id))
            .map(|endpoint| endpoint.id)
            .collect();
        doomed
            .into_iter()
            .filter(|id| state.remove_endpoint(*id).is_ok())
            .collect()
    }

    /// Looks up one endpoint.
    ///
    /// # Errors
    ///
    /// [`AgentError::EndpointNotFound`] when `id` is unknown.
    pub fn endpoint(&self, id: u64) -> Result<Endpoint, AgentError> {
        self.read()
            .endpoints
            .get(&id)
            .cloned()
            .ok_or(AgentError::EndpointNotFound { id })
    }

    /// Creates an endpoint and assigns its identity.
    ///
    /// # Errors
    ///
    /// Rejects reserved or duplicate ids, malformed labels and addresses
    /// already owned by another endpoint.
    pub fn create_endpoint(&self, id: u64, spec: EndpointSpec) -> Result<Endpoint, AgentError> {
        if id == 0 {
            return Err(AgentError::ReservedEndpointId);
        }
        validate_labels(&spec.labels)?;
        validate_options(&spec.options)?;
        let mut state = self.write();
        if state.endpoints.contains_key(&id) {
            return Err(AgentError::EndpointExists { id });
        }
        let mut endpoint = Endpoint::from_spec(id, spec);
        state.ensure_addresses_free(endpoint.addresses(), id)?;
        let identity = state.identities.acquire(&endpoint.labels)?;
        endpoint.assign_identity(identity);
        state.endpoints.insert(id, endpoint.clone());
        Ok(endpoint)
    }

    /// Applies a partial update to an endpoint's container and addresses.
    ///
    /// # Errors
    ///
    /// Unknown endpoint or an address owned by another endpoint.
    pub fn patch_endpoint(&self, id: u64, patch: EndpointPatch) -> Result<Endpoint, AgentError> {
        let mut state = self.write();
        state.endpoint_mut(id)?;
        let requested = patch
            .ipv4
            .map(IpAddr::V4)
            .into_iter()
            .chain(patch.ipv6.map(IpAddr::V6));
        state.ensure_addresses_free(requested, id)?;
        let endpoint = state.endpoint_mut(id)?;
        if let Some(container_id) = patch.container_id {
            endpoint.container_id = Some(container_id);
        }
        if let Some(ipv4) = patch.ipv4 {
            endpoint.ipv4 = Some(ipv4);
        }
        if let Some(ipv6) = patch.ipv6 {
            endpoint.ipv6 = Some(ipv6);
        }
        endpoint.record("endpoint updated");
        Ok(endpoint.clone())
    }

    /// Removes an endpoint and releases its identity.
    ///
    /// # Errors
    ///
    /// [`AgentError::EndpointNotFound`] when `id` is unknown.
    pub fn delete_endpoint(&self, id: u64) -> Result<Endpoint, AgentError> {
        self.write().remove_endpoint(id)
    }

    /// Configuration options of an endpoint.
    ///
    /// # Errors
    ///
    /// [`AgentError::EndpointNotFound`] when `id` is unknown.
    pub fn endpoint_options(&self, id: u64) -> Result<EndpointOptions, AgentError> {
        self.endpoint(id).map(|endpoint| endpoint.options)
    }

    /// Merges `changes` into an endpoint's options; empty values remove keys.
    ///
    /// # Errors
    ///
    /// Unknown endpoint or an empty option key.
    pub fn patch_endpoint_options(
        &self,
        id: u64,
        changes: EndpointOptions,
    ) -> Result<EndpointOptions, AgentError> {
        validate_options(&changes)?;
        let mut state = self.write();
        let endpoint = state.endpoint_mut(id)?;
        for (key, value) in changes {
            if value.is_empty() {
                endpoint.options.remove(&key);
            } else {
                endpoint.options.insert(key, value);
            }
        }
        endpoint.record("configuration updated");
        Ok(endpoint.options.clone())
    }

    /// Labels of an endpoint.
    ///
    /// # Errors
    ///
    /// [`AgentError::EndpointNotFound`] when `id` is unknown.
    pub fn endpoint_labels(&self, id: u64) -> Result<Labels, AgentError> {
        self.endpoint(id).map(|endpoint| endpoint.labels)
    }

    /// Adds and removes labels, moving the endpoint to the matching identity.
    ///
    /// # Errors
    ///
    /// Unknown endpoint or a malformed label in `add`.
    pub fn modify_endpoint_labels(
        &self,
        id: u64,
        add: &Labels,
        delete: &Labels,
    ) -> Result<Labels, AgentError> {
        validate_labels(add)?;
        let mut guard = self.write();
        let state = &mut *guard;
        let endpoint = state.endpoint_mut(id)?;
        let mut labels: Labels = endpoint.labels.difference(delete).cloned().collect();
        labels.extend(add.iter().cloned());
        if labels == endpoint.labels {
            return Ok(labels);
        }

        let identity = state.identities.acquire(&labels)?;
        let relabelled = state.endpoint_mut(id)?;
        relabelled.labels = labels.clone();
        relabelled.transition(EndpointState::WaitingForIdentity, "labels changed");
        let previous = relabelled.identity.take();
        relabelled.assign_identity(identity);
        if let Some(previous) = previous {
            state.identities.release(previous);
        }
        Ok(labels)
    }

    /// Status log of an endpoint, oldest entry first.
    ///
    /// # Errors
    ///
    /// [`AgentError::EndpointNotFound`] when `id` is unknown.
    pub fn endpoint_log(&self, id: u64) -> Result<Vec<StatusEntry>, AgentError> {
        self.endpoint(id)
            .map(|endpoint| endpoint.log.into_iter().collect())
    }

    /// Health of an endpoint.
    ///
    /// # Errors
    ///
    /// [`AgentError::EndpointNotFound`] when `id` is unknown.
    pub fn endpoint_health(&self, id: u64) -> Result<EndpointHealth, AgentError> {
        self.endpoint(id).map(|endpoint| endpoint.health())
    }

    /// Identities whose labels include every label in `selector`.
    pub fn identities(&self, selector: &Labels) -> Vec<Identity> {
        self.read()
            .identities
            .usage()
            .into_iter()
            .map(|usage| usage.identity)
            .filter(|identity| selector.is_subset(&identity.labels))
            .collect()
    }

    /// Looks up one identity.
    ///
    /// # Errors
    ///
    /// [`AgentError::IdentityNotFound`] when `id` is not allocated.
    pub fn identity(&self, id: NumericIdentity) -> Result<Identity, AgentError> {
        self.read()
            .identities
            .get(id)
            .ok_or(AgentError::IdentityNotFound { id })
    }

    /// Every identity with the number of endpoints using it.
    pub fn identity_usage(&self) -> Vec<IdentityUsage> {
        self.read().identities.usage()
    }

    /// Address-to-identity mappings, optionally narrowed to one address.
    pub fn ip_cache(&self, address: Option<IpAddr>) -> Vec<IpCacheEntry> {
        let state = self.read();
        state
            .endpoints
            .values()
            .filter_map(|endpoint| endpoint.identity.map(|identity| (endpoint, identity)))
            .flat_map(|(endpoint, identity)| {
                endpoint.addresses().map(move |owned| IpCacheEntry {
                    address: owned,
                    identity,
                    endpoint: endpoint.id,
                })
            })
            .filter(|entry| address.is_none_or(|wanted| wanted == entry.address))
            .collect()
    }

    /// Full state dump for troubleshooting.
    pub fn debug_info(&self) -> DebugInfo {
        let state = self.read();
        DebugInfo {
            version: env!("CARGO_PKG_VERSION"),
            uptime_secs: self.uptime_secs(),
            endpoints: state.endpoints.values().cloned().collect(),
            identities: state.identities.usage(),
        }
    }
}

fn validate_labels(labels: &Labels) -> Result<(), AgentError> {
    match labels
        .iter()
        .find(|label| label.is_empty() || label.trim() != label.as_str())
    {
        Some(label) => Err(AgentError::InvalidLabel {
            label: label.clone(),
        }),
        None => Ok(()),
    }
}

fn validate_options(options: &EndpointOptions) -> Result<(), AgentError> {
    match options.keys().find(|key| key.trim().is_empty()) {
        Some(key) => Err(AgentError::InvalidOption { key: key.clone() }),
        None => Ok(()),
    }
}
