//! Security identities derived from endpoint label sets.
//!
//! Endpoints with identical labels share one identity. Identities are
//! reference counted and released when their last endpoint goes away.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::AgentError;
use super::endpoint::Labels;

/// First identity handed out; lower values are reserved.
pub const MIN_ALLOCATED_IDENTITY: u32 = 256;

/// Numeric security identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NumericIdentity(u32);

impl NumericIdentity {
    /// Wraps a raw identity value.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw identity value.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for NumericIdentity {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(formatter)
    }
}

/// An allocated identity and the labels it stands for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    /// Numeric value.
    pub id: NumericIdentity,
    /// Labels shared by every endpoint with this identity.
    pub labels: Labels,
}

/// Identity with the number of endpoints currently using it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentityUsage {
    /// The identity.
    pub identity: Identity,
    /// Endpoints referencing it.
    pub ref_count: usize,
}

#[derive(Debug)]
struct Entry {
    labels: Labels,
    ref_count: usize,
}

/// Label-set keyed identity allocator.
#[derive(Debug)]
pub(crate) struct IdentityAllocator {
    by_labels: BTreeMap<Labels, NumericIdentity>,
    by_id: BTreeMap<NumericIdentity, Entry>,
    next: u32,
    last: u32,
}

impl Default for IdentityAllocator {
    fn default() -> Self {
        Self {
            by_labels: BTreeMap::new(),
            by_id: BTreeMap::new(),
            next: MIN_ALLOCATED_IDENTITY,
            last: u32::MAX,
        }
    }
}

impl IdentityAllocator {
    /// Returns the identity for `labels`, allocating one if needed.
    ///
    /// Values are handed out in increasing order and wrap back to
    /// [`MIN_ALLOCATED_IDENTITY`], skipping those still in use.
    pub(crate) fn acquire(&mut self, labels: &Labels) -> Result<NumericIdentity, AgentError> {
        if let Some(id) = self.by_labels.get(labels).copied() {
            if let Some(entry) = self.by_id.get_mut(&id) {
                entry.ref_count += 1;
            }
            return Ok(id);
        }
        let id = self.allocate()?;
        self.by_labels.insert(labels.clone(), id);
        self.by_id.insert(
            id,
            Entry {
                labels: labels.clone(),
                ref_count: 1,
            },
        );
        Ok(id)
    }

    fn allocate(&mut self) -> Result<NumericIdentity, AgentError> {
        let capacity = u64::from(self.last - MIN_ALLOCATED_IDENTITY) + 1;
        let has_free = u64::try_from(self.by_id.len()).is_ok_and(|used| used < capacity);
        if !has_free {
            return Err(AgentError::IdentitiesExhausted);
        }
        loop {
            let candidate = NumericIdentity(self.next);
            self.next = if self.next >= self.last {
                MIN_ALLOCATED_IDENTITY
            } else {
                self.next + 1
            };
            if !self.by_id.contains_key(&candidate) {
                return Ok(candidate);
            }
        }
    }

    /// Drops one reference; frees the identity when none remain.
    pub(crate) fn release(&mut self, id: NumericIdentity) {
        let Some(entry) = self.by_id.get_mut(&id) else {
            return;
        };
        entry.ref_count = entry.ref_count.saturating_sub(1);
        if entry.ref_count == 0 {
            if let Some(freed) = self.by_id.remove(&id) {
                self.by_labels.remove(&freed.labels);
            }
        }
    }

    pub(crate) fn get(&self, id: NumericIdentity) -> Option<Identity> {
        self.by_id.get(&id).map(|entry| Identity {
            id,
            labels: entry.labels.clone(),
        })
    }

    pub(crate) fn usage(&self) -> Vec<IdentityUsage> {
        self.by_id
            .iter()
            .map(|(id, entry)| IdentityUsage {
                identity: Identity {
                    id: *id,
                    labels: entry.labels.clone(),
                },
                ref_count: entry.ref_count,
            })
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.by_id.len()
    }
}
