// file: src/cluster/memory.rs
// version: 1.0.0
// guid: 1e915873-1e80-4096-bc3d-baeb7e4ff3f4

//! In-process cluster store

use super::{Application, ClusterClient, RawDefinition};
use crate::registry::CapabilityKind;
use crate::Result;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct MemoryState {
    workloads: BTreeMap<String, RawDefinition>,
    traits: BTreeMap<String, RawDefinition>,
    applications: BTreeMap<String, Application>,
    writes: usize,
}

impl MemoryState {
    fn definitions(&self, kind: CapabilityKind) -> &BTreeMap<String, RawDefinition> {
        match kind {
            CapabilityKind::Workload => &self.workloads,
            CapabilityKind::Trait => &self.traits,
        }
    }
}

/// Cluster held entirely in memory, for embedding and tests
#[derive(Debug, Default)]
pub struct MemoryCluster {
    state: Mutex<MemoryState>,
}

impl MemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a definition under the kind named by its envelope. Envelopes
    /// with an unrecognized kind are stored as traits.
    pub fn add_definition(&self, raw: RawDefinition) {
        let mut state = self.state();
        let name = raw.name().to_string();
        match raw.capability_kind() {
            Some(CapabilityKind::Workload) => state.workloads.insert(name, raw),
            _ => state.traits.insert(name, raw),
        };
    }

    /// Number of application writes and deletes served so far
    pub fn write_count(&self) -> usize {
        self.state().writes
    }
}

#[async_trait::async_trait]
impl ClusterClient for MemoryCluster {
    fn backend_name(&self) -> &str {
        "memory"
    }

    async fn list_definitions(&self, kind: CapabilityKind) -> Result<Vec<RawDefinition>> {
        let state = self.state();
        Ok(state.definitions(kind).values().cloned().collect())
    }

    async fn get_definition(&self, kind: CapabilityKind, name: &str) -> Result<Option<RawDefinition>> {
        let state = self.state();
        Ok(state.definitions(kind).get(name).cloned())
    }

    async fn list_applications(&self) -> Result<Vec<Application>> {
        let state = self.state();
        Ok(state.applications.values().cloned().collect())
    }

    async fn get_application(&self, name: &str) -> Result<Option<Application>> {
        let state = self.state();
        Ok(state.applications.get(name).cloned())
    }

    async fn apply_application(&self, app: &Application) -> Result<()> {
        let mut state = self.state();
        state.applications.insert(app.name.clone(), app.clone());
        state.writes += 1;
        Ok(())
    }

    async fn delete_application(&self, name: &str) -> Result<()> {
        let mut state = self.state();
        if state.applications.remove(name).is_some() {
            state.writes += 1;
        }
        Ok(())
    }
}
