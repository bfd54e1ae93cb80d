// file: src/cluster/mod.rs
// version: 1.0.0
// guid: 4c0d57d2-1782-4315-beda-e9ac68e209f2

//! Cluster resource access
//!
//! [`ClusterClient`] is the only way the rest of the crate reads or writes
//! cluster state. Backends implement the definition and application calls;
//! the instance-level calls used by the attachment engine are provided on top
//! of them as read-modify-write of the owning application.

pub mod api;
pub mod local;
pub mod memory;
pub mod resources;

pub use api::ApiCluster;
pub use local::LocalCluster;
pub use memory::MemoryCluster;
pub use resources::{
    AppPhase, Application, CapabilityInstance, Component, InstanceIdentity, ObjectMeta,
    RawDefinition, TraitBinding,
};

use crate::config::{Backend, ClusterConfig};
use crate::registry::CapabilityKind;
use crate::{Result, VelaError};
use std::sync::Arc;
use tracing::info;

/// Access to definitions and applications stored in the cluster.
///
/// Calls are not retried here; timeouts and transport errors surface as
/// [`VelaError`]s to the caller.
#[async_trait::async_trait]
pub trait ClusterClient: Send + Sync {
    /// Name of the backend for log output
    fn backend_name(&self) -> &str;

    async fn list_definitions(&self, kind: CapabilityKind) -> Result<Vec<RawDefinition>>;

    async fn get_definition(&self, kind: CapabilityKind, name: &str) -> Result<Option<RawDefinition>>;

    async fn list_applications(&self) -> Result<Vec<Application>>;

    async fn get_application(&self, name: &str) -> Result<Option<Application>>;

    /// Create or replace an application
    async fn apply_application(&self, app: &Application) -> Result<()>;

    /// Remove an application; absent applications are not an error
    async fn delete_application(&self, name: &str) -> Result<()>;

    async fn read_instance(&self, identity: &InstanceIdentity) -> Result<Option<CapabilityInstance>> {
        let Some(app) = self.get_application(&identity.application).await? else {
            return Ok(None);
        };

        Ok(app
            .component(&identity.component)
            .and_then(|component| component.trait_binding(&identity.name))
            .map(|binding| CapabilityInstance {
                identity: identity.clone(),
                params: binding.properties.clone(),
            }))
    }

    /// Upsert an instance on its component
    async fn apply_instance(&self, instance: &CapabilityInstance) -> Result<()> {
        let identity = &instance.identity;
        let mut app = self
            .get_application(&identity.application)
            .await?
            .ok_or_else(|| VelaError::cluster(format!("application {} does not exist", identity.application)))?;

        let component = app.component_mut(&identity.component).ok_or_else(|| {
            VelaError::cluster(format!(
                "component {} does not exist in application {}",
                identity.component, identity.application
            ))
        })?;

        match component.traits.iter_mut().find(|t| t.name == identity.name) {
            Some(binding) => binding.properties = instance.params.clone(),
            None => component.traits.push(TraitBinding {
                name: identity.name.clone(),
                properties: instance.params.clone(),
            }),
        }

        self.apply_application(&app).await
    }

    async fn delete_instance(&self, identity: &InstanceIdentity) -> Result<()> {
        let Some(mut app) = self.get_application(&identity.application).await? else {
            return Ok(());
        };
        let Some(component) = app.component_mut(&identity.component) else {
            return Ok(());
        };

        let before = component.traits.len();
        component.traits.retain(|t| t.name != identity.name);
        if component.traits.len() == before {
            return Ok(());
        }

        self.apply_application(&app).await
    }
}

/// Build the cluster client selected by configuration
pub async fn connect(config: &ClusterConfig) -> Result<Arc<dyn ClusterClient>> {
    match config.backend {
        Backend::Local => {
            let home = config.home_dir();
            info!("Using local cluster store at {}", home.display());
            let cluster = LocalCluster::new(home);
            cluster.init().await?;
            Ok(Arc::new(cluster))
        }
        Backend::Api => {
            let cluster = ApiCluster::from_config(config)?;
            info!("Using cluster API server at {}", cluster.server());
            Ok(Arc::new(cluster))
        }
    }
}
