// file: src/cluster/resources.rs
// version: 1.0.0
// guid: 7031298f-3a19-48cd-b5c9-a90d97e126ad

//! Resource shapes exchanged with the cluster

use crate::registry::CapabilityKind;
use crate::schema::ParameterBindings;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const API_VERSION: &str = "core.oam.dev/v1alpha2";

fn default_api_version() -> String {
    API_VERSION.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

/// A definition as stored in the cluster. Only the envelope is typed; the
/// spec is interpreted by the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDefinition {
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: serde_json::Value,
}

impl RawDefinition {
    pub fn new(kind: CapabilityKind, name: impl Into<String>, spec: serde_json::Value) -> Self {
        Self {
            api_version: default_api_version(),
            kind: kind.resource_kind().to_string(),
            metadata: ObjectMeta {
                name: name.into(),
                annotations: BTreeMap::new(),
            },
            spec,
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Capability kind named by the envelope, if recognizable
    pub fn capability_kind(&self) -> Option<CapabilityKind> {
        [CapabilityKind::Workload, CapabilityKind::Trait]
            .into_iter()
            .find(|kind| kind.resource_kind() == self.kind)
    }
}

/// Lifecycle phase of an application as reported by the platform
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppPhase {
    #[default]
    Pending,
    Running,
    Failed,
    Deleting,
}

impl AppPhase {
    /// Whether components and traits of the application may be changed
    pub fn accepts_modification(&self) -> bool {
        !matches!(self, AppPhase::Deleting)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AppPhase::Pending => "pending",
            AppPhase::Running => "running",
            AppPhase::Failed => "failed",
            AppPhase::Deleting => "deleting",
        }
    }
}

impl fmt::Display for AppPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A trait attached to a component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraitBinding {
    pub name: String,
    #[serde(default)]
    pub properties: ParameterBindings,
}

/// A component of an application, running one workload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub name: String,
    pub workload: String,
    #[serde(default)]
    pub settings: ParameterBindings,
    #[serde(default)]
    pub traits: Vec<TraitBinding>,
}

impl Component {
    pub fn trait_binding(&self, name: &str) -> Option<&TraitBinding> {
        self.traits.iter().find(|t| t.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub name: String,
    #[serde(default)]
    pub phase: AppPhase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub components: Vec<Component>,
}

impl Application {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phase: AppPhase::Pending,
            created_at: Some(Utc::now()),
            components: Vec::new(),
        }
    }

    pub fn component(&self, name: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.name == name)
    }

    pub fn component_mut(&mut self, name: &str) -> Option<&mut Component> {
        self.components.iter_mut().find(|c| c.name == name)
    }
}

/// Identity of a capability instance; at most one live instance exists per
/// identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceIdentity {
    pub application: String,
    pub component: String,
    pub kind: CapabilityKind,
    pub name: String,
}

impl InstanceIdentity {
    pub fn new_trait(
        application: impl Into<String>,
        component: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            application: application.into(),
            component: component.into(),
            kind: CapabilityKind::Trait,
            name: name.into(),
        }
    }
}

impl fmt::Display for InstanceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} {}/{}", self.application, self.component, self.kind, self.name)
    }
}

/// A trait with bound parameters attached to a component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityInstance {
    pub identity: InstanceIdentity,
    pub params: ParameterBindings,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ParamValue;

    #[test]
    fn test_application_yaml_shape() {
        // Arrange
        let yaml = r#"
name: shop
phase: running
components:
  - name: web
    workload: containerized
    settings:
      image: nginx
      port: 80
    traits:
      - name: scaler
        properties:
          replicas: 3
"#;

        // Act
        let app: Application = serde_yaml::from_str(yaml).unwrap();

        // Assert
        assert_eq!(app.phase, AppPhase::Running);
        let web = app.component("web").unwrap();
        assert_eq!(web.settings["port"], ParamValue::Int(80));
        assert_eq!(
            web.trait_binding("scaler").unwrap().properties["replicas"],
            ParamValue::Int(3)
        );
    }

    #[test]
    fn test_phase_modification_rules() {
        assert!(AppPhase::Pending.accepts_modification());
        assert!(AppPhase::Running.accepts_modification());
        assert!(AppPhase::Failed.accepts_modification());
        assert!(!AppPhase::Deleting.accepts_modification());
    }

    #[test]
    fn test_identity_display() {
        let identity = InstanceIdentity::new_trait("shop", "web", "scaler");
        assert_eq!(identity.to_string(), "shop/web trait/scaler");
    }

    #[test]
    fn test_raw_definition_kind() {
        let raw: RawDefinition = serde_yaml::from_str(
            "kind: TraitDefinition\nmetadata:\n  name: scaler\nspec: {}\n",
        )
        .unwrap();
        assert_eq!(raw.capability_kind(), Some(CapabilityKind::Trait));
        assert_eq!(raw.api_version, API_VERSION);
    }
}
