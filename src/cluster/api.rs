// file: src/cluster/api.rs
// version: 1.0.0
// guid: 8f3f939a-3cd0-4e20-a32a-5c6e9e8802c6

//! Cluster access through the platform API server

use super::resources::API_VERSION;
use super::{AppPhase, Application, ClusterClient, Component, RawDefinition};
use crate::config::ClusterConfig;
use crate::registry::CapabilityKind;
use crate::{Result, VelaError};
use chrono::{DateTime, Utc};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

#[derive(Debug, Deserialize)]
struct ObjectList<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApplicationMeta {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    resource_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    creation_timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ApplicationSpec {
    #[serde(default)]
    components: Vec<Component>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ApplicationStatus {
    #[serde(default)]
    phase: AppPhase,
}

/// Application as served by the API server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApplicationObject {
    api_version: String,
    kind: String,
    metadata: ApplicationMeta,
    #[serde(default)]
    spec: ApplicationSpec,
    #[serde(default)]
    status: ApplicationStatus,
}

impl ApplicationObject {
    fn from_application(app: &Application, namespace: &str, resource_version: Option<String>) -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: "Application".to_string(),
            metadata: ApplicationMeta {
                name: app.name.clone(),
                namespace: Some(namespace.to_string()),
                resource_version,
                creation_timestamp: app.created_at,
            },
            spec: ApplicationSpec {
                components: app.components.clone(),
            },
            status: ApplicationStatus { phase: app.phase },
        }
    }
}

impl From<ApplicationObject> for Application {
    fn from(object: ApplicationObject) -> Self {
        Self {
            name: object.metadata.name,
            phase: object.status.phase,
            created_at: object.metadata.creation_timestamp,
            components: object.spec.components,
        }
    }
}

/// Cluster client speaking to the platform API server over HTTP
pub struct ApiCluster {
    client: reqwest::Client,
    base: Url,
    server: String,
    token: Option<String>,
    namespace: String,
}

impl ApiCluster {
    pub fn new(
        server: &str,
        token: Option<String>,
        namespace: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let parsed = Url::parse(server)
            .map_err(|e| VelaError::config(format!("Invalid API server URL {}: {}", server, e)))?;
        if parsed.cannot_be_a_base() {
            return Err(VelaError::config(format!("Invalid API server URL {}", server)));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("vela/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            server: parsed.as_str().trim_end_matches('/').to_string(),
            base: parsed,
            token,
            namespace: namespace.into(),
        })
    }

    pub fn from_config(config: &ClusterConfig) -> Result<Self> {
        let server = config
            .api_server
            .as_deref()
            .ok_or_else(|| VelaError::config("api backend requires cluster.api_server"))?;

        Self::new(
            server,
            config.token.clone(),
            config.namespace.clone(),
            Duration::from_secs(config.timeout_seconds),
        )
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    /// Resource URL under `/apis/<group>/<version>`. Each segment is
    /// percent-encoded, so names cannot add path components.
    fn resource_url<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| VelaError::config(format!("API server URL {} cannot carry a path", self.server)))?
            .pop_if_empty()
            .push("apis")
            .extend(API_VERSION.split('/'))
            .extend(segments);
        Ok(url)
    }

    fn definitions_url(&self, kind: CapabilityKind, name: Option<&str>) -> Result<Url> {
        self.resource_url(std::iter::once(kind.plural()).chain(name))
    }

    fn applications_url(&self, name: Option<&str>) -> Result<Url> {
        self.resource_url(
            ["namespaces", self.namespace.as_str(), "applications"]
                .into_iter()
                .chain(name),
        )
    }

    fn request(&self, method: Method, url: &Url) -> RequestBuilder {
        debug!("{} {}", method, url);
        let builder = self.client.request(method, url.clone());
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// GET a resource; 404 maps to `None`
    async fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<Option<T>> {
        let response = self.request(Method::GET, url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = expect_success(response, url).await?;
        Ok(Some(response.json().await?))
    }

    async fn get_application_object(&self, name: &str) -> Result<Option<ApplicationObject>> {
        self.get_json(&self.applications_url(Some(name))?).await
    }
}

async fn expect_success(response: Response, url: &Url) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(VelaError::cluster(format!(
            "access to {} denied ({})",
            url, status
        ))),
        _ => Err(VelaError::cluster(format!(
            "{} returned {}: {}",
            url,
            status,
            body.trim()
        ))),
    }
}

#[async_trait::async_trait]
impl ClusterClient for ApiCluster {
    fn backend_name(&self) -> &str {
        "api"
    }

    async fn list_definitions(&self, kind: CapabilityKind) -> Result<Vec<RawDefinition>> {
        let list: Option<ObjectList<RawDefinition>> =
            self.get_json(&self.definitions_url(kind, None)?).await?;
        Ok(list.map(|l| l.items).unwrap_or_default())
    }

    async fn get_definition(&self, kind: CapabilityKind, name: &str) -> Result<Option<RawDefinition>> {
        self.get_json(&self.definitions_url(kind, Some(name))?).await
    }

    async fn list_applications(&self) -> Result<Vec<Application>> {
        let list: Option<ObjectList<ApplicationObject>> =
            self.get_json(&self.applications_url(None)?).await?;
        Ok(list
            .map(|l| l.items.into_iter().map(Application::from).collect())
            .unwrap_or_default())
    }

    async fn get_application(&self, name: &str) -> Result<Option<Application>> {
        Ok(self.get_application_object(name).await?.map(Application::from))
    }

    async fn apply_application(&self, app: &Application) -> Result<()> {
        let existing = self.get_application_object(&app.name).await?;

        let (method, url, resource_version) = match existing {
            Some(object) => (
                Method::PUT,
                self.applications_url(Some(&app.name))?,
                object.metadata.resource_version,
            ),
            None => (Method::POST, self.applications_url(None)?, None),
        };

        let body = ApplicationObject::from_application(app, &self.namespace, resource_version);
        let response = self.request(method, &url).json(&body).send().await?;
        expect_success(response, &url).await?;
        Ok(())
    }

    async fn delete_application(&self, name: &str) -> Result<()> {
        let url = self.applications_url(Some(name))?;
        let response = self.request(Method::DELETE, &url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        expect_success(response, &url).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cluster() -> ApiCluster {
        ApiCluster::new("https://cluster.example.com:6443/", None, "default", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_resource_urls() {
        let cluster = cluster();

        assert_eq!(
            cluster.definitions_url(CapabilityKind::Trait, Some("scaler")).unwrap().as_str(),
            "https://cluster.example.com:6443/apis/core.oam.dev/v1alpha2/traitdefinitions/scaler"
        );
        assert_eq!(
            cluster.applications_url(None).unwrap().as_str(),
            "https://cluster.example.com:6443/apis/core.oam.dev/v1alpha2/namespaces/default/applications"
        );
    }

    #[test]
    fn test_names_cannot_add_path_segments() {
        let cluster = cluster();

        let url = cluster.applications_url(Some("../../secrets/x")).unwrap();

        assert_eq!(
            url.as_str(),
            "https://cluster.example.com:6443/apis/core.oam.dev/v1alpha2/namespaces/default/applications/..%2F..%2Fsecrets%2Fx"
        );
    }

    #[test]
    fn test_invalid_server_url() {
        let result = ApiCluster::new("not a url", None, "default", Duration::from_secs(5));
        assert!(matches!(result, Err(VelaError::Config(_))));
    }

    #[test]
    fn test_application_object_conversion() {
        // Arrange
        let object: ApplicationObject = serde_json::from_value(json!({
            "apiVersion": "core.oam.dev/v1alpha2",
            "kind": "Application",
            "metadata": {"name": "shop", "namespace": "default", "resourceVersion": "42"},
            "spec": {"components": [
                {"name": "web", "workload": "containerized", "traits": [
                    {"name": "scaler", "properties": {"replicas": 3}}
                ]}
            ]},
            "status": {"phase": "running"}
        }))
        .unwrap();

        // Act
        let app = Application::from(object);
        let back = ApplicationObject::from_application(&app, "default", Some("42".to_string()));

        // Assert
        assert_eq!(app.phase, AppPhase::Running);
        assert_eq!(app.component("web").unwrap().traits.len(), 1);
        assert_eq!(back.metadata.resource_version.as_deref(), Some("42"));
        assert_eq!(back.spec.components, app.components);
    }

    #[test]
    fn test_definition_list_shape() {
        let list: ObjectList<RawDefinition> = serde_json::from_value(json!({
            "items": [{
                "apiVersion": "core.oam.dev/v1alpha2",
                "kind": "WorkloadDefinition",
                "metadata": {"name": "containerized"},
                "spec": {"definitionRef": {"name": "containerizedworkloads.core.oam.dev"}}
            }]
        }))
        .unwrap();

        assert_eq!(list.items.len(), 1);
        assert_eq!(list.items[0].capability_kind(), Some(CapabilityKind::Workload));
    }
}
