// file: src/cluster/local.rs
// version: 1.0.0
// guid: 80fadfb8-5ae9-4d2f-9027-e553de633453

//! File-backed cluster store
//!
//! Layout under the home directory:
//!
//! ```text
//! definitions/workloads/<name>.yaml
//! definitions/traits/<name>.yaml
//! applications/<name>.yaml
//! ```

use super::{Application, ClusterClient, RawDefinition};
use crate::registry::CapabilityKind;
use crate::{Result, VelaError};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Cluster store kept as YAML files on local disk
#[derive(Debug, Clone)]
pub struct LocalCluster {
    root: PathBuf,
}

impl LocalCluster {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the store directories if missing
    pub async fn init(&self) -> Result<()> {
        for kind in [CapabilityKind::Workload, CapabilityKind::Trait] {
            fs::create_dir_all(self.definitions_dir(kind)).await?;
        }
        fs::create_dir_all(self.applications_dir()).await?;
        Ok(())
    }

    pub fn definitions_dir(&self, kind: CapabilityKind) -> PathBuf {
        self.root.join("definitions").join(kind.dir_name())
    }

    pub fn applications_dir(&self) -> PathBuf {
        self.root.join("applications")
    }

    fn application_path(&self, name: &str) -> PathBuf {
        self.applications_dir().join(format!("{}.yaml", name))
    }

    /// Store a definition file
    pub async fn write_definition(&self, kind: CapabilityKind, raw: &RawDefinition) -> Result<()> {
        let path = self.definitions_dir(kind).join(format!("{}.yaml", raw.name()));
        write_atomic(&path, &serde_yaml::to_string(raw)?).await
    }

    async fn yaml_files(dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(files),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_yaml = matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("yaml") | Some("yml")
            );
            if is_yaml && entry.file_type().await?.is_file() {
                files.push(path);
            }
        }

        files.sort();
        Ok(files)
    }

    async fn read_definition(path: &Path) -> Result<RawDefinition> {
        let content = fs::read_to_string(path).await?;
        serde_yaml::from_str(&content).map_err(|e| {
            VelaError::cluster(format!("malformed definition {}: {}", path.display(), e))
        })
    }

    async fn read_application(path: &Path) -> Result<Application> {
        let content = fs::read_to_string(path).await?;
        serde_yaml::from_str(&content).map_err(|e| {
            VelaError::cluster(format!("malformed application {}: {}", path.display(), e))
        })
    }
}

/// Write through a sibling temp file so readers never see a partial document
async fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let tmp = path.with_extension("yaml.tmp");
    fs::write(&tmp, content).await?;
    fs::rename(&tmp, path).await?;
    debug!("Wrote {}", path.display());
    Ok(())
}

#[async_trait::async_trait]
impl ClusterClient for LocalCluster {
    fn backend_name(&self) -> &str {
        "local"
    }

    async fn list_definitions(&self, kind: CapabilityKind) -> Result<Vec<RawDefinition>> {
        let mut definitions = Vec::new();
        for path in Self::yaml_files(&self.definitions_dir(kind)).await? {
            definitions.push(Self::read_definition(&path).await?);
        }
        Ok(definitions)
    }

    async fn get_definition(&self, kind: CapabilityKind, name: &str) -> Result<Option<RawDefinition>> {
        let definitions = self.list_definitions(kind).await?;
        Ok(definitions.into_iter().find(|d| d.name() == name))
    }

    async fn list_applications(&self) -> Result<Vec<Application>> {
        let mut applications = Vec::new();
        for path in Self::yaml_files(&self.applications_dir()).await? {
            applications.push(Self::read_application(&path).await?);
        }
        applications.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(applications)
    }

    async fn get_application(&self, name: &str) -> Result<Option<Application>> {
        let path = self.application_path(name);
        if !fs::try_exists(&path).await? {
            return Ok(None);
        }
        Self::read_application(&path).await.map(Some)
    }

    async fn apply_application(&self, app: &Application) -> Result<()> {
        fs::create_dir_all(self.applications_dir()).await?;
        write_atomic(&self.application_path(&app.name), &serde_yaml::to_string(app)?).await
    }

    async fn delete_application(&self, name: &str) -> Result<()> {
        match fs::remove_file(self.application_path(name)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
