// file: src/engine/workload.rs
// version: 1.0.0
// guid: 3d7a0e58-94c1-4f2b-8a65-c0e9b2d71f46

//! Workload creation
//!
//! Adds a component running a workload to an application, creating the
//! application when it does not exist yet. Follows the same
//! `Requested -> Validated -> Applied -> Confirmed` machine as attach.

use super::{log_rollback, ApplyPhase, AttachmentEngine, Rollback, Transitions};
use crate::cluster::{Application, Component};
use crate::registry::validate_target_name;
use crate::schema::{describe_bindings, ParameterBindings};
use crate::{Result, VelaError};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct WorkloadRequest {
    pub application: String,
    pub component: String,
    /// Name of the workload definition
    pub workload: String,
    pub settings: ParameterBindings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkloadOutcome {
    pub request_id: Uuid,
    pub application: String,
    pub component: String,
    pub workload: String,
    pub created_application: bool,
    /// Settings of the component before the update, if it existed
    pub previous: Option<ParameterBindings>,
    pub phases: Vec<ApplyPhase>,
}

impl AttachmentEngine {
    /// Create a component, or update the settings of an existing one
    pub async fn create_workload(&self, request: WorkloadRequest) -> Result<WorkloadOutcome> {
        let mut run = Transitions::start(
            format!("workload {} for {}/{}", request.workload, request.application, request.component),
            ApplyPhase::Requested,
        );

        match self.run_create_workload(&request, &mut run).await {
            Ok(mut outcome) => {
                outcome.request_id = run.request_id;
                outcome.phases = run.phases;
                Ok(outcome)
            }
            Err(e) => {
                run.fail(&e);
                Err(e)
            }
        }
    }

    async fn run_create_workload(
        &self,
        request: &WorkloadRequest,
        run: &mut Transitions<ApplyPhase>,
    ) -> Result<WorkloadOutcome> {
        validate_target_name("application", &request.application)?;
        validate_target_name("component", &request.component)?;

        let subject = format!("{}/{}", request.application, request.component);
        let prior = self
            .guarded(&subject, self.cluster.get_application(&request.application))
            .await?;

        if let Some(app) = &prior {
            if !app.phase.accepts_modification() {
                return Err(VelaError::TargetNotReady {
                    target: format!("application {}", app.name),
                    phase: app.phase.to_string(),
                });
            }
            if let Some(existing) = app.component(&request.component) {
                if existing.workload != request.workload {
                    return Err(VelaError::validation(format!(
                        "component {} of application {} runs workload {}, not {}",
                        existing.name, app.name, existing.workload, request.workload
                    )));
                }
            }
        }
        run.enter(ApplyPhase::Validated);

        let previous = prior
            .as_ref()
            .and_then(|app| app.component(&request.component))
            .map(|c| c.settings.clone());

        let mut updated = prior
            .clone()
            .unwrap_or_else(|| Application::new(&request.application));
        match updated.component_mut(&request.component) {
            Some(component) => component.settings = request.settings.clone(),
            None => updated.components.push(Component {
                name: request.component.clone(),
                workload: request.workload.clone(),
                settings: request.settings.clone(),
                traits: Vec::new(),
            }),
        }

        self.cluster.apply_application(&updated).await?;
        run.enter(ApplyPhase::Applied);

        if let Err(failure) = self.confirm(self.check_component(request)).await {
            run.enter(ApplyPhase::Failed);
            let rollback = self.restore_application(&request.application, prior.as_ref()).await;
            if rollback == Rollback::Restored {
                run.enter(ApplyPhase::RolledBack);
            }
            return Err(failure.into_error(subject, rollback));
        }
        run.enter(ApplyPhase::Confirmed);

        info!(
            "Applied component {} ({}) in application {} ({})",
            request.component,
            request.workload,
            request.application,
            describe_bindings(&request.settings)
        );

        Ok(WorkloadOutcome {
            request_id: run.request_id,
            application: request.application.clone(),
            component: request.component.clone(),
            workload: request.workload.clone(),
            created_application: prior.is_none(),
            previous,
            phases: Vec::new(),
        })
    }

    async fn check_component(&self, request: &WorkloadRequest) -> std::result::Result<(), String> {
        let app = match self.cluster.get_application(&request.application).await {
            Ok(Some(app)) => app,
            Ok(None) => return Err("application missing after write".to_string()),
            Err(e) => return Err(format!("read-back failed: {}", e)),
        };

        match app.component(&request.component) {
            Some(c) if c.workload == request.workload && c.settings == request.settings => Ok(()),
            Some(c) => Err(format!(
                "stored component differs: expected {} ({}), found {} ({})",
                request.workload,
                describe_bindings(&request.settings),
                c.workload,
                describe_bindings(&c.settings)
            )),
            None => Err("component missing after write".to_string()),
        }
    }

    async fn restore_application(&self, name: &str, prior: Option<&Application>) -> Rollback {
        let result = match prior {
            Some(app) => self
                .cluster
                .apply_application(app)
                .await
                .map(|_| Rollback::Restored),
            None => self
                .cluster
                .delete_application(name)
                .await
                .map(|_| Rollback::Removed),
        };

        log_rollback(&format!("application {}", name), result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{AppPhase, ClusterClient, MemoryCluster};
    use crate::schema::ParamValue;
    use std::sync::Arc;

    fn nginx(port: i64) -> ParameterBindings {
        let mut settings = ParameterBindings::new();
        settings.insert("image".to_string(), ParamValue::Str("nginx".to_string()));
        settings.insert("port".to_string(), ParamValue::Int(port));
        settings
    }

    fn request(workload: &str, port: i64) -> WorkloadRequest {
        WorkloadRequest {
            application: "shop".to_string(),
            component: "web".to_string(),
            workload: workload.to_string(),
            settings: nginx(port),
        }
    }

    #[tokio::test]
    async fn test_creates_missing_application() {
        // Arrange
        let cluster = Arc::new(MemoryCluster::new());
        let engine = AttachmentEngine::new(cluster.clone());

        // Act
        let outcome = engine.create_workload(request("containerized", 80)).await.unwrap();

        // Assert
        assert!(outcome.created_application);
        assert_eq!(outcome.phases.last(), Some(&ApplyPhase::Confirmed));
        let app = cluster.get_application("shop").await.unwrap().unwrap();
        assert_eq!(app.phase, AppPhase::Pending);
        assert_eq!(app.component("web").unwrap().settings, nginx(80));
    }

    #[tokio::test]
    async fn test_update_keeps_traits() {
        // Arrange
        let cluster = Arc::new(MemoryCluster::new());
        let engine = AttachmentEngine::new(cluster.clone());
        engine.create_workload(request("containerized", 80)).await.unwrap();
        let mut app = cluster.get_application("shop").await.unwrap().unwrap();
        app.component_mut("web").unwrap().traits.push(crate::cluster::TraitBinding {
            name: "scaler".to_string(),
            properties: ParameterBindings::new(),
        });
        cluster.apply_application(&app).await.unwrap();

        // Act
        let outcome = engine.create_workload(request("containerized", 8080)).await.unwrap();

        // Assert
        assert!(!outcome.created_application);
        assert_eq!(outcome.previous, Some(nginx(80)));
        let app = cluster.get_application("shop").await.unwrap().unwrap();
        let web = app.component("web").unwrap();
        assert_eq!(web.settings, nginx(8080));
        assert_eq!(web.traits.len(), 1);
    }

    #[tokio::test]
    async fn test_workload_type_cannot_change() {
        let cluster = Arc::new(MemoryCluster::new());
        let engine = AttachmentEngine::new(cluster.clone());
        engine.create_workload(request("containerized", 80)).await.unwrap();
        let writes = cluster.write_count();

        let err = engine.create_workload(request("task", 80)).await.unwrap_err();

        assert!(matches!(err, VelaError::Validation(ref msg) if msg.contains("runs workload containerized")));
        assert_eq!(cluster.write_count(), writes);
    }

    #[tokio::test]
    async fn test_path_like_names_are_rejected_before_io() {
        let cluster = Arc::new(MemoryCluster::new());
        let engine = AttachmentEngine::new(cluster.clone());
        let mut escaping = request("containerized", 80);
        escaping.application = "../../escaped".to_string();
        let mut nested = request("containerized", 80);
        nested.component = "web/extra".to_string();

        let app_err = engine.create_workload(escaping).await.unwrap_err();
        let component_err = engine.create_workload(nested).await.unwrap_err();

        assert!(matches!(app_err, VelaError::Validation(ref msg) if msg.contains("../../escaped")));
        assert!(matches!(component_err, VelaError::Validation(_)));
        assert_eq!(cluster.write_count(), 0);
    }

    #[tokio::test]
    async fn test_deleting_application_is_not_ready() {
        let cluster = Arc::new(MemoryCluster::new());
        let mut app = Application::new("shop");
        app.phase = AppPhase::Deleting;
        cluster.apply_application(&app).await.unwrap();
        let engine = AttachmentEngine::new(cluster);

        let err = engine.create_workload(request("containerized", 80)).await.unwrap_err();

        assert!(matches!(err, VelaError::TargetNotReady { .. }));
    }
}
