// file: src/engine/mod.rs
// version: 1.0.0
// guid: 9f3b6c1e-52d4-4a8e-b7d0-6e21c4a9f830

//! Attachment engine
//!
//! Applies and removes capability instances on application components. Every
//! request walks an explicit state machine:
//!
//! - attach: `Requested -> Validated -> Applied -> Confirmed`, with `Failed`
//!   reachable from any non-terminal state and `RolledBack` reachable only
//!   from `Failed` when a prior instance was restored
//! - detach: `Requested -> Validated -> Removed -> Confirmed`
//!
//! Nothing is written before `Validated`. A failed or interrupted
//! confirmation triggers a best-effort rollback whose result is carried in
//! the returned error.

pub mod interrupt;
pub mod workload;

pub use interrupt::{Interrupt, InterruptTrigger};
pub use workload::{WorkloadOutcome, WorkloadRequest};

use crate::cluster::{AppPhase, Application, CapabilityInstance, ClusterClient, InstanceIdentity};
use crate::registry::{admits_workload, validate_target_name, CapabilityDefinition};
use crate::schema::{describe_bindings, ParameterBindings};
use crate::{Result, VelaError};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// States of an attach or workload request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyPhase {
    Requested,
    Validated,
    Applied,
    Confirmed,
    Failed,
    RolledBack,
}

/// States of a detach request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetachPhase {
    Requested,
    Validated,
    Removed,
    Confirmed,
    Failed,
}

trait Phase: fmt::Debug + Copy + PartialEq {
    const FAILED: Self;
}

impl Phase for ApplyPhase {
    const FAILED: Self = ApplyPhase::Failed;
}

impl Phase for DetachPhase {
    const FAILED: Self = DetachPhase::Failed;
}

/// Transition trail of a single request
struct Transitions<P> {
    request_id: Uuid,
    subject: String,
    phases: Vec<P>,
}

impl<P: Phase> Transitions<P> {
    fn start(subject: impl Into<String>, initial: P) -> Self {
        let request_id = Uuid::new_v4();
        let subject = subject.into();
        debug!(request_id = %request_id, phase = ?initial, "{}", subject);

        Self {
            request_id,
            subject,
            phases: vec![initial],
        }
    }

    fn enter(&mut self, phase: P) {
        debug!(
            request_id = %self.request_id,
            from = ?self.phases.last(),
            to = ?phase,
            "{}",
            self.subject
        );
        self.phases.push(phase);
    }

    fn fail(&mut self, error: &VelaError) {
        if !self.phases.contains(&P::FAILED) {
            self.enter(P::FAILED);
        }
        debug!(request_id = %self.request_id, "{} failed: {}", self.subject, error);
    }
}

/// Result of undoing a write that could not be confirmed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rollback {
    /// The prior state was written back
    Restored,
    /// What the request created was removed
    Removed,
    /// Nothing had been written
    NotNeeded,
    Failed(String),
}

impl fmt::Display for Rollback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rollback::Restored => f.write_str("previous state restored"),
            Rollback::Removed => f.write_str("partial changes removed"),
            Rollback::NotNeeded => f.write_str("no changes were made"),
            Rollback::Failed(reason) => write!(f, "rollback failed: {}", reason),
        }
    }
}

/// Why a write could not be confirmed
enum Unconfirmed {
    Interrupted,
    Mismatch(String),
}

impl Unconfirmed {
    fn into_error(self, identity: String, rollback: Rollback) -> VelaError {
        match self {
            Unconfirmed::Interrupted => VelaError::Interrupted {
                identity,
                rollback: rollback.to_string(),
            },
            Unconfirmed::Mismatch(reason) => VelaError::ConfirmationFailed {
                identity,
                reason,
                rollback: rollback.to_string(),
            },
        }
    }
}

/// Request to attach a trait to a component, or update it in place
#[derive(Debug, Clone, PartialEq)]
pub struct AttachmentRequest {
    pub application: String,
    /// Omitted when the application has a single component
    pub component: Option<String>,
    pub trait_name: String,
    /// Workloads the trait may be attached to; empty admits any
    pub applies_to: Vec<String>,
    pub params: ParameterBindings,
}

impl AttachmentRequest {
    pub fn new(
        definition: &CapabilityDefinition,
        application: impl Into<String>,
        component: Option<String>,
        params: ParameterBindings,
    ) -> Self {
        Self {
            application: application.into(),
            component,
            trait_name: definition.name.clone(),
            applies_to: definition.applies_to.clone(),
            params,
        }
    }

    fn admits(&self, workload: &str) -> bool {
        admits_workload(&self.applies_to, workload)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetachmentRequest {
    pub application: String,
    pub component: Option<String>,
    pub trait_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttachmentOutcome {
    pub request_id: Uuid,
    pub identity: InstanceIdentity,
    pub params: ParameterBindings,
    /// Parameters of the instance that was replaced, if any
    pub previous: Option<ParameterBindings>,
    pub phases: Vec<ApplyPhase>,
    pub warnings: Vec<String>,
}

impl AttachmentOutcome {
    pub fn replaced(&self) -> bool {
        self.previous.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetachmentOutcome {
    pub request_id: Uuid,
    pub identity: InstanceIdentity,
    /// Parameters of the removed instance; `None` when nothing was attached
    pub removed: Option<ParameterBindings>,
    pub phases: Vec<DetachPhase>,
}

/// Applies attach, detach and workload requests against the cluster
#[derive(Clone)]
pub struct AttachmentEngine {
    cluster: Arc<dyn ClusterClient>,
    interrupt: Interrupt,
}

impl AttachmentEngine {
    pub fn new(cluster: Arc<dyn ClusterClient>) -> Self {
        Self {
            cluster,
            interrupt: Interrupt::never(),
        }
    }

    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn cluster(&self) -> &Arc<dyn ClusterClient> {
        &self.cluster
    }

    /// Attach a trait, replacing the parameters of an existing instance
    pub async fn attach(&self, request: AttachmentRequest) -> Result<AttachmentOutcome> {
        let mut run = Transitions::start(
            format!("attach {} to {}", request.trait_name, request.application),
            ApplyPhase::Requested,
        );

        match self.run_attach(&request, &mut run).await {
            Ok(mut outcome) => {
                outcome.request_id = run.request_id;
                outcome.phases = run.phases;
                info!("Attached {} ({})", outcome.identity, describe_bindings(&outcome.params));
                Ok(outcome)
            }
            Err(e) => {
                run.fail(&e);
                Err(e)
            }
        }
    }

    /// Detach a trait; detaching an absent trait succeeds without writing
    pub async fn detach(&self, request: DetachmentRequest) -> Result<DetachmentOutcome> {
        let mut run = Transitions::start(
            format!("detach {} from {}", request.trait_name, request.application),
            DetachPhase::Requested,
        );

        match self.run_detach(&request, &mut run).await {
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

    async fn run_attach(
        &self,
        request: &AttachmentRequest,
        run: &mut Transitions<ApplyPhase>,
    ) -> Result<AttachmentOutcome> {
        let (app, component) = self
            .resolve_target(&request.application, request.component.as_deref(), &run.subject)
            .await?;

        let workload = app
            .component(&component)
            .map(|c| c.workload.clone())
            .unwrap_or_default();
        if !request.admits(&workload) {
            return Err(VelaError::validation(format!(
                "trait {} does not apply to workload {} of component {} (applies to: {})",
                request.trait_name,
                workload,
                component,
                request.applies_to.join(", ")
            )));
        }

        let identity = InstanceIdentity::new_trait(&app.name, &component, &request.trait_name);
        let warnings = phase_warnings(&app);
        run.enter(ApplyPhase::Validated);

        let previous = self
            .guarded(&identity.to_string(), self.cluster.read_instance(&identity))
            .await?
            .map(|instance| instance.params);

        let instance = CapabilityInstance {
            identity: identity.clone(),
            params: request.params.clone(),
        };
        self.cluster.apply_instance(&instance).await?;
        run.enter(ApplyPhase::Applied);

        let check = self.check_instance(&identity, &request.params);
        if let Err(failure) = self.confirm(check).await {
            run.enter(ApplyPhase::Failed);
            let rollback = self.restore_instance(&identity, previous.as_ref()).await;
            if rollback == Rollback::Restored {
                run.enter(ApplyPhase::RolledBack);
            }
            return Err(failure.into_error(identity.to_string(), rollback));
        }
        run.enter(ApplyPhase::Confirmed);

        Ok(AttachmentOutcome {
            request_id: run.request_id,
            identity,
            params: request.params.clone(),
            previous,
            phases: Vec::new(),
            warnings,
        })
    }

    async fn run_detach(
        &self,
        request: &DetachmentRequest,
        run: &mut Transitions<DetachPhase>,
    ) -> Result<DetachmentOutcome> {
        let (app, component) = self
            .resolve_target(&request.application, request.component.as_deref(), &run.subject)
            .await?;
        let identity = InstanceIdentity::new_trait(&app.name, &component, &request.trait_name);
        run.enter(DetachPhase::Validated);

        let existing = self
            .guarded(&identity.to_string(), self.cluster.read_instance(&identity))
            .await?;

        let Some(existing) = existing else {
            info!("{} is not attached; nothing to remove", identity);
            run.enter(DetachPhase::Confirmed);
            return Ok(DetachmentOutcome {
                request_id: run.request_id,
                identity,
                removed: None,
                phases: Vec::new(),
            });
        };

        self.cluster.delete_instance(&identity).await?;
        run.enter(DetachPhase::Removed);

        let reason = match self.cluster.read_instance(&identity).await {
            Ok(None) => None,
            Ok(Some(_)) => Some("instance still present after removal".to_string()),
            Err(e) => Some(format!("read-back failed: {}", e)),
        };
        if let Some(reason) = reason {
            return Err(VelaError::ConfirmationFailed {
                identity: identity.to_string(),
                reason,
                rollback: Rollback::NotNeeded.to_string(),
            });
        }
        run.enter(DetachPhase::Confirmed);
        info!("Detached {}", identity);

        Ok(DetachmentOutcome {
            request_id: run.request_id,
            identity,
            removed: Some(existing.params),
            phases: Vec::new(),
        })
    }

    /// Fetch the application and pick the component a request targets
    async fn resolve_target(
        &self,
        application: &str,
        component: Option<&str>,
        subject: &str,
    ) -> Result<(Application, String)> {
        validate_target_name("application", application)?;
        if let Some(name) = component {
            validate_target_name("component", name)?;
        }

        let app = self
            .guarded(subject, self.cluster.get_application(application))
            .await?
            .ok_or_else(|| VelaError::target_not_found(format!("application {}", application)))?;

        if !app.phase.accepts_modification() {
            return Err(VelaError::TargetNotReady {
                target: format!("application {}", app.name),
                phase: app.phase.to_string(),
            });
        }

        let component = match component {
            Some(name) => app
                .component(name)
                .map(|c| c.name.clone())
                .ok_or_else(|| {
                    VelaError::target_not_found(format!(
                        "component {} in application {}",
                        name, app.name
                    ))
                })?,
            None => match app.components.as_slice() {
                [only] => only.name.clone(),
                [] => {
                    return Err(VelaError::target_not_found(format!(
                        "application {} has no components",
                        app.name
                    )))
                }
                many => {
                    return Err(VelaError::target_not_found(format!(
                        "application {} has {} components; name one of: {}",
                        app.name,
                        many.len(),
                        many.iter().map(|c| c.name.as_str()).collect::<Vec<_>>().join(", ")
                    )))
                }
            },
        };

        Ok((app, component))
    }

    /// Run a read that must not start once the process is interrupted
    async fn guarded<T>(&self, subject: &str, call: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::select! {
            biased;
            _ = self.interrupt.triggered() => Err(VelaError::Interrupted {
                identity: subject.to_string(),
                rollback: Rollback::NotNeeded.to_string(),
            }),
            result = call => result,
        }
    }

    /// Await a read-back check, giving up if the process is interrupted
    async fn confirm(
        &self,
        check: impl Future<Output = std::result::Result<(), String>>,
    ) -> std::result::Result<(), Unconfirmed> {
        tokio::select! {
            biased;
            _ = self.interrupt.triggered() => Err(Unconfirmed::Interrupted),
            result = check => result.map_err(Unconfirmed::Mismatch),
        }
    }

    async fn check_instance(
        &self,
        identity: &InstanceIdentity,
        expected: &ParameterBindings,
    ) -> std::result::Result<(), String> {
        match self.cluster.read_instance(identity).await {
            Ok(Some(instance)) if &instance.params == expected => Ok(()),
            Ok(Some(instance)) => Err(format!(
                "stored values differ: expected ({}), found ({})",
                describe_bindings(expected),
                describe_bindings(&instance.params)
            )),
            Ok(None) => Err("instance missing after write".to_string()),
            Err(e) => Err(format!("read-back failed: {}", e)),
        }
    }

    async fn restore_instance(
        &self,
        identity: &InstanceIdentity,
        previous: Option<&ParameterBindings>,
    ) -> Rollback {
        let result = match previous {
            Some(params) => self
                .cluster
                .apply_instance(&CapabilityInstance {
                    identity: identity.clone(),
                    params: params.clone(),
                })
                .await
                .map(|_| Rollback::Restored),
            None => self
                .cluster
                .delete_instance(identity)
                .await
                .map(|_| Rollback::Removed),
        };

        log_rollback(&identity.to_string(), result)
    }
}

fn log_rollback(subject: &str, result: Result<Rollback>) -> Rollback {
    match result {
        Ok(rollback) => {
            warn!("Rolled back {}: {}", subject, rollback);
            rollback
        }
        Err(e) => {
            warn!("Rollback of {} failed: {}", subject, e);
            Rollback::Failed(e.to_string())
        }
    }
}

/// Warnings about applications that will not act on a change right away
fn phase_warnings(app: &Application) -> Vec<String> {
    match app.phase {
        AppPhase::Pending => vec![format!(
            "application {} is pending; the change takes effect once it is running",
            app.name
        )],
        AppPhase::Failed => vec![format!(
            "application {} is failed; the change is recorded but may not take effect",
            app.name
        )],
        AppPhase::Running | AppPhase::Deleting => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{Component, MemoryCluster, RawDefinition};
    use crate::registry::CapabilityKind;
    use crate::schema::ParamValue;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn component(name: &str, workload: &str) -> Component {
        Component {
            name: name.to_string(),
            workload: workload.to_string(),
            settings: ParameterBindings::new(),
            traits: Vec::new(),
        }
    }

    fn shop(phase: AppPhase, components: Vec<Component>) -> Application {
        let mut app = Application::new("shop");
        app.phase = phase;
        app.components = components;
        app
    }

    fn replicas(n: i64) -> ParameterBindings {
        let mut params = ParameterBindings::new();
        params.insert("replicas".to_string(), ParamValue::Int(n));
        params
    }

    fn scaler_request(component: Option<&str>, n: i64) -> AttachmentRequest {
        AttachmentRequest {
            application: "shop".to_string(),
            component: component.map(str::to_string),
            trait_name: "scaler".to_string(),
            applies_to: vec!["containerized".to_string()],
            params: replicas(n),
        }
    }

    fn detach_request() -> DetachmentRequest {
        DetachmentRequest {
            application: "shop".to_string(),
            component: Some("web".to_string()),
            trait_name: "scaler".to_string(),
        }
    }

    async fn seeded(app: Application) -> Arc<MemoryCluster> {
        let cluster = Arc::new(MemoryCluster::new());
        cluster.apply_application(&app).await.unwrap();
        cluster
    }

    /// Accepts writes without storing them once `drop_writes` is set
    struct DroppingCluster {
        inner: MemoryCluster,
        drop_writes: AtomicBool,
    }

    #[async_trait::async_trait]
    impl ClusterClient for DroppingCluster {
        fn backend_name(&self) -> &str {
            "dropping"
        }
        async fn list_definitions(&self, kind: CapabilityKind) -> Result<Vec<RawDefinition>> {
            self.inner.list_definitions(kind).await
        }
        async fn get_definition(&self, kind: CapabilityKind, name: &str) -> Result<Option<RawDefinition>> {
            self.inner.get_definition(kind, name).await
        }
        async fn list_applications(&self) -> Result<Vec<Application>> {
            self.inner.list_applications().await
        }
        async fn get_application(&self, name: &str) -> Result<Option<Application>> {
            self.inner.get_application(name).await
        }
        async fn apply_application(&self, app: &Application) -> Result<()> {
            if self.drop_writes.load(Ordering::SeqCst) {
                return Ok(());
            }
            self.inner.apply_application(app).await
        }
        async fn delete_application(&self, name: &str) -> Result<()> {
            self.inner.delete_application(name).await
        }
    }

    /// Trips the interrupt and hangs on the first read after a write
    struct StallingCluster {
        inner: MemoryCluster,
        trigger: InterruptTrigger,
        armed: AtomicBool,
    }

    #[async_trait::async_trait]
    impl ClusterClient for StallingCluster {
        fn backend_name(&self) -> &str {
            "stalling"
        }
        async fn list_definitions(&self, kind: CapabilityKind) -> Result<Vec<RawDefinition>> {
            self.inner.list_definitions(kind).await
        }
        async fn get_definition(&self, kind: CapabilityKind, name: &str) -> Result<Option<RawDefinition>> {
            self.inner.get_definition(kind, name).await
        }
        async fn list_applications(&self) -> Result<Vec<Application>> {
            self.inner.list_applications().await
        }
        async fn get_application(&self, name: &str) -> Result<Option<Application>> {
            if self.armed.swap(false, Ordering::SeqCst) {
                self.trigger.trigger();
                std::future::pending::<()>().await;
            }
            self.inner.get_application(name).await
        }
        async fn apply_application(&self, app: &Application) -> Result<()> {
            self.inner.apply_application(app).await?;
            self.armed.store(true, Ordering::SeqCst);
            Ok(())
        }
        async fn delete_application(&self, name: &str) -> Result<()> {
            self.inner.delete_application(name).await
        }
    }

    #[tokio::test]
    async fn test_attach_walks_to_confirmed() {
        // Arrange
        let cluster = seeded(shop(AppPhase::Running, vec![component("web", "containerized")])).await;
        let engine = AttachmentEngine::new(cluster.clone());

        // Act
        let outcome = engine.attach(scaler_request(Some("web"), 3)).await.unwrap();

        // Assert
        assert_eq!(
            outcome.phases,
            vec![
                ApplyPhase::Requested,
                ApplyPhase::Validated,
                ApplyPhase::Applied,
                ApplyPhase::Confirmed
            ]
        );
        assert!(!outcome.replaced());
        assert!(outcome.warnings.is_empty());
        let stored = cluster.read_instance(&outcome.identity).await.unwrap().unwrap();
        assert_eq!(stored.params, replicas(3));
    }

    #[tokio::test]
    async fn test_attach_twice_is_an_upsert() {
        let cluster = seeded(shop(AppPhase::Running, vec![component("web", "containerized")])).await;
        let engine = AttachmentEngine::new(cluster.clone());

        engine.attach(scaler_request(None, 2)).await.unwrap();
        let outcome = engine.attach(scaler_request(None, 5)).await.unwrap();

        assert_eq!(outcome.previous, Some(replicas(2)));
        let app = cluster.get_application("shop").await.unwrap().unwrap();
        let web = app.component("web").unwrap();
        assert_eq!(web.traits.len(), 1);
        assert_eq!(web.traits[0].properties, replicas(5));
    }

    #[tokio::test]
    async fn test_attach_to_pending_application_warns() {
        let cluster = seeded(shop(AppPhase::Pending, vec![component("web", "containerized")])).await;
        let engine = AttachmentEngine::new(cluster);

        let outcome = engine.attach(scaler_request(None, 1)).await.unwrap();

        assert_eq!(outcome.warnings.len(), 1);
        assert!(outcome.warnings[0].contains("pending"));
    }

    #[tokio::test]
    async fn test_attach_rejections_do_not_write() {
        // Arrange
        let deleting = seeded(shop(AppPhase::Deleting, vec![component("web", "containerized")])).await;
        let two = seeded(shop(
            AppPhase::Running,
            vec![component("web", "containerized"), component("db", "containerized")],
        ))
        .await;
        let task = seeded(shop(AppPhase::Running, vec![component("web", "task")])).await;
        let empty = Arc::new(MemoryCluster::new());

        // Act
        let not_ready = AttachmentEngine::new(deleting.clone())
            .attach(scaler_request(Some("web"), 1))
            .await;
        let ambiguous = AttachmentEngine::new(two.clone()).attach(scaler_request(None, 1)).await;
        let missing_component = AttachmentEngine::new(two.clone())
            .attach(scaler_request(Some("cache"), 1))
            .await;
        let wrong_workload = AttachmentEngine::new(task.clone()).attach(scaler_request(None, 1)).await;
        let missing_app = AttachmentEngine::new(empty.clone()).attach(scaler_request(None, 1)).await;

        // Assert
        assert!(matches!(not_ready, Err(VelaError::TargetNotReady { ref phase, .. }) if phase == "deleting"));
        assert!(matches!(ambiguous, Err(VelaError::TargetNotFound(ref msg)) if msg.contains("web, db")));
        assert!(matches!(missing_component, Err(VelaError::TargetNotFound(_))));
        assert!(matches!(wrong_workload, Err(VelaError::Validation(_))));
        assert!(matches!(missing_app, Err(VelaError::TargetNotFound(_))));
        for seeded in [&deleting, &two, &task] {
            assert_eq!(seeded.write_count(), 1);
        }
        assert_eq!(empty.write_count(), 0);
    }

    #[tokio::test]
    async fn test_detach_twice() {
        // Arrange
        let cluster = seeded(shop(AppPhase::Running, vec![component("web", "containerized")])).await;
        let engine = AttachmentEngine::new(cluster.clone());
        engine.attach(scaler_request(Some("web"), 3)).await.unwrap();

        // Act
        let first = engine.detach(detach_request()).await.unwrap();
        let writes = cluster.write_count();
        let second = engine.detach(detach_request()).await.unwrap();

        // Assert
        assert_eq!(first.removed, Some(replicas(3)));
        assert_eq!(
            first.phases,
            vec![
                DetachPhase::Requested,
                DetachPhase::Validated,
                DetachPhase::Removed,
                DetachPhase::Confirmed
            ]
        );
        assert_eq!(second.removed, None);
        assert_eq!(
            second.phases,
            vec![DetachPhase::Requested, DetachPhase::Validated, DetachPhase::Confirmed]
        );
        assert_eq!(cluster.write_count(), writes);
    }

    #[tokio::test]
    async fn test_unconfirmed_write_restores_prior_instance() {
        // Arrange
        let cluster = Arc::new(DroppingCluster {
            inner: MemoryCluster::new(),
            drop_writes: AtomicBool::new(false),
        });
        cluster
            .apply_application(&shop(AppPhase::Running, vec![component("web", "containerized")]))
            .await
            .unwrap();
        let engine = AttachmentEngine::new(cluster.clone());
        engine.attach(scaler_request(None, 2)).await.unwrap();
        cluster.drop_writes.store(true, Ordering::SeqCst);

        // Act
        let err = engine.attach(scaler_request(None, 5)).await.unwrap_err();

        // Assert
        match err {
            VelaError::ConfirmationFailed { rollback, .. } => {
                assert_eq!(rollback, Rollback::Restored.to_string())
            }
            other => panic!("unexpected error: {}", other),
        }
        let identity = InstanceIdentity::new_trait("shop", "web", "scaler");
        let stored = cluster.read_instance(&identity).await.unwrap().unwrap();
        assert_eq!(stored.params, replicas(2));
    }

    #[tokio::test]
    async fn test_unconfirmed_write_without_prior_leaves_nothing() {
        let cluster = Arc::new(DroppingCluster {
            inner: MemoryCluster::new(),
            drop_writes: AtomicBool::new(false),
        });
        cluster
            .apply_application(&shop(AppPhase::Running, vec![component("web", "containerized")]))
            .await
            .unwrap();
        cluster.drop_writes.store(true, Ordering::SeqCst);
        let engine = AttachmentEngine::new(cluster.clone());

        let err = engine.attach(scaler_request(None, 5)).await.unwrap_err();

        assert!(err.to_string().contains("instance missing after write"));
        assert!(err.to_string().contains(&Rollback::Removed.to_string()));
        let identity = InstanceIdentity::new_trait("shop", "web", "scaler");
        assert!(cluster.read_instance(&identity).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_interrupt_before_apply_writes_nothing() {
        let cluster = seeded(shop(AppPhase::Running, vec![component("web", "containerized")])).await;
        let writes = cluster.write_count();
        let (trigger, interrupt) = Interrupt::channel();
        let engine = AttachmentEngine::new(cluster.clone()).with_interrupt(interrupt);
        trigger.trigger();

        let err = engine.attach(scaler_request(None, 3)).await.unwrap_err();

        assert_eq!(err.exit_code(), 130);
        assert_eq!(cluster.write_count(), writes);
    }

    #[tokio::test]
    async fn test_interrupt_during_confirmation_rolls_back() {
        // Arrange
        let (trigger, interrupt) = Interrupt::channel();
        let cluster = Arc::new(StallingCluster {
            inner: MemoryCluster::new(),
            trigger,
            armed: AtomicBool::new(false),
        });
        cluster
            .inner
            .apply_application(&shop(AppPhase::Running, vec![component("web", "containerized")]))
            .await
            .unwrap();
        let engine = AttachmentEngine::new(cluster.clone()).with_interrupt(interrupt);

        // Act
        let err = engine.attach(scaler_request(None, 3)).await.unwrap_err();

        // Assert
        assert!(matches!(err, VelaError::Interrupted { ref rollback, .. } if rollback == &Rollback::Removed.to_string()));
        let identity = InstanceIdentity::new_trait("shop", "web", "scaler");
        assert!(cluster.inner.read_instance(&identity).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalid_target_names_are_validation_errors() {
        // Arrange
        let cluster = seeded(shop(AppPhase::Running, vec![component("web", "containerized")])).await;
        let engine = AttachmentEngine::new(cluster.clone());
        let mut escaping = scaler_request(Some("web"), 1);
        escaping.application = "../shop".to_string();

        // Act
        let attach = engine.attach(escaping).await.unwrap_err();
        let detach = engine
            .detach(DetachmentRequest {
                component: Some("WEB".to_string()),
                ..detach_request()
            })
            .await
            .unwrap_err();

        // Assert
        assert!(matches!(attach, VelaError::Validation(_)));
        assert!(matches!(detach, VelaError::Validation(_)));
        assert_eq!(cluster.write_count(), 1);
    }
}
