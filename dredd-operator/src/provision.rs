//! Ordered, idempotent setup and teardown of the operator environment.
//!
//! Both directions probe each resource before acting, so a run can be
//! repeated or resumed after a partial failure. A failing step is recorded
//! and the remaining steps still run; nothing is rolled back.

use crate::environment::EnvironmentConfig;
use crate::error::OperatorResult;
use crate::platform::PlatformApi;
use crate::resources::{
    CredentialsSecret, PlatformKind, PlatformResourceRef, PlatformStep, ProjectConfig,
    ResourceBuilder,
};
use std::fmt;
use std::sync::Arc;
use tracing::Span;

/// Creation order of the platform resources.
pub const PROVISION_ORDER: [PlatformKind; 7] = [
    PlatformKind::Namespace,
    PlatformKind::ClusterRole,
    PlatformKind::ServiceAccount,
    PlatformKind::ClusterRoleBinding,
    PlatformKind::ConfigMap,
    PlatformKind::Secret,
    PlatformKind::Deployment,
];

/// Deletion order, the exact reverse of [`PROVISION_ORDER`].
pub const DECOMMISSION_ORDER: [PlatformKind; 7] = [
    PlatformKind::Deployment,
    PlatformKind::Secret,
    PlatformKind::ConfigMap,
    PlatformKind::ClusterRoleBinding,
    PlatformKind::ServiceAccount,
    PlatformKind::ClusterRole,
    PlatformKind::Namespace,
];

/// What happened to one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The resource was absent and has been created.
    Created,
    /// The resource already existed and was left untouched.
    AlreadyPresent,
    /// The resource existed and has been deleted.
    Deleted,
    /// The resource did not exist, nothing to delete.
    Absent,
    /// The step failed with the given message.
    Failed(String),
}

impl StepOutcome {
    /// Whether the step failed.
    pub fn is_failure(&self) -> bool {
        matches!(self, StepOutcome::Failed(_))
    }
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepOutcome::Created => f.write_str("created"),
            StepOutcome::AlreadyPresent => f.write_str("already present"),
            StepOutcome::Deleted => f.write_str("deleted"),
            StepOutcome::Absent => f.write_str("absent"),
            StepOutcome::Failed(msg) => write!(f, "failed: {msg}"),
        }
    }
}

/// Outcome of one step of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    /// The resource the step acted on.
    pub target: PlatformResourceRef,
    /// What happened.
    pub outcome: StepOutcome,
}

/// Outcomes of a whole provisioning or decommissioning run, in step order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisionReport {
    /// One entry per step.
    pub steps: Vec<StepReport>,
}

impl ProvisionReport {
    fn record(&mut self, target: PlatformResourceRef, outcome: StepOutcome) {
        self.steps.push(StepReport { target, outcome });
    }

    /// Number of steps with the given outcome.
    pub fn count(&self, outcome: &StepOutcome) -> usize {
        self.steps.iter().filter(|s| &s.outcome == outcome).count()
    }

    /// Steps that failed.
    pub fn failures(&self) -> impl Iterator<Item = &StepReport> {
        self.steps.iter().filter(|s| s.outcome.is_failure())
    }

    /// Whether every step succeeded.
    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }

    /// Kinds in the order the steps ran.
    pub fn kinds(&self) -> Vec<PlatformKind> {
        self.steps.iter().map(|s| s.target.kind).collect()
    }
}

/// Creates the seven platform resources of one environment.
pub struct EnvironmentProvisioner<P: PlatformApi + ?Sized> {
    platform: Arc<P>,
    env: Arc<EnvironmentConfig>,
    span: Span,
}

impl<P: PlatformApi + ?Sized> EnvironmentProvisioner<P> {
    /// Create a provisioner that logs under `span`.
    pub fn new(platform: Arc<P>, env: Arc<EnvironmentConfig>, span: Span) -> Self {
        Self {
            platform,
            env,
            span,
        }
    }

    /// Create every missing platform resource, in [`PROVISION_ORDER`].
    ///
    /// Credentials are only used to build the Secret body and are not kept.
    pub async fn provision(
        &self,
        project: &ProjectConfig,
        credentials: &CredentialsSecret,
    ) -> ProvisionReport {
        let mut report = ProvisionReport::default();
        tracing::info!(parent: &self.span, namespace = %self.env.namespace, "Provisioning environment");

        for kind in PROVISION_ORDER {
            let step = PlatformStep {
                kind,
                project,
                credentials,
            };
            let target = self.env.reference(kind);
            let outcome = match self.ensure(&step, &target).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(parent: &self.span, resource = %target, error = %e, "Provisioning step failed");
                    StepOutcome::Failed(e.to_string())
                }
            };
            report.record(target, outcome);
        }

        tracing::info!(
            parent: &self.span,
            created = report.count(&StepOutcome::Created),
            present = report.count(&StepOutcome::AlreadyPresent),
            failed = report.failures().count(),
            "Provisioning finished"
        );
        report
    }

    async fn ensure(
        &self,
        step: &PlatformStep<'_>,
        target: &PlatformResourceRef,
    ) -> OperatorResult<StepOutcome> {
        if self.platform.exists(target).await? {
            tracing::info!(parent: &self.span, resource = %target, "Resource already exists, skipping");
            return Ok(StepOutcome::AlreadyPresent);
        }

        let body = step.build(&self.env)?;
        match self.platform.create(&body).await {
            Ok(()) => {
                tracing::info!(parent: &self.span, resource = %target, "Created resource");
                Ok(StepOutcome::Created)
            }
            Err(e) if e.is_conflict() => {
                tracing::info!(parent: &self.span, resource = %target, "Resource created concurrently, skipping");
                Ok(StepOutcome::AlreadyPresent)
            }
            Err(e) => Err(e),
        }
    }
}

/// Deletes the seven platform resources of one environment.
pub struct EnvironmentDecommissioner<P: PlatformApi + ?Sized> {
    platform: Arc<P>,
    env: Arc<EnvironmentConfig>,
    span: Span,
}

impl<P: PlatformApi + ?Sized> EnvironmentDecommissioner<P> {
    /// Create a decommissioner that logs under `span`.
    pub fn new(platform: Arc<P>, env: Arc<EnvironmentConfig>, span: Span) -> Self {
        Self {
            platform,
            env,
            span,
        }
    }

    /// Delete every present platform resource, in [`DECOMMISSION_ORDER`].
    pub async fn decommission(&self) -> ProvisionReport {
        let mut report = ProvisionReport::default();
        tracing::info!(parent: &self.span, namespace = %self.env.namespace, "Decommissioning environment");

        for kind in DECOMMISSION_ORDER {
            let target = self.env.reference(kind);
            let outcome = match self.remove(&target).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(parent: &self.span, resource = %target, error = %e, "Decommissioning step failed");
                    StepOutcome::Failed(e.to_string())
                }
            };
            report.record(target, outcome);
        }

        tracing::info!(
            parent: &self.span,
            deleted = report.count(&StepOutcome::Deleted),
            absent = report.count(&StepOutcome::Absent),
            failed = report.failures().count(),
            "Decommissioning finished"
        );
        report
    }

    async fn remove(&self, target: &PlatformResourceRef) -> OperatorResult<StepOutcome> {
        if !self.platform.exists(target).await? {
            tracing::warn!(parent: &self.span, resource = %target, "Resource does not exist, skipping");
            return Ok(StepOutcome::Absent);
        }

        match self.platform.delete(target).await {
            Ok(()) => {
                tracing::info!(parent: &self.span, resource = %target, "Deleted resource");
                Ok(StepOutcome::Deleted)
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!(parent: &self.span, resource = %target, "Resource vanished before delete");
                Ok(StepOutcome::Absent)
            }
            Err(e) => Err(e),
        }
    }
}
