//! Lifecycle hooks
//!
//! Hooks are objects carrying a hook annotation. They are pulled out of the
//! steady-state set at extraction time and applied by [`HookPhaseRunner`] at
//! their phase instead. After a phase, hooks whose delete policy matches the
//! outcome are removed again.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use tugboat_core::Operation;

use crate::annotations::parse_list;
use crate::applier::{Applier, ApplyMode};
use crate::error::{KubeError, Result, combine};
use crate::jobs::{DEFAULT_JOB_TIMEOUT, JobWaiter};

/// Hook execution phase
///
/// Every phase a chart may declare is recognized, but only crd-install and
/// the pre/post phases of install and upgrade are ever run. Uninstall deletes
/// by label and runs no hooks. A hook declaring only delete, rollback or test
/// phases is extracted from the steady-state set and never applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HookPhase {
    /// Before anything else, for CRDs the chart depends on
    CrdInstall,
    /// Before installation begins
    PreInstall,
    /// After installation completes successfully
    PostInstall,
    /// Before upgrade begins
    PreUpgrade,
    /// After upgrade completes successfully
    PostUpgrade,
    /// Recognized, never run
    PreDelete,
    /// Recognized, never run
    PostDelete,
    /// Recognized, never run
    PreRollback,
    /// Recognized, never run
    PostRollback,
    /// Recognized, never run
    Test,
}

impl HookPhase {
    /// Get all phases for an install operation
    pub fn install_phases() -> &'static [HookPhase] {
        &[
            HookPhase::CrdInstall,
            HookPhase::PreInstall,
            HookPhase::PostInstall,
        ]
    }

    /// Get all phases for an upgrade operation
    pub fn upgrade_phases() -> &'static [HookPhase] {
        &[
            HookPhase::CrdInstall,
            HookPhase::PreUpgrade,
            HookPhase::PostUpgrade,
        ]
    }

    /// The `(pre, post)` phases wrapping the main apply of an operation
    pub fn around(operation: Operation) -> (HookPhase, HookPhase) {
        match operation {
            Operation::Install => (HookPhase::PreInstall, HookPhase::PostInstall),
            Operation::Upgrade => (HookPhase::PreUpgrade, HookPhase::PostUpgrade),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HookPhase::CrdInstall => "crd-install",
            HookPhase::PreInstall => "pre-install",
            HookPhase::PostInstall => "post-install",
            HookPhase::PreUpgrade => "pre-upgrade",
            HookPhase::PostUpgrade => "post-upgrade",
            HookPhase::PreDelete => "pre-delete",
            HookPhase::PostDelete => "post-delete",
            HookPhase::PreRollback => "pre-rollback",
            HookPhase::PostRollback => "post-rollback",
            HookPhase::Test => "test",
        }
    }

    /// Parse a single phase name
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s.trim() {
            "crd-install" => HookPhase::CrdInstall,
            "pre-install" => HookPhase::PreInstall,
            "post-install" => HookPhase::PostInstall,
            "pre-upgrade" => HookPhase::PreUpgrade,
            "post-upgrade" => HookPhase::PostUpgrade,
            "pre-delete" => HookPhase::PreDelete,
            "post-delete" => HookPhase::PostDelete,
            "pre-rollback" => HookPhase::PreRollback,
            "post-rollback" => HookPhase::PostRollback,
            "test" | "test-success" => HookPhase::Test,
            _ => return None,
        })
    }
}

impl std::fmt::Display for HookPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// When a hook resource is removed again
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeletePolicy {
    /// After the phase succeeded
    HookSucceeded,
    /// After the phase (or the apply following it) failed
    HookFailed,
    /// Recognized but not acted on. Hooks are applied with the release's
    /// apply mode, so upgrades replace an existing hook object in place.
    BeforeHookCreation,
}

impl DeletePolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "hook-succeeded" => Some(DeletePolicy::HookSucceeded),
            "hook-failed" => Some(DeletePolicy::HookFailed),
            "before-hook-creation" => Some(DeletePolicy::BeforeHookCreation),
            _ => None,
        }
    }
}

impl std::fmt::Display for DeletePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DeletePolicy::HookSucceeded => "hook-succeeded",
            DeletePolicy::HookFailed => "hook-failed",
            DeletePolicy::BeforeHookCreation => "before-hook-creation",
        };
        f.write_str(s)
    }
}

/// Outcome a cleanup pass reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookOutcome {
    Succeeded,
    Failed,
}

impl HookOutcome {
    /// The delete policy selecting hooks for this outcome
    pub fn policy(&self) -> DeletePolicy {
        match self {
            HookOutcome::Succeeded => DeletePolicy::HookSucceeded,
            HookOutcome::Failed => DeletePolicy::HookFailed,
        }
    }
}

/// A hook captured from the rendered output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookDefinition {
    pub kind: String,
    pub name: String,
    /// Location under the hooks directory
    pub file_path: PathBuf,
    pub phases: BTreeSet<HookPhase>,
    #[serde(default)]
    pub delete_policies: BTreeSet<DeletePolicy>,
}

impl HookDefinition {
    pub fn runs_in_phase(&self, phase: HookPhase) -> bool {
        self.phases.contains(&phase)
    }

    pub fn deletes_on(&self, outcome: HookOutcome) -> bool {
        self.delete_policies.contains(&outcome.policy())
    }

    pub fn is_job(&self) -> bool {
        self.kind.eq_ignore_ascii_case("job")
    }

    /// `kind/name` as understood by `kubectl delete`
    pub fn resource_ref(&self) -> String {
        format!("{}/{}", self.kind.to_lowercase(), self.name)
    }
}

/// Parse comma-separated hook phases, skipping unknown names
pub fn parse_hook_phases(value: &str) -> BTreeSet<HookPhase> {
    parse_list(value)
        .into_iter()
        .filter_map(|p| {
            let phase = HookPhase::parse(p);
            if phase.is_none() {
                warn!(phase = p, "ignoring unknown hook phase");
            }
            phase
        })
        .collect()
}

/// Parse comma-separated delete policies, skipping unknown names
pub fn parse_delete_policies(value: &str) -> BTreeSet<DeletePolicy> {
    parse_list(value)
        .into_iter()
        .filter_map(|p| {
            let policy = DeletePolicy::parse(p);
            if policy.is_none() {
                warn!(policy = p, "ignoring unknown hook delete policy");
            }
            policy
        })
        .collect()
}

/// How hooks are applied and cleaned up
#[derive(Debug, Clone)]
pub struct HookSettings {
    pub namespace: String,
    pub mode: ApplyMode,
    pub wait: bool,
    pub disable_deletion: bool,
    pub job_timeout: Duration,
}

impl HookSettings {
    pub fn new(namespace: impl Into<String>, mode: ApplyMode) -> Self {
        Self {
            namespace: namespace.into(),
            mode,
            wait: false,
            disable_deletion: false,
            job_timeout: DEFAULT_JOB_TIMEOUT,
        }
    }
}

/// Applies and removes the hooks of one release call
pub struct HookPhaseRunner<'a> {
    applier: &'a dyn Applier,
    waiter: &'a dyn JobWaiter,
    hooks: &'a [HookDefinition],
    settings: HookSettings,
}

impl<'a> HookPhaseRunner<'a> {
    pub fn new(
        applier: &'a dyn Applier,
        waiter: &'a dyn JobWaiter,
        hooks: &'a [HookDefinition],
        settings: HookSettings,
    ) -> Self {
        Self {
            applier,
            waiter,
            hooks,
            settings,
        }
    }

    fn hooks_for(&self, phase: HookPhase) -> impl Iterator<Item = &'a HookDefinition> + use<'a> {
        let hooks: &'a [HookDefinition] = self.hooks;
        hooks.iter().filter(move |h| h.runs_in_phase(phase))
    }

    /// Apply every hook of `phase` in captured order
    ///
    /// The first failure aborts the phase; later hooks are not applied.
    pub async fn run(&self, phase: HookPhase) -> Result<usize> {
        let wait = self.settings.mode.effective_wait(self.settings.wait);
        let mut applied = 0;

        for hook in self.hooks_for(phase) {
            info!(%phase, kind = %hook.kind, name = %hook.name, "running hook");
            self.applier
                .apply(
                    &hook.file_path,
                    None,
                    &self.settings.namespace,
                    self.settings.mode,
                    wait,
                )
                .await
                .map_err(|e| KubeError::HookRun {
                    kind: hook.kind.clone(),
                    name: hook.name.clone(),
                    phase: phase.to_string(),
                    message: e.to_string(),
                })?;
            applied += 1;
        }

        if applied > 0 {
            debug!(%phase, applied, "hook phase complete");
        }
        Ok(applied)
    }

    /// Delete hooks of `phase` whose delete policy matches `outcome`
    ///
    /// Every eligible hook is attempted; deletion failures are combined.
    pub async fn cleanup(&self, phase: HookPhase, outcome: HookOutcome) -> Result<usize> {
        let mut errors = Vec::new();
        let mut deleted = 0;

        for hook in self.hooks_for(phase).filter(|h| h.deletes_on(outcome)) {
            if self.settings.disable_deletion {
                info!(%phase, hook = %hook.resource_ref(), "hook deletion disabled, keeping hook");
                continue;
            }

            if hook.is_job() {
                self.wait_for_job(hook).await;
            }

            match self
                .applier
                .delete(
                    &hook.resource_ref(),
                    None,
                    Some(&self.settings.namespace),
                    false,
                )
                .await
            {
                Ok(_) => {
                    debug!(%phase, hook = %hook.resource_ref(), "deleted hook");
                    deleted += 1;
                }
                Err(e) => {
                    warn!(%phase, hook = %hook.resource_ref(), error = %e, "failed to delete hook");
                    errors.push(e);
                }
            }
        }

        match combine(errors) {
            Some(e) => Err(e),
            None => Ok(deleted),
        }
    }

    /// Give a Job the chance to finish; the hook is deleted either way
    async fn wait_for_job(&self, hook: &HookDefinition) {
        debug!(job = %hook.name, timeout = ?self.settings.job_timeout, "waiting for hook job");
        if let Err(e) = self
            .waiter
            .wait_for_completion(&hook.name, &self.settings.namespace, self.settings.job_timeout)
            .await
        {
            warn!(job = %hook.name, error = %e, "hook job did not complete, deleting anyway");
        }
    }
}
