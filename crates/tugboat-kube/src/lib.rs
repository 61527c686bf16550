//! Tugboat Kube - client-side release management
//!
//! This crate provides:
//! - **Release Manager**: install and upgrade flows with hook sequencing and garbage collection
//! - **Hook Extraction**: moves hook objects aside and labels steady-state resources
//! - **Hooks System**: phase runner with Helm-compatible annotations and delete policies
//! - **Garbage Collection**: selector-based removal of resources from other chart versions
//! - **Collaborators**: `kubectl` applier, `helm template` renderer, Job waiter via the API
//! - **Mocks**: in-memory cluster and renderer for tests

pub mod actions;
pub mod annotations;
pub mod applier;
pub mod error;
pub mod extract;
pub mod gc;
pub mod hooks;
pub mod jobs;
pub mod manager;
pub mod mock;
pub mod render;
pub mod resources;
pub mod workdir;

pub use actions::ReleaseOptions;
pub use applier::{Applier, ApplyMode, KubectlApplier, ResourceSummary};
pub use error::{KubeError, Result, combine};
pub use extract::extract_and_label;
pub use gc::{GarbageCollector, GcConfig, GcReport};
pub use hooks::{DeletePolicy, HookDefinition, HookOutcome, HookPhase, HookPhaseRunner, HookSettings};
pub use jobs::{DEFAULT_JOB_TIMEOUT, JobWaiter, KubeJobWaiter};
pub use manager::{ReleaseManager, ReleaseOutcome, ReleaseStatus};
pub use mock::{ClusterCall, MockCluster, MockRenderer, MockResource};
pub use render::{HelmRenderer, RenderRequest, Renderer};
pub use resources::ResourceSetApplier;
pub use workdir::WorkDir;
