//! Cluster client trait and types.

use std::io::Write;

use async_trait::async_trait;
use kdeploy_manifest::{ManifestList, Workload};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::RunnerResult;

/// Cancellation signal shared by all tasks of one invocation.
///
/// The value flips to `true` once cancellation is requested.
pub type CancelSignal = watch::Receiver<bool>;

/// Create a cancellation sender and its signal.
pub fn cancel_channel() -> (watch::Sender<bool>, CancelSignal) {
    watch::channel(false)
}

/// Resolve once `signal` requests cancellation.
///
/// A signal whose sender is gone can no longer fire and never resolves.
pub async fn cancelled(signal: &mut CancelSignal) {
    loop {
        let requested = *signal.borrow();
        if requested {
            return;
        }
        if signal.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Kubernetes server version, as reported by the cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterVersion {
    #[serde(default)]
    pub major: String,
    #[serde(default)]
    pub minor: String,
}

impl ClusterVersion {
    pub fn new(major: impl Into<String>, minor: impl Into<String>) -> Self {
        Self {
            major: major.into(),
            minor: minor.into(),
        }
    }

    /// Major version as a number; anything non-numeric counts as 0.
    pub fn major_number(&self) -> u64 {
        self.major.parse().unwrap_or(0)
    }

    /// Minor version as a number; anything non-numeric (`"12+"`) counts as 0.
    pub fn minor_number(&self) -> u64 {
        self.minor.parse().unwrap_or(0)
    }

    /// `kubectl rollout status` never terminates for stateful sets before 1.12.
    pub fn supports_statefulset_rollout_status(&self) -> bool {
        !(self.major_number() == 1 && self.minor_number() <= 11)
    }
}

impl std::fmt::Display for ClusterVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Operations kdeploy needs from a Kubernetes cluster.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Version of the target cluster.
    async fn server_version(&self) -> RunnerResult<ClusterVersion>;

    /// Wait for the rollout of `workload`, streaming status output.
    async fn rollout_status(
        &self,
        workload: &Workload,
        output: &mut (dyn Write + Send),
        cancel: CancelSignal,
    ) -> RunnerResult<()>;

    /// Apply manifests to the cluster, streaming command output.
    async fn apply(
        &self,
        manifests: &ManifestList,
        output: &mut (dyn Write + Send),
        cancel: CancelSignal,
    ) -> RunnerResult<()>;
}
