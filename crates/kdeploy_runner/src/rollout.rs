//! Concurrent rollout status monitoring.
//!
//! One task is spawned per decoded workload and all of them are joined
//! before returning. Each task dispatches on the workload kind:
//!
//! - StatefulSet: skipped with a notice on clusters up to 1.11, otherwise
//!   monitored like a Deployment
//! - DaemonSet, Deployment: `rollout status` streamed through a prefixed
//!   writer
//! - anything else: ignored
//!
//! Failures of individual resources never abort the others; they are
//! collected into the [`RolloutReport`].

use std::fmt;
use std::sync::Arc;

use kdeploy_manifest::{DecodeFailure, ManifestList, Workload};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::client::{CancelSignal, ClusterClient, ClusterVersion};
use crate::error::{RunnerError, RunnerResult};
use crate::multiplexer::{ColorMode, LogAggregator, SharedSink};

/// Notice printed instead of monitoring stateful sets on old clusters.
pub const STATEFULSET_UNSUPPORTED: &str =
    "StatefulSet rollout status is not supported pre kubernetes 1.12";

/// Final state of one monitored resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RolloutState {
    /// The status command finished successfully
    Completed,
    /// Not monitored because of the cluster version
    SkippedByVersion,
    /// Kind without rollout status
    Ignored,
    /// The status command failed or the task died
    Failed(String),
}

/// Outcome for one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceOutcome {
    pub kind: String,
    pub name: String,
    pub state: RolloutState,
}

impl fmt::Display for ResourceOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.state {
            RolloutState::Failed(reason) => write!(f, "{}/{}: {}", self.kind, self.name, reason),
            state => write!(f, "{}/{}: {:?}", self.kind, self.name, state),
        }
    }
}

/// Per-resource outcomes of one rollout status invocation.
#[derive(Debug, Default)]
pub struct RolloutReport {
    /// Outcomes in input order.
    pub outcomes: Vec<ResourceOutcome>,
    /// Manifests that could not be decoded.
    pub decode_failures: Vec<DecodeFailure>,
}

impl RolloutReport {
    pub fn failures(&self) -> impl Iterator<Item = &ResourceOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.state, RolloutState::Failed(_)))
    }

    pub fn is_success(&self) -> bool {
        self.failures().next().is_none() && self.decode_failures.is_empty()
    }

    /// Aggregate every failure into one error.
    pub fn into_result(self) -> RunnerResult<Self> {
        let mut failures: Vec<String> = self
            .decode_failures
            .iter()
            .map(|f| format!("manifest #{}: {}", f.index, f.error))
            .collect();
        failures.extend(self.failures().map(|o| o.to_string()));

        if failures.is_empty() {
            Ok(self)
        } else {
            Err(RunnerError::RolloutFailed(failures))
        }
    }
}

/// Monitors the rollout of decoded workloads.
pub struct RolloutMonitor {
    client: Arc<dyn ClusterClient>,
    color_mode: ColorMode,
}

impl RolloutMonitor {
    pub fn new(client: Arc<dyn ClusterClient>) -> Self {
        Self {
            client,
            color_mode: ColorMode::default(),
        }
    }

    pub fn with_color_mode(mut self, mode: ColorMode) -> Self {
        self.color_mode = mode;
        self
    }

    /// Decode `manifests` and monitor the rollout of every workload.
    ///
    /// Manifests that fail to decode are skipped and listed in the report.
    pub async fn rollout_status(
        &self,
        cancel: CancelSignal,
        output: SharedSink,
        manifests: &ManifestList,
    ) -> RunnerResult<RolloutReport> {
        let decoded = manifests.decode();
        let mut report = self.monitor(cancel, output, decoded.workloads).await?;
        report.decode_failures = decoded.failures;
        Ok(report)
    }

    /// Monitor every workload concurrently and wait for all of them.
    pub async fn monitor(
        &self,
        cancel: CancelSignal,
        output: SharedSink,
        workloads: Vec<Workload>,
    ) -> RunnerResult<RolloutReport> {
        if workloads.is_empty() {
            debug!("No workloads to monitor");
            return Ok(RolloutReport::default());
        }

        info!("Monitoring rollout of {} resources", workloads.len());
        let logs = Arc::new(LogAggregator::new(output.clone()).with_color_mode(self.color_mode));

        let mut outcomes: Vec<ResourceOutcome> = workloads
            .iter()
            .map(|w| ResourceOutcome {
                kind: w.kind().to_string(),
                name: w.name().to_string(),
                state: RolloutState::Failed("monitoring task did not complete".to_string()),
            })
            .collect();

        let mut tasks = JoinSet::new();
        for (index, workload) in workloads.into_iter().enumerate() {
            let client = Arc::clone(&self.client);
            let logs = Arc::clone(&logs);
            let output = output.clone();
            let cancel = cancel.clone();
            tasks.spawn(async move {
                let state = monitor_workload(client.as_ref(), &logs, &output, &workload, cancel).await;
                (index, state)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, state)) => outcomes[index].state = state,
                Err(e) => error!("Rollout monitoring task failed: {}", e),
            }
        }

        Ok(RolloutReport {
            outcomes,
            decode_failures: Vec::new(),
        })
    }
}

async fn monitor_workload(
    client: &dyn ClusterClient,
    logs: &LogAggregator,
    output: &SharedSink,
    workload: &Workload,
    cancel: CancelSignal,
) -> RolloutState {
    match workload {
        Workload::StatefulSet(_) => {
            let version = client.server_version().await.unwrap_or_else(|e| {
                warn!("Unable to determine cluster version: {}", e);
                ClusterVersion::default()
            });
            if !version.supports_statefulset_rollout_status() {
                // https://github.com/kubernetes/kubernetes/issues/68573
                if let Err(e) = output.write_line(STATEFULSET_UNSUPPORTED) {
                    warn!("Failed to write to output: {}", e);
                }
                return RolloutState::SkippedByVersion;
            }
            watch_rollout(client, logs, workload, cancel).await
        }
        Workload::DaemonSet(_) | Workload::Deployment(_) => {
            watch_rollout(client, logs, workload, cancel).await
        }
        Workload::Other(_) => RolloutState::Ignored,
    }
}

async fn watch_rollout(
    client: &dyn ClusterClient,
    logs: &LogAggregator,
    workload: &Workload,
    cancel: CancelSignal,
) -> RolloutState {
    let mut writer = logs.get_output(workload.name());
    match client.rollout_status(workload, &mut writer, cancel).await {
        Ok(()) => {
            debug!("Rollout of {} complete", workload);
            RolloutState::Completed
        }
        Err(e) => {
            warn!("Rollout status of {} failed: {}", workload, e);
            RolloutState::Failed(e.to_string())
        }
    }
}
