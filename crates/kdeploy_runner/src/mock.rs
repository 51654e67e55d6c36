//! Mock cluster client for testing.
//!
//! Provides a configurable implementation of the ClusterClient trait for
//! use in tests without a kubectl binary or a cluster.

use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kdeploy_manifest::{ManifestList, Workload};
use parking_lot::RwLock;

use crate::client::{cancelled, CancelSignal, ClusterClient, ClusterVersion};
use crate::error::{RunnerError, RunnerResult};

/// Scripted rollout status for one resource.
#[derive(Debug, Clone)]
pub struct MockStatus {
    pub lines: Vec<String>,
    pub exit_code: i32,
    pub delay: Duration,
}

impl MockStatus {
    pub fn success(lines: &[&str]) -> Self {
        Self {
            lines: lines.iter().map(|l| l.to_string()).collect(),
            exit_code: 0,
            delay: Duration::ZERO,
        }
    }

    pub fn failure(exit_code: i32, lines: &[&str]) -> Self {
        Self {
            exit_code,
            ..Self::success(lines)
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Captured call information for verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedCall {
    pub method: String,
    pub resource: Option<String>,
}

/// Mock cluster client.
///
/// Captures every call and answers with scripted responses keyed by
/// `Kind/name`. Unscripted resources roll out successfully.
#[derive(Clone, Default)]
pub struct MockCluster {
    version: Arc<RwLock<Option<ClusterVersion>>>,
    statuses: Arc<RwLock<HashMap<String, MockStatus>>>,
    captured_calls: Arc<RwLock<Vec<CapturedCall>>>,
}

impl MockCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the version reported by the cluster.
    pub fn set_version(self, major: &str, minor: &str) -> Self {
        *self.version.write() = Some(ClusterVersion::new(major, minor));
        self
    }

    /// Script the rollout status of `Kind/name`.
    pub fn add_status(self, resource: impl Into<String>, status: MockStatus) -> Self {
        self.statuses.write().insert(resource.into(), status);
        self
    }

    pub fn get_calls(&self) -> Vec<CapturedCall> {
        self.captured_calls.read().clone()
    }

    pub fn call_count(&self) -> usize {
        self.captured_calls.read().len()
    }

    /// Get calls to a specific method.
    pub fn get_method_calls(&self, method: &str) -> Vec<CapturedCall> {
        self.captured_calls
            .read()
            .iter()
            .filter(|c| c.method == method)
            .cloned()
            .collect()
    }

    fn record_call(&self, method: &str, resource: Option<String>) {
        self.captured_calls.write().push(CapturedCall {
            method: method.to_string(),
            resource,
        });
    }
}

#[async_trait]
impl ClusterClient for MockCluster {
    async fn server_version(&self) -> RunnerResult<ClusterVersion> {
        self.record_call("server_version", None);
        self.version
            .read()
            .clone()
            .ok_or_else(|| RunnerError::VersionUnavailable("no version configured".to_string()))
    }

    async fn rollout_status(
        &self,
        workload: &Workload,
        output: &mut (dyn Write + Send),
        mut cancel: CancelSignal,
    ) -> RunnerResult<()> {
        let resource = workload.to_string();
        self.record_call("rollout_status", Some(resource.clone()));

        let status = self
            .statuses
            .read()
            .get(&resource)
            .cloned()
            .unwrap_or_else(|| {
                MockStatus::success(&[format!("{} successfully rolled out", resource).as_str()])
            });

        if !status.delay.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(status.delay) => {}
                _ = cancelled(&mut cancel) => return Err(RunnerError::Cancelled(resource)),
            }
        }

        for line in &status.lines {
            output.write_all(format!("{}\n", line).as_bytes())?;
        }

        if status.exit_code != 0 {
            return Err(RunnerError::CommandFailed {
                command: format!("rollout status {}", resource),
                code: status.exit_code,
            });
        }
        Ok(())
    }

    async fn apply(
        &self,
        manifests: &ManifestList,
        output: &mut (dyn Write + Send),
        _cancel: CancelSignal,
    ) -> RunnerResult<()> {
        self.record_call("apply", Some(format!("{} manifests", manifests.len())));
        output.write_all(format!("applied {} manifests\n", manifests.len()).as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::cancel_channel;
    use kdeploy_manifest::ObjectMeta;

    fn daemonset(name: &str) -> Workload {
        Workload::DaemonSet(ObjectMeta {
            api_version: "apps/v1".to_string(),
            kind: "DaemonSet".to_string(),
            name: name.to_string(),
            namespace: None,
        })
    }

    #[tokio::test]
    async fn test_mock_cluster_default_status() {
        let cluster = MockCluster::new();
        let (_tx, cancel) = cancel_channel();
        let mut out = Vec::new();

        cluster
            .rollout_status(&daemonset("agent"), &mut out, cancel)
            .await
            .unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "DaemonSet/agent successfully rolled out\n"
        );
        assert_eq!(cluster.get_method_calls("rollout_status").len(), 1);
    }

    #[tokio::test]
    async fn test_mock_cluster_scripted_failure() {
        let cluster = MockCluster::new()
            .add_status("DaemonSet/agent", MockStatus::failure(1, &["error: timed out"]));
        let (_tx, cancel) = cancel_channel();
        let mut out = Vec::new();

        let err = cluster
            .rollout_status(&daemonset("agent"), &mut out, cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, RunnerError::CommandFailed { code: 1, .. }));
        assert_eq!(String::from_utf8(out).unwrap(), "error: timed out\n");
    }

    #[tokio::test]
    async fn test_mock_cluster_version() {
        assert!(MockCluster::new().server_version().await.is_err());

        let cluster = MockCluster::new().set_version("1", "12");
        assert_eq!(
            cluster.server_version().await.unwrap(),
            ClusterVersion::new("1", "12")
        );
        assert_eq!(cluster.call_count(), 1);
    }
}
