//! # kdeploy_runner
//!
//! Cluster-side execution for kdeploy.
//!
//! This crate drives kubectl and follows the rollout of deployed
//! workloads, ensuring concurrent status output stays readable.
//!
//! # Features
//!
//! - **kubectl client**: context/namespace/flag handling, streamed output
//! - **Rollout monitor**: one concurrent task per workload, version-gated
//!   StatefulSet support, per-resource outcome report
//! - **Output multiplexer**: stable color and `[name]` prefix per resource
//! - **Cancellation**: in-flight commands are killed on request
//! - **Mock cluster**: for testing without kubectl
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use kdeploy_manifest::ManifestList;
//! use kdeploy_runner::{cancel_channel, KubectlCli, KubectlOptions, RolloutMonitor, SharedSink};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Arc::new(KubectlCli::new(KubectlOptions::new().context("kind-dev")));
//!     let manifests = ManifestList::new();
//!     let (_cancel_tx, cancel) = cancel_channel();
//!
//!     let report = RolloutMonitor::new(client)
//!         .rollout_status(cancel, SharedSink::stdout(), &manifests)
//!         .await?;
//!     println!("{} resources monitored", report.outcomes.len());
//!
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod kubectl;
pub mod mock;
pub mod multiplexer;
pub mod rollout;

pub use client::{cancel_channel, cancelled, CancelSignal, ClusterClient, ClusterVersion};
pub use config::{KubectlFlags, KubectlOptions};
pub use error::{RunnerError, RunnerResult};
pub use kubectl::KubectlCli;
pub use mock::{CapturedCall, MockCluster, MockStatus};
pub use multiplexer::{ColorMode, LogAggregator, PrefixColor, PrefixedWriter, SharedSink, WriterEntry, PALETTE};
pub use rollout::{ResourceOutcome, RolloutMonitor, RolloutReport, RolloutState, STATEFULSET_UNSUPPORTED};
