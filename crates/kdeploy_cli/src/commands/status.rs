//! Status command - Follow the rollout of the workloads in the manifests.

use anyhow::Result;
use clap::Args;

use kdeploy_runner::{RolloutMonitor, SharedSink};

use super::{
    cancel_on_ctrl_c, color_mode, finish_rollout, kubectl_client, prepare_manifests, ClusterArgs,
    ManifestArgs, RolloutArgs,
};
use crate::config::DeployConfig;

#[derive(Args)]
pub struct StatusArgs {
    #[command(flatten)]
    pub manifest: ManifestArgs,

    #[command(flatten)]
    pub cluster: ClusterArgs,

    #[command(flatten)]
    pub rollout: RolloutArgs,
}

pub async fn execute(args: StatusArgs, config: DeployConfig) -> Result<()> {
    let manifests = prepare_manifests(&args.manifest, &config)?;
    let client = kubectl_client(&args.cluster, &config);
    let strict = args.rollout.strict || config.rollout.strict;

    let report = RolloutMonitor::new(client)
        .with_color_mode(color_mode(&args.rollout, &config))
        .rollout_status(cancel_on_ctrl_c(), SharedSink::stdout(), &manifests)
        .await?;

    finish_rollout(report, strict)
}
