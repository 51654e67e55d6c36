//! Deploy command - Apply manifests and follow their rollout.

use std::io::Write;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use kdeploy_runner::{ClusterClient, RolloutMonitor, SharedSink};

use super::{
    cancel_on_ctrl_c, color_mode, finish_rollout, kubectl_client, prepare_manifests, ClusterArgs,
    ManifestArgs, RolloutArgs,
};
use crate::config::DeployConfig;

#[derive(Args)]
pub struct DeployArgs {
    #[command(flatten)]
    pub manifest: ManifestArgs,

    #[command(flatten)]
    pub cluster: ClusterArgs,

    #[command(flatten)]
    pub rollout: RolloutArgs,

    /// Skip waiting for the rollout after applying
    #[arg(long)]
    pub no_status: bool,
}

pub async fn execute(args: DeployArgs, config: DeployConfig) -> Result<()> {
    let manifests = prepare_manifests(&args.manifest, &config)?;
    let client = kubectl_client(&args.cluster, &config);
    let strict = args.rollout.strict || config.rollout.strict;
    let cancel = cancel_on_ctrl_c();

    let mut output = SharedSink::stdout();
    client
        .apply(&manifests, &mut output, cancel.clone())
        .await
        .context("Failed to apply manifests")?;
    output.flush()?;

    if args.no_status {
        info!("Applied {} manifests, not waiting for rollout", manifests.len());
        return Ok(());
    }

    let report = RolloutMonitor::new(client)
        .with_color_mode(color_mode(&args.rollout, &config))
        .rollout_status(cancel, output, &manifests)
        .await?;

    finish_rollout(report, strict)
}
