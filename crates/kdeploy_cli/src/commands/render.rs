//! Render command - Substitute variables and print manifests.

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::{info, warn};

use super::{prepare_manifests, ManifestArgs};
use crate::config::DeployConfig;

#[derive(Args)]
pub struct RenderArgs {
    #[command(flatten)]
    pub manifest: ManifestArgs,

    /// Write the rendered manifests to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Also check that every manifest decodes to a Kubernetes object
    #[arg(long)]
    pub validate: bool,
}

pub async fn execute(args: RenderArgs, config: DeployConfig) -> Result<()> {
    let manifests = prepare_manifests(&args.manifest, &config)?;

    if args.validate {
        let report = manifests.decode();
        for failure in &report.failures {
            warn!("Manifest #{} does not decode: {}", failure.index, failure.error);
        }
        report
            .into_result()
            .context("Rendered manifests failed validation")?;
    }

    let rendered = manifests.join();
    match &args.output {
        Some(path) => {
            fs::write(path, &rendered)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Wrote {} manifests to {:?}", manifests.len(), path);
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&rendered)?;
            stdout.flush()?;
        }
    }

    Ok(())
}
