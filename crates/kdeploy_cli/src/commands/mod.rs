//! CLI command definitions.
//!
//! Each subcommand covers one stage of a deployment: rendering manifests,
//! following rollouts, or both after applying.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{info, warn};

use kdeploy_manifest::{ManifestList, ManifestLoader, ManifestResolver};
use kdeploy_runner::{cancel_channel, CancelSignal, ColorMode, KubectlCli, RolloutReport};

use crate::config::DeployConfig;

pub mod deploy;
pub mod render;
pub mod status;

/// kdeploy - render Kubernetes manifests and follow their rollout
#[derive(Parser)]
#[command(name = "kdeploy")]
#[command(version, about = "kdeploy - render Kubernetes manifests and follow their rollout")]
#[command(long_about = r#"
kdeploy renders templated Kubernetes manifests with override values and
environment variables, applies them with kubectl and follows the rollout
of every workload concurrently.

WORKFLOWS:
  render  → Substitute variables and print the resulting manifests
  status  → Follow the rollout of the workloads in the manifests
  deploy  → Render, apply and follow the rollout

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments
  3 - Rollout failure (strict mode)
  4 - Template error
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file (defaults to ./kdeploy.yaml when present)
    #[arg(short, long, global = true, env = "KDEPLOY_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Substitute variables into manifests and print them
    Render(render::RenderArgs),

    /// Follow the rollout of the workloads in the manifests
    Status(status::StatusArgs),

    /// Apply manifests and follow their rollout
    Deploy(deploy::DeployArgs),
}

/// Manifest selection and override values.
#[derive(Args, Debug, Clone, Default)]
pub struct ManifestArgs {
    /// Manifest files, directories or glob patterns
    pub manifests: Vec<String>,

    /// Override value for templates (KEY=VALUE, repeatable)
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub values: Vec<(String, String)>,
}

/// Cluster access settings.
#[derive(Args, Debug, Clone, Default)]
pub struct ClusterArgs {
    /// kubeconfig context
    #[arg(long, env = "KDEPLOY_CONTEXT")]
    pub context: Option<String>,

    /// Default namespace
    #[arg(short, long)]
    pub namespace: Option<String>,

    /// kubectl binary
    #[arg(long, env = "KUBECTL")]
    pub kubectl: Option<String>,

    /// Print kubectl commands instead of running them
    #[arg(long)]
    pub dry_run: bool,
}

/// Rollout monitoring settings.
#[derive(Args, Debug, Clone, Default)]
pub struct RolloutArgs {
    /// Exit non-zero when any resource fails to roll out
    #[arg(long)]
    pub strict: bool,

    /// Color resource prefixes
    #[arg(long, value_enum)]
    pub color: Option<ColorArg>,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum ColorArg {
    Auto,
    Always,
    Never,
}

impl From<ColorArg> for ColorMode {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => ColorMode::Auto,
            ColorArg::Always => ColorMode::Always,
            ColorArg::Never => ColorMode::Never,
        }
    }
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid KEY=VALUE: no `=` found in `{s}`"))?;
    if key.is_empty() {
        return Err(format!("invalid KEY=VALUE: empty key in `{s}`"));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Load the selected manifests and substitute override values into them.
pub fn prepare_manifests(args: &ManifestArgs, config: &DeployConfig) -> Result<ManifestList> {
    let patterns = if args.manifests.is_empty() {
        &config.manifests
    } else {
        &args.manifests
    };
    if patterns.is_empty() {
        anyhow::bail!("No manifests given: pass paths or set `manifests` in the config file");
    }

    let manifests = ManifestLoader::new(&config.base_dir)
        .load_all(patterns)
        .context("Failed to load manifests")?;

    let mut values = config.values.clone();
    values.extend(args.values.iter().cloned());

    ManifestResolver::new()
        .substitute(&manifests, &values)
        .context("Failed to substitute manifest variables")
}

/// Build the kubectl client from config and flags.
pub fn kubectl_client(args: &ClusterArgs, config: &DeployConfig) -> Arc<KubectlCli> {
    let mut options = config.kubectl.clone();
    if let Some(binary) = &args.kubectl {
        options = options.binary(binary.as_str());
    }
    if let Some(context) = &args.context {
        options = options.context(context.as_str());
    }
    if let Some(namespace) = &args.namespace {
        options = options.namespace(namespace.as_str());
    }
    if args.dry_run {
        options = options.dry_run();
    }
    Arc::new(KubectlCli::new(options))
}

/// Color mode from flags, falling back to the config file.
pub fn color_mode(args: &RolloutArgs, config: &DeployConfig) -> ColorMode {
    args.color.map(ColorMode::from).unwrap_or(config.rollout.color)
}

/// Cancellation signal fired on Ctrl-C.
pub fn cancel_on_ctrl_c() -> CancelSignal {
    let (tx, rx) = cancel_channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling kubectl commands");
            let _ = tx.send(true);
        }
    });
    rx
}

/// Print a rollout summary and, in strict mode, fail on any failure.
pub fn finish_rollout(report: RolloutReport, strict: bool) -> Result<()> {
    for failure in &report.decode_failures {
        warn!("Skipped manifest #{}: {}", failure.index, failure.error);
    }

    let failed = report.failures().count();
    info!(
        "Rollout finished: {} resources, {} failed",
        report.outcomes.len(),
        failed
    );

    if strict {
        report.into_result()?;
    } else if failed > 0 {
        eprintln!("⚠️  {} resources failed to roll out", failed);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("IMAGE=web:v1=x").unwrap(),
            ("IMAGE".to_string(), "web:v1=x".to_string())
        );
        assert_eq!(parse_key_value("EMPTY=").unwrap().1, "");
        assert!(parse_key_value("NOPE").is_err());
        assert!(parse_key_value("=value").is_err());
    }

    #[test]
    fn test_cli_parses_deploy() {
        let cli = Cli::parse_from([
            "kdeploy",
            "deploy",
            "k8s",
            "--set",
            "TAG=v1",
            "--context",
            "kind-dev",
            "--strict",
            "--color",
            "never",
        ]);
        match cli.command {
            Commands::Deploy(args) => {
                assert_eq!(args.manifest.manifests, vec!["k8s".to_string()]);
                assert_eq!(args.manifest.values, vec![("TAG".to_string(), "v1".to_string())]);
                assert_eq!(args.cluster.context.as_deref(), Some("kind-dev"));
                assert!(args.rollout.strict);
            }
            _ => panic!("expected deploy command"),
        }
    }

    #[test]
    fn test_flags_override_config() {
        let config = DeployConfig {
            kubectl: kdeploy_runner::KubectlOptions::new().context("from-config").namespace("ns"),
            ..DeployConfig::default()
        };
        let args = ClusterArgs {
            context: Some("from-flag".to_string()),
            ..ClusterArgs::default()
        };

        let client = kubectl_client(&args, &config);
        assert_eq!(client.options().context.as_deref(), Some("from-flag"));
        assert_eq!(client.options().namespace.as_deref(), Some("ns"));
    }

    #[test]
    fn test_prepare_manifests_merges_values() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::write(
            temp.path().join("app.yaml"),
            "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: {{ NAME }}\ndata:\n  tag: {{ TAG }}\n",
        )
        .unwrap();

        let mut config = DeployConfig {
            base_dir: temp.path().to_path_buf(),
            manifests: vec!["app.yaml".to_string()],
            ..DeployConfig::default()
        };
        config.values.insert("NAME".to_string(), "settings".to_string());
        config.values.insert("TAG".to_string(), "from-config".to_string());

        let args = ManifestArgs {
            manifests: Vec::new(),
            values: vec![("TAG".to_string(), "from-flag".to_string())],
        };

        let manifests = prepare_manifests(&args, &config).unwrap();
        let text = manifests.to_string();
        assert!(text.contains("name: settings"));
        assert!(text.contains("tag: from-flag"));
    }
}
