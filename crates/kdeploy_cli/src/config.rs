//! Project configuration file (`kdeploy.yaml`).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

use kdeploy_manifest::Variables;
use kdeploy_runner::{ColorMode, KubectlOptions};

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "kdeploy.yaml";

/// Rollout monitoring settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RolloutConfig {
    /// Fail the command when any resource fails to roll out
    pub strict: bool,
    /// Prefix coloring
    pub color: ColorMode,
}

/// Contents of `kdeploy.yaml`. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    /// Manifest files, directories or glob patterns
    pub manifests: Vec<String>,
    /// Override values for manifest templates
    pub values: Variables,
    pub kubectl: KubectlOptions,
    pub rollout: RolloutConfig,
    /// Directory relative manifest paths are resolved against
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl DeployConfig {
    /// Load an explicit config file, or `kdeploy.yaml` from `cwd` if present.
    pub fn load(explicit: Option<&Path>, cwd: &Path) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let default = cwd.join(CONFIG_FILE);
                if !default.exists() {
                    debug!("No {} found, using defaults", CONFIG_FILE);
                    return Ok(Self {
                        base_dir: cwd.to_path_buf(),
                        ..Self::default()
                    });
                }
                default
            }
        };

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: DeployConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;

        config.base_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| cwd.to_path_buf());
        debug!("Loaded configuration from {:?}", path);
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_default_config_uses_defaults() {
        let temp = tempdir().unwrap();
        let config = DeployConfig::load(None, temp.path()).unwrap();
        assert!(config.manifests.is_empty());
        assert_eq!(config.kubectl.binary, "kubectl");
        assert_eq!(config.base_dir, temp.path());
    }

    #[test]
    fn test_load_default_config() {
        let temp = tempdir().unwrap();
        fs::write(
            temp.path().join(CONFIG_FILE),
            r#"
manifests:
  - k8s/*.yaml
values:
  IMAGE: "{{ REGISTRY }}/web"
kubectl:
  context: kind-dev
  flags:
    global: ["--request-timeout=30s"]
rollout:
  strict: true
  color: never
"#,
        )
        .unwrap();

        let config = DeployConfig::load(None, temp.path()).unwrap();
        assert_eq!(config.manifests, vec!["k8s/*.yaml".to_string()]);
        assert_eq!(config.values["IMAGE"], "{{ REGISTRY }}/web");
        assert_eq!(config.kubectl.context.as_deref(), Some("kind-dev"));
        assert_eq!(config.kubectl.binary, "kubectl");
        assert!(config.rollout.strict);
        assert_eq!(config.rollout.color, ColorMode::Never);
    }

    #[test]
    fn test_explicit_config_must_exist() {
        let temp = tempdir().unwrap();
        let missing = temp.path().join("nope.yaml");
        assert!(DeployConfig::load(Some(missing.as_path()), temp.path()).is_err());
    }
}
