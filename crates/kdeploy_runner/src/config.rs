//! kubectl invocation configuration.

use serde::{Deserialize, Serialize};

/// Flags appended to specific kubectl commands.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KubectlFlags {
    /// Flags added to every command
    #[serde(default)]
    pub global: Vec<String>,
    /// Flags added to `kubectl apply`
    #[serde(default)]
    pub apply: Vec<String>,
}

/// Options controlling how kubectl is invoked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KubectlOptions {
    /// kubectl binary to execute
    pub binary: String,
    /// kubeconfig context (`--context`)
    pub context: Option<String>,
    /// Default namespace (`--namespace`)
    pub namespace: Option<String>,
    /// Extra flags
    pub flags: KubectlFlags,
    /// Log commands instead of running them
    #[serde(skip)]
    pub dry_run: bool,
}

impl Default for KubectlOptions {
    fn default() -> Self {
        Self {
            binary: "kubectl".to_string(),
            context: None,
            namespace: None,
            flags: KubectlFlags::default(),
            dry_run: false,
        }
    }
}

impl KubectlOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn global_flag(mut self, flag: impl Into<String>) -> Self {
        self.flags.global.push(flag.into());
        self
    }

    pub fn apply_flag(mut self, flag: impl Into<String>) -> Self {
        self.flags.apply.push(flag.into());
        self
    }

    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_builder() {
        let options = KubectlOptions::new()
            .context("kind-dev")
            .namespace("shop")
            .global_flag("--request-timeout=30s")
            .apply_flag("--server-side");

        assert_eq!(options.binary, "kubectl");
        assert_eq!(options.context.as_deref(), Some("kind-dev"));
        assert_eq!(options.namespace.as_deref(), Some("shop"));
        assert_eq!(options.flags.global, vec!["--request-timeout=30s".to_string()]);
        assert_eq!(options.flags.apply, vec!["--server-side".to_string()]);
        assert!(!options.dry_run);
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: KubectlOptions = serde_json::from_value(serde_json::json!({
            "context": "prod",
            "flags": { "apply": ["--prune"] }
        }))
        .unwrap();

        assert_eq!(options.binary, "kubectl");
        assert_eq!(options.context.as_deref(), Some("prod"));
        assert!(options.namespace.is_none());
        assert!(options.flags.global.is_empty());
        assert_eq!(options.flags.apply, vec!["--prune".to_string()]);
    }
}
