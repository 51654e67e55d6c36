//! Environment snapshots used as template context.

use std::collections::BTreeMap;

use crate::error::{ManifestError, ManifestResult};

/// Template variables, keyed by name.
pub type Variables = BTreeMap<String, String>;

/// Snapshot of environment variables taken at substitution time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    vars: Variables,
}

impl Environment {
    /// Capture the current process environment.
    pub fn from_process() -> ManifestResult<Self> {
        Self::from_entries(std::env::vars_os().map(|(key, value)| {
            format!("{}={}", key.to_string_lossy(), value.to_string_lossy())
        }))
    }

    /// Build a snapshot from `KEY=VALUE` entries.
    ///
    /// Only the first `=` separates key from value. An entry without any
    /// `=` fails the whole snapshot.
    pub fn from_entries<I, S>(entries: I) -> ManifestResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut vars = Variables::new();
        for entry in entries {
            let entry = entry.as_ref();
            let (key, value) = entry
                .split_once('=')
                .ok_or_else(|| ManifestError::MalformedEnvironment(entry.to_string()))?;
            vars.insert(key.to_string(), value.to_string());
        }
        Ok(Self { vars })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Overlay custom values on top of the environment. Custom values win.
    pub fn merged_with(&self, custom: &Variables) -> Variables {
        let mut merged = self.vars.clone();
        merged.extend(custom.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
    }
}

/// Source of environment snapshots.
pub trait EnvironmentSource: Send + Sync {
    fn snapshot(&self) -> ManifestResult<Environment>;
}

/// Reads the environment of the running process.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnvironment;

impl EnvironmentSource for ProcessEnvironment {
    fn snapshot(&self) -> ManifestResult<Environment> {
        Environment::from_process()
    }
}

impl EnvironmentSource for Environment {
    fn snapshot(&self) -> ManifestResult<Environment> {
        Ok(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_entries_splits_on_first_equals() {
        let env = Environment::from_entries(["A=1", "B=x=y", "EMPTY="]).unwrap();
        assert_eq!(env.get("A"), Some("1"));
        assert_eq!(env.get("B"), Some("x=y"));
        assert_eq!(env.get("EMPTY"), Some(""));
    }

    #[test]
    fn test_entry_without_separator_is_rejected() {
        let err = Environment::from_entries(["A=1", "BROKEN"]).unwrap_err();
        assert!(matches!(err, ManifestError::MalformedEnvironment(ref e) if e == "BROKEN"));
    }

    #[test]
    fn test_custom_values_take_precedence() {
        let env = Environment::from_entries(["IMAGE=env", "HOME=/root"]).unwrap();
        let mut custom = Variables::new();
        custom.insert("IMAGE".to_string(), "override".to_string());

        let merged = env.merged_with(&custom);
        assert_eq!(merged.get("IMAGE").map(String::as_str), Some("override"));
        assert_eq!(merged.get("HOME").map(String::as_str), Some("/root"));
    }
}
