//! Error types for manifest operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for manifest operations.
pub type ManifestResult<T> = Result<T, ManifestError>;

/// Errors that can occur while loading, substituting or decoding manifests.
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("error parsing environment variables, {0} does not contain an =")]
    MalformedEnvironment(String),

    #[error("parsing manifest values template for {key}: {source}")]
    ValueTemplateParse {
        key: String,
        #[source]
        source: minijinja::Error,
    },

    #[error("substituting variables in manifest values template for {key}: {source}")]
    ValueTemplateExecute {
        key: String,
        #[source]
        source: minijinja::Error,
    },

    #[error("parsing manifest template #{index}: {source}")]
    ManifestTemplateParse {
        index: usize,
        #[source]
        source: minijinja::Error,
    },

    #[error("substituting variables in manifest template #{index}: {source}")]
    ManifestTemplateExecute {
        index: usize,
        #[source]
        source: minijinja::Error,
    },

    #[error("reading kubernetes YAML in manifest #{index}: {source}")]
    YamlDecode {
        index: usize,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("manifest #{index} is not a YAML mapping")]
    NotAMapping { index: usize },

    #[error("marshalling yaml for manifest #{index}: {source}")]
    YamlEncode {
        index: usize,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("decoding manifest: {0}")]
    Decode(String),

    #[error("Manifest not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid manifest pattern {pattern}: {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("Manifest is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl ManifestError {
    /// Whether the error came out of the templating stage.
    pub fn is_template_error(&self) -> bool {
        matches!(
            self,
            Self::ValueTemplateParse { .. }
                | Self::ValueTemplateExecute { .. }
                | Self::ManifestTemplateParse { .. }
                | Self::ManifestTemplateExecute { .. }
        )
    }
}
