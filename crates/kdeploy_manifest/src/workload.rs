//! Decoding of manifests into typed workloads.
//!
//! Decoding is best-effort: a manifest that fails to decode is recorded in
//! the [`DecodeReport`] and the batch carries on with the next one.

use std::fmt;

use serde::Deserialize;
use tracing::warn;

use crate::error::{ManifestError, ManifestResult};
use crate::manifest::{Manifest, ManifestList};

/// API version whose workload kinds have rollout status support.
pub const APPS_V1: &str = "apps/v1";

/// Identity of a decoded Kubernetes object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    pub namespace: Option<String>,
}

/// A decoded Kubernetes object, tagged by workload kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Workload {
    StatefulSet(ObjectMeta),
    DaemonSet(ObjectMeta),
    Deployment(ObjectMeta),
    Other(ObjectMeta),
}

impl Workload {
    pub fn meta(&self) -> &ObjectMeta {
        match self {
            Self::StatefulSet(meta)
            | Self::DaemonSet(meta)
            | Self::Deployment(meta)
            | Self::Other(meta) => meta,
        }
    }

    pub fn kind(&self) -> &str {
        &self.meta().kind
    }

    pub fn name(&self) -> &str {
        &self.meta().name
    }

    pub fn namespace(&self) -> Option<&str> {
        self.meta().namespace.as_deref()
    }
}

impl fmt::Display for Workload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind(), self.name())
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawObject {
    #[serde(default)]
    api_version: String,
    #[serde(default)]
    kind: String,
    #[serde(default)]
    metadata: RawMetadata,
}

#[derive(Deserialize, Default)]
struct RawMetadata {
    #[serde(default)]
    name: String,
    #[serde(default)]
    namespace: Option<String>,
}

/// Decode a single manifest into a workload.
pub fn decode_manifest(manifest: &[u8]) -> ManifestResult<Workload> {
    let raw: RawObject = serde_yaml::from_slice(manifest)?;

    if raw.api_version.is_empty() {
        return Err(ManifestError::Decode("Object 'apiVersion' is missing".to_string()));
    }
    if raw.kind.is_empty() {
        return Err(ManifestError::Decode("Object 'Kind' is missing".to_string()));
    }
    if raw.metadata.name.is_empty() {
        return Err(ManifestError::Decode(format!(
            "{} object has no metadata.name",
            raw.kind
        )));
    }

    let meta = ObjectMeta {
        api_version: raw.api_version,
        kind: raw.kind,
        name: raw.metadata.name,
        namespace: raw.metadata.namespace.filter(|ns| !ns.is_empty()),
    };

    if meta.api_version != APPS_V1 {
        return Ok(Workload::Other(meta));
    }

    Ok(match meta.kind.as_str() {
        "StatefulSet" => Workload::StatefulSet(meta),
        "DaemonSet" => Workload::DaemonSet(meta),
        "Deployment" => Workload::Deployment(meta),
        _ => Workload::Other(meta),
    })
}

/// A manifest that could not be decoded.
#[derive(Debug)]
pub struct DecodeFailure {
    /// Position of the manifest in the input list.
    pub index: usize,
    pub error: ManifestError,
}

/// Outcome of decoding a manifest list.
#[derive(Debug, Default)]
pub struct DecodeReport {
    pub workloads: Vec<Workload>,
    pub failures: Vec<DecodeFailure>,
}

impl DecodeReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Fail with the first decode error, if any.
    pub fn into_result(self) -> ManifestResult<Vec<Workload>> {
        match self.failures.into_iter().next() {
            Some(failure) => Err(failure.error),
            None => Ok(self.workloads),
        }
    }
}

impl ManifestList {
    /// Decode every manifest, collecting failures instead of aborting.
    pub fn decode(&self) -> DecodeReport {
        decode_all(self.iter())
    }
}

fn decode_all<'a>(manifests: impl Iterator<Item = &'a Manifest>) -> DecodeReport {
    let mut report = DecodeReport::default();
    for (index, manifest) in manifests.enumerate() {
        match decode_manifest(manifest) {
            Ok(workload) => report.workloads.push(workload),
            Err(error) => {
                warn!(index, error = %error, "Error while decoding manifest");
                report.failures.push(DecodeFailure { index, error });
            }
        }
    }
    report
}
