//! # kdeploy_manifest
//!
//! Manifest preparation for kdeploy.
//!
//! This crate turns raw Kubernetes manifests into deployable ones and
//! decodes them into typed workloads:
//!
//! - Loading manifests from files, directories and glob patterns
//! - Resolving override values against each other and the environment
//! - Rendering manifest bodies as templates (`default`, `required`)
//! - Re-serializing rendered manifests, dropping empty ones
//! - Best-effort decoding into StatefulSet/DaemonSet/Deployment/other
//!
//! ## Example
//!
//! ```rust,no_run
//! use kdeploy_manifest::{ManifestLoader, ManifestResolver, Variables};
//!
//! let manifests = ManifestLoader::new(".").load_all(&["k8s"]).unwrap();
//!
//! let mut values = Variables::new();
//! values.insert("TAG".to_string(), "{{ default(\"latest\", GIT_SHA) }}".to_string());
//!
//! let resolved = ManifestResolver::new().substitute(&manifests, &values).unwrap();
//! let report = resolved.decode();
//! println!("{} workloads", report.workloads.len());
//! ```

pub mod environment;
pub mod error;
pub mod loader;
pub mod manifest;
pub mod renderer;
pub mod resolver;
pub mod workload;

pub use environment::{Environment, EnvironmentSource, ProcessEnvironment, Variables};
pub use error::{ManifestError, ManifestResult};
pub use loader::ManifestLoader;
pub use manifest::{Manifest, ManifestList};
pub use renderer::{RenderError, TemplateRenderer};
pub use resolver::ManifestResolver;
pub use workload::{decode_manifest, DecodeFailure, DecodeReport, ObjectMeta, Workload, APPS_V1};
