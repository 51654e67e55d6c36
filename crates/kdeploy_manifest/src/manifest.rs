//! Manifest list definitions.
//!
//! A [`ManifestList`] is an ordered sequence of raw Kubernetes manifests,
//! one YAML document per entry. Operations on the list never mutate it in
//! place; they return a new list.

use std::fmt;
use std::ops::Deref;

/// A single raw manifest document.
pub type Manifest = Vec<u8>;

/// Ordered list of raw manifest documents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestList(Vec<Manifest>);

impl ManifestList {
    /// Create an empty manifest list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a manifest.
    pub fn push(&mut self, manifest: impl Into<Manifest>) {
        self.0.push(manifest.into());
    }

    /// Number of manifests in the list.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the raw manifests.
    pub fn iter(&self) -> std::slice::Iter<'_, Manifest> {
        self.0.iter()
    }

    /// Join all manifests into a single multi-document YAML stream.
    pub fn join(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        for manifest in &self.0 {
            buf.extend_from_slice(b"---\n");
            buf.extend_from_slice(manifest);
            if !manifest.ends_with(b"\n") {
                buf.push(b'\n');
            }
        }
        buf
    }

    pub fn into_inner(self) -> Vec<Manifest> {
        self.0
    }
}

impl Deref for ManifestList {
    type Target = [Manifest];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<Manifest>> for ManifestList {
    fn from(manifests: Vec<Manifest>) -> Self {
        Self(manifests)
    }
}

impl<T: Into<Manifest>> FromIterator<T> for ManifestList {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl<'a> IntoIterator for &'a ManifestList {
    type Item = &'a Manifest;
    type IntoIter = std::slice::Iter<'a, Manifest>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl IntoIterator for ManifestList {
    type Item = Manifest;
    type IntoIter = std::vec::IntoIter<Manifest>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl fmt::Display for ManifestList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.join()))
    }
}
