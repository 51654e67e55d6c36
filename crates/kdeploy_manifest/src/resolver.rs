//! Variable substitution for manifest lists.
//!
//! Substitution runs in two passes:
//! - every override value is rendered once against the overrides merged
//!   over the environment snapshot, so values may reference each other
//!   and environment variables (one level of indirection only);
//! - every manifest body is rendered against the resolved overrides merged
//!   over the same snapshot, then re-serialized as canonical YAML.
//!
//! A manifest that renders to an empty mapping is dropped. Re-serialized
//! manifests are canonical: mapping keys are sorted at every level and
//! plain leading-zero integers such as `0644` keep their YAML 1.1 octal
//! value, the reading kubectl applies.

use std::cmp::Ordering;

use serde_yaml::{Mapping, Value};
use tracing::{debug, info};

use crate::environment::{EnvironmentSource, ProcessEnvironment, Variables};
use crate::error::{ManifestError, ManifestResult};
use crate::manifest::ManifestList;
use crate::renderer::{RenderError, TemplateRenderer};

/// Resolves template variables in override values and manifest bodies.
pub struct ManifestResolver<E = ProcessEnvironment> {
    renderer: TemplateRenderer,
    environment: E,
}

impl Default for ManifestResolver<ProcessEnvironment> {
    fn default() -> Self {
        Self::new()
    }
}

impl ManifestResolver<ProcessEnvironment> {
    /// Create a resolver backed by the process environment.
    pub fn new() -> Self {
        Self::with_environment(ProcessEnvironment)
    }
}

impl<E: EnvironmentSource> ManifestResolver<E> {
    /// Create a resolver backed by a custom environment source.
    pub fn with_environment(environment: E) -> Self {
        Self {
            renderer: TemplateRenderer::new(),
            environment,
        }
    }

    /// Render every override value against the overrides and environment.
    ///
    /// Each value sees the original, unresolved overrides, so the result
    /// does not depend on iteration order.
    pub fn resolve_values(&self, values: &Variables) -> ManifestResult<Variables> {
        let environment = self.environment.snapshot()?;
        let context = environment.merged_with(values);

        let mut resolved = Variables::new();
        for (key, value) in values {
            let rendered = self.renderer.render(value, &context).map_err(|e| match e {
                RenderError::Parse(source) => ManifestError::ValueTemplateParse {
                    key: key.clone(),
                    source,
                },
                RenderError::Execute(source) => ManifestError::ValueTemplateExecute {
                    key: key.clone(),
                    source,
                },
            })?;
            resolved.insert(key.clone(), rendered);
        }
        Ok(resolved)
    }

    /// Substitute variables into every manifest of `manifests`.
    pub fn substitute(
        &self,
        manifests: &ManifestList,
        values: &Variables,
    ) -> ManifestResult<ManifestList> {
        let resolved = self.resolve_values(values)?;
        let environment = self.environment.snapshot()?;
        let context = environment.merged_with(&resolved);

        let mut updated = ManifestList::new();
        for (index, manifest) in manifests.iter().enumerate() {
            let source = std::str::from_utf8(manifest)?;
            let rendered = self.renderer.render(source, &context).map_err(|e| match e {
                RenderError::Parse(source) => ManifestError::ManifestTemplateParse { index, source },
                RenderError::Execute(source) => {
                    ManifestError::ManifestTemplateExecute { index, source }
                }
            })?;

            let Some(mapping) = parse_mapping(index, &rendered)? else {
                debug!(index, "manifest is empty after substitution, skipping");
                continue;
            };

            let canonical = canonicalize(Value::Mapping(mapping), &rendered);
            let yaml = serde_yaml::to_string(&canonical)
                .map_err(|source| ManifestError::YamlEncode { index, source })?;
            updated.push(yaml);
        }

        info!(
            "Substituted variables in {} of {} manifests",
            updated.len(),
            manifests.len()
        );
        Ok(updated)
    }
}

impl ManifestList {
    /// Substitute `values` and process environment variables into the list.
    pub fn substitute_variables(&self, values: &Variables) -> ManifestResult<ManifestList> {
        ManifestResolver::new().substitute(self, values)
    }
}

/// Parse rendered YAML into a mapping, `None` when it holds no entries.
fn parse_mapping(index: usize, rendered: &str) -> ManifestResult<Option<Mapping>> {
    if rendered.trim().is_empty() {
        return Ok(None);
    }

    let value: Value = serde_yaml::from_str(rendered)
        .map_err(|source| ManifestError::YamlDecode { index, source })?;

    match value {
        Value::Null => Ok(None),
        Value::Mapping(mapping) if mapping.is_empty() => Ok(None),
        Value::Mapping(mapping) => Ok(Some(mapping)),
        _ => Err(ManifestError::NotAMapping { index }),
    }
}

/// Sort mapping keys recursively and restore octal integers.
fn canonicalize(value: Value, rendered: &str) -> Value {
    match value {
        Value::String(scalar) => match plain_octal(&scalar, rendered) {
            Some(number) => Value::Number(number.into()),
            None => Value::String(scalar),
        },
        Value::Sequence(items) => Value::Sequence(
            items
                .into_iter()
                .map(|item| canonicalize(item, rendered))
                .collect(),
        ),
        Value::Mapping(mapping) => {
            let mut entries: Vec<(Value, Value)> = mapping
                .into_iter()
                .map(|(key, value)| (key, canonicalize(value, rendered)))
                .collect();
            entries.sort_by(|(a, _), (b, _)| compare_keys(a, b));
            Value::Mapping(entries.into_iter().collect())
        }
        Value::Tagged(mut tagged) => {
            tagged.value = canonicalize(std::mem::take(&mut tagged.value), rendered);
            Value::Tagged(tagged)
        }
        other => other,
    }
}

/// Value of `scalar` as a YAML 1.1 octal integer (`0755` is 493).
///
/// YAML 1.2 reads such plain scalars as strings. A scalar that also
/// appears quoted in the rendered text is left alone.
fn plain_octal(scalar: &str, rendered: &str) -> Option<i64> {
    let digits = scalar.strip_prefix(['+', '-']).unwrap_or(scalar);
    if digits.len() < 2
        || !digits.starts_with('0')
        || !digits.bytes().all(|b| (b'0'..=b'7').contains(&b))
    {
        return None;
    }
    if !rendered.contains(scalar)
        || rendered.contains(&format!("'{scalar}'"))
        || rendered.contains(&format!("\"{scalar}\""))
    {
        return None;
    }

    let value = i64::from_str_radix(digits, 8).ok()?;
    Some(if scalar.starts_with('-') { -value } else { value })
}

/// Key order: null, booleans, numbers, strings, then everything else.
fn compare_keys(a: &Value, b: &Value) -> Ordering {
    fn rank(value: &Value) -> u8 {
        match value {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            _ => 4,
        }
    }

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Environment;

    fn resolver(entries: &[&str]) -> ManifestResolver<Environment> {
        ManifestResolver::with_environment(Environment::from_entries(entries).unwrap())
    }

    fn values(pairs: &[(&str, &str)]) -> Variables {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_values_reference_environment_and_each_other() {
        let resolver = resolver(&["REGISTRY=gcr.io/acme"]);
        let resolved = resolver
            .resolve_values(&values(&[
                ("IMAGE", "{{ REGISTRY }}/web"),
                ("TAG", "v1"),
                ("REF", "{{ REGISTRY }}/web:{{ TAG }}"),
            ]))
            .unwrap();

        assert_eq!(resolved["IMAGE"], "gcr.io/acme/web");
        assert_eq!(resolved["REF"], "gcr.io/acme/web:v1");
    }

    #[test]
    fn test_values_resolve_a_single_level() {
        let resolver = resolver(&[]);
        let resolved = resolver
            .resolve_values(&values(&[("A", "{{ B }}"), ("B", "{{ C }}"), ("C", "c")]))
            .unwrap();

        assert_eq!(resolved["B"], "c");
        assert_eq!(resolved["A"], "{{ C }}");
    }

    #[test]
    fn test_value_parse_error_names_key() {
        let resolver = resolver(&[]);
        let err = resolver
            .resolve_values(&values(&[("BROKEN", "{{ oops")]))
            .unwrap_err();
        assert!(matches!(err, ManifestError::ValueTemplateParse { ref key, .. } if key == "BROKEN"));
    }

    #[test]
    fn test_empty_manifest_is_dropped() {
        let resolver = resolver(&[]);
        let manifests: ManifestList = vec![
            "{% if flag %}kind: Deployment{% endif %}",
            "kind: Service\nmetadata:\n  name: web\n",
        ]
        .into_iter()
        .collect();

        let out = resolver.substitute(&manifests, &Variables::new()).unwrap();
        assert_eq!(out.len(), 1);
        assert!(String::from_utf8_lossy(&out[0]).contains("kind: Service"));
    }

    #[test]
    fn test_non_mapping_manifest_is_rejected() {
        let resolver = resolver(&[]);
        let manifests: ManifestList = vec!["- a\n- b\n"].into_iter().collect();
        let err = resolver.substitute(&manifests, &Variables::new()).unwrap_err();
        assert!(matches!(err, ManifestError::NotAMapping { index: 0 }));
    }

    #[test]
    fn test_invalid_yaml_is_decode_error() {
        let resolver = resolver(&[]);
        let manifests: ManifestList = vec!["kind: [unclosed\n"].into_iter().collect();
        let err = resolver.substitute(&manifests, &Variables::new()).unwrap_err();
        assert!(matches!(err, ManifestError::YamlDecode { index: 0, .. }));
    }

    #[test]
    fn test_keys_are_sorted_at_every_level() {
        let resolver = resolver(&[]);
        let manifests: ManifestList = vec![
            "kind: Pod\napiVersion: v1\nmetadata:\n  name: a\n  labels:\n    tier: web\n    app: shop\n",
        ]
        .into_iter()
        .collect();
        let out = resolver.substitute(&manifests, &Variables::new()).unwrap();
        assert_eq!(
            String::from_utf8_lossy(&out[0]),
            "apiVersion: v1\nkind: Pod\nmetadata:\n  labels:\n    app: shop\n    tier: web\n  name: a\n"
        );
    }

    #[test]
    fn test_plain_octal_stays_an_integer() {
        let resolver = resolver(&[]);
        let manifests: ManifestList = vec![concat!(
            "apiVersion: v1\nkind: Pod\nmetadata:\n  name: a\n",
            "spec:\n  volumes:\n  - secret:\n      defaultMode: 0644\n",
            "      items:\n      - mode: 0755\n        path: run.sh\n",
            "  zip: '0123'\n  version: 1.10\n",
        )]
        .into_iter()
        .collect();

        let out = resolver.substitute(&manifests, &Variables::new()).unwrap();
        let text = String::from_utf8_lossy(&out[0]).to_string();
        assert!(text.contains("defaultMode: 420\n"), "{text}");
        assert!(text.contains("mode: 493\n"), "{text}");
        assert!(text.contains("zip: '0123'\n"), "{text}");
        assert!(text.contains("version: 1.1\n"), "{text}");
    }

    #[test]
    fn test_plain_octal_helper() {
        assert_eq!(plain_octal("0644", "mode: 0644"), Some(420));
        assert_eq!(plain_octal("-010", "offset: -010"), Some(-8));
        assert_eq!(plain_octal("0644", "mode: \"0644\""), None);
        assert_eq!(plain_octal("0", "n: 0"), None);
        assert_eq!(plain_octal("089", "n: 089"), None);
        assert_eq!(plain_octal("web", "name: web"), None);
    }
}
