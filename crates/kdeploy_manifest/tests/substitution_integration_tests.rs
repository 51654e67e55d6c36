//! Integration tests for manifest substitution and decoding.

use std::fs;

use kdeploy_manifest::{
    Environment, EnvironmentSource, ManifestError, ManifestList, ManifestLoader,
    ManifestResolver, ManifestResult, Variables, Workload,
};
use tempfile::tempdir;

const DEPLOYMENT_TEMPLATE: &str = r#"apiVersion: apps/v1
kind: Deployment
metadata:
  name: {{ APP }}
spec:
  template:
    spec:
      containers:
        - name: {{ APP }}
          image: {{ IMAGE }}
          env:
            - name: LOG_LEVEL
              value: {{ default("info", LOG_LEVEL) }}
"#;

fn values(pairs: &[(&str, &str)]) -> Variables {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn resolver() -> ManifestResolver<Environment> {
    let env = Environment::from_entries(["REGISTRY=gcr.io/acme", "APP=from-env"]).unwrap();
    ManifestResolver::with_environment(env)
}

#[test]
fn test_substitute_and_decode() {
    let manifests: ManifestList = vec![DEPLOYMENT_TEMPLATE].into_iter().collect();
    let overrides = values(&[("APP", "web"), ("IMAGE", "{{ REGISTRY }}/web:v2")]);

    let rendered = resolver().substitute(&manifests, &overrides).unwrap();
    assert_eq!(rendered.len(), 1);

    let text = String::from_utf8_lossy(&rendered[0]).to_string();
    assert!(text.contains("image: gcr.io/acme/web:v2"));
    assert!(text.contains("value: info"));
    assert!(!text.contains("from-env"));

    let report = rendered.decode();
    assert!(report.is_complete());
    assert!(matches!(&report.workloads[0], Workload::Deployment(meta) if meta.name == "web"));
}

#[test]
fn test_substitution_is_idempotent_once_resolved() {
    let manifests: ManifestList = vec![DEPLOYMENT_TEMPLATE].into_iter().collect();
    let overrides = values(&[("APP", "web"), ("IMAGE", "{{ REGISTRY }}/web:v2")]);
    let resolver = resolver();

    let resolved_values = resolver.resolve_values(&overrides).unwrap();
    let first = resolver.substitute(&manifests, &resolved_values).unwrap();
    let second = resolver.substitute(&first, &resolved_values).unwrap();

    assert_eq!(first, second);
}

#[test]
fn test_required_value_missing_aborts_substitution() {
    let manifests: ManifestList = vec![
        "kind: ConfigMap\nmetadata:\n  name: ok\n",
        "kind: Secret\nmetadata:\n  name: {{ required(SECRET_NAME) }}\n",
    ]
    .into_iter()
    .collect();

    let err = resolver()
        .substitute(&manifests, &Variables::new())
        .unwrap_err();
    assert!(err.is_template_error());
    assert!(matches!(err, ManifestError::ManifestTemplateExecute { index: 1, .. }));
    assert!(err.to_string().contains("substituting variables in manifest template"));
}

#[test]
fn test_required_value_present() {
    let manifests: ManifestList = vec!["kind: Secret\nmetadata:\n  name: {{ required(SECRET_NAME) }}\n"]
        .into_iter()
        .collect();

    let rendered = resolver()
        .substitute(&manifests, &values(&[("SECRET_NAME", "x")]))
        .unwrap();
    assert_eq!(
        String::from_utf8_lossy(&rendered[0]),
        "kind: Secret\nmetadata:\n  name: x\n"
    );
}

#[test]
fn test_conditional_manifest_dropped_when_flag_unset() {
    let manifests: ManifestList = vec![
        "{% if flag %}apiVersion: v1\nkind: Namespace\nmetadata:\n  name: debug\n{% endif %}",
        "apiVersion: v1\nkind: Namespace\nmetadata:\n  name: prod\n",
    ]
    .into_iter()
    .collect();

    let without = resolver().substitute(&manifests, &Variables::new()).unwrap();
    assert_eq!(without.len(), 1);

    let with = resolver()
        .substitute(&manifests, &values(&[("flag", "yes")]))
        .unwrap();
    assert_eq!(with.len(), 2);
}

/// Environment holding an entry without `=`.
struct BrokenEnvironment;

impl EnvironmentSource for BrokenEnvironment {
    fn snapshot(&self) -> ManifestResult<Environment> {
        Environment::from_entries(["PATH=/usr/bin", "NOPE"])
    }
}

#[test]
fn test_malformed_environment_fails_substitution() {
    let manifests: ManifestList = vec!["kind: ConfigMap\nmetadata:\n  name: ok\n"]
        .into_iter()
        .collect();

    let err = ManifestResolver::with_environment(BrokenEnvironment)
        .substitute(&manifests, &values(&[("APP", "web")]))
        .unwrap_err();
    assert!(matches!(err, ManifestError::MalformedEnvironment(ref entry) if entry == "NOPE"));
    assert!(!err.is_template_error());
}

#[test]
fn test_load_substitute_decode_from_disk() {
    let temp = tempdir().unwrap();
    let k8s = temp.path().join("k8s");
    fs::create_dir_all(&k8s).unwrap();
    fs::write(
        k8s.join("app.yaml"),
        "apiVersion: apps/v1\nkind: StatefulSet\nmetadata:\n  name: {{ APP }}-db\n---\napiVersion: apps/v1\nkind: DaemonSet\nmetadata:\n  name: {{ APP }}-agent\n",
    )
    .unwrap();
    fs::write(k8s.join("broken.yaml"), "apiVersion: apps/v1\nmetadata: {}\n").unwrap();

    let manifests = ManifestLoader::new(temp.path()).load_all(&["k8s"]).unwrap();
    assert_eq!(manifests.len(), 3);

    let rendered = resolver()
        .substitute(&manifests, &values(&[("APP", "shop")]))
        .unwrap();
    let report = rendered.decode();

    assert_eq!(report.workloads.len(), 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].index, 2);
    assert!(matches!(&report.workloads[0], Workload::StatefulSet(m) if m.name == "shop-db"));
    assert!(matches!(&report.workloads[1], Workload::DaemonSet(m) if m.name == "shop-agent"));
}
