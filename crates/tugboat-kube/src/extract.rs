//! Separating hooks from steady-state resources
//!
//! Every object of a split render is either moved to the hooks directory
//! (when it carries a hook annotation) or stamped in place with the release
//! labels used for selection and garbage collection.

use std::path::{Path, PathBuf};
use tracing::debug;

use tugboat_core::{ManifestObject, ReleaseIdentity, manifest_files};

use crate::annotations::{
    APP_VERSION_ANNOTATION, CHART_NAME_ANNOTATION, CHART_VERSION_LABEL, NAMESPACE_LABEL,
    RELEASE_NAME_LABEL, delete_policy_annotation, hook_annotation, is_cluster_scoped, label_value,
};
use crate::error::Result;
use crate::hooks::{HookDefinition, parse_delete_policies, parse_hook_phases};

/// Stamp release labels and annotations on a steady-state object
pub fn label_object(object: &mut ManifestObject, identity: &ReleaseIdentity) {
    object.set_label(RELEASE_NAME_LABEL, &identity.release_name);
    if is_cluster_scoped(&object.kind, &object.name) {
        object.set_label(NAMESPACE_LABEL, &identity.namespace);
    }
    object.set_label(CHART_VERSION_LABEL, &label_value(&identity.chart_version));
    object.set_annotation(CHART_NAME_ANNOTATION, &identity.chart_name);
    if let Some(app_version) = identity.app_version.as_deref().filter(|v| !v.is_empty()) {
        object.set_annotation(APP_VERSION_ANNOTATION, app_version);
    }
}

/// Build a hook definition if the object carries a hook annotation
pub fn hook_definition(object: &ManifestObject, file_path: PathBuf) -> Option<HookDefinition> {
    let phases = hook_annotation(object)?;
    Some(HookDefinition {
        kind: object.kind.clone(),
        name: object.name.clone(),
        file_path,
        phases: parse_hook_phases(phases),
        delete_policies: delete_policy_annotation(object)
            .map(parse_delete_policies)
            .unwrap_or_default(),
    })
}

/// Walk `output_dir`, moving hooks under `hooks_dir` and labeling the rest
///
/// Files are visited in lexical path order, which is the order hooks are
/// returned and later run in. A hook keeps its path relative to
/// `output_dir`. Files processed before a failure stay modified.
pub fn extract_and_label(
    output_dir: &Path,
    hooks_dir: &Path,
    identity: &ReleaseIdentity,
) -> Result<Vec<HookDefinition>> {
    let mut hooks = Vec::new();

    for path in manifest_files(output_dir)? {
        let mut object = ManifestObject::from_file(&path)?;
        let relative = path.strip_prefix(output_dir).unwrap_or(&path);
        let destination = hooks_dir.join(relative);

        if let Some(hook) = hook_definition(&object, destination.clone()) {
            if let Some(parent) = destination.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::rename(&path, &destination)?;
            debug!(kind = %hook.kind, name = %hook.name, path = %destination.display(), "extracted hook");
            hooks.push(hook);
        } else {
            label_object(&mut object, identity);
            object.write()?;
            debug!(kind = %object.kind, name = %object.name, "labeled resource");
        }
    }

    Ok(hooks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::{DeletePolicy, HookPhase};
    use tempfile::TempDir;

    fn identity() -> ReleaseIdentity {
        ReleaseIdentity {
            release_name: "demo".to_string(),
            namespace: "prod".to_string(),
            chart_name: "web".to_string(),
            chart_version: "1.2.0+build.7".to_string(),
            app_version: Some("3.1".to_string()),
        }
    }

    fn setup() -> (TempDir, PathBuf, PathBuf) {
        let temp = TempDir::new().unwrap();
        let output = temp.path().join("output");
        let hooks = temp.path().join("hooks");
        std::fs::create_dir_all(output.join("web/templates")).unwrap();
        std::fs::create_dir_all(&hooks).unwrap();
        (temp, output, hooks)
    }

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_label_namespaced_object() {
        let mut obj = ManifestObject::parse(
            "kind: ConfigMap\nmetadata:\n  name: cfg\n  labels:\n    app: web\n",
            Path::new("cfg.yaml"),
        )
        .unwrap();
        label_object(&mut obj, &identity());

        assert_eq!(obj.label("app"), Some("web"));
        assert_eq!(obj.label(RELEASE_NAME_LABEL), Some("demo"));
        assert_eq!(obj.label(CHART_VERSION_LABEL), Some("1.2.0_build.7"));
        assert_eq!(obj.label(NAMESPACE_LABEL), None);
        assert_eq!(obj.annotation(CHART_NAME_ANNOTATION), Some("web"));
        assert_eq!(obj.annotation(APP_VERSION_ANNOTATION), Some("3.1"));
    }

    #[test]
    fn test_label_cluster_scoped_object() {
        let mut obj = ManifestObject::parse(
            "kind: ClusterRole\nmetadata:\n  name: reader\n",
            Path::new("role.yaml"),
        )
        .unwrap();
        let mut id = identity();
        id.app_version = None;
        label_object(&mut obj, &id);

        assert_eq!(obj.label(NAMESPACE_LABEL), Some("prod"));
        assert_eq!(obj.annotation(APP_VERSION_ANNOTATION), None);
    }

    #[test]
    fn test_extract_after_split_of_single_document_file() {
        let (_temp, output, hooks_dir) = setup();
        let templates = output.join("web/templates");
        write(
            &templates,
            "cm.yaml",
            "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: cfg\n---\n",
        );
        write(
            &templates,
            "job.yaml",
            "---\n# Source: web/templates/job.yaml\n---\nkind: Job\nmetadata:\n  name: migrate\n  annotations:\n    helm.sh/hook: pre-install\n",
        );

        let files = tugboat_core::split_tree(&output).unwrap();
        assert_eq!(files.len(), 2);

        let hooks = extract_and_label(&output, &hooks_dir, &identity()).unwrap();

        assert_eq!(hooks.len(), 1);
        assert_eq!(hooks[0].name, "migrate");
        let cfg = ManifestObject::from_file(templates.join("cm.yaml")).unwrap();
        assert_eq!(cfg.label(RELEASE_NAME_LABEL), Some("demo"));
    }

    #[test]
    fn test_extract_and_label() {
        let (_temp, output, hooks_dir) = setup();
        let templates = output.join("web/templates");
        write(
            &templates,
            "a-configmap.yaml",
            "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: cfg\ndata:\n  key: value\n",
        );
        write(
            &templates,
            "b-job.yaml",
            r#"apiVersion: batch/v1
kind: Job
metadata:
  name: migrate
  annotations:
    helm.sh/hook: pre-install,pre-upgrade
    helm.sh/hook-delete-policy: hook-succeeded
"#,
        );
        write(
            &templates,
            "c-secret.yaml",
            r#"apiVersion: v1
kind: Secret
metadata:
  name: seed
  annotations:
    tugboat.io/hook: post-install
"#,
        );

        let hooks = extract_and_label(&output, &hooks_dir, &identity()).unwrap();

        assert_eq!(hooks.len(), 2);
        assert_eq!(hooks[0].name, "migrate");
        assert_eq!(
            hooks[0].file_path,
            hooks_dir.join("web/templates/b-job.yaml")
        );
        assert!(hooks[0].runs_in_phase(HookPhase::PreInstall));
        assert!(hooks[0].runs_in_phase(HookPhase::PreUpgrade));
        assert!(hooks[0].delete_policies.contains(&DeletePolicy::HookSucceeded));
        assert_eq!(hooks[1].kind, "Secret");
        assert!(hooks[1].delete_policies.is_empty());

        // Hooks left the output tree and were not labeled
        assert!(!templates.join("b-job.yaml").exists());
        let moved = ManifestObject::from_file(&hooks[0].file_path).unwrap();
        assert_eq!(moved.label(RELEASE_NAME_LABEL), None);

        let remaining = manifest_files(&output).unwrap();
        assert_eq!(remaining, vec![templates.join("a-configmap.yaml")]);
        let cfg = ManifestObject::from_file(&remaining[0]).unwrap();
        assert_eq!(cfg.label(RELEASE_NAME_LABEL), Some("demo"));
        assert_eq!(
            cfg.document["data"]["key"],
            serde_yaml::Value::String("value".to_string())
        );
    }

    #[test]
    fn test_empty_hook_annotation_is_not_a_hook() {
        let (_temp, output, hooks_dir) = setup();
        write(
            &output,
            "cfg.yaml",
            "kind: ConfigMap\nmetadata:\n  name: cfg\n  annotations:\n    helm.sh/hook: \"\"\n",
        );

        let hooks = extract_and_label(&output, &hooks_dir, &identity()).unwrap();
        assert!(hooks.is_empty());
        let cfg = ManifestObject::from_file(output.join("cfg.yaml")).unwrap();
        assert_eq!(cfg.label(RELEASE_NAME_LABEL), Some("demo"));
    }

    #[test]
    fn test_undecodable_file_is_codec_error() {
        let (_temp, output, hooks_dir) = setup();
        write(&output, "bad.yaml", "- just\n- a list\n");

        let err = extract_and_label(&output, &hooks_dir, &identity()).unwrap_err();
        assert!(matches!(err, crate::KubeError::Codec { .. }));
    }
}
